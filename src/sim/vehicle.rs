//! Vehicle kinematics
//!
//! A bicycle-model car: steering eases toward its target, speed chases a
//! target speed under constant acceleration, rolling friction and quadratic
//! drag bleed speed off, and the heading turns with angular velocity
//! `speed / turning_radius`.
//!
//! Headings are in degrees, 0 = +x, 90 = +y. Three kinds of entry points:
//! - driver controls (`accelerate`, `steer`, `drive`, `rotate`, ...) set
//!   targets that `update` applies on the next tick
//! - `creep` advances the pose along the steering arc for the maneuver executor
//! - `correct_*` are physical corrections from the simulation (bounces,
//!   collision response)

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::{SimError, SimResult};
use crate::{heading_vector, normalize_heading};

/// A simulated vehicle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: u32,
    /// License plate, display only
    pub plate: String,
    pos: Vec2,
    /// Velocity from the last integration step (zero when stopped)
    vel: Vec2,
    /// Degrees, [0, 360)
    heading: f32,
    /// Signed: positive forward, negative reverse
    speed: f32,
    target_speed: f32,
    acceleration: f32,
    /// Degrees, |steering| <= MAX_STEERING_ANGLE
    steering: f32,
    target_steering: f32,
    length: f32,
    width: f32,
    user_controlled: bool,
    parked: bool,
    reversing: bool,
}

impl Vehicle {
    /// Create a stopped vehicle heading along +x
    pub fn new(id: u32, pos: Vec2, length: f32, width: f32) -> SimResult<Self> {
        if !pos.is_finite() {
            return Err(SimError::NonFinite("vehicle position"));
        }
        if !(length.is_finite() && width.is_finite()) {
            return Err(SimError::NonFinite("vehicle dimensions"));
        }
        if length <= 0.0 || width <= 0.0 {
            return Err(SimError::NonPositiveDimensions {
                entity: "vehicle",
                width,
                length,
            });
        }
        Ok(Self {
            id,
            plate: String::new(),
            pos,
            vel: Vec2::ZERO,
            heading: 0.0,
            speed: 0.0,
            target_speed: 0.0,
            acceleration: 0.0,
            steering: 0.0,
            target_steering: 0.0,
            length,
            width,
            user_controlled: false,
            parked: false,
            reversing: false,
        })
    }

    /// Advance the vehicle by `dt` seconds
    pub fn update(&mut self, dt: f32) {
        if self.parked {
            self.speed = 0.0;
            self.acceleration = 0.0;
            self.steering = 0.0;
            self.vel = Vec2::ZERO;
            return;
        }

        // Steering eases toward target without overshoot
        let max_step = STEERING_RESPONSE * dt;
        let remaining = self.target_steering - self.steering;
        if remaining.abs() <= max_step {
            self.steering = self.target_steering;
        } else {
            self.steering += max_step * remaining.signum();
        }
        self.steering = self.steering.clamp(-MAX_STEERING_ANGLE, MAX_STEERING_ANGLE);

        if (self.speed - self.target_speed).abs() > SPEED_TOLERANCE {
            self.acceleration = (self.target_speed - self.speed).signum() * MAX_ACCELERATION;
            self.speed += self.acceleration * dt;
            self.speed = if self.reversing {
                self.speed.clamp(-MAX_REVERSE_SPEED, 0.0)
            } else {
                self.speed.clamp(0.0, MAX_FORWARD_SPEED)
            };
        } else {
            self.acceleration = 0.0;
            self.speed = decay_toward_zero(self.speed, ROLLING_FRICTION * dt);
        }

        let drag = AIR_DRAG * self.speed * self.speed * dt;
        self.speed = decay_toward_zero(self.speed, drag);

        if self.speed.abs() > MIN_MOVING_SPEED {
            self.vel = heading_vector(self.heading) * self.speed;
            self.pos += self.vel * dt;

            if self.steering.abs() > MIN_TURN_STEERING && self.speed.abs() > MIN_TURN_SPEED {
                let radius = self.wheelbase() / self.steering.abs().to_radians().sin();
                let angular_vel = (self.speed / radius) * self.steering.signum();
                self.heading = normalize_heading(self.heading + angular_vel.to_degrees() * dt);
            }
        } else {
            self.vel = Vec2::ZERO;
        }
    }

    // === Driver controls ===

    /// Forward throttle, `amount` in [0, 1]
    pub fn accelerate(&mut self, amount: f32) {
        self.reversing = false;
        self.target_speed = amount.clamp(0.0, 1.0) * MAX_FORWARD_SPEED;
    }

    /// Reverse throttle, `amount` in [0, 1]
    pub fn reverse(&mut self, amount: f32) {
        self.reversing = true;
        self.target_speed = -amount.clamp(0.0, 1.0) * MAX_REVERSE_SPEED;
    }

    /// Pull target speed toward zero by at most `amount * MAX_DECELERATION`
    pub fn brake(&mut self, amount: f32) {
        let decel = amount.clamp(0.0, 1.0) * MAX_DECELERATION;
        if self.speed > 0.0 {
            self.target_speed = (self.speed - decel).max(0.0);
        } else if self.speed < 0.0 {
            self.target_speed = (self.speed + decel).min(0.0);
        }
    }

    /// Skid stop: drops speed immediately instead of decelerating
    pub fn handbrake(&mut self) {
        self.target_speed = 0.0;
        self.speed *= HANDBRAKE_RETENTION;
    }

    /// Steering input, `amount` in [-1, 1]
    pub fn steer(&mut self, amount: f32) {
        self.target_steering = amount.clamp(-1.0, 1.0) * MAX_STEERING_ANGLE;
    }

    pub fn center_steering(&mut self) {
        self.target_steering = 0.0;
    }

    /// Combined steering (degrees) and throttle (m/s, negative = reverse).
    ///
    /// Zero throttle sets the target speed to zero directly.
    pub fn drive(&mut self, steering_degrees: f32, throttle: f32) {
        self.steer(steering_degrees / MAX_STEERING_ANGLE);
        if throttle > 0.0 {
            self.accelerate(throttle / MAX_FORWARD_SPEED);
        } else if throttle < 0.0 {
            self.reverse(-throttle / MAX_REVERSE_SPEED);
        } else {
            self.target_speed = 0.0;
        }
    }

    /// Turn the body in place by `degrees` (maneuver primitive)
    pub fn rotate(&mut self, degrees: f32) {
        self.heading = normalize_heading(self.heading + degrees);
    }

    /// Move `distance` along the current steering arc without integrating time.
    ///
    /// Negative distance backs up. The steering angle is applied immediately.
    pub fn creep(&mut self, steering_degrees: f32, distance: f32) {
        self.steering = steering_degrees.clamp(-MAX_STEERING_ANGLE, MAX_STEERING_ANGLE);
        self.pos += heading_vector(self.heading) * distance;
        if let Some(radius) = self.turning_radius() {
            let turn = (distance / radius).to_degrees() * self.steering.signum();
            self.heading = normalize_heading(self.heading + turn);
        }
    }

    // === Physical corrections ===

    /// Overwrite speed, clamped to the forward/reverse caps
    pub fn correct_speed(&mut self, speed: f32) {
        self.speed = speed.clamp(-MAX_REVERSE_SPEED, MAX_FORWARD_SPEED);
    }

    /// Perturb heading by `degrees`
    pub fn correct_heading(&mut self, degrees: f32) {
        self.heading = normalize_heading(self.heading + degrees);
    }

    pub fn correct_position(&mut self, pos: Vec2) {
        self.pos = pos;
    }

    // === Lifecycle ===

    /// Enter the terminal parked state
    pub fn park(&mut self) {
        self.parked = true;
        self.speed = 0.0;
        self.target_speed = 0.0;
        self.acceleration = 0.0;
        self.steering = 0.0;
        self.target_steering = 0.0;
        self.vel = Vec2::ZERO;
    }

    pub fn set_user_controlled(&mut self, user_controlled: bool) {
        self.user_controlled = user_controlled;
    }

    /// Place the vehicle with a heading (setup only)
    pub fn with_heading(mut self, heading: f32) -> Self {
        self.heading = normalize_heading(heading);
        self
    }

    // === Geometry ===

    #[inline]
    pub fn wheelbase(&self) -> f32 {
        self.length * WHEELBASE_RATIO
    }

    /// Turning radius for the current steering, `None` when driving straight
    pub fn turning_radius(&self) -> Option<f32> {
        if self.steering.abs() < MIN_TURN_STEERING {
            None
        } else {
            Some(self.wheelbase() / self.steering.abs().to_radians().sin())
        }
    }

    /// Footprint corners: front-right, front-left, rear-left, rear-right
    pub fn corner_points(&self) -> [Vec2; 4] {
        let fwd = heading_vector(self.heading) * (self.length / 2.0);
        let side = Vec2::new(-fwd.y, fwd.x).normalize_or_zero() * (self.width / 2.0);
        [
            self.pos + fwd + side,
            self.pos + fwd - side,
            self.pos - fwd - side,
            self.pos - fwd + side,
        ]
    }

    /// Axis-aligned bounds of the footprint as (min, max)
    pub fn bounding_box(&self) -> (Vec2, Vec2) {
        let corners = self.corner_points();
        corners[1..]
            .iter()
            .fold((corners[0], corners[0]), |(lo, hi), &c| (lo.min(c), hi.max(c)))
    }

    // === Accessors ===

    pub fn position(&self) -> Vec2 {
        self.pos
    }
    pub fn velocity(&self) -> Vec2 {
        self.vel
    }
    pub fn heading(&self) -> f32 {
        self.heading
    }
    pub fn speed(&self) -> f32 {
        self.speed
    }
    pub fn target_speed(&self) -> f32 {
        self.target_speed
    }
    pub fn acceleration(&self) -> f32 {
        self.acceleration
    }
    pub fn steering_angle(&self) -> f32 {
        self.steering
    }
    pub fn target_steering(&self) -> f32 {
        self.target_steering
    }
    pub fn length(&self) -> f32 {
        self.length
    }
    pub fn width(&self) -> f32 {
        self.width
    }
    pub fn is_user_controlled(&self) -> bool {
        self.user_controlled
    }
    pub fn is_parked(&self) -> bool {
        self.parked
    }
    pub fn is_reversing(&self) -> bool {
        self.reversing
    }
}

/// Reduce |value| by `amount`, flooring at zero
#[inline]
fn decay_toward_zero(value: f32, amount: f32) -> f32 {
    if value.abs() > amount {
        value - value.signum() * amount
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn car() -> Vehicle {
        Vehicle::new(1, Vec2::ZERO, 4.5, 1.8).unwrap()
    }

    #[test]
    fn test_rejects_bad_dimensions() {
        assert!(matches!(
            Vehicle::new(1, Vec2::ZERO, 0.0, 1.8),
            Err(SimError::NonPositiveDimensions { .. })
        ));
        assert!(matches!(
            Vehicle::new(1, Vec2::ZERO, 4.5, -1.0),
            Err(SimError::NonPositiveDimensions { .. })
        ));
        assert!(matches!(
            Vehicle::new(1, Vec2::new(f32::NAN, 0.0), 4.5, 1.8),
            Err(SimError::NonFinite(_))
        ));
    }

    #[test]
    fn test_full_throttle_three_seconds() {
        let mut v = car();
        v.accelerate(1.0);

        let expected_speed = [1.875, 2.460_937_5, 2.499_847_4];
        let mut last_speed = 0.0;
        for expected in expected_speed {
            v.update(1.0);
            assert!(v.speed() > last_speed, "speed should increase monotonically");
            assert!(v.speed() <= MAX_FORWARD_SPEED);
            assert!((v.speed() - expected).abs() < 1e-4, "got {}", v.speed());
            last_speed = v.speed();
        }

        // Straight line along +x
        assert!((v.position().x - 6.835_785).abs() < 1e-3, "got {}", v.position().x);
        assert_eq!(v.position().y, 0.0);
        assert_eq!(v.heading(), 0.0);
    }

    #[test]
    fn test_reverse_is_capped() {
        let mut v = car();
        v.reverse(1.0);
        for _ in 0..600 {
            v.update(1.0 / 60.0);
        }
        assert!(v.speed() < 0.0);
        assert!(v.speed() >= -MAX_REVERSE_SPEED);
        assert!(v.is_reversing());
        assert!(v.position().x < 0.0);
    }

    #[test]
    fn test_friction_stops_coasting_vehicle() {
        let mut v = car();
        v.correct_speed(1.0);
        for _ in 0..120 {
            v.update(1.0 / 60.0);
        }
        assert_eq!(v.speed(), 0.0);
        assert_eq!(v.velocity(), Vec2::ZERO);
    }

    #[test]
    fn test_steering_eases_without_overshoot() {
        let mut v = car();
        v.steer(1.0);
        v.update(0.1);
        assert!((v.steering_angle() - 8.0).abs() < 1e-4);
        v.update(1.0);
        assert_eq!(v.steering_angle(), MAX_STEERING_ANGLE);
        v.center_steering();
        v.update(1.0);
        assert_eq!(v.steering_angle(), 0.0);
    }

    #[test]
    fn test_steering_turns_heading() {
        let mut v = car();
        v.accelerate(1.0);
        v.steer(1.0);
        for _ in 0..60 {
            v.update(1.0 / 60.0);
        }
        // Positive steering turns toward +y
        assert!(v.heading() > 0.0 && v.heading() < 180.0, "heading {}", v.heading());
        assert!(v.position().y > 0.0);
    }

    #[test]
    fn test_brake_preserves_sign() {
        let mut v = car();
        v.correct_speed(4.0);
        v.brake(0.5);
        assert_eq!(v.target_speed(), 1.0);
        v.brake(1.0);
        assert_eq!(v.target_speed(), 0.0);

        v.correct_speed(-1.5);
        v.brake(0.1);
        assert!((v.target_speed() - (-0.9)).abs() < 1e-5);
    }

    #[test]
    fn test_handbrake_skids() {
        let mut v = car();
        v.accelerate(1.0);
        v.correct_speed(4.0);
        v.handbrake();
        assert!((v.speed() - 2.8).abs() < 1e-5);
        assert_eq!(v.target_speed(), 0.0);
    }

    #[test]
    fn test_drive_composes_controls() {
        let mut v = car();
        v.drive(17.5, 2.5);
        assert_eq!(v.target_steering(), 17.5);
        assert_eq!(v.target_speed(), 2.5);
        assert!(!v.is_reversing());

        v.drive(-35.0, -1.0);
        assert_eq!(v.target_steering(), -35.0);
        assert_eq!(v.target_speed(), -1.0);
        assert!(v.is_reversing());

        v.drive(0.0, 0.0);
        assert_eq!(v.target_speed(), 0.0);
    }

    #[test]
    fn test_parked_vehicle_is_frozen() {
        let mut v = car();
        v.accelerate(1.0);
        v.steer(0.5);
        v.update(0.5);
        v.park();
        let pos = v.position();

        v.accelerate(1.0);
        v.steer(1.0);
        for _ in 0..10 {
            v.update(0.1);
            assert_eq!(v.speed(), 0.0);
            assert_eq!(v.acceleration(), 0.0);
            assert_eq!(v.steering_angle(), 0.0);
            assert_eq!(v.position(), pos);
        }
    }

    #[test]
    fn test_rotate_normalizes() {
        let mut v = car();
        v.rotate(-30.0);
        assert!((v.heading() - 330.0).abs() < 1e-4);
        v.rotate(400.0);
        assert!((v.heading() - 10.0).abs() < 1e-3);
    }

    #[test]
    fn test_creep_straight_and_arc() {
        let mut v = car();
        v.creep(0.0, 1.0);
        assert!((v.position().x - 1.0).abs() < 1e-6);
        assert_eq!(v.heading(), 0.0);

        v.creep(30.0, 1.0);
        // radius = 2.7 / sin(30°) = 5.4, turn = 1/5.4 rad
        let expected = (1.0_f32 / 5.4).to_degrees();
        assert!((v.heading() - expected).abs() < 1e-3);

        // Backing up with positive steering turns the other way
        let mut r = car();
        r.creep(30.0, -1.0);
        assert!((r.heading() - (360.0 - expected)).abs() < 1e-3);
        assert!(r.position().x < 0.0);
    }

    #[test]
    fn test_turning_radius() {
        let mut v = car();
        assert_eq!(v.turning_radius(), None);
        v.creep(30.0, 0.0);
        assert!((v.turning_radius().unwrap() - 5.4).abs() < 1e-4);
    }

    #[test]
    fn test_corner_points() {
        let v = car().with_heading(90.0);
        let [fr, fl, rl, rr] = v.corner_points();
        // Facing +y: front corners at y = +2.25
        assert!((fr.y - 2.25).abs() < 1e-4 && (fl.y - 2.25).abs() < 1e-4);
        assert!((rl.y + 2.25).abs() < 1e-4 && (rr.y + 2.25).abs() < 1e-4);
        assert!((fr.x + 0.9).abs() < 1e-4);
        assert!((fl.x - 0.9).abs() < 1e-4);

        let (lo, hi) = v.bounding_box();
        assert!((hi.x - lo.x - 1.8).abs() < 1e-4);
        assert!((hi.y - lo.y - 4.5).abs() < 1e-4);
    }

    #[test]
    fn test_correct_speed_respects_caps() {
        let mut v = car();
        v.correct_speed(9.0);
        assert_eq!(v.speed(), MAX_FORWARD_SPEED);
        v.correct_speed(-9.0);
        assert_eq!(v.speed(), -MAX_REVERSE_SPEED);
    }

    #[derive(Debug, Clone)]
    enum Control {
        Accelerate(f32),
        Reverse(f32),
        Brake(f32),
        Handbrake,
        Steer(f32),
        Center,
        Drive(f32, f32),
        Rotate(f32),
        Bump(f32),
    }

    fn control() -> impl Strategy<Value = Control> {
        prop_oneof![
            (0.0f32..=1.0).prop_map(Control::Accelerate),
            (0.0f32..=1.0).prop_map(Control::Reverse),
            (0.0f32..=1.0).prop_map(Control::Brake),
            Just(Control::Handbrake),
            (-1.0f32..=1.0).prop_map(Control::Steer),
            Just(Control::Center),
            (-35.0f32..=35.0, -5.0f32..=5.0).prop_map(|(s, t)| Control::Drive(s, t)),
            (-720.0f32..=720.0).prop_map(Control::Rotate),
            (-10.0f32..=10.0).prop_map(Control::Bump),
        ]
    }

    proptest! {
        #[test]
        fn prop_kinematic_invariants(
            steps in prop::collection::vec((control(), 0.0f32..=0.5), 1..200)
        ) {
            let mut v = car();
            for (c, dt) in steps {
                match c {
                    Control::Accelerate(a) => v.accelerate(a),
                    Control::Reverse(a) => v.reverse(a),
                    Control::Brake(a) => v.brake(a),
                    Control::Handbrake => v.handbrake(),
                    Control::Steer(a) => v.steer(a),
                    Control::Center => v.center_steering(),
                    Control::Drive(s, t) => v.drive(s, t),
                    Control::Rotate(d) => v.rotate(d),
                    Control::Bump(s) => v.correct_speed(s),
                }
                v.update(dt);

                prop_assert!(v.speed() <= MAX_FORWARD_SPEED);
                prop_assert!(v.speed() >= -MAX_REVERSE_SPEED);
                prop_assert!(v.steering_angle().abs() <= MAX_STEERING_ANGLE);
                prop_assert!((0.0..360.0).contains(&v.heading()));
                prop_assert!(v.position().is_finite());
            }
        }
    }
}

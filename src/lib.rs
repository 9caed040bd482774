//! Park Sim - vehicles maneuvering and self-parking inside a lot
//!
//! Core modules:
//! - `sim`: Deterministic simulation (kinematics, maneuvers, collisions, tick loop)
//! - `config`: Data-driven simulation tuning (JSON)
//! - `scenario`: Lot/vehicle setup records supplied by the host
//! - `error`: Construction and loading errors

pub mod config;
pub mod error;
pub mod scenario;
pub mod sim;

pub use config::SimConfig;
pub use error::{SimError, SimResult};
pub use scenario::Scenario;

use glam::Vec2;

/// Simulation constants
pub mod consts {
    /// Fixed simulation timestep (60 Hz)
    pub const SIM_DT: f32 = 1.0 / 60.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;
    /// Longest frame the driver will try to catch up on
    pub const MAX_FRAME_DT: f32 = 0.1;

    /// Speed caps (m/s, ~18 km/h forward)
    pub const MAX_FORWARD_SPEED: f32 = 5.0;
    pub const MAX_REVERSE_SPEED: f32 = 2.0;
    /// Throttle acceleration (m/s²)
    pub const MAX_ACCELERATION: f32 = 2.5;
    /// Braking authority (m/s per unit brake input)
    pub const MAX_DECELERATION: f32 = 6.0;

    /// Steering limits (degrees, degrees/s)
    pub const MAX_STEERING_ANGLE: f32 = 35.0;
    pub const STEERING_RESPONSE: f32 = 80.0;

    /// Wheelbase as a fraction of body length
    pub const WHEELBASE_RATIO: f32 = 0.6;

    /// Rolling friction (m/s²) applied while cruising
    pub const ROLLING_FRICTION: f32 = 0.8;
    /// Quadratic air drag coefficient
    pub const AIR_DRAG: f32 = 0.1;
    /// Speed error under which the vehicle is considered at target speed
    pub const SPEED_TOLERANCE: f32 = 0.1;
    /// Below this speed the vehicle does not move
    pub const MIN_MOVING_SPEED: f32 = 0.01;
    /// Steering angle under which the vehicle drives straight (degrees)
    pub const MIN_TURN_STEERING: f32 = 0.1;
    /// Speed under which steering has no effect on heading
    pub const MIN_TURN_SPEED: f32 = 0.1;
    /// Fraction of speed kept when the handbrake is pulled
    pub const HANDBRAKE_RETENTION: f32 = 0.7;
}

/// Normalize a heading to [0, 360) degrees
#[inline]
pub fn normalize_heading(degrees: f32) -> f32 {
    let heading = degrees.rem_euclid(360.0);
    // rem_euclid rounds tiny negatives up to exactly 360
    if heading >= 360.0 { 0.0 } else { heading }
}

/// Signed heading difference wrapped to [-180, 180) degrees
#[inline]
pub fn heading_delta(degrees: f32) -> f32 {
    (degrees + 180.0).rem_euclid(360.0) - 180.0
}

/// Unit vector pointing along a heading given in degrees
#[inline]
pub fn heading_vector(degrees: f32) -> Vec2 {
    let rad = degrees.to_radians();
    Vec2::new(rad.cos(), rad.sin())
}

/// Bearing from `from` to `to` in degrees, [0, 360)
#[inline]
pub fn bearing(from: Vec2, to: Vec2) -> f32 {
    let d = to - from;
    normalize_heading(d.y.atan2(d.x).to_degrees())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_heading() {
        assert_eq!(normalize_heading(0.0), 0.0);
        assert_eq!(normalize_heading(360.0), 0.0);
        assert!((normalize_heading(-90.0) - 270.0).abs() < 1e-4);
        assert!((normalize_heading(725.0) - 5.0).abs() < 1e-3);
        let tiny = normalize_heading(-1e-9);
        assert!((0.0..360.0).contains(&tiny));
    }

    #[test]
    fn test_heading_delta_wraps() {
        assert!((heading_delta(350.0) - (-10.0)).abs() < 1e-4);
        assert!((heading_delta(-350.0) - 10.0).abs() < 1e-4);
        assert!((heading_delta(45.0) - 45.0).abs() < 1e-4);
    }

    #[test]
    fn test_bearing() {
        assert!(bearing(Vec2::ZERO, Vec2::new(1.0, 0.0)).abs() < 1e-4);
        assert!((bearing(Vec2::ZERO, Vec2::new(0.0, 1.0)) - 90.0).abs() < 1e-4);
        assert!((bearing(Vec2::ZERO, Vec2::new(0.0, -1.0)) - 270.0).abs() < 1e-4);
    }
}

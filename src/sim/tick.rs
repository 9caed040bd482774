//! Fixed-timestep simulation tick
//!
//! One tick integrates every vehicle, lets AI vehicles decide on their own
//! slower cadence, keeps everyone inside the world and, on a separate
//! cadence, resolves collisions.
//!
//! An AI vehicle heading for a space first drives onto that space's lane, a
//! run-up line ending at the maneuver's approach pose. Once it is on the lane
//! and close enough, the whole maneuver runs to completion inside the tick
//! that started it.

use glam::Vec2;
use rand::Rng;

use super::collision::{Contact, FootprintCheck, resolve_collisions};
use super::maneuver::{approach_pose, find_optimal_space, park_vehicle};
use super::space::ParkingSpace;
use super::state::{SimEvent, SimState};
use super::vehicle::Vehicle;
use crate::consts::*;
use crate::{bearing, heading_delta, heading_vector};

/// Speed kept (and inverted) when a vehicle hits the world edge
pub const BOUNDARY_BOUNCE: f32 = 0.5;

/// Lane run-up before the approach pose, in vehicle lengths
pub const RUNUP_LENGTHS: f32 = 3.0;
/// Largest sideways distance from the lane that still counts as lined up
pub const LINE_UP_OFFSET: f32 = 2.0;
/// Largest heading error against the lane that still counts as lined up (degrees)
pub const LINE_UP_HEADING: f32 = 30.0;
/// How far ahead along the lane `navigate_to` aims
pub const NAV_LOOKAHEAD: f32 = 12.0;

/// Driver input for the user-controlled vehicle, applied at the start of a tick
#[derive(Debug, Clone, Default)]
pub struct ControlInput {
    /// Forward throttle fraction, [0, 1]
    pub accelerate: f32,
    /// Reverse throttle fraction, [0, 1]; ignored while accelerating
    pub reverse: f32,
    /// Brake fraction, [0, 1]
    pub brake: f32,
    /// Steering fraction, [-1, 1]
    pub steer: Option<f32>,
    pub center_steering: bool,
    pub handbrake: bool,
}

impl ControlInput {
    fn apply(&self, vehicle: &mut Vehicle) {
        if self.accelerate > 0.0 {
            vehicle.accelerate(self.accelerate);
        } else if self.reverse > 0.0 {
            vehicle.reverse(self.reverse);
        }
        if self.brake > 0.0 {
            vehicle.brake(self.brake);
        }
        match self.steer {
            Some(amount) => vehicle.steer(amount),
            None if self.center_steering => vehicle.center_steering(),
            None => {}
        }
        if self.handbrake {
            vehicle.handbrake();
        }
    }
}

/// Advance the simulation by one fixed timestep
pub fn tick(state: &mut SimState, input: &ControlInput, dt: f32) {
    state.sync_timers();

    if let Some(index) = state.user_vehicle_index() {
        let vehicle = &mut state.vehicles[index];
        if !vehicle.is_parked() {
            input.apply(vehicle);
        }
    }

    for index in 0..state.vehicles.len() {
        state.vehicles[index].update(dt);

        let vehicle = &state.vehicles[index];
        if !vehicle.is_user_controlled() && !vehicle.is_parked() {
            state.ai_timers[index] += dt;
            if state.ai_timers[index] >= state.config.ai_decision_interval {
                state.ai_timers[index] = 0.0;
                decide(state, index);
            }
        }

        enforce_world_bounds(state, index);
    }

    state.collision_timer += dt;
    if state.collision_timer >= state.config.collision_check_interval {
        state.collision_timer = 0.0;
        let contacts = resolve_collisions(&mut state.vehicles, &state.catalog, &mut state.rng);
        state.record(contacts.into_iter().map(|contact| match contact {
            Contact::Vehicles { a, b, .. } => SimEvent::VehicleCollision { a, b },
            Contact::Obstacle { vehicle, space } => SimEvent::ObstacleCollision { vehicle, space },
        }));
    }

    state.time_ticks += 1;
    state.elapsed += dt as f64;
}

/// Run as many fixed ticks as `frame_dt` of wall-clock time covers.
///
/// Frame time is clamped and at most `MAX_SUBSTEPS` ticks run per call;
/// leftover time carries over. A non-finite `frame_dt` adds nothing. One-shot
/// inputs only apply to the first tick.
pub fn advance(state: &mut SimState, input: &ControlInput, frame_dt: f32) -> u32 {
    if frame_dt.is_finite() {
        state.accumulator += frame_dt.clamp(0.0, MAX_FRAME_DT);
    } else {
        log::warn!("Ignoring non-finite frame time {frame_dt}");
    }

    let mut input = input.clone();
    let mut substeps = 0;
    while state.accumulator >= SIM_DT && substeps < MAX_SUBSTEPS {
        tick(state, &input, SIM_DT);
        state.accumulator -= SIM_DT;
        substeps += 1;

        input.handbrake = false;
        input.center_steering = false;
    }
    substeps
}

/// One AI decision: try to park, otherwise wander
fn decide(state: &mut SimState, index: usize) {
    let rate = f64::from(state.config.parking_attempt_rate);
    if state.rng.random_bool(rate) {
        attempt_parking(state, index);
    } else {
        wander(state, index);
    }
}

fn attempt_parking(state: &mut SimState, index: usize) {
    let Some(space_index) = find_optimal_space(&state.vehicles[index], &state.catalog) else {
        wander(state, index);
        return;
    };
    let Some(space) = state.catalog.get(space_index) else {
        return;
    };

    let vehicle = &state.vehicles[index];
    let lane = Lane::toward(vehicle, space);
    if !lane.is_lined_up(vehicle, state.config.parking_range) {
        let target = lane.next_waypoint(vehicle, state.config.parking_range);
        navigate_to(&mut state.vehicles[index], target);
        return;
    }

    let space_id = space.id().to_string();
    let check = FootprintCheck::around(index, &state.vehicles, &state.catalog);
    let vehicle = &mut state.vehicles[index];
    let event = if park_vehicle(vehicle, &mut state.catalog, Some(space_index), &check) {
        vehicle.park();
        SimEvent::Parked {
            vehicle: vehicle.id,
            space: space_id,
        }
    } else {
        SimEvent::ManeuverFailed {
            vehicle: vehicle.id,
            space: space_id,
        }
    };
    state.record([event]);
}

/// Straight run-up ending at a space's approach pose
#[derive(Debug, Clone, Copy)]
struct Lane {
    start: Vec2,
    heading: f32,
    /// Where the run-up begins, as a (negative) distance along the lane
    entry: f32,
}

impl Lane {
    fn toward(vehicle: &Vehicle, space: &ParkingSpace) -> Self {
        let (start, heading) = approach_pose(vehicle, space);
        Self {
            start,
            heading,
            entry: -RUNUP_LENGTHS * vehicle.length(),
        }
    }

    /// Distance along the lane and signed sideways offset from it
    fn locate(&self, point: Vec2) -> (f32, f32) {
        let dir = heading_vector(self.heading);
        let rel = point - self.start;
        (rel.dot(dir), dir.perp_dot(rel))
    }

    fn is_lined_up(&self, vehicle: &Vehicle, range: f32) -> bool {
        let (along, offset) = self.locate(vehicle.position());
        (self.entry - range..=self.entry).contains(&along)
            && offset.abs() <= LINE_UP_OFFSET
            && heading_delta(vehicle.heading() - self.heading).abs() <= LINE_UP_HEADING
    }

    /// Point on the lane to steer for. A vehicle already past the run-up is
    /// sent back behind it to come around again.
    fn next_waypoint(&self, vehicle: &Vehicle, range: f32) -> Vec2 {
        let dir = heading_vector(self.heading);
        let (along, _) = self.locate(vehicle.position());
        let distance = if along > self.entry {
            self.entry - range
        } else {
            (along + NAV_LOOKAHEAD).min(self.entry)
        };
        self.start + dir * distance
    }
}

/// Where a vehicle should line up before maneuvering into `space`
pub fn approach_point(vehicle: &Vehicle, space: &ParkingSpace) -> Vec2 {
    approach_pose(vehicle, space).0
}

/// Coarse proportional steering and throttle toward `target`
pub fn navigate_to(vehicle: &mut Vehicle, target: Vec2) {
    let distance = vehicle.position().distance(target);
    let error = heading_delta(bearing(vehicle.position(), target) - vehicle.heading());

    if error.abs() > 30.0 {
        vehicle.steer(error.signum() * 0.8);
    } else if error.abs() > 10.0 {
        vehicle.steer(error.signum() * 0.5);
    } else {
        vehicle.center_steering();
    }

    if distance > 20.0 {
        vehicle.accelerate(0.8);
    } else if distance > 10.0 {
        vehicle.accelerate(0.5);
    } else {
        vehicle.brake(0.3);
    }
}

/// Random nudges to steering and throttle
fn wander(state: &mut SimState, index: usize) {
    let steer_chance = f64::from(state.config.wander_steer_chance);
    let throttle_chance = f64::from(state.config.wander_throttle_chance);
    let rng = &mut state.rng;
    let vehicle = &mut state.vehicles[index];

    if rng.random_bool(steer_chance) {
        vehicle.steer(rng.random_range(-1.0..=1.0));
    }
    if rng.random_bool(throttle_chance) {
        if rng.random_bool(0.5) {
            vehicle.accelerate(rng.random_range(0.3..0.8));
        } else {
            vehicle.brake(rng.random_range(0.0..0.5));
        }
    }
}

/// Clamp into the world and bounce once if any axis was clamped
fn enforce_world_bounds(state: &mut SimState, index: usize) {
    let margin = state.config.boundary_margin;
    let min = Vec2::splat(margin);
    let max = Vec2::new(
        state.config.world_width - margin,
        state.config.world_height - margin,
    );

    let vehicle = &mut state.vehicles[index];
    let pos = vehicle.position();
    let clamped = pos.clamp(min, max);
    if clamped != pos {
        vehicle.correct_position(clamped);
        vehicle.correct_speed(-vehicle.speed() * BOUNDARY_BOUNCE);
        let event = SimEvent::BoundaryBounce {
            vehicle: vehicle.id,
        };
        state.record([event]);
    }
}

//! Parking maneuver planner
//!
//! Chooses a space for a vehicle and drives it in through a fixed
//! procedure per space kind. Every procedure is a chain of closed-loop
//! sub-maneuvers that run synchronously to completion or failure. A failed
//! sub-maneuver aborts the whole procedure: the space stays free and the
//! vehicle keeps whatever pose the last partial step left it in.
//!
//! All procedures share one shape. The vehicle follows a straight approach
//! lane onto the approach pose, squares up to the lane heading, runs the
//! kind's entry moves and finishes with a short centering leg. The per-kind
//! numbers live in one table, [`SpaceKind::maneuver_profile`].
//!
//! Sub-steps advance the pose with [`Vehicle::creep`] and record the driver
//! intent with [`Vehicle::drive`]; a [`CollisionCheck`] is consulted after
//! every sub-step.

use glam::Vec2;

use super::collision::{CollisionCheck, NoCollisions};
use super::space::{ParkingSpace, SpaceCatalog, SpaceKind};
use super::vehicle::Vehicle;
use crate::{bearing, heading_delta, heading_vector};

/// Clearance added around a vehicle when sizing a space
pub const SAFE_DISTANCE: f32 = 0.5;
/// Default position tolerance when centering in a space
pub const PARKING_PRECISION: f32 = 0.1;
/// Position tolerance for approach legs
pub const APPROACH_PRECISION: f32 = 0.3;

/// Heading tolerance for `move_vehicle_to` arrival (degrees)
pub const HEADING_TOLERANCE: f32 = 5.0;
pub const MAX_MOVE_STEPS: usize = 100;
/// Path length of one `move_vehicle_to` sub-step when far from the target
pub const MOVE_STEP: f32 = 0.05;
/// Sub-step scale within `CLOSE_RANGE` of the target
pub const CLOSE_STEP_FACTOR: f32 = 0.3;
pub const CLOSE_RANGE: f32 = 1.0;
/// Steering per degree of bearing error
pub const BEARING_GAIN: f32 = 0.5;
pub const MAX_APPROACH_STEER: f32 = 30.0;

pub const MAX_ROTATE_STEPS: usize = 50;
/// Largest in-place rotation per iteration (degrees)
pub const MAX_ROTATE_STEP: f32 = 2.0;
pub const ROTATE_GAIN: f32 = 0.3;

/// Path length of one lane-following sub-step
pub const LANE_STEP: f32 = 0.1;
/// Distance ahead along the lane the follower steers at
pub const LANE_LOOKAHEAD: f32 = 3.0;
/// Steering per degree of error toward the lookahead point
pub const LANE_GAIN: f32 = 2.0;
/// Straight run left between the end of the entry moves and the center.
/// `move_vehicle_to` covers about 3 units at centering precision.
pub const CENTER_RUN: f32 = 1.5;
/// Steering lock for the parallel S-curve (degrees)
pub const PARALLEL_STEER: f32 = 30.0;
pub const STRAIGHTEN_STEP: f32 = 0.05;

/// Part of a procedure that can abort
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Approach,
    Rotate,
    Reverse,
    CounterSteer,
    Straighten,
    Entry,
    Center,
}

/// Why a sub-maneuver gave up
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AbortCause {
    #[error("collision")]
    Collision,
    #[error("out of steps")]
    StepsExhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{phase:?} phase aborted: {cause}")]
pub struct ManeuverAbort {
    pub phase: Phase,
    pub cause: AbortCause,
}

fn during(phase: Phase) -> impl Fn(AbortCause) -> ManeuverAbort {
    move |cause| ManeuverAbort { phase, cause }
}

/// Entry moves run between squaring up on the approach pose and centering
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Procedure {
    /// Drive past the space on the lane beside it, reverse in on an S-curve
    /// (`reverse` then `counter_steer`, as fractions of the space length),
    /// straighten and pull forward
    Parallel {
        reverse: f32,
        counter_steer: f32,
        step: f32,
    },
    /// Drive straight in for `entry` of the space depth
    Perpendicular { entry: f32, step: f32 },
    /// Same as `Perpendicular`, on the diagonal
    Angle { entry: f32, step: f32 },
    /// Same as `Perpendicular` with shorter steps and a tighter approach
    Compact { entry: f32, step: f32 },
    /// The approach lane ends right in front of the center (Regular, Disabled)
    Standard,
}

/// Space size a vehicle needs: `dimension * scale + margin` on each axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Clearance {
    /// The vehicle sits across the space: its length lies along the width
    pub across: bool,
    pub scale: f32,
    pub width_margin: f32,
    pub length_margin: f32,
}

impl Clearance {
    const fn scaled(scale: f32) -> Self {
        Self {
            across: false,
            scale,
            width_margin: 0.0,
            length_margin: 0.0,
        }
    }

    /// Minimum (width, length) of the space
    pub fn required(&self, vehicle: &Vehicle) -> (f32, f32) {
        let (along_width, along_length) = if self.across {
            (vehicle.length(), vehicle.width())
        } else {
            (vehicle.width(), vehicle.length())
        };
        (
            along_width * self.scale + self.width_margin,
            along_length * self.scale + self.length_margin,
        )
    }
}

/// Everything the planner and the procedures need to know about a kind
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ManeuverProfile {
    /// Relative difficulty, 0 = easy
    pub difficulty: f32,
    pub clearance: Clearance,
    pub procedure: Procedure,
    /// Heading of the parked vehicle (degrees)
    pub heading: f32,
    pub approach_precision: f32,
    pub center_precision: f32,
}

impl SpaceKind {
    pub fn maneuver_profile(&self) -> ManeuverProfile {
        let standard = ManeuverProfile {
            difficulty: 0.5,
            clearance: Clearance::scaled(1.2),
            procedure: Procedure::Standard,
            heading: 0.0,
            approach_precision: APPROACH_PRECISION,
            center_precision: APPROACH_PRECISION,
        };
        match self {
            SpaceKind::Parallel => ManeuverProfile {
                difficulty: 0.8,
                clearance: Clearance {
                    across: false,
                    scale: 1.0,
                    width_margin: SAFE_DISTANCE * 1.5,
                    length_margin: SAFE_DISTANCE * 3.0,
                },
                procedure: Procedure::Parallel {
                    reverse: 0.6,
                    counter_steer: 0.4,
                    step: 0.15,
                },
                center_precision: PARKING_PRECISION,
                ..standard
            },
            SpaceKind::Perpendicular => ManeuverProfile {
                difficulty: 0.2,
                clearance: Clearance {
                    across: true,
                    scale: 1.0,
                    width_margin: SAFE_DISTANCE,
                    length_margin: SAFE_DISTANCE * 1.2,
                },
                procedure: Procedure::Perpendicular {
                    entry: 0.8,
                    step: 0.2,
                },
                heading: 90.0,
                center_precision: PARKING_PRECISION,
                ..standard
            },
            SpaceKind::Angle => ManeuverProfile {
                difficulty: 0.4,
                clearance: Clearance::scaled(1.4),
                procedure: Procedure::Angle {
                    entry: 0.9,
                    step: 0.2,
                },
                heading: 45.0,
                center_precision: PARKING_PRECISION,
                ..standard
            },
            SpaceKind::Compact => ManeuverProfile {
                difficulty: 0.3,
                clearance: Clearance::scaled(1.1),
                procedure: Procedure::Compact {
                    entry: 0.7,
                    step: 0.1,
                },
                approach_precision: 0.2,
                center_precision: 0.05,
                ..standard
            },
            SpaceKind::Disabled => ManeuverProfile {
                difficulty: 0.1,
                clearance: Clearance::scaled(1.3),
                ..standard
            },
            SpaceKind::Regular | SpaceKind::Obstacle => standard,
        }
    }
}

pub fn is_suitable(vehicle: &Vehicle, space: &ParkingSpace) -> bool {
    let (width, length) = space.kind().maneuver_profile().clearance.required(vehicle);
    space.width() >= width && space.length() >= length
}

/// Ranking score, lower is better
fn score(vehicle: &Vehicle, space: &ParkingSpace) -> f32 {
    let difficulty = space.kind().maneuver_profile().difficulty;
    vehicle.position().distance(space.location()) * (1.0 + difficulty * 0.3)
}

/// Index of the best free space for `vehicle`.
///
/// Falls back to the first free space the vehicle physically fits in when no
/// space meets its kind's clearance rules.
pub fn find_optimal_space(vehicle: &Vehicle, catalog: &SpaceCatalog) -> Option<usize> {
    let best = catalog
        .unoccupied()
        .filter(|(_, space)| space.kind().is_parkable() && is_suitable(vehicle, space))
        .min_by(|(_, a), (_, b)| score(vehicle, a).total_cmp(&score(vehicle, b)))
        .map(|(index, _)| index);

    best.or_else(|| {
        catalog
            .unoccupied()
            .find(|(_, space)| {
                space.kind().is_parkable()
                    && space.width() >= vehicle.width()
                    && space.length() >= vehicle.length()
            })
            .map(|(index, _)| index)
    })
}

/// Run the full procedure for the space at `index`.
///
/// Returns true and marks the space occupied on success. A missing,
/// occupied or non-parkable space fails without moving the vehicle.
pub fn park_vehicle(
    vehicle: &mut Vehicle,
    catalog: &mut SpaceCatalog,
    index: Option<usize>,
    check: &impl CollisionCheck,
) -> bool {
    let Some(index) = index else {
        return false;
    };
    let Some(space) = catalog.get(index) else {
        return false;
    };
    if space.is_occupied() || !space.kind().is_parkable() {
        log::debug!(
            "Vehicle {} cannot park in {}: not available",
            vehicle.id,
            space.id()
        );
        return false;
    }

    log::debug!(
        "Vehicle {} starting {} maneuver for {} at ({:.2}, {:.2})",
        vehicle.id,
        space.kind(),
        space.id(),
        space.location().x,
        space.location().y
    );

    match execute_procedure(vehicle, space, check) {
        Ok(()) => {
            log::info!("Vehicle {} parked in {}", vehicle.id, space.id());
            catalog.mark_occupied(index);
            true
        }
        Err(abort) => {
            log::debug!("Vehicle {} failed to park in {}: {}", vehicle.id, space.id(), abort);
            false
        }
    }
}

/// Approach, square up, entry moves for the kind, then center
pub fn execute_procedure(
    vehicle: &mut Vehicle,
    space: &ParkingSpace,
    check: &impl CollisionCheck,
) -> Result<(), ManeuverAbort> {
    let profile = space.kind().maneuver_profile();
    let (start, heading) = approach_pose(vehicle, space);

    follow_lane(vehicle, start, heading, check).map_err(during(Phase::Approach))?;
    move_vehicle_to(vehicle, start, heading, profile.approach_precision, check)
        .map_err(during(Phase::Approach))?;
    rotate_vehicle(vehicle, heading, PARKING_PRECISION, check).map_err(during(Phase::Rotate))?;

    match profile.procedure {
        Procedure::Parallel {
            reverse,
            counter_steer,
            step,
        } => reverse_in(vehicle, space, heading, (reverse, counter_steer, step), check)?,
        Procedure::Perpendicular { entry, step }
        | Procedure::Angle { entry, step }
        | Procedure::Compact { entry, step } => {
            let depth = entry_depth(&profile, space);
            drive_with_steering(vehicle, 0.0, depth * entry, step, check)
                .map_err(during(Phase::Entry))?;
        }
        Procedure::Standard => {}
    }

    center_in_space(vehicle, space, profile.center_precision, check).map_err(during(Phase::Center))
}

/// Extent of the space along the parked heading
fn entry_depth(profile: &ManeuverProfile, space: &ParkingSpace) -> f32 {
    if profile.clearance.across {
        space.width()
    } else {
        space.length()
    }
}

/// S-curve back into a parallel space, finishing on `heading`
fn reverse_in(
    vehicle: &mut Vehicle,
    space: &ParkingSpace,
    heading: f32,
    (reverse, counter_steer, step): (f32, f32, f32),
    check: &impl CollisionCheck,
) -> Result<(), ManeuverAbort> {
    reverse_with_steering(vehicle, -PARALLEL_STEER, space.length() * reverse, step, check)
        .map_err(during(Phase::Reverse))?;
    reverse_with_steering(vehicle, PARALLEL_STEER, space.length() * counter_steer, step, check)
        .map_err(during(Phase::CounterSteer))?;
    straighten(vehicle, heading, check).map_err(during(Phase::Straighten))
}

/// Start of the entry moves for `space` and the heading to arrive with.
///
/// The approach lane is the line through this point along the heading;
/// vehicles line up on it from behind.
pub fn approach_pose(vehicle: &Vehicle, space: &ParkingSpace) -> (Vec2, f32) {
    let profile = space.kind().maneuver_profile();
    let heading = profile.heading;
    let dir = heading_vector(heading);
    let center = space.center();

    let start = match profile.procedure {
        Procedure::Parallel {
            reverse,
            counter_steer,
            step,
        } => {
            // Replay the S-curve from the origin to learn where it ends
            let mut ghost = vehicle.clone().with_heading(heading);
            ghost.correct_position(Vec2::ZERO);
            let sweep = match reverse_in(
                &mut ghost,
                space,
                heading,
                (reverse, counter_steer, step),
                &NoCollisions,
            ) {
                Ok(()) => ghost.position(),
                Err(_) => Vec2::ZERO,
            };
            center - sweep - dir * CENTER_RUN
        }
        Procedure::Perpendicular { entry, .. }
        | Procedure::Angle { entry, .. }
        | Procedure::Compact { entry, .. } => {
            center - dir * (entry * entry_depth(&profile, space) + CENTER_RUN)
        }
        Procedure::Standard => center - dir * CENTER_RUN,
    };
    (start, heading)
}

fn arrived(vehicle: &Vehicle, target: Vec2, heading: f32, precision: f32) -> bool {
    vehicle.position().distance(target) < precision
        && heading_delta(vehicle.heading() - heading).abs() < HEADING_TOLERANCE
}

/// Pure-pursuit drive onto the lane through `start` along `heading`,
/// stopping once level with `start`.
///
/// The step budget is twice the straight-line distance plus slack, so a
/// vehicle that cannot converge gives up instead of circling.
pub fn follow_lane(
    vehicle: &mut Vehicle,
    start: Vec2,
    heading: f32,
    check: &impl CollisionCheck,
) -> Result<(), AbortCause> {
    let dir = heading_vector(heading);
    let budget = (vehicle.position().distance(start) * 2.0 / LANE_STEP) as usize + MAX_MOVE_STEPS;

    for _ in 0..budget {
        let along = (vehicle.position() - start).dot(dir);
        if along >= 0.0 {
            return Ok(());
        }

        let lookahead = start + dir * (along + LANE_LOOKAHEAD);
        let error = heading_delta(bearing(vehicle.position(), lookahead) - vehicle.heading());
        let steer = (error * LANE_GAIN).clamp(-MAX_APPROACH_STEER, MAX_APPROACH_STEER);

        vehicle.drive(steer, LANE_STEP);
        vehicle.creep(steer, LANE_STEP);

        if check.is_blocked(vehicle) {
            return Err(AbortCause::Collision);
        }
    }
    Err(AbortCause::StepsExhausted)
}

/// Closed-loop drive toward `target`, arriving with `heading`.
///
/// Each sub-step steers in proportion to the bearing error and creeps
/// forward, slowing to a fraction of the step once close.
pub fn move_vehicle_to(
    vehicle: &mut Vehicle,
    target: Vec2,
    heading: f32,
    precision: f32,
    check: &impl CollisionCheck,
) -> Result<(), AbortCause> {
    for _ in 0..MAX_MOVE_STEPS {
        if arrived(vehicle, target, heading, precision) {
            return Ok(());
        }

        let distance = vehicle.position().distance(target);
        let error = heading_delta(bearing(vehicle.position(), target) - vehicle.heading());
        let steer = (error * BEARING_GAIN).clamp(-MAX_APPROACH_STEER, MAX_APPROACH_STEER);
        let step = if distance > CLOSE_RANGE {
            MOVE_STEP
        } else {
            MOVE_STEP * CLOSE_STEP_FACTOR
        };

        vehicle.drive(steer, step);
        vehicle.creep(steer, step);

        if check.is_blocked(vehicle) {
            return Err(AbortCause::Collision);
        }
    }

    if arrived(vehicle, target, heading, precision) {
        Ok(())
    } else {
        Err(AbortCause::StepsExhausted)
    }
}

/// Fixed number of constant-steering sub-steps of signed length `step`
fn creep_steps(
    vehicle: &mut Vehicle,
    steer: f32,
    distance: f32,
    step: f32,
    check: &impl CollisionCheck,
) -> Result<(), AbortCause> {
    let steps = (distance / step.abs()).floor().max(0.0) as usize;
    for _ in 0..steps {
        vehicle.drive(steer, step);
        vehicle.creep(steer, step);
        if check.is_blocked(vehicle) {
            return Err(AbortCause::Collision);
        }
    }
    Ok(())
}

pub fn reverse_with_steering(
    vehicle: &mut Vehicle,
    steer: f32,
    distance: f32,
    step: f32,
    check: &impl CollisionCheck,
) -> Result<(), AbortCause> {
    creep_steps(vehicle, steer, distance, -step.abs(), check)
}

pub fn drive_with_steering(
    vehicle: &mut Vehicle,
    steer: f32,
    distance: f32,
    step: f32,
    check: &impl CollisionCheck,
) -> Result<(), AbortCause> {
    creep_steps(vehicle, steer, distance, step.abs(), check)
}

/// Forward arc at full parallel lock until the heading matches `heading`
pub fn straighten(
    vehicle: &mut Vehicle,
    heading: f32,
    check: &impl CollisionCheck,
) -> Result<(), AbortCause> {
    let error = heading_delta(heading - vehicle.heading());
    let radius = vehicle.wheelbase() / PARALLEL_STEER.to_radians().sin();
    let steer = PARALLEL_STEER.copysign(error);
    drive_with_steering(vehicle, steer, error.abs().to_radians() * radius, STRAIGHTEN_STEP, check)
}

/// Turn in place toward `heading`
pub fn rotate_vehicle(
    vehicle: &mut Vehicle,
    heading: f32,
    precision: f32,
    check: &impl CollisionCheck,
) -> Result<(), AbortCause> {
    for _ in 0..MAX_ROTATE_STEPS {
        let error = heading_delta(heading - vehicle.heading());
        if error.abs() < precision {
            return Ok(());
        }
        vehicle.rotate((error * ROTATE_GAIN).clamp(-MAX_ROTATE_STEP, MAX_ROTATE_STEP));
        if check.is_blocked(vehicle) {
            return Err(AbortCause::Collision);
        }
    }
    Err(AbortCause::StepsExhausted)
}

/// Final resting pose: the space center at the kind's parked heading
pub fn center_target(space: &ParkingSpace) -> (Vec2, f32) {
    (space.center(), space.kind().maneuver_profile().heading)
}

pub fn center_in_space(
    vehicle: &mut Vehicle,
    space: &ParkingSpace,
    precision: f32,
    check: &impl CollisionCheck,
) -> Result<(), AbortCause> {
    let (target, heading) = center_target(space);
    move_vehicle_to(vehicle, target, heading, precision, check)
}

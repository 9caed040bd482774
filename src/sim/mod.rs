//! Deterministic simulation module
//!
//! All vehicle, parking and collision logic lives here. This module must be
//! pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (by vehicle id, catalog order for spaces)
//! - No rendering or platform dependencies

pub mod collision;
pub mod maneuver;
pub mod space;
pub mod state;
pub mod tick;
pub mod vehicle;

pub use collision::{
    Aabb, CollisionCheck, Contact, FootprintCheck, NoCollisions, polygon_overlaps_aabb,
    resolve_collisions,
};
pub use maneuver::{
    AbortCause, Clearance, ManeuverAbort, ManeuverProfile, Phase, Procedure, approach_pose,
    execute_procedure, find_optimal_space, is_suitable, park_vehicle,
};
pub use space::{ParkingSpace, SpaceCatalog, SpaceKind};
pub use state::{SimEvent, SimState, Snapshot, VehicleView};
pub use tick::{ControlInput, advance, tick};
pub use vehicle::Vehicle;

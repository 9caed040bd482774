//! Simulation state and snapshot types
//!
//! Everything a tick reads or writes lives in [`SimState`]. Vehicles are
//! kept in insertion order, which is also id order, and that order is the
//! iteration order of every pass.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::Serialize;

use super::space::{ParkingSpace, SpaceCatalog};
use super::vehicle::Vehicle;
use crate::config::SimConfig;
use crate::error::SimResult;

/// Events kept between drains; the oldest are dropped beyond this
pub const MAX_EVENTS: usize = 4096;

/// Something worth reporting that happened during a tick
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SimEvent {
    Parked { vehicle: u32, space: String },
    ManeuverFailed { vehicle: u32, space: String },
    VehicleCollision { a: u32, b: u32 },
    ObstacleCollision { vehicle: u32, space: String },
    BoundaryBounce { vehicle: u32 },
}

/// Complete simulation state (deterministic for a given seed and input)
#[derive(Debug, Clone)]
pub struct SimState {
    pub config: SimConfig,
    /// Sorted by id
    pub vehicles: Vec<Vehicle>,
    pub catalog: SpaceCatalog,
    /// Simulation tick counter
    pub time_ticks: u64,
    /// Simulated seconds
    pub elapsed: f64,
    /// Seconds since each vehicle's last AI decision, parallel to `vehicles`
    pub(crate) ai_timers: Vec<f32>,
    pub(crate) collision_timer: f32,
    /// Unsimulated frame time carried into the next `advance`
    pub(crate) accumulator: f32,
    /// Bounded by `MAX_EVENTS`; hosts that never drain only lose old entries
    pub(crate) events: Vec<SimEvent>,
    pub(crate) rng: Pcg32,
    next_id: u32,
}

impl SimState {
    pub fn new(config: SimConfig, catalog: SpaceCatalog) -> SimResult<Self> {
        config.validate()?;
        Ok(Self {
            rng: Pcg32::seed_from_u64(config.seed),
            config,
            vehicles: Vec::new(),
            catalog,
            time_ticks: 0,
            elapsed: 0.0,
            ai_timers: Vec::new(),
            collision_timer: 0.0,
            accumulator: 0.0,
            events: Vec::new(),
            next_id: 1,
        })
    }

    /// Allocate a new vehicle ID
    fn next_vehicle_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Add a stopped vehicle heading along +x and return its id
    pub fn add_vehicle(
        &mut self,
        pos: Vec2,
        length: f32,
        width: f32,
        user_controlled: bool,
    ) -> SimResult<u32> {
        let id = self.next_vehicle_id();
        let mut vehicle = Vehicle::new(id, pos, length, width)?;
        vehicle.plate = random_plate(&mut self.rng);
        vehicle.set_user_controlled(user_controlled);
        log::debug!(
            "Added vehicle {} ({}) at ({:.1}, {:.1})",
            id,
            vehicle.plate,
            pos.x,
            pos.y
        );
        self.vehicles.push(vehicle);
        self.ai_timers.push(0.0);
        Ok(id)
    }

    pub fn vehicle(&self, id: u32) -> Option<&Vehicle> {
        self.vehicles.iter().find(|v| v.id == id)
    }

    /// Index of the vehicle driven by `ControlInput`
    pub fn user_vehicle_index(&self) -> Option<usize> {
        self.vehicles.iter().position(|v| v.is_user_controlled())
    }

    /// The simulation RNG, for seeding scenario content
    pub fn rng_mut(&mut self) -> &mut Pcg32 {
        &mut self.rng
    }

    /// Events recorded since the last drain, oldest first.
    ///
    /// At most `MAX_EVENTS` are kept; call `drain_events` every frame to see
    /// all of them.
    pub fn events(&self) -> &[SimEvent] {
        &self.events
    }

    pub(crate) fn record(&mut self, events: impl IntoIterator<Item = SimEvent>) {
        self.events.extend(events);
        if self.events.len() > MAX_EVENTS {
            let excess = self.events.len() - MAX_EVENTS;
            self.events.drain(..excess);
            log::debug!("Event buffer full, dropped {excess} oldest events");
        }
    }

    pub fn drain_events(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.events)
    }

    /// Keep per-vehicle timers in step with vehicles pushed directly
    pub(crate) fn sync_timers(&mut self) {
        self.ai_timers.resize(self.vehicles.len(), 0.0);
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            tick: self.time_ticks,
            elapsed: self.elapsed,
            vehicles: self.vehicles.iter().map(VehicleView::from).collect(),
            spaces: self.catalog.iter().cloned().collect(),
            free_spaces: self.catalog.free_count(),
            occupied_spaces: self.catalog.occupied_count(),
        }
    }
}

/// Plate in the `XX-999-X` pattern
fn random_plate<R: Rng>(rng: &mut R) -> String {
    let mut letter = || char::from(b'A' + rng.random_range(0..26u8));
    let (a, b) = (letter(), letter());
    let c = letter();
    let digits: u16 = rng.random_range(0..1000);
    format!("{a}{b}-{digits:03}-{c}")
}

/// Read-only view of a vehicle for display collaborators
#[derive(Debug, Clone, Serialize)]
pub struct VehicleView {
    pub id: u32,
    pub plate: String,
    pub pos: Vec2,
    pub heading: f32,
    pub speed: f32,
    pub steering: f32,
    pub length: f32,
    pub width: f32,
    pub corners: [Vec2; 4],
    pub user_controlled: bool,
    pub parked: bool,
    pub reversing: bool,
}

impl From<&Vehicle> for VehicleView {
    fn from(v: &Vehicle) -> Self {
        Self {
            id: v.id,
            plate: v.plate.clone(),
            pos: v.position(),
            heading: v.heading(),
            speed: v.speed(),
            steering: v.steering_angle(),
            length: v.length(),
            width: v.width(),
            corners: v.corner_points(),
            user_controlled: v.is_user_controlled(),
            parked: v.is_parked(),
            reversing: v.is_reversing(),
        }
    }
}

/// Serializable picture of the simulation at one tick
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub tick: u64,
    pub elapsed: f64,
    pub vehicles: Vec<VehicleView>,
    pub spaces: Vec<ParkingSpace>,
    pub free_spaces: usize,
    pub occupied_spaces: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::space::SpaceKind;

    fn state() -> SimState {
        let catalog = SpaceCatalog::new(vec![
            ParkingSpace::new("R1", Vec2::new(50.0, 50.0), 3.0, 6.0, SpaceKind::Regular).unwrap(),
        ])
        .unwrap();
        SimState::new(SimConfig::default(), catalog).unwrap()
    }

    #[test]
    fn test_vehicle_ids_are_sequential() {
        let mut state = state();
        let a = state.add_vehicle(Vec2::new(10.0, 10.0), 4.5, 1.8, true).unwrap();
        let b = state.add_vehicle(Vec2::new(20.0, 10.0), 4.0, 1.7, false).unwrap();
        assert_eq!((a, b), (1, 2));
        assert_eq!(state.user_vehicle_index(), Some(0));
        assert_eq!(state.vehicle(2).unwrap().length(), 4.0);
        assert_eq!(state.ai_timers.len(), 2);
    }

    #[test]
    fn test_rejects_bad_vehicle() {
        let mut state = state();
        assert!(state.add_vehicle(Vec2::new(10.0, 10.0), 0.0, 1.8, false).is_err());
        assert!(state.vehicles.is_empty());
    }

    #[test]
    fn test_plate_pattern() {
        let mut state = state();
        state.add_vehicle(Vec2::new(10.0, 10.0), 4.5, 1.8, false).unwrap();
        let plate = &state.vehicles[0].plate;
        let bytes = plate.as_bytes();
        assert_eq!(bytes.len(), 8, "{plate}");
        assert!(bytes[..2].iter().all(u8::is_ascii_uppercase));
        assert_eq!(bytes[2], b'-');
        assert!(bytes[3..6].iter().all(u8::is_ascii_digit));
        assert_eq!(bytes[6], b'-');
        assert!(bytes[7].is_ascii_uppercase());
    }

    #[test]
    fn test_same_seed_same_plates() {
        let mut a = state();
        let mut b = state();
        for s in [&mut a, &mut b] {
            s.add_vehicle(Vec2::new(10.0, 10.0), 4.5, 1.8, false).unwrap();
        }
        assert_eq!(a.vehicles[0].plate, b.vehicles[0].plate);
    }

    #[test]
    fn test_snapshot_serializes() {
        let mut state = state();
        state.add_vehicle(Vec2::new(10.0, 10.0), 4.5, 1.8, true).unwrap();
        let json = serde_json::to_value(state.snapshot()).unwrap();
        assert_eq!(json["vehicles"][0]["id"], 1);
        assert_eq!(json["spaces"][0]["id"], "R1");
        assert_eq!(json["free_spaces"], 1);
    }

    #[test]
    fn test_event_tagging() {
        let json = serde_json::to_value(SimEvent::BoundaryBounce { vehicle: 3 }).unwrap();
        assert_eq!(json["event"], "boundary_bounce");
        assert_eq!(json["vehicle"], 3);
    }

    #[test]
    fn test_drain_events() {
        let mut state = state();
        state.record([SimEvent::BoundaryBounce { vehicle: 1 }]);
        assert_eq!(state.drain_events().len(), 1);
        assert!(state.events().is_empty());
    }

    #[test]
    fn test_event_buffer_drops_oldest() {
        let mut state = state();
        let bounces =
            (0..MAX_EVENTS as u32 + 10).map(|vehicle| SimEvent::BoundaryBounce { vehicle });
        state.record(bounces);
        state.record([SimEvent::BoundaryBounce { vehicle: u32::MAX }]);

        let events = state.events();
        assert_eq!(events.len(), MAX_EVENTS);
        assert_eq!(events[0], SimEvent::BoundaryBounce { vehicle: 11 });
        assert_eq!(
            events.last(),
            Some(&SimEvent::BoundaryBounce { vehicle: u32::MAX })
        );
    }
}

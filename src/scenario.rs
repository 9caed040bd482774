//! Scenario records
//!
//! A scenario is the serializable description of a lot: configuration,
//! spaces in catalog order and the vehicles to spawn. `build` validates it
//! and produces a ready-to-run [`SimState`].

use std::path::Path;

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Deserializer, Serialize};

use crate::config::SimConfig;
use crate::error::{SimError, SimResult};
use crate::sim::{ParkingSpace, SimState, SpaceCatalog, SpaceKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpaceRecord {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub length: f32,
    #[serde(default, deserialize_with = "lenient_kind")]
    pub kind: SpaceKind,
    /// Display angle; the kind's default when omitted
    #[serde(default)]
    pub angle: Option<f32>,
    #[serde(default)]
    pub occupied: bool,
}

fn lenient_kind<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SpaceKind, D::Error> {
    let name = String::deserialize(deserializer)?;
    Ok(SpaceKind::from_name(&name))
}

impl SpaceRecord {
    fn to_space(&self) -> SimResult<ParkingSpace> {
        let mut space = ParkingSpace::new(
            self.id.clone(),
            Vec2::new(self.x, self.y),
            self.width,
            self.length,
            self.kind,
        )?
        .with_occupied(self.occupied);
        if let Some(angle) = self.angle {
            space = space.with_angle(angle);
        }
        Ok(space)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleRecord {
    pub x: f32,
    pub y: f32,
    pub length: f32,
    pub width: f32,
    #[serde(default)]
    pub heading: f32,
    #[serde(default)]
    pub user_controlled: bool,
}

/// A lot plus the vehicles driving in it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    pub config: SimConfig,
    pub spaces: Vec<SpaceRecord>,
    pub vehicles: Vec<VehicleRecord>,
    /// Randomly occupy parkable spaces with this probability at build time
    pub preseed: Option<f64>,
}

impl Scenario {
    pub fn from_json(json: &str) -> SimResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> SimResult<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let scenario = Self::from_json(&json)?;
        log::info!("Loaded scenario from {}", path.as_ref().display());
        Ok(scenario)
    }

    /// Validate every record and assemble the simulation
    pub fn build(&self) -> SimResult<SimState> {
        let spaces = self
            .spaces
            .iter()
            .map(SpaceRecord::to_space)
            .collect::<SimResult<Vec<_>>>()?;
        let mut state = SimState::new(self.config.clone(), SpaceCatalog::new(spaces)?)?;

        if let Some(probability) = self.preseed {
            if !(0.0..=1.0).contains(&probability) {
                return Err(SimError::Config(format!(
                    "preseed must be in [0, 1], got {probability}"
                )));
            }
            state.catalog.preseed_occupancy(&mut state.rng, probability);
        }

        for record in &self.vehicles {
            state.add_vehicle(
                Vec2::new(record.x, record.y),
                record.length,
                record.width,
                record.user_controlled,
            )?;
            if let Some(vehicle) = state.vehicles.last_mut() {
                vehicle.correct_heading(record.heading);
            }
        }

        log::info!(
            "Scenario ready: {} spaces ({} free), {} vehicles",
            state.catalog.len(),
            state.catalog.free_count(),
            state.vehicles.len()
        );
        Ok(state)
    }

    /// Sample lot: one row per space kind, two obstacles, one user vehicle
    /// and five AI vehicles of random size and position
    pub fn demo(seed: u64) -> Self {
        let mut rng = Pcg32::seed_from_u64(seed);
        let mut spaces = Vec::new();
        let mut next_number = 1;
        for row in &DEMO_ROWS {
            row.push_into(&mut spaces, &mut next_number, &mut rng);
        }
        spaces.push(obstacle("OBS-1", 250.0, 250.0, 3.0));
        spaces.push(obstacle("OBS-2", 600.0, 400.0, 4.0));

        let mut vehicles = vec![VehicleRecord {
            x: 50.0,
            y: 150.0,
            length: 4.5,
            width: 1.8,
            heading: 0.0,
            user_controlled: true,
        }];
        vehicles.extend((0..5).map(|_| VehicleRecord {
            x: 200.0 + rng.random_range(0..600) as f32,
            y: 100.0 + rng.random_range(0..600) as f32,
            length: 4.0 + rng.random::<f32>() * 1.5,
            width: 1.7 + rng.random::<f32>() * 0.5,
            heading: 0.0,
            user_controlled: false,
        }));

        Self {
            config: SimConfig {
                seed,
                ..Default::default()
            },
            spaces,
            vehicles,
            preseed: None,
        }
    }
}

fn obstacle(id: &str, x: f32, y: f32, size: f32) -> SpaceRecord {
    SpaceRecord {
        id: id.into(),
        x,
        y,
        width: size,
        length: size,
        kind: SpaceKind::Obstacle,
        angle: None,
        occupied: true,
    }
}

/// Evenly spaced row of identical spaces
struct Row {
    x: f32,
    y: f32,
    count: u32,
    /// Offset from one space to the next
    step: (f32, f32),
    width: f32,
    length: f32,
    kind: SpaceKind,
    angle: f32,
    /// Chance each space starts occupied
    occupancy: f64,
}

impl Row {
    fn push_into(&self, spaces: &mut Vec<SpaceRecord>, next_number: &mut u32, rng: &mut Pcg32) {
        let prefix = self.kind.as_str()[..3].to_ascii_uppercase();
        let (dx, dy) = self.step;
        for i in 0..self.count {
            spaces.push(SpaceRecord {
                id: format!("{prefix}-{next_number}"),
                x: self.x + i as f32 * dx,
                y: self.y + i as f32 * dy,
                width: self.width,
                length: self.length,
                kind: self.kind,
                angle: Some(self.angle),
                occupied: rng.random_bool(self.occupancy),
            });
            *next_number += 1;
        }
    }
}

// Rows are far enough apart that every space's lane run-up stays clear of
// the other rows and the obstacles
const DEMO_ROWS: [Row; 6] = [
    Row {
        x: 100.0,
        y: 200.0,
        count: 8,
        step: (25.0, 0.0),
        width: 5.5,
        length: 2.8,
        kind: SpaceKind::Perpendicular,
        angle: 90.0,
        occupancy: 0.5,
    },
    Row {
        x: 100.0,
        y: 50.0,
        count: 5,
        step: (50.0, 0.0),
        width: 2.6,
        length: 6.5,
        kind: SpaceKind::Parallel,
        angle: 0.0,
        occupancy: 0.5,
    },
    Row {
        x: 100.0,
        y: 300.0,
        count: 6,
        step: (30.0, 0.0),
        width: 3.2,
        length: 7.8,
        kind: SpaceKind::Angle,
        angle: 45.0,
        occupancy: 0.5,
    },
    Row {
        x: 700.0,
        y: 300.0,
        count: 10,
        step: (0.0, 10.0),
        width: 2.3,
        length: 5.0,
        kind: SpaceKind::Compact,
        angle: 90.0,
        occupancy: 0.5,
    },
    Row {
        x: 500.0,
        y: 100.0,
        count: 3,
        step: (0.0, 12.0),
        width: 3.5,
        length: 7.2,
        kind: SpaceKind::Disabled,
        angle: 90.0,
        occupancy: 0.3,
    },
    Row {
        x: 850.0,
        y: 500.0,
        count: 6,
        step: (0.0, 12.0),
        width: 3.0,
        length: 6.0,
        kind: SpaceKind::Regular,
        angle: 0.0,
        occupancy: 0.5,
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_layout() {
        let scenario = Scenario::demo(1);
        assert_eq!(scenario.spaces.len(), 8 + 5 + 6 + 10 + 3 + 6 + 2);
        assert_eq!(scenario.spaces[0].id, "PER-1");
        assert_eq!(scenario.spaces[8].id, "PAR-9");
        assert_eq!(scenario.spaces[13].id, "ANG-14");
        assert_eq!(scenario.vehicles.len(), 6);
        assert!(scenario.vehicles[0].user_controlled);
        for v in &scenario.vehicles[1..] {
            assert!((4.0..=5.5).contains(&v.length));
            assert!((1.7..=2.2).contains(&v.width));
            assert!(!v.user_controlled);
        }

        let state = scenario.build().unwrap();
        assert_eq!(state.catalog.obstacles().count(), 2);
        assert_eq!(state.user_vehicle_index(), Some(0));
    }

    #[test]
    fn test_demo_is_seeded() {
        assert_eq!(Scenario::demo(5), Scenario::demo(5));
        assert_ne!(Scenario::demo(5).vehicles, Scenario::demo(6).vehicles);
    }

    #[test]
    fn test_json_scenario() {
        let json = r#"{
            "config": { "seed": 9 },
            "spaces": [
                { "id": "A-1", "x": 10, "y": 20, "width": 2.5, "length": 5, "kind": "angled" },
                { "id": "R-1", "x": 40, "y": 20, "width": 3, "length": 6, "occupied": true }
            ],
            "vehicles": [ { "x": 100, "y": 100, "length": 4.5, "width": 1.8, "heading": 90 } ]
        }"#;
        let state = Scenario::from_json(json).unwrap().build().unwrap();
        assert_eq!(state.config.seed, 9);
        assert_eq!(state.catalog.get(0).unwrap().kind(), SpaceKind::Angle);
        assert_eq!(state.catalog.get(0).unwrap().angle(), 45.0);
        assert_eq!(state.catalog.get(1).unwrap().kind(), SpaceKind::Regular);
        assert!(state.catalog.get(1).unwrap().is_occupied());
        assert_eq!(state.vehicles[0].heading(), 90.0);
        assert_eq!(state.config.world_width, 1000.0);
    }

    #[test]
    fn test_build_rejects_bad_records() {
        let mut scenario = Scenario::demo(1);
        scenario.spaces[1].id = scenario.spaces[0].id.clone();
        assert!(matches!(scenario.build(), Err(SimError::DuplicateSpaceId(_))));

        let mut scenario = Scenario::demo(1);
        scenario.vehicles[0].width = -1.0;
        assert!(matches!(
            scenario.build(),
            Err(SimError::NonPositiveDimensions { .. })
        ));

        let mut scenario = Scenario::demo(1);
        scenario.preseed = Some(2.0);
        assert!(matches!(scenario.build(), Err(SimError::Config(_))));
    }

    #[test]
    fn test_preseed_keeps_listed_occupancy() {
        let json = r#"{
            "spaces": [
                { "id": "R-1", "x": 10, "y": 20, "width": 3, "length": 6, "occupied": true },
                { "id": "R-2", "x": 40, "y": 20, "width": 3, "length": 6 }
            ],
            "preseed": 0.0
        }"#;
        let state = Scenario::from_json(json).unwrap().build().unwrap();
        assert!(state.catalog.get(0).unwrap().is_occupied());
        assert!(!state.catalog.get(1).unwrap().is_occupied());
    }

    #[test]
    fn test_preseed_leaves_obstacles_alone() {
        let mut scenario = Scenario::demo(3);
        for space in &mut scenario.spaces {
            space.occupied = false;
        }
        scenario.preseed = Some(1.0);
        let state = scenario.build().unwrap();
        assert_eq!(state.catalog.free_count(), 0);
        assert_eq!(state.catalog.obstacles().count(), 2);
    }
}

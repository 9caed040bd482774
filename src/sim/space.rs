//! Parking spaces and the lot catalog
//!
//! A space is an axis-aligned rectangle anchored at its top-left corner:
//! `length` runs along +x and `width` along +y. The catalog is supplied once
//! at setup; afterwards only the occupied flag changes.

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

/// Parking space types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SpaceKind {
    Parallel,
    Perpendicular,
    Angle,
    Compact,
    Disabled,
    #[default]
    Regular,
    /// Pillars, planters etc. Never parkable, only collided with.
    Obstacle,
}

impl SpaceKind {
    pub const ALL: [SpaceKind; 7] = [
        SpaceKind::Parallel,
        SpaceKind::Perpendicular,
        SpaceKind::Angle,
        SpaceKind::Compact,
        SpaceKind::Disabled,
        SpaceKind::Regular,
        SpaceKind::Obstacle,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SpaceKind::Parallel => "Parallel",
            SpaceKind::Perpendicular => "Perpendicular",
            SpaceKind::Angle => "Angled",
            SpaceKind::Compact => "Compact",
            SpaceKind::Disabled => "Disabled",
            SpaceKind::Regular => "Regular",
            SpaceKind::Obstacle => "Obstacle",
        }
    }

    /// Case-insensitive lookup by display or variant name; unknown names
    /// are Regular
    pub fn from_name(name: &str) -> Self {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|kind| {
                kind.as_str().eq_ignore_ascii_case(name)
                    || format!("{kind:?}").eq_ignore_ascii_case(name)
            })
            .unwrap_or_else(|| {
                log::warn!("Unknown space kind {name:?}, using Regular");
                SpaceKind::Regular
            })
    }

    /// Typical painted angle relative to the curb (degrees)
    pub fn default_angle(&self) -> f32 {
        match self {
            SpaceKind::Perpendicular | SpaceKind::Compact | SpaceKind::Disabled => 90.0,
            SpaceKind::Angle => 45.0,
            SpaceKind::Parallel | SpaceKind::Regular | SpaceKind::Obstacle => 0.0,
        }
    }

    pub fn is_parkable(&self) -> bool {
        *self != SpaceKind::Obstacle
    }

    pub fn requires_special_skills(&self) -> bool {
        matches!(self, SpaceKind::Parallel | SpaceKind::Compact)
    }
}

impl std::fmt::Display for SpaceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A labeled rectangular region of the lot
#[derive(Debug, Clone, Serialize)]
pub struct ParkingSpace {
    id: String,
    /// Top-left corner
    location: Vec2,
    width: f32,
    length: f32,
    kind: SpaceKind,
    occupied: bool,
    /// Display angle (degrees)
    angle: f32,
}

impl ParkingSpace {
    pub fn new(
        id: impl Into<String>,
        location: Vec2,
        width: f32,
        length: f32,
        kind: SpaceKind,
    ) -> SimResult<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(SimError::EmptySpaceId);
        }
        if !location.is_finite() {
            return Err(SimError::NonFinite("space location"));
        }
        if !(width.is_finite() && length.is_finite()) {
            return Err(SimError::NonFinite("space dimensions"));
        }
        if width <= 0.0 || length <= 0.0 {
            return Err(SimError::NonPositiveDimensions {
                entity: "parking space",
                width,
                length,
            });
        }
        let angle = if kind == SpaceKind::Angle {
            kind.default_angle()
        } else {
            0.0
        };
        Ok(Self {
            id,
            location,
            width,
            length,
            kind,
            occupied: false,
            angle,
        })
    }

    pub fn with_angle(mut self, angle: f32) -> Self {
        self.angle = angle;
        self
    }

    /// Pre-occupied at setup
    pub fn with_occupied(mut self, occupied: bool) -> Self {
        self.occupied = occupied;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }
    pub fn location(&self) -> Vec2 {
        self.location
    }
    pub fn width(&self) -> f32 {
        self.width
    }
    pub fn length(&self) -> f32 {
        self.length
    }
    pub fn kind(&self) -> SpaceKind {
        self.kind
    }
    pub fn is_occupied(&self) -> bool {
        self.occupied
    }
    pub fn angle(&self) -> f32 {
        self.angle
    }

    pub fn center(&self) -> Vec2 {
        self.location + Vec2::new(self.length / 2.0, self.width / 2.0)
    }

    /// Rectangle as (min, max)
    pub fn bounds(&self) -> (Vec2, Vec2) {
        (self.location, self.location + Vec2::new(self.length, self.width))
    }
}

/// Ordered set of spaces in the lot.
///
/// Indices are stable for the lifetime of the catalog. Occupancy is written
/// only by the maneuver planner (`mark_occupied`) or by setup pre-seeding.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SpaceCatalog {
    spaces: Vec<ParkingSpace>,
}

impl SpaceCatalog {
    /// Build a catalog, rejecting duplicate ids
    pub fn new(spaces: Vec<ParkingSpace>) -> SimResult<Self> {
        let mut seen = std::collections::HashSet::with_capacity(spaces.len());
        for space in &spaces {
            if !seen.insert(space.id()) {
                return Err(SimError::DuplicateSpaceId(space.id().to_string()));
            }
        }
        Ok(Self { spaces })
    }

    pub fn len(&self) -> usize {
        self.spaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spaces.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ParkingSpace> {
        self.spaces.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParkingSpace> {
        self.spaces.iter()
    }

    /// Index of the space with `id`
    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.spaces.iter().position(|s| s.id() == id)
    }

    pub fn find(&self, id: &str) -> Option<&ParkingSpace> {
        self.position_of(id).and_then(|i| self.spaces.get(i))
    }

    /// Unoccupied spaces of any kind, with their indices
    pub fn unoccupied(&self) -> impl Iterator<Item = (usize, &ParkingSpace)> {
        self.spaces.iter().enumerate().filter(|(_, s)| !s.is_occupied())
    }

    pub fn of_kind(&self, kind: SpaceKind) -> impl Iterator<Item = (usize, &ParkingSpace)> {
        self.spaces.iter().enumerate().filter(move |(_, s)| s.kind() == kind)
    }

    pub fn obstacles(&self) -> impl Iterator<Item = &ParkingSpace> {
        self.spaces.iter().filter(|s| s.kind() == SpaceKind::Obstacle)
    }

    /// Parkable spaces that are free
    pub fn free_count(&self) -> usize {
        self.spaces
            .iter()
            .filter(|s| s.kind().is_parkable() && !s.is_occupied())
            .count()
    }

    /// Parkable spaces that are taken
    pub fn occupied_count(&self) -> usize {
        self.spaces
            .iter()
            .filter(|s| s.kind().is_parkable() && s.is_occupied())
            .count()
    }

    /// Randomly occupy free parkable spaces before the run starts.
    ///
    /// Only ever sets the flag: spaces that are already occupied keep it and
    /// draw nothing from `rng`.
    pub fn preseed_occupancy<R: Rng>(&mut self, rng: &mut R, probability: f64) {
        let probability = probability.clamp(0.0, 1.0);
        for space in self
            .spaces
            .iter_mut()
            .filter(|s| s.kind().is_parkable() && !s.occupied)
        {
            space.occupied = rng.random_bool(probability);
        }
    }

    pub(crate) fn mark_occupied(&mut self, index: usize) {
        if let Some(space) = self.spaces.get_mut(index) {
            space.occupied = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn space(id: &str, kind: SpaceKind) -> ParkingSpace {
        ParkingSpace::new(id, Vec2::new(10.0, 20.0), 2.5, 5.0, kind).unwrap()
    }

    #[test]
    fn test_rejects_invalid_space() {
        assert!(matches!(
            ParkingSpace::new("A-1", Vec2::ZERO, 0.0, 5.0, SpaceKind::Regular),
            Err(SimError::NonPositiveDimensions { .. })
        ));
        assert!(matches!(
            ParkingSpace::new("A-1", Vec2::ZERO, 2.5, -5.0, SpaceKind::Regular),
            Err(SimError::NonPositiveDimensions { .. })
        ));
        assert!(matches!(
            ParkingSpace::new("  ", Vec2::ZERO, 2.5, 5.0, SpaceKind::Regular),
            Err(SimError::EmptySpaceId)
        ));
    }

    #[test]
    fn test_angle_space_defaults_to_45() {
        assert_eq!(space("ANG-1", SpaceKind::Angle).angle(), 45.0);
        assert_eq!(space("PER-1", SpaceKind::Perpendicular).angle(), 0.0);
        assert_eq!(space("PER-2", SpaceKind::Perpendicular).with_angle(90.0).angle(), 90.0);
    }

    #[test]
    fn test_center_and_bounds() {
        let s = space("REG-1", SpaceKind::Regular);
        assert_eq!(s.center(), Vec2::new(12.5, 21.25));
        assert_eq!(s.bounds(), (Vec2::new(10.0, 20.0), Vec2::new(15.0, 22.5)));
    }

    #[test]
    fn test_kind_metadata() {
        assert_eq!(SpaceKind::from_name("angled"), SpaceKind::Angle);
        assert_eq!(SpaceKind::from_name("angle"), SpaceKind::Angle);
        assert_eq!(SpaceKind::from_name("PARALLEL"), SpaceKind::Parallel);
        assert_eq!(SpaceKind::from_name("helipad"), SpaceKind::Regular);
        assert!(!SpaceKind::Obstacle.is_parkable());
        assert!(SpaceKind::Disabled.is_parkable());
        assert!(SpaceKind::Parallel.requires_special_skills());
        assert!(!SpaceKind::Regular.requires_special_skills());
        assert_eq!(SpaceKind::Compact.default_angle(), 90.0);
    }

    #[test]
    fn test_catalog_rejects_duplicates() {
        let err = SpaceCatalog::new(vec![
            space("A", SpaceKind::Regular),
            space("A", SpaceKind::Compact),
        ])
        .unwrap_err();
        assert!(matches!(err, SimError::DuplicateSpaceId(id) if id == "A"));
    }

    #[test]
    fn test_catalog_queries() {
        let mut catalog = SpaceCatalog::new(vec![
            space("REG-1", SpaceKind::Regular),
            space("OBS-1", SpaceKind::Obstacle),
            space("REG-2", SpaceKind::Regular).with_occupied(true),
            space("CMP-1", SpaceKind::Compact),
        ])
        .unwrap();

        assert_eq!(catalog.len(), 4);
        assert_eq!(catalog.position_of("CMP-1"), Some(3));
        assert!(catalog.find("nope").is_none());
        assert_eq!(catalog.obstacles().count(), 1);
        assert_eq!(catalog.of_kind(SpaceKind::Regular).count(), 2);
        assert_eq!(catalog.unoccupied().count(), 3);
        assert_eq!(catalog.free_count(), 2);
        assert_eq!(catalog.occupied_count(), 1);

        catalog.mark_occupied(0);
        assert!(catalog.get(0).unwrap().is_occupied());
        assert_eq!(catalog.free_count(), 1);
    }

    #[test]
    fn test_preseed_skips_obstacles_and_is_deterministic() {
        let build = || {
            SpaceCatalog::new(
                (0..20)
                    .map(|i| space(&format!("S-{i}"), SpaceKind::Perpendicular))
                    .chain([space("OBS", SpaceKind::Obstacle)])
                    .collect(),
            )
            .unwrap()
        };

        let mut a = build();
        let mut b = build();
        a.preseed_occupancy(&mut Pcg32::seed_from_u64(7), 1.0);
        assert_eq!(a.occupied_count(), 20);
        assert!(!a.find("OBS").unwrap().is_occupied());

        let mut c = build();
        c.preseed_occupancy(&mut Pcg32::seed_from_u64(7), 0.5);
        b.preseed_occupancy(&mut Pcg32::seed_from_u64(7), 0.5);
        let occ = |cat: &SpaceCatalog| cat.iter().map(|s| s.is_occupied()).collect::<Vec<_>>();
        assert_eq!(occ(&b), occ(&c));
    }

    #[test]
    fn test_preseed_keeps_existing_occupancy() {
        let mut catalog = SpaceCatalog::new(vec![
            space("REG-1", SpaceKind::Regular).with_occupied(true),
            space("REG-2", SpaceKind::Regular),
        ])
        .unwrap();

        catalog.preseed_occupancy(&mut Pcg32::seed_from_u64(1), 0.0);
        assert!(catalog.get(0).unwrap().is_occupied());
        assert!(!catalog.get(1).unwrap().is_occupied());

        catalog.preseed_occupancy(&mut Pcg32::seed_from_u64(1), 1.0);
        assert_eq!(catalog.occupied_count(), 2);
    }
}

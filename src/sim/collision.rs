//! Collision detection and response between vehicles and obstacles
//!
//! Overlap is approximate: a vehicle's oriented footprint is tested against
//! the axis-aligned bounding box of the other shape, not its true outline.
//! Rotated vehicles therefore collide a little early on their diagonals.

use glam::Vec2;
use rand::Rng;

use super::space::{ParkingSpace, SpaceCatalog};
use super::vehicle::Vehicle;

/// Fraction of relative velocity returned as impulse
pub const RESTITUTION: f32 = 0.8;
/// Max heading jitter after a vehicle-vehicle hit (degrees, each way)
pub const VEHICLE_JITTER: f32 = 5.0;
/// Fraction of speed kept (and inverted) when bouncing off an obstacle
pub const OBSTACLE_BOUNCE: f32 = 0.7;
/// Max heading jitter after an obstacle hit (degrees, each way)
pub const OBSTACLE_JITTER: f32 = 10.0;

/// Axis-aligned box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec2,
    pub max: Vec2,
}

impl Aabb {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    pub fn of_vehicle(vehicle: &Vehicle) -> Self {
        let (min, max) = vehicle.bounding_box();
        Self { min, max }
    }

    pub fn of_space(space: &ParkingSpace) -> Self {
        let (min, max) = space.bounds();
        Self { min, max }
    }

    pub fn corners(&self) -> [Vec2; 4] {
        [
            self.min,
            Vec2::new(self.max.x, self.min.y),
            self.max,
            Vec2::new(self.min.x, self.max.y),
        ]
    }

    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && other.min.x <= self.max.x
            && self.min.y <= other.max.y
            && other.min.y <= self.max.y
    }
}

/// Project points onto an axis, returning (min, max)
fn project(points: &[Vec2], axis: Vec2) -> (f32, f32) {
    points.iter().fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), p| {
        let d = p.dot(axis);
        (lo.min(d), hi.max(d))
    })
}

/// Separating-axis test between a convex polygon and a box.
///
/// Touching edges count as overlap.
pub fn polygon_overlaps_aabb(polygon: &[Vec2], aabb: &Aabb) -> bool {
    if polygon.is_empty() {
        return false;
    }
    let box_corners = aabb.corners();

    let edge_normals = polygon
        .iter()
        .zip(polygon.iter().cycle().skip(1))
        .map(|(a, b)| (*b - *a).perp());

    for axis in [Vec2::X, Vec2::Y].into_iter().chain(edge_normals) {
        if axis == Vec2::ZERO {
            continue;
        }
        let (a_lo, a_hi) = project(polygon, axis);
        let (b_lo, b_hi) = project(&box_corners, axis);
        if a_hi < b_lo || b_hi < a_lo {
            return false;
        }
    }
    true
}

/// Footprint of `a` against the bounding box of `b`
pub fn vehicles_overlap(a: &Vehicle, b: &Vehicle) -> bool {
    polygon_overlaps_aabb(&a.corner_points(), &Aabb::of_vehicle(b))
}

pub fn vehicle_hits_space(vehicle: &Vehicle, space: &ParkingSpace) -> bool {
    polygon_overlaps_aabb(&vehicle.corner_points(), &Aabb::of_space(space))
}

/// A contact found by a collision pass
#[derive(Debug, Clone, PartialEq)]
pub enum Contact {
    Vehicles { a: u32, b: u32, impulse: f32 },
    Obstacle { vehicle: u32, space: String },
}

/// Run one collision pass over all active vehicles.
///
/// Pairs are visited in index order; each vehicle is checked against the
/// obstacles after its pairs. Parked vehicles are skipped entirely.
pub fn resolve_collisions<R: Rng>(
    vehicles: &mut [Vehicle],
    catalog: &SpaceCatalog,
    rng: &mut R,
) -> Vec<Contact> {
    let mut contacts = Vec::new();

    for i in 0..vehicles.len() {
        if vehicles[i].is_parked() {
            continue;
        }

        for j in (i + 1)..vehicles.len() {
            let (head, tail) = vehicles.split_at_mut(j);
            let (a, b) = (&mut head[i], &mut tail[0]);
            if b.is_parked() || !vehicles_overlap(a, b) {
                continue;
            }
            let impulse = bounce_vehicles(a, b, rng);
            log::debug!("Vehicle {} hit vehicle {} (impulse {:.3})", a.id, b.id, impulse);
            contacts.push(Contact::Vehicles {
                a: a.id,
                b: b.id,
                impulse,
            });
        }

        let vehicle = &mut vehicles[i];
        for space in catalog.obstacles() {
            if vehicle_hits_space(vehicle, space) {
                bounce_off_obstacle(vehicle, rng);
                log::debug!("Vehicle {} hit obstacle {}", vehicle.id, space.id());
                contacts.push(Contact::Obstacle {
                    vehicle: vehicle.id,
                    space: space.id().to_string(),
                });
            }
        }
    }

    contacts
}

/// Exchange impulse along the line between centers and jitter both headings
fn bounce_vehicles<R: Rng>(a: &mut Vehicle, b: &mut Vehicle, rng: &mut R) -> f32 {
    // Coincident centers have no direction; push along +x
    let normal = (b.position() - a.position())
        .try_normalize()
        .unwrap_or(Vec2::X);
    let relative = b.velocity() - a.velocity();
    let impulse = relative.dot(normal) * RESTITUTION;

    a.correct_speed(a.speed() - impulse * 0.5);
    b.correct_speed(b.speed() + impulse * 0.5);

    a.correct_heading(rng.random_range(-VEHICLE_JITTER..VEHICLE_JITTER));
    b.correct_heading(rng.random_range(-VEHICLE_JITTER..VEHICLE_JITTER));

    impulse
}

fn bounce_off_obstacle<R: Rng>(vehicle: &mut Vehicle, rng: &mut R) {
    vehicle.correct_speed(-vehicle.speed() * OBSTACLE_BOUNCE);
    vehicle.correct_heading(rng.random_range(-OBSTACLE_JITTER..OBSTACLE_JITTER));
}

/// Answers "is this pose blocked?" for the maneuver executor
pub trait CollisionCheck {
    fn is_blocked(&self, vehicle: &Vehicle) -> bool;
}

/// Check that never reports a collision
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCollisions;

impl CollisionCheck for NoCollisions {
    fn is_blocked(&self, _vehicle: &Vehicle) -> bool {
        false
    }
}

impl<F: Fn(&Vehicle) -> bool> CollisionCheck for F {
    fn is_blocked(&self, vehicle: &Vehicle) -> bool {
        self(vehicle)
    }
}

/// Static footprints a maneuvering vehicle must not touch
#[derive(Debug, Clone, Default)]
pub struct FootprintCheck {
    boxes: Vec<Aabb>,
}

impl FootprintCheck {
    /// Obstacles plus every vehicle other than `index`, captured at call time
    pub fn around(index: usize, vehicles: &[Vehicle], catalog: &SpaceCatalog) -> Self {
        let boxes = catalog
            .obstacles()
            .map(Aabb::of_space)
            .chain(
                vehicles
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != index)
                    .map(|(_, v)| Aabb::of_vehicle(v)),
            )
            .collect();
        Self { boxes }
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }
}

impl CollisionCheck for FootprintCheck {
    fn is_blocked(&self, vehicle: &Vehicle) -> bool {
        let footprint = vehicle.corner_points();
        self.boxes.iter().any(|b| polygon_overlaps_aabb(&footprint, b))
    }
}

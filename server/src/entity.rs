use rand::Rng;
use zone_shared::config::ZoneGeometry;
use zone_shared::vec2::{self, Vec2};

/// A circular entity bouncing around the arena.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    /// Centre of the entity
    pub position: Vec2,
    /// Displacement per step
    pub velocity: Vec2,
    radius: f64,
    /// Logical zone state, flipped only once the coordinator accepted the crossing
    inside_zone: bool,
}

impl Entity {
    /// New entities always start outside the zone, whatever their position.
    pub fn new(position: Vec2, velocity: Vec2, radius: f64) -> Self {
        Self {
            position,
            velocity,
            radius,
            inside_zone: false,
        }
    }

    /// Random placement fully inside the arena, with integer speed components
    /// in `[-max_speed, -1] ∪ [1, max_speed]` so nobody travels axis-aligned.
    pub fn random(geometry: &ZoneGeometry, max_speed: u32, rng: &mut impl Rng) -> Self {
        let r = geometry.entity_radius;
        let x = rng.gen_range(r..=geometry.arena_width - r);
        let y = rng.gen_range(r..=geometry.arena_height - r);
        let velocity = Vec2::new(
            random_component(max_speed, rng),
            random_component(max_speed, rng),
        );
        Self::new(Vec2::new(x, y), velocity, r)
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn inside_zone(&self) -> bool {
        self.inside_zone
    }

    pub fn set_inside_zone(&mut self, inside: bool) {
        self.inside_zone = inside;
    }

    /// Move one step and bounce off any wall the entity has run into.
    pub fn advance(&mut self, width: f64, height: f64) {
        self.position = vec2::add(self.position, self.velocity);
        bounce_axis(&mut self.position.x, &mut self.velocity.x, self.radius, width);
        bounce_axis(&mut self.position.y, &mut self.velocity.y, self.radius, height);
    }

    /// Circle-circle overlap with the zone. Touching exactly counts as outside.
    pub fn is_inside_zone(&self, zone_center: Vec2, zone_radius: f64) -> bool {
        vec2::distance(self.position, zone_center) < zone_radius + self.radius
    }
}

fn random_component(max_speed: u32, rng: &mut impl Rng) -> f64 {
    let magnitude = rng.gen_range(1..=max_speed.max(1)) as f64;
    if rng.gen_bool(0.5) {
        magnitude
    } else {
        -magnitude
    }
}

/// Reflect only when past a wall and still heading into it, so an entity
/// already turned around is never flipped back.
fn bounce_axis(pos: &mut f64, vel: &mut f64, radius: f64, extent: f64) {
    let low = radius;
    let high = extent - radius;
    if *pos < low && *vel < 0.0 {
        *pos = low;
        *vel = -*vel;
    } else if *pos > high && *vel > 0.0 {
        *pos = high;
        *vel = -*vel;
    }
}

use crate::vec2::Vec2;

/// Arena and zone geometry, sent to display clients on connect.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize, ts_rs::TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ZoneGeometry {
    pub arena_width: f64,
    pub arena_height: f64,
    /// Centre of the counted zone
    pub zone_center: Vec2,
    pub zone_radius: f64,
    pub entity_radius: f64,
    /// Occupancy floor. Leaving is held back while the count is at or below it.
    pub min_occupancy: u32,
    /// Occupancy ceiling. Entering is held back while the count is at or above it.
    pub max_occupancy: u32,
}

impl Default for ZoneGeometry {
    fn default() -> Self {
        Self {
            arena_width: 500.0,
            arena_height: 500.0,
            zone_center: Vec2::new(242.0, 230.0),
            zone_radius: 150.0,
            entity_radius: 5.0,
            min_occupancy: 2,
            max_occupancy: 4,
        }
    }
}

impl ZoneGeometry {
    pub fn validate(&self) -> Result<(), String> {
        if !self.entity_radius.is_finite() || self.entity_radius <= 0.0 {
            return Err("entity_radius must be finite and > 0".to_string());
        }
        if !self.arena_width.is_finite() || self.arena_width <= 2.0 * self.entity_radius {
            return Err("arena_width must be finite and wider than one entity".to_string());
        }
        if !self.arena_height.is_finite() || self.arena_height <= 2.0 * self.entity_radius {
            return Err("arena_height must be finite and taller than one entity".to_string());
        }
        if !self.zone_radius.is_finite() || self.zone_radius <= 0.0 {
            return Err("zone_radius must be finite and > 0".to_string());
        }
        if !self.zone_center.x.is_finite() || !self.zone_center.y.is_finite() {
            return Err("zone_center must be finite".to_string());
        }
        if self.min_occupancy >= self.max_occupancy {
            return Err("min_occupancy must be < max_occupancy".to_string());
        }
        Ok(())
    }
}

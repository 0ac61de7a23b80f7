use std::str::FromStr;

use crate::pacing::{DEFAULT_PACING_MS, MAX_PACING_MS, MIN_PACING_MS};
use zone_shared::config::ZoneGeometry;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Snapshot broadcasts per second
    pub broadcast_rate_hz: u32,
    pub rng_seed: u64,
    pub initial_pacing_ms: u32,
    /// Entities spawned when the simulation loop starts
    pub initial_entities: u32,
    /// Largest per-axis speed given to spawned entities (units per step)
    pub max_speed: u32,
    pub geometry: ZoneGeometry,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:9002".to_string(),
            broadcast_rate_hz: 25,
            rng_seed: 42,
            initial_pacing_ms: DEFAULT_PACING_MS,
            initial_entities: 0,
            max_speed: 5,
            geometry: ZoneGeometry::default(),
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by `ZONE_*` environment variables.
    pub fn from_env() -> Result<Self, String> {
        Self::default().with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from any key lookup. Unset keys keep their value;
    /// unparsable ones are an error.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, String> {
        if let Some(addr) = lookup("ZONE_LISTEN_ADDR") {
            self.listen_addr = addr;
        }
        override_parsed(&lookup, "ZONE_BROADCAST_RATE_HZ", &mut self.broadcast_rate_hz)?;
        override_parsed(&lookup, "ZONE_RNG_SEED", &mut self.rng_seed)?;
        override_parsed(&lookup, "ZONE_PACING_MS", &mut self.initial_pacing_ms)?;
        override_parsed(&lookup, "ZONE_INITIAL_ENTITIES", &mut self.initial_entities)?;
        override_parsed(&lookup, "ZONE_MAX_SPEED", &mut self.max_speed)?;
        override_parsed(&lookup, "ZONE_MIN_OCCUPANCY", &mut self.geometry.min_occupancy)?;
        override_parsed(&lookup, "ZONE_MAX_OCCUPANCY", &mut self.geometry.max_occupancy)?;
        Ok(self)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        self.geometry.validate()?;
        if self.broadcast_rate_hz == 0 {
            return Err("broadcast_rate_hz must be > 0".to_string());
        }
        if !(MIN_PACING_MS..=MAX_PACING_MS).contains(&self.initial_pacing_ms) {
            return Err(format!(
                "initial_pacing_ms must be within {}..={}",
                MIN_PACING_MS, MAX_PACING_MS
            ));
        }
        if self.max_speed == 0 {
            return Err("max_speed must be > 0".to_string());
        }
        Ok(())
    }
}

fn override_parsed<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    target: &mut T,
) -> Result<(), String> {
    if let Some(raw) = lookup(name) {
        *target = raw
            .trim()
            .parse()
            .map_err(|_| format!("{} has an invalid value: {:?}", name, raw))?;
    }
    Ok(())
}

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::config::ZoneGeometry;

/// Protocol version - increment when making breaking changes.
pub const PROTOCOL_VERSION: u32 = 1;

// === Server -> Client ===

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type")]
pub enum ServerMsg {
    #[serde(rename = "welcome")]
    Welcome(WelcomeMsg),
    #[serde(rename = "snapshot")]
    Snapshot(SnapshotMsg),
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct WelcomeMsg {
    pub protocol_version: u32,
    pub server_version: String,
    pub geometry: ZoneGeometry,
    pub snapshot: SnapshotMsg,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMsg {
    pub entities: Vec<EntityWire>,
    /// Occupancy as last published by the coordinator
    pub count: u32,
    pub pacing_ms: u32,
    pub min_occupancy: u32,
    pub max_occupancy: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct EntityWire {
    pub id: u32,
    pub pos: [f64; 2],
    pub radius: f64,
    /// Logical zone state; lags the geometry while a crossing is held back.
    pub inside: bool,
    pub phase: WorkerPhase,
}

/// What an entity's worker is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum WorkerPhase {
    Moving,
    /// Blocked in the coordinator waiting for room inside the zone
    Entering,
    /// Blocked in the coordinator waiting for the floor to allow an exit
    Leaving,
    /// Worker was interrupted and its loop has ended
    Stopped,
}

// === Client -> Server ===

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type")]
pub enum ClientMsg {
    #[serde(rename = "spawn")]
    Spawn,
    #[serde(rename = "adjust_pacing")]
    AdjustPacing { direction: PacingDirection },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum PacingDirection {
    /// Longer sleep between steps
    Up,
    /// Shorter sleep between steps
    Down,
}

/// Round to 2 decimal places; sub-pixel precision is plenty for display.
#[inline]
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

use crate::arena::EntityId;
use thiserror::Error;

/// A blocking wait or pacing sleep was cut short by the worker's interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("blocking call interrupted")]
pub struct Interrupted;

#[derive(Debug, Error)]
pub enum ArenaError {
    #[error("failed to start worker thread for entity {id}: {source}")]
    SpawnThread {
        id: EntityId,
        source: std::io::Error,
    },
}

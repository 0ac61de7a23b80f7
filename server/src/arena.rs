use crate::config::ServerConfig;
use crate::coordinator::OccupancyCoordinator;
use crate::entity::Entity;
use crate::error::ArenaError;
use crate::interrupt::Interrupt;
use crate::pacing::Pacing;
use crate::sync::lock;
use crate::worker::{EntityCell, Worker};
use rand_chacha::ChaCha8Rng;
use std::sync::{Arc, Mutex};
use zone_shared::config::ZoneGeometry;
use zone_shared::protocol::{round2, EntityWire, PacingDirection, SnapshotMsg, WorkerPhase};
use zone_shared::vec2::Vec2;

pub type EntityId = u32;

struct EntityHandle {
    cell: Arc<EntityCell>,
    interrupt: Arc<Interrupt>,
}

/// Composition root of one simulation: entities, their workers, the
/// occupancy coordinator and the shared pacing delay.
///
/// Entities are never removed; the list only grows.
pub struct Arena {
    geometry: ZoneGeometry,
    max_speed: u32,
    coordinator: Arc<OccupancyCoordinator>,
    pacing: Arc<Pacing>,
    /// Spawn order
    entities: Mutex<Vec<EntityHandle>>,
    rng: Mutex<ChaCha8Rng>,
}

/// Point-in-time copy of one entity.
#[derive(Debug, Clone)]
pub struct EntitySnapshot {
    pub id: EntityId,
    pub position: Vec2,
    pub radius: f64,
    pub inside: bool,
    pub phase: WorkerPhase,
}

/// Point-in-time copy of the arena. Entities are read one at a time, so the
/// copy may mix states a few steps apart while workers are running.
#[derive(Debug, Clone)]
pub struct ArenaSnapshot {
    pub entities: Vec<EntitySnapshot>,
    pub count: u32,
    pub pacing_ms: u32,
}

impl Arena {
    pub fn new(config: &ServerConfig) -> Self {
        use rand::SeedableRng;
        let geometry = config.geometry;
        Self {
            geometry,
            max_speed: config.max_speed,
            coordinator: Arc::new(OccupancyCoordinator::new(
                geometry.min_occupancy,
                geometry.max_occupancy,
            )),
            pacing: Arc::new(Pacing::new(config.initial_pacing_ms)),
            entities: Mutex::new(Vec::new()),
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(config.rng_seed)),
        }
    }

    pub fn geometry(&self) -> &ZoneGeometry {
        &self.geometry
    }

    pub fn coordinator(&self) -> &Arc<OccupancyCoordinator> {
        &self.coordinator
    }

    /// Spawn an entity at a random position and start its worker.
    pub fn spawn(&self) -> Result<EntityId, ArenaError> {
        let entity = {
            let mut rng = lock(&self.rng);
            Entity::random(&self.geometry, self.max_speed, &mut *rng)
        };
        self.spawn_entity(entity)
    }

    /// Start a worker for a caller-built entity. It begins outside the zone
    /// and uncounted regardless of where it is placed.
    pub fn spawn_entity(&self, mut entity: Entity) -> Result<EntityId, ArenaError> {
        entity.set_inside_zone(false);
        let mut entities = lock(&self.entities);
        let id = entities.len() as EntityId + 1;
        let position = entity.position;

        let cell = Arc::new(EntityCell::new(id, entity));
        let interrupt = Arc::new(Interrupt::new());
        Worker::new(
            Arc::clone(&cell),
            Arc::clone(&self.coordinator),
            Arc::clone(&self.pacing),
            Arc::clone(&interrupt),
            self.geometry,
        )
        .spawn()
        .map_err(|source| ArenaError::SpawnThread { id, source })?;

        entities.push(EntityHandle { cell, interrupt });
        tracing::info!(
            "Spawned entity {} at ({:.1}, {:.1}), {} total",
            id,
            position.x,
            position.y,
            entities.len()
        );
        Ok(id)
    }

    /// Step the pacing delay by one millisecond. Returns the new delay.
    pub fn adjust_pacing(&self, direction: PacingDirection) -> u32 {
        let delay = self.pacing.adjust(direction);
        tracing::debug!("Pacing adjusted {:?} to {}ms", direction, delay);
        delay
    }

    pub fn pacing_ms(&self) -> u32 {
        self.pacing.delay_ms()
    }

    pub fn entity_count(&self) -> usize {
        lock(&self.entities).len()
    }

    /// Interrupt one entity's worker. Its loop ends at the next blocking
    /// point; the entity stays in the arena. Returns false for unknown ids.
    pub fn interrupt(&self, id: EntityId) -> bool {
        let interrupt = {
            let entities = lock(&self.entities);
            match id.checked_sub(1).and_then(|i| entities.get(i as usize)) {
                Some(handle) => Arc::clone(&handle.interrupt),
                None => return false,
            }
        };
        interrupt.raise();
        self.coordinator.wake_all();
        true
    }

    pub fn snapshot(&self) -> ArenaSnapshot {
        let cells: Vec<Arc<EntityCell>> = lock(&self.entities)
            .iter()
            .map(|handle| Arc::clone(&handle.cell))
            .collect();

        let entities = cells
            .iter()
            .map(|cell| {
                let state = cell.state();
                EntitySnapshot {
                    id: cell.id(),
                    position: state.entity.position,
                    radius: state.entity.radius(),
                    inside: state.entity.inside_zone(),
                    phase: state.phase,
                }
            })
            .collect();

        ArenaSnapshot {
            entities,
            count: self.coordinator.count(),
            pacing_ms: self.pacing.delay_ms(),
        }
    }

    /// Snapshot for broadcasting
    pub fn snapshot_msg(&self) -> SnapshotMsg {
        self.snapshot().to_msg(&self.geometry)
    }
}

impl ArenaSnapshot {
    pub fn inside_count(&self) -> usize {
        self.entities.iter().filter(|e| e.inside).count()
    }

    pub fn to_msg(&self, geometry: &ZoneGeometry) -> SnapshotMsg {
        SnapshotMsg {
            entities: self.entities.iter().map(entity_wire).collect(),
            count: self.count,
            pacing_ms: self.pacing_ms,
            min_occupancy: geometry.min_occupancy,
            max_occupancy: geometry.max_occupancy,
        }
    }
}

fn entity_wire(entity: &EntitySnapshot) -> EntityWire {
    EntityWire {
        id: entity.id,
        pos: [round2(entity.position.x), round2(entity.position.y)],
        radius: entity.radius,
        inside: entity.inside,
        phase: entity.phase,
    }
}

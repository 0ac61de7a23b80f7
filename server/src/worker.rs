//! Per-entity control loop.
//!
//! Each worker owns one OS thread and runs forever: advance the entity,
//! test it against the zone, report a boundary crossing to the coordinator,
//! sleep for the shared pacing delay, repeat. The logical zone state flips
//! only after the coordinator accepts the crossing. Motion already happened
//! by then, so an entity held back by the coordinator is drawn past the
//! boundary while still counted on its old side.
//!
//! The only way out of the loop is an interrupt. It is logged and the worker
//! ends for good; its entity stays in the arena, frozen in place.

use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use zone_shared::config::ZoneGeometry;
use zone_shared::protocol::WorkerPhase;

use crate::arena::EntityId;
use crate::coordinator::{Crossing, OccupancyCoordinator};
use crate::entity::Entity;
use crate::error::Interrupted;
use crate::interrupt::Interrupt;
use crate::pacing::Pacing;
use crate::sync::lock;

/// Entity plus what its worker is doing, as seen by snapshot readers.
#[derive(Debug, Clone)]
pub struct EntityState {
    pub entity: Entity,
    pub phase: WorkerPhase,
}

/// An entity shared between its worker and snapshot readers.
#[derive(Debug)]
pub struct EntityCell {
    id: EntityId,
    state: Mutex<EntityState>,
}

impl EntityCell {
    pub fn new(id: EntityId, entity: Entity) -> Self {
        Self {
            id,
            state: Mutex::new(EntityState {
                entity,
                phase: WorkerPhase::Moving,
            }),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn lock(&self) -> MutexGuard<'_, EntityState> {
        lock(&self.state)
    }

    /// Copy of the current state, taken under the cell lock.
    pub fn state(&self) -> EntityState {
        self.lock().clone()
    }
}

pub struct Worker {
    cell: Arc<EntityCell>,
    coordinator: Arc<OccupancyCoordinator>,
    pacing: Arc<Pacing>,
    interrupt: Arc<Interrupt>,
    geometry: ZoneGeometry,
}

impl Worker {
    pub fn new(
        cell: Arc<EntityCell>,
        coordinator: Arc<OccupancyCoordinator>,
        pacing: Arc<Pacing>,
        interrupt: Arc<Interrupt>,
        geometry: ZoneGeometry,
    ) -> Self {
        Self {
            cell,
            coordinator,
            pacing,
            interrupt,
            geometry,
        }
    }

    /// Start the control loop on a named thread. Nothing ever joins it.
    pub fn spawn(self) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name(format!("entity-{}", self.cell.id()))
            .spawn(move || self.run())
    }

    /// Run until interrupted, then mark the entity stopped.
    pub fn run(self) {
        if let Err(interrupted) = self.run_loop() {
            tracing::warn!(
                "Entity {} worker stopped: {}",
                self.cell.id(),
                interrupted
            );
        }
        self.cell.lock().phase = WorkerPhase::Stopped;
    }

    fn run_loop(&self) -> Result<(), Interrupted> {
        loop {
            self.step()?;
            self.interrupt.sleep(self.pacing.delay())?;
        }
    }

    /// One cycle without the pacing sleep: move, detect a crossing, report it.
    /// Returns the crossing the coordinator accepted, if any.
    pub fn step(&self) -> Result<Option<Crossing>, Interrupted> {
        let crossing = {
            let mut state = self.cell.lock();
            state
                .entity
                .advance(self.geometry.arena_width, self.geometry.arena_height);
            let now_inside = state
                .entity
                .is_inside_zone(self.geometry.zone_center, self.geometry.zone_radius);
            if now_inside == state.entity.inside_zone() {
                return Ok(None);
            }
            let (crossing, waiting) = if now_inside {
                (Crossing::Enter, WorkerPhase::Entering)
            } else {
                (Crossing::Leave, WorkerPhase::Leaving)
            };
            state.phase = waiting;
            crossing
        };

        // The cell lock is released here so snapshots keep flowing while we wait.
        match crossing {
            Crossing::Enter => self.coordinator.enter_interruptible(&self.interrupt)?,
            Crossing::Leave => self.coordinator.leave_interruptible(&self.interrupt)?,
        }

        let mut state = self.cell.lock();
        state.entity.set_inside_zone(crossing == Crossing::Enter);
        state.phase = WorkerPhase::Moving;
        tracing::debug!("Entity {} crossing accepted: {:?}", self.cell.id(), crossing);
        Ok(Some(crossing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;
    use zone_shared::vec2::Vec2;

    struct Rig {
        cell: Arc<EntityCell>,
        coordinator: Arc<OccupancyCoordinator>,
        interrupt: Arc<Interrupt>,
        worker: Worker,
    }

    fn rig(entity: Entity, coordinator: Arc<OccupancyCoordinator>) -> Rig {
        let cell = Arc::new(EntityCell::new(1, entity));
        let interrupt = Arc::new(Interrupt::new());
        let worker = Worker::new(
            Arc::clone(&cell),
            Arc::clone(&coordinator),
            Arc::new(Pacing::new(1)),
            Arc::clone(&interrupt),
            ZoneGeometry::default(),
        );
        Rig {
            cell,
            coordinator,
            interrupt,
            worker,
        }
    }

    /// Default zone spans x in (92, 392) on the y = 230 line; heading right at 5/step.
    fn approaching_zone_from_left() -> Entity {
        Entity::new(Vec2::new(80.0, 230.0), Vec2::new(5.0, 1.0), 5.0)
    }

    #[test]
    fn no_crossing_while_far_from_zone() {
        let r = rig(
            Entity::new(Vec2::new(20.0, 20.0), Vec2::new(1.0, 1.0), 5.0),
            Arc::new(OccupancyCoordinator::new(2, 4)),
        );
        assert_eq!(r.worker.step(), Ok(None));
        assert_eq!(r.coordinator.count(), 0);
        assert_eq!(r.cell.state().phase, WorkerPhase::Moving);
    }

    #[test]
    fn entering_zone_is_counted_once() {
        let r = rig(
            approaching_zone_from_left(),
            Arc::new(OccupancyCoordinator::new(2, 4)),
        );
        let mut crossings = Vec::new();
        for _ in 0..10 {
            if let Some(c) = r.worker.step().unwrap() {
                crossings.push(c);
            }
        }
        assert_eq!(crossings, vec![Crossing::Enter]);
        assert_eq!(r.coordinator.count(), 1);
        assert!(r.cell.state().entity.inside_zone());
    }

    #[test]
    fn entity_already_overlapping_at_spawn_enters_on_first_step() {
        let r = rig(
            Entity::new(Vec2::new(242.0, 230.0), Vec2::new(1.0, 1.0), 5.0),
            Arc::new(OccupancyCoordinator::new(2, 4)),
        );
        assert_eq!(r.worker.step(), Ok(Some(Crossing::Enter)));
        assert_eq!(r.coordinator.count(), 1);
    }

    #[test]
    fn blocked_crossing_keeps_old_state_until_interrupted() {
        let coordinator = Arc::new(OccupancyCoordinator::new(2, 4));
        for _ in 0..4 {
            coordinator.enter();
        }
        let r = rig(approaching_zone_from_left(), Arc::clone(&coordinator));
        let cell = Arc::clone(&r.cell);
        let interrupt = Arc::clone(&r.interrupt);

        let (tx, rx) = mpsc::channel();
        let worker = r.worker;
        std::thread::spawn(move || {
            let mut outcome = Ok(None);
            for _ in 0..10 {
                outcome = worker.step();
                if outcome != Ok(None) {
                    break;
                }
            }
            let _ = tx.send(outcome);
        });

        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
        let state = cell.state();
        assert_eq!(state.phase, WorkerPhase::Entering);
        assert!(!state.entity.inside_zone());
        // Geometrically across the boundary already
        assert!(state
            .entity
            .is_inside_zone(Vec2::new(242.0, 230.0), 150.0));

        interrupt.raise();
        coordinator.wake_all();
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), Err(Interrupted));
        assert_eq!(coordinator.count(), 4);
        assert!(!cell.state().entity.inside_zone());
    }

    #[test]
    fn run_marks_entity_stopped_after_interrupt() {
        let r = rig(
            Entity::new(Vec2::new(20.0, 20.0), Vec2::new(1.0, 1.0), 5.0),
            Arc::new(OccupancyCoordinator::new(2, 4)),
        );
        let handle = r.worker.spawn().unwrap();
        std::thread::sleep(Duration::from_millis(30));
        r.interrupt.raise();
        handle.join().unwrap();
        assert_eq!(r.cell.state().phase, WorkerPhase::Stopped);
    }
}

use crate::arena::Arena;
use crate::config::ServerConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use zone_shared::protocol::{PacingDirection, SnapshotMsg, WelcomeMsg, PROTOCOL_VERSION};

/// Commands from client connections to the simulation loop
pub enum SimCommand {
    ClientJoin {
        response: oneshot::Sender<(u32, WelcomeMsg)>,
    },
    ClientLeave {
        id: u32,
    },
    Spawn,
    AdjustPacing {
        direction: PacingDirection,
    },
}

/// Broadcasts from the simulation loop to all clients
#[derive(Debug, Clone)]
pub enum SimBroadcast {
    Snapshot(SnapshotMsg),
}

/// Drive the arena from the async side: apply client commands and publish
/// snapshots at `broadcast_rate_hz`. The entities themselves run on their
/// own worker threads and keep moving if this loop ends.
pub async fn run_sim_loop(
    mut cmd_rx: mpsc::Receiver<SimCommand>,
    broadcast_tx: broadcast::Sender<SimBroadcast>,
    arena: Arc<Arena>,
    server_config: ServerConfig,
) {
    for _ in 0..server_config.initial_entities {
        if let Err(e) = arena.spawn() {
            tracing::error!("Initial spawn failed: {}", e);
            break;
        }
    }

    let broadcast_period = Duration::from_secs_f64(1.0 / server_config.broadcast_rate_hz as f64);
    let mut broadcast_interval = tokio::time::interval(broadcast_period);
    broadcast_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let mut next_client_id: u32 = 1;
    let mut clients: u32 = 0;

    loop {
        tokio::select! {
            _ = broadcast_interval.tick() => {
                // No receivers is fine; the snapshot is simply dropped.
                let _ = broadcast_tx.send(SimBroadcast::Snapshot(arena.snapshot_msg()));
            }

            Some(cmd) = cmd_rx.recv() => {
                match cmd {
                    SimCommand::ClientJoin { response } => {
                        let client_id = next_client_id;
                        next_client_id += 1;
                        let welcome = WelcomeMsg {
                            protocol_version: PROTOCOL_VERSION,
                            server_version: env!("CARGO_PKG_VERSION").to_string(),
                            geometry: *arena.geometry(),
                            snapshot: arena.snapshot_msg(),
                        };
                        if response.send((client_id, welcome)).is_ok() {
                            clients += 1;
                            tracing::info!("Client {} joined, {} connected", client_id, clients);
                        }
                    }
                    SimCommand::ClientLeave { id } => {
                        clients = clients.saturating_sub(1);
                        tracing::info!("Client {} left, {} connected", id, clients);
                    }
                    SimCommand::Spawn => {
                        if let Err(e) = arena.spawn() {
                            tracing::error!("Spawn failed: {}", e);
                        }
                    }
                    SimCommand::AdjustPacing { direction } => {
                        arena.adjust_pacing(direction);
                    }
                }
            }

            else => break,
        }
    }

    tracing::info!("Simulation loop ended");
}

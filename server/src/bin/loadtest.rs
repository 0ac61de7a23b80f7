//! Load test for the zone server.
//!
//! Spawns multiple fake WebSocket clients that:
//! - Connect to the server
//! - Periodically request new entities and nudge the pacing
//! - Receive snapshots and check the occupancy bounds on each one
//!
//! Usage: cargo run --bin loadtest -- [OPTIONS]
//!
//! Options:
//!   --clients N      Number of clients to spawn (default: 10)
//!   --duration S     Test duration in seconds (default: 30)
//!   --spawn-rate R   Spawn requests per second per client (default: 0.5)
//!   --url URL        Server URL (default: ws://127.0.0.1:9002/ws)

use futures_util::{SinkExt, StreamExt};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use zone_shared::protocol::{ClientMsg, PacingDirection, ServerMsg, SnapshotMsg};

// === Metrics ===

#[derive(Default)]
struct Metrics {
    connected: AtomicU64,
    snapshots_received: AtomicU64,
    spawns_sent: AtomicU64,
    pacing_sent: AtomicU64,
    errors: AtomicU64,
    /// Snapshots whose count exceeded max
    ceiling_violations: AtomicU64,
    /// Snapshots below min after the zone had already reached min
    floor_violations: AtomicU64,
    max_count_seen: AtomicU64,
    max_entities_seen: AtomicU64,
}

impl Metrics {
    fn record(&self, snapshot: &SnapshotMsg, floor_reached: &mut bool) {
        self.snapshots_received.fetch_add(1, Ordering::Relaxed);
        self.max_count_seen
            .fetch_max(snapshot.count as u64, Ordering::Relaxed);
        self.max_entities_seen
            .fetch_max(snapshot.entities.len() as u64, Ordering::Relaxed);

        if snapshot.count > snapshot.max_occupancy {
            self.ceiling_violations.fetch_add(1, Ordering::Relaxed);
        }
        if snapshot.count >= snapshot.min_occupancy {
            *floor_reached = true;
        } else if *floor_reached {
            self.floor_violations.fetch_add(1, Ordering::Relaxed);
        }
    }
}

// === Client task ===

async fn send(
    ws: &mut tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
    msg: &ClientMsg,
) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => ws.send(Message::Text(json.into())).await.is_ok(),
        Err(_) => false,
    }
}

async fn run_client(
    client_id: u32,
    url: String,
    spawn_rate: f64,
    duration: Duration,
    metrics: Arc<Metrics>,
) {
    let (mut ws, _) = match connect_async(&url).await {
        Ok(conn) => conn,
        Err(e) => {
            if client_id < 5 {
                eprintln!("Client {} failed to connect: {}", client_id, e);
            }
            metrics.errors.fetch_add(1, Ordering::Relaxed);
            return;
        }
    };
    metrics.connected.fetch_add(1, Ordering::Relaxed);

    // Wait for welcome message before doing anything else
    let welcome = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(msg) = ws.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    if let Ok(ServerMsg::Welcome(welcome)) = serde_json::from_str(&text) {
                        return Some(welcome);
                    }
                }
                Ok(Message::Close(_)) | Err(_) => return None,
                _ => {}
            }
        }
        None
    })
    .await;

    let mut floor_reached = match welcome {
        Ok(Some(welcome)) => {
            if client_id < 3 {
                eprintln!(
                    "Client {} welcomed: bounds [{}, {}], {} entities",
                    client_id,
                    welcome.geometry.min_occupancy,
                    welcome.geometry.max_occupancy,
                    welcome.snapshot.entities.len()
                );
            }
            welcome.snapshot.count >= welcome.geometry.min_occupancy
        }
        _ => {
            if client_id < 3 {
                eprintln!("Client {} never got a welcome", client_id);
            }
            metrics.errors.fetch_add(1, Ordering::Relaxed);
            metrics.connected.fetch_sub(1, Ordering::Relaxed);
            return;
        }
    };

    let spawn_interval = if spawn_rate > 0.0 {
        Duration::from_secs_f64(1.0 / spawn_rate)
    } else {
        Duration::from_secs(3600) // Effectively never
    };
    let mut spawn_timer = tokio::time::interval(spawn_interval);
    spawn_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut pacing_timer = tokio::time::interval(Duration::from_millis(500));
    pacing_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let mut rng = ChaCha8Rng::seed_from_u64(client_id as u64 * 12345 + 67890);
    let test_end = Instant::now() + duration;

    while Instant::now() < test_end {
        tokio::select! {
            _ = spawn_timer.tick() => {
                if send(&mut ws, &ClientMsg::Spawn).await {
                    metrics.spawns_sent.fetch_add(1, Ordering::Relaxed);
                } else {
                    metrics.errors.fetch_add(1, Ordering::Relaxed);
                    break;
                }
            }

            _ = pacing_timer.tick() => {
                let direction = if rng.gen_bool(0.5) {
                    PacingDirection::Up
                } else {
                    PacingDirection::Down
                };
                if send(&mut ws, &ClientMsg::AdjustPacing { direction }).await {
                    metrics.pacing_sent.fetch_add(1, Ordering::Relaxed);
                } else {
                    metrics.errors.fetch_add(1, Ordering::Relaxed);
                    break;
                }
            }

            msg = ws.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Ok(ServerMsg::Snapshot(snapshot)) = serde_json::from_str(&text) {
                            metrics.record(&snapshot, &mut floor_reached);
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        if client_id < 3 {
                            eprintln!("Client {} error: {}", client_id, e);
                        }
                        metrics.errors.fetch_add(1, Ordering::Relaxed);
                        break;
                    }
                    Some(_) => {}
                }
            }
        }
    }

    let _ = ws.close(None).await;
    metrics.connected.fetch_sub(1, Ordering::Relaxed);
}

// === Main ===

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();

    let mut num_clients: u32 = 10;
    let mut duration_secs: u64 = 30;
    let mut spawn_rate: f64 = 0.5;
    let mut url = "ws://127.0.0.1:9002/ws".to_string();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--clients" => {
                i += 1;
                num_clients = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(10);
            }
            "--duration" => {
                i += 1;
                duration_secs = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(30);
            }
            "--spawn-rate" => {
                i += 1;
                spawn_rate = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(0.5);
            }
            "--url" => {
                i += 1;
                url = args.get(i).cloned().unwrap_or(url);
            }
            _ => {}
        }
        i += 1;
    }

    println!("=== Zone Server Load Test ===");
    println!("Clients: {}", num_clients);
    println!("Duration: {}s", duration_secs);
    println!("Spawn rate: {}/s per client", spawn_rate);
    println!("URL: {}", url);
    println!();

    let metrics = Arc::new(Metrics::default());
    let duration = Duration::from_secs(duration_secs);

    let mut handles = Vec::with_capacity(num_clients as usize);
    for client_id in 0..num_clients {
        let url = url.clone();
        let metrics = Arc::clone(&metrics);
        handles.push(tokio::spawn(async move {
            run_client(client_id, url, spawn_rate, duration, metrics).await;
        }));
    }

    // Print stats periodically
    let metrics_clone = Arc::clone(&metrics);
    let stats_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(5));
        let start = Instant::now();
        loop {
            interval.tick().await;
            let m = &metrics_clone;
            println!(
                "[{:3}s] connected={}, snapshots={}, spawns={}, entities={}, max_count={}, violations={}/{}",
                start.elapsed().as_secs(),
                m.connected.load(Ordering::Relaxed),
                m.snapshots_received.load(Ordering::Relaxed),
                m.spawns_sent.load(Ordering::Relaxed),
                m.max_entities_seen.load(Ordering::Relaxed),
                m.max_count_seen.load(Ordering::Relaxed),
                m.ceiling_violations.load(Ordering::Relaxed),
                m.floor_violations.load(Ordering::Relaxed),
            );
        }
    });

    for handle in handles {
        let _ = handle.await;
    }
    stats_handle.abort();

    let ceiling = metrics.ceiling_violations.load(Ordering::Relaxed);
    let floor = metrics.floor_violations.load(Ordering::Relaxed);

    println!();
    println!("=== Final Results ===");
    println!("Snapshots received: {}", metrics.snapshots_received.load(Ordering::Relaxed));
    println!("Spawn requests sent: {}", metrics.spawns_sent.load(Ordering::Relaxed));
    println!("Pacing requests sent: {}", metrics.pacing_sent.load(Ordering::Relaxed));
    println!("Largest entity count seen: {}", metrics.max_entities_seen.load(Ordering::Relaxed));
    println!("Largest occupancy seen: {}", metrics.max_count_seen.load(Ordering::Relaxed));
    println!("Errors: {}", metrics.errors.load(Ordering::Relaxed));
    println!("Ceiling violations: {}", ceiling);
    println!("Floor violations: {}", floor);

    if ceiling > 0 || floor > 0 {
        println!("FAIL: occupancy left its bounds");
        std::process::exit(1);
    }
    println!("PASS");
}

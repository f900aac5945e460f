//! WFMS Coordinator: host simulator entry point.
//!
//! Runs the coordinator core against simulated hardware: stdin is the host
//! UART, stdout carries the protocol frames, and [`SimMesh`] plays the
//! radio stack.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  StdinTransport   LineSink<Stdout>   NvsAdapter   SimMesh      │
//! │  (Transport)      (HostSink)         (Config)     (Mesh)       │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │        CommandEngine  →  Coordinator (pure logic)       │    │
//! │  │  Valve · Policy · Network · Telemetry                  │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  EventQueue (mesh callbacks) · ButtonLatch (button ISRs)       │
//! └────────────────────────────────────────────────────────────────┘
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use log::{info, warn};

use wfms::adapters::log_sink::LineSink;
use wfms::adapters::nvs::NvsAdapter;
use wfms::adapters::sim_mesh::SimMesh;
use wfms::adapters::stdio::StdinTransport;
use wfms::adapters::time::MonotonicClock;
use wfms::app::ports::{ConfigPort, MeshTransport};
use wfms::app::service::Coordinator;
use wfms::config::SystemConfig;
use wfms::drivers::button::ButtonLatch;
use wfms::events::EventQueue;
use wfms::rpc::engine::CommandEngine;

/// Mesh callbacks → main loop.
static MESH_EVENTS: EventQueue = EventQueue::new();

/// Button ISRs (simulated by stdin directives) → main loop.
static BUTTONS: ButtonLatch = ButtonLatch::new();

/// Events handled per loop pass, so a chatty network cannot starve the
/// host link.
const MAX_EVENTS_PER_TICK: usize = 8;

fn init_logging() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("wfms=info,wfms_coordinator=info"));

    // stdout belongs to the protocol; diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

/// `WFMS_DATA_DIR`, else `wfms-data/` next to the executable.
fn data_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os("WFMS_DATA_DIR") {
        return Ok(dir.into());
    }
    let exe = std::env::current_exe().context("locating executable")?;
    let base = exe.parent().map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    Ok(base.join("wfms-data"))
}

fn main() -> Result<()> {
    // ── 1. Logging ────────────────────────────────────────────
    init_logging();
    info!("WFMS coordinator v{}", env!("CARGO_PKG_VERSION"));

    // ── 2. Load config (or defaults) ──────────────────────────
    let nvs = NvsAdapter::open(data_dir()?);
    let config = match nvs.load() {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("Config load failed ({}), using defaults", e);
            SystemConfig::default()
        }
    };
    let tick = Duration::from_millis(u64::from(config.tick_interval_ms));

    // ── 3. Adapters ───────────────────────────────────────────
    let clock = MonotonicClock::new();
    let mut mesh = SimMesh::new(&MESH_EVENTS);
    let mut host_rx = StdinTransport::spawn(&BUTTONS).context("spawning host reader")?;
    let mut sink = LineSink::new(std::io::stdout());

    // ── 4. Core ───────────────────────────────────────────────
    let mut engine = CommandEngine::new(&config);
    let mut app = Coordinator::new(config, mesh.network_state());
    app.start(clock.now_ms(), &mesh, &mut sink);

    // ── 5. Main loop ──────────────────────────────────────────
    loop {
        let now = clock.now_ms();

        mesh.step(now);
        for _ in 0..MAX_EVENTS_PER_TICK {
            let Some(event) = MESH_EVENTS.pop() else {
                break;
            };
            app.handle_event(event, now, &mut mesh, &mut sink);
        }

        engine.poll(&mut host_rx, now, &mut app, &mut mesh, &mut sink);
        app.tick(now, &BUTTONS, &mut mesh, &mut sink);
        app.auto_save_if_needed(now, &nvs);

        // Let an in-flight valve command settle before exiting.
        if host_rx.is_closed() && !app.valve().is_busy() {
            info!("Host link closed after {} s", clock.uptime_secs());
            break;
        }
        std::thread::sleep(tick);
    }

    if engine.overflows() > 0 {
        warn!("{} over-long command lines were discarded", engine.overflows());
    }
    app.force_save_if_dirty(&nvs);
    Ok(())
}

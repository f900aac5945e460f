//! Command engine: dispatches host command lines to the Coordinator.
//!
//! The engine owns the line framer and the command guard.  The main loop
//! calls [`poll`](CommandEngine::poll) each tick with the host transport;
//! complete lines are copied out of the framer and run through a gate
//! pipeline:
//!
//! 1. **Duplicate gate**: a repeated id inside the dedup window is
//!    logged and dropped without acknowledgment.
//! 2. **Operation gate**: missing or unknown `op` is rejected.
//! 3. **Debounce gate**: `mode_set` / `valve_set` faster than the
//!    debounce interval is rejected with `debounced`.
//! 4. **Mode gate**: `valve_set` is refused while the policy is in charge.
//!
//! Survivors are parsed into a [`HostCommand`] and executed.

use log::{debug, warn};

use crate::app::commands::{HostCommand, Op};
use crate::app::events::{HostFrame, LogFrame};
use crate::app::ports::{HostSink, MeshTransport};
use crate::app::service::Coordinator;
use crate::config::SystemConfig;
use crate::control::policy::ControlMode;
use crate::error::CommandError;

use super::codec::{COMMAND_MARKER, LINE_MAX, LineFramer};
use super::fields::CommandFields;
use super::guard::CommandGuard;
use super::transport::Transport;

/// Bytes requested from the transport per read.
const READ_CHUNK: usize = 64;

/// Upper bound on reads per poll so a flooding host cannot starve the loop.
const MAX_READS_PER_POLL: usize = 8;

/// Host command dispatcher.
pub struct CommandEngine {
    framer: LineFramer,
    guard: CommandGuard,
}

impl CommandEngine {
    pub fn new(config: &SystemConfig) -> Self {
        Self {
            framer: LineFramer::new(),
            guard: CommandGuard::new(config.dedup_window_ms, config.debounce_ms),
        }
    }

    /// Drain available host bytes and dispatch every complete command
    /// line.  Does nothing while the gateway is disabled, and drops any
    /// partial line when it comes back on.  Returns the number of lines
    /// dispatched.
    pub fn poll(
        &mut self,
        transport: &mut impl Transport,
        now_ms: u32,
        app: &mut Coordinator,
        mesh: &mut impl MeshTransport,
        sink: &mut impl HostSink,
    ) -> usize {
        if !app.gateway_enabled() {
            return 0;
        }
        if app.take_link_resumed() {
            self.framer.reset();
        }

        let mut dispatched = 0;
        let mut chunk = [0u8; READ_CHUNK];
        for _ in 0..MAX_READS_PER_POLL {
            let n = match transport.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    warn!("host link read failed: {:?}", e);
                    break;
                }
            };

            for &byte in &chunk[..n] {
                let Some(line) = self.framer.push(byte) else {
                    continue;
                };
                // Copy out so the framer is free while the command runs.
                let mut line_copy = [0u8; LINE_MAX];
                let len = line.len().min(LINE_MAX);
                line_copy[..len].copy_from_slice(&line[..len]);
                self.handle_line(&line_copy[..len], now_ms, app, mesh, sink);
                dispatched += 1;
                if !app.gateway_enabled() {
                    // Rest of the chunk is ignored like any input while off.
                    return dispatched;
                }
            }
        }
        dispatched
    }

    /// Run one complete line (marker included) through the gates.
    pub fn handle_line(
        &mut self,
        line: &[u8],
        now_ms: u32,
        app: &mut Coordinator,
        mesh: &mut impl MeshTransport,
        sink: &mut impl HostSink,
    ) {
        let Some(body) = line.strip_prefix(COMMAND_MARKER) else {
            return;
        };
        let Ok(body) = core::str::from_utf8(body) else {
            warn!("dropping non-UTF-8 command line ({} bytes)", line.len());
            return;
        };

        let fields = CommandFields::parse(body);
        let id = fields.id();

        // ── Gate 1: Duplicate id ──────────────────────────────
        if self.guard.is_duplicate(id, now_ms) {
            debug!("duplicate command {id} dropped");
            sink.emit(&HostFrame::Log(
                LogFrame::new("CMD", "duplicate")
                    .with("id", id)
                    .with("ignored", true),
            ));
            return;
        }

        // ── Gate 2: Operation ─────────────────────────────────
        let Some(op_name) = fields.str("op") else {
            return app.reject(id, CommandError::MissingOp, sink);
        };
        let Some(op) = Op::parse(op_name) else {
            debug!("unknown op {op_name:?}");
            return app.reject(id, CommandError::UnknownOp, sink);
        };

        // ── Gate 3: Debounce ──────────────────────────────────
        if let Some(class) = op.debounce_class() {
            if !self.guard.admit(class, now_ms) {
                return app.reject(id, CommandError::Debounced, sink);
            }
        }

        // ── Gate 4: Mode ──────────────────────────────────────
        if op == Op::ValveSet && app.mode() == ControlMode::Auto {
            return app.reject(id, CommandError::AutoMode, sink);
        }

        // ── Dispatch ──────────────────────────────────────────
        match HostCommand::parse(op, &fields) {
            Ok(cmd) => {
                debug!("command {id}: {}", op.as_str());
                app.execute(id, cmd, now_ms, mesh, sink);
            }
            Err(e) => app.reject(id, e, sink),
        }
    }

    /// Lines discarded for exceeding the line buffer.
    pub fn overflows(&self) -> u32 {
        self.framer.overflows()
    }
}

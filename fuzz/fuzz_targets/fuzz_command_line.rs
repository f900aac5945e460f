//! Fuzz target: `CommandEngine::handle_line`
//!
//! Feeds arbitrary command bodies through the full gate chain against the
//! simulated mesh.  Any panic in field parsing, validation or dispatch is
//! a finding.
//!
//! cargo fuzz run fuzz_command_line

#![no_main]

use libfuzzer_sys::fuzz_target;
use wfms::adapters::log_sink::LineSink;
use wfms::adapters::sim_mesh::SimMesh;
use wfms::app::ports::MeshTransport;
use wfms::app::service::Coordinator;
use wfms::config::SystemConfig;
use wfms::events::EventQueue;
use wfms::rpc::codec::COMMAND_MARKER;
use wfms::rpc::engine::CommandEngine;

static EVENTS: EventQueue = EventQueue::new();

fuzz_target!(|data: &[u8]| {
    let config = SystemConfig::default();
    let mut mesh = SimMesh::new(&EVENTS);
    let mut sink = LineSink::new(std::io::sink());
    let mut engine = CommandEngine::new(&config);
    let mut app = Coordinator::new(config, mesh.network_state());
    app.start(0, &mesh, &mut sink);

    let mut line = COMMAND_MARKER.to_vec();
    line.push(b' ');
    line.extend_from_slice(data);
    engine.handle_line(&line, 1_000, &mut app, &mut mesh, &mut sink);

    // Replaying the same line is either a duplicate or a fresh command.
    engine.handle_line(&line, 1_100, &mut app, &mut mesh, &mut sink);

    while EVENTS.pop().is_some() {}
});

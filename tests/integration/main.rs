//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against the recording mesh and sink.  All tests run on the host with no
//! radio required.

mod dispatch_tests;
mod mock_mesh;
mod network_flow_tests;

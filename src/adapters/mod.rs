//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements         | Connects to                   |
//! |-------------|--------------------|-------------------------------|
//! | `log_sink`  | HostSink           | Any `io::Write` (stdout/UART) |
//! | `nvs`       | ConfigPort         | File-backed blob store        |
//! |             | StoragePort        |                               |
//! | `sim_mesh`  | MeshTransport      | Simulated radio stack         |
//! | `stdio`     | Transport          | stdin reader thread           |
//! | `time`      | -                  | Monotonic millisecond clock   |

pub mod log_sink;
pub mod nvs;
pub mod sim_mesh;
pub mod stdio;
pub mod time;

//! Fuzz target: `LineFramer::push`
//!
//! Drives arbitrary host bytes through the line framer and asserts that
//! every yielded line is a bounded command line, and that a reset always
//! leaves it ready for the next line.
//!
//! cargo fuzz run fuzz_line_framer

#![no_main]

use libfuzzer_sys::fuzz_target;
use wfms::rpc::codec::{COMMAND_MARKER, LINE_MAX, LineFramer};

fuzz_target!(|data: &[u8]| {
    let mut framer = LineFramer::new();

    for &byte in data {
        if let Some(line) = framer.push(byte) {
            assert!(line.starts_with(COMMAND_MARKER), "yielded a non-command line");
            assert!(line.len() < LINE_MAX, "line exceeds buffer");
            assert!(!line.contains(&b'\n'), "terminator leaked into line");
        }
    }

    framer.reset();
    assert_eq!(framer.pending(), 0);
    let mut yielded = false;
    for &byte in b"@CMD {}\n" {
        yielded |= framer.push(byte).is_some();
    }
    assert!(yielded, "framer must accept a clean line after reset");
});

//! Line framer for the host protocol.
//!
//! Wire format:
//! ```text
//! @CMD {"id":7,"op":"info"}\r\n
//! └──┘ └──────────────────┘
//! marker      body          '\r' ignored, '\n' terminates
//! ```
//!
//! Bytes are accumulated into a fixed buffer until a newline.  Only
//! complete lines that begin with the command marker are yielded; anything
//! else (echoes, diagnostics, blank lines) is dropped.  A line that grows
//! past the buffer is discarded and accumulation restarts from the next
//! byte, so a host that never terminates its lines cannot exhaust memory.

use heapless::Vec;

/// Line buffer size, including room for a terminator.
pub const LINE_MAX: usize = 220;

/// Reserved prefix of host command frames.
pub const COMMAND_MARKER: &[u8] = b"@CMD";

/// Streaming line assembler.
pub struct LineFramer {
    buf: Vec<u8, LINE_MAX>,
    /// The previous call yielded `buf`; clear it before accepting more.
    yielded: bool,
    overflows: u32,
}

impl LineFramer {
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            yielded: false,
            overflows: 0,
        }
    }

    /// Feed one byte.
    ///
    /// Returns `Some(line)` when `byte` completes a command line.  The line
    /// still carries the marker and is valid until the next call.
    pub fn push(&mut self, byte: u8) -> Option<&[u8]> {
        if self.yielded {
            self.buf.clear();
            self.yielded = false;
        }

        match byte {
            b'\r' => None,
            b'\n' => {
                if self.buf.is_empty() {
                    return None;
                }
                if self.buf.starts_with(COMMAND_MARKER) {
                    self.yielded = true;
                    Some(&self.buf)
                } else {
                    self.buf.clear();
                    None
                }
            }
            _ => {
                if self.buf.len() + 1 < LINE_MAX {
                    // Capacity checked above.
                    let _ = self.buf.push(byte);
                } else {
                    self.buf.clear();
                    self.overflows = self.overflows.wrapping_add(1);
                }
                None
            }
        }
    }

    /// Bytes currently held for an unterminated line.
    pub fn pending(&self) -> usize {
        if self.yielded { 0 } else { self.buf.len() }
    }

    /// Number of lines discarded for exceeding [`LINE_MAX`].
    pub fn overflows(&self) -> u32 {
        self.overflows
    }

    /// Drop any partial line.  Called when the gateway is re-enabled.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.yielded = false;
    }
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new()
    }
}

//! Line-protocol host sink adapter.
//!
//! Implements [`HostSink`] by writing each frame as
//! `@PREFIX <compact JSON>\r\n` to any [`std::io::Write`] (stdout on the
//! simulator, the UART on the board).  Delivery is best effort: a failed
//! write is logged and the frame is dropped.

use std::io::Write;

use log::warn;

use crate::app::events::HostFrame;
use crate::app::ports::HostSink;

/// Adapter that writes every [`HostFrame`] as one protocol line.
pub struct LineSink<W: Write> {
    out: W,
}

impl<W: Write> LineSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> HostSink for LineSink<W> {
    fn emit(&mut self, frame: &HostFrame) {
        let line = match frame.to_line() {
            Ok(line) => line,
            Err(e) => {
                warn!("dropping {} frame: {}", frame.prefix(), e);
                return;
            }
        };
        let written = self
            .out
            .write_all(line.as_bytes())
            .and_then(|()| self.out.write_all(b"\r\n"))
            .and_then(|()| self.out.flush());
        if let Err(e) = written {
            warn!("host link write failed: {}", e);
        }
    }
}

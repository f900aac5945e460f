//! Standard-input host link for the simulator.
//!
//! A reader thread pulls lines off stdin and hands them to the main loop
//! through an `mpsc` channel, so [`Transport::read`] never blocks.  Lines
//! beginning with `!` are simulator directives that stand in for the
//! board's push buttons and never reach the command engine:
//!
//! | Line       | Button gesture          |
//! |------------|-------------------------|
//! | `!pb0`     | primary short press     |
//! | `!pb0long` | primary long press      |
//! | `!pb1`     | secondary press         |

use std::collections::VecDeque;
use std::io::{BufRead, Read};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use log::{debug, info, warn};

use crate::drivers::button::{ButtonAction, ButtonLatch};
use crate::rpc::transport::Transport;

/// Map a directive line to the button action it simulates.
pub fn directive(line: &[u8]) -> Option<ButtonAction> {
    match line.trim_ascii() {
        b"!pb0" => Some(ButtonAction::FormNetwork),
        b"!pb0long" => Some(ButtonAction::ToggleGateway),
        b"!pb1" => Some(ButtonAction::OpenJoinWindow),
        _ => None,
    }
}

/// Non-blocking byte source fed by a background line reader.
pub struct StdinTransport {
    rx: Receiver<Vec<u8>>,
    pending: VecDeque<u8>,
    closed: bool,
}

impl StdinTransport {
    /// Spawn the reader over process stdin.
    pub fn spawn(buttons: &'static ButtonLatch) -> std::io::Result<Self> {
        Self::spawn_reader(std::io::stdin(), buttons)
    }

    /// Spawn the reader over any byte source.
    pub fn spawn_reader<R>(input: R, buttons: &'static ButtonLatch) -> std::io::Result<Self>
    where
        R: Read + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("host-rx".into())
            .spawn(move || {
                let mut reader = std::io::BufReader::new(input);
                let mut line = Vec::new();
                loop {
                    line.clear();
                    match reader.read_until(b'\n', &mut line) {
                        Ok(0) => break,
                        Ok(_) => {}
                        Err(e) => {
                            warn!("host-rx: read failed: {}", e);
                            break;
                        }
                    }
                    if let Some(action) = directive(&line) {
                        debug!("host-rx: button {:?}", action);
                        buttons.raise(action);
                        continue;
                    }
                    if tx.send(line.clone()).is_err() {
                        break;
                    }
                }
                info!("host-rx: input closed");
            })?;

        Ok(Self {
            rx,
            pending: VecDeque::new(),
            closed: false,
        })
    }

    /// `true` once the input has ended and every byte has been read.
    pub fn is_closed(&self) -> bool {
        self.closed && self.pending.is_empty()
    }

    fn fill(&mut self) {
        loop {
            match self.rx.try_recv() {
                Ok(bytes) => self.pending.extend(bytes),
                Err(TryRecvError::Empty) => return,
                Err(TryRecvError::Disconnected) => {
                    self.closed = true;
                    return;
                }
            }
        }
    }
}

impl Transport for StdinTransport {
    type Error = core::convert::Infallible;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if self.pending.len() < buf.len() {
            self.fill();
        }
        Transport::read(&mut self.pending, buf)
    }
}

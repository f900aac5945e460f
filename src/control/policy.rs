//! Hysteresis auto-control policy.
//!
//! ```text
//!  flow ▲
//!       │ ─ ─ ─ ─ ─ ─ close_th ─ ─   open valve + flow above → CLOSE
//!       │      dead band (hold)
//!       │ ─ ─ ─ ─ ─ ─ open_th  ─ ─   closed valve + flow below → OPEN
//!       └──────────────────────────▶
//! ```
//!
//! The decision is a pure function of mode, confirmed valve state, flow
//! and thresholds.  Acting on it (and coping with a busy controller) is
//! the caller's job.

use serde::{Deserialize, Serialize};

use crate::error::ThresholdError;

/// Who may drive the valve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlMode {
    /// The policy issues valve commands; manual `valve_set` is refused.
    Auto,
    /// Only the host commands the valve.
    #[default]
    Manual,
}

impl ControlMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "auto" => Some(Self::Auto),
            "manual" => Some(Self::Manual),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Manual => "manual",
        }
    }
}

/// Close / open flow thresholds.  `open < close` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    close: u16,
    open: u16,
}

impl Thresholds {
    pub const DEFAULT_CLOSE: u16 = 60;
    pub const DEFAULT_OPEN: u16 = 5;

    pub fn new(close: u16, open: u16) -> Result<Self, ThresholdError> {
        if open >= close {
            return Err(ThresholdError::NotOrdered);
        }
        Ok(Self { close, open })
    }

    /// Validate host-supplied values: ordering first, then range.
    pub fn from_raw(close: u64, open: u64) -> Result<Self, ThresholdError> {
        if open >= close {
            return Err(ThresholdError::NotOrdered);
        }
        let close = u16::try_from(close).map_err(|_| ThresholdError::OutOfRange)?;
        let open = u16::try_from(open).map_err(|_| ThresholdError::OutOfRange)?;
        Self::new(close, open)
    }

    pub fn close(&self) -> u16 {
        self.close
    }

    pub fn open(&self) -> u16 {
        self.open
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            close: Self::DEFAULT_CLOSE,
            open: Self::DEFAULT_OPEN,
        }
    }
}

/// What the policy wants done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Open,
    Close,
    Hold,
}

/// Evaluate the policy against the current state.
pub fn evaluate(mode: ControlMode, valve_open: bool, flow: u16, th: &Thresholds) -> Decision {
    if mode != ControlMode::Auto {
        return Decision::Hold;
    }
    if valve_open {
        if flow > th.close {
            return Decision::Close;
        }
    } else if flow < th.open {
        return Decision::Open;
    }
    Decision::Hold
}

//! Deferred button actions.
//!
//! ## Contract
//!
//! Button edges arrive in interrupt context, where the mesh transport
//! must not be called.  The ISR half of [`ButtonLatch`] only classifies
//! the press and sets an atomic flag; the main loop drains the flags with
//! [`ButtonLatch::take`] on its next tick and performs the action there.
//!
//! | Button    | Gesture                      | Action                    |
//! |-----------|------------------------------|---------------------------|
//! | Primary   | Release after < 1.5 s        | `FormNetwork`             |
//! | Primary   | Release after >= 1.5 s       | `ToggleGateway`           |
//! | Secondary | Press (2 s re-trigger guard) | `OpenJoinWindow`          |

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Hold time separating a short from a long primary press.
pub const LONG_PRESS_MS: u32 = 1500;

/// Secondary presses closer together than this are ignored.
pub const SECONDARY_RETRIGGER_MS: u32 = 2000;

/// Work deferred from interrupt context to the main loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonAction {
    /// Enable or disable the host UART gateway.
    ToggleGateway,
    /// Form a network with the current configuration (never forced).
    FormNetwork,
    /// Permit joining for one join window.
    OpenJoinWindow,
}

/// Interrupt-safe pending-action flags.
pub struct ButtonLatch {
    primary_down_ms: AtomicU32,
    secondary_last_ms: AtomicU32,
    secondary_seen: AtomicBool,
    toggle_gateway: AtomicBool,
    form_network: AtomicBool,
    open_join: AtomicBool,
}

impl ButtonLatch {
    pub const fn new() -> Self {
        Self {
            primary_down_ms: AtomicU32::new(0),
            secondary_last_ms: AtomicU32::new(0),
            secondary_seen: AtomicBool::new(false),
            toggle_gateway: AtomicBool::new(false),
            form_network: AtomicBool::new(false),
            open_join: AtomicBool::new(false),
        }
    }

    // ── ISR side ──────────────────────────────────────────────

    /// Primary button pressed.  Safe to call from interrupt context.
    pub fn primary_pressed(&self, now_ms: u32) {
        self.primary_down_ms.store(now_ms, Ordering::Release);
    }

    /// Primary button released.  Safe to call from interrupt context.
    pub fn primary_released(&self, now_ms: u32) {
        let held = now_ms.wrapping_sub(self.primary_down_ms.load(Ordering::Acquire));
        if held >= LONG_PRESS_MS {
            self.raise(ButtonAction::ToggleGateway);
        } else {
            self.raise(ButtonAction::FormNetwork);
        }
    }

    /// Secondary button pressed.  Safe to call from interrupt context.
    pub fn secondary_pressed(&self, now_ms: u32) {
        let last = self.secondary_last_ms.load(Ordering::Acquire);
        if self.secondary_seen.load(Ordering::Acquire)
            && now_ms.wrapping_sub(last) < SECONDARY_RETRIGGER_MS
        {
            return;
        }
        self.secondary_last_ms.store(now_ms, Ordering::Release);
        self.secondary_seen.store(true, Ordering::Release);
        self.raise(ButtonAction::OpenJoinWindow);
    }

    /// Set the pending flag for `action` directly.
    pub fn raise(&self, action: ButtonAction) {
        self.flag(action).store(true, Ordering::Release);
    }

    // ── Main-loop side ────────────────────────────────────────

    /// Take the next pending action, clearing its flag.
    pub fn take(&self) -> Option<ButtonAction> {
        [
            ButtonAction::ToggleGateway,
            ButtonAction::FormNetwork,
            ButtonAction::OpenJoinWindow,
        ]
        .into_iter()
        .find(|a| self.flag(*a).swap(false, Ordering::AcqRel))
    }

    fn flag(&self, action: ButtonAction) -> &AtomicBool {
        match action {
            ButtonAction::ToggleGateway => &self.toggle_gateway,
            ButtonAction::FormNetwork => &self.form_network,
            ButtonAction::OpenJoinWindow => &self.open_join,
        }
    }
}

impl Default for ButtonLatch {
    fn default() -> Self {
        Self::new()
    }
}

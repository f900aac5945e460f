//! Duplicate suppression and per-class debounce for host commands.
//!
//! Two independent gates protect the coordinator from a noisy host:
//!
//! 1. **Dedup**: the most recent command id and its arrival time are
//!    remembered; the same id again inside the dedup window is dropped
//!    silently.  Only one id is tracked, not a history.
//! 2. **Debounce**: each debounced operation class remembers when it was
//!    last admitted; a repeat faster than the debounce interval is refused
//!    with an explicit "debounced" acknowledgment.

/// Host command identifier as echoed in acknowledgments.
pub type CommandId = i64;

/// Sentinel for a missing or unparsable id.  Never deduplicated.
pub const NO_ID: CommandId = -1;

/// Id reserved for commands the coordinator issues on its own behalf.
pub const INTERNAL_ID: CommandId = 0;

/// Operation classes subject to debounce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceClass {
    ModeSet,
    ValveSet,
}

impl DebounceClass {
    const COUNT: usize = 2;

    fn slot(self) -> usize {
        match self {
            Self::ModeSet => 0,
            Self::ValveSet => 1,
        }
    }
}

/// Recent-command ledger plus debounce timestamps.
#[derive(Debug, Clone)]
pub struct CommandGuard {
    dedup_window_ms: u32,
    debounce_ms: u32,
    last_id: Option<(CommandId, u32)>,
    last_admitted: [Option<u32>; DebounceClass::COUNT],
}

impl CommandGuard {
    pub fn new(dedup_window_ms: u32, debounce_ms: u32) -> Self {
        Self {
            dedup_window_ms,
            debounce_ms,
            last_id: None,
            last_admitted: [None; DebounceClass::COUNT],
        }
    }

    /// `true` if `id` repeats the last seen id inside the dedup window.
    /// Otherwise records `id` as the most recent and returns `false`.
    pub fn is_duplicate(&mut self, id: CommandId, now_ms: u32) -> bool {
        if id == NO_ID {
            return false;
        }
        if let Some((last, at)) = self.last_id {
            if last == id && now_ms.wrapping_sub(at) < self.dedup_window_ms {
                return true;
            }
        }
        self.last_id = Some((id, now_ms));
        false
    }

    /// `true` if `class` may run now (and records the admission); `false`
    /// if it arrived inside the debounce interval.
    pub fn admit(&mut self, class: DebounceClass, now_ms: u32) -> bool {
        let slot = &mut self.last_admitted[class.slot()];
        if let Some(at) = *slot {
            if now_ms.wrapping_sub(at) < self.debounce_ms {
                return false;
            }
        }
        *slot = Some(now_ms);
        true
    }
}

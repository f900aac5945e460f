//! Unified error types for the coordinator.
//!
//! Every rejection the coordinator can hand back to the host is one of
//! these variants.  The `Display` text of each subsystem error is the
//! acknowledgment message the host sees, so the wording is part of the
//! line protocol.  All variants are `Copy` so they can travel through the
//! dispatcher without allocation.

use core::fmt;

use crate::mesh::MeshStatus;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible coordinator operation funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A valve command could not be submitted.
    Valve(ValveError),
    /// A network lifecycle request was refused.
    Network(NetError),
    /// A host command was malformed or not allowed.
    Command(CommandError),
    /// A threshold write violated the ordering or range rules.
    Threshold(ThresholdError),
}

impl Error {
    /// The bare message carried in a failure acknowledgment.
    pub fn ack_message(&self) -> &dyn fmt::Display {
        match self {
            Self::Valve(e) => e,
            Self::Network(e) => e,
            Self::Command(e) => e,
            Self::Threshold(e) => e,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valve(e) => write!(f, "valve: {e}"),
            Self::Network(e) => write!(f, "network: {e}"),
            Self::Command(e) => write!(f, "command: {e}"),
            Self::Threshold(e) => write!(f, "threshold: {e}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Valve errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValveError {
    /// The coordinator is not part of a network.
    NotJoined,
    /// Another valve command is still awaiting its completion.
    Busy,
    /// Direct addressing was required but no valve address is known.
    DirectNeedsAddress,
    /// The transport refused the submission outright.
    SendFailed(MeshStatus),
}

impl ValveError {
    /// Short machine-readable reason used in log frames.
    pub fn reason(self) -> &'static str {
        match self {
            Self::NotJoined => "not_joined",
            Self::Busy => "tx_pending",
            Self::DirectNeedsAddress => "direct_requires_node_id",
            Self::SendFailed(_) => "send_fail",
        }
    }
}

impl fmt::Display for ValveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotJoined => write!(f, "not joined"),
            Self::Busy => write!(f, "busy: tx_pending"),
            Self::DirectNeedsAddress => write!(f, "direct requires known valve address"),
            Self::SendFailed(status) => write!(f, "send_fail_immediate:{status}"),
        }
    }
}

impl From<ValveError> for Error {
    fn from(e: ValveError) -> Self {
        Self::Valve(e)
    }
}

// ---------------------------------------------------------------------------
// Network errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetError {
    /// Formation requested while joined, without `force`.
    AlreadyInNetwork,
    /// A formation or leave-for-reform is already under way.
    TransitionInProgress,
    /// The operation needs a joined network.
    NotJoined,
    /// The transport refused the request.
    Transport(MeshStatus),
}

impl NetError {
    pub fn reason(self) -> &'static str {
        match self {
            Self::AlreadyInNetwork => "already_in_network",
            Self::TransitionInProgress => "transition_in_progress",
            Self::NotJoined => "not_in_network",
            Self::Transport(_) => "transport_error",
        }
    }
}

impl fmt::Display for NetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyInNetwork => write!(f, "already in network"),
            Self::TransitionInProgress => write!(f, "busy: network transition in progress"),
            Self::NotJoined => write!(f, "not joined"),
            Self::Transport(status) => write!(f, "transport error {status}"),
        }
    }
}

impl From<NetError> for Error {
    fn from(e: NetError) -> Self {
        Self::Network(e)
    }
}

// ---------------------------------------------------------------------------
// Command errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// No `op` field in the frame.
    MissingOp,
    /// `op` names nothing the dispatcher knows.
    UnknownOp,
    /// A required field is absent.  Carries the field name.
    Missing(&'static str),
    /// A field is present but its value is unacceptable.  Carries the
    /// complete message.
    Invalid(&'static str),
    /// Same operation class repeated inside the debounce interval.
    Debounced,
    /// Manual valve commands are refused while the policy is in charge.
    AutoMode,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingOp => write!(f, "missing op"),
            Self::UnknownOp => write!(f, "unknown op"),
            Self::Missing(field) => write!(f, "missing {field}"),
            Self::Invalid(msg) => write!(f, "{msg}"),
            Self::Debounced => write!(f, "debounced"),
            Self::AutoMode => write!(f, "rejected: AUTO mode"),
        }
    }
}

impl From<CommandError> for Error {
    fn from(e: CommandError) -> Self {
        Self::Command(e)
    }
}

// ---------------------------------------------------------------------------
// Threshold errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdError {
    /// `open_th >= close_th` would remove the dead band.
    NotOrdered,
    /// A threshold does not fit the 16-bit flow range.
    OutOfRange,
}

impl fmt::Display for ThresholdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotOrdered => write!(f, "open_th must be < close_th"),
            Self::OutOfRange => write!(f, "th too big"),
        }
    }
}

impl From<ThresholdError> for Error {
    fn from(e: ThresholdError) -> Self {
        Self::Threshold(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Coordinator-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;

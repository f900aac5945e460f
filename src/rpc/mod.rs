//! Transport-agnostic host command subsystem.
//!
//! Line-oriented JSON protocol over a byte stream.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                   Host Command Stack                       │
//! │                                                            │
//! │  ┌───────────┐   ┌──────────┐   ┌───────────────────────┐ │
//! │  │ Transport │──▶│  Codec   │──▶│  Engine (dispatcher)  │ │
//! │  │ (trait)   │   │ (framing)│   │  guard · fields       │ │
//! │  └───────────┘   └──────────┘   │  → Coordinator        │ │
//! │                                 └───────────────────────┘ │
//! └────────────────────────────────────────────────────────────┘
//! ```

pub mod codec;
pub mod engine;
pub mod fields;
pub mod guard;
pub mod transport;

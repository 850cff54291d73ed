//! Voice-guided selection flow
//!
//! ```text
//! Browsing ──item──▶ OptionGroup(0) ─▶ … ─▶ OptionGroup(n-1) ──▶ AwaitingPayment
//!     ▲                                                              │
//!     └───────────── back / new order ◀── Done ◀── Processing ◀──────┘
//! ```
//!
//! The [`DialogController`] owns the session, turns transcripts and taps into
//! transitions, speaks through an announcer, and broadcasts
//! [`NavigationEvent`]s for the screen layer.

mod controller;
mod events;
pub mod prompts;

pub use controller::{DialogController, Outcome, Transcript};
pub use events::{ChosenOption, NavigationEvent, OrderSummary, Snapshot, StepId};

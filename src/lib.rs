//! Voice Kiosk - Voice-guided ordering kiosk core
//!
//! This library provides the selection engine behind a self-service drink
//! kiosk that can be tapped through or spoken to:
//! - One-shot speech recognition and serialized speech output
//! - Vocabulary resolution against the current step's candidates
//! - A step-by-step selection flow (item, options, payment, receipt)
//! - A runtime loop that hosts the flow and handles mic, tap and back input
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                   Screen layer                       │
//! │        mic  │  tap  │  back  │  new order            │
//! └────────────────────┬────────────────────────────────┘
//!                      │ UiEvent            ▲ NavigationEvent
//! ┌────────────────────▼────────────────────┴───────────┐
//! │                 Kiosk runtime                        │
//! │   DialogController │ Resolver │ SelectionSession     │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │        SpeechIo  │  Catalog  │  PaymentProcessor     │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod flow;
pub mod order;
pub mod payment;
pub mod resolver;
pub mod runtime;
pub mod session;
pub mod speech;

pub use catalog::Catalog;
pub use config::Config;
pub use error::{Error, Result};
pub use flow::{DialogController, NavigationEvent, Outcome, Transcript};
pub use runtime::{Kiosk, KioskHandle, UiEvent};
pub use session::{SelectionSession, Step};

//! Speech input/output boundary
//!
//! The kiosk consumes platform speech through [`SpeechIo`]: one-shot
//! recognition and utterance playback, both awaitable with explicit
//! cancellation. Controller output is serialized through an [`Announcer`].

mod announcer;
mod console;
mod scripted;

use async_trait::async_trait;

pub use announcer::Announcer;
pub use console::{ConsoleInput, ConsoleSpeech};
pub use scripted::{Heard, ScriptedSpeech};

use crate::{Error, Result};

/// Platform speech-to-text and text-to-speech
#[async_trait]
pub trait SpeechIo: Send + Sync {
    /// Whether the platform offers speech at all
    ///
    /// When false the mic control is inert and the kiosk is tap-only.
    fn is_available(&self) -> bool {
        true
    }

    /// Capture one utterance
    ///
    /// Suspends until a single transcript is produced, or fails with
    /// [`Error::RecognitionFailed`] on error, timeout or cancellation.
    async fn recognize_once(&self, locale: &str) -> Result<String>;

    /// Play one utterance, suspending until playback ends or errors
    async fn speak(&self, text: &str, locale: &str) -> Result<()>;

    /// End an in-flight recognition without producing a transcript
    fn cancel_recognition(&self);

    /// Stop in-flight playback
    fn cancel_speech(&self);
}

/// Speech adapter for kiosks without speech hardware
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSpeech;

#[async_trait]
impl SpeechIo for NoSpeech {
    fn is_available(&self) -> bool {
        false
    }

    async fn recognize_once(&self, _locale: &str) -> Result<String> {
        Err(Error::SpeechUnavailable)
    }

    async fn speak(&self, _text: &str, _locale: &str) -> Result<()> {
        Ok(())
    }

    fn cancel_recognition(&self) {}

    fn cancel_speech(&self) {}
}

//! Console speech adapter
//!
//! Stands in for a microphone and speaker on a terminal: utterances are
//! printed, and "heard" lines arrive over a channel fed by the console loop.
//!
//! Every line is stamped with the recognition it was typed for. Ending a
//! recognition (result, timeout or cancel) moves to the next one, so a line
//! left in the channel by a cancelled recognition is dropped instead of being
//! heard at a later step.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify, mpsc};

use super::SpeechIo;
use crate::{Error, Result};

/// Simulated playback time per character at rate 1.0
const MILLIS_PER_CHAR: f32 = 40.0;

/// Feeds typed lines to a [`ConsoleSpeech`]
#[derive(Debug, Clone)]
pub struct ConsoleInput {
    tx: mpsc::Sender<(u64, String)>,
    recognition: Arc<AtomicU64>,
}

impl ConsoleInput {
    /// Hand a line to the current (or about to start) recognition
    ///
    /// # Errors
    ///
    /// Returns `Closed` if the speech adapter is gone
    pub async fn say(&self, line: impl Into<String>) -> Result<()> {
        let stamp = self.recognition.load(Ordering::SeqCst);
        self.tx
            .send((stamp, line.into()))
            .await
            .map_err(|_| Error::Closed)
    }
}

/// Terminal-backed speech adapter
pub struct ConsoleSpeech {
    heard: Mutex<mpsc::Receiver<(u64, String)>>,
    recognition: Arc<AtomicU64>,
    timeout: Duration,
    rate: f32,
    recognition_cancel: Notify,
    speech_cancel: Notify,
}

impl ConsoleSpeech {
    /// Create the adapter and the input that feeds it heard lines
    ///
    /// # Arguments
    ///
    /// * `timeout` - How long one recognition waits for a line
    /// * `rate` - Speech rate multiplier used to pace printed utterances
    #[must_use]
    pub fn new(timeout: Duration, rate: f32) -> (Self, ConsoleInput) {
        let (tx, rx) = mpsc::channel(8);
        let recognition = Arc::new(AtomicU64::new(0));
        let input = ConsoleInput {
            tx,
            recognition: Arc::clone(&recognition),
        };
        let speech = Self {
            heard: Mutex::new(rx),
            recognition,
            timeout,
            rate: if rate > 0.0 { rate } else { 1.0 },
            recognition_cancel: Notify::new(),
            speech_cancel: Notify::new(),
        };
        (speech, input)
    }

    fn end_recognition(&self) {
        self.recognition.fetch_add(1, Ordering::SeqCst);
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn playback_time(&self, text: &str) -> Duration {
        let millis = text.chars().count() as f32 * MILLIS_PER_CHAR / self.rate;
        Duration::from_millis(millis as u64)
    }
}

#[async_trait]
impl SpeechIo for ConsoleSpeech {
    async fn recognize_once(&self, locale: &str) -> Result<String> {
        let mut heard = self.heard.lock().await;
        let current = self.recognition.load(Ordering::SeqCst);
        tracing::debug!(locale, timeout = ?self.timeout, recognition = current, "listening");

        let deadline = tokio::time::sleep(self.timeout);
        let cancelled = self.recognition_cancel.notified();
        tokio::pin!(deadline, cancelled);

        let result = loop {
            tokio::select! {
                line = heard.recv() => match line {
                    Some((stamp, text)) if stamp == current => break Ok(text),
                    Some((stamp, text)) => {
                        tracing::debug!(line = %text, stamp, current, "dropping line from an ended recognition");
                    }
                    None => break Err(Error::RecognitionFailed("input closed".to_string())),
                },
                () = &mut deadline => {
                    break Err(Error::RecognitionFailed("no speech before timeout".to_string()));
                }
                () = &mut cancelled => {
                    break Err(Error::RecognitionFailed("cancelled".to_string()));
                }
            }
        };

        self.end_recognition();
        result
    }

    async fn speak(&self, text: &str, _locale: &str) -> Result<()> {
        println!("🔊 {text}");

        tokio::select! {
            () = tokio::time::sleep(self.playback_time(text)) => Ok(()),
            () = self.speech_cancel.notified() => Err(Error::Speech("cancelled".to_string())),
        }
    }

    fn cancel_recognition(&self) {
        self.end_recognition();
        self.recognition_cancel.notify_waiters();
    }

    fn cancel_speech(&self) {
        self.speech_cancel.notify_waiters();
    }
}

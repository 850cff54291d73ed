//! Deterministic speech adapter
//!
//! Plays back a script of recognition results and records every utterance,
//! so flows can be driven without audio hardware.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use super::SpeechIo;
use crate::{Error, Result};

/// Scripted outcome of one recognition cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Heard {
    /// The user said this
    Text(String),
    /// The platform failed to capture audio
    Fail(String),
    /// Nothing is heard until recognition is cancelled
    Hang,
}

/// Speech adapter driven by a script
#[derive(Debug)]
pub struct ScriptedSpeech {
    script: Mutex<VecDeque<Heard>>,
    spoken: Mutex<Vec<String>>,
    speak_delay: Duration,
    available: bool,
    recognition_cancel: Notify,
    speech_cancel: Notify,
    cancelled_recognitions: AtomicUsize,
    cancelled_speech: AtomicUsize,
    speaking: AtomicUsize,
    max_speaking: AtomicUsize,
}

impl Default for ScriptedSpeech {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScriptedSpeech {
    /// Create an adapter with an empty script and instant playback
    #[must_use]
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            spoken: Mutex::new(Vec::new()),
            speak_delay: Duration::ZERO,
            available: true,
            recognition_cancel: Notify::new(),
            speech_cancel: Notify::new(),
            cancelled_recognitions: AtomicUsize::new(0),
            cancelled_speech: AtomicUsize::new(0),
            speaking: AtomicUsize::new(0),
            max_speaking: AtomicUsize::new(0),
        }
    }

    /// Create an adapter that reports speech as absent
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    /// Make each utterance take `delay` to play
    #[must_use]
    pub fn with_speak_delay(mut self, delay: Duration) -> Self {
        self.speak_delay = delay;
        self
    }

    /// Queue a transcript for the next recognition
    pub fn hear(&self, text: impl Into<String>) {
        lock(&self.script).push_back(Heard::Text(text.into()));
    }

    /// Make the next recognition fail
    pub fn fail_next(&self, reason: impl Into<String>) {
        lock(&self.script).push_back(Heard::Fail(reason.into()));
    }

    /// Make the next recognition wait until cancelled
    pub fn hang_next(&self) {
        lock(&self.script).push_back(Heard::Hang);
    }

    /// Everything spoken so far, in order
    #[must_use]
    pub fn spoken(&self) -> Vec<String> {
        lock(&self.spoken).clone()
    }

    /// Everything spoken so far, clearing the record
    pub fn take_spoken(&self) -> Vec<String> {
        std::mem::take(&mut *lock(&self.spoken))
    }

    /// Script entries not yet consumed
    #[must_use]
    pub fn remaining(&self) -> usize {
        lock(&self.script).len()
    }

    /// How many times recognition was cancelled
    #[must_use]
    pub fn cancelled_recognitions(&self) -> usize {
        self.cancelled_recognitions.load(Ordering::SeqCst)
    }

    /// How many times playback was cancelled
    #[must_use]
    pub fn cancelled_speech(&self) -> usize {
        self.cancelled_speech.load(Ordering::SeqCst)
    }

    /// Highest number of overlapping `speak` calls observed
    #[must_use]
    pub fn max_concurrent_speech(&self) -> usize {
        self.max_speaking.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechIo for ScriptedSpeech {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn recognize_once(&self, _locale: &str) -> Result<String> {
        if !self.available {
            return Err(Error::SpeechUnavailable);
        }

        let next = lock(&self.script).pop_front();
        match next {
            Some(Heard::Text(text)) => Ok(text),
            Some(Heard::Fail(reason)) => Err(Error::RecognitionFailed(reason)),
            Some(Heard::Hang) => {
                self.recognition_cancel.notified().await;
                Err(Error::RecognitionFailed("cancelled".to_string()))
            }
            None => Err(Error::RecognitionFailed("no speech detected".to_string())),
        }
    }

    async fn speak(&self, text: &str, _locale: &str) -> Result<()> {
        lock(&self.spoken).push(text.to_string());

        let now = self.speaking.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_speaking.fetch_max(now, Ordering::SeqCst);

        let result = if self.speak_delay.is_zero() {
            Ok(())
        } else {
            tokio::select! {
                () = tokio::time::sleep(self.speak_delay) => Ok(()),
                () = self.speech_cancel.notified() => Err(Error::Speech("cancelled".to_string())),
            }
        };

        self.speaking.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn cancel_recognition(&self) {
        self.cancelled_recognitions.fetch_add(1, Ordering::SeqCst);
        self.recognition_cancel.notify_waiters();
    }

    fn cancel_speech(&self) {
        self.cancelled_speech.fetch_add(1, Ordering::SeqCst);
        self.speech_cancel.notify_waiters();
    }
}

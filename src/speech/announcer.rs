//! Serialized speech output
//!
//! Utterances are queued FIFO and played by a single worker task, so at most
//! one `speak` is ever in flight. The queue is bounded; when full, the oldest
//! waiting utterance is dropped instead of blocking the caller.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;

use super::SpeechIo;

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<String>,
    in_flight: bool,
    dropped: u64,
}

struct Shared {
    state: Mutex<QueueState>,
    wake: Notify,
    idle: watch::Sender<bool>,
    speech: Arc<dyn SpeechIo>,
    locale: String,
    depth: usize,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Queues utterances for one-at-a-time playback
pub struct Announcer {
    shared: Arc<Shared>,
    worker: JoinHandle<()>,
}

impl Announcer {
    /// Create an announcer and spawn its playback worker
    ///
    /// Must be called from within a Tokio runtime. A `depth` of zero is
    /// treated as one.
    pub fn new(speech: Arc<dyn SpeechIo>, locale: impl Into<String>, depth: usize) -> Self {
        let (idle, _) = watch::channel(true);
        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState::default()),
            wake: Notify::new(),
            idle,
            speech,
            locale: locale.into(),
            depth: depth.max(1),
        });

        let worker = tokio::spawn(run_worker(Arc::clone(&shared)));
        Self { shared, worker }
    }

    /// Queue an utterance
    pub fn announce(&self, text: impl Into<String>) {
        let text = text.into();
        if !self.shared.speech.is_available() {
            tracing::trace!(text = %text, "speech unavailable, not announcing");
            return;
        }

        {
            let mut state = self.shared.state();
            if state.pending.len() >= self.shared.depth {
                if let Some(dropped) = state.pending.pop_front() {
                    state.dropped += 1;
                    tracing::warn!(
                        dropped = %dropped,
                        depth = self.shared.depth,
                        "speech queue full, dropped oldest"
                    );
                }
            }
            tracing::debug!(text = %text, queued = state.pending.len() + 1, "announce");
            state.pending.push_back(text);
            self.shared.idle.send_replace(false);
        }
        self.shared.wake.notify_one();
    }

    /// Drop queued utterances and stop the one playing
    pub fn interrupt(&self) {
        let in_flight = {
            let mut state = self.shared.state();
            state.pending.clear();
            if !state.in_flight {
                self.shared.idle.send_replace(true);
            }
            state.in_flight
        };
        if in_flight {
            self.shared.speech.cancel_speech();
        }
        tracing::debug!(in_flight, "speech interrupted");
    }

    /// Wait until nothing is queued or playing
    pub async fn drained(&self) {
        let mut idle = self.shared.idle.subscribe();
        // The sender lives in `shared`, so the channel cannot close here
        let _ = idle.wait_for(|idle| *idle).await;
    }

    /// Number of utterances waiting (not counting the one playing)
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared.state().pending.len()
    }

    /// Number of utterances dropped because the queue was full
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.shared.state().dropped
    }
}

impl Drop for Announcer {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

async fn run_worker(shared: Arc<Shared>) {
    loop {
        let next = {
            let mut state = shared.state();
            let next = state.pending.pop_front();
            state.in_flight = next.is_some();
            next
        };

        let Some(text) = next else {
            shared.wake.notified().await;
            continue;
        };

        if let Err(e) = shared.speech.speak(&text, &shared.locale).await {
            tracing::warn!(error = %e, text = %text, "speech playback failed");
        }

        {
            let mut state = shared.state();
            state.in_flight = false;
            if state.pending.is_empty() {
                shared.idle.send_replace(true);
            }
        }
    }
}

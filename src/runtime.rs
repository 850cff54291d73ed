//! Kiosk runtime
//!
//! Hosts one [`DialogController`] and drives it from a single select loop:
//! UI events arrive on an mpsc channel, one-shot recognitions run as spawned
//! tasks whose result is tagged with the step they were started on.
//!
//! Pressing the mic while listening cancels the recognition without a
//! transcript. Any navigation (tap, back, new order) cancels it too.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use crate::flow::{DialogController, NavigationEvent, Snapshot, StepId, Transcript};
use crate::speech::SpeechIo;
use crate::{Error, Result};

/// Pending UI events before senders wait
const UI_EVENT_CAPACITY: usize = 32;

/// Input from the screen layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    /// Mic control pressed; starts or cancels a recognition
    MicPressed,
    /// A candidate was tapped
    Tap(String),
    /// Back control pressed
    Back,
    /// Start over from browsing
    NewOrder,
    /// Stop the runtime
    Shutdown,
}

struct Listening {
    step_id: StepId,
    task: JoinHandle<Result<String>>,
}

/// Runs a kiosk until shut down
pub struct Kiosk {
    controller: DialogController,
    speech: Arc<dyn SpeechIo>,
    events: mpsc::Receiver<UiEvent>,
    listening: Option<Listening>,
    listening_tx: watch::Sender<bool>,
    snapshot_tx: watch::Sender<Snapshot>,
}

/// Sending side of a running kiosk
#[derive(Clone)]
pub struct KioskHandle {
    events: mpsc::Sender<UiEvent>,
    listening: watch::Receiver<bool>,
    snapshot: watch::Receiver<Snapshot>,
}

impl Kiosk {
    /// Wrap a controller; returns the runtime and a handle to drive it
    #[must_use]
    pub fn new(controller: DialogController) -> (Self, KioskHandle) {
        let (events_tx, events) = mpsc::channel(UI_EVENT_CAPACITY);
        let (listening_tx, listening) = watch::channel(false);
        let (snapshot_tx, snapshot) = watch::channel(controller.snapshot());

        let kiosk = Self {
            speech: controller.speech(),
            controller,
            events,
            listening: None,
            listening_tx,
            snapshot_tx,
        };
        let handle = KioskHandle {
            events: events_tx,
            listening,
            snapshot,
        };
        (kiosk, handle)
    }

    /// Subscribe to the controller's navigation events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<NavigationEvent> {
        self.controller.subscribe()
    }

    /// Process events until `Shutdown` or every handle is dropped
    ///
    /// # Errors
    ///
    /// Currently infallible; errors from individual inputs are logged
    pub async fn run(mut self) -> Result<()> {
        tracing::info!(
            voice = self.speech.is_available(),
            locale = self.controller.locale(),
            "kiosk running"
        );

        loop {
            tokio::select! {
                event = self.events.recv() => {
                    match event {
                        None | Some(UiEvent::Shutdown) => {
                            tracing::info!("shutdown requested");
                            break;
                        }
                        Some(event) => self.on_event(event).await,
                    }
                }
                (step_id, result) = recognition(&mut self.listening), if self.listening.is_some() => {
                    self.on_recognition(step_id, result).await;
                }
            }
            self.snapshot_tx.send_replace(self.controller.snapshot());
        }

        self.stop_listening();
        self.controller.announcer().interrupt();
        Ok(())
    }

    async fn on_event(&mut self, event: UiEvent) {
        match event {
            UiEvent::MicPressed => self.toggle_mic(),
            UiEvent::Tap(id) => {
                self.stop_listening();
                match self.controller.select(&id).await {
                    Ok(outcome) => tracing::debug!(id = %id, ?outcome, "tap handled"),
                    Err(e) => tracing::warn!(id = %id, error = %e, "tap rejected"),
                }
            }
            UiEvent::Back => {
                self.stop_listening();
                let outcome = self.controller.back();
                tracing::debug!(?outcome, "back handled");
            }
            UiEvent::NewOrder => {
                self.stop_listening();
                let outcome = self.controller.new_order();
                tracing::debug!(?outcome, "new order handled");
            }
            UiEvent::Shutdown => {}
        }
    }

    fn toggle_mic(&mut self) {
        if !self.speech.is_available() {
            tracing::info!("speech unavailable, mic ignored");
            return;
        }
        if self.listening.is_some() {
            tracing::debug!("mic pressed while listening");
            self.stop_listening();
            return;
        }

        let step_id = self.controller.cue_listening();
        let speech = Arc::clone(&self.speech);
        let locale = self.controller.locale().to_string();
        let cue = self.controller.pacing().listen_cue;

        let task = tokio::spawn(async move {
            tokio::time::sleep(cue).await;
            speech.recognize_once(&locale).await
        });
        self.listening = Some(Listening { step_id, task });
        self.listening_tx.send_replace(true);
        tracing::info!(%step_id, "listening");
    }

    fn stop_listening(&mut self) {
        if let Some(listening) = self.listening.take() {
            listening.task.abort();
            self.speech.cancel_recognition();
            self.listening_tx.send_replace(false);
            tracing::debug!(step_id = %listening.step_id, "recognition cancelled");
        }
    }

    async fn on_recognition(&mut self, step_id: StepId, result: Result<String>) {
        self.listening = None;
        self.listening_tx.send_replace(false);

        match result {
            Ok(text) => {
                tracing::info!(transcript = %text, "heard");
                let transcript = Transcript::new(text, step_id);
                match self.controller.handle_transcript(transcript).await {
                    Ok(outcome) => tracing::debug!(?outcome, "transcript handled"),
                    Err(e) => tracing::error!(error = %e, "transcript handling failed"),
                }
            }
            Err(e) => tracing::warn!(error = %e, "recognition failed"),
        }
    }
}

/// Wait for the in-flight recognition, if any
async fn recognition(listening: &mut Option<Listening>) -> (StepId, Result<String>) {
    let Some(listening) = listening.as_mut() else {
        return std::future::pending().await;
    };
    let result = match (&mut listening.task).await {
        Ok(result) => result,
        Err(e) => Err(Error::RecognitionFailed(format!("recognition task ended: {e}"))),
    };
    (listening.step_id, result)
}

impl KioskHandle {
    /// Deliver a UI event
    ///
    /// # Errors
    ///
    /// Returns `Closed` if the kiosk has stopped
    pub async fn send(&self, event: UiEvent) -> Result<()> {
        self.events.send(event).await.map_err(|_| Error::Closed)
    }

    /// Whether a recognition is in flight
    #[must_use]
    pub fn is_listening(&self) -> bool {
        *self.listening.borrow()
    }

    /// Latest published view of the flow
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.borrow().clone()
    }

    /// Wait until listening becomes `listening`
    ///
    /// # Errors
    ///
    /// Returns `Closed` if the kiosk stops first
    pub async fn wait_listening(&mut self, listening: bool) -> Result<()> {
        self.listening
            .wait_for(|current| *current == listening)
            .await
            .map(|_| ())
            .map_err(|_| Error::Closed)
    }

    /// Wait until a published snapshot satisfies `condition`
    ///
    /// # Errors
    ///
    /// Returns `Closed` if the kiosk stops first
    pub async fn wait_for(&mut self, condition: impl FnMut(&Snapshot) -> bool) -> Result<Snapshot> {
        self.snapshot
            .wait_for(condition)
            .await
            .map(|snapshot| snapshot.clone())
            .map_err(|_| Error::Closed)
    }

    /// Wait for the next published snapshot
    ///
    /// # Errors
    ///
    /// Returns `Closed` if the kiosk stops first
    pub async fn changed(&mut self) -> Result<Snapshot> {
        self.snapshot.changed().await.map_err(|_| Error::Closed)?;
        Ok(self.snapshot.borrow_and_update().clone())
    }
}

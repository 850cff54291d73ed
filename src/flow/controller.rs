//! Dialog flow controller
//!
//! One controller per kiosk. Voice and tap input share a single transition
//! path: a transcript is resolved against the current step's candidates, a
//! tap is checked against the same set by id, and both then run the same
//! transition code.

use std::sync::Arc;

use tokio::sync::broadcast;

use super::events::{NavigationEvent, OrderSummary, Snapshot, StepId};
use super::prompts;
use crate::catalog::{Catalog, OptionGroup};
use crate::config::{Config, PacingConfig};
use crate::order::{OrderId, OrderIdGenerator};
use crate::payment::{PaymentProcessor, PaymentRequest};
use crate::resolver::{Candidate, resolve};
use crate::session::{SelectionSession, SessionError, Step};
use crate::speech::{Announcer, SpeechIo};
use crate::{Error, Result};

/// Navigation event channel capacity
const EVENT_CAPACITY: usize = 64;

/// One recognized utterance, tagged with the step it was captured under
///
/// Consumed by [`DialogController::handle_transcript`]; never matched twice.
#[derive(Debug, PartialEq, Eq)]
pub struct Transcript {
    text: String,
    step_id: StepId,
}

impl Transcript {
    #[must_use]
    pub fn new(text: impl Into<String>, step_id: StepId) -> Self {
        Self {
            text: text.into(),
            step_id,
        }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub const fn step_id(&self) -> StepId {
        self.step_id
    }
}

/// What an input did to the flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Moved to a new step
    Advanced(Step),
    /// Nothing matched; the step was reprompted
    Reprompted,
    /// Captured under an earlier step; discarded unread
    Stale,
    /// The current step does not take this input
    Ignored,
    /// Payment succeeded and the order has its id
    Completed(OrderId),
    /// Payment failed; back on payment selection
    PaymentFailed,
}

/// Drives the selection flow
pub struct DialogController {
    catalog: Arc<Catalog>,
    speech: Arc<dyn SpeechIo>,
    announcer: Announcer,
    payment: Arc<dyn PaymentProcessor>,
    locale: String,
    pacing: PacingConfig,
    session: Option<SelectionSession>,
    generation: u64,
    order_ids: OrderIdGenerator,
    events: broadcast::Sender<NavigationEvent>,
}

impl DialogController {
    /// Create a controller on the browsing step
    ///
    /// Must be called from within a Tokio runtime (the announcer spawns its
    /// playback worker).
    pub fn new(
        catalog: Arc<Catalog>,
        speech: Arc<dyn SpeechIo>,
        payment: Arc<dyn PaymentProcessor>,
        config: &Config,
    ) -> Self {
        let announcer = Announcer::new(
            Arc::clone(&speech),
            config.locale.clone(),
            config.voice.queue_depth,
        );
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            catalog,
            speech,
            announcer,
            payment,
            locale: config.locale.clone(),
            pacing: config.pacing,
            session: None,
            generation: 0,
            order_ids: OrderIdGenerator::new(),
            events,
        }
    }

    /// Subscribe to navigation events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<NavigationEvent> {
        self.events.subscribe()
    }

    /// Current step
    #[must_use]
    pub fn step(&self) -> Step {
        self.session
            .as_ref()
            .map_or(Step::Browsing, SelectionSession::current_step)
    }

    /// Identity of the current step
    #[must_use]
    pub const fn step_id(&self) -> StepId {
        StepId(self.generation)
    }

    /// The order in progress, if any
    #[must_use]
    pub const fn session(&self) -> Option<&SelectionSession> {
        self.session.as_ref()
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Speech adapter shared with the runtime
    #[must_use]
    pub fn speech(&self) -> Arc<dyn SpeechIo> {
        Arc::clone(&self.speech)
    }

    #[must_use]
    pub fn locale(&self) -> &str {
        &self.locale
    }

    #[must_use]
    pub const fn pacing(&self) -> PacingConfig {
        self.pacing
    }

    #[must_use]
    pub const fn announcer(&self) -> &Announcer {
        &self.announcer
    }

    /// Wait until everything announced so far has been played
    pub async fn settle(&self) {
        self.announcer.drained().await;
    }

    /// What can be said or tapped at the current step, in declared order
    #[must_use]
    pub fn candidates(&self) -> Vec<Candidate> {
        match self.step() {
            Step::Browsing => self.catalog.item_candidates(),
            Step::OptionGroup(index) => self
                .session
                .as_ref()
                .and_then(|s| s.item().group_at(index))
                .map(OptionGroup::candidates)
                .unwrap_or_default(),
            Step::AwaitingPayment => self.catalog.payment_candidates(),
            Step::Processing | Step::Done => Vec::new(),
        }
    }

    /// Entry prompt of the current step
    #[must_use]
    pub fn prompt(&self) -> Option<String> {
        match self.step() {
            Step::Browsing => None,
            Step::OptionGroup(index) => self
                .session
                .as_ref()
                .and_then(|s| s.item().group_at(index))
                .map(|group| prompts::option_prompt(&group.label, &group.candidates())),
            Step::AwaitingPayment => Some(prompts::payment_prompt(
                &self.catalog.payment_candidates(),
            )),
            Step::Processing => Some(prompts::processing()),
            Step::Done => Some(prompts::order_complete()),
        }
    }

    /// Everything the screen layer needs for the current step
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            step: self.step(),
            step_id: self.step_id(),
            prompt: self.prompt(),
            candidates: self.candidates(),
            order: self.session.as_ref().map(OrderSummary::from),
        }
    }

    /// Announce that the mic is about to open
    ///
    /// Returns the step identity the coming transcript must be tagged with.
    pub fn cue_listening(&self) -> StepId {
        self.announcer.announce(prompts::listening());
        self.step_id()
    }

    /// Match a transcript against the current step and act on it
    ///
    /// # Errors
    ///
    /// Returns error if the session breaks an invariant; the session is
    /// aborted before returning
    pub async fn handle_transcript(&mut self, transcript: Transcript) -> Result<Outcome> {
        let current = self.step_id();
        if transcript.step_id != current {
            tracing::debug!(
                transcript = %transcript.text,
                captured = %transcript.step_id,
                %current,
                "stale transcript discarded"
            );
            return Ok(Outcome::Stale);
        }

        let step = self.step();
        if matches!(step, Step::Processing | Step::Done) {
            tracing::debug!(transcript = %transcript.text, %step, "transcript ignored");
            return Ok(Outcome::Ignored);
        }

        let candidates = self.candidates();
        let Some(id) = resolve(&transcript.text, &candidates).map(|c| c.id.clone()) else {
            tracing::info!(transcript = %transcript.text, %step, "no match, reprompting");
            self.reprompt(step, &candidates);
            return Ok(Outcome::Reprompted);
        };

        self.apply(&id).await
    }

    /// Direct selection by id, as from a tap
    ///
    /// # Errors
    ///
    /// Returns `InvalidSelection` if the current step does not offer `id`;
    /// nothing is changed in that case
    pub async fn select(&mut self, id: &str) -> Result<Outcome> {
        let step = self.step();
        if !self.candidates().iter().any(|c| c.id == id) {
            tracing::warn!(id, %step, "selection not offered at this step");
            return Err(Error::InvalidSelection(format!("{id} is not offered at {step}")));
        }

        self.apply(id).await
    }

    /// Go back one step
    pub fn back(&mut self) -> Outcome {
        match self.step() {
            Step::Browsing | Step::Processing => {
                tracing::debug!(step = %self.step(), "back ignored");
                Outcome::Ignored
            }
            Step::OptionGroup(_) | Step::Done => {
                self.announcer.interrupt();
                self.discard_session("back");
                Outcome::Advanced(Step::Browsing)
            }
            Step::AwaitingPayment => {
                self.announcer.interrupt();
                match self.session.as_mut().and_then(SelectionSession::retreat) {
                    Some(step) => {
                        self.navigate();
                        Outcome::Advanced(step)
                    }
                    None => {
                        self.discard_session("back");
                        Outcome::Advanced(Step::Browsing)
                    }
                }
            }
        }
    }

    /// Drop the current order and return to browsing
    pub fn new_order(&mut self) -> Outcome {
        match self.step() {
            Step::Browsing | Step::Processing => Outcome::Ignored,
            _ => {
                self.announcer.interrupt();
                self.discard_session("new order");
                Outcome::Advanced(Step::Browsing)
            }
        }
    }

    async fn apply(&mut self, id: &str) -> Result<Outcome> {
        match self.step() {
            Step::Browsing => self.choose_item(id),
            Step::OptionGroup(index) => self.choose_option(index, id).await,
            Step::AwaitingPayment => self.choose_payment(id).await,
            Step::Processing | Step::Done => Ok(Outcome::Ignored),
        }
    }

    fn choose_item(&mut self, id: &str) -> Result<Outcome> {
        let item = self
            .catalog
            .item(id)
            .cloned()
            .ok_or_else(|| Error::InvalidSelection(format!("unknown item {id}")))?;

        self.announcer.announce(prompts::item_confirmed(
            &item.name,
            !item.option_groups.is_empty(),
        ));
        let session = SelectionSession::begin(item);
        tracing::info!(session = %session.id(), item = id, "item confirmed");
        self.session = Some(session);

        self.navigate();
        Ok(Outcome::Advanced(self.step()))
    }

    async fn choose_option(&mut self, index: usize, code: &str) -> Result<Outcome> {
        let alias = self.with_session("record option", |session| {
            let group = session.item().group_at(index).ok_or(SessionError::OutOfOrder {
                action: "record option",
                step: session.current_step(),
            })?;
            let key = group.key.clone();
            let alias = group.value(code).map(|v| v.alias.clone());

            session.set_option(&key, code)?;
            Ok(alias.unwrap_or_else(|| code.to_string()))
        })?;

        self.announcer.announce(prompts::option_confirmed(&alias));
        tokio::time::sleep(self.pacing.option_advance).await;

        let step = self.with_session("advance", SelectionSession::advance)?;
        if step == Step::AwaitingPayment {
            self.announcer.announce(prompts::options_complete());
            tokio::time::sleep(self.pacing.checkout).await;
        }

        self.navigate();
        Ok(Outcome::Advanced(step))
    }

    async fn choose_payment(&mut self, id: &str) -> Result<Outcome> {
        let method = self
            .catalog
            .payment_method(id)
            .cloned()
            .ok_or_else(|| Error::InvalidSelection(format!("unknown payment method {id}")))?;
        let name = method.name.clone();

        self.with_session("set payment", |session| session.set_payment(method))?;
        self.announcer.announce(prompts::payment_confirmed(&name));
        tokio::time::sleep(self.pacing.payment_confirm).await;

        let request = self.with_session("start processing", |session| {
            session.start_processing()?;
            Ok(PaymentRequest {
                session_id: session.id(),
                item_id: session.item().id.clone(),
                method: id.to_string(),
                amount: session.total(),
            })
        })?;
        self.navigate();

        tracing::info!(
            session = %request.session_id,
            processor = self.payment.name(),
            method = %request.method,
            amount = request.amount,
            "charging"
        );
        match self.payment.charge(&request).await {
            Ok(()) => {
                self.announcer.announce(prompts::payment_complete());
                tokio::time::sleep(self.pacing.completion).await;

                let order_id = self.order_ids.next_id();
                self.with_session("complete", |session| session.complete(order_id.clone()))?;
                tracing::info!(session = %request.session_id, order = %order_id, "order complete");

                self.navigate();
                Ok(Outcome::Completed(order_id))
            }
            Err(e) => {
                tracing::warn!(session = %request.session_id, error = %e, "payment failed");
                self.announcer.announce(prompts::payment_failed());
                self.with_session("fail payment", SelectionSession::fail_payment)?;

                self.emit(NavigationEvent::PaymentFailed {
                    reason: e.to_string(),
                });
                self.navigate();
                Ok(Outcome::PaymentFailed)
            }
        }
    }

    fn reprompt(&self, step: Step, candidates: &[Candidate]) {
        let text = match step {
            Step::Browsing => prompts::item_not_found(),
            Step::OptionGroup(_) => prompts::option_not_found(),
            Step::AwaitingPayment => prompts::payment_not_found(candidates),
            Step::Processing | Step::Done => return,
        };
        self.announcer.announce(text);
    }

    /// Run a session mutation, aborting the session if it breaks an invariant
    fn with_session<T>(
        &mut self,
        action: &'static str,
        f: impl FnOnce(&mut SelectionSession) -> std::result::Result<T, SessionError>,
    ) -> Result<T> {
        let result = match self.session.as_mut() {
            Some(session) => f(session),
            None => Err(SessionError::OutOfOrder {
                action,
                step: Step::Browsing,
            }),
        };
        result.map_err(|e| self.abort(e))
    }

    fn abort(&mut self, err: SessionError) -> Error {
        tracing::error!(
            session = ?self.session.as_ref().map(SelectionSession::id),
            error = %err,
            "session invariant violated, aborting"
        );
        self.session = None;
        self.announcer.interrupt();
        self.emit(NavigationEvent::SessionAborted {
            reason: err.to_string(),
        });
        self.navigate();
        Error::Session(err)
    }

    fn discard_session(&mut self, reason: &str) {
        if let Some(session) = self.session.take() {
            tracing::info!(session = %session.id(), reason, "session discarded");
        }
        self.navigate();
    }

    /// Enter the current step: new identity, event, entry prompt
    fn navigate(&mut self) {
        self.generation += 1;
        let step = self.step();
        let step_id = self.step_id();
        tracing::debug!(%step, %step_id, "navigate");

        self.emit(NavigationEvent::GoTo {
            step,
            step_id,
            order: self.session.as_ref().map(OrderSummary::from),
        });
        if let Some(prompt) = self.prompt() {
            self.announcer.announce(prompt);
        }
    }

    fn emit(&self, event: NavigationEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::SimulatedPayment;
    use crate::speech::ScriptedSpeech;

    fn controller() -> DialogController {
        let config = Config {
            pacing: PacingConfig::immediate(),
            ..Config::default()
        };
        DialogController::new(
            Arc::new(Catalog::builtin().unwrap()),
            Arc::new(ScriptedSpeech::new()),
            Arc::new(SimulatedPayment::instant()),
            &config,
        )
    }

    #[tokio::test]
    async fn test_step_id_changes_on_every_transition() {
        let mut controller = controller();
        let start = controller.step_id();

        controller.select("americano").await.unwrap();
        let on_options = controller.step_id();
        assert!(on_options > start);

        controller.back();
        assert!(controller.step_id() > on_options);
        assert_eq!(controller.step(), Step::Browsing);
    }

    #[tokio::test]
    async fn test_invariant_violation_aborts_session() {
        let mut controller = controller();
        let mut events = controller.subscribe();
        controller.select("americano").await.unwrap();

        let err = controller
            .with_session("record option", |s| s.set_option("size", "large"))
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Session(SessionError::GroupNotCurrent { .. })
        ));
        assert_eq!(controller.step(), Step::Browsing);
        assert!(controller.session().is_none());

        let mut aborted = false;
        while let Ok(event) = events.try_recv() {
            aborted |= matches!(event, NavigationEvent::SessionAborted { .. });
        }
        assert!(aborted);
    }

    #[tokio::test]
    async fn test_prompt_and_candidates_agree() {
        let mut controller = controller();
        controller.select("cafe_latte").await.unwrap();
        for _ in 0..4 {
            let prompt = controller.prompt().unwrap();
            let candidates = controller.candidates();
            for candidate in &candidates {
                assert!(prompt.contains(&candidate.alias), "{prompt} lacks {}", candidate.alias);
            }
            let first = candidates[0].id.clone();
            controller.select(&first).await.unwrap();
        }
        assert_eq!(controller.step(), Step::AwaitingPayment);
        assert_eq!(controller.prompt().unwrap(), prompts::payment_prompt(&controller.candidates()));
    }

    #[tokio::test]
    async fn test_transcripts_ignored_while_done() {
        let mut controller = controller();
        controller.select("espresso").await.unwrap();
        controller.select("single").await.unwrap();
        controller.select("card").await.unwrap();
        assert_eq!(controller.step(), Step::Done);

        let transcript = Transcript::new("아메리카노", controller.step_id());
        assert_eq!(
            controller.handle_transcript(transcript).await.unwrap(),
            Outcome::Ignored
        );
    }
}

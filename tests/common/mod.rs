//! Shared test utilities
#![allow(dead_code)]

use std::sync::Arc;

use tokio::sync::broadcast;
use voice_kiosk::config::PacingConfig;
use voice_kiosk::payment::{PaymentProcessor, SimulatedPayment};
use voice_kiosk::speech::ScriptedSpeech;
use voice_kiosk::{Catalog, Config, DialogController, NavigationEvent, Step};

/// Configuration with every pacing delay removed
#[must_use]
pub fn test_config() -> Config {
    Config {
        pacing: PacingConfig::immediate(),
        ..Config::default()
    }
}

/// Controller on the built-in menu with scripted speech and instant payment
pub fn test_controller() -> (DialogController, Arc<ScriptedSpeech>) {
    controller_with(
        &test_config(),
        ScriptedSpeech::new(),
        SimulatedPayment::instant(),
    )
}

/// Controller with the given config, speech and payment processor
pub fn controller_with(
    config: &Config,
    speech: ScriptedSpeech,
    payment: impl PaymentProcessor + 'static,
) -> (DialogController, Arc<ScriptedSpeech>) {
    let speech = Arc::new(speech);
    let catalog = Arc::new(Catalog::builtin().expect("built-in catalog is valid"));
    let controller = DialogController::new(catalog, speech.clone(), Arc::new(payment), config);
    (controller, speech)
}

/// Wait for queued speech, then return and clear everything spoken
pub async fn spoken(controller: &DialogController, speech: &ScriptedSpeech) -> Vec<String> {
    controller.settle().await;
    speech.take_spoken()
}

/// Every navigation event received so far
pub fn drain_events(events: &mut broadcast::Receiver<NavigationEvent>) -> Vec<NavigationEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

/// Steps of the `GoTo` events in a list
pub fn visited(events: &[NavigationEvent]) -> Vec<Step> {
    events
        .iter()
        .filter_map(|event| match event {
            NavigationEvent::GoTo { step, .. } => Some(*step),
            _ => None,
        })
        .collect()
}

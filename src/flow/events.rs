//! Navigation events
//!
//! The controller never renders; it tells the screen layer where to go and
//! what to show there. Events are broadcast to every subscriber.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::catalog::PaymentMethod;
use crate::order::OrderId;
use crate::resolver::Candidate;
use crate::session::{SelectionSession, Step};

/// Identity of one flow position
///
/// Bumped on every transition. Transcripts carry the id they were captured
/// under and are discarded when it no longer matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct StepId(pub(crate) u64);

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where the screen layer should go
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NavigationEvent {
    /// Show a step
    GoTo {
        step: Step,
        step_id: StepId,
        order: Option<OrderSummary>,
    },
    /// The charge failed; the flow is back on payment selection
    PaymentFailed { reason: String },
    /// The session broke an invariant and was discarded
    SessionAborted { reason: String },
}

/// One chosen option, with everything a receipt needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChosenOption {
    pub group: String,
    pub label: String,
    pub code: String,
    pub alias: String,
    pub surcharge: u32,
}

/// Renderable view of the session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderSummary {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub item_id: String,
    pub item_name: String,
    pub price: u32,
    pub options: Vec<ChosenOption>,
    pub payment: Option<PaymentMethod>,
    pub total: u32,
    pub order_id: Option<OrderId>,
    /// Order time, set once payment succeeds
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&SelectionSession> for OrderSummary {
    fn from(session: &SelectionSession) -> Self {
        let item = session.item();
        Self {
            session_id: session.id(),
            started_at: session.started_at(),
            item_id: item.id.clone(),
            item_name: item.name.clone(),
            price: item.price,
            options: session
                .selected_options()
                .map(|(group, value)| ChosenOption {
                    group: group.key.clone(),
                    label: group.label.clone(),
                    code: value.code.clone(),
                    alias: value.alias.clone(),
                    surcharge: value.surcharge,
                })
                .collect(),
            payment: session.payment().cloned(),
            total: session.total(),
            order_id: session.order_id().cloned(),
            completed_at: session.completed_at(),
        }
    }
}

/// Everything needed to render the current step
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub step: Step,
    pub step_id: StepId,
    /// Prompt for the step, if it has one
    pub prompt: Option<String>,
    /// What can be said or tapped right now
    pub candidates: Vec<Candidate>,
    pub order: Option<OrderSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_goto_serializes_with_phase() {
        let event = NavigationEvent::GoTo {
            step: Step::OptionGroup(1),
            step_id: StepId(3),
            order: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "go_to");
        assert_eq!(json["step"]["phase"], "option_group");
        assert_eq!(json["step"]["group"], 1);
        assert_eq!(json["step_id"], 3);
    }
}

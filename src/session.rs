//! Selection session
//!
//! In-memory record of one order attempt. Created when an item is confirmed,
//! discarded on return to browsing or after the receipt.
//!
//! # Invariants
//!
//! - A session always has a target item; option steps never start without one.
//! - A recorded code is always one of its group's valid codes.
//! - Options are only recorded for the group the step pointer is on.
//! - The step pointer never passes the item's number of option groups.
//! - Payment is only recorded once the pointer reaches `AwaitingPayment`.
//!
//! Breaking any of these is a [`SessionError`]: a controller bug, never a
//! user-facing condition.

use std::fmt;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::catalog::{MenuItem, OptionGroup, OptionValue, PaymentMethod};
use crate::order::OrderId;

/// Position in the selection flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "phase", content = "group", rename_all = "snake_case")]
pub enum Step {
    /// No session; choosing an item
    Browsing,
    /// Choosing a value for the item's option group at this index
    OptionGroup(usize),
    /// All options chosen; choosing a payment method
    AwaitingPayment,
    /// Payment effect running
    Processing,
    /// Order complete, receipt showing
    Done,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Browsing => f.write_str("browsing"),
            Self::OptionGroup(index) => write!(f, "option group {index}"),
            Self::AwaitingPayment => f.write_str("awaiting payment"),
            Self::Processing => f.write_str("processing"),
            Self::Done => f.write_str("done"),
        }
    }
}

/// Invariant violations on a selection session
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Option recorded for a group the flow is not on
    #[error("option group {group} is not the current step ({step})")]
    GroupNotCurrent { group: String, step: Step },

    /// Code outside the group's valid set
    #[error("{code} is not a valid {group} code")]
    InvalidCode { group: String, code: String },

    /// Advanced past an option group with nothing chosen
    #[error("option group {group} has no selection")]
    MissingOption { group: String },

    /// Operation attempted at the wrong step
    #[error("cannot {action} at {step}")]
    OutOfOrder { action: &'static str, step: Step },
}

/// One in-progress order
#[derive(Debug, Clone)]
pub struct SelectionSession {
    id: Uuid,
    started_at: DateTime<Utc>,
    item: MenuItem,
    step: Step,
    options: IndexMap<String, String>,
    payment: Option<PaymentMethod>,
    order_id: Option<OrderId>,
    completed_at: Option<DateTime<Utc>>,
}

impl SelectionSession {
    /// Start a session for a confirmed item
    ///
    /// The pointer starts on the first option group, or on payment when the
    /// item has no options.
    #[must_use]
    pub fn begin(item: MenuItem) -> Self {
        let step = if item.option_groups.is_empty() {
            Step::AwaitingPayment
        } else {
            Step::OptionGroup(0)
        };
        let session = Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            item,
            step,
            options: IndexMap::new(),
            payment: None,
            order_id: None,
            completed_at: None,
        };
        tracing::debug!(session = %session.id, item = %session.item.id, %step, "session started");
        session
    }

    /// Session id for log correlation
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// When the item was confirmed
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// When payment succeeded; shown as the order time on the receipt
    #[must_use]
    pub const fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Target item
    #[must_use]
    pub const fn item(&self) -> &MenuItem {
        &self.item
    }

    /// Current step pointer
    #[must_use]
    pub const fn current_step(&self) -> Step {
        self.step
    }

    /// Option group the pointer is on, if any
    #[must_use]
    pub fn current_group(&self) -> Option<&OptionGroup> {
        match self.step {
            Step::OptionGroup(index) => self.item.group_at(index),
            _ => None,
        }
    }

    /// Record a code for the current option group
    ///
    /// # Errors
    ///
    /// Returns error if `group` is not the current step's group or `code` is
    /// not one of its valid codes
    pub fn set_option(&mut self, group: &str, code: &str) -> Result<(), SessionError> {
        let current = self
            .current_group()
            .filter(|g| g.key == group)
            .ok_or_else(|| SessionError::GroupNotCurrent {
                group: group.to_string(),
                step: self.step,
            })?;

        if current.value(code).is_none() {
            return Err(SessionError::InvalidCode {
                group: group.to_string(),
                code: code.to_string(),
            });
        }

        self.options.insert(group.to_string(), code.to_string());
        tracing::debug!(session = %self.id, group, code, "option recorded");
        Ok(())
    }

    /// Move past the current option group
    ///
    /// # Errors
    ///
    /// Returns error if not on an option group or the group has no selection
    pub fn advance(&mut self) -> Result<Step, SessionError> {
        let Step::OptionGroup(index) = self.step else {
            return Err(SessionError::OutOfOrder {
                action: "advance",
                step: self.step,
            });
        };
        let group = &self.item.option_groups[index];
        if !self.options.contains_key(&group.key) {
            return Err(SessionError::MissingOption {
                group: group.key.clone(),
            });
        }

        self.step = if index + 1 < self.item.option_groups.len() {
            Step::OptionGroup(index + 1)
        } else {
            Step::AwaitingPayment
        };
        Ok(self.step)
    }

    /// Step back from payment to the last option group, clearing its choice
    ///
    /// Returns `None` when there is nothing to go back to (item without
    /// options, or not awaiting payment); the caller discards the session.
    pub fn retreat(&mut self) -> Option<Step> {
        if self.step != Step::AwaitingPayment {
            return None;
        }
        let last = self.item.option_groups.len().checked_sub(1)?;
        let key = &self.item.option_groups[last].key;
        self.options.shift_remove(key);
        self.payment = None;
        self.step = Step::OptionGroup(last);
        Some(self.step)
    }

    /// Record the payment method
    ///
    /// # Errors
    ///
    /// Returns error unless the pointer is on `AwaitingPayment`
    pub fn set_payment(&mut self, method: PaymentMethod) -> Result<(), SessionError> {
        if self.step != Step::AwaitingPayment {
            return Err(SessionError::OutOfOrder {
                action: "set payment",
                step: self.step,
            });
        }
        tracing::debug!(session = %self.id, method = %method.id, "payment recorded");
        self.payment = Some(method);
        Ok(())
    }

    /// Hand the order to the payment effect
    ///
    /// # Errors
    ///
    /// Returns error unless awaiting payment with a method chosen
    pub fn start_processing(&mut self) -> Result<(), SessionError> {
        if self.step != Step::AwaitingPayment || self.payment.is_none() {
            return Err(SessionError::OutOfOrder {
                action: "start processing",
                step: self.step,
            });
        }
        self.step = Step::Processing;
        Ok(())
    }

    /// Return to payment selection after a failed charge
    ///
    /// # Errors
    ///
    /// Returns error unless processing
    pub fn fail_payment(&mut self) -> Result<(), SessionError> {
        if self.step != Step::Processing {
            return Err(SessionError::OutOfOrder {
                action: "fail payment",
                step: self.step,
            });
        }
        self.payment = None;
        self.step = Step::AwaitingPayment;
        Ok(())
    }

    /// Finish the order with its identifier
    ///
    /// # Errors
    ///
    /// Returns error unless processing
    pub fn complete(&mut self, order_id: OrderId) -> Result<(), SessionError> {
        if self.step != Step::Processing {
            return Err(SessionError::OutOfOrder {
                action: "complete",
                step: self.step,
            });
        }
        self.order_id = Some(order_id);
        self.completed_at = Some(Utc::now());
        self.step = Step::Done;
        Ok(())
    }

    /// Whether the order finished with an identifier
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self.step, Step::Done) && self.order_id.is_some()
    }

    /// Chosen options in completion order
    pub fn selected_options(&self) -> impl Iterator<Item = (&OptionGroup, &OptionValue)> {
        self.options.iter().filter_map(|(group, code)| {
            let group = self.item.group(group)?;
            Some((group, group.value(code)?))
        })
    }

    /// Chosen code for a group
    #[must_use]
    pub fn option(&self, group: &str) -> Option<&str> {
        self.options.get(group).map(String::as_str)
    }

    /// Chosen payment method
    #[must_use]
    pub const fn payment(&self) -> Option<&PaymentMethod> {
        self.payment.as_ref()
    }

    /// Order identifier, assigned on completion
    #[must_use]
    pub const fn order_id(&self) -> Option<&OrderId> {
        self.order_id.as_ref()
    }

    /// Item price plus option surcharges
    #[must_use]
    pub fn total(&self) -> u32 {
        self.selected_options()
            .fold(self.item.price, |sum, (_, value)| sum.saturating_add(value.surcharge))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::order::OrderIdGenerator;

    fn americano() -> MenuItem {
        Catalog::builtin().unwrap().item("americano").unwrap().clone()
    }

    fn card() -> PaymentMethod {
        PaymentMethod {
            id: "card".to_string(),
            name: "카드".to_string(),
        }
    }

    #[test]
    fn test_begin_points_at_first_group() {
        let session = SelectionSession::begin(americano());
        assert_eq!(session.current_step(), Step::OptionGroup(0));
        assert_eq!(session.current_group().unwrap().key, "temperature");
        assert!(!session.is_complete());
    }

    #[test]
    fn test_item_without_options_starts_at_payment() {
        let mut item = americano();
        item.option_groups.clear();
        let session = SelectionSession::begin(item);
        assert_eq!(session.current_step(), Step::AwaitingPayment);
    }

    #[test]
    fn test_option_for_future_group_rejected() {
        let mut session = SelectionSession::begin(americano());
        let err = session.set_option("size", "large").unwrap_err();
        assert_eq!(
            err,
            SessionError::GroupNotCurrent {
                group: "size".to_string(),
                step: Step::OptionGroup(0),
            }
        );
        assert!(session.option("size").is_none());
    }

    #[test]
    fn test_invalid_code_rejected() {
        let mut session = SelectionSession::begin(americano());
        assert!(matches!(
            session.set_option("temperature", "lukewarm"),
            Err(SessionError::InvalidCode { .. })
        ));
    }

    #[test]
    fn test_advance_requires_selection() {
        let mut session = SelectionSession::begin(americano());
        assert!(matches!(
            session.advance(),
            Err(SessionError::MissingOption { .. })
        ));
    }

    #[test]
    fn test_full_walk() {
        let mut session = SelectionSession::begin(americano());
        session.set_option("temperature", "ice").unwrap();
        assert_eq!(session.advance().unwrap(), Step::OptionGroup(1));
        session.set_option("size", "large").unwrap();
        assert_eq!(session.advance().unwrap(), Step::OptionGroup(2));
        session.set_option("shot", "double").unwrap();
        assert_eq!(session.advance().unwrap(), Step::AwaitingPayment);

        session.set_payment(card()).unwrap();
        session.start_processing().unwrap();
        assert!(session.completed_at().is_none());
        session.complete(OrderIdGenerator::new().next_id()).unwrap();

        assert!(session.is_complete());
        assert!(session.completed_at().unwrap() >= session.started_at());
        assert_eq!(session.total(), 4500);
        let chosen: Vec<_> = session
            .selected_options()
            .map(|(g, v)| (g.key.as_str(), v.code.as_str()))
            .collect();
        assert_eq!(chosen, [("temperature", "ice"), ("size", "large"), ("shot", "double")]);
    }

    #[test]
    fn test_payment_before_options_rejected() {
        let mut session = SelectionSession::begin(americano());
        assert!(matches!(
            session.set_payment(card()),
            Err(SessionError::OutOfOrder { .. })
        ));
        assert!(session.payment().is_none());
    }

    #[test]
    fn test_retreat_clears_last_choice() {
        let mut session = SelectionSession::begin(americano());
        for (group, code) in [("temperature", "hot"), ("size", "regular"), ("shot", "single")] {
            session.set_option(group, code).unwrap();
            session.advance().unwrap();
        }
        assert_eq!(session.retreat(), Some(Step::OptionGroup(2)));
        assert!(session.option("shot").is_none());
        assert_eq!(session.option("size"), Some("regular"));
    }

    #[test]
    fn test_failed_payment_returns_to_awaiting() {
        let mut item = americano();
        item.option_groups.clear();
        let mut session = SelectionSession::begin(item);
        session.set_payment(card()).unwrap();
        session.start_processing().unwrap();
        session.fail_payment().unwrap();
        assert_eq!(session.current_step(), Step::AwaitingPayment);
        assert!(session.payment().is_none());
    }

    #[test]
    fn test_surcharge_counts_toward_total() {
        let mut item = americano();
        item.option_groups[1].values[1].surcharge = 500;
        let mut session = SelectionSession::begin(item);
        session.set_option("temperature", "hot").unwrap();
        session.advance().unwrap();
        session.set_option("size", "large").unwrap();
        assert_eq!(session.total(), 5000);
    }
}

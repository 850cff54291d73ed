//! Payment effect
//!
//! The kiosk treats payment as an opaque async operation that either succeeds
//! or fails with a reason. The order identifier is generated by the flow
//! after a successful charge, never by the processor.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::config::PaymentConfig;
use crate::{Error, Result};

/// What is being charged
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentRequest {
    /// Session the charge belongs to
    pub session_id: Uuid,
    /// Item being ordered
    pub item_id: String,
    /// Chosen payment method id
    pub method: String,
    /// Amount in minor units
    pub amount: u32,
}

/// Runs a charge against some payment backend
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Charge the order
    ///
    /// # Errors
    ///
    /// Returns `Error::Payment` when the charge is declined or cannot be run
    async fn charge(&self, request: &PaymentRequest) -> Result<()>;
}

/// Stand-in processor that waits and then succeeds (or fails on demand)
#[derive(Debug, Clone)]
pub struct SimulatedPayment {
    delay: Duration,
    fail: bool,
}

impl SimulatedPayment {
    #[must_use]
    pub const fn new(delay: Duration, fail: bool) -> Self {
        Self { delay, fail }
    }

    /// Processor that succeeds immediately
    #[must_use]
    pub const fn instant() -> Self {
        Self::new(Duration::ZERO, false)
    }

    /// Processor that declines every charge
    #[must_use]
    pub const fn declining(delay: Duration) -> Self {
        Self::new(delay, true)
    }
}

impl From<&PaymentConfig> for SimulatedPayment {
    fn from(config: &PaymentConfig) -> Self {
        Self::new(config.simulated_delay, config.fail)
    }
}

#[async_trait]
impl PaymentProcessor for SimulatedPayment {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn charge(&self, request: &PaymentRequest) -> Result<()> {
        tracing::debug!(
            session = %request.session_id,
            method = %request.method,
            amount = request.amount,
            "simulated charge started"
        );
        tokio::time::sleep(self.delay).await;

        if self.fail {
            return Err(Error::Payment("card declined".to_string()));
        }
        Ok(())
    }
}

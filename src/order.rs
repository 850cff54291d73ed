//! Order identifiers
//!
//! Format is `ORDER-` followed by the last six digits of the Unix time in
//! milliseconds. The generator never hands out the same number twice within
//! its lifetime; across restarts numbers may repeat.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Numbers wrap at six digits
const ORDER_NUMBER_SPACE: i64 = 1_000_000;
const ORDER_CAPACITY: usize = 1_000_000;

/// Identifier of a completed order
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    /// String form, e.g. `ORDER-123456`
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Issues order ids that are unique for the lifetime of the generator
#[derive(Debug, Default)]
pub struct OrderIdGenerator {
    issued: HashSet<i64>,
}

impl OrderIdGenerator {
    /// Create a generator with no ids issued
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue an id derived from the current time
    pub fn next_id(&mut self) -> OrderId {
        self.next_at(Utc::now())
    }

    /// Issue an id derived from `now`, bumping past numbers already issued
    pub fn next_at(&mut self, now: DateTime<Utc>) -> OrderId {
        let mut number = now.timestamp_millis().rem_euclid(ORDER_NUMBER_SPACE);
        // Six digits bound how many ids a single kiosk run can hold
        if self.issued.len() >= ORDER_CAPACITY {
            self.issued.clear();
        }
        while !self.issued.insert(number) {
            number = (number + 1) % ORDER_NUMBER_SPACE;
        }
        OrderId(format!("ORDER-{number:06}"))
    }

    /// Number of ids issued so far
    #[must_use]
    pub fn issued(&self) -> usize {
        self.issued.len()
    }
}

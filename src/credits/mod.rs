//! Credit accounting: batch authorization and the external ledger seam.
//!
//! The gate is side-effect free; the actual balance decrement belongs to
//! the external ledger and happens per successful item. The balance is
//! read once to authorize a run and refreshed (never locked) after each
//! success, so two concurrent sessions on one account can overspend.
//! That consistency model is deliberate; see DESIGN.md.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::queue::QueueItem;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Snapshot of the external credit account.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CreditAccount {
    pub balance: i64,
    pub unlimited: bool,
}

/// Outcome of a batch authorization check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authorization {
    Granted { required: i64 },
    Denied { reason: String, shortfall: i64 },
}

impl Authorization {
    pub fn is_granted(&self) -> bool {
        matches!(self, Authorization::Granted { .. })
    }
}

/// Credits required to dispatch the given pending items: each item costs
/// `cost_per_variant × selected variant count`.
pub fn required_credits(pending: &[&QueueItem], cost_per_variant: i64) -> i64 {
    pending
        .iter()
        .map(|item| cost_per_variant * item.variant_selectors.len() as i64)
        .sum()
}

/// Decide whether a batch may start. Pure: a denied call causes no item
/// transitions and no ledger writes.
pub fn authorize(pending: &[&QueueItem], cost_per_variant: i64, account: &CreditAccount) -> Authorization {
    let required = required_credits(pending, cost_per_variant);

    if account.unlimited || account.balance >= required {
        Authorization::Granted { required }
    } else {
        let shortfall = required - account.balance;
        Authorization::Denied {
            reason: format!(
                "insufficient credits: {} required, {} available",
                required, account.balance
            ),
            shortfall,
        }
    }
}

/// Seam to the external subscription/credit service.
///
/// `debit` settles one successful item and returns the refreshed
/// account; `account` refreshes without charging.
#[async_trait]
pub trait CreditLedger: Send + Sync {
    async fn account(&self) -> Result<CreditAccount>;

    async fn debit(&self, amount: i64) -> Result<CreditAccount>;
}

/// In-process ledger used by the standalone server and tests. A real
/// deployment points this seam at the billing service instead.
pub struct InMemoryLedger {
    inner: Mutex<CreditAccount>,
}

impl InMemoryLedger {
    pub fn new(balance: i64, unlimited: bool) -> Self {
        Self {
            inner: Mutex::new(CreditAccount { balance, unlimited }),
        }
    }
}

#[async_trait]
impl CreditLedger for InMemoryLedger {
    async fn account(&self) -> Result<CreditAccount> {
        Ok(*self.inner.lock().await)
    }

    async fn debit(&self, amount: i64) -> Result<CreditAccount> {
        let mut account = self.inner.lock().await;
        if !account.unlimited {
            account.balance -= amount;
        }
        Ok(*account)
    }
}

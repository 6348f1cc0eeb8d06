//! Ledger history views and balance reconciliation.
//!
//! Read-only: windowed slices of the transaction log for a party, and a check that
//! an account's balance matches the sum of the credits the log shows for it.

use crate::{
    config::settings::LedgerConfig,
    entities::{Transaction, transaction},
    errors::{Error, Result},
};
use chrono::{DateTime, TimeDelta, Utc};
use sea_orm::{Condition, QueryOrder, prelude::*};
use tracing::{debug, warn};

/// Start of a window of `days` days ending at `now`.
///
/// # Errors
/// `Validation` when `days` is negative or reaches past the representable calendar.
pub fn window_start(now: DateTime<Utc>, days: i64) -> Result<DateTime<Utc>> {
    if days < 0 {
        return Err(Error::validation(format!(
            "History window cannot be negative, got {days} days"
        )));
    }
    TimeDelta::try_days(days)
        .and_then(|window| now.checked_sub_signed(window))
        .ok_or_else(|| Error::validation(format!("History window of {days} days is too long")))
}

/// Entries credited to `target_id` dated at or after `since`, newest first.
pub async fn received_since(
    db: &DatabaseConnection,
    target_id: &str,
    since: DateTime<Utc>,
) -> Result<Vec<transaction::Model>> {
    Transaction::find()
        .filter(transaction::Column::TargetId.eq(target_id))
        .filter(transaction::Column::Date.gte(since))
        .order_by_desc(transaction::Column::Date)
        .order_by_desc(transaction::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Entries paid on behalf of `source_id` dated at or after `since`, newest first.
pub async fn sent_since(
    db: &DatabaseConnection,
    source_id: &str,
    since: DateTime<Utc>,
) -> Result<Vec<transaction::Model>> {
    Transaction::find()
        .filter(transaction::Column::SourceId.eq(source_id))
        .filter(transaction::Column::Date.gte(since))
        .order_by_desc(transaction::Column::Date)
        .order_by_desc(transaction::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Entries credited to `target_id` within the configured history window.
pub async fn recent_received(
    db: &DatabaseConnection,
    ledger_config: &LedgerConfig,
    target_id: &str,
) -> Result<Vec<transaction::Model>> {
    let since = window_start(Utc::now(), ledger_config.history_window_days)?;
    debug!("Loading entries received by {} since {}", target_id, since);
    received_since(db, target_id, since).await
}

/// Entries on either side of `user_id` within the configured history window.
///
/// This is the history view shown to a party: donations made by a customer,
/// payments made on behalf of a patient, credits received by a salesperson or an
/// institution.
pub async fn recent_activity(
    db: &DatabaseConnection,
    ledger_config: &LedgerConfig,
    user_id: &str,
) -> Result<Vec<transaction::Model>> {
    let since = window_start(Utc::now(), ledger_config.history_window_days)?;
    Transaction::find()
        .filter(
            Condition::any()
                .add(transaction::Column::SourceId.eq(user_id))
                .add(transaction::Column::TargetId.eq(user_id)),
        )
        .filter(transaction::Column::Date.gte(since))
        .order_by_desc(transaction::Column::Date)
        .order_by_desc(transaction::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Outcome of comparing a balance with the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// Account that was checked
    pub user_id: String,
    /// Balance stored on the profile
    pub balance: i64,
    /// Sum of every ledger entry credited to the account
    pub ledger_total: i64,
    /// Number of ledger entries credited to the account
    pub entry_count: usize,
}

impl Reconciliation {
    /// `balance - ledger_total`; zero when the two agree.
    #[must_use]
    pub const fn discrepancy(&self) -> i64 {
        self.balance - self.ledger_total
    }

    /// Whether the balance matches the ledger.
    #[must_use]
    pub const fn is_consistent(&self) -> bool {
        self.discrepancy() == 0
    }
}

/// Compares an account's balance with the sum of its ledger credits.
///
/// # Errors
/// `NotFound` when the profile is missing, `Validation` when it holds no balance.
pub async fn reconcile(db: &DatabaseConnection, user_id: &str) -> Result<Reconciliation> {
    let balance = crate::core::profile::balance_of(db, user_id).await?;
    let entries = Transaction::find()
        .filter(transaction::Column::TargetId.eq(user_id))
        .all(db)
        .await?;

    let report = Reconciliation {
        user_id: user_id.to_string(),
        balance,
        ledger_total: entries.iter().map(|entry| entry.amount).sum(),
        entry_count: entries.len(),
    };

    if !report.is_consistent() {
        warn!(
            "Balance of {} is {} but its ledger credits total {}",
            user_id, report.balance, report.ledger_total
        );
    }
    Ok(report)
}

/// Formats a ledger entry as a single line, e.g. `+5 coin_transfer from c1: Delivery of Monitor`.
#[must_use]
pub fn format_entry(entry: &transaction::Model) -> String {
    format!(
        "+{} {} from {}: {}",
        entry.amount, entry.kind, entry.source_id, entry.description
    )
}

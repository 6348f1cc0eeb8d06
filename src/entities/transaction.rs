//! Transaction entity - Append-only coin ledger.
//!
//! Each row records one credit: its `kind`, a positive `amount`, the `source_id`
//! party on whose behalf it was paid and the `target_id` account credited, plus an
//! optional back-reference to the order or checkup that produced it.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of ledger entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Delivery incentive paid to a salesperson
    #[sea_orm(string_value = "coin_transfer")]
    CoinTransfer,
    /// Checkup reward paid to a salesperson
    #[sea_orm(string_value = "checkup_payment")]
    CheckupPayment,
    /// Customer donation to an institution
    #[sea_orm(string_value = "donation")]
    Donation,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_value())
    }
}

/// Transaction database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    /// Unique identifier for the transaction
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Kind of entry, stored as `type`
    #[sea_orm(column_name = "type")]
    pub kind: TransactionKind,
    /// Coins credited, always positive
    pub amount: i64,
    /// Party the credit was paid on behalf of
    pub source_id: String,
    /// Account that was credited
    pub target_id: String,
    /// When the entry was written
    pub date: DateTimeUtc,
    /// Human-readable description
    pub description: String,
    /// Order that produced a `coin_transfer`
    pub order_id: Option<i64>,
    /// Appointment that produced a `checkup_payment`
    pub patient_offer_id: Option<i64>,
}

/// Ledger rows reference parties and records by id only
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

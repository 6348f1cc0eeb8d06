//! Profile entity - One row per identity-provider user.
//!
//! The profile carries the user's role, the onboarding approval flag and, for
//! institutions and salespersons, the coin balance credited by the ledger.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Role a user acts under
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Orders products, books checkups, donates
    #[sea_orm(string_value = "customer")]
    Customer,
    /// Receives donations
    #[sea_orm(string_value = "institution")]
    Institution,
    /// Delivers orders and escorts checkups
    #[sea_orm(string_value = "salesperson")]
    Salesperson,
    /// Accepts checkups and may purchase products directly
    #[sea_orm(string_value = "doctor")]
    Doctor,
    /// Approves onboarding and maintains the catalog
    #[sea_orm(string_value = "admin")]
    Admin,
}

impl Role {
    /// Whether profiles with this role hold a coin balance.
    #[must_use]
    pub const fn holds_coins(self) -> bool {
        matches!(self, Self::Institution | Self::Salesperson)
    }

    /// Whether profiles with this role must be approved by an admin before acting.
    #[must_use]
    pub const fn requires_approval(self) -> bool {
        matches!(self, Self::Institution | Self::Salesperson | Self::Doctor)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_value())
    }
}

/// Profile database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "profiles")]
pub struct Model {
    /// Opaque user id supplied by the identity provider
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: String,
    /// Role chosen at onboarding
    pub role: Role,
    /// Human-readable name
    pub display_name: String,
    /// Coin balance, present only for institutions and salespersons
    pub coins: Option<i64>,
    /// Whether an admin has approved this profile
    pub approved: bool,
    /// Bank details (institutions)
    pub bank_details: Option<String>,
    /// Postal address (customers, institutions)
    pub address: Option<String>,
    /// Manager id (salespersons)
    pub manager_id: Option<String>,
    /// Medical specialty (doctors)
    pub specialty: Option<String>,
    /// When the profile was created
    pub created_at: DateTimeUtc,
}

/// `Profile` relations are resolved by id in the core layer
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

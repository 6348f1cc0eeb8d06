//! Order entity - A product purchase driven through the delivery state machine.
//!
//! The customer owns the order; a salesperson takes custody on claim and the
//! customer confirms delivery. `salesperson_id` is written once by the claim edge.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order status values
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Waiting for a salesperson to claim it
    #[sea_orm(string_value = "pending_salesperson_pickup")]
    PendingSalespersonPickup,
    /// A salesperson holds the order
    #[sea_orm(string_value = "in_delivery")]
    InDelivery,
    /// The customer confirmed receipt
    #[sea_orm(string_value = "delivered")]
    Delivered,
    /// Bought by a doctor for themselves, no delivery
    #[sea_orm(string_value = "purchased_by_doctor")]
    PurchasedByDoctor,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_value())
    }
}

/// Order database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    /// Unique identifier for the order
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Ordered product
    pub product_id: i64,
    /// Product name at order time
    pub product_name: String,
    /// Product price at order time
    pub price: f64,
    /// Owner of the order
    pub customer_id: String,
    /// Salesperson holding the order, set by the claim edge
    pub salesperson_id: Option<String>,
    /// Current position in the state machine
    pub status: OrderStatus,
    /// When the order was placed
    pub order_date: DateTimeUtc,
    /// When delivery was confirmed
    pub delivered_date: Option<DateTimeUtc>,
    /// Token presented at confirmation, kept as proof of delivery
    pub qr_content: Option<String>,
}

/// Defines relationships between Order and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each order references one product
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

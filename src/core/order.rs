//! Order workflow - purchase, claim, delivery confirmation.
//!
//! ```text
//! pending_salesperson_pickup --claim-->           in_delivery --confirm--> delivered
//! pending_salesperson_pickup --doctor_purchase--> purchased_by_doctor
//! ```
//!
//! Every transition runs in one database transaction: load, [`engine::authorize`],
//! conditional update keyed on the expected source status, and for confirmation the
//! coin credit and ledger append.

use crate::{
    core::{
        engine::{self, Actor, Edge, EdgeRule, FulfillmentRecord, Gate, TokenRule},
        ledger::{self, NewEntry},
        profile,
        token::{HandoffToken, RecordRef},
    },
    entities::{Order, OrderStatus, Role, TransactionKind, order, profile as profile_entity},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use tracing::{debug, info, instrument, warn};

/// Order edge table
pub const ORDER_EDGES: &[EdgeRule<OrderStatus>] = &[
    EdgeRule {
        edge: Edge::Claim,
        from: OrderStatus::PendingSalespersonPickup,
        to: OrderStatus::InDelivery,
        gate: Gate::Salesperson,
        token: TokenRule::Required(Actor::Requester),
        issuer: Some(Gate::Owner),
    },
    EdgeRule {
        edge: Edge::Confirm,
        from: OrderStatus::InDelivery,
        to: OrderStatus::Delivered,
        gate: Gate::Owner,
        token: TokenRule::Required(Actor::AssignedSalesperson),
        issuer: Some(Gate::AssignedSalesperson),
    },
    EdgeRule {
        edge: Edge::DoctorPurchase,
        from: OrderStatus::PendingSalespersonPickup,
        to: OrderStatus::PurchasedByDoctor,
        gate: Gate::OwningDoctor,
        token: TokenRule::None,
        issuer: None,
    },
];

impl FulfillmentRecord for order::Model {
    type Status = OrderStatus;

    const ENTITY: &'static str = "order";

    fn edges() -> &'static [EdgeRule<OrderStatus>] {
        ORDER_EDGES
    }

    fn record_ref(&self) -> RecordRef {
        RecordRef::Order(self.id)
    }

    fn status(&self) -> OrderStatus {
        self.status
    }

    fn owner_id(&self) -> &str {
        &self.customer_id
    }

    fn named_doctor(&self) -> Option<&str> {
        None
    }

    fn salesperson_id(&self) -> Option<&str> {
        self.salesperson_id.as_deref()
    }

    fn id_string(&self) -> String {
        self.id.to_string()
    }
}

/// Finds an order by id.
pub async fn get_order<C>(db: &C, order_id: i64) -> Result<Option<order::Model>>
where
    C: ConnectionTrait,
{
    Order::find_by_id(order_id).one(db).await.map_err(Into::into)
}

async fn load_order<C>(db: &C, order_id: i64) -> Result<order::Model>
where
    C: ConnectionTrait,
{
    get_order(db, order_id).await?.ok_or_else(|| Error::NotFound {
        entity: "order",
        id: order_id.to_string(),
    })
}

async fn insert_order<C>(db: &C, buyer: &profile_entity::Model, product_id: i64) -> Result<order::Model>
where
    C: ConnectionTrait,
{
    let product = crate::core::product::require_product(db, product_id).await?;
    order::ActiveModel {
        product_id: Set(product.id),
        product_name: Set(product.name),
        price: Set(product.price),
        customer_id: Set(buyer.user_id.clone()),
        salesperson_id: Set(None),
        status: Set(OrderStatus::PendingSalespersonPickup),
        order_date: Set(chrono::Utc::now()),
        delivered_date: Set(None),
        qr_content: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Places an order that waits for a salesperson to pick it up.
///
/// # Errors
/// * `Unauthorized` - the buyer has no profile or is neither a customer nor a doctor
/// * `NotFound` - the product does not exist
#[instrument(skip(db))]
pub async fn place_order(
    db: &DatabaseConnection,
    buyer_id: &str,
    product_id: i64,
) -> Result<order::Model> {
    let buyer = profile::resolve_requester(db, buyer_id).await?;
    if !matches!(buyer.role, Role::Customer | Role::Doctor) {
        return Err(Error::unauthorized(format!(
            "'{buyer_id}' is a {} and cannot place orders",
            buyer.role
        )));
    }

    let order = insert_order(db, &buyer, product_id).await?;
    info!(
        "Order {} placed by {} for product {}",
        order.id, order.customer_id, order.product_id
    );
    Ok(order)
}

/// A doctor buys a product for themselves; the order goes straight to
/// `purchased_by_doctor` without delivery and without a coin credit.
///
/// # Errors
/// * `Unauthorized` - the buyer is not an approved doctor
/// * `NotFound` - the product does not exist
#[instrument(skip(db))]
pub async fn purchase_as_doctor(
    db: &DatabaseConnection,
    doctor_id: &str,
    product_id: i64,
) -> Result<order::Model> {
    let txn = db.begin().await?;

    let doctor = profile::resolve_requester(&txn, doctor_id).await?;
    if doctor.role != Role::Doctor || !doctor.approved {
        return Err(Error::unauthorized(format!(
            "'{doctor_id}' is not an approved doctor"
        )));
    }

    let order = insert_order(&txn, &doctor, product_id).await?;
    let rule = engine::authorize(&order, Edge::DoctorPurchase, &doctor, None)?;

    let result = Order::update_many()
        .col_expr(order::Column::Status, Expr::value(rule.to))
        .filter(order::Column::Id.eq(order.id))
        .filter(order::Column::Status.eq(rule.from))
        .exec(&txn)
        .await?;
    if result.rows_affected == 0 {
        let fresh = load_order(&txn, order.id).await?;
        return Err(engine::explain_lost_write(&fresh, Edge::DoctorPurchase, &doctor, None));
    }

    let purchased = load_order(&txn, order.id).await?;
    txn.commit().await?;
    info!("Order {} purchased directly by doctor {}", purchased.id, doctor_id);
    Ok(purchased)
}

/// Mints the token a salesperson presents to claim `order_id`.
///
/// Only the order's owner may mint it, only while the order awaits pickup, and only
/// for an approved salesperson. Nothing is written.
#[instrument(skip(db))]
pub async fn mint_claim_token(
    db: &DatabaseConnection,
    order_id: i64,
    issuer_id: &str,
    salesperson_id: &str,
) -> Result<HandoffToken> {
    let order = load_order(db, order_id).await?;
    let issuer = profile::resolve_requester(db, issuer_id).await?;
    let token = engine::issue(&order, Edge::Claim, &issuer, Some(salesperson_id))?;
    profile::require_approved_salesperson(db, salesperson_id).await?;
    Ok(token)
}

/// Mints the token the customer presents to confirm delivery of `order_id`.
///
/// Only the salesperson holding the order may mint it. Nothing is written.
#[instrument(skip(db))]
pub async fn mint_delivery_token(
    db: &DatabaseConnection,
    order_id: i64,
    issuer_id: &str,
) -> Result<HandoffToken> {
    let order = load_order(db, order_id).await?;
    let issuer = profile::resolve_requester(db, issuer_id).await?;
    engine::issue(&order, Edge::Confirm, &issuer, None)
}

/// A salesperson takes custody of an order awaiting pickup.
///
/// First claim wins: the write only lands while `salesperson_id` is still empty, so
/// of two racing salespersons one succeeds and the other gets `AlreadyAssigned`.
///
/// # Errors
/// `NotFound`, `Unauthorized`, `AlreadyAssigned`, `InvalidState`, `MalformedToken`
/// as described in [`engine::authorize`].
#[instrument(skip(db, token), fields(record = %token.record))]
pub async fn claim_order(
    db: &DatabaseConnection,
    order_id: i64,
    requester_id: &str,
    token: &HandoffToken,
) -> Result<order::Model> {
    let txn = db.begin().await?;

    let order = load_order(&txn, order_id).await?;
    let requester = profile::resolve_requester(&txn, requester_id).await?;
    let rule = engine::authorize(&order, Edge::Claim, &requester, Some(token))
        .inspect_err(|e| warn!("Claim of order {} rejected: {}", order_id, e))?;

    let result = Order::update_many()
        .col_expr(order::Column::Status, Expr::value(rule.to))
        .col_expr(
            order::Column::SalespersonId,
            Expr::value(Some(requester.user_id.clone())),
        )
        .filter(order::Column::Id.eq(order_id))
        .filter(order::Column::Status.eq(rule.from))
        .filter(order::Column::SalespersonId.is_null())
        .exec(&txn)
        .await?;
    if result.rows_affected == 0 {
        let fresh = load_order(&txn, order_id).await?;
        return Err(engine::explain_lost_write(&fresh, Edge::Claim, &requester, Some(token)));
    }

    let claimed = load_order(&txn, order_id).await?;
    txn.commit().await?;
    info!("Order {} claimed by {}", order_id, requester_id);
    Ok(claimed)
}

/// The customer confirms delivery of an order.
///
/// Moves the order to `delivered`, stores the presented token as proof, credits the
/// product's `coins_assigned` to the salesperson and appends a `coin_transfer` entry,
/// all in one database transaction. Products with no coin incentive produce no entry.
///
/// # Errors
/// `NotFound`, `Unauthorized`, `InvalidState`, `MalformedToken` as described in
/// [`engine::authorize`].
#[instrument(skip(db, token), fields(record = %token.record))]
pub async fn confirm_delivery(
    db: &DatabaseConnection,
    order_id: i64,
    requester_id: &str,
    token: &HandoffToken,
) -> Result<order::Model> {
    let txn = db.begin().await?;

    let order = load_order(&txn, order_id).await?;
    let requester = profile::resolve_requester(&txn, requester_id).await?;
    let rule = engine::authorize(&order, Edge::Confirm, &requester, Some(token))
        .inspect_err(|e| warn!("Delivery confirmation of order {} rejected: {}", order_id, e))?;
    let salesperson_id = order.salesperson_id.clone().ok_or_else(|| Error::Conflict {
        entity: "order",
        id: order_id.to_string(),
    })?;

    let result = Order::update_many()
        .col_expr(order::Column::Status, Expr::value(rule.to))
        .col_expr(
            order::Column::DeliveredDate,
            Expr::value(Some(chrono::Utc::now())),
        )
        .col_expr(order::Column::QrContent, Expr::value(Some(token.encode()?)))
        .filter(order::Column::Id.eq(order_id))
        .filter(order::Column::Status.eq(rule.from))
        .filter(order::Column::SalespersonId.eq(salesperson_id.as_str()))
        .exec(&txn)
        .await?;
    if result.rows_affected == 0 {
        let fresh = load_order(&txn, order_id).await?;
        return Err(engine::explain_lost_write(&fresh, Edge::Confirm, &requester, Some(token)));
    }

    let product = crate::core::product::require_product(&txn, order.product_id).await?;
    if product.coins_assigned > 0 {
        ledger::record_credit(
            &txn,
            NewEntry {
                kind: TransactionKind::CoinTransfer,
                amount: product.coins_assigned,
                source_id: order.customer_id.clone(),
                target_id: salesperson_id.clone(),
                description: format!("Delivery of {} (order {})", order.product_name, order_id),
                order_id: Some(order_id),
                patient_offer_id: None,
            },
        )
        .await?;
    } else {
        debug!("Product {} carries no coins; no ledger entry", product.id);
    }

    let delivered = load_order(&txn, order_id).await?;
    txn.commit().await?;
    info!("Order {} delivered by {}", order_id, salesperson_id);
    Ok(delivered)
}

/// Orders placed by `customer_id`, newest first.
pub async fn orders_for_customer(
    db: &DatabaseConnection,
    customer_id: &str,
) -> Result<Vec<order::Model>> {
    Order::find()
        .filter(order::Column::CustomerId.eq(customer_id))
        .order_by_desc(order::Column::OrderDate)
        .order_by_desc(order::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Orders waiting for a salesperson, oldest first.
pub async fn orders_awaiting_pickup(db: &DatabaseConnection) -> Result<Vec<order::Model>> {
    Order::find()
        .filter(order::Column::Status.eq(OrderStatus::PendingSalespersonPickup))
        .order_by_asc(order::Column::OrderDate)
        .order_by_asc(order::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Orders claimed by `salesperson_id`, optionally narrowed to one status, newest first.
pub async fn deliveries_for_salesperson(
    db: &DatabaseConnection,
    salesperson_id: &str,
    status: Option<OrderStatus>,
) -> Result<Vec<order::Model>> {
    let mut query = Order::find().filter(order::Column::SalespersonId.eq(salesperson_id));
    if let Some(status) = status {
        query = query.filter(order::Column::Status.eq(status));
    }
    query
        .order_by_desc(order::Column::OrderDate)
        .order_by_desc(order::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

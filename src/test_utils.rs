//! Shared test utilities for the handoff ledger.
//!
//! This module provides common helper functions for setting up test databases
//! and creating profiles, products and workflow records with sensible defaults.

use crate::{
    core::{
        appointment, order, product,
        profile::{self, ProfileDetails},
    },
    entities::{self, AppointmentStatus, OrderStatus, Role},
    errors::Result,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;

/// Admin used by the helpers that need one.
pub const TEST_ADMIN: &str = "admin";

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates an approved admin profile.
pub async fn create_admin(
    db: &DatabaseConnection,
    user_id: &str,
) -> Result<entities::profile::Model> {
    profile::ensure_admin(db, user_id).await
}

/// Creates a customer profile. Customers need no approval.
pub async fn create_customer(
    db: &DatabaseConnection,
    user_id: &str,
) -> Result<entities::profile::Model> {
    profile::select_role(db, user_id, Role::Customer, ProfileDetails::default()).await
}

async fn create_approved(
    db: &DatabaseConnection,
    user_id: &str,
    role: Role,
) -> Result<entities::profile::Model> {
    profile::select_role(db, user_id, role, ProfileDetails::default()).await?;
    profile::ensure_admin(db, TEST_ADMIN).await?;
    profile::approve_profile(db, TEST_ADMIN, user_id).await
}

/// Creates an approved salesperson with a zero balance.
pub async fn create_salesperson(
    db: &DatabaseConnection,
    user_id: &str,
) -> Result<entities::profile::Model> {
    create_approved(db, user_id, Role::Salesperson).await
}

/// Creates an approved doctor.
pub async fn create_doctor(
    db: &DatabaseConnection,
    user_id: &str,
) -> Result<entities::profile::Model> {
    create_approved(db, user_id, Role::Doctor).await
}

/// Creates an approved institution with a zero balance.
pub async fn create_institution(
    db: &DatabaseConnection,
    user_id: &str,
) -> Result<entities::profile::Model> {
    create_approved(db, user_id, Role::Institution).await
}

/// Creates a test product through the admin API.
///
/// # Defaults
/// * name: "Monitor"
/// * price: 10.0
/// * serial number: "SN-TEST"
pub async fn create_test_product(
    db: &DatabaseConnection,
    coins_assigned: i64,
) -> Result<entities::product::Model> {
    profile::ensure_admin(db, TEST_ADMIN).await?;
    product::create_product(db, TEST_ADMIN, "Monitor", 10.0, "SN-TEST", coins_assigned).await
}

/// Fresh database holding one product worth `coins_assigned` coins.
pub async fn setup_with_product(
    coins_assigned: i64,
) -> Result<(DatabaseConnection, entities::product::Model)> {
    let db = setup_test_db().await?;
    let product = create_test_product(&db, coins_assigned).await?;
    Ok((db, product))
}

/// Fresh database with a pending order.
///
/// Customer `c1` ordered the product; `s1` is an approved salesperson.
pub async fn setup_with_order(
    coins_assigned: i64,
) -> Result<(DatabaseConnection, entities::order::Model)> {
    let (db, product) = setup_with_product(coins_assigned).await?;
    create_customer(&db, "c1").await?;
    create_salesperson(&db, "s1").await?;
    let order = order::place_order(&db, "c1", product.id).await?;
    Ok((db, order))
}

/// Fresh database with a pending checkup offer.
///
/// Patient `p1` offered the checkup to doctor `d1`; `s1` and `s2` are approved
/// salespersons.
pub async fn setup_with_appointment() -> Result<(DatabaseConnection, entities::appointment::Model)>
{
    let db = setup_test_db().await?;
    create_customer(&db, "p1").await?;
    create_doctor(&db, "d1").await?;
    create_salesperson(&db, "s1").await?;
    create_salesperson(&db, "s2").await?;
    let offer = appointment::offer_checkup(&db, "p1", "d1", "annual checkup").await?;
    Ok((db, offer))
}

/// Approved profile row, for engine checks and `MockDatabase` query results.
#[must_use]
pub fn profile_model(user_id: &str, role: Role) -> entities::profile::Model {
    entities::profile::Model {
        user_id: user_id.to_string(),
        role,
        display_name: user_id.to_string(),
        coins: role.holds_coins().then_some(0),
        approved: true,
        bank_details: None,
        address: None,
        manager_id: None,
        specialty: None,
        created_at: Utc::now(),
    }
}

/// Order 1 owned by `cust`, in `status`, held by `salesperson`.
#[must_use]
pub fn order_model(status: OrderStatus, salesperson: Option<&str>) -> entities::order::Model {
    entities::order::Model {
        id: 1,
        product_id: 1,
        product_name: "Monitor".to_string(),
        price: 10.0,
        customer_id: "cust".to_string(),
        salesperson_id: salesperson.map(str::to_string),
        status,
        order_date: Utc::now(),
        delivered_date: None,
        qr_content: None,
    }
}

/// Appointment 5 from `patient` to `doc`, in `status`, held by `salesperson`.
#[must_use]
pub fn appointment_model(
    status: AppointmentStatus,
    salesperson: Option<&str>,
) -> entities::appointment::Model {
    entities::appointment::Model {
        id: 5,
        patient_id: "patient".to_string(),
        doctor_id: "doc".to_string(),
        reason: "checkup".to_string(),
        status,
        salesperson_id: salesperson.map(str::to_string),
        offered_on: Utc::now(),
        accepted_on: None,
        completed_on: None,
        payment_confirmed: false,
    }
}

/// Asserts a `MockDatabase` saw exactly one transaction and that it rolled back.
///
/// Returns the SQL of the statements run inside it.
pub fn assert_rolled_back(db: DatabaseConnection) -> Vec<String> {
    let log = db.into_transaction_log();
    assert_eq!(log.len(), 1, "expected a single transaction, got {log:?}");
    let statements: Vec<String> = log[0]
        .statements()
        .iter()
        .map(|statement| statement.sql.clone())
        .collect();
    assert!(!statements.iter().any(|sql| sql == "COMMIT"));
    assert_eq!(statements.last().map(String::as_str), Some("ROLLBACK"));
    statements
}

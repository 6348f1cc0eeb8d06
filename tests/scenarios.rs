//! End-to-end hand-off scenarios through the public API.

#![allow(clippy::unwrap_used)]

use handoff_ledger::{
    config::{database, settings::LedgerConfig},
    core::{
        appointment, history, ledger, order, product,
        profile::{self, ProfileDetails},
        token::HandoffToken,
    },
    entities::{AppointmentStatus, OrderStatus, Role, TransactionKind},
    errors::{Error, Result},
};
use sea_orm::DatabaseConnection;

async fn connect() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    database::create_tables(&db).await?;
    profile::ensure_admin(&db, "admin").await?;
    Ok(db)
}

async fn onboard(db: &DatabaseConnection, user_id: &str, role: Role) -> Result<()> {
    let created = profile::select_role(db, user_id, role, ProfileDetails::default()).await?;
    if !created.approved {
        profile::approve_profile(db, "admin", user_id).await?;
    }
    Ok(())
}

/// Sends a token across the wire the way two devices would.
fn transport(token: &HandoffToken) -> Result<HandoffToken> {
    let text = token.encode()?;
    text.parse()
}

#[tokio::test]
async fn order_happy_path_credits_salesperson() -> Result<()> {
    let db = connect().await?;
    onboard(&db, "customer", Role::Customer).await?;
    onboard(&db, "seller", Role::Salesperson).await?;
    let monitor = product::create_product(&db, "admin", "Monitor", 10.00, "MON-1", 5).await?;

    let placed = order::place_order(&db, "customer", monitor.id).await?;
    assert_eq!(placed.status, OrderStatus::PendingSalespersonPickup);

    let claim = order::mint_claim_token(&db, placed.id, "customer", "seller").await?;
    let claimed = order::claim_order(&db, placed.id, "seller", &transport(&claim)?).await?;
    assert_eq!(claimed.status, OrderStatus::InDelivery);
    assert_eq!(claimed.salesperson_id.as_deref(), Some("seller"));

    let delivery = order::mint_delivery_token(&db, placed.id, "seller").await?;
    let delivered =
        order::confirm_delivery(&db, placed.id, "customer", &transport(&delivery)?).await?;
    assert_eq!(delivered.status, OrderStatus::Delivered);

    let entries = ledger::transactions_for_order(&db, placed.id).await?;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].kind, TransactionKind::CoinTransfer);
    assert_eq!(entries[0].amount, 5);
    assert_eq!(entries[0].source_id, "customer");
    assert_eq!(entries[0].target_id, "seller");
    assert_eq!(profile::balance_of(&db, "seller").await?, 5);

    let replay = order::confirm_delivery(&db, placed.id, "customer", &delivery).await;
    assert!(matches!(replay, Err(Error::InvalidState { .. })));
    assert_eq!(profile::balance_of(&db, "seller").await?, 5);
    Ok(())
}

#[tokio::test]
async fn claim_race_has_exactly_one_winner() -> Result<()> {
    let db = connect().await?;
    onboard(&db, "customer", Role::Customer).await?;
    onboard(&db, "seller-1", Role::Salesperson).await?;
    onboard(&db, "seller-2", Role::Salesperson).await?;
    let monitor = product::create_product(&db, "admin", "Monitor", 10.00, "MON-1", 5).await?;
    let placed = order::place_order(&db, "customer", monitor.id).await?;

    let token_1 = order::mint_claim_token(&db, placed.id, "customer", "seller-1").await?;
    let token_2 = order::mint_claim_token(&db, placed.id, "customer", "seller-2").await?;

    let (first, second) = tokio::join!(
        order::claim_order(&db, placed.id, "seller-1", &token_1),
        order::claim_order(&db, placed.id, "seller-2", &token_2),
    );

    let (winner, loser) = match (first, second) {
        (Ok(won), Err(lost)) => (won, lost),
        (Err(lost), Ok(won)) => (won, lost),
        other => panic!("expected exactly one winner, got {other:?}"),
    };
    assert!(matches!(loser, Error::AlreadyAssigned { .. }));

    let stored = order::get_order(&db, placed.id).await?.unwrap();
    assert_eq!(stored.status, OrderStatus::InDelivery);
    assert_eq!(stored.salesperson_id, winner.salesperson_id);
    Ok(())
}

#[tokio::test]
async fn donation_credits_institution_once() -> Result<()> {
    let db = connect().await?;
    onboard(&db, "customer", Role::Customer).await?;
    onboard(&db, "shelter", Role::Institution).await?;
    assert_eq!(profile::balance_of(&db, "shelter").await?, 0);

    ledger::donate(&db, "customer", "shelter", 20).await?;

    assert_eq!(profile::balance_of(&db, "shelter").await?, 20);
    let received = history::recent_received(&db, &LedgerConfig::default(), "shelter").await?;
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].kind, TransactionKind::Donation);
    assert_eq!(received[0].source_id, "customer");
    assert_eq!(received[0].amount, 20);
    assert!(history::reconcile(&db, "shelter").await?.is_consistent());
    Ok(())
}

#[tokio::test]
async fn checkup_pays_configured_reward() -> Result<()> {
    let db = connect().await?;
    onboard(&db, "patient", Role::Customer).await?;
    onboard(&db, "doctor", Role::Doctor).await?;
    onboard(&db, "seller", Role::Salesperson).await?;
    let ledger_config = LedgerConfig {
        checkup_reward: 15,
        ..LedgerConfig::default()
    };

    let offer = appointment::offer_checkup(&db, "patient", "doctor", "blood pressure").await?;
    let skipped = appointment::confirm_checkup(
        &db,
        &ledger_config,
        offer.id,
        "patient",
        &appointment::mint_offer_token(&db, offer.id, "patient").await?,
    )
    .await;
    assert!(matches!(skipped, Err(Error::InvalidState { .. })));

    let offer_token = appointment::mint_offer_token(&db, offer.id, "patient").await?;
    appointment::accept_checkup(&db, offer.id, "doctor", Some(&transport(&offer_token)?)).await?;

    let claim = appointment::mint_claim_token(&db, offer.id, "doctor", "seller").await?;
    let again = appointment::mint_claim_token(&db, offer.id, "doctor", "seller").await?;
    assert_eq!(claim.encode()?, again.encode()?);
    appointment::claim_checkup(&db, offer.id, "seller", &transport(&claim)?).await?;

    let completion = appointment::mint_completion_token(&db, offer.id, "seller").await?;
    let intruder =
        appointment::confirm_checkup(&db, &ledger_config, offer.id, "doctor", &completion).await;
    assert!(matches!(intruder, Err(Error::Unauthorized { .. })));

    let completed =
        appointment::confirm_checkup(&db, &ledger_config, offer.id, "patient", &completion)
            .await?;
    assert_eq!(completed.status, AppointmentStatus::Completed);
    assert!(completed.payment_confirmed);
    assert_eq!(profile::balance_of(&db, "seller").await?, 15);

    let activity = history::recent_activity(&db, &ledger_config, "patient").await?;
    assert_eq!(activity.len(), 1);
    assert_eq!(activity[0].kind, TransactionKind::CheckupPayment);
    assert_eq!(activity[0].patient_offer_id, Some(offer.id));
    Ok(())
}

//! Coin ledger - balance credits and the append-only transaction log.
//!
//! Every credit is two writes: an atomic `coins = coins + amount` on the target
//! profile and one new ledger row. Callers run both on the same database transaction
//! so the balance and the log never disagree. Ledger rows are never updated or
//! deleted; this module offers no way to do either.

use crate::{
    entities::{Profile, Role, Transaction, TransactionKind, profile, transaction},
    errors::{Error, Result},
};
use sea_orm::{Set, TransactionTrait, prelude::*};
use tracing::{info, instrument};

/// A ledger entry about to be written
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewEntry {
    /// Kind of entry
    pub kind: TransactionKind,
    /// Coins to credit, must be positive
    pub amount: i64,
    /// Party the credit is paid on behalf of
    pub source_id: String,
    /// Account to credit
    pub target_id: String,
    /// Human-readable description
    pub description: String,
    /// Order back-reference
    pub order_id: Option<i64>,
    /// Appointment back-reference
    pub patient_offer_id: Option<i64>,
}

/// Atomically adds `amount` to an account's coin balance.
///
/// This performs `UPDATE profiles SET coins = coins + amount WHERE user_id = ? AND
/// coins IS NOT NULL` instead of reading the balance and writing it back, so
/// concurrent credits to the same account cannot lose an update.
///
/// # Errors
/// `NotFound` when the profile is missing, `Validation` when it holds no balance.
pub async fn credit_coins<C>(db: &C, target_id: &str, amount: i64) -> Result<profile::Model>
where
    C: ConnectionTrait,
{
    use sea_orm::sea_query::Expr;

    let result = Profile::update_many()
        .col_expr(
            profile::Column::Coins,
            Expr::col(profile::Column::Coins).add(amount),
        )
        .filter(profile::Column::UserId.eq(target_id))
        .filter(profile::Column::Coins.is_not_null())
        .exec(db)
        .await?;

    let profile = crate::core::profile::require_profile(db, target_id).await?;
    if result.rows_affected == 0 {
        return Err(Error::validation(format!(
            "'{target_id}' is a {} and holds no coin balance",
            profile.role
        )));
    }
    Ok(profile)
}

/// Credits the target account and appends the matching ledger row.
///
/// Runs on whatever connection it is given; pass the caller's database transaction
/// to make the credit part of a larger atomic step.
///
/// # Errors
/// `Validation` for a non-positive amount, plus anything [`credit_coins`] returns.
pub async fn record_credit<C>(db: &C, entry: NewEntry) -> Result<transaction::Model>
where
    C: ConnectionTrait,
{
    if entry.amount <= 0 {
        return Err(Error::validation(format!(
            "Ledger amounts must be positive, got {}",
            entry.amount
        )));
    }

    let credited = credit_coins(db, &entry.target_id, entry.amount).await?;

    let row = transaction::ActiveModel {
        kind: Set(entry.kind),
        amount: Set(entry.amount),
        source_id: Set(entry.source_id),
        target_id: Set(entry.target_id),
        date: Set(chrono::Utc::now()),
        description: Set(entry.description),
        order_id: Set(entry.order_id),
        patient_offer_id: Set(entry.patient_offer_id),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(
        "Ledger {}: {} {} coins {} -> {} (balance now {})",
        row.id,
        row.kind,
        row.amount,
        row.source_id,
        row.target_id,
        credited.coins.unwrap_or_default()
    );
    Ok(row)
}

/// Records a customer donation to an approved institution.
///
/// Donations are unbacked credits: the institution's balance grows and one
/// `donation` row is appended, nothing is debited from the donor.
///
/// # Errors
/// * `Validation` - non-positive amount, or the target is not an approved institution
/// * `Unauthorized` - the donor is not a customer
/// * `NotFound` - the institution has no profile
#[instrument(skip(db))]
pub async fn donate(
    db: &DatabaseConnection,
    donor_id: &str,
    institution_id: &str,
    amount: i64,
) -> Result<transaction::Model> {
    if amount <= 0 {
        return Err(Error::validation(format!(
            "Donation amount must be positive, got {amount}"
        )));
    }

    let txn = db.begin().await?;

    let donor = crate::core::profile::resolve_requester(&txn, donor_id).await?;
    if donor.role != Role::Customer {
        return Err(Error::unauthorized(format!(
            "'{donor_id}' is a {}, only customers donate",
            donor.role
        )));
    }

    let institution = crate::core::profile::require_profile(&txn, institution_id).await?;
    if institution.role != Role::Institution || !institution.approved {
        return Err(Error::validation(format!(
            "'{institution_id}' is not an approved institution"
        )));
    }

    let row = record_credit(
        &txn,
        NewEntry {
            kind: TransactionKind::Donation,
            amount,
            source_id: donor.user_id.clone(),
            target_id: institution.user_id.clone(),
            description: format!("Donation to {}", institution.display_name),
            order_id: None,
            patient_offer_id: None,
        },
    )
    .await?;

    txn.commit().await?;
    Ok(row)
}

/// Retrieves a specific ledger entry by its unique ID.
pub async fn get_transaction_by_id(
    db: &DatabaseConnection,
    transaction_id: i64,
) -> Result<Option<transaction::Model>> {
    Transaction::find_by_id(transaction_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Retrieves the ledger entries that reference an order.
pub async fn transactions_for_order(
    db: &DatabaseConnection,
    order_id: i64,
) -> Result<Vec<transaction::Model>> {
    Transaction::find()
        .filter(transaction::Column::OrderId.eq(order_id))
        .all(db)
        .await
        .map_err(Into::into)
}

/// Retrieves the ledger entries that reference an appointment.
pub async fn transactions_for_appointment(
    db: &DatabaseConnection,
    patient_offer_id: i64,
) -> Result<Vec<transaction::Model>> {
    Transaction::find()
        .filter(transaction::Column::PatientOfferId.eq(patient_offer_id))
        .all(db)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_donate_validation() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();

        let result = donate(&db, "c1", "i1", 0).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        let result = donate(&db, "c1", "i1", -20).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_record_credit_rejects_non_positive_amount() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();
        let entry = NewEntry {
            kind: TransactionKind::CoinTransfer,
            amount: 0,
            source_id: "c1".to_string(),
            target_id: "s1".to_string(),
            description: "nothing".to_string(),
            order_id: None,
            patient_offer_id: None,
        };

        let result = record_credit(&db, entry).await;
        assert!(matches!(result, Err(Error::Validation { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_donate_integration() -> Result<()> {
        let db = setup_test_db().await?;
        create_customer(&db, "c1").await?;
        create_institution(&db, "i1").await?;

        let row = donate(&db, "c1", "i1", 20).await?;
        assert_eq!(row.kind, TransactionKind::Donation);
        assert_eq!(row.amount, 20);
        assert_eq!(row.source_id, "c1");
        assert_eq!(row.target_id, "i1");

        assert_eq!(crate::core::profile::balance_of(&db, "i1").await?, 20);
        assert_eq!(get_transaction_by_id(&db, row.id).await?.unwrap(), row);
        Ok(())
    }

    #[tokio::test]
    async fn test_donate_rejects_bad_parties() -> Result<()> {
        let db = setup_test_db().await?;
        create_customer(&db, "c1").await?;
        create_customer(&db, "c2").await?;
        create_salesperson(&db, "s1").await?;
        create_institution(&db, "i1").await?;
        crate::core::profile::select_role(
            &db,
            "i2",
            Role::Institution,
            crate::core::profile::ProfileDetails::default(),
        )
        .await?;

        let from_salesperson = donate(&db, "s1", "i1", 5).await;
        assert!(matches!(from_salesperson, Err(Error::Unauthorized { .. })));

        let from_stranger = donate(&db, "ghost", "i1", 5).await;
        assert!(matches!(from_stranger, Err(Error::Unauthorized { .. })));

        let to_customer = donate(&db, "c1", "c2", 5).await;
        assert!(matches!(to_customer, Err(Error::Validation { .. })));

        let to_unapproved = donate(&db, "c1", "i2", 5).await;
        assert!(matches!(to_unapproved, Err(Error::Validation { .. })));

        let to_nobody = donate(&db, "c1", "nobody", 5).await;
        assert!(matches!(to_nobody, Err(Error::NotFound { .. })));

        assert_eq!(crate::core::profile::balance_of(&db, "i1").await?, 0);
        assert!(Transaction::find().all(&db).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_credit_coins_is_additive() -> Result<()> {
        let db = setup_test_db().await?;
        create_salesperson(&db, "s1").await?;

        credit_coins(&db, "s1", 5).await?;
        let profile = credit_coins(&db, "s1", 7).await?;
        assert_eq!(profile.coins, Some(12));
        Ok(())
    }

    #[tokio::test]
    async fn test_credit_coins_requires_balance_holder() -> Result<()> {
        let db = setup_test_db().await?;
        create_customer(&db, "c1").await?;

        let customer = credit_coins(&db, "c1", 5).await;
        assert!(matches!(customer, Err(Error::Validation { .. })));

        let missing = credit_coins(&db, "nobody", 5).await;
        assert!(matches!(missing, Err(Error::NotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_credits_do_not_lose_updates() -> Result<()> {
        let db = setup_test_db().await?;
        create_customer(&db, "c1").await?;
        create_institution(&db, "i1").await?;

        let (a, b, c) = tokio::join!(
            donate(&db, "c1", "i1", 3),
            donate(&db, "c1", "i1", 4),
            donate(&db, "c1", "i1", 5),
        );
        a?;
        b?;
        c?;

        assert_eq!(crate::core::profile::balance_of(&db, "i1").await?, 12);
        Ok(())
    }
}

//! Profile business logic - role selection, onboarding approval and lookups.
//!
//! The identity provider hands the core an opaque user id; everything the core knows
//! about that user (role, approval, balance) lives on the profile created here.

use crate::{
    entities::{Profile, Role, profile},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*};
use tracing::{info, instrument};

/// Role-specific attributes captured at role selection
#[derive(Clone, Debug, Default)]
pub struct ProfileDetails {
    /// Human-readable name, defaults to the user id when empty
    pub display_name: String,
    /// Bank details (institutions)
    pub bank_details: Option<String>,
    /// Postal address
    pub address: Option<String>,
    /// Manager id (salespersons)
    pub manager_id: Option<String>,
    /// Medical specialty (doctors)
    pub specialty: Option<String>,
}

/// Finds a profile by user id.
pub async fn get_profile<C>(db: &C, user_id: &str) -> Result<Option<profile::Model>>
where
    C: ConnectionTrait,
{
    Profile::find_by_id(user_id.to_string())
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds a profile by user id, failing with `NotFound` when absent.
pub async fn require_profile<C>(db: &C, user_id: &str) -> Result<profile::Model>
where
    C: ConnectionTrait,
{
    get_profile(db, user_id)
        .await?
        .ok_or_else(|| Error::NotFound {
            entity: "profile",
            id: user_id.to_string(),
        })
}

/// Resolves the profile of the user making a request.
///
/// A user without a profile has no role and therefore no right to act, so a missing
/// profile is `Unauthorized` rather than `NotFound`.
pub async fn resolve_requester<C>(db: &C, user_id: &str) -> Result<profile::Model>
where
    C: ConnectionTrait,
{
    get_profile(db, user_id)
        .await?
        .ok_or_else(|| Error::unauthorized(format!("'{user_id}' has no profile")))
}

/// Looks up a salesperson who is about to be named in a claim token.
///
/// # Errors
/// `NotFound` when no profile exists, `Validation` when the profile is not an
/// approved salesperson.
pub async fn require_approved_salesperson<C>(db: &C, user_id: &str) -> Result<profile::Model>
where
    C: ConnectionTrait,
{
    let salesperson = require_profile(db, user_id).await?;
    if salesperson.role != Role::Salesperson || !salesperson.approved {
        return Err(Error::validation(format!(
            "'{user_id}' is not an approved salesperson"
        )));
    }
    Ok(salesperson)
}

async fn insert_profile<C>(
    db: &C,
    user_id: &str,
    role: Role,
    approved: bool,
    details: ProfileDetails,
) -> Result<profile::Model>
where
    C: ConnectionTrait,
{
    let display_name = if details.display_name.trim().is_empty() {
        user_id.to_string()
    } else {
        details.display_name.trim().to_string()
    };

    let profile = profile::ActiveModel {
        user_id: Set(user_id.to_string()),
        role: Set(role),
        display_name: Set(display_name),
        coins: Set(role.holds_coins().then_some(0)),
        approved: Set(approved),
        bank_details: Set(details.bank_details),
        address: Set(details.address),
        manager_id: Set(details.manager_id),
        specialty: Set(details.specialty),
        created_at: Set(chrono::Utc::now()),
    };
    profile.insert(db).await.map_err(Into::into)
}

/// Creates the user's profile on first role selection.
///
/// Customers are usable immediately; salespersons, doctors and institutions wait for
/// admin approval. Institutions and salespersons start with a zero coin balance.
///
/// # Errors
/// * `Validation` - empty user id, or the user already has a profile
/// * `Unauthorized` - `admin` cannot be self-selected
#[instrument(skip(db, details))]
pub async fn select_role(
    db: &DatabaseConnection,
    user_id: &str,
    role: Role,
    details: ProfileDetails,
) -> Result<profile::Model> {
    if user_id.trim().is_empty() {
        return Err(Error::validation("User id cannot be empty"));
    }
    if role == Role::Admin {
        return Err(Error::unauthorized("the admin role cannot be self-selected"));
    }
    if let Some(existing) = get_profile(db, user_id).await? {
        return Err(Error::validation(format!(
            "'{user_id}' already has the {} role",
            existing.role
        )));
    }

    let profile = insert_profile(db, user_id, role, !role.requires_approval(), details).await?;
    info!(
        "Created {} profile for {} (approved: {})",
        profile.role, profile.user_id, profile.approved
    );
    Ok(profile)
}

/// Makes sure an approved admin profile exists for `user_id`.
///
/// Used to bootstrap admins from configuration. An existing profile with another role
/// is left alone and reported as `Validation`.
#[instrument(skip(db))]
pub async fn ensure_admin(db: &DatabaseConnection, user_id: &str) -> Result<profile::Model> {
    match get_profile(db, user_id).await? {
        Some(existing) if existing.role == Role::Admin => Ok(existing),
        Some(existing) => Err(Error::validation(format!(
            "'{user_id}' already has the {} role",
            existing.role
        ))),
        None => {
            let admin = insert_profile(db, user_id, Role::Admin, true, ProfileDetails::default())
                .await?;
            info!("Bootstrapped admin profile {}", admin.user_id);
            Ok(admin)
        }
    }
}

/// Approves an onboarding-gated profile. Approving an approved profile is a no-op.
///
/// # Errors
/// * `Unauthorized` - the approver is not an admin
/// * `NotFound` - no profile for `user_id`
#[instrument(skip(db))]
pub async fn approve_profile(
    db: &DatabaseConnection,
    admin_id: &str,
    user_id: &str,
) -> Result<profile::Model> {
    let admin = resolve_requester(db, admin_id).await?;
    if admin.role != Role::Admin {
        return Err(Error::unauthorized(format!(
            "'{admin_id}' is not an admin"
        )));
    }

    let profile = require_profile(db, user_id).await?;
    if profile.approved {
        return Ok(profile);
    }

    let mut active: profile::ActiveModel = profile.into();
    active.approved = Set(true);
    let approved = active.update(db).await?;
    info!("{} approved {} profile {}", admin_id, approved.role, approved.user_id);
    Ok(approved)
}

/// Lists approved institutions, the valid donation targets, ordered by name.
pub async fn list_approved_institutions(db: &DatabaseConnection) -> Result<Vec<profile::Model>> {
    Profile::find()
        .filter(profile::Column::Role.eq(Role::Institution))
        .filter(profile::Column::Approved.eq(true))
        .order_by_asc(profile::Column::DisplayName)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Lists profiles waiting for admin approval, oldest first.
pub async fn list_pending_approvals(db: &DatabaseConnection) -> Result<Vec<profile::Model>> {
    Profile::find()
        .filter(profile::Column::Approved.eq(false))
        .order_by_asc(profile::Column::CreatedAt)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Current coin balance of an account.
///
/// # Errors
/// `NotFound` when no profile exists, `Validation` when the role holds no coins.
pub async fn balance_of<C>(db: &C, user_id: &str) -> Result<i64>
where
    C: ConnectionTrait,
{
    let profile = require_profile(db, user_id).await?;
    profile.coins.ok_or_else(|| {
        Error::validation(format!(
            "'{user_id}' is a {} and holds no coin balance",
            profile.role
        ))
    })
}

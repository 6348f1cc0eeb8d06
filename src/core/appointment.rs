//! Appointment workflow - checkup offers, acceptance, escort and completion.
//!
//! ```text
//! pending --accept--> accepted --claim--> assigned_to_salesperson --confirm--> completed
//! ```
//!
//! The patient offers a checkup to a named doctor. The doctor accepts and mints a
//! claim token for a salesperson, who escorts the checkup and mints the completion
//! token the patient presents. Completion pays the configured checkup reward.

use crate::{
    config::settings::LedgerConfig,
    core::{
        engine::{self, Actor, Edge, EdgeRule, FulfillmentRecord, Gate, TokenRule},
        ledger::{self, NewEntry},
        profile,
        token::{HandoffToken, RecordRef},
    },
    entities::{Appointment, AppointmentStatus, Role, TransactionKind, appointment},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use tracing::{info, instrument, warn};

/// Appointment edge table
pub const APPOINTMENT_EDGES: &[EdgeRule<AppointmentStatus>] = &[
    EdgeRule {
        edge: Edge::Accept,
        from: AppointmentStatus::Pending,
        to: AppointmentStatus::Accepted,
        gate: Gate::NamedDoctor,
        token: TokenRule::Optional(Actor::NamedDoctor),
        issuer: Some(Gate::Owner),
    },
    EdgeRule {
        edge: Edge::Claim,
        from: AppointmentStatus::Accepted,
        to: AppointmentStatus::AssignedToSalesperson,
        gate: Gate::Salesperson,
        token: TokenRule::Required(Actor::Requester),
        issuer: Some(Gate::NamedDoctor),
    },
    EdgeRule {
        edge: Edge::Confirm,
        from: AppointmentStatus::AssignedToSalesperson,
        to: AppointmentStatus::Completed,
        gate: Gate::Owner,
        token: TokenRule::Required(Actor::AssignedSalesperson),
        issuer: Some(Gate::AssignedSalesperson),
    },
];

impl FulfillmentRecord for appointment::Model {
    type Status = AppointmentStatus;

    const ENTITY: &'static str = "appointment";

    fn edges() -> &'static [EdgeRule<AppointmentStatus>] {
        APPOINTMENT_EDGES
    }

    fn record_ref(&self) -> RecordRef {
        RecordRef::Appointment(self.id)
    }

    fn status(&self) -> AppointmentStatus {
        self.status
    }

    fn owner_id(&self) -> &str {
        &self.patient_id
    }

    fn named_doctor(&self) -> Option<&str> {
        Some(&self.doctor_id)
    }

    fn salesperson_id(&self) -> Option<&str> {
        self.salesperson_id.as_deref()
    }

    fn id_string(&self) -> String {
        self.id.to_string()
    }
}

/// Finds an appointment by id.
pub async fn get_appointment<C>(db: &C, appointment_id: i64) -> Result<Option<appointment::Model>>
where
    C: ConnectionTrait,
{
    Appointment::find_by_id(appointment_id)
        .one(db)
        .await
        .map_err(Into::into)
}

async fn load_appointment<C>(db: &C, appointment_id: i64) -> Result<appointment::Model>
where
    C: ConnectionTrait,
{
    get_appointment(db, appointment_id)
        .await?
        .ok_or_else(|| Error::NotFound {
            entity: "appointment",
            id: appointment_id.to_string(),
        })
}

/// A patient offers a checkup to an approved doctor.
///
/// # Errors
/// * `Validation` - empty reason, or the target is not an approved doctor
/// * `Unauthorized` - the patient is not a customer
/// * `NotFound` - the doctor has no profile
#[instrument(skip(db, reason))]
pub async fn offer_checkup(
    db: &DatabaseConnection,
    patient_id: &str,
    doctor_id: &str,
    reason: &str,
) -> Result<appointment::Model> {
    if reason.trim().is_empty() {
        return Err(Error::validation("Checkup reason cannot be empty"));
    }

    let patient = profile::resolve_requester(db, patient_id).await?;
    if patient.role != Role::Customer {
        return Err(Error::unauthorized(format!(
            "'{patient_id}' is a {}, only customers book checkups",
            patient.role
        )));
    }

    let doctor = profile::require_profile(db, doctor_id).await?;
    if doctor.role != Role::Doctor || !doctor.approved {
        return Err(Error::validation(format!(
            "'{doctor_id}' is not an approved doctor"
        )));
    }

    let appointment = appointment::ActiveModel {
        patient_id: Set(patient.user_id),
        doctor_id: Set(doctor.user_id),
        reason: Set(reason.trim().to_string()),
        status: Set(AppointmentStatus::Pending),
        salesperson_id: Set(None),
        offered_on: Set(chrono::Utc::now()),
        accepted_on: Set(None),
        completed_on: Set(None),
        payment_confirmed: Set(false),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(
        "Checkup {} offered by {} to doctor {}",
        appointment.id, appointment.patient_id, appointment.doctor_id
    );
    Ok(appointment)
}

/// Mints the token the patient shows the named doctor. Nothing is written.
#[instrument(skip(db))]
pub async fn mint_offer_token(
    db: &DatabaseConnection,
    appointment_id: i64,
    issuer_id: &str,
) -> Result<HandoffToken> {
    let appointment = load_appointment(db, appointment_id).await?;
    let issuer = profile::resolve_requester(db, issuer_id).await?;
    engine::issue(&appointment, Edge::Accept, &issuer, None)
}

/// Mints the token a salesperson presents to claim an accepted checkup.
///
/// Only the named doctor may mint it, and only for an approved salesperson.
#[instrument(skip(db))]
pub async fn mint_claim_token(
    db: &DatabaseConnection,
    appointment_id: i64,
    issuer_id: &str,
    salesperson_id: &str,
) -> Result<HandoffToken> {
    let appointment = load_appointment(db, appointment_id).await?;
    let issuer = profile::resolve_requester(db, issuer_id).await?;
    let token = engine::issue(&appointment, Edge::Claim, &issuer, Some(salesperson_id))?;
    profile::require_approved_salesperson(db, salesperson_id).await?;
    Ok(token)
}

/// Mints the token the patient presents to confirm the checkup took place.
#[instrument(skip(db))]
pub async fn mint_completion_token(
    db: &DatabaseConnection,
    appointment_id: i64,
    issuer_id: &str,
) -> Result<HandoffToken> {
    let appointment = load_appointment(db, appointment_id).await?;
    let issuer = profile::resolve_requester(db, issuer_id).await?;
    engine::issue(&appointment, Edge::Confirm, &issuer, None)
}

/// The named doctor accepts a pending checkup offer.
///
/// A token is optional; when one is presented it must be this offer's token.
#[instrument(skip(db, token))]
pub async fn accept_checkup(
    db: &DatabaseConnection,
    appointment_id: i64,
    requester_id: &str,
    token: Option<&HandoffToken>,
) -> Result<appointment::Model> {
    let txn = db.begin().await?;

    let appointment = load_appointment(&txn, appointment_id).await?;
    let requester = profile::resolve_requester(&txn, requester_id).await?;
    let rule = engine::authorize(&appointment, Edge::Accept, &requester, token)
        .inspect_err(|e| warn!("Acceptance of checkup {} rejected: {}", appointment_id, e))?;

    let result = Appointment::update_many()
        .col_expr(appointment::Column::Status, Expr::value(rule.to))
        .col_expr(
            appointment::Column::AcceptedOn,
            Expr::value(Some(chrono::Utc::now())),
        )
        .filter(appointment::Column::Id.eq(appointment_id))
        .filter(appointment::Column::Status.eq(rule.from))
        .exec(&txn)
        .await?;
    if result.rows_affected == 0 {
        let fresh = load_appointment(&txn, appointment_id).await?;
        return Err(engine::explain_lost_write(&fresh, Edge::Accept, &requester, token));
    }

    let accepted = load_appointment(&txn, appointment_id).await?;
    txn.commit().await?;
    info!("Checkup {} accepted by {}", appointment_id, requester_id);
    Ok(accepted)
}

/// A salesperson takes on an accepted checkup. First claim wins.
#[instrument(skip(db, token), fields(record = %token.record))]
pub async fn claim_checkup(
    db: &DatabaseConnection,
    appointment_id: i64,
    requester_id: &str,
    token: &HandoffToken,
) -> Result<appointment::Model> {
    let txn = db.begin().await?;

    let appointment = load_appointment(&txn, appointment_id).await?;
    let requester = profile::resolve_requester(&txn, requester_id).await?;
    let rule = engine::authorize(&appointment, Edge::Claim, &requester, Some(token))
        .inspect_err(|e| warn!("Claim of checkup {} rejected: {}", appointment_id, e))?;

    let result = Appointment::update_many()
        .col_expr(appointment::Column::Status, Expr::value(rule.to))
        .col_expr(
            appointment::Column::SalespersonId,
            Expr::value(Some(requester.user_id.clone())),
        )
        .filter(appointment::Column::Id.eq(appointment_id))
        .filter(appointment::Column::Status.eq(rule.from))
        .filter(appointment::Column::SalespersonId.is_null())
        .exec(&txn)
        .await?;
    if result.rows_affected == 0 {
        let fresh = load_appointment(&txn, appointment_id).await?;
        return Err(engine::explain_lost_write(&fresh, Edge::Claim, &requester, Some(token)));
    }

    let claimed = load_appointment(&txn, appointment_id).await?;
    txn.commit().await?;
    info!("Checkup {} claimed by {}", appointment_id, requester_id);
    Ok(claimed)
}

/// The patient confirms the checkup took place.
///
/// Completes the appointment, marks the payment confirmed, credits
/// `ledger.checkup_reward` to the salesperson and appends a `checkup_payment` entry,
/// all in one database transaction.
#[instrument(skip(db, ledger_config, token), fields(record = %token.record))]
pub async fn confirm_checkup(
    db: &DatabaseConnection,
    ledger_config: &LedgerConfig,
    appointment_id: i64,
    requester_id: &str,
    token: &HandoffToken,
) -> Result<appointment::Model> {
    let txn = db.begin().await?;

    let appointment = load_appointment(&txn, appointment_id).await?;
    let requester = profile::resolve_requester(&txn, requester_id).await?;
    let rule = engine::authorize(&appointment, Edge::Confirm, &requester, Some(token))
        .inspect_err(|e| warn!("Completion of checkup {} rejected: {}", appointment_id, e))?;
    let salesperson_id = appointment
        .salesperson_id
        .clone()
        .ok_or_else(|| Error::Conflict {
            entity: "appointment",
            id: appointment_id.to_string(),
        })?;

    let result = Appointment::update_many()
        .col_expr(appointment::Column::Status, Expr::value(rule.to))
        .col_expr(
            appointment::Column::CompletedOn,
            Expr::value(Some(chrono::Utc::now())),
        )
        .col_expr(appointment::Column::PaymentConfirmed, Expr::value(true))
        .filter(appointment::Column::Id.eq(appointment_id))
        .filter(appointment::Column::Status.eq(rule.from))
        .filter(appointment::Column::SalespersonId.eq(salesperson_id.as_str()))
        .exec(&txn)
        .await?;
    if result.rows_affected == 0 {
        let fresh = load_appointment(&txn, appointment_id).await?;
        return Err(engine::explain_lost_write(&fresh, Edge::Confirm, &requester, Some(token)));
    }

    ledger::record_credit(
        &txn,
        NewEntry {
            kind: TransactionKind::CheckupPayment,
            amount: ledger_config.checkup_reward,
            source_id: appointment.patient_id.clone(),
            target_id: salesperson_id.clone(),
            description: format!(
                "Checkup {} with doctor {}",
                appointment_id, appointment.doctor_id
            ),
            order_id: None,
            patient_offer_id: Some(appointment_id),
        },
    )
    .await?;

    let completed = load_appointment(&txn, appointment_id).await?;
    txn.commit().await?;
    info!("Checkup {} completed with {}", appointment_id, salesperson_id);
    Ok(completed)
}

/// Checkups offered by `patient_id`, newest first.
pub async fn appointments_for_patient(
    db: &DatabaseConnection,
    patient_id: &str,
) -> Result<Vec<appointment::Model>> {
    Appointment::find()
        .filter(appointment::Column::PatientId.eq(patient_id))
        .order_by_desc(appointment::Column::OfferedOn)
        .order_by_desc(appointment::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Offers addressed to `doctor_id`, optionally narrowed to one status, oldest first.
pub async fn offers_for_doctor(
    db: &DatabaseConnection,
    doctor_id: &str,
    status: Option<AppointmentStatus>,
) -> Result<Vec<appointment::Model>> {
    let mut query = Appointment::find().filter(appointment::Column::DoctorId.eq(doctor_id));
    if let Some(status) = status {
        query = query.filter(appointment::Column::Status.eq(status));
    }
    query
        .order_by_asc(appointment::Column::OfferedOn)
        .order_by_asc(appointment::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Accepted checkups no salesperson has claimed yet, oldest first.
pub async fn checkups_awaiting_salesperson(
    db: &DatabaseConnection,
) -> Result<Vec<appointment::Model>> {
    Appointment::find()
        .filter(appointment::Column::Status.eq(AppointmentStatus::Accepted))
        .filter(appointment::Column::SalespersonId.is_null())
        .order_by_asc(appointment::Column::OfferedOn)
        .order_by_asc(appointment::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Checkups claimed by `salesperson_id`, newest first.
pub async fn checkups_for_salesperson(
    db: &DatabaseConnection,
    salesperson_id: &str,
) -> Result<Vec<appointment::Model>> {
    Appointment::find()
        .filter(appointment::Column::SalespersonId.eq(salesperson_id))
        .order_by_desc(appointment::Column::OfferedOn)
        .order_by_desc(appointment::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

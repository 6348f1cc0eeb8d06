//! Appointment entity - A checkup offer from a patient to a named doctor.
//!
//! Stored in the `patient_offers` table. The doctor accepts, a salesperson claims the
//! escort and the patient confirms completion.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Appointment status values
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    /// Offered, waiting for the named doctor
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Accepted by the doctor, waiting for a salesperson
    #[sea_orm(string_value = "accepted")]
    Accepted,
    /// A salesperson escorts the checkup
    #[sea_orm(string_value = "assigned_to_salesperson")]
    AssignedToSalesperson,
    /// The patient confirmed the checkup took place
    #[sea_orm(string_value = "completed")]
    Completed,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_value())
    }
}

/// Appointment database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "patient_offers")]
pub struct Model {
    /// Unique identifier for the appointment
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Patient who made the offer (owner)
    pub patient_id: String,
    /// Doctor the offer is addressed to
    pub doctor_id: String,
    /// Why the patient wants a checkup
    pub reason: String,
    /// Current position in the state machine
    pub status: AppointmentStatus,
    /// Salesperson escorting the checkup, set by the claim edge
    pub salesperson_id: Option<String>,
    /// When the offer was made
    pub offered_on: DateTimeUtc,
    /// When the doctor accepted
    pub accepted_on: Option<DateTimeUtc>,
    /// When the patient confirmed completion
    pub completed_on: Option<DateTimeUtc>,
    /// Whether the checkup reward has been paid out
    pub payment_confirmed: bool,
}

/// `Appointment` parties are resolved by id in the core layer
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

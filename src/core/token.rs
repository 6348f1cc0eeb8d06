//! Handoff tokens - the text carried from one party's device to the next.
//!
//! A token names exactly one record (an order or a patient offer), the party it
//! authorizes, and the edge it may be spent on. Tokens are unsigned capability
//! references: verification always re-reads the record and compares the named
//! actor against the record's current fields, and replays are rejected by the state
//! machine because the edge's source status has already been left.
//!
//! The wire form is compact JSON with camelCase keys, e.g.
//! `{"orderId":7,"salespersonId":"s-1","edge":"claim"}`.

use crate::{
    core::engine::Edge,
    errors::{Error, Result},
};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Reference to the record a token is about
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RecordRef {
    /// An order id
    Order(i64),
    /// A patient offer (appointment) id
    Appointment(i64),
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Order(id) => write!(f, "order {id}"),
            Self::Appointment(id) => write!(f, "appointment {id}"),
        }
    }
}

/// Which kind of party a token authorizes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActorRole {
    /// Carried as `salespersonId`
    Salesperson,
    /// Carried as `doctorId`
    Doctor,
}

/// A parsed handoff token
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandoffToken {
    /// Record the token refers to
    pub record: RecordRef,
    /// Transition the token may be spent on
    pub edge: Edge,
    /// Kind of party the token names
    pub actor_role: ActorRole,
    /// Id of the party the token names
    pub actor_id: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireToken {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    order_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    patient_offer_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    salesperson_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    doctor_id: Option<String>,
    edge: Edge,
}

impl HandoffToken {
    /// Builds a token value. Minting with authorization checks lives in
    /// [`crate::core::engine::issue`].
    #[must_use]
    pub fn new(record: RecordRef, edge: Edge, actor_role: ActorRole, actor_id: String) -> Self {
        Self {
            record,
            edge,
            actor_role,
            actor_id,
        }
    }

    /// Serializes the token into its transport text.
    ///
    /// The output depends only on the token's fields, so re-encoding the same
    /// token always yields the same string.
    pub fn encode(&self) -> Result<String> {
        let (order_id, patient_offer_id) = match self.record {
            RecordRef::Order(id) => (Some(id), None),
            RecordRef::Appointment(id) => (None, Some(id)),
        };
        let (salesperson_id, doctor_id) = match self.actor_role {
            ActorRole::Salesperson => (Some(self.actor_id.clone()), None),
            ActorRole::Doctor => (None, Some(self.actor_id.clone())),
        };
        let wire = WireToken {
            order_id,
            patient_offer_id,
            salesperson_id,
            doctor_id,
            edge: self.edge,
        };
        serde_json::to_string(&wire).map_err(|e| Error::malformed(e.to_string()))
    }

    /// Parses transport text back into a token.
    ///
    /// # Errors
    /// Returns `Error::MalformedToken` when the text is not a token, names zero or two
    /// records, names zero or two actors, or names an empty actor id.
    pub fn parse(text: &str) -> Result<Self> {
        let wire: WireToken = serde_json::from_str(text.trim())
            .map_err(|e| Error::malformed(format!("not a handoff token: {e}")))?;

        let record = match (wire.order_id, wire.patient_offer_id) {
            (Some(id), None) => RecordRef::Order(id),
            (None, Some(id)) => RecordRef::Appointment(id),
            (Some(_), Some(_)) => {
                return Err(Error::malformed(
                    "token names both an order and a patient offer",
                ));
            }
            (None, None) => return Err(Error::malformed("token names no record")),
        };

        let (actor_role, actor_id) = match (wire.salesperson_id, wire.doctor_id) {
            (Some(id), None) => (ActorRole::Salesperson, id),
            (None, Some(id)) => (ActorRole::Doctor, id),
            (Some(_), Some(_)) => {
                return Err(Error::malformed(
                    "token names both a salesperson and a doctor",
                ));
            }
            (None, None) => return Err(Error::malformed("token names no actor")),
        };

        if actor_id.trim().is_empty() {
            return Err(Error::malformed("token actor id is empty"));
        }

        Ok(Self::new(record, wire.edge, actor_role, actor_id))
    }
}

impl FromStr for HandoffToken {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

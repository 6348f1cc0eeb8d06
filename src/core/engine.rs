//! Transition engine shared by orders and appointments.
//!
//! Each record kind publishes a static edge table through [`FulfillmentRecord`].
//! [`authorize`] checks a requested edge against the record's current fields, the
//! requester's profile and the presented token; [`issue`] mints tokens under the
//! same table. Neither function touches storage: the record modules load the
//! record, call into the engine, then apply the edge with a conditional write.
//!
//! Checks run in a fixed order so that every failure has one answer:
//! requester gate (`Unauthorized`), claim holder (`AlreadyAssigned`), source status
//! (`InvalidState`), then token contents (`MalformedToken` / `Unauthorized`).

use crate::{
    core::token::{ActorRole, HandoffToken, RecordRef},
    entities::{Role, profile},
    errors::{Error, Result},
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A transition between two statuses
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Edge {
    /// The named doctor accepts a checkup offer
    Accept,
    /// A salesperson takes custody of an unassigned record
    Claim,
    /// The owner confirms the salesperson completed the hand-off
    Confirm,
    /// A doctor buys a product for themselves, skipping delivery
    DoctorPurchase,
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Accept => "accept",
            Self::Claim => "claim",
            Self::Confirm => "confirm",
            Self::DoctorPurchase => "doctor_purchase",
        })
    }
}

/// Who may pass a gate
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Gate {
    /// The user who created the record
    Owner,
    /// The record owner, acting as a doctor
    OwningDoctor,
    /// The doctor the record is addressed to
    NamedDoctor,
    /// Any approved salesperson
    Salesperson,
    /// The salesperson currently holding the record
    AssignedSalesperson,
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Owner => "the record owner",
            Self::OwningDoctor => "the owning doctor",
            Self::NamedDoctor => "the named doctor",
            Self::Salesperson => "an approved salesperson",
            Self::AssignedSalesperson => "the assigned salesperson",
        })
    }
}

/// The party a token must name
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Actor {
    /// Whoever presents the token
    Requester,
    /// The salesperson on the record
    AssignedSalesperson,
    /// The doctor on the record
    NamedDoctor,
}

impl Actor {
    const fn role(self) -> ActorRole {
        match self {
            Self::Requester | Self::AssignedSalesperson => ActorRole::Salesperson,
            Self::NamedDoctor => ActorRole::Doctor,
        }
    }
}

/// Whether an edge consumes a token
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenRule {
    /// Tokens are ignored
    None,
    /// A token may be presented; if it is, it must name this actor
    Optional(Actor),
    /// A token naming this actor must be presented
    Required(Actor),
}

/// One row of a record kind's edge table
#[derive(Debug)]
pub struct EdgeRule<S: 'static> {
    /// Edge this row describes
    pub edge: Edge,
    /// Source status
    pub from: S,
    /// Target status
    pub to: S,
    /// Who may trigger the edge
    pub gate: Gate,
    /// Token the trigger must present
    pub token: TokenRule,
    /// Who may mint a token for the edge, `None` when the edge is not handed off
    pub issuer: Option<Gate>,
}

/// Capability set shared by orders and appointments
pub trait FulfillmentRecord {
    /// Status enum of the record kind
    type Status: Copy + Eq + fmt::Display + 'static;

    /// Entity name used in error messages
    const ENTITY: &'static str;

    /// Edge table for the record kind
    fn edges() -> &'static [EdgeRule<Self::Status>];

    /// Reference embedded in tokens
    fn record_ref(&self) -> RecordRef;

    /// Current status
    fn status(&self) -> Self::Status;

    /// User who created the record
    fn owner_id(&self) -> &str;

    /// Doctor the record is addressed to, if the kind has one
    fn named_doctor(&self) -> Option<&str>;

    /// Salesperson holding the record, once claimed
    fn salesperson_id(&self) -> Option<&str>;

    /// Record id as text
    fn id_string(&self) -> String;
}

fn rule_for<R: FulfillmentRecord>(record: &R, edge: Edge) -> Result<&'static EdgeRule<R::Status>> {
    R::edges()
        .iter()
        .find(|rule| rule.edge == edge)
        .ok_or_else(|| Error::InvalidState {
            entity: R::ENTITY,
            id: record.id_string(),
            current: record.status().to_string(),
            expected: format!("a status with a {edge} edge"),
        })
}

fn passes<R: FulfillmentRecord>(gate: Gate, record: &R, who: &profile::Model) -> bool {
    let user_id = who.user_id.as_str();
    match gate {
        Gate::Owner => record.owner_id() == user_id,
        Gate::OwningDoctor => who.role == Role::Doctor && record.owner_id() == user_id,
        Gate::NamedDoctor => who.role == Role::Doctor && record.named_doctor() == Some(user_id),
        Gate::Salesperson => who.role == Role::Salesperson && who.approved,
        Gate::AssignedSalesperson => {
            who.role == Role::Salesperson && record.salesperson_id() == Some(user_id)
        }
    }
}

fn require_source<R: FulfillmentRecord>(record: &R, rule: &EdgeRule<R::Status>) -> Result<()> {
    if record.status() == rule.from {
        Ok(())
    } else {
        Err(Error::InvalidState {
            entity: R::ENTITY,
            id: record.id_string(),
            current: record.status().to_string(),
            expected: rule.from.to_string(),
        })
    }
}

fn expected_actor<'a, R: FulfillmentRecord>(
    actor: Actor,
    record: &'a R,
    requester: &'a profile::Model,
) -> Option<&'a str> {
    match actor {
        Actor::Requester => Some(requester.user_id.as_str()),
        Actor::AssignedSalesperson => record.salesperson_id(),
        Actor::NamedDoctor => record.named_doctor(),
    }
}

fn check_token<R: FulfillmentRecord>(
    record: &R,
    rule: &EdgeRule<R::Status>,
    requester: &profile::Model,
    token: Option<&HandoffToken>,
) -> Result<()> {
    let (actor, token) = match (rule.token, token) {
        (TokenRule::None, _) | (TokenRule::Optional(_), None) => return Ok(()),
        (TokenRule::Required(_), None) => {
            return Err(Error::malformed(format!(
                "{} requires a handoff token",
                rule.edge
            )));
        }
        (TokenRule::Optional(actor) | TokenRule::Required(actor), Some(token)) => (actor, token),
    };

    if token.record != record.record_ref() {
        return Err(Error::unauthorized(format!(
            "token refers to {}, not {}",
            token.record,
            record.record_ref()
        )));
    }
    if token.edge != rule.edge {
        return Err(Error::unauthorized(format!(
            "token was issued for {}, not {}",
            token.edge, rule.edge
        )));
    }
    if token.actor_role != actor.role()
        || expected_actor(actor, record, requester) != Some(token.actor_id.as_str())
    {
        return Err(Error::unauthorized(format!(
            "token names '{}', who is not authorized for {} on {}",
            token.actor_id,
            rule.edge,
            record.record_ref()
        )));
    }
    Ok(())
}

/// Validates a transition request and returns the edge rule to apply.
///
/// # Errors
/// * `Unauthorized` - the requester fails the edge's gate, or the token names a
///   different record, edge or actor
/// * `AlreadyAssigned` - a claim on a record another salesperson holds
/// * `InvalidState` - the record is not in the edge's source status, or the edge is
///   not defined for the record kind
/// * `MalformedToken` - a required token is missing
pub fn authorize<R: FulfillmentRecord>(
    record: &R,
    edge: Edge,
    requester: &profile::Model,
    token: Option<&HandoffToken>,
) -> Result<&'static EdgeRule<R::Status>> {
    let rule = rule_for(record, edge)?;

    if !passes(rule.gate, record, requester) {
        return Err(Error::unauthorized(format!(
            "'{}' may not {} {}: requires {}",
            requester.user_id,
            edge,
            record.record_ref(),
            rule.gate
        )));
    }

    if let (Edge::Claim, Some(holder)) = (edge, record.salesperson_id()) {
        if holder != requester.user_id {
            return Err(Error::AlreadyAssigned {
                entity: R::ENTITY,
                id: record.id_string(),
                salesperson_id: holder.to_string(),
            });
        }
        // the requester's own claim already landed; the token is spent
        return Err(Error::InvalidState {
            entity: R::ENTITY,
            id: record.id_string(),
            current: record.status().to_string(),
            expected: rule.from.to_string(),
        });
    }

    require_source(record, rule)?;
    check_token(record, rule, requester, token)?;
    Ok(rule)
}

/// Builds the error for a conditional write that matched no row.
///
/// `fresh` is the record re-read after the write; the checks that failed against it
/// describe what the concurrent writer changed. If they all pass, the write lost to
/// something the checks cannot see and the caller gets `Conflict`.
pub fn explain_lost_write<R: FulfillmentRecord>(
    fresh: &R,
    edge: Edge,
    requester: &profile::Model,
    token: Option<&HandoffToken>,
) -> Error {
    match authorize(fresh, edge, requester, token) {
        Err(e) => e,
        Ok(_) => Error::Conflict {
            entity: R::ENTITY,
            id: fresh.id_string(),
        },
    }
}

/// Mints a token for `edge` on `record`.
///
/// The issuer must pass the edge's issuer gate and the record must sit in the edge's
/// source status. Claim tokens name `claimant`; other edges name the party already on
/// the record. Minting never changes the record, and minting twice yields equal tokens.
///
/// # Errors
/// * `Validation` - the edge is not handed off by token, or a claim token names nobody
/// * `Unauthorized` - the issuer fails the issuer gate
/// * `InvalidState` - the record is not in the edge's source status
pub fn issue<R: FulfillmentRecord>(
    record: &R,
    edge: Edge,
    issuer: &profile::Model,
    claimant: Option<&str>,
) -> Result<HandoffToken> {
    let rule = rule_for(record, edge)?;
    let (Some(issuer_gate), TokenRule::Optional(actor) | TokenRule::Required(actor)) =
        (rule.issuer, rule.token)
    else {
        return Err(Error::validation(format!(
            "{edge} is not handed off by token"
        )));
    };

    if !passes(issuer_gate, record, issuer) {
        return Err(Error::unauthorized(format!(
            "'{}' may not issue a {} token for {}: requires {}",
            issuer.user_id,
            edge,
            record.record_ref(),
            issuer_gate
        )));
    }
    require_source(record, rule)?;

    let actor_id = match actor {
        Actor::Requester => claimant,
        Actor::AssignedSalesperson => record.salesperson_id(),
        Actor::NamedDoctor => record.named_doctor(),
    }
    .ok_or_else(|| Error::validation(format!("no party to name in a {edge} token")))?;

    Ok(HandoffToken::new(
        record.record_ref(),
        edge,
        actor.role(),
        actor_id.to_string(),
    ))
}

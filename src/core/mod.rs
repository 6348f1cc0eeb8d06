//! Framework-agnostic business logic.
//!
//! Every operation takes the acting user's id and a database connection; nothing here
//! knows about HTTP, sessions or rendering.

/// Checkup offers and their hand-offs
pub mod appointment;
/// Edge tables and the shared transition checks
pub mod engine;
/// Windowed ledger views and balance reconciliation
pub mod history;
/// Coin credits, donations and the transaction log
pub mod ledger;
/// Product orders and their hand-offs
pub mod order;
/// Product catalog
pub mod product;
/// Profiles, roles and onboarding approval
pub mod profile;
/// Handoff token wire format
pub mod token;

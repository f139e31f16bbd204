//! Domain models for Pulseboard.
//!
//! # Core Concepts
//!
//! - [`Objective`]: a tracked team goal with lifecycle status, progress,
//!   and a health score derived from pulse sentiment.
//! - [`Assignment`]: the (objective, user) relation that grants a member
//!   access to the objective's sub-resources.
//! - [`PulseRequest`] / [`PulseResponse`]: a sentiment-check prompt sent
//!   to assigned members and their 1–5 rating replies. At most one
//!   response per (request, user) pair; re-submitting updates in place.
//! - [`Blocker`]: a reported obstacle tied to an objective.
//! - [`User`] / [`Session`]: identities and the opaque bearer sessions
//!   that resolve to them. Credential verification happens outside this
//!   service; sessions are minted by an external collaborator.

mod blocker;
mod objective;
mod pulse;
mod user;

pub use blocker::*;
pub use objective::*;
pub use pulse::*;
pub use user::*;

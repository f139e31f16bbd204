//! Pulseboard: team objective tracking with pulse sentiment checks,
//! blockers, and derived health scoring.

pub mod aggregate;
pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod metrics;
pub mod models;

//! # dastyar-store
//!
//! Persistence for the Dastyar backend, backed by SQLite.
//!
//! The crate exposes a synchronous [`Database`] handle wrapping a
//! `rusqlite::Connection` with typed helpers for application users,
//! conversations, messages and the localized reference collections.
//! Every read or write of user-owned data takes the
//! [`AccessDecision`](dastyar_shared::access::AccessDecision) produced by the
//! ownership policy and applies it inside the query.

pub mod app_users;
pub mod calendar_events;
pub mod cities;
pub mod content;
pub mod conversations;
pub mod database;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod suggestions;
pub mod timezones;
pub mod wallpapers;

mod error;
mod scope;

pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;

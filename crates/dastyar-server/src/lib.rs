//! # dastyar-server
//!
//! HTTP backend of the Dastyar start page.
//!
//! - **Chat**: streamed assistant replies with per-user conversation history
//! - **Suggestions** and **weather** backed by external providers
//! - **Reference content** (wallpapers, cities, calendar events, ...) with
//!   locale fallback
//! - **Ownership access policy** applied to every collection operation
//! - **Per-IP rate limiting** on provider-backed routes

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod llm;
pub mod rate_limit;
pub mod routes;
pub mod weather;

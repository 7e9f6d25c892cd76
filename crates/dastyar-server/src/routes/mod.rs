//! HTTP handlers, one module per API area.

pub mod chat;
pub mod content;
pub mod suggestions;
pub mod user_config;
pub mod weather;

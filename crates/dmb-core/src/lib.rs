//! Core engine for the domain expiry monitor bot.
//!
//! This crate is framework-agnostic. Telegram lives behind the
//! `MessagingPort` trait implemented in the adapter crate.

pub mod config;
pub mod dedup;
pub mod dispatcher;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod expiry;
pub mod formatting;
pub mod inventory;
pub mod loader;
pub mod logging;
pub mod messaging;
pub mod scheduler;
pub mod security;

pub use errors::{Error, Result};

//! Shared error definitions and helpers used across all hikari crates.

pub mod error;

pub use error::{Error, FromMessage, HikariError, Result};

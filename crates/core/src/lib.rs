//! Domain primitives shared by the database and API crates.
//!
//! - [`secret`] -- cryptographically random opaque strings.
//! - [`snowflake`] -- time-ordered 64-bit identifiers.
//! - [`error`] -- domain and configuration error types.

pub mod error;
pub mod secret;
pub mod snowflake;
pub mod types;

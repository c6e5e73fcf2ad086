//! Authentication primitives.
//!
//! - [`jwt`] -- access-token minting and verification.
//! - [`session`] -- session issuance, refresh, and revocation.
//! - [`cookies`] -- `Set-Cookie` construction and `Cookie` parsing.
//! - [`password`] -- Argon2id password hashing and verification.

pub mod cookies;
pub mod jwt;
pub mod password;
pub mod session;

//! Row models and insert DTOs.

pub mod session;
pub mod user;

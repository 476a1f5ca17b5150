//! Database module
//!
//! Connection handling, embedded migrations and the data access layer for
//! users and persisted sessions.

pub mod models;
pub mod operations;

pub use models::{User, UserFilter, UserSession, UserUpdate};
pub use operations::{DbOperations, UserStore};

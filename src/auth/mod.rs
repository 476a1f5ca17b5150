//! User authentication service
//!
//! Registration, cookie sessions stored on the user record, and password
//! resets through one-time tokens.

pub mod handlers;
pub mod password;
mod service;

pub use password::{generate_uuid, hash_password, verify_password};
pub use service::AuthService;

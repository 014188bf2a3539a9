//! Session lifecycle management
//!
//! Owns the remote session token. A new session request invalidates the
//! previous token locally before anything else happens, so replies tagged
//! with the old generation can be recognised and dropped.

mod backoff;
mod keepalive;
mod manager;

pub use backoff::ExponentialBackoff;
pub use keepalive::run_keepalive;
pub use manager::{Generation, SessionManager, SessionTransition};

//! Session management for conversation history
//!
//! Sessions live in memory for the lifetime of the process. Each one is an
//! ordered log of turns keyed by a session identifier.

pub mod manager;
pub mod store;

pub use manager::{SessionStore, DEFAULT_SESSION_ID};
pub use store::{Session, Turn};

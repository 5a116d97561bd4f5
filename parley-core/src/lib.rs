//! Core types and utilities for parley
//!
//! This crate provides the conversation data model, the in-memory
//! session store, configuration loading and logging setup shared by
//! the other parley crates.

pub mod config;
pub mod error;
pub mod logging;
pub mod session;

pub use error::{Error, Result};
pub use session::{Session, SessionStore, Turn, DEFAULT_SESSION_ID};

//! # forma-memory
//!
//! Persistent identity and conversation history store, backed by SQLite.

pub mod audit;
mod store;

pub use store::{Direction, Identity, Store, StoredMessage};

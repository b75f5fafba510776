//! Core types and traits for rwbench
//!
//! This crate defines what the benchmark knows about a transactional
//! key-value store:
//! - Key, Value, Version: raw store data
//! - KeyRange: half-open key intervals used for scans and conflict ranges
//! - StoreError: store-reported errors with retry classification
//! - Traits: the `KvStore` / `Transaction` capability set
//! - Session: the local-write-cache transaction variant

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod session;
pub mod traits;
pub mod types;

pub use error::{StoreError, StoreResult};
pub use session::{SessionStore, SessionTransaction};
pub use traits::{KvStore, Transaction};
pub use types::{prefix_successor, Key, KeyRange, Value, Version};

//! # waystate storage
//!
//! Document store trait and implementations for waystate.
//!
//! This crate provides the lowest-level persistence abstraction. Stores are
//! **opaque byte stores** keyed by relative path: they never interpret the
//! documents they hold.
//!
//! ## Design Principles
//!
//! - A store is a flat namespace of documents addressed by relative paths
//! - `write` is a raw replacement; atomic publication is built on top of
//!   `write` + `rename` by `waystate_core`
//! - Must be `Send + Sync`
//! - Paths never escape the store root
//!
//! ## Available Stores
//!
//! - [`InMemoryStore`] - For testing and ephemeral state
//! - [`FileStore`] - For persistent state on a conventional filesystem
//!
//! ## Example
//!
//! ```rust
//! use std::path::Path;
//! use waystate_storage::{DocumentStore, InMemoryStore};
//!
//! let store = InMemoryStore::new();
//! store.write(Path::new("state.json"), b"{}").unwrap();
//! assert_eq!(store.read(Path::new("state.json")).unwrap(), b"{}");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod memory;
mod path;
mod store;

pub use error::{StorageError, StorageResult};
pub use file::FileStore;
pub use memory::InMemoryStore;
pub use path::normalize;
pub use store::DocumentStore;

//! # Waystate Testkit
//!
//! Test utilities for waystate.
//!
//! This crate provides:
//! - Test fixtures and store helpers
//! - A fault-injecting store for crash and failure testing
//! - Property-based test generators using proptest
//!
//! The cross-module scenario tests live in this crate's `tests/`
//! directory.
//!
//! ## Usage
//!
//! ```rust
//! use std::path::Path;
//! use waystate_testkit::prelude::*;
//!
//! with_temp_store(|store| {
//!     let mut manager = store.manager();
//!     manager.begin("example").unwrap();
//!     manager.write(Path::new("state.json"), b"{}").unwrap();
//!     manager.commit().unwrap();
//!     assert!(store.artifacts().is_empty());
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod crash;
pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::crash::{FaultyStore, Operation, Target};
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use crash::{FaultyStore, Operation, Target};
pub use fixtures::*;
pub use generators::*;

//! # Lorekeep Testkit
//!
//! Test utilities for Lorekeep.
//!
//! This crate provides:
//! - A reference backend wired to a sync context ([`TestBackend`])
//! - Property-based test generators using proptest
//! - Concurrent stress runs with convergence checks
//!
//! ## Usage
//!
//! ```rust,ignore
//! use lorekeep_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn refresh_populates() {
//!     let backend = scenarios::populated_backend("Bestiary", 3).await;
//!     let bestiary = backend.repository::<serde_json::Value>("Bestiary");
//!     assert_eq!(bestiary.force_fetch().await.unwrap().len(), 3);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use stress::*;

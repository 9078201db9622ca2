//! Internal crate for `dosgfx-rs`.
//!
//! This crate only re-exports `dosgfx_types` so the top-level package has a
//! single internal dependency to forward, and should not be used directly.
//!
//! # Examples
//!
//! ```rust
//! use dosgfx_internal::prelude::*;
//!
//! let registry = Registry::new();
//! assert!(registry.tileset_by_code("tls-ccaves-main").is_some());
//! ```

/// `use dosgfx_internal::prelude::*;` to import commonly used items.
pub mod prelude;

// Re-export dosgfx_types for convenience
pub use dosgfx_types;

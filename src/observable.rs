//! Transparent interception layer and dependency runtime
//!
//! This module provides access to reinhardt-observable, the engine behind
//! the facade's top-level items.
//!
//! ## Architecture
//!
//! - **Handlers**: four trap sets (mutable, shallow mutable, readonly, shallow readonly)
//! - **Instrumentations**: sequence search and length-mutating methods that behave under tracking
//! - **Runtime**: per-thread dependency graph keyed by target and property
//! - **Boxes**: [`Ref`] values unwrapped by record wrappers on read and written through on assignment
//!
//! ## Example
//!
//! ```rust,ignore
//! use reinhardt_reactivity::observable::{Object, Value, reactive, to_raw};
//!
//! let raw = Value::from(Object::record());
//! let wrapped = reactive(raw.clone());
//!
//! assert_eq!(reactive(raw.clone()), wrapped);
//! assert_eq!(to_raw(&wrapped), raw);
//! ```

// Re-export all reinhardt-observable functionality
pub use reinhardt_observable::*;

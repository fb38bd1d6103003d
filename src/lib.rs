//! # Reinhardt Reactivity
//!
//! Observable state for Rust: plain records and sequences wrapped in
//! transparent proxies that record which effect read which key and re-run
//! those effects when the key changes.
//!
//! ## Core Principles
//!
//! - **Transparency**: a wrapped value answers reads, writes, deletes and
//!   membership queries exactly like its raw counterpart
//! - **Identity**: each raw value has at most one wrapper per variant
//! - **Laziness**: nested composites are wrapped when they are read, not when
//!   the outer value is wrapped
//!
//! ## Feature Flags
//!
//! - `debug-hooks` - Logs every track and trigger through `tracing`
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use reinhardt_reactivity::prelude::*;
//!
//! let state = reactive(Object::record_from([("count", 0)]));
//!
//! let view = state.clone();
//! let _effect = Effect::new_with_timing(
//!     move || println!("count = {:?}", view.get("count")),
//!     EffectTiming::Layout,
//! );
//!
//! // Prints "count = 1"
//! state.set("count", 1)?;
//! ```

pub mod observable;

pub use reinhardt_observable::{
	Effect, EffectTiming, Key, Object, ObservableError, Proxy, ProxyVariant, Ref, Result, Value,
	has_changed, is_proxy, is_reactive, is_readonly, is_ref, is_shallow, mark_raw, reactive,
	readonly, shallow_reactive, shallow_readonly, to_raw, to_reactive, to_readonly, unref,
	untracked,
};

/// Commonly used items
pub mod prelude {
	pub use crate::{
		Effect,
		EffectTiming,
		Key,
		Object,
		Ref,
		Value,
		// Wrapping
		reactive,
		readonly,
		shallow_reactive,
		shallow_readonly,
		// Identity
		is_proxy,
		is_reactive,
		is_readonly,
		mark_raw,
		to_raw,
		// Boxes
		is_ref,
		unref,
	};
}

#[cfg(test)]
mod tests {
	use super::prelude::*;
	use rstest::rstest;
	use serial_test::serial;
	use std::cell::Cell;
	use std::rc::Rc;

	#[rstest]
	#[serial]
	fn test_prelude_drives_an_effect() {
		// Arrange
		let state = reactive(Object::record_from([("count", 0)]));
		let seen = Rc::new(Cell::new(0.0));
		let seen_clone = seen.clone();
		let view = state.clone();
		let _effect = Effect::new_with_timing(
			move || {
				let count = view.get("count").ok().and_then(|v| v.as_number());
				seen_clone.set(count.unwrap_or(f64::NAN));
			},
			EffectTiming::Layout,
		);

		// Act
		state.set("count", 3).unwrap();

		// Assert
		assert_eq!(seen.get(), 3.0);
		assert!(is_reactive(&state));
		assert!(!is_reactive(&to_raw(&state)));
	}
}

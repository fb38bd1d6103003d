//! Development diagnostics for reinhardt-observable
//!
//! The interception layer never fails loudly: readonly violations and values
//! that cannot be wrapped are reported through these macros instead. All
//! macros are no-ops in release builds.
//!
//! ## Macro Overview
//!
//! | Macro | Debug Assertions | Feature Required | Sink |
//! |-------|------------------|------------------|------|
//! | `debug_log!` | Required | `debug-hooks` | `tracing::debug!` |
//! | `warn_log!` | Required | None | `tracing::warn!` |
//!
//! ## Example
//!
//! ```ignore
//! use reinhardt_observable::{debug_log, warn_log};
//!
//! // Only logged when both `debug-hooks` feature and `debug_assertions` are enabled
//! debug_log!("track {:?} {:?}", target, key);
//!
//! // Logged when `debug_assertions` are enabled
//! warn_log!("Set operation on key \"{}\" failed: target is readonly.", key);
//! ```

/// Logs a dependency-tracking message (requires `debug-hooks` feature + `debug_assertions`)
///
/// Used by the runtime to report every track and trigger call.
///
/// # Example
///
/// ```ignore
/// debug_log!("trigger {:?} on {:?}", op, key);
/// ```
#[macro_export]
#[cfg(all(debug_assertions, feature = "debug-hooks"))]
macro_rules! debug_log {
	($($arg:tt)*) => {{
		$crate::__tracing::debug!(target: "reinhardt_observable", $($arg)*);
	}};
}

/// No-op debug_log when conditions are not met
#[macro_export]
#[cfg(not(all(debug_assertions, feature = "debug-hooks")))]
macro_rules! debug_log {
	($($arg:tt)*) => {{}};
}

/// Logs a warning message (requires `debug_assertions`)
///
/// This is the channel for readonly violations. It compiles to a no-op in
/// release builds.
///
/// # Example
///
/// ```ignore
/// warn_log!("value cannot be made reactive: {:?}", value);
/// ```
#[macro_export]
#[cfg(debug_assertions)]
macro_rules! warn_log {
	($($arg:tt)*) => {{
		$crate::__tracing::warn!(target: "reinhardt_observable", $($arg)*);
	}};
}

/// No-op warn_log in release builds
#[macro_export]
#[cfg(not(debug_assertions))]
macro_rules! warn_log {
	($($arg:tt)*) => {{}};
}

#[cfg(test)]
mod tests {
	use rstest::rstest;
	use crate::{debug_log, warn_log};

	#[rstest]
	fn test_logging_macros_compile() {
		debug_log!("Debug message: {}", 42);
		warn_log!("Warning message: {:?}", vec![1, 2, 3]);
	}

	#[rstest]
	fn test_logging_macros_no_args() {
		debug_log!("Simple debug");
		warn_log!("Simple warning");
	}
}

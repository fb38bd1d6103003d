//! Errors raised by raw operations.
//!
//! The interception layer itself never produces a new error kind. Everything
//! here originates in the underlying raw operation (an accessor that fails,
//! a sequence length that is not a valid integer, a native method whose write
//! was refused) and travels through the handlers unchanged.

/// Result type for operations on observable values
pub type Result<T> = core::result::Result<T, ObservableError>;

/// Errors produced by raw value operations
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ObservableError {
	/// A property operation was attempted on a primitive value
	#[error("Cannot {operation} on a primitive value")]
	NotAnObject { operation: &'static str },

	/// A method lookup did not yield a callable value
	#[error("'{0}' is not a function")]
	NotCallable(String),

	/// A sequence length was not a non-negative integer
	#[error("Invalid sequence length: {0}")]
	InvalidLength(f64),

	/// A native method could not write a property
	#[error("Cannot assign to key '{0}'")]
	AssignmentFailed(String),

	/// A native method could not delete a property
	#[error("Cannot delete key '{0}'")]
	DeleteFailed(String),

	/// Raised by an accessor or function supplied by application code
	#[error("{0}")]
	Thrown(String),
}

//! # Reinhardt Observable
//!
//! Transparent interception layer that turns plain composite values into
//! observable state.
//!
//! Wrapping a raw record or sequence with [`reactive`] yields a [`Proxy`]
//! that behaves like the original value, while every property read inside a
//! running [`Effect`] is recorded as a dependency and every effective write
//! re-runs the effects that read the changed key.
//!
//! ## Variants
//!
//! - [`reactive`]: deep, tracked, notifies on writes
//! - [`shallow_reactive`]: tracked and notifying at the top level only
//! - [`readonly`]: deep, refuses writes with a development warning
//! - [`shallow_readonly`]: refuses top-level writes only
//!
//! ## Example
//!
//! ```ignore
//! use reinhardt_observable::{Effect, EffectTiming, Object, Value, reactive};
//!
//! let todos = reactive(Object::sequence());
//!
//! let view = todos.clone();
//! let _effect = Effect::new_with_timing(move || {
//!     println!("{} todos", view.length().unwrap_or(0));
//! }, EffectTiming::Layout);
//!
//! // Re-runs the effect once
//! todos.call_method("push", &[Value::from("write docs")])?;
//! ```
//!
//! ## Feature Flags
//!
//! - `debug-hooks`: logs every track and trigger through `tracing` (debug builds only)

mod builtins;
mod logging;
pub mod effect;
pub mod error;
pub mod function;
pub mod handlers;
pub mod instrumentations;
pub mod object;
pub mod proxy;
pub mod reactive;
pub mod reflect;
pub mod refs;
pub mod runtime;
pub mod value;

#[doc(hidden)]
pub use tracing as __tracing;

pub use effect::Effect;
pub use error::{ObservableError, Result};
pub use function::Function;
pub use handlers::{
	BaseReactiveHandler, MUTABLE_HANDLERS, MutableReactiveHandler, READONLY_HANDLERS,
	ReadonlyReactiveHandler, SHALLOW_REACTIVE_HANDLERS, SHALLOW_READONLY_HANDLERS,
};
pub use instrumentations::SequenceMethod;
pub use object::{Object, ObjectKind, Property};
pub use proxy::{Proxy, ProxyHandler};
pub use reactive::{
	ProxyVariant, is_proxy, is_reactive, is_readonly, is_shallow, mark_raw, reactive, readonly,
	shallow_reactive, shallow_readonly, to_raw, to_reactive, to_readonly,
};
pub use refs::{Ref, is_ref, unref};
pub use runtime::{
	DebuggerEvent, DebuggerEventKind, DepKey, EffectTiming, NodeId, Runtime, SchedulingPause,
	TrackOpType, TrackingPause, TriggerContext, TriggerOpType, is_tracking, set_scheduler, track,
	trigger, untracked, with_runtime,
};
pub use value::{Key, ReactiveFlag, Symbol, Value, WellKnownSymbol, has_changed};

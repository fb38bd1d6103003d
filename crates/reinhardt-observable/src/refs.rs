//! Boxed Values
//!
//! A [`Ref`] is a single-slot container that is reactive on its own: reading
//! `get()` inside an effect subscribes to the box, and `set()` notifies when
//! the value actually changes. A deep box stores composites as reactive
//! wrappers and remembers the raw value for change detection.
//!
//! Mutable record wrappers unwrap boxes on read and write through them on
//! plain assignment, so a box stored in reactive state behaves like the value
//! it holds.
//!
//! ## Example
//!
//! ```ignore
//! use reinhardt_observable::{Object, Ref, reactive};
//!
//! let count = Ref::new(1);
//! let state = reactive(Object::record_from([("count", count.clone())]));
//!
//! assert_eq!(state.get("count")?, Value::from(1));
//! state.set("count", 2)?;
//! assert_eq!(count.get(), Value::from(2));
//! ```

use core::cell::RefCell;
use core::fmt;
use std::rc::Rc;

use crate::reactive::{is_readonly, is_shallow, to_raw, to_reactive};
use crate::runtime::{NodeId, TrackOpType, TriggerContext, TriggerOpType, track, trigger, try_with_runtime};
use crate::value::{Value, has_changed};

/// A reactive single-slot container
#[derive(Clone)]
pub struct Ref(Rc<RefInner>);

struct RefInner {
	id: NodeId,
	/// Raw form of the stored value, used for change detection
	raw: RefCell<Value>,
	value: RefCell<Value>,
	shallow: bool,
}

impl Drop for RefInner {
	fn drop(&mut self) {
		let _ = try_with_runtime(|rt| rt.remove_target(self.id));
	}
}

impl Ref {
	/// Creates a deep box. Composites are stored as reactive wrappers.
	///
	/// Boxing a box returns it unchanged.
	pub fn new(value: impl Into<Value>) -> Self {
		match value.into() {
			Value::Ref(existing) => existing,
			value => Self::create(value, false),
		}
	}

	/// Creates a box that stores its value as given
	pub fn shallow(value: impl Into<Value>) -> Self {
		match value.into() {
			Value::Ref(existing) => existing,
			value => Self::create(value, true),
		}
	}

	fn create(value: Value, shallow: bool) -> Self {
		let (raw, stored) = if shallow {
			(value.clone(), value)
		} else {
			(to_raw(&value), to_reactive(value))
		};
		Self(Rc::new(RefInner {
			id: NodeId::new(),
			raw: RefCell::new(raw),
			value: RefCell::new(stored),
			shallow,
		}))
	}

	pub fn id(&self) -> NodeId {
		self.0.id
	}

	pub fn is_shallow(&self) -> bool {
		self.0.shallow
	}

	/// Reads the value, subscribing the running effect
	pub fn get(&self) -> Value {
		track(self.0.id, TrackOpType::Get, "value");
		self.get_untracked()
	}

	/// Reads the value without subscribing
	pub fn get_untracked(&self) -> Value {
		self.0.value.borrow().clone()
	}

	/// Replaces the value, notifying subscribers if it changed
	pub fn set(&self, value: impl Into<Value>) {
		let value = value.into();
		let use_direct = self.0.shallow || is_shallow(&value) || is_readonly(&value);
		let new_raw = if use_direct { value } else { to_raw(&value) };

		let old_raw = self.0.raw.borrow().clone();
		if !has_changed(&new_raw, &old_raw) {
			return;
		}

		let stored = if use_direct {
			new_raw.clone()
		} else {
			to_reactive(new_raw.clone())
		};
		let displaced_raw = self.0.raw.replace(new_raw.clone());
		let displaced = self.0.value.replace(stored);
		drop((displaced_raw, displaced));

		let context = TriggerContext {
			is_sequence: false,
			new_value: Some(new_raw),
			old_value: Some(old_raw),
		};
		trigger(self.0.id, TriggerOpType::Set, "value", context);
	}

	/// Notifies subscribers without changing the value
	///
	/// Useful after mutating a composite held by a shallow box.
	pub fn trigger(&self) {
		let current = self.get_untracked();
		let context = TriggerContext {
			is_sequence: false,
			new_value: Some(current),
			old_value: None,
		};
		trigger(self.0.id, TriggerOpType::Set, "value", context);
	}

	/// Returns `true` if both handles refer to the same box
	pub fn ptr_eq(&self, other: &Ref) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}
}

impl fmt::Debug for Ref {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.0.value.try_borrow() {
			Ok(value) => write!(f, "Ref({:?}: {:?})", self.0.id, *value),
			Err(_) => write!(f, "Ref({:?})", self.0.id),
		}
	}
}

pub fn is_ref(value: &Value) -> bool {
	matches!(value, Value::Ref(_))
}

/// Returns the boxed value (tracked), or `value` itself if it is not a box
pub fn unref(value: &Value) -> Value {
	match value {
		Value::Ref(boxed) => boxed.get(),
		other => other.clone(),
	}
}

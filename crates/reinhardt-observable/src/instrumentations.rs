//! Sequence method instrumentation.
//!
//! Mutable wrappers over sequences hand out these replacements instead of the
//! native methods:
//!
//! - **Search** (`includes`, `indexOf`, `lastIndexOf`) runs on the raw
//!   sequence, records a read of every index, and retries once with unwrapped
//!   arguments so that searching for a wrapped value finds its raw element.
//! - **Length-altering** (`push`, `pop`, `shift`, `unshift`, `splice`) runs
//!   the native method on the wrapper with tracking paused, so the method's
//!   own `length` read cannot subscribe the running effect to its own write.
//!   Synchronous effects are held back until the method returns. The final
//!   `length` write is reported against the length the call started from,
//!   even when element writes already grew the sequence.

use core::cell::RefCell;
use std::collections::BTreeMap;

use crate::builtins;
use crate::error::{ObservableError, Result};
use crate::function::Function;
use crate::reactive::to_raw;
use crate::reflect;
use crate::runtime::{NodeId, SchedulingPause, TrackOpType, TrackingPause, track_value};
use crate::value::{Key, Value};

/// Sequence methods replaced on mutable wrappers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceMethod {
	Includes,
	IndexOf,
	LastIndexOf,
	Push,
	Pop,
	Shift,
	Unshift,
	Splice,
}

impl SequenceMethod {
	pub const ALL: [SequenceMethod; 8] = [
		SequenceMethod::Includes,
		SequenceMethod::IndexOf,
		SequenceMethod::LastIndexOf,
		SequenceMethod::Push,
		SequenceMethod::Pop,
		SequenceMethod::Shift,
		SequenceMethod::Unshift,
		SequenceMethod::Splice,
	];

	pub const fn name(self) -> &'static str {
		match self {
			SequenceMethod::Includes => "includes",
			SequenceMethod::IndexOf => "indexOf",
			SequenceMethod::LastIndexOf => "lastIndexOf",
			SequenceMethod::Push => "push",
			SequenceMethod::Pop => "pop",
			SequenceMethod::Shift => "shift",
			SequenceMethod::Unshift => "unshift",
			SequenceMethod::Splice => "splice",
		}
	}

	pub fn from_key(key: &Key) -> Option<Self> {
		let name = key.as_str()?;
		Self::ALL.into_iter().find(|method| method.name() == name)
	}

	/// Identity-sensitive search methods
	pub const fn is_search(self) -> bool {
		matches!(
			self,
			SequenceMethod::Includes | SequenceMethod::IndexOf | SequenceMethod::LastIndexOf
		)
	}
}

thread_local! {
	/// Sequences inside a length-altering call, with their last reported length
	static LENGTH_BASELINES: RefCell<Vec<(NodeId, usize)>> = const { RefCell::new(Vec::new()) };
	static SEQUENCE_INSTRUMENTATIONS: BTreeMap<&'static str, Function> = create_sequence_instrumentations();
	static HAS_OWN_PROPERTY: Function = instrument_has_own_property();
}

fn create_sequence_instrumentations() -> BTreeMap<&'static str, Function> {
	SequenceMethod::ALL
		.into_iter()
		.map(|method| {
			let function = if method.is_search() {
				instrument_search(method)
			} else {
				instrument_length_mutation(method)
			};
			(method.name(), function)
		})
		.collect()
}

/// The replacement for `key`, if it names an instrumented sequence method
pub(crate) fn sequence_method(key: &Key) -> Option<Function> {
	let method = SequenceMethod::from_key(key)?;
	SEQUENCE_INSTRUMENTATIONS.with(|methods| methods.get(method.name()).cloned())
}

/// The replacement for `hasOwnProperty`
pub(crate) fn has_own_property() -> Function {
	HAS_OWN_PROPERTY.with(Function::clone)
}

fn native(method: SequenceMethod) -> Result<Function> {
	builtins::sequence_method(&Key::from(method.name()))
		.ok_or_else(|| ObservableError::NotCallable(method.name().to_string()))
}

fn is_not_found(result: &Value) -> bool {
	match result {
		Value::Bool(found) => !found,
		Value::Number(index) => *index == -1.0,
		_ => false,
	}
}

fn instrument_search(method: SequenceMethod) -> Function {
	Function::new(method.name(), move |this, args| {
		let raw = to_raw(this);
		for index in 0..builtins::length_of(&raw)? {
			track_value(&raw, TrackOpType::Get, Key::from(index));
		}
		let native = native(method)?;
		let result = native.call(&raw, args)?;
		if is_not_found(&result) {
			// The arguments may be wrappers of raw elements
			let unwrapped: Vec<Value> = args.iter().map(to_raw).collect();
			return native.call(&raw, &unwrapped);
		}
		Ok(result)
	})
}

/// Keeps a sequence's starting length visible for the duration of a call
struct LengthBaseline {
	pushed: bool,
}

impl LengthBaseline {
	fn record(this: &Value) -> Result<Self> {
		let raw = to_raw(this);
		let Some(target) = raw.identity().filter(|_| raw.is_sequence()) else {
			return Ok(Self { pushed: false });
		};
		let length = builtins::length_of(&raw)?;
		LENGTH_BASELINES.with(|baselines| baselines.borrow_mut().push((target, length)));
		Ok(Self { pushed: true })
	}
}

impl Drop for LengthBaseline {
	fn drop(&mut self) {
		if self.pushed {
			let _ = LENGTH_BASELINES.try_with(|baselines| baselines.borrow_mut().pop());
		}
	}
}

/// Swaps in `length` as the last reported length of `target`, returning the
/// previous one. `None` outside a length-altering call on `target`.
pub(crate) fn rebase_length(target: NodeId, length: usize) -> Option<usize> {
	LENGTH_BASELINES.with(|baselines| {
		let mut baselines = baselines.borrow_mut();
		let (_, reported) = baselines.iter_mut().rev().find(|(id, _)| *id == target)?;
		Some(core::mem::replace(reported, length))
	})
}

fn instrument_length_mutation(method: SequenceMethod) -> Function {
	Function::new(method.name(), move |this, args| {
		let _scheduling = SchedulingPause::new();
		let _tracking = TrackingPause::new();
		let _baseline = LengthBaseline::record(this)?;
		native(method)?.call(this, args)
	})
}

fn instrument_has_own_property() -> Function {
	Function::new("hasOwnProperty", |this, args| {
		let raw = to_raw(this);
		let key = args.first().unwrap_or(&Value::Undefined).to_property_key();
		track_value(&raw, TrackOpType::Has, key.clone());
		Ok(Value::Bool(reflect::has_own(&raw, &key)?))
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::object::Object;
	use crate::reactive::reactive;
	use crate::runtime::is_tracking;
	use rstest::rstest;

	#[rstest]
	#[case("includes", Some(SequenceMethod::Includes))]
	#[case("splice", Some(SequenceMethod::Splice))]
	#[case("map", None)]
	#[case("length", None)]
	fn test_from_key(#[case] name: &str, #[case] expected: Option<SequenceMethod>) {
		assert_eq!(SequenceMethod::from_key(&Key::from(name)), expected);
	}

	#[rstest]
	fn test_instrumentations_are_stable() {
		let list = reactive(Object::sequence_from([1]));
		let other = reactive(Object::sequence());

		assert_eq!(list.get("push").unwrap(), other.get("push").unwrap());
		assert_eq!(list.get("hasOwnProperty").unwrap(), other.get("hasOwnProperty").unwrap());
	}

	#[rstest]
	fn test_records_do_not_receive_sequence_methods() {
		let record = reactive(Object::record());

		assert!(record.get("push").unwrap().is_undefined());
		assert!(record.get("hasOwnProperty").unwrap().as_function().is_some());
	}

	#[rstest]
	fn test_search_retries_with_raw_arguments() {
		let element = Object::record();
		let list = reactive(Object::sequence_from([Value::from(element.clone())]));
		let wrapped = list.get(0).unwrap();
		assert_ne!(wrapped, Value::from(element.clone()));

		let found = list.call_method("indexOf", &[wrapped.clone()]).unwrap();
		let included = list.call_method("includes", &[wrapped]).unwrap();

		assert_eq!(found, Value::from(0));
		assert_eq!(included, Value::from(true));
		assert_eq!(list.call_method("indexOf", &[Value::from(element)]).unwrap(), Value::from(0));
	}

	#[rstest]
	fn test_mutators_restore_tracking() {
		let list = reactive(Object::sequence_from([1, 2, 3]));

		list.call_method("push", &[Value::from(4)]).unwrap();
		list.call_method("splice", &[Value::from(0), Value::from(1)]).unwrap();

		assert!(is_tracking());
		assert_eq!(list.length().unwrap(), 3);
	}

	#[rstest]
	fn test_mutator_errors_restore_tracking() {
		let prototype = Object::record();
		let refuse = Function::new("set", |_, _| Err(ObservableError::Thrown("refused".into())));
		prototype.define_accessor("1", None, Some(refuse));
		let raw = Object::sequence_from([1]);
		raw.set_prototype(Some(Value::from(prototype)));
		let list = reactive(raw);

		let error = list.call_method("push", &[Value::from(2)]).unwrap_err();

		assert_eq!(error, ObservableError::Thrown("refused".into()));
		assert!(is_tracking());
		assert_eq!(list.length().unwrap(), 1);
	}
}

//! Interception Handlers
//!
//! Four handler instances back the four wrapper variants. They share one
//! read path ([`BaseReactiveHandler`]) parameterised by `readonly` and
//! `shallow`; mutable variants add change notification on writes, readonly
//! variants refuse writes with a warning.
//!
//! | Variant | Tracks reads | Notifies writes | Wraps nested values | Unwraps boxes |
//! |---------|--------------|-----------------|---------------------|---------------|
//! | reactive | yes | yes | reactive | yes |
//! | shallow reactive | yes | yes | no | no |
//! | readonly | no | refused | readonly | yes |
//! | shallow readonly | no | refused | no | no |

use crate::builtins;
use crate::error::Result;
use crate::instrumentations;
use crate::proxy::ProxyHandler;
use crate::reactive::{ProxyVariant, reactive, readonly, to_raw};
use crate::reflect;
use crate::runtime::{DepKey, TrackOpType, TriggerOpType, track_value, trigger_value};
use crate::value::{Key, ReactiveFlag, Value, has_changed};
use crate::warn_log;

/// Read path shared by every variant
#[derive(Debug, Clone, Copy)]
pub struct BaseReactiveHandler {
	readonly: bool,
	shallow: bool,
}

impl BaseReactiveHandler {
	pub const fn new(readonly: bool, shallow: bool) -> Self {
		Self { readonly, shallow }
	}

	pub const fn is_readonly(&self) -> bool {
		self.readonly
	}

	pub const fn is_shallow(&self) -> bool {
		self.shallow
	}

	fn variant(&self) -> ProxyVariant {
		ProxyVariant::from_flags(self.readonly, self.shallow)
	}

	/// Intercepted property read
	pub fn get(&self, target: &Value, key: &Key, receiver: &Value) -> Result<Value> {
		if let Key::Flag(flag) = key {
			match flag {
				ReactiveFlag::IsReactive => return Ok(Value::Bool(!self.readonly)),
				ReactiveFlag::IsReadonly => return Ok(Value::Bool(self.readonly)),
				ReactiveFlag::IsShallow => return Ok(Value::Bool(self.shallow)),
				ReactiveFlag::Raw => return Ok(self.raw_for(target, receiver)),
				ReactiveFlag::Skip => {}
			}
		}

		let target_is_sequence = target.is_sequence();
		if !self.readonly {
			if target_is_sequence {
				if let Some(method) = instrumentations::sequence_method(key) {
					return Ok(Value::Function(method));
				}
			}
			if key.as_str() == Some("hasOwnProperty") {
				return Ok(Value::Function(instrumentations::has_own_property()));
			}
		}

		let result = reflect::get(target, key, receiver)?;

		if key.is_builtin_symbol() || key.is_non_trackable() {
			return Ok(result);
		}
		if !self.readonly {
			track_value(target, TrackOpType::Get, key.clone());
		}
		if self.shallow {
			return Ok(result);
		}

		match result {
			// Sequence slots keep their boxes
			Value::Ref(boxed) if !(target_is_sequence && key.as_index().is_some()) => Ok(boxed.get()),
			composite if composite.is_composite() => Ok(if self.readonly {
				readonly(composite)
			} else {
				reactive(composite)
			}),
			other => Ok(other),
		}
	}

	/// Resolves the raw flag: only the proxy this handler built for `target`
	/// may see it. Reads arriving through a prototype chain get `undefined`.
	fn raw_for(&self, target: &Value, receiver: &Value) -> Value {
		let cached = target
			.identity()
			.and_then(|id| self.variant().cached_proxy(id));
		match (cached, receiver) {
			(Some(proxy), Value::Proxy(receiver)) if proxy.ptr_eq(receiver) => target.clone(),
			_ => Value::Undefined,
		}
	}
}

/// Handler of the mutable variants
#[derive(Debug, Clone, Copy)]
pub struct MutableReactiveHandler {
	base: BaseReactiveHandler,
}

impl MutableReactiveHandler {
	pub const fn new(shallow: bool) -> Self {
		Self {
			base: BaseReactiveHandler::new(false, shallow),
		}
	}
}

impl ProxyHandler for MutableReactiveHandler {
	fn get(&self, target: &Value, key: &Key, receiver: &Value) -> Result<Value> {
		self.base.get(target, key, receiver)
	}

	fn set(&self, target: &Value, key: &Key, value: Value, receiver: &Value) -> Result<bool> {
		let target_is_sequence = target.is_sequence();
		let mut old_value = reflect::get(target, key, target)?;
		let mut value = value;

		if !self.base.shallow {
			old_value = to_raw(&old_value);
			value = to_raw(&value);
			// Writing a plain value over a box writes through the box
			if !target_is_sequence {
				if let Value::Ref(old_box) = &old_value {
					if !matches!(value, Value::Ref(_)) {
						old_box.set(value);
						return Ok(true);
					}
				}
			}
		}

		let had_key = match key.as_index() {
			Some(index) if target_is_sequence => index < builtins::length_of(target)?,
			_ => reflect::has_own(target, key)?,
		};
		let result = reflect::set(target, key, value.clone(), receiver)?;

		// Element writes inside a length-altering method grow `length` early
		if result && target_is_sequence && key.is_length() {
			if let Some(id) = target.identity() {
				let length = builtins::length_of(target)?;
				if let Some(before) = instrumentations::rebase_length(id, length) {
					old_value = Value::from(before);
				}
			}
		}

		// Writes reaching this target through a prototype chain belong to the receiver
		if result && to_raw(receiver).strict_equals(target) {
			if !had_key {
				trigger_value(target, TriggerOpType::Add, key.clone(), Some(value), None);
			} else if has_changed(&value, &old_value) {
				trigger_value(target, TriggerOpType::Set, key.clone(), Some(value), Some(old_value));
			}
		}
		Ok(result)
	}

	fn delete_property(&self, target: &Value, key: &Key) -> Result<bool> {
		let had_key = reflect::has_own(target, key)?;
		let old_value = reflect::get(target, key, target)?;
		let result = reflect::delete_property(target, key)?;
		if result && had_key {
			trigger_value(target, TriggerOpType::Delete, key.clone(), None, Some(old_value));
		}
		Ok(result)
	}

	fn has(&self, target: &Value, key: &Key) -> Result<bool> {
		let result = reflect::has(target, key)?;
		if !key.is_builtin_symbol() {
			track_value(target, TrackOpType::Has, key.clone());
		}
		Ok(result)
	}

	fn own_keys(&self, target: &Value) -> Result<Vec<Key>> {
		let dep_key = if target.is_sequence() {
			DepKey::Key(Key::length())
		} else {
			DepKey::Iterate
		};
		track_value(target, TrackOpType::Iterate, dep_key);
		reflect::own_keys(target)
	}
}

/// Handler of the readonly variants
#[derive(Debug, Clone, Copy)]
pub struct ReadonlyReactiveHandler {
	base: BaseReactiveHandler,
}

impl ReadonlyReactiveHandler {
	pub const fn new(shallow: bool) -> Self {
		Self {
			base: BaseReactiveHandler::new(true, shallow),
		}
	}
}

impl ProxyHandler for ReadonlyReactiveHandler {
	fn get(&self, target: &Value, key: &Key, receiver: &Value) -> Result<Value> {
		self.base.get(target, key, receiver)
	}

	fn set(&self, target: &Value, key: &Key, _value: Value, _receiver: &Value) -> Result<bool> {
		warn_log!(
			"Set operation on key \"{}\" failed: target is readonly. {:?}",
			key,
			target
		);
		Ok(true)
	}

	fn delete_property(&self, target: &Value, key: &Key) -> Result<bool> {
		warn_log!(
			"Delete operation on key \"{}\" failed: target is readonly. {:?}",
			key,
			target
		);
		Ok(true)
	}
}

pub static MUTABLE_HANDLERS: MutableReactiveHandler = MutableReactiveHandler::new(false);
pub static SHALLOW_REACTIVE_HANDLERS: MutableReactiveHandler = MutableReactiveHandler::new(true);
pub static READONLY_HANDLERS: ReadonlyReactiveHandler = ReadonlyReactiveHandler::new(false);
pub static SHALLOW_READONLY_HANDLERS: ReadonlyReactiveHandler = ReadonlyReactiveHandler::new(true);

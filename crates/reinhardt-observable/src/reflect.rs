//! Underlying property operations.
//!
//! These are the operations a handler forwards to. When the target is itself
//! a proxy, the operation is dispatched to that proxy's handler; when it is a
//! raw object, the ordinary lookup runs: own property, then prototype chain
//! (keeping the original receiver), then built-in methods.

use crate::builtins;
use crate::error::{ObservableError, Result};
use crate::object::{Object, Property};
use crate::value::{Key, Value};

/// Reads `key` from `target`. Accessors run with `receiver` as `this`.
pub fn get(target: &Value, key: &Key, receiver: &Value) -> Result<Value> {
	match target {
		Value::Proxy(proxy) => proxy.handler().get(proxy.target(), key, receiver),
		Value::Object(object) => ordinary_get(object, key, receiver),
		_ => Err(ObservableError::NotAnObject { operation: "get" }),
	}
}

fn ordinary_get(object: &Object, key: &Key, receiver: &Value) -> Result<Value> {
	match object.own_property(key) {
		Some(Property::Data { value, .. }) => Ok(value),
		Some(Property::Accessor { get: Some(getter), .. }) => getter.call(receiver, &[]),
		Some(Property::Accessor { get: None, .. }) => Ok(Value::Undefined),
		None => {
			if object.is_sequence() {
				if let Some(method) = builtins::sequence_method(key) {
					return Ok(Value::Function(method));
				}
			}
			match object.prototype() {
				Some(parent) => get(&parent, key, receiver),
				None => Ok(builtins::object_method(key).map(Value::Function).unwrap_or_default()),
			}
		}
	}
}

/// Writes `key` on `target`.
///
/// Returns `Ok(false)` when the write is refused (read-only data property,
/// accessor without setter, frozen or non-extensible receiver).
pub fn set(target: &Value, key: &Key, value: Value, receiver: &Value) -> Result<bool> {
	match target {
		Value::Proxy(proxy) => proxy.handler().set(proxy.target(), key, value, receiver),
		Value::Object(object) => ordinary_set(object, key, value, receiver),
		_ => Err(ObservableError::NotAnObject { operation: "set" }),
	}
}

fn ordinary_set(object: &Object, key: &Key, value: Value, receiver: &Value) -> Result<bool> {
	match object.own_property(key) {
		Some(Property::Data { writable: false, .. }) | Some(Property::Accessor { set: None, .. }) => {
			Ok(false)
		}
		Some(Property::Accessor { set: Some(setter), .. }) => {
			setter.call(receiver, &[value])?;
			Ok(true)
		}
		Some(Property::Data { .. }) => define_on_receiver(receiver, key, value),
		None => match object.prototype() {
			Some(parent) => set(&parent, key, value, receiver),
			None => define_on_receiver(receiver, key, value),
		},
	}
}

// A wrapped receiver stores into its raw target without re-entering a handler.
fn define_on_receiver(receiver: &Value, key: &Key, value: Value) -> Result<bool> {
	match receiver {
		Value::Object(object) => object.write_own(key, value),
		Value::Proxy(proxy) => define_on_receiver(proxy.target(), key, value),
		_ => Ok(false),
	}
}

/// Tests `key` on `target` and its prototype chain
pub fn has(target: &Value, key: &Key) -> Result<bool> {
	match target {
		Value::Proxy(proxy) => proxy.handler().has(proxy.target(), key),
		Value::Object(object) => {
			if object.has_own(key) {
				return Ok(true);
			}
			if object.is_sequence() && builtins::sequence_method(key).is_some() {
				return Ok(true);
			}
			match object.prototype() {
				Some(parent) => has(&parent, key),
				None => Ok(builtins::object_method(key).is_some()),
			}
		}
		_ => Err(ObservableError::NotAnObject { operation: "has" }),
	}
}

/// Tests `key` on `target` only. Never traps.
pub fn has_own(target: &Value, key: &Key) -> Result<bool> {
	match target {
		Value::Proxy(proxy) => has_own(proxy.target(), key),
		Value::Object(object) => Ok(object.has_own(key)),
		_ => Err(ObservableError::NotAnObject { operation: "hasOwnProperty" }),
	}
}

/// Deletes an own property of `target`
pub fn delete_property(target: &Value, key: &Key) -> Result<bool> {
	match target {
		Value::Proxy(proxy) => proxy.handler().delete_property(proxy.target(), key),
		Value::Object(object) => Ok(object.delete_own(key)),
		_ => Err(ObservableError::NotAnObject { operation: "delete" }),
	}
}

/// Enumerates own property keys of `target`
pub fn own_keys(target: &Value) -> Result<Vec<Key>> {
	match target {
		Value::Proxy(proxy) => proxy.handler().own_keys(proxy.target()),
		Value::Object(object) => Ok(object.own_keys()),
		_ => Err(ObservableError::NotAnObject { operation: "ownKeys" }),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::function::Function;
	use rstest::rstest;

	fn record(entries: &[(&str, i32)]) -> Value {
		Value::from(Object::record_from(entries.iter().copied()))
	}

	#[rstest]
	fn test_get_walks_prototype_chain() {
		let parent = record(&[("inherited", 1)]);
		let child = Object::record_from([("own", 2)]);
		child.set_prototype(Some(parent));
		let child = Value::from(child);

		assert_eq!(child.get("inherited").unwrap(), Value::from(1));
		assert_eq!(child.get("own").unwrap(), Value::from(2));
		assert!(child.get("missing").unwrap().is_undefined());
		assert!(child.has("inherited").unwrap());
		assert!(!has_own(&child, &Key::from("inherited")).unwrap());
	}

	#[rstest]
	fn test_set_through_prototype_defines_on_receiver() {
		let parent = Object::record_from([("x", 1)]);
		let child = Object::record();
		child.set_prototype(Some(Value::from(parent.clone())));
		let child = Value::from(child);

		assert!(child.set("x", 5).unwrap());

		assert_eq!(child.get("x").unwrap(), Value::from(5));
		assert_eq!(Value::from(parent).get("x").unwrap(), Value::from(1));
	}

	#[rstest]
	fn test_accessor_receives_receiver() {
		let object = Object::record_from([("name", "raw")]);
		let getter = Function::new("get", |this, _| this.get("name"));
		object.define_accessor("label", Some(getter), None);
		let object = Value::from(object);

		assert_eq!(object.get("label").unwrap(), Value::from("raw"));
		assert!(!object.set("label", "x").unwrap());
	}

	#[rstest]
	fn test_setter_runs_with_receiver() {
		let object = Object::record();
		let setter = Function::new("set", |this, args| {
			this.set("stored", args[0].clone())?;
			Ok(Value::Undefined)
		});
		object.define_accessor("slot", None, Some(setter));
		let object = Value::from(object);

		assert!(object.set("slot", 7).unwrap());

		assert_eq!(object.get("stored").unwrap(), Value::from(7));
		assert!(object.get("slot").unwrap().is_undefined());
	}

	#[rstest]
	fn test_sequences_expose_native_methods() {
		let seq = Value::from(Object::sequence_from([1, 2]));

		assert!(seq.get("push").unwrap().as_function().is_some());
		assert!(seq.has("indexOf").unwrap());
		assert!(seq.get("hasOwnProperty").unwrap().as_function().is_some());
		assert!(record(&[]).get("push").unwrap().is_undefined());
	}

	#[rstest]
	#[case("get")]
	#[case("has")]
	#[case("delete")]
	fn test_primitive_targets_fail(#[case] operation: &'static str) {
		let target = Value::from(true);
		let key = Key::from("x");

		let error = match operation {
			"get" => get(&target, &key, &target).unwrap_err(),
			"has" => has(&target, &key).unwrap_err(),
			_ => delete_property(&target, &key).unwrap_err(),
		};

		assert_eq!(error, ObservableError::NotAnObject { operation });
	}
}

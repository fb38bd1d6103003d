//! Wrapped Values
//!
//! A [`Proxy`] is a view over exactly one target. Every property operation on
//! the view is routed to the target through a [`ProxyHandler`], which may
//! record dependencies, report changes, refuse writes, or wrap results.

use core::fmt;
use std::rc::{Rc, Weak};

use crate::error::Result;
use crate::reactive::ProxyVariant;
use crate::reflect;
use crate::runtime::NodeId;
use crate::value::{Key, Value};

/// Interception hooks for a wrapped value.
///
/// Every hook receives the raw target. The defaults forward to the
/// underlying operation unchanged.
pub trait ProxyHandler {
	/// Intercepts a property read. `receiver` is the value the read started on.
	fn get(&self, target: &Value, key: &Key, receiver: &Value) -> Result<Value> {
		reflect::get(target, key, receiver)
	}

	/// Intercepts a property write
	fn set(&self, target: &Value, key: &Key, value: Value, receiver: &Value) -> Result<bool> {
		reflect::set(target, key, value, receiver)
	}

	/// Intercepts a property deletion
	fn delete_property(&self, target: &Value, key: &Key) -> Result<bool> {
		reflect::delete_property(target, key)
	}

	/// Intercepts a membership test
	fn has(&self, target: &Value, key: &Key) -> Result<bool> {
		reflect::has(target, key)
	}

	/// Intercepts key enumeration
	fn own_keys(&self, target: &Value) -> Result<Vec<Key>> {
		reflect::own_keys(target)
	}
}

/// A shared handle to a wrapped value
#[derive(Clone)]
pub struct Proxy(Rc<ProxyInner>);

pub(crate) struct ProxyInner {
	id: NodeId,
	target: Value,
	handler: &'static dyn ProxyHandler,
	/// Identity cache entry this proxy occupies, keyed by its target
	cache_slot: Option<(ProxyVariant, NodeId)>,
}

impl Drop for ProxyInner {
	fn drop(&mut self) {
		if let Some((variant, target)) = self.cache_slot {
			variant.forget(target);
		}
	}
}

impl Proxy {
	/// Wraps `target`, routing every operation through `handler`
	pub fn new(target: Value, handler: &'static dyn ProxyHandler) -> Self {
		Self(Rc::new(ProxyInner {
			id: NodeId::new(),
			target,
			handler,
			cache_slot: None,
		}))
	}

	/// Wraps `target` as the cached `variant` proxy of the target `target_id`
	pub(crate) fn cached(target: Value, variant: ProxyVariant, target_id: NodeId) -> Self {
		Self(Rc::new(ProxyInner {
			id: NodeId::new(),
			target,
			handler: variant.handler(),
			cache_slot: Some((variant, target_id)),
		}))
	}

	pub fn id(&self) -> NodeId {
		self.0.id
	}

	pub(crate) fn target(&self) -> &Value {
		&self.0.target
	}

	pub(crate) fn handler(&self) -> &'static dyn ProxyHandler {
		self.0.handler
	}

	/// Returns `true` if both handles refer to the same wrapper
	pub fn ptr_eq(&self, other: &Proxy) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}

	pub(crate) fn downgrade(&self) -> Weak<ProxyInner> {
		Rc::downgrade(&self.0)
	}

	pub(crate) fn upgrade(weak: &Weak<ProxyInner>) -> Option<Self> {
		weak.upgrade().map(Self)
	}
}

impl fmt::Debug for Proxy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Proxy({:?} -> {:?})", self.0.id, self.0.target)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::object::Object;
	use rstest::rstest;

	struct Passthrough;

	impl ProxyHandler for Passthrough {}

	struct Upper;

	impl ProxyHandler for Upper {
		fn get(&self, target: &Value, key: &Key, receiver: &Value) -> Result<Value> {
			let value = reflect::get(target, key, receiver)?;
			Ok(match value.as_str() {
				Some(s) => Value::from(s.to_uppercase()),
				None => value,
			})
		}
	}

	static PASSTHROUGH: Passthrough = Passthrough;
	static UPPER: Upper = Upper;

	#[rstest]
	fn test_default_handler_forwards_everything() {
		let raw = Object::record_from([("a", 1)]);
		let proxy = Value::from(Proxy::new(Value::from(raw.clone()), &PASSTHROUGH));

		assert!(proxy.set("b", 2).unwrap());
		assert_eq!(proxy.get("a").unwrap(), Value::from(1));
		assert!(proxy.has("b").unwrap());
		assert!(proxy.delete("a").unwrap());
		assert_eq!(proxy.own_keys().unwrap(), vec![Key::from("b")]);
		assert_eq!(Value::from(raw).get("b").unwrap(), Value::from(2));
	}

	#[rstest]
	fn test_custom_get_hook() {
		let raw = Value::from(Object::record_from([("name", "ada")]));
		let proxy = Value::from(Proxy::new(raw, &UPPER));

		assert_eq!(proxy.get("name").unwrap(), Value::from("ADA"));
	}

	#[rstest]
	fn test_proxy_is_distinct_from_target() {
		let raw = Value::from(Object::record());
		let proxy = Value::from(Proxy::new(raw.clone(), &PASSTHROUGH));

		assert_ne!(proxy, raw);
		assert_ne!(proxy.identity(), raw.identity());
		assert_eq!(proxy, proxy.clone());
	}
}

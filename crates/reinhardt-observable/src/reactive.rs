//! Proxy Factory and Identity
//!
//! Creates the four wrapper variants and keeps one identity cache per
//! variant, so wrapping the same target twice with the same variant yields
//! the same proxy. Caches hold weak references: they never keep a proxy or
//! its target alive.
//!
//! ## Example
//!
//! ```ignore
//! use reinhardt_observable::{Object, is_reactive, reactive, readonly, to_raw};
//!
//! let raw = Value::from(Object::record_from([("a", 1)]));
//! let state = reactive(raw.clone());
//!
//! assert!(is_reactive(&state));
//! assert_eq!(reactive(raw.clone()), state);
//! assert_eq!(to_raw(&state), raw);
//! assert!(is_reactive(&readonly(state)));
//! ```

use core::cell::RefCell;
use core::fmt;
use std::collections::BTreeMap;
use std::rc::Weak;
use std::thread::LocalKey;

use crate::handlers::{
	MUTABLE_HANDLERS, READONLY_HANDLERS, SHALLOW_REACTIVE_HANDLERS, SHALLOW_READONLY_HANDLERS,
};
use crate::proxy::{Proxy, ProxyHandler, ProxyInner};
use crate::runtime::NodeId;
use crate::value::{ReactiveFlag, Value};
use crate::warn_log;

type ProxyMap = BTreeMap<NodeId, Weak<ProxyInner>>;

// Identity caches: target identity -> live proxy, one per variant
thread_local! {
	static REACTIVE_MAP: RefCell<ProxyMap> = const { RefCell::new(BTreeMap::new()) };
	static SHALLOW_REACTIVE_MAP: RefCell<ProxyMap> = const { RefCell::new(BTreeMap::new()) };
	static READONLY_MAP: RefCell<ProxyMap> = const { RefCell::new(BTreeMap::new()) };
	static SHALLOW_READONLY_MAP: RefCell<ProxyMap> = const { RefCell::new(BTreeMap::new()) };
}

/// The four wrapper variants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyVariant {
	Reactive,
	ShallowReactive,
	Readonly,
	ShallowReadonly,
}

impl ProxyVariant {
	pub const fn from_flags(readonly: bool, shallow: bool) -> Self {
		match (readonly, shallow) {
			(false, false) => ProxyVariant::Reactive,
			(false, true) => ProxyVariant::ShallowReactive,
			(true, false) => ProxyVariant::Readonly,
			(true, true) => ProxyVariant::ShallowReadonly,
		}
	}

	pub const fn is_readonly(self) -> bool {
		matches!(self, ProxyVariant::Readonly | ProxyVariant::ShallowReadonly)
	}

	pub const fn is_shallow(self) -> bool {
		matches!(self, ProxyVariant::ShallowReactive | ProxyVariant::ShallowReadonly)
	}

	pub(crate) fn handler(self) -> &'static dyn ProxyHandler {
		match self {
			ProxyVariant::Reactive => &MUTABLE_HANDLERS,
			ProxyVariant::ShallowReactive => &SHALLOW_REACTIVE_HANDLERS,
			ProxyVariant::Readonly => &READONLY_HANDLERS,
			ProxyVariant::ShallowReadonly => &SHALLOW_READONLY_HANDLERS,
		}
	}

	fn cache(self) -> &'static LocalKey<RefCell<ProxyMap>> {
		match self {
			ProxyVariant::Reactive => &REACTIVE_MAP,
			ProxyVariant::ShallowReactive => &SHALLOW_REACTIVE_MAP,
			ProxyVariant::Readonly => &READONLY_MAP,
			ProxyVariant::ShallowReadonly => &SHALLOW_READONLY_MAP,
		}
	}

	/// The live proxy of this variant for `target`, if any
	pub(crate) fn cached_proxy(self, target: NodeId) -> Option<Proxy> {
		self.cache()
			.try_with(|cache| cache.borrow().get(&target).and_then(Proxy::upgrade))
			.ok()
			.flatten()
	}

	fn remember(self, target: NodeId, proxy: &Proxy) {
		self.cache()
			.with(|cache| cache.borrow_mut().insert(target, proxy.downgrade()));
	}

	/// Drops the entry for `target` once its proxy is gone
	pub(crate) fn forget(self, target: NodeId) {
		let _ = self.cache().try_with(|cache| {
			if let Ok(mut cache) = cache.try_borrow_mut() {
				if cache.get(&target).is_some_and(|weak| weak.strong_count() == 0) {
					cache.remove(&target);
				}
			}
		});
	}
}

impl fmt::Display for ProxyVariant {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			ProxyVariant::Reactive => "reactive",
			ProxyVariant::ShallowReactive => "shallow reactive",
			ProxyVariant::Readonly => "readonly",
			ProxyVariant::ShallowReadonly => "shallow readonly",
		})
	}
}

/// Returns the deep mutable wrapper of `target`.
///
/// Readonly wrappers are returned unchanged; primitives are returned
/// unchanged with a warning.
pub fn reactive(target: impl Into<Value>) -> Value {
	let target = target.into();
	if is_readonly(&target) {
		return target;
	}
	create_reactive_object(target, ProxyVariant::Reactive)
}

/// Returns a wrapper that tracks and notifies only at the top level
pub fn shallow_reactive(target: impl Into<Value>) -> Value {
	create_reactive_object(target.into(), ProxyVariant::ShallowReactive)
}

/// Returns the deep readonly wrapper of `target`
pub fn readonly(target: impl Into<Value>) -> Value {
	create_reactive_object(target.into(), ProxyVariant::Readonly)
}

/// Returns a wrapper that refuses top-level writes only
pub fn shallow_readonly(target: impl Into<Value>) -> Value {
	create_reactive_object(target.into(), ProxyVariant::ShallowReadonly)
}

fn create_reactive_object(target: Value, variant: ProxyVariant) -> Value {
	if !target.is_composite() {
		warn_log!("value cannot be made {}: {:?}", variant, target);
		return target;
	}
	// Already a proxy; only a readonly view over a reactive proxy is new
	if raw_of(&target).is_some() && !(variant.is_readonly() && is_reactive(&target)) {
		return target;
	}
	let Some(id) = target.identity() else {
		return target;
	};
	if let Some(existing) = variant.cached_proxy(id) {
		return Value::Proxy(existing);
	}
	if !is_wrappable(&target) {
		return target;
	}
	let proxy = Proxy::cached(target, variant, id);
	variant.remember(id, &proxy);
	Value::Proxy(proxy)
}

fn is_wrappable(target: &Value) -> bool {
	match target {
		Value::Object(object) => !object.is_skipped() && object.is_extensible(),
		Value::Proxy(_) => is_wrappable(&to_raw(target)),
		_ => false,
	}
}

fn flag(value: &Value, which: ReactiveFlag) -> bool {
	value.is_composite() && matches!(value.get(which), Ok(Value::Bool(true)))
}

/// The value one wrapper level down, `None` if `value` is not a proxy
fn raw_of(value: &Value) -> Option<Value> {
	if !value.is_composite() {
		return None;
	}
	match value.get(ReactiveFlag::Raw) {
		Ok(Value::Undefined) | Err(_) => None,
		Ok(raw) => Some(raw),
	}
}

/// Returns `true` for mutable wrappers, and for readonly wrappers over them
pub fn is_reactive(value: &Value) -> bool {
	if is_readonly(value) {
		return raw_of(value).is_some_and(|raw| is_reactive(&raw));
	}
	flag(value, ReactiveFlag::IsReactive)
}

pub fn is_readonly(value: &Value) -> bool {
	flag(value, ReactiveFlag::IsReadonly)
}

pub fn is_shallow(value: &Value) -> bool {
	flag(value, ReactiveFlag::IsShallow)
}

/// Returns `true` for any of the four wrapper variants
pub fn is_proxy(value: &Value) -> bool {
	raw_of(value).is_some()
}

/// Strips every wrapper level. Non-proxies are returned unchanged.
pub fn to_raw(value: &Value) -> Value {
	match raw_of(value) {
		Some(raw) => to_raw(&raw),
		None => value.clone(),
	}
}

/// Marks a raw object so that it is never wrapped
pub fn mark_raw(value: impl Into<Value>) -> Value {
	let value = value.into();
	if let Value::Object(object) = &value {
		if object.is_extensible() {
			object.mark_skip();
		}
	}
	value
}

/// Wraps composites with [`reactive`], leaving everything else unchanged
pub fn to_reactive(value: Value) -> Value {
	if value.is_composite() { reactive(value) } else { value }
}

/// Wraps composites with [`readonly`], leaving everything else unchanged
pub fn to_readonly(value: Value) -> Value {
	if value.is_composite() { readonly(value) } else { value }
}

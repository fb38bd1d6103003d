//! Values and Property Keys
//!
//! `Value` is the closed set of things that can be stored in, read from, or
//! handed to an observable composite. Composite values come in two flavors:
//! raw [`Object`]s, which own their storage, and wrapped [`Proxy`] values,
//! which are views over exactly one target. A [`Ref`] is the independently
//! reactive single-slot box.
//!
//! ## Example
//!
//! ```ignore
//! use reinhardt_observable::{Object, Value};
//!
//! let point = Value::from(Object::record_from([("x", 1), ("y", 2)]));
//! assert_eq!(point.get("x")?, Value::from(1));
//! ```

use core::fmt;
use core::sync::atomic::{AtomicUsize, Ordering};
use std::rc::Rc;

use crate::builtins;
use crate::error::{ObservableError, Result};
use crate::function::Function;
use crate::object::Object;
use crate::proxy::Proxy;
use crate::reflect;
use crate::refs::Ref;
use crate::runtime::NodeId;

/// A dynamically typed value
#[derive(Clone, Default)]
pub enum Value {
	/// The absent value
	#[default]
	Undefined,
	/// The explicit empty value
	Null,
	Bool(bool),
	Number(f64),
	String(Rc<str>),
	/// A raw composite value
	Object(Object),
	/// A wrapped composite value
	Proxy(Proxy),
	/// A boxed value
	Ref(Ref),
	Function(Function),
}

impl Value {
	/// Returns `true` for `Value::Undefined`
	pub fn is_undefined(&self) -> bool {
		matches!(self, Value::Undefined)
	}

	/// Returns `true` for raw and wrapped composites.
	///
	/// Boxed values and functions are not composite: they are never wrapped.
	pub fn is_composite(&self) -> bool {
		matches!(self, Value::Object(_) | Value::Proxy(_))
	}

	/// Returns `true` when the value is, or wraps, an ordered sequence
	pub fn is_sequence(&self) -> bool {
		match self {
			Value::Object(object) => object.is_sequence(),
			Value::Proxy(proxy) => proxy.target().is_sequence(),
			_ => false,
		}
	}

	/// Returns `true` for `Value::Number(NaN)`
	pub fn is_nan(&self) -> bool {
		matches!(self, Value::Number(n) if n.is_nan())
	}

	/// Identity of reference values, `None` for primitives
	pub fn identity(&self) -> Option<NodeId> {
		match self {
			Value::Object(object) => Some(object.id()),
			Value::Proxy(proxy) => Some(proxy.id()),
			Value::Ref(boxed) => Some(boxed.id()),
			_ => None,
		}
	}

	pub fn as_bool(&self) -> Option<bool> {
		match self {
			Value::Bool(b) => Some(*b),
			_ => None,
		}
	}

	pub fn as_number(&self) -> Option<f64> {
		match self {
			Value::Number(n) => Some(*n),
			_ => None,
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			Value::String(s) => Some(s),
			_ => None,
		}
	}

	pub fn as_object(&self) -> Option<&Object> {
		match self {
			Value::Object(object) => Some(object),
			_ => None,
		}
	}

	pub fn as_proxy(&self) -> Option<&Proxy> {
		match self {
			Value::Proxy(proxy) => Some(proxy),
			_ => None,
		}
	}

	pub fn as_boxed(&self) -> Option<&Ref> {
		match self {
			Value::Ref(boxed) => Some(boxed),
			_ => None,
		}
	}

	pub fn as_function(&self) -> Option<&Function> {
		match self {
			Value::Function(function) => Some(function),
			_ => None,
		}
	}

	/// Strict equality: primitives by value, everything else by identity.
	///
	/// `NaN` is not equal to itself and `+0` equals `-0`.
	pub fn strict_equals(&self, other: &Value) -> bool {
		match (self, other) {
			(Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
			(Value::Bool(a), Value::Bool(b)) => a == b,
			(Value::Number(a), Value::Number(b)) => a == b,
			(Value::String(a), Value::String(b)) => a == b,
			(Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
			(Value::Proxy(a), Value::Proxy(b)) => a.ptr_eq(b),
			(Value::Ref(a), Value::Ref(b)) => a.ptr_eq(b),
			(Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
			_ => false,
		}
	}

	/// Strict equality that additionally treats `NaN` as equal to `NaN`
	pub fn same_value_zero(&self, other: &Value) -> bool {
		self.strict_equals(other) || (self.is_nan() && other.is_nan())
	}

	/// Reads a property, using this value as the receiver
	pub fn get(&self, key: impl Into<Key>) -> Result<Value> {
		reflect::get(self, &key.into(), self)
	}

	/// Writes a property, using this value as the receiver
	pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> Result<bool> {
		reflect::set(self, &key.into(), value.into(), self)
	}

	/// Tests whether a property exists on the value or its prototype chain
	pub fn has(&self, key: impl Into<Key>) -> Result<bool> {
		reflect::has(self, &key.into())
	}

	/// Removes an own property
	pub fn delete(&self, key: impl Into<Key>) -> Result<bool> {
		reflect::delete_property(self, &key.into())
	}

	/// Enumerates own property keys
	pub fn own_keys(&self) -> Result<Vec<Key>> {
		reflect::own_keys(self)
	}

	/// Reads the `length` property as a sequence length
	pub fn length(&self) -> Result<usize> {
		builtins::length_of(self)
	}

	/// Looks up `name` and calls it with this value as `this`
	pub fn call_method(&self, name: &str, args: &[Value]) -> Result<Value> {
		match self.get(name)? {
			Value::Function(function) => function.call(self, args),
			_ => Err(ObservableError::NotCallable(name.to_string())),
		}
	}

	/// Converts the value into a property key
	pub fn to_property_key(&self) -> Key {
		match self {
			Value::String(s) => Key::String(s.clone()),
			Value::Number(n) => Key::from(format_number(*n)),
			Value::Bool(b) => Key::from(if *b { "true" } else { "false" }),
			Value::Null => Key::from("null"),
			Value::Undefined => Key::from("undefined"),
			Value::Object(_) | Value::Proxy(_) | Value::Ref(_) => Key::from("[object Object]"),
			Value::Function(function) => Key::from(function.name()),
		}
	}
}

impl PartialEq for Value {
	fn eq(&self, other: &Self) -> bool {
		self.strict_equals(other)
	}
}

impl fmt::Debug for Value {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Value::Undefined => f.write_str("undefined"),
			Value::Null => f.write_str("null"),
			Value::Bool(b) => write!(f, "{b}"),
			Value::Number(n) => f.write_str(&format_number(*n)),
			Value::String(s) => write!(f, "{:?}", &**s),
			Value::Object(object) => object.fmt(f),
			Value::Proxy(proxy) => proxy.fmt(f),
			Value::Ref(boxed) => boxed.fmt(f),
			Value::Function(function) => function.fmt(f),
		}
	}
}

/// Formats a number the way property keys spell it.
pub(crate) fn format_number(n: f64) -> String {
	if n.is_nan() {
		"NaN".to_string()
	} else if n.is_infinite() {
		if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
	} else if n.fract() == 0.0 && n.abs() < 1e21 {
		format!("{}", n as i64)
	} else {
		format!("{n}")
	}
}

/// Returns `true` if `value` differs from `old`.
///
/// Uses strict inequality, except that `NaN` compares equal to `NaN`.
pub fn has_changed(value: &Value, old: &Value) -> bool {
	!value.same_value_zero(old)
}

impl From<bool> for Value {
	fn from(value: bool) -> Self {
		Value::Bool(value)
	}
}

impl From<f64> for Value {
	fn from(value: f64) -> Self {
		Value::Number(value)
	}
}

impl From<i32> for Value {
	fn from(value: i32) -> Self {
		Value::Number(f64::from(value))
	}
}

impl From<u32> for Value {
	fn from(value: u32) -> Self {
		Value::Number(f64::from(value))
	}
}

impl From<i64> for Value {
	fn from(value: i64) -> Self {
		Value::Number(value as f64)
	}
}

impl From<usize> for Value {
	fn from(value: usize) -> Self {
		Value::Number(value as f64)
	}
}

impl From<&str> for Value {
	fn from(value: &str) -> Self {
		Value::String(Rc::from(value))
	}
}

impl From<String> for Value {
	fn from(value: String) -> Self {
		Value::String(Rc::from(value))
	}
}

impl From<Object> for Value {
	fn from(value: Object) -> Self {
		Value::Object(value)
	}
}

impl From<Proxy> for Value {
	fn from(value: Proxy) -> Self {
		Value::Proxy(value)
	}
}

impl From<Ref> for Value {
	fn from(value: Ref) -> Self {
		Value::Ref(value)
	}
}

impl From<Function> for Value {
	fn from(value: Function) -> Self {
		Value::Function(value)
	}
}

impl From<&Value> for Value {
	fn from(value: &Value) -> Self {
		value.clone()
	}
}

/// Builds raw values from JSON, recursively.
///
/// Arrays become sequences and objects become records.
impl From<serde_json::Value> for Value {
	fn from(json: serde_json::Value) -> Self {
		match json {
			serde_json::Value::Null => Value::Null,
			serde_json::Value::Bool(b) => Value::Bool(b),
			serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
			serde_json::Value::String(s) => Value::from(s),
			serde_json::Value::Array(items) => {
				Value::Object(Object::sequence_from(items.into_iter().map(Value::from)))
			}
			serde_json::Value::Object(entries) => Value::Object(Object::record_from(
				entries.into_iter().map(|(key, value)| (key, Value::from(value))),
			)),
		}
	}
}

/// A property key
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
	String(Rc<str>),
	Symbol(Symbol),
	/// Private flag understood by the interception layer
	Flag(ReactiveFlag),
}

impl Key {
	/// Largest sequence index, one below the largest valid `length`
	pub const MAX_INDEX: u32 = u32::MAX - 1;

	/// The `length` key of sequences
	pub fn length() -> Self {
		Key::from("length")
	}

	pub fn is_length(&self) -> bool {
		self.as_str() == Some("length")
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			Key::String(s) => Some(s),
			_ => None,
		}
	}

	/// Parses canonical sequence indices (`"0"`, `"17"`, not `"01"` or `"-1"`).
	///
	/// Integers above [`Key::MAX_INDEX`] are ordinary property names.
	pub fn as_index(&self) -> Option<usize> {
		let s = self.as_str()?;
		let canonical = !s.is_empty()
			&& s.bytes().all(|b| b.is_ascii_digit())
			&& (s == "0" || !s.starts_with('0'));
		if !canonical {
			return None;
		}
		s.parse::<u32>()
			.ok()
			.filter(|&index| index <= Self::MAX_INDEX)
			.map(|index| index as usize)
	}

	/// Well-known symbols are never tracked
	pub fn is_builtin_symbol(&self) -> bool {
		matches!(self, Key::Symbol(Symbol::WellKnown(_)))
	}

	/// Marker keys read by tooling that must not become dependencies
	pub fn is_non_trackable(&self) -> bool {
		matches!(self.as_str(), Some("__proto__" | "__v_isRef" | "__isVue"))
	}
}

impl fmt::Debug for Key {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Key::String(s) => write!(f, "{:?}", &**s),
			Key::Symbol(symbol) => write!(f, "{symbol:?}"),
			Key::Flag(flag) => f.write_str(flag.as_str()),
		}
	}
}

impl fmt::Display for Key {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Key::String(s) => f.write_str(s),
			Key::Symbol(symbol) => write!(f, "{symbol:?}"),
			Key::Flag(flag) => f.write_str(flag.as_str()),
		}
	}
}

impl From<&str> for Key {
	fn from(value: &str) -> Self {
		Key::String(Rc::from(value))
	}
}

impl From<String> for Key {
	fn from(value: String) -> Self {
		Key::String(Rc::from(value))
	}
}

impl From<usize> for Key {
	fn from(value: usize) -> Self {
		Key::String(Rc::from(value.to_string()))
	}
}

impl From<i32> for Key {
	fn from(value: i32) -> Self {
		Key::String(Rc::from(value.to_string()))
	}
}

impl From<Symbol> for Key {
	fn from(value: Symbol) -> Self {
		Key::Symbol(value)
	}
}

impl From<WellKnownSymbol> for Key {
	fn from(value: WellKnownSymbol) -> Self {
		Key::Symbol(Symbol::WellKnown(value))
	}
}

impl From<ReactiveFlag> for Key {
	fn from(value: ReactiveFlag) -> Self {
		Key::Flag(value)
	}
}

impl From<&Key> for Key {
	fn from(value: &Key) -> Self {
		value.clone()
	}
}

/// Symbolic property key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Symbol {
	WellKnown(WellKnownSymbol),
	Unique(usize),
}

impl Symbol {
	/// Creates a symbol distinct from every other symbol
	pub fn unique() -> Self {
		static COUNTER: AtomicUsize = AtomicUsize::new(0);
		Symbol::Unique(COUNTER.fetch_add(1, Ordering::Relaxed))
	}
}

/// Built-in symbolic keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WellKnownSymbol {
	AsyncIterator,
	HasInstance,
	IsConcatSpreadable,
	Iterator,
	Match,
	MatchAll,
	Replace,
	Search,
	Species,
	Split,
	ToPrimitive,
	ToStringTag,
	Unscopables,
}

/// Private keys answered by the interception layer itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ReactiveFlag {
	/// Set by `mark_raw`: the value is never wrapped
	Skip,
	IsReactive,
	IsReadonly,
	IsShallow,
	/// Resolves a wrapped value to its target
	Raw,
}

impl ReactiveFlag {
	pub fn as_str(self) -> &'static str {
		match self {
			ReactiveFlag::Skip => "__v_skip",
			ReactiveFlag::IsReactive => "__v_isReactive",
			ReactiveFlag::IsReadonly => "__v_isReadonly",
			ReactiveFlag::IsShallow => "__v_isShallow",
			ReactiveFlag::Raw => "__v_raw",
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;
	use rstest::rstest;

	#[rstest]
	#[case("0", Some(0))]
	#[case("7", Some(7))]
	#[case("42", Some(42))]
	#[case("01", None)]
	#[case("-1", None)]
	#[case("1.5", None)]
	#[case("", None)]
	#[case("NaN", None)]
	#[case("length", None)]
	#[case("4294967294", Some(4_294_967_294))]
	#[case("4294967295", None)]
	#[case("18446744073709551615", None)]
	#[case("99999999999999999999999", None)]
	fn test_key_as_index(#[case] key: &str, #[case] expected: Option<usize>) {
		assert_eq!(Key::from(key).as_index(), expected);
	}

	#[rstest]
	fn test_symbol_and_flag_keys_are_not_indices() {
		assert_eq!(Key::from(WellKnownSymbol::Iterator).as_index(), None);
		assert_eq!(Key::from(ReactiveFlag::Raw).as_index(), None);
	}

	#[rstest]
	fn test_builtin_and_non_trackable_keys() {
		assert!(Key::from(WellKnownSymbol::ToStringTag).is_builtin_symbol());
		assert!(!Key::from(Symbol::unique()).is_builtin_symbol());
		assert!(Key::from("__proto__").is_non_trackable());
		assert!(Key::from("__v_isRef").is_non_trackable());
		assert!(!Key::from("value").is_non_trackable());
	}

	#[rstest]
	fn test_unique_symbols_differ() {
		assert_ne!(Symbol::unique(), Symbol::unique());
	}

	#[rstest]
	fn test_has_changed_treats_nan_as_equal() {
		assert!(!has_changed(&Value::from(f64::NAN), &Value::from(f64::NAN)));
		assert!(!has_changed(&Value::from(0.0), &Value::from(-0.0)));
		assert!(has_changed(&Value::from(1), &Value::from(2)));
		assert!(has_changed(&Value::from(1), &Value::from("1")));
		assert!(has_changed(&Value::Undefined, &Value::Null));
	}

	#[rstest]
	fn test_objects_compare_by_identity() {
		let a = Value::from(Object::record());
		let b = Value::from(Object::record());
		assert_eq!(a, a.clone());
		assert_ne!(a, b);
		assert!(!has_changed(&a, &a.clone()));
	}

	#[rstest]
	#[case(Value::from(3), "3")]
	#[case(Value::from(1.5), "1.5")]
	#[case(Value::from(-0.0), "0")]
	#[case(Value::from(true), "true")]
	#[case(Value::Undefined, "undefined")]
	#[case(Value::from("name"), "name")]
	fn test_to_property_key(#[case] value: Value, #[case] expected: &str) {
		assert_eq!(value.to_property_key(), Key::from(expected));
	}

	#[rstest]
	fn test_primitive_property_access_fails() {
		let result = Value::from(1).get("x");
		assert_eq!(result.unwrap_err(), ObservableError::NotAnObject { operation: "get" });
	}

	#[rstest]
	fn test_from_json_builds_nested_raw_values() {
		let value = Value::from(serde_json::json!({"user": {"tags": ["a", "b"]}, "n": 1}));

		let user = value.get("user").unwrap();
		let tags = user.get("tags").unwrap();
		assert!(matches!(user, Value::Object(_)));
		assert!(tags.is_sequence());
		assert_eq!(tags.length().unwrap(), 2);
		assert_eq!(tags.get(1).unwrap(), Value::from("b"));
		assert_eq!(value.get("n").unwrap(), Value::from(1));
	}

	proptest! {
		#[test]
		fn prop_has_changed_is_negated_same_value_zero(a in any::<f64>(), b in any::<f64>()) {
			let (x, y) = (Value::from(a), Value::from(b));
			prop_assert_eq!(has_changed(&x, &y), !(a == b || (a.is_nan() && b.is_nan())));
		}

		#[test]
		fn prop_index_keys_round_trip(index in 0usize..1_000_000) {
			prop_assert_eq!(Key::from(index).as_index(), Some(index));
		}
	}
}

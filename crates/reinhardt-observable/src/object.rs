//! Raw Composite Objects
//!
//! An [`Object`] owns its storage. It is either a keyed record or an ordered
//! sequence; sequences keep integer-indexed elements sparsely, so holes cost
//! nothing, and expose a virtual `length` property.
//!
//! Raw objects never track or notify anything. Observation happens only
//! through a [`Proxy`](crate::proxy::Proxy) wrapping them.

use core::cell::RefCell;
use core::fmt;
use std::collections::BTreeMap;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::{ObservableError, Result};
use crate::function::Function;
use crate::runtime::{NodeId, try_with_runtime};
use crate::value::{Key, ReactiveFlag, Value};

/// Shape of a raw object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
	/// Keyed properties only
	Record,
	/// Integer-indexed elements with a `length`
	Sequence,
}

/// An own property
#[derive(Debug, Clone)]
pub enum Property {
	Data {
		value: Value,
		writable: bool,
	},
	Accessor {
		get: Option<Function>,
		set: Option<Function>,
	},
}

impl Property {
	/// A writable data property
	pub fn data(value: impl Into<Value>) -> Self {
		Property::Data {
			value: value.into(),
			writable: true,
		}
	}
}

struct ObjectData {
	id: NodeId,
	kind: ObjectKind,
	properties: IndexMap<Key, Property>,
	/// Present sequence elements; a missing index below `length` is a hole
	elements: BTreeMap<usize, Value>,
	length: usize,
	prototype: Option<Value>,
	extensible: bool,
	frozen: bool,
	skip: bool,
}

impl Drop for ObjectData {
	fn drop(&mut self) {
		let _ = try_with_runtime(|rt| rt.remove_target(self.id));
	}
}

/// A shared handle to a raw composite value
#[derive(Clone)]
pub struct Object(Rc<RefCell<ObjectData>>);

impl Object {
	fn with_kind(kind: ObjectKind) -> Self {
		Self(Rc::new(RefCell::new(ObjectData {
			id: NodeId::new(),
			kind,
			properties: IndexMap::new(),
			elements: BTreeMap::new(),
			length: 0,
			prototype: None,
			extensible: true,
			frozen: false,
			skip: false,
		})))
	}

	/// Creates an empty record
	pub fn record() -> Self {
		Self::with_kind(ObjectKind::Record)
	}

	/// Creates an empty sequence
	pub fn sequence() -> Self {
		Self::with_kind(ObjectKind::Sequence)
	}

	/// Creates a record from key/value pairs
	pub fn record_from<I, K, V>(entries: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<Key>,
		V: Into<Value>,
	{
		let object = Self::record();
		{
			let mut data = object.0.borrow_mut();
			for (key, value) in entries {
				data.properties.insert(key.into(), Property::data(value));
			}
		}
		object
	}

	/// Creates a sequence from its elements
	pub fn sequence_from<I, V>(items: I) -> Self
	where
		I: IntoIterator<Item = V>,
		V: Into<Value>,
	{
		let object = Self::sequence();
		{
			let mut data = object.0.borrow_mut();
			data.elements = items.into_iter().map(Into::<Value>::into).enumerate().collect();
			data.length = data.elements.len();
		}
		object
	}

	pub fn id(&self) -> NodeId {
		self.0.borrow().id
	}

	pub fn kind(&self) -> ObjectKind {
		self.0.borrow().kind
	}

	pub fn is_sequence(&self) -> bool {
		self.kind() == ObjectKind::Sequence
	}

	/// Returns `true` if both handles refer to the same object
	pub fn ptr_eq(&self, other: &Object) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}

	/// Number of element slots of a sequence, including holes
	pub fn element_len(&self) -> usize {
		self.0.borrow().length
	}

	pub fn prototype(&self) -> Option<Value> {
		self.0.borrow().prototype.clone()
	}

	/// Replaces the prototype. Reads and writes that miss the object continue there.
	pub fn set_prototype(&self, prototype: Option<Value>) {
		let displaced = core::mem::replace(&mut self.0.borrow_mut().prototype, prototype);
		drop(displaced);
	}

	/// Defines an own property, bypassing setters.
	///
	/// Returns `false` when the object is frozen, when a new key is added to a
	/// non-extensible object, or when an accessor is placed on a sequence slot.
	pub fn define_property(&self, key: impl Into<Key>, property: Property) -> bool {
		let key = key.into();
		let mut data = self.0.borrow_mut();
		if data.frozen {
			return false;
		}
		if data.kind == ObjectKind::Sequence && (key.is_length() || key.as_index().is_some()) {
			let Property::Data { value, .. } = property else {
				return false;
			};
			drop(data);
			return self.write_own(&key, value).unwrap_or(false);
		}
		if !data.extensible && !data.properties.contains_key(&key) {
			return false;
		}
		let displaced = data.properties.insert(key, property);
		drop(data);
		drop(displaced);
		true
	}

	/// Defines an accessor property
	pub fn define_accessor(
		&self,
		key: impl Into<Key>,
		get: Option<Function>,
		set: Option<Function>,
	) -> bool {
		self.define_property(key, Property::Accessor { get, set })
	}

	/// Makes every own property read-only and forbids new ones
	pub fn freeze(&self) {
		let mut data = self.0.borrow_mut();
		data.frozen = true;
		data.extensible = false;
	}

	pub fn is_frozen(&self) -> bool {
		self.0.borrow().frozen
	}

	/// Forbids adding new properties
	pub fn prevent_extensions(&self) {
		self.0.borrow_mut().extensible = false;
	}

	pub fn is_extensible(&self) -> bool {
		self.0.borrow().extensible
	}

	/// Returns `true` once the object has been marked as never-wrap
	pub fn is_skipped(&self) -> bool {
		self.0.borrow().skip
	}

	pub(crate) fn mark_skip(&self) {
		self.0.borrow_mut().skip = true;
	}

	/// Looks up an own property without consulting the prototype chain
	pub(crate) fn own_property(&self, key: &Key) -> Option<Property> {
		let data = self.0.borrow();
		let writable = !data.frozen;
		if data.kind == ObjectKind::Sequence {
			if key.is_length() {
				return Some(Property::Data {
					value: Value::from(data.length),
					writable,
				});
			}
			if let Some(index) = key.as_index() {
				return data
					.elements
					.get(&index)
					.cloned()
					.map(|value| Property::Data { value, writable });
			}
		}
		if *key == Key::Flag(ReactiveFlag::Skip) {
			return data.skip.then(|| Property::Data {
				value: Value::Bool(true),
				writable: false,
			});
		}
		match data.properties.get(key)? {
			Property::Data { value, writable: w } => Some(Property::Data {
				value: value.clone(),
				writable: *w && writable,
			}),
			accessor => Some(accessor.clone()),
		}
	}

	pub(crate) fn has_own(&self, key: &Key) -> bool {
		let data = self.0.borrow();
		if *key == Key::Flag(ReactiveFlag::Skip) {
			return data.skip;
		}
		contains_own(&data, key)
	}

	/// Stores a data value as an own property.
	///
	/// Writing a sequence index past the end extends the sequence with holes;
	/// writing `length` truncates or extends it. Neither allocates for holes.
	pub(crate) fn write_own(&self, key: &Key, value: Value) -> Result<bool> {
		let mut displaced = Vec::new();
		let mut data = self.0.borrow_mut();
		if data.frozen {
			return Ok(false);
		}
		if data.kind == ObjectKind::Sequence {
			if key.is_length() {
				let length = valid_length(&value)?;
				if length < data.length {
					displaced.extend(data.elements.split_off(&length).into_values());
				}
				data.length = length;
				return Ok(true);
			}
			if let Some(index) = key.as_index() {
				if !data.elements.contains_key(&index) && !data.extensible {
					return Ok(false);
				}
				if index >= data.length {
					let Some(length) = index.checked_add(1) else {
						return Ok(false);
					};
					data.length = length;
				}
				displaced.extend(data.elements.insert(index, value));
				return Ok(true);
			}
		}
		if *key == Key::Flag(ReactiveFlag::Skip) {
			data.skip = value.as_bool().unwrap_or(false);
			return Ok(true);
		}
		let extensible = data.extensible;
		match data.properties.get_mut(key) {
			Some(Property::Data { value: slot, writable: true }) => {
				displaced.push(core::mem::replace(slot, value));
				Ok(true)
			}
			Some(_) => Ok(false),
			None if !extensible => Ok(false),
			None => {
				data.properties.insert(key.clone(), Property::data(value));
				Ok(true)
			}
		}
	}

	/// Removes an own property. Sequence elements leave a hole.
	pub(crate) fn delete_own(&self, key: &Key) -> bool {
		let displaced;
		let mut data = self.0.borrow_mut();
		if data.frozen {
			return !contains_own(&data, key);
		}
		if data.kind == ObjectKind::Sequence {
			if key.is_length() {
				return false;
			}
			if let Some(index) = key.as_index() {
				displaced = data.elements.remove(&index);
				drop(data);
				drop(displaced);
				return true;
			}
		}
		if *key == Key::Flag(ReactiveFlag::Skip) {
			return !data.skip;
		}
		let removed = data.properties.shift_remove(key);
		drop(data);
		drop(removed);
		true
	}

	/// Own keys: present indices ascending, `length`, integer-like keys
	/// ascending, remaining strings in insertion order, then symbols.
	pub(crate) fn own_keys(&self) -> Vec<Key> {
		let data = self.0.borrow();
		let mut keys: Vec<Key> = data.elements.keys().map(|&index| Key::from(index)).collect();
		if data.kind == ObjectKind::Sequence {
			keys.push(Key::length());
		}

		let mut integer_like: Vec<(usize, &Key)> = data
			.properties
			.keys()
			.filter_map(|key| key.as_index().map(|index| (index, key)))
			.collect();
		integer_like.sort_by_key(|(index, _)| *index);
		keys.extend(integer_like.into_iter().map(|(_, key)| key.clone()));

		keys.extend(
			data.properties
				.keys()
				.filter(|key| matches!(key, Key::String(_)) && key.as_index().is_none())
				.cloned(),
		);
		keys.extend(
			data.properties
				.keys()
				.filter(|key| matches!(key, Key::Symbol(_)))
				.cloned(),
		);
		keys
	}
}

fn contains_own(data: &ObjectData, key: &Key) -> bool {
	if data.kind == ObjectKind::Sequence {
		if key.is_length() {
			return true;
		}
		if let Some(index) = key.as_index() {
			return data.elements.contains_key(&index);
		}
	}
	data.properties.contains_key(key)
}

fn valid_length(value: &Value) -> Result<usize> {
	let n = value.as_number().unwrap_or(f64::NAN);
	if n >= 0.0 && n.fract() == 0.0 && n <= f64::from(u32::MAX) {
		Ok(n as usize)
	} else {
		Err(ObservableError::InvalidLength(n))
	}
}

impl fmt::Debug for Object {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.0.try_borrow() {
			Ok(data) => write!(f, "{:?}({:?})", data.kind, data.id),
			Err(_) => f.write_str("Object(<borrowed>)"),
		}
	}
}

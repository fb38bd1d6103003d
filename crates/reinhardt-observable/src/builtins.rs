//! Native methods of raw values.
//!
//! Every method is written against the generic property operations on its
//! `this` value, so the same code runs unchanged against a raw sequence or
//! a wrapped view of one. Writes that the receiver refuses become errors.

use std::collections::BTreeMap;

use crate::error::{ObservableError, Result};
use crate::function::Function;
use crate::object::Object;
use crate::reflect;
use crate::value::{Key, Value};

type NativeMethod = fn(&Value, &[Value]) -> Result<Value>;

thread_local! {
	static SEQUENCE_METHODS: BTreeMap<&'static str, Function> = table(&[
		("includes", includes as NativeMethod),
		("indexOf", index_of as NativeMethod),
		("lastIndexOf", last_index_of as NativeMethod),
		("push", push as NativeMethod),
		("pop", pop as NativeMethod),
		("shift", shift as NativeMethod),
		("unshift", unshift as NativeMethod),
		("splice", splice as NativeMethod),
	]);

	static OBJECT_METHODS: BTreeMap<&'static str, Function> = table(&[
		("hasOwnProperty", has_own_property as NativeMethod),
	]);
}

fn table(methods: &[(&'static str, NativeMethod)]) -> BTreeMap<&'static str, Function> {
	methods
		.iter()
		.map(|&(name, body)| (name, Function::new(name, body)))
		.collect()
}

/// Native method of sequences named by `key`
pub(crate) fn sequence_method(key: &Key) -> Option<Function> {
	let name = key.as_str()?;
	SEQUENCE_METHODS.with(|methods| methods.get(name).cloned())
}

/// Native method shared by every composite
pub(crate) fn object_method(key: &Key) -> Option<Function> {
	let name = key.as_str()?;
	OBJECT_METHODS.with(|methods| methods.get(name).cloned())
}

/// Reads `length` through the receiver and clamps it to a valid length
pub(crate) fn length_of(this: &Value) -> Result<usize> {
	let length = reflect::get(this, &Key::length(), this)?;
	Ok(match length {
		Value::Number(n) if n > 0.0 => n.floor().min(u32::MAX as f64) as usize,
		_ => 0,
	})
}

fn to_integer(value: &Value) -> f64 {
	match value {
		Value::Number(n) if n.is_nan() => 0.0,
		Value::Number(n) => n.trunc(),
		Value::Bool(true) => 1.0,
		_ => 0.0,
	}
}

fn relative_index(relative: f64, length: usize) -> usize {
	let length = length as f64;
	if relative < 0.0 {
		(length + relative).max(0.0) as usize
	} else {
		relative.min(length) as usize
	}
}

fn arg(args: &[Value], index: usize) -> Value {
	args.get(index).cloned().unwrap_or_default()
}

fn fetch(this: &Value, index: usize) -> Result<Value> {
	reflect::get(this, &Key::from(index), this)
}

fn present(this: &Value, index: usize) -> Result<bool> {
	reflect::has(this, &Key::from(index))
}

fn put(this: &Value, key: Key, value: Value) -> Result<()> {
	if reflect::set(this, &key, value, this)? {
		Ok(())
	} else {
		Err(ObservableError::AssignmentFailed(key.to_string()))
	}
}

fn remove(this: &Value, index: usize) -> Result<()> {
	let key = Key::from(index);
	if reflect::delete_property(this, &key)? {
		Ok(())
	} else {
		Err(ObservableError::DeleteFailed(key.to_string()))
	}
}

fn move_element(this: &Value, from: usize, to: usize) -> Result<()> {
	if present(this, from)? {
		put(this, Key::from(to), fetch(this, from)?)
	} else {
		remove(this, to)
	}
}

fn push(this: &Value, args: &[Value]) -> Result<Value> {
	let length = length_of(this)?;
	for (offset, item) in args.iter().enumerate() {
		put(this, Key::from(length + offset), item.clone())?;
	}
	let new_length = length + args.len();
	put(this, Key::length(), Value::from(new_length))?;
	Ok(Value::from(new_length))
}

fn pop(this: &Value, _args: &[Value]) -> Result<Value> {
	let length = length_of(this)?;
	if length == 0 {
		put(this, Key::length(), Value::from(0))?;
		return Ok(Value::Undefined);
	}
	let last = length - 1;
	let element = fetch(this, last)?;
	remove(this, last)?;
	put(this, Key::length(), Value::from(last))?;
	Ok(element)
}

fn shift(this: &Value, _args: &[Value]) -> Result<Value> {
	let length = length_of(this)?;
	if length == 0 {
		put(this, Key::length(), Value::from(0))?;
		return Ok(Value::Undefined);
	}
	let first = fetch(this, 0)?;
	for index in 1..length {
		move_element(this, index, index - 1)?;
	}
	remove(this, length - 1)?;
	put(this, Key::length(), Value::from(length - 1))?;
	Ok(first)
}

fn unshift(this: &Value, args: &[Value]) -> Result<Value> {
	let length = length_of(this)?;
	let count = args.len();
	if count > 0 {
		for index in (0..length).rev() {
			move_element(this, index, index + count)?;
		}
		for (offset, item) in args.iter().enumerate() {
			put(this, Key::from(offset), item.clone())?;
		}
	}
	put(this, Key::length(), Value::from(length + count))?;
	Ok(Value::from(length + count))
}

/// `splice(start, deleteCount, ...items)`, returning the removed elements
/// as a new raw sequence.
fn splice(this: &Value, args: &[Value]) -> Result<Value> {
	let length = length_of(this)?;
	let start = relative_index(to_integer(&arg(args, 0)), length);
	let delete_count = match args.len() {
		0 => 0,
		1 => length - start,
		_ => to_integer(&args[1]).clamp(0.0, (length - start) as f64) as usize,
	};
	let items = args.get(2..).unwrap_or_default();

	let removed = Object::sequence();
	for offset in 0..delete_count {
		if present(this, start + offset)? {
			removed.write_own(&Key::from(offset), fetch(this, start + offset)?)?;
		}
	}
	removed.write_own(&Key::length(), Value::from(delete_count))?;

	let item_count = items.len();
	if item_count < delete_count {
		for index in start..(length - delete_count) {
			move_element(this, index + delete_count, index + item_count)?;
		}
		for index in ((length - delete_count + item_count)..length).rev() {
			remove(this, index)?;
		}
	} else if item_count > delete_count {
		for index in (start..(length - delete_count)).rev() {
			move_element(this, index + delete_count, index + item_count)?;
		}
	}
	for (offset, item) in items.iter().enumerate() {
		put(this, Key::from(start + offset), item.clone())?;
	}
	put(this, Key::length(), Value::from(length - delete_count + item_count))?;
	Ok(Value::Object(removed))
}

/// Uses SameValueZero, so `NaN` is found and holes read as `undefined`.
fn includes(this: &Value, args: &[Value]) -> Result<Value> {
	let length = length_of(this)?;
	let search = arg(args, 0);
	let start = relative_index(to_integer(&arg(args, 1)), length);
	for index in start..length {
		if fetch(this, index)?.same_value_zero(&search) {
			return Ok(Value::Bool(true));
		}
	}
	Ok(Value::Bool(false))
}

fn index_of(this: &Value, args: &[Value]) -> Result<Value> {
	let length = length_of(this)?;
	let search = arg(args, 0);
	let start = relative_index(to_integer(&arg(args, 1)), length);
	for index in start..length {
		if present(this, index)? && fetch(this, index)?.strict_equals(&search) {
			return Ok(Value::from(index));
		}
	}
	Ok(Value::from(-1))
}

fn last_index_of(this: &Value, args: &[Value]) -> Result<Value> {
	let length = length_of(this)?;
	if length == 0 {
		return Ok(Value::from(-1));
	}
	let search = arg(args, 0);
	let from = match args.get(1) {
		Some(from) => to_integer(from),
		None => length as f64 - 1.0,
	};
	let start = if from >= 0.0 {
		from.min(length as f64 - 1.0)
	} else {
		length as f64 + from
	};
	if start < 0.0 {
		return Ok(Value::from(-1));
	}
	for index in (0..=start as usize).rev() {
		if present(this, index)? && fetch(this, index)?.strict_equals(&search) {
			return Ok(Value::from(index));
		}
	}
	Ok(Value::from(-1))
}

fn has_own_property(this: &Value, args: &[Value]) -> Result<Value> {
	let key = arg(args, 0).to_property_key();
	Ok(Value::Bool(reflect::has_own(this, &key)?))
}

//! Callable values.
//!
//! Native sequence methods, their instrumented replacements, and accessor
//! getters/setters are all `Function`s. A function receives `this` explicitly
//! so that the same callable can run against a raw object or a wrapped view.

use core::fmt;
use std::rc::Rc;

use crate::error::Result;
use crate::value::Value;

type NativeFn = dyn Fn(&Value, &[Value]) -> Result<Value>;

/// A named callable taking `this` and an argument list
#[derive(Clone)]
pub struct Function(Rc<FunctionInner>);

struct FunctionInner {
	name: Rc<str>,
	body: Box<NativeFn>,
}

impl Function {
	/// Creates a new function
	///
	/// # Example
	///
	/// ```ignore
	/// let double = Function::new("double", |_this, args| {
	///     Ok(Value::from(args[0].as_number().unwrap_or(0.0) * 2.0))
	/// });
	/// ```
	pub fn new<F>(name: impl Into<Rc<str>>, body: F) -> Self
	where
		F: Fn(&Value, &[Value]) -> Result<Value> + 'static,
	{
		Self(Rc::new(FunctionInner {
			name: name.into(),
			body: Box::new(body),
		}))
	}

	pub fn name(&self) -> &str {
		&self.0.name
	}

	/// Invokes the function with the given `this` value
	pub fn call(&self, this: &Value, args: &[Value]) -> Result<Value> {
		(self.0.body)(this, args)
	}

	/// Returns `true` if both handles refer to the same function
	pub fn ptr_eq(&self, other: &Function) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}
}

impl fmt::Debug for Function {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Function({})", self.0.name)
	}
}

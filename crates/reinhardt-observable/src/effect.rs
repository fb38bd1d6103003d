//! Effect - Reactive Side Effects
//!
//! `Effect` represents a side effect that automatically re-runs when its dependencies change.
//! Dependencies are tracked automatically - any property read through a reactive proxy, and
//! any `Ref::get`, inside the effect closure becomes a dependency.
//!
//! ## Key Features
//!
//! - **Automatic Dependency Tracking**: reads inside the effect are recorded per `(target, key)`
//! - **Automatic Re-execution**: Layout effects re-run synchronously, Passive effects on flush
//! - **Reentrancy Safe**: an effect that is already running is never re-entered
//! - **Memory Safe**: Automatically removes itself from the dependency graph when dropped
//!
//! ## Example
//!
//! ```ignore
//! use reinhardt_observable::{Effect, Ref};
//!
//! let count = Ref::new(0);
//!
//! // Create an effect that logs the count
//! let view = count.clone();
//! let _effect = Effect::new(move || {
//!     // This get() call automatically creates a dependency
//!     println!("Count is: {:?}", view.get());
//! });
//!
//! // This will schedule the effect to re-run
//! count.set(42);
//! ```

use core::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::runtime::{EffectTiming, NodeId, Observer, Runtime, try_with_runtime, with_runtime};

/// Type alias for effect functions
type EffectFn = Rc<RefCell<Box<dyn FnMut() + 'static>>>;

// Storage for Effect functions
//
// This stores the closures for all Effects so they can be re-executed when dependencies change.
thread_local! {
	static EFFECT_FUNCTIONS: RefCell<BTreeMap<NodeId, EffectFn>> = const { RefCell::new(BTreeMap::new()) };
}

// Storage for Effect timing information
//
// This stores the execution timing (Layout vs Passive) for each Effect.
thread_local! {
	static EFFECT_TIMING: RefCell<BTreeMap<NodeId, EffectTiming>> = const { RefCell::new(BTreeMap::new()) };
}

/// Get the timing for an effect by its ID.
///
/// Returns `None` if the effect doesn't exist.
pub(crate) fn get_effect_timing(effect_id: NodeId) -> Option<EffectTiming> {
	EFFECT_TIMING
		.try_with(|storage| storage.borrow().get(&effect_id).copied())
		.ok()
		.flatten()
}

/// Pops the observer and restores tracking, even if the effect panics
struct RunGuard;

impl Drop for RunGuard {
	fn drop(&mut self) {
		let _ = try_with_runtime(|rt| {
			rt.reset_tracking();
			rt.pop_observer();
		});
	}
}

/// A reactive effect that automatically re-runs when its dependencies change
///
/// Effects are the bridge between observable state and the outside world.
/// They run immediately when created, and re-run whenever any key they read changes.
///
/// ## Example
///
/// ```ignore
/// use reinhardt_observable::{Effect, EffectTiming, Object, Ref, reactive};
///
/// let state = reactive(Object::record_from([("count", 0)]));
/// let doubled = Ref::new(0);
///
/// // Effect that keeps doubled in sync with count
/// let (source, sink) = (state.clone(), doubled.clone());
/// Effect::new_with_timing(move || {
///     let count = source.get("count").unwrap().as_number().unwrap_or(0.0);
///     sink.set(count * 2.0);
/// }, EffectTiming::Layout);
///
/// state.set("count", 5)?;
/// assert_eq!(doubled.get_untracked(), Value::from(10));
/// ```
pub struct Effect {
	/// Unique identifier for this effect
	id: NodeId,
	/// Whether this effect has been disposed
	disposed: Rc<Cell<bool>>,
}

impl Effect {
	/// Create a new passive Effect that runs the given function
	///
	/// The function runs immediately. Later re-runs are queued until the
	/// scheduler (or [`Runtime::flush_updates`]) drains them.
	///
	/// # Arguments
	///
	/// * `f` - The effect function. Must be `FnMut() + 'static`.
	pub fn new<F>(f: F) -> Self
	where
		F: FnMut() + 'static,
	{
		Self::new_with_timing(f, EffectTiming::Passive)
	}

	/// Create a new Effect with specified execution timing
	///
	/// This is the low-level constructor that allows specifying whether the effect
	/// should re-run synchronously (Layout) or on the next flush (Passive).
	///
	/// # Arguments
	///
	/// * `f` - The effect function. Must be `FnMut() + 'static`.
	/// * `timing` - The execution timing (Layout or Passive).
	///
	/// # Example
	///
	/// ```ignore
	/// let count = Ref::new(0);
	///
	/// let view = count.clone();
	/// Effect::new_with_timing(move || {
	///     println!("Count: {:?}", view.get());
	/// }, EffectTiming::Layout);
	/// ```
	pub fn new_with_timing<F>(mut f: F, timing: EffectTiming) -> Self
	where
		F: FnMut() + 'static,
	{
		let id = NodeId::new();
		let disposed = Rc::new(Cell::new(false));

		// Store the effect function
		let disposed_clone = disposed.clone();
		let effect_fn: EffectFn = Rc::new(RefCell::new(Box::new(move || {
			if !disposed_clone.get() {
				f();
			}
		})));
		EFFECT_FUNCTIONS.with(|storage| {
			storage.borrow_mut().insert(id, effect_fn);
		});

		// Store the timing information
		EFFECT_TIMING.with(|storage| {
			storage.borrow_mut().insert(id, timing);
		});

		// Run the effect for the first time
		Self::execute_effect(id);

		Self { id, disposed }
	}

	/// Execute an effect by its ID
	///
	/// This is called internally by the runtime when an effect needs to re-run.
	/// Tracking is enabled for the duration of the run even if the caller had
	/// paused it.
	pub(crate) fn execute_effect(effect_id: NodeId) {
		let Some(effect_fn) = EFFECT_FUNCTIONS.with(|storage| storage.borrow().get(&effect_id).cloned())
		else {
			return;
		};
		// Already running further up the stack
		let Ok(mut body) = effect_fn.try_borrow_mut() else {
			return;
		};

		with_runtime(|rt| {
			// Clear old dependencies before re-running
			rt.clear_dependencies(effect_id);
			rt.push_observer(Observer { id: effect_id });
			rt.enable_tracking();
		});
		let _guard = RunGuard;

		(*body)();
	}

	/// Get the NodeId of this effect
	pub fn id(&self) -> NodeId {
		self.id
	}

	/// Dispose this effect
	///
	/// After calling this, the effect will no longer run and its resources will be cleaned up.
	pub fn dispose(&self) {
		self.disposed.set(true);

		// Remove from runtime's dependency graph (ignore if TLS is destroyed)
		let _ = try_with_runtime(|rt| rt.remove_node(self.id));

		// Remove from storage (ignore if TLS is destroyed)
		let removed = EFFECT_FUNCTIONS
			.try_with(|storage| storage.borrow_mut().remove(&self.id))
			.ok()
			.flatten();
		drop(removed);
		let _ = EFFECT_TIMING.try_with(|storage| storage.borrow_mut().remove(&self.id));
	}
}

impl Drop for Effect {
	fn drop(&mut self) {
		self.dispose();
	}
}

// Extends the Runtime with the ability to execute effects when they're scheduled.
impl Runtime {
	/// Flush all pending updates
	///
	/// This executes all passive Effects that have been scheduled for update.
	pub fn flush_updates(&self) {
		self.update_scheduled.set(false);

		// Take all pending updates
		let pending = core::mem::take(&mut *self.pending_updates.borrow_mut());

		// Execute each pending effect
		for node_id in pending {
			Effect::execute_effect(node_id);
		}
	}
}

//! Reactive Runtime
//!
//! This module provides the dependency store behind the interception layer:
//! it records which running effect read which `(target, key)` pair, and
//! re-runs those effects when a handler reports a change.
//!
//! ## Architecture
//!
//! 1. **Observer Stack**: Tracks currently executing Effects
//! 2. **Dependency Tracking**: `track` records `(target, key) -> effect` edges for the running effect
//! 3. **Notification**: `trigger` fans a change out to the affected keys and runs or schedules subscribers
//! 4. **Suspension**: tracking and synchronous scheduling can be paused with save/restore guards
//!
//! ## Example
//!
//! ```ignore
//! use reinhardt_observable::{Effect, EffectTiming, Object, reactive};
//!
//! let state = reactive(Object::record_from([("count", 0)]));
//!
//! let view = state.clone();
//! Effect::new_with_timing(move || {
//!     // Reading through the proxy registers (state, "count") as a dependency
//!     println!("Count is: {:?}", view.get("count"));
//! }, EffectTiming::Layout);
//!
//! // The effect re-runs synchronously
//! state.set("count", 42)?;
//! ```

use core::cell::{Cell, RefCell};
use core::marker::PhantomData;
use core::sync::atomic::{AtomicUsize, Ordering};
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::debug_log;
use crate::value::{Key, Value};

/// Unique identifier for reactive nodes (targets, boxes, Effects)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
	/// Create a new unique NodeId
	pub fn new() -> Self {
		static COUNTER: AtomicUsize = AtomicUsize::new(0);
		Self(COUNTER.fetch_add(1, Ordering::Relaxed))
	}
}

impl Default for NodeId {
	fn default() -> Self {
		Self::new()
	}
}

/// Effect execution timing.
///
/// Determines when an effect should be executed:
/// - Layout effects run synchronously when a dependency changes
/// - Passive effects are queued and run by the scheduler or `flush_updates`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EffectTiming {
	/// Layout effect - runs synchronously
	Layout,
	/// Passive effect - runs on the next flush
	#[default]
	Passive,
}

/// Kind of read being recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOpType {
	Get,
	Has,
	/// Key enumeration
	Iterate,
}

/// Kind of write being reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOpType {
	/// A key that did not exist was created
	Add,
	/// An existing key changed value
	Set,
	Delete,
}

/// Dependency key within a target
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DepKey {
	Key(Key),
	/// Subscribers of key enumeration on a record
	Iterate,
}

impl From<Key> for DepKey {
	fn from(key: Key) -> Self {
		DepKey::Key(key)
	}
}

impl From<&str> for DepKey {
	fn from(key: &str) -> Self {
		DepKey::Key(Key::from(key))
	}
}

/// Extra information carried by a notification
#[derive(Debug, Clone, Default)]
pub struct TriggerContext {
	/// The target is an ordered sequence
	pub is_sequence: bool,
	pub new_value: Option<Value>,
	pub old_value: Option<Value>,
}

/// What a debugger event describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebuggerEventKind {
	Track(TrackOpType),
	Trigger(TriggerOpType),
}

/// Reported to the debugger hook for every track and trigger
#[derive(Debug, Clone)]
pub struct DebuggerEvent {
	/// The running effect, if any
	pub effect: Option<NodeId>,
	pub target: NodeId,
	pub kind: DebuggerEventKind,
	pub key: DepKey,
	pub new_value: Option<Value>,
	pub old_value: Option<Value>,
}

type DebuggerFn = Rc<dyn Fn(&DebuggerEvent)>;

/// Observer represents a currently executing Effect
#[derive(Debug, Clone)]
pub struct Observer {
	/// Unique identifier for this observer
	pub id: NodeId,
}

type Subscribers = BTreeMap<DepKey, Vec<NodeId>>;

/// Type for async task scheduler function
type SchedulerFn = Box<dyn Fn(Box<dyn FnOnce() + Send>) + Send + Sync>;

/// Global scheduler function
static SCHEDULER: std::sync::OnceLock<SchedulerFn> = std::sync::OnceLock::new();

/// Set the global scheduler function for passive effects.
///
/// This should be called once at application startup to configure how
/// queued updates are flushed. Without a scheduler, call
/// [`Runtime::flush_updates`] manually.
///
/// # Example
///
/// ```ignore
/// reinhardt_observable::runtime::set_scheduler(|task| {
///     my_event_loop::defer(task);
/// });
/// ```
pub fn set_scheduler<F>(scheduler: F)
where
	F: Fn(Box<dyn FnOnce() + Send>) + Send + Sync + 'static,
{
	let _ = SCHEDULER.set(Box::new(scheduler));
}

/// Reactive runtime
///
/// This struct manages the dependency graph and update scheduling.
/// It uses thread-local storage to maintain separate runtime state per thread.
pub struct Runtime {
	/// Observer stack for tracking currently executing effects
	observer_stack: RefCell<Vec<Observer>>,
	/// target -> key -> subscribed effects
	pub(crate) dependency_graph: RefCell<BTreeMap<NodeId, Subscribers>>,
	/// effect -> every (target, key) it subscribed to
	pub(crate) effect_dependencies: RefCell<BTreeMap<NodeId, Vec<(NodeId, DepKey)>>>,
	/// Pending updates (passive effects that need to be re-executed)
	pub(crate) pending_updates: RefCell<Vec<NodeId>>,
	/// Whether an update is currently scheduled
	pub(crate) update_scheduled: Cell<bool>,
	should_track: Cell<bool>,
	/// Saved `should_track` values of enclosing pauses
	track_stack: RefCell<Vec<bool>>,
	scheduling_depth: Cell<usize>,
	/// Layout effects held back while scheduling is paused
	deferred_effects: RefCell<Vec<NodeId>>,
	debugger: RefCell<Option<DebuggerFn>>,
}

impl Runtime {
	/// Create a new Runtime instance
	pub fn new() -> Self {
		Self {
			observer_stack: RefCell::new(Vec::new()),
			dependency_graph: RefCell::new(BTreeMap::new()),
			effect_dependencies: RefCell::new(BTreeMap::new()),
			pending_updates: RefCell::new(Vec::new()),
			update_scheduled: Cell::new(false),
			should_track: Cell::new(true),
			track_stack: RefCell::new(Vec::new()),
			scheduling_depth: Cell::new(0),
			deferred_effects: RefCell::new(Vec::new()),
			debugger: RefCell::new(None),
		}
	}

	/// Get the current observer (the currently executing Effect)
	pub fn current_observer(&self) -> Option<NodeId> {
		self.observer_stack
			.borrow()
			.last()
			.map(|observer| observer.id)
	}

	/// Push an observer onto the stack
	///
	/// This should be called when starting to execute an Effect.
	pub fn push_observer(&self, observer: Observer) {
		self.observer_stack.borrow_mut().push(observer);
	}

	/// Pop an observer from the stack
	///
	/// This should be called when finishing execution of an Effect.
	pub fn pop_observer(&self) -> Option<Observer> {
		self.observer_stack.borrow_mut().pop()
	}

	/// Returns `true` when reads are currently recorded
	pub fn is_tracking(&self) -> bool {
		self.should_track.get()
	}

	pub(crate) fn pause_tracking(&self) {
		self.track_stack.borrow_mut().push(self.should_track.get());
		self.should_track.set(false);
	}

	pub(crate) fn enable_tracking(&self) {
		self.track_stack.borrow_mut().push(self.should_track.get());
		self.should_track.set(true);
	}

	/// Restores the state saved by the matching pause/enable
	pub(crate) fn reset_tracking(&self) {
		let previous = self.track_stack.borrow_mut().pop();
		self.should_track.set(previous.unwrap_or(true));
	}

	pub(crate) fn pause_scheduling(&self) {
		self.scheduling_depth.set(self.scheduling_depth.get() + 1);
	}

	/// Leaves a scheduling pause; the outermost one runs deferred effects
	pub(crate) fn reset_scheduling(&self) {
		let depth = self.scheduling_depth.get().saturating_sub(1);
		self.scheduling_depth.set(depth);
		if depth > 0 {
			return;
		}
		loop {
			let deferred = core::mem::take(&mut *self.deferred_effects.borrow_mut());
			if deferred.is_empty() {
				break;
			}
			for effect_id in deferred {
				crate::effect::Effect::execute_effect(effect_id);
			}
		}
	}

	/// Installs a hook called for every track and trigger
	pub fn set_debugger<F>(&self, debugger: F)
	where
		F: Fn(&DebuggerEvent) + 'static,
	{
		*self.debugger.borrow_mut() = Some(Rc::new(debugger));
	}

	pub fn clear_debugger(&self) {
		self.debugger.borrow_mut().take();
	}

	fn emit_debugger(&self, event: impl FnOnce() -> DebuggerEvent) {
		let debugger = self.debugger.borrow().clone();
		if let Some(debugger) = debugger {
			debugger(&event());
		}
	}

	/// Record that the running effect read `key` of `target`
	///
	/// Does nothing while tracking is paused or when no effect is running.
	pub fn track(&self, target: NodeId, op: TrackOpType, key: DepKey) {
		if !self.should_track.get() {
			return;
		}
		let Some(observer_id) = self.current_observer() else {
			return;
		};

		debug_log!("track {:?} {:?} {:?} by {:?}", op, target, key, observer_id);
		self.emit_debugger(|| DebuggerEvent {
			effect: Some(observer_id),
			target,
			kind: DebuggerEventKind::Track(op),
			key: key.clone(),
			new_value: None,
			old_value: None,
		});

		{
			let mut graph = self.dependency_graph.borrow_mut();
			let subscribers = graph
				.entry(target)
				.or_default()
				.entry(key.clone())
				.or_default();
			if !subscribers.contains(&observer_id) {
				subscribers.push(observer_id);
			}
		}

		let mut dependencies = self.effect_dependencies.borrow_mut();
		let effect_node = dependencies.entry(observer_id).or_default();
		let edge = (target, key);
		if !effect_node.contains(&edge) {
			effect_node.push(edge);
		}
	}

	/// Notify that `key` of `target` changed
	///
	/// Layout effects are executed synchronously (or held back while
	/// scheduling is paused), while passive effects are queued.
	pub fn trigger(&self, target: NodeId, op: TriggerOpType, key: DepKey, context: TriggerContext) {
		debug_log!("trigger {:?} {:?} {:?}", op, target, key);
		self.emit_debugger(|| DebuggerEvent {
			effect: self.current_observer(),
			target,
			kind: DebuggerEventKind::Trigger(op),
			key: key.clone(),
			new_value: context.new_value.clone(),
			old_value: context.old_value.clone(),
		});

		let subscribers = self.collect_subscribers(target, op, &key, &context);
		let running = self.current_observer();

		// Collect layout effects and passive effects separately
		let mut layout_effects = Vec::new();
		let mut passive_effects = Vec::new();
		for subscriber_id in subscribers {
			if Some(subscriber_id) == running {
				continue;
			}
			match crate::effect::get_effect_timing(subscriber_id) {
				Some(EffectTiming::Layout) => layout_effects.push(subscriber_id),
				_ => passive_effects.push(subscriber_id),
			}
		}

		if self.scheduling_depth.get() > 0 {
			let mut deferred = self.deferred_effects.borrow_mut();
			for effect_id in layout_effects {
				if !deferred.contains(&effect_id) {
					deferred.push(effect_id);
				}
			}
		} else {
			for effect_id in layout_effects {
				crate::effect::Effect::execute_effect(effect_id);
			}
		}

		for effect_id in passive_effects {
			self.schedule_update(effect_id);
		}
	}

	/// Resolve a change to the subscribers of every affected key
	fn collect_subscribers(
		&self,
		target: NodeId,
		op: TriggerOpType,
		key: &DepKey,
		context: &TriggerContext,
	) -> Vec<NodeId> {
		let graph = self.dependency_graph.borrow();
		let Some(deps) = graph.get(&target) else {
			return Vec::new();
		};

		let mut collected = Vec::new();
		let mut add = |subscribers: Option<&Vec<NodeId>>| {
			for &id in subscribers.into_iter().flatten() {
				if !collected.contains(&id) {
					collected.push(id);
				}
			}
		};

		let length = DepKey::Key(Key::length());
		if context.is_sequence && *key == length {
			// Shrinking a sequence also changes every index at or past the new end
			let new_length = context
				.new_value
				.as_ref()
				.and_then(Value::as_number)
				.filter(|n| *n >= 0.0)
				.map_or(0, |n| n as usize);
			for (dep_key, subscribers) in deps {
				let affected = match dep_key {
					DepKey::Key(k) if k.is_length() => true,
					DepKey::Key(k) => k.as_index().is_some_and(|index| index >= new_length),
					DepKey::Iterate => false,
				};
				if affected {
					add(Some(subscribers));
				}
			}
		} else {
			add(deps.get(key));
			let is_index = matches!(key, DepKey::Key(k) if k.as_index().is_some());
			match op {
				TriggerOpType::Add if context.is_sequence && is_index => add(deps.get(&length)),
				TriggerOpType::Add | TriggerOpType::Delete if !context.is_sequence => {
					add(deps.get(&DepKey::Iterate))
				}
				_ => {}
			}
		}
		collected
	}

	/// Schedule a node for update
	///
	/// The actual update will be performed by the scheduler, or by the next
	/// manual [`Runtime::flush_updates`].
	///
	/// # Arguments
	///
	/// * `node_id` - ID of the node to update
	pub fn schedule_update(&self, node_id: NodeId) {
		let mut pending = self.pending_updates.borrow_mut();
		if !pending.contains(&node_id) {
			pending.push(node_id);
		}
		drop(pending);

		// Schedule flush if not already scheduled
		if !self.update_scheduled.get() {
			self.update_scheduled.set(true);

			// If a scheduler is set, use it to schedule the flush
			if let Some(scheduler) = SCHEDULER.get() {
				scheduler(Box::new(|| {
					RUNTIME.with(|rt| rt.flush_updates());
				}));
			}
			// If no scheduler is set, updates must be flushed manually
		}
	}

	/// Remove an effect from every subscriber list it joined
	///
	/// This should be called before re-executing an Effect to clear old dependencies.
	pub fn clear_dependencies(&self, node_id: NodeId) {
		let edges = self
			.effect_dependencies
			.borrow_mut()
			.get_mut(&node_id)
			.map(core::mem::take)
			.unwrap_or_default();

		let mut graph = self.dependency_graph.borrow_mut();
		for (target, key) in edges {
			if let Some(subscribers) = graph.get_mut(&target).and_then(|deps| deps.get_mut(&key)) {
				subscribers.retain(|&id| id != node_id);
			}
		}
	}

	/// Remove an effect from the dependency graph
	///
	/// This should be called when an Effect is dropped.
	pub fn remove_node(&self, node_id: NodeId) {
		self.clear_dependencies(node_id);
		self.effect_dependencies.borrow_mut().remove(&node_id);
	}

	/// Forget every subscription on a target that no longer exists
	pub fn remove_target(&self, target: NodeId) {
		self.dependency_graph.borrow_mut().remove(&target);
	}

	/// Check if a target has any recorded subscriptions (for testing)
	pub fn has_target(&self, target: NodeId) -> bool {
		self.dependency_graph.borrow().contains_key(&target)
	}

	/// Get the number of subscribers for a key of a target (for testing)
	pub fn subscriber_count(&self, target: NodeId, key: &DepKey) -> usize {
		self.dependency_graph
			.borrow()
			.get(&target)
			.and_then(|deps| deps.get(key))
			.map_or(0, Vec::len)
	}
}

impl Default for Runtime {
	fn default() -> Self {
		Self::new()
	}
}

// Thread-local runtime instance
//
// Each thread gets its own runtime instance; observable values are not Send.
thread_local! {
	static RUNTIME: Runtime = Runtime::new();
}

/// Get a reference to the thread's runtime
///
/// # Example
///
/// ```ignore
/// use reinhardt_observable::runtime::with_runtime;
///
/// with_runtime(|rt| rt.set_debugger(|event| println!("{event:?}")));
/// ```
pub fn with_runtime<F, R>(f: F) -> R
where
	F: FnOnce(&Runtime) -> R,
{
	RUNTIME.with(f)
}

/// Try to access the runtime (safe version for Drop implementations)
///
/// Returns None if the thread-local storage has been destroyed.
pub(crate) fn try_with_runtime<F, R>(f: F) -> Option<R>
where
	F: FnOnce(&Runtime) -> R,
{
	RUNTIME.try_with(f).ok()
}

/// Record a read on the thread's runtime
pub fn track(target: NodeId, op: TrackOpType, key: impl Into<DepKey>) {
	let key = key.into();
	with_runtime(|rt| rt.track(target, op, key));
}

/// Report a write to the thread's runtime
pub fn trigger(target: NodeId, op: TriggerOpType, key: impl Into<DepKey>, context: TriggerContext) {
	let key = key.into();
	with_runtime(|rt| rt.trigger(target, op, key, context));
}

pub(crate) fn track_value(target: &Value, op: TrackOpType, key: impl Into<DepKey>) {
	if let Some(id) = target.identity() {
		track(id, op, key);
	}
}

pub(crate) fn trigger_value(
	target: &Value,
	op: TriggerOpType,
	key: impl Into<DepKey>,
	new_value: Option<Value>,
	old_value: Option<Value>,
) {
	if let Some(id) = target.identity() {
		let context = TriggerContext {
			is_sequence: target.is_sequence(),
			new_value,
			old_value,
		};
		trigger(id, op, key, context);
	}
}

/// Returns `true` when reads on this thread are currently recorded
pub fn is_tracking() -> bool {
	with_runtime(Runtime::is_tracking)
}

/// Suspends dependency tracking until dropped.
///
/// Pauses nest: dropping a pause restores whatever state was in effect when
/// it was created.
pub struct TrackingPause {
	_not_send: PhantomData<*const ()>,
}

impl TrackingPause {
	pub fn new() -> Self {
		with_runtime(Runtime::pause_tracking);
		Self { _not_send: PhantomData }
	}
}

impl Default for TrackingPause {
	fn default() -> Self {
		Self::new()
	}
}

impl Drop for TrackingPause {
	fn drop(&mut self) {
		let _ = try_with_runtime(Runtime::reset_tracking);
	}
}

/// Holds back synchronous effects until dropped.
///
/// Layout effects triggered meanwhile run once, when the outermost pause ends.
pub struct SchedulingPause {
	_not_send: PhantomData<*const ()>,
}

impl SchedulingPause {
	pub fn new() -> Self {
		with_runtime(Runtime::pause_scheduling);
		Self { _not_send: PhantomData }
	}
}

impl Default for SchedulingPause {
	fn default() -> Self {
		Self::new()
	}
}

impl Drop for SchedulingPause {
	fn drop(&mut self) {
		let _ = try_with_runtime(Runtime::reset_scheduling);
	}
}

/// Runs `f` without recording any dependency
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
	let _pause = TrackingPause::new();
	f()
}

//! Integration tests for record interception
//!
//! These tests verify the mutable wrapper end to end:
//! 1. Reads inside an effect record exactly the keys that were read
//! 2. Writes notify as Add or Set, and only when the value really changed
//! 3. Membership and enumeration reads subscribe to the right changes
//! 4. Boxes stored in records are unwrapped and written through
//! 5. Writes arriving through a prototype chain never notify the prototype
//! 6. Tracking pauses nest and survive errors

use reinhardt_observable::{
	DebuggerEvent, DebuggerEventKind, DepKey, Effect, EffectTiming, Function, Key, Object,
	ObservableError, Ref, TrackOpType, TrackingPause, TriggerOpType, Value, is_tracking, reactive,
	to_raw, with_runtime,
};
use rstest::rstest;
use serial_test::serial;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Runs `read` inside a synchronous effect and counts its executions
fn watch(read: impl Fn() + 'static) -> (Rc<Cell<usize>>, Effect) {
	let runs = Rc::new(Cell::new(0));
	let runs_clone = runs.clone();
	let effect = Effect::new_with_timing(
		move || {
			read();
			runs_clone.set(runs_clone.get() + 1);
		},
		EffectTiming::Layout,
	);
	(runs, effect)
}

/// Collects every debugger event until the returned handle is dropped
fn record_events() -> Rc<RefCell<Vec<DebuggerEvent>>> {
	let events = Rc::new(RefCell::new(Vec::new()));
	let events_clone = events.clone();
	with_runtime(|rt| rt.set_debugger(move |event| events_clone.borrow_mut().push(event.clone())));
	events
}

fn stop_recording() {
	with_runtime(|rt| rt.clear_debugger());
}

fn trigger_kinds(events: &[DebuggerEvent]) -> Vec<TriggerOpType> {
	events
		.iter()
		.filter_map(|event| match event.kind {
			DebuggerEventKind::Trigger(op) => Some(op),
			DebuggerEventKind::Track(_) => None,
		})
		.collect()
}

// ============================================================================
// Category 1: Dependency recording
// ============================================================================

/// A single read records a single dependency on the raw target
#[rstest]
#[serial]
fn test_read_records_one_dependency_on_raw_target() {
	// Arrange
	let raw = Object::record_from([("a", 1), ("b", 2)]);
	let state = reactive(raw.clone());
	let events = record_events();

	// Act
	let view = state.clone();
	let (_runs, effect) = watch(move || {
		let _ = view.get("a");
	});
	stop_recording();

	// Assert
	let events = events.borrow();
	let tracks: Vec<_> = events
		.iter()
		.filter(|event| event.kind == DebuggerEventKind::Track(TrackOpType::Get))
		.collect();
	assert_eq!(tracks.len(), 1);
	assert_eq!(tracks[0].target, raw.id());
	assert_eq!(tracks[0].key, DepKey::from("a"));
	assert_eq!(tracks[0].effect, Some(effect.id()));
}

/// Every read issues its own record call; the store keeps one subscription
#[rstest]
#[serial]
fn test_repeated_read_records_each_call_once_subscribed() {
	// Arrange
	let raw = Object::record_from([("a", 1)]);
	let state = reactive(raw.clone());
	let events = record_events();

	// Act
	let view = state.clone();
	let (_runs, _effect) = watch(move || {
		let _ = view.get("a");
		let _ = view.get("a");
	});
	stop_recording();

	// Assert
	let reads = events
		.borrow()
		.iter()
		.filter(|event| {
			event.kind == DebuggerEventKind::Track(TrackOpType::Get) && event.key == DepKey::from("a")
		})
		.count();
	assert_eq!(reads, 2);
	with_runtime(|rt| assert_eq!(rt.subscriber_count(raw.id(), &DepKey::from("a")), 1));
}

/// Reads outside any effect record nothing
#[rstest]
#[serial]
fn test_reads_outside_effects_are_not_recorded() {
	// Arrange
	let raw = Object::record_from([("a", 1)]);
	let state = reactive(raw.clone());

	// Act
	let value = state.get("a").unwrap();

	// Assert
	assert_eq!(value, Value::from(1));
	with_runtime(|rt| assert_eq!(rt.subscriber_count(raw.id(), &DepKey::from("a")), 0));
}

/// Only the key that changed re-runs its readers
#[rstest]
#[serial]
fn test_unrelated_write_does_not_rerun() {
	// Arrange
	let state = reactive(Object::record_from([("a", 1), ("b", 2)]));
	let view = state.clone();
	let (runs, _effect) = watch(move || {
		let _ = view.get("a");
	});

	// Act
	state.set("b", 3).unwrap();

	// Assert
	assert_eq!(runs.get(), 1);
}

// ============================================================================
// Category 2: Change notification
// ============================================================================

/// Creating, changing and re-writing a key notify Add, Set and nothing
#[rstest]
#[serial]
fn test_writes_notify_add_then_set_then_nothing() {
	// Arrange
	let state = reactive(Object::record());
	let events = record_events();

	// Act
	state.set("count", 1).unwrap();
	state.set("count", 2).unwrap();
	state.set("count", 2).unwrap();
	stop_recording();

	// Assert
	assert_eq!(
		trigger_kinds(&events.borrow()),
		vec![TriggerOpType::Add, TriggerOpType::Set]
	);
}

/// NaN replacing NaN is not a change
#[rstest]
#[serial]
fn test_nan_over_nan_does_not_notify() {
	// Arrange
	let state = reactive(Object::record_from([("ratio", f64::NAN)]));
	let view = state.clone();
	let (runs, _effect) = watch(move || {
		let _ = view.get("ratio");
	});

	// Act
	state.set("ratio", f64::NAN).unwrap();

	// Assert
	assert_eq!(runs.get(), 1);
}

/// Storing a wrapper of the current raw value is not a change
#[rstest]
#[serial]
fn test_writing_wrapper_of_current_value_does_not_notify() {
	// Arrange
	let nested = Value::from(Object::record());
	let state = reactive(Object::record_from([("child", nested.clone())]));
	let view = state.clone();
	let (runs, _effect) = watch(move || {
		let _ = view.get("child");
	});

	// Act
	state.set("child", reactive(nested.clone())).unwrap();

	// Assert
	assert_eq!(runs.get(), 1);
	// The raw target keeps holding the raw value
	assert_eq!(to_raw(&state).get("child").unwrap(), nested);
}

/// Deleting an existing key notifies readers; deleting a missing key does not
#[rstest]
#[serial]
fn test_delete_notifies_only_existing_keys() {
	// Arrange
	let state = reactive(Object::record_from([("a", 1)]));
	let view = state.clone();
	let (runs, _effect) = watch(move || {
		let _ = view.get("a");
		let _ = view.get("missing");
	});

	// Act
	state.delete("missing").unwrap();
	let runs_after_missing = runs.get();
	state.delete("a").unwrap();

	// Assert
	assert_eq!(runs_after_missing, 1);
	assert_eq!(runs.get(), 2);
	assert!(!state.has("a").unwrap());
}

// ============================================================================
// Category 3: Membership and enumeration
// ============================================================================

/// A membership read re-runs when the key appears
#[rstest]
#[serial]
fn test_has_subscribes_to_key_creation() {
	// Arrange
	let state = reactive(Object::record());
	let seen = Rc::new(Cell::new(false));
	let seen_clone = seen.clone();
	let view = state.clone();
	let (runs, _effect) = watch(move || {
		seen_clone.set(view.has("flag").unwrap());
	});

	// Act
	state.set("flag", true).unwrap();

	// Assert
	assert_eq!(runs.get(), 2);
	assert!(seen.get());
}

/// Enumeration re-runs on Add and Delete but not on Set
#[rstest]
#[serial]
fn test_own_keys_subscribes_to_shape_changes() {
	// Arrange
	let raw = Object::record_from([("a", 1)]);
	let state = reactive(raw.clone());
	let keys = Rc::new(RefCell::new(Vec::new()));
	let keys_clone = keys.clone();
	let view = state.clone();
	let (runs, _effect) = watch(move || {
		*keys_clone.borrow_mut() = view.own_keys().unwrap();
	});

	// Act
	state.set("a", 10).unwrap();
	let runs_after_set = runs.get();
	state.set("b", 2).unwrap();
	state.delete("a").unwrap();

	// Assert
	assert_eq!(runs_after_set, 1);
	assert_eq!(runs.get(), 3);
	assert_eq!(*keys.borrow(), vec![Key::from("b")]);
	with_runtime(|rt| assert_eq!(rt.subscriber_count(raw.id(), &DepKey::Iterate), 1));
}

/// The instrumented `hasOwnProperty` tracks membership
#[rstest]
#[serial]
fn test_has_own_property_is_tracked() {
	// Arrange
	let state = reactive(Object::record());
	let seen = Rc::new(Cell::new(false));
	let seen_clone = seen.clone();
	let view = state.clone();
	let (runs, _effect) = watch(move || {
		let result = view.call_method("hasOwnProperty", &[Value::from("id")]).unwrap();
		seen_clone.set(result.as_bool().unwrap_or(false));
	});

	// Act
	state.set("id", 7).unwrap();

	// Assert
	assert_eq!(runs.get(), 2);
	assert!(seen.get());
}

// ============================================================================
// Category 4: Boxes inside records
// ============================================================================

/// Boxes read through a record wrapper are unwrapped
#[rstest]
#[serial]
fn test_box_in_record_is_unwrapped_on_read() {
	// Arrange
	let count = Ref::new(1);
	let state = reactive(Object::record_from([("count", count.clone())]));

	// Act
	let value = state.get("count").unwrap();

	// Assert
	assert_eq!(value, Value::from(1));
}

/// Assigning a plain value writes through the stored box
#[rstest]
#[serial]
fn test_plain_write_goes_through_box() {
	// Arrange
	let count = Ref::new(1);
	let state = reactive(Object::record_from([("count", count.clone())]));
	let boxed = count.clone();
	let (runs, _effect) = watch(move || {
		let _ = boxed.get();
	});

	// Act
	state.set("count", 2).unwrap();

	// Assert
	assert_eq!(count.get_untracked(), Value::from(2));
	assert_eq!(runs.get(), 2);
	assert!(to_raw(&state).get("count").unwrap().as_boxed().is_some());
}

/// Assigning another box replaces the stored box
#[rstest]
#[serial]
fn test_box_write_replaces_box() {
	// Arrange
	let first = Ref::new(1);
	let second = Ref::new(5);
	let state = reactive(Object::record_from([("count", first.clone())]));

	// Act
	state.set("count", second.clone()).unwrap();

	// Assert
	assert_eq!(state.get("count").unwrap(), Value::from(5));
	assert_eq!(first.get_untracked(), Value::from(1));
	let stored = to_raw(&state).get("count").unwrap();
	assert!(stored.as_boxed().is_some_and(|boxed| boxed.ptr_eq(&second)));
}

// ============================================================================
// Category 5: Prototype chains
// ============================================================================

/// A write through a child whose prototype is a wrapper lands on the child
#[rstest]
#[serial]
fn test_write_through_prototype_does_not_notify_prototype() {
	// Arrange
	let parent = reactive(Object::record_from([("x", 1)]));
	let child = Object::record();
	child.set_prototype(Some(parent.clone()));
	let child = Value::from(child);
	let view = parent.clone();
	let (runs, _effect) = watch(move || {
		let _ = view.get("x");
	});

	// Act
	let written = child.set("x", 2).unwrap();

	// Assert
	assert!(written);
	assert_eq!(runs.get(), 1);
	assert_eq!(parent.get("x").unwrap(), Value::from(1));
	assert_eq!(child.get("x").unwrap(), Value::from(2));
}

/// Reads that fall through to a wrapped prototype are tracked on it
#[rstest]
#[serial]
fn test_inherited_read_tracks_prototype() {
	// Arrange
	let parent = reactive(Object::record_from([("x", 1)]));
	let child = Object::record();
	child.set_prototype(Some(parent.clone()));
	let child = Value::from(child);
	let view = child.clone();
	let (runs, _effect) = watch(move || {
		let _ = view.get("x");
	});

	// Act
	parent.set("x", 3).unwrap();

	// Assert
	assert_eq!(runs.get(), 2);
	assert_eq!(child.get("x").unwrap(), Value::from(3));
}

// ============================================================================
// Category 6: Tracking control and errors
// ============================================================================

/// Releasing an inner pause leaves the outer pause in force
#[rstest]
#[serial]
fn test_nested_tracking_pauses_restore_outer_state() {
	// Arrange
	let raw = Object::record_from([("a", 1), ("b", 2)]);
	let state = reactive(raw.clone());

	// Act
	let view = state.clone();
	let (_runs, _effect) = watch(move || {
		{
			let _outer = TrackingPause::new();
			{
				let _inner = TrackingPause::new();
			}
			let _ = view.get("a");
		}
		let _ = view.get("b");
	});

	// Assert
	with_runtime(|rt| {
		assert_eq!(rt.subscriber_count(raw.id(), &DepKey::from("a")), 0);
		assert_eq!(rt.subscriber_count(raw.id(), &DepKey::from("b")), 1);
	});
}

/// A throwing accessor surfaces its error unchanged and leaves tracking intact
#[rstest]
#[serial]
fn test_accessor_error_propagates_through_wrapper() {
	// Arrange
	let raw = Object::record_from([("ok", 1)]);
	let getter = Function::new("broken", |_, _| Err(ObservableError::Thrown("boom".into())));
	raw.define_accessor("broken", Some(getter), None);
	let state = reactive(raw.clone());
	let outcome = Rc::new(RefCell::new(None));
	let outcome_clone = outcome.clone();
	let view = state.clone();

	// Act
	let (runs, _effect) = watch(move || {
		let error = view.get("broken").err();
		let _ = view.get("ok");
		*outcome_clone.borrow_mut() = Some((error, is_tracking()));
	});
	state.set("ok", 2).unwrap();

	// Assert
	let outcome = outcome.borrow();
	let (error, tracking) = outcome.as_ref().unwrap();
	assert_eq!(*error, Some(ObservableError::Thrown("boom".into())));
	assert!(*tracking);
	assert_eq!(runs.get(), 2);
}

/// Operations on primitives fail with the operation name
#[rstest]
#[case::get("get")]
#[case::set("set")]
#[case::has("has")]
#[case::delete("delete")]
fn test_primitive_operations_fail(#[case] operation: &'static str) {
	// Arrange
	let primitive = Value::from(3);

	// Act
	let error = match operation {
		"get" => primitive.get("x").unwrap_err(),
		"set" => primitive.set("x", 1).unwrap_err(),
		"has" => primitive.has("x").unwrap_err(),
		_ => primitive.delete("x").unwrap_err(),
	};

	// Assert
	assert_eq!(error, ObservableError::NotAnObject { operation });
}

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use pretty_assertions::assert_eq;

use super::*;
use crate::DeferredState;

type D = Deferred<i32, String>;

#[test]
fn steps_wait_for_each_yielded_deferred() {
	let gates: Vec<D> = (0..3).map(|_| D::new()).collect();
	let started = Rc::new(RefCell::new(Vec::new()));

	let pending = gates.clone();
	let log = Rc::clone(&started);
	let mut index = 0usize;
	let outer = drive(from_fn(move |input: Resume<i32, String>| {
		if let Resume::Value(v) = input {
			log.borrow_mut().push(format!("got {v}"));
		}
		if index == pending.len() {
			return Ok(Suspend::Return(index as i32));
		}
		log.borrow_mut().push(format!("start {index}"));
		let gate = pending[index].clone();
		index += 1;
		Ok(Suspend::Await(gate))
	}));

	assert_eq!(*started.borrow(), vec!["start 0"]);
	gates[1].resolve(20).unwrap();
	assert_eq!(*started.borrow(), vec!["start 0"], "step 1 settled early but step 0 is still pending");

	gates[0].resolve(10).unwrap();
	assert_eq!(*started.borrow(), vec!["start 0", "got 10", "start 1", "got 20", "start 2"]);
	assert!(outer.is_pending());

	gates[2].resolve(30).unwrap();
	assert_eq!(outer.value(), Some(3));
}

#[test]
fn plain_yields_are_fed_back() {
	let mut count = 0;
	let outer = drive(from_fn(move |input: Resume<i32, String>| {
		let seen = match input {
			Resume::Start => 0,
			Resume::Value(v) => v,
			Resume::Failed(e) => return Err(e),
		};
		count += 1;
		if count > 4 { Ok(Suspend::Return(seen)) } else { Ok(Suspend::Yield(seen + 10)) }
	}));
	assert_eq!(outer.value(), Some(40));
}

#[test]
fn ready_deferreds_are_consumed_iteratively() {
	let mut left = 100_000;
	let outer = drive(from_fn(move |_input: Resume<i32, String>| {
		if left == 0 {
			return Ok(Suspend::Return(0));
		}
		left -= 1;
		Ok(Suspend::Await(D::resolved(left)))
	}));
	assert_eq!(outer.state(), DeferredState::Resolved);
}

#[test]
fn failure_is_delivered_into_the_procedure() {
	let gate = D::new();
	let awaited = gate.clone();
	let outer = drive(from_fn(move |input: Resume<i32, String>| match input {
		Resume::Start => Ok(Suspend::Await(awaited.clone())),
		Resume::Failed(e) => Ok(Suspend::Return(e.len() as i32)),
		Resume::Value(_) => Err("unexpected value".to_string()),
	}));

	gate.fail("lost".into()).unwrap();
	assert_eq!(outer.value(), Some(4));
}

#[test]
fn unrecovered_failure_fails_outer() {
	let gate = D::new();
	let outer = Sequence::new().step({
		let gate = gate.clone();
		move |_| gate
	});
	let outer = outer.step(|_| D::resolved(1)).run();

	gate.fail("boom".into()).unwrap();
	assert_eq!(outer.error(), Some("boom".to_string()));
}

#[test]
fn sequence_passes_values_between_steps() {
	let outer = Sequence::<i32, String>::new()
		.step(|prev| D::resolved(prev.unwrap_or(1) * 2))
		.step(|prev| D::resolved(prev.unwrap_or(0) + 3))
		.run();
	assert_eq!(outer.value(), Some(Some(5)));
}

#[test]
fn stop_flag_prevents_later_steps() {
	let stop = Rc::new(Cell::new(false));
	let ran = Rc::new(Cell::new(0));
	let gate = D::new();

	let mut sequence = Sequence::<i32, String>::new().stop_when({
		let stop = Rc::clone(&stop);
		move || stop.get()
	});
	sequence = sequence.step({
		let gate = gate.clone();
		let ran = Rc::clone(&ran);
		move |_| {
			ran.set(ran.get() + 1);
			gate
		}
	});
	for _ in 0..3 {
		let ran = Rc::clone(&ran);
		sequence = sequence.step(move |_| {
			ran.set(ran.get() + 1);
			D::resolved(0)
		});
	}
	let outer = sequence.run();

	stop.set(true);
	gate.resolve(7).unwrap();
	assert_eq!(ran.get(), 1);
	assert_eq!(outer.value(), Some(Some(7)));
}

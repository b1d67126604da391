use std::cell::RefCell;
use std::rc::Rc;

use pretty_assertions::assert_eq;

use super::*;

type D = Deferred<i32, String>;

fn recorder() -> (Rc<RefCell<Vec<String>>>, impl Fn(&str) -> Box<dyn Fn(i32)>) {
	let log = Rc::new(RefCell::new(Vec::new()));
	let sink = Rc::clone(&log);
	let make = move |tag: &str| -> Box<dyn Fn(i32)> {
		let sink = Rc::clone(&sink);
		let tag = tag.to_string();
		Box::new(move |v| sink.borrow_mut().push(format!("{tag}:{v}")))
	};
	(log, make)
}

#[test]
fn callbacks_fire_in_registration_order_on_resolve() {
	let d = D::new();
	let (log, make) = recorder();
	for tag in ["a", "b", "c"] {
		let f = make(tag);
		d.when_settled(move |o| f(o.unwrap_or_default()));
	}
	assert!(log.borrow().is_empty());
	assert_eq!(d.callback_count(), 3);

	d.resolve(7).unwrap();
	assert_eq!(*log.borrow(), vec!["a:7", "b:7", "c:7"]);
	assert_eq!(d.callback_count(), 0);
	assert_eq!(d.state(), DeferredState::Resolved);
}

#[test]
fn callback_after_settlement_runs_immediately() {
	let d = D::resolved(3);
	let seen = Rc::new(RefCell::new(None));
	let sink = Rc::clone(&seen);
	d.when_settled(move |o| *sink.borrow_mut() = Some(o));
	assert_eq!(*seen.borrow(), Some(Ok(3)));
}

#[test]
fn second_settle_is_rejected() {
	let d = D::new();
	d.resolve(1).unwrap();
	assert_eq!(d.resolve(2), Err(AlreadySettled));
	assert_eq!(d.fail("late".into()), Err(AlreadySettled));
	assert_eq!(d.outcome(), Some(Ok(1)));
}

#[test]
fn add_callback_transforms_value() {
	let d = D::new();
	let doubled: D = d.add_callback(|v| Ok::<_, String>(v * 2));
	let text = doubled.map(|v| format!("value={v}"));
	assert!(text.is_pending());

	d.resolve(21).unwrap();
	assert_eq!(text.value(), Some("value=42".to_string()));
}

#[test]
fn failure_skips_callbacks_until_errback() {
	let d = D::new();
	let called = Rc::new(RefCell::new(false));
	let flag = Rc::clone(&called);
	let chained: D = d.add_callback(move |v| {
		*flag.borrow_mut() = true;
		Ok::<_, String>(v)
	});
	let recovered = chained.add_errback(|e| Ok::<_, String>(e.len() as i32));

	d.fail("boom".into()).unwrap();
	assert!(!*called.borrow());
	assert_eq!(chained.error(), Some("boom".to_string()));
	assert_eq!(recovered.value(), Some(4));
}

#[test]
fn errback_can_rethrow() {
	let d = D::failed("first".into());
	let chained = d.add_errback(|e| Err::<i32, _>(format!("{e}+second")));
	assert_eq!(chained.state(), DeferredState::Failed);
	assert_eq!(chained.error(), Some("first+second".to_string()));
}

#[test]
fn nested_deferred_flattens_chain() {
	let outer = D::new();
	let inner = D::new();
	let inner_handle = inner.clone();
	let chained: D = outer.add_callback(move |_| inner_handle);

	outer.resolve(1).unwrap();
	assert!(chained.is_pending(), "chain waits for the nested deferred");

	inner.resolve(99).unwrap();
	assert_eq!(chained.value(), Some(99));
}

#[test]
fn callback_registered_while_firing_queues_behind_existing() {
	let d = D::new();
	let log = Rc::new(RefCell::new(Vec::new()));

	let reentrant = d.clone();
	let sink = Rc::clone(&log);
	d.when_settled(move |_| {
		sink.borrow_mut().push("first");
		let late = Rc::clone(&sink);
		reentrant.when_settled(move |_| late.borrow_mut().push("late"));
	});
	let sink = Rc::clone(&log);
	d.when_settled(move |_| sink.borrow_mut().push("second"));

	d.resolve(0).unwrap();
	assert_eq!(*log.borrow(), vec!["first", "second", "late"]);
}

#[test]
fn map_err_converts_failure() {
	let d = D::new();
	let converted: Deferred<i32, usize> = d.map_err(|e| e.len());
	d.fail("abc".into()).unwrap();
	assert_eq!(converted.error(), Some(3));
}

#[test]
fn gather_collects_in_input_order() {
	let a = D::new();
	let b = D::new();
	let c = D::resolved(3);
	let all = gather([a.clone(), b.clone(), c]);

	b.resolve(2).unwrap();
	assert!(all.is_pending());
	a.resolve(1).unwrap();
	assert_eq!(all.value(), Some(vec![1, 2, 3]));
}

#[test]
fn gather_fails_with_first_failure() {
	let a = D::new();
	let b = D::new();
	let all = gather([a.clone(), b.clone()]);

	b.fail("b".into()).unwrap();
	a.fail("a".into()).unwrap();
	assert_eq!(all.error(), Some("b".to_string()));
}

#[test]
fn gather_of_nothing_resolves_empty() {
	let all = gather(Vec::<D>::new());
	assert_eq!(all.value(), Some(Vec::new()));
}

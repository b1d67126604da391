#![cfg(unix)]

use std::sync::LazyLock;

use courier_rpc::{
	Args, EncodedChannel, Endpoint, EndpointConfig, Error, MemoryChannel, MethodTable, Remote, SocketChannel, Value,
	args,
};
use pretty_assertions::assert_eq;
use rstest::rstest;

#[derive(Default)]
struct Recorder {
	notified: Option<String>,
	data: Vec<Value>,
}

impl Remote for Recorder {
	fn methods() -> &'static MethodTable<Self> {
		static TABLE: LazyLock<MethodTable<Recorder>> = LazyLock::new(|| {
			MethodTable::<Recorder>::builder()
				.fire_and_forget("notify", |r, mut args, _| {
					r.notified = args.take(0)?.as_str().map(str::to_owned);
					Ok(Value::Null)
				})
				.acknowledged("info", |_, _, _| Ok(Value::map([("bla", 1)])))
				.fire_and_forget("add", |r, mut args, _| {
					r.data.push(args.take(0)?);
					Ok(Value::Null)
				})
				.acknowledged("greet", |_, args, _| {
					let name = args.keyword("name").and_then(Value::as_str).unwrap_or("nobody");
					Ok(Value::from(format!("hello {name}")))
				})
				.acknowledged("spawn", |_, _, ctx| {
					let child = ctx.endpoint().register(Recorder::default());
					Ok(Value::from(&child))
				})
				.build()
		});
		&TABLE
	}
}

#[derive(Debug, Clone, Copy)]
enum Flavour {
	Memory,
	Encoded,
	Socket,
}

fn connect(flavour: Flavour) -> (Endpoint, Endpoint) {
	let e = EndpointConfig::named("e");
	let f = EndpointConfig::named("f");
	match flavour {
		Flavour::Memory => {
			let (a, b) = MemoryChannel::pair();
			(Endpoint::new(a, e), Endpoint::new(b, f))
		}
		Flavour::Encoded => {
			let (a, b) = EncodedChannel::pair();
			(Endpoint::new(a, e), Endpoint::new(b, f))
		}
		Flavour::Socket => {
			let (a, b) = SocketChannel::pair().unwrap();
			(Endpoint::new(a, e), Endpoint::new(b, f))
		}
	}
}

#[rstest]
#[case::memory(Flavour::Memory)]
#[case::encoded(Flavour::Encoded)]
#[case::socket(Flavour::Socket)]
fn acknowledged_call_needs_both_drains(#[case] flavour: Flavour) {
	let (e, f) = connect(flavour);
	let o = e.register(Recorder::default());
	let p = o.get_proxy(&f);

	p.notify(&f, "notify", args!["x"]).unwrap();
	e.drain().unwrap();
	assert_eq!(o.borrow().notified.as_deref(), Some("x"));

	let d = p.call(&f, "info", Args::new()).unwrap();
	assert!(d.is_pending());
	e.drain().unwrap();
	assert!(d.is_pending(), "the reply only lands when the caller drains");
	f.drain().unwrap();
	assert_eq!(d.value(), Some(Value::map([("bla", 1)])));
}

#[rstest]
#[case::memory(Flavour::Memory)]
#[case::encoded(Flavour::Encoded)]
#[case::socket(Flavour::Socket)]
fn fire_and_forget_calls_apply_in_send_order(#[case] flavour: Flavour) {
	let (e, f) = connect(flavour);
	let o = e.register(Recorder::default());
	let p = o.get_proxy(&f);
	for i in 0..5 {
		p.notify(&f, "add", args![i]).unwrap();
	}
	assert!(o.borrow().data.is_empty(), "nothing is dispatched before a drain");

	let report = e.drain().unwrap();
	assert_eq!(report.calls, 5);
	assert_eq!(o.borrow().data, (0..5).map(Value::from).collect::<Vec<_>>());
}

#[rstest]
#[case::memory(Flavour::Memory)]
#[case::encoded(Flavour::Encoded)]
#[case::socket(Flavour::Socket)]
fn local_object_argument_can_be_called_back(#[case] flavour: Flavour) {
	let (e, f) = connect(flavour);
	let b = e.register(Recorder::default());
	let a = f.register(Recorder::default());

	b.get_proxy(&f).notify(&f, "add", args![&a]).unwrap();
	e.drain().unwrap();

	let received = b.borrow().data[0].as_proxy().cloned().unwrap();
	assert_eq!(received.id(), a.id());
	assert_eq!(received.route(), e.token());

	let reply = received.call(&e, "info", Args::new()).unwrap();
	f.drain().unwrap();
	e.drain().unwrap();
	assert_eq!(reply.value(), Some(Value::map([("bla", 1)])));
}

#[rstest]
#[case::memory(Flavour::Memory)]
#[case::encoded(Flavour::Encoded)]
#[case::socket(Flavour::Socket)]
fn proxy_passed_back_to_its_owner_resolves_locally(#[case] flavour: Flavour) {
	let (e, f) = connect(flavour);
	let b = e.register(Recorder::default());
	let rb = b.get_proxy(&f);

	rb.notify(&f, "add", args![&rb]).unwrap();
	e.drain().unwrap();

	let stored = b.borrow().data[0].clone();
	assert_eq!(stored, Value::from(&b));
	let resolved = stored.as_object().and_then(|object| e.resolve::<Recorder>(object)).unwrap();
	assert!(resolved.ptr_eq(&b));
	assert_eq!(e.registered_count(), 1);
}

#[rstest]
#[case::memory(Flavour::Memory)]
#[case::encoded(Flavour::Encoded)]
#[case::socket(Flavour::Socket)]
fn returned_objects_arrive_as_proxies(#[case] flavour: Flavour) {
	let (e, f) = connect(flavour);
	let o = e.register(Recorder::default());

	let reply = o.get_proxy(&f).call(&f, "spawn", Args::new()).unwrap();
	e.drain().unwrap();
	f.drain().unwrap();

	let child = reply.value().and_then(|value| value.as_proxy().cloned()).unwrap();
	assert_eq!(child.route(), f.token());
	assert!(e.is_registered(child.id()));

	child.notify(&f, "notify", args!["child"]).unwrap();
	e.drain().unwrap();
	assert_eq!(
		e.object::<Recorder>(child.id()).unwrap().borrow().notified.as_deref(),
		Some("child")
	);
}

#[test]
fn keyword_arguments_reach_the_handler() {
	let (e, f) = connect(Flavour::Encoded);
	let o = e.register(Recorder::default());
	let reply = o
		.get_proxy(&f)
		.call(&f, "greet", Args::new().kwarg("name", "courier"))
		.unwrap();
	e.drain().unwrap();
	f.drain().unwrap();
	assert_eq!(reply.value(), Some(Value::from("hello courier")));
}

#[test]
fn deregistered_target_fails_on_next_drain() {
	let (e, f) = connect(Flavour::Memory);
	let o = e.register(Recorder::default());
	let p = o.get_proxy(&f);
	e.deregister(o.id()).unwrap();

	let reply = p.call(&f, "info", Args::new()).unwrap();
	p.notify(&f, "notify", args!["lost"]).unwrap();
	let report = e.drain().unwrap();
	assert_eq!(report.errors, 2);
	assert!(o.borrow().notified.is_none());

	f.drain().unwrap();
	assert_eq!(reply.error(), Some(Error::StaleReference(o.id())));
}

#[test]
fn surface_mismatches_are_rejected_before_sending() {
	let (e, f) = connect(Flavour::Memory);
	let o = e.register(Recorder::default());
	let p = o.get_proxy(&f);

	assert_eq!(
		p.call(&f, "notify", args!["x"]).unwrap_err(),
		Error::AckMismatch {
			method: "notify".to_owned(),
			acknowledged: false,
		}
	);
	assert_eq!(
		p.method("missing").unwrap_err(),
		Error::NoSuchRemoteMethod {
			id: o.id(),
			method: "missing".to_owned(),
		}
	);
	assert_eq!(e.drain().unwrap().calls, 0);
}

#[test]
fn notify_on_acknowledged_method_still_tracks_reply() {
	let (e, f) = connect(Flavour::Memory);
	let o = e.register(Recorder::default());
	o.get_proxy(&f).notify(&f, "info", Args::new()).unwrap();
	assert_eq!(f.pending_calls(), 1);

	e.drain().unwrap();
	f.drain().unwrap();
	assert_eq!(f.pending_calls(), 0);
}

//! Per-endpoint table of locally owned remote objects.

use std::any::Any;
use std::cell::{Ref, RefCell, RefMut};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use crate::endpoint::{CallContext, Endpoint};
use crate::error::{Error, Result};
use crate::id::{EndpointToken, ProxyId};
use crate::proxy::RemoteProxy;
use crate::surface::{Remote, Surface};
use crate::value::{Args, ObjectRef, Value};

/// Type-erased dispatch into a registered object.
pub(crate) trait AnyRemote {
	fn surface(&self) -> &Surface;

	fn dispatch(&self, id: ProxyId, method: &str, args: Args, ctx: &CallContext<'_>) -> Result<Value>;
}

impl<T: Remote> AnyRemote for RefCell<T> {
	fn surface(&self) -> &Surface {
		T::methods().surface()
	}

	fn dispatch(&self, id: ProxyId, method: &str, args: Args, ctx: &CallContext<'_>) -> Result<Value> {
		let handler = T::methods().handler(method).ok_or_else(|| Error::NoSuchRemoteMethod {
			id,
			method: method.to_owned(),
		})?;
		let mut object = self.try_borrow_mut().map_err(|_| Error::Busy(id))?;
		handler(&mut object, args, ctx)
	}
}

struct Entry {
	remote: Rc<dyn AnyRemote>,
	any: Rc<dyn Any>,
}

/// Objects keyed by identity, plus every identity ever removed.
#[derive(Default)]
pub(crate) struct Registry {
	objects: HashMap<ProxyId, Entry>,
	retired: HashSet<ProxyId>,
}

impl Registry {
	/// Returns true if `id` is registered or was registered before.
	pub(crate) fn is_known(&self, id: ProxyId) -> bool {
		self.objects.contains_key(&id) || self.retired.contains(&id)
	}

	pub(crate) fn put<T: Remote>(&mut self, id: ProxyId, object: Rc<RefCell<T>>) {
		let remote: Rc<dyn AnyRemote> = object.clone();
		let any: Rc<dyn Any> = object;
		self.objects.insert(id, Entry { remote, any });
	}

	pub(crate) fn remove(&mut self, id: ProxyId) -> Result<()> {
		if self.objects.remove(&id).is_none() {
			return Err(Error::UnknownIdentity(id));
		}
		self.retired.insert(id);
		Ok(())
	}

	pub(crate) fn lookup(&self, id: ProxyId) -> Result<Rc<dyn AnyRemote>> {
		match self.objects.get(&id) {
			Some(entry) => Ok(Rc::clone(&entry.remote)),
			None if self.retired.contains(&id) => Err(Error::StaleReference(id)),
			None => Err(Error::UnknownIdentity(id)),
		}
	}

	pub(crate) fn downcast<T: Remote>(&self, id: ProxyId) -> Option<Rc<RefCell<T>>> {
		let entry = self.objects.get(&id)?;
		Rc::clone(&entry.any).downcast::<RefCell<T>>().ok()
	}

	pub(crate) fn surface_of(&self, id: ProxyId) -> Option<Surface> {
		self.objects.get(&id).map(|entry| entry.remote.surface().clone())
	}

	pub(crate) fn contains(&self, id: ProxyId) -> bool {
		self.objects.contains_key(&id)
	}

	pub(crate) fn len(&self) -> usize {
		self.objects.len()
	}
}

/// Handle to an object registered with an [`Endpoint`].
///
/// The handle shares the object with the endpoint; mutations made by
/// dispatched calls are visible through [`Registered::borrow`].
pub struct Registered<T> {
	id: ProxyId,
	owner: EndpointToken,
	object: Rc<RefCell<T>>,
}

impl<T> Clone for Registered<T> {
	fn clone(&self) -> Self {
		Self {
			id: self.id,
			owner: self.owner,
			object: Rc::clone(&self.object),
		}
	}
}

impl<T> fmt::Debug for Registered<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Registered")
			.field("id", &self.id)
			.field("owner", &self.owner)
			.finish_non_exhaustive()
	}
}

impl<T: Remote> Registered<T> {
	pub(crate) fn new(id: ProxyId, owner: EndpointToken, object: Rc<RefCell<T>>) -> Self {
		Self { id, owner, object }
	}

	/// Identity minted at registration.
	pub fn id(&self) -> ProxyId {
		self.id
	}

	/// Token of the owning endpoint.
	pub fn owner(&self) -> EndpointToken {
		self.owner
	}

	/// The type's callable surface.
	pub fn surface(&self) -> &Surface {
		T::methods().surface()
	}

	/// Borrows the object.
	///
	/// # Panics
	///
	/// Panics if the object is mutably borrowed, e.g. from inside one of its
	/// own handlers.
	pub fn borrow(&self) -> Ref<'_, T> {
		self.object.borrow()
	}

	/// Mutably borrows the object.
	///
	/// # Panics
	///
	/// Panics if the object is already borrowed.
	pub fn borrow_mut(&self) -> RefMut<'_, T> {
		self.object.borrow_mut()
	}

	/// Returns a proxy for calling this object from `peer`.
	///
	/// `peer` must be the endpoint at the other end of the owner's channel.
	pub fn get_proxy(&self, peer: &Endpoint) -> RemoteProxy {
		self.proxy_via(peer.token())
	}

	/// Returns a proxy for the endpoint whose token is `route`.
	///
	/// Useful when the peer endpoint lives on another thread or process and
	/// only its token is at hand.
	pub fn proxy_via(&self, route: EndpointToken) -> RemoteProxy {
		RemoteProxy::new(self.id, route, self.surface().clone())
	}

	/// Local reference suitable as a call argument or result.
	pub fn object_ref(&self) -> ObjectRef {
		ObjectRef::new(self.id, self.owner, self.surface().clone())
	}

	/// Returns true if both handles share one object.
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.object, &other.object)
	}
}

impl<T: Remote> From<&Registered<T>> for Value {
	fn from(object: &Registered<T>) -> Self {
		Self::Object(object.object_ref())
	}
}

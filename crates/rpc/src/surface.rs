//! Per-type callable surfaces and dispatch tables.
//!
//! A type becomes remotely callable by implementing [`Remote`] and returning a
//! [`MethodTable`] built once, usually in a `static LazyLock`. The table's
//! [`Surface`] is shared by every instance of the type and travels with every
//! proxy derived from them.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::endpoint::CallContext;
use crate::error::Result;
use crate::value::{Args, Value};

/// Descriptor for one remotely callable method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodSpec {
	/// Whether the method produces a response.
	pub acknowledged: bool,
}

/// Ordered mapping from method name to [`MethodSpec`].
///
/// Cloning shares the underlying map.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Surface {
	methods: Arc<IndexMap<String, MethodSpec>>,
}

impl Surface {
	/// Looks up a method descriptor.
	pub fn get(&self, name: &str) -> Option<MethodSpec> {
		self.methods.get(name).copied()
	}

	/// Returns true if `name` is part of the surface.
	pub fn contains(&self, name: &str) -> bool {
		self.methods.contains_key(name)
	}

	/// Number of methods.
	pub fn len(&self) -> usize {
		self.methods.len()
	}

	/// Returns true if no method is callable.
	pub fn is_empty(&self) -> bool {
		self.methods.is_empty()
	}

	/// Iterates methods in declaration order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, MethodSpec)> {
		self.methods.iter().map(|(name, spec)| (name.as_str(), *spec))
	}

	/// Returns true if both surfaces share one allocation.
	pub fn shares(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.methods, &other.methods)
	}
}

impl PartialEq for Surface {
	fn eq(&self, other: &Self) -> bool {
		self.shares(other) || self.methods == other.methods
	}
}

impl Eq for Surface {}

/// Handler invoked for one dispatched call.
pub type Handler<T> = fn(&mut T, Args, &CallContext<'_>) -> Result<Value>;

/// Surface plus handlers for one remotely callable type.
pub struct MethodTable<T> {
	surface: Surface,
	handlers: Vec<Handler<T>>,
}

impl<T> MethodTable<T> {
	/// Starts a table declaration.
	pub fn builder() -> MethodTableBuilder<T> {
		MethodTableBuilder {
			methods: IndexMap::new(),
			handlers: Vec::new(),
		}
	}

	/// Returns the shared surface.
	pub fn surface(&self) -> &Surface {
		&self.surface
	}

	/// Looks up the handler for `name`.
	pub fn handler(&self, name: &str) -> Option<Handler<T>> {
		self.surface.methods.get_index_of(name).map(|index| self.handlers[index])
	}
}

impl<T> std::fmt::Debug for MethodTable<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MethodTable").field("surface", &self.surface).finish()
	}
}

/// Declares the methods of a [`MethodTable`].
pub struct MethodTableBuilder<T> {
	methods: IndexMap<String, MethodSpec>,
	handlers: Vec<Handler<T>>,
}

impl<T> MethodTableBuilder<T> {
	/// Declares an acknowledged method.
	pub fn acknowledged(self, name: &str, handler: Handler<T>) -> Self {
		self.method(name, true, handler)
	}

	/// Declares a fire-and-forget method.
	pub fn fire_and_forget(self, name: &str, handler: Handler<T>) -> Self {
		self.method(name, false, handler)
	}

	/// Declares a method; a repeated name replaces the earlier handler.
	pub fn method(mut self, name: &str, acknowledged: bool, handler: Handler<T>) -> Self {
		let (index, previous) = self.methods.insert_full(name.to_owned(), MethodSpec { acknowledged });
		match previous {
			Some(_) => self.handlers[index] = handler,
			None => self.handlers.push(handler),
		}
		self
	}

	/// Freezes the table.
	pub fn build(self) -> MethodTable<T> {
		MethodTable {
			surface: Surface {
				methods: Arc::new(self.methods),
			},
			handlers: self.handlers,
		}
	}
}

/// A type whose instances can be registered with an [`crate::Endpoint`].
///
/// ```
/// use std::sync::LazyLock;
///
/// use courier_rpc::{MethodTable, Remote, Value};
///
/// #[derive(Default)]
/// struct Counter(i64);
///
/// impl Remote for Counter {
/// 	fn methods() -> &'static MethodTable<Self> {
/// 		static TABLE: LazyLock<MethodTable<Counter>> = LazyLock::new(|| {
/// 			MethodTable::<Counter>::builder()
/// 				.fire_and_forget("bump", |c, _, _| {
/// 					c.0 += 1;
/// 					Ok(Value::Null)
/// 				})
/// 				.acknowledged("get", |c, _, _| Ok(Value::Int(c.0)))
/// 				.build()
/// 		});
/// 		&TABLE
/// 	}
/// }
///
/// assert!(Counter::methods().surface().get("get").unwrap().acknowledged);
/// ```
pub trait Remote: Sized + 'static {
	/// Returns the type's method table.
	fn methods() -> &'static MethodTable<Self>;
}

//! Dynamic call payloads.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::id::{EndpointToken, ProxyId};
use crate::proxy::RemoteProxy;
use crate::surface::Surface;

/// A value carried in call arguments and results.
///
/// Primitive and composite variants travel by value. [`Value::Object`] names
/// an object owned by a local endpoint; it is rewritten into a
/// [`Value::Proxy`] before it leaves that endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum Value {
	/// Absence of a value.
	#[default]
	Null,
	/// Boolean.
	Bool(bool),
	/// Signed integer.
	Int(i64),
	/// Floating point number.
	Float(f64),
	/// UTF-8 string.
	Str(String),
	/// Ordered list.
	List(Vec<Value>),
	/// Insertion-ordered map.
	Map(IndexMap<String, Value>),
	/// Reference to an object owned across the channel.
	Proxy(RemoteProxy),
	/// Reference to an object owned by a local endpoint.
	Object(ObjectRef),
}

impl Value {
	/// Builds a map value from key/value pairs.
	pub fn map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
	where
		K: Into<String>,
		V: Into<Value>,
	{
		Self::Map(entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
	}

	/// Returns true for [`Value::Null`].
	pub fn is_null(&self) -> bool {
		matches!(self, Self::Null)
	}

	/// Returns the boolean, if this is one.
	pub fn as_bool(&self) -> Option<bool> {
		match self {
			Self::Bool(b) => Some(*b),
			_ => None,
		}
	}

	/// Returns the integer, if this is one.
	pub fn as_int(&self) -> Option<i64> {
		match self {
			Self::Int(i) => Some(*i),
			_ => None,
		}
	}

	/// Returns the number as a float, accepting integers.
	pub fn as_float(&self) -> Option<f64> {
		match self {
			Self::Float(f) => Some(*f),
			Self::Int(i) => Some(*i as f64),
			_ => None,
		}
	}

	/// Returns the string, if this is one.
	pub fn as_str(&self) -> Option<&str> {
		match self {
			Self::Str(s) => Some(s),
			_ => None,
		}
	}

	/// Returns the list items, if this is a list.
	pub fn as_list(&self) -> Option<&[Value]> {
		match self {
			Self::List(items) => Some(items),
			_ => None,
		}
	}

	/// Returns the map entries, if this is a map.
	pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
		match self {
			Self::Map(entries) => Some(entries),
			_ => None,
		}
	}

	/// Looks up `key` in a map value.
	pub fn get(&self, key: &str) -> Option<&Value> {
		self.as_map().and_then(|entries| entries.get(key))
	}

	/// Returns the proxy, if this is one.
	pub fn as_proxy(&self) -> Option<&RemoteProxy> {
		match self {
			Self::Proxy(proxy) => Some(proxy),
			_ => None,
		}
	}

	/// Returns the local object reference, if this is one.
	pub fn as_object(&self) -> Option<&ObjectRef> {
		match self {
			Self::Object(object) => Some(object),
			_ => None,
		}
	}
}

impl From<()> for Value {
	fn from((): ()) -> Self {
		Self::Null
	}
}

impl From<bool> for Value {
	fn from(b: bool) -> Self {
		Self::Bool(b)
	}
}

impl From<i64> for Value {
	fn from(i: i64) -> Self {
		Self::Int(i)
	}
}

impl From<i32> for Value {
	fn from(i: i32) -> Self {
		Self::Int(i64::from(i))
	}
}

impl From<u32> for Value {
	fn from(i: u32) -> Self {
		Self::Int(i64::from(i))
	}
}

impl From<u64> for Value {
	fn from(i: u64) -> Self {
		Self::Int(i64::try_from(i).unwrap_or(i64::MAX))
	}
}

impl From<usize> for Value {
	fn from(i: usize) -> Self {
		Self::Int(i64::try_from(i).unwrap_or(i64::MAX))
	}
}

impl From<f64> for Value {
	fn from(f: f64) -> Self {
		Self::Float(f)
	}
}

impl From<&str> for Value {
	fn from(s: &str) -> Self {
		Self::Str(s.to_owned())
	}
}

impl From<String> for Value {
	fn from(s: String) -> Self {
		Self::Str(s)
	}
}

impl<T: Into<Value>> From<Vec<T>> for Value {
	fn from(items: Vec<T>) -> Self {
		Self::List(items.into_iter().map(Into::into).collect())
	}
}

impl From<IndexMap<String, Value>> for Value {
	fn from(entries: IndexMap<String, Value>) -> Self {
		Self::Map(entries)
	}
}

impl From<RemoteProxy> for Value {
	fn from(proxy: RemoteProxy) -> Self {
		Self::Proxy(proxy)
	}
}

impl From<&RemoteProxy> for Value {
	fn from(proxy: &RemoteProxy) -> Self {
		Self::Proxy(proxy.clone())
	}
}

impl From<ObjectRef> for Value {
	fn from(object: ObjectRef) -> Self {
		Self::Object(object)
	}
}

impl From<serde_json::Value> for Value {
	fn from(json: serde_json::Value) -> Self {
		use serde_json::Value as Json;

		match json {
			Json::Null => Self::Null,
			Json::Bool(b) => Self::Bool(b),
			Json::Number(n) => match n.as_i64() {
				Some(i) => Self::Int(i),
				None => n.as_f64().map_or(Self::Null, Self::Float),
			},
			Json::String(s) => Self::Str(s),
			Json::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
			Json::Object(entries) => Self::Map(entries.into_iter().map(|(k, v)| (k, Self::from(v))).collect()),
		}
	}
}

/// Reference to an object registered with a local endpoint.
///
/// Equality compares identity and owning endpoint only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectRef {
	id: ProxyId,
	owner: EndpointToken,
	surface: Surface,
}

impl ObjectRef {
	pub(crate) fn new(id: ProxyId, owner: EndpointToken, surface: Surface) -> Self {
		Self { id, owner, surface }
	}

	/// Returns the object's identity.
	pub fn id(&self) -> ProxyId {
		self.id
	}

	/// Returns the token of the endpoint owning the object.
	pub fn owner(&self) -> EndpointToken {
		self.owner
	}

	/// Returns the object's callable surface.
	pub fn surface(&self) -> &Surface {
		&self.surface
	}

	pub(crate) fn into_proxy(self, route: EndpointToken) -> RemoteProxy {
		RemoteProxy::new(self.id, route, self.surface)
	}
}

impl PartialEq for ObjectRef {
	fn eq(&self, other: &Self) -> bool {
		self.id == other.id && self.owner == other.owner
	}
}

impl Eq for ObjectRef {}

/// Positional and keyword arguments of one call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
	/// Positional arguments in call order.
	pub positional: Vec<Value>,
	/// Keyword arguments in insertion order.
	pub keywords: IndexMap<String, Value>,
}

impl Args {
	/// Creates empty arguments.
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends a positional argument.
	pub fn arg(mut self, value: impl Into<Value>) -> Self {
		self.positional.push(value.into());
		self
	}

	/// Sets a keyword argument.
	pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
		self.keywords.insert(name.into(), value.into());
		self
	}

	/// Returns the number of positional arguments.
	pub fn len(&self) -> usize {
		self.positional.len()
	}

	/// Returns true when there are no positional or keyword arguments.
	pub fn is_empty(&self) -> bool {
		self.positional.is_empty() && self.keywords.is_empty()
	}

	/// Borrows positional argument `index`.
	pub fn get(&self, index: usize) -> Option<&Value> {
		self.positional.get(index)
	}

	/// Borrows keyword argument `name`.
	pub fn keyword(&self, name: &str) -> Option<&Value> {
		self.keywords.get(name)
	}

	/// Moves positional argument `index` out, leaving [`Value::Null`].
	///
	/// # Errors
	///
	/// Returns [`Error::InvalidArgument`] when the argument is missing.
	pub fn take(&mut self, index: usize) -> Result<Value> {
		self.positional
			.get_mut(index)
			.map(std::mem::take)
			.ok_or_else(|| Error::InvalidArgument(format!("missing positional argument {index}")))
	}
}

impl From<Vec<Value>> for Args {
	fn from(positional: Vec<Value>) -> Self {
		Self {
			positional,
			keywords: IndexMap::new(),
		}
	}
}

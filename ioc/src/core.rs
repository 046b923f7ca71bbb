//! Core data structures shared across the container: type keys, erased
//! instances and the creation chain used for cycle detection.

use crate::error::{Error, Result};
use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A type-erased, shareable bean instance. The concrete value is always the
/// component type itself (`Arc<T>` coerced to `Arc<dyn Any>`).
pub type Instance = Arc<dyn Any + Send + Sync>;

/// A resolved value boxed for transport through the resolver. Holds an
/// `Arc<I>` for scalar resolution, or the declared shape of an injection point.
pub(crate) type Boxed = Box<dyn Any + Send + Sync>;

/// Identifies a type the container can resolve: a concrete component type or
/// an exposed capability (`dyn Trait`).
#[derive(Clone, Copy)]
pub struct TypeKey {
  id: TypeId,
  name: &'static str,
}

impl TypeKey {
  pub fn of<T: ?Sized + Any>() -> Self {
    Self {
      id: TypeId::of::<T>(),
      name: type_name::<T>(),
    }
  }

  pub fn id(&self) -> TypeId {
    self.id
  }

  /// The fully qualified type name, as reported by `std::any::type_name`.
  pub fn name(&self) -> &'static str {
    self.name
  }

  /// The type name stripped of its module path and generic arguments.
  pub fn simple_name(&self) -> &'static str {
    simple_name(self.name)
  }

  /// The type path without generic arguments or a leading `dyn`.
  pub fn path(&self) -> &'static str {
    type_path(self.name)
  }
}

impl PartialEq for TypeKey {
  fn eq(&self, other: &Self) -> bool {
    self.id == other.id
  }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.id.hash(state);
  }
}

impl fmt::Debug for TypeKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "TypeKey({})", self.name)
  }
}

impl fmt::Display for TypeKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name)
  }
}

pub(crate) fn type_path(name: &str) -> &str {
  let name = name.strip_prefix("dyn ").unwrap_or(name);
  match name.find('<') {
    Some(idx) => &name[..idx],
    None => name,
  }
}

pub(crate) fn simple_name(name: &str) -> &str {
  let path = type_path(name);
  match path.rfind("::") {
    Some(idx) => &path[idx + 2..],
    None => path,
  }
}

/// The chain of types currently being created by one resolution call.
///
/// A chain is created for every top-level `get` and threaded through the
/// recursive resolution by the `Injector`. It is dropped when the call returns,
/// so no state survives across unrelated creation chains. Re-entry that
/// bypasses the chain is caught by the registry's per-thread creation stack.
/// Cycles spanning two threads are not detected.
#[derive(Debug, Default)]
pub(crate) struct CreationChain {
  stack: Vec<TypeKey>,
}

impl CreationChain {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  /// Pushes `key` onto the chain, failing if it is already being created.
  pub(crate) fn enter(&mut self, key: TypeKey) -> Result<()> {
    if self.stack.contains(&key) {
      return Err(Error::Circular {
        type_name: key.name().to_string(),
        chain: self.describe(key),
      });
    }
    self.stack.push(key);
    Ok(())
  }

  pub(crate) fn exit(&mut self, key: TypeKey) {
    let popped = self.stack.pop();
    debug_assert_eq!(popped, Some(key), "creation chain popped out of order");
  }

  #[cfg(test)]
  pub(crate) fn depth(&self) -> usize {
    self.stack.len()
  }

  fn describe(&self, key: TypeKey) -> String {
    let mut names: Vec<&str> = self.stack.iter().map(|k| k.simple_name()).collect();
    names.push(key.simple_name());
    names.join(" -> ")
  }
}

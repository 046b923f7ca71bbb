//! Namespace scanning over a type universe.
//!
//! Rust has no runtime type enumeration, so the set of known types is an
//! explicit [`TypeUniverse`]. [`Catalog`] is the in-memory implementation
//! applications populate at startup; it also answers type-presence queries
//! for conditions.

use crate::component::{Component, ComponentType};
use crate::condition::TypePresence;
use crate::core::type_path;
use crate::descriptor::{ComponentDescriptor, Extractor, StereotypeTable};
use tracing::{debug, trace};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeKind {
  Concrete,
  Abstract,
  Interface,
}

/// One type known to a universe.
#[derive(Clone)]
pub struct TypeEntry {
  path: String,
  kind: TypeKind,
  component: Option<ComponentType>,
}

impl TypeEntry {
  pub fn new(path: impl Into<String>, kind: TypeKind) -> Self {
    Self {
      path: path.into(),
      kind,
      component: None,
    }
  }

  /// A concrete entry carrying the component's manifest.
  pub fn component(&self) -> Option<&ComponentType> {
    self.component.as_ref()
  }

  pub fn path(&self) -> &str {
    &self.path
  }

  pub fn kind(&self) -> TypeKind {
    self.kind
  }

  /// The module path the type lives in.
  pub fn namespace(&self) -> &str {
    match self.path.rfind("::") {
      Some(idx) => &self.path[..idx],
      None => "",
    }
  }

  /// Whether the type lives under `root`, directly or in a nested module.
  /// The empty root contains everything.
  pub fn is_under(&self, root: &str) -> bool {
    let root = root.trim_end_matches("::");
    if root.is_empty() {
      return true;
    }
    let namespace = self.namespace();
    namespace == root
      || namespace
        .strip_prefix(root)
        .map(|rest| rest.starts_with("::"))
        .unwrap_or(false)
  }
}

impl std::fmt::Debug for TypeEntry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("TypeEntry")
      .field("path", &self.path)
      .field("kind", &self.kind)
      .field("component", &self.component.is_some())
      .finish()
  }
}

/// The enumeration contract the scanner runs against.
pub trait TypeUniverse: Send + Sync {
  /// Every entry accepted by `filter`.
  fn enumerate(&self, filter: &dyn Fn(&TypeEntry) -> bool) -> Vec<TypeEntry>;
}

/// An in-memory type universe.
#[derive(Clone, Default)]
pub struct Catalog {
  entries: Vec<TypeEntry>,
}

impl Catalog {
  pub fn new() -> Self {
    Self::default()
  }

  /// Adds a component type, discoverable by scanning its module path.
  pub fn component<T: Component>(mut self) -> Self {
    let component = ComponentType::of::<T>();
    let mut entry = TypeEntry::new(component.type_key().path(), TypeKind::Concrete);
    entry.component = Some(component);
    self.entries.push(entry);
    self
  }

  pub fn abstract_type(self, path: impl Into<String>) -> Self {
    self.with(TypeEntry::new(path, TypeKind::Abstract))
  }

  pub fn interface(self, path: impl Into<String>) -> Self {
    self.with(TypeEntry::new(path, TypeKind::Interface))
  }

  /// A concrete type that is present but not a component.
  pub fn plain(self, path: impl Into<String>) -> Self {
    self.with(TypeEntry::new(path, TypeKind::Concrete))
  }

  fn with(mut self, entry: TypeEntry) -> Self {
    self.insert(entry);
    self
  }

  pub fn insert(&mut self, entry: TypeEntry) {
    self.entries.push(entry);
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

impl TypeUniverse for Catalog {
  fn enumerate(&self, filter: &dyn Fn(&TypeEntry) -> bool) -> Vec<TypeEntry> {
    self.entries.iter().filter(|entry| filter(entry)).cloned().collect()
  }
}

impl TypePresence for Catalog {
  fn is_present(&self, type_name: &str) -> bool {
    let wanted = type_path(type_name);
    self.entries.iter().any(|entry| entry.path() == wanted)
  }
}

/// A component found by a scan, together with its manifest.
#[derive(Clone, Debug)]
pub struct ScannedComponent {
  pub descriptor: ComponentDescriptor,
  pub component: ComponentType,
}

/// Finds component candidates under a root namespace. Stateless; callers
/// decide whether a root was already scanned.
pub struct Scanner<'a> {
  extractor: Extractor<'a>,
}

impl<'a> Scanner<'a> {
  pub fn new(stereotypes: &'a StereotypeTable) -> Self {
    Self {
      extractor: Extractor::new(stereotypes),
    }
  }

  pub fn scan(&self, universe: &dyn TypeUniverse, root: &str) -> Vec<ScannedComponent> {
    let entries = universe.enumerate(&|entry| entry.kind() == TypeKind::Concrete && entry.is_under(root));
    let found: Vec<ScannedComponent> = entries
      .iter()
      .filter_map(|entry| {
        let descriptor = self.extractor.extract(entry);
        if descriptor.is_none() {
          trace!(path = entry.path(), "not a component");
        }
        Some(ScannedComponent {
          descriptor: descriptor?,
          component: entry.component()?.clone(),
        })
      })
      .collect();
    debug!(root, candidates = entries.len(), components = found.len(), "scanned namespace");
    found
  }
}

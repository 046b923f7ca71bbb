//! The definition registry: type and name indexes, primary-based
//! disambiguation, the singleton cache and the pre-destroy table.

use crate::core::{Instance, TypeKey};
use crate::definition::{Definition, DefinitionId};
use crate::error::{Error, Result};
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use std::any::TypeId;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use tracing::debug;

/// The cell a singleton definition's instance is computed into, at most once.
pub(crate) type SingletonCell = Arc<OnceCell<Option<Instance>>>;

/// A created singleton whose definition declares pre-destroy hooks.
pub(crate) struct DestroyEntry {
  pub(crate) definition: Arc<Definition>,
  pub(crate) instance: Instance,
}

/// The central store of definitions.
///
/// All maps support concurrent reads and inserts without external locking.
/// Scalar resolution by type goes through [`Registry::candidate`], which
/// reduces the candidates for a key to exactly one or fails.
#[derive(Default)]
pub struct Registry {
  by_type: DashMap<TypeId, Vec<Arc<Definition>>>,
  by_name: DashMap<String, Arc<Definition>>,
  known: DashSet<DefinitionId>,
  order: RwLock<Vec<Arc<Definition>>>,
  singletons: DashMap<DefinitionId, SingletonCell>,
  destruction: Mutex<Vec<DestroyEntry>>,
  creating: DashMap<ThreadId, Vec<(DefinitionId, TypeKey)>>,
}

impl Registry {
  pub fn new() -> Self {
    Self::default()
  }

  fn remember(&self, definition: &Arc<Definition>) {
    if self.known.insert(definition.id()) {
      self.order.write().push(definition.clone());
    }
  }

  /// Adds `definition` as a candidate for `key`. Registering the identical
  /// definition twice under the same key is a no-op.
  pub fn register_type(&self, key: TypeKey, definition: Arc<Definition>) {
    {
      let mut candidates = self.by_type.entry(key.id()).or_default();
      if candidates.iter().any(|existing| Arc::ptr_eq(existing, &definition)) {
        return;
      }
      candidates.push(definition.clone());
    }
    debug!(key = key.name(), definition = %definition.display_name(), "registered definition by type");
    self.remember(&definition);
  }

  /// Binds `name` to `definition`. Fails if a different definition already
  /// claims the name.
  pub fn register_name(&self, name: &str, definition: Arc<Definition>) -> Result<()> {
    match self.by_name.entry(name.to_string()) {
      Entry::Occupied(existing) => {
        if Arc::ptr_eq(existing.get(), &definition) {
          return Ok(());
        }
        Err(Error::DuplicateName {
          name: name.to_string(),
          existing: existing.get().type_name().to_string(),
          attempted: definition.type_name().to_string(),
        })
      }
      Entry::Vacant(slot) => {
        slot.insert(definition.clone());
        debug!(name, definition = definition.type_name(), "registered definition by name");
        self.remember(&definition);
        Ok(())
      }
    }
  }

  /// Registers `definition` under its name (if any) and every key it exposes.
  pub fn register(&self, definition: Arc<Definition>) -> Result<()> {
    if let Some(name) = definition.name() {
      self.register_name(name, definition.clone())?;
    }
    for key in definition.keys() {
      self.register_type(key, definition.clone());
    }
    Ok(())
  }

  /// Reduces the candidates for `key` to one: the only candidate, or the only
  /// primary one.
  pub fn candidate(&self, key: TypeKey) -> Result<Arc<Definition>> {
    let candidates = self.candidates(key);
    match candidates.len() {
      0 => Err(Error::NoSuchBean {
        type_name: key.name().to_string(),
      }),
      1 => Ok(candidates[0].clone()),
      _ => {
        let primaries: Vec<&Arc<Definition>> =
          candidates.iter().filter(|candidate| candidate.is_primary()).collect();
        match primaries.len() {
          1 => Ok(primaries[0].clone()),
          0 => Err(Error::Ambiguous {
            type_name: key.name().to_string(),
            candidates: candidates.iter().map(|c| c.display_name()).collect(),
          }),
          _ => Err(Error::MultiplePrimary {
            type_name: key.name().to_string(),
            candidates: primaries.iter().map(|c| c.display_name()).collect(),
          }),
        }
      }
    }
  }

  /// Looks up the definition bound to `name`.
  pub fn named(&self, name: &str) -> Result<Arc<Definition>> {
    self
      .by_name
      .get(name)
      .map(|entry| entry.value().clone())
      .ok_or_else(|| Error::NoSuchName {
        name: name.to_string(),
      })
  }

  /// Every distinct definition registered under `key`, in registration order.
  pub fn candidates(&self, key: TypeKey) -> Vec<Arc<Definition>> {
    self
      .by_type
      .get(&key.id())
      .map(|entry| entry.value().clone())
      .unwrap_or_default()
  }

  pub fn contains_type(&self, key: TypeKey) -> bool {
    self
      .by_type
      .get(&key.id())
      .map(|entry| !entry.value().is_empty())
      .unwrap_or(false)
  }

  pub fn contains_name(&self, name: &str) -> bool {
    self.by_name.contains_key(name)
  }

  /// Every distinct definition, in the order it was first registered.
  pub fn definitions(&self) -> Vec<Arc<Definition>> {
    self.order.read().clone()
  }

  pub fn names(&self) -> Vec<String> {
    self.by_name.iter().map(|entry| entry.key().clone()).collect()
  }

  /// How many singleton instances are currently cached.
  pub fn singleton_count(&self) -> usize {
    self
      .singletons
      .iter()
      .filter(|entry| entry.value().get().is_some())
      .count()
  }

  /// The cache cell for a singleton definition. The shard lock is released
  /// before the cell is returned, so initialization may recurse freely.
  pub(crate) fn singleton_cell(&self, id: DefinitionId) -> SingletonCell {
    if let Some(cell) = self.singletons.get(&id) {
      return cell.value().clone();
    }
    self.singletons.entry(id).or_default().value().clone()
  }

  pub(crate) fn register_destruction(&self, definition: Arc<Definition>, instance: Instance) {
    self.destruction.lock().push(DestroyEntry { definition, instance });
  }

  /// Empties the pre-destroy table, returning its entries in creation order.
  pub(crate) fn take_destruction(&self) -> Vec<DestroyEntry> {
    std::mem::take(&mut *self.destruction.lock())
  }

  /// Removes every binding of `definition`, along with any cached instance.
  pub(crate) fn unregister(&self, definition: &Arc<Definition>) {
    if let Some(name) = definition.name() {
      self.by_name.remove_if(name, |_, bound| Arc::ptr_eq(bound, definition));
    }
    for key in definition.keys() {
      if let Some(mut candidates) = self.by_type.get_mut(&key.id()) {
        candidates.retain(|candidate| !Arc::ptr_eq(candidate, definition));
      }
    }
    if self.known.remove(&definition.id()).is_some() {
      self.order.write().retain(|known| known.id() != definition.id());
    }
    self.singletons.remove(&definition.id());
    debug!(definition = %definition.display_name(), "unregistered definition");
  }

  pub(crate) fn clear_singletons(&self) {
    self.singletons.clear();
  }

  /// Marks `definition` as being created by the current thread until the
  /// returned guard drops.
  ///
  /// Unlike the creation chain, this sees every path back into the container,
  /// including `Injector::container`, post-processors and the global
  /// container. Re-entering a definition the thread is still creating fails
  /// instead of blocking on its cache cell.
  pub(crate) fn enter_creation(&self, definition: &Definition) -> Result<CreationGuard<'_>> {
    let thread = thread::current().id();
    let mut stack = self.creating.entry(thread).or_default();
    if stack.iter().any(|(id, _)| *id == definition.id()) {
      let mut names: Vec<String> = stack
        .iter()
        .map(|(_, key)| key.simple_name().to_string())
        .collect();
      names.push(definition.type_key().simple_name().to_string());
      return Err(Error::Circular {
        type_name: definition.type_name().to_string(),
        chain: names.join(" -> "),
      });
    }
    stack.push((definition.id(), definition.type_key()));
    Ok(CreationGuard { registry: self, thread })
  }
}

/// Pops the current thread's innermost in-progress creation on drop.
pub(crate) struct CreationGuard<'r> {
  registry: &'r Registry,
  thread: ThreadId,
}

impl Drop for CreationGuard<'_> {
  fn drop(&mut self) {
    if let Entry::Occupied(mut entry) = self.registry.creating.entry(self.thread) {
      entry.get_mut().pop();
      if entry.get().is_empty() {
        entry.remove();
      }
    }
  }
}

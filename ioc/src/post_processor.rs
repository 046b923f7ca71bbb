//! The post-processor chain: ordered hooks run on every fresh instance.

use crate::container::Container;
use crate::core::Instance;
use crate::definition::{Definition, DefinitionId};
use crate::error::{BoxError, Error, Result};
use parking_lot::RwLock;
use std::any::Any;
use std::sync::Arc;

/// An extension hook invoked after every successful instantiation, once
/// post-construct hooks have run and before the instance is cached or returned.
pub trait PostProcessor: Send + Sync {
  fn process(&self, bean: &Bean<'_>, container: &Container) -> Result<(), BoxError>;
}

impl<F> PostProcessor for F
where
  F: Fn(&Bean<'_>, &Container) -> Result<(), BoxError> + Send + Sync,
{
  fn process(&self, bean: &Bean<'_>, container: &Container) -> Result<(), BoxError> {
    (self)(bean, container)
  }
}

/// A freshly created instance as seen by a post-processor.
pub struct Bean<'a> {
  definition: &'a Definition,
  instance: &'a Instance,
}

impl<'a> Bean<'a> {
  pub(crate) fn new(definition: &'a Definition, instance: &'a Instance) -> Self {
    Self { definition, instance }
  }

  pub fn name(&self) -> Option<&str> {
    self.definition.name()
  }

  pub fn type_name(&self) -> &'static str {
    self.definition.type_name()
  }

  pub fn definition(&self) -> &Definition {
    self.definition
  }

  pub fn instance(&self) -> &Instance {
    self.instance
  }

  pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
    self.instance.downcast_ref::<T>()
  }

  pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
    self.instance.clone().downcast::<T>().ok()
  }
}

struct Entry {
  owner: Option<DefinitionId>,
  processor: Arc<dyn PostProcessor>,
}

/// Append-only, ordered list of post-processors.
///
/// Processors added while an instance is being processed only see instances
/// created afterwards; nothing is replayed.
#[derive(Default)]
pub struct PostProcessorChain {
  entries: RwLock<Vec<Entry>>,
}

impl PostProcessorChain {
  pub fn push(&self, processor: Arc<dyn PostProcessor>) {
    self.entries.write().push(Entry { owner: None, processor });
  }

  pub(crate) fn push_owned(&self, owner: DefinitionId, processor: Arc<dyn PostProcessor>) {
    self.entries.write().push(Entry {
      owner: Some(owner),
      processor,
    });
  }

  /// Drops processors contributed by singleton beans, which are recreated
  /// (and re-appended) on next use after a shutdown.
  pub(crate) fn release_owned(&self) {
    self.entries.write().retain(|entry| entry.owner.is_none());
  }

  pub fn len(&self) -> usize {
    self.entries.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.read().is_empty()
  }

  pub(crate) fn apply(&self, bean: &Bean<'_>, container: &Container) -> Result<()> {
    let processors: Vec<Arc<dyn PostProcessor>> = self
      .entries
      .read()
      .iter()
      .map(|entry| entry.processor.clone())
      .collect();
    for processor in processors {
      processor.process(bean, container).map_err(|source| Error::Instantiation {
        type_name: bean.type_name().to_string(),
        source: format!("post-processor rejected the instance: {}", source).into(),
      })?;
    }
    Ok(())
  }
}

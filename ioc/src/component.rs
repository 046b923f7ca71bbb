//! Statically declared component manifests.
//!
//! A component type implements [`Component`] to describe, once, everything the
//! container would otherwise discover by reflection: its stereotype markers,
//! its injection points and hooks, a registration condition, and for
//! configuration components the beans its methods declare.

use crate::condition::Condition;
use crate::core::TypeKey;
use crate::definition::{Definition, DefinitionBuilder};
use crate::descriptor::{ComponentDescriptor, Marker};
use crate::error::{Error, Result};
use crate::injection::Injector;
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// A type the scanner can discover.
///
/// ```
/// use fibre_context::{Component, Definition, Manifest, Marker};
///
/// struct Clock;
///
/// impl Component for Clock {
///   fn manifest() -> Manifest<Self> {
///     Manifest::new(Definition::of::<Clock>().factory(|_| Ok(Clock))).marker(Marker::service())
///   }
/// }
/// ```
pub trait Component: Any + Send + Sync + Sized {
  fn manifest() -> Manifest<Self>;
}

/// Everything declared about a component type.
pub struct Manifest<T> {
  blueprint: DefinitionBuilder<T>,
  markers: Vec<Marker>,
  condition: Option<Condition>,
  beans: Vec<BeanMethod<T>>,
}

impl<T: Any + Send + Sync> Manifest<T> {
  pub fn new(blueprint: DefinitionBuilder<T>) -> Self {
    Self {
      blueprint,
      markers: Vec::new(),
      condition: None,
      beans: Vec::new(),
    }
  }

  pub fn marker(mut self, marker: Marker) -> Self {
    self.markers.push(marker);
    self
  }

  /// Registers the component only when `condition` matches.
  pub fn when(mut self, condition: Condition) -> Self {
    self.condition = Some(condition);
    self
  }

  /// Declares a bean produced by one of this configuration's methods.
  pub fn bean(mut self, method: BeanMethod<T>) -> Self {
    self.beans.push(method);
    self
  }

  pub fn markers(&self) -> &[Marker] {
    &self.markers
  }

  pub fn into_blueprint(self) -> DefinitionBuilder<T> {
    self.blueprint
  }
}

/// A handle on the configuration instance owning a bean method.
///
/// Resolving it goes through the container, so the configuration is created
/// (once, if a singleton) before the method's factory runs.
pub struct ConfigRef<C> {
  owner: Arc<Definition>,
  _config: PhantomData<fn() -> C>,
}

impl<C> Clone for ConfigRef<C> {
  fn clone(&self) -> Self {
    Self {
      owner: self.owner.clone(),
      _config: PhantomData,
    }
  }
}

impl<C: Any + Send + Sync> ConfigRef<C> {
  pub fn get(&self, injector: &mut Injector<'_>) -> Result<Arc<C>> {
    let instance = injector.instance_of(&self.owner)?.ok_or_else(|| {
      Error::unsatisfied(
        format!("of configuration '{}'", self.owner.display_name()),
        "the configuration produced no instance",
      )
    })?;
    instance.downcast::<C>().map_err(|_| Error::NotAssignable {
      name: self.owner.display_name(),
      actual: self.owner.type_name().to_string(),
      expected: std::any::type_name::<C>().to_string(),
    })
  }
}

type DeclareFn<C> = Box<dyn Fn(ConfigRef<C>) -> Result<Arc<Definition>> + Send + Sync>;

/// A declarative factory method on a configuration component.
///
/// The produced definition is named after the method unless the declaration
/// names it explicitly.
pub struct BeanMethod<C> {
  method: String,
  condition: Option<Condition>,
  declare: DeclareFn<C>,
}

impl<C: Any + Send + Sync> BeanMethod<C> {
  pub fn new<T, F>(method: &str, declare: F) -> Self
  where
    T: Any + Send + Sync,
    F: Fn(ConfigRef<C>) -> DefinitionBuilder<T> + Send + Sync + 'static,
  {
    let default_name = method.to_string();
    Self {
      method: method.to_string(),
      condition: None,
      declare: Box::new(move |config| {
        let builder = declare(config);
        if builder.has_name() {
          builder.build()
        } else {
          builder.name(default_name.clone()).build()
        }
      }),
    }
  }

  /// Produces the bean only when `condition` matches.
  pub fn when(mut self, condition: Condition) -> Self {
    self.condition = Some(condition);
    self
  }

  pub fn method(&self) -> &str {
    &self.method
  }
}

/// A bean method bound to its owner's definition, waiting for its condition.
pub(crate) struct PendingBean {
  pub(crate) method: String,
  pub(crate) condition: Option<Condition>,
  pub(crate) build: Box<dyn FnOnce() -> Result<Arc<Definition>>>,
}

trait ErasedComponent: Send + Sync {
  fn type_key(&self) -> TypeKey;
  fn markers(&self) -> Vec<Marker>;
  fn condition(&self) -> Option<Condition>;
  fn definition(&self, descriptor: &ComponentDescriptor) -> Result<Arc<Definition>>;
  fn declared_beans(&self, owner: &Arc<Definition>) -> Vec<PendingBean>;
}

struct Erased<T>(PhantomData<fn() -> T>);

impl<T: Component> ErasedComponent for Erased<T> {
  fn type_key(&self) -> TypeKey {
    TypeKey::of::<T>()
  }

  fn markers(&self) -> Vec<Marker> {
    T::manifest().markers
  }

  fn condition(&self) -> Option<Condition> {
    T::manifest().condition
  }

  fn definition(&self, descriptor: &ComponentDescriptor) -> Result<Arc<Definition>> {
    T::manifest().blueprint.describe(descriptor).build()
  }

  fn declared_beans(&self, owner: &Arc<Definition>) -> Vec<PendingBean> {
    T::manifest()
      .beans
      .into_iter()
      .map(|bean| {
        let config = ConfigRef::<T> {
          owner: owner.clone(),
          _config: PhantomData,
        };
        let declare = bean.declare;
        PendingBean {
          method: bean.method,
          condition: bean.condition,
          build: Box::new(move || declare(config)),
        }
      })
      .collect()
  }
}

/// A component type with its manifest, erased so heterogeneous components can
/// live in one catalog.
#[derive(Clone)]
pub struct ComponentType {
  inner: Arc<dyn ErasedComponent>,
}

impl ComponentType {
  pub fn of<T: Component>() -> Self {
    Self {
      inner: Arc::new(Erased::<T>(PhantomData)),
    }
  }

  pub fn type_key(&self) -> TypeKey {
    self.inner.type_key()
  }

  pub fn markers(&self) -> Vec<Marker> {
    self.inner.markers()
  }

  pub fn condition(&self) -> Option<Condition> {
    self.inner.condition()
  }

  pub(crate) fn definition(&self, descriptor: &ComponentDescriptor) -> Result<Arc<Definition>> {
    self.inner.definition(descriptor)
  }

  pub(crate) fn declared_beans(&self, owner: &Arc<Definition>) -> Vec<PendingBean> {
    self.inner.declared_beans(owner)
  }
}

impl fmt::Debug for ComponentType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("ComponentType").field(&self.type_key().name()).finish()
  }
}

//! Definitions: the registrable, instantiable unit of the container.

use crate::core::{Boxed, Instance, TypeKey};
use crate::descriptor::ComponentDescriptor;
use crate::error::{BoxError, Error, Result};
use crate::injection::{Args, InjectionPoint, Injector};
use crate::lifecycle::{Creation, Phase};
use crate::post_processor::PostProcessor;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// How many instances a definition produces.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Scope {
  /// One instance, created on first request and cached until shutdown.
  #[default]
  Singleton,
  /// A fresh instance for every request.
  Prototype,
}

/// Identity of a [`Definition`]. Singleton caching is keyed by this, so a
/// definition registered under several keys is created exactly once.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DefinitionId(u64);

impl DefinitionId {
  fn next() -> Self {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    DefinitionId(NEXT.fetch_add(1, Ordering::Relaxed))
  }
}

type Producer =
  Arc<dyn Fn(&mut Injector<'_>, &mut Creation<'_>) -> Result<Option<Instance>> + Send + Sync>;
type CastFn = Arc<dyn Fn(&Instance) -> Option<Boxed> + Send + Sync>;
type ProcessorCast = Arc<dyn Fn(&Instance) -> Option<Arc<dyn PostProcessor>> + Send + Sync>;

/// A named lifecycle callback bound to a definition's instances.
#[derive(Clone)]
pub struct Hook {
  name: String,
  run: Arc<dyn Fn(&Instance) -> Result<(), BoxError> + Send + Sync>,
}

impl Hook {
  pub fn name(&self) -> &str {
    &self.name
  }

  pub(crate) fn invoke(&self, instance: &Instance) -> Result<(), BoxError> {
    (self.run)(instance)
  }
}

impl fmt::Debug for Hook {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("Hook").field(&self.name).finish()
  }
}

/// A lifecycle callback typed on the component it belongs to.
pub(crate) struct TypedHook<T> {
  name: String,
  run: Arc<dyn Fn(&T) -> Result<(), BoxError> + Send + Sync>,
}

impl<T> Clone for TypedHook<T> {
  fn clone(&self) -> Self {
    Self {
      name: self.name.clone(),
      run: self.run.clone(),
    }
  }
}

impl<T: Any + Send + Sync> TypedHook<T> {
  fn erase(self) -> Hook {
    let run = self.run;
    Hook {
      name: self.name,
      run: Arc::new(move |instance: &Instance| {
        let target = instance
          .downcast_ref::<T>()
          .ok_or_else(|| format!("hook bound to '{}' received a foreign instance", std::any::type_name::<T>()))?;
        run(target)
      }),
    }
  }

  /// Rebinds a hook declared on an embedded component onto its owner.
  fn lift<O: Any + Send + Sync>(self, project: fn(&O) -> &T) -> TypedHook<O> {
    let run = self.run;
    TypedHook {
      name: self.name,
      run: Arc::new(move |owner: &O| run(project(owner))),
    }
  }
}

struct FieldInjection<T> {
  point: InjectionPoint,
  apply: Arc<dyn Fn(&mut T, Boxed) -> Result<()> + Send + Sync>,
}

impl<T> Clone for FieldInjection<T> {
  fn clone(&self) -> Self {
    Self {
      point: self.point.clone(),
      apply: self.apply.clone(),
    }
  }
}

/// The registrable unit: a type, how to produce it, and how it is cached.
///
/// Definitions are immutable once built and always shared through `Arc`; the
/// same `Arc<Definition>` may be registered under its own type, every exposed
/// capability, and a name.
pub struct Definition {
  id: DefinitionId,
  type_key: TypeKey,
  name: Option<String>,
  scope: Scope,
  primary: bool,
  lazy: bool,
  stereotype: Option<String>,
  points: Vec<InjectionPoint>,
  post_construct: Vec<Hook>,
  pre_destroy: Vec<Hook>,
  exposures: Vec<(TypeKey, CastFn)>,
  post_processor: Option<ProcessorCast>,
  producer: Producer,
}

impl Definition {
  /// Starts building a definition for `T`.
  pub fn of<T: Any + Send + Sync>() -> DefinitionBuilder<T> {
    DefinitionBuilder::new()
  }

  /// Starts building a singleton definition around an already constructed value.
  pub fn instance<T: Any + Send + Sync>(value: T) -> DefinitionBuilder<T> {
    let mut builder = DefinitionBuilder::new();
    builder.prebuilt = Some(Arc::new(value));
    builder
  }

  pub fn id(&self) -> DefinitionId {
    self.id
  }

  pub fn type_key(&self) -> TypeKey {
    self.type_key
  }

  pub fn type_name(&self) -> &'static str {
    self.type_key.name()
  }

  pub fn name(&self) -> Option<&str> {
    self.name.as_deref()
  }

  /// The name if one was given, the type name otherwise. Used in messages.
  pub fn display_name(&self) -> String {
    match &self.name {
      Some(name) => name.clone(),
      None => self.type_key.name().to_string(),
    }
  }

  pub fn scope(&self) -> Scope {
    self.scope
  }

  pub fn is_primary(&self) -> bool {
    self.primary
  }

  pub fn is_lazy(&self) -> bool {
    self.lazy
  }

  pub fn stereotype(&self) -> Option<&str> {
    self.stereotype.as_deref()
  }

  /// Constructor and field injection points, in declaration order.
  pub fn injection_points(&self) -> &[InjectionPoint] {
    &self.points
  }

  pub fn post_construct_hooks(&self) -> &[Hook] {
    &self.post_construct
  }

  pub fn pre_destroy_hooks(&self) -> &[Hook] {
    &self.pre_destroy
  }

  /// Every key this definition answers to: its own type first, then the
  /// exposed capabilities in declaration order.
  pub fn keys(&self) -> impl Iterator<Item = TypeKey> + '_ {
    self.exposures.iter().map(|(key, _)| *key)
  }

  pub fn exposes(&self, key: TypeKey) -> bool {
    self.exposures.iter().any(|(exposed, _)| *exposed == key)
  }

  pub fn is_post_processor(&self) -> bool {
    self.post_processor.is_some()
  }

  pub(crate) fn cast(&self, key: TypeId, instance: &Instance) -> Option<Boxed> {
    self
      .exposures
      .iter()
      .find(|(exposed, _)| exposed.id() == key)
      .and_then(|(_, cast)| cast(instance))
  }

  pub(crate) fn as_post_processor(&self, instance: &Instance) -> Option<Arc<dyn PostProcessor>> {
    self.post_processor.as_ref().and_then(|cast| cast(instance))
  }

  pub(crate) fn produce(
    &self,
    injector: &mut Injector<'_>,
    creation: &mut Creation<'_>,
  ) -> Result<Option<Instance>> {
    (self.producer)(injector, creation)
  }
}

impl fmt::Debug for Definition {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Definition")
      .field("id", &self.id)
      .field("type", &self.type_key.name())
      .field("name", &self.name)
      .field("scope", &self.scope)
      .field("primary", &self.primary)
      .field("lazy", &self.lazy)
      .field("keys", &self.keys().map(|k| k.name()).collect::<Vec<_>>())
      .finish()
  }
}

type Constructor<T> = Arc<dyn Fn(&mut Args) -> Result<Option<T>> + Send + Sync>;
type Factory<T> = Arc<dyn Fn(&mut Injector<'_>) -> Result<Option<T>> + Send + Sync>;

/// Declares how a component is built: its injection manifest, lifecycle hooks
/// and exposed capabilities.
///
/// ```
/// use fibre_context::{Container, Definition, InjectionPoint};
/// use std::sync::Arc;
///
/// struct Clock;
/// struct Scheduler { clock: Arc<Clock> }
///
/// let container = Container::new();
/// container.register(Definition::of::<Clock>().factory(|_| Ok(Clock)).build().unwrap()).unwrap();
/// container
///   .register(
///     Definition::of::<Scheduler>()
///       .inject(InjectionPoint::required::<Clock>())
///       .constructor(|args| Ok(Scheduler { clock: args.take()? }))
///       .build()
///       .unwrap(),
///   )
///   .unwrap();
///
/// let scheduler = container.get::<Scheduler>().unwrap();
/// assert!(Arc::ptr_eq(&scheduler.clock, &container.get::<Clock>().unwrap()));
/// ```
pub struct DefinitionBuilder<T> {
  name: Option<String>,
  scope: Scope,
  primary: bool,
  lazy: bool,
  stereotype: Option<String>,
  points: Vec<InjectionPoint>,
  constructor: Option<Constructor<T>>,
  factory: Option<Factory<T>>,
  prebuilt: Option<Arc<T>>,
  fields: Vec<FieldInjection<T>>,
  post_construct: Vec<TypedHook<T>>,
  pre_destroy: Vec<TypedHook<T>>,
  inherited_post_construct: Vec<TypedHook<T>>,
  inherited_pre_destroy: Vec<TypedHook<T>>,
  exposures: Vec<(TypeKey, CastFn)>,
  post_processor: Option<ProcessorCast>,
}

impl<T: Any + Send + Sync> DefinitionBuilder<T> {
  fn new() -> Self {
    Self {
      name: None,
      scope: Scope::Singleton,
      primary: false,
      lazy: false,
      stereotype: None,
      points: Vec::new(),
      constructor: None,
      factory: None,
      prebuilt: None,
      fields: Vec::new(),
      post_construct: Vec::new(),
      pre_destroy: Vec::new(),
      inherited_post_construct: Vec::new(),
      inherited_pre_destroy: Vec::new(),
      exposures: vec![(TypeKey::of::<T>(), concrete_cast::<T>())],
      post_processor: None,
    }
  }

  pub fn name(mut self, name: impl Into<String>) -> Self {
    self.name = Some(name.into());
    self
  }

  pub fn scope(mut self, scope: Scope) -> Self {
    self.scope = scope;
    self
  }

  pub fn prototype(self) -> Self {
    self.scope(Scope::Prototype)
  }

  pub fn primary(mut self, primary: bool) -> Self {
    self.primary = primary;
    self
  }

  pub fn lazy(mut self, lazy: bool) -> Self {
    self.lazy = lazy;
    self
  }

  /// Declares a constructor injection point. Resolved values are handed to
  /// the constructor through [`Args`] in declaration order.
  pub fn inject(mut self, point: InjectionPoint) -> Self {
    self.points.push(point);
    self
  }

  /// Sets the constructor consuming the declared injection points.
  pub fn constructor<F>(mut self, constructor: F) -> Self
  where
    F: Fn(&mut Args) -> Result<T> + Send + Sync + 'static,
  {
    self.constructor = Some(Arc::new(move |args: &mut Args| constructor(args).map(Some)));
    self
  }

  /// Sets a factory that resolves its own dependencies through the injector.
  pub fn factory<F>(mut self, factory: F) -> Self
  where
    F: Fn(&mut Injector<'_>) -> Result<T> + Send + Sync + 'static,
  {
    self.factory = Some(Arc::new(move |injector: &mut Injector<'_>| factory(injector).map(Some)));
    self
  }

  /// Sets a factory that may legitimately produce nothing. Injecting an absent
  /// bean into a required point is an unsatisfied-dependency error.
  pub fn optional_factory<F>(mut self, factory: F) -> Self
  where
    F: Fn(&mut Injector<'_>) -> Result<Option<T>> + Send + Sync + 'static,
  {
    self.factory = Some(Arc::new(factory));
    self
  }

  /// Declares a field injected after construction, before post-construct hooks.
  pub fn field<V, F>(mut self, point: InjectionPoint, setter: F) -> Self
  where
    V: Any + Send + Sync,
    F: Fn(&mut T, V) + Send + Sync + 'static,
  {
    let description = point.description().to_string();
    self.fields.push(FieldInjection {
      point,
      apply: Arc::new(move |target: &mut T, value: Boxed| {
        let value = value.downcast::<V>().map_err(|_| {
          Error::unsatisfied(
            description.clone(),
            format!("field setter expects '{}'", std::any::type_name::<V>()),
          )
        })?;
        setter(target, *value);
        Ok(())
      }),
    });
    self
  }

  pub fn post_construct<F>(mut self, name: &str, hook: F) -> Self
  where
    F: Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static,
  {
    self.post_construct.push(TypedHook {
      name: name.to_string(),
      run: Arc::new(hook),
    });
    self
  }

  pub fn pre_destroy<F>(mut self, name: &str, hook: F) -> Self
  where
    F: Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static,
  {
    self.pre_destroy.push(TypedHook {
      name: name.to_string(),
      run: Arc::new(hook),
    });
    self
  }

  /// Inherits the lifecycle hooks of an embedded component. They run after the
  /// owner's own hooks, in the order the embedded component declares them.
  pub fn embeds<B: crate::component::Component>(mut self, project: fn(&T) -> &B) -> Self {
    let base = B::manifest().into_blueprint();
    let own = base.post_construct.into_iter().chain(base.inherited_post_construct);
    self
      .inherited_post_construct
      .extend(own.map(|hook| hook.lift(project)));
    let own = base.pre_destroy.into_iter().chain(base.inherited_pre_destroy);
    self
      .inherited_pre_destroy
      .extend(own.map(|hook| hook.lift(project)));
    self
  }

  /// Exposes the component under a capability, typically a trait object.
  ///
  /// The upcast is usually the identity closure: `.provides::<dyn Service>(|c| c)`.
  pub fn provides<I>(mut self, upcast: fn(Arc<T>) -> Arc<I>) -> Self
  where
    I: ?Sized + Any + Send + Sync,
  {
    let key = TypeKey::of::<I>();
    if !self.exposures.iter().any(|(exposed, _)| *exposed == key) {
      let cast: CastFn = Arc::new(move |instance: &Instance| {
        instance
          .clone()
          .downcast::<T>()
          .ok()
          .map(|typed| Box::new(upcast(typed)) as Boxed)
      });
      self.exposures.push((key, cast));
    }
    self
  }

  /// Marks the component as a post-processor. Singleton instances join the
  /// container's post-processor chain as soon as they are created.
  pub fn post_processor(mut self) -> Self
  where
    T: PostProcessor,
  {
    self.post_processor = Some(Arc::new(|instance: &Instance| {
      instance
        .clone()
        .downcast::<T>()
        .ok()
        .map(|typed| typed as Arc<dyn PostProcessor>)
    }));
    self.provides::<dyn PostProcessor>(|typed| typed)
  }

  /// Applies the scanned descriptor: name, scope, primary, lazy and stereotype.
  pub fn describe(mut self, descriptor: &ComponentDescriptor) -> Self {
    self.name = Some(descriptor.name.clone());
    self.scope = descriptor.scope;
    self.primary = descriptor.primary;
    self.lazy = descriptor.lazy;
    self.stereotype = Some(descriptor.stereotype.clone());
    self
  }

  pub(crate) fn has_name(&self) -> bool {
    self.name.is_some()
  }

  /// Validates the declaration and produces the shareable definition.
  ///
  /// Fails when pre-destroy hooks are declared on a non-singleton scope, or
  /// when no way to produce the instance was given.
  pub fn build(self) -> Result<Arc<Definition>> {
    let type_key = TypeKey::of::<T>();
    let has_destroy_hooks = !self.pre_destroy.is_empty() || !self.inherited_pre_destroy.is_empty();
    if has_destroy_hooks && self.scope != Scope::Singleton {
      return Err(Error::InvalidLifecycle {
        type_name: type_key.name().to_string(),
        reason: format!(
          "pre-destroy hooks are only supported on singletons, scope is {:?}",
          self.scope
        ),
      });
    }

    let fields = self.fields;
    let mut points = self.points.clone();
    points.extend(fields.iter().map(|field| field.point.clone()));

    let producer: Producer = if let Some(prebuilt) = self.prebuilt {
      Arc::new(move |_: &mut Injector<'_>, creation: &mut Creation<'_>| {
        creation.advance(Phase::Constructing);
        Ok(Some(prebuilt.clone() as Instance))
      })
    } else if let Some(constructor) = self.constructor {
      let ctor_points = self.points;
      Arc::new(move |injector: &mut Injector<'_>, creation: &mut Creation<'_>| {
        creation.advance(Phase::Constructing);
        let mut args = Args::new(type_key.name());
        for point in &ctor_points {
          args.push(point, injector.resolve_point(point)?);
        }
        let Some(mut value) = constructor(&mut args)? else {
          return Ok(None);
        };
        inject_fields(&fields, &mut value, injector, creation)?;
        Ok(Some(Arc::new(value) as Instance))
      })
    } else if let Some(factory) = self.factory {
      Arc::new(move |injector: &mut Injector<'_>, creation: &mut Creation<'_>| {
        creation.advance(Phase::Constructing);
        let Some(mut value) = factory(injector)? else {
          return Ok(None);
        };
        inject_fields(&fields, &mut value, injector, creation)?;
        Ok(Some(Arc::new(value) as Instance))
      })
    } else {
      return Err(Error::IncompleteDefinition {
        type_name: type_key.name().to_string(),
      });
    };

    let post_construct = self
      .post_construct
      .into_iter()
      .chain(self.inherited_post_construct)
      .map(TypedHook::erase)
      .collect();
    let pre_destroy = self
      .pre_destroy
      .into_iter()
      .chain(self.inherited_pre_destroy)
      .map(TypedHook::erase)
      .collect();

    Ok(Arc::new(Definition {
      id: DefinitionId::next(),
      type_key,
      name: self.name,
      scope: self.scope,
      primary: self.primary,
      lazy: self.lazy,
      stereotype: self.stereotype,
      points,
      post_construct,
      pre_destroy,
      exposures: self.exposures,
      post_processor: self.post_processor,
      producer,
    }))
  }
}

fn concrete_cast<T: Any + Send + Sync>() -> CastFn {
  Arc::new(|instance: &Instance| {
    instance
      .clone()
      .downcast::<T>()
      .ok()
      .map(|typed| Box::new(typed) as Boxed)
  })
}

fn inject_fields<T>(
  fields: &[FieldInjection<T>],
  target: &mut T,
  injector: &mut Injector<'_>,
  creation: &mut Creation<'_>,
) -> Result<()> {
  if fields.is_empty() {
    return Ok(());
  }
  creation.advance(Phase::InjectingFields);
  for field in fields {
    let value = injector.resolve_point(&field.point)?;
    (field.apply)(target, value)?;
  }
  Ok(())
}

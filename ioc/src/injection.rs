//! Injection points, the values they resolve to, and the `Injector` handed to
//! factories.

use crate::container::Container;
use crate::core::{Boxed, CreationChain, Instance, TypeKey};
use crate::definition::Definition;
use crate::error::{Error, Result};
use std::any::{type_name, Any};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

/// The aggregate shape requested by a collection injection point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CollectionKind {
  /// `Vec<Arc<I>>`, in first-discovery order.
  Sequence,
  /// [`BeanSet<I>`], deduplicated by instance identity.
  Set,
}

/// What the resolver found for a point, before it is shaped into the declared type.
pub(crate) enum Gathered {
  One(Option<Boxed>),
  Many(Vec<Boxed>),
}

type Shape = Arc<dyn Fn(Gathered) -> Boxed + Send + Sync>;

/// One constructor parameter or field that needs a resolved value.
///
/// Points are declared once per definition and reused for every instantiation.
#[derive(Clone)]
pub struct InjectionPoint {
  declared_type: &'static str,
  element: TypeKey,
  raw_type: TypeKey,
  collection: Option<CollectionKind>,
  optional: bool,
  wraps_optional: bool,
  qualifier: Option<String>,
  description: String,
  shape: Shape,
}

impl InjectionPoint {
  /// A point declared as `Arc<I>`.
  pub fn required<I: ?Sized + Any + Send + Sync>() -> Self {
    Self::new::<I, Arc<I>>(None, false, Arc::new(|gathered| match gathered {
      Gathered::One(Some(value)) => value,
      Gathered::One(None) => Box::new(()),
      Gathered::Many(mut values) => values.pop().unwrap_or_else(|| Box::new(())),
    }))
  }

  /// A point declared as `Option<Arc<I>>`. Resolves to `None` instead of failing.
  pub fn optional<I: ?Sized + Any + Send + Sync>() -> Self {
    let mut point = Self::new::<I, Option<Arc<I>>>(None, true, Arc::new(|gathered| {
      let value = match gathered {
        Gathered::One(value) => value.and_then(unbox::<I>),
        Gathered::Many(values) => values.into_iter().next().and_then(unbox::<I>),
      };
      Box::new(value)
    }));
    point.optional = true;
    point
  }

  /// A point declared as `Vec<Arc<I>>`: every bean exposing `I`.
  pub fn all<I: ?Sized + Any + Send + Sync>() -> Self {
    Self::new::<I, Vec<Arc<I>>>(
      Some(CollectionKind::Sequence),
      false,
      Arc::new(|gathered| Box::new(collect::<I>(gathered))),
    )
  }

  /// A point declared as [`BeanSet<I>`]: every distinct bean exposing `I`.
  pub fn set<I: ?Sized + Any + Send + Sync>() -> Self {
    Self::new::<I, BeanSet<I>>(
      Some(CollectionKind::Set),
      false,
      Arc::new(|gathered| Box::new(collect::<I>(gathered).into_iter().collect::<BeanSet<I>>())),
    )
  }

  fn new<I: ?Sized + Any, D: Any>(collection: Option<CollectionKind>, wraps_optional: bool, shape: Shape) -> Self {
    Self {
      declared_type: type_name::<D>(),
      element: TypeKey::of::<I>(),
      raw_type: TypeKey::of::<D>(),
      collection,
      optional: false,
      wraps_optional,
      qualifier: None,
      description: format!("of type '{}'", type_name::<D>()),
      shape,
    }
  }

  /// Resolves by bean name instead of by type.
  pub fn qualified(mut self, name: impl Into<String>) -> Self {
    let name = name.into();
    self.description = format!("'{}' of type '{}'", name, self.declared_type);
    self.qualifier = Some(name);
    self
  }

  /// Swallows resolution failures. Aggregate points fall back to an empty
  /// collection; a scalar `Arc<I>` point still fails when nothing is
  /// available, since the declared type cannot hold an absent value.
  pub fn not_required(mut self) -> Self {
    self.optional = true;
    self
  }

  /// Replaces the human-readable description used in error messages.
  pub fn described(mut self, description: impl Into<String>) -> Self {
    self.description = description.into();
    self
  }

  pub fn declared_type(&self) -> &'static str {
    self.declared_type
  }

  /// The type actually resolved, unwrapped from `Arc`, `Option` or collections.
  pub fn element_type(&self) -> TypeKey {
    self.element
  }

  /// The full declared type, e.g. `Vec<Arc<dyn Service>>`.
  pub fn raw_type(&self) -> TypeKey {
    self.raw_type
  }

  pub fn collection(&self) -> Option<CollectionKind> {
    self.collection
  }

  pub fn is_optional(&self) -> bool {
    self.optional
  }

  pub fn wraps_optional(&self) -> bool {
    self.wraps_optional
  }

  pub fn qualifier(&self) -> Option<&str> {
    self.qualifier.as_deref()
  }

  pub fn description(&self) -> &str {
    &self.description
  }

  pub(crate) fn empty(&self) -> Gathered {
    match self.collection {
      Some(_) => Gathered::Many(Vec::new()),
      None => Gathered::One(None),
    }
  }

  pub(crate) fn shape(&self, gathered: Gathered) -> Boxed {
    (self.shape)(gathered)
  }
}

impl fmt::Debug for InjectionPoint {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("InjectionPoint")
      .field("declared_type", &self.declared_type)
      .field("element", &self.element.name())
      .field("collection", &self.collection)
      .field("optional", &self.optional)
      .field("wraps_optional", &self.wraps_optional)
      .field("qualifier", &self.qualifier)
      .finish()
  }
}

fn unbox<I: ?Sized + Any + Send + Sync>(value: Boxed) -> Option<Arc<I>> {
  value.downcast::<Arc<I>>().ok().map(|typed| *typed)
}

fn collect<I: ?Sized + Any + Send + Sync>(gathered: Gathered) -> Vec<Arc<I>> {
  match gathered {
    Gathered::One(value) => value.and_then(unbox::<I>).into_iter().collect(),
    Gathered::Many(values) => values.into_iter().filter_map(unbox::<I>).collect(),
  }
}

/// A set of beans deduplicated by instance identity, in first-seen order.
pub struct BeanSet<I: ?Sized> {
  items: Vec<Arc<I>>,
}

impl<I: ?Sized> BeanSet<I> {
  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  /// Whether this exact instance is in the set.
  pub fn contains(&self, bean: &Arc<I>) -> bool {
    self.items.iter().any(|item| same_instance(item, bean))
  }

  pub fn iter(&self) -> std::slice::Iter<'_, Arc<I>> {
    self.items.iter()
  }

  pub fn into_vec(self) -> Vec<Arc<I>> {
    self.items
  }
}

fn same_instance<I: ?Sized>(a: &Arc<I>, b: &Arc<I>) -> bool {
  std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

impl<I: ?Sized> FromIterator<Arc<I>> for BeanSet<I> {
  fn from_iter<It: IntoIterator<Item = Arc<I>>>(iter: It) -> Self {
    let mut items: Vec<Arc<I>> = Vec::new();
    for bean in iter {
      if !items.iter().any(|item| same_instance(item, &bean)) {
        items.push(bean);
      }
    }
    Self { items }
  }
}

impl<I: ?Sized> IntoIterator for BeanSet<I> {
  type Item = Arc<I>;
  type IntoIter = std::vec::IntoIter<Arc<I>>;

  fn into_iter(self) -> Self::IntoIter {
    self.items.into_iter()
  }
}

impl<'a, I: ?Sized> IntoIterator for &'a BeanSet<I> {
  type Item = &'a Arc<I>;
  type IntoIter = std::slice::Iter<'a, Arc<I>>;

  fn into_iter(self) -> Self::IntoIter {
    self.items.iter()
  }
}

impl<I: ?Sized> fmt::Debug for BeanSet<I> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("BeanSet").field("len", &self.items.len()).finish()
  }
}

/// Resolved constructor arguments, consumed in declaration order.
pub struct Args {
  owner: &'static str,
  values: VecDeque<(String, &'static str, Boxed)>,
}

impl Args {
  pub(crate) fn new(owner: &'static str) -> Self {
    Self {
      owner,
      values: VecDeque::new(),
    }
  }

  pub(crate) fn push(&mut self, point: &InjectionPoint, value: Boxed) {
    self
      .values
      .push_back((point.description().to_string(), point.declared_type(), value));
  }

  /// Takes the next argument as `V`, which must match the point's declared type.
  pub fn take<V: Any>(&mut self) -> Result<V> {
    let (description, declared, value) = self.values.pop_front().ok_or_else(|| {
      Error::unsatisfied(
        format!("of '{}'", self.owner),
        format!("constructor took more arguments than declared (wanted '{}')", type_name::<V>()),
      )
    })?;
    value.downcast::<V>().map(|typed| *typed).map_err(|_| {
      Error::unsatisfied(
        description,
        format!("declared as '{}' but taken as '{}'", declared, type_name::<V>()),
      )
    })
  }

  pub fn remaining(&self) -> usize {
    self.values.len()
  }
}

/// The handle factories use to resolve their dependencies.
///
/// It carries the creation chain of the resolution in progress, so every
/// dependency requested through it takes part in cycle detection.
pub struct Injector<'a> {
  container: &'a Container,
  chain: &'a mut CreationChain,
}

impl<'a> Injector<'a> {
  pub(crate) fn new(container: &'a Container, chain: &'a mut CreationChain) -> Self {
    Self { container, chain }
  }

  /// The container performing the resolution.
  pub fn container(&self) -> &Container {
    self.container
  }

  /// Resolves the unique (or primary) bean exposing `T`.
  pub fn get<T: ?Sized + Any + Send + Sync>(&mut self) -> Result<Arc<T>> {
    self.container.get_in::<T>(self.chain)
  }

  /// Resolves the bean named `name`, which must expose `T`.
  pub fn get_named<T: ?Sized + Any + Send + Sync>(&mut self, name: &str) -> Result<Arc<T>> {
    self.container.get_named_in::<T>(name, self.chain)
  }

  /// Resolves every bean exposing `T`, in registration order.
  pub fn get_all<T: ?Sized + Any + Send + Sync>(&mut self) -> Result<Vec<Arc<T>>> {
    self.container.get_all_in::<T>(self.chain)
  }

  /// Resolves `T` if it can be resolved, swallowing any failure.
  pub fn get_optional<T: ?Sized + Any + Send + Sync>(&mut self) -> Option<Arc<T>> {
    self.resolve::<Option<Arc<T>>>(&InjectionPoint::optional::<T>()).ok().flatten()
  }

  /// Resolves a declared injection point into its declared type `V`.
  pub fn resolve<V: Any>(&mut self, point: &InjectionPoint) -> Result<V> {
    let value = self.resolve_point(point)?;
    value.downcast::<V>().map(|typed| *typed).map_err(|_| {
      Error::unsatisfied(
        point.description().to_string(),
        format!("declared as '{}' but requested as '{}'", point.declared_type(), type_name::<V>()),
      )
    })
  }

  pub(crate) fn resolve_point(&mut self, point: &InjectionPoint) -> Result<Boxed> {
    self.container.resolve_point(point, self.chain)
  }

  pub(crate) fn instance_of(&mut self, definition: &Arc<Definition>) -> Result<Option<Instance>> {
    self.container.materialize(definition, self.chain)
  }
}

//! Dependency resolution: turning type keys, names and injection points into
//! instances through the registry and the lifecycle orchestrator.

use crate::container::Container;
use crate::core::{Boxed, CreationChain, TypeKey};
use crate::definition::Definition;
use crate::error::{Error, Result};
use crate::injection::{Gathered, InjectionPoint};
use crate::registry::Registry;
use std::any::Any;
use std::sync::Arc;
use tracing::debug;

impl Container {
  /// The context itself and its registry are served without a lookup.
  fn framework_singleton(&self, key: TypeKey) -> Option<Boxed> {
    if key == TypeKey::of::<Container>() {
      Some(Box::new(Arc::new(self.clone())))
    } else if key == TypeKey::of::<Registry>() {
      Some(Box::new(self.registry().clone()))
    } else {
      None
    }
  }

  pub(crate) fn is_framework_type(key: TypeKey) -> bool {
    key == TypeKey::of::<Container>() || key == TypeKey::of::<Registry>()
  }

  fn cast_instance(
    &self,
    definition: &Arc<Definition>,
    key: TypeKey,
    chain: &mut CreationChain,
  ) -> Result<Option<Boxed>> {
    let Some(instance) = self.materialize(definition, chain)? else {
      return Ok(None);
    };
    definition
      .cast(key.id(), &instance)
      .map(Some)
      .ok_or_else(|| not_assignable(definition, key))
  }

  pub(crate) fn resolve_one(&self, key: TypeKey, chain: &mut CreationChain) -> Result<Option<Boxed>> {
    if let Some(value) = self.framework_singleton(key) {
      return Ok(Some(value));
    }
    let definition = self.registry().candidate(key)?;
    self.cast_instance(&definition, key, chain)
  }

  pub(crate) fn resolve_named(
    &self,
    name: &str,
    key: TypeKey,
    chain: &mut CreationChain,
  ) -> Result<Option<Boxed>> {
    let definition = self.registry().named(name)?;
    if !definition.exposes(key) {
      return Err(not_assignable(&definition, key));
    }
    self.cast_instance(&definition, key, chain)
  }

  pub(crate) fn resolve_all(&self, key: TypeKey, chain: &mut CreationChain) -> Result<Vec<Boxed>> {
    if let Some(value) = self.framework_singleton(key) {
      return Ok(vec![value]);
    }
    let mut values = Vec::new();
    for definition in self.registry().candidates(key) {
      if let Some(value) = self.cast_instance(&definition, key, chain)? {
        values.push(value);
      }
    }
    Ok(values)
  }

  fn gather(&self, point: &InjectionPoint, chain: &mut CreationChain) -> Result<Gathered> {
    let element = point.element_type();
    if let Some(value) = self.framework_singleton(element) {
      return Ok(match point.collection() {
        Some(_) => Gathered::Many(vec![value]),
        None => Gathered::One(Some(value)),
      });
    }
    match (point.collection(), point.qualifier()) {
      (Some(_), Some(name)) => {
        let value = self.resolve_named(name, element, chain)?;
        Ok(Gathered::Many(value.into_iter().collect()))
      }
      (Some(_), None) => Ok(Gathered::Many(self.resolve_all(element, chain)?)),
      (None, Some(name)) => Ok(Gathered::One(self.resolve_named(name, element, chain)?)),
      (None, None) => Ok(Gathered::One(self.resolve_one(element, chain)?)),
    }
  }

  pub(crate) fn resolve_point(&self, point: &InjectionPoint, chain: &mut CreationChain) -> Result<Boxed> {
    let gathered = match self.gather(point, chain) {
      Ok(gathered) => gathered,
      Err(err) if point.is_optional() => {
        debug!(
          point = point.description(),
          error = %err,
          "optional injection point left empty"
        );
        point.empty()
      }
      Err(err) => return Err(err),
    };

    if let Gathered::One(None) = gathered {
      if !point.wraps_optional() {
        return Err(Error::unsatisfied(
          point.description().to_string(),
          format!("no instance of '{}' is available", point.element_type().name()),
        ));
      }
    }
    Ok(point.shape(gathered))
  }

  pub(crate) fn get_in<T: ?Sized + Any + Send + Sync>(&self, chain: &mut CreationChain) -> Result<Arc<T>> {
    let key = TypeKey::of::<T>();
    let value = self.resolve_one(key, chain)?.ok_or_else(|| absent(key))?;
    unbox::<T>(value, key)
  }

  pub(crate) fn get_named_in<T: ?Sized + Any + Send + Sync>(
    &self,
    name: &str,
    chain: &mut CreationChain,
  ) -> Result<Arc<T>> {
    let key = TypeKey::of::<T>();
    let value = self.resolve_named(name, key, chain)?.ok_or_else(|| absent(key))?;
    unbox::<T>(value, key)
  }

  pub(crate) fn get_all_in<T: ?Sized + Any + Send + Sync>(
    &self,
    chain: &mut CreationChain,
  ) -> Result<Vec<Arc<T>>> {
    let key = TypeKey::of::<T>();
    self
      .resolve_all(key, chain)?
      .into_iter()
      .map(|value| unbox::<T>(value, key))
      .collect()
  }
}

fn unbox<T: ?Sized + Any + Send + Sync>(value: Boxed, key: TypeKey) -> Result<Arc<T>> {
  value
    .downcast::<Arc<T>>()
    .map(|typed| *typed)
    .map_err(|_| Error::unsatisfied(format!("of type '{}'", key.name()), "resolved value has a different type"))
}

fn absent(key: TypeKey) -> Error {
  Error::unsatisfied(
    format!("of type '{}'", key.name()),
    "the factory produced no instance",
  )
}

fn not_assignable(definition: &Definition, key: TypeKey) -> Error {
  Error::NotAssignable {
    name: definition.display_name(),
    actual: definition.type_name().to_string(),
    expected: key.name().to_string(),
  }
}

//! Component descriptors and the stereotype composition table they are
//! extracted with.
//!
//! Stereotypes compose: `service` is a `component`, and an application may
//! define `audited-service` as a `service`. The table is built once at
//! startup; each stereotype is flattened into the chain leading to the base
//! `component` stereotype together with the attribute defaults gathered along
//! that chain.

use crate::core::TypeKey;
use crate::definition::Scope;
use crate::error::{Error, Result};
use crate::scanner::{TypeEntry, TypeKind};
use std::collections::{HashMap, HashSet};
use tracing::trace;

pub const COMPONENT: &str = "component";
pub const SERVICE: &str = "service";
pub const REPOSITORY: &str = "repository";
pub const CONFIGURATION: &str = "configuration";
pub const VIEW: &str = "view";

/// Attributes a marker or stereotype may set. Unset attributes fall through
/// to the next source.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Attributes {
  pub name: Option<String>,
  pub scope: Option<Scope>,
  pub primary: Option<bool>,
  pub lazy: Option<bool>,
  pub shared: Option<bool>,
}

impl Attributes {
  /// Fills every unset attribute from `fallback`.
  fn or(self, fallback: &Attributes) -> Attributes {
    Attributes {
      name: self.name.or_else(|| fallback.name.clone()),
      scope: self.scope.or(fallback.scope),
      primary: self.primary.or(fallback.primary),
      lazy: self.lazy.or(fallback.lazy),
      shared: self.shared.or(fallback.shared),
    }
  }
}

/// A named stereotype and the stereotypes it is composed from.
#[derive(Clone, Debug)]
pub struct Stereotype {
  name: String,
  composes: Vec<String>,
  defaults: Attributes,
}

impl Stereotype {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      composes: Vec::new(),
      defaults: Attributes::default(),
    }
  }

  pub fn composes(mut self, parent: impl Into<String>) -> Self {
    self.composes.push(parent.into());
    self
  }

  pub fn defaults(mut self, defaults: Attributes) -> Self {
    self.defaults = defaults;
    self
  }
}

/// A stereotype flattened against the table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedStereotype {
  pub name: String,
  /// From this stereotype down to `component`, or empty when the stereotype
  /// does not lead to `component`.
  pub chain: Vec<String>,
  /// Defaults merged along the chain, nearest stereotype first.
  pub defaults: Attributes,
}

impl ResolvedStereotype {
  pub fn is_component(&self) -> bool {
    !self.chain.is_empty()
  }
}

/// The explicit stereotype composition table.
#[derive(Clone, Debug)]
pub struct StereotypeTable {
  resolved: HashMap<String, ResolvedStereotype>,
}

impl Default for StereotypeTable {
  fn default() -> Self {
    Self::standard()
  }
}

impl StereotypeTable {
  /// A builder preloaded with the standard stereotypes.
  pub fn builder() -> StereotypeTableBuilder {
    StereotypeTableBuilder::new()
  }

  /// The standard table: `component` and the stereotypes composed from it.
  pub fn standard() -> Self {
    match Self::builder().build() {
      Ok(table) => table,
      Err(_) => unreachable!("the standard stereotype table is well formed"),
    }
  }

  pub fn resolve(&self, name: &str) -> Option<&ResolvedStereotype> {
    self.resolved.get(name)
  }
}

pub struct StereotypeTableBuilder {
  stereotypes: Vec<Stereotype>,
}

impl StereotypeTableBuilder {
  fn new() -> Self {
    let base = Attributes {
      name: None,
      scope: Some(Scope::Singleton),
      primary: Some(false),
      lazy: Some(false),
      shared: Some(false),
    };
    Self {
      stereotypes: vec![
        Stereotype::new(COMPONENT).defaults(base),
        Stereotype::new(SERVICE).composes(COMPONENT),
        Stereotype::new(REPOSITORY).composes(COMPONENT),
        Stereotype::new(CONFIGURATION).composes(COMPONENT),
        Stereotype::new(VIEW).composes(COMPONENT).defaults(Attributes {
          shared: Some(true),
          ..Attributes::default()
        }),
      ],
    }
  }

  /// Adds or replaces a stereotype.
  pub fn define(mut self, stereotype: Stereotype) -> Self {
    self.stereotypes.retain(|existing| existing.name != stereotype.name);
    self.stereotypes.push(stereotype);
    self
  }

  /// Flattens every stereotype. Fails on references to undefined stereotypes
  /// and on composition cycles.
  pub fn build(self) -> Result<StereotypeTable> {
    let by_name: HashMap<&str, &Stereotype> =
      self.stereotypes.iter().map(|s| (s.name.as_str(), s)).collect();

    for stereotype in &self.stereotypes {
      for parent in &stereotype.composes {
        if !by_name.contains_key(parent.as_str()) {
          return Err(Error::Stereotype(format!(
            "'{}' composes undefined stereotype '{}'",
            stereotype.name, parent
          )));
        }
      }
    }

    let mut finished = HashSet::new();
    for stereotype in &self.stereotypes {
      check_acyclic(&by_name, &stereotype.name, &mut Vec::new(), &mut finished)?;
    }

    let mut resolved = HashMap::new();
    for stereotype in &self.stereotypes {
      let chain = path_to_component(&by_name, &stereotype.name).unwrap_or_default();
      let defaults = chain
        .iter()
        .filter_map(|name| by_name.get(name.as_str()))
        .fold(Attributes::default(), |acc, s| acc.or(&s.defaults));
      resolved.insert(
        stereotype.name.clone(),
        ResolvedStereotype {
          name: stereotype.name.clone(),
          chain,
          defaults,
        },
      );
    }
    Ok(StereotypeTable { resolved })
  }
}

/// Walks every composition edge below `name`, failing on the first cycle.
fn check_acyclic<'a>(
  by_name: &HashMap<&'a str, &'a Stereotype>,
  name: &'a str,
  visiting: &mut Vec<&'a str>,
  finished: &mut HashSet<&'a str>,
) -> Result<()> {
  if finished.contains(name) {
    return Ok(());
  }
  if visiting.contains(&name) {
    visiting.push(name);
    return Err(Error::Stereotype(format!(
      "composition cycle: {}",
      visiting.join(" -> ")
    )));
  }
  let Some(&stereotype) = by_name.get(name) else {
    return Ok(());
  };
  visiting.push(name);
  for parent in &stereotype.composes {
    check_acyclic(by_name, parent, visiting, finished)?;
  }
  visiting.pop();
  finished.insert(name);
  Ok(())
}

/// Depth-first search for the first composition path reaching `component`.
/// The graph is known to be acyclic.
fn path_to_component(by_name: &HashMap<&str, &Stereotype>, name: &str) -> Option<Vec<String>> {
  if name == COMPONENT {
    return Some(vec![COMPONENT.to_string()]);
  }
  let stereotype = by_name.get(name)?;
  stereotype.composes.iter().find_map(|parent| {
    let mut rest = path_to_component(by_name, parent)?;
    rest.insert(0, name.to_string());
    Some(rest)
  })
}

/// A stereotype attached to a component, with attribute overrides.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Marker {
  stereotype: String,
  overrides: Attributes,
}

impl Marker {
  pub fn new(stereotype: impl Into<String>) -> Self {
    Self {
      stereotype: stereotype.into(),
      overrides: Attributes::default(),
    }
  }

  pub fn component() -> Self {
    Self::new(COMPONENT)
  }

  pub fn service() -> Self {
    Self::new(SERVICE)
  }

  pub fn repository() -> Self {
    Self::new(REPOSITORY)
  }

  pub fn configuration() -> Self {
    Self::new(CONFIGURATION)
  }

  pub fn view() -> Self {
    Self::new(VIEW)
  }

  pub fn stereotype(&self) -> &str {
    &self.stereotype
  }

  pub fn name(mut self, name: impl Into<String>) -> Self {
    self.overrides.name = Some(name.into());
    self
  }

  pub fn scope(mut self, scope: Scope) -> Self {
    self.overrides.scope = Some(scope);
    self
  }

  pub fn primary(mut self) -> Self {
    self.overrides.primary = Some(true);
    self
  }

  pub fn lazy(mut self) -> Self {
    self.overrides.lazy = Some(true);
    self
  }

  pub fn shared(mut self, shared: bool) -> Self {
    self.overrides.shared = Some(shared);
    self
  }
}

/// Normalized identity of a discovered component.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComponentDescriptor {
  pub type_key: TypeKey,
  pub name: String,
  pub scope: Scope,
  pub primary: bool,
  pub lazy: bool,
  pub stereotype: String,
  pub shared: bool,
}

/// Turns a candidate's markers into a [`ComponentDescriptor`].
pub struct Extractor<'a> {
  table: &'a StereotypeTable,
}

impl<'a> Extractor<'a> {
  pub fn new(table: &'a StereotypeTable) -> Self {
    Self { table }
  }

  /// Describes a catalog entry, or returns `None` when the entry is abstract,
  /// an interface, or carries no component marker.
  pub fn extract(&self, entry: &TypeEntry) -> Option<ComponentDescriptor> {
    if entry.kind() != TypeKind::Concrete {
      return None;
    }
    let component = entry.component()?;
    self.describe(component.type_key(), &component.markers())
  }

  /// Describes `key` from its markers. The first marker whose stereotype
  /// leads to `component` wins; its overrides are read first, then the
  /// defaults along the stereotype chain.
  pub fn describe(&self, key: TypeKey, markers: &[Marker]) -> Option<ComponentDescriptor> {
    let (marker, stereotype) = markers.iter().find_map(|marker| {
      match self.table.resolve(marker.stereotype()) {
        Some(resolved) if resolved.is_component() => Some((marker, resolved)),
        _ => {
          trace!(marker = marker.stereotype(), ty = key.name(), "marker is not a component stereotype");
          None
        }
      }
    })?;

    let attributes = marker.overrides.clone().or(&stereotype.defaults);
    Some(ComponentDescriptor {
      type_key: key,
      name: attributes
        .name
        .unwrap_or_else(|| derive_bean_name(key.simple_name())),
      scope: attributes.scope.unwrap_or_default(),
      primary: attributes.primary.unwrap_or(false),
      lazy: attributes.lazy.unwrap_or(false),
      stereotype: stereotype.name.clone(),
      shared: attributes.shared.unwrap_or(false),
    })
  }
}

/// Derives a bean name from a simple type name: the first letter is lowered,
/// unless the first two letters are both upper-case (`URLParser` stays as is).
pub fn derive_bean_name(simple_name: &str) -> String {
  let mut chars = simple_name.chars();
  let Some(first) = chars.next() else {
    return String::new();
  };
  if let Some(second) = simple_name.chars().nth(1) {
    if first.is_uppercase() && second.is_uppercase() {
      return simple_name.to_string();
    }
  }
  first.to_lowercase().chain(chars).collect()
}

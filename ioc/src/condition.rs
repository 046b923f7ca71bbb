//! Registration-time conditions over a property snapshot and a type-presence
//! oracle.

use std::collections::{BTreeMap, HashMap};

/// Read access to a string key-value snapshot.
pub trait PropertySource {
  fn property(&self, key: &str) -> Option<&str>;
}

impl PropertySource for HashMap<String, String> {
  fn property(&self, key: &str) -> Option<&str> {
    self.get(key).map(String::as_str)
  }
}

impl PropertySource for BTreeMap<String, String> {
  fn property(&self, key: &str) -> Option<&str> {
    self.get(key).map(String::as_str)
  }
}

/// Answers whether a type, named by its path, exists in the program.
pub trait TypePresence: Send + Sync {
  fn is_present(&self, type_name: &str) -> bool;
}

impl<F> TypePresence for F
where
  F: Fn(&str) -> bool + Send + Sync,
{
  fn is_present(&self, type_name: &str) -> bool {
    (self)(type_name)
  }
}

/// What a condition is evaluated against.
#[derive(Clone, Copy)]
pub struct ConditionState<'a> {
  pub properties: &'a dyn PropertySource,
  pub presence: &'a dyn TypePresence,
}

/// Matches on a single property.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropertyCondition {
  pub key: String,
  /// Expected value. `None` matches any value as long as the key is present.
  pub having_value: Option<String>,
  pub match_if_missing: bool,
}

impl PropertyCondition {
  pub fn new(key: impl Into<String>) -> Self {
    Self {
      key: key.into(),
      having_value: None,
      match_if_missing: false,
    }
  }

  pub fn having_value(mut self, value: impl Into<String>) -> Self {
    self.having_value = Some(value.into());
    self
  }

  pub fn match_if_missing(mut self, matches: bool) -> Self {
    self.match_if_missing = matches;
    self
  }

  fn holds(&self, properties: &dyn PropertySource) -> bool {
    match (properties.property(&self.key), &self.having_value) {
      (None, _) => self.match_if_missing,
      (Some(actual), Some(expected)) => actual == expected,
      (Some(_), None) => true,
    }
  }
}

/// A conjunction of optional clauses. A missing clause is vacuously true.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Condition {
  pub property: Option<PropertyCondition>,
  pub required_types: Vec<String>,
}

impl Condition {
  pub fn new() -> Self {
    Self::default()
  }

  /// Shorthand for a condition on a single property.
  pub fn on_property(property: PropertyCondition) -> Self {
    Self::new().property(property)
  }

  pub fn property(mut self, property: PropertyCondition) -> Self {
    self.property = Some(property);
    self
  }

  /// Requires a type, named by its path, to be present.
  pub fn requires_type(mut self, type_name: impl Into<String>) -> Self {
    self.required_types.push(type_name.into());
    self
  }
}

/// Evaluates `target` against `state`.
pub fn matches(state: &ConditionState<'_>, target: &Condition) -> bool {
  let property = target
    .property
    .as_ref()
    .map(|condition| condition.holds(state.properties))
    .unwrap_or(true);
  property
    && target
      .required_types
      .iter()
      .all(|name| state.presence.is_present(name))
}

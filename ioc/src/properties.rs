//! The property snapshot conditions are evaluated against, and the
//! container settings read from the same YAML document.

use crate::condition::PropertySource;
use crate::error::Result;
use serde::Deserialize;
use serde_yaml::Value;
use std::collections::BTreeMap;

/// An ordered, flat key-value snapshot. Nested YAML maps become dotted keys
/// (`db.url`), sequences become indexed keys (`hosts[0]`).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Properties {
  values: BTreeMap<String, String>,
}

impl Properties {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn from_yaml_str(text: &str) -> Result<Self> {
    let document: Value = serde_yaml::from_str(text)?;
    let mut properties = Self::new();
    flatten("", &document, &mut properties.values);
    Ok(properties)
  }

  /// Reads process environment variables starting with `prefix_`.
  /// `APP_DB_URL` with prefix `APP` becomes `db.url`.
  pub fn from_env(prefix: &str) -> Self {
    Self::from_vars(prefix, std::env::vars())
  }

  pub fn from_vars<I>(prefix: &str, vars: I) -> Self
  where
    I: IntoIterator<Item = (String, String)>,
  {
    let marker = format!("{}_", prefix.trim_end_matches('_'));
    let values = vars
      .into_iter()
      .filter_map(|(key, value)| {
        let rest = key.strip_prefix(&marker)?;
        if rest.is_empty() {
          return None;
        }
        Some((rest.to_lowercase().replace('_', "."), value))
      })
      .collect();
    Self { values }
  }

  pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.values.insert(key.into(), value.into());
    self
  }

  /// Overlays `other` on top of `self`; keys present in both take `other`'s value.
  pub fn merge(mut self, other: Properties) -> Self {
    self.values.extend(other.values);
    self
  }

  pub fn get(&self, key: &str) -> Option<&str> {
    self.values.get(key).map(String::as_str)
  }

  pub fn contains(&self, key: &str) -> bool {
    self.values.contains_key(key)
  }

  pub fn len(&self) -> usize {
    self.values.len()
  }

  pub fn is_empty(&self) -> bool {
    self.values.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
    self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
  }
}

impl PropertySource for Properties {
  fn property(&self, key: &str) -> Option<&str> {
    self.get(key)
  }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Properties {
  fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
    Self {
      values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
    }
  }
}

fn flatten(prefix: &str, value: &Value, out: &mut BTreeMap<String, String>) {
  match value {
    Value::Mapping(map) => {
      for (key, child) in map {
        let key = match key {
          Value::String(s) => s.clone(),
          Value::Number(n) => n.to_string(),
          Value::Bool(b) => b.to_string(),
          _ => continue,
        };
        let path = if prefix.is_empty() {
          key
        } else {
          format!("{}.{}", prefix, key)
        };
        flatten(&path, child, out);
      }
    }
    Value::Sequence(items) => {
      for (idx, child) in items.iter().enumerate() {
        flatten(&format!("{}[{}]", prefix, idx), child, out);
      }
    }
    Value::String(s) => {
      out.insert(prefix.to_string(), s.clone());
    }
    Value::Number(n) => {
      out.insert(prefix.to_string(), n.to_string());
    }
    Value::Bool(b) => {
      out.insert(prefix.to_string(), b.to_string());
    }
    Value::Tagged(tagged) => flatten(prefix, &tagged.value, out),
    Value::Null => {}
  }
}

/// Container settings from the `fibre.context` section of a YAML document.
///
/// ```yaml
/// fibre:
///   context:
///     scan: [app::services, app::repositories]
///     eager-init: true
/// ```
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ContainerSettings {
  /// Namespaces scanned by `Container::bootstrap`.
  #[serde(default)]
  pub scan: Vec<String>,
  /// Instantiate every non-lazy singleton during bootstrap.
  #[serde(default = "default_eager_init")]
  pub eager_init: bool,
}

fn default_eager_init() -> bool {
  true
}

impl Default for ContainerSettings {
  fn default() -> Self {
    Self {
      scan: Vec::new(),
      eager_init: default_eager_init(),
    }
  }
}

impl ContainerSettings {
  /// Reads the `fibre.context` section; a document without it yields defaults.
  pub fn from_yaml_str(text: &str) -> Result<Self> {
    let document: Value = serde_yaml::from_str(text)?;
    match document.get("fibre").and_then(|fibre| fibre.get("context")) {
      Some(section) => Ok(serde_yaml::from_value(section.clone())?),
      None => Ok(Self::default()),
    }
  }
}

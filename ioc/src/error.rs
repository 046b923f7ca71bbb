use std::any::type_name;
use thiserror::Error;

/// Boxed error returned by user factories, lifecycle hooks and post-processors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The single error type raised by the container.
///
/// Every resolution, registration and instantiation failure is reported through
/// one of these variants. Callers usually only need the message; the variants
/// exist so that tests and diagnostics can tell the causes apart.
#[derive(Debug, Error)]
pub enum Error {
  #[error("No bean of type '{type_name}' is registered")]
  NoSuchBean { type_name: String },

  #[error("No bean named '{name}' is registered")]
  NoSuchName { name: String },

  #[error("Unsatisfied dependency {description}: {reason}")]
  Unsatisfied { description: String, reason: String },

  #[error("Circular dependency detected while creating '{type_name}' ({chain})")]
  Circular { type_name: String, chain: String },

  #[error(
    "Expected a single bean of type '{}' but found {} with no primary: {}",
    .type_name, .candidates.len(), .candidates.join(", ")
  )]
  Ambiguous {
    type_name: String,
    candidates: Vec<String>,
  },

  #[error(
    "More than one primary bean of type '{}' found among candidates: {}",
    .type_name, .candidates.join(", ")
  )]
  MultiplePrimary {
    type_name: String,
    candidates: Vec<String>,
  },

  #[error("Bean name '{name}' is already bound to '{existing}', cannot bind it to '{attempted}'")]
  DuplicateName {
    name: String,
    existing: String,
    attempted: String,
  },

  #[error("Bean '{name}' of type '{actual}' is not assignable to '{expected}'")]
  NotAssignable {
    name: String,
    actual: String,
    expected: String,
  },

  #[error("Failed to instantiate '{type_name}': {source}")]
  Instantiation {
    type_name: String,
    #[source]
    source: BoxError,
  },

  #[error("Invalid lifecycle declaration on '{type_name}': {reason}")]
  InvalidLifecycle { type_name: String, reason: String },

  #[error("Definition for '{type_name}' declares neither a constructor nor a factory")]
  IncompleteDefinition { type_name: String },

  #[error("Stereotype table is invalid: {0}")]
  Stereotype(String),

  #[error("Failed to parse configuration: {0}")]
  ConfigParse(String),
}

impl Error {
  /// Wraps a factory failure for the component type `T`.
  pub fn instantiation<T: ?Sized>(source: impl Into<BoxError>) -> Self {
    Error::Instantiation {
      type_name: type_name::<T>().to_string(),
      source: source.into(),
    }
  }

  pub(crate) fn unsatisfied(description: impl Into<String>, reason: impl Into<String>) -> Self {
    Error::Unsatisfied {
      description: description.into(),
      reason: reason.into(),
    }
  }
}

impl From<serde_yaml::Error> for Error {
  fn from(err: serde_yaml::Error) -> Self {
    Error::ConfigParse(err.to_string())
  }
}

/// A specialized `Result` type for container operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

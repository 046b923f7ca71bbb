//! # Fibre Context
//!
//! A thread-safe application context for Rust: a bean container with
//! stereotype-driven component scanning, registration-time conditions,
//! constructor and field injection, lifecycle callbacks, a post-processor
//! chain and orderly shutdown.
//!
//! ## Core Concepts
//!
//! - **Definition**: how to produce a component, its scope (singleton or
//!   prototype), its injection points, hooks and exposed capabilities.
//! - **Container**: the registry of definitions plus the singleton cache.
//!   Resolution is by type (`get`), by name (`get_named`) or by collection
//!   (`get_all`); ambiguity among several candidates is settled by `primary`.
//! - **Components**: types implementing [`Component`] declare a [`Manifest`]
//!   once; listing them in a [`Catalog`] makes them discoverable by
//!   [`Container::scan_packages`].
//! - **Conditions**: components and bean methods may require properties or
//!   the presence of other types.
//! - **Global Container**: a process-wide container behind [`global()`],
//!   read by the [`resolve!`] macros.
//!
//! ## Quick Start
//!
//! ```
//! use fibre_context::{Container, Definition, InjectionPoint};
//! use std::sync::Arc;
//!
//! trait Greeter: Send + Sync {
//!   fn greet(&self) -> String;
//! }
//!
//! struct English {
//!   message: Arc<String>,
//! }
//!
//! impl Greeter for English {
//!   fn greet(&self) -> String {
//!     (*self.message).clone()
//!   }
//! }
//!
//! let container = Container::new();
//! container
//!   .register(Definition::instance(String::from("Hello, World!")).name("message").build().unwrap())
//!   .unwrap();
//! container
//!   .register(
//!     Definition::of::<English>()
//!       .inject(InjectionPoint::required::<String>().qualified("message"))
//!       .constructor(|args| Ok(English { message: args.take()? }))
//!       .provides::<dyn Greeter>(|e| e)
//!       .build()
//!       .unwrap(),
//!   )
//!   .unwrap();
//!
//! let greeter = container.get::<dyn Greeter>().unwrap();
//! assert_eq!(greeter.greet(), "Hello, World!");
//! ```

mod component;
mod condition;
mod container;
mod core;
mod definition;
mod descriptor;
mod error;
mod global;
mod injection;
mod lifecycle;
mod macros;
mod post_processor;
mod properties;
mod registry;
mod resolver;
mod scanner;

pub use component::{BeanMethod, Component, ComponentType, ConfigRef, Manifest};
pub use condition::{matches, Condition, ConditionState, PropertyCondition, PropertySource, TypePresence};
pub use container::{Container, ContainerBuilder};
pub use crate::core::{Instance, TypeKey};
pub use definition::{Definition, DefinitionBuilder, DefinitionId, Hook, Scope};
pub use descriptor::{
  derive_bean_name, Attributes, ComponentDescriptor, Extractor, Marker, ResolvedStereotype, Stereotype,
  StereotypeTable, StereotypeTableBuilder, COMPONENT, CONFIGURATION, REPOSITORY, SERVICE, VIEW,
};
pub use error::{BoxError, Error, Result};
pub use global::global;
pub use injection::{Args, BeanSet, CollectionKind, InjectionPoint, Injector};
pub use lifecycle::{Creation, HookFailure, Phase, ShutdownReport};
pub use post_processor::{Bean, PostProcessor, PostProcessorChain};
pub use properties::{ContainerSettings, Properties};
pub use registry::Registry;
pub use scanner::{Catalog, ScannedComponent, Scanner, TypeEntry, TypeKind, TypeUniverse};

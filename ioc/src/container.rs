//! The `Container` handle, its builder, and the registration pipeline.

use crate::component::ComponentType;
use crate::condition::{self, Condition, ConditionState, TypePresence};
use crate::core::{CreationChain, Instance, TypeKey};
use crate::definition::{Definition, Scope};
use crate::descriptor::{ComponentDescriptor, Extractor, Marker, StereotypeTable};
use crate::error::{Error, Result};
use crate::injection::Injector;
use crate::post_processor::{PostProcessor, PostProcessorChain};
use crate::properties::{ContainerSettings, Properties};
use crate::registry::Registry;
use crate::scanner::{Catalog, Scanner, TypeUniverse};
use dashmap::DashSet;
use std::any::{Any, TypeId};
use std::sync::Arc;
use tracing::{debug, info};

struct Shared {
  registry: Arc<Registry>,
  processors: PostProcessorChain,
  properties: Properties,
  presence: Arc<dyn TypePresence>,
  universe: Arc<dyn TypeUniverse>,
  stereotypes: StereotypeTable,
  settings: ContainerSettings,
  scanned: DashSet<String>,
  components: DashSet<TypeId>,
}

/// The application context.
///
/// A cheap, cloneable handle; clones share the same registry, caches and
/// post-processor chain. Thread-safe: definitions may be registered and beans
/// resolved from any thread at any time.
#[derive(Clone)]
pub struct Container {
  shared: Arc<Shared>,
}

impl Default for Container {
  fn default() -> Self {
    Self::builder().build()
  }
}

impl Container {
  /// Creates an empty container with no properties and an empty catalog.
  pub fn new() -> Self {
    Self::default()
  }

  pub fn builder() -> ContainerBuilder {
    ContainerBuilder::default()
  }

  pub fn registry(&self) -> &Arc<Registry> {
    &self.shared.registry
  }

  pub fn properties(&self) -> &Properties {
    &self.shared.properties
  }

  pub fn settings(&self) -> &ContainerSettings {
    &self.shared.settings
  }

  pub fn post_processors(&self) -> &PostProcessorChain {
    &self.shared.processors
  }

  // --- Registration ---

  /// Registers `definition` under its name (if any), its own type and every
  /// capability it exposes.
  pub fn register(&self, definition: Arc<Definition>) -> Result<()> {
    self.registry().register(definition)
  }

  /// Registers `definition` as a candidate for `T` only.
  pub fn register_type<T: ?Sized + Any>(&self, definition: Arc<Definition>) -> Result<()> {
    self.register_key(TypeKey::of::<T>(), definition)
  }

  pub fn register_key(&self, key: TypeKey, definition: Arc<Definition>) -> Result<()> {
    if !definition.exposes(key) {
      return Err(Error::NotAssignable {
        name: definition.display_name(),
        actual: definition.type_name().to_string(),
        expected: key.name().to_string(),
      });
    }
    self.registry().register_type(key, definition);
    Ok(())
  }

  pub fn register_name(&self, name: &str, definition: Arc<Definition>) -> Result<()> {
    self.registry().register_name(name, definition)
  }

  /// Registers an already constructed singleton.
  pub fn add_instance<T: Any + Send + Sync>(&self, instance: T) -> Result<()> {
    self.register(Definition::instance(instance).build()?)
  }

  /// Registers a singleton built by `factory` on first use.
  pub fn add_singleton<T, F>(&self, factory: F) -> Result<()>
  where
    T: Any + Send + Sync,
    F: Fn(&mut Injector<'_>) -> Result<T> + Send + Sync + 'static,
  {
    self.register(Definition::of::<T>().factory(factory).build()?)
  }

  /// Registers a prototype built by `factory` on every request.
  pub fn add_prototype<T, F>(&self, factory: F) -> Result<()>
  where
    T: Any + Send + Sync,
    F: Fn(&mut Injector<'_>) -> Result<T> + Send + Sync + 'static,
  {
    self.register(Definition::of::<T>().factory(factory).prototype().build()?)
  }

  // --- Resolution ---

  /// Resolves the unique (or primary) bean exposing `T`.
  pub fn get<T: ?Sized + Any + Send + Sync>(&self) -> Result<Arc<T>> {
    self.get_in::<T>(&mut CreationChain::new())
  }

  /// Resolves the bean named `name`; it must expose `T`.
  pub fn get_named<T: ?Sized + Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>> {
    self.get_named_in::<T>(name, &mut CreationChain::new())
  }

  /// Resolves the bean named `name` without knowing its type.
  pub fn bean(&self, name: &str) -> Result<Instance> {
    let definition = self.registry().named(name)?;
    self
      .materialize(&definition, &mut CreationChain::new())?
      .ok_or_else(|| {
        Error::unsatisfied(format!("named '{}'", name), "the factory produced no instance")
      })
  }

  /// Every bean exposing `T`, in first-registration order. Ambiguity is not
  /// an error here.
  pub fn get_all<T: ?Sized + Any + Send + Sync>(&self) -> Result<Vec<Arc<T>>> {
    self.get_all_in::<T>(&mut CreationChain::new())
  }

  pub fn contains_type<T: ?Sized + Any>(&self) -> bool {
    let key = TypeKey::of::<T>();
    Self::is_framework_type(key) || self.registry().contains_type(key)
  }

  pub fn contains_name(&self, name: &str) -> bool {
    self.registry().contains_name(name)
  }

  /// Every definition registered under `T`, without instantiating anything.
  pub fn definitions_for<T: ?Sized + Any>(&self) -> Vec<Arc<Definition>> {
    self.registry().candidates(TypeKey::of::<T>())
  }

  // --- Pipeline ---

  fn condition_state(&self) -> ConditionState<'_> {
    ConditionState {
      properties: &self.shared.properties,
      presence: &*self.shared.presence,
    }
  }

  fn condition_holds(&self, target: Option<&Condition>) -> bool {
    target
      .map(|target| condition::matches(&self.condition_state(), target))
      .unwrap_or(true)
  }

  /// Scans each root namespace of the type universe and registers the
  /// components found whose conditions match. Roots already scanned are
  /// skipped. Returns how many components were registered.
  pub fn scan_packages(&self, roots: &[&str]) -> Result<usize> {
    let scanner = Scanner::new(&self.shared.stereotypes);
    let mut installed = 0;
    for root in roots {
      if self.shared.scanned.contains(*root) {
        debug!(root, "namespace already scanned");
        continue;
      }
      for found in scanner.scan(&*self.shared.universe, root) {
        if self.install(&found.descriptor, &found.component)? {
          installed += 1;
        }
      }
      self.shared.scanned.insert(root.to_string());
    }
    info!(roots = roots.len(), installed, "scanned packages");
    Ok(installed)
  }

  /// Registers configuration components directly, with the beans their
  /// methods declare. Types without a component marker are treated as
  /// plain configurations.
  pub fn register_configurations(&self, types: &[ComponentType]) -> Result<usize> {
    let extractor = Extractor::new(&self.shared.stereotypes);
    let mut installed = 0;
    for component in types {
      let key = component.type_key();
      let descriptor = extractor
        .describe(key, &component.markers())
        .or_else(|| extractor.describe(key, &[Marker::configuration()]))
        .ok_or_else(|| {
          Error::Stereotype(format!(
            "'{}' cannot be registered: no stereotype leads to component",
            key.name()
          ))
        })?;
      if self.install(&descriptor, component)? {
        installed += 1;
      }
    }
    Ok(installed)
  }

  /// Registers a component and its bean methods. Returns `false` when the
  /// component was already installed or its condition does not match.
  fn install(&self, descriptor: &ComponentDescriptor, component: &ComponentType) -> Result<bool> {
    let id = descriptor.type_key.id();
    if !self.shared.components.insert(id) {
      debug!(component = %descriptor.name, "component already registered");
      return Ok(false);
    }
    let result = self.install_new(descriptor, component);
    if !matches!(result, Ok(true)) {
      self.shared.components.remove(&id);
    }
    result
  }

  fn install_new(&self, descriptor: &ComponentDescriptor, component: &ComponentType) -> Result<bool> {
    if !self.condition_holds(component.condition().as_ref()) {
      debug!(component = %descriptor.name, "condition did not match, skipping component");
      return Ok(false);
    }
    let definition = component.definition(descriptor)?;
    let mut batch = vec![definition.clone()];
    for pending in component.declared_beans(&definition) {
      if !self.condition_holds(pending.condition.as_ref()) {
        debug!(
          component = %descriptor.name,
          method = %pending.method,
          "condition did not match, skipping bean method"
        );
        continue;
      }
      batch.push((pending.build)()?);
    }

    // All or nothing: a component never stays half-registered.
    for (index, member) in batch.iter().enumerate() {
      if let Err(err) = self.register(member.clone()) {
        for registered in &batch[..index] {
          self.registry().unregister(registered);
        }
        debug!(component = %descriptor.name, error = %err, "rolled back component registration");
        return Err(err);
      }
    }
    debug!(
      component = %descriptor.name,
      stereotype = %descriptor.stereotype,
      scope = ?descriptor.scope,
      beans = batch.len() - 1,
      "registered component"
    );
    Ok(true)
  }

  /// Appends a processor to the chain. Only instances created afterwards are
  /// processed.
  pub fn add_post_processor(&self, processor: impl PostProcessor + 'static) {
    self.post_processors().push(Arc::new(processor));
  }

  /// Creates every singleton definition marked as a post-processor, which
  /// appends it to the chain. Returns how many are now active.
  pub fn initialize_singleton_post_processors(&self) -> Result<usize> {
    let mut initialized = 0;
    for definition in self.registry().definitions() {
      if definition.is_post_processor() && definition.scope() == Scope::Singleton {
        self.materialize(&definition, &mut CreationChain::new())?;
        initialized += 1;
      }
    }
    debug!(initialized, "initialized singleton post-processors");
    Ok(initialized)
  }

  /// Initializes post-processors, then every non-lazy singleton in
  /// registration order.
  pub fn refresh(&self) -> Result<()> {
    self.initialize_singleton_post_processors()?;
    let mut created = 0;
    for definition in self.registry().definitions() {
      if definition.scope() == Scope::Singleton && !definition.is_lazy() {
        self.materialize(&definition, &mut CreationChain::new())?;
        created += 1;
      }
    }
    info!(singletons = created, "container refreshed");
    Ok(())
  }

  /// Applies the container settings: scans the configured roots, then
  /// refreshes if eager initialization is on.
  pub fn bootstrap(&self) -> Result<()> {
    let roots: Vec<&str> = self.shared.settings.scan.iter().map(String::as_str).collect();
    self.scan_packages(&roots)?;
    if self.shared.settings.eager_init {
      self.refresh()?;
    }
    Ok(())
  }
}

/// Assembles a [`Container`].
#[derive(Default)]
pub struct ContainerBuilder {
  properties: Properties,
  catalog: Option<Catalog>,
  universe: Option<Arc<dyn TypeUniverse>>,
  presence: Option<Arc<dyn TypePresence>>,
  stereotypes: Option<StereotypeTable>,
  settings: ContainerSettings,
}

impl ContainerBuilder {
  /// Overlays `properties` on any already set.
  pub fn properties(mut self, properties: Properties) -> Self {
    self.properties = std::mem::take(&mut self.properties).merge(properties);
    self
  }

  /// Loads properties and settings from one YAML document.
  pub fn from_yaml_str(self, text: &str) -> Result<Self> {
    let properties = Properties::from_yaml_str(text)?;
    let settings = ContainerSettings::from_yaml_str(text)?;
    Ok(self.properties(properties).settings(settings))
  }

  /// Uses `catalog` both as the scanned type universe and as the
  /// type-presence oracle, unless those are set separately.
  pub fn catalog(mut self, catalog: Catalog) -> Self {
    self.catalog = Some(catalog);
    self
  }

  pub fn universe(mut self, universe: impl TypeUniverse + 'static) -> Self {
    self.universe = Some(Arc::new(universe));
    self
  }

  pub fn presence(mut self, presence: impl TypePresence + 'static) -> Self {
    self.presence = Some(Arc::new(presence));
    self
  }

  pub fn stereotypes(mut self, table: StereotypeTable) -> Self {
    self.stereotypes = Some(table);
    self
  }

  pub fn settings(mut self, settings: ContainerSettings) -> Self {
    self.settings = settings;
    self
  }

  pub fn build(self) -> Container {
    let catalog = self.catalog.unwrap_or_default();
    let universe = self
      .universe
      .unwrap_or_else(|| Arc::new(catalog.clone()) as Arc<dyn TypeUniverse>);
    let presence = self
      .presence
      .unwrap_or_else(|| Arc::new(catalog) as Arc<dyn TypePresence>);
    Container {
      shared: Arc::new(Shared {
        registry: Arc::new(Registry::new()),
        processors: PostProcessorChain::default(),
        properties: self.properties,
        presence,
        universe,
        stereotypes: self.stereotypes.unwrap_or_default(),
        settings: self.settings,
        scanned: DashSet::new(),
        components: DashSet::new(),
      }),
    }
  }
}

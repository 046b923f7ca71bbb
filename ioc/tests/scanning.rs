use fibre_context::{
  Attributes, BeanMethod, Catalog, Component, ComponentType, Condition, Container, Definition, Error,
  Extractor, InjectionPoint, Manifest, Marker, Properties, PropertyCondition, Scanner, Scope, Stereotype,
  StereotypeTable, TypeKey, SERVICE,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// --- Scanned Application Fixtures ---

mod app {
  pub mod repositories {
    use fibre_context::{Component, Definition, Manifest, Marker};

    pub const NS: &str = module_path!();

    pub trait Repository: Send + Sync {
      fn table(&self) -> &str;
    }

    pub struct OrderRepository;

    impl Repository for OrderRepository {
      fn table(&self) -> &str {
        "orders"
      }
    }

    impl Component for OrderRepository {
      fn manifest() -> Manifest<Self> {
        Manifest::new(
          Definition::of::<OrderRepository>()
            .factory(|_| Ok(OrderRepository))
            .provides::<dyn Repository>(|r| r),
        )
        .marker(Marker::repository())
      }
    }
  }

  pub mod services {
    use super::repositories::Repository;
    use fibre_context::{
      Component, Condition, Definition, InjectionPoint, Manifest, Marker, PropertyCondition,
    };
    use std::sync::Arc;

    pub const NS: &str = module_path!();

    pub struct OrderService {
      pub repository: Arc<dyn Repository>,
    }

    impl Component for OrderService {
      fn manifest() -> Manifest<Self> {
        Manifest::new(
          Definition::of::<OrderService>()
            .inject(InjectionPoint::required::<dyn Repository>())
            .constructor(|args| {
              Ok(OrderService {
                repository: args.take()?,
              })
            }),
        )
        .marker(Marker::service())
      }
    }

    pub struct CacheService;

    impl Component for CacheService {
      fn manifest() -> Manifest<Self> {
        Manifest::new(Definition::of::<CacheService>().factory(|_| Ok(CacheService)))
          .marker(Marker::service())
          .when(Condition::on_property(
            PropertyCondition::new("cache.enabled").having_value("true"),
          ))
      }
    }

    pub struct MetricsService;

    impl Component for MetricsService {
      fn manifest() -> Manifest<Self> {
        Manifest::new(Definition::of::<MetricsService>().factory(|_| Ok(MetricsService)))
          .marker(Marker::service())
          .when(Condition::new().requires_type("prometheus::Registry"))
      }
    }

    pub struct URLParser;

    impl Component for URLParser {
      fn manifest() -> Manifest<Self> {
        Manifest::new(Definition::of::<URLParser>().factory(|_| Ok(URLParser)))
          .marker(Marker::component().scope(fibre_context::Scope::Prototype))
      }
    }

    pub mod nested {
      use fibre_context::{Component, Definition, Manifest, Marker};

      pub struct AuditTrail;

      impl Component for AuditTrail {
        fn manifest() -> Manifest<Self> {
          Manifest::new(Definition::of::<AuditTrail>().factory(|_| Ok(AuditTrail)))
            .marker(Marker::new("audited"))
        }
      }
    }
  }
}

use app::repositories::{OrderRepository, Repository};
use app::services::nested::AuditTrail;
use app::services::{CacheService, MetricsService, OrderService, URLParser};

/// Carries no marker at all.
struct Helper;

impl Component for Helper {
  fn manifest() -> Manifest<Self> {
    Manifest::new(Definition::of::<Helper>().factory(|_| Ok(Helper)))
  }
}

fn catalog() -> Catalog {
  Catalog::new()
    .component::<OrderRepository>()
    .component::<OrderService>()
    .component::<CacheService>()
    .component::<MetricsService>()
    .component::<URLParser>()
    .component::<AuditTrail>()
    .component::<Helper>()
    .interface(format!("{}::Repository", app::repositories::NS))
    .abstract_type(format!("{}::AbstractService", app::services::NS))
}

fn stereotypes() -> StereotypeTable {
  StereotypeTable::builder()
    .define(Stereotype::new("audited").composes(SERVICE).defaults(Attributes {
      lazy: Some(true),
      ..Attributes::default()
    }))
    .build()
    .unwrap()
}

// --- Configuration Fixtures ---

struct DataSource {
  url: String,
}

struct CacheClient;

struct AppConfig {
  url: String,
}

impl Component for AppConfig {
  fn manifest() -> Manifest<Self> {
    Manifest::new(Definition::of::<AppConfig>().factory(|_| {
      Ok(AppConfig {
        url: "postgres://localhost/app".to_string(),
      })
    }))
    .marker(Marker::configuration())
    .bean(BeanMethod::<Self>::new("dataSource", |config| {
      Definition::of::<DataSource>().factory(move |injector| {
        let config = config.get(injector)?;
        Ok(DataSource { url: config.url.clone() })
      })
    }))
    .bean(
      BeanMethod::new("cacheClient", |_| Definition::of::<CacheClient>().factory(|_| Ok(CacheClient)))
        .when(Condition::on_property(PropertyCondition::new("cache.enabled"))),
    )
  }
}

/// A configuration without any marker.
struct PlainConfig;

impl Component for PlainConfig {
  fn manifest() -> Manifest<Self> {
    Manifest::new(Definition::of::<PlainConfig>().factory(|_| Ok(PlainConfig))).bean(BeanMethod::new(
      "greeting",
      |_| Definition::of::<String>().name("salutation").factory(|_| Ok("hello".to_string())),
    ))
  }
}

/// A configuration whose bean method claims a name that may already be bound.
struct CollidingConfig;

impl Component for CollidingConfig {
  fn manifest() -> Manifest<Self> {
    Manifest::new(Definition::of::<CollidingConfig>().factory(|_| Ok(CollidingConfig)))
      .marker(Marker::configuration())
      .bean(BeanMethod::<Self>::new("taken", |_| {
        Definition::of::<CacheClient>().factory(|_| Ok(CacheClient))
      }))
  }
}

// --- Scanning Tests ---

#[test]
fn test_scanner_finds_only_marked_concrete_components() {
  // Arrange
  let table = stereotypes();
  let scanner = Scanner::new(&table);
  let universe = catalog();

  // Act
  let found = scanner.scan(&universe, "scanning::app");

  // Assert
  let mut names: Vec<String> = found.iter().map(|c| c.descriptor.name.clone()).collect();
  names.sort();
  assert_eq!(
    names,
    vec!["URLParser", "auditTrail", "cacheService", "metricsService", "orderRepository", "orderService"]
  );
}

#[test]
fn test_scan_root_limits_the_namespace() {
  let table = stereotypes();
  let scanner = Scanner::new(&table);

  let found = scanner.scan(&catalog(), app::repositories::NS);

  assert_eq!(found.len(), 1);
  assert_eq!(found[0].descriptor.name, "orderRepository");
  assert_eq!(found[0].descriptor.stereotype, "repository");
}

#[test]
fn test_extractor_reads_nested_stereotype_defaults() {
  // Arrange
  let table = stereotypes();
  let extractor = Extractor::new(&table);
  let audit = ComponentType::of::<AuditTrail>();

  // Act
  let descriptor = extractor.describe(audit.type_key(), &audit.markers()).unwrap();

  // Assert
  assert_eq!(descriptor.stereotype, "audited");
  assert!(descriptor.lazy);
  assert_eq!(descriptor.scope, Scope::Singleton);
  assert!(extractor
    .describe(TypeKey::of::<Helper>(), &ComponentType::of::<Helper>().markers())
    .is_none());
}

#[test]
fn test_scan_packages_registers_matching_components() {
  // Arrange
  let container = Container::builder()
    .catalog(catalog())
    .stereotypes(stereotypes())
    .properties(Properties::new().set("cache.enabled", "true"))
    .build();

  // Act
  let installed = container.scan_packages(&["scanning::app"]).unwrap();

  // Assert
  assert_eq!(installed, 5);
  assert!(container.contains_type::<CacheService>());
  assert!(!container.contains_type::<MetricsService>());
  assert!(!container.contains_type::<Helper>());

  let service = container.get::<OrderService>().unwrap();
  assert_eq!(service.repository.table(), "orders");
  let repository = container.get_named::<dyn Repository>("orderRepository").unwrap();
  assert!(Arc::ptr_eq(&service.repository, &repository));

  let parser = container.definitions_for::<URLParser>();
  assert_eq!(parser[0].scope(), Scope::Prototype);
  assert_eq!(parser[0].name(), Some("URLParser"));
}

#[test]
fn test_property_condition_skips_component() {
  // Arrange
  let container = Container::builder()
    .catalog(catalog())
    .stereotypes(stereotypes())
    .properties(Properties::new().set("cache.enabled", "false"))
    .build();

  // Act
  container.scan_packages(&[app::services::NS]).unwrap();

  // Assert
  assert!(!container.contains_type::<CacheService>());
  assert!(!container.contains_name("cacheService"));
  assert!(container.contains_type::<OrderService>());
}

#[test]
fn test_type_presence_condition_uses_the_catalog() {
  // Arrange
  let container = Container::builder()
    .catalog(catalog().plain("prometheus::Registry"))
    .stereotypes(stereotypes())
    .build();

  // Act
  container.scan_packages(&[app::services::NS]).unwrap();

  // Assert
  assert!(container.contains_type::<MetricsService>());
}

#[test]
fn test_rescanning_a_root_is_a_no_op() {
  // Arrange
  let container = Container::builder().catalog(catalog()).stereotypes(stereotypes()).build();
  let first = container.scan_packages(&[app::repositories::NS]).unwrap();

  // Act
  let second = container.scan_packages(&[app::repositories::NS, "scanning::app"]).unwrap();

  // Assert
  assert_eq!(first, 1);
  // The overlapping root only adds components not registered yet; the
  // conditional ones stay out.
  assert_eq!(second, 3);
  assert_eq!(container.definitions_for::<dyn Repository>().len(), 1);
}

#[test]
fn test_unknown_stereotype_reference_is_rejected() {
  let result = StereotypeTable::builder()
    .define(Stereotype::new("audited").composes("missing"))
    .build();
  assert!(matches!(result, Err(Error::Stereotype(_))));
}

#[test]
fn test_configuration_bean_methods() {
  // Arrange
  let container = Container::new();

  // Act
  let installed = container
    .register_configurations(&[ComponentType::of::<AppConfig>()])
    .unwrap();

  // Assert
  assert_eq!(installed, 1);
  assert!(container.contains_name("appConfig"));
  assert!(container.contains_name("dataSource"));
  assert!(!container.contains_name("cacheClient"));

  let data_source = container.get::<DataSource>().unwrap();
  assert_eq!(data_source.url, "postgres://localhost/app");
  let by_name = container.get_named::<DataSource>("dataSource").unwrap();
  assert!(Arc::ptr_eq(&data_source, &by_name));
  assert!(container.get::<CacheClient>().is_err());
}

#[test]
fn test_bean_method_condition_can_match() {
  // Arrange
  let container = Container::builder()
    .properties(Properties::new().set("cache.enabled", "yes"))
    .build();

  // Act
  container
    .register_configurations(&[ComponentType::of::<AppConfig>()])
    .unwrap();

  // Assert
  assert!(container.contains_name("cacheClient"));
  assert!(container.get::<CacheClient>().is_ok());
}

#[test]
fn test_unmarked_configuration_and_explicit_bean_names() {
  // Arrange
  let container = Container::new();

  // Act
  container
    .register_configurations(&[ComponentType::of::<PlainConfig>()])
    .unwrap();

  // Assert
  let config = container.definitions_for::<PlainConfig>();
  assert_eq!(config[0].stereotype(), Some("configuration"));
  assert!(container.contains_name("plainConfig"));
  assert!(container.contains_name("salutation"));
  assert!(!container.contains_name("greeting"));
  assert_eq!(*container.get_named::<String>("salutation").unwrap(), "hello");
}

#[test]
fn test_bootstrap_from_yaml_settings() {
  static CREATED: AtomicUsize = AtomicUsize::new(0);

  struct Warmup;

  impl Component for Warmup {
    fn manifest() -> Manifest<Self> {
      Manifest::new(Definition::of::<Warmup>().factory(|_| {
        CREATED.fetch_add(1, Ordering::SeqCst);
        Ok(Warmup)
      }))
      .marker(Marker::component())
    }
  }

  const YAML: &str = r#"
cache:
  enabled: "true"
fibre:
  context:
    scan:
      - scanning::test_bootstrap_from_yaml_settings
"#;

  // Arrange
  let container = Container::builder()
    .from_yaml_str(YAML)
    .unwrap()
    .catalog(Catalog::new().component::<Warmup>())
    .build();

  // Act
  container.bootstrap().unwrap();

  // Assert
  assert_eq!(container.properties().get("cache.enabled"), Some("true"));
  assert_eq!(container.settings().scan.len(), 1);
  assert_eq!(CREATED.load(Ordering::SeqCst), 1);
  container.get::<Warmup>().unwrap();
  assert_eq!(CREATED.load(Ordering::SeqCst), 1);
}

#[test]
fn test_descriptor_scope_reaches_the_definition() {
  // Arrange
  let container = Container::builder().catalog(catalog()).stereotypes(stereotypes()).build();
  container.scan_packages(&[app::services::NS]).unwrap();

  // Act
  let first = container.get::<URLParser>().unwrap();
  let second = container.get::<URLParser>().unwrap();
  let audit = container.definitions_for::<AuditTrail>();

  // Assert
  assert!(!Arc::ptr_eq(&first, &second));
  assert!(audit[0].is_lazy());
  assert_eq!(audit[0].stereotype(), Some("audited"));
}

#[test]
fn test_duplicate_derived_names_fail_registration() {
  mod first {
    use fibre_context::{Component, Definition, Manifest, Marker};
    pub struct Gateway;
    impl Component for Gateway {
      fn manifest() -> Manifest<Self> {
        Manifest::new(Definition::of::<Gateway>().factory(|_| Ok(Gateway))).marker(Marker::service())
      }
    }
  }
  mod second {
    use fibre_context::{Component, Definition, Manifest, Marker};
    pub struct Gateway;
    impl Component for Gateway {
      fn manifest() -> Manifest<Self> {
        Manifest::new(Definition::of::<Gateway>().factory(|_| Ok(Gateway))).marker(Marker::service())
      }
    }
  }

  // Arrange
  let container = Container::builder()
    .catalog(
      Catalog::new()
        .component::<first::Gateway>()
        .component::<second::Gateway>(),
    )
    .build();

  // Act
  let err = container.scan_packages(&[""]).unwrap_err();

  // Assert
  assert!(matches!(err, Error::DuplicateName { ref name, .. } if name == "gateway"));
  // A root that failed is not marked as scanned, so the next call retries it.
  let retried = container.scan_packages(&[""]).unwrap_err();
  assert!(matches!(retried, Error::DuplicateName { ref name, .. } if name == "gateway"));
  assert_eq!(container.definitions_for::<first::Gateway>().len(), 1);
}

#[test]
fn test_failed_bean_method_rolls_back_its_configuration() {
  // Arrange
  let container = Container::new();
  container
    .register(Definition::instance(7_u32).name("taken").build().unwrap())
    .unwrap();
  let types = [ComponentType::of::<CollidingConfig>()];

  // Act
  let first = container.register_configurations(&types).unwrap_err();
  let second = container.register_configurations(&types).unwrap_err();

  // Assert
  assert!(matches!(first, Error::DuplicateName { ref name, .. } if name == "taken"));
  // The retry trips over the same bean method, not a leftover configuration.
  assert!(matches!(second, Error::DuplicateName { ref name, .. } if name == "taken"));
  assert!(!container.contains_name("collidingConfig"));
  assert!(!container.contains_type::<CollidingConfig>());
  assert!(container.definitions_for::<CacheClient>().is_empty());
  assert_eq!(*container.get_named::<u32>("taken").unwrap(), 7);
}

#[test]
fn test_optional_dependency_on_conditional_component() {
  struct Reporter {
    cache: Option<Arc<CacheService>>,
  }

  // Arrange
  let container = Container::builder().catalog(catalog()).stereotypes(stereotypes()).build();
  container.scan_packages(&[app::services::NS]).unwrap();
  container
    .register(
      Definition::of::<Reporter>()
        .inject(InjectionPoint::optional::<CacheService>())
        .constructor(|args| Ok(Reporter { cache: args.take()? }))
        .build()
        .unwrap(),
    )
    .unwrap();

  // Act
  let reporter = container.get::<Reporter>().unwrap();

  // Assert
  assert!(reporter.cache.is_none());
}

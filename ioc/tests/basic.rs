use fibre_context::{BeanSet, Container, Definition, Error, InjectionPoint, Registry, Scope};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// --- Test Fixtures ---

trait Service: Send + Sync {
  fn name(&self) -> &str;
}

struct Alpha;
impl Service for Alpha {
  fn name(&self) -> &str {
    "alpha"
  }
}

struct Beta;
impl Service for Beta {
  fn name(&self) -> &str {
    "beta"
  }
}

fn alpha(primary: bool) -> Arc<Definition> {
  Definition::of::<Alpha>()
    .name("alpha")
    .factory(|_| Ok(Alpha))
    .primary(primary)
    .provides::<dyn Service>(|a| a)
    .build()
    .unwrap()
}

fn beta() -> Arc<Definition> {
  Definition::of::<Beta>()
    .name("beta")
    .factory(|_| Ok(Beta))
    .provides::<dyn Service>(|b| b)
    .build()
    .unwrap()
}

// --- Basic Tests ---

#[test]
fn test_singleton_is_created_once() {
  // Arrange
  let container = Container::new();
  container.add_singleton(|_| Ok(String::from("shared"))).unwrap();

  // Act
  let first = container.get::<String>().unwrap();
  let second = container.get::<String>().unwrap();

  // Assert
  assert!(Arc::ptr_eq(&first, &second));
  assert_eq!(container.registry().singleton_count(), 1);
}

#[test]
fn test_prototype_is_created_per_request() {
  static CREATED: AtomicUsize = AtomicUsize::new(0);
  struct Ticket(usize);

  // Arrange
  let container = Container::new();
  container
    .add_prototype(|_| Ok(Ticket(CREATED.fetch_add(1, Ordering::SeqCst))))
    .unwrap();

  // Act
  let first = container.get::<Ticket>().unwrap();
  let second = container.get::<Ticket>().unwrap();

  // Assert
  assert!(!Arc::ptr_eq(&first, &second));
  assert_ne!(first.0, second.0);
  assert_eq!(container.registry().singleton_count(), 0);
}

#[test]
fn test_same_definition_under_type_and_name_is_one_instance() {
  struct X;

  // Arrange
  let container = Container::new();
  let definition = Definition::of::<X>().factory(|_| Ok(X)).build().unwrap();
  container.register_type::<X>(definition.clone()).unwrap();
  container.register_name("x", definition).unwrap();

  // Act
  let by_type = container.get::<X>().unwrap();
  let by_name = container.get_named::<X>("x").unwrap();

  // Assert
  assert!(Arc::ptr_eq(&by_type, &by_name));
  assert!(container.contains_name("x"));
  assert!(container.contains_type::<X>());
}

#[test]
fn test_primary_disambiguates_trait_resolution() {
  // Arrange
  let container = Container::new();
  container.register(alpha(true)).unwrap();
  container.register(beta()).unwrap();

  // Act
  let service = container.get::<dyn Service>().unwrap();

  // Assert
  assert_eq!(service.name(), "alpha");
  assert_eq!(container.definitions_for::<dyn Service>().len(), 2);
}

#[test]
fn test_ambiguous_without_primary() {
  // Arrange
  let container = Container::new();
  container.register(alpha(false)).unwrap();
  container.register(beta()).unwrap();

  // Act
  let err = container.get::<dyn Service>().err().unwrap();

  // Assert
  match err {
    Error::Ambiguous { candidates, .. } => assert_eq!(candidates, vec!["alpha", "beta"]),
    other => panic!("expected an ambiguity error, got {other}"),
  }
  // Collection resolution does not care about ambiguity.
  assert_eq!(container.get_all::<dyn Service>().unwrap().len(), 2);
}

#[test]
fn test_named_lookup_checks_assignability() {
  // Arrange
  let container = Container::new();
  container.register(alpha(false)).unwrap();

  // Act
  let as_service = container.get_named::<dyn Service>("alpha").unwrap();
  let wrong = container.get_named::<Beta>("alpha").err().unwrap();
  let missing = container.get_named::<Alpha>("gamma").err().unwrap();

  // Assert
  assert_eq!(as_service.name(), "alpha");
  assert!(matches!(wrong, Error::NotAssignable { .. }));
  assert!(matches!(missing, Error::NoSuchName { ref name } if name == "gamma"));
}

#[test]
fn test_bean_by_name_returns_the_erased_instance() {
  // Arrange
  let container = Container::new();
  container.register(alpha(false)).unwrap();

  // Act
  let instance = container.bean("alpha").unwrap();

  // Assert
  let typed = instance.downcast::<Alpha>().ok().unwrap();
  assert!(Arc::ptr_eq(&typed, &container.get::<Alpha>().unwrap()));
}

#[test]
fn test_duplicate_name_is_rejected() {
  // Arrange
  let container = Container::new();
  container.register(alpha(false)).unwrap();

  // Act
  let err = container
    .register(Definition::of::<Beta>().name("alpha").factory(|_| Ok(Beta)).build().unwrap())
    .unwrap_err();

  // Assert
  assert!(matches!(err, Error::DuplicateName { ref name, .. } if name == "alpha"));
}

#[test]
fn test_register_type_requires_an_exposed_key() {
  // Arrange
  let container = Container::new();
  let definition = Definition::of::<Beta>().factory(|_| Ok(Beta)).build().unwrap();

  // Act
  let err = container.register_type::<dyn Service>(definition).unwrap_err();

  // Assert
  assert!(matches!(err, Error::NotAssignable { .. }));
  assert!(!container.contains_type::<dyn Service>());
}

#[test]
fn test_unregistered_type_is_no_such_bean() {
  struct Ghost;

  let container = Container::new();
  assert!(matches!(container.get::<Ghost>(), Err(Error::NoSuchBean { .. })));
  assert!(!container.contains_type::<Ghost>());
}

#[test]
fn test_constructor_injection() {
  struct Repository;
  struct Handler {
    repository: Arc<Repository>,
    services: Vec<Arc<dyn Service>>,
  }

  // Arrange
  let container = Container::new();
  container.add_singleton(|_| Ok(Repository)).unwrap();
  container.register(alpha(false)).unwrap();
  container.register(beta()).unwrap();
  container
    .register(
      Definition::of::<Handler>()
        .inject(InjectionPoint::required::<Repository>())
        .inject(InjectionPoint::all::<dyn Service>())
        .constructor(|args| {
          Ok(Handler {
            repository: args.take()?,
            services: args.take()?,
          })
        })
        .build()
        .unwrap(),
    )
    .unwrap();

  // Act
  let handler = container.get::<Handler>().unwrap();

  // Assert
  assert!(Arc::ptr_eq(&handler.repository, &container.get::<Repository>().unwrap()));
  let names: Vec<&str> = handler.services.iter().map(|s| s.name()).collect();
  assert_eq!(names, vec!["alpha", "beta"]);
}

#[test]
fn test_collection_of_three_and_set_shape() {
  struct Gamma;
  impl Service for Gamma {
    fn name(&self) -> &str {
      "gamma"
    }
  }
  struct Registry3 {
    all: Vec<Arc<dyn Service>>,
    distinct: BeanSet<dyn Service>,
  }

  // Arrange
  let container = Container::new();
  container.register(alpha(false)).unwrap();
  container.register(beta()).unwrap();
  container
    .register(
      Definition::of::<Gamma>()
        .factory(|_| Ok(Gamma))
        .provides::<dyn Service>(|g| g)
        .build()
        .unwrap(),
    )
    .unwrap();
  container
    .register(
      Definition::of::<Registry3>()
        .inject(InjectionPoint::all::<dyn Service>())
        .inject(InjectionPoint::set::<dyn Service>())
        .constructor(|args| {
          Ok(Registry3 {
            all: args.take()?,
            distinct: args.take()?,
          })
        })
        .build()
        .unwrap(),
    )
    .unwrap();

  // Act
  let registry = container.get::<Registry3>().unwrap();

  // Assert
  assert_eq!(registry.all.len(), 3);
  assert_eq!(registry.distinct.len(), 3);
  for service in &registry.all {
    assert!(registry.distinct.contains(service));
  }

  // The same instance collected twice shows up once in a set.
  let doubled: BeanSet<dyn Service> = registry
    .all
    .iter()
    .chain(registry.all.iter())
    .cloned()
    .collect();
  assert_eq!(doubled.len(), 3);
}

#[test]
fn test_set_point_drops_an_instance_exposed_twice() {
  struct AlphaHandle {
    alpha: Arc<Alpha>,
  }
  struct Directory {
    all: Vec<Arc<dyn Service>>,
    distinct: BeanSet<dyn Service>,
  }

  // Arrange: the handle exposes the very Alpha instance it wraps.
  let container = Container::new();
  container.register(alpha(false)).unwrap();
  container
    .register(
      Definition::of::<AlphaHandle>()
        .inject(InjectionPoint::required::<Alpha>())
        .constructor(|args| Ok(AlphaHandle { alpha: args.take()? }))
        .provides::<dyn Service>(|handle| handle.alpha.clone())
        .build()
        .unwrap(),
    )
    .unwrap();
  container
    .register(
      Definition::of::<Directory>()
        .inject(InjectionPoint::all::<dyn Service>())
        .inject(InjectionPoint::set::<dyn Service>())
        .constructor(|args| {
          Ok(Directory {
            all: args.take()?,
            distinct: args.take()?,
          })
        })
        .build()
        .unwrap(),
    )
    .unwrap();

  // Act
  let directory = container.get::<Directory>().unwrap();

  // Assert
  assert_eq!(directory.all.len(), 2);
  assert_eq!(directory.distinct.len(), 1);
  let alpha: Arc<dyn Service> = container.get::<Alpha>().unwrap();
  assert!(directory.distinct.contains(&alpha));
  assert_eq!(directory.distinct.iter().next().map(|s| s.name()), Some("alpha"));
}

#[test]
fn test_optional_point_for_unregistered_type_is_empty() {
  struct Missing;
  struct Consumer {
    missing: Option<Arc<Missing>>,
    none_of_them: Vec<Arc<Missing>>,
  }

  // Arrange
  let container = Container::new();
  container
    .register(
      Definition::of::<Consumer>()
        .inject(InjectionPoint::optional::<Missing>())
        .inject(InjectionPoint::all::<Missing>().not_required())
        .constructor(|args| {
          Ok(Consumer {
            missing: args.take()?,
            none_of_them: args.take()?,
          })
        })
        .build()
        .unwrap(),
    )
    .unwrap();

  // Act
  let consumer = container.get::<Consumer>().unwrap();

  // Assert
  assert!(consumer.missing.is_none());
  assert!(consumer.none_of_them.is_empty());
}

#[test]
fn test_absent_factory_result_fails_required_points() {
  struct Token;
  struct NeedsToken {
    _token: Arc<Token>,
  }
  struct MaybeToken {
    token: Option<Arc<Token>>,
  }

  // Arrange
  let container = Container::new();
  container
    .register(Definition::of::<Token>().optional_factory(|_| Ok(None)).build().unwrap())
    .unwrap();
  container
    .register(
      Definition::of::<NeedsToken>()
        .inject(InjectionPoint::required::<Token>().described("token of NeedsToken"))
        .constructor(|args| Ok(NeedsToken { _token: args.take()? }))
        .build()
        .unwrap(),
    )
    .unwrap();
  container
    .register(
      Definition::of::<MaybeToken>()
        .inject(InjectionPoint::optional::<Token>())
        .constructor(|args| Ok(MaybeToken { token: args.take()? }))
        .build()
        .unwrap(),
    )
    .unwrap();

  // Act
  let required = container.get::<NeedsToken>().err().unwrap();
  let optional = container.get::<MaybeToken>().unwrap();

  // Assert
  assert!(matches!(
    required,
    Error::Unsatisfied { ref description, .. } if description == "token of NeedsToken"
  ));
  assert!(optional.token.is_none());
}

#[test]
fn test_pre_destroy_on_prototype_fails_at_registration() {
  struct Connection;

  // Act
  let result = Definition::of::<Connection>()
    .factory(|_| Ok(Connection))
    .scope(Scope::Prototype)
    .pre_destroy("close", |_| Ok(()))
    .build();

  // Assert
  assert!(matches!(result, Err(Error::InvalidLifecycle { .. })));
}

#[test]
fn test_definition_without_factory_is_incomplete() {
  struct Orphan;
  let result = Definition::of::<Orphan>().build();
  assert!(matches!(result, Err(Error::IncompleteDefinition { .. })));
}

#[test]
fn test_framework_singletons_are_injectable() {
  struct Introspector {
    container: Arc<Container>,
    registry: Arc<Registry>,
  }

  // Arrange
  let container = Container::new();
  container
    .register(
      Definition::of::<Introspector>()
        .prototype()
        .inject(InjectionPoint::required::<Container>())
        .inject(InjectionPoint::required::<Registry>())
        .constructor(|args| {
          Ok(Introspector {
            container: args.take()?,
            registry: args.take()?,
          })
        })
        .build()
        .unwrap(),
    )
    .unwrap();

  // Act
  let introspector = container.get::<Introspector>().unwrap();

  // Assert
  assert!(container.contains_type::<Container>());
  assert!(Arc::ptr_eq(&introspector.registry, container.registry()));
  assert!(introspector.container.contains_type::<Introspector>());
}

#[test]
fn test_instance_registration() {
  // Arrange
  let container = Container::new();
  container.add_instance(42_u32).unwrap();

  // Act & Assert
  assert_eq!(*container.get::<u32>().unwrap(), 42);
}

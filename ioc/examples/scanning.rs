use fibre_context::{
  BeanMethod, Catalog, Component, Condition, Container, Definition, InjectionPoint, Manifest, Marker,
  PropertyCondition,
};
use std::sync::Arc;

const CONFIG: &str = r#"
greeting:
  text: "Hello from the catalog"
shouting: "true"
fibre:
  context:
    scan: [scanning::services]
    eager-init: true
"#;

mod services {
  use super::*;

  pub struct Greeting {
    pub text: String,
  }

  pub struct GreetingService {
    pub greeting: Arc<Greeting>,
  }

  impl Component for GreetingService {
    fn manifest() -> Manifest<Self> {
      Manifest::new(
        Definition::of::<GreetingService>()
          .inject(InjectionPoint::required::<Greeting>())
          .constructor(|args| Ok(GreetingService { greeting: args.take()? })),
      )
      .marker(Marker::service())
    }
  }

  pub struct Shouter;

  impl Component for Shouter {
    fn manifest() -> Manifest<Self> {
      Manifest::new(Definition::of::<Shouter>().factory(|_| Ok(Shouter)))
        .marker(Marker::service())
        .when(Condition::on_property(PropertyCondition::new("shouting").having_value("true")))
    }
  }

  pub struct GreetingConfig;

  impl Component for GreetingConfig {
    fn manifest() -> Manifest<Self> {
      Manifest::new(Definition::of::<GreetingConfig>().factory(|_| Ok(GreetingConfig)))
        .marker(Marker::configuration())
        .bean(BeanMethod::<Self>::new("greeting", |_| {
          Definition::of::<Greeting>().factory(|injector| {
            let container = injector.container();
            let text = container.properties().get("greeting.text").unwrap_or("Hello");
            Ok(Greeting { text: text.to_string() })
          })
        }))
    }
  }
}

fn main() -> fibre_context::Result<()> {
  let catalog = Catalog::new()
    .component::<services::GreetingService>()
    .component::<services::Shouter>()
    .component::<services::GreetingConfig>();

  let container = Container::builder().from_yaml_str(CONFIG)?.catalog(catalog).build();
  container.bootstrap()?;

  let service = container.get::<services::GreetingService>()?;
  println!("{}", service.greeting.text);
  if container.contains_type::<services::Shouter>() {
    println!("{}!", service.greeting.text.to_uppercase());
  }
  Ok(())
}

use fibre_context::{Container, Definition, InjectionPoint};
use std::sync::Arc;

// 1. Define the abstraction (the trait)
trait Logger: Send + Sync {
  fn log(&self, message: &str);
}

// 2. Define two implementations; the console one is preferred
struct ConsoleLogger;
impl Logger for ConsoleLogger {
  fn log(&self, message: &str) {
    println!("[CONSOLE LOG]: {}", message);
  }
}

struct NullLogger;
impl Logger for NullLogger {
  fn log(&self, _message: &str) {}
}

// 3. Define a service that depends on the abstraction
struct ReportService {
  logger: Arc<dyn Logger>,
  all_loggers: Vec<Arc<dyn Logger>>,
}

impl ReportService {
  fn generate_report(&self) {
    self.logger.log("Starting report generation.");
    self
      .logger
      .log(&format!("{} loggers are registered.", self.all_loggers.len()));
    self.logger.log("Finished report generation.");
  }
}

fn main() -> fibre_context::Result<()> {
  let container = Container::new();

  // --- Registration ---

  // Both loggers expose `dyn Logger`; `primary` settles scalar lookups.
  container.register(
    Definition::of::<ConsoleLogger>()
      .factory(|_| Ok(ConsoleLogger))
      .primary(true)
      .provides::<dyn Logger>(|l| l)
      .build()?,
  )?;
  container.register(
    Definition::of::<NullLogger>()
      .factory(|_| Ok(NullLogger))
      .provides::<dyn Logger>(|l| l)
      .build()?,
  )?;

  // The service declares what it needs; the container supplies it.
  container.register(
    Definition::of::<ReportService>()
      .inject(InjectionPoint::required::<dyn Logger>())
      .inject(InjectionPoint::all::<dyn Logger>())
      .constructor(|args| {
        Ok(ReportService {
          logger: args.take()?,
          all_loggers: args.take()?,
        })
      })
      .build()?,
  )?;

  // --- Resolution and Usage ---
  println!("Resolving the high-level service...");
  let report_service = container.get::<ReportService>()?;

  println!("Using the service...");
  report_service.generate_report();
  Ok(())
}

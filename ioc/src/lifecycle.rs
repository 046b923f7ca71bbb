//! Instance creation, lifecycle callbacks and shutdown.

use crate::container::Container;
use crate::core::{CreationChain, Instance};
use crate::definition::{Definition, Scope};
use crate::error::{Error, Result};
use crate::injection::Injector;
use crate::post_processor::Bean;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// The stages one instance passes through, each entered exactly once.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
  NotStarted,
  Constructing,
  InjectingFields,
  PostConstructing,
  Ready,
}

/// Tracks the phase of a single instance under construction.
pub struct Creation<'d> {
  definition: &'d Definition,
  phase: Phase,
}

impl<'d> Creation<'d> {
  pub(crate) fn new(definition: &'d Definition) -> Self {
    Self {
      definition,
      phase: Phase::NotStarted,
    }
  }

  pub fn phase(&self) -> Phase {
    self.phase
  }

  pub(crate) fn advance(&mut self, next: Phase) {
    debug_assert!(next > self.phase, "phase {:?} entered after {:?}", next, self.phase);
    trace!(bean = %self.definition.display_name(), from = ?self.phase, to = ?next, "creation phase");
    self.phase = next;
  }
}

/// A pre-destroy hook that failed during shutdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookFailure {
  pub bean: String,
  pub hook: String,
  pub message: String,
}

/// What `destroy_singletons` did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
  /// Number of hooks invoked, failed or not.
  pub invoked: usize,
  pub failures: Vec<HookFailure>,
}

impl ShutdownReport {
  pub fn is_clean(&self) -> bool {
    self.failures.is_empty()
  }
}

impl Container {
  /// Returns the instance for `definition`, creating it if needed.
  ///
  /// Singletons are computed at most once per definition, even when several
  /// threads ask concurrently. The definition's type is pushed onto the
  /// creation chain, and the definition is marked in progress for this thread,
  /// before construction. Re-entry through either fails fast instead of
  /// dead-locking on the cache cell.
  pub(crate) fn materialize(
    &self,
    definition: &Arc<Definition>,
    chain: &mut CreationChain,
  ) -> Result<Option<Instance>> {
    let key = definition.type_key();
    match definition.scope() {
      Scope::Singleton => {
        let cell = self.registry().singleton_cell(definition.id());
        if let Some(existing) = cell.get() {
          return Ok(existing.clone());
        }
        chain.enter(key)?;
        let result = self.registry().enter_creation(definition).and_then(|_guard| {
          cell
            .get_or_try_init(|| self.create(definition, chain))
            .map(|instance| instance.clone())
        });
        chain.exit(key);
        result
      }
      Scope::Prototype => {
        chain.enter(key)?;
        let result = self
          .registry()
          .enter_creation(definition)
          .and_then(|_guard| self.create(definition, chain));
        chain.exit(key);
        result
      }
    }
  }

  fn create(&self, definition: &Arc<Definition>, chain: &mut CreationChain) -> Result<Option<Instance>> {
    let mut creation = Creation::new(definition);
    let produced = {
      let mut injector = Injector::new(self, chain);
      definition.produce(&mut injector, &mut creation)?
    };
    let Some(instance) = produced else {
      debug!(bean = %definition.display_name(), "factory produced no instance");
      return Ok(None);
    };

    creation.advance(Phase::PostConstructing);
    for hook in definition.post_construct_hooks() {
      hook.invoke(&instance).map_err(|source| Error::Instantiation {
        type_name: definition.type_name().to_string(),
        source: format!("post-construct hook '{}' failed: {}", hook.name(), source).into(),
      })?;
    }

    self
      .post_processors()
      .apply(&Bean::new(definition, &instance), self)?;

    if definition.scope() == Scope::Singleton {
      if !definition.pre_destroy_hooks().is_empty() {
        self
          .registry()
          .register_destruction(definition.clone(), instance.clone());
      }
      if let Some(processor) = definition.as_post_processor(&instance) {
        debug!(bean = %definition.display_name(), "singleton joined the post-processor chain");
        self.post_processors().push_owned(definition.id(), processor);
      }
    }

    creation.advance(Phase::Ready);
    Ok(Some(instance))
  }

  /// Runs every registered pre-destroy hook, then clears the hook table and
  /// the singleton cache.
  ///
  /// Hooks run newest instance first. A failing or panicking hook is logged
  /// and recorded in the report; it never stops the remaining hooks.
  /// Registrations survive, so a later `get` creates fresh instances.
  pub fn destroy_singletons(&self) -> ShutdownReport {
    let entries = self.registry().take_destruction();
    let mut report = ShutdownReport::default();

    for entry in entries.iter().rev() {
      let bean = entry.definition.display_name();
      for hook in entry.definition.pre_destroy_hooks() {
        report.invoked += 1;
        let outcome = catch_unwind(AssertUnwindSafe(|| hook.invoke(&entry.instance)));
        let message = match outcome {
          Ok(Ok(())) => continue,
          Ok(Err(err)) => err.to_string(),
          Err(_) => "hook panicked".to_string(),
        };
        warn!(bean = %bean, hook = hook.name(), error = %message, "pre-destroy hook failed");
        report.failures.push(HookFailure {
          bean: bean.clone(),
          hook: hook.name().to_string(),
          message,
        });
      }
    }

    self.registry().clear_singletons();
    self.post_processors().release_owned();
    info!(
      hooks = report.invoked,
      failures = report.failures.len(),
      "destroyed singletons"
    );
    report
  }
}

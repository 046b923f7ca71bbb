//! The process-wide container and its accessor.

use crate::container::Container;
use once_cell::sync::Lazy;

// Created on first access.
static GLOBAL_CONTAINER: Lazy<Container> = Lazy::new(Container::default);

/// Returns the process-wide container.
///
/// Any part of an application can register definitions on it, and the
/// [`resolve!`](crate::resolve) macros read from it.
///
/// # Examples
///
/// ```
/// use fibre_context::global;
///
/// global().add_instance(String::from("Hello from global!")).unwrap();
/// assert!(global().contains_type::<String>());
/// ```
pub fn global() -> &'static Container {
  &GLOBAL_CONTAINER
}

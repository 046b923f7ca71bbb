//! Panicking resolution shorthands over the global container.

/// Resolves a bean from the global container.
///
/// # Panics
///
/// Panics with the container's error message if the bean cannot be resolved.
/// Use [`maybe_resolve!`](crate::maybe_resolve) or `global().get::<T>()` to
/// handle the failure instead.
///
/// # Examples
///
/// ```
/// use fibre_context::{global, resolve, Definition};
/// use std::sync::Arc;
///
/// trait Greeter: Send + Sync { fn greet(&self) -> String; }
/// struct English;
/// impl Greeter for English { fn greet(&self) -> String { "Hello!".to_string() } }
///
/// global()
///   .register(
///     Definition::of::<English>()
///       .name("english")
///       .factory(|_| Ok(English))
///       .provides::<dyn Greeter>(|e| e)
///       .build()
///       .unwrap(),
///   )
///   .unwrap();
///
/// let greeter = resolve!(trait Greeter);
/// assert_eq!(greeter.greet(), "Hello!");
/// let same = resolve!(trait Greeter, "english");
/// assert!(Arc::ptr_eq(&greeter, &same));
/// ```
#[macro_export]
macro_rules! resolve {
  (trait $trait_ident:ident) => {
    $crate::resolve_from!($crate::global(), trait $trait_ident)
  };

  (trait $trait_ident:ident, $name:expr) => {
    $crate::resolve_from!($crate::global(), trait $trait_ident, $name)
  };

  ($type:ty) => {
    $crate::resolve_from!($crate::global(), $type)
  };

  ($type:ty, $name:expr) => {
    $crate::resolve_from!($crate::global(), $type, $name)
  };
}

/// Like [`resolve!`](crate::resolve) but against an explicit container.
#[macro_export]
macro_rules! resolve_from {
  ($container:expr, trait $trait_ident:ident) => {
    $container
      .get::<dyn $trait_ident>()
      .unwrap_or_else(|err| panic!("Failed to resolve required service: {}", err))
  };

  ($container:expr, trait $trait_ident:ident, $name:expr) => {
    $container
      .get_named::<dyn $trait_ident>($name)
      .unwrap_or_else(|err| panic!("Failed to resolve required service: {}", err))
  };

  ($container:expr, $type:ty) => {
    $container
      .get::<$type>()
      .unwrap_or_else(|err| panic!("Failed to resolve required service: {}", err))
  };

  ($container:expr, $type:ty, $name:expr) => {
    $container
      .get_named::<$type>($name)
      .unwrap_or_else(|err| panic!("Failed to resolve required service: {}", err))
  };
}

/// Resolves a bean from the global container, or `None` when it cannot be
/// resolved for any reason.
#[macro_export]
macro_rules! maybe_resolve {
  (trait $trait_ident:ident) => {
    $crate::global().get::<dyn $trait_ident>().ok()
  };

  (trait $trait_ident:ident, $name:expr) => {
    $crate::global().get_named::<dyn $trait_ident>($name).ok()
  };

  ($type:ty) => {
    $crate::global().get::<$type>().ok()
  };

  ($type:ty, $name:expr) => {
    $crate::global().get_named::<$type>($name).ok()
  };
}

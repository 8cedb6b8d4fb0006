//! Utilities to inject and resolve dependencies

use crate::types::TypeDef;

/// A trait for types that describe how the container constructs them.
///
/// The returned [`TypeDef`] declares the constructors, bases and members of `Self`.
/// It can be derived with `#[derive(Injectable)]` when every field is a
/// [`Dependency`](crate::Dependency).
///
/// # Example
/// ```no_run
/// use rivet::{ContainerBuilder, Dc, Injectable, TypeDef};
///
/// #[derive(Default)]
/// struct Clock;
///
/// struct Scheduler {
///     clock: Dc<Clock>,
/// }
///
/// impl Injectable for Scheduler {
///     fn type_def() -> TypeDef {
///         TypeDef::of::<Scheduler>()
///             .constructor_fn(|clock: Dc<Clock>| Ok(Scheduler { clock }))
///     }
/// }
///
/// let mut builder = ContainerBuilder::new();
/// builder.register_singleton_default::<Clock>();
/// builder.register_scoped::<Scheduler>();
/// ```
pub trait Injectable: Send + Sync + 'static {
    /// Describes `Self` to the container
    fn type_def() -> TypeDef;
}

/// A `default_injectable!` macro that implements [`Injectable`] for one or more
/// types constructed with [`Default`].
///
/// # Example
/// ```no_run
/// use rivet::{ContainerBuilder, default_injectable};
///
/// #[derive(Default)]
/// struct MyType;
///
/// #[derive(Default)]
/// struct AnotherType;
///
/// default_injectable! {
///     MyType
///     AnotherType
/// };
///
/// let mut builder = ContainerBuilder::new();
/// builder.register_singleton::<MyType>();
/// builder.register_transient::<AnotherType>();
/// ```
#[macro_export]
macro_rules! default_injectable {
    ($($name:ident)*) => {
        $(impl $crate::Injectable for $name {
            #[inline]
            fn type_def() -> $crate::TypeDef {
                $crate::TypeDef::of::<$name>().constructor_fn(<$name as ::core::default::Default>::default)
            }
        })*
    };
}

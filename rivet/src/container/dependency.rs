//! Extractors for constructor arguments

use super::Container;
use crate::{
    error::Error,
    instance::Instance,
    types::{Args, Param, Type}
};
use std::{
    any::type_name,
    ops::{Deref, DerefMut},
    sync::Arc
};

/// A trait that defines which parameter a value declares
/// and how it is extracted from the bound argument
pub trait Dependency: Sized + Send + Sync {
    /// Declares the constructor parameter
    fn param(name: &'static str) -> Param;

    /// Extracts `Self` from the bound argument; `None` for an optional argument bound to nothing
    fn from_arg(arg: Option<Instance>) -> Result<Self, Error>;
}

/// A tuple of [`Dependency`] values
pub trait Dependencies: Sized {
    /// Declared parameters, in order
    fn params() -> Vec<Param>;

    /// Extracts `Self` from bound arguments
    fn from_args(args: &mut Args) -> Result<Self, Error>;
}

impl Dependencies for () {
    #[inline]
    fn params() -> Vec<Param> {
        Vec::new()
    }

    #[inline]
    fn from_args(_: &mut Args) -> Result<Self, Error> {
        Ok(())
    }
}

macro_rules! define_dependencies {
    ($($T:ident $index:tt),+) => {
        impl<$($T: Dependency),+> Dependencies for ($($T,)+) {
            #[inline]
            fn params() -> Vec<Param> {
                vec![$($T::param(concat!("arg", $index)),)+]
            }

            #[inline]
            fn from_args(args: &mut Args) -> Result<Self, Error> {
                Ok(($($T::from_arg(args.take($index))?,)+))
            }
        }
    }
}

define_dependencies! { T1 0 }
define_dependencies! { T1 0, T2 1 }
define_dependencies! { T1 0, T2 1, T3 2 }
define_dependencies! { T1 0, T2 1, T3 2, T4 3 }
define_dependencies! { T1 0, T2 1, T3 2, T4 3, T5 4 }

#[inline]
fn required<T>(arg: Option<Instance>) -> Result<Instance, Error> {
    arg.ok_or_else(|| Error::ResolveFailed(format!("missing argument of type {}", type_name::<T>())))
}

/// `Dc` stands for Dependency Container.
///
/// This struct wraps a resolved `T` that is **shared** through an [`Arc`].
///
/// # Example
/// ```no_run
/// use rivet::{ContainerBuilder, Dc};
/// use std::sync::Mutex;
///
/// #[derive(Default)]
/// struct InMemoryCache {
///     inner: Mutex<Vec<String>>
/// }
///
/// struct Users {
///     cache: Dc<InMemoryCache>
/// }
///
/// let mut builder = ContainerBuilder::new();
/// builder.register_singleton_default::<InMemoryCache>();
/// builder.register_transient_factory(|cache: Dc<InMemoryCache>| Ok(Users { cache }));
///
/// let users = builder.build().resolve_shared::<Users>().unwrap();
/// users.cache.inner.lock().unwrap().push("alice".into());
/// ```
#[derive(Debug, Clone)]
pub struct Dc<T: Send + Sync>(Arc<T>);

impl<T: Send + Sync> Deref for Dc<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: Clone + Send + Sync> DerefMut for Dc<T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        Arc::make_mut(&mut self.0)
    }
}

impl<T: Send + Sync> Dc<T> {
    /// Unwraps the inner [`Arc`]
    #[inline]
    pub fn into_inner(self) -> Arc<T> {
        self.0
    }
}

impl<T: Send + Sync + Clone> Dc<T> {
    /// Clones and returns the inner `T`.
    ///
    /// Equivalent to calling [`Clone::clone`] on the inner `T`.
    #[inline]
    pub fn cloned(&self) -> T {
        self.0.as_ref().clone()
    }
}

impl<T: Send + Sync + 'static> Dependency for Dc<T> {
    #[inline]
    fn param(name: &'static str) -> Param {
        Param::new(name, Type::of::<T>())
    }

    #[inline]
    fn from_arg(arg: Option<Instance>) -> Result<Self, Error> {
        required::<T>(arg)?.downcast::<T>().map(Dc)
    }
}

impl<T: Send + Sync + 'static> Dependency for Option<Dc<T>> {
    #[inline]
    fn param(name: &'static str) -> Param {
        Param::optional(name, Type::of::<T>())
    }

    #[inline]
    fn from_arg(arg: Option<Instance>) -> Result<Self, Error> {
        arg.map(|instance| instance.downcast::<T>().map(Dc))
            .transpose()
    }
}

/// Every registered `T`, in registration order; resolved from `Enumerable<T>`
#[derive(Debug, Clone)]
pub struct Many<T: Send + Sync>(Vec<Arc<T>>);

impl<T: Send + Sync> Deref for Many<T> {
    type Target = [Arc<T>];

    #[inline]
    fn deref(&self) -> &[Arc<T>] {
        &self.0
    }
}

impl<T: Send + Sync> Many<T> {
    /// Unwraps the inner values
    #[inline]
    pub fn into_inner(self) -> Vec<Arc<T>> {
        self.0
    }
}

impl<T: Send + Sync> IntoIterator for Many<T> {
    type Item = Arc<T>;
    type IntoIter = std::vec::IntoIter<Arc<T>>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<T: Send + Sync + 'static> Dependency for Many<T> {
    #[inline]
    fn param(name: &'static str) -> Param {
        Param::new(name, Type::enumerable(Type::of::<T>()))
    }

    fn from_arg(arg: Option<Instance>) -> Result<Self, Error> {
        required::<Vec<T>>(arg)?
            .downcast::<Vec<Instance>>()?
            .iter()
            .map(Instance::downcast::<T>)
            .collect::<Result<Vec<_>, _>>()
            .map(Many)
    }
}

impl Dependency for Container {
    #[inline]
    fn param(name: &'static str) -> Param {
        Param::new(name, Type::of::<Container>())
    }

    #[inline]
    fn from_arg(arg: Option<Instance>) -> Result<Self, Error> {
        required::<Container>(arg)?.get::<Container>()
    }
}

macro_rules! define_value_dependency {
    ($($T:ty),*) => {
        $(impl Dependency for $T {
            #[inline]
            fn param(name: &'static str) -> Param {
                Param::new(name, Type::of::<$T>())
            }

            #[inline]
            fn from_arg(arg: Option<Instance>) -> Result<Self, Error> {
                required::<$T>(arg)?.get::<$T>()
            }
        })*
    };
}

define_value_dependency! {
    i8, i16, i32, i64, i128, isize,
    u8, u16, u32, u64, u128, usize,
    f32, f64, bool, char, String
}

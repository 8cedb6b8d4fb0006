//! Type-erased service values

use crate::error::Error;
use std::{
    any::{Any, type_name},
    fmt::{self, Debug, Formatter},
    sync::Arc
};

/// Releases resources held by a service when its owning scope is disposed.
///
/// Scopes call [`Dispose::dispose`] once for every instance they tracked.
pub trait Dispose: Send + Sync {
    /// Releases the resources
    fn dispose(&self);
}

type ArcService = Arc<
    dyn Any
    + Send
    + Sync
>;

/// A produced service value, shared behind an [`Arc`] and carrying an optional release handle
#[derive(Clone)]
pub struct Instance {
    value: ArcService,
    release: Option<Arc<dyn Dispose>>,
    type_name: &'static str,
}

impl Debug for Instance {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Instance({})", self.type_name)
    }
}

impl Instance {
    /// Wraps a value that needs no release
    #[inline]
    pub fn new<T: Send + Sync + 'static>(value: T) -> Self {
        Self::from_shared(Arc::new(value))
    }

    /// Wraps an already shared value
    #[inline]
    pub fn from_shared<T: Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self {
            value,
            release: None,
            type_name: type_name::<T>(),
        }
    }

    /// Wraps a value that is released when its owning scope is disposed
    #[inline]
    pub fn disposable<T: Dispose + 'static>(value: T) -> Self {
        let value = Arc::new(value);
        Self {
            release: Some(value.clone()),
            value,
            type_name: type_name::<T>(),
        }
    }

    /// Name of the wrapped Rust type
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns `true` if the value is a `T`
    #[inline]
    pub fn is<T: 'static>(&self) -> bool {
        self.value.is::<T>()
    }

    /// Returns the value as a shared pointer
    pub fn downcast<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, Error> {
        self.value
            .clone()
            .downcast::<T>()
            .map_err(|_| Error::ResolveFailed(format!(
                "expected {} but the producer returned {}",
                type_name::<T>(),
                self.type_name
            )))
    }

    /// Clones the value out
    #[inline]
    pub fn get<T: Clone + Send + Sync + 'static>(&self) -> Result<T, Error> {
        self.downcast::<T>().map(|v| v.as_ref().clone())
    }

    /// Returns `true` when both instances share the same value
    #[inline]
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }

    /// Returns `true` when the owning scope has to release the value
    #[inline]
    pub fn needs_release(&self) -> bool {
        self.release.is_some()
    }

    pub(crate) fn with_release(mut self, handle: Arc<dyn Dispose>) -> Self {
        self.release = Some(handle);
        self
    }

    pub(crate) fn release(&self) {
        if let Some(handle) = &self.release {
            handle.dispose();
        }
    }

    /// Maps the value into another representation, keeping the release handle
    pub(crate) fn convert<T, U, F>(self, convert: &F) -> Result<Instance, Error>
    where
        T: Send + Sync + 'static,
        U: Send + Sync + 'static,
        F: Fn(Arc<T>) -> U
    {
        let value = convert(self.downcast::<T>()?);
        Ok(Self {
            value: Arc::new(value),
            release: self.release,
            type_name: type_name::<U>(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    trait Shape: Send + Sync {
        fn area(&self) -> u32;
    }

    struct Square(u32);

    impl Shape for Square {
        fn area(&self) -> u32 {
            self.0 * self.0
        }
    }

    struct Handle(Arc<AtomicBool>);

    impl Dispose for Handle {
        fn dispose(&self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn it_downcasts_to_value_type() {
        let instance = Instance::new(10_i32);

        assert!(instance.is::<i32>());
        assert_eq!(instance.get::<i32>().unwrap(), 10);
        assert!(instance.downcast::<u8>().is_err());
    }

    #[test]
    fn it_converts_into_trait_object() {
        let instance = Instance::new(Square(3))
            .convert(&|s: Arc<Square>| s as Arc<dyn Shape>)
            .unwrap();

        let shape = instance.get::<Arc<dyn Shape>>().unwrap();

        assert_eq!(shape.area(), 9);
    }

    #[test]
    fn it_keeps_release_handle_through_conversion() {
        let flag = Arc::new(AtomicBool::new(false));
        let instance = Instance::disposable(Handle(flag.clone()))
            .convert(&|h: Arc<Handle>| h.0.clone())
            .unwrap();

        assert!(instance.needs_release());

        instance.release();

        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn it_compares_by_pointer() {
        let a = Instance::new(1_u8);
        let b = a.clone();
        let c = Instance::new(1_u8);

        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
    }
}

//! Lifetime scopes
//!
//! A scope owns the scoped values created in it and every tracked instance that needs
//! release. Scopes form a tree: a child registers with its parent, disposing a parent
//! disposes its live children first, and owned instances are released in reverse order
//! of acquisition.

use crate::{error::Error, instance::Instance, types::Type};
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    fmt::{self, Debug, Formatter},
    sync::{
        Arc, OnceLock, Weak,
        atomic::{AtomicU8, AtomicU64, Ordering}
    }
};

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(0);

type Cell = Arc<OnceLock<Result<Instance, Error>>>;

/// Lifecycle state of a [`Scope`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeState {
    /// Resolving and tracking instances
    Active,
    /// Disposal has started
    Disposing,
    /// Disposed; every operation fails with [`Error::ScopeDisposed`]
    Disposed,
}

impl ScopeState {
    #[inline]
    fn from_u8(state: u8) -> Self {
        match state {
            0 => ScopeState::Active,
            1 => ScopeState::Disposing,
            _ => ScopeState::Disposed,
        }
    }
}

/// Identifies a scope-local value: the producer and the type it was requested as
#[derive(Clone, PartialEq, Eq, Hash)]
pub(crate) struct Slot {
    target: usize,
    ty: Type,
}

impl Slot {
    #[inline]
    pub(crate) fn new(target: usize, ty: Type) -> Self {
        Self { target, ty }
    }
}

struct ScopeInner {
    id: u64,
    parent: Option<Weak<ScopeInner>>,
    state: AtomicU8,
    explicit: Mutex<HashMap<Slot, Cell>>,
    owned: Mutex<Vec<Instance>>,
    children: Mutex<IndexMap<u64, Weak<ScopeInner>>>,
}

impl ScopeInner {
    #[inline]
    fn state(&self) -> ScopeState {
        ScopeState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn dispose(&self) {
        if self.state
            .compare_exchange(
                ScopeState::Active as u8,
                ScopeState::Disposing as u8,
                Ordering::AcqRel,
                Ordering::Acquire)
            .is_err() {
            return;
        }

        let children = std::mem::take(&mut *self.children.lock());
        for child in children.values().rev() {
            if let Some(child) = child.upgrade() {
                child.dispose();
            }
        }

        let owned = std::mem::take(&mut *self.owned.lock());
        for instance in owned.iter().rev() {
            instance.release();
        }

        self.explicit.lock().clear();
        self.state.store(ScopeState::Disposed as u8, Ordering::Release);

        if let Some(parent) = self.parent.as_ref().and_then(Weak::upgrade) {
            parent.children.lock().shift_remove(&self.id);
        }

        #[cfg(feature = "tracing")]
        tracing::trace!(scope = self.id, released = owned.len(), "scope disposed");
    }
}

impl Drop for ScopeInner {
    #[inline]
    fn drop(&mut self) {
        self.dispose();
    }
}

/// A lifetime context owning scoped and release-needing instances
#[derive(Clone)]
pub struct Scope(Arc<ScopeInner>);

impl Debug for Scope {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.0.id)
            .field("state", &self.state())
            .finish()
    }
}

impl Scope {
    /// Creates a root scope
    #[inline]
    pub(crate) fn root() -> Self {
        Self::with_parent(None)
    }

    fn with_parent(parent: Option<Weak<ScopeInner>>) -> Self {
        let id = NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "tracing")]
        tracing::trace!(scope = id, child = parent.is_some(), "scope created");

        Self(Arc::new(ScopeInner {
            id,
            parent,
            state: AtomicU8::new(ScopeState::Active as u8),
            explicit: Mutex::new(HashMap::new()),
            owned: Mutex::new(Vec::new()),
            children: Mutex::new(IndexMap::new()),
        }))
    }

    /// Creates a child scope registered with this one
    pub(crate) fn create_child(&self) -> Result<Scope, Error> {
        self.ensure_active()?;

        let child = Self::with_parent(Some(Arc::downgrade(&self.0)));
        let mut children = self.0.children.lock();
        if self.state() != ScopeState::Active {
            drop(children);
            child.dispose();
            return Err(Error::ScopeDisposed);
        }
        children.insert(child.id(), Arc::downgrade(&child.0));
        Ok(child)
    }

    /// Unique scope identifier
    #[inline]
    pub fn id(&self) -> u64 {
        self.0.id
    }

    /// Current lifecycle state
    #[inline]
    pub fn state(&self) -> ScopeState {
        self.0.state()
    }

    /// Returns `true` once disposal has completed
    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.state() == ScopeState::Disposed
    }

    /// Disposes live child scopes, then releases owned instances in reverse order.
    ///
    /// Disposing an already disposed scope does nothing.
    #[inline]
    pub fn dispose(&self) {
        self.0.dispose();
    }

    /// Fails with [`Error::ScopeDisposed`] unless the scope is active
    #[inline]
    pub(crate) fn ensure_active(&self) -> Result<(), Error> {
        match self.state() {
            ScopeState::Active => Ok(()),
            _ => Err(Error::ScopeDisposed),
        }
    }

    /// Returns the value of `slot`, creating it with `create` on first use.
    ///
    /// Concurrent first callers wait for a single creation; its result,
    /// success or failure, is shared by every later caller.
    pub(crate) fn resolve_explicit<F>(&self, slot: &Slot, create: F) -> Result<Instance, Error>
    where
        F: FnOnce() -> Result<Instance, Error>
    {
        self.ensure_active()?;
        let cell = self.0.explicit
            .lock()
            .entry(slot.clone())
            .or_default()
            .clone();

        cell.get_or_init(|| {
            let instance = create()?;
            if instance.needs_release() {
                self.track(instance.clone())?;
            }
            Ok(instance)
        })
        .clone()
    }

    /// Takes ownership of an instance that needs release.
    ///
    /// A scope that is no longer active releases the instance right away.
    pub(crate) fn track(&self, instance: Instance) -> Result<(), Error> {
        self.adopt(instance).map_err(|instance| {
            instance.release();
            Error::ScopeDisposed
        })
    }

    /// Takes ownership of an instance that needs release,
    /// handing it back if the scope is no longer active
    pub(crate) fn adopt(&self, instance: Instance) -> Result<(), Instance> {
        let mut owned = self.0.owned.lock();
        if self.state() != ScopeState::Active {
            return Err(instance);
        }
        owned.push(instance);
        Ok(())
    }

    #[cfg(test)]
    fn child_count(&self) -> usize {
        self.0.children.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::Dispose;
    use std::sync::atomic::AtomicUsize;

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Dispose for Recorder {
        fn dispose(&self) {
            self.log.lock().push(self.name);
        }
    }

    fn recorder(name: &'static str, log: &Arc<Mutex<Vec<&'static str>>>) -> Instance {
        Instance::disposable(Recorder { name, log: log.clone() })
    }

    #[test]
    fn it_releases_in_reverse_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let scope = Scope::root();

        scope.track(recorder("first", &log)).unwrap();
        scope.track(recorder("second", &log)).unwrap();
        scope.dispose();

        assert_eq!(*log.lock(), vec!["second", "first"]);
        assert!(scope.is_disposed());
    }

    #[test]
    fn it_disposes_children_first() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let root = Scope::root();
        let child = root.create_child().unwrap();

        root.track(recorder("root", &log)).unwrap();
        child.track(recorder("child", &log)).unwrap();
        root.dispose();

        assert_eq!(*log.lock(), vec!["child", "root"]);
        assert!(child.is_disposed());
    }

    #[test]
    fn it_is_idempotent() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let scope = Scope::root();

        scope.track(recorder("only", &log)).unwrap();
        scope.dispose();
        scope.dispose();

        assert_eq!(log.lock().len(), 1);
    }

    #[test]
    fn it_deregisters_disposed_child() {
        let root = Scope::root();
        let child = root.create_child().unwrap();

        assert_eq!(root.child_count(), 1);

        child.dispose();

        assert_eq!(root.child_count(), 0);
        assert_eq!(root.state(), ScopeState::Active);
    }

    #[test]
    fn it_deregisters_dropped_child() {
        let root = Scope::root();
        drop(root.create_child().unwrap());

        assert_eq!(root.child_count(), 0);
    }

    #[test]
    fn it_rejects_operations_after_dispose() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let scope = Scope::root();
        scope.dispose();

        assert_eq!(scope.create_child().unwrap_err(), Error::ScopeDisposed);
        assert_eq!(scope.track(recorder("late", &log)).unwrap_err(), Error::ScopeDisposed);
        assert_eq!(*log.lock(), vec!["late"]);
    }

    #[test]
    fn it_hands_back_instances_once_disposed() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let scope = Scope::root();
        scope.dispose();

        let rejected = scope.adopt(recorder("kept", &log)).unwrap_err();

        assert!(log.lock().is_empty());
        rejected.release();
        assert_eq!(*log.lock(), vec!["kept"]);
    }

    #[test]
    fn it_creates_explicit_value_once() {
        let calls = AtomicUsize::new(0);
        let scope = Scope::root();
        let slot = Slot::new(1, Type::of::<i32>());

        let create = || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Instance::new(5_i32))
        };
        let a = scope.resolve_explicit(&slot, create).unwrap();
        let b = scope.resolve_explicit(&slot, create).unwrap();

        assert!(a.ptr_eq(&b));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn it_isolates_explicit_values_between_scopes() {
        let root = Scope::root();
        let child = root.create_child().unwrap();
        let slot = Slot::new(1, Type::of::<i32>());

        let a = root.resolve_explicit(&slot, || Ok(Instance::new(1_i32))).unwrap();
        let b = child.resolve_explicit(&slot, || Ok(Instance::new(1_i32))).unwrap();

        assert!(!a.ptr_eq(&b));
    }

    #[test]
    fn it_releases_on_drop() {
        let log = Arc::new(Mutex::new(Vec::new()));
        {
            let scope = Scope::root();
            scope.track(recorder("dropped", &log)).unwrap();
        }

        assert_eq!(*log.lock(), vec!["dropped"]);
    }
}

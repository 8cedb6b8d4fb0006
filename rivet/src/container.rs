//! Dependency Injection container and tools

use crate::{
    compiler::{CompiledFactory, Compiler, FactoryCache, SingletonCells},
    error::Error,
    instance::Instance,
    registry::Registry,
    scope::Scope,
    target::{Members, ServiceKey, Target},
    types::Type
};
use parking_lot::RwLock;
use smallvec::{SmallVec, smallvec};
use std::{
    borrow::Cow,
    fmt::{self, Debug, Formatter},
    sync::{Arc, atomic::{AtomicU64, Ordering}}
};

pub use self::{
    builder::{ContainerBuilder, Lifetime},
    dependency::{Dc, Dependencies, Dependency, Many},
    factory::GenericFactory
};

pub mod builder;
pub mod dependency;
pub mod factory;

/// Container configuration
#[derive(Debug, Clone)]
pub struct ContainerOptions {
    enumerables: bool,
    members: Members,
}

impl Default for ContainerOptions {
    #[inline]
    fn default() -> Self {
        Self {
            enumerables: true,
            members: Members::None,
        }
    }
}

impl ContainerOptions {
    /// Creates default options: enumerable injection on, no member injection
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Turns automatic `Enumerable<T>` injection on or off
    #[inline]
    pub fn with_enumerables(mut self, enabled: bool) -> Self {
        self.enumerables = enabled;
        self
    }

    /// Turns automatic `Enumerable<T>` injection off
    #[inline]
    pub fn without_enumerables(self) -> Self {
        self.with_enumerables(false)
    }

    /// Sets the default member binding policy of constructor producers
    #[inline]
    pub fn with_members(mut self, members: Members) -> Self {
        self.members = members;
        self
    }

    /// Whether `Enumerable<T>` is synthesized for unregistered enumerables
    #[inline]
    pub fn enumerables(&self) -> bool {
        self.enumerables
    }

    /// Default member binding policy
    #[inline]
    pub fn members(&self) -> &Members {
        &self.members
    }
}

/// Resolution operations shared by [`Container`] and wrappers over it
pub trait Resolver {
    /// Resolves the default producer of `key`
    fn resolve_key(&self, key: &ServiceKey) -> Result<Instance, Error>;

    /// Like [`Resolver::resolve_key`], but `Ok(None)` when nothing is registered for `key`.
    ///
    /// Failures of `key`'s dependencies are still errors.
    fn try_resolve_key(&self, key: &ServiceKey) -> Result<Option<Instance>, Error>;

    /// Returns `true` if a producer is registered for `key`
    fn can_resolve_key(&self, key: &ServiceKey) -> bool;

    /// Resolves every producer of `ty`, in registration order
    fn resolve_many(&self, ty: &Type) -> Result<Vec<Instance>, Error>;
}

struct Core {
    registry: RwLock<Registry>,
    cache: FactoryCache,
    singletons: Arc<SingletonCells>,
    options: ContainerOptions,
    root: Scope,
    parent: Option<Arc<Core>>,
    generation: AtomicU64,
}

impl Core {
    /// This core followed by the cores it overrides
    fn chain(&self) -> SmallVec<[&Core; 2]> {
        let mut chain: SmallVec<[&Core; 2]> = smallvec![self];
        let mut current = self.parent.as_deref();
        while let Some(core) = current {
            chain.push(core);
            current = core.parent.as_deref();
        }
        chain
    }

    /// Changes whenever a registry of the chain takes a live registration
    fn generation(&self) -> u64 {
        self.chain()
            .iter()
            .map(|core| core.generation.load(Ordering::Acquire))
            .sum()
    }
}

impl Drop for Core {
    #[inline]
    fn drop(&mut self) {
        self.root.dispose();
    }
}

/// Represents a DI container bound to a scope.
///
/// Clones share the registrations, compiled factories and singletons.
/// [`Container::create_scope`] returns a handle bound to a new child scope.
#[derive(Clone)]
pub struct Container {
    core: Arc<Core>,
    scope: Scope,
}

impl Debug for Container {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("scope", &self.scope)
            .field("options", &self.core.options)
            .finish()
    }
}

impl Container {
    pub(crate) fn new(registry: Registry, options: ContainerOptions) -> Self {
        Self::with_core(registry, options, Scope::root(), None, Arc::default())
    }

    pub(crate) fn overriding(registry: Registry, options: ContainerOptions, parent: &Container) -> Result<Self, Error> {
        let scope = parent.scope.create_child()?;

        #[cfg(feature = "tracing")]
        tracing::debug!(scope = scope.id(), "overriding container created");

        Ok(Self::with_core(
            registry,
            options,
            scope,
            Some(parent.core.clone()),
            parent.core.singletons.clone()
        ))
    }

    fn with_core(
        mut registry: Registry,
        options: ContainerOptions,
        root: Scope,
        parent: Option<Arc<Core>>,
        singletons: Arc<SingletonCells>
    ) -> Self {
        registry.set_enumerables(options.enumerables);
        let core = Core {
            registry: RwLock::new(registry),
            cache: FactoryCache::default(),
            singletons,
            options,
            root: root.clone(),
            parent,
            generation: AtomicU64::new(0),
        };
        Self { core: Arc::new(core), scope: root }
    }

    /// Registers another producer on a live container.
    ///
    /// Resolutions that start after this call returns see the new producer, whether they
    /// request `key` directly, through a generic definition, a covariant alternative or a
    /// dependency. Singletons that were already created are kept.
    pub fn register(&self, key: ServiceKey, target: Target) -> Result<(), Error> {
        let mut registry = self.core.registry.write();
        registry.register(key.clone(), target)?;
        self.core.generation.fetch_add(1, Ordering::AcqRel);
        self.core.cache.prune_missing(|missing| registry.contains(missing));
        drop(registry);

        #[cfg(feature = "tracing")]
        tracing::debug!(key = %key, "registered on a live container");

        Ok(())
    }

    /// Resolves a service and returns a cloned instance.
    /// `T` must implement [`Clone`] otherwise use [`resolve_shared`] method
    /// that returns a shared pointer.
    ///
    /// [`resolve_shared`]: Container::resolve_shared
    #[inline]
    pub fn resolve<T: Send + Sync + Clone + 'static>(&self) -> Result<T, Error> {
        self.resolve_type(&Type::of::<T>())?.get::<T>()
    }

    /// Resolves a service and returns a shared pointer
    #[inline]
    pub fn resolve_shared<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, Error> {
        self.resolve_type(&Type::of::<T>())?.downcast::<T>()
    }

    /// Resolves a service registered under `name`
    #[inline]
    pub fn resolve_named<T: Send + Sync + Clone + 'static>(&self, name: impl Into<Cow<'static, str>>) -> Result<T, Error> {
        self.resolve_key(&ServiceKey::named(Type::of::<T>(), name))?.get::<T>()
    }

    /// Resolves a service if it is registered
    #[inline]
    pub fn try_resolve<T: Send + Sync + Clone + 'static>(&self) -> Result<Option<T>, Error> {
        self.try_resolve_key(&ServiceKey::of::<T>())?
            .map(|instance| instance.get::<T>())
            .transpose()
    }

    /// Resolves every registered `T`, in registration order
    pub fn resolve_all<T: Send + Sync + 'static>(&self) -> Result<Vec<Arc<T>>, Error> {
        self.resolve_many(&Type::of::<T>())?
            .iter()
            .map(Instance::downcast::<T>)
            .collect()
    }

    /// Resolves the default unnamed producer of `ty`
    #[inline]
    pub fn resolve_type(&self, ty: &Type) -> Result<Instance, Error> {
        self.resolve_key(&ServiceKey::new(ty.clone()))
    }

    /// Resolves `key` in `scope` instead of this handle's scope
    pub fn resolve_in(&self, key: &ServiceKey, scope: Option<&Scope>) -> Result<Instance, Error> {
        match scope {
            Some(scope) => Container { core: self.core.clone(), scope: scope.clone() }.resolve_key(key),
            None => self.resolve_key(key),
        }
    }

    /// Creates a new child scope of this handle's scope and returns a handle bound to it.
    ///
    /// - **Singleton** services are shared with every scope.
    /// - **Scoped** services are created once per scope, on first use.
    /// - **Transient** services are created on every resolution; the ones that need
    ///   release are owned by the scope that resolved them.
    #[inline]
    pub fn create_scope(&self) -> Result<Container, Error> {
        let scope = self.scope.create_child()?;
        Ok(Self { core: self.core.clone(), scope })
    }

    /// The scope this handle resolves in
    #[inline]
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Options the container was built with
    #[inline]
    pub fn options(&self) -> &ContainerOptions {
        &self.core.options
    }

    /// Disposes this handle's scope and its child scopes
    #[inline]
    pub fn dispose(&self) {
        self.scope.dispose();
    }

    /// Keys that were requested while no producer was registered for them
    #[inline]
    pub fn missing_keys(&self) -> Vec<ServiceKey> {
        self.core.cache.missing_keys()
    }

    /// Hands a new singleton to the resolving scope, or to the first root scope
    /// of the chain still active; a container being torn down releases it right away
    pub(crate) fn adopt_singleton(&self, instance: Instance) {
        let Err(mut instance) = self.scope.adopt(instance) else {
            return;
        };
        for core in self.core.chain() {
            match core.root.adopt(instance) {
                Ok(()) => return,
                Err(rejected) => instance = rejected,
            }
        }

        #[cfg(feature = "tracing")]
        tracing::trace!(ty = instance.type_name(), "singleton released on a disposed container");

        instance.release();
    }

    fn factory(&self, key: &ServiceKey) -> Result<Arc<CompiledFactory>, Error> {
        let generation = self.core.generation();
        self.core.cache.get_or_compile(key, generation, || {
            let chain = self.core.chain();
            let guards = chain
                .iter()
                .map(|core| core.registry.read())
                .collect::<SmallVec<[_; 2]>>();
            let registries = guards
                .iter()
                .map(|guard| &**guard)
                .collect::<SmallVec<[&Registry; 2]>>();
            Compiler::new(&registries, &self.core.singletons, &self.core.options.members).compile_key(key)
        })
    }
}

impl Resolver for Container {
    fn resolve_key(&self, key: &ServiceKey) -> Result<Instance, Error> {
        self.scope.ensure_active()?;
        let factory = self.factory(key)?;

        #[cfg(feature = "tracing")]
        tracing::trace!(key = %factory.key(), behaviour = ?factory.behaviour(), "resolving");

        factory.call(self)
    }

    fn try_resolve_key(&self, key: &ServiceKey) -> Result<Option<Instance>, Error> {
        self.scope.ensure_active()?;
        let factory = self.factory(key)?;
        if factory.is_missing() {
            return Ok(None);
        }
        factory.call(self).map(Some)
    }

    fn can_resolve_key(&self, key: &ServiceKey) -> bool {
        *key == ServiceKey::of::<Container>() || self.core
            .chain()
            .iter()
            .any(|core| core.registry.read().contains(key))
    }

    fn resolve_many(&self, ty: &Type) -> Result<Vec<Instance>, Error> {
        let instance = self.resolve_type(&Type::enumerable(ty.clone()))?;
        Ok(instance.downcast::<Vec<Instance>>()?.as_ref().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeDef;

    #[derive(Debug, Clone, PartialEq)]
    struct Port(u16);

    #[test]
    fn it_resolves_registered_value() {
        let mut builder = ContainerBuilder::new();
        builder.register_instance(Port(8080));

        let container = builder.build();

        assert_eq!(container.resolve::<Port>().unwrap(), Port(8080));
    }

    #[test]
    fn it_returns_none_for_unregistered_service() {
        let container = ContainerBuilder::new().build();

        assert_eq!(container.try_resolve::<Port>().unwrap(), None);
        assert!(!container.can_resolve_key(&ServiceKey::of::<Port>()));
        assert!(container.resolve::<Port>().unwrap_err().is_not_registered());
        assert_eq!(container.missing_keys(), vec![ServiceKey::of::<Port>()]);
    }

    #[test]
    fn it_resolves_itself() {
        let container = ContainerBuilder::new().build();

        assert!(container.can_resolve_key(&ServiceKey::of::<Container>()));
        assert!(container.resolve::<Container>().is_ok());
    }

    #[test]
    fn it_observes_live_registration() {
        let container = ContainerBuilder::new().build();

        assert!(container.try_resolve::<Port>().unwrap().is_none());

        container.register(ServiceKey::of::<Port>(), Target::value(Port(1))).unwrap();

        assert_eq!(container.resolve::<Port>().unwrap(), Port(1));
        assert!(container.missing_keys().is_empty());
    }

    #[test]
    fn it_rejects_resolution_in_disposed_scope() {
        let mut builder = ContainerBuilder::new();
        builder.register_instance(Port(1));
        let container = builder.build();
        let scope = container.create_scope().unwrap();

        scope.dispose();

        assert_eq!(scope.resolve::<Port>().unwrap_err(), Error::ScopeDisposed);
        assert!(scope.create_scope().is_err());
        assert_eq!(container.resolve::<Port>().unwrap(), Port(1));
    }

    #[test]
    fn it_resolves_many_in_registration_order() {
        let mut builder = ContainerBuilder::new();
        builder.register_instance(Port(1));
        builder.register_instance(Port(2));
        let container = builder.build();

        let ports = container.resolve_all::<Port>().unwrap();

        assert_eq!(ports.iter().map(|p| p.0).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(container.resolve::<Port>().unwrap(), Port(2));
    }

    #[test]
    fn it_resolves_empty_many_when_nothing_registered() {
        let container = ContainerBuilder::new().build();

        assert!(container.resolve_all::<Port>().unwrap().is_empty());
    }

    #[test]
    fn it_does_not_synthesize_enumerables_when_disabled() {
        let container = ContainerBuilder::new()
            .with_options(ContainerOptions::new().without_enumerables())
            .build();

        assert!(container.resolve_all::<Port>().unwrap_err().is_not_registered());
    }

    #[test]
    fn it_resolves_in_explicit_scope() {
        let mut builder = ContainerBuilder::new();
        builder.register_scoped_factory(|| Port(7));
        let container = builder.build();
        let scope = container.create_scope().unwrap();

        let a = container.resolve_in(&ServiceKey::of::<Port>(), Some(scope.scope())).unwrap();
        let b = scope.resolve_key(&ServiceKey::of::<Port>()).unwrap();
        let c = container.resolve_key(&ServiceKey::of::<Port>()).unwrap();

        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
    }

    #[test]
    fn it_replays_registration_errors_of_constructors() {
        let mut builder = ContainerBuilder::new();
        builder.define(TypeDef::named("Empty"));
        builder
            .register(ServiceKey::new(Type::named("Empty")), Target::constructor(TypeDef::named("Empty")))
            .unwrap();
        let container = builder.build();

        let first = container.resolve_type(&Type::named("Empty")).unwrap_err();
        let second = container.resolve_type(&Type::named("Empty")).unwrap_err();

        assert_eq!(first, Error::NoConstructor("Empty".into()));
        assert_eq!(first, second);
    }

    #[test]
    fn it_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}

        assert_send_sync::<Container>();
    }
}

//! Container builder and lifetimes

use super::{Container, ContainerOptions, Dependencies, GenericFactory};
use crate::{
    error::Error,
    inject::Injectable,
    registry::Registry,
    target::{Members, ServiceKey, Target},
    types::{Type, TypeDef}
};
use std::{
    borrow::Cow,
    fmt::{self, Debug, Formatter},
    sync::Arc
};

/// How long a produced value lives
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(serde::Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "lowercase"))]
pub enum Lifetime {
    /// A new value on every resolution
    #[default]
    Transient,
    /// One value per scope
    Scoped,
    /// One value for the container's lifetime
    Singleton,
}

impl Lifetime {
    /// Wraps `target` according to this lifetime
    #[inline]
    pub fn apply(self, target: Target) -> Target {
        match self {
            Lifetime::Transient => target,
            Lifetime::Scoped => target.scoped(),
            Lifetime::Singleton => target.singleton(),
        }
    }
}

/// Represents a DI container builder,
/// that is able to add/register dependencies with a specific lifetimes.
pub struct ContainerBuilder {
    registry: Registry,
    options: ContainerOptions,
}

impl Debug for ContainerBuilder {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerBuilder")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Default for ContainerBuilder {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerBuilder {
    /// Creates a new DI container builder
    #[inline]
    pub fn new() -> Self {
        Self {
            registry: Registry::new(true),
            options: ContainerOptions::default(),
        }
    }

    /// Replaces the container options
    #[inline]
    pub fn with_options(mut self, options: ContainerOptions) -> Self {
        self.options = options;
        self
    }

    /// Turns automatic `Enumerable<T>` injection off
    #[inline]
    pub fn without_enumerables(mut self) -> Self {
        self.options = self.options.without_enumerables();
        self
    }

    /// Sets the default member binding policy
    #[inline]
    pub fn with_members(mut self, members: Members) -> Self {
        self.options = self.options.with_members(members);
        self
    }

    /// Build a DI container
    #[inline]
    pub fn build(self) -> Container {
        Container::new(self.registry, self.options)
    }

    /// Builds a container whose registrations override those of `parent`.
    ///
    /// Keys without an own producer fall back to `parent`'s producers, which are compiled
    /// against the new container, so their dependencies are looked up here first.
    /// The container resolves in a new child scope of `parent`'s scope and shares its singletons.
    ///
    /// # Example
    /// ```no_run
    /// use rivet::ContainerBuilder;
    ///
    /// let mut builder = ContainerBuilder::new();
    /// builder.register_instance(10_i32);
    /// let parent = builder.build();
    ///
    /// let mut overrides = ContainerBuilder::new();
    /// overrides.register_instance(String::from("request"));
    /// let child = overrides.build_overriding(&parent).unwrap();
    ///
    /// assert_eq!(child.resolve::<i32>().unwrap(), 10);
    /// ```
    pub fn build_overriding(self, parent: &Container) -> Result<Container, Error> {
        Container::overriding(self.registry, self.options, parent)
    }

    /// Adds a type definition, used for assignability checks, automatic construction
    /// of projected types and name lookups of the configuration loader
    #[inline]
    pub fn define(&mut self, def: impl Into<Arc<TypeDef>>) -> Arc<TypeDef> {
        self.registry.define(def)
    }

    /// Registers `target` as the default producer for `key`.
    ///
    /// Earlier producers stay registered and are still resolved as part of `Enumerable<T>`.
    #[inline]
    pub fn register(&mut self, key: ServiceKey, target: Target) -> Result<(), Error> {
        self.registry.register(key, target)
    }

    /// Register a fixed value
    pub fn register_instance<T: Send + Sync + 'static>(&mut self, instance: T) {
        self.registry.push(ServiceKey::of::<T>(), Target::value(instance));
    }

    /// Register a transient service
    pub fn register_transient_factory<T, F, Args>(&mut self, factory: F)
    where
        T: Send + Sync + 'static,
        F: GenericFactory<Args, Output = T>,
        Args: Dependencies
    {
        self.registry.push(ServiceKey::of::<T>(), Target::from_fn(factory));
    }

    /// Register a scoped service
    pub fn register_scoped_factory<T, F, Args>(&mut self, factory: F)
    where
        T: Send + Sync + 'static,
        F: GenericFactory<Args, Output = T>,
        Args: Dependencies
    {
        self.registry.push(ServiceKey::of::<T>(), Target::from_fn(factory).scoped());
    }

    /// Register a singleton service created on first resolution
    pub fn register_singleton_factory<T, F, Args>(&mut self, factory: F)
    where
        T: Send + Sync + 'static,
        F: GenericFactory<Args, Output = T>,
        Args: Dependencies
    {
        self.registry.push(ServiceKey::of::<T>(), Target::from_fn(factory).singleton());
    }

    /// Register a transient service that required to be resolved as [`Default`]
    pub fn register_transient_default<T>(&mut self)
    where
        T: Default + Send + Sync + 'static
    {
        self.register_transient_factory(T::default);
    }

    /// Register a scoped service that required to be resolved as [`Default`]
    pub fn register_scoped_default<T>(&mut self)
    where
        T: Default + Send + Sync + 'static
    {
        self.register_scoped_factory(T::default);
    }

    /// Register a singleton service that required to be resolved as [`Default`]
    pub fn register_singleton_default<T>(&mut self)
    where
        T: Default + Send + Sync + 'static
    {
        self.register_singleton_factory(T::default);
    }

    /// Register a transient service that required to be resolved as [`Injectable`]
    pub fn register_transient<T: Injectable>(&mut self) {
        self.register_injectable::<T>(Lifetime::Transient);
    }

    /// Register a scoped service that required to be resolved as [`Injectable`]
    pub fn register_scoped<T: Injectable>(&mut self) {
        self.register_injectable::<T>(Lifetime::Scoped);
    }

    /// Register a singleton service that required to be resolved as [`Injectable`]
    pub fn register_singleton<T: Injectable>(&mut self) {
        self.register_injectable::<T>(Lifetime::Singleton);
    }

    /// Registers the constructor producer of `def` for `service`
    ///
    /// # Example
    /// ```no_run
    /// use rivet::{Constructor, ContainerBuilder, Instance, Lifetime, Type, TypeDef};
    ///
    /// let mut builder = ContainerBuilder::new();
    /// let repo = TypeDef::generic("Repo", 1)
    ///     .implements(Type::generic("IRepo", 1).make_generic([Type::param(0)]).unwrap())
    ///     .constructor(Constructor::new([], |_| Ok(Instance::new(()))));
    ///
    /// builder.register_type(repo, Type::generic("IRepo", 1), Lifetime::Scoped).unwrap();
    /// ```
    pub fn register_type(&mut self, def: impl Into<Arc<TypeDef>>, service: Type, lifetime: Lifetime) -> Result<(), Error> {
        let target = lifetime.apply(Target::constructor(def));
        self.registry.register(ServiceKey::new(service), target)
    }

    /// Registers `target` for `ty` under `name`; only requests with that name see it
    #[inline]
    pub fn register_named(&mut self, ty: Type, name: impl Into<Cow<'static, str>>, target: Target) -> Result<(), Error> {
        self.registry.register(ServiceKey::named(ty, name), target)
    }

    /// Wraps every producer of `service` in `decorator`.
    ///
    /// The decorator receives the decorated value through its parameter of type `service`.
    /// Decorators registered later wrap the earlier ones.
    pub fn register_decorator(&mut self, service: Type, decorator: impl Into<Target>) -> Result<(), Error> {
        self.registry.register_decorator(service, decorator.into())
    }

    /// Makes `Enumerable<to>` the projection of every producer of `from`
    /// through the implementation type chosen by `select`
    pub fn register_projection<F>(&mut self, from: Type, to: Type, select: F)
    where
        F: Fn(&Target) -> Type + Send + Sync + 'static
    {
        self.registry.register_projection(from, to, Arc::new(select));
    }

    /// Makes `alias` resolve through the producer of `original`
    pub fn register_alias(&mut self, alias: ServiceKey, original: ServiceKey) -> Result<(), Error> {
        let declared = original.ty().clone();
        self.registry.register(alias, Target::alias(original, declared))
    }

    #[inline]
    pub(crate) fn registry(&self) -> &Registry {
        &self.registry
    }

    fn register_injectable<T: Injectable>(&mut self, lifetime: Lifetime) {
        let def = self.registry.define(T::type_def());
        self.registry.push(ServiceKey::of::<T>(), lifetime.apply(Target::constructor(def)));
    }
}

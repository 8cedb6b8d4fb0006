//! Compiles producer descriptors into reusable factories
//!
//! Each descriptor variant turns itself, plus the compiled factories of its dependencies,
//! into a boxed closure. Dependencies are compiled inline within the root key's
//! compilation, and the result is wrapped once according to the descriptor's
//! [`ScopeBehaviour`].
//!
//! Within one compilation a producer is compiled once per requested type and override
//! chain, so shared dependencies cost the same however many paths reach them.

use crate::{
    binder::{ArgSource, Binder, BindRequest, DependencyLookup},
    container::Container,
    error::Error,
    instance::Instance,
    registry::Registry,
    scope::Slot,
    target::{ConstructorTarget, Members, ScopeBehaviour, ServiceKey, Target, TargetKind},
    types::{Args, Constructor, Conversion, ParamMap, Type, TypeArgs, TypeDef}
};
use dashmap::DashMap;
use smallvec::SmallVec;
use std::{
    borrow::Cow,
    cell::RefCell,
    collections::HashMap,
    sync::{Arc, OnceLock}
};

pub(crate) use self::{
    cache::FactoryCache,
    context::{CompilePath, LookupContext, Overrides}
};

mod cache;
mod context;

type FactoryFn = Arc<
    dyn Fn(&Container) -> Result<Instance, Error>
    + Send
    + Sync
>;

/// Container-wide singleton cells, one per (producer, closed implementation type)
pub(crate) type SingletonCells = DashMap<(usize, Type), Arc<OnceLock<Result<Instance, Error>>>>;

/// A compiled factory for one request key
pub(crate) struct CompiledFactory {
    key: ServiceKey,
    call: FactoryFn,
    behaviour: ScopeBehaviour,
    missing: bool,
}

impl CompiledFactory {
    /// The always-failing factory of a key without a producer
    pub(crate) fn missing(key: ServiceKey) -> Self {
        Self {
            call: missing_fn(&key),
            key,
            behaviour: ScopeBehaviour::None,
            missing: true,
        }
    }

    #[inline]
    pub(crate) fn call(&self, container: &Container) -> Result<Instance, Error> {
        (self.call)(container)
    }

    #[inline]
    pub(crate) fn is_missing(&self) -> bool {
        self.missing
    }

    #[inline]
    pub(crate) fn behaviour(&self) -> ScopeBehaviour {
        self.behaviour
    }

    #[inline]
    pub(crate) fn key(&self) -> &ServiceKey {
        &self.key
    }
}

#[inline]
fn missing_fn(key: &ServiceKey) -> FactoryFn {
    let name = key.to_string();
    Arc::new(move |_: &Container| Err(Error::NotRegistered(name.clone())))
}

/// A compiled positional argument
enum CompiledArg {
    Produced(FactoryFn),
    Fixed(Option<Instance>),
}

impl CompiledArg {
    #[inline]
    fn produce(&self, container: &Container) -> Result<Option<Instance>, Error> {
        match self {
            CompiledArg::Produced(call) => call(container).map(Some),
            CompiledArg::Fixed(value) => Ok(value.clone()),
        }
    }
}

/// A constructor plus what it is being asked to build
struct Construction<'t> {
    implementation: Type,
    constructors: &'t [Constructor],
    def: Option<&'t Arc<TypeDef>>,
    target: Option<&'t ConstructorTarget>,
}

/// A producer compiled for a requested type under an override chain
#[derive(PartialEq, Eq, Hash)]
struct CompiledKey {
    target: usize,
    ty: Type,
    overrides: Overrides,
}

/// Compiles descriptors fetched from one registry snapshot.
///
/// `registries` starts with the container's own registrations, followed by those of
/// the containers it overrides.
pub(crate) struct Compiler<'a> {
    registries: &'a [&'a Registry],
    singletons: &'a SingletonCells,
    members: &'a Members,
    path: CompilePath,
    compiled: RefCell<HashMap<CompiledKey, FactoryFn>>,
    // Producers referenced by `compiled` stay alive, so their identities are not reused
    pinned: RefCell<Vec<Target>>,
}

impl<'a> Compiler<'a> {
    pub(crate) fn new(registries: &'a [&'a Registry], singletons: &'a SingletonCells, members: &'a Members) -> Self {
        Self {
            registries,
            singletons,
            members,
            path: CompilePath::default(),
            compiled: RefCell::new(HashMap::new()),
            pinned: RefCell::new(Vec::new()),
        }
    }

    /// Default producer for `key`: the own registrations first, then the overridden ones.
    ///
    /// A fallback producer is only used when no registry has a real one.
    pub(crate) fn fetch(&self, key: &ServiceKey) -> Option<Target> {
        let mut fallback = None;
        for &registry in self.registries {
            match registry.fetch(key) {
                Some(target) if !target.use_fallback() => return Some(target),
                Some(target) => {
                    fallback.get_or_insert(target);
                }
                None => {}
            }
        }
        fallback
    }

    /// Compiles the default producer of `key`, or the missing sentinel if there is none
    pub(crate) fn compile_key(&'a self, key: &ServiceKey) -> Result<CompiledFactory, Error> {
        let ctx = LookupContext::root(self);
        let Some(target) = ctx.lookup(key) else {
            #[cfg(feature = "tracing")]
            tracing::warn!(key = %key, "no producer registered");

            return Ok(CompiledFactory::missing(key.clone()));
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(key = %key, target = ?target, "compiling factory");

        let call = self.compile(&target, key.ty(), &ctx)?;
        Ok(CompiledFactory {
            key: key.clone(),
            call,
            behaviour: target.scope_behaviour(),
            missing: false,
        })
    }

    /// Compiles `target` for `requested` and applies its scope behaviour
    fn compile(&self, target: &Target, requested: &Type, ctx: &LookupContext<'_>) -> Result<FactoryFn, Error> {
        let key = CompiledKey {
            target: target.id(),
            ty: requested.clone(),
            overrides: ctx.overrides(),
        };
        if let Some(call) = self.compiled.borrow().get(&key) {
            return Ok(call.clone());
        }

        let _guard = self.path.enter(target, requested)?;
        let raw = self.compile_unscoped(target, requested, ctx)?;

        let wrapped: FactoryFn = match target.scope_behaviour() {
            ScopeBehaviour::None => raw,
            ScopeBehaviour::Implicit => Arc::new(move |c: &Container| {
                let instance = raw(c)?;
                if instance.needs_release() {
                    c.scope().track(instance.clone())?;
                }
                Ok(instance)
            }),
            ScopeBehaviour::Explicit => {
                let slot = Slot::new(target.id(), requested.clone());
                Arc::new(move |c: &Container| c.scope().resolve_explicit(&slot, || raw(c)))
            }
        };

        self.pinned.borrow_mut().push(target.clone());
        self.compiled.borrow_mut().insert(key, wrapped.clone());
        Ok(wrapped)
    }

    fn compile_unscoped(&self, target: &Target, requested: &Type, ctx: &LookupContext<'_>) -> Result<FactoryFn, Error> {
        match target.kind() {
            TargetKind::Constant { value, declared } => {
                let value = self.conversion(declared, requested)?.apply(value.clone())?;
                Ok(Arc::new(move |_: &Container| Ok(value.clone())))
            }
            TargetKind::Constructor(constructor) => {
                let def = constructor.def();
                let construction = Construction {
                    implementation: self.close_implementation(def.ty(), requested)?,
                    constructors: def.constructors(),
                    def: Some(def),
                    target: Some(constructor),
                };
                self.compile_construction(construction, requested, ctx)
            }
            TargetKind::Factory { declared, constructor } => {
                let construction = Construction {
                    implementation: self.close_implementation(declared, requested)?,
                    constructors: std::slice::from_ref(constructor),
                    def: None,
                    target: None,
                };
                self.compile_construction(construction, requested, ctx)
            }
            TargetKind::Decorator { decorator, decorated, service } => {
                self.pinned.borrow_mut().push(decorated.clone());
                let inner = ctx.child(service.clone(), decorated.clone());
                self.compile(decorator, requested, &inner)
            }
            TargetKind::Singleton(inner) => self.compile_singleton(target, inner, requested, ctx),
            TargetKind::Scoped(inner) => self.compile_unscoped(inner, requested, ctx),
            TargetKind::Enumerable { element, items } => {
                let items = items
                    .iter()
                    .map(|item| self.compile(item, element, ctx))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(collect_fn(items))
            }
            TargetKind::Projection { from, to, items } => {
                let items = items
                    .iter()
                    .map(|item| {
                        self.pinned.borrow_mut().push(item.source.clone());
                        let inner = ctx.child(from.clone(), item.source.clone());
                        let call = self.compile(&item.implementation, &item.ty, &inner)?;
                        Ok(convert_fn(call, self.conversion(&item.ty, to)?))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(collect_fn(items))
            }
            TargetKind::Alias { key, .. } => {
                let call = self.compile_dependency(key, ctx)?;
                let conversion = self.conversion(key.ty(), requested)?;
                Ok(convert_fn(call, conversion))
            }
            TargetKind::Container => Ok(Arc::new(|c: &Container| Ok(Instance::new(c.clone())))),
        }
    }

    fn compile_singleton(
        &self,
        target: &Target,
        inner: &Target,
        requested: &Type,
        ctx: &LookupContext<'_>
    ) -> Result<FactoryFn, Error> {
        let declared = self.close_implementation(&inner.declared_type(), requested)?;
        let cell = self.singletons
            .entry((target.id(), declared.clone()))
            .or_default()
            .clone();
        let create = self.compile_unscoped(inner, &declared, ctx)?;
        let conversion = self.conversion(&declared, requested)?;

        let call: FactoryFn = Arc::new(move |c: &Container| {
            let instance = cell
                .get_or_init(|| {
                    let instance = create(c)?;

                    #[cfg(feature = "tracing")]
                    tracing::trace!(ty = instance.type_name(), "singleton created");

                    if instance.needs_release() {
                        c.adopt_singleton(instance.clone());
                    }
                    Ok(instance)
                })
                .clone()?;
            conversion.apply(instance)
        });
        Ok(call)
    }

    fn compile_construction(
        &self,
        construction: Construction<'_>,
        requested: &Type,
        ctx: &LookupContext<'_>
    ) -> Result<FactoryFn, Error> {
        let Construction { implementation, constructors, def, target } = construction;
        let no_members = [];
        let request = BindRequest {
            owner: &implementation,
            constructors,
            type_args: implementation.args(),
            explicit: target.and_then(ConstructorTarget::explicit_constructor),
            named: target.map(ConstructorTarget::named_args),
            members: def.map_or(&no_members[..], |def| def.members()),
            member_policy: target
                .and_then(ConstructorTarget::members)
                .unwrap_or(self.members),
        };
        let plan = Binder::new(ctx).bind(&request)?;

        let args = plan.params
            .iter()
            .map(|binding| self.compile_source(&binding.source, binding.param.ty(), ctx))
            .collect::<Result<SmallVec<[CompiledArg; 4]>, _>>()?;
        let members = plan.members
            .iter()
            .map(|binding| self
                .compile_source(&binding.source, &binding.ty, ctx)
                .map(|arg| (binding.name.clone(), arg)))
            .collect::<Result<Vec<_>, _>>()?;

        let constructor = constructors
            .get(plan.constructor)
            .cloned()
            .ok_or_else(|| Error::NoConstructor(implementation.to_string()))?;
        let conversion = self.conversion(&implementation, requested)?;
        let type_args = TypeArgs::from(implementation.args());
        let def = def.cloned();

        Ok(Arc::new(move |c: &Container| {
            let values = args
                .iter()
                .map(|arg| arg.produce(c))
                .collect::<Result<SmallVec<_>, _>>()?;
            let members = members
                .iter()
                .filter_map(|(name, arg)| match arg.produce(c) {
                    Ok(Some(value)) => Some(Ok((name.clone(), value))),
                    Ok(None) => None,
                    Err(err) => Some(Err(err)),
                })
                .collect::<Result<SmallVec<[(Cow<'static, str>, Instance); 2]>, _>>()?;

            let mut args = Args::new(type_args.clone(), values, members);
            let instance = constructor.build(&mut args)?;
            let instance = match &def {
                Some(def) => def.attach_release(instance),
                None => instance,
            };
            conversion.apply(instance)
        }))
    }

    fn compile_source(&self, source: &ArgSource, ty: &Type, ctx: &LookupContext<'_>) -> Result<CompiledArg, Error> {
        match source {
            ArgSource::Target(target) => self.compile(target, ty, ctx).map(CompiledArg::Produced),
            ArgSource::Default(value) => Ok(CompiledArg::Fixed(value.clone())),
            ArgSource::Deferred(key) => self.compile_dependency(key, ctx).map(CompiledArg::Produced),
        }
    }

    /// Compiles whatever currently produces `key`; a missing producer fails when called
    fn compile_dependency(&self, key: &ServiceKey, ctx: &LookupContext<'_>) -> Result<FactoryFn, Error> {
        match ctx.lookup(key) {
            Some(target) => self.compile(&target, key.ty(), ctx),
            None => Ok(missing_fn(key)),
        }
    }

    /// Closes an open implementation type over the arguments of `requested`
    fn close_implementation(&self, declared: &Type, requested: &Type) -> Result<Type, Error> {
        if !declared.is_generic_definition() {
            return Ok(declared.clone());
        }
        if requested.definition().as_ref() == Some(declared) && !requested.is_generic_definition() {
            return declared.make_generic(requested.args().iter().cloned());
        }
        let args = self
            .param_map(requested, declared)?
            .close(requested)
            .ok_or_else(|| Error::invalid_registration(
                requested,
                declared,
                "implementation cannot be closed over the requested arguments"
            ))?;
        declared.make_generic(args)
    }

    fn param_map(&self, service: &Type, implementation: &Type) -> Result<Cow<'a, ParamMap>, Error> {
        let mut first_err = None;
        for &registry in self.registries {
            match registry.param_map(service, implementation) {
                Ok(map) => return Ok(map),
                Err(err) => {
                    first_err.get_or_insert(err);
                }
            }
        }
        Err(first_err.unwrap_or_else(|| Error::invalid_registration(
            service,
            implementation,
            "implementation type is not defined"
        )))
    }

    fn conversion(&self, from: &Type, to: &Type) -> Result<Conversion, Error> {
        self.registries
            .iter()
            .find_map(|registry| registry.catalog().conversion(from, to))
            .ok_or_else(|| Error::invalid_registration(to, from, "producer type is not assignable to the service type"))
    }
}

#[inline]
fn collect_fn(items: Vec<FactoryFn>) -> FactoryFn {
    Arc::new(move |c: &Container| {
        let values = items
            .iter()
            .map(|item| item(c))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Instance::new(values))
    })
}

#[inline]
fn convert_fn(call: FactoryFn, conversion: Conversion) -> FactoryFn {
    if conversion.is_identity() {
        return call;
    }
    Arc::new(move |c: &Container| conversion.apply(call(c)?))
}

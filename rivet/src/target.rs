//! Producer descriptors: immutable descriptions of how a service value is produced

use crate::{
    container::{Container, Dependencies, GenericFactory},
    instance::Instance,
    types::{Constructor, Type, TypeDef}
};
use indexmap::IndexMap;
use std::{
    borrow::Cow,
    fmt::{self, Debug, Display, Formatter},
    sync::Arc
};

/// Identifies a request: a service type and an optional registration name
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ServiceKey {
    ty: Type,
    name: Option<Cow<'static, str>>,
}

impl ServiceKey {
    /// Key for the unnamed registrations of `ty`
    #[inline]
    pub fn new(ty: Type) -> Self {
        Self { ty, name: None }
    }

    /// Key for the registrations of `ty` made under `name`
    #[inline]
    pub fn named(ty: Type, name: impl Into<Cow<'static, str>>) -> Self {
        Self { ty, name: Some(name.into()) }
    }

    /// Key for the unnamed registrations of a Rust type
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::new(Type::of::<T>())
    }

    /// Requested service type
    #[inline]
    pub fn ty(&self) -> &Type {
        &self.ty
    }

    /// Registration name
    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The same name applied to another type
    #[inline]
    pub(crate) fn with_type(&self, ty: Type) -> Self {
        Self { ty, name: self.name.clone() }
    }
}

impl From<Type> for ServiceKey {
    #[inline]
    fn from(ty: Type) -> Self {
        Self::new(ty)
    }
}

impl Display for ServiceKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} ({name})", self.ty),
            None => Display::fmt(&self.ty, f),
        }
    }
}

impl Debug for ServiceKey {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceKey({self})")
    }
}

/// How a compiled producer interacts with the active scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeBehaviour {
    /// Invoked directly, never tracked
    None,
    /// Results needing release are tracked by the active scope
    Implicit,
    /// One value per scope, created on first use
    Explicit,
}

/// Which injectable members of a constructed type get bound
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub enum Members {
    /// No member injection
    #[default]
    None,
    /// Every declared member whose type can be resolved
    All,
    /// Only the named members; unresolvable ones fail at resolution
    Only(Vec<Cow<'static, str>>),
}

/// Maps each source producer of a projection to the implementation type to build for it
pub type ProjectionSelector = Arc<
    dyn Fn(&Target) -> Type
    + Send
    + Sync
>;

/// A constructor producer: a [`TypeDef`] plus how to pick and feed its constructor
#[derive(Clone)]
pub struct ConstructorTarget {
    def: Arc<TypeDef>,
    constructor: Option<usize>,
    args: IndexMap<Cow<'static, str>, Target>,
    members: Option<Members>,
}

impl ConstructorTarget {
    /// Creates a producer that binds the best constructor of `def`
    #[inline]
    pub fn new(def: impl Into<Arc<TypeDef>>) -> Self {
        Self {
            def: def.into(),
            constructor: None,
            args: IndexMap::new(),
            members: None,
        }
    }

    /// Uses the constructor at `index` instead of selecting one
    #[inline]
    pub fn with_constructor(mut self, index: usize) -> Self {
        self.constructor = Some(index);
        self
    }

    /// Supplies the named parameter from `target`
    #[inline]
    pub fn with_arg(mut self, name: impl Into<Cow<'static, str>>, target: Target) -> Self {
        self.args.insert(name.into(), target);
        self
    }

    /// Overrides the container's member binding policy for this producer
    #[inline]
    pub fn with_members(mut self, members: Members) -> Self {
        self.members = Some(members);
        self
    }

    /// The constructed type's definition
    #[inline]
    pub fn def(&self) -> &Arc<TypeDef> {
        &self.def
    }

    #[inline]
    pub(crate) fn explicit_constructor(&self) -> Option<usize> {
        self.constructor
    }

    #[inline]
    pub(crate) fn named_args(&self) -> &IndexMap<Cow<'static, str>, Target> {
        &self.args
    }

    #[inline]
    pub(crate) fn members(&self) -> Option<&Members> {
        self.members.as_ref()
    }
}

impl From<ConstructorTarget> for Target {
    #[inline]
    fn from(target: ConstructorTarget) -> Self {
        Target::new(TargetKind::Constructor(target))
    }
}

/// One projected element: the source producer, the selected implementation type
/// and the producer building it
#[derive(Clone)]
pub(crate) struct ProjectionItem {
    pub(crate) source: Target,
    pub(crate) ty: Type,
    pub(crate) implementation: Target,
}

impl From<TypeDef> for Target {
    #[inline]
    fn from(def: TypeDef) -> Self {
        Target::constructor(def)
    }
}

#[derive(Clone)]
pub(crate) enum TargetKind {
    Constant { value: Instance, declared: Type },
    Constructor(ConstructorTarget),
    Factory { declared: Type, constructor: Constructor },
    Decorator { decorator: Target, decorated: Target, service: Type },
    Singleton(Target),
    Scoped(Target),
    Enumerable { element: Type, items: Vec<Target> },
    Projection { from: Type, to: Type, items: Vec<ProjectionItem> },
    Alias { key: ServiceKey, declared: Type },
    Container,
}

struct TargetNode {
    kind: TargetKind,
    fallback: bool,
}

/// A producer descriptor.
///
/// Targets are immutable and cheap to clone; clones share identity.
#[derive(Clone)]
pub struct Target(Arc<TargetNode>);

impl Target {
    #[inline]
    pub(crate) fn new(kind: TargetKind) -> Self {
        Self(Arc::new(TargetNode { kind, fallback: false }))
    }

    /// A fixed value registered under its declared type
    #[inline]
    pub fn constant(value: Instance, declared: Type) -> Self {
        Self::new(TargetKind::Constant { value, declared })
    }

    /// A fixed Rust value
    #[inline]
    pub fn value<T: Send + Sync + 'static>(value: T) -> Self {
        Self::constant(Instance::new(value), Type::of::<T>())
    }

    /// Constructs `def` by binding one of its constructors
    #[inline]
    pub fn constructor(def: impl Into<Arc<TypeDef>>) -> Self {
        ConstructorTarget::new(def).into()
    }

    /// Calls `constructor` to produce a value of `declared`
    #[inline]
    pub fn factory(declared: Type, constructor: Constructor) -> Self {
        Self::new(TargetKind::Factory { declared, constructor })
    }

    /// Calls a closure whose argument types declare its dependencies
    #[inline]
    pub fn from_fn<F, A>(factory: F) -> Self
    where
        F: GenericFactory<A>,
        F::Output: Send + Sync + 'static,
        A: Dependencies
    {
        Self::factory(Type::of::<F::Output>(), Constructor::from_fn(factory))
    }

    /// Aggregates `items` as an `Enumerable<element>`
    #[inline]
    pub fn enumerable(element: Type, items: Vec<Target>) -> Self {
        Self::new(TargetKind::Enumerable { element, items })
    }

    /// Redirects to the producer of `key`, exposed as `declared`
    #[inline]
    pub fn alias(key: ServiceKey, declared: Type) -> Self {
        Self::new(TargetKind::Alias { key, declared })
    }

    /// Caches the produced value once for the container's lifetime
    #[inline]
    pub fn singleton(self) -> Self {
        Self::new(TargetKind::Singleton(self))
    }

    /// Caches the produced value once per scope
    #[inline]
    pub fn scoped(self) -> Self {
        Self::new(TargetKind::Scoped(self))
    }

    /// Marks the producer as a last-resort fallback,
    /// so constructors binding real registrations are preferred over it
    pub fn as_fallback(self) -> Self {
        Self(Arc::new(TargetNode {
            kind: self.0.kind.clone(),
            fallback: true,
        }))
    }

    #[inline]
    pub(crate) fn decorator(decorator: Target, decorated: Target, service: Type) -> Self {
        Self::new(TargetKind::Decorator { decorator, decorated, service })
    }

    #[inline]
    pub(crate) fn projection(from: Type, to: Type, items: Vec<ProjectionItem>) -> Self {
        Self::new(TargetKind::Projection { from, to, items })
    }

    #[inline]
    pub(crate) fn container() -> Self {
        Self::new(TargetKind::Container)
    }

    #[inline]
    pub(crate) fn kind(&self) -> &TargetKind {
        &self.0.kind
    }

    /// Identity shared by clones
    #[inline]
    pub(crate) fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    /// The type of value the producer creates before any conversion
    pub fn declared_type(&self) -> Type {
        match self.kind() {
            TargetKind::Constant { declared, .. }
            | TargetKind::Factory { declared, .. }
            | TargetKind::Alias { declared, .. } => declared.clone(),
            TargetKind::Constructor(target) => target.def().ty().clone(),
            TargetKind::Decorator { service, .. } => service.clone(),
            TargetKind::Singleton(inner) | TargetKind::Scoped(inner) => inner.declared_type(),
            TargetKind::Enumerable { element, .. } => Type::enumerable(element.clone()),
            TargetKind::Projection { to, .. } => Type::enumerable(to.clone()),
            TargetKind::Container => Type::of::<Container>(),
        }
    }

    /// How the compiled producer interacts with the active scope
    pub fn scope_behaviour(&self) -> ScopeBehaviour {
        match self.kind() {
            TargetKind::Constructor(_) | TargetKind::Factory { .. } => ScopeBehaviour::Implicit,
            TargetKind::Scoped(_) => ScopeBehaviour::Explicit,
            _ => ScopeBehaviour::None,
        }
    }

    /// `true` for producers the binder should avoid when a real registration can be bound
    pub fn use_fallback(&self) -> bool {
        self.0.fallback || matches!(
            self.kind(),
            TargetKind::Enumerable { items, .. } if items.is_empty()
        )
    }

    /// The type definition of a constructor producer
    pub fn type_def(&self) -> Option<&Arc<TypeDef>> {
        match self.kind() {
            TargetKind::Constructor(target) => Some(target.def()),
            TargetKind::Singleton(inner) | TargetKind::Scoped(inner) => inner.type_def(),
            _ => None,
        }
    }
}

impl Debug for Target {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let kind = match self.kind() {
            TargetKind::Constant { .. } => "Constant",
            TargetKind::Constructor(_) => "Constructor",
            TargetKind::Factory { .. } => "Factory",
            TargetKind::Decorator { .. } => "Decorator",
            TargetKind::Singleton(_) => "Singleton",
            TargetKind::Scoped(_) => "Scoped",
            TargetKind::Enumerable { .. } => "Enumerable",
            TargetKind::Projection { .. } => "Projection",
            TargetKind::Alias { .. } => "Alias",
            TargetKind::Container => "Container",
        };
        write!(f, "{kind}({})", self.declared_type())
    }
}

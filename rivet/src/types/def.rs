//! Static descriptions of constructible types

use super::{Type, TypeArgs};
use crate::{
    container::{Dependencies, GenericFactory},
    error::Error,
    instance::{Dispose, Instance}
};
use smallvec::SmallVec;
use std::{
    borrow::Cow,
    fmt::{self, Debug, Formatter},
    sync::Arc
};

pub(crate) type BuildFn = Arc<
    dyn Fn(&mut Args) -> Result<Instance, Error>
    + Send
    + Sync
>;

/// Converts an instance of an implementation type into an instance of one of its bases
pub(crate) type Upcast = Arc<
    dyn Fn(Instance) -> Result<Instance, Error>
    + Send
    + Sync
>;

type ReleaseFn = Arc<
    dyn Fn(&Instance) -> Option<Arc<dyn Dispose>>
    + Send
    + Sync
>;

/// Variance of a generic parameter
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Variance {
    /// Arguments must match exactly
    #[default]
    Invariant,
    /// `G<Derived>` may be used where `G<Base>` is requested
    Covariant,
}

/// A constructor parameter signature
#[derive(Clone)]
pub struct Param {
    name: Cow<'static, str>,
    ty: Type,
    optional: bool,
    default: Option<Instance>,
}

impl Param {
    /// Creates a required parameter
    #[inline]
    pub fn new(name: impl Into<Cow<'static, str>>, ty: Type) -> Self {
        Self { name: name.into(), ty, optional: false, default: None }
    }

    /// Creates an optional parameter which is left empty when nothing can be bound
    #[inline]
    pub fn optional(name: impl Into<Cow<'static, str>>, ty: Type) -> Self {
        Self { name: name.into(), ty, optional: true, default: None }
    }

    /// Creates an optional parameter with a literal default value
    #[inline]
    pub fn with_default(name: impl Into<Cow<'static, str>>, ty: Type, default: Instance) -> Self {
        Self { name: name.into(), ty, optional: true, default: Some(default) }
    }

    /// Parameter name
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameter type, possibly containing generic parameter placeholders
    #[inline]
    pub fn ty(&self) -> &Type {
        &self.ty
    }

    /// Whether the parameter may fall back to its default
    #[inline]
    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// The default value of an optional parameter
    #[inline]
    pub fn default_value(&self) -> Option<&Instance> {
        self.default.as_ref()
    }

    pub(crate) fn close(&self, type_args: &[Type]) -> Self {
        Self { ty: self.ty.substitute(type_args), ..self.clone() }
    }
}

impl Debug for Param {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.optional {
            write!(f, "{}: {}?", self.name, self.ty)
        } else {
            write!(f, "{}: {}", self.name, self.ty)
        }
    }
}

/// Bound argument values handed to a constructor
#[derive(Debug, Default)]
pub struct Args {
    type_args: TypeArgs,
    values: SmallVec<[Option<Instance>; 4]>,
    members: SmallVec<[(Cow<'static, str>, Instance); 2]>,
}

impl Args {
    pub(crate) fn new(
        type_args: TypeArgs,
        values: SmallVec<[Option<Instance>; 4]>,
        members: SmallVec<[(Cow<'static, str>, Instance); 2]>
    ) -> Self {
        Self { type_args, values, members }
    }

    /// Number of positional arguments
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if the constructor takes no arguments
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Takes the argument at `index`; `None` for an optional parameter bound to nothing
    #[inline]
    pub fn take(&mut self, index: usize) -> Option<Instance> {
        self.values.get_mut(index).and_then(Option::take)
    }

    /// Clones the argument at `index` out as `T`
    pub fn get<T: Clone + Send + Sync + 'static>(&self, index: usize) -> Result<T, Error> {
        self.required(index)?.get::<T>()
    }

    /// Returns the argument at `index` as a shared pointer
    pub fn shared<T: Send + Sync + 'static>(&self, index: usize) -> Result<Arc<T>, Error> {
        self.required(index)?.downcast::<T>()
    }

    /// Closed generic arguments of the type being constructed
    #[inline]
    pub fn type_args(&self) -> &[Type] {
        &self.type_args
    }

    /// Returns an injected member value
    #[inline]
    pub fn member(&self, name: &str) -> Option<&Instance> {
        self.members
            .iter()
            .find_map(|(n, v)| (n == name).then_some(v))
    }

    #[inline]
    fn required(&self, index: usize) -> Result<&Instance, Error> {
        self.values
            .get(index)
            .and_then(Option::as_ref)
            .ok_or_else(|| Error::ResolveFailed(format!("argument #{index} is missing")))
    }
}

/// A constructor: an ordered parameter signature and the function building the value
#[derive(Clone)]
pub struct Constructor {
    params: Arc<[Param]>,
    build: BuildFn,
}

impl Debug for Constructor {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.params.iter()).finish()
    }
}

impl Constructor {
    /// Creates a constructor from its parameters and a build function
    ///
    /// # Example
    /// ```no_run
    /// use rivet::{Constructor, Instance, Param, Type};
    ///
    /// struct Timeout(u64);
    ///
    /// let ctor = Constructor::new(
    ///     [Param::new("millis", Type::of::<u64>())],
    ///     |args| Ok(Instance::new(Timeout(args.get::<u64>(0)?)))
    /// );
    /// ```
    pub fn new<F>(params: impl IntoIterator<Item = Param>, build: F) -> Self
    where
        F: Fn(&mut Args) -> Result<Instance, Error> + Send + Sync + 'static
    {
        Self {
            params: params.into_iter().collect(),
            build: Arc::new(build),
        }
    }

    /// Creates a constructor from a closure whose argument types declare the parameters
    pub fn from_fn<F, A>(factory: F) -> Self
    where
        F: GenericFactory<A>,
        F::Output: Send + Sync + 'static,
        A: Dependencies
    {
        let params = A::params();
        debug_assert_eq!(params.len(), F::ARITY);
        Self::new(params, move |args: &mut Args| {
            let deps = A::from_args(args)?;
            factory.call(deps).map(Instance::new)
        })
    }

    /// Parameter signature
    #[inline]
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Number of parameters
    #[inline]
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    #[inline]
    pub(crate) fn optional_count(&self) -> usize {
        self.params.iter().filter(|p| p.is_optional()).count()
    }

    #[inline]
    pub(crate) fn build(&self, args: &mut Args) -> Result<Instance, Error> {
        (self.build)(args)
    }

    pub(crate) fn signature(&self, owner: &Type) -> String {
        let params = self.params
            .iter()
            .map(|p| p.ty().to_string())
            .collect::<Vec<_>>();
        format!("{owner}({})", params.join(", "))
    }
}

/// An injectable member
#[derive(Debug, Clone)]
pub struct Member {
    name: Cow<'static, str>,
    ty: Type,
}

impl Member {
    /// Member name
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Member type
    #[inline]
    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub(crate) fn key_name(&self) -> Cow<'static, str> {
        self.name.clone()
    }
}

#[derive(Clone)]
pub(crate) struct Base {
    pub(crate) ty: Type,
    pub(crate) upcast: Option<Upcast>,
}

/// Describes a type the container can construct or convert: its bases, variance,
/// constructors and injectable members.
///
/// # Example
/// ```no_run
/// use rivet::{Constructor, Param, Instance, Type, TypeDef};
/// use std::sync::Arc;
///
/// trait Greeter: Send + Sync {
///     fn greet(&self) -> String;
/// }
///
/// struct English;
///
/// impl Greeter for English {
///     fn greet(&self) -> String { "hello".into() }
/// }
///
/// let def = TypeDef::of::<English>()
///     .implements_as(Type::of::<Arc<dyn Greeter>>(), |e: Arc<English>| e as Arc<dyn Greeter>)
///     .constructor(Constructor::new([], |_| Ok(Instance::new(English))));
/// ```
#[derive(Clone)]
pub struct TypeDef {
    ty: Type,
    bases: Vec<Base>,
    variance: SmallVec<[Variance; 2]>,
    constructors: Vec<Constructor>,
    members: Vec<Member>,
    release: Option<ReleaseFn>,
}

impl Debug for TypeDef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDef")
            .field("ty", &self.ty)
            .field("bases", &self.bases.iter().map(|b| &b.ty).collect::<Vec<_>>())
            .field("constructors", &self.constructors)
            .field("members", &self.members)
            .finish()
    }
}

impl TypeDef {
    /// Starts a definition for `ty`.
    ///
    /// A constructed generic is reduced to its open definition.
    pub fn new(ty: Type) -> Self {
        let ty = ty.family();
        let variance = smallvec::smallvec![Variance::Invariant; ty.arity()];
        Self {
            ty,
            bases: Vec::new(),
            variance,
            constructors: Vec::new(),
            members: Vec::new(),
            release: None,
        }
    }

    /// Starts a definition for a Rust type
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::new(Type::of::<T>())
    }

    /// Starts a definition for a declared, non-generic type
    #[inline]
    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        Self::new(Type::named(name))
    }

    /// Starts a definition for an open generic type
    #[inline]
    pub fn generic(name: impl Into<Cow<'static, str>>, arity: usize) -> Self {
        Self::new(Type::generic(name, arity))
    }

    /// Declares a base whose instances share this type's representation.
    ///
    /// `base` may refer to this type's generic parameters with [`Type::param`].
    pub fn implements(mut self, base: Type) -> Self {
        self.bases.push(Base { ty: base, upcast: None });
        self
    }

    /// Declares a base reached by converting the shared value, e.g. into a trait object
    pub fn implements_as<T, U, F>(mut self, base: Type, convert: F) -> Self
    where
        T: Send + Sync + 'static,
        U: Send + Sync + 'static,
        F: Fn(Arc<T>) -> U + Send + Sync + 'static
    {
        let upcast: Upcast = Arc::new(move |instance: Instance| instance.convert(&convert));
        self.bases.push(Base { ty: base, upcast: Some(upcast) });
        self
    }

    /// Marks the generic parameter at `index` as covariant
    pub fn covariant(mut self, index: usize) -> Self {
        if let Some(v) = self.variance.get_mut(index) {
            *v = Variance::Covariant;
        }
        self
    }

    /// Adds a constructor candidate
    pub fn constructor(mut self, constructor: Constructor) -> Self {
        self.constructors.push(constructor);
        self
    }

    /// Adds a constructor candidate built from a closure
    pub fn constructor_fn<F, A>(self, factory: F) -> Self
    where
        F: GenericFactory<A>,
        F::Output: Send + Sync + 'static,
        A: Dependencies
    {
        self.constructor(Constructor::from_fn(factory))
    }

    /// Declares an injectable member; bound values are exposed through [`Args::member`]
    pub fn member(mut self, name: impl Into<Cow<'static, str>>, ty: Type) -> Self {
        self.members.push(Member { name: name.into(), ty });
        self
    }

    /// Marks instances of `T` built from this definition as needing release
    pub fn disposable<T: Dispose + 'static>(mut self) -> Self {
        self.release = Some(Arc::new(|instance: &Instance| {
            instance
                .downcast::<T>()
                .ok()
                .map(|value| value as Arc<dyn Dispose>)
        }));
        self
    }

    /// The defined type: plain, or an open generic definition
    #[inline]
    pub fn ty(&self) -> &Type {
        &self.ty
    }

    /// Constructor candidates in declaration order
    #[inline]
    pub fn constructors(&self) -> &[Constructor] {
        &self.constructors
    }

    /// Injectable members
    #[inline]
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// Variance of the generic parameter at `index`
    #[inline]
    pub fn variance(&self, index: usize) -> Variance {
        self.variance.get(index).copied().unwrap_or_default()
    }

    #[inline]
    pub(crate) fn bases(&self) -> &[Base] {
        &self.bases
    }

    pub(crate) fn attach_release(&self, instance: Instance) -> Instance {
        if instance.needs_release() {
            return instance;
        }
        match self.release.as_ref().and_then(|r| r(&instance)) {
            Some(handle) => instance.with_release(handle),
            None => instance,
        }
    }
}

//! Runtime type identities
//!
//! Rust has no runtime reflection over generic definitions, so services are keyed by
//! [`Type`] values instead of [`TypeId`] alone. A [`Type`] is one of:
//!
//! - a plain type, either a Rust type (`Type::of::<T>()`) or a declared name (`Type::named`);
//! - an open generic definition (`Type::generic("Repository", 1)`);
//! - a constructed generic, a definition applied to arguments (`Repository<i32>`);
//! - a generic parameter placeholder (`Type::param(0)`), used inside [`TypeDef`] declarations.
//!
//! Types are cheap to clone and compare structurally.

use crate::error::Error;
use smallvec::SmallVec;
use std::{
    any::{TypeId, type_name},
    borrow::Cow,
    fmt::{self, Debug, Display, Formatter},
    hash::{Hash, Hasher},
    sync::Arc
};

pub use self::def::{Args, Constructor, Member, Param, TypeDef, Variance};
pub(crate) use self::catalog::{Catalog, Conversion, ParamMap};

mod catalog;
mod def;

/// Generic argument list
pub(crate) type TypeArgs = SmallVec<[Type; 2]>;

/// Path of argument indices leading to a nested type argument
pub(crate) type ArgPath = SmallVec<[usize; 4]>;

const ENUMERABLE: &str = "Enumerable";

/// A runtime type identity
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Type(Arc<Repr>);

#[derive(PartialEq, Eq, Hash)]
enum Repr {
    Plain(Nominal),
    Definition(Nominal),
    Constructed(Nominal, TypeArgs),
    Param(usize),
}

#[derive(Clone)]
struct Nominal {
    id: Identity,
    name: Cow<'static, str>,
    arity: usize,
}

#[derive(Clone, PartialEq, Eq, Hash)]
enum Identity {
    Rust(TypeId),
    Declared(Cow<'static, str>),
}

impl PartialEq for Nominal {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.arity == other.arity
    }
}

impl Eq for Nominal {}

impl Hash for Nominal {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.arity.hash(state);
    }
}

impl Type {
    /// Returns the identity of a Rust type
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self(Arc::new(Repr::Plain(Nominal {
            id: Identity::Rust(TypeId::of::<T>()),
            name: Cow::Borrowed(type_name::<T>()),
            arity: 0,
        })))
    }

    /// Returns a declared, non-generic type identified by its name
    #[inline]
    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        let name = name.into();
        Self(Arc::new(Repr::Plain(Nominal {
            id: Identity::Declared(name.clone()),
            name,
            arity: 0,
        })))
    }

    /// Returns an open generic definition with `arity` type parameters.
    ///
    /// An arity of zero produces a plain [`Type::named`] type.
    pub fn generic(name: impl Into<Cow<'static, str>>, arity: usize) -> Self {
        if arity == 0 {
            return Self::named(name);
        }
        let name = name.into();
        Self(Arc::new(Repr::Definition(Nominal {
            id: Identity::Declared(name.clone()),
            name,
            arity,
        })))
    }

    /// Returns the placeholder for the generic parameter at `index`
    #[inline]
    pub fn param(index: usize) -> Self {
        Self(Arc::new(Repr::Param(index)))
    }

    /// Returns the built-in open `Enumerable<>` definition
    #[inline]
    pub fn enumerable_definition() -> Self {
        Self(Arc::new(Repr::Definition(enumerable_nominal())))
    }

    /// Returns `Enumerable<element>`
    #[inline]
    pub fn enumerable(element: Type) -> Self {
        Self(Arc::new(Repr::Constructed(enumerable_nominal(), smallvec::smallvec![element])))
    }

    /// Applies an open generic definition to `args`
    pub fn make_generic(&self, args: impl IntoIterator<Item = Type>) -> Result<Type, Error> {
        let Repr::Definition(nominal) = self.0.as_ref() else {
            return Err(Error::InvalidType(format!("{self} is not a generic definition")));
        };
        let args: TypeArgs = args.into_iter().collect();
        if args.len() != nominal.arity {
            return Err(Error::InvalidType(format!(
                "{self} expects {} type arguments, got {}",
                nominal.arity,
                args.len()
            )));
        }
        Ok(Self(Arc::new(Repr::Constructed(nominal.clone(), args))))
    }

    /// Returns the name without generic arguments
    #[inline]
    pub fn name(&self) -> &str {
        match self.0.as_ref() {
            Repr::Plain(n) | Repr::Definition(n) | Repr::Constructed(n, _) => &n.name,
            Repr::Param(_) => "T",
        }
    }

    /// Number of generic parameters of the type's definition
    #[inline]
    pub fn arity(&self) -> usize {
        match self.0.as_ref() {
            Repr::Definition(n) | Repr::Constructed(n, _) => n.arity,
            _ => 0,
        }
    }

    /// Returns the generic arguments of a constructed type, empty otherwise
    #[inline]
    pub fn args(&self) -> &[Type] {
        match self.0.as_ref() {
            Repr::Constructed(_, args) => args,
            _ => &[],
        }
    }

    /// `true` for an open generic definition such as `Repository<>`
    #[inline]
    pub fn is_generic_definition(&self) -> bool {
        matches!(self.0.as_ref(), Repr::Definition(_))
    }

    /// `true` for definitions and constructed generics
    #[inline]
    pub fn is_generic(&self) -> bool {
        matches!(self.0.as_ref(), Repr::Definition(_) | Repr::Constructed(..))
    }

    /// `true` when the type is a generic parameter placeholder
    #[inline]
    pub fn is_param(&self) -> bool {
        matches!(self.0.as_ref(), Repr::Param(_))
    }

    /// `true` when the type can have instances: no open definition and no placeholders
    #[inline]
    pub fn is_closed(&self) -> bool {
        !self.is_generic_definition() && !self.contains_params()
    }

    /// `true` when a generic parameter placeholder appears anywhere in the type
    pub fn contains_params(&self) -> bool {
        match self.0.as_ref() {
            Repr::Param(_) => true,
            Repr::Constructed(_, args) => args.iter().any(Type::contains_params),
            _ => false,
        }
    }

    /// Returns the open definition of a generic type
    pub fn definition(&self) -> Option<Type> {
        match self.0.as_ref() {
            Repr::Definition(_) => Some(self.clone()),
            Repr::Constructed(n, _) => Some(Self(Arc::new(Repr::Definition(n.clone())))),
            _ => None,
        }
    }

    /// The key a type's registrations are grouped under: its definition when generic
    #[inline]
    pub fn family(&self) -> Type {
        self.definition().unwrap_or_else(|| self.clone())
    }

    /// `true` for `Enumerable<T>`
    #[inline]
    pub fn is_enumerable(&self) -> bool {
        matches!(self.0.as_ref(), Repr::Constructed(n, _) if is_enumerable(n))
    }

    /// Returns `T` of `Enumerable<T>`
    #[inline]
    pub fn element_type(&self) -> Option<&Type> {
        match self.0.as_ref() {
            Repr::Constructed(n, args) if is_enumerable(n) => args.first(),
            _ => None,
        }
    }

    /// Replaces each `Type::param(i)` with `args[i]`
    pub fn substitute(&self, args: &[Type]) -> Type {
        match self.0.as_ref() {
            Repr::Param(i) => args.get(*i).cloned().unwrap_or_else(|| self.clone()),
            Repr::Constructed(n, inner) if self.contains_params() => {
                let inner = inner.iter().map(|t| t.substitute(args)).collect();
                Self(Arc::new(Repr::Constructed(n.clone(), inner)))
            }
            _ => self.clone(),
        }
    }

    /// For a definition `G<>` returns `G<T0, .., Tn>` over its own parameters
    pub(crate) fn with_own_params(&self) -> Type {
        match self.0.as_ref() {
            Repr::Definition(n) => {
                let args = (0..n.arity).map(Type::param).collect();
                Self(Arc::new(Repr::Constructed(n.clone(), args)))
            }
            _ => self.clone(),
        }
    }

    /// Finds where parameter `index` occurs inside the generic arguments
    pub(crate) fn find_param(&self, index: usize) -> Option<ArgPath> {
        for (position, arg) in self.args().iter().enumerate() {
            if matches!(arg.0.as_ref(), Repr::Param(i) if *i == index) {
                return Some(smallvec::smallvec![position]);
            }
            if let Some(mut path) = arg.find_param(index) {
                path.insert(0, position);
                return Some(path);
            }
        }
        None
    }

    /// Follows a path produced by [`Type::find_param`]
    pub(crate) fn at_path(&self, path: &[usize]) -> Option<&Type> {
        path.iter().try_fold(self, |ty, &i| ty.args().get(i))
    }
}

#[inline]
fn enumerable_nominal() -> Nominal {
    Nominal {
        id: Identity::Declared(Cow::Borrowed(ENUMERABLE)),
        name: Cow::Borrowed(ENUMERABLE),
        arity: 1,
    }
}

#[inline]
fn is_enumerable(nominal: &Nominal) -> bool {
    nominal.arity == 1 && matches!(&nominal.id, Identity::Declared(name) if name == ENUMERABLE)
}

impl Display for Type {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.0.as_ref() {
            Repr::Plain(n) => f.write_str(&n.name),
            Repr::Definition(n) => write!(f, "{}<{}>", n.name, ",".repeat(n.arity - 1)),
            Repr::Constructed(n, args) => {
                write!(f, "{}<", n.name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    Display::fmt(arg, f)?;
                }
                f.write_str(">")
            }
            Repr::Param(i) => write!(f, "T{i}"),
        }
    }
}

impl Debug for Type {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Type({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::Type;

    #[test]
    fn it_compares_rust_types_by_identity() {
        assert_eq!(Type::of::<i32>(), Type::of::<i32>());
        assert_ne!(Type::of::<i32>(), Type::of::<u32>());
    }

    #[test]
    fn it_compares_declared_types_by_name_and_arity() {
        assert_eq!(Type::generic("Repo", 1), Type::generic("Repo", 1));
        assert_ne!(Type::generic("Repo", 1), Type::generic("Repo", 2));
        assert_eq!(Type::generic("Repo", 0), Type::named("Repo"));
    }

    #[test]
    fn it_closes_generic_definition() {
        let repo = Type::generic("Repo", 1);
        let closed = repo.make_generic([Type::of::<i32>()]).unwrap();

        assert!(closed.is_closed());
        assert_eq!(closed.definition(), Some(repo.clone()));
        assert_eq!(closed.args(), &[Type::of::<i32>()]);
        assert_eq!(closed.to_string(), "Repo<i32>");
    }

    #[test]
    fn it_rejects_wrong_arity() {
        let repo = Type::generic("Repo", 2);

        assert!(repo.make_generic([Type::of::<i32>()]).is_err());
        assert!(Type::of::<i32>().make_generic([]).is_err());
    }

    #[test]
    fn it_substitutes_nested_params() {
        let generic = Type::generic("IGeneric", 1);
        let nested = generic
            .make_generic([generic.make_generic([Type::enumerable(Type::param(0))]).unwrap()])
            .unwrap();

        assert!(nested.contains_params());

        let closed = nested.substitute(&[Type::of::<String>()]);

        assert!(closed.is_closed());
        assert_eq!(
            closed.to_string(),
            format!("IGeneric<IGeneric<Enumerable<{}>>>", std::any::type_name::<String>())
        );
    }

    #[test]
    fn it_finds_param_paths() {
        let pair = Type::generic("Pair", 2);
        let wrapped = Type::generic("Wrap", 1);
        let ty = pair
            .make_generic([wrapped.make_generic([Type::param(1)]).unwrap(), Type::param(0)])
            .unwrap();

        assert_eq!(ty.find_param(0).unwrap().as_slice(), &[1]);
        assert_eq!(ty.find_param(1).unwrap().as_slice(), &[0, 0]);
        assert!(ty.find_param(2).is_none());

        let closed = ty.substitute(&[Type::of::<u8>(), Type::of::<u16>()]);

        assert_eq!(closed.at_path(&[0, 0]), Some(&Type::of::<u16>()));
    }

    #[test]
    fn it_detects_enumerables() {
        let many = Type::enumerable(Type::of::<i32>());

        assert!(many.is_enumerable());
        assert_eq!(many.element_type(), Some(&Type::of::<i32>()));
        assert_eq!(many.family(), Type::enumerable_definition());
        assert!(!Type::of::<i32>().is_enumerable());
    }
}

//! Assignability and generic parameter mapping over known type definitions

use super::{ArgPath, Type, TypeArgs, TypeDef, Variance, def::Upcast};
use crate::{error::Error, instance::Instance};
use smallvec::SmallVec;
use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::Arc
};

/// Chain of instance conversions from an implementation type to a base
#[derive(Clone, Default)]
pub(crate) struct Conversion(SmallVec<[Upcast; 1]>);

impl Conversion {
    #[inline]
    pub(crate) fn identity() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn is_identity(&self) -> bool {
        self.0.is_empty()
    }

    fn then(&self, upcast: Option<&Upcast>) -> Self {
        let mut chain = self.0.clone();
        chain.extend(upcast.cloned());
        Self(chain)
    }

    #[inline]
    pub(crate) fn apply(&self, instance: Instance) -> Result<Instance, Error> {
        self.0
            .iter()
            .try_fold(instance, |instance, upcast| upcast(instance))
    }
}

/// Maps a requested service type back to the type arguments of an implementation.
///
/// `pattern` is the service type expressed over the implementation's own parameters,
/// e.g. `IGeneric<IGeneric<Enumerable<T0>>>` for `TwiceNested<T0>`; `paths[i]` locates
/// parameter `i` inside it.
#[derive(Debug, Clone)]
pub(crate) struct ParamMap {
    pattern: Type,
    paths: SmallVec<[ArgPath; 2]>,
}

impl ParamMap {
    /// Returns the implementation's type arguments for `requested`,
    /// or `None` when `requested` does not fit the pattern
    pub(crate) fn close(&self, requested: &Type) -> Option<TypeArgs> {
        let args = self.paths
            .iter()
            .map(|path| requested.at_path(path).cloned())
            .collect::<Option<TypeArgs>>()?;
        (self.pattern.substitute(&args) == *requested).then_some(args)
    }
}

/// Known type definitions, keyed by type family
#[derive(Default, Clone)]
pub(crate) struct Catalog {
    defs: HashMap<Type, Arc<TypeDef>>,
}

impl Catalog {
    /// Adds or replaces a definition
    pub(crate) fn define(&mut self, def: Arc<TypeDef>) {
        self.defs.insert(def.ty().clone(), def);
    }

    #[inline]
    pub(crate) fn get(&self, ty: &Type) -> Option<&Arc<TypeDef>> {
        self.defs.get(&ty.family())
    }

    /// Looks a definition up by its full name or by the last path segment of it
    pub(crate) fn find_by_name(&self, name: &str) -> Option<&Arc<TypeDef>> {
        self.defs
            .values()
            .find(|def| def.ty().name() == name)
            .or_else(|| self.defs
                .values()
                .find(|def| short_name(def.ty().name()) == name))
    }

    /// Looks a type up by name among definitions and the bases they declare
    pub(crate) fn find_type(&self, name: &str) -> Option<Type> {
        if let Some(def) = self.find_by_name(name) {
            return Some(def.ty().clone());
        }
        let bases = || self.defs
            .values()
            .flat_map(|def| def.bases())
            .map(|base| base.ty.family());
        bases()
            .find(|ty| ty.name() == name)
            .or_else(|| bases().find(|ty| short_name(ty.name()) == name))
    }

    fn variance(&self, definition: &Type, index: usize) -> Variance {
        if *definition == Type::enumerable_definition() {
            return Variance::Covariant;
        }
        self.get(definition)
            .map(|def| def.variance(index))
            .unwrap_or_default()
    }

    /// All transitive bases of `ty` with the conversions reaching them
    pub(crate) fn bases(&self, ty: &Type) -> Vec<(Type, Conversion)> {
        let mut found = Vec::new();
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([(ty.with_own_params(), Conversion::identity())]);

        while let Some((current, conversion)) = queue.pop_front() {
            let Some(def) = self.get(&current) else {
                continue;
            };
            for base in def.bases() {
                let closed = base.ty.substitute(current.args());
                if !seen.insert(closed.clone()) {
                    continue;
                }
                let next = conversion.then(base.upcast.as_ref());
                found.push((closed.clone(), next.clone()));
                queue.push_back((closed, next));
            }
        }
        found
    }

    /// Returns the conversion from `from` to `to`, or `None` if `from` is not assignable to `to`
    pub(crate) fn conversion(&self, from: &Type, to: &Type) -> Option<Conversion> {
        if from == to || self.is_variant_of(from, to) {
            return Some(Conversion::identity());
        }
        self.bases(from)
            .into_iter()
            .find(|(base, _)| base == to || self.is_variant_of(base, to))
            .map(|(_, conversion)| conversion)
    }

    /// `true` if `from` and `to` are the same generic family and `from`'s arguments
    /// fit `to`'s under the definition's variance
    pub(crate) fn is_variant_of(&self, from: &Type, to: &Type) -> bool {
        let (Some(definition), Some(other)) = (from.definition(), to.definition()) else {
            return false;
        };
        if definition != other || from.is_generic_definition() || to.is_generic_definition() {
            return false;
        }
        from.args()
            .iter()
            .zip(to.args())
            .enumerate()
            .all(|(i, (f, t))| f == t || (
                self.variance(&definition, i) == Variance::Covariant
                    && self.conversion(f, t).is_some_and(|c| c.is_identity())
            ))
    }

    /// Computes how `implementation`'s type parameters are recovered from `service`
    pub(crate) fn param_map(&self, service: &Type, implementation: &Type) -> Result<ParamMap, Error> {
        let Some(service_def) = service.definition() else {
            return Err(Error::invalid_registration(service, implementation, "service type is not generic"));
        };
        let own = implementation.with_own_params();
        let pattern = if own.definition().as_ref() == Some(&service_def) {
            own
        } else {
            self.bases(implementation)
                .into_iter()
                .map(|(base, _)| base)
                .find(|base| base.definition().as_ref() == Some(&service_def))
                .ok_or_else(|| Error::invalid_registration(
                    service,
                    implementation,
                    "implementation does not derive from the service definition"
                ))?
        };
        let paths = (0..implementation.arity())
            .map(|i| pattern.find_param(i))
            .collect::<Option<SmallVec<_>>>()
            .ok_or_else(|| Error::invalid_registration(
                service,
                implementation,
                "not every type parameter of the implementation can be inferred from the service"
            ))?;
        Ok(ParamMap { pattern, paths })
    }
}

#[inline]
fn short_name(full: &str) -> &str {
    full.rsplit("::").next().unwrap_or(full)
}

//! Constructor selection and argument binding
//!
//! ## Algorithm
//!
//! Candidate constructors are grouped by parameter count, greediest group first. Within a
//! group each parameter is bound to, in order of preference:
//!
//! 1. an explicit named argument;
//! 2. a producer found by the dependency lookup;
//! 3. the parameter's default, if it is optional.
//!
//! A constructor qualifies when every parameter binds, and the first group with a qualifying
//! constructor wins. Ties inside that group go to the constructor binding the fewest
//! fallback producers; a remaining tie is an [`Error::AmbiguousBinding`].
//!
//! When no group qualifies the single greediest constructor is used with its unbindable
//! arguments deferred to resolution time, so the failure names the missing dependency.
//! Ties there are broken by the fewest optional parameters.

use crate::{
    error::Error,
    target::{Members, ServiceKey, Target},
    types::{Constructor, Member, Param, Type}
};
use indexmap::IndexMap;
use std::borrow::Cow;

/// Finds producers for dependencies while binding
pub(crate) trait DependencyLookup {
    /// Returns the default producer for `key`, if any
    fn lookup(&self, key: &ServiceKey) -> Option<Target>;
}

/// Where a bound argument's value comes from
#[derive(Debug, Clone)]
pub(crate) enum ArgSource {
    /// A producer found at bind time
    Target(Target),
    /// The parameter's default; `None` leaves an optional argument empty
    Default(Option<crate::Instance>),
    /// Resolved by key when the constructor runs
    Deferred(ServiceKey),
}

impl ArgSource {
    #[inline]
    fn is_fallback(&self) -> bool {
        match self {
            ArgSource::Target(target) => target.use_fallback(),
            ArgSource::Default(_) => true,
            ArgSource::Deferred(_) => false,
        }
    }
}

/// A parameter and the source of its value
#[derive(Debug, Clone)]
pub(crate) struct ParameterBinding {
    pub(crate) param: Param,
    pub(crate) source: ArgSource,
}

/// A member and the source of its value
#[derive(Debug, Clone)]
pub(crate) struct MemberBinding {
    pub(crate) name: Cow<'static, str>,
    pub(crate) ty: Type,
    pub(crate) source: ArgSource,
}

/// The chosen construction plan
#[derive(Debug, Clone)]
pub(crate) struct BoundPlan {
    pub(crate) constructor: usize,
    pub(crate) params: Vec<ParameterBinding>,
    pub(crate) members: Vec<MemberBinding>,
}

/// What is being bound
pub(crate) struct BindRequest<'a> {
    /// Closed type being constructed
    pub(crate) owner: &'a Type,
    pub(crate) constructors: &'a [Constructor],
    /// Closed generic arguments of `owner`
    pub(crate) type_args: &'a [Type],
    pub(crate) explicit: Option<usize>,
    pub(crate) named: Option<&'a IndexMap<Cow<'static, str>, Target>>,
    pub(crate) members: &'a [Member],
    pub(crate) member_policy: &'a Members,
}

/// Binds constructors against a dependency lookup
pub(crate) struct Binder<'a, L: DependencyLookup + ?Sized> {
    lookup: &'a L,
}

impl<'a, L: DependencyLookup + ?Sized> Binder<'a, L> {
    #[inline]
    pub(crate) fn new(lookup: &'a L) -> Self {
        Self { lookup }
    }

    pub(crate) fn bind(&self, request: &BindRequest<'_>) -> Result<BoundPlan, Error> {
        let ctors = request.constructors;
        if ctors.is_empty() {
            return Err(Error::NoConstructor(request.owner.to_string()));
        }

        let (constructor, params) = match request.explicit {
            Some(index) => {
                let ctor = ctors.get(index).ok_or_else(|| Error::NoConstructor(format!(
                    "{} (constructor #{index})",
                    request.owner
                )))?;
                (index, self.bind_deferred(ctor, request))
            }
            None => self.select(request)?,
        };

        Ok(BoundPlan {
            constructor,
            params,
            members: self.bind_members(request),
        })
    }

    fn select(&self, request: &BindRequest<'_>) -> Result<(usize, Vec<ParameterBinding>), Error> {
        let ctors = request.constructors;
        let mut order = (0..ctors.len()).collect::<Vec<_>>();
        order.sort_by_key(|&i| std::cmp::Reverse(ctors[i].arity()));

        for group in order.chunk_by(|&a, &b| ctors[a].arity() == ctors[b].arity()) {
            let qualifying = group
                .iter()
                .filter_map(|&i| self.try_bind(&ctors[i], request).map(|bindings| (i, bindings)))
                .collect::<Vec<_>>();

            if qualifying.is_empty() {
                continue;
            }

            let fallbacks = |bindings: &[ParameterBinding]| bindings
                .iter()
                .filter(|b| b.source.is_fallback())
                .count();
            let fewest = qualifying
                .iter()
                .map(|(_, bindings)| fallbacks(bindings))
                .min()
                .unwrap_or_default();
            let mut winners = qualifying
                .into_iter()
                .filter(|(_, bindings)| fallbacks(bindings) == fewest)
                .collect::<Vec<_>>();

            if winners.len() > 1 {
                return Err(self.ambiguous(request, winners.iter().map(|(i, _)| *i)));
            }
            if let Some(winner) = winners.pop() {
                return Ok(winner);
            }
        }

        let greediest = order
            .chunk_by(|&a, &b| ctors[a].arity() == ctors[b].arity())
            .next()
            .unwrap_or_default();
        let fewest_optional = greediest
            .iter()
            .map(|&i| ctors[i].optional_count())
            .min()
            .unwrap_or_default();
        let winners = greediest
            .iter()
            .copied()
            .filter(|&i| ctors[i].optional_count() == fewest_optional)
            .collect::<Vec<_>>();

        match winners.as_slice() {
            [single] => Ok((*single, self.bind_deferred(&ctors[*single], request))),
            _ => Err(self.ambiguous(request, winners.into_iter())),
        }
    }

    /// Binds every parameter or returns `None` if one cannot be bound
    fn try_bind(&self, ctor: &Constructor, request: &BindRequest<'_>) -> Option<Vec<ParameterBinding>> {
        ctor.params()
            .iter()
            .map(|param| {
                let param = param.close(request.type_args);
                let source = self.source_of(&param, request)?;
                Some(ParameterBinding { param, source })
            })
            .collect()
    }

    /// Binds every parameter, deferring those without a producer
    fn bind_deferred(&self, ctor: &Constructor, request: &BindRequest<'_>) -> Vec<ParameterBinding> {
        ctor.params()
            .iter()
            .map(|param| {
                let param = param.close(request.type_args);
                let source = self
                    .source_of(&param, request)
                    .unwrap_or_else(|| ArgSource::Deferred(ServiceKey::new(param.ty().clone())));
                ParameterBinding { param, source }
            })
            .collect()
    }

    fn source_of(&self, param: &Param, request: &BindRequest<'_>) -> Option<ArgSource> {
        if let Some(target) = request.named.and_then(|named| named.get(param.name())) {
            return Some(ArgSource::Target(target.clone()));
        }
        if let Some(target) = self.lookup.lookup(&ServiceKey::new(param.ty().clone())) {
            return Some(ArgSource::Target(target));
        }
        param
            .is_optional()
            .then(|| ArgSource::Default(param.default_value().cloned()))
    }

    fn bind_members(&self, request: &BindRequest<'_>) -> Vec<MemberBinding> {
        let bind = |member: &Member, required: bool| {
            let ty = member.ty().substitute(request.type_args);
            let key = ServiceKey::new(ty.clone());
            let source = match self.lookup.lookup(&key) {
                Some(target) => ArgSource::Target(target),
                None if required => ArgSource::Deferred(key),
                None => return None,
            };
            Some(MemberBinding { name: member.key_name(), ty, source })
        };

        match request.member_policy {
            Members::None => Vec::new(),
            Members::All => request.members
                .iter()
                .filter_map(|member| bind(member, false))
                .collect(),
            Members::Only(names) => request.members
                .iter()
                .filter(|member| names.iter().any(|n| n == member.name()))
                .filter_map(|member| bind(member, true))
                .collect(),
        }
    }

    fn ambiguous(&self, request: &BindRequest<'_>, candidates: impl Iterator<Item = usize>) -> Error {
        Error::AmbiguousBinding {
            type_name: request.owner.to_string(),
            candidates: candidates
                .map(|i| request.constructors[i].signature(request.owner))
                .collect(),
        }
    }
}

//! Ordered candidate types for a request

use crate::{registry::Registry, types::Type};
use smallvec::{SmallVec, smallvec};

/// Candidate service types to look up for one request, best match first
pub(crate) type Candidates = SmallVec<[Type; 4]>;

/// Produces the types whose registrations may satisfy a request:
///
/// 1. the requested type itself;
/// 2. registered members of the same generic family that are assignable to it under the
///    definition's variance, most recently registered first;
/// 3. the open generic definition, for a constructed generic request.
///
/// Only registered types are considered as variant alternatives,
/// so the search is bounded by what the registry holds.
pub(crate) struct TypeSelector<'a> {
    registry: &'a Registry,
}

impl<'a> TypeSelector<'a> {
    #[inline]
    pub(crate) fn new(registry: &'a Registry) -> Self {
        Self { registry }
    }

    pub(crate) fn candidates(&self, requested: &Type) -> Candidates {
        let mut candidates: Candidates = smallvec![requested.clone()];
        if requested.is_generic_definition() {
            return candidates;
        }
        let Some(definition) = requested.definition() else {
            return candidates;
        };

        let catalog = self.registry.catalog();
        for alternative in self.registry.closed_members(&definition).into_iter().rev() {
            if !candidates.contains(&alternative) && catalog.is_variant_of(&alternative, requested) {
                candidates.push(alternative);
            }
        }

        candidates.push(definition);
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        target::{ServiceKey, Target},
        types::TypeDef
    };

    fn producer_of(arg: Type) -> Type {
        Type::generic("IProducer", 1).make_generic([arg]).unwrap()
    }

    #[test]
    fn it_returns_only_plain_type() {
        let registry = Registry::new(true);

        let candidates = TypeSelector::new(&registry).candidates(&Type::of::<i32>());

        assert_eq!(candidates.as_slice(), &[Type::of::<i32>()]);
    }

    #[test]
    fn it_puts_open_definition_last() {
        let registry = Registry::new(true);
        let requested = producer_of(Type::of::<i32>());

        let candidates = TypeSelector::new(&registry).candidates(&requested);

        assert_eq!(candidates.as_slice(), &[requested, Type::generic("IProducer", 1)]);
    }

    #[test]
    fn it_includes_registered_covariant_alternatives_most_recent_first() {
        let mut registry = Registry::new(true);
        registry.define(TypeDef::generic("IProducer", 1).covariant(0));
        registry.define(TypeDef::named("Cat").implements(Type::named("Animal")));
        registry.define(TypeDef::named("Dog").implements(Type::named("Animal")));

        for name in ["Cat", "Dog"] {
            let ty = producer_of(Type::named(name));
            registry
                .register(ServiceKey::new(ty.clone()), Target::constant(crate::Instance::new(name), ty))
                .unwrap();
        }

        let requested = producer_of(Type::named("Animal"));
        let candidates = TypeSelector::new(&registry).candidates(&requested);

        assert_eq!(candidates.as_slice(), &[
            requested,
            producer_of(Type::named("Dog")),
            producer_of(Type::named("Cat")),
            Type::generic("IProducer", 1),
        ]);
    }

    #[test]
    fn it_ignores_invariant_alternatives() {
        let mut registry = Registry::new(true);
        registry.define(TypeDef::named("Cat").implements(Type::named("Animal")));

        let cats = producer_of(Type::named("Cat"));
        registry
            .register(ServiceKey::new(cats.clone()), Target::constant(crate::Instance::new(1), cats))
            .unwrap();

        let candidates = TypeSelector::new(&registry).candidates(&producer_of(Type::named("Animal")));

        assert_eq!(candidates.len(), 2);
    }
}

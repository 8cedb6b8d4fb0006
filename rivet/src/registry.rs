//! Registration store
//!
//! Producers are grouped by type family: a plain type, or the open definition of a generic
//! type. Each family is a [`Node`]:
//!
//! - a [`TargetList`] for plain types; the last registration is the default,
//!   all registrations are kept for aggregation;
//! - a [`GenericFamily`] holding producers registered against the open definition,
//!   plus one child node per closed type registered explicitly;
//! - a [`Decorating`] node wrapping another node, intercepting every fetch;
//! - a [`Projection`] node synthesizing `Enumerable<To>` from another service's producers.
//!
//! Registrations are add-only. Every registration takes a sequence number, so
//! [`Registry::fetch_all`] can merge candidates from several nodes in registration order.

use crate::{
    error::Error,
    selector::TypeSelector,
    target::{ProjectionSelector, ServiceKey, Target, TargetKind},
    types::{Catalog, ParamMap, Type, TypeDef}
};
use indexmap::IndexMap;
use std::{
    borrow::Cow,
    collections::{HashMap, HashSet},
    sync::Arc
};

pub(crate) use self::{
    decorator::Decorating,
    generic::GenericFamily,
    list::TargetList,
    projection::Projection
};

mod decorator;
mod generic;
mod list;
mod projection;

/// A registered producer and its registration sequence number
#[derive(Clone)]
pub(crate) struct Entry {
    pub(crate) seq: u64,
    pub(crate) target: Target,
}

/// Registrations of one type family
pub(crate) enum Node {
    List(TargetList),
    Generic(GenericFamily),
    Decorated(Decorating),
    Projection(Projection),
}

impl Default for Node {
    #[inline]
    fn default() -> Self {
        Node::List(TargetList::default())
    }
}

impl Node {
    #[inline]
    fn for_type(ty: &Type) -> Self {
        if ty.is_generic() {
            Node::Generic(GenericFamily::default())
        } else {
            Node::default()
        }
    }

    fn register(&mut self, key: &ServiceKey, entry: Entry) {
        match self {
            Node::List(list) => list.push(key, entry),
            Node::Generic(family) => family.register(key, entry),
            Node::Decorated(decorating) => decorating.inner_mut().register(key, entry),
            Node::Projection(projection) => projection.register(key, entry),
        }
    }

    /// Fetches the default producer for candidate `ty` of `request`
    fn fetch(&self, ty: &Type, request: &ServiceKey, root: &Registry) -> Option<Target> {
        match self {
            Node::List(list) => list.last(request),
            Node::Generic(family) => family.fetch(ty, request, root),
            Node::Decorated(decorating) => decorating.fetch(ty, request, root),
            Node::Projection(projection) => projection.fetch(request, root),
        }
    }

    fn fetch_all(&self, ty: &Type, request: &ServiceKey, root: &Registry) -> Vec<Entry> {
        match self {
            Node::List(list) => list.all(request).to_vec(),
            Node::Generic(family) => family.fetch_all(ty, request, root),
            Node::Decorated(decorating) => decorating.fetch_all(ty, request, root),
            Node::Projection(projection) => projection.fetch_all(request, root),
        }
    }

    fn closed(&self) -> Option<&IndexMap<Type, Node>> {
        match self {
            Node::Generic(family) => Some(family.closed()),
            Node::Decorated(decorating) => decorating.inner().closed(),
            _ => None,
        }
    }

    fn closed_slot(&mut self, ty: &Type) -> Option<&mut Node> {
        match self {
            Node::Generic(family) => Some(family.closed_slot(ty)),
            Node::Decorated(decorating) => decorating.inner_mut().closed_slot(ty),
            _ => None,
        }
    }
}

/// Type-indexed store of producers
pub(crate) struct Registry {
    families: IndexMap<Type, Node>,
    catalog: Catalog,
    maps: HashMap<(Type, Type), ParamMap>,
    seq: u64,
    enumerables: bool,
}

impl Registry {
    /// Creates an empty store; `enumerables` enables `Enumerable<T>` synthesis
    pub(crate) fn new(enumerables: bool) -> Self {
        Self {
            families: IndexMap::new(),
            catalog: Catalog::default(),
            maps: HashMap::new(),
            seq: 0,
            enumerables,
        }
    }

    /// Turns `Enumerable<T>` synthesis on or off
    #[inline]
    pub(crate) fn set_enumerables(&mut self, enumerables: bool) {
        self.enumerables = enumerables;
    }

    #[inline]
    pub(crate) fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Adds a type definition used for assignability checks and automatic construction
    pub(crate) fn define(&mut self, def: impl Into<Arc<TypeDef>>) -> Arc<TypeDef> {
        let def = def.into();
        self.catalog.define(def.clone());
        def
    }

    /// Registers `target` as a producer for `key`
    pub(crate) fn register(&mut self, key: ServiceKey, target: Target) -> Result<(), Error> {
        self.define_from(&target);
        self.validate(key.ty(), &target)?;
        self.push(key, target);
        Ok(())
    }

    /// Registers without checking that `target` satisfies `key`
    pub(crate) fn push(&mut self, key: ServiceKey, target: Target) {
        self.define_from(&target);
        let entry = self.next_entry(target);
        self.families
            .entry(key.ty().family())
            .or_insert_with(|| Node::for_type(key.ty()))
            .register(&key, entry);
    }

    /// Wraps the producers of `service` in `decorator`; the latest decorator is outermost
    pub(crate) fn register_decorator(&mut self, service: Type, decorator: Target) -> Result<(), Error> {
        self.define_from(&decorator);
        self.validate(&service, &decorator)?;

        let node = self.families
            .entry(service.family())
            .or_insert_with(|| Node::for_type(&service));
        let inner = std::mem::take(node);
        *node = Node::Decorated(Decorating::new(decorator, service, inner));
        Ok(())
    }

    /// Makes `Enumerable<to>` a projection of the producers of `from`
    pub(crate) fn register_projection(&mut self, from: Type, to: Type, select: ProjectionSelector) {
        let key = Type::enumerable(to.clone());
        self.seq += 1;
        let seq = self.seq;

        let family = self.families
            .entry(key.family())
            .or_insert_with(|| Node::for_type(&key));
        if let Some(slot) = family.closed_slot(&key) {
            let explicit = match std::mem::take(slot) {
                Node::List(list) => list,
                _ => TargetList::default(),
            };
            *slot = Node::Projection(Projection::new(from, to, select, seq, explicit));
        }
    }

    /// Default producer for `key`: the most recent registration of the best candidate type
    pub(crate) fn fetch(&self, key: &ServiceKey) -> Option<Target> {
        let candidates = TypeSelector::new(self).candidates(key.ty());
        let found = candidates.iter().find_map(|candidate| {
            self.families
                .get(&candidate.family())
                .and_then(|node| node.fetch(candidate, key, self))
        });
        found.or_else(|| self.synthesize_enumerable(key))
    }

    /// Every producer for `key` across all candidate types, in registration order
    pub(crate) fn fetch_all(&self, key: &ServiceKey) -> Vec<Target> {
        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        for candidate in TypeSelector::new(self).candidates(key.ty()) {
            let Some(node) = self.families.get(&candidate.family()) else {
                continue;
            };
            entries.extend(node
                .fetch_all(&candidate, key, self)
                .into_iter()
                .filter(|entry| seen.insert(entry.target.id())));
        }
        entries.sort_by_key(|entry| entry.seq);

        if entries.is_empty() {
            return self.synthesize_enumerable(key).into_iter().collect();
        }
        entries.into_iter().map(|entry| entry.target).collect()
    }

    /// Returns `true` if some producer is registered for `key`
    #[inline]
    pub(crate) fn contains(&self, key: &ServiceKey) -> bool {
        self.fetch(key).is_some()
    }

    /// How `implementation`'s type parameters are recovered from `service`
    pub(crate) fn param_map(&self, service: &Type, implementation: &Type) -> Result<Cow<'_, ParamMap>, Error> {
        match self.maps.get(&(service.family(), implementation.clone())) {
            Some(map) => Ok(Cow::Borrowed(map)),
            None => self.catalog.param_map(service, implementation).map(Cow::Owned),
        }
    }

    /// Closed types registered explicitly under a generic definition, in registration order
    pub(crate) fn closed_members(&self, definition: &Type) -> Vec<Type> {
        self.families
            .get(definition)
            .and_then(Node::closed)
            .map(|closed| closed.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// A constructor producer for `ty` built from its known definition
    pub(crate) fn auto_target(&self, ty: &Type) -> Target {
        match self.catalog.get(ty) {
            Some(def) => Target::constructor(def.clone()),
            None => Target::constructor(TypeDef::new(ty.clone())),
        }
    }

    fn synthesize_enumerable(&self, key: &ServiceKey) -> Option<Target> {
        if !self.enumerables {
            return None;
        }
        let element = key.ty().element_type()?.clone();
        let items = self.fetch_all(&key.with_type(element.clone()));
        Some(Target::enumerable(element, items))
    }

    #[inline]
    fn next_entry(&mut self, target: Target) -> Entry {
        self.seq += 1;
        Entry { seq: self.seq, target }
    }

    fn define_from(&mut self, target: &Target) {
        if let Some(def) = target.type_def() {
            self.catalog.define(def.clone());
        }
    }

    fn validate(&mut self, service: &Type, target: &Target) -> Result<(), Error> {
        if let TargetKind::Alias { key, .. } = target.kind() {
            if key.ty() == service {
                return Err(Error::invalid_registration(service, key.ty(), "an alias must differ from the aliased type"));
            }
            return match self.catalog.conversion(key.ty(), service) {
                Some(_) => Ok(()),
                None => Err(Error::invalid_registration(service, key.ty(), "aliased type is not assignable to the alias")),
            };
        }

        let declared = target.declared_type();
        if declared.is_generic_definition() {
            if !service.is_generic() {
                return Err(Error::invalid_registration(service, &declared, "an open generic cannot produce a non-generic service"));
            }
            let map = self.catalog.param_map(service, &declared)?;
            if !service.is_generic_definition() && map.close(service).is_none() {
                return Err(Error::invalid_registration(service, &declared, "implementation cannot be closed over the service arguments"));
            }
            self.maps.insert((service.family(), declared), map);
            return Ok(());
        }

        if service.is_generic_definition() {
            return Err(Error::invalid_registration(service, &declared, "an open generic service needs an open generic implementation"));
        }
        match self.catalog.conversion(&declared, service) {
            Some(_) => Ok(()),
            None => Err(Error::invalid_registration(service, &declared, "producer type is not assignable to the service type")),
        }
    }
}

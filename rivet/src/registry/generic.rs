//! Generic type families

use super::{Entry, Node, Registry, TargetList};
use crate::{
    target::{ServiceKey, Target},
    types::Type
};
use indexmap::IndexMap;

/// Producers of one generic family.
///
/// Registrations against the open definition land in `open` and serve every closed type
/// as a fallback; registrations against a closed type get their own child node.
#[derive(Default)]
pub(crate) struct GenericFamily {
    open: TargetList,
    closed: IndexMap<Type, Node>,
}

impl GenericFamily {
    pub(crate) fn register(&mut self, key: &ServiceKey, entry: Entry) {
        if key.ty().is_generic_definition() {
            self.open.push(key, entry);
        } else {
            self.closed_slot(key.ty()).register(key, entry);
        }
    }

    pub(crate) fn fetch(&self, ty: &Type, request: &ServiceKey, root: &Registry) -> Option<Target> {
        if ty.is_generic_definition() {
            return self.open.last(request);
        }
        self.closed
            .get(ty)
            .and_then(|node| node.fetch(ty, request, root))
    }

    pub(crate) fn fetch_all(&self, ty: &Type, request: &ServiceKey, root: &Registry) -> Vec<Entry> {
        if ty.is_generic_definition() {
            return self.open.all(request).to_vec();
        }
        self.closed
            .get(ty)
            .map(|node| node.fetch_all(ty, request, root))
            .unwrap_or_default()
    }

    #[inline]
    pub(crate) fn closed(&self) -> &IndexMap<Type, Node> {
        &self.closed
    }

    #[inline]
    pub(crate) fn closed_slot(&mut self, ty: &Type) -> &mut Node {
        self.closed.entry(ty.clone()).or_default()
    }
}

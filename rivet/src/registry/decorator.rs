//! Decorator chains

use super::{Entry, Node, Registry};
use crate::{
    target::{ServiceKey, Target},
    types::Type
};

/// Wraps every producer fetched from the inner node in a decorator.
///
/// Stacking one `Decorating` node over another makes the most recently registered
/// decorator the outermost one.
pub(crate) struct Decorating {
    decorator: Target,
    applies_to: Type,
    inner: Box<Node>,
}

impl Decorating {
    #[inline]
    pub(crate) fn new(decorator: Target, applies_to: Type, inner: Node) -> Self {
        Self { decorator, applies_to, inner: Box::new(inner) }
    }

    #[inline]
    pub(crate) fn inner(&self) -> &Node {
        &self.inner
    }

    #[inline]
    pub(crate) fn inner_mut(&mut self) -> &mut Node {
        &mut self.inner
    }

    pub(crate) fn fetch(&self, ty: &Type, request: &ServiceKey, root: &Registry) -> Option<Target> {
        self.inner
            .fetch(ty, request, root)
            .map(|target| self.wrap(target, request))
    }

    pub(crate) fn fetch_all(&self, ty: &Type, request: &ServiceKey, root: &Registry) -> Vec<Entry> {
        self.inner
            .fetch_all(ty, request, root)
            .into_iter()
            .map(|entry| Entry { seq: entry.seq, target: self.wrap(entry.target, request) })
            .collect()
    }

    fn wrap(&self, target: Target, request: &ServiceKey) -> Target {
        if self.applies(request.ty()) {
            Target::decorator(self.decorator.clone(), target, request.ty().clone())
        } else {
            target
        }
    }

    /// A decorator for an open definition covers the whole family
    fn applies(&self, ty: &Type) -> bool {
        self.applies_to == *ty || (
            self.applies_to.is_generic_definition()
                && ty.definition().as_ref() == Some(&self.applies_to)
        )
    }
}

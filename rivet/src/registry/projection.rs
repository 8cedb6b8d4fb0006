//! Projections of one service's producers onto another service

use super::{Entry, Registry, TargetList};
use crate::{
    target::{ProjectionItem, ProjectionSelector, ServiceKey, Target},
    types::Type
};

/// Synthesizes `Enumerable<to>` by mapping each producer of `from`
/// to an implementation chosen by `select`.
///
/// The implementation is the registered producer for the selected type when one exists
/// and is not a fallback, otherwise a constructor built from the type's definition.
/// Explicit `Enumerable<to>` registrations take precedence.
pub(crate) struct Projection {
    from: Type,
    to: Type,
    select: ProjectionSelector,
    seq: u64,
    explicit: TargetList,
}

impl Projection {
    #[inline]
    pub(crate) fn new(from: Type, to: Type, select: ProjectionSelector, seq: u64, explicit: TargetList) -> Self {
        Self { from, to, select, seq, explicit }
    }

    #[inline]
    pub(crate) fn register(&mut self, key: &ServiceKey, entry: Entry) {
        self.explicit.push(key, entry);
    }

    pub(crate) fn fetch(&self, request: &ServiceKey, root: &Registry) -> Option<Target> {
        self.explicit
            .last(request)
            .or_else(|| Some(self.project(request, root)))
    }

    pub(crate) fn fetch_all(&self, request: &ServiceKey, root: &Registry) -> Vec<Entry> {
        let explicit = self.explicit.all(request);
        if !explicit.is_empty() {
            return explicit.to_vec();
        }
        vec![Entry { seq: self.seq, target: self.project(request, root) }]
    }

    fn project(&self, request: &ServiceKey, root: &Registry) -> Target {
        let items = root
            .fetch_all(&request.with_type(self.from.clone()))
            .into_iter()
            .map(|source| {
                let ty = (self.select)(&source);
                let implementation = root
                    .fetch(&ServiceKey::new(ty.clone()))
                    .filter(|target| !target.use_fallback())
                    .unwrap_or_else(|| root.auto_target(&ty));
                ProjectionItem { source, ty, implementation }
            })
            .collect();
        Target::projection(self.from.clone(), self.to.clone(), items)
    }
}

//! Dependency lookup contexts and the compile path

use super::Compiler;
use crate::{
    binder::DependencyLookup,
    container::Container,
    error::Error,
    target::{ServiceKey, Target},
    types::Type
};
use smallvec::SmallVec;
use std::cell::RefCell;

/// Services overridden in a context, as (service, producer identity) from the innermost out
pub(crate) type Overrides = SmallVec<[(Type, usize); 2]>;

/// A lookup context: the registry plus service overrides introduced by decorators
/// and projections, linked to the context they were created in
pub(crate) struct LookupContext<'a> {
    compiler: &'a Compiler<'a>,
    parent: Option<&'a LookupContext<'a>>,
    overrides: Option<(Type, Target)>,
}

impl<'a> LookupContext<'a> {
    #[inline]
    pub(crate) fn root(compiler: &'a Compiler<'a>) -> Self {
        Self { compiler, parent: None, overrides: None }
    }

    /// A nested context in which `service` resolves to `target`
    #[inline]
    pub(crate) fn child(&'a self, service: Type, target: Target) -> LookupContext<'a> {
        Self {
            compiler: self.compiler,
            parent: Some(self),
            overrides: Some((service, target)),
        }
    }

    /// Identifies the override chain, so equal chains share compiled factories
    pub(crate) fn overrides(&self) -> Overrides {
        let mut current = Some(self);
        let mut chain = Overrides::new();
        while let Some(ctx) = current {
            if let Some((service, target)) = &ctx.overrides {
                chain.push((service.clone(), target.id()));
            }
            current = ctx.parent;
        }
        chain
    }

    fn overridden(&self, ty: &Type) -> Option<Target> {
        let mut current = Some(self);
        while let Some(ctx) = current {
            if let Some((service, target)) = &ctx.overrides {
                if service == ty {
                    return Some(target.clone());
                }
            }
            current = ctx.parent;
        }
        None
    }
}

impl DependencyLookup for LookupContext<'_> {
    fn lookup(&self, key: &ServiceKey) -> Option<Target> {
        if key.name().is_none() {
            if let Some(target) = self.overridden(key.ty()) {
                return Some(target);
            }
            if *key.ty() == Type::of::<Container>() {
                return Some(Target::container());
            }
        }
        self.compiler.fetch(key)
    }
}

/// Producers currently being compiled, as (producer identity, requested type)
#[derive(Default)]
pub(crate) struct CompilePath(RefCell<Vec<(usize, Type)>>);

impl CompilePath {
    /// Pushes a frame, failing if it is already on the path
    pub(crate) fn enter(&self, target: &Target, ty: &Type) -> Result<PathGuard<'_>, Error> {
        let frame = (target.id(), ty.clone());
        let mut frames = self.0.borrow_mut();
        if let Some(start) = frames.iter().position(|f| *f == frame) {
            let chain = frames[start..]
                .iter()
                .map(|(_, ty)| ty.to_string())
                .chain(std::iter::once(ty.to_string()))
                .collect::<Vec<_>>();

            #[cfg(feature = "tracing")]
            tracing::warn!(chain = %chain.join(" -> "), "cyclic dependency detected");

            return Err(Error::CyclicDependency(chain));
        }
        frames.push(frame);
        Ok(PathGuard(self))
    }
}

/// Pops its frame when dropped
pub(crate) struct PathGuard<'p>(&'p CompilePath);

impl Drop for PathGuard<'_> {
    #[inline]
    fn drop(&mut self) {
        self.0.0.borrow_mut().pop();
    }
}

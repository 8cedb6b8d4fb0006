//! # Rivet
//!
//! > Dependency resolution engine with open generics, decorators, covariant lookups
//! > and hierarchical lifetime scopes.
//!
//! ## Features
//! * Transient, scoped and singleton lifetimes
//! * Open generic registrations closed on demand (`Repository<T>` serves `Repository<User>`)
//! * Decorators stacked over every producer of a service
//! * Covariant lookups and enumerations of every producer of a type
//! * Greediest-satisfiable constructor selection with cycle detection
//! * Scope trees that release owned values in reverse order
//! * Factories compiled once per service and shared between threads
//! * JSON registrations and `#[derive(Injectable)]`
//!
//! ## Example
//! ```no_run
//! use rivet::{ContainerBuilder, Dc, Injectable, TypeDef};
//!
//! #[derive(Default)]
//! struct Clock;
//!
//! struct Scheduler {
//!     clock: Dc<Clock>,
//! }
//!
//! impl Injectable for Scheduler {
//!     fn type_def() -> TypeDef {
//!         TypeDef::of::<Self>().constructor_fn(|clock: Dc<Clock>| Ok(Scheduler { clock }))
//!     }
//! }
//!
//! let mut builder = ContainerBuilder::new();
//! builder.register_singleton_default::<Clock>();
//! builder.register_scoped::<Scheduler>();
//!
//! let container = builder.build();
//! let request = container.create_scope().unwrap();
//! let scheduler = request.resolve_shared::<Scheduler>().unwrap();
//! ```

mod binder;
mod compiler;
mod registry;
mod selector;

pub mod error;
pub mod types;
pub mod instance;
pub mod target;
pub mod scope;
pub mod container;
pub mod inject;
#[cfg(feature = "config")]
pub mod config;
#[cfg(feature = "tracing")]
pub mod tracing;

pub use crate::container::{
    Container,
    ContainerBuilder,
    ContainerOptions,
    Dc,
    Dependencies,
    Dependency,
    GenericFactory,
    Lifetime,
    Many,
    Resolver
};
pub use crate::error::Error;
pub use crate::inject::Injectable;
pub use crate::instance::{Dispose, Instance};
pub use crate::scope::{Scope, ScopeState};
pub use crate::target::{
    ConstructorTarget,
    Members,
    ProjectionSelector,
    ScopeBehaviour,
    ServiceKey,
    Target
};
pub use crate::types::{Args, Constructor, Member, Param, Type, TypeDef, Variance};

#[cfg(feature = "config")]
pub use crate::config::{RegistrationDocument, RegistrationEntry};
#[cfg(feature = "tracing")]
pub use crate::tracing::{Traced, TracingConfig};

#[cfg(feature = "macros")]
pub use rivet_macros::Injectable;

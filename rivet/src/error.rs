//! Describes dependency resolution errors

use std::{
    borrow::Cow,
    error::Error as StdError,
    fmt::{Display, Formatter}
};

/// Errors raised while registering, compiling or resolving services
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A producer was registered against a service type it cannot satisfy
    InvalidRegistration {
        /// Requested service type
        service: String,
        /// Declared type of the rejected producer
        producer: String,
        /// What made the registration invalid
        reason: Cow<'static, str>,
    },
    /// More than one constructor qualified and the tie-break could not pick one
    AmbiguousBinding {
        /// Type being constructed
        type_name: String,
        /// Signatures of the tied constructors
        candidates: Vec<String>,
    },
    /// The type has no constructors to bind
    NoConstructor(String),
    /// The dependency graph loops back on itself; the chain ends with the repeated type
    CyclicDependency(Vec<String>),
    /// No producer is registered for the requested key
    NotRegistered(String),
    /// The scope was disposed
    ScopeDisposed,
    /// The produced value is not of the requested Rust type
    ResolveFailed(String),
    /// A generic type was used with the wrong arity or shape
    InvalidType(String),
    /// Declarative registration input could not be applied
    Config(String),
    /// Any error raised by a user supplied producer
    Other(Cow<'static, str>),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidRegistration { service, producer, reason } => write!(
                f,
                "Services Error: {producer} cannot be registered as {service}: {reason}"
            ),
            Error::AmbiguousBinding { type_name, candidates } => write!(
                f,
                "Services Error: ambiguous constructors for {type_name}: {}",
                candidates.join(", ")
            ),
            Error::NoConstructor(type_name) => write!(f, "Services Error: {type_name} has no constructors"),
            Error::CyclicDependency(chain) => write!(
                f,
                "Services Error: cyclic dependency detected: {}",
                chain.join(" -> ")
            ),
            Error::NotRegistered(key) => write!(f, "Services Error: service not registered: {key}"),
            Error::ScopeDisposed => write!(f, "Services Error: scope has been disposed"),
            Error::ResolveFailed(msg) => write!(f, "Services Error: unable to resolve the service: {msg}"),
            Error::InvalidType(msg) => write!(f, "Services Error: invalid type: {msg}"),
            Error::Config(msg) => write!(f, "Services Error: configuration: {msg}"),
            Error::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl StdError for Error {}

impl Error {
    /// Creates an [`Error::Other`] from any message
    #[inline]
    pub fn other(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::Other(msg.into())
    }

    /// Returns `true` when the error means "no producer for this key"
    #[inline]
    pub fn is_not_registered(&self) -> bool {
        matches!(self, Error::NotRegistered(_))
    }

    #[inline]
    pub(crate) fn invalid_registration(
        service: impl ToString,
        producer: impl ToString,
        reason: impl Into<Cow<'static, str>>
    ) -> Self {
        Self::InvalidRegistration {
            service: service.to_string(),
            producer: producer.to_string(),
            reason: reason.into(),
        }
    }
}

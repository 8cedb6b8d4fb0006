//! Tools for tracing, logging and observability

use tracing::{debug, debug_span, warn};
use crate::{
    container::Resolver,
    error::Error,
    instance::Instance,
    target::ServiceKey,
    types::Type
};

const DEFAULT_SPAN_NAME: &str = "resolve";

/// Represents a tracing configuration
#[derive(Debug, Clone, Copy)]
pub struct TracingConfig {
    /// Specifies whether failed resolutions are logged at the `WARN` level
    ///
    /// Default: `true`
    log_failures: bool,

    /// Specifies the value of the `op` field recorded on each span
    ///
    /// Default: `resolve`
    span_name: &'static str,
}

impl Default for TracingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            log_failures: true,
            span_name: DEFAULT_SPAN_NAME,
        }
    }
}

impl TracingConfig {
    /// Creates a default tracing configuration
    ///
    /// Defaults:
    /// - log_failures: `true`
    /// - span_name: `resolve`
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures tracing to skip logging of failed resolutions
    ///
    /// Default: `true`
    pub fn without_failures(mut self) -> Self {
        self.log_failures = false;
        self
    }

    /// Configures the `op` field recorded on each span
    ///
    /// Default: `resolve`
    pub fn with_span_name(mut self, name: &'static str) -> Self {
        self.span_name = name;
        self
    }
}

/// A [`Resolver`] that wraps every resolution of the inner one into a `DEBUG` span.
///
/// # Example
/// ```no_run
/// use rivet::{ContainerBuilder, Resolver, ServiceKey, Traced};
///
/// let mut builder = ContainerBuilder::new();
/// builder.register_instance(42_u32);
///
/// let resolver = Traced::new(builder.build());
/// let value = resolver.resolve_key(&ServiceKey::of::<u32>()).unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct Traced<R> {
    inner: R,
    config: TracingConfig,
}

impl<R> Traced<R> {
    /// Wraps `inner` with the default [`TracingConfig`]
    pub fn new(inner: R) -> Self {
        Self::with_config(inner, TracingConfig::default())
    }

    /// Wraps `inner` with a specific [`TracingConfig`]
    pub fn with_config(inner: R, config: TracingConfig) -> Self {
        Self { inner, config }
    }

    /// Returns a reference to the wrapped resolver
    #[inline]
    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// Unwraps the resolver
    #[inline]
    pub fn into_inner(self) -> R {
        self.inner
    }

    fn record<T>(&self, result: Result<T, Error>, describe: impl FnOnce(&T) -> String) -> Result<T, Error> {
        match &result {
            Ok(value) => debug!(result = %describe(value), "resolved"),
            Err(err) if self.config.log_failures => warn!(%err, "resolution failed"),
            Err(_) => {}
        }
        result
    }
}

impl<R: Resolver> Resolver for Traced<R> {
    fn resolve_key(&self, key: &ServiceKey) -> Result<Instance, Error> {
        let _span = debug_span!("resolve", op = self.config.span_name, %key).entered();
        self.record(self.inner.resolve_key(key), |instance| instance.type_name().into())
    }

    fn try_resolve_key(&self, key: &ServiceKey) -> Result<Option<Instance>, Error> {
        let _span = debug_span!("try_resolve", op = self.config.span_name, %key).entered();
        self.record(self.inner.try_resolve_key(key), |instance| match instance {
            Some(instance) => instance.type_name().into(),
            None => "none".into(),
        })
    }

    #[inline]
    fn can_resolve_key(&self, key: &ServiceKey) -> bool {
        self.inner.can_resolve_key(key)
    }

    fn resolve_many(&self, ty: &Type) -> Result<Vec<Instance>, Error> {
        let _span = debug_span!("resolve_many", op = self.config.span_name, %ty).entered();
        self.record(self.inner.resolve_many(ty), |items| format!("{} items", items.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ContainerBuilder;
    use std::{io, sync::{Arc, Mutex}};

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Buffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn capture<T>(f: impl FnOnce() -> T) -> (T, String) {
        let buffer = Buffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let result = tracing::subscriber::with_default(subscriber, f);
        (result, buffer.contents())
    }

    #[test]
    fn it_traces_resolved_values() {
        let mut builder = ContainerBuilder::new();
        builder.register_instance(42_u32);
        let resolver = Traced::new(builder.build());

        let (value, logs) = capture(|| resolver.resolve_key(&ServiceKey::of::<u32>()));

        assert_eq!(value.unwrap().get::<u32>().unwrap(), 42);
        assert!(logs.contains("resolved"));
        assert!(logs.contains("u32"));
    }

    #[test]
    fn it_warns_on_failures() {
        let resolver = Traced::new(ContainerBuilder::new().build());

        let (value, logs) = capture(|| resolver.resolve_key(&ServiceKey::of::<u32>()));

        assert!(value.unwrap_err().is_not_registered());
        assert!(logs.contains("WARN"));
        assert!(logs.contains("resolution failed"));
    }

    #[test]
    fn it_skips_failures_when_configured() {
        let config = TracingConfig::new().without_failures();
        let resolver = Traced::with_config(ContainerBuilder::new().build(), config);

        let (value, logs) = capture(|| resolver.try_resolve_key(&ServiceKey::of::<u32>()));

        assert!(value.unwrap().is_none());
        assert!(!logs.contains("resolution failed"));
    }

    #[test]
    fn it_delegates_to_inner_resolver() {
        let mut builder = ContainerBuilder::new();
        builder.register_instance(1_u8);
        builder.register_instance(2_u8);
        let resolver = Traced::new(builder.build());

        assert!(resolver.can_resolve_key(&ServiceKey::of::<u8>()));
        assert_eq!(resolver.resolve_many(&Type::of::<u8>()).unwrap().len(), 2);
        assert_eq!(resolver.into_inner().resolve::<u8>().unwrap(), 2);
    }
}

//! Declarative registrations loaded from JSON
//!
//! ```json
//! {
//!   "registrations": [
//!     { "service": "Greeter", "type": "English", "lifetime": "singleton" },
//!     { "service": "Greeter", "decorator": "Loud" },
//!     { "service": "Audit", "alias": "Greeter", "name": "audit" }
//!   ]
//! }
//! ```
//!
//! Names refer to types known to the builder: [`TypeDef`]s passed to
//! [`ContainerBuilder::define`] and the bases they declare, matched by full name or by
//! the last path segment.

use crate::{
    container::{ContainerBuilder, Lifetime},
    error::Error,
    target::{ServiceKey, Target},
    types::{Type, TypeDef}
};
use serde::Deserialize;
use std::sync::Arc;

/// A set of registrations
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistrationDocument {
    /// Registrations, applied in order
    #[serde(default)]
    pub registrations: Vec<RegistrationEntry>,
}

/// One registration.
///
/// Exactly one of `type`, `decorator` and `alias` may be set; with none of them
/// the service type registers itself.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistrationEntry {
    /// Service type name
    pub service: String,

    /// Implementation type name
    #[serde(rename = "type")]
    pub implementation: Option<String>,

    /// Decorator type name wrapping every producer of the service
    pub decorator: Option<String>,

    /// Name of the type whose producer the service reuses
    pub alias: Option<String>,

    /// Lifetime of the produced value
    #[serde(default)]
    pub lifetime: Lifetime,

    /// Registration name
    pub name: Option<String>,
}

impl RegistrationDocument {
    /// Parses a document from JSON
    pub fn from_json(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(|err| Error::Config(err.to_string()))
    }
}

impl ContainerBuilder {
    /// Applies the registrations of a JSON [`RegistrationDocument`]
    ///
    /// # Example
    /// ```no_run
    /// use rivet::{Constructor, ContainerBuilder, Instance, Type, TypeDef};
    ///
    /// let mut builder = ContainerBuilder::new();
    /// builder.define(TypeDef::named("English")
    ///     .implements(Type::named("Greeter"))
    ///     .constructor(Constructor::new([], |_| Ok(Instance::new("hello")))));
    ///
    /// builder.load_json(r#"{
    ///     "registrations": [{ "service": "Greeter", "type": "English" }]
    /// }"#).unwrap();
    /// ```
    pub fn load_json(&mut self, json: &str) -> Result<(), Error> {
        let document = RegistrationDocument::from_json(json)?;
        self.load(&document)
    }

    /// Applies the registrations of a [`RegistrationDocument`], stopping at the first failure
    pub fn load(&mut self, document: &RegistrationDocument) -> Result<(), Error> {
        for (index, entry) in document.registrations.iter().enumerate() {
            self.load_entry(entry).map_err(|err| match err {
                Error::Config(msg) => Error::Config(format!("registration #{index}: {msg}")),
                err => err,
            })?;

            #[cfg(feature = "tracing")]
            tracing::debug!(service = %entry.service, lifetime = ?entry.lifetime, "loaded registration");
        }
        Ok(())
    }

    fn load_entry(&mut self, entry: &RegistrationEntry) -> Result<(), Error> {
        let service = self.find_type(&entry.service)?;
        let key = match &entry.name {
            Some(name) => ServiceKey::named(service.clone(), name.clone()),
            None => ServiceKey::new(service.clone()),
        };

        match (&entry.implementation, &entry.decorator, &entry.alias) {
            (None, None, None) => {
                let def = self.find_def(&entry.service)?;
                self.register(key, entry.lifetime.apply(Target::constructor(def)))
            }
            (Some(implementation), None, None) => {
                let def = self.find_def(implementation)?;
                self.register(key, entry.lifetime.apply(Target::constructor(def)))
            }
            (None, Some(decorator), None) => {
                if entry.name.is_some() {
                    return Err(Error::Config("a decorator cannot be named".into()));
                }
                let def = self.find_def(decorator)?;
                self.register_decorator(service, entry.lifetime.apply(Target::constructor(def)))
            }
            (None, None, Some(alias)) => {
                let original = self.find_type(alias)?;
                self.register_alias(key, ServiceKey::new(original))
            }
            _ => Err(Error::Config(format!(
                "{}: only one of `type`, `decorator` and `alias` can be set",
                entry.service
            ))),
        }
    }

    fn find_type(&self, name: &str) -> Result<Type, Error> {
        self.registry()
            .catalog()
            .find_type(name)
            .ok_or_else(|| Error::Config(format!("unknown type `{name}`")))
    }

    fn find_def(&self, name: &str) -> Result<Arc<TypeDef>, Error> {
        self.registry()
            .catalog()
            .find_by_name(name)
            .cloned()
            .ok_or_else(|| Error::Config(format!("no definition for type `{name}`")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Constructor, Instance, Param};

    fn builder() -> ContainerBuilder {
        let mut builder = ContainerBuilder::new();
        builder.define(TypeDef::named("app::English")
            .implements(Type::named("app::Greeter"))
            .constructor(Constructor::new([], |_| Ok(Instance::new(String::from("hello"))))));
        builder.define(TypeDef::named("app::Loud")
            .implements(Type::named("app::Greeter"))
            .constructor(Constructor::new(
                [Param::new("inner", Type::named("app::Greeter"))],
                |args| Ok(Instance::new(args.get::<String>(0)?.to_uppercase()))
            )));
        builder
    }

    #[test]
    fn it_parses_document() {
        let document = RegistrationDocument::from_json(r#"{
            "registrations": [
                { "service": "Greeter", "type": "English", "lifetime": "singleton" },
                { "service": "Greeter", "decorator": "Loud" }
            ]
        }"#).unwrap();

        assert_eq!(document.registrations.len(), 2);
        assert_eq!(document.registrations[0].lifetime, Lifetime::Singleton);
        assert_eq!(document.registrations[1].lifetime, Lifetime::Transient);
        assert_eq!(document.registrations[1].decorator.as_deref(), Some("Loud"));
    }

    #[test]
    fn it_rejects_unknown_fields() {
        let err = RegistrationDocument::from_json(r#"{
            "registrations": [{ "service": "Greeter", "scope": "request" }]
        }"#).unwrap_err();

        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn it_applies_registrations() {
        let mut builder = builder();
        builder.load_json(r#"{
            "registrations": [
                { "service": "Greeter", "type": "English", "lifetime": "singleton" },
                { "service": "Greeter", "decorator": "Loud" }
            ]
        }"#).unwrap();

        let container = builder.build();
        let greeting = container.resolve_type(&Type::named("app::Greeter")).unwrap();

        assert_eq!(greeting.get::<String>().unwrap(), "HELLO");
    }

    #[test]
    fn it_rejects_unknown_types() {
        let mut builder = builder();

        let err = builder.load_json(r#"{
            "registrations": [{ "service": "Greeter", "type": "French" }]
        }"#).unwrap_err();

        assert_eq!(err, Error::Config("registration #0: no definition for type `French`".into()));
    }

    #[test]
    fn it_rejects_conflicting_entries() {
        let mut builder = builder();

        let err = builder.load_json(r#"{
            "registrations": [{ "service": "Greeter", "type": "English", "alias": "Loud" }]
        }"#).unwrap_err();

        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn it_registers_self_and_alias() {
        let mut builder = builder();
        builder.load_json(r#"{
            "registrations": [
                { "service": "English" },
                { "service": "Greeter", "alias": "English", "name": "polite" }
            ]
        }"#).unwrap();

        let container = builder.build();
        let key = ServiceKey::named(Type::named("app::Greeter"), "polite");
        let greeting = crate::Resolver::resolve_key(&container, &key).unwrap();

        assert_eq!(greeting.get::<String>().unwrap(), "hello");
    }
}

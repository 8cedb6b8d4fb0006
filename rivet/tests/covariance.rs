#![allow(missing_docs)]

use rivet::{ContainerBuilder, Instance, Resolver, ServiceKey, Target, Type, TypeDef};

fn producer() -> Type {
    Type::generic("IProducer", 1)
}

fn producer_of(name: &'static str) -> Type {
    producer().make_generic([Type::named(name)]).unwrap()
}

fn builder() -> ContainerBuilder {
    let mut builder = ContainerBuilder::new();
    builder.define(TypeDef::new(producer()).covariant(0));
    builder.define(TypeDef::named("Cat").implements(Type::named("Animal")));
    builder.define(TypeDef::named("Dog").implements(Type::named("Animal")));
    builder
}

fn register(builder: &mut ContainerBuilder, animal: &'static str) {
    let ty = producer_of(animal);
    builder
        .register(ServiceKey::new(ty.clone()), Target::constant(Instance::new(animal), ty))
        .unwrap();
}

#[test]
fn it_resolves_covariant_alternative() {
    let mut builder = builder();
    register(&mut builder, "Cat");

    let container = builder.build();

    let animals = container.resolve_type(&producer_of("Animal")).unwrap();

    assert_eq!(animals.get::<&'static str>().unwrap(), "Cat");
}

#[test]
fn it_prefers_most_recent_alternative() {
    let mut builder = builder();
    register(&mut builder, "Cat");
    register(&mut builder, "Dog");

    let container = builder.build();

    let animals = container.resolve_type(&producer_of("Animal")).unwrap();

    assert_eq!(animals.get::<&'static str>().unwrap(), "Dog");
}

#[test]
fn it_aggregates_alternatives_in_registration_order() {
    let mut builder = builder();
    register(&mut builder, "Cat");
    register(&mut builder, "Dog");

    let container = builder.build();

    let all = container.resolve_many(&producer_of("Animal")).unwrap();

    assert_eq!(
        all.iter().map(|i| i.get::<&'static str>().unwrap()).collect::<Vec<_>>(),
        vec!["Cat", "Dog"]
    );
}

#[test]
fn it_prefers_exact_registration() {
    let mut builder = builder();
    register(&mut builder, "Animal");
    register(&mut builder, "Cat");

    let container = builder.build();

    let animals = container.resolve_type(&producer_of("Animal")).unwrap();

    assert_eq!(animals.get::<&'static str>().unwrap(), "Animal");
}

#[test]
fn it_does_not_apply_variance_to_invariant_parameters() {
    let consumer = Type::generic("IConsumer", 1);
    let cats = consumer.make_generic([Type::named("Cat")]).unwrap();
    let animals = consumer.make_generic([Type::named("Animal")]).unwrap();

    let mut builder = builder();
    builder.define(TypeDef::new(consumer.clone()));
    builder
        .register(ServiceKey::new(cats.clone()), Target::constant(Instance::new("Cat"), cats))
        .unwrap();

    let container = builder.build();

    assert!(container.resolve_type(&animals).unwrap_err().is_not_registered());
    assert!(!container.can_resolve_key(&ServiceKey::new(animals)));
}

#[test]
fn it_does_not_narrow() {
    let mut builder = builder();
    register(&mut builder, "Animal");

    let container = builder.build();

    assert!(container.resolve_type(&producer_of("Cat")).unwrap_err().is_not_registered());
}

#![allow(missing_docs)]

use rivet::{Constructor, ContainerBuilder, Dc, Instance, Lifetime, Param, Type, TypeDef};
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

#[derive(Default)]
struct Clock;

struct Scheduler {
    _clock: Dc<Clock>,
}

fn irepo() -> Type {
    Type::generic("IRepo", 1)
}

fn benchmark(c: &mut Criterion) {
    let mut builder = ContainerBuilder::new();
    builder.register_singleton_default::<Clock>();
    builder.register_scoped_factory(|clock: Dc<Clock>| Ok(Scheduler { _clock: clock }));
    builder.register_transient_factory(|clock: Dc<Clock>| Ok(vec![clock]));

    let irepo_of_t = irepo().make_generic([Type::param(0)]).unwrap();
    builder.register_type(
        TypeDef::generic("Repo", 1)
            .implements(irepo_of_t.clone())
            .constructor(Constructor::new([], |args| Ok(Instance::new(args.type_args()[0].clone())))),
        irepo(),
        Lifetime::Transient
    ).unwrap();
    builder.register_decorator(
        irepo(),
        TypeDef::generic("Cached", 1)
            .implements(irepo_of_t.clone())
            .constructor(Constructor::new(
                [Param::new("inner", irepo_of_t)],
                |args| Ok(args.take(0).unwrap_or_else(|| Instance::new(())))
            ))
    ).unwrap();

    let container = builder.build();
    let scope = container.create_scope().unwrap();
    let users = irepo().make_generic([Type::named("User")]).unwrap();

    c.bench_function("singleton", |b| b.iter(|| {
        black_box(container.resolve_shared::<Clock>().unwrap())
    }));
    c.bench_function("scoped", |b| b.iter(|| {
        black_box(scope.resolve_shared::<Scheduler>().unwrap())
    }));
    c.bench_function("transient", |b| b.iter(|| {
        black_box(container.resolve_shared::<Vec<Dc<Clock>>>().unwrap())
    }));
    c.bench_function("generic decorated", |b| b.iter(|| {
        black_box(container.resolve_type(&users).unwrap())
    }));
    c.bench_function("scope lifecycle", |b| b.iter(|| {
        let scope = container.create_scope().unwrap();
        black_box(scope.resolve_shared::<Scheduler>().unwrap());
        scope.dispose();
    }));
}

criterion_group!(benches, benchmark);
criterion_main!(benches);

#![allow(missing_docs)]

use rivet::{ContainerBuilder, Dc};
use std::{
    sync::{Arc, Barrier, Mutex, mpsc, atomic::{AtomicUsize, Ordering}},
    thread,
    time::Duration
};

struct Expensive(usize);

#[test]
fn it_creates_singleton_once_across_threads() {
    let created = Arc::new(AtomicUsize::new(0));
    let counter = created.clone();

    let mut builder = ContainerBuilder::new();
    builder.register_singleton_factory(move || {
        thread::sleep(std::time::Duration::from_millis(5));
        Expensive(counter.fetch_add(1, Ordering::SeqCst))
    });

    let container = builder.build();
    let barrier = Arc::new(Barrier::new(8));

    let handles = (0..8)
        .map(|_| {
            let container = container.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                container.resolve_shared::<Expensive>().unwrap().0
            })
        })
        .collect::<Vec<_>>();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), 0);
    }
    assert_eq!(created.load(Ordering::SeqCst), 1);
}

#[test]
fn it_creates_scoped_value_once_per_scope_across_threads() {
    let created = Arc::new(AtomicUsize::new(0));
    let counter = created.clone();

    let mut builder = ContainerBuilder::new();
    builder.register_scoped_factory(move || Expensive(counter.fetch_add(1, Ordering::SeqCst)));

    let scope = builder.build().create_scope().unwrap();

    let handles = (0..4)
        .map(|_| {
            let scope = scope.clone();
            thread::spawn(move || scope.resolve_shared::<Expensive>().unwrap().0)
        })
        .collect::<Vec<_>>();

    let values = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .collect::<Vec<_>>();

    assert!(values.iter().all(|v| *v == values[0]));
    assert_eq!(created.load(Ordering::SeqCst), 1);
}

#[test]
fn it_resolves_from_many_threads_with_live_registrations() {
    #[derive(Clone)]
    struct Total(u32);

    let mut builder = ContainerBuilder::new();
    builder.register_instance(1_u32);
    builder.register_transient_factory(|value: Dc<u32>| Ok(Total(*value * 2)));

    let container = builder.build();

    let readers = (0..4)
        .map(|_| {
            let container = container.clone();
            thread::spawn(move || (0..100).all(|_| container.resolve::<Total>().is_ok()))
        })
        .collect::<Vec<_>>();

    container
        .register(rivet::ServiceKey::of::<u32>(), rivet::Target::value(2_u32))
        .unwrap();

    for reader in readers {
        assert!(reader.join().unwrap());
    }
    assert_eq!(container.resolve::<u32>().unwrap(), 2);
    assert_eq!(container.resolve::<Total>().unwrap().0, 4);
}

#[test]
fn it_does_not_block_unrelated_keys_on_slow_factory() {
    struct Slow {
        released: bool,
    }

    #[derive(Clone)]
    struct Fast(u8);

    let (started, on_start) = mpsc::channel::<()>();
    let (release, on_release) = mpsc::channel::<()>();
    let on_release = Mutex::new(on_release);

    let mut builder = ContainerBuilder::new();
    builder.register_singleton_factory(move || {
        let _ = started.send(());
        let released = on_release
            .lock()
            .unwrap()
            .recv_timeout(Duration::from_secs(5))
            .is_ok();
        Slow { released }
    });
    builder.register_singleton_factory(|| Fast(1));

    let container = builder.build();
    let slow = {
        let container = container.clone();
        thread::spawn(move || container.resolve_shared::<Slow>().unwrap().released)
    };

    on_start.recv().unwrap();
    assert_eq!(container.resolve::<Fast>().unwrap().0, 1);
    release.send(()).unwrap();

    assert!(slow.join().unwrap());
}

#[test]
fn it_disposes_scopes_created_during_parent_disposal() {
    let container = ContainerBuilder::new().build();

    for _ in 0..20 {
        let parent = container.create_scope().unwrap();
        let barrier = Arc::new(Barrier::new(5));

        let creators = (0..4)
            .map(|_| {
                let parent = parent.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    let mut children = Vec::new();
                    while let Ok(child) = parent.create_scope() {
                        children.push(child);
                    }
                    children
                })
            })
            .collect::<Vec<_>>();

        barrier.wait();
        parent.dispose();

        for creator in creators {
            for child in creator.join().unwrap() {
                assert!(child.scope().is_disposed());
            }
        }
    }
}

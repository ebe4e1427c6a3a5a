//! Concurrency Integration Tests
//!
//! Exercises a shared bridge table from many threads and the rooted hand-off
//! of bridged values between an owning context thread and workers.

use crossbeam::channel;
use host_types::{HostIdentity, HostValue};
use persistent_types::{CellClass, PersistentValue};
use std::sync::{Arc, Barrier};
use std::time::Duration;
use value_bridge::{
    BridgeConfig, BridgeRegistry, BridgeTable, ContextId, ExecutionContext, RootCoordinator,
    RootedHandoff,
};

const THREADS: u64 = 8;

/// Test: concurrent registrations of distinct identities lose nothing
#[test]
fn test_concurrent_register_mapping() {
    let table = Arc::new(BridgeTable::new(ContextId::from_raw(1)));

    crossbeam::scope(|s| {
        for t in 0..THREADS {
            let table = Arc::clone(&table);
            s.spawn(move |_| {
                let handle = PersistentValue::cell(
                    CellClass::Object,
                    [("thread", PersistentValue::Integer(t as i64))],
                    true,
                );
                table
                    .register_mapping(HostIdentity::from_raw(t + 1), handle)
                    .unwrap();
            });
        }
    })
    .unwrap();

    let stats = table.stats().unwrap();
    assert_eq!(stats.count, THREADS as usize);
    assert_eq!(stats.reverse_count, THREADS as usize);
    for t in 0..THREADS {
        let handle = table
            .lookup_by_host(HostIdentity::from_raw(t + 1))
            .unwrap()
            .unwrap();
        assert_eq!(
            handle.get_attribute("thread"),
            Some(PersistentValue::Integer(t as i64))
        );
        assert_eq!(
            table.lookup_by_persistent(&handle).unwrap(),
            Some(HostIdentity::from_raw(t + 1))
        );
    }
}

/// Test: concurrent read-modify-write on one entry loses no updates
#[test]
fn test_concurrent_modify_same_entry() {
    const INCREMENTS: i64 = 200;
    let table = Arc::new(BridgeTable::new(ContextId::from_raw(1)));
    let id = HostIdentity::from_raw(1);
    table
        .register_mapping(
            id,
            PersistentValue::cell(CellClass::Object, [("n", PersistentValue::Integer(0))], true),
        )
        .unwrap();

    crossbeam::scope(|s| {
        for _ in 0..THREADS {
            let table = Arc::clone(&table);
            s.spawn(move |_| {
                for _ in 0..INCREMENTS {
                    table
                        .modify_handle(id, |current| {
                            let n = current
                                .get_attribute("n")
                                .and_then(|n| n.as_integer())
                                .unwrap_or(0);
                            Ok(current
                                .set_attribute("n", PersistentValue::Integer(n + 1))
                                .unwrap())
                        })
                        .unwrap();
                }
            });
        }
    })
    .unwrap();

    let current = table.lookup_by_host(id).unwrap().unwrap();
    assert_eq!(
        current.get_attribute("n"),
        Some(PersistentValue::Integer(THREADS as i64 * INCREMENTS))
    );
    assert_eq!(table.stats().unwrap().reverse_count, 1);
}

/// Test: a rooted hand-off carries a handle to a worker and back
#[test]
fn test_rooted_hand_off_to_worker() {
    let cx = ExecutionContext::new(ContextId::from_raw(1), BridgeConfig::default());
    let object = cx.realm().new_object(vec![
        ("a".to_string(), HostValue::Number(20.0)),
        ("b".to_string(), HostValue::Number(22.0)),
    ]);
    cx.bridge_object(&object).unwrap();

    let token = cx.roots().hand_off(object.identity()).unwrap();
    assert_eq!(cx.stats().unwrap().root_count, 1);

    let (task_tx, task_rx) = channel::unbounded::<RootedHandoff>();
    let (result_tx, result_rx) = channel::unbounded::<PersistentValue>();

    crossbeam::scope(|s| {
        s.spawn(move |_| {
            for token in task_rx {
                let handle = token.handle().clone();
                let sum = ["a", "b"]
                    .iter()
                    .filter_map(|k| handle.get_attribute(k).and_then(|v| v.as_integer()))
                    .sum::<i64>();
                let result = PersistentValue::cell(
                    CellClass::Object,
                    [("sum", PersistentValue::Integer(sum))],
                    false,
                );
                // The worker retires the task, so it is the one to unroot.
                token.retire().unwrap();
                result_tx.send(result).unwrap();
            }
        });
        task_tx.send(token).unwrap();
        drop(task_tx);
    })
    .unwrap();

    let result = result_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(cx.stats().unwrap().root_count, 0);

    let host = cx.export(&result).unwrap();
    let host = host.as_object().unwrap();
    assert!(host.is_frozen());
    assert_eq!(cx.get_property(host, "sum").unwrap(), HostValue::Number(42.0));
    assert_eq!(
        cx.table().lookup_by_persistent(&result).unwrap(),
        Some(host.identity())
    );
}

/// Test: roots taken by a worker stay visible until retired
#[test]
fn test_unretired_hand_off_is_reported() {
    let table = Arc::new(BridgeTable::new(ContextId::from_raw(1)));
    let roots = RootCoordinator::new(Arc::clone(&table));
    let id = HostIdentity::from_raw(1);
    table
        .register_mapping(id, PersistentValue::list([PersistentValue::Unit]))
        .unwrap();

    crossbeam::scope(|s| {
        let roots = roots.clone();
        s.spawn(move |_| {
            let token = roots.hand_off(id).unwrap();
            drop(token);
        });
    })
    .unwrap();

    let report = roots.detect_leaks(Duration::ZERO).unwrap();
    assert_eq!(report.identities(), vec![id]);
}

/// Test: contexts opened on different threads are isolated in the registry
#[test]
fn test_registry_across_threads() {
    let registry = Arc::new(BridgeRegistry::new(BridgeConfig::default()));
    let barrier = Arc::new(Barrier::new(THREADS as usize + 1));
    let (tx, rx) = channel::unbounded();

    crossbeam::scope(|s| {
        for t in 0..THREADS {
            let registry = Arc::clone(&registry);
            let barrier = Arc::clone(&barrier);
            let tx = tx.clone();
            s.spawn(move |_| {
                let cx = registry.open();
                let object = cx
                    .realm()
                    .new_object(vec![("t".to_string(), HostValue::Number(t as f64))]);
                cx.bridge_object(&object).unwrap();
                tx.send((cx.id(), object.identity())).unwrap();
                barrier.wait();
                // Released only after the main thread has checked the registry.
                barrier.wait();
            });
        }
        drop(tx);

        barrier.wait();
        let published: Vec<(ContextId, HostIdentity)> = rx.try_iter().collect();
        assert_eq!(published.len(), THREADS as usize);
        assert_eq!(registry.contexts().len(), THREADS as usize);
        for (ctx, id) in &published {
            let handle = registry.lookup_by_host(*ctx, *id).unwrap().unwrap();
            assert_eq!(
                registry.lookup_by_persistent(*ctx, &handle).unwrap(),
                Some(*id)
            );
            for (other, _) in published.iter().filter(|(other, _)| other != ctx) {
                assert_eq!(
                    registry.lookup_by_persistent(*other, &handle).unwrap(),
                    None
                );
            }
        }
        barrier.wait();
    })
    .unwrap();

    assert!(registry.contexts().is_empty());
}

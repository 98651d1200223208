//! Member identity under concurrency and compaction

use std::io::Write;
use std::sync::{Arc, Barrier};
use std::thread;

use raya_interop::{InteropBridge, MemberIdentityCache, SyntheticKind, TypeRegistry};
use raya_interop_sdk::DefaultHooks;

#[test]
fn test_concurrent_lookups_share_one_handle() {
    let cache = MemberIdentityCache::new(SyntheticKind::Method);
    let barrier = Barrier::new(8);

    let handles: Vec<_> = thread::scope(|s| {
        let workers: Vec<_> = (0..8)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    cache.get_or_create("Run")
                })
            })
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });

    for handle in &handles[1..] {
        assert!(Arc::ptr_eq(&handles[0], handle));
    }
    assert_eq!(cache.len(), 1);
    assert_eq!(handles[0].kind(), SyntheticKind::Method);
    assert_eq!(handles[0].name(), "Run");
}

#[test]
fn test_new_handle_after_release_and_sweep() {
    let cache = MemberIdentityCache::new(SyntheticKind::Property);
    let first = cache.get_or_create("Value");
    let serial = first.serial();
    drop(first);

    assert_eq!(cache.compact_now(), 1);
    assert!(cache.is_empty());

    let second = cache.get_or_create("Value");
    assert_ne!(second.serial(), serial);
    assert!(Arc::ptr_eq(&second, &cache.get_or_create("Value")));
}

#[test]
fn test_bridge_uses_configured_compaction() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "[interop.identity_cache]\ncompaction_threshold = 1\ncompaction_interval_secs = 0"
    )
    .unwrap();
    let bridge = InteropBridge::load(Arc::new(TypeRegistry::new()), file.path(), Arc::new(DefaultHooks)).unwrap();

    let held = bridge.member_handle(SyntheticKind::Method, "Keep");
    drop(bridge.member_handle(SyntheticKind::Method, "Transient"));
    let _ = bridge.member_handle(SyntheticKind::Method, "Trigger");

    let methods = &bridge.member_handles().methods;
    assert!(methods.compaction_count() >= 1);
    assert!(Arc::ptr_eq(&held, &bridge.member_handle(SyntheticKind::Method, "Keep")));
    // fields and properties are separate tables
    assert!(bridge.member_handles().fields.is_empty());
}

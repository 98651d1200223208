//! Member identity cache
//!
//! Interns synthetic member handles by name so that repeated lookups of the
//! same name yield the same `Arc`, usable as a cheap identity key. The table
//! holds handles weakly: once every caller drops a handle it may be collected,
//! and the next lookup creates a fresh one.
//!
//! Expired entries are swept lazily. A sweep runs inside the lookup that
//! trips it, only when the table holds at least `threshold` entries **and**
//! `interval` has passed since the previous sweep.

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

/// Kind of synthetic handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyntheticKind {
    /// Field-style handle
    Field,
    /// Method-style handle
    Method,
    /// Property-style handle
    Property,
}

/// Identity-stable handle for a member name
#[derive(Debug, PartialEq, Eq)]
pub struct MemberHandle {
    kind: SyntheticKind,
    name: String,
    serial: u64,
}

impl MemberHandle {
    /// Handle kind
    pub fn kind(&self) -> SyntheticKind {
        self.kind
    }

    /// Member name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Creation serial, unique within one cache
    pub fn serial(&self) -> u64 {
        self.serial
    }
}

/// When expired entries are swept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionPolicy {
    /// Minimum table size before a sweep is considered
    pub threshold: usize,
    /// Minimum time between sweeps
    pub interval: Duration,
}

impl CompactionPolicy {
    /// Default entry threshold
    pub const DEFAULT_THRESHOLD: usize = 1_048_576;
    /// Default interval between sweeps
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(300);
}

impl Default for CompactionPolicy {
    fn default() -> Self {
        Self {
            threshold: Self::DEFAULT_THRESHOLD,
            interval: Self::DEFAULT_INTERVAL,
        }
    }
}

struct IdentityTable {
    entries: FxHashMap<String, Weak<MemberHandle>>,
    last_compaction: Instant,
    compactions: u64,
    next_serial: u64,
}

/// Weak name → handle table for one handle kind
pub struct MemberIdentityCache {
    kind: SyntheticKind,
    policy: CompactionPolicy,
    table: Mutex<IdentityTable>,
}

impl MemberIdentityCache {
    /// Create a cache with the default compaction policy
    pub fn new(kind: SyntheticKind) -> Self {
        Self::with_policy(kind, CompactionPolicy::default())
    }

    /// Create a cache with a custom compaction policy
    pub fn with_policy(kind: SyntheticKind, policy: CompactionPolicy) -> Self {
        Self {
            kind,
            policy,
            table: Mutex::new(IdentityTable {
                entries: FxHashMap::default(),
                last_compaction: Instant::now(),
                compactions: 0,
                next_serial: 0,
            }),
        }
    }

    /// Handle kind served by this cache
    pub fn kind(&self) -> SyntheticKind {
        self.kind
    }

    /// Live handle for `name`, creating it under the table lock on a miss
    pub fn get_or_create(&self, name: &str) -> Arc<MemberHandle> {
        let mut table = self.table.lock();
        if let Some(existing) = table.entries.get(name).and_then(Weak::upgrade) {
            tracing::trace!(name, "identity cache hit");
            return existing;
        }

        if table.entries.len() >= self.policy.threshold
            && table.last_compaction.elapsed() >= self.policy.interval
        {
            compact(&mut table);
        }

        let handle = Arc::new(MemberHandle {
            kind: self.kind,
            name: name.to_string(),
            serial: table.next_serial,
        });
        table.next_serial += 1;
        table.entries.insert(name.to_string(), Arc::downgrade(&handle));
        handle
    }

    /// Number of table entries, live or expired
    pub fn len(&self) -> usize {
        self.table.lock().entries.len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.table.lock().entries.is_empty()
    }

    /// Number of sweeps performed
    pub fn compaction_count(&self) -> u64 {
        self.table.lock().compactions
    }

    /// Sweep expired entries now, ignoring the policy
    pub fn compact_now(&self) -> usize {
        let mut table = self.table.lock();
        compact(&mut table)
    }
}

/// Drop expired entries; returns the number removed
fn compact(table: &mut IdentityTable) -> usize {
    let before = table.entries.len();
    table.entries.retain(|_, weak| weak.strong_count() > 0);
    table.last_compaction = Instant::now();
    table.compactions += 1;
    let after = table.entries.len();
    tracing::debug!(before, after, "compacted member identity table");
    before - after
}

/// Field, method and property identity caches
pub struct MemberHandles {
    /// Field handles
    pub fields: MemberIdentityCache,
    /// Method handles
    pub methods: MemberIdentityCache,
    /// Property handles
    pub properties: MemberIdentityCache,
}

impl MemberHandles {
    /// Create the three caches with one compaction policy
    pub fn new(policy: CompactionPolicy) -> Self {
        Self {
            fields: MemberIdentityCache::with_policy(SyntheticKind::Field, policy),
            methods: MemberIdentityCache::with_policy(SyntheticKind::Method, policy),
            properties: MemberIdentityCache::with_policy(SyntheticKind::Property, policy),
        }
    }

    /// Cache serving `kind`
    pub fn cache(&self, kind: SyntheticKind) -> &MemberIdentityCache {
        match kind {
            SyntheticKind::Field => &self.fields,
            SyntheticKind::Method => &self.methods,
            SyntheticKind::Property => &self.properties,
        }
    }

    /// Live handle for `name` of the given kind
    pub fn get_or_create(&self, kind: SyntheticKind, name: &str) -> Arc<MemberHandle> {
        self.cache(kind).get_or_create(name)
    }
}

impl Default for MemberHandles {
    fn default() -> Self {
        Self::new(CompactionPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_name_same_handle() {
        let cache = MemberIdentityCache::new(SyntheticKind::Method);
        let a = cache.get_or_create("Run");
        let b = cache.get_or_create("Run");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.kind(), SyntheticKind::Method);
        assert_eq!(a.name(), "Run");
        assert!(!Arc::ptr_eq(&a, &cache.get_or_create("Stop")));
    }

    #[test]
    fn test_dropped_handle_is_recreated() {
        let cache = MemberIdentityCache::new(SyntheticKind::Field);
        let first_serial = cache.get_or_create("x").serial();
        let second = cache.get_or_create("x");
        assert_ne!(second.serial(), first_serial);
        assert!(Arc::ptr_eq(&second, &cache.get_or_create("x")));
    }

    #[test]
    fn test_compaction_respects_threshold_and_interval() {
        let policy = CompactionPolicy {
            threshold: 2,
            interval: Duration::ZERO,
        };
        let cache = MemberIdentityCache::with_policy(SyntheticKind::Property, policy);
        let kept = cache.get_or_create("kept");
        drop(cache.get_or_create("gone"));
        assert_eq!(cache.len(), 2);

        let _third = cache.get_or_create("third");
        assert_eq!(cache.compaction_count(), 1);
        assert_eq!(cache.len(), 2);
        assert!(Arc::ptr_eq(&kept, &cache.get_or_create("kept")));
    }

    #[test]
    fn test_no_compaction_before_interval() {
        let policy = CompactionPolicy {
            threshold: 1,
            interval: Duration::from_secs(3600),
        };
        let cache = MemberIdentityCache::with_policy(SyntheticKind::Method, policy);
        drop(cache.get_or_create("a"));
        drop(cache.get_or_create("b"));
        assert_eq!(cache.compaction_count(), 0);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.compact_now(), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_handles_split_by_kind() {
        let handles = MemberHandles::default();
        let field = handles.get_or_create(SyntheticKind::Field, "Name");
        let prop = handles.get_or_create(SyntheticKind::Property, "Name");
        assert!(!Arc::ptr_eq(&field, &prop));
        assert_eq!(handles.fields.len(), 1);
        assert_eq!(handles.methods.len(), 0);
    }
}

//! Per-operation memo of check results.
//!
//! Every tree built for one operation shares a single `ExpressionResultCache`
//! handle, so a check evaluated in one tree is adopted, not re-run, by any
//! other tree that reaches the same (check, resource, change) triple.
//!
//! The cache is discarded with the operation; there is no eviction.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use uuid::Uuid;

use warden_contracts::{
    error::WardenResult,
    permission::CheckResult,
    resource::{ChangeSpec, PersistentResource},
};

/// Identity of a change descriptor for caching purposes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChangeKey {
    resource: Uuid,
    field: String,
    original: String,
    modified: String,
}

impl ChangeKey {
    fn of(change: &ChangeSpec) -> Self {
        Self {
            resource: change.resource.instance(),
            field: change.field.clone(),
            original: change.original.to_string(),
            modified: change.modified.to_string(),
        }
    }
}

/// `(check name, resource instance, change or absence)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    check: String,
    resource: Uuid,
    change: Option<ChangeKey>,
}

impl CacheKey {
    pub fn new(check: &str, resource: &PersistentResource, change: Option<&ChangeSpec>) -> Self {
        Self {
            check: check.to_string(),
            resource: resource.instance(),
            change: change.map(ChangeKey::of),
        }
    }

    pub fn check(&self) -> &str {
        &self.check
    }
}

enum Slot {
    /// A caller is running the check; others wait on `settled`.
    InFlight,
    Settled(CheckResult),
}

#[derive(Default)]
struct Shared {
    slots: Mutex<HashMap<CacheKey, Slot>>,
    settled: Condvar,
}

/// How [`ExpressionResultCache::get_or_evaluate`] obtained its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// Adopted from an earlier or concurrent evaluation.
    Hit(CheckResult),
    /// Computed by this caller.
    Miss(CheckResult),
}

impl Lookup {
    pub fn result(self) -> CheckResult {
        match self {
            Lookup::Hit(result) | Lookup::Miss(result) => result,
        }
    }
}

/// Shared, cloneable handle over the operation's result map.
///
/// Clones share the same map.  Each key has at most one evaluation in
/// flight: a caller that finds a key being computed on another thread waits
/// for that result instead of running the check again.  The map lock is
/// never held while a check runs.
#[derive(Clone, Default)]
pub struct ExpressionResultCache {
    shared: Arc<Shared>,
}

impl ExpressionResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<CacheKey, Slot>> {
        self.shared.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: &CacheKey) -> Option<CheckResult> {
        match self.slots().get(key) {
            Some(Slot::Settled(result)) => Some(*result),
            _ => None,
        }
    }

    /// Record a settled result.  `Unevaluated` is never stored.
    pub fn put(&self, key: CacheKey, result: CheckResult) {
        if !result.is_evaluated() {
            return;
        }
        self.slots().insert(key, Slot::Settled(result));
        self.shared.settled.notify_all();
    }

    /// Adopt the result stored under `key`, or run `evaluate` to produce it.
    ///
    /// While `evaluate` runs, other callers for the same key block until it
    /// finishes.  An error or an `Unevaluated` result is not stored; the
    /// slot is released and the next waiter evaluates in turn.
    pub fn get_or_evaluate<F>(&self, key: CacheKey, evaluate: F) -> WardenResult<Lookup>
    where
        F: FnOnce() -> WardenResult<CheckResult>,
    {
        let mut slots = self.slots();
        loop {
            let in_flight = match slots.get(&key) {
                Some(Slot::Settled(result)) => return Ok(Lookup::Hit(*result)),
                Some(Slot::InFlight) => true,
                None => false,
            };
            if !in_flight {
                break;
            }
            slots = self
                .shared
                .settled
                .wait(slots)
                .unwrap_or_else(PoisonError::into_inner);
        }
        slots.insert(key.clone(), Slot::InFlight);
        drop(slots);

        let mut claim = Claim {
            cache: self,
            key: Some(key),
        };
        let result = evaluate()?;
        claim.settle(result);
        Ok(Lookup::Miss(result))
    }

    /// Number of settled entries.
    pub fn len(&self) -> usize {
        self.slots()
            .values()
            .filter(|slot| matches!(slot, Slot::Settled(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.slots().retain(|_, slot| matches!(slot, Slot::InFlight));
    }
}

impl fmt::Debug for ExpressionResultCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpressionResultCache")
            .field("entries", &self.len())
            .finish()
    }
}

/// An in-flight slot.  Dropped unsettled (error or panic), it frees the key.
struct Claim<'a> {
    cache: &'a ExpressionResultCache,
    key: Option<CacheKey>,
}

impl Claim<'_> {
    fn settle(&mut self, result: CheckResult) {
        if let Some(key) = self.key.take() {
            let mut slots = self.cache.slots();
            if result.is_evaluated() {
                slots.insert(key, Slot::Settled(result));
            } else {
                slots.remove(&key);
            }
            drop(slots);
            self.cache.shared.settled.notify_all();
        }
    }
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.cache.slots().remove(&key);
            self.cache.shared.settled.notify_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Barrier, Mutex};
    use std::thread;
    use std::time::Duration;

    use warden_contracts::{
        error::WardenError,
        permission::CheckResult,
        resource::{ChangeSpec, PersistentResource},
    };

    use super::{CacheKey, ExpressionResultCache, Lookup};

    #[test]
    fn test_get_after_put() {
        let cache = ExpressionResultCache::new();
        let resource = PersistentResource::new("book", Some("1".to_string()));
        let key = CacheKey::new("is owner", &resource, None);

        assert_eq!(cache.get(&key), None);
        cache.put(key.clone(), CheckResult::Passed);
        assert_eq!(cache.get(&key), Some(CheckResult::Passed));
        assert_eq!(key.check(), "is owner");
    }

    #[test]
    fn test_unevaluated_is_not_stored() {
        let cache = ExpressionResultCache::new();
        let resource = PersistentResource::new("book", None);
        cache.put(CacheKey::new("deferred", &resource, None), CheckResult::Unevaluated);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_keys_distinguish_instances_and_changes() {
        let cache = ExpressionResultCache::new();
        let first = Arc::new(PersistentResource::new("book", None));
        let second = PersistentResource::new("book", None);
        let change = ChangeSpec::new(first.clone(), "title", "a", "b");

        cache.put(CacheKey::new("c", &first, None), CheckResult::Passed);

        assert_eq!(cache.get(&CacheKey::new("c", &second, None)), None);
        assert_eq!(cache.get(&CacheKey::new("c", &first, Some(&change))), None);
        assert_eq!(cache.get(&CacheKey::new("other", &first, None)), None);
    }

    #[test]
    fn test_clones_share_entries() {
        let cache = ExpressionResultCache::new();
        let handle = cache.clone();
        let resource = PersistentResource::new("book", None);

        handle.put(CacheKey::new("c", &resource, None), CheckResult::Failed);
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(handle.is_empty());
    }

    // ── Single evaluation per key ─────────────────────────────────────────────

    #[test]
    fn test_get_or_evaluate_adopts_settled_result() {
        let cache = ExpressionResultCache::new();
        let resource = PersistentResource::new("book", None);
        let key = CacheKey::new("c", &resource, None);

        let first = cache.get_or_evaluate(key.clone(), || Ok(CheckResult::Failed)).unwrap();
        let second = cache
            .get_or_evaluate(key, || panic!("settled key evaluated again"))
            .unwrap();

        assert_eq!(first, Lookup::Miss(CheckResult::Failed));
        assert_eq!(second, Lookup::Hit(CheckResult::Failed));
    }

    #[test]
    fn test_concurrent_callers_evaluate_once() {
        let cache = ExpressionResultCache::new();
        let resource = PersistentResource::new("book", None);
        let calls = Arc::new(Mutex::new(0u32));
        let barrier = Arc::new(Barrier::new(4));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = cache.clone();
                let key = CacheKey::new("slow", &resource, None);
                let calls = calls.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    cache
                        .get_or_evaluate(key, || {
                            *calls.lock().unwrap() += 1;
                            thread::sleep(Duration::from_millis(100));
                            Ok(CheckResult::Passed)
                        })
                        .unwrap()
                        .result()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), CheckResult::Passed);
        }
        assert_eq!(*calls.lock().unwrap(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_error_is_not_stored() {
        let cache = ExpressionResultCache::new();
        let resource = PersistentResource::new("book", None);
        let key = CacheKey::new("broken", &resource, None);

        let result = cache.get_or_evaluate(key.clone(), || {
            Err(WardenError::CheckExecution {
                check: "broken".to_string(),
                reason: "backend down".to_string(),
            })
        });
        match result {
            Err(WardenError::CheckExecution { reason, .. }) => assert_eq!(reason, "backend down"),
            other => panic!("expected CheckExecution, got {:?}", other),
        }
        assert!(cache.is_empty());

        let retry = cache.get_or_evaluate(key, || Ok(CheckResult::Passed)).unwrap();
        assert_eq!(retry, Lookup::Miss(CheckResult::Passed));
    }
}

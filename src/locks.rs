//! Striped entity locks.
//!
//! Every transaction names the entity keys it reads and writes. Keys hash to
//! a fixed set of stripes; a transaction holds all of its stripes, taken in
//! ascending order, for the whole validate-stage-commit window. With one
//! stripe this degenerates to a single global transaction lock.

use crate::ledger::EntityKey;
use parking_lot::{Mutex, MutexGuard};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LockKey {
    Entity(EntityKey),
    /// Guards global token-name uniqueness checks
    TokenNamespace,
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockKey::Entity(key) => write!(f, "{}", key),
            LockKey::TokenNamespace => f.write_str("token-namespace"),
        }
    }
}

impl From<EntityKey> for LockKey {
    fn from(key: EntityKey) -> Self {
        LockKey::Entity(key)
    }
}

pub struct LockManager {
    stripes: Vec<Mutex<()>>,
}

/// Held stripes; released on drop.
pub struct LockSet<'a> {
    stripes: Vec<usize>,
    _guards: Vec<MutexGuard<'a, ()>>,
}

impl LockSet<'_> {
    pub fn stripes(&self) -> &[usize] {
        &self.stripes
    }
}

impl LockManager {
    pub fn new(stripes: usize) -> Self {
        let stripes = stripes.max(1);
        Self {
            stripes: (0..stripes).map(|_| Mutex::new(())).collect(),
        }
    }

    pub fn global() -> Self {
        Self::new(1)
    }

    pub fn stripe_count(&self) -> usize {
        self.stripes.len()
    }

    pub fn stripe_of(&self, key: &LockKey) -> usize {
        if self.stripes.len() == 1 {
            return 0;
        }
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.stripes.len() as u64) as usize
    }

    /// Block until every stripe covering `keys` is held.
    pub fn acquire(&self, keys: &[LockKey]) -> LockSet<'_> {
        let mut stripes: Vec<usize> = keys.iter().map(|k| self.stripe_of(k)).collect();
        stripes.sort_unstable();
        stripes.dedup();

        // Ascending acquisition order rules out lock-order cycles
        let guards = stripes.iter().map(|&i| self.stripes[i].lock()).collect();
        debug!("acquired lock stripes {:?} for {} keys", stripes, keys.len());
        LockSet {
            stripes,
            _guards: guards,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Category;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn key(category: Category, id: &str) -> LockKey {
        LockKey::Entity(EntityKey::new(category, id))
    }

    #[test]
    fn test_global_lock_single_stripe() {
        let locks = LockManager::global();
        assert_eq!(locks.stripe_count(), 1);
        assert_eq!(LockManager::new(0).stripe_count(), 1);
        assert_eq!(locks.stripe_of(&key(Category::Merchant, "m1")), 0);
        assert_eq!(locks.stripe_of(&LockKey::TokenNamespace), 0);
        let held = locks.acquire(&[key(Category::Merchant, "m1"), key(Category::Participant, "p1")]);
        assert_eq!(held.stripes(), &[0]);
    }

    #[test]
    fn test_stripes_stable_and_deduplicated() {
        let locks = LockManager::new(16);
        let k = key(Category::ArtWork, "w1");
        assert_eq!(locks.stripe_of(&k), locks.stripe_of(&k.clone()));
        let held = locks.acquire(&[k.clone(), k]);
        assert_eq!(held.stripes().len(), 1);
    }

    #[test]
    fn test_overlapping_sets_in_opposite_order_do_not_deadlock() {
        let locks = Arc::new(LockManager::new(8));
        let counter = Arc::new(AtomicUsize::new(0));
        let a = key(Category::Participant, "person1");
        let b = key(Category::Merchant, "merchant1");

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let locks = Arc::clone(&locks);
                let counter = Arc::clone(&counter);
                let keys = if i % 2 == 0 {
                    vec![a.clone(), b.clone()]
                } else {
                    vec![b.clone(), a.clone()]
                };
                std::thread::spawn(move || {
                    for _ in 0..200 {
                        let _held = locks.acquire(&keys);
                        counter.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1600);
    }
}

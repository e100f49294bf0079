//! Page-granularity lock management for strict two-phase locking.
//!
//! Every lock-table mutation happens under one mutex. A request that
//! conflicts with current holders first runs deadlock detection over the
//! wait-for graph, and only then is reported as "wait". Blocked threads park
//! on a per-page condition variable that is signalled whenever a lock on that
//! page is released.

use crate::storage::page::PageId;
use crate::transaction::TransactionId;
use log::{debug, warn};
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;

/// Lock modes supported by the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    /// Shared lock for read operations.
    Shared,
    /// Exclusive lock for write operations.
    Exclusive,
}

impl LockMode {
    /// Checks if this lock mode is compatible with another.
    pub fn is_compatible_with(&self, other: &LockMode) -> bool {
        matches!((self, other), (LockMode::Shared, LockMode::Shared))
    }
}

/// A granted lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lock {
    pub mode: LockMode,
    pub txn: TransactionId,
    pub page_id: PageId,
}

/// Outcome of a single non-blocking grant attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockGrant {
    Granted,
    /// Conflicts with current holders; retry after a release.
    Wait,
    /// Waiting would close a cycle in the wait-for graph. The requesting
    /// transaction must abort.
    Deadlock,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    #[error("Deadlock detected: {txn} must abort (requested {mode:?} lock on page {page_id})")]
    Deadlock {
        txn: TransactionId,
        page_id: PageId,
        mode: LockMode,
    },
}

/// Holders of, and threads waiting for, one page.
#[derive(Debug)]
struct PageLocks {
    holders: Vec<Lock>,
    waiters: usize,
    cv: Arc<Condvar>,
}

impl PageLocks {
    fn new() -> Self {
        Self {
            holders: Vec::new(),
            waiters: 0,
            cv: Arc::new(Condvar::new()),
        }
    }

    fn is_unused(&self) -> bool {
        self.holders.is_empty() && self.waiters == 0
    }
}

#[derive(Debug, Default)]
struct LockTable {
    pages: HashMap<PageId, PageLocks>,
    /// Pending request of every blocked transaction.
    waits_for: HashMap<TransactionId, (PageId, LockMode)>,
}

impl LockTable {
    fn held_mode(&self, txn: TransactionId, page_id: PageId) -> Option<LockMode> {
        self.pages
            .get(&page_id)?
            .holders
            .iter()
            .find(|lock| lock.txn == txn)
            .map(|lock| lock.mode)
    }

    /// Other transactions whose locks on `page_id` block `txn` from `mode`.
    fn conflicting_holders(
        &self,
        txn: TransactionId,
        page_id: PageId,
        mode: LockMode,
    ) -> Vec<TransactionId> {
        self.pages
            .get(&page_id)
            .map(|entry| {
                entry
                    .holders
                    .iter()
                    .filter(|lock| lock.txn != txn && !lock.mode.is_compatible_with(&mode))
                    .map(|lock| lock.txn)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn try_grant(&mut self, txn: TransactionId, page_id: PageId, mode: LockMode) -> LockGrant {
        match (self.held_mode(txn, page_id), mode) {
            (Some(LockMode::Exclusive), _) | (Some(LockMode::Shared), LockMode::Shared) => {
                self.waits_for.remove(&txn);
                return LockGrant::Granted;
            }
            _ => {}
        }

        let blockers = self.conflicting_holders(txn, page_id, mode);
        if blockers.is_empty() {
            let entry = self.pages.entry(page_id).or_insert_with(PageLocks::new);
            match entry.holders.iter_mut().find(|lock| lock.txn == txn) {
                // Sole shared holder upgrading in place.
                Some(lock) => lock.mode = mode,
                None => entry.holders.push(Lock {
                    mode,
                    txn,
                    page_id,
                }),
            }
            self.waits_for.remove(&txn);
            return LockGrant::Granted;
        }

        if self.has_cycle(txn, blockers) {
            self.waits_for.remove(&txn);
            return LockGrant::Deadlock;
        }

        self.waits_for.insert(txn, (page_id, mode));
        LockGrant::Wait
    }

    /// Walks the wait-for graph from the holders blocking `txn`. Reaching
    /// `txn` again means granting-by-waiting would never finish.
    fn has_cycle(&self, txn: TransactionId, blockers: Vec<TransactionId>) -> bool {
        let mut visited = HashSet::new();
        let mut stack = blockers;

        while let Some(current) = stack.pop() {
            if current == txn {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            if let Some(&(page_id, mode)) = self.waits_for.get(&current) {
                stack.extend(self.conflicting_holders(current, page_id, mode));
            }
        }

        false
    }

    fn release(&mut self, txn: TransactionId, page_id: PageId) -> bool {
        let Some(entry) = self.pages.get_mut(&page_id) else {
            return false;
        };

        let before = entry.holders.len();
        entry.holders.retain(|lock| lock.txn != txn);
        let released = entry.holders.len() < before;

        if released {
            entry.cv.notify_all();
        }
        if entry.is_unused() {
            self.pages.remove(&page_id);
        }
        released
    }

    fn pages_held_by(&self, txn: TransactionId) -> Vec<PageId> {
        self.pages
            .iter()
            .filter(|(_, entry)| entry.holders.iter().any(|lock| lock.txn == txn))
            .map(|(&page_id, _)| page_id)
            .collect()
    }
}

/// Lock manager shared by every transaction.
#[derive(Debug, Default)]
pub struct LockManager {
    table: Mutex<LockTable>,
}

impl LockManager {
    /// Creates a new lock manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-blocking request for a shared lock.
    pub fn grant_shared(&self, txn: TransactionId, page_id: PageId) -> LockGrant {
        self.table.lock().try_grant(txn, page_id, LockMode::Shared)
    }

    /// Non-blocking request for an exclusive lock.
    pub fn grant_exclusive(&self, txn: TransactionId, page_id: PageId) -> LockGrant {
        self.table.lock().try_grant(txn, page_id, LockMode::Exclusive)
    }

    /// Acquires a lock, blocking until it is granted.
    ///
    /// Returns `LockError::Deadlock` immediately if waiting would deadlock.
    /// The caller must then abort the transaction.
    pub fn acquire(
        &self,
        txn: TransactionId,
        page_id: PageId,
        mode: LockMode,
    ) -> Result<(), LockError> {
        let mut table = self.table.lock();
        loop {
            match table.try_grant(txn, page_id, mode) {
                LockGrant::Granted => return Ok(()),
                LockGrant::Deadlock => {
                    warn!("{} deadlocked requesting {:?} on {}", txn, mode, page_id);
                    return Err(LockError::Deadlock { txn, page_id, mode });
                }
                LockGrant::Wait => {
                    let Some(entry) = table.pages.get_mut(&page_id) else {
                        continue;
                    };
                    entry.waiters += 1;
                    let cv = Arc::clone(&entry.cv);
                    debug!("{} waiting for {:?} on {}", txn, mode, page_id);

                    cv.wait(&mut table);

                    if let Some(entry) = table.pages.get_mut(&page_id) {
                        entry.waiters -= 1;
                        if entry.is_unused() {
                            table.pages.remove(&page_id);
                        }
                    }
                }
            }
        }
    }

    /// Releases `txn`'s lock on one page. Returns whether a lock was held.
    pub fn release(&self, txn: TransactionId, page_id: PageId) -> bool {
        self.table.lock().release(txn, page_id)
    }

    /// Releases every lock held by a transaction. Safe to call repeatedly.
    pub fn release_all(&self, txn: TransactionId) -> usize {
        let mut table = self.table.lock();
        table.waits_for.remove(&txn);

        let pages = table.pages_held_by(txn);
        for &page_id in &pages {
            table.release(txn, page_id);
        }
        pages.len()
    }

    /// Checks if a transaction holds any lock on a page.
    pub fn holds_lock(&self, txn: TransactionId, page_id: PageId) -> bool {
        self.lock_mode(txn, page_id).is_some()
    }

    pub fn lock_mode(&self, txn: TransactionId, page_id: PageId) -> Option<LockMode> {
        self.table.lock().held_mode(txn, page_id)
    }

    /// Gets all pages a transaction holds locks on.
    pub fn locked_pages(&self, txn: TransactionId) -> Vec<PageId> {
        let mut pages = self.table.lock().pages_held_by(txn);
        pages.sort();
        pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    fn t(id: u64) -> TransactionId {
        TransactionId::new(id)
    }

    fn p(n: u32) -> PageId {
        PageId::new(1, n)
    }

    #[test]
    fn test_lock_compatibility() {
        assert!(LockMode::Shared.is_compatible_with(&LockMode::Shared));
        assert!(!LockMode::Shared.is_compatible_with(&LockMode::Exclusive));
        assert!(!LockMode::Exclusive.is_compatible_with(&LockMode::Shared));
        assert!(!LockMode::Exclusive.is_compatible_with(&LockMode::Exclusive));
    }

    #[test]
    fn test_multiple_shared_locks() {
        let manager = LockManager::new();

        assert_eq!(manager.grant_shared(t(1), p(0)), LockGrant::Granted);
        assert_eq!(manager.grant_shared(t(2), p(0)), LockGrant::Granted);
        assert_eq!(manager.grant_shared(t(3), p(0)), LockGrant::Granted);

        assert!(manager.holds_lock(t(1), p(0)));
        assert!(manager.holds_lock(t(2), p(0)));
        assert!(manager.holds_lock(t(3), p(0)));
    }

    #[test]
    fn test_exclusive_excludes_everyone_else() {
        let manager = LockManager::new();

        assert_eq!(manager.grant_exclusive(t(1), p(0)), LockGrant::Granted);
        assert_eq!(manager.grant_shared(t(2), p(0)), LockGrant::Wait);
        assert_eq!(manager.grant_exclusive(t(3), p(0)), LockGrant::Wait);
        assert!(!manager.holds_lock(t(2), p(0)));

        assert_eq!(manager.grant_shared(t(4), p(1)), LockGrant::Granted);
        assert_eq!(manager.grant_exclusive(t(5), p(1)), LockGrant::Wait);
    }

    #[test]
    fn test_rerequest_is_noop() {
        let manager = LockManager::new();

        assert_eq!(manager.grant_exclusive(t(1), p(0)), LockGrant::Granted);
        assert_eq!(manager.grant_exclusive(t(1), p(0)), LockGrant::Granted);
        assert_eq!(manager.grant_shared(t(1), p(0)), LockGrant::Granted);
        assert_eq!(manager.lock_mode(t(1), p(0)), Some(LockMode::Exclusive));
        assert_eq!(manager.table.lock().pages[&p(0)].holders.len(), 1);
    }

    #[test]
    fn test_upgrade_sole_shared_holder() {
        let manager = LockManager::new();

        assert_eq!(manager.grant_shared(t(1), p(0)), LockGrant::Granted);
        assert_eq!(manager.grant_exclusive(t(1), p(0)), LockGrant::Granted);
        assert_eq!(manager.lock_mode(t(1), p(0)), Some(LockMode::Exclusive));
        assert_eq!(manager.table.lock().pages[&p(0)].holders.len(), 1);
    }

    #[test]
    fn test_upgrade_blocked_by_other_reader() {
        let manager = LockManager::new();

        manager.grant_shared(t(1), p(0));
        manager.grant_shared(t(2), p(0));
        assert_eq!(manager.grant_exclusive(t(1), p(0)), LockGrant::Wait);
        assert_eq!(manager.lock_mode(t(1), p(0)), Some(LockMode::Shared));

        // Both upgrading is a deadlock; only the second requester sees it.
        assert_eq!(manager.grant_exclusive(t(2), p(0)), LockGrant::Deadlock);

        manager.release_all(t(2));
        assert_eq!(manager.grant_exclusive(t(1), p(0)), LockGrant::Granted);
    }

    #[test]
    fn test_release_drops_empty_entry() {
        let manager = LockManager::new();

        manager.grant_shared(t(1), p(0));
        manager.grant_shared(t(2), p(0));

        assert!(manager.release(t(1), p(0)));
        assert!(manager.table.lock().pages.contains_key(&p(0)));
        assert!(!manager.release(t(1), p(0)));

        assert!(manager.release(t(2), p(0)));
        assert!(!manager.table.lock().pages.contains_key(&p(0)));
    }

    #[test]
    fn test_release_all_locks() {
        let manager = LockManager::new();

        manager.grant_shared(t(1), p(0));
        manager.grant_exclusive(t(1), p(1));
        manager.grant_shared(t(1), p(2));
        manager.grant_shared(t(2), p(2));

        assert_eq!(manager.locked_pages(t(1)), vec![p(0), p(1), p(2)]);
        assert_eq!(manager.release_all(t(1)), 3);
        assert!(manager.locked_pages(t(1)).is_empty());
        assert!(manager.holds_lock(t(2), p(2)));

        // Second release is a no-op.
        assert_eq!(manager.release_all(t(1)), 0);
    }

    #[test]
    fn test_two_transaction_deadlock() {
        let manager = LockManager::new();

        assert_eq!(manager.grant_exclusive(t(1), p(0)), LockGrant::Granted);
        assert_eq!(manager.grant_exclusive(t(2), p(1)), LockGrant::Granted);

        assert_eq!(manager.grant_exclusive(t(1), p(1)), LockGrant::Wait);
        assert_eq!(manager.grant_shared(t(2), p(0)), LockGrant::Deadlock);

        // The victim left the graph; the survivor is still just waiting.
        assert_eq!(manager.grant_exclusive(t(1), p(1)), LockGrant::Wait);
        manager.release_all(t(2));
        assert_eq!(manager.grant_exclusive(t(1), p(1)), LockGrant::Granted);
    }

    #[test]
    fn test_waiting_without_cycle_is_not_deadlock() {
        let manager = LockManager::new();

        manager.grant_exclusive(t(1), p(0));
        assert_eq!(manager.grant_exclusive(t(2), p(0)), LockGrant::Wait);
        assert_eq!(manager.grant_exclusive(t(3), p(0)), LockGrant::Wait);
        assert_eq!(manager.grant_shared(t(2), p(1)), LockGrant::Granted);
        assert_eq!(manager.grant_exclusive(t(3), p(1)), LockGrant::Wait);
    }

    #[test]
    fn test_blocked_acquire_wakes_on_release() {
        let manager = Arc::new(LockManager::new());
        manager.acquire(t(1), p(0), LockMode::Exclusive).unwrap();

        let waiter = {
            let manager = Arc::clone(&manager);
            thread::spawn(move || manager.acquire(t(2), p(0), LockMode::Shared))
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!manager.holds_lock(t(2), p(0)));

        manager.release_all(t(1));
        waiter.join().unwrap().unwrap();
        assert_eq!(manager.lock_mode(t(2), p(0)), Some(LockMode::Shared));
    }

    #[test]
    fn test_three_transaction_ring() {
        let manager = Arc::new(LockManager::new());
        for i in 1..=3 {
            manager.acquire(t(i), p(i as u32), LockMode::Exclusive).unwrap();
        }

        // T1 wants T2's page, T2 wants T3's, T3 wants T1's.
        let barrier = Arc::new(Barrier::new(3));
        let handles: Vec<_> = (1..=3u64)
            .map(|i| {
                let manager = Arc::clone(&manager);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let wanted = p((i % 3 + 1) as u32);
                    barrier.wait();
                    let result = manager.acquire(t(i), wanted, LockMode::Exclusive);
                    // Abort on deadlock, commit otherwise.
                    manager.release_all(t(i));
                    result.is_err()
                })
            })
            .collect();

        let deadlocked = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&aborted| aborted)
            .count();
        assert_eq!(deadlocked, 1);
        assert!(manager.table.lock().pages.is_empty());
    }
}

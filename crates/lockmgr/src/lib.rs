//! No-wait record lock manager.
//!
//! A single mutex guards both the per-record holder list and the
//! per-transaction reverse map, so every operation here is atomic with
//! respect to every other. There is no blocking and no deadlock detection:
//! a conflicting request fails immediately and the caller (the transaction
//! layer) decides whether to abort and retry.


use common::{DbError, DbResult};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// Shared (read) or exclusive (write) intent on a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

struct LockState {
    /// rid -> holders, each at most once per transaction.
    record_locks: HashMap<i64, Vec<(u64, LockMode)>>,
    /// transaction -> rids it holds a lock on.
    transaction_locks: HashMap<u64, HashSet<i64>>,
}

impl LockState {
    fn new() -> Self {
        Self {
            record_locks: HashMap::new(),
            transaction_locks: HashMap::new(),
        }
    }

    fn release_locked(&mut self, txn: u64, rid: i64) {
        if let Some(holders) = self.record_locks.get_mut(&rid) {
            holders.retain(|(t, _)| *t != txn);
            if holders.is_empty() {
                self.record_locks.remove(&rid);
            }
        }
        if let Some(rids) = self.transaction_locks.get_mut(&txn) {
            rids.remove(&rid);
            if rids.is_empty() {
                self.transaction_locks.remove(&txn);
            }
        }
    }
}

/// Per-record no-wait lock table shared by every transaction in a database.
pub struct LockManager {
    state: Mutex<LockState>,
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LockManager {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LockState::new()),
        }
    }

    /// Attempt to acquire `mode` on `rid` for `txn`.
    ///
    /// Grants immediately if uncontended, upgrades a sole shared hold to
    /// exclusive in place, and is idempotent if `txn` already holds `mode`
    /// or stronger. Otherwise, if any other transaction holds a lock and
    /// either lock is exclusive, fails with [`DbError::LockConflict`]
    /// rather than waiting.
    pub fn acquire(&self, txn: u64, rid: i64, mode: LockMode) -> DbResult<()> {
        let mut state = self.state.lock().expect("lock manager mutex poisoned");
        let holders = state.record_locks.entry(rid).or_default();

        if let Some(pos) = holders.iter().position(|(t, _)| *t == txn) {
            let existing_mode = holders[pos].1;
            if existing_mode == LockMode::Exclusive || existing_mode == mode {
                return Ok(());
            }
            if !holders.iter().all(|(t, _)| *t == txn) {
                return Err(DbError::LockConflict(format!(
                    "txn {txn} cannot upgrade to exclusive lock on rid {rid}: not the sole holder"
                )));
            }
            // Sole shared holder requesting exclusive: upgrade in place.
            holders[pos].1 = LockMode::Exclusive;
            return Ok(());
        }

        for (other_txn, other_mode) in holders.iter() {
            if *other_txn != txn && (*other_mode == LockMode::Exclusive || mode == LockMode::Exclusive) {
                return Err(DbError::LockConflict(format!(
                    "txn {txn} cannot acquire {mode:?} lock on rid {rid}: held by txn {other_txn}"
                )));
            }
        }

        holders.push((txn, mode));
        state.transaction_locks.entry(txn).or_default().insert(rid);
        Ok(())
    }

    /// Release whatever lock `txn` holds on `rid`, if any.
    pub fn release(&self, txn: u64, rid: i64) {
        let mut state = self.state.lock().expect("lock manager mutex poisoned");
        state.release_locked(txn, rid);
    }

    /// Release every lock `txn` currently holds.
    pub fn release_all(&self, txn: u64) {
        let mut state = self.state.lock().expect("lock manager mutex poisoned");
        let rids: Vec<i64> = state
            .transaction_locks
            .get(&txn)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        for rid in rids {
            state.release_locked(txn, rid);
        }
    }

    /// Whether `txn` holds a lock on `rid`, optionally requiring a specific
    /// mode (an exclusive hold also satisfies a shared query).
    pub fn has_lock(&self, txn: u64, rid: i64, mode: Option<LockMode>) -> bool {
        let state = self.state.lock().expect("lock manager mutex poisoned");
        let Some(holders) = state.record_locks.get(&rid) else {
            return false;
        };
        holders.iter().any(|(t, m)| {
            *t == txn
                && match mode {
                    None => true,
                    Some(LockMode::Shared) => true,
                    Some(LockMode::Exclusive) => *m == LockMode::Exclusive,
                }
        })
    }

    /// Drop every lock in the table. Intended for tests and recovery.
    pub fn clear_all(&self) {
        let mut state = self.state.lock().expect("lock manager mutex poisoned");
        state.record_locks.clear();
        state.transaction_locks.clear();
    }
}

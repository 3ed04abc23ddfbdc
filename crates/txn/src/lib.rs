//! Query batching, pessimistic concurrency control, and worker execution.
//!
//! A [`Transaction`] is an ordered batch of table operations that acquires
//! per-record locks as it goes and releases each one as soon as no later
//! operation in the batch still needs it. A [`TransactionWorker`] drives a
//! queue of transactions, retrying failures with backoff, while a single
//! coarse mutex serializes every worker's table access — mirroring the
//! class-level lock the original worker held across all of its instances.

#[cfg(test)]
mod tests;

use common::{DbError, DbResult};
use lockmgr::{LockManager, LockMode};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use table::{Record, Table};

/// Serializes every worker's transaction execution against every other's,
/// the Rust analogue of the original's class-level `threading.Lock()`.
/// Poisoning from a panicking transaction must not cascade into failing
/// every later transaction in the process, so it is recovered rather than
/// propagated.
static COARSE_TABLE_LOCK: Mutex<()> = Mutex::new(());

fn with_coarse_lock<R>(f: impl FnOnce() -> R) -> R {
    let guard = COARSE_TABLE_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let result = f();
    drop(guard);
    result
}

/// One queued table operation together with the lock it needs.
enum Op {
    Select { mask: Vec<bool> },
    SelectVersion { mask: Vec<bool>, relative_version: i64 },
    Sum { begin: i64, end: i64, column: usize },
    SumVersion { begin: i64, end: i64, column: usize, relative_version: i64 },
    Insert { columns: Vec<i64> },
    Update { updates: Vec<Option<i64>> },
    Delete,
    Increment { column: usize },
}

impl Op {
    fn lock_mode(&self) -> LockMode {
        match self {
            Op::Select { .. } | Op::SelectVersion { .. } | Op::Sum { .. } | Op::SumVersion { .. } => LockMode::Shared,
            Op::Insert { .. } | Op::Update { .. } | Op::Delete | Op::Increment { .. } => LockMode::Exclusive,
        }
    }
}

struct Query {
    table: Arc<Table>,
    key: i64,
    op: Op,
}

/// The outcome of a single queued operation, one variant per table
/// operation's natural return shape.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryResult {
    Bool(bool),
    Row(Option<Record>),
    Rows(Vec<Record>),
    Sum(i64),
}

impl QueryResult {
    /// Whether this result counts as failure under the propagation policy
    /// "a falsy return is treated as failure": `false`, an absent row, an
    /// empty row set, or a zero sum.
    fn is_falsy(&self) -> bool {
        match self {
            QueryResult::Bool(b) => !b,
            QueryResult::Row(r) => r.is_none(),
            QueryResult::Rows(rows) => rows.is_empty(),
            QueryResult::Sum(n) => *n == 0,
        }
    }
}

/// What executing a query did, so abort can best-effort undo it.
/// Delete has no corresponding undo: no table operation resurrects a
/// deleted record, so a transaction that deletes and then fails on a
/// later query leaves that delete in place — a limitation inherited from
/// the original, which performed no table-level rollback at all.
enum Undo {
    Insert { table: Arc<Table>, key: i64 },
    RevertToPriorVersion { table: Arc<Table>, rid: i64 },
}

fn undo_all(actions: Vec<Undo>) {
    for action in actions.into_iter().rev() {
        match action {
            Undo::Insert { table, key } => {
                let _ = table.delete(key);
            }
            Undo::RevertToPriorVersion { table, rid } => {
                let _ = table.rollback_record(rid);
            }
        }
    }
}

/// An ordered batch of table operations executed under strict-enough
/// two-phase locking: every lock is acquired before its operation runs,
/// and released the moment no later operation in the batch still touches
/// that key. Either every operation succeeds and the transaction commits,
/// or the first failure aborts it and undoes whatever already ran.
pub struct Transaction {
    id: u64,
    lock_manager: Arc<LockManager>,
    queries: Vec<Query>,
    started: bool,
    committed: bool,
    aborted: bool,
}

impl Transaction {
    /// A fresh transaction with its own private lock manager. Use
    /// [`Transaction::with_lock_manager`] (or let a
    /// [`TransactionWorker::add_transaction`] inject its shared one) when
    /// locks must be visible to other transactions.
    pub fn new(id: u64) -> Self {
        Self::with_lock_manager(id, Arc::new(LockManager::new()))
    }

    pub fn with_lock_manager(id: u64, lock_manager: Arc<LockManager>) -> Self {
        Self {
            id,
            lock_manager,
            queries: Vec::new(),
            started: false,
            committed: false,
            aborted: false,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn lock_manager(&self) -> &Arc<LockManager> {
        &self.lock_manager
    }

    /// Swap in a shared lock manager, as a [`TransactionWorker`] does for
    /// a transaction that was constructed without one.
    fn set_lock_manager(&mut self, lock_manager: Arc<LockManager>) {
        self.lock_manager = lock_manager;
    }

    pub fn is_running(&self) -> bool {
        self.started && !self.committed && !self.aborted
    }

    pub fn add_select(&mut self, table: Arc<Table>, key: i64, mask: Vec<bool>) {
        self.queries.push(Query { table, key, op: Op::Select { mask } });
    }

    pub fn add_select_version(&mut self, table: Arc<Table>, key: i64, mask: Vec<bool>, relative_version: i64) {
        self.queries.push(Query { table, key, op: Op::SelectVersion { mask, relative_version } });
    }

    pub fn add_sum(&mut self, table: Arc<Table>, begin: i64, end: i64, column: usize) {
        self.queries.push(Query { table, key: begin, op: Op::Sum { begin, end, column } });
    }

    pub fn add_sum_version(&mut self, table: Arc<Table>, begin: i64, end: i64, column: usize, relative_version: i64) {
        self.queries.push(Query { table, key: begin, op: Op::SumVersion { begin, end, column, relative_version } });
    }

    pub fn add_insert(&mut self, table: Arc<Table>, columns: Vec<i64>) {
        let key = columns[table.key_column()];
        self.queries.push(Query { table, key, op: Op::Insert { columns } });
    }

    pub fn add_update(&mut self, table: Arc<Table>, key: i64, updates: Vec<Option<i64>>) {
        self.queries.push(Query { table, key, op: Op::Update { updates } });
    }

    pub fn add_delete(&mut self, table: Arc<Table>, key: i64) {
        self.queries.push(Query { table, key, op: Op::Delete });
    }

    pub fn add_increment(&mut self, table: Arc<Table>, key: i64, column: usize) {
        self.queries.push(Query { table, key, op: Op::Increment { column } });
    }

    fn begin(&mut self) -> bool {
        if self.started {
            return false;
        }
        self.started = true;
        true
    }

    fn commit(&mut self) -> bool {
        if !self.started || self.committed || self.aborted {
            return false;
        }
        self.lock_manager.release_all(self.id);
        self.committed = true;
        true
    }

    fn abort(&mut self) -> bool {
        if !self.started || self.committed {
            return false;
        }
        self.lock_manager.release_all(self.id);
        self.aborted = true;
        true
    }

    fn run_one(query: &Query, undo: &mut Vec<Undo>) -> DbResult<QueryResult> {
        match &query.op {
            Op::Select { mask } => Ok(QueryResult::Rows(query.table.select(query.key, mask)?)),
            Op::SelectVersion { mask, relative_version } => {
                Ok(QueryResult::Row(query.table.select_version(query.key, mask, *relative_version)?))
            }
            Op::Sum { begin, end, column } => Ok(QueryResult::Sum(query.table.sum(*begin, *end, *column)?)),
            Op::SumVersion { begin, end, column, relative_version } => {
                Ok(QueryResult::Sum(query.table.sum_version(*begin, *end, *column, *relative_version)?))
            }
            Op::Insert { columns } => {
                let record = query.table.create_record(columns)?;
                undo.push(Undo::Insert { table: query.table.clone(), key: record.key });
                Ok(QueryResult::Bool(true))
            }
            Op::Update { updates } => {
                let rid = query.table.locate_primary(query.key);
                let ok = query.table.update(query.key, updates)?;
                if ok {
                    if let Some(rid) = rid {
                        undo.push(Undo::RevertToPriorVersion { table: query.table.clone(), rid });
                    }
                }
                Ok(QueryResult::Bool(ok))
            }
            Op::Delete => Ok(QueryResult::Bool(query.table.delete(query.key)?)),
            Op::Increment { column } => {
                let rid = query.table.locate_primary(query.key);
                let ok = query.table.increment(query.key, *column)?;
                if ok {
                    if let Some(rid) = rid {
                        undo.push(Undo::RevertToPriorVersion { table: query.table.clone(), rid });
                    }
                }
                Ok(QueryResult::Bool(ok))
            }
        }
    }

    /// Run every queued operation in order, acquiring its lock first and
    /// releasing it the moment no later operation needs the same key. The
    /// first lock conflict, storage error, or falsy result aborts the
    /// whole transaction, undoes whatever already ran, and returns the
    /// triggering error; otherwise commits and returns one
    /// [`QueryResult`] per query.
    pub fn execute(&mut self) -> DbResult<Vec<QueryResult>> {
        if !self.begin() {
            return Err(DbError::TransactionAborted(format!("transaction {} already started", self.id)));
        }

        let queries = std::mem::take(&mut self.queries);
        let mut undo = Vec::new();
        let mut results = Vec::with_capacity(queries.len());

        let outcome = (|| -> DbResult<()> {
            for (i, query) in queries.iter().enumerate() {
                self.lock_manager
                    .acquire(self.id, query.key, query.op.lock_mode())
                    .map_err(|e| DbError::TransactionAborted(e.to_string()))?;

                let result = Self::run_one(query, &mut undo)?;
                if result.is_falsy() {
                    self.lock_manager.release(self.id, query.key);
                    return Err(DbError::TransactionAborted(format!(
                        "query {i} on table {} returned a falsy result",
                        query.table.name()
                    )));
                }
                results.push(result);

                let still_needed = queries[i + 1..].iter().any(|later| later.key == query.key);
                if !still_needed {
                    self.lock_manager.release(self.id, query.key);
                }
            }
            Ok(())
        })();

        match outcome {
            Ok(()) => {
                self.commit();
                Ok(results)
            }
            Err(e) => {
                undo_all(undo);
                self.abort();
                Err(e)
            }
        }
    }
}

/// A concurrent executor holding a queue of transactions and a shared
/// lock manager. `run` drains the queue, retrying a failing transaction
/// up to three times with exponential backoff before giving up on it.
pub struct TransactionWorker {
    id: String,
    lock_manager: Arc<LockManager>,
    transactions: Vec<Transaction>,
    success: u64,
    failed: u64,
}

const MAX_RETRIES: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_millis(100);

impl TransactionWorker {
    pub fn new(lock_manager: Arc<LockManager>) -> Self {
        let full_id = uuid::Uuid::new_v4().to_string();
        Self {
            id: full_id[..8].to_string(),
            lock_manager,
            transactions: Vec::new(),
            success: 0,
            failed: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Queue `transaction`, injecting this worker's shared lock manager
    /// if it doesn't already have one of its own.
    pub fn add_transaction(&mut self, mut transaction: Transaction) {
        if !Arc::ptr_eq(&transaction.lock_manager, &self.lock_manager) {
            transaction.set_lock_manager(self.lock_manager.clone());
        }
        self.transactions.push(transaction);
    }

    pub fn success_count(&self) -> u64 {
        self.success
    }

    pub fn failed_count(&self) -> u64 {
        self.failed
    }

    /// Execute every queued transaction under the process-wide coarse
    /// mutex, retrying failures with backoff before counting them as
    /// failed.
    pub fn run(&mut self) {
        for transaction in &mut self.transactions {
            let mut attempt = 0;
            let outcome = loop {
                attempt += 1;
                transaction.started = false;
                transaction.committed = false;
                transaction.aborted = false;

                let result = with_coarse_lock(|| transaction.execute());
                match result {
                    Ok(_) => break true,
                    Err(e) if attempt < MAX_RETRIES => {
                        log::debug!(
                            "worker {} transaction {} attempt {attempt} failed: {e}",
                            self.id,
                            transaction.id()
                        );
                        thread::sleep(RETRY_DELAY * attempt);
                    }
                    Err(e) => {
                        log::warn!(
                            "worker {} transaction {} failed after {attempt} attempts: {e}",
                            self.id,
                            transaction.id()
                        );
                        break false;
                    }
                }
            };
            if outcome {
                self.success += 1;
            } else {
                self.failed += 1;
            }
        }
    }

    /// Run this worker on its own OS thread and wait for it to finish,
    /// returning the worker so its stats can be inspected.
    pub fn run_on_thread(mut self) -> thread::JoinHandle<Self> {
        thread::spawn(move || {
            self.run();
            self
        })
    }
}

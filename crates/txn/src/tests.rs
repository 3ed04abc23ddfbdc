use super::*;
use buffer::Bufferpool;
use tempfile::tempdir;

fn new_table(dir: &std::path::Path, num_columns: usize, key_column: usize, lock_manager: Arc<LockManager>) -> Arc<Table> {
    let bufferpool = Arc::new(Mutex::new(Bufferpool::new(dir, 1000)));
    Arc::new(Table::new("Grades", num_columns, key_column, bufferpool, lock_manager, 10, Duration::from_secs(60)))
}

#[test]
fn single_insert_commits_and_releases_locks() {
    let dir = tempdir().unwrap();
    let lm = Arc::new(LockManager::new());
    let table = new_table(dir.path(), 3, 0, lm.clone());

    let mut txn = Transaction::with_lock_manager(1, lm.clone());
    txn.add_insert(table.clone(), vec![1, 10, 20]);
    let results = txn.execute().unwrap();

    assert_eq!(results, vec![QueryResult::Bool(true)]);
    assert!(!txn.is_running());
    assert!(!lm.has_lock(1, 1, None));
    assert_eq!(table.select(1, &[true, true, true]).unwrap()[0].columns, vec![1, 10, 20]);
}

#[test]
fn select_and_update_share_then_release_a_single_lock() {
    let dir = tempdir().unwrap();
    let lm = Arc::new(LockManager::new());
    let table = new_table(dir.path(), 2, 0, lm.clone());
    table.insert(&[1, 41]).unwrap();

    let mut txn = Transaction::with_lock_manager(2, lm.clone());
    txn.add_select(table.clone(), 1, vec![true, true]);
    txn.add_update(table.clone(), 1, vec![None, Some(42)]);
    let results = txn.execute().unwrap();

    assert_eq!(results[1], QueryResult::Bool(true));
    assert_eq!(table.select(1, &[true, true]).unwrap()[0].columns, vec![1, 42]);
}

#[test]
fn second_update_failing_aborts_and_undoes_the_first() {
    let dir = tempdir().unwrap();
    let lm = Arc::new(LockManager::new());
    let table = new_table(dir.path(), 2, 0, lm.clone());
    table.insert(&[1, 100]).unwrap();

    let mut txn = Transaction::with_lock_manager(3, lm.clone());
    txn.add_update(table.clone(), 1, vec![None, Some(200)]);
    // Key 999 doesn't exist: `update` returns `false`, a falsy result.
    txn.add_update(table.clone(), 999, vec![None, Some(1)]);

    let err = txn.execute().unwrap_err();
    assert!(matches!(err, DbError::TransactionAborted(_)));
    assert!(!txn.is_running());
    // The first update's effect was undone.
    assert_eq!(table.select(1, &[true, true]).unwrap()[0].columns, vec![1, 100]);
}

#[test]
fn failed_insert_is_undone() {
    let dir = tempdir().unwrap();
    let lm = Arc::new(LockManager::new());
    let table = new_table(dir.path(), 2, 0, lm.clone());

    let mut txn = Transaction::with_lock_manager(4, lm.clone());
    txn.add_insert(table.clone(), vec![1, 10]);
    // Wrong column count: `create_record` returns an error, not a falsy bool.
    txn.add_update(table.clone(), 2, vec![None]);

    assert!(txn.execute().is_err());
    assert!(table.select(1, &[true, true]).unwrap().is_empty());
}

#[test]
fn executing_twice_fails_the_second_time() {
    let dir = tempdir().unwrap();
    let lm = Arc::new(LockManager::new());
    let table = new_table(dir.path(), 2, 0, lm.clone());

    let mut txn = Transaction::with_lock_manager(5, lm.clone());
    txn.add_insert(table.clone(), vec![1, 10]);
    txn.execute().unwrap();

    assert!(txn.execute().is_err());
}

#[test]
fn worker_injects_its_lock_manager_and_tracks_stats() {
    let dir = tempdir().unwrap();
    let lm = Arc::new(LockManager::new());
    let table = new_table(dir.path(), 2, 0, lm.clone());

    let mut worker = TransactionWorker::new(lm.clone());
    for key in 1..=5 {
        let mut txn = Transaction::new(key as u64);
        txn.add_insert(table.clone(), vec![key, key * 10]);
        worker.add_transaction(txn);
    }
    worker.run();

    assert_eq!(worker.success_count(), 5);
    assert_eq!(worker.failed_count(), 0);
    for key in 1..=5 {
        assert_eq!(table.select(key, &[true, true]).unwrap()[0].columns, vec![key, key * 10]);
    }
}

#[test]
fn worker_counts_unrecoverable_failures() {
    let dir = tempdir().unwrap();
    let lm = Arc::new(LockManager::new());
    let table = new_table(dir.path(), 2, 0, lm.clone());

    let mut worker = TransactionWorker::new(lm.clone());
    let mut txn = Transaction::new(1);
    // Unknown key: every retry fails identically, so this exhausts all
    // three attempts and counts as a failure.
    txn.add_update(table.clone(), 404, vec![None, Some(1)]);
    worker.add_transaction(txn);
    worker.run();

    assert_eq!(worker.success_count(), 0);
    assert_eq!(worker.failed_count(), 1);
}

#[test]
fn concurrent_workers_apply_exactly_one_update_per_key() {
    let dir = tempdir().unwrap();
    let lm = Arc::new(LockManager::new());
    let table = new_table(dir.path(), 2, 0, lm.clone());
    for key in 1..=20 {
        table.insert(&[key, 0]).unwrap();
    }

    let mut handles = Vec::new();
    for w in 0i64..4 {
        let mut worker = TransactionWorker::new(lm.clone());
        for i in 0i64..5 {
            let key = w * 5 + i + 1;
            let mut txn = Transaction::new((w * 100 + i) as u64);
            txn.add_select(table.clone(), key, vec![true, true]);
            txn.add_update(table.clone(), key, vec![None, Some(key * 10)]);
            worker.add_transaction(txn);
        }
        handles.push(worker.run_on_thread());
    }

    let mut total_success: u64 = 0;
    for handle in handles {
        let worker = handle.join().unwrap();
        total_success += worker.success_count();
    }
    assert_eq!(total_success, 20);

    let sum = table.sum(1, 20, 1).unwrap();
    let expected: i64 = (1i64..=20).map(|k| k * 10).sum();
    assert_eq!(sum, expected);
}

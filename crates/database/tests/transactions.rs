//! Scenario 4 (spec.md §8), exercised against a [`Database`]-registered
//! table rather than a bare `Table`: a transaction with two updates where
//! the second is forced to fail leaves no committed side effects.

use testsupport::ScratchDatabase;
use txn::{QueryResult, Transaction};

#[test]
fn failing_second_update_leaves_table_untouched() {
    let scratch = ScratchDatabase::new();
    let table = scratch.db.create_table("Grades", 2, 0);
    table.insert(&[1, 100]).unwrap();

    let mut txn = Transaction::with_lock_manager(1, scratch.db.lock_manager().clone());
    txn.add_update(table.clone(), 1, vec![None, Some(200)]);
    txn.add_update(table.clone(), 999, vec![None, Some(300)]);

    assert!(txn.execute().is_err());
    assert_eq!(table.select(1, &[true, true]).unwrap()[0].columns, vec![1, 100]);
}

#[test]
fn committed_transaction_survives_close_and_reopen() {
    let scratch = ScratchDatabase::new();
    let path = scratch.path().to_path_buf();
    {
        let table = scratch.db.create_table("Grades", 2, 0);
        table.insert(&[1, 100]).unwrap();

        let mut txn = Transaction::with_lock_manager(1, scratch.db.lock_manager().clone());
        txn.add_select(table.clone(), 1, vec![true, true]);
        txn.add_update(table.clone(), 1, vec![None, Some(200)]);
        let results = txn.execute().unwrap();
        assert_eq!(results[1], QueryResult::Bool(true));

        scratch.db.close().unwrap();
    }

    let db = database::Database::open(&path);
    let table = db.get_table("Grades").expect("table reconstructed on reopen");
    assert_eq!(table.select(1, &[true, true]).unwrap()[0].columns, vec![1, 200]);
}

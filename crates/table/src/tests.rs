use super::*;
use lockmgr::LockManager;
use tempfile::tempdir;

fn new_table(dir: &std::path::Path, num_columns: usize, key_column: usize) -> Table {
    let bufferpool = Arc::new(Mutex::new(Bufferpool::new(dir, 1000)));
    let lock_manager = Arc::new(LockManager::new());
    Table::new(
        "Grades",
        num_columns,
        key_column,
        bufferpool,
        lock_manager,
        10,
        Duration::from_secs(60),
    )
}

#[test]
fn single_row_insert_update_select() {
    let dir = tempdir().unwrap();
    let table = new_table(dir.path(), 5, 0);

    assert!(table.insert(&[92106429, 1, 2, 3, 4]).unwrap());

    let mask = vec![true; 5];
    let rows = table.select(92106429, &mask).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].columns, vec![92106429, 1, 2, 3, 4]);

    let updates = vec![None, None, Some(9), None, Some(10)];
    assert!(table.update(92106429, &updates).unwrap());

    let current = table.select_version(92106429, &mask, 0).unwrap().unwrap();
    assert_eq!(current.columns, vec![92106429, 1, 9, 3, 10]);

    let prev = table.select_version(92106429, &mask, -1).unwrap().unwrap();
    assert_eq!(prev.columns, vec![92106429, 1, 2, 3, 4]);

    // Chain length is 1, so -2 floors to the same oldest state as -1.
    let floored = table.select_version(92106429, &mask, -2).unwrap().unwrap();
    assert_eq!(floored.columns, vec![92106429, 1, 2, 3, 4]);
}

#[test]
fn range_sum() {
    let dir = tempdir().unwrap();
    let table = new_table(dir.path(), 2, 0);
    for key in 1..=10 {
        table.insert(&[key, key]).unwrap();
    }
    assert_eq!(table.sum(3, 7, 1).unwrap(), 25);
    assert_eq!(table.sum(3, 7, 0).unwrap(), 25);
}

#[test]
fn delete_removes_from_primary_index_and_read() {
    let dir = tempdir().unwrap();
    let table = new_table(dir.path(), 3, 0);
    table.insert(&[1, 10, 20]).unwrap();
    assert!(table.delete(1).unwrap());
    assert!(!table.delete(1).unwrap());
    let mask = vec![true; 3];
    assert!(table.select(1, &mask).unwrap().is_empty());
}

#[test]
fn increment_bumps_column_by_one() {
    let dir = tempdir().unwrap();
    let table = new_table(dir.path(), 2, 0);
    table.insert(&[1, 41]).unwrap();
    assert!(table.increment(1, 1).unwrap());
    let mask = vec![true; 2];
    let row = table.select(1, &mask).unwrap().into_iter().next().unwrap();
    assert_eq!(row.columns, vec![1, 42]);
}

#[test]
fn version_chain_grows_with_each_update() {
    let dir = tempdir().unwrap();
    let table = new_table(dir.path(), 2, 0);
    table.insert(&[1, 100]).unwrap();
    table.update(1, &[None, Some(200)]).unwrap();
    table.update(1, &[None, Some(300)]).unwrap();

    let mask = vec![true; 2];
    assert_eq!(table.select_version(1, &mask, 0).unwrap().unwrap().columns, vec![1, 300]);
    assert_eq!(table.select_version(1, &mask, -1).unwrap().unwrap().columns, vec![1, 200]);
    assert_eq!(table.select_version(1, &mask, -2).unwrap().unwrap().columns, vec![1, 100]);
    // Older than the chain floors to the oldest state.
    assert_eq!(table.select_version(1, &mask, -5).unwrap().unwrap().columns, vec![1, 100]);
}

#[test]
fn merge_folds_tail_chain_without_changing_current_values() {
    let dir = tempdir().unwrap();
    let table = new_table(dir.path(), 2, 0);
    table.insert(&[1, 1]).unwrap();
    for v in 2..=20 {
        table.update(1, &[None, Some(v)]).unwrap();
    }
    table.merge().unwrap();

    let mask = vec![true; 2];
    let row = table.select(1, &mask).unwrap().into_iter().next().unwrap();
    assert_eq!(row.columns, vec![1, 20]);
}

#[test]
fn rollback_steps_base_back_one_version() {
    let dir = tempdir().unwrap();
    let table = new_table(dir.path(), 2, 0);
    table.insert(&[1, 100]).unwrap();
    table.update(1, &[None, Some(200)]).unwrap();
    let rid = table.locate_primary(1).unwrap();

    assert!(table.rollback_record(rid).unwrap());
    let mask = vec![true; 2];
    assert_eq!(table.select(1, &mask).unwrap()[0].columns, vec![1, 100]);
}

#[test]
fn metadata_round_trip_preserves_data_and_counters() {
    let dir = tempdir().unwrap();
    {
        let table = new_table(dir.path(), 3, 0);
        for key in 1..=50 {
            table.insert(&[key, key * 2, key * 3]).unwrap();
        }
        table.update(1, &[None, Some(999), None]).unwrap();

        let meta = table.to_metadata();
        let bufferpool = table.bufferpool.clone();
        let lock_manager = table.lock_manager.clone();
        table.bufferpool.lock().unwrap().close().unwrap();

        let reloaded = Table::from_metadata("Grades", meta, bufferpool, lock_manager, 10, Duration::from_secs(60));
        let mask = vec![true; 3];
        let rows = reloaded.select(1, &mask).unwrap();
        assert_eq!(rows[0].columns, vec![1, 999, 3]);
        let rows50 = reloaded.select(50, &mask).unwrap();
        assert_eq!(rows50[0].columns, vec![50, 100, 150]);
    }
}

use super::*;

#[test]
fn key_column_indexed_on_construction() {
    let idx = Index::new(4, 0);
    assert!(idx.is_indexed(0));
    assert!(!idx.is_indexed(1));
}

#[test]
fn locate_and_locate_range() {
    let mut idx = Index::new(3, 0);
    idx.update_index(0, 10, 1);
    idx.update_index(0, 20, 2);
    idx.update_index(0, 30, 3);
    assert_eq!(idx.locate(0, 20), Some(2));
    assert_eq!(idx.locate(0, 99), None);
    assert_eq!(idx.locate_range(0, 10, 20), vec![1, 2]);
}

#[test]
fn locate_range_on_unindexed_column_is_empty() {
    let idx = Index::new(3, 0);
    assert_eq!(idx.locate_range(1, 0, 100), Vec::<i64>::new());
}

#[test]
fn drop_index_fails_for_key_column() {
    let mut idx = Index::new(3, 0);
    assert!(!idx.drop_index(0));
    assert!(idx.is_indexed(0));
}

#[test]
fn create_then_drop_secondary_index() {
    let mut idx = Index::new(3, 0);
    assert!(idx.create_index(1, vec![(5, 1), (6, 2)]));
    assert_eq!(idx.locate(1, 5), Some(1));
    assert!(idx.drop_index(1));
    assert!(!idx.is_indexed(1));
    assert!(!idx.drop_index(1));
}

#[test]
fn update_index_moves_existing_rid_to_new_value() {
    let mut idx = Index::new(3, 0);
    idx.update_index(0, 10, 1);
    idx.update_index(0, 15, 1);
    assert_eq!(idx.locate(0, 10), None);
    assert_eq!(idx.locate(0, 15), Some(1));
}

#[test]
fn rebuild_all_resets_and_keeps_previously_active_columns() {
    let mut idx = Index::new(3, 0);
    idx.create_index(2, vec![(1, 100)]);
    idx.update_index(0, 7, 100);

    idx.rebuild_all(|column| match column {
        0 => vec![(7, 100), (8, 200)],
        2 => vec![(1, 100), (2, 200)],
        _ => unreachable!("column {column} was never active"),
    });

    assert_eq!(idx.locate(0, 8), Some(200));
    assert_eq!(idx.locate(2, 2), Some(200));
    assert!(!idx.is_indexed(1));
}

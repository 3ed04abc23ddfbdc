use super::*;

#[test]
fn append_and_read_roundtrip() {
    let mut page = Page::new();
    assert!(page.write(42, None));
    assert!(page.write(-7, None));
    assert_eq!(page.num_slots(), 2);
    assert_eq!(page.read(0), Some(42));
    assert_eq!(page.read(1), Some(-7));
}

#[test]
fn overwrite_existing_slot() {
    let mut page = Page::new();
    page.write(1, None);
    assert!(page.write(99, Some(0)));
    assert_eq!(page.read(0), Some(99));
}

#[test]
fn overwrite_beyond_count_fails_without_mutation() {
    let mut page = Page::new();
    page.write(1, None);
    assert!(!page.write(2, Some(5)));
    assert_eq!(page.num_slots(), 1);
    assert_eq!(page.read(5), None);
}

#[test]
fn read_out_of_range_is_none() {
    let page = Page::new();
    assert_eq!(page.read(0), None);
}

#[test]
fn capacity_is_enforced() {
    let mut page = Page::new();
    for i in 0..SLOT_CAPACITY as i64 {
        assert!(page.write(i, None));
    }
    assert!(!page.has_capacity());
    assert!(!page.write(12345, None));
    assert_eq!(page.num_slots() as usize, SLOT_CAPACITY);
}

#[test]
fn raw_roundtrip_preserves_values() {
    let mut page = Page::new();
    page.write(i64::MIN, None);
    page.write(i64::MAX, None);
    let raw = *page.raw();
    let restored = Page::from_raw(raw, page.num_slots());
    assert_eq!(restored.read(0), Some(i64::MIN));
    assert_eq!(restored.read(1), Some(i64::MAX));
}

#[test]
fn page_key_display_matches_spec_format() {
    let key = PageKey::new("Grades", PageKind::Base, 4, 2);
    assert_eq!(key.to_string(), "Grades_base_4_2");
}

use super::*;
use std::io;

#[test]
fn config_defaults_are_sane() {
    let cfg = Config::default();
    assert_eq!(cfg.buffer_pool_pages, 1000);
    assert_eq!(cfg.merge_threshold, 10);
    assert_eq!(cfg.merge_interval, Duration::from_secs(60));
}

#[test]
fn builder_overrides_defaults() {
    let cfg = Config::builder()
        .buffer_pool_pages(4)
        .merge_threshold(2)
        .build();
    assert_eq!(cfg.buffer_pool_pages, 4);
    assert_eq!(cfg.merge_threshold, 2);
    assert_eq!(cfg.merge_interval, Duration::from_secs(60));
}

#[test]
fn db_error_formats_cleanly() {
    let err = DbError::Storage("corruption".into());
    assert!(format!("{err}").contains("storage"));
}

#[test]
fn io_error_converts() {
    let e = io::Error::other("oops");
    let db_err: DbError = e.into();
    assert!(matches!(db_err, DbError::Io(_)));
}

//! Scratch [`Database`] construction for integration tests.
//!
//! Mirrors the teacher's `TestContext`: a temporary directory plus a fully
//! wired set of engine components, cleaned up automatically on drop.

use database::Database;
use tempfile::TempDir;

/// An isolated, disk-backed database rooted in its own temp directory.
/// Dropping this drops the directory too.
pub struct ScratchDatabase {
    pub db: Database,
    _dir: TempDir,
}

impl ScratchDatabase {
    /// A fresh database with default tuning, rooted in a new temp
    /// directory that lives as long as the returned value does.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create scratch temp dir");
        let db = Database::open(dir.path());
        Self { db, _dir: dir }
    }

    pub fn path(&self) -> &std::path::Path {
        self._dir.path()
    }
}

impl Default for ScratchDatabase {
    fn default() -> Self {
        Self::new()
    }
}

pub mod prelude {
    pub use crate::ScratchDatabase;
}

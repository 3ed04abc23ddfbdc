//! Fixed-capacity page cache sitting between the table engine and disk.
//!
//! The bufferpool keeps up to a configured number of [`Page`]s resident in
//! memory, tracks a pin count and dirty bit per cached page, and evicts the
//! least-recently-used *unpinned* page when a fetch would otherwise exceed
//! capacity. Pages are addressed by [`PageKey`] and persisted one file per
//! key under `<root>/<table>/<key>.db`.


use common::{DbError, DbResult};
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use storage::{Page, PageKey, PAGE_SIZE};

/// A resident page plus the bookkeeping the eviction policy needs.
struct CachedPage {
    page: Page,
    pin_count: u32,
    dirty: bool,
}

/// Fixed-size, pin-aware LRU cache of [`Page`]s backed by per-key files.
///
/// Mirrors the original `Bufferpool`'s pool/lru/dirty bookkeeping, but keeps
/// the on-disk record count unambiguous: each page file is prefixed with a
/// 2-byte big-endian `num_slots` header ahead of the raw [`PAGE_SIZE`]-byte
/// payload, so a reload never has to guess occupancy from trailing zeros
/// (the ambiguity spec.md §9 flags as an open question).
pub struct Bufferpool {
    root: PathBuf,
    capacity: usize,
    pool: HashMap<PageKey, CachedPage>,
    /// Least-recently-used order; front is the next eviction candidate.
    order: VecDeque<PageKey>,
}

impl Bufferpool {
    /// Create a bufferpool rooted at `root` with room for `capacity` pages.
    pub fn new(root: impl Into<PathBuf>, capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be > 0");
        Self {
            root: root.into(),
            capacity,
            pool: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn path_for(&self, key: &PageKey) -> PathBuf {
        self.root.join(&key.table).join(format!("{key}.db"))
    }

    fn touch(&mut self, key: &PageKey) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
        self.order.push_back(key.clone());
    }

    fn load_page(&self, key: &PageKey) -> Page {
        let path = self.path_for(key);
        let Ok(mut file) = fs::File::open(&path) else {
            return Page::new();
        };
        let mut header = [0u8; 2];
        let mut body = [0u8; PAGE_SIZE];
        if file.read_exact(&mut header).is_err() || file.read_exact(&mut body).is_err() {
            return Page::new();
        }
        let num_slots = u16::from_be_bytes(header);
        Page::from_raw(body, num_slots)
    }

    fn write_page(&self, key: &PageKey, page: &Page) -> DbResult<()> {
        let path = self.path_for(key);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let mut file = fs::File::create(&path)?;
        file.write_all(&page.num_slots().to_be_bytes())?;
        file.write_all(page.raw())?;
        Ok(())
    }

    /// Evict the least-recently-used unpinned page, flushing it first if
    /// dirty. Returns `false` if every resident page is pinned.
    pub fn evict_page(&mut self) -> bool {
        let candidate = self
            .order
            .iter()
            .find(|key| self.pool.get(*key).map(|p| p.pin_count == 0).unwrap_or(false))
            .cloned();
        let Some(key) = candidate else {
            return false;
        };
        let entry = self.pool.remove(&key).expect("candidate came from pool");
        if entry.dirty {
            if let Err(err) = self.write_page(&key, &entry.page) {
                log::warn!("failed to flush page {key} on eviction: {err}");
            }
        }
        if let Some(pos) = self.order.iter().position(|k| k == &key) {
            self.order.remove(pos);
        }
        true
    }

    fn ensure_capacity(&mut self) {
        if self.pool.len() >= self.capacity {
            if !self.evict_page() {
                log::warn!("bufferpool over capacity: all {} resident pages are pinned", self.pool.len());
            }
        }
    }

    /// Fetch `key`, loading it from disk if absent, pinning it, and marking
    /// it most-recently-used.
    pub fn get_page(&mut self, key: &PageKey) -> &mut Page {
        if !self.pool.contains_key(key) {
            self.ensure_capacity();
            let page = self.load_page(key);
            self.pool.insert(
                key.clone(),
                CachedPage {
                    page,
                    pin_count: 0,
                    dirty: false,
                },
            );
        }
        self.touch(key);
        let entry = self.pool.get_mut(key).expect("just inserted or present");
        entry.pin_count += 1;
        &mut entry.page
    }

    /// Release one pin previously taken by [`Bufferpool::get_page`].
    pub fn unpin_page(&mut self, key: &PageKey) {
        if let Some(entry) = self.pool.get_mut(key) {
            entry.pin_count = entry.pin_count.saturating_sub(1);
        }
    }

    /// Mark `key` dirty, so it is flushed on eviction or [`Bufferpool::close`].
    pub fn mark_dirty(&mut self, key: &PageKey) {
        if let Some(entry) = self.pool.get_mut(key) {
            entry.dirty = true;
        }
    }

    /// Write `value` into `key` at `index` (or append if `None`), marking the
    /// page dirty on success. Pins and unpins around the write so callers
    /// never need to manage pins for single-slot access.
    pub fn write_to_page(&mut self, key: &PageKey, value: i64, index: Option<u16>) -> bool {
        let success = self.get_page(key).write(value, index);
        if success {
            self.mark_dirty(key);
        }
        self.unpin_page(key);
        success
    }

    /// Read the value at `index` within `key`, or `None` if out of range.
    pub fn read_from_page(&mut self, key: &PageKey, index: u16) -> Option<i64> {
        let value = self.get_page(key).read(index);
        self.unpin_page(key);
        value
    }

    /// Number of live slots currently recorded for `key`.
    pub fn get_num_records(&mut self, key: &PageKey) -> u16 {
        let n = self.get_page(key).num_slots();
        self.unpin_page(key);
        n
    }

    /// Flush every dirty resident page to disk, leaving the pool populated.
    pub fn close(&mut self) -> DbResult<()> {
        for (key, entry) in self.pool.iter() {
            if entry.dirty {
                self.write_page(key, &entry.page)?;
            }
        }
        Ok(())
    }

    /// Root directory pages are persisted under.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

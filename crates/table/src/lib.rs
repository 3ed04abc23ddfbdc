//! Record lifecycle: base/tail layout, version chains, and merge.
//!
//! A [`Table`] owns a page directory (rid → physical location), a primary
//! plus secondary [`Index`], and the counters needed to grow its base and
//! tail page chains. Every column of a given kind (base or tail) at a given
//! chain position is written to in lockstep, so a record's four metadata
//! slots (indirection, rid, timestamp, schema-encoding) and its N user
//! columns always share the same slot index within that chain position.

#[cfg(test)]
mod tests;

use buffer::Bufferpool;
use common::{DbError, DbResult};
use index::Index;
use lockmgr::LockManager;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use storage::{PageKey, PageKind, SLOT_CAPACITY};

const INDIRECTION_COLUMN: usize = 0;
const RID_COLUMN: usize = 1;
const TIMESTAMP_COLUMN: usize = 2;
const SCHEMA_ENCODING_COLUMN: usize = 3;
const METADATA_COLUMNS: usize = 4;

/// A logical row: identity plus its current (or a historical) set of
/// user-column values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub rid: i64,
    pub key: i64,
    pub columns: Vec<i64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
enum EntryKind {
    Base,
    Tail,
    Deleted,
    Merged,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
struct DirEntry {
    kind: EntryKind,
    chain: usize,
    slot: u16,
}

impl DirEntry {
    fn physical_kind(&self) -> PageKind {
        match self.kind {
            EntryKind::Base | EntryKind::Deleted => PageKind::Base,
            EntryKind::Tail | EntryKind::Merged => PageKind::Tail,
        }
    }
}

struct RawRecord {
    rid: i64,
    indirection: i64,
    schema_encoding: i64,
    columns: Vec<i64>,
}

/// Serializable snapshot of a table's durable state, matching the
/// `<table>_metadata.json` layout (spec.md §6), with two deliberate
/// simplifications over that layout: page chains are tracked as a single
/// length per kind rather than a redundant per-column page-id list (every
/// column's chain is always the same length by construction, following
/// from the structural [`PageKey`] redesign), and index contents are not
/// serialized at all — [`Table::rebuild_index`] reconstructs the primary
/// and any previously active secondary indices from the page directory on
/// load, exactly as `index.py`'s `rebuild_index` was meant to.
#[derive(Serialize, Deserialize)]
pub struct TableMetadata {
    pub num_columns: usize,
    pub key_column: usize,
    pub num_records: u64,
    pub num_updates: u64,
    pub base_chain_len: usize,
    pub tail_chain_len: usize,
    page_directory: HashMap<i64, DirEntry>,
}

fn now_micros() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_micros() as i64
}

/// A single table: record storage, version chains, and indices.
pub struct Table {
    name: String,
    key_column: usize,
    num_columns: usize,
    bufferpool: Arc<Mutex<Bufferpool>>,
    lock_manager: Arc<LockManager>,
    index: Mutex<Index>,
    directory: Mutex<HashMap<i64, DirEntry>>,
    next_rid: Mutex<i64>,
    num_records: Mutex<u64>,
    num_updates: Mutex<u64>,
    base_chain_len: Mutex<usize>,
    tail_chain_len: Mutex<usize>,
    merge_threshold: u64,
    merge_interval: Duration,
    last_merge: Mutex<Instant>,
}

impl Table {
    /// A fresh table with empty chains and an index over just the key
    /// column.
    pub fn new(
        name: impl Into<String>,
        num_columns: usize,
        key_column: usize,
        bufferpool: Arc<Mutex<Bufferpool>>,
        lock_manager: Arc<LockManager>,
        merge_threshold: u64,
        merge_interval: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            key_column,
            num_columns,
            bufferpool,
            lock_manager,
            index: Mutex::new(Index::new(num_columns, key_column)),
            directory: Mutex::new(HashMap::new()),
            next_rid: Mutex::new(0),
            num_records: Mutex::new(0),
            num_updates: Mutex::new(0),
            base_chain_len: Mutex::new(1),
            tail_chain_len: Mutex::new(1),
            merge_threshold,
            merge_interval,
            last_merge: Mutex::new(Instant::now()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn num_columns(&self) -> usize {
        self.num_columns
    }

    pub fn key_column(&self) -> usize {
        self.key_column
    }

    pub fn lock_manager(&self) -> &Arc<LockManager> {
        &self.lock_manager
    }

    /// The rid a primary-key lookup would resolve to, for transaction-layer
    /// lock acquisition before the operation itself runs.
    pub fn locate_primary(&self, key: i64) -> Option<i64> {
        self.index.lock().expect("index mutex poisoned").locate(self.key_column, key)
    }

    fn key(&self, kind: PageKind, column: usize, chain: usize) -> PageKey {
        PageKey::new(self.name.clone(), kind, column, chain)
    }

    fn next_rid(&self) -> i64 {
        let mut guard = self.next_rid.lock().expect("next-rid mutex poisoned");
        let rid = *guard;
        *guard += 1;
        rid
    }

    /// Find (or create) the chain position with spare capacity for `kind`,
    /// returning its index. Checking column 0 is sufficient: every column
    /// in a chain grows in lockstep.
    fn ensure_capacity(&self, kind: PageKind) -> usize {
        let len_lock = match kind {
            PageKind::Base => &self.base_chain_len,
            PageKind::Tail => &self.tail_chain_len,
        };
        let mut bp = self.bufferpool.lock().expect("bufferpool mutex poisoned");
        let mut len = len_lock.lock().expect("chain-length mutex poisoned");
        let mut chain = 0;
        while chain < *len {
            if bp.get_num_records(&self.key(kind, 0, chain)) < SLOT_CAPACITY as u16 {
                return chain;
            }
            chain += 1;
        }
        *len += 1;
        chain
    }

    fn total_columns(&self) -> usize {
        self.num_columns + METADATA_COLUMNS
    }

    fn get_record_raw(&self, rid: i64) -> Option<RawRecord> {
        let entry = *self.directory.lock().expect("directory mutex poisoned").get(&rid)?;
        if matches!(entry.kind, EntryKind::Deleted | EntryKind::Merged) {
            return None;
        }
        let kind = entry.physical_kind();
        let mut bp = self.bufferpool.lock().expect("bufferpool mutex poisoned");
        let indirection = bp.read_from_page(&self.key(kind, INDIRECTION_COLUMN, entry.chain), entry.slot)?;
        let schema_encoding = bp.read_from_page(&self.key(kind, SCHEMA_ENCODING_COLUMN, entry.chain), entry.slot)?;
        let mut columns = Vec::with_capacity(self.num_columns);
        for i in 0..self.num_columns {
            columns.push(bp.read_from_page(&self.key(kind, METADATA_COLUMNS + i, entry.chain), entry.slot)?);
        }
        Some(RawRecord {
            rid,
            indirection,
            schema_encoding,
            columns,
        })
    }

    fn to_record(&self, raw: &RawRecord) -> Record {
        Record {
            rid: raw.rid,
            key: raw.columns[self.key_column],
            columns: raw.columns.clone(),
        }
    }

    fn project(record: &Record, mask: &[bool]) -> Vec<i64> {
        record
            .columns
            .iter()
            .zip(mask.iter())
            .filter(|(_, include)| **include)
            .map(|(v, _)| *v)
            .collect()
    }

    /// Fetch the current (base) version of `rid`, or `None` if it is
    /// absent, deleted, or merged away.
    pub fn get_record(&self, rid: i64) -> Option<Record> {
        self.get_record_raw(rid).map(|raw| self.to_record(&raw))
    }

    /// Insert a new row. Fails fast (no directory or index mutation) if any
    /// column write fails, leaving no partially-visible row behind.
    pub fn create_record(&self, columns: &[i64]) -> DbResult<Record> {
        if columns.len() != self.num_columns {
            return Err(DbError::InvalidArgument(format!(
                "expected {} columns, got {}",
                self.num_columns,
                columns.len()
            )));
        }
        let rid = self.next_rid();
        let timestamp = now_micros();
        let chain = self.ensure_capacity(PageKind::Base);

        let mut bp = self.bufferpool.lock().expect("bufferpool mutex poisoned");
        let slot = bp.get_num_records(&self.key(PageKind::Base, 0, chain));

        let mut ok = bp.write_to_page(&self.key(PageKind::Base, INDIRECTION_COLUMN, chain), rid, None);
        ok &= bp.write_to_page(&self.key(PageKind::Base, RID_COLUMN, chain), rid, None);
        ok &= bp.write_to_page(&self.key(PageKind::Base, TIMESTAMP_COLUMN, chain), timestamp, None);
        ok &= bp.write_to_page(&self.key(PageKind::Base, SCHEMA_ENCODING_COLUMN, chain), 0, None);
        for (i, value) in columns.iter().enumerate() {
            ok &= bp.write_to_page(&self.key(PageKind::Base, METADATA_COLUMNS + i, chain), *value, None);
        }
        drop(bp);

        if !ok {
            return Err(DbError::Storage(format!("failed to write new record in table {}", self.name)));
        }

        self.directory.lock().expect("directory mutex poisoned").insert(
            rid,
            DirEntry {
                kind: EntryKind::Base,
                chain,
                slot,
            },
        );

        let mut index = self.index.lock().expect("index mutex poisoned");
        for (i, value) in columns.iter().enumerate() {
            if index.is_indexed(i) {
                index.update_index(i, *value, rid);
            }
        }
        drop(index);

        *self.num_records.lock().expect("num_records mutex poisoned") += 1;

        Ok(Record {
            rid,
            key: columns[self.key_column],
            columns: columns.to_vec(),
        })
    }

    /// Insert wrapper matching the external `insert` operation: a success
    /// flag rather than the inserted record.
    pub fn insert(&self, columns: &[i64]) -> DbResult<bool> {
        self.create_record(columns).map(|_| true)
    }

    /// Current-version read through the primary index, projected by
    /// `mask`. Empty if the key does not resolve to a live record.
    pub fn select(&self, key: i64, mask: &[bool]) -> DbResult<Vec<Record>> {
        if mask.len() != self.num_columns {
            return Err(DbError::InvalidArgument("projection mask length mismatch".into()));
        }
        let Some(rid) = self.locate_primary(key) else {
            return Ok(Vec::new());
        };
        let Some(record) = self.get_record(rid) else {
            return Ok(Vec::new());
        };
        if record.key != key {
            return Ok(Vec::new());
        }
        Ok(vec![Record {
            rid: record.rid,
            key: record.key,
            columns: Self::project(&record, mask),
        }])
    }

    /// Walk the indirection chain from the base record outward, oldest
    /// last. Stops at the self-loop terminator or on revisiting a rid
    /// (corruption guard).
    fn version_chain(&self, base: &RawRecord) -> Vec<RawRecord> {
        let mut versions = Vec::new();
        let mut visited = std::collections::HashSet::new();
        visited.insert(base.rid);
        let mut current_indirection = base.indirection;
        let mut current_rid = base.rid;
        loop {
            if current_indirection == current_rid || visited.contains(&current_indirection) {
                break;
            }
            let Some(next) = self.get_record_raw(current_indirection) else {
                break;
            };
            visited.insert(next.rid);
            current_indirection = next.indirection;
            current_rid = next.rid;
            versions.push(next);
        }
        versions
    }

    /// Versioned read. `relative_version` 0 is current; negative `k` walks
    /// `|k|` steps back through tail history, flooring to the oldest
    /// available state once the chain is shorter than `|k|`.
    pub fn select_version(&self, key: i64, mask: &[bool], relative_version: i64) -> DbResult<Option<Record>> {
        if mask.len() != self.num_columns {
            return Err(DbError::InvalidArgument("projection mask length mismatch".into()));
        }
        let Some(rid) = self.locate_primary(key) else {
            return Ok(None);
        };
        let Some(base) = self.get_record_raw(rid) else {
            return Ok(None);
        };
        if relative_version == 0 {
            let record = self.to_record(&base);
            return Ok(Some(Record {
                rid: record.rid,
                key: record.key,
                columns: Self::project(&record, mask),
            }));
        }

        let versions = self.version_chain(&base);
        let target = if versions.is_empty() {
            &base
        } else {
            let idx = (relative_version.unsigned_abs() as usize).saturating_sub(1);
            versions.get(idx).unwrap_or_else(|| versions.last().expect("checked non-empty"))
        };
        Ok(Some(Record {
            rid: base.rid,
            key,
            columns: Self::project(&Record { rid: target.rid, key, columns: target.columns.clone() }, mask),
        }))
    }

    /// Sum of `column` over live current records whose key lies in
    /// `[begin, end]`, using the primary index to avoid a full scan and
    /// deduplicating by key (first rid wins).
    pub fn sum(&self, begin: i64, end: i64, column: usize) -> DbResult<i64> {
        if column >= self.num_columns {
            return Err(DbError::InvalidArgument(format!("column {column} out of range")));
        }
        let rids = self.index.lock().expect("index mutex poisoned").locate_range(self.key_column, begin, end);
        let mut seen = std::collections::HashSet::new();
        let mut total = 0i64;
        for rid in rids {
            let Some(record) = self.get_record(rid) else { continue };
            if !seen.insert(record.key) {
                continue;
            }
            total += record.columns[column];
        }
        Ok(total)
    }

    /// As [`Table::sum`], but each key's value comes from
    /// `select_version(key, .., relative_version)` instead of the current
    /// row.
    pub fn sum_version(&self, begin: i64, end: i64, column: usize, relative_version: i64) -> DbResult<i64> {
        if column >= self.num_columns {
            return Err(DbError::InvalidArgument(format!("column {column} out of range")));
        }
        let rids = self.index.lock().expect("index mutex poisoned").locate_range(self.key_column, begin, end);
        let mut mask = vec![true; self.num_columns];
        mask.iter_mut().enumerate().for_each(|(i, m)| *m = i == column);
        let mut seen = std::collections::HashSet::new();
        let mut total = 0i64;
        for rid in rids {
            let Some(base) = self.get_record(rid) else { continue };
            if !seen.insert(base.key) {
                continue;
            }
            if let Some(versioned) = self.select_version(base.key, &mask, relative_version)? {
                total += versioned.columns[0];
            }
        }
        Ok(total)
    }

    /// Apply `updates` (absent entries leave that column unchanged) to the
    /// record keyed by `key`, appending a pre-update snapshot to the tail
    /// chain. May trigger a merge once the update counter crosses the
    /// configured threshold.
    pub fn update(&self, key: i64, updates: &[Option<i64>]) -> DbResult<bool> {
        if updates.len() != self.num_columns {
            return Err(DbError::InvalidArgument("update vector length mismatch".into()));
        }
        let Some(rid) = self.locate_primary(key) else {
            return Ok(false);
        };
        let is_base = matches!(
            self.directory.lock().expect("directory mutex poisoned").get(&rid),
            Some(DirEntry { kind: EntryKind::Base, .. })
        );
        if !is_base {
            return Ok(false);
        }
        let Some(base) = self.get_record_raw(rid) else {
            return Ok(false);
        };

        let tail_rid = self.next_rid();
        let timestamp = now_micros();
        let chain = self.ensure_capacity(PageKind::Tail);

        let tail_indirection = if base.indirection != base.rid { base.indirection } else { base.rid };

        let mut bp = self.bufferpool.lock().expect("bufferpool mutex poisoned");
        let tail_slot = bp.get_num_records(&self.key(PageKind::Tail, 0, chain));
        for (i, value) in base.columns.iter().enumerate() {
            bp.write_to_page(&self.key(PageKind::Tail, METADATA_COLUMNS + i, chain), *value, None);
        }
        bp.write_to_page(&self.key(PageKind::Tail, INDIRECTION_COLUMN, chain), tail_indirection, None);
        bp.write_to_page(&self.key(PageKind::Tail, RID_COLUMN, chain), tail_rid, None);
        bp.write_to_page(&self.key(PageKind::Tail, TIMESTAMP_COLUMN, chain), timestamp, None);
        bp.write_to_page(&self.key(PageKind::Tail, SCHEMA_ENCODING_COLUMN, chain), 0, None);

        let base_chain = base_chain_for(&self.directory, rid);
        let base_slot = base_slot_for(&self.directory, rid);
        let mut schema_encoding: i64 = 0;
        for (i, update) in updates.iter().enumerate() {
            if let Some(value) = update {
                bp.write_to_page(&self.key(PageKind::Base, METADATA_COLUMNS + i, base_chain), *value, Some(base_slot));
                schema_encoding |= 1 << i;
            }
        }
        bp.write_to_page(&self.key(PageKind::Base, INDIRECTION_COLUMN, base_chain), tail_rid, Some(base_slot));
        bp.write_to_page(&self.key(PageKind::Base, TIMESTAMP_COLUMN, base_chain), timestamp, Some(base_slot));
        bp.write_to_page(
            &self.key(PageKind::Base, SCHEMA_ENCODING_COLUMN, base_chain),
            schema_encoding,
            Some(base_slot),
        );
        drop(bp);

        self.directory.lock().expect("directory mutex poisoned").insert(
            tail_rid,
            DirEntry {
                kind: EntryKind::Tail,
                chain,
                slot: tail_slot,
            },
        );

        let mut index = self.index.lock().expect("index mutex poisoned");
        for (i, update) in updates.iter().enumerate() {
            if let Some(value) = update {
                if index.is_indexed(i) {
                    index.update_index(i, *value, rid);
                }
            }
        }
        drop(index);

        let mut updates_count = self.num_updates.lock().expect("num_updates mutex poisoned");
        *updates_count += 1;
        let should_merge = *updates_count % self.merge_threshold == 0;
        let count_snapshot = *updates_count;
        drop(updates_count);
        log::debug!("table {} applied update #{count_snapshot} for key {key}", self.name);

        if should_merge {
            let mut last_merge = self.last_merge.lock().expect("last-merge mutex poisoned");
            if last_merge.elapsed() > self.merge_interval {
                *last_merge = Instant::now();
                drop(last_merge);
                self.merge()?;
            }
        }

        Ok(true)
    }

    /// Delete the base record keyed by `key`. Only a `deleted` marker is
    /// written to the directory and the primary index entry is removed;
    /// secondary indices are left stale (spec.md §9) and must be filtered
    /// by directory kind at read time.
    pub fn delete(&self, key: i64) -> DbResult<bool> {
        let Some(rid) = self.locate_primary(key) else {
            return Ok(false);
        };
        let mut directory = self.directory.lock().expect("directory mutex poisoned");
        let Some(entry) = directory.get_mut(&rid) else {
            return Ok(false);
        };
        if entry.kind != EntryKind::Base {
            return Ok(false);
        }
        entry.kind = EntryKind::Deleted;
        drop(directory);
        self.index.lock().expect("index mutex poisoned").remove(self.key_column, key);
        Ok(true)
    }

    /// Increment `column` for the record keyed by `key` by one.
    pub fn increment(&self, key: i64, column: usize) -> DbResult<bool> {
        if column >= self.num_columns {
            return Err(DbError::InvalidArgument(format!("column {column} out of range")));
        }
        let mask = vec![true; self.num_columns];
        let Some(current) = self.select(key, &mask)?.into_iter().next() else {
            return Ok(false);
        };
        let mut updates = vec![None; self.num_columns];
        updates[column] = Some(current.columns[column] + 1);
        self.update(key, &updates)
    }

    /// Fold every tail record into its base and mark the tail entries
    /// `merged`. Idempotent and safe to call speculatively.
    pub fn merge(&self) -> DbResult<()> {
        let candidates: Vec<(i64, DirEntry)> = self
            .directory
            .lock()
            .expect("directory mutex poisoned")
            .iter()
            .filter(|(_, e)| e.kind == EntryKind::Base)
            .map(|(rid, e)| (*rid, *e))
            .collect();

        for (rid, _) in candidates {
            let Some(base) = self.get_record_raw(rid) else { continue };
            if base.indirection == base.rid {
                continue;
            }
            let versions = self.version_chain(&base);
            if versions.is_empty() {
                continue;
            }

            // The base record's own columns are already the fully current
            // state (every update overwrites them in place); merge's job is
            // to fold the schema history into one bitmask and retire the
            // tail chain, not to recompute values already sitting in base.
            let merged_schema = versions.iter().fold(0i64, |acc, tail| acc | tail.schema_encoding);

            let chain = base_chain_for(&self.directory, rid);
            let slot = base_slot_for(&self.directory, rid);
            let mut bp = self.bufferpool.lock().expect("bufferpool mutex poisoned");
            for (i, value) in base.columns.iter().enumerate() {
                bp.write_to_page(&self.key(PageKind::Base, METADATA_COLUMNS + i, chain), *value, Some(slot));
            }
            bp.write_to_page(&self.key(PageKind::Base, INDIRECTION_COLUMN, chain), rid, Some(slot));
            bp.write_to_page(&self.key(PageKind::Base, SCHEMA_ENCODING_COLUMN, chain), merged_schema, Some(slot));
            drop(bp);

            let mut directory = self.directory.lock().expect("directory mutex poisoned");
            directory.insert(
                rid,
                DirEntry {
                    kind: EntryKind::Base,
                    chain,
                    slot,
                },
            );
            for tail in &versions {
                if let Some(e) = directory.get_mut(&tail.rid) {
                    e.kind = EntryKind::Merged;
                }
            }
        }
        Ok(())
    }

    /// Rewrite the base record's user columns and schema bits from the
    /// state at `base.indirection`, stepping the chain back one position.
    /// Used by transaction abort when an update must be undone.
    pub fn rollback_record(&self, rid: i64) -> DbResult<bool> {
        let Some(base) = self.get_record_raw(rid) else {
            return Ok(false);
        };
        if base.indirection == base.rid {
            return Ok(false);
        }
        let Some(prev) = self.get_record_raw(base.indirection) else {
            return Ok(false);
        };
        let chain = base_chain_for(&self.directory, rid);
        let slot = base_slot_for(&self.directory, rid);
        let mut bp = self.bufferpool.lock().expect("bufferpool mutex poisoned");
        for (i, value) in prev.columns.iter().enumerate() {
            bp.write_to_page(&self.key(PageKind::Base, METADATA_COLUMNS + i, chain), *value, Some(slot));
        }
        bp.write_to_page(&self.key(PageKind::Base, INDIRECTION_COLUMN, chain), rid, Some(slot));
        bp.write_to_page(
            &self.key(PageKind::Base, SCHEMA_ENCODING_COLUMN, chain),
            prev.schema_encoding,
            Some(slot),
        );
        Ok(true)
    }

    /// Snapshot this table's durable state for persistence.
    pub fn to_metadata(&self) -> TableMetadata {
        TableMetadata {
            num_columns: self.num_columns,
            key_column: self.key_column,
            num_records: *self.num_records.lock().expect("num_records mutex poisoned"),
            num_updates: *self.num_updates.lock().expect("num_updates mutex poisoned"),
            base_chain_len: *self.base_chain_len.lock().expect("chain-length mutex poisoned"),
            tail_chain_len: *self.tail_chain_len.lock().expect("chain-length mutex poisoned"),
            page_directory: self.directory.lock().expect("directory mutex poisoned").clone(),
        }
    }

    /// Reconstruct a table from a prior [`Table::to_metadata`] snapshot.
    pub fn from_metadata(
        name: impl Into<String>,
        meta: TableMetadata,
        bufferpool: Arc<Mutex<Bufferpool>>,
        lock_manager: Arc<LockManager>,
        merge_threshold: u64,
        merge_interval: Duration,
    ) -> Self {
        let table = Self {
            name: name.into(),
            key_column: meta.key_column,
            num_columns: meta.num_columns,
            bufferpool,
            lock_manager,
            index: Mutex::new(Index::new(meta.num_columns, meta.key_column)),
            directory: Mutex::new(meta.page_directory),
            next_rid: Mutex::new(0),
            num_records: Mutex::new(meta.num_records),
            num_updates: Mutex::new(meta.num_updates),
            base_chain_len: Mutex::new(meta.base_chain_len.max(1)),
            tail_chain_len: Mutex::new(meta.tail_chain_len.max(1)),
            merge_threshold,
            merge_interval,
            last_merge: Mutex::new(Instant::now()),
        };
        table.rebuild_next_rid();
        table.rebuild_index();
        table
    }

    fn rebuild_next_rid(&self) {
        let max_rid = self
            .directory
            .lock()
            .expect("directory mutex poisoned")
            .keys()
            .copied()
            .max();
        if let Some(max_rid) = max_rid {
            *self.next_rid.lock().expect("next-rid mutex poisoned") = max_rid + 1;
        }
    }

    /// Rebuild the primary index (and any previously active secondary
    /// indices) from the page directory. Used after loading from disk.
    pub fn rebuild_index(&self) {
        let rids: Vec<i64> = self.directory.lock().expect("directory mutex poisoned").keys().copied().collect();
        let mut index = self.index.lock().expect("index mutex poisoned");
        index.rebuild_all(|column| {
            let mut pairs = Vec::new();
            for &rid in &rids {
                if let Some(record) = self.get_record(rid) {
                    pairs.push((record.columns[column], record.rid));
                }
            }
            pairs
        });
    }
}

fn base_chain_for(directory: &Mutex<HashMap<i64, DirEntry>>, rid: i64) -> usize {
    directory.lock().expect("directory mutex poisoned").get(&rid).map(|e| e.chain).unwrap_or(0)
}

fn base_slot_for(directory: &Mutex<HashMap<i64, DirEntry>>, rid: i64) -> u16 {
    directory.lock().expect("directory mutex poisoned").get(&rid).map(|e| e.slot).unwrap_or(0)
}

//! Top-level database: table registry, persistence, and transaction ids.
//!
//! A [`Database`] owns the one [`Bufferpool`] and [`LockManager`] shared by
//! every [`Table`] it registers, the root path persisted state lives under,
//! and the set of currently active transaction ids. Persistence is a flat
//! JSON layout: `<root>/metadata.json` lists every table's shape, and
//! `<root>/<table>_metadata.json` holds that table's page directory and
//! counters; page files live under `<root>/<table>/` via the bufferpool.


use common::{Config, DbResult};
use lockmgr::LockManager;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use table::{Table, TableMetadata};

const ROOT_METADATA_FILE: &str = "metadata.json";

fn table_metadata_path(root: &Path, name: &str) -> PathBuf {
    root.join(format!("{name}_metadata.json"))
}

/// A table's shape, enough to enumerate the registry and cross-check its
/// metadata file on load.
#[derive(Clone, Copy, Serialize, Deserialize)]
struct TableShape {
    num_columns: usize,
    key_column: usize,
}

#[derive(Default, Serialize, Deserialize)]
struct RootMetadata {
    tables: HashMap<String, TableShape>,
}

/// Top-level holder of every table, the shared bufferpool and lock
/// manager, and the set of transaction ids currently in flight.
pub struct Database {
    root: PathBuf,
    config: Config,
    tables: Mutex<HashMap<String, Arc<Table>>>,
    bufferpool: Arc<Mutex<buffer::Bufferpool>>,
    lock_manager: Arc<LockManager>,
    next_txn_id: AtomicU64,
    active_transactions: Mutex<HashSet<u64>>,
}

impl Database {
    /// Open (or create) the database rooted at `path` with default
    /// tuning. See [`Database::open_with_config`] to override bufferpool
    /// capacity, merge threshold, or merge interval.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::open_with_config(path, Config::default())
    }

    /// As [`Database::open`], but with an explicit [`Config`]. Never
    /// fails outright: any I/O or parse error while reconstructing a
    /// table is logged and that table is skipped, matching the
    /// original's "failures yield an empty database" contract.
    pub fn open_with_config(path: impl Into<PathBuf>, config: Config) -> Self {
        let root: PathBuf = path.into();
        if let Err(err) = fs::create_dir_all(&root) {
            log::warn!("failed to create database root {}: {err}", root.display());
        }

        let bufferpool = Arc::new(Mutex::new(buffer::Bufferpool::new(&root, config.buffer_pool_pages)));
        let lock_manager = Arc::new(LockManager::new());
        let mut tables = HashMap::new();

        let root_meta = read_root_metadata(&root);
        for (name, shape) in &root_meta.tables {
            match load_table(&root, name, *shape, &bufferpool, &lock_manager, &config) {
                Ok(table) => {
                    tables.insert(name.clone(), Arc::new(table));
                }
                Err(err) => {
                    log::warn!("failed to reconstruct table {name}: {err}");
                }
            }
        }

        Self {
            root,
            config,
            tables: Mutex::new(tables),
            bufferpool,
            lock_manager,
            next_txn_id: AtomicU64::new(1),
            active_transactions: Mutex::new(HashSet::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn lock_manager(&self) -> &Arc<LockManager> {
        &self.lock_manager
    }

    /// Return the table registered as `name`, constructing and
    /// registering a fresh one if absent. Repeated calls with a different
    /// shape still return the original table — the first registration
    /// wins, matching "return existing if present."
    pub fn create_table(&self, name: &str, num_columns: usize, key_column: usize) -> Arc<Table> {
        let mut tables = self.tables.lock().expect("tables mutex poisoned");
        if let Some(existing) = tables.get(name) {
            return existing.clone();
        }
        let table = Arc::new(Table::new(
            name,
            num_columns,
            key_column,
            self.bufferpool.clone(),
            self.lock_manager.clone(),
            self.config.merge_threshold,
            self.config.merge_interval,
        ));
        tables.insert(name.to_string(), table.clone());
        table
    }

    pub fn get_table(&self, name: &str) -> Option<Arc<Table>> {
        self.tables.lock().expect("tables mutex poisoned").get(name).cloned()
    }

    /// Remove `name` from the registry and delete its metadata file. Page
    /// files under `<root>/<name>/` are left behind, matching spec.md §4.8
    /// ("delete per-table metadata file; remove from registry").
    pub fn drop_table(&self, name: &str) -> bool {
        let removed = self.tables.lock().expect("tables mutex poisoned").remove(name).is_some();
        if removed {
            let path = table_metadata_path(&self.root, name);
            if let Err(err) = fs::remove_file(&path) {
                if err.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("failed to remove metadata file for table {name}: {err}");
                }
            }
        }
        removed
    }

    /// Allocate a new transaction id and track it as active.
    pub fn begin_transaction(&self) -> u64 {
        let id = self.next_txn_id.fetch_add(1, Ordering::SeqCst);
        self.active_transactions.lock().expect("active-transactions mutex poisoned").insert(id);
        id
    }

    pub fn commit_transaction(&self, id: u64) -> bool {
        self.active_transactions.lock().expect("active-transactions mutex poisoned").remove(&id)
    }

    pub fn abort_transaction(&self, id: u64) -> bool {
        self.active_transactions.lock().expect("active-transactions mutex poisoned").remove(&id)
    }

    /// Best-effort drain of whatever transaction ids are still marked
    /// active, then persist every table's metadata plus the root registry
    /// and flush the bufferpool. Draining is best-effort: an id whose
    /// owning thread never called commit/abort is simply dropped after a
    /// bounded wait rather than blocking close forever.
    pub fn close(&self) -> DbResult<()> {
        for _ in 0..20 {
            if self.active_transactions.lock().expect("active-transactions mutex poisoned").is_empty() {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        if !self.active_transactions.lock().expect("active-transactions mutex poisoned").is_empty() {
            log::warn!("closing database with transactions still marked active");
        }
        self.lock_manager.clear_all();

        let tables = self.tables.lock().expect("tables mutex poisoned");
        let mut root_meta = RootMetadata::default();
        for (name, table) in tables.iter() {
            root_meta.tables.insert(
                name.clone(),
                TableShape { num_columns: table.num_columns(), key_column: table.key_column() },
            );
            write_json(&table_metadata_path(&self.root, name), &table.to_metadata())?;
        }
        write_json(&self.root.join(ROOT_METADATA_FILE), &root_meta)?;
        drop(tables);

        self.bufferpool.lock().expect("bufferpool mutex poisoned").close()
    }
}

fn read_root_metadata(root: &Path) -> RootMetadata {
    let path = root.join(ROOT_METADATA_FILE);
    match fs::read_to_string(&path) {
        Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|err| {
            log::warn!("malformed root metadata at {}: {err}", path.display());
            RootMetadata::default()
        }),
        Err(_) => RootMetadata::default(),
    }
}

fn load_table(
    root: &Path,
    name: &str,
    shape: TableShape,
    bufferpool: &Arc<Mutex<buffer::Bufferpool>>,
    lock_manager: &Arc<LockManager>,
    config: &Config,
) -> DbResult<Table> {
    let path = table_metadata_path(root, name);
    let contents = fs::read_to_string(&path)?;
    let meta: TableMetadata = serde_json::from_str(&contents).map_err(std::io::Error::from)?;
    debug_assert_eq!(meta.num_columns, shape.num_columns, "table {name} shape mismatch between registry and metadata");
    debug_assert_eq!(meta.key_column, shape.key_column, "table {name} key column mismatch between registry and metadata");
    Ok(Table::from_metadata(
        name,
        meta,
        bufferpool.clone(),
        lock_manager.clone(),
        config.merge_threshold,
        config.merge_interval,
    ))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> DbResult<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let file = fs::File::create(path)?;
    serde_json::to_writer_pretty(file, value).map_err(std::io::Error::from)?;
    Ok(())
}

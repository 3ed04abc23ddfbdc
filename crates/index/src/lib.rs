//! Per-column value→rid indices over a table.
//!
//! One [`BTreeMap`] per indexed column rather than a hash map, so
//! [`Index::locate_range`] is a native ascending range scan instead of the
//! collect-then-sort the original Python index performed.

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;

/// Holds, for each column, an optional value→rid mapping. The key column's
/// mapping always exists.
pub struct Index {
    indices: Vec<Option<BTreeMap<i64, i64>>>,
    key_column: usize,
}

impl Index {
    /// A fresh index set over `num_columns` columns with `key_column`
    /// indexed and empty.
    pub fn new(num_columns: usize, key_column: usize) -> Self {
        let mut indices = vec![None; num_columns];
        indices[key_column] = Some(BTreeMap::new());
        Self {
            indices,
            key_column,
        }
    }

    /// Create (or reset) the index for `column`, populating it from
    /// `entries`. Returns `false` for an out-of-range column.
    pub fn create_index(&mut self, column: usize, entries: impl IntoIterator<Item = (i64, i64)>) -> bool {
        if column >= self.indices.len() {
            return false;
        }
        self.indices[column] = Some(entries.into_iter().collect());
        true
    }

    /// Drop the index for `column`. Always fails for the key column.
    pub fn drop_index(&mut self, column: usize) -> bool {
        if column == self.key_column || column >= self.indices.len() {
            return false;
        }
        if self.indices[column].is_none() {
            return false;
        }
        self.indices[column] = None;
        true
    }

    /// The rid mapped to `value` in `column`, if indexed and present.
    pub fn locate(&self, column: usize, value: i64) -> Option<i64> {
        self.indices.get(column)?.as_ref()?.get(&value).copied()
    }

    /// Rids whose `column` value lies in `[begin, end]`, ascending by key.
    /// Empty if `column` isn't indexed.
    pub fn locate_range(&self, column: usize, begin: i64, end: i64) -> Vec<i64> {
        let Some(Some(map)) = self.indices.get(column) else {
            return Vec::new();
        };
        map.range(begin..=end).map(|(_, rid)| *rid).collect()
    }

    /// Insert `value -> rid` into `column`'s index, first removing any
    /// existing entry that pointed at `rid`. No-op, returns `false`, if the
    /// column isn't indexed.
    pub fn update_index(&mut self, column: usize, value: i64, rid: i64) -> bool {
        let Some(Some(map)) = self.indices.get_mut(column) else {
            return false;
        };
        if let Some(stale) = map.iter().find(|(_, r)| **r == rid).map(|(k, _)| *k) {
            map.remove(&stale);
        }
        map.insert(value, rid);
        true
    }

    /// Remove the entry for `value` in `column`'s index, if present.
    /// Returns `false` if the column isn't indexed.
    pub fn remove(&mut self, column: usize, value: i64) -> bool {
        let Some(Some(map)) = self.indices.get_mut(column) else {
            return false;
        };
        map.remove(&value);
        true
    }

    /// True if `column` currently has an index.
    pub fn is_indexed(&self, column: usize) -> bool {
        self.indices.get(column).map(|o| o.is_some()).unwrap_or(false)
    }

    /// Reset every mapping and repopulate the key column plus every column
    /// that was indexed before the reset, using `fetch` to supply each
    /// column's live `(value, rid)` pairs.
    pub fn rebuild_all(&mut self, mut fetch: impl FnMut(usize) -> Vec<(i64, i64)>) {
        let active: Vec<usize> = (0..self.indices.len())
            .filter(|&c| c == self.key_column || self.indices[c].is_some())
            .collect();
        self.indices = vec![None; self.indices.len()];
        for column in active {
            let entries = fetch(column);
            self.indices[column] = Some(entries.into_iter().collect());
        }
    }
}

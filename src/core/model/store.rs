//! In-memory policy rows for one (section, type)
//!
//! Rows keep insertion (or sort) order for scanning; a hash set mirrors
//! them for O(1) duplicate and existence checks.

use super::values::PolicyValues;
use ahash::AHashSet;

/// Ordered, duplicate-free collection of policy rows
#[derive(Debug, Clone, Default)]
pub struct PolicyStore {
    rows: Vec<PolicyValues>,
    index: AHashSet<PolicyValues>,
}

impl PolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows in scan order
    pub fn rows(&self) -> &[PolicyValues] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PolicyValues> {
        self.rows.iter()
    }

    pub fn contains(&self, row: &PolicyValues) -> bool {
        self.index.contains(row)
    }

    /// Append a row; false if it is already present
    pub fn insert(&mut self, row: PolicyValues) -> bool {
        if self.index.contains(&row) {
            return false;
        }
        self.index.insert(row.clone());
        self.rows.push(row);
        true
    }

    /// Append every row, or none if any is already present (or repeated)
    pub fn insert_all(&mut self, rows: &[PolicyValues]) -> bool {
        let mut seen = AHashSet::with_capacity(rows.len());
        if rows
            .iter()
            .any(|r| self.index.contains(r) || !seen.insert(r))
        {
            return false;
        }
        for row in rows {
            self.index.insert(row.clone());
            self.rows.push(row.clone());
        }
        true
    }

    /// Remove a row; false if absent
    pub fn remove(&mut self, row: &PolicyValues) -> bool {
        if !self.index.remove(row) {
            return false;
        }
        self.rows.retain(|r| r != row);
        true
    }

    /// Remove every row, or none if any is missing
    pub fn remove_all(&mut self, rows: &[PolicyValues]) -> bool {
        if !rows.iter().all(|r| self.index.contains(r)) {
            return false;
        }
        for row in rows {
            self.index.remove(row);
        }
        let index = &self.index;
        self.rows.retain(|r| index.contains(r));
        true
    }

    /// Remove rows whose fields from `field_index` on equal `values`
    /// (empty values are wildcards); returns the removed rows in scan order
    pub fn remove_filtered(&mut self, field_index: usize, values: &[String]) -> Vec<PolicyValues> {
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.rows)
            .into_iter()
            .partition(|r| r.matches_filter(field_index, values));
        self.rows = kept;
        for row in &removed {
            self.index.remove(row);
        }
        removed
    }

    /// Replace `old` with `new` in place; false if `old` is missing or `new` exists
    pub fn replace(&mut self, old: &PolicyValues, new: PolicyValues) -> bool {
        if !self.index.contains(old) || (old != &new && self.index.contains(&new)) {
            return false;
        }
        if let Some(slot) = self.rows.iter_mut().find(|r| *r == old) {
            self.index.remove(old);
            self.index.insert(new.clone());
            *slot = new;
            return true;
        }
        false
    }

    /// Replace pairwise, all or nothing
    pub fn replace_all(&mut self, old: &[PolicyValues], new: &[PolicyValues]) -> bool {
        if old.len() != new.len() {
            return false;
        }
        let snapshot = self.clone();
        for (o, n) in old.iter().zip(new) {
            if !self.replace(o, n.clone()) {
                *self = snapshot;
                return false;
            }
        }
        true
    }

    /// Rows matching a field filter, in scan order
    pub fn filtered(&self, field_index: usize, values: &[String]) -> Vec<PolicyValues> {
        self.rows
            .iter()
            .filter(|r| r.matches_filter(field_index, values))
            .cloned()
            .collect()
    }

    /// Distinct values of one column, in first-seen order
    pub fn values_for_field(&self, field_index: usize) -> Vec<String> {
        let mut seen = AHashSet::new();
        self.rows
            .iter()
            .filter_map(|r| r.get(field_index))
            .filter(|v| seen.insert(v.as_str()))
            .cloned()
            .collect()
    }

    /// Reorder rows by a precomputed key, keeping ties in their current order
    pub(crate) fn sort_by_key<K: Ord>(&mut self, mut key: impl FnMut(&PolicyValues) -> K) {
        self.rows.sort_by_cached_key(|r| key(r));
    }

    pub fn clear(&mut self) {
        self.rows.clear();
        self.index.clear();
    }
}

impl<'a> IntoIterator for &'a PolicyStore {
    type Item = &'a PolicyValues;
    type IntoIter = std::slice::Iter<'a, PolicyValues>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(fields: &[&str]) -> PolicyValues {
        PolicyValues::from(fields)
    }

    #[test]
    fn test_insert_rejects_duplicates() {
        let mut store = PolicyStore::new();
        assert!(store.insert(row(&["alice", "data1", "read"])));
        assert!(!store.insert(row(&["alice", "data1", "read"])));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_insert_all_is_atomic() {
        let mut store = PolicyStore::new();
        store.insert(row(&["a", "1"]));
        assert!(!store.insert_all(&[row(&["b", "2"]), row(&["a", "1"])]));
        assert_eq!(store.len(), 1);
        assert!(!store.insert_all(&[row(&["c", "3"]), row(&["c", "3"])]));
        assert_eq!(store.len(), 1);
        assert!(store.insert_all(&[row(&["b", "2"]), row(&["c", "3"])]));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_add_then_remove_restores_state() {
        let mut store = PolicyStore::new();
        store.insert(row(&["a", "1"]));
        let before = store.rows().to_vec();
        store.insert(row(&["b", "2"]));
        assert!(store.remove(&row(&["b", "2"])));
        assert_eq!(store.rows(), &before[..]);
        assert!(!store.remove(&row(&["b", "2"])));
    }

    #[test]
    fn test_remove_all_is_atomic() {
        let mut store = PolicyStore::new();
        store.insert_all(&[row(&["a"]), row(&["b"])]);
        assert!(!store.remove_all(&[row(&["a"]), row(&["z"])]));
        assert_eq!(store.len(), 2);
        assert!(store.remove_all(&[row(&["a"]), row(&["b"])]));
        assert!(store.is_empty());
    }

    #[test]
    fn test_remove_filtered() {
        let mut store = PolicyStore::new();
        store.insert_all(&[
            row(&["alice", "data1", "read"]),
            row(&["alice", "data2", "write"]),
            row(&["bob", "data1", "read"]),
        ]);
        let removed = store.remove_filtered(1, &["data1".to_string()]);
        assert_eq!(removed.len(), 2);
        assert_eq!(store.rows(), &[row(&["alice", "data2", "write"])]);
        assert!(!store.contains(&row(&["bob", "data1", "read"])));
    }

    #[test]
    fn test_replace_keeps_position() {
        let mut store = PolicyStore::new();
        store.insert_all(&[row(&["a"]), row(&["b"]), row(&["c"])]);
        assert!(store.replace(&row(&["b"]), row(&["x"])));
        assert_eq!(store.rows(), &[row(&["a"]), row(&["x"]), row(&["c"])]);
        assert!(!store.replace(&row(&["b"]), row(&["y"])));
        assert!(!store.replace(&row(&["a"]), row(&["c"])));

        assert!(!store.replace_all(&[row(&["a"]), row(&["nope"])], &[row(&["1"]), row(&["2"])]));
        assert_eq!(store.rows(), &[row(&["a"]), row(&["x"]), row(&["c"])]);
    }

    #[test]
    fn test_values_for_field() {
        let mut store = PolicyStore::new();
        store.insert_all(&[row(&["alice", "d1"]), row(&["bob", "d1"]), row(&["alice", "d2"])]);
        assert_eq!(store.values_for_field(0), vec!["alice", "bob"]);
        assert_eq!(store.values_for_field(1), vec!["d1", "d2"]);
    }

    #[test]
    fn test_sort_is_stable() {
        let mut store = PolicyStore::new();
        store.insert_all(&[row(&["b", "2"]), row(&["a", "1"]), row(&["c", "1"])]);
        store.sort_by_key(|r| r.field(1).to_string());
        assert_eq!(store.rows(), &[row(&["a", "1"]), row(&["c", "1"]), row(&["b", "2"])]);
    }
}

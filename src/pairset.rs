//! Bidirectional filename ↔ key index.
//!
//! Two ordered maps wrapped behind an invariant-preserving surface: every
//! `(filename, key)` pair present in one direction is present in the other.
//! Used to answer "which files know this key?" during justification, which
//! is what makes a key *reserved* for everyone but its first bearer.

use indexmap::{IndexMap, IndexSet};

#[derive(Debug, Default)]
pub struct PairSet {
    by_file: IndexMap<String, IndexSet<String>>,
    by_key: IndexMap<String, IndexSet<String>>,
}

impl PairSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, filename: &str, key: &str) {
        self.by_file
            .entry(filename.to_string())
            .or_default()
            .insert(key.to_string());
        self.by_key
            .entry(key.to_string())
            .or_default()
            .insert(filename.to_string());
    }

    /// Remove every pair involving `filename`.
    pub fn remove_file(&mut self, filename: &str) {
        let Some(keys) = self.by_file.shift_remove(filename) else {
            return;
        };
        for key in keys {
            if let Some(files) = self.by_key.get_mut(&key) {
                files.shift_remove(filename);
                if files.is_empty() {
                    self.by_key.shift_remove(&key);
                }
            }
        }
    }

    /// Replace `filename`'s pairs with exactly `keys`.
    pub fn set_file_keys<'a>(&mut self, filename: &str, keys: impl IntoIterator<Item = &'a str>) {
        self.remove_file(filename);
        for key in keys {
            self.insert(filename, key);
        }
    }

    /// Filenames that currently know `key`, in insertion order.
    pub fn filenames(&self, key: &str) -> impl Iterator<Item = &str> {
        self.by_key
            .get(key)
            .into_iter()
            .flat_map(|files| files.iter().map(String::as_str))
    }

    /// Whether `key` is reserved against `current`: a key that several files
    /// know belongs to its first bearer (insertion order), and is reserved
    /// for everyone else.
    pub fn is_reserved(&self, key: &str, current: &str) -> bool {
        match self.filenames(key).next() {
            Some(first) => first != current,
            None => false,
        }
    }

    pub fn keys_of(&self, filename: &str) -> impl Iterator<Item = &str> {
        self.by_file
            .get(filename)
            .into_iter()
            .flat_map(|keys| keys.iter().map(String::as_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_lookup() {
        let mut set = PairSet::new();
        set.insert("/p/a.html", "app.a.t0");
        set.insert("/p/b.html", "app.a.t0");
        set.insert("/p/a.html", "app.a.t1");

        let files: Vec<&str> = set.filenames("app.a.t0").collect();
        assert_eq!(files, vec!["/p/a.html", "/p/b.html"]);
        let keys: Vec<&str> = set.keys_of("/p/a.html").collect();
        assert_eq!(keys, vec!["app.a.t0", "app.a.t1"]);
    }

    #[test]
    fn test_remove_file_clears_both_sides() {
        let mut set = PairSet::new();
        set.insert("/p/a.html", "k1");
        set.insert("/p/a.html", "k2");
        set.insert("/p/b.html", "k1");

        set.remove_file("/p/a.html");

        assert_eq!(set.keys_of("/p/a.html").count(), 0);
        let files: Vec<&str> = set.filenames("k1").collect();
        assert_eq!(files, vec!["/p/b.html"]);
        assert_eq!(set.filenames("k2").count(), 0);
    }

    #[test]
    fn test_set_file_keys_replaces() {
        let mut set = PairSet::new();
        set.insert("/p/a.html", "old");
        set.set_file_keys("/p/a.html", ["new1", "new2"]);

        assert_eq!(set.filenames("old").count(), 0);
        let keys: Vec<&str> = set.keys_of("/p/a.html").collect();
        assert_eq!(keys, vec!["new1", "new2"]);
    }

    #[test]
    fn test_is_reserved() {
        let mut set = PairSet::new();
        set.insert("/p/a.html", "shared");
        assert!(!set.is_reserved("shared", "/p/a.html"));
        assert!(set.is_reserved("shared", "/p/b.html"));
        assert!(!set.is_reserved("unknown", "/p/b.html"));
    }

    #[test]
    fn test_is_reserved_for_all_but_first_bearer() {
        let mut set = PairSet::new();
        set.insert("/p/a.html", "shared");
        set.insert("/p/b.html", "shared");
        // The first bearer keeps the key; every later bearer is renamed.
        assert!(!set.is_reserved("shared", "/p/a.html"));
        assert!(set.is_reserved("shared", "/p/b.html"));
    }

    #[test]
    fn test_duplicate_insert_is_idempotent() {
        let mut set = PairSet::new();
        set.insert("/p/a.html", "k");
        set.insert("/p/a.html", "k");
        assert_eq!(set.filenames("k").count(), 1);
        assert_eq!(set.keys_of("/p/a.html").count(), 1);
    }
}

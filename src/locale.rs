//! Nested locale trees: `{segment: "leaf" | subtree}` addressed by dotted
//! keys.
//!
//! Insertion is conflict-safe: a segment can never be both a leaf and a
//! subtree, and existing entries are never overwritten. Compilation turns a
//! failed insertion into a `DuplicateKey` diagnostic; merging external trees
//! reports `DuplicateKeyOrPath` at the offending path.

use indexmap::IndexMap;
use serde_json::Value;

use crate::diagnostics::{Diagnostics, DuplicateKeyOrPath};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocaleValue {
    Leaf(String),
    Tree(LocaleTree),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocaleTree {
    entries: IndexMap<String, LocaleValue>,
}

/// The dotted path at which an insertion collided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collision {
    pub path: String,
}

impl LocaleTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &LocaleValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Insert `content` at the dotted `key` path, creating intermediate
    /// subtrees. Fails if any prefix of the path is already a leaf or the
    /// final segment already exists.
    pub fn set(&mut self, key: &str, content: &str) -> Result<(), Collision> {
        let segments: Vec<&str> = key.split('.').collect();
        let mut node = self;
        for (idx, segment) in segments.iter().enumerate() {
            let last = idx == segments.len() - 1;
            let path = || segments[..=idx].join(".");
            if last {
                if node.entries.contains_key(*segment) {
                    return Err(Collision { path: path() });
                }
                node.entries
                    .insert(segment.to_string(), LocaleValue::Leaf(content.to_string()));
                return Ok(());
            }
            let entry = node
                .entries
                .entry(segment.to_string())
                .or_insert_with(|| LocaleValue::Tree(LocaleTree::new()));
            match entry {
                LocaleValue::Tree(tree) => node = tree,
                LocaleValue::Leaf(_) => return Err(Collision { path: path() }),
            }
        }
        Ok(())
    }

    /// Insert a pre-built value at a single segment; fails if the segment
    /// already exists.
    pub fn set_segment(&mut self, segment: &str, value: LocaleValue) -> Result<(), Collision> {
        if self.entries.contains_key(segment) {
            return Err(Collision {
                path: segment.to_string(),
            });
        }
        self.entries.insert(segment.to_string(), value);
        Ok(())
    }

    /// Look up the leaf at a dotted path.
    pub fn get(&self, key: &str) -> Option<&str> {
        let mut node = self;
        let mut segments = key.split('.').peekable();
        while let Some(segment) = segments.next() {
            match node.entries.get(segment)? {
                LocaleValue::Leaf(s) if segments.peek().is_none() => return Some(s),
                LocaleValue::Tree(tree) if segments.peek().is_some() => node = tree,
                _ => return None,
            }
        }
        None
    }

    /// Deep-merge `source` into `self`, reporting a `DuplicateKeyOrPath`
    /// diagnostic for each collision (leaf vs leaf, or leaf vs subtree).
    pub fn merge_from(&mut self, source: &LocaleTree, filename: &str, diagnostics: &mut Diagnostics) {
        self.merge_at(source, filename, "", diagnostics);
    }

    fn merge_at(
        &mut self,
        source: &LocaleTree,
        filename: &str,
        path: &str,
        diagnostics: &mut Diagnostics,
    ) {
        for (segment, value) in &source.entries {
            let child_path = if path.is_empty() {
                segment.clone()
            } else {
                format!("{}.{}", path, segment)
            };
            match (self.entries.get_mut(segment), value) {
                (None, _) => {
                    self.entries.insert(segment.clone(), value.clone());
                }
                (Some(LocaleValue::Tree(target)), LocaleValue::Tree(subtree)) => {
                    target.merge_at(subtree, filename, &child_path, diagnostics);
                }
                _ => {
                    diagnostics.report(DuplicateKeyOrPath {
                        filename: filename.to_string(),
                        path: child_path,
                    });
                }
            }
        }
    }

    pub fn to_json_value(&self) -> Value {
        let mut map = serde_json::Map::new();
        for (segment, value) in &self.entries {
            let child = match value {
                LocaleValue::Leaf(s) => Value::String(s.clone()),
                LocaleValue::Tree(tree) => tree.to_json_value(),
            };
            map.insert(segment.clone(), child);
        }
        Value::Object(map)
    }

    /// Minified JSON rendering, used for compiled locale output.
    pub fn to_minified_json(&self) -> String {
        self.to_json_value().to_string()
    }
}

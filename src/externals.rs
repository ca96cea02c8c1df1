//! External locale trees shipped by third-party packages.
//!
//! Packages can nest each other, so the same locale file may appear several
//! times under different `node_modules` depths; only the deepest copy (the
//! one the package manager actually resolved) is kept per path tail.

use indexmap::IndexMap;
use serde_json::Value;

use crate::diagnostics::{Diagnostics, InvalidJsonData};
use crate::locale::{LocaleTree, LocaleValue};

/// Parse a locale-tree JSON file. Non-string leaves are reported and
/// skipped; an unparsable file yields an empty tree.
pub fn parse_locale_tree(filename: &str, text: &str, diagnostics: &mut Diagnostics) -> LocaleTree {
    let Ok(value) = serde_json::from_str::<Value>(text) else {
        diagnostics.report(InvalidJsonData {
            filename: filename.to_string(),
            path: String::new(),
        });
        return LocaleTree::new();
    };
    let mut path = Vec::new();
    match to_tree(&value, filename, &mut path, diagnostics) {
        Some(tree) => tree,
        None => LocaleTree::new(),
    }
}

fn to_tree(
    value: &Value,
    filename: &str,
    path: &mut Vec<String>,
    diagnostics: &mut Diagnostics,
) -> Option<LocaleTree> {
    let Value::Object(map) = value else {
        diagnostics.report(InvalidJsonData {
            filename: filename.to_string(),
            path: path.join("."),
        });
        return None;
    };
    let mut tree = LocaleTree::new();
    for (segment, child) in map {
        path.push(segment.clone());
        match child {
            Value::String(content) => {
                // Collisions cannot happen inside one well-formed JSON
                // object, so set never fails here.
                let _ = tree.set_segment(segment, LocaleValue::Leaf(content.clone()));
            }
            other => {
                if let Some(subtree) = to_tree(other, filename, path, diagnostics) {
                    let _ = tree.set_segment(segment, LocaleValue::Tree(subtree));
                }
            }
        }
        path.pop();
    }
    Some(tree)
}

/// Deduplicate locale files resolved through nested `node_modules` trees.
///
/// Files are keyed by their path tail after the last `node_modules/`
/// segment; for each tail the longest absolute path wins.
pub fn deduplicate_module_filenames(filenames: Vec<String>) -> Vec<String> {
    let mut by_tail: IndexMap<String, String> = IndexMap::new();
    for filename in filenames {
        let tail = match filename.rfind("node_modules/") {
            Some(idx) => filename[idx + "node_modules/".len()..].to_string(),
            None => filename.clone(),
        };
        match by_tail.get(&tail) {
            Some(existing) if existing.len() >= filename.len() => {}
            _ => {
                by_tail.insert(tail, filename);
            }
        }
    }
    by_tail.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{DiagnosticCode, DiagnosticReport};

    #[test]
    fn test_parse_locale_tree() {
        let (mut diagnostics, buffer) = Diagnostics::buffered();
        let tree = parse_locale_tree(
            "/p/node_modules/lib/de.json",
            r#"{ "lib": { "ok": "OK", "cancel": "Abbrechen" } }"#,
            &mut diagnostics,
        );
        assert!(buffer.borrow().is_empty());
        assert_eq!(tree.get("lib.ok"), Some("OK"));
        assert_eq!(tree.get("lib.cancel"), Some("Abbrechen"));
    }

    #[test]
    fn test_parse_locale_tree_reports_bad_leaf() {
        let (mut diagnostics, buffer) = Diagnostics::buffered();
        let tree = parse_locale_tree(
            "/p/de.json",
            r#"{ "lib": { "count": 4, "ok": "OK" } }"#,
            &mut diagnostics,
        );
        assert_eq!(tree.get("lib.ok"), Some("OK"));
        let collected = buffer.borrow();
        assert_eq!(collected.len(), 1);
        assert_eq!(collected[0].code(), DiagnosticCode::InvalidJsonData);
    }

    #[test]
    fn test_parse_locale_tree_unparsable() {
        let (mut diagnostics, buffer) = Diagnostics::buffered();
        let tree = parse_locale_tree("/p/de.json", "nope", &mut diagnostics);
        assert!(tree.is_empty());
        assert_eq!(buffer.borrow().len(), 1);
    }

    #[test]
    fn test_deduplicate_keeps_deepest() {
        let files = vec![
            "/p/node_modules/ui/locale/de.json".to_string(),
            "/p/node_modules/app/node_modules/ui/locale/de.json".to_string(),
            "/p/node_modules/other/de.json".to_string(),
        ];
        let deduped = deduplicate_module_filenames(files);
        assert_eq!(
            deduped,
            vec![
                "/p/node_modules/app/node_modules/ui/locale/de.json".to_string(),
                "/p/node_modules/other/de.json".to_string(),
            ]
        );
    }

    #[test]
    fn test_deduplicate_ignores_paths_outside_node_modules() {
        let files = vec!["/p/a/de.json".to_string(), "/p/b/de.json".to_string()];
        let deduped = deduplicate_module_filenames(files.clone());
        assert_eq!(deduped, files);
    }
}

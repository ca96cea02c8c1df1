//! JSON-resource sources: nested string maps extracted into prefixed keys.
//!
//! `{"menu": {"open": "Open"}}` in `src/labels.json` yields
//! `app.labels.menu.open → "Open"`. Resource files never take part in
//! justification; their keys are fully determined by path and structure.

use indexmap::IndexMap;
use serde_json::Value;

use crate::diagnostics::{Diagnostics, InvalidJsonData, InvalidJsonPartName};

#[derive(Debug)]
pub struct JsonResourceSource {
    filename: String,
    text: String,
    value: Option<Value>,
}

impl JsonResourceSource {
    pub fn parse(filename: &str, text: String) -> Self {
        let value = serde_json::from_str(&text).ok();
        Self {
            filename: filename.to_string(),
            text,
            value,
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn update(&mut self, text: String) -> bool {
        if text == self.text {
            return false;
        }
        self.value = serde_json::from_str(&text).ok();
        self.text = text;
        true
    }

    pub fn extract_keys(
        &self,
        prefix: &str,
        diagnostics: &mut Diagnostics,
    ) -> IndexMap<String, String> {
        let mut out = IndexMap::new();
        let Some(value) = &self.value else {
            diagnostics.report(InvalidJsonData {
                filename: self.filename.clone(),
                path: String::new(),
            });
            return out;
        };
        let mut path = Vec::new();
        self.walk(value, prefix, &mut path, &mut out, diagnostics);
        out
    }

    fn walk(
        &self,
        value: &Value,
        prefix: &str,
        path: &mut Vec<String>,
        out: &mut IndexMap<String, String>,
        diagnostics: &mut Diagnostics,
    ) {
        let Value::Object(map) = value else {
            diagnostics.report(InvalidJsonData {
                filename: self.filename.clone(),
                path: path.join("."),
            });
            return;
        };
        for (part, child) in map {
            if part.contains('.') {
                diagnostics.report(InvalidJsonPartName {
                    filename: self.filename.clone(),
                    part: part.clone(),
                    path: path.join("."),
                });
                continue;
            }
            path.push(part.clone());
            match child {
                Value::String(content) => {
                    out.insert(format!("{}{}", prefix, path.join(".")), content.clone());
                }
                other => self.walk(other, prefix, path, out, diagnostics),
            }
            path.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{Diagnostic, DiagnosticCode, DiagnosticReport};

    fn extract(json: &str) -> (IndexMap<String, String>, Vec<Diagnostic>) {
        let source = JsonResourceSource::parse("/project/src/labels.json", json.to_string());
        let (mut diagnostics, buffer) = Diagnostics::buffered();
        let keys = source.extract_keys("app.labels.", &mut diagnostics);
        let collected = buffer.borrow().clone();
        (keys, collected)
    }

    #[test]
    fn test_extract_nested_strings() {
        let (keys, diagnostics) =
            extract(r#"{ "menu": { "open": "Open", "close": "Close" }, "top": "Top" }"#);
        assert!(diagnostics.is_empty());
        assert_eq!(keys["app.labels.menu.open"], "Open");
        assert_eq!(keys["app.labels.menu.close"], "Close");
        assert_eq!(keys["app.labels.top"], "Top");
    }

    #[test]
    fn test_non_object_root() {
        let (keys, diagnostics) = extract(r#"["array"]"#);
        assert!(keys.is_empty());
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code(), DiagnosticCode::InvalidJsonData);
    }

    #[test]
    fn test_non_object_leaf_reports_path() {
        let (keys, diagnostics) = extract(r#"{ "menu": { "count": 3, "open": "Open" } }"#);
        assert_eq!(keys.len(), 1);
        match &diagnostics[0] {
            Diagnostic::InvalidJsonData(d) => assert_eq!(d.path, "menu.count"),
            other => panic!("unexpected diagnostic {:?}", other),
        }
    }

    #[test]
    fn test_dotted_part_name_rejected() {
        let (keys, diagnostics) = extract(r#"{ "menu": { "a.b": "x", "ok": "y" } }"#);
        assert_eq!(keys.len(), 1);
        assert!(keys.contains_key("app.labels.menu.ok"));
        match &diagnostics[0] {
            Diagnostic::InvalidJsonPartName(d) => {
                assert_eq!(d.part, "a.b");
                assert_eq!(d.path, "menu");
            }
            other => panic!("unexpected diagnostic {:?}", other),
        }
    }

    #[test]
    fn test_unparsable_json_reports_root() {
        let (keys, diagnostics) = extract("{ not json");
        assert!(keys.is_empty());
        assert_eq!(diagnostics[0].code(), DiagnosticCode::InvalidJsonData);
    }

    #[test]
    fn test_update_reparses() {
        let mut source =
            JsonResourceSource::parse("/p/a.json", r#"{ "a": "1" }"#.to_string());
        assert!(source.update(r#"{ "a": "2" }"#.to_string()));
        let (mut diagnostics, _) = Diagnostics::buffered();
        let keys = source.extract_keys("p.", &mut diagnostics);
        assert_eq!(keys["p.a"], "2");
    }
}

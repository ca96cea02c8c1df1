//! The `t`-attribute mini-language.
//!
//! Syntax: `[name1,name2]key;[name3]key2;bareKey` — each group binds one key
//! to one or more targets. A bare key binds the `text` target. Names are
//! case-insensitive and whitespace around delimiters is tolerated.
//!
//! Targets `text` and `html` are mutually exclusive: binding one evicts the
//! other.

use std::fmt;

use indexmap::IndexMap;

pub const TARGET_TEXT: &str = "text";
pub const TARGET_HTML: &str = "html";

/// Insertion-ordered mapping from target name to key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TAttribute {
    bindings: IndexMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TAttributeError {
    pub message: String,
}

impl fmt::Display for TAttributeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

fn error(message: impl Into<String>) -> TAttributeError {
    TAttributeError {
        message: message.into(),
    }
}

fn is_valid_word(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

impl TAttribute {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(value: &str) -> Result<Self, TAttributeError> {
        let mut attr = TAttribute::new();
        for group in value.split(';') {
            let group = group.trim();
            if group.is_empty() {
                return Err(error("empty binding group"));
            }
            let (names, key) = if let Some(rest) = group.strip_prefix('[') {
                let Some(close) = rest.find(']') else {
                    return Err(error("missing ']' after target names"));
                };
                let names: Vec<String> = rest[..close]
                    .split(',')
                    .map(|n| n.trim().to_ascii_lowercase())
                    .collect();
                (names, rest[close + 1..].trim())
            } else {
                (vec![TARGET_TEXT.to_string()], group)
            };

            if !is_valid_word(key) {
                return Err(error(format!("invalid key \"{}\"", key)));
            }
            for name in names {
                if !is_valid_word(&name) {
                    return Err(error(format!("invalid target name \"{}\"", name)));
                }
                if attr.bindings.contains_key(&name) {
                    return Err(error(format!("duplicate target \"{}\"", name)));
                }
                attr.set(&name, key);
            }
        }
        Ok(attr)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.bindings.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Bind `name` to `key`. Binding `text` removes `html` and vice versa.
    pub fn set(&mut self, name: &str, key: &str) {
        let name = name.to_ascii_lowercase();
        match name.as_str() {
            TARGET_TEXT => {
                self.bindings.shift_remove(TARGET_HTML);
            }
            TARGET_HTML => {
                self.bindings.shift_remove(TARGET_TEXT);
            }
            _ => {}
        }
        self.bindings.insert(name, key.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.bindings.iter().map(|(n, k)| (n.as_str(), k.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.bindings.values().map(String::as_str)
    }
}

impl fmt::Display for TAttribute {
    /// Render groups by key in first-binding order; a group that is exactly
    /// the `text` target renders as the bare key.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut groups: IndexMap<&str, Vec<&str>> = IndexMap::new();
        for (name, key) in &self.bindings {
            groups.entry(key.as_str()).or_default().push(name.as_str());
        }
        let mut first = true;
        for (key, names) in groups {
            if !first {
                f.write_str(";")?;
            }
            first = false;
            if names == [TARGET_TEXT] {
                f.write_str(key)?;
            } else {
                write!(f, "[{}]{}", names.join(","), key)?;
            }
        }
        Ok(())
    }
}

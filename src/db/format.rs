//! On-disk format of the translation database.
//!
//! Version 2 is the canonical shape:
//!
//! ```json
//! {
//!     "version": 2,
//!     "files": { "src/x.html": { "content": { "key": { ... } } } },
//!     "obsolete": [ { "content": "...", "translations": { "de": "..." } } ]
//! }
//! ```
//!
//! Version 1 is the `files` object directly at the root; it is accepted on
//! load and upgraded on the next write. Writing never goes through a
//! language-default serializer: the printer below fixes the root key order,
//! sorts file, key and locale maps, indents with tabs, uses LF and emits no
//! trailing newline, so equal databases always produce identical bytes.

use std::collections::HashSet;
use std::path::{Component, Path};

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use indexmap::IndexMap;
use serde_json::Value;

use super::data::{
    FileRecord, ObsoleteEntry, TranslationData, TranslationEntry, TranslationSet,
};

pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Epoch milliseconds → full ISO-8601 UTC string (`2023-01-01T00:00:00.000Z`).
pub fn format_timestamp(ms: i64) -> String {
    Utc.timestamp_millis_opt(ms)
        .single()
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| "1970-01-01T00:00:00.000Z".to_string())
}

pub fn parse_timestamp(text: &str) -> Result<i64> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.timestamp_millis())
        .with_context(|| format!("invalid lastModified timestamp \"{}\"", text))
}

// ============================================================
// Parsing
// ============================================================

pub fn parse(json: &str, base_path: &Path) -> Result<TranslationData> {
    let root: Value = serde_json::from_str(json).context("translation data is not valid JSON")?;
    let Value::Object(root) = root else {
        bail!("translation data root must be an object");
    };

    let version_field = root.get("version").cloned();
    let (version, files_value, obsolete_value) = match version_field {
        Some(Value::Number(n)) if n.as_u64() == Some(2) => (
            2,
            root.get("files")
                .cloned()
                .unwrap_or(Value::Object(Default::default())),
            root.get("obsolete").cloned(),
        ),
        Some(other) => bail!("unsupported translation data version: {}", other),
        None => (1, Value::Object(root), None),
    };

    let Value::Object(files_map) = files_value else {
        bail!("'files' must be an object");
    };

    let mut files = IndexMap::new();
    for (relpath, record_value) in files_map {
        if Path::new(&relpath).is_absolute() || relpath.starts_with('/') {
            bail!("translation data filenames must be relative: \"{}\"", relpath);
        }
        let absolute = join_relative(base_path, &relpath);
        let record = parse_file_record(&record_value)
            .with_context(|| format!("in file record \"{}\"", relpath))?;
        files.insert(absolute, record);
    }

    let mut obsolete = Vec::new();
    if let Some(value) = obsolete_value {
        let Value::Array(entries) = value else {
            bail!("'obsolete' must be an array");
        };
        for entry in entries {
            obsolete.push(parse_obsolete_entry(&entry)?);
        }
    }

    Ok(TranslationData {
        files,
        obsolete,
        parsed_version: version,
        // A v1 database upgrades to v2 on the next write.
        modified: version == 1,
    })
}

fn parse_file_record(value: &Value) -> Result<FileRecord> {
    let content = value
        .get("content")
        .and_then(Value::as_object)
        .ok_or_else(|| anyhow!("file record must have a 'content' object"))?;
    let mut record = FileRecord::default();
    for (key, set_value) in content {
        let set =
            parse_translation_set(set_value).with_context(|| format!("in key \"{}\"", key))?;
        record.content.insert(key.clone(), set);
    }
    Ok(record)
}

fn parse_translation_set(value: &Value) -> Result<TranslationSet> {
    let source = parse_entry(value)?;
    let mut set = TranslationSet::new(source);
    if let Some(translations) = value.get("translations") {
        let Value::Object(map) = translations else {
            bail!("'translations' must be an object");
        };
        for (locale, entry_value) in map {
            let entry = parse_entry(entry_value)
                .with_context(|| format!("in locale \"{}\"", locale))?;
            set.translations.insert(locale.clone(), entry);
        }
    }
    Ok(set)
}

fn parse_entry(value: &Value) -> Result<TranslationEntry> {
    let content = value
        .get("content")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("'content' must be a string"))?;
    let last_modified = value
        .get("lastModified")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("'lastModified' must be an ISO-8601 string"))?;
    let mut entry = TranslationEntry::new(content, parse_timestamp(last_modified)?);
    if let Some(spelling) = value.get("ignoreSpelling") {
        let Value::Array(items) = spelling else {
            bail!("'ignoreSpelling' must be an array of strings");
        };
        for item in items {
            let Value::String(word) = item else {
                bail!("'ignoreSpelling' must be an array of strings");
            };
            entry.ignore_spelling.push(word.clone());
        }
    }
    Ok(entry)
}

fn parse_obsolete_entry(value: &Value) -> Result<ObsoleteEntry> {
    let content = value
        .get("content")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("obsolete entry 'content' must be a string"))?;
    let mut translations = IndexMap::new();
    if let Some(Value::Object(map)) = value.get("translations") {
        for (locale, translated) in map {
            let Value::String(translated) = translated else {
                bail!("obsolete translations must be strings");
            };
            translations.insert(locale.clone(), translated.clone());
        }
    }
    Ok(ObsoleteEntry {
        content: content.to_string(),
        translations,
    })
}

/// Join a stored (forward-slash) relative filename onto the base directory.
fn join_relative(base: &Path, relpath: &str) -> String {
    let mut joined = base.to_path_buf();
    for part in relpath.split('/') {
        joined.push(part);
    }
    joined.to_string_lossy().to_string()
}

// ============================================================
// Formatting
// ============================================================

pub fn format_json(data: &TranslationData, base_path: &Path) -> String {
    let mut out = String::new();
    out.push_str("{\n\t\"version\": 2,\n\t\"files\": ");

    let mut files: Vec<(String, &FileRecord)> = data
        .files
        .iter()
        .map(|(abs, record)| (relative_path(base_path, Path::new(abs)), record))
        .collect();
    files.sort_by(|a, b| a.0.cmp(&b.0));

    if files.is_empty() {
        out.push_str("{}");
    } else {
        out.push_str("{\n");
        for (index, (relpath, record)) in files.iter().enumerate() {
            out.push_str("\t\t");
            out.push_str(&json_string(relpath));
            out.push_str(": {\n\t\t\t\"content\": ");
            write_record_content(&mut out, record);
            out.push_str("\n\t\t}");
            if index + 1 < files.len() {
                out.push(',');
            }
            out.push('\n');
        }
        out.push_str("\t}");
    }

    out.push_str(",\n\t\"obsolete\": ");
    write_obsolete(&mut out, &data.obsolete);
    out.push_str("\n}");
    out
}

fn write_record_content(out: &mut String, record: &FileRecord) {
    if record.content.is_empty() {
        out.push_str("{}");
        return;
    }
    let mut keys: Vec<&String> = record.content.keys().collect();
    keys.sort();

    out.push_str("{\n");
    for (index, key) in keys.iter().enumerate() {
        let set = &record.content[*key];
        out.push_str("\t\t\t\t");
        out.push_str(&json_string(key));
        out.push_str(": {\n");
        write_entry_fields(out, &set.source, 5);
        out.push_str(",\n\t\t\t\t\t\"translations\": ");
        write_translations(out, &set.translations);
        out.push_str("\n\t\t\t\t}");
        if index + 1 < keys.len() {
            out.push(',');
        }
        out.push('\n');
    }
    out.push_str("\t\t\t}");
}

fn write_translations(out: &mut String, translations: &IndexMap<String, TranslationEntry>) {
    if translations.is_empty() {
        out.push_str("{}");
        return;
    }
    let mut locales: Vec<&String> = translations.keys().collect();
    locales.sort();

    out.push_str("{\n");
    for (index, locale) in locales.iter().enumerate() {
        let entry = &translations[*locale];
        out.push_str("\t\t\t\t\t\t");
        out.push_str(&json_string(locale));
        out.push_str(": {\n");
        write_entry_fields(out, entry, 7);
        out.push_str("\n\t\t\t\t\t\t}");
        if index + 1 < locales.len() {
            out.push(',');
        }
        out.push('\n');
    }
    out.push_str("\t\t\t\t\t}");
}

fn write_entry_fields(out: &mut String, entry: &TranslationEntry, depth: usize) {
    let indent = "\t".repeat(depth);
    out.push_str(&indent);
    out.push_str("\"content\": ");
    out.push_str(&json_string(&entry.content));
    out.push_str(",\n");
    out.push_str(&indent);
    out.push_str("\"lastModified\": ");
    out.push_str(&json_string(&format_timestamp(entry.last_modified)));
    out.push_str(",\n");
    out.push_str(&indent);
    out.push_str("\"ignoreSpelling\": ");
    write_string_array(out, &entry.ignore_spelling);
}

fn write_string_array(out: &mut String, items: &[String]) {
    out.push('[');
    for (index, item) in items.iter().enumerate() {
        if index > 0 {
            out.push_str(", ");
        }
        out.push_str(&json_string(item));
    }
    out.push(']');
}

fn write_obsolete(out: &mut String, entries: &[ObsoleteEntry]) {
    // Exact duplicates collapse to a single occurrence on disk; the ledger in
    // memory keeps every append.
    let mut seen = HashSet::new();
    let mut rendered_entries = Vec::new();
    for entry in entries {
        let rendered = render_obsolete_entry(entry);
        if seen.insert(rendered.clone()) {
            rendered_entries.push(rendered);
        }
    }

    if rendered_entries.is_empty() {
        out.push_str("[]");
        return;
    }
    out.push_str("[\n");
    for (index, rendered) in rendered_entries.iter().enumerate() {
        out.push_str(rendered);
        if index + 1 < rendered_entries.len() {
            out.push(',');
        }
        out.push('\n');
    }
    out.push_str("\t]");
}

fn render_obsolete_entry(entry: &ObsoleteEntry) -> String {
    let mut out = String::new();
    out.push_str("\t\t{\n\t\t\t\"content\": ");
    out.push_str(&json_string(&entry.content));
    out.push_str(",\n\t\t\t\"translations\": ");
    if entry.translations.is_empty() {
        out.push_str("{}");
    } else {
        let mut locales: Vec<&String> = entry.translations.keys().collect();
        locales.sort();
        out.push_str("{\n");
        for (index, locale) in locales.iter().enumerate() {
            out.push_str("\t\t\t\t");
            out.push_str(&json_string(locale));
            out.push_str(": ");
            out.push_str(&json_string(&entry.translations[*locale]));
            if index + 1 < locales.len() {
                out.push(',');
            }
            out.push('\n');
        }
        out.push_str("\t\t\t}");
    }
    out.push_str("\n\t\t}");
    out
}

fn json_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Relative path from `base` to `target`, with forward slashes.
fn relative_path(base: &Path, target: &Path) -> String {
    let base_components: Vec<Component> = base.components().collect();
    let target_components: Vec<Component> = target.components().collect();
    let mut shared = 0;
    while shared < base_components.len()
        && shared < target_components.len()
        && base_components[shared] == target_components[shared]
    {
        shared += 1;
    }
    let mut parts: Vec<String> = vec!["..".to_string(); base_components.len() - shared];
    parts.extend(
        target_components[shared..]
            .iter()
            .map(|c| c.as_os_str().to_string_lossy().replace('\\', "/")),
    );
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TranslationData {
        let mut data = TranslationData::new();
        let mut extracted = IndexMap::new();
        extracted.insert("app.view.t1".to_string(), "second".to_string());
        extracted.insert("app.view.t0".to_string(), "first".to_string());
        data.update_keys("/project/src/view.html", &extracted, 1_700_000_000_000);
        data
    }

    #[test]
    fn test_timestamp_round_trip() {
        let ms = 1_700_000_000_123;
        let text = format_timestamp(ms);
        assert!(text.ends_with('Z'));
        assert_eq!(parse_timestamp(&text).unwrap(), ms);
    }

    #[test]
    fn test_timestamp_format_is_full_iso() {
        assert_eq!(format_timestamp(0), "1970-01-01T00:00:00.000Z");
    }

    #[test]
    fn test_relative_path() {
        assert_eq!(
            relative_path(Path::new("/project"), Path::new("/project/src/a.html")),
            "src/a.html"
        );
        assert_eq!(
            relative_path(Path::new("/project/sub"), Path::new("/project/src/a.html")),
            "../src/a.html"
        );
    }

    #[test]
    fn test_format_shape() {
        let data = sample();
        let json = format_json(&data, Path::new("/project"));

        assert!(json.starts_with("{\n\t\"version\": 2,\n\t\"files\": {"));
        assert!(json.ends_with("\n}"));
        assert!(!json.ends_with('\n'));
        assert!(!json.contains("  ")); // tabs only
        assert!(json.contains("\"src/view.html\""));
        // Keys are sorted even though t1 was inserted first.
        let t0 = json.find("app.view.t0").unwrap();
        let t1 = json.find("app.view.t1").unwrap();
        assert!(t0 < t1);
    }

    #[test]
    fn test_round_trip() {
        let data = sample();
        let base = Path::new("/project");
        let json = format_json(&data, base);
        let reparsed = parse(&json, base).unwrap();

        assert_eq!(reparsed.parsed_version(), 2);
        assert!(!reparsed.is_modified());
        assert_eq!(format_json(&reparsed, base), json);
        let record = reparsed.record("/project/src/view.html").unwrap();
        assert_eq!(record.content["app.view.t0"].source.content, "first");
        assert_eq!(
            record.content["app.view.t0"].source.last_modified,
            1_700_000_000_000
        );
    }

    #[test]
    fn test_deterministic_across_insertion_order() {
        let base = Path::new("/project");
        let mut first = TranslationData::new();
        let mut second = TranslationData::new();

        let mut a = IndexMap::new();
        a.insert("app.a.t0".to_string(), "x".to_string());
        let mut b = IndexMap::new();
        b.insert("app.b.t0".to_string(), "y".to_string());

        first.update_keys("/project/src/a.html", &a, 1000);
        first.update_keys("/project/src/b.html", &b, 1000);
        second.update_keys("/project/src/b.html", &b, 1000);
        second.update_keys("/project/src/a.html", &a, 1000);

        assert_eq!(format_json(&first, base), format_json(&second, base));
    }

    #[test]
    fn test_parse_v1_marks_modified() {
        let json = r#"{
            "src/x.html": {
                "content": {
                    "app.x.t0": {
                        "content": "hi",
                        "lastModified": "2023-01-01T00:00:00.000Z"
                    }
                }
            }
        }"#;
        let data = parse(json, Path::new("/project")).unwrap();
        assert_eq!(data.parsed_version(), 1);
        assert!(data.is_modified());
        let formatted = format_json(&data, Path::new("/project"));
        assert!(formatted.contains("\"version\": 2"));
        assert!(formatted.contains("\"obsolete\": []"));
    }

    #[test]
    fn test_parse_rejects_absolute_filenames() {
        let json = r#"{ "/abs/x.html": { "content": {} } }"#;
        assert!(parse(json, Path::new("/project")).is_err());
    }

    #[test]
    fn test_parse_rejects_bad_timestamp() {
        let json = r#"{
            "src/x.html": {
                "content": {
                    "k": { "content": "hi", "lastModified": "not-a-date" }
                }
            }
        }"#;
        assert!(parse(json, Path::new("/project")).is_err());
    }

    #[test]
    fn test_parse_rejects_bad_ignore_spelling() {
        let json = r#"{
            "src/x.html": {
                "content": {
                    "k": {
                        "content": "hi",
                        "lastModified": "2023-01-01T00:00:00.000Z",
                        "ignoreSpelling": [1, 2]
                    }
                }
            }
        }"#;
        assert!(parse(json, Path::new("/project")).is_err());
    }

    #[test]
    fn test_parse_rejects_unsupported_version() {
        let json = r#"{ "version": 3, "files": {} }"#;
        assert!(parse(json, Path::new("/project")).is_err());
    }

    #[test]
    fn test_parse_translations_and_spelling() {
        let json = r#"{
            "version": 2,
            "files": {
                "src/x.html": {
                    "content": {
                        "k": {
                            "content": "Hello",
                            "lastModified": "2023-01-01T00:00:00.000Z",
                            "ignoreSpelling": ["Foo"],
                            "translations": {
                                "de": {
                                    "content": "Hallo",
                                    "lastModified": "2023-02-01T00:00:00.000Z"
                                }
                            }
                        }
                    }
                }
            },
            "obsolete": []
        }"#;
        let data = parse(json, Path::new("/project")).unwrap();
        let set = &data.record("/project/src/x.html").unwrap().content["k"];
        assert_eq!(set.source.ignore_spelling, vec!["Foo"]);
        assert_eq!(set.translations["de"].content, "Hallo");
        assert!(set.translations["de"].last_modified > set.source.last_modified);
    }

    #[test]
    fn test_obsolete_deduplicated_on_disk_only() {
        let base = Path::new("/project");
        let mut data = TranslationData::new();
        for _ in 0..2 {
            data.obsolete.push(ObsoleteEntry {
                content: "bye".to_string(),
                translations: IndexMap::from([("de".to_string(), "tschüss".to_string())]),
            });
        }
        data.obsolete.push(ObsoleteEntry {
            content: "other".to_string(),
            translations: IndexMap::new(),
        });

        assert_eq!(data.obsolete().len(), 3);
        let json = format_json(&data, base);
        assert_eq!(json.matches("\"bye\"").count(), 1);
        let reparsed = parse(&json, base).unwrap();
        assert_eq!(reparsed.obsolete().len(), 2);
    }

    #[test]
    fn test_obsolete_dedup_considers_locale_order_canonical() {
        let base = Path::new("/project");
        let mut data = TranslationData::new();
        data.obsolete.push(ObsoleteEntry {
            content: "x".to_string(),
            translations: IndexMap::from([
                ("de".to_string(), "a".to_string()),
                ("fr".to_string(), "b".to_string()),
            ]),
        });
        data.obsolete.push(ObsoleteEntry {
            content: "x".to_string(),
            translations: IndexMap::from([
                ("fr".to_string(), "b".to_string()),
                ("de".to_string(), "a".to_string()),
            ]),
        });
        let json = format_json(&data, base);
        let reparsed = parse(&json, base).unwrap();
        assert_eq!(reparsed.obsolete().len(), 1);
    }

    #[test]
    fn test_json_string_escapes() {
        assert_eq!(json_string("a\"b\\c\nd"), "\"a\\\"b\\\\c\\nd\"");
        assert_eq!(json_string("\u{1}"), "\"\\u0001\"");
    }
}

//! In-memory translation database and its operations.
//!
//! The database mirrors the live source set: one record per file, one
//! translation set per key. A translation is *current* iff its
//! `last_modified` is at least the source's; compilation silently skips
//! anything older (reporting it as outdated). Translated sets that drop out
//! of the live database are appended to the obsolete ledger so no human work
//! is ever lost.

use indexmap::{IndexMap, IndexSet};

use crate::config::Options;
use crate::diagnostics::{
    Diagnostics, DuplicateKey, MissingTranslation, OutdatedTranslation, UnknownLocale,
};
use crate::locale::LocaleTree;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationEntry {
    pub content: String,
    /// Epoch milliseconds, UTC.
    pub last_modified: i64,
    pub ignore_spelling: Vec<String>,
}

impl TranslationEntry {
    pub fn new(content: impl Into<String>, last_modified: i64) -> Self {
        Self {
            content: content.into(),
            last_modified,
            ignore_spelling: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationSet {
    pub source: TranslationEntry,
    /// Locale id → translated entry.
    pub translations: IndexMap<String, TranslationEntry>,
}

impl TranslationSet {
    pub fn new(source: TranslationEntry) -> Self {
        Self {
            source,
            translations: IndexMap::new(),
        }
    }

    fn to_obsolete(&self) -> ObsoleteEntry {
        ObsoleteEntry {
            content: self.source.content.clone(),
            translations: self
                .translations
                .iter()
                .map(|(locale, entry)| (locale.clone(), entry.content.clone()))
                .collect(),
        }
    }
}

/// Translated content whose key no longer exists, retained for recovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObsoleteEntry {
    pub content: String,
    pub translations: IndexMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileRecord {
    pub content: IndexMap<String, TranslationSet>,
}

#[derive(Debug, Default)]
pub struct TranslationData {
    pub(crate) files: IndexMap<String, FileRecord>,
    pub(crate) obsolete: Vec<ObsoleteEntry>,
    pub(crate) parsed_version: u32,
    pub(crate) modified: bool,
}

impl TranslationData {
    pub fn new() -> Self {
        Self {
            files: IndexMap::new(),
            obsolete: Vec::new(),
            parsed_version: 2,
            modified: false,
        }
    }

    pub fn parsed_version(&self) -> u32 {
        self.parsed_version
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn clear_modified(&mut self) {
        self.modified = false;
    }

    pub fn files(&self) -> impl Iterator<Item = (&str, &FileRecord)> {
        self.files.iter().map(|(f, r)| (f.as_str(), r))
    }

    pub fn file_names(&self) -> Vec<String> {
        self.files.keys().cloned().collect()
    }

    pub fn record(&self, filename: &str) -> Option<&FileRecord> {
        self.files.get(filename)
    }

    pub fn obsolete(&self) -> &[ObsoleteEntry] {
        &self.obsolete
    }

    /// Every key known to the database, across all files.
    pub fn all_keys(&self) -> IndexSet<String> {
        self.files
            .values()
            .flat_map(|record| record.content.keys().cloned())
            .collect()
    }

    /// Align one file's record to an extraction result. New keys are added
    /// with `last_modified = now`; changed content bumps `last_modified`;
    /// keys missing from the extraction are removed (translated sets flow to
    /// the obsolete ledger). Returns whether anything changed.
    pub fn update_keys(
        &mut self,
        filename: &str,
        extracted: &IndexMap<String, String>,
        now: i64,
    ) -> bool {
        if !self.files.contains_key(filename) && extracted.is_empty() {
            return false;
        }
        let record = self.files.entry(filename.to_string()).or_default();
        let mut changed = false;

        for (key, content) in extracted {
            match record.content.get_mut(key) {
                None => {
                    record.content.insert(
                        key.clone(),
                        TranslationSet::new(TranslationEntry::new(content.clone(), now)),
                    );
                    changed = true;
                }
                Some(set) if set.source.content != *content => {
                    set.source.content = content.clone();
                    set.source.last_modified = now;
                    changed = true;
                }
                Some(_) => {}
            }
        }

        let removed: Vec<String> = record
            .content
            .keys()
            .filter(|key| !extracted.contains_key(*key))
            .cloned()
            .collect();
        for key in removed {
            if let Some(set) = record.content.shift_remove(&key) {
                if !set.translations.is_empty() {
                    self.obsolete.push(set.to_obsolete());
                }
                changed = true;
            }
        }

        if changed {
            self.modified = true;
        }
        changed
    }

    /// Carry translations from `old_key` to `new_key` in `filename`'s record.
    ///
    /// Prefers the file's own record; otherwise the first of `hints` holding
    /// `old_key` with at least one translation. The clone's source
    /// `last_modified` is set to `now`, so the carried translations read as
    /// outdated until re-verified. Returns whether a copy happened.
    pub fn copy_translations(
        &mut self,
        filename: &str,
        old_key: &str,
        new_key: &str,
        hints: &[String],
        now: i64,
    ) -> bool {
        let mut candidates: Vec<&str> = vec![filename];
        for hint in hints {
            if hint != filename {
                candidates.push(hint);
            }
        }

        let mut cloned = None;
        for candidate in candidates {
            if let Some(set) = self
                .files
                .get(candidate)
                .and_then(|record| record.content.get(old_key))
            {
                if !set.translations.is_empty() {
                    let mut copy = set.clone();
                    copy.source.last_modified = now;
                    cloned = Some(copy);
                    break;
                }
            }
        }

        let Some(copy) = cloned else {
            return false;
        };
        self.files
            .entry(filename.to_string())
            .or_default()
            .content
            .insert(new_key.to_string(), copy);
        self.modified = true;
        true
    }

    /// Remove a file record; translated sets flow to the obsolete ledger.
    pub fn delete_file(&mut self, filename: &str) -> bool {
        let Some(record) = self.files.shift_remove(filename) else {
            return false;
        };
        for set in record.content.values() {
            if !set.translations.is_empty() {
                self.obsolete.push(set.to_obsolete());
            }
        }
        self.modified = true;
        true
    }

    /// Build one locale tree per configured locale.
    ///
    /// Source strings go into the source locale; a translation is emitted
    /// iff it is current. Outdated, unknown-locale, and missing entries each
    /// produce their diagnostic.
    pub fn compile(
        &self,
        options: &Options,
        diagnostics: &mut Diagnostics,
    ) -> IndexMap<String, LocaleTree> {
        let mut trees: IndexMap<String, LocaleTree> = options
            .locales
            .iter()
            .map(|locale| (locale.clone(), LocaleTree::new()))
            .collect();

        for (filename, record) in &self.files {
            for (key, set) in &record.content {
                if let Some(tree) = trees.get_mut(&options.source_locale) {
                    if tree.set(key, &set.source.content).is_err() {
                        diagnostics.report(DuplicateKey {
                            filename: filename.clone(),
                            key: key.clone(),
                        });
                    }
                }
                for (locale, translation) in &set.translations {
                    match trees.get_mut(locale) {
                        None => diagnostics.report(UnknownLocale {
                            filename: filename.clone(),
                            key: key.clone(),
                            locale: locale.clone(),
                        }),
                        Some(tree)
                            if translation.last_modified >= set.source.last_modified =>
                        {
                            if tree.set(key, &translation.content).is_err() {
                                diagnostics.report(DuplicateKey {
                                    filename: filename.clone(),
                                    key: key.clone(),
                                });
                            }
                        }
                        Some(_) => diagnostics.report(OutdatedTranslation {
                            filename: filename.clone(),
                            key: key.clone(),
                            locale: locale.clone(),
                        }),
                    }
                }
            }
        }

        for locale in &options.locales {
            if locale == &options.source_locale {
                continue;
            }
            for (filename, record) in &self.files {
                for (key, set) in &record.content {
                    if !set.translations.contains_key(locale) {
                        diagnostics.report(MissingTranslation {
                            filename: filename.clone(),
                            key: key.clone(),
                            locale: locale.clone(),
                        });
                    }
                }
            }
        }

        trees
    }
}

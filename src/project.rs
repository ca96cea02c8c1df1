//! The project orchestrator: live sources, the reserved-key index, the
//! translation database and the external locales, driven through
//! extract → justify → reconcile → compile.
//!
//! Not re-entrant: exactly one `process_sources` / `handle_modified` /
//! `compile_locales` cycle runs at a time, and incremental updates apply in
//! arrival order. Which file "owns" an initially duplicated key is decided
//! by the insertion order of the unprocessed set (first wins; later bearers
//! are renamed).

use std::path::Path;

use anyhow::Result;
use indexmap::{IndexMap, IndexSet};

use crate::config::Options;
use crate::db::{self, TranslationData};
use crate::diagnostics::{Diagnostics, ModifiedSource, ModifiedTranslation};
use crate::externals;
use crate::locale::LocaleTree;
use crate::pairset::PairSet;
use crate::source::SourceFile;

/// Destinations for flushed changes. The filesystem implementation lives
/// with the CLI; tests record in memory.
pub trait WriteHooks {
    fn write_source(&mut self, filename: &str, text: &str) -> Result<()>;
    fn write_translation_data(&mut self, text: &str) -> Result<()>;
}

/// One entry of a watch batch, applied in arrival order.
#[derive(Debug, Clone)]
pub enum Update {
    Upsert { filename: String, text: String },
    Delete { filename: String },
}

pub struct Project {
    options: Options,
    development: bool,
    sources: IndexMap<String, SourceFile>,
    pair_set: PairSet,
    unprocessed: IndexSet<String>,
    modified_sources: IndexSet<String>,
    translation_data: TranslationData,
    /// Locale id → (filename → parsed tree).
    external_locales: IndexMap<String, IndexMap<String, LocaleTree>>,
    diagnostics: Diagnostics,
}

impl Project {
    pub fn new(options: Options, development: bool, diagnostics: Diagnostics) -> Self {
        Self {
            options,
            development,
            sources: IndexMap::new(),
            pair_set: PairSet::new(),
            unprocessed: IndexSet::new(),
            modified_sources: IndexSet::new(),
            translation_data: TranslationData::new(),
            external_locales: IndexMap::new(),
            diagnostics,
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Run a closure against the project's diagnostics bus.
    pub fn with_diagnostics<T>(&mut self, f: impl FnOnce(&mut Diagnostics) -> T) -> T {
        f(&mut self.diagnostics)
    }

    pub fn translation_data(&self) -> &TranslationData {
        &self.translation_data
    }

    pub fn set_translation_data(&mut self, data: TranslationData) {
        self.translation_data = data;
    }

    pub fn source_text(&self, filename: &str) -> Option<&str> {
        self.sources.get(filename).map(|s| s.text())
    }

    /// Install or replace a source. A source whose bytes did not change is a
    /// no-op; otherwise the file is marked unprocessed and its keys are
    /// eagerly extracted into the database so reservation sees them before
    /// any other file is justified.
    pub fn update_source(&mut self, filename: &str, text: String) -> Result<bool> {
        let changed = match self.sources.get_mut(filename) {
            Some(existing) => existing.update(text),
            None => match SourceFile::from_text(filename, text) {
                Some(source) => {
                    self.sources.insert(filename.to_string(), source);
                    true
                }
                None => return Ok(false),
            },
        };
        if !changed {
            return Ok(false);
        }

        let prefix = self.options.prefix_for(Path::new(filename))?;
        let Some(source) = self.sources.get(filename) else {
            return Ok(false);
        };
        let extracted = source.extract_keys(&prefix, &self.options, &mut self.diagnostics);
        self.translation_data
            .update_keys(filename, &extracted, db::now_ms());
        self.pair_set
            .set_file_keys(filename, extracted.keys().map(String::as_str));
        self.unprocessed.insert(filename.to_string());
        Ok(true)
    }

    pub fn delete_source(&mut self, filename: &str) {
        self.sources.shift_remove(filename);
        self.unprocessed.shift_remove(filename);
        self.modified_sources.shift_remove(filename);
        self.pair_set.remove_file(filename);
    }

    /// One reconciliation pass over the unprocessed files, in insertion
    /// order, followed by the database sweep.
    pub fn process_sources(&mut self) -> Result<()> {
        let now = db::now_ms();
        let mut known = self.translation_data.all_keys();
        let pending: Vec<String> = self.unprocessed.drain(..).collect();

        for filename in pending {
            let Project {
                sources,
                pair_set,
                diagnostics,
                options,
                translation_data,
                modified_sources,
                development,
                ..
            } = self;
            let Some(template) = sources.get_mut(&filename).and_then(|s| s.as_template_mut())
            else {
                continue;
            };

            let prefix = options.prefix_for(Path::new(&filename))?;
            let current = filename.clone();
            let reserved_index: &PairSet = pair_set;
            let reserved = move |key: &str| reserved_index.is_reserved(key, &current);
            let outcome = template.justify_keys(
                &prefix,
                options,
                &reserved,
                &mut known,
                !*development,
                diagnostics,
            );

            if outcome.modified {
                for (old_key, new_keys) in &outcome.replaced_keys {
                    let hints: Vec<String> =
                        pair_set.filenames(old_key).map(str::to_string).collect();
                    for new_key in new_keys {
                        translation_data.copy_translations(
                            &filename, old_key, new_key, &hints, now,
                        );
                    }
                }
                let extracted = template.extract_keys(options, diagnostics);
                translation_data.update_keys(&filename, &extracted, now);
                pair_set.set_file_keys(&filename, extracted.keys().map(String::as_str));
                modified_sources.insert(filename.clone());
            }
        }

        // Sweep: records whose source is gone or whose key set emptied are
        // deleted, flowing translated sets to the obsolete ledger.
        for filename in self.translation_data.file_names() {
            let gone = !self.sources.contains_key(&filename);
            let empty = self
                .translation_data
                .record(&filename)
                .map(|record| record.content.is_empty())
                .unwrap_or(false);
            if gone || empty {
                self.translation_data.delete_file(&filename);
                self.pair_set.remove_file(&filename);
            }
        }
        Ok(())
    }

    /// Flush pending modifications in development mode; report them as
    /// diagnostics otherwise. The modified sets are only cleared by a
    /// successful flush.
    pub fn handle_modified(&mut self, hooks: &mut dyn WriteHooks) -> Result<()> {
        if self.development {
            for filename in &self.modified_sources {
                let Some(source) = self.sources.get(filename) else {
                    continue;
                };
                hooks.write_source(filename, source.text())?;
            }
            if self.translation_data.is_modified() {
                let json = db::format_json(&self.translation_data, &self.options.base_dir);
                hooks.write_translation_data(&json)?;
                self.translation_data.clear_modified();
            }
            self.modified_sources.clear();
        } else {
            for filename in &self.modified_sources {
                self.diagnostics.report(ModifiedSource {
                    filename: filename.clone(),
                });
            }
            if self.translation_data.is_modified() {
                self.diagnostics.report(ModifiedTranslation);
            }
        }
        Ok(())
    }

    /// Compile per-locale trees from the database and merge the external
    /// locale trees in, cloning whole trees for locales the database does
    /// not carry.
    pub fn compile_locales(&mut self) -> IndexMap<String, LocaleTree> {
        let mut locales = self
            .translation_data
            .compile(&self.options, &mut self.diagnostics);
        for (locale, files) in &self.external_locales {
            for (filename, tree) in files {
                match locales.get_mut(locale) {
                    Some(target) => target.merge_from(tree, filename, &mut self.diagnostics),
                    None => {
                        locales.insert(locale.clone(), tree.clone());
                    }
                }
            }
        }
        locales
    }

    pub fn set_external_locale(&mut self, locale: &str, filename: &str, tree: LocaleTree) {
        self.external_locales
            .entry(locale.to_string())
            .or_default()
            .insert(filename.to_string(), tree);
    }

    /// The locale an already-known external file belongs to.
    pub fn external_locale_for(&self, filename: &str) -> Option<String> {
        self.external_locales
            .iter()
            .find(|(_, files)| files.contains_key(filename))
            .map(|(locale, _)| locale.clone())
    }

    pub fn remove_external_locale(&mut self, filename: &str) -> bool {
        let mut removed = false;
        for files in self.external_locales.values_mut() {
            removed |= files.shift_remove(filename).is_some();
        }
        removed
    }

    /// Apply one batch of filesystem updates in arrival order: the
    /// translation-data file reloads the database, known external locale
    /// files re-parse, and everything else flows through the source set.
    pub fn apply_updates(&mut self, updates: Vec<Update>) -> Result<()> {
        for update in updates {
            match update {
                Update::Upsert { filename, text } => {
                    if Path::new(&filename) == self.options.translation_data_path {
                        self.translation_data = db::parse(&text, &self.options.base_dir)?;
                    } else if let Some(locale) = self.external_locale_for(&filename) {
                        let tree =
                            externals::parse_locale_tree(&filename, &text, &mut self.diagnostics);
                        self.set_external_locale(&locale, &filename, tree);
                    } else {
                        self.update_source(&filename, text)?;
                    }
                }
                Update::Delete { filename } => {
                    if Path::new(&filename) == self.options.translation_data_path {
                        self.translation_data = TranslationData::new();
                    } else if !self.remove_external_locale(&filename) {
                        self.delete_source(&filename);
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::diagnostics::{Diagnostic, DiagnosticCode, DiagnosticReport};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn project(development: bool) -> (Project, Rc<RefCell<Vec<Diagnostic>>>) {
        let config: Config = serde_json::from_str(
            r#"{
                "src": "src",
                "prefix": "app.",
                "locales": { "source": "en", "targets": ["de"] },
                "localize": { "div": { "content": "text" } }
            }"#,
        )
        .unwrap();
        let options = Options::compile(&config, Path::new("/project")).unwrap();
        let (diagnostics, buffer) = Diagnostics::buffered();
        (Project::new(options, development, diagnostics), buffer)
    }

    #[derive(Default)]
    struct RecordingHooks {
        sources: Vec<(String, String)>,
        translation_data: Option<String>,
    }

    impl WriteHooks for RecordingHooks {
        fn write_source(&mut self, filename: &str, text: &str) -> Result<()> {
            self.sources.push((filename.to_string(), text.to_string()));
            Ok(())
        }

        fn write_translation_data(&mut self, text: &str) -> Result<()> {
            self.translation_data = Some(text.to_string());
            Ok(())
        }
    }

    #[test]
    fn test_update_source_eagerly_extracts() {
        let (mut project, _) = project(true);
        project
            .update_source(
                "/project/src/a.html",
                "<div t=\"app.a.t0\">hi</div>".to_string(),
            )
            .unwrap();

        let record = project.translation_data().record("/project/src/a.html");
        assert_eq!(record.unwrap().content["app.a.t0"].source.content, "hi");
        assert!(project.pair_set.is_reserved("app.a.t0", "/project/src/b.html"));
    }

    #[test]
    fn test_update_source_outside_root_fails() {
        let (mut project, _) = project(true);
        assert!(project
            .update_source("/elsewhere/a.html", "<div>x</div>".to_string())
            .is_err());
    }

    #[test]
    fn test_process_allocates_and_marks_modified() {
        let (mut project, _) = project(true);
        project
            .update_source("/project/src/view.html", "<div>test</div>".to_string())
            .unwrap();
        project.process_sources().unwrap();

        assert_eq!(
            project.source_text("/project/src/view.html").unwrap(),
            "<div t=\"app.view.t0\">test</div>"
        );
        let record = project
            .translation_data()
            .record("/project/src/view.html")
            .unwrap();
        assert_eq!(record.content["app.view.t0"].source.content, "test");

        let mut hooks = RecordingHooks::default();
        project.handle_modified(&mut hooks).unwrap();
        assert_eq!(hooks.sources.len(), 1);
        assert!(hooks.translation_data.is_some());

        // Second pass: nothing left to do.
        project.process_sources().unwrap();
        let mut hooks = RecordingHooks::default();
        project.handle_modified(&mut hooks).unwrap();
        assert!(hooks.sources.is_empty());
        assert!(hooks.translation_data.is_none());
    }

    #[test]
    fn test_production_reports_instead_of_writing() {
        let (mut project, buffer) = project(false);
        project
            .update_source("/project/src/view.html", "<div>test</div>".to_string())
            .unwrap();
        project.process_sources().unwrap();

        // Bytes untouched in production.
        assert_eq!(
            project.source_text("/project/src/view.html").unwrap(),
            "<div>test</div>"
        );

        let mut hooks = RecordingHooks::default();
        project.handle_modified(&mut hooks).unwrap();
        assert!(hooks.sources.is_empty());
        assert!(hooks.translation_data.is_none());

        let collected = buffer.borrow();
        assert!(collected
            .iter()
            .any(|d| d.code() == DiagnosticCode::ModifiedSource));
        assert_eq!(
            collected
                .iter()
                .filter(|d| d.code() == DiagnosticCode::ModifiedTranslation)
                .count(),
            1
        );
    }

    #[test]
    fn test_reserved_key_renamed_across_files() {
        // Scenario S3, full pipeline.
        let (mut project, _) = project(true);
        project
            .update_source(
                "/project/src/test.html",
                "<div t=\"app.test.t0\">test</div>".to_string(),
            )
            .unwrap();
        project.process_sources().unwrap();

        // A second file arrives claiming the same key.
        project
            .update_source(
                "/project/src/other.html",
                "<div t=\"app.test.t0\">test</div>".to_string(),
            )
            .unwrap();
        project.process_sources().unwrap();

        let other = project.source_text("/project/src/other.html").unwrap();
        assert!(other.contains("t=\"app.other.t0\""));
        let record = project
            .translation_data()
            .record("/project/src/other.html")
            .unwrap();
        assert!(record.content.contains_key("app.other.t0"));
    }

    #[test]
    fn test_delete_source_sweeps_record() {
        let (mut project, _) = project(true);
        project
            .update_source("/project/src/a.html", "<div>one</div>".to_string())
            .unwrap();
        project.process_sources().unwrap();
        assert!(project.translation_data().record("/project/src/a.html").is_some());

        project.delete_source("/project/src/a.html");
        project.process_sources().unwrap();
        assert!(project.translation_data().record("/project/src/a.html").is_none());
    }

    #[test]
    fn test_emptied_source_sweeps_record_to_obsolete() {
        let (mut project, _) = project(true);
        project
            .update_source("/project/src/a.html", "<div>one</div>".to_string())
            .unwrap();
        project.process_sources().unwrap();

        // Hand-translate the key, then empty the template.
        {
            let data = &mut project.translation_data;
            let record = data.files.get_mut("/project/src/a.html").unwrap();
            let set = record.content.get_mut("app.a.t0").unwrap();
            set.translations.insert(
                "de".to_string(),
                crate::db::TranslationEntry::new("eins", db::now_ms()),
            );
        }

        project
            .update_source("/project/src/a.html", "<span></span>".to_string())
            .unwrap();
        project.process_sources().unwrap();

        assert!(project.translation_data().record("/project/src/a.html").is_none());
        assert_eq!(project.translation_data().obsolete().len(), 1);
        assert_eq!(project.translation_data().obsolete()[0].content, "one");
    }

    #[test]
    fn test_compile_merges_external_locales() {
        let (mut project, buffer) = project(true);
        project
            .update_source("/project/src/a.html", "<div>hello</div>".to_string())
            .unwrap();
        project.process_sources().unwrap();

        let mut external = LocaleTree::new();
        external.set("lib.ok", "OK").unwrap();
        project.set_external_locale("de", "/project/node_modules/lib/de.json", external.clone());
        // A locale the database does not carry is created by deep clone.
        project.set_external_locale("fr", "/project/node_modules/lib/fr.json", external);

        let locales = project.compile_locales();
        assert_eq!(locales["en"].get("app.a.t0"), Some("hello"));
        assert_eq!(locales["de"].get("lib.ok"), Some("OK"));
        assert_eq!(locales["fr"].get("lib.ok"), Some("OK"));
        // The untranslated key is reported for de.
        assert!(buffer
            .borrow()
            .iter()
            .any(|d| d.code() == DiagnosticCode::MissingTranslation));
    }

    #[test]
    fn test_apply_updates_routes_by_kind() {
        let (mut project, _) = project(true);
        project.set_external_locale("de", "/project/ext/de.json", LocaleTree::new());

        project
            .apply_updates(vec![
                Update::Upsert {
                    filename: "/project/src/a.html".to_string(),
                    text: "<div>x</div>".to_string(),
                },
                Update::Upsert {
                    filename: "/project/ext/de.json".to_string(),
                    text: r#"{ "lib": { "ok": "OK" } }"#.to_string(),
                },
            ])
            .unwrap();

        assert!(project.source_text("/project/src/a.html").is_some());
        // The external file re-parsed rather than becoming a source.
        assert!(project.source_text("/project/ext/de.json").is_none());
        assert_eq!(
            project.external_locales["de"]["/project/ext/de.json"].get("lib.ok"),
            Some("OK")
        );

        project
            .apply_updates(vec![Update::Delete {
                filename: "/project/ext/de.json".to_string(),
            }])
            .unwrap();
        assert!(project.external_locales["de"].is_empty());
    }

    #[test]
    fn test_apply_updates_reloads_translation_data() {
        let (mut project, _) = project(true);
        let json = r#"{
            "version": 2,
            "files": {
                "src/a.html": {
                    "content": {
                        "app.a.t0": {
                            "content": "hi",
                            "lastModified": "2023-01-01T00:00:00.000Z",
                            "ignoreSpelling": [],
                            "translations": {}
                        }
                    }
                }
            },
            "obsolete": []
        }"#;
        project
            .apply_updates(vec![Update::Upsert {
                filename: "/project/i18n.json".to_string(),
                text: json.to_string(),
            }])
            .unwrap();
        assert!(project
            .translation_data()
            .record("/project/src/a.html")
            .is_some());
    }

    #[test]
    fn test_idempotence_across_full_cycles() {
        let (mut project, _) = project(true);
        project
            .update_source(
                "/project/src/view.html",
                "<div>test</div>".to_string(),
            )
            .unwrap();
        project.process_sources().unwrap();
        let mut hooks = RecordingHooks::default();
        project.handle_modified(&mut hooks).unwrap();
        let text_after = project.source_text("/project/src/view.html").unwrap().to_string();

        // Feed the written bytes back in, as a watcher would.
        project
            .update_source("/project/src/view.html", text_after.clone())
            .unwrap();
        project.process_sources().unwrap();
        let mut hooks = RecordingHooks::default();
        project.handle_modified(&mut hooks).unwrap();

        assert!(hooks.sources.is_empty());
        assert!(hooks.translation_data.is_none());
        assert_eq!(
            project.source_text("/project/src/view.html").unwrap(),
            text_after
        );
    }
}

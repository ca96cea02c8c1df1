//! Source files: templates (extract + justify) and JSON resources (extract
//! only). A source is replaced wholesale on external change and mutated in
//! place only by justification.

pub mod json;
pub mod template;

use indexmap::IndexMap;

use crate::config::Options;
use crate::diagnostics::Diagnostics;
pub use json::JsonResourceSource;
pub use template::{JustifyOutcome, TemplateSource};

#[derive(Debug)]
pub enum SourceFile {
    Template(TemplateSource),
    JsonResource(JsonResourceSource),
}

impl SourceFile {
    /// Classify by extension: `.html`/`.htm` parse as templates, `.json` as
    /// resource files. Anything else is not a source.
    pub fn from_text(filename: &str, text: String) -> Option<SourceFile> {
        let lower = filename.to_ascii_lowercase();
        if lower.ends_with(".html") || lower.ends_with(".htm") {
            Some(SourceFile::Template(TemplateSource::parse(filename, text)))
        } else if lower.ends_with(".json") {
            Some(SourceFile::JsonResource(JsonResourceSource::parse(
                filename, text,
            )))
        } else {
            None
        }
    }

    pub fn filename(&self) -> &str {
        match self {
            SourceFile::Template(t) => t.filename(),
            SourceFile::JsonResource(j) => j.filename(),
        }
    }

    pub fn text(&self) -> &str {
        match self {
            SourceFile::Template(t) => t.text(),
            SourceFile::JsonResource(j) => j.text(),
        }
    }

    /// Replace the source content; returns whether it actually differed.
    pub fn update(&mut self, text: String) -> bool {
        match self {
            SourceFile::Template(t) => t.update(text),
            SourceFile::JsonResource(j) => j.update(text),
        }
    }

    pub fn supports_justification(&self) -> bool {
        matches!(self, SourceFile::Template(_))
    }

    pub fn as_template_mut(&mut self) -> Option<&mut TemplateSource> {
        match self {
            SourceFile::Template(t) => Some(t),
            _ => None,
        }
    }

    /// Compute `key → source string` without mutating the source.
    pub fn extract_keys(
        &self,
        prefix: &str,
        options: &Options,
        diagnostics: &mut Diagnostics,
    ) -> IndexMap<String, String> {
        match self {
            SourceFile::Template(t) => t.extract_keys(options, diagnostics),
            SourceFile::JsonResource(j) => j.extract_keys(prefix, diagnostics),
        }
    }
}

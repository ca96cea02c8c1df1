//! Template sources: extraction and key justification.
//!
//! A template holds three parallel representations that must stay mutually
//! consistent: the source text, the parsed tree (whose spans index into the
//! text), and — through the project — the translation database. Extraction
//! reads the tree; justification computes byte edits against the text,
//! splices them in one linear pass, and re-parses.

use indexmap::{IndexMap, IndexSet};

use crate::config::{ElementLocalize, Options};
use crate::diagnostics::{
    Diagnostics, DisallowedContent, DisallowedLocalizedAttribute, DisallowedTAttribute,
    InvalidTAttribute, Location, MixedContent, UnlocalizedText, WrongPrefix,
};
use crate::html::{self, view, ContentAnalysis, Document, Element, LineIndex, Span};
use crate::tattr::{TAttribute, TARGET_HTML, TARGET_TEXT};

#[derive(Debug)]
pub struct TemplateSource {
    filename: String,
    text: String,
    document: Document,
    line_index: LineIndex,
}

/// Result of one justification pass.
#[derive(Debug, Default)]
pub struct JustifyOutcome {
    /// Whether the source bytes would change (and did, unless the pass ran
    /// diagnostics-only).
    pub modified: bool,
    /// Original key → the key(s) that replaced it.
    pub replaced_keys: IndexMap<String, IndexSet<String>>,
}

impl TemplateSource {
    pub fn parse(filename: &str, text: String) -> Self {
        let document = html::parse(&text);
        let line_index = LineIndex::new(&text);
        Self {
            filename: filename.to_string(),
            text,
            document,
            line_index,
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
        self.document = html::parse(&text);
        self.line_index = LineIndex::new(&text);
        self.text = text;
        true
    }

    fn location(&self, span: Span) -> Location {
        Location::from_span(&self.filename, &self.text, &self.line_index, span)
    }

    /// Extract `key → source string` from the `t` attributes.
    ///
    /// Content targets (`text`/`html`) take the concatenated non-ignored
    /// text nodes; attribute targets take the attribute value. Whitespace
    /// handling is applied per target. Within one file, a later binding of
    /// the same key overwrites an earlier one.
    pub fn extract_keys(
        &self,
        options: &Options,
        diagnostics: &mut Diagnostics,
    ) -> IndexMap<String, String> {
        let mut out = IndexMap::new();
        for element in view::elements(&self.document, &|tag| options.ignore_element(tag)) {
            let Some(attr) = element.attribute("t") else {
                continue;
            };
            if options.ignore_attribute_value(&attr.value) {
                continue;
            }
            let parsed = match TAttribute::parse(&attr.value) {
                Ok(parsed) => parsed,
                Err(err) => {
                    diagnostics.report(InvalidTAttribute {
                        location: self.location(attr.span),
                        message: err.message,
                    });
                    continue;
                }
            };
            for (name, key) in parsed.iter() {
                let value = if name == TARGET_TEXT || name == TARGET_HTML {
                    view::analyze_content(element, &|text| options.ignore_text(text)).text
                } else {
                    match element.attribute(name) {
                        Some(a) if !options.ignore_attribute_value(&a.value) => a.value.clone(),
                        _ => continue,
                    }
                };
                let value = options.whitespace_handling(&element.name, name).apply(&value);
                out.insert(key.to_string(), value);
            }
        }
        out
    }

    /// Reconcile the template's `t` attributes to a canonical key set.
    ///
    /// Allocates missing keys, reuses valid ones, and replaces keys that are
    /// reserved by another file, carry the wrong prefix, or duplicate a key
    /// already claimed in this pass. `known_keys` is the project-wide
    /// avoidance set for generated names; it grows with everything this pass
    /// observes or allocates. With `diagnostics_only` the edits are computed
    /// and reported but the text is left untouched.
    pub fn justify_keys(
        &mut self,
        prefix: &str,
        options: &Options,
        is_reserved: &dyn Fn(&str) -> bool,
        known_keys: &mut IndexSet<String>,
        diagnostics_only: bool,
        diagnostics: &mut Diagnostics,
    ) -> JustifyOutcome {
        let (edits, replaced_keys) =
            self.plan_edits(prefix, options, is_reserved, known_keys, diagnostics);

        let new_text = splice(&self.text, &edits);
        let modified = new_text != self.text;
        if modified && !diagnostics_only {
            self.document = html::parse(&new_text);
            self.line_index = LineIndex::new(&new_text);
            self.text = new_text;
        }
        JustifyOutcome {
            modified,
            replaced_keys,
        }
    }

    fn plan_edits(
        &self,
        prefix: &str,
        options: &Options,
        is_reserved: &dyn Fn(&str) -> bool,
        known_keys: &mut IndexSet<String>,
        diagnostics: &mut Diagnostics,
    ) -> (Vec<Edit>, IndexMap<String, IndexSet<String>>) {
        // Pass A: discover candidates and existing keys.
        let mut candidates: Vec<Candidate> = Vec::new();
        let mut key_spans: IndexMap<String, Span> = IndexMap::new();

        for element in view::elements(&self.document, &|tag| options.ignore_element(tag)) {
            let t_attr = element.attribute("t");
            if let Some(attr) = t_attr {
                if options.ignore_attribute_value(&attr.value) {
                    // An interpolated t attribute marks the element as
                    // non-localizable; rewriting around it would corrupt it.
                    continue;
                }
            }

            let mut original = None;
            let mut attr_span = None;
            if let Some(attr) = t_attr {
                attr_span = Some(attr.span);
                match TAttribute::parse(&attr.value) {
                    Ok(parsed) => {
                        for key in parsed.keys() {
                            known_keys.insert(key.to_string());
                            key_spans.entry(key.to_string()).or_insert(attr.span);
                        }
                        original = Some(parsed);
                    }
                    Err(err) => diagnostics.report(InvalidTAttribute {
                        location: self.location(attr.span),
                        message: err.message,
                    }),
                }
            }

            let content = view::analyze_content(element, &|text| options.ignore_text(text));
            match options.localized_element(&element.name) {
                Some(config) => {
                    if content.has_text && content.has_elements {
                        diagnostics.report(MixedContent {
                            location: self.location(element.content_span()),
                        });
                    }
                    candidates.push(Candidate {
                        element,
                        config,
                        original,
                        attr_span,
                        content,
                    });
                }
                None => {
                    if content.has_text {
                        diagnostics.report(UnlocalizedText {
                            location: self.location(element.content_span()),
                        });
                    }
                    if let Some(span) = attr_span {
                        diagnostics.report(DisallowedTAttribute {
                            location: self.location(span),
                        });
                    }
                }
            }
        }

        // Pass B/C: allocate keys and rewrite each candidate.
        let mut allocator = KeyAllocator {
            prefix,
            is_reserved,
            known_keys,
            generated: IndexSet::new(),
            replaced: IndexMap::new(),
            next: 0,
        };
        let mut edits: Vec<Edit> = Vec::new();

        for candidate in &candidates {
            let new_attr = self.rewrite_candidate(candidate, options, &mut allocator, diagnostics);
            if let Some(edit) = self.attribute_edit(candidate, &new_attr) {
                edits.push(edit);
            }
        }

        // Pass D: prefix diagnostics for surviving foreign keys.
        for (key, span) in &key_spans {
            if allocator.replaced.contains_key(key) || key.starts_with(prefix) {
                continue;
            }
            diagnostics.report(WrongPrefix {
                location: Some(self.location(*span)),
                filename: self.filename.clone(),
                key: key.clone(),
                expected_prefix: prefix.to_string(),
            });
        }

        edits.sort_by_key(|edit| edit.start);
        (edits, allocator.replaced)
    }

    fn rewrite_candidate(
        &self,
        candidate: &Candidate,
        options: &Options,
        allocator: &mut KeyAllocator,
        diagnostics: &mut Diagnostics,
    ) -> TAttribute {
        let mut new_attr = TAttribute::new();
        let original = candidate.original.as_ref();
        let existing_text = original.and_then(|o| o.get(TARGET_TEXT)).map(str::to_string);
        let existing_html = original.and_then(|o| o.get(TARGET_HTML)).map(str::to_string);

        match candidate.config.content {
            Some(kind) => {
                if candidate.content.has_text
                    || existing_text.is_some()
                    || existing_html.is_some()
                {
                    let preferred = existing_html.as_deref().or(existing_text.as_deref());
                    let key = allocator.unique(preferred);
                    new_attr.set(kind.target_name(), &key);
                }
            }
            None => {
                if let Some(key) = &existing_html {
                    new_attr.set(TARGET_HTML, key);
                } else if let Some(key) = &existing_text {
                    new_attr.set(TARGET_TEXT, key);
                }
                if existing_html.is_some() || existing_text.is_some() || candidate.content.has_text
                {
                    diagnostics.report(DisallowedContent {
                        location: self.location(candidate.element.content_span()),
                    });
                }
            }
        }

        for attr_name in &candidate.config.attributes {
            let Some(attr) = candidate.element.attribute(attr_name) else {
                continue;
            };
            if options.ignore_attribute_value(&attr.value) {
                continue;
            }
            let preferred = original.and_then(|o| o.get(attr_name)).map(str::to_string);
            let key = allocator.unique(preferred.as_deref());
            new_attr.set(attr_name, &key);
        }

        if let Some(original) = original {
            for (name, key) in original.iter() {
                if name == TARGET_TEXT || name == TARGET_HTML {
                    continue;
                }
                if candidate.config.attributes.iter().any(|a| a == name) {
                    continue;
                }
                let span = candidate.attr_span.unwrap_or(candidate.element.start_tag);
                diagnostics.report(DisallowedLocalizedAttribute {
                    location: self.location(span),
                    name: name.to_string(),
                    key: key.to_string(),
                });
            }
        }

        new_attr
    }

    /// The byte edit that brings the candidate's `t` attribute in line with
    /// `new_attr`, if any edit is needed at all.
    fn attribute_edit(&self, candidate: &Candidate, new_attr: &TAttribute) -> Option<Edit> {
        let rendered = new_attr.to_string();
        match candidate.attr_span {
            Some(span) => {
                // Scan left through whitespace so linebreaks and indentation
                // inside the tag survive the rewrite.
                let bytes = self.text.as_bytes();
                let mut ws_start = span.start;
                while ws_start > 0 && bytes[ws_start - 1].is_ascii_whitespace() {
                    ws_start -= 1;
                }
                let replacement = if rendered.is_empty() {
                    String::new()
                } else {
                    format!("{}t=\"{}\"", &self.text[ws_start..span.start], rendered)
                };
                Some(Edit {
                    start: ws_start,
                    end: span.end,
                    replacement,
                })
            }
            None if !rendered.is_empty() => {
                let tag = candidate.element.start_tag;
                let bytes = self.text.as_bytes();
                let mut pos = tag.end - 1;
                if pos > tag.start && bytes[pos - 1] == b'/' {
                    pos -= 1;
                }
                let replacement = if pos > 0 && bytes[pos - 1].is_ascii_whitespace() {
                    format!("t=\"{}\"", rendered)
                } else {
                    format!(" t=\"{}\"", rendered)
                };
                Some(Edit {
                    start: pos,
                    end: pos,
                    replacement,
                })
            }
            None => None,
        }
    }
}

struct Candidate<'a> {
    element: &'a Element,
    config: &'a ElementLocalize,
    original: Option<TAttribute>,
    attr_span: Option<Span>,
    content: ContentAnalysis,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Edit {
    start: usize,
    end: usize,
    replacement: String,
}

/// Apply non-overlapping edits (sorted by start) in one linear splice.
fn splice(text: &str, edits: &[Edit]) -> String {
    let mut out = String::with_capacity(text.len() + 64);
    let mut last = 0;
    for edit in edits {
        out.push_str(&text[last..edit.start]);
        out.push_str(&edit.replacement);
        last = edit.end;
    }
    out.push_str(&text[last..]);
    out
}

struct KeyAllocator<'a> {
    prefix: &'a str,
    is_reserved: &'a dyn Fn(&str) -> bool,
    known_keys: &'a mut IndexSet<String>,
    /// Keys handed out during this pass; a preferred key may be used once.
    generated: IndexSet<String>,
    replaced: IndexMap<String, IndexSet<String>>,
    next: usize,
}

impl KeyAllocator<'_> {
    fn must_replace(&self, key: &str) -> bool {
        !key.starts_with(self.prefix) || (self.is_reserved)(key)
    }

    fn unique(&mut self, preferred: Option<&str>) -> String {
        if let Some(key) = preferred {
            if !self.must_replace(key) && !self.generated.contains(key) {
                self.generated.insert(key.to_string());
                self.known_keys.insert(key.to_string());
                return key.to_string();
            }
        }
        loop {
            let candidate = format!("{}t{}", self.prefix, self.next);
            self.next += 1;
            if self.known_keys.contains(&candidate) || self.must_replace(&candidate) {
                continue;
            }
            if let Some(old) = preferred {
                self.replaced
                    .entry(old.to_string())
                    .or_default()
                    .insert(candidate.clone());
            }
            self.generated.insert(candidate.clone());
            self.known_keys.insert(candidate.clone());
            return candidate;
        }
    }
}

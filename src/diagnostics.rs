//! Diagnostic types for the localization pipeline.
//!
//! Every content-level problem is a diagnostic: a plain data record with a
//! kind, structured details, and (where available) a byte-precise source
//! location. Diagnostics never carry behavior and never abort the pass that
//! reported them; a subscriber decides what each one means (print, escalate,
//! drop) via the configured handling policy.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use enum_dispatch::enum_dispatch;

use crate::html::{LineIndex, Span};

// ============================================================
// Locations
// ============================================================

/// A position within a source file. `line`/`col` are 1-based; `col` counts
/// characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub offset: usize,
    pub line: usize,
    pub col: usize,
}

/// A byte range within a named source file, with the containing line's text
/// captured for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub filename: String,
    pub start: Position,
    pub end: Position,
    pub line_text: Option<String>,
}

impl Location {
    pub fn from_span(filename: &str, text: &str, index: &LineIndex, span: Span) -> Self {
        let (start_line, start_col) = index.position(text, span.start);
        let (end_line, end_col) = index.position(text, span.end);
        Self {
            filename: filename.to_string(),
            start: Position {
                offset: span.start,
                line: start_line,
                col: start_col,
            },
            end: Position {
                offset: span.end,
                line: end_line,
                col: end_col,
            },
            line_text: Some(index.line_text(text, span.start).to_string()),
        }
    }
}

// ============================================================
// Codes and handling policy
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DiagnosticCode {
    InvalidJsonData,
    InvalidJsonPartName,
    MixedContent,
    InvalidTAttribute,
    UnlocalizedText,
    DisallowedTAttribute,
    DisallowedContent,
    DisallowedLocalizedAttribute,
    WrongPrefix,
    DuplicateKeyOrPath,
    DuplicateKey,
    OutdatedTranslation,
    MissingTranslation,
    ModifiedSource,
    ModifiedTranslation,
    UnknownLocale,
}

impl DiagnosticCode {
    pub const ALL: &'static [DiagnosticCode] = &[
        DiagnosticCode::InvalidJsonData,
        DiagnosticCode::InvalidJsonPartName,
        DiagnosticCode::MixedContent,
        DiagnosticCode::InvalidTAttribute,
        DiagnosticCode::UnlocalizedText,
        DiagnosticCode::DisallowedTAttribute,
        DiagnosticCode::DisallowedContent,
        DiagnosticCode::DisallowedLocalizedAttribute,
        DiagnosticCode::WrongPrefix,
        DiagnosticCode::DuplicateKeyOrPath,
        DiagnosticCode::DuplicateKey,
        DiagnosticCode::OutdatedTranslation,
        DiagnosticCode::MissingTranslation,
        DiagnosticCode::ModifiedSource,
        DiagnosticCode::ModifiedTranslation,
        DiagnosticCode::UnknownLocale,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticCode::InvalidJsonData => "invalid-json-data",
            DiagnosticCode::InvalidJsonPartName => "invalid-json-part-name",
            DiagnosticCode::MixedContent => "mixed-content",
            DiagnosticCode::InvalidTAttribute => "invalid-t-attribute",
            DiagnosticCode::UnlocalizedText => "unlocalized-text",
            DiagnosticCode::DisallowedTAttribute => "disallowed-t-attribute",
            DiagnosticCode::DisallowedContent => "disallowed-content",
            DiagnosticCode::DisallowedLocalizedAttribute => "disallowed-localized-attribute",
            DiagnosticCode::WrongPrefix => "wrong-prefix",
            DiagnosticCode::DuplicateKeyOrPath => "duplicate-key-or-path",
            DiagnosticCode::DuplicateKey => "duplicate-key",
            DiagnosticCode::OutdatedTranslation => "outdated-translation",
            DiagnosticCode::MissingTranslation => "missing-translation",
            DiagnosticCode::ModifiedSource => "modified-source",
            DiagnosticCode::ModifiedTranslation => "modified-translation",
            DiagnosticCode::UnknownLocale => "unknown-locale",
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiagnosticCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DiagnosticCode::ALL
            .iter()
            .copied()
            .find(|code| code.as_str() == s)
            .ok_or_else(|| format!("unknown diagnostic code \"{}\"", s))
    }
}

/// What to do with a reported diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handling {
    Error,
    Warn,
    Ignore,
}

impl FromStr for Handling {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "error" => Ok(Handling::Error),
            "warn" => Ok(Handling::Warn),
            "ignore" => Ok(Handling::Ignore),
            other => Err(format!("unknown diagnostic handling \"{}\"", other)),
        }
    }
}

/// Per-code handling with an `all` fallback (default `warn`).
#[derive(Debug, Clone)]
pub struct HandlingPolicy {
    overrides: std::collections::HashMap<DiagnosticCode, Handling>,
    fallback: Handling,
}

impl Default for HandlingPolicy {
    fn default() -> Self {
        Self {
            overrides: std::collections::HashMap::new(),
            fallback: Handling::Warn,
        }
    }
}

impl HandlingPolicy {
    pub fn new(
        overrides: std::collections::HashMap<DiagnosticCode, Handling>,
        fallback: Handling,
    ) -> Self {
        Self {
            overrides,
            fallback,
        }
    }

    pub fn resolve(&self, code: DiagnosticCode) -> Handling {
        self.overrides.get(&code).copied().unwrap_or(self.fallback)
    }
}

// ============================================================
// Diagnostic kinds
// ============================================================

/// A JSON-resource node that is neither an object nor a string leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidJsonData {
    pub filename: String,
    /// Dotted path to the offending node; empty at the root.
    pub path: String,
}

/// A JSON-resource key part containing `.`, which the storage format would
/// alias with nested keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidJsonPartName {
    pub filename: String,
    pub part: String,
    pub path: String,
}

/// A localizable element mixing text and child elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MixedContent {
    pub location: Location,
}

/// A `t` attribute value that does not parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidTAttribute {
    pub location: Location,
    pub message: String,
}

/// Text content on an element that is not configured for localization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnlocalizedText {
    pub location: Location,
}

/// A `t` attribute on an element that is not configured for localization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisallowedTAttribute {
    pub location: Location,
}

/// Content (or a content binding) on an element whose configuration does not
/// localize content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisallowedContent {
    pub location: Location,
}

/// A `t`-attribute binding for an attribute the element configuration does
/// not localize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisallowedLocalizedAttribute {
    pub location: Location,
    pub name: String,
    pub key: String,
}

/// A surviving key that does not start with the file's prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrongPrefix {
    pub location: Option<Location>,
    pub filename: String,
    pub key: String,
    pub expected_prefix: String,
}

/// A collision while merging locale trees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateKeyOrPath {
    pub filename: String,
    pub path: String,
}

/// A collision while inserting a key into a compiled locale tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateKey {
    pub filename: String,
    pub key: String,
}

/// A translation older than its source string; not compiled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutdatedTranslation {
    pub filename: String,
    pub key: String,
    pub locale: String,
}

/// A configured locale with no translation for a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingTranslation {
    pub filename: String,
    pub key: String,
    pub locale: String,
}

/// A source that would be rewritten, reported instead of written outside
/// development mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifiedSource {
    pub filename: String,
}

/// Translation data that would be rewritten, reported instead of written
/// outside development mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifiedTranslation;

/// A stored translation locale that is not configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLocale {
    pub filename: String,
    pub key: String,
    pub locale: String,
}

// ============================================================
// Report trait and enum
// ============================================================

/// Common read interface over all diagnostic kinds, used for handling and
/// reporting.
#[enum_dispatch]
pub trait DiagnosticReport {
    /// Stable kebab-case code, also the key in the `diagnostics` config map.
    fn code(&self) -> DiagnosticCode;

    /// Primary human-readable message.
    fn message(&self) -> String;

    /// Byte-precise source location, when one exists.
    fn location(&self) -> Option<&Location>;

    /// File the diagnostic concerns, for kinds without a span.
    fn filename(&self) -> Option<&str>;

    /// Extra context for the `= note:` line.
    fn details(&self) -> Option<String>;
}

#[enum_dispatch(DiagnosticReport)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    InvalidJsonData(InvalidJsonData),
    InvalidJsonPartName(InvalidJsonPartName),
    MixedContent(MixedContent),
    InvalidTAttribute(InvalidTAttribute),
    UnlocalizedText(UnlocalizedText),
    DisallowedTAttribute(DisallowedTAttribute),
    DisallowedContent(DisallowedContent),
    DisallowedLocalizedAttribute(DisallowedLocalizedAttribute),
    WrongPrefix(WrongPrefix),
    DuplicateKeyOrPath(DuplicateKeyOrPath),
    DuplicateKey(DuplicateKey),
    OutdatedTranslation(OutdatedTranslation),
    MissingTranslation(MissingTranslation),
    ModifiedSource(ModifiedSource),
    ModifiedTranslation(ModifiedTranslation),
    UnknownLocale(UnknownLocale),
}

impl DiagnosticReport for InvalidJsonData {
    fn code(&self) -> DiagnosticCode {
        DiagnosticCode::InvalidJsonData
    }
    fn message(&self) -> String {
        "localizable values must be objects or strings".to_string()
    }
    fn location(&self) -> Option<&Location> {
        None
    }
    fn filename(&self) -> Option<&str> {
        Some(&self.filename)
    }
    fn details(&self) -> Option<String> {
        if self.path.is_empty() {
            None
        } else {
            Some(format!("at \"{}\"", self.path))
        }
    }
}

impl DiagnosticReport for InvalidJsonPartName {
    fn code(&self) -> DiagnosticCode {
        DiagnosticCode::InvalidJsonPartName
    }
    fn message(&self) -> String {
        format!("key part \"{}\" must not contain '.'", self.part)
    }
    fn location(&self) -> Option<&Location> {
        None
    }
    fn filename(&self) -> Option<&str> {
        Some(&self.filename)
    }
    fn details(&self) -> Option<String> {
        Some(format!("under \"{}\"", self.path))
    }
}

impl DiagnosticReport for MixedContent {
    fn code(&self) -> DiagnosticCode {
        DiagnosticCode::MixedContent
    }
    fn message(&self) -> String {
        "element mixes text and child elements".to_string()
    }
    fn location(&self) -> Option<&Location> {
        Some(&self.location)
    }
    fn filename(&self) -> Option<&str> {
        Some(&self.location.filename)
    }
    fn details(&self) -> Option<String> {
        Some("only text nodes are extracted; wrap the text or the children".to_string())
    }
}

impl DiagnosticReport for InvalidTAttribute {
    fn code(&self) -> DiagnosticCode {
        DiagnosticCode::InvalidTAttribute
    }
    fn message(&self) -> String {
        self.message.clone()
    }
    fn location(&self) -> Option<&Location> {
        Some(&self.location)
    }
    fn filename(&self) -> Option<&str> {
        Some(&self.location.filename)
    }
    fn details(&self) -> Option<String> {
        None
    }
}

impl DiagnosticReport for UnlocalizedText {
    fn code(&self) -> DiagnosticCode {
        DiagnosticCode::UnlocalizedText
    }
    fn message(&self) -> String {
        "text content on an element that is not localized".to_string()
    }
    fn location(&self) -> Option<&Location> {
        Some(&self.location)
    }
    fn filename(&self) -> Option<&str> {
        Some(&self.location.filename)
    }
    fn details(&self) -> Option<String> {
        None
    }
}

impl DiagnosticReport for DisallowedTAttribute {
    fn code(&self) -> DiagnosticCode {
        DiagnosticCode::DisallowedTAttribute
    }
    fn message(&self) -> String {
        "t attribute on an element that is not localized".to_string()
    }
    fn location(&self) -> Option<&Location> {
        Some(&self.location)
    }
    fn filename(&self) -> Option<&str> {
        Some(&self.location.filename)
    }
    fn details(&self) -> Option<String> {
        None
    }
}

impl DiagnosticReport for DisallowedContent {
    fn code(&self) -> DiagnosticCode {
        DiagnosticCode::DisallowedContent
    }
    fn message(&self) -> String {
        "element content is not configured for localization".to_string()
    }
    fn location(&self) -> Option<&Location> {
        Some(&self.location)
    }
    fn filename(&self) -> Option<&str> {
        Some(&self.location.filename)
    }
    fn details(&self) -> Option<String> {
        None
    }
}

impl DiagnosticReport for DisallowedLocalizedAttribute {
    fn code(&self) -> DiagnosticCode {
        DiagnosticCode::DisallowedLocalizedAttribute
    }
    fn message(&self) -> String {
        format!("attribute \"{}\" is not configured for localization", self.name)
    }
    fn location(&self) -> Option<&Location> {
        Some(&self.location)
    }
    fn filename(&self) -> Option<&str> {
        Some(&self.location.filename)
    }
    fn details(&self) -> Option<String> {
        Some(format!("bound to \"{}\"", self.key))
    }
}

impl DiagnosticReport for WrongPrefix {
    fn code(&self) -> DiagnosticCode {
        DiagnosticCode::WrongPrefix
    }
    fn message(&self) -> String {
        format!(
            "key \"{}\" does not start with \"{}\"",
            self.key, self.expected_prefix
        )
    }
    fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }
    fn filename(&self) -> Option<&str> {
        Some(&self.filename)
    }
    fn details(&self) -> Option<String> {
        None
    }
}

impl DiagnosticReport for DuplicateKeyOrPath {
    fn code(&self) -> DiagnosticCode {
        DiagnosticCode::DuplicateKeyOrPath
    }
    fn message(&self) -> String {
        format!("conflicting locale entry at \"{}\"", self.path)
    }
    fn location(&self) -> Option<&Location> {
        None
    }
    fn filename(&self) -> Option<&str> {
        Some(&self.filename)
    }
    fn details(&self) -> Option<String> {
        None
    }
}

impl DiagnosticReport for DuplicateKey {
    fn code(&self) -> DiagnosticCode {
        DiagnosticCode::DuplicateKey
    }
    fn message(&self) -> String {
        format!("key \"{}\" collides with an existing entry", self.key)
    }
    fn location(&self) -> Option<&Location> {
        None
    }
    fn filename(&self) -> Option<&str> {
        Some(&self.filename)
    }
    fn details(&self) -> Option<String> {
        None
    }
}

impl DiagnosticReport for OutdatedTranslation {
    fn code(&self) -> DiagnosticCode {
        DiagnosticCode::OutdatedTranslation
    }
    fn message(&self) -> String {
        format!(
            "\"{}\" translation of \"{}\" is older than its source",
            self.locale, self.key
        )
    }
    fn location(&self) -> Option<&Location> {
        None
    }
    fn filename(&self) -> Option<&str> {
        Some(&self.filename)
    }
    fn details(&self) -> Option<String> {
        None
    }
}

impl DiagnosticReport for MissingTranslation {
    fn code(&self) -> DiagnosticCode {
        DiagnosticCode::MissingTranslation
    }
    fn message(&self) -> String {
        format!("no \"{}\" translation for \"{}\"", self.locale, self.key)
    }
    fn location(&self) -> Option<&Location> {
        None
    }
    fn filename(&self) -> Option<&str> {
        Some(&self.filename)
    }
    fn details(&self) -> Option<String> {
        None
    }
}

impl DiagnosticReport for ModifiedSource {
    fn code(&self) -> DiagnosticCode {
        DiagnosticCode::ModifiedSource
    }
    fn message(&self) -> String {
        "source file needs key justification".to_string()
    }
    fn location(&self) -> Option<&Location> {
        None
    }
    fn filename(&self) -> Option<&str> {
        Some(&self.filename)
    }
    fn details(&self) -> Option<String> {
        Some("run with --dev to write the changes".to_string())
    }
}

impl DiagnosticReport for ModifiedTranslation {
    fn code(&self) -> DiagnosticCode {
        DiagnosticCode::ModifiedTranslation
    }
    fn message(&self) -> String {
        "translation data is out of sync with the sources".to_string()
    }
    fn location(&self) -> Option<&Location> {
        None
    }
    fn filename(&self) -> Option<&str> {
        None
    }
    fn details(&self) -> Option<String> {
        Some("run with --dev to write the changes".to_string())
    }
}

impl DiagnosticReport for UnknownLocale {
    fn code(&self) -> DiagnosticCode {
        DiagnosticCode::UnknownLocale
    }
    fn message(&self) -> String {
        format!(
            "locale \"{}\" of \"{}\" is not configured",
            self.locale, self.key
        )
    }
    fn location(&self) -> Option<&Location> {
        None
    }
    fn filename(&self) -> Option<&str> {
        Some(&self.filename)
    }
    fn details(&self) -> Option<String> {
        None
    }
}

// ============================================================
// Bus
// ============================================================

/// Subscriber-based diagnostics sink. Subscribers are pure consumers; a
/// reported diagnostic is handed to each in subscription order.
#[derive(Default)]
pub struct Diagnostics {
    sinks: Vec<Box<dyn FnMut(&Diagnostic)>>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// A bus wired to an in-memory buffer, for tests and collection-style
    /// consumers.
    pub fn buffered() -> (Self, Rc<RefCell<Vec<Diagnostic>>>) {
        let buffer: Rc<RefCell<Vec<Diagnostic>>> = Rc::new(RefCell::new(Vec::new()));
        let mut bus = Self::new();
        let sink = Rc::clone(&buffer);
        bus.subscribe(move |d| sink.borrow_mut().push(d.clone()));
        (bus, buffer)
    }

    pub fn subscribe(&mut self, sink: impl FnMut(&Diagnostic) + 'static) {
        self.sinks.push(Box::new(sink));
    }

    pub fn report(&mut self, diagnostic: impl Into<Diagnostic>) {
        let diagnostic = diagnostic.into();
        for sink in &mut self.sinks {
            sink(&diagnostic);
        }
    }
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_round_trip() {
        for code in DiagnosticCode::ALL {
            assert_eq!(code.as_str().parse::<DiagnosticCode>().unwrap(), *code);
        }
        assert!("no-such-code".parse::<DiagnosticCode>().is_err());
    }

    #[test]
    fn test_handling_policy_fallback() {
        let policy = HandlingPolicy::default();
        assert_eq!(policy.resolve(DiagnosticCode::MixedContent), Handling::Warn);

        let mut overrides = std::collections::HashMap::new();
        overrides.insert(DiagnosticCode::WrongPrefix, Handling::Error);
        let policy = HandlingPolicy::new(overrides, Handling::Ignore);
        assert_eq!(policy.resolve(DiagnosticCode::WrongPrefix), Handling::Error);
        assert_eq!(
            policy.resolve(DiagnosticCode::MixedContent),
            Handling::Ignore
        );
    }

    #[test]
    fn test_bus_delivers_to_all_subscribers() {
        let (mut bus, buffer) = Diagnostics::buffered();
        let count = Rc::new(RefCell::new(0usize));
        let counter = Rc::clone(&count);
        bus.subscribe(move |_| *counter.borrow_mut() += 1);

        bus.report(ModifiedTranslation);
        bus.report(ModifiedSource {
            filename: "/p/src/a.html".to_string(),
        });

        assert_eq!(buffer.borrow().len(), 2);
        assert_eq!(*count.borrow(), 2);
        assert_eq!(
            buffer.borrow()[0].code(),
            DiagnosticCode::ModifiedTranslation
        );
        assert_eq!(buffer.borrow()[1].filename(), Some("/p/src/a.html"));
    }

    #[test]
    fn test_location_from_span() {
        let text = "<div>\n  <b t=\"x\">y</b>\n</div>";
        let index = LineIndex::new(text);
        let span = Span::new(11, 16); // t="x"
        let location = Location::from_span("/p/a.html", text, &index, span);
        assert_eq!(location.start.line, 2);
        assert_eq!(location.start.col, 6);
        assert_eq!(location.line_text.as_deref(), Some("  <b t=\"x\">y</b>"));
    }

    #[test]
    fn test_messages_name_their_subject() {
        let diagnostic = Diagnostic::from(MissingTranslation {
            filename: "/p/src/a.html".to_string(),
            key: "app.a.t0".to_string(),
            locale: "de".to_string(),
        });
        assert!(diagnostic.message().contains("app.a.t0"));
        assert!(diagnostic.message().contains("de"));
        assert_eq!(diagnostic.code().to_string(), "missing-translation");
    }
}

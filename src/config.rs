//! User configuration and its compiled form.
//!
//! The raw [`Config`] mirrors `i18n.config.json`. Before a project runs, the
//! config is compiled once into [`Options`]: lookup tables keyed by tag and
//! target name with the `"*"` wildcard resolved at build time, pre-compiled
//! ignore regexes, and a diagnostic handling policy. Nothing resolves
//! wildcards per call.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::diagnostics::{DiagnosticCode, Handling, HandlingPolicy};

pub const DEFAULT_CONFIG_FILE: &str = "i18n.config.json";

/// The wildcard key in `localize` and `whitespace` maps.
pub const WILDCARD: &str = "*";

/// An attribute value or text node containing `${…}` is non-localizable.
static INTERPOLATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\$\{.*\}").expect("static pattern"));

pub fn contains_interpolation(text: &str) -> bool {
    INTERPOLATION.is_match(text)
}

// ============================================================
// Raw configuration
// ============================================================

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Source root directory; templates and JSON resources live below it.
    pub src: String,
    #[serde(default = "default_translation_data")]
    pub translation_data: String,
    /// Output path template with a `[locale]` placeholder.
    #[serde(default = "default_output")]
    pub output: String,
    /// Namespace prepended to every derived key prefix.
    #[serde(default)]
    pub prefix: String,
    pub locales: LocalesConfig,
    #[serde(default)]
    pub ignore: IgnoreConfig,
    #[serde(default)]
    pub localize: IndexMap<String, LocalizeElementConfig>,
    #[serde(default)]
    pub whitespace: IndexMap<String, WhitespaceConfig>,
    /// Per-code handling (`error`/`warn`/`ignore`), `"all"` as fallback.
    #[serde(default)]
    pub diagnostics: IndexMap<String, String>,
    /// Locale id → glob patterns of locale trees shipped by packages.
    #[serde(default)]
    pub external_locales: IndexMap<String, Vec<String>>,
}

fn default_translation_data() -> String {
    "i18n.json".to_string()
}

fn default_output() -> String {
    "dist/locale/[locale].json".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalesConfig {
    /// The locale the source strings are written in.
    pub source: String,
    #[serde(default)]
    pub targets: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IgnoreConfig {
    /// Tag names whose subtrees are skipped entirely.
    #[serde(default = "default_ignored_elements")]
    pub elements: Vec<String>,
    /// Regexes marking text content as non-localizable, in addition to the
    /// built-in interpolation marker.
    #[serde(default)]
    pub texts: Vec<String>,
}

fn default_ignored_elements() -> Vec<String> {
    vec!["script".to_string(), "style".to_string()]
}

impl Default for IgnoreConfig {
    fn default() -> Self {
        Self {
            elements: default_ignored_elements(),
            texts: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalizeElementConfig {
    #[serde(default)]
    pub content: Option<ContentKind>,
    #[serde(default)]
    pub attributes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Text,
    Html,
}

impl ContentKind {
    pub fn target_name(&self) -> &'static str {
        match self {
            ContentKind::Text => crate::tattr::TARGET_TEXT,
            ContentKind::Html => crate::tattr::TARGET_HTML,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum WhitespaceHandling {
    Preserve,
    Trim,
    Collapse,
    TrimCollapse,
}

impl WhitespaceHandling {
    pub fn apply(&self, text: &str) -> String {
        match self {
            WhitespaceHandling::Preserve => text.to_string(),
            WhitespaceHandling::Trim => text.trim().to_string(),
            WhitespaceHandling::Collapse => collapse_whitespace(text),
            WhitespaceHandling::TrimCollapse => collapse_whitespace(text.trim()),
        }
    }
}

/// Replace every whitespace run, including leading and trailing ones, with a
/// single ASCII space.
fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_run = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_run {
                out.push(' ');
                in_run = true;
            }
        } else {
            out.push(c);
            in_run = false;
        }
    }
    out
}

/// A `whitespace` entry: either one policy for the whole element or a
/// per-target map (targets are attribute names plus `text`/`html`, with `"*"`
/// as the wildcard).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum WhitespaceConfig {
    Policy(WhitespaceHandling),
    PerTarget(IndexMap<String, WhitespaceHandling>),
}

// ============================================================
// Loading
// ============================================================

pub fn load_config(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: Config = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
    Ok(config)
}

pub fn default_config_json() -> Result<String> {
    let config = Config {
        src: "src".to_string(),
        translation_data: default_translation_data(),
        output: default_output(),
        prefix: String::new(),
        locales: LocalesConfig {
            source: "en".to_string(),
            targets: Vec::new(),
        },
        ignore: IgnoreConfig::default(),
        localize: IndexMap::from([(
            WILDCARD.to_string(),
            LocalizeElementConfig {
                content: None,
                attributes: ["title", "placeholder", "alt", "aria-label"]
                    .map(String::from)
                    .to_vec(),
            },
        )]),
        whitespace: IndexMap::from([(
            WILDCARD.to_string(),
            WhitespaceConfig::Policy(WhitespaceHandling::TrimCollapse),
        )]),
        diagnostics: IndexMap::new(),
        external_locales: IndexMap::new(),
    };
    serde_json::to_string_pretty(&config).context("Failed to generate default config.")
}

// ============================================================
// Compiled options
// ============================================================

#[derive(Debug, Clone)]
pub struct ElementLocalize {
    pub content: Option<ContentKind>,
    /// Lowercased attribute names, in config order.
    pub attributes: Vec<String>,
}

#[derive(Debug)]
pub struct Options {
    /// Directory the config file lives in; every relative path resolves
    /// against it.
    pub base_dir: PathBuf,
    pub src_root: PathBuf,
    pub translation_data_path: PathBuf,
    pub output_template: String,
    pub key_prefix: String,
    pub source_locale: String,
    /// All configured locales, source first.
    pub locales: Vec<String>,
    pub handling: HandlingPolicy,
    pub external_locales: IndexMap<String, Vec<String>>,
    localize: IndexMap<String, ElementLocalize>,
    whitespace: IndexMap<String, WhitespaceConfig>,
    ignored_elements: HashSet<String>,
    ignored_texts: Vec<Regex>,
}

impl Options {
    pub fn compile(config: &Config, base_dir: &Path) -> Result<Self> {
        if config.src.is_empty() {
            return Err(anyhow!("'src' must name the source root directory"));
        }
        if config.locales.source.is_empty() {
            return Err(anyhow!("'locales.source' must not be empty"));
        }
        if !config.output.contains("[locale]") {
            return Err(anyhow!(
                "'output' must contain the [locale] placeholder: \"{}\"",
                config.output
            ));
        }

        let mut locales = vec![config.locales.source.clone()];
        for target in &config.locales.targets {
            if !locales.contains(target) {
                locales.push(target.clone());
            }
        }

        let ignored_texts = config
            .ignore
            .texts
            .iter()
            .map(|pattern| {
                Regex::new(pattern)
                    .with_context(|| format!("Invalid regex in 'ignore.texts': \"{}\"", pattern))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut handling_overrides = HashMap::new();
        let mut fallback = Handling::Warn;
        for (code, value) in &config.diagnostics {
            let handling: Handling = value
                .parse()
                .map_err(|e: String| anyhow!("Invalid 'diagnostics.{}': {}", code, e))?;
            if code == "all" {
                fallback = handling;
            } else {
                let code: DiagnosticCode = code
                    .parse()
                    .map_err(|e: String| anyhow!("Invalid 'diagnostics' entry: {}", e))?;
                handling_overrides.insert(code, handling);
            }
        }

        for (locale, patterns) in &config.external_locales {
            for pattern in patterns {
                glob::Pattern::new(pattern).with_context(|| {
                    format!(
                        "Invalid glob pattern in 'externalLocales.{}': \"{}\"",
                        locale, pattern
                    )
                })?;
            }
        }

        let localize = config
            .localize
            .iter()
            .map(|(tag, element)| {
                (
                    tag.to_ascii_lowercase(),
                    ElementLocalize {
                        content: element.content,
                        attributes: element
                            .attributes
                            .iter()
                            .map(|a| a.to_ascii_lowercase())
                            .collect(),
                    },
                )
            })
            .collect();

        Ok(Self {
            base_dir: base_dir.to_path_buf(),
            src_root: base_dir.join(&config.src),
            translation_data_path: base_dir.join(&config.translation_data),
            output_template: config.output.clone(),
            key_prefix: config.prefix.clone(),
            source_locale: config.locales.source.clone(),
            locales,
            handling: HandlingPolicy::new(handling_overrides, fallback),
            external_locales: config.external_locales.clone(),
            localize,
            whitespace: config.whitespace.clone(),
            ignored_elements: config
                .ignore
                .elements
                .iter()
                .map(|t| t.to_ascii_lowercase())
                .collect(),
            ignored_texts,
        })
    }

    /// The localization rules for a tag, falling back to `"*"`.
    pub fn localized_element(&self, tag: &str) -> Option<&ElementLocalize> {
        self.localize
            .get(tag)
            .or_else(|| self.localize.get(WILDCARD))
    }

    pub fn ignore_element(&self, tag: &str) -> bool {
        self.ignored_elements.contains(tag)
    }

    /// Whether a text node is non-localizable (interpolation or a configured
    /// pattern).
    pub fn ignore_text(&self, text: &str) -> bool {
        contains_interpolation(text) || self.ignored_texts.iter().any(|re| re.is_match(text))
    }

    /// Whether an attribute value is non-localizable.
    pub fn ignore_attribute_value(&self, value: &str) -> bool {
        contains_interpolation(value)
    }

    /// Whitespace policy for one `(element, target)` pair; target is an
    /// attribute name or `text`/`html`. Falls back through the `"*"`
    /// wildcards to `Preserve`.
    pub fn whitespace_handling(&self, tag: &str, target: &str) -> WhitespaceHandling {
        let entry = self
            .whitespace
            .get(tag)
            .or_else(|| self.whitespace.get(WILDCARD));
        match entry {
            Some(WhitespaceConfig::Policy(policy)) => *policy,
            Some(WhitespaceConfig::PerTarget(map)) => map
                .get(target)
                .or_else(|| map.get(WILDCARD))
                .copied()
                .unwrap_or(WhitespaceHandling::Preserve),
            None => WhitespaceHandling::Preserve,
        }
    }

    /// Derive the key prefix for a source file under the source root.
    ///
    /// `src/userList.html` with prefix `app.` becomes `app.user-list.`;
    /// `src/cart/index.html` takes its directory name, `app.cart.`.
    pub fn prefix_for(&self, filename: &Path) -> Result<String> {
        let relative = filename.strip_prefix(&self.src_root).map_err(|_| {
            anyhow!(
                "source file {} is outside the source root {}",
                filename.display(),
                self.src_root.display()
            )
        })?;
        let stem = relative
            .file_stem()
            .ok_or_else(|| anyhow!("source file {} has no name", filename.display()))?
            .to_string_lossy()
            .to_string();
        let directly_in_root = relative
            .parent()
            .map(|p| p.as_os_str().is_empty())
            .unwrap_or(true);
        let base = if stem == "index" && !directly_in_root {
            relative
                .parent()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or(stem)
        } else {
            stem
        };
        Ok(format!("{}{}.", self.key_prefix, sanitize_prefix_part(&base)))
    }
}

/// camelCase → kebab, then every run of characters outside `[A-Za-z0-9.]`
/// becomes a single `-`, lowercased.
fn sanitize_prefix_part(name: &str) -> String {
    let mut kebab = String::with_capacity(name.len() + 4);
    let mut prev_lower_or_digit = false;
    for c in name.chars() {
        if c.is_ascii_uppercase() && prev_lower_or_digit {
            kebab.push('-');
        }
        prev_lower_or_digit = c.is_ascii_lowercase() || c.is_ascii_digit();
        kebab.push(c);
    }

    let mut out = String::with_capacity(kebab.len());
    let mut in_run = false;
    for c in kebab.chars() {
        if c.is_ascii_alphanumeric() || c == '.' {
            out.push(c.to_ascii_lowercase());
            in_run = false;
        } else if !in_run {
            out.push('-');
            in_run = true;
        }
    }
    out
}

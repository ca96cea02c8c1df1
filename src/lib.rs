//! Localization toolchain for `t`-attribute template projects.
//!
//! The pipeline extracts human-readable strings from HTML-like templates and
//! JSON resource files, assigns each string a stable dotted key, keeps the
//! canonical translation database (`i18n.json`) in sync with the source
//! tree, and compiles per-locale bundles merged with translations shipped by
//! third-party packages.
//!
//! The interesting part is key *justification*: templates are minimally
//! edited in place so that every localized element carries a valid,
//! project-unique key with the right file-derived prefix, while existing
//! translations follow their strings through renames.

pub mod cli;
pub mod config;
pub mod db;
pub mod diagnostics;
pub mod externals;
pub mod html;
pub mod locale;
pub mod pairset;
pub mod project;
pub mod report;
pub mod source;
pub mod tattr;

//! The canonical translation database: per-file, per-key source strings and
//! translations, the obsolete ledger, and the deterministic on-disk format.

pub mod data;
pub mod format;

pub use data::{FileRecord, ObsoleteEntry, TranslationData, TranslationEntry, TranslationSet};
pub use format::{format_json, format_timestamp, now_ms, parse, parse_timestamp};

//! Report formatting and printing utilities.
//!
//! Displays diagnostics in cargo-style format. Separate from core logic so
//! the pipeline can be used as a library without pulling in terminal output.

use std::io::{self, Write};

use colored::Colorize;
use unicode_width::UnicodeWidthStr;

use crate::diagnostics::{Diagnostic, DiagnosticReport, Handling};

/// Success mark for consistent output formatting.
pub const SUCCESS_MARK: &str = "\u{2713}"; // ✓

/// Failure mark for consistent output formatting.
pub const FAILURE_MARK: &str = "\u{2718}"; // ✘

/// A diagnostic together with its configured handling. `Ignore` entries are
/// expected to be dropped before reporting.
#[derive(Debug, Clone)]
pub struct ResolvedDiagnostic {
    pub diagnostic: Diagnostic,
    pub handling: Handling,
}

/// Print diagnostics in cargo-style format to stderr.
pub fn report(items: &[ResolvedDiagnostic]) {
    report_to(items, &mut io::stderr().lock());
}

/// Print diagnostics to a custom writer. Useful for testing or redirecting
/// output.
pub fn report_to<W: Write>(items: &[ResolvedDiagnostic], writer: &mut W) {
    if items.is_empty() {
        return;
    }

    let mut sorted = items.to_vec();
    sorted.sort_by(compare_items);

    let max_line_width = calculate_max_line_width(&sorted);
    for item in &sorted {
        print_item(item, writer, max_line_width);
    }
    print_summary(&sorted, writer);
}

/// Print a success message when a run produced no reportable diagnostics.
pub fn print_success(source_files: usize, locales: usize) {
    print_success_to(source_files, locales, &mut io::stdout().lock());
}

pub fn print_success_to<W: Write>(source_files: usize, locales: usize, writer: &mut W) {
    let message = format!(
        "Processed {} source {}, compiled {} {} - no issues found",
        source_files,
        if source_files == 1 { "file" } else { "files" },
        locales,
        if locales == 1 { "locale" } else { "locales" },
    );
    let _ = writeln!(writer, "{} {}", SUCCESS_MARK.green(), message.green());
}

// ============================================================
// Internal Functions
// ============================================================

fn print_item<W: Write>(item: &ResolvedDiagnostic, writer: &mut W, max_line_width: usize) {
    let diagnostic = &item.diagnostic;
    let severity_str = match item.handling {
        Handling::Error => "error".bold().red(),
        _ => "warning".bold().yellow(),
    };

    let _ = writeln!(
        writer,
        "{}: {}  {}",
        severity_str,
        diagnostic.message(),
        diagnostic.code().to_string().dimmed().cyan()
    );

    // Clickable location: --> path:line:col
    if let Some(location) = diagnostic.location() {
        let _ = writeln!(
            writer,
            "  {} {}:{}:{}",
            "-->".blue(),
            location.filename,
            location.start.line,
            location.start.col
        );
        if let Some(line_text) = &location.line_text {
            print_source_context(item, line_text, writer, max_line_width);
        }
    } else if let Some(filename) = diagnostic.filename() {
        let _ = writeln!(writer, "  {} {}", "-->".blue(), filename);
    }

    if let Some(details) = diagnostic.details() {
        let _ = writeln!(
            writer,
            "{:>width$} {} {} {}",
            "",
            "=".blue(),
            "note:".bold(),
            details,
            width = max_line_width
        );
    }

    let _ = writeln!(writer);
}

fn print_source_context<W: Write>(
    item: &ResolvedDiagnostic,
    line_text: &str,
    writer: &mut W,
    max_line_width: usize,
) {
    let location = match item.diagnostic.location() {
        Some(location) => location,
        None => return,
    };
    let caret = match item.handling {
        Handling::Error => "^".red(),
        _ => "^".yellow(),
    };

    let _ = writeln!(
        writer,
        "{:>width$} {}",
        "",
        "|".blue(),
        width = max_line_width
    );
    let _ = writeln!(
        writer,
        "{:>width$} {} {}",
        location.start.line.to_string().blue(),
        "|".blue(),
        line_text,
        width = max_line_width
    );

    // Caret aligned by display width, not byte or char count.
    let col = location.start.col;
    let prefix: String = line_text.chars().take(col.saturating_sub(1)).collect();
    let padding = UnicodeWidthStr::width(prefix.as_str());
    let span_cols = if location.end.line == location.start.line {
        location.end.col.saturating_sub(col).max(1)
    } else {
        1
    };
    let _ = writeln!(
        writer,
        "{:>width$} {} {:>padding$}{}",
        "",
        "|".blue(),
        "",
        caret.to_string().repeat(span_cols),
        width = max_line_width,
        padding = padding
    );
}

fn print_summary<W: Write>(items: &[ResolvedDiagnostic], writer: &mut W) {
    let errors = items
        .iter()
        .filter(|i| i.handling == Handling::Error)
        .count();
    let warnings = items.len() - errors;
    let _ = writeln!(
        writer,
        "{} {} problems ({} {}, {} {})",
        FAILURE_MARK.red(),
        items.len(),
        errors,
        if errors == 1 { "error" } else { "errors" }.red(),
        warnings,
        if warnings == 1 { "warning" } else { "warnings" }.yellow()
    );
}

fn calculate_max_line_width(items: &[ResolvedDiagnostic]) -> usize {
    items
        .iter()
        .filter_map(|i| i.diagnostic.location().map(|l| l.start.line))
        .max()
        .map(|line| line.to_string().len())
        .unwrap_or(1)
}

fn compare_items(a: &ResolvedDiagnostic, b: &ResolvedDiagnostic) -> std::cmp::Ordering {
    let key = |item: &ResolvedDiagnostic| {
        let location = item.diagnostic.location();
        (
            item.diagnostic.filename().unwrap_or("").to_string(),
            location.map(|l| l.start.line).unwrap_or(0),
            location.map(|l| l.start.col).unwrap_or(0),
            item.diagnostic.message(),
        )
    };
    key(a).cmp(&key(b))
}

// ============================================================
// Tests
// ============================================================

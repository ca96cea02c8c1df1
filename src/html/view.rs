//! Read-side helpers over a parsed fragment: element traversal with subtree
//! pruning, element content analysis, and offset-to-line/column mapping.

use super::ast::{Document, Element, Node};

/// Collect elements in document order, skipping (and not descending into)
/// any element whose tag name the predicate matches.
pub fn elements<'a>(
    document: &'a Document,
    ignore_tag: &dyn Fn(&str) -> bool,
) -> Vec<&'a Element> {
    let mut out = Vec::new();
    collect(&document.children, ignore_tag, &mut out);
    out
}

fn collect<'a>(
    nodes: &'a [Node],
    ignore_tag: &dyn Fn(&str) -> bool,
    out: &mut Vec<&'a Element>,
) {
    for node in nodes {
        if let Node::Element(element) = node {
            if ignore_tag(&element.name) {
                continue;
            }
            out.push(element);
            collect(&element.children, ignore_tag, out);
        }
    }
}

/// Summary of an element's direct content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentAnalysis {
    /// Concatenation of the non-ignored direct text nodes.
    pub text: String,
    /// Whether any non-ignored direct text node has non-whitespace content.
    pub has_text: bool,
    /// Whether the element has any direct child element.
    pub has_elements: bool,
}

pub fn analyze_content(
    element: &Element,
    ignore_text: &dyn Fn(&str) -> bool,
) -> ContentAnalysis {
    let mut text = String::new();
    let mut has_text = false;
    let mut has_elements = false;
    for child in &element.children {
        match child {
            Node::Text(t) => {
                if ignore_text(&t.value) {
                    continue;
                }
                if !t.value.trim().is_empty() {
                    has_text = true;
                }
                text.push_str(&t.value);
            }
            Node::Element(_) => has_elements = true,
            _ => {}
        }
    }
    ContentAnalysis {
        text,
        has_text,
        has_elements,
    }
}

/// Byte offsets where each line starts; line 1 starts at offset 0.
///
/// Lookup is a binary search, so mapping a span to line/column is cheap even
/// for large templates.
#[derive(Debug, Clone)]
pub struct LineIndex {
    offsets: Vec<usize>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut offsets = vec![0];
        for (i, c) in text.char_indices() {
            if c == '\n' {
                offsets.push(i + 1);
            }
        }
        Self { offsets }
    }

    /// 1-based (line, column) for a byte offset. Columns count characters,
    /// not bytes.
    pub fn position(&self, text: &str, offset: usize) -> (usize, usize) {
        let line = match self.offsets.binary_search(&offset) {
            Ok(idx) => idx + 1,
            Err(idx) => idx,
        };
        let line_start = self.offsets[line - 1];
        let col = text[line_start..offset.min(text.len())].chars().count() + 1;
        (line, col)
    }

    /// The full text of the line containing `offset`, without its newline.
    pub fn line_text<'a>(&self, text: &'a str, offset: usize) -> &'a str {
        let line = match self.offsets.binary_search(&offset) {
            Ok(idx) => idx + 1,
            Err(idx) => idx,
        };
        let start = self.offsets[line - 1];
        let end = self
            .offsets
            .get(line)
            .map(|next| next - 1)
            .unwrap_or(text.len());
        &text[start..end.max(start)]
    }
}

//! Tokenizer for HTML-like template fragments.
//!
//! Non-scripting, recovery-oriented: malformed input never fails, it just
//! degrades to text tokens. Every token records its byte span so the parser
//! can build a tree whose offsets line up exactly with the source bytes.

use super::ast::{Attribute, Span};

#[derive(Debug, Clone)]
pub enum Token {
    TagOpen {
        /// Lowercased tag name.
        name: String,
        attributes: Vec<Attribute>,
        self_closing: bool,
        span: Span,
    },
    TagClose {
        /// Lowercased tag name.
        name: String,
        span: Span,
    },
    Text {
        /// Entity-decoded text.
        value: String,
        span: Span,
    },
    Comment {
        span: Span,
    },
    Doctype {
        span: Span,
    },
}

/// Elements whose content is consumed as raw text until the matching close
/// tag. `script`/`style` take the text verbatim; `textarea`/`title` decode
/// character references.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];
const ESCAPABLE_RAW_TEXT_ELEMENTS: &[&str] = &["textarea", "title"];

pub fn is_raw_text_element(name: &str) -> bool {
    RAW_TEXT_ELEMENTS.contains(&name) || ESCAPABLE_RAW_TEXT_ELEMENTS.contains(&name)
}

pub fn tokenize(input: &str) -> Vec<Token> {
    Lexer::new(input).run()
}

struct Lexer<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
            tokens: Vec::new(),
        }
    }

    fn run(mut self) -> Vec<Token> {
        while self.pos < self.bytes.len() {
            if self.peek() == b'<' {
                self.consume_markup();
            } else {
                self.consume_text();
            }
        }
        self.tokens
    }

    fn peek(&self) -> u8 {
        self.bytes[self.pos]
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn starts_with(&self, s: &str) -> bool {
        self.input[self.pos..].starts_with(s)
    }

    fn consume_text(&mut self) {
        let start = self.pos;
        while self.pos < self.bytes.len() {
            if self.peek() == b'<' && self.markup_follows() {
                break;
            }
            self.pos += 1;
        }
        // A lone '<' that does not open markup is literal text.
        if self.pos == start {
            self.pos += 1;
            while self.pos < self.bytes.len()
                && !(self.peek() == b'<' && self.markup_follows())
            {
                self.pos += 1;
            }
        }
        let span = Span::new(start, self.pos);
        self.tokens.push(Token::Text {
            value: decode_entities(&self.input[span.start..span.end]),
            span,
        });
    }

    /// Whether the `<` at the current position actually starts markup.
    fn markup_follows(&self) -> bool {
        match self.peek_at(1) {
            Some(c) if c.is_ascii_alphabetic() => true,
            Some(b'/') | Some(b'!') => true,
            _ => false,
        }
    }

    fn consume_markup(&mut self) {
        if self.starts_with("<!--") {
            self.consume_comment();
        } else if self.starts_with("<!") {
            self.consume_doctype();
        } else if self.starts_with("</") {
            self.consume_close_tag();
        } else if self.peek_at(1).is_some_and(|c| c.is_ascii_alphabetic()) {
            self.consume_open_tag();
        } else {
            self.consume_text();
        }
    }

    fn consume_comment(&mut self) {
        let start = self.pos;
        self.pos += 4; // <!--
        match self.input[self.pos..].find("-->") {
            Some(idx) => self.pos += idx + 3,
            None => self.pos = self.bytes.len(),
        }
        self.tokens.push(Token::Comment {
            span: Span::new(start, self.pos),
        });
    }

    fn consume_doctype(&mut self) {
        let start = self.pos;
        self.pos += 2; // <!
        match self.input[self.pos..].find('>') {
            Some(idx) => self.pos += idx + 1,
            None => self.pos = self.bytes.len(),
        }
        self.tokens.push(Token::Doctype {
            span: Span::new(start, self.pos),
        });
    }

    fn consume_close_tag(&mut self) {
        let start = self.pos;
        self.pos += 2; // </
        let name = self.consume_tag_name();
        // Anything up to the closing '>' is discarded (recovery).
        match self.input[self.pos..].find('>') {
            Some(idx) => self.pos += idx + 1,
            None => self.pos = self.bytes.len(),
        }
        self.tokens.push(Token::TagClose {
            name,
            span: Span::new(start, self.pos),
        });
    }

    fn consume_open_tag(&mut self) {
        let start = self.pos;
        self.pos += 1; // <
        let name = self.consume_tag_name();
        let mut attributes = Vec::new();
        let mut self_closing = false;

        loop {
            self.skip_whitespace();
            match self.peek_at(0) {
                None => break,
                Some(b'>') => {
                    self.pos += 1;
                    break;
                }
                Some(b'/') if self.peek_at(1) == Some(b'>') => {
                    self_closing = true;
                    self.pos += 2;
                    break;
                }
                Some(b'/') => {
                    // Stray slash, skip it.
                    self.pos += 1;
                }
                Some(_) => {
                    if let Some(attr) = self.consume_attribute() {
                        attributes.push(attr);
                    }
                }
            }
        }

        let span = Span::new(start, self.pos);
        self.tokens.push(Token::TagOpen {
            name: name.clone(),
            attributes,
            self_closing,
            span,
        });

        if !self_closing && is_raw_text_element(&name) {
            self.consume_raw_text(&name);
        }
    }

    fn consume_tag_name(&mut self) -> String {
        let start = self.pos;
        while self.pos < self.bytes.len() {
            let c = self.peek();
            if c.is_ascii_alphanumeric() || c == b'-' || c == b':' {
                self.pos += 1;
            } else {
                break;
            }
        }
        self.input[start..self.pos].to_ascii_lowercase()
    }

    fn consume_attribute(&mut self) -> Option<Attribute> {
        let name_start = self.pos;
        while self.pos < self.bytes.len() {
            let c = self.peek();
            if c.is_ascii_whitespace() || c == b'=' || c == b'>' || c == b'/' {
                break;
            }
            self.pos += 1;
        }
        if self.pos == name_start {
            // Cannot make progress; swallow one byte to avoid looping.
            self.pos += 1;
            return None;
        }
        let name = self.input[name_start..self.pos].to_string();

        self.skip_whitespace();
        if self.peek_at(0) != Some(b'=') {
            let span = Span::new(name_start, name_start + name.len());
            return Some(Attribute {
                name,
                value: String::new(),
                span,
                value_span: None,
            });
        }
        self.pos += 1; // =
        self.skip_whitespace();

        let (value_span, end) = match self.peek_at(0) {
            Some(quote @ (b'"' | b'\'')) => {
                self.pos += 1;
                let value_start = self.pos;
                while self.pos < self.bytes.len() && self.peek() != quote {
                    self.pos += 1;
                }
                let value_end = self.pos;
                if self.pos < self.bytes.len() {
                    self.pos += 1; // closing quote
                }
                (Span::new(value_start, value_end), self.pos)
            }
            _ => {
                let value_start = self.pos;
                while self.pos < self.bytes.len() {
                    let c = self.peek();
                    if c.is_ascii_whitespace() || c == b'>' {
                        break;
                    }
                    if c == b'/' && self.peek_at(1) == Some(b'>') {
                        break;
                    }
                    self.pos += 1;
                }
                (Span::new(value_start, self.pos), self.pos)
            }
        };

        Some(Attribute {
            name,
            value: decode_entities(&self.input[value_span.start..value_span.end]),
            span: Span::new(name_start, end),
            value_span: Some(value_span),
        })
    }

    fn consume_raw_text(&mut self, name: &str) {
        let start = self.pos;
        let mut end = self.bytes.len();
        let mut close_at = None;
        let lower = self.input.to_ascii_lowercase();
        let needle = format!("</{}", name);
        if let Some(idx) = lower[self.pos..].find(&needle) {
            end = self.pos + idx;
            close_at = Some(end);
        }
        if end > start {
            let raw = &self.input[start..end];
            let value = if ESCAPABLE_RAW_TEXT_ELEMENTS.contains(&name) {
                decode_entities(raw)
            } else {
                raw.to_string()
            };
            self.tokens.push(Token::Text {
                value,
                span: Span::new(start, end),
            });
        }
        self.pos = end;
        if close_at.is_some() {
            self.consume_close_tag();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.bytes.len() && self.peek().is_ascii_whitespace() {
            self.pos += 1;
        }
    }
}

/// Decode character references. The five named entities and numeric
/// references are resolved; anything unrecognized passes through verbatim.
pub fn decode_entities(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        match decode_one_entity(tail) {
            Some((decoded, consumed)) => {
                out.push_str(&decoded);
                rest = &tail[consumed..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_one_entity(tail: &str) -> Option<(String, usize)> {
    const NAMED: &[(&str, char)] = &[
        ("&amp;", '&'),
        ("&lt;", '<'),
        ("&gt;", '>'),
        ("&quot;", '"'),
        ("&apos;", '\''),
    ];
    for (name, ch) in NAMED {
        if tail.starts_with(name) {
            return Some((ch.to_string(), name.len()));
        }
    }
    if let Some(body) = tail.strip_prefix("&#") {
        let semi = body.find(';')?;
        let digits = &body[..semi];
        let code = if let Some(hex) = digits.strip_prefix('x').or_else(|| digits.strip_prefix('X'))
        {
            u32::from_str_radix(hex, 16).ok()?
        } else {
            digits.parse::<u32>().ok()?
        };
        let ch = char::from_u32(code)?;
        return Some((ch.to_string(), semi + 3));
    }
    None
}

//! Fragment parser: assembles the token stream into a [`Document`].
//!
//! Recovery rules: void and self-closing elements never take children; an end
//! tag closes the nearest matching open element (implicitly closing anything
//! opened in between); stray end tags are dropped; everything still open at
//! the end of input is closed without an end-tag span.

use super::ast::{Document, Element, Node, Span};
use super::lexer::{self, Token};

/// Elements that never have content.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta",
    "param", "source", "track", "wbr",
];

pub fn is_void_element(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name)
}

pub fn parse(input: &str) -> Document {
    let tokens = lexer::tokenize(input);
    let mut parser = Parser {
        document: Document::default(),
        stack: Vec::new(),
    };
    for token in tokens {
        parser.push_token(token);
    }
    parser.finish()
}

struct Parser {
    document: Document,
    stack: Vec<Element>,
}

impl Parser {
    fn push_token(&mut self, token: Token) {
        match token {
            Token::TagOpen {
                name,
                attributes,
                self_closing,
                span,
            } => {
                let element = Element {
                    self_closing,
                    attributes,
                    children: Vec::new(),
                    start_tag: span,
                    end_tag: None,
                    name,
                };
                if self_closing || is_void_element(&element.name) {
                    self.append(Node::Element(element));
                } else {
                    self.stack.push(element);
                }
            }
            Token::TagClose { name, span } => self.close(&name, span),
            Token::Text { value, span } => {
                self.append(Node::Text(super::ast::Text { value, span }));
            }
            Token::Comment { span } => {
                self.append(Node::Comment(super::ast::Comment { span }));
            }
            Token::Doctype { span } => {
                self.append(Node::Doctype(super::ast::Doctype { span }));
            }
        }
    }

    fn append(&mut self, node: Node) {
        match self.stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => self.document.children.push(node),
        }
    }

    fn close(&mut self, name: &str, span: Span) {
        let matching = self.stack.iter().rposition(|e| e.name == name);
        let Some(index) = matching else {
            // Stray end tag.
            return;
        };
        while self.stack.len() > index + 1 {
            // Implicitly closed by an ancestor's end tag.
            let unclosed = self.stack.pop().expect("stack underflow");
            self.append(Node::Element(unclosed));
        }
        let mut element = self.stack.pop().expect("stack underflow");
        element.end_tag = Some(span);
        self.append(Node::Element(element));
    }

    fn finish(mut self) -> Document {
        while let Some(unclosed) = self.stack.pop() {
            self.append(Node::Element(unclosed));
        }
        self.document
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_element(doc: &Document) -> &Element {
        doc.children
            .iter()
            .find_map(|n| n.as_element())
            .expect("no element")
    }

    #[test]
    fn test_nested_tree() {
        let doc = parse("<div><span>a</span>b</div>");
        let div = first_element(&doc);
        assert_eq!(div.name, "div");
        assert_eq!(div.children.len(), 2);
        let span = div.children[0].as_element().unwrap();
        assert_eq!(span.name, "span");
    }

    #[test]
    fn test_start_and_end_tag_spans() {
        let input = "<div><b>x</b></div>";
        let doc = parse(input);
        let div = first_element(&doc);
        assert_eq!(&input[div.start_tag.start..div.start_tag.end], "<div>");
        let end = div.end_tag.unwrap();
        assert_eq!(&input[end.start..end.end], "</div>");
        assert_eq!(div.content_span(), Span::new(5, 13));
    }

    #[test]
    fn test_void_element_takes_no_children() {
        let doc = parse("<div><br>text</div>");
        let div = first_element(&doc);
        assert_eq!(div.children.len(), 2);
        let br = div.children[0].as_element().unwrap();
        assert_eq!(br.name, "br");
        assert!(br.children.is_empty());
    }

    #[test]
    fn test_self_closing_takes_no_children() {
        let doc = parse("<x-widget/><p>y</p>");
        assert_eq!(doc.children.len(), 2);
        assert!(doc.children[0].as_element().unwrap().children.is_empty());
    }

    #[test]
    fn test_stray_end_tag_dropped() {
        let doc = parse("</b><p>x</p>");
        assert_eq!(doc.children.len(), 1);
        assert_eq!(first_element(&doc).name, "p");
    }

    #[test]
    fn test_implicit_close_on_ancestor_end() {
        let doc = parse("<div><span>a</div>");
        let div = first_element(&doc);
        assert!(div.end_tag.is_some());
        let span = div.children[0].as_element().unwrap();
        assert_eq!(span.name, "span");
        assert!(span.end_tag.is_none());
    }

    #[test]
    fn test_unclosed_at_eof() {
        let doc = parse("<div><p>x");
        let div = first_element(&doc);
        assert!(div.end_tag.is_none());
        let p = div.children[0].as_element().unwrap();
        assert_eq!(p.children.len(), 1);
    }

    #[test]
    fn test_template_children_are_ordinary() {
        let doc = parse("<template><div>x</div></template>");
        let template = first_element(&doc);
        assert_eq!(template.name, "template");
        assert_eq!(template.children[0].as_element().unwrap().name, "div");
    }

    #[test]
    fn test_comments_kept_in_tree() {
        let doc = parse("<div><!-- note -->x</div>");
        let div = first_element(&doc);
        assert!(matches!(div.children[0], Node::Comment(_)));
    }
}

//! HTML fragment parser.
//!
//! Parses the markup the server renderer produces (elements, attributes,
//! text, comments, void elements, raw-text elements, templates with
//! declarative shadow roots) into a node tree. It is strict: unbalanced
//! markup is an error rather than something to repair.

use tracing::trace;

use super::node::Node;
use super::serialize::{is_raw_text, is_void};
use crate::error::ParseError;

/// Parse `html` into top-level nodes.
pub fn parse_fragment(html: &str) -> Result<Vec<Node>, ParseError> {
    let mut parser = Parser {
        input: html,
        pos: 0,
        roots: Vec::new(),
        open: Vec::new(),
    };
    parser.run()?;
    trace!(roots = parser.roots.len(), "parsed html fragment");
    Ok(parser.roots)
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
    roots: Vec<Node>,
    open: Vec<Node>,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn run(&mut self) -> Result<(), ParseError> {
        while self.pos < self.input.len() {
            let rest = self.rest();
            if rest.starts_with("<!--") {
                self.comment()?;
            } else if rest.starts_with("</") {
                self.close_tag()?;
            } else if rest.starts_with('<')
                && rest[1..].starts_with(|c: char| c.is_ascii_alphabetic())
            {
                self.open_tag()?;
            } else {
                self.text();
            }
        }
        match self.open.last() {
            Some(node) => Err(ParseError::UnclosedElement {
                name: node.tag_name().unwrap_or_default().to_string(),
            }),
            None => Ok(()),
        }
    }

    fn insert(&mut self, node: &Node) {
        match self.open.last() {
            Some(parent) => match parent.template_content() {
                Some(content) => content.append_child(node),
                None => parent.append_child(node),
            },
            None => self.roots.push(node.clone()),
        }
    }

    fn comment(&mut self) -> Result<(), ParseError> {
        let start = self.pos;
        let body = &self.input[start + 4..];
        let end = body
            .find("-->")
            .ok_or(ParseError::UnterminatedComment { offset: start })?;
        let node = Node::comment(&body[..end]);
        self.pos = start + 4 + end + 3;
        self.insert(&node);
        Ok(())
    }

    fn text(&mut self) {
        let rest = self.rest();
        // A lone '<' that does not start markup is text.
        let first = rest.chars().next().map_or(0, char::len_utf8);
        let end = rest[first..]
            .find('<')
            .map_or(rest.len(), |i| i + first);
        let raw = &rest[..end];
        self.pos += end;
        let node = Node::text(decode_entities(raw));
        self.insert(&node);
    }

    fn close_tag(&mut self) -> Result<(), ParseError> {
        let start = self.pos;
        let rest = &self.input[start + 2..];
        let end = rest
            .find('>')
            .ok_or(ParseError::UnterminatedTag { offset: start })?;
        let name = rest[..end].trim().to_ascii_lowercase();
        self.pos = start + 2 + end + 1;

        let node = self
            .open
            .pop()
            .ok_or_else(|| ParseError::UnexpectedClose { found: name.clone() })?;
        let expected = node.tag_name().unwrap_or_default().to_string();
        if expected != name {
            return Err(ParseError::MismatchedClose {
                expected,
                found: name,
            });
        }
        if name == "template" {
            attach_declarative_shadow(&node);
        }
        Ok(())
    }

    fn open_tag(&mut self) -> Result<(), ParseError> {
        let start = self.pos;
        let bytes = self.input.as_bytes();
        let mut i = start + 1;
        while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'-') {
            i += 1;
        }
        let name = self.input[start + 1..i].to_ascii_lowercase();
        let element = Node::element(&name);
        let mut self_closing = false;

        loop {
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            match bytes.get(i) {
                None => return Err(ParseError::UnterminatedTag { offset: start }),
                Some(b'>') => {
                    i += 1;
                    break;
                }
                Some(b'/') if bytes.get(i + 1) == Some(&b'>') => {
                    self_closing = true;
                    i += 2;
                    break;
                }
                Some(_) => {}
            }

            let name_start = i;
            while i < bytes.len()
                && !bytes[i].is_ascii_whitespace()
                && !matches!(bytes[i], b'=' | b'>' | b'/')
            {
                i += 1;
            }
            if i == name_start {
                // Stray '/' inside a tag.
                i += 1;
                continue;
            }
            let attr_name = self.input[name_start..i].to_ascii_lowercase();

            let mut value = String::new();
            if bytes.get(i) == Some(&b'=') {
                i += 1;
                match bytes.get(i) {
                    Some(&quote @ (b'"' | b'\'')) => {
                        let value_start = i + 1;
                        let len = self.input[value_start..]
                            .find(quote as char)
                            .ok_or(ParseError::UnterminatedAttribute { offset: value_start })?;
                        value = decode_entities(&self.input[value_start..value_start + len]);
                        i = value_start + len + 1;
                    }
                    _ => {
                        let value_start = i;
                        while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>'
                        {
                            i += 1;
                        }
                        value = decode_entities(&self.input[value_start..i]);
                    }
                }
            }
            element.set_attribute(&attr_name, value);
        }
        self.pos = i;
        self.insert(&element);

        if is_void(&name) || self_closing {
            return Ok(());
        }
        if is_raw_text(&name) {
            return self.raw_text(&element, &name);
        }
        self.open.push(element);
        Ok(())
    }

    fn raw_text(&mut self, element: &Node, name: &str) -> Result<(), ParseError> {
        let close = format!("</{name}>");
        let rest = self.rest();
        let end = rest
            .to_ascii_lowercase()
            .find(&close)
            .ok_or_else(|| ParseError::UnclosedElement {
                name: name.to_string(),
            })?;
        if end > 0 {
            element.append_child(&Node::text(&rest[..end]));
        }
        self.pos += end + close.len();
        Ok(())
    }
}

/// Turn a closed `<template shadowrootmode>` into its parent's shadow root.
fn attach_declarative_shadow(template: &Node) {
    let Some(mode) = template.attribute("shadowrootmode") else {
        return;
    };
    let Some(host) = template.parent().filter(Node::is_element) else {
        return;
    };
    let shadow = host.attach_shadow(&mode);
    if let Some(content) = template.template_content() {
        for child in content.children() {
            shadow.append_child(&child);
        }
    }
    template.remove();
}

/// Decode named and numeric character references. Unknown references are
/// left as written.
pub fn decode_entities(text: &str) -> String {
    html_escape::decode_html_entities(text).into_owned()
}

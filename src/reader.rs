//! Streaming XML tokenizer
//!
//! `Reader` is a forward-only pull tokenizer: every call to
//! [`advance`](Cursor::advance) scans exactly one node (tag, text run,
//! CDATA section, or discarded markup) and the accessors report its state
//! until the next call. It carries an open-tag stack so each node knows its
//! nesting depth and so [`close`](Cursor::close) can tell whether the
//! stream ended cleanly.

mod scanner;

use std::fs;
use std::path::Path;

use crate::cursor::{Cursor, NodeKind};
use crate::error::{Error, ErrorKind, Pos, Result, Span};
use scanner::Scanner;

/// Streaming XML token source over an owned byte buffer
#[derive(Clone, Debug)]
pub struct Reader {
    scanner: Scanner,
    kind: NodeKind,
    name: String,
    text: String,
    depth: usize,
    self_closing: bool,
    attributes: Vec<(String, String)>,
    open: Vec<String>,
    failed: bool,
}

impl Reader {
    fn new(input: Vec<u8>) -> Self {
        Self {
            scanner: Scanner::new(input),
            kind: NodeKind::Other,
            name: String::new(),
            text: String::new(),
            depth: 0,
            self_closing: false,
            attributes: Vec::new(),
            open: Vec::new(),
            failed: false,
        }
    }

    /// Open a reader over the contents of a file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let input = fs::read(path).map_err(|err| {
            Error::with_message(
                ErrorKind::OpenFailed,
                Span::empty(),
                format!("{}: {err}", path.display()),
            )
        })?;
        Ok(Self::new(input))
    }

    /// Create a reader over a string
    pub fn from_str(input: &str) -> Self {
        Self::new(input.as_bytes().to_vec())
    }

    /// Create a reader over a byte slice
    pub fn from_bytes(input: &[u8]) -> Self {
        Self::new(input.to_vec())
    }

    fn clear_node(&mut self) {
        self.kind = NodeKind::Other;
        self.name.clear();
        self.text.clear();
        self.self_closing = false;
        self.attributes.clear();
    }

    fn read_node(&mut self) -> Result<()> {
        if self.scanner.current() == Some(b'<') {
            match self.scanner.peek(1) {
                Some(b'?') => self.read_processing_instruction(),
                Some(b'!') => self.read_markup_declaration(),
                Some(b'/') => self.read_end_tag(),
                Some(_) => self.read_start_tag(),
                None => Err(Error::at(
                    ErrorKind::UnexpectedEof,
                    self.scanner.position(),
                )),
            }
        } else {
            self.read_text()
        }
    }

    fn read_start_tag(&mut self) -> Result<()> {
        self.scanner.advance();
        self.name = self.read_name()?;
        self.read_attributes()?;

        if self.scanner.current() == Some(b'/') {
            self.scanner.advance();
            self.expect(b'>')?;
            self.self_closing = true;
        } else {
            self.expect(b'>')?;
        }

        self.kind = NodeKind::ElementStart;
        self.depth = self.open.len();
        if !self.self_closing {
            self.open.push(self.name.clone());
        }
        Ok(())
    }

    fn read_end_tag(&mut self) -> Result<()> {
        let at = self.scanner.position();
        self.scanner.advance_by(2);
        let name = self.read_name()?;
        self.scanner.skip_whitespace();
        self.expect(b'>')?;

        match self.open.pop() {
            Some(expected) if expected == name => {}
            Some(expected) => {
                return Err(Error::at(
                    ErrorKind::MismatchedTag {
                        expected,
                        found: name,
                    },
                    at,
                ));
            }
            None => {
                return Err(Error::with_message(
                    ErrorKind::MismatchedTag {
                        expected: String::new(),
                        found: name,
                    },
                    Span::new(at, at),
                    "closing tag with no open element",
                ));
            }
        }

        self.kind = NodeKind::ElementEnd;
        self.depth = self.open.len();
        self.name = name;
        Ok(())
    }

    fn read_attributes(&mut self) -> Result<()> {
        loop {
            self.scanner.skip_whitespace();
            match self.scanner.current() {
                Some(b'/' | b'>') => return Ok(()),
                Some(_) => {}
                None => {
                    return Err(Error::at(
                        ErrorKind::UnexpectedEof,
                        self.scanner.position(),
                    ));
                }
            }

            let name = self.read_name()?;
            self.scanner.skip_whitespace();
            self.expect(b'=')?;
            self.scanner.skip_whitespace();
            let value = self.read_quoted_value()?;

            // well-formed input cannot repeat an attribute name; if it
            // does, the last value wins and keeps the first position
            match self.attributes.iter_mut().find(|(n, _)| *n == name) {
                Some(entry) => entry.1 = value,
                None => self.attributes.push((name, value)),
            }
        }
    }

    fn read_quoted_value(&mut self) -> Result<String> {
        let quote = match self.scanner.current() {
            Some(q @ (b'"' | b'\'')) => q,
            Some(_) => {
                return Err(Error::with_message(
                    ErrorKind::InvalidToken,
                    self.span_here(),
                    "expected quoted attribute value",
                ));
            }
            None => {
                return Err(Error::at(
                    ErrorKind::UnexpectedEof,
                    self.scanner.position(),
                ));
            }
        };
        self.scanner.advance();

        let at = self.scanner.position();
        let start = self.scanner.pos();
        while let Some(b) = self.scanner.current() {
            if b == quote {
                let raw = bytes_to_string(self.scanner.slice_from(start), at)?;
                self.scanner.advance();
                return decode_entities(&raw, at);
            }
            self.scanner.advance();
        }

        Err(Error::with_message(
            ErrorKind::UnexpectedEof,
            Span::new(at, at),
            "unterminated attribute value",
        ))
    }

    fn read_text(&mut self) -> Result<()> {
        let at = self.scanner.position();
        let start = self.scanner.pos();
        while let Some(b) = self.scanner.current() {
            if b == b'<' {
                break;
            }
            self.scanner.advance();
        }

        let raw = bytes_to_string(self.scanner.slice_from(start), at)?;
        let text = decode_entities(&raw, at)?;

        self.kind = if text.trim().is_empty() {
            NodeKind::Whitespace
        } else {
            NodeKind::Text
        };
        self.depth = self.open.len();
        self.text = text;
        Ok(())
    }

    fn read_markup_declaration(&mut self) -> Result<()> {
        if self.scanner.starts_with(b"<!--") {
            self.scanner.advance_by(4);
            self.skip_until(b"-->", "unterminated comment")?;
            self.kind = NodeKind::Other;
            self.depth = self.open.len();
            return Ok(());
        }

        if self.scanner.starts_with(b"<![CDATA[") {
            self.scanner.advance_by(9);
            return self.read_cdata();
        }

        self.scanner.advance_by(2);
        self.skip_until(b">", "unterminated markup declaration")?;
        self.kind = NodeKind::Other;
        self.depth = self.open.len();
        Ok(())
    }

    fn read_processing_instruction(&mut self) -> Result<()> {
        self.scanner.advance_by(2);
        self.skip_until(b"?>", "unterminated processing instruction")?;
        self.kind = NodeKind::Other;
        self.depth = self.open.len();
        Ok(())
    }

    fn read_cdata(&mut self) -> Result<()> {
        let at = self.scanner.position();
        let start = self.scanner.pos();
        while !self.scanner.is_eof() {
            if self.scanner.starts_with(b"]]>") {
                let raw = bytes_to_string(self.scanner.slice_from(start), at)?;
                self.scanner.advance_by(3);
                self.kind = NodeKind::CData;
                self.depth = self.open.len();
                self.text = raw;
                return Ok(());
            }
            self.scanner.advance();
        }

        Err(Error::with_message(
            ErrorKind::UnexpectedEof,
            Span::new(at, at),
            "unterminated CDATA section",
        ))
    }

    fn read_name(&mut self) -> Result<String> {
        let at = self.scanner.position();
        let start = self.scanner.pos();

        let Some(first) = self.scanner.current() else {
            return Err(Error::at(ErrorKind::UnexpectedEof, at));
        };
        if !is_name_start(first) {
            return Err(Error::with_message(
                ErrorKind::InvalidToken,
                Span::new(at, at),
                "expected name",
            ));
        }

        self.scanner.advance();
        while let Some(b) = self.scanner.current() {
            if is_name_char(b) {
                self.scanner.advance();
            } else {
                break;
            }
        }

        bytes_to_string(self.scanner.slice_from(start), at)
    }

    fn skip_until(&mut self, pattern: &[u8], message: &str) -> Result<()> {
        let at = self.scanner.position();
        while !self.scanner.is_eof() {
            if self.scanner.starts_with(pattern) {
                self.scanner.advance_by(pattern.len());
                return Ok(());
            }
            self.scanner.advance();
        }
        Err(Error::with_message(
            ErrorKind::UnexpectedEof,
            Span::new(at, at),
            message,
        ))
    }

    fn expect(&mut self, expected: u8) -> Result<()> {
        match self.scanner.current() {
            Some(b) if b == expected => {
                self.scanner.advance();
                Ok(())
            }
            Some(_) => Err(Error::with_message(
                ErrorKind::InvalidToken,
                self.span_here(),
                format!("expected `{}`", char::from(expected)),
            )),
            None => Err(Error::at(
                ErrorKind::UnexpectedEof,
                self.scanner.position(),
            )),
        }
    }

    fn span_here(&self) -> Span {
        let pos = self.scanner.position();
        Span::new(pos, pos)
    }
}

impl Cursor for Reader {
    fn advance(&mut self) -> Result<bool> {
        self.clear_node();
        if self.scanner.is_eof() {
            return Ok(false);
        }
        match self.read_node() {
            Ok(()) => Ok(true),
            Err(err) => {
                self.failed = true;
                Err(err)
            }
        }
    }

    fn kind(&self) -> NodeKind {
        self.kind
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn text(&self) -> &str {
        &self.text
    }

    fn depth(&self) -> usize {
        self.depth
    }

    fn is_self_closing(&self) -> bool {
        self.self_closing
    }

    fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    fn close(&mut self) -> Result<()> {
        if self.failed {
            return Err(Error::with_message(
                ErrorKind::IncompleteParse,
                self.span_here(),
                "stream failed before completion",
            ));
        }
        if let Some(open) = self.open.last() {
            return Err(Error::with_message(
                ErrorKind::IncompleteParse,
                self.span_here(),
                format!("stream ended with `{open}` unclosed"),
            ));
        }
        Ok(())
    }
}

fn is_name_start(b: u8) -> bool {
    matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'_' | b':')
}

fn is_name_char(b: u8) -> bool {
    is_name_start(b) || matches!(b, b'0'..=b'9' | b'-' | b'.')
}

fn bytes_to_string(bytes: &[u8], at: Pos) -> Result<String> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|_| Error::at(ErrorKind::InvalidUtf8, at))
}

fn decode_entities(input: &str, at: Pos) -> Result<String> {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(ch) = chars.next() {
        if ch != '&' {
            result.push(ch);
            continue;
        }

        let mut entity = String::new();
        for next in chars.by_ref() {
            if next == ';' {
                break;
            }
            entity.push(next);
        }

        let decoded = match entity.as_str() {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => decode_numeric_entity(&entity),
        };

        match decoded {
            Some(ch) => result.push(ch),
            None => {
                return Err(Error::with_message(
                    ErrorKind::InvalidEntity,
                    Span::new(at, at),
                    format!("unknown entity `&{entity};`"),
                ));
            }
        }
    }

    Ok(result)
}

fn decode_numeric_entity(entity: &str) -> Option<char> {
    if let Some(hex) = entity.strip_prefix("#x") {
        u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
    } else if let Some(dec) = entity.strip_prefix('#') {
        dec.parse::<u32>().ok().and_then(char::from_u32)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(xml: &str) -> Result<Vec<(NodeKind, String, usize)>> {
        let mut reader = Reader::from_str(xml);
        let mut nodes = Vec::new();
        while reader.advance()? {
            let label = match reader.kind() {
                NodeKind::ElementStart | NodeKind::ElementEnd => reader.name().to_owned(),
                _ => reader.text().to_owned(),
            };
            nodes.push((reader.kind(), label, reader.depth()));
        }
        reader.close()?;
        Ok(nodes)
    }

    #[test]
    fn test_token_sequence() -> Result<()> {
        let nodes = drain("<a><b>hi</b></a>")?;
        assert_eq!(
            nodes,
            vec![
                (NodeKind::ElementStart, "a".to_string(), 0),
                (NodeKind::ElementStart, "b".to_string(), 1),
                (NodeKind::Text, "hi".to_string(), 2),
                (NodeKind::ElementEnd, "b".to_string(), 1),
                (NodeKind::ElementEnd, "a".to_string(), 0),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_self_closing_element() -> Result<()> {
        let mut reader = Reader::from_str("<a><b/></a>");
        assert!(reader.advance()?);
        assert!(!reader.is_self_closing());

        assert!(reader.advance()?);
        assert_eq!(reader.kind(), NodeKind::ElementStart);
        assert_eq!(reader.name(), "b");
        assert_eq!(reader.depth(), 1);
        assert!(reader.is_self_closing());

        // the self-closing element was never pushed on the open stack
        assert!(reader.advance()?);
        assert_eq!(reader.kind(), NodeKind::ElementEnd);
        assert_eq!(reader.name(), "a");
        assert_eq!(reader.depth(), 0);
        Ok(())
    }

    #[test]
    fn test_whitespace_classification() -> Result<()> {
        let nodes = drain("<a>\n  <b/>\n</a>")?;
        let kinds: Vec<NodeKind> = nodes.iter().map(|(k, _, _)| *k).collect();
        assert_eq!(
            kinds,
            vec![
                NodeKind::ElementStart,
                NodeKind::Whitespace,
                NodeKind::ElementStart,
                NodeKind::Whitespace,
                NodeKind::ElementEnd,
            ]
        );
        Ok(())
    }

    #[test]
    fn test_attribute_order_preserved() -> Result<()> {
        let mut reader = Reader::from_str("<a zeta=\"1\" alpha='2' mid=\"3\"/>");
        assert!(reader.advance()?);
        let names: Vec<&str> = reader.attributes().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
        Ok(())
    }

    #[test]
    fn test_duplicate_attribute_last_wins() -> Result<()> {
        let mut reader = Reader::from_str("<a x=\"1\" y=\"2\" x=\"3\"/>");
        assert!(reader.advance()?);
        assert_eq!(
            reader.attributes(),
            &[
                ("x".to_string(), "3".to_string()),
                ("y".to_string(), "2".to_string()),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_entity_decoding() -> Result<()> {
        let nodes = drain("<a>x &amp; y &lt;z&gt;</a>")?;
        assert_eq!(nodes[1].1, "x & y <z>");

        let mut reader = Reader::from_str("<a t=\"&quot;q&quot; &apos;a&apos;\"/>");
        assert!(reader.advance()?);
        assert_eq!(reader.attributes()[0].1, "\"q\" 'a'");
        Ok(())
    }

    #[test]
    fn test_numeric_entities() -> Result<()> {
        let nodes = drain("<a>&#65;&#x42;</a>")?;
        assert_eq!(nodes[1].1, "AB");
        Ok(())
    }

    #[test]
    fn test_invalid_entity() {
        let err = drain("<a>&bogus;</a>").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidEntity);
    }

    #[test]
    fn test_cdata_captured_raw() -> Result<()> {
        let nodes = drain("<a><![CDATA[<not> &amp; markup]]></a>")?;
        assert_eq!(nodes[1].0, NodeKind::CData);
        assert_eq!(nodes[1].1, "<not> &amp; markup");
        assert_eq!(nodes[1].2, 1);
        Ok(())
    }

    #[test]
    fn test_markup_discarded() -> Result<()> {
        let nodes = drain("<?xml version=\"1.0\"?><!DOCTYPE a><a><!-- note --></a>")?;
        let kinds: Vec<NodeKind> = nodes.iter().map(|(k, _, _)| *k).collect();
        assert_eq!(
            kinds,
            vec![
                NodeKind::Other,
                NodeKind::Other,
                NodeKind::ElementStart,
                NodeKind::Other,
                NodeKind::ElementEnd,
            ]
        );
        Ok(())
    }

    #[test]
    fn test_mismatched_closing_tag() {
        let err = drain("<a><b></a>").unwrap_err();
        assert_eq!(
            err.kind(),
            &ErrorKind::MismatchedTag {
                expected: "b".to_string(),
                found: "a".to_string(),
            }
        );
    }

    #[test]
    fn test_closing_tag_without_open_element() {
        let err = drain("</a>").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::MismatchedTag { .. }));
    }

    #[test]
    fn test_truncated_tag() {
        let err = drain("<a href=\"x").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::UnexpectedEof);

        let err = drain("<a><![CDATA[oops").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_invalid_utf8_in_text() {
        let mut reader = Reader::from_bytes(b"<a>\xff\xfe</a>");
        assert!(reader.advance().is_ok());
        let err = reader.advance().unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidUtf8);
    }

    #[test]
    fn test_close_reports_unclosed_elements() -> Result<()> {
        let mut reader = Reader::from_str("<a><b>text");
        while reader.advance()? {}
        let err = reader.close().unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::IncompleteParse);
        Ok(())
    }

    #[test]
    fn test_close_fails_after_read_error() {
        let mut reader = Reader::from_str("<a>&nope;</a>");
        assert!(reader.advance().is_ok());
        assert!(reader.advance().is_err());
        let err = reader.close().unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::IncompleteParse);
    }

    #[test]
    fn test_open_missing_file() {
        let err = Reader::open("/no/such/file.xml").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::OpenFailed);
    }
}

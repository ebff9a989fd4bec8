//! Line tokenizer for RFML files.
//!
//! RFML is line oriented, so every token is one whole line, trimmed of
//! surrounding whitespace and tagged with its 1-based line number. The
//! tokenizer only classifies lines by their leading marker; deciding what a
//! `-` line or a metadata key means is left to the parser, which knows the
//! block state.
//!
//! A single `Eof` token is emitted after the last line.

use crate::parser::{SyntaxError, SyntaxErrorKind};

const BOM: &str = "\u{feff}";

/// Line classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// `#! id`: text after the marker, trimmed.
    Identity(String),
    /// `# key: value`: split on the first `:`, both sides trimmed.
    Metadata { key: String, value: String },
    /// `#` line with no `:`.
    Comment,
    /// `- text`: text after the dash, trimmed.
    Dash(String),
    /// Any other non-blank line.
    Content,
    Blank,
    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub line: usize,
    pub kind: TokenKind,
    /// The whole line, trimmed.
    pub text: String,
}

impl Token {
    /// Text after the `#` with a single leading space removed. Used for
    /// description lines.
    pub fn comment_body(&self) -> &str {
        let body = self.text.strip_prefix('#').unwrap_or(&self.text);
        body.strip_prefix(' ').unwrap_or(body)
    }
}

/// Decodes raw file bytes. A UTF-8 BOM is dropped; invalid UTF-8 is reported
/// on the line holding the first bad byte.
pub fn decode(bytes: &[u8]) -> Result<&str, SyntaxError> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Ok(text.strip_prefix(BOM).unwrap_or(text)),
        Err(err) => {
            let valid = &bytes[..err.valid_up_to()];
            let line = valid.iter().filter(|b| **b == b'\n').count() + 1;
            Err(SyntaxError::new(line, SyntaxErrorKind::InvalidEncoding))
        }
    }
}

/// Iterator of line tokens over a decoded source.
pub struct Lexer<'a> {
    lines: std::str::Lines<'a>,
    line: usize,
    done: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            lines: source.lines(),
            line: 0,
            done: false,
        }
    }

    /// Convenience: every token, `Eof` included.
    pub fn tokenize(source: &'a str) -> Vec<Token> {
        Self::new(source).collect()
    }

    fn classify(line: &str) -> TokenKind {
        if line.is_empty() {
            return TokenKind::Blank;
        }
        if let Some(rest) = line.strip_prefix("#!") {
            return TokenKind::Identity(rest.trim().to_string());
        }
        if let Some(rest) = line.strip_prefix('#') {
            return match rest.split_once(':') {
                Some((key, value)) => TokenKind::Metadata {
                    key: key.trim().to_string(),
                    value: value.trim().to_string(),
                },
                None => TokenKind::Comment,
            };
        }
        if let Some(rest) = line.strip_prefix('-') {
            return TokenKind::Dash(rest.trim().to_string());
        }
        TokenKind::Content
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.done {
            return None;
        }

        match self.lines.next() {
            Some(raw) => {
                self.line += 1;
                let text = raw.trim();
                Some(Token {
                    line: self.line,
                    kind: Self::classify(text),
                    text: text.to_string(),
                })
            }
            None => {
                self.done = true;
                Some(Token {
                    line: self.line,
                    kind: TokenKind::Eof,
                    text: String::new(),
                })
            }
        }
    }
}

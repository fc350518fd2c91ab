//! ToUnicode CMaps
//!
//! Parses the `/ToUnicode` stream of a font (ISO 32000-1:2008 Section 9.10.3)
//! into a lookup from character codes to Unicode text. Only the operators a
//! ToUnicode CMap uses are interpreted: `begincodespacerange`, `beginbfchar`
//! and `beginbfrange`. Everything else in the PostScript wrapper is skipped.

use super::encoding::glyph_to_char;
use crate::parser::lexer::{Lexer, Token};
use crate::parser::ParseResult;
use std::collections::HashMap;

/// Character code range from `begincodespacerange`
#[derive(Debug, Clone, PartialEq)]
pub struct CodeRange {
    /// Start of the code range
    pub start: Vec<u8>,
    /// End of the code range
    pub end: Vec<u8>,
}

impl CodeRange {
    /// Check if a code is within this range
    pub fn contains(&self, code: &[u8]) -> bool {
        if code.len() != self.start.len() || code.len() != self.end.len() {
            return false;
        }

        code >= &self.start[..] && code <= &self.end[..]
    }
}

/// Destination of a `bfrange` entry
#[derive(Debug, Clone, PartialEq)]
enum RangeTarget {
    /// UTF-16BE start value, incremented for each code in the range
    Offset(Vec<u16>),
    /// One string per code
    List(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
struct RangeEntry {
    start: Vec<u8>,
    end: Vec<u8>,
    target: RangeTarget,
}

/// Code to Unicode mapping of a font
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToUnicodeMap {
    codespace: Vec<CodeRange>,
    singles: HashMap<Vec<u8>, String>,
    ranges: Vec<RangeEntry>,
}

impl ToUnicodeMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a decoded ToUnicode stream
    pub fn parse(data: &[u8]) -> ParseResult<Self> {
        let mut map = Self::new();
        let mut lexer = Lexer::new(data);

        while let Some(token) = lexer.next_token()? {
            let Token::Keyword(keyword) = token else {
                continue;
            };
            match keyword.as_str() {
                "begincodespacerange" => {
                    let tokens = read_section(&mut lexer, "endcodespacerange")?;
                    map.read_codespace(tokens);
                }
                "beginbfchar" => {
                    let tokens = read_section(&mut lexer, "endbfchar")?;
                    map.read_bfchar(tokens);
                }
                "beginbfrange" => {
                    let tokens = read_section(&mut lexer, "endbfrange")?;
                    map.read_bfrange(tokens);
                }
                _ => {}
            }
        }

        tracing::trace!(
            "Parsed ToUnicode CMap: {} codespace ranges, {} bfchar, {} bfrange",
            map.codespace.len(),
            map.singles.len(),
            map.ranges.len()
        );
        Ok(map)
    }

    /// Declared codespace ranges
    pub fn codespace(&self) -> &[CodeRange] {
        &self.codespace
    }

    /// Whether the map defines no mappings at all
    pub fn is_empty(&self) -> bool {
        self.singles.is_empty() && self.ranges.is_empty()
    }

    /// Add a single mapping
    pub fn insert(&mut self, code: Vec<u8>, text: impl Into<String>) {
        self.singles.insert(code, text.into());
    }

    /// Unicode text for one character code
    pub fn lookup(&self, code: &[u8]) -> Option<String> {
        if let Some(text) = self.singles.get(code) {
            return Some(text.clone());
        }

        let value = code_value(code);
        self.ranges.iter().find_map(|range| {
            if range.start.len() != code.len() {
                return None;
            }
            let start = code_value(&range.start);
            if value < start || value > code_value(&range.end) {
                return None;
            }
            let offset = value - start;
            match &range.target {
                RangeTarget::Offset(units) => {
                    let mut units = units.clone();
                    if let Some(last) = units.last_mut() {
                        *last = last.wrapping_add(offset as u16);
                    }
                    Some(String::from_utf16_lossy(&units))
                }
                RangeTarget::List(strings) => strings.get(offset as usize).cloned(),
            }
        })
    }

    /// Split a shown string into character codes.
    ///
    /// Code lengths come from the codespace ranges; without any the
    /// `default_length` is used for every code.
    pub fn split_codes<'b>(&self, data: &'b [u8], default_length: usize) -> Vec<&'b [u8]> {
        let fallback = self
            .codespace
            .iter()
            .map(|range| range.start.len())
            .min()
            .unwrap_or(default_length)
            .max(1);

        let mut codes = Vec::new();
        let mut position = 0;
        while position < data.len() {
            let length = if self.codespace.is_empty() {
                fallback
            } else {
                (1..=4)
                    .find(|&n| {
                        position + n <= data.len()
                            && self
                                .codespace
                                .iter()
                                .any(|range| range.contains(&data[position..position + n]))
                    })
                    .unwrap_or(fallback)
            };
            let end = (position + length).min(data.len());
            codes.push(&data[position..end]);
            position = end;
        }
        codes
    }

    fn read_codespace(&mut self, tokens: Vec<Token>) {
        let mut tokens = tokens.into_iter();
        while let (Some(Token::HexString(start)), Some(Token::HexString(end))) =
            (tokens.next(), tokens.next())
        {
            self.codespace.push(CodeRange { start, end });
        }
    }

    fn read_bfchar(&mut self, tokens: Vec<Token>) {
        let mut tokens = tokens.into_iter();
        while let (Some(Token::HexString(code)), Some(target)) = (tokens.next(), tokens.next()) {
            let text = match target {
                Token::HexString(bytes) => String::from_utf16_lossy(&utf16_units(&bytes)),
                Token::Name(name) => match glyph_to_char(&name) {
                    Some(ch) => ch.to_string(),
                    None => continue,
                },
                _ => break,
            };
            self.singles.insert(code, text);
        }
    }

    fn read_bfrange(&mut self, tokens: Vec<Token>) {
        let mut tokens = tokens.into_iter();
        while let (Some(Token::HexString(start)), Some(Token::HexString(end))) =
            (tokens.next(), tokens.next())
        {
            let target = match tokens.next() {
                Some(Token::HexString(bytes)) => RangeTarget::Offset(utf16_units(&bytes)),
                Some(Token::ArrayStart) => {
                    let mut strings = Vec::new();
                    for token in tokens.by_ref() {
                        match token {
                            Token::ArrayEnd => break,
                            Token::HexString(bytes) => {
                                strings.push(String::from_utf16_lossy(&utf16_units(&bytes)))
                            }
                            _ => {}
                        }
                    }
                    RangeTarget::List(strings)
                }
                _ => break,
            };
            self.ranges.push(RangeEntry { start, end, target });
        }
    }
}

fn read_section(lexer: &mut Lexer<'_>, end: &str) -> ParseResult<Vec<Token>> {
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next_token()? {
        if matches!(&token, Token::Keyword(keyword) if keyword == end) {
            break;
        }
        tokens.push(token);
    }
    Ok(tokens)
}

fn code_value(code: &[u8]) -> u32 {
    code.iter()
        .fold(0u32, |acc, &byte| acc.wrapping_shl(8) | u32::from(byte))
}

fn utf16_units(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks(2)
        .map(|pair| match pair {
            [high, low] => u16::from_be_bytes([*high, *low]),
            [single] => u16::from(*single),
            _ => 0,
        })
        .collect()
}

//! PDF Content Stream Parser
//!
//! Turns content stream bytes into a lazy sequence of operators according to
//! ISO 32000-1 Section 8 and 9. Text, graphics state and XObject operators
//! are decoded into typed variants; every other operator is kept as
//! [`ContentOperation::Other`] with its operands so consumers can skip it.

use super::lexer::{Lexer, Token};
use super::objects::{PdfArray, PdfDictionary, PdfName, PdfObject, PdfString};
use super::stack_safe::MAX_RECURSION_DEPTH;
use super::{ParseError, ParseResult};
use std::borrow::Cow;

/// Represents a single operator in a PDF content stream
#[derive(Debug, Clone, PartialEq)]
pub enum ContentOperation {
    // Text object operators
    BeginText, // BT
    EndText,   // ET

    // Text state operators
    SetCharSpacing(f64),       // Tc
    SetWordSpacing(f64),       // Tw
    SetHorizontalScaling(f64), // Tz
    SetLeading(f64),           // TL
    SetFont(String, f64),      // Tf
    SetTextRenderMode(i64),    // Tr
    SetTextRise(f64),          // Ts

    // Text positioning operators
    MoveText(f64, f64),                          // Td
    MoveTextSetLeading(f64, f64),                // TD
    SetTextMatrix(f64, f64, f64, f64, f64, f64), // Tm
    NextLine,                                    // T*

    // Text showing operators
    ShowText(Vec<u8>),                             // Tj
    ShowTextArray(Vec<TextElement>),               // TJ
    NextLineShowText(Vec<u8>),                     // '
    SetSpacingNextLineShowText(f64, f64, Vec<u8>), // " (word spacing, char spacing, text)

    // Graphics state operators
    SaveGraphicsState,                                // q
    RestoreGraphicsState,                             // Q
    SetTransformMatrix(f64, f64, f64, f64, f64, f64), // cm

    // XObjects
    PaintXObject(String), // Do

    /// Inline image; its data has been skipped
    InlineImage(PdfDictionary), // BI ... ID ... EI

    /// Any operator not listed above, or a listed one with unusable operands
    Other {
        operator: String,
        operands: Vec<PdfObject>,
    },
}

/// Element of a `TJ` array
#[derive(Debug, Clone, PartialEq)]
pub enum TextElement {
    /// String to show
    Text(Vec<u8>),
    /// Position adjustment in thousandths of text space
    Spacing(f64),
}

/// Lazy content stream parser.
///
/// Yields one operator per step. A tokenizer error is yielded once and ends
/// the iteration, so everything before it stays usable.
///
/// # Example
///
/// ```rust
/// use pdfgraph::parser::{ContentOperation, ContentParser};
///
/// let ops: Vec<_> = ContentParser::new(b"BT /F1 12 Tf (Hi) Tj ET")
///     .collect::<Result<_, _>>()
///     .unwrap();
/// assert_eq!(ops[2], ContentOperation::ShowText(b"Hi".to_vec()));
/// ```
#[derive(Debug, Clone)]
pub struct ContentParser<'a> {
    data: Cow<'a, [u8]>,
    position: usize,
    finished: bool,
}

impl<'a> ContentParser<'a> {
    /// Create a parser over borrowed content bytes
    pub fn new(content: &'a [u8]) -> Self {
        Self {
            data: Cow::Borrowed(content),
            position: 0,
            finished: false,
        }
    }

    /// Parse a whole content stream into a vector of operators
    pub fn parse(content: &[u8]) -> ParseResult<Vec<ContentOperation>> {
        ContentParser::new(content).collect()
    }

    /// Byte offset of the next unread token
    pub fn position(&self) -> usize {
        self.position
    }

    fn next_operation(&mut self) -> ParseResult<Option<ContentOperation>> {
        let data: &[u8] = &self.data;
        let mut lexer = Lexer::new(data);
        lexer.set_position(self.position);
        let mut operands = Vec::new();

        let operation = loop {
            let Some(token) = lexer.next_token()? else {
                if !operands.is_empty() {
                    tracing::debug!("Ignoring {} trailing operands", operands.len());
                }
                break None;
            };
            match token {
                Token::Keyword(keyword) => match keyword.as_str() {
                    "true" => operands.push(PdfObject::Boolean(true)),
                    "false" => operands.push(PdfObject::Boolean(false)),
                    "null" => operands.push(PdfObject::Null),
                    "BI" => break Some(read_inline_image(&mut lexer)?),
                    _ => break Some(build_operation(keyword, operands)),
                },
                other => operands.push(read_operand(&mut lexer, other, 0)?),
            }
        };

        self.position = lexer.position();
        Ok(operation)
    }
}

impl ContentParser<'static> {
    /// Create a parser that owns its content bytes
    pub fn from_owned(content: Vec<u8>) -> Self {
        Self {
            data: Cow::Owned(content),
            position: 0,
            finished: false,
        }
    }
}

impl Iterator for ContentParser<'_> {
    type Item = ParseResult<ContentOperation>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_operation() {
            Ok(Some(op)) => Some(Ok(op)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

fn read_operand(lexer: &mut Lexer<'_>, token: Token, depth: usize) -> ParseResult<PdfObject> {
    if depth > MAX_RECURSION_DEPTH {
        return Err(ParseError::SyntaxError {
            position: lexer.position(),
            message: "Operand nesting too deep".to_string(),
        });
    }
    match token {
        Token::Integer(i) => Ok(PdfObject::Integer(i)),
        Token::Real(r) => Ok(PdfObject::Real(r)),
        Token::String(s) | Token::HexString(s) => Ok(PdfObject::String(PdfString(s))),
        Token::Name(n) => Ok(PdfObject::Name(PdfName(n))),
        Token::ArrayStart => {
            let mut items = Vec::new();
            loop {
                match lexer.next_token()? {
                    Some(Token::ArrayEnd) => break,
                    Some(token) => items.push(read_operand(lexer, token, depth + 1)?),
                    None => return Err(unterminated(lexer, "array")),
                }
            }
            Ok(PdfObject::Array(PdfArray(items)))
        }
        Token::DictStart => Ok(PdfObject::Dictionary(read_dictionary(
            lexer,
            Token::DictEnd,
            depth,
        )?)),
        Token::Keyword(keyword) => match keyword.as_str() {
            "true" => Ok(PdfObject::Boolean(true)),
            "false" => Ok(PdfObject::Boolean(false)),
            "null" => Ok(PdfObject::Null),
            _ => Err(ParseError::UnexpectedToken {
                expected: "operand".to_string(),
                found: keyword,
            }),
        },
        other @ (Token::ArrayEnd | Token::DictEnd) => Err(ParseError::UnexpectedToken {
            expected: "operand".to_string(),
            found: format!("{other:?}"),
        }),
    }
}

/// Read `/Key value` pairs until `end`
fn read_dictionary(lexer: &mut Lexer<'_>, end: Token, depth: usize) -> ParseResult<PdfDictionary> {
    let mut dict = PdfDictionary::new();
    loop {
        match lexer.next_token()? {
            Some(token) if token == end => return Ok(dict),
            Some(Token::Name(key)) => {
                let value = match lexer.next_token()? {
                    Some(token) => read_operand(lexer, token, depth + 1)?,
                    None => return Err(unterminated(lexer, "dictionary")),
                };
                dict.insert(key, value);
            }
            Some(token) => {
                return Err(ParseError::UnexpectedToken {
                    expected: "dictionary key".to_string(),
                    found: format!("{token:?}"),
                })
            }
            None => return Err(unterminated(lexer, "dictionary")),
        }
    }
}

fn read_inline_image(lexer: &mut Lexer<'_>) -> ParseResult<ContentOperation> {
    let dict = read_dictionary(lexer, Token::Keyword("ID".to_string()), 0)?;
    lexer.skip_inline_image_data()?;
    Ok(ContentOperation::InlineImage(dict))
}

fn unterminated(lexer: &Lexer<'_>, what: &str) -> ParseError {
    ParseError::SyntaxError {
        position: lexer.position(),
        message: format!("Unterminated {what} in content stream"),
    }
}

/// Operand access from the end of the operand list
struct Operands<'o> {
    items: &'o [PdfObject],
}

impl<'o> Operands<'o> {
    /// The `n`-th of the last `count` operands
    fn get(&self, count: usize, n: usize) -> Option<&'o PdfObject> {
        let start = self.items.len().checked_sub(count)?;
        self.items.get(start + n)
    }

    fn number(&self, count: usize, n: usize) -> Option<f64> {
        self.get(count, n)?.as_real()
    }

    fn numbers<const N: usize>(&self) -> Option<[f64; N]> {
        let mut values = [0.0; N];
        for (i, slot) in values.iter_mut().enumerate() {
            *slot = self.number(N, i)?;
        }
        Some(values)
    }

    fn string(&self, count: usize, n: usize) -> Option<Vec<u8>> {
        self.get(count, n)?.as_string().map(|s| s.0.clone())
    }

    fn name(&self, count: usize, n: usize) -> Option<String> {
        self.get(count, n)?.as_name().map(|n| n.0.clone())
    }
}

fn build_operation(operator: String, operands: Vec<PdfObject>) -> ContentOperation {
    let args = Operands { items: &operands };
    let typed = match operator.as_str() {
        "BT" => Some(ContentOperation::BeginText),
        "ET" => Some(ContentOperation::EndText),

        "Tc" => args.number(1, 0).map(ContentOperation::SetCharSpacing),
        "Tw" => args.number(1, 0).map(ContentOperation::SetWordSpacing),
        "Tz" => args.number(1, 0).map(ContentOperation::SetHorizontalScaling),
        "TL" => args.number(1, 0).map(ContentOperation::SetLeading),
        "Tf" => args
            .name(2, 0)
            .zip(args.number(2, 1))
            .map(|(font, size)| ContentOperation::SetFont(font, size)),
        "Tr" => args
            .get(1, 0)
            .and_then(PdfObject::as_integer)
            .map(ContentOperation::SetTextRenderMode),
        "Ts" => args.number(1, 0).map(ContentOperation::SetTextRise),

        "Td" => args
            .numbers::<2>()
            .map(|[tx, ty]| ContentOperation::MoveText(tx, ty)),
        "TD" => args
            .numbers::<2>()
            .map(|[tx, ty]| ContentOperation::MoveTextSetLeading(tx, ty)),
        "Tm" => args
            .numbers::<6>()
            .map(|[a, b, c, d, e, f]| ContentOperation::SetTextMatrix(a, b, c, d, e, f)),
        "T*" => Some(ContentOperation::NextLine),

        "Tj" => args.string(1, 0).map(ContentOperation::ShowText),
        "TJ" => args
            .get(1, 0)
            .and_then(PdfObject::as_array)
            .map(|array| ContentOperation::ShowTextArray(text_elements(array))),
        "'" => args.string(1, 0).map(ContentOperation::NextLineShowText),
        "\"" => match (args.number(3, 0), args.number(3, 1), args.string(3, 2)) {
            (Some(aw), Some(ac), Some(text)) => {
                Some(ContentOperation::SetSpacingNextLineShowText(aw, ac, text))
            }
            _ => None,
        },

        "q" => Some(ContentOperation::SaveGraphicsState),
        "Q" => Some(ContentOperation::RestoreGraphicsState),
        "cm" => args
            .numbers::<6>()
            .map(|[a, b, c, d, e, f]| ContentOperation::SetTransformMatrix(a, b, c, d, e, f)),

        "Do" => args.name(1, 0).map(ContentOperation::PaintXObject),

        _ => None,
    };

    typed.unwrap_or_else(|| ContentOperation::Other { operator, operands })
}

fn text_elements(array: &PdfArray) -> Vec<TextElement> {
    array
        .0
        .iter()
        .filter_map(|item| match item {
            PdfObject::String(s) => Some(TextElement::Text(s.0.clone())),
            other => other.as_real().map(TextElement::Spacing),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_text_operators() {
        let content = b"BT /F1 12 Tf 100 200 Td (Hello World) Tj ET";
        let operators = ContentParser::parse(content).unwrap();

        assert_eq!(
            operators,
            vec![
                ContentOperation::BeginText,
                ContentOperation::SetFont("F1".to_string(), 12.0),
                ContentOperation::MoveText(100.0, 200.0),
                ContentOperation::ShowText(b"Hello World".to_vec()),
                ContentOperation::EndText,
            ]
        );
    }

    #[test]
    fn test_parse_show_text_variants() {
        let content = b"[(A) -250 (B) 12.5] TJ (C) ' 1 2 (D) \" T*";
        let operators = ContentParser::parse(content).unwrap();

        assert_eq!(
            operators,
            vec![
                ContentOperation::ShowTextArray(vec![
                    TextElement::Text(b"A".to_vec()),
                    TextElement::Spacing(-250.0),
                    TextElement::Text(b"B".to_vec()),
                    TextElement::Spacing(12.5),
                ]),
                ContentOperation::NextLineShowText(b"C".to_vec()),
                ContentOperation::SetSpacingNextLineShowText(1.0, 2.0, b"D".to_vec()),
                ContentOperation::NextLine,
            ]
        );
    }

    #[test]
    fn test_unknown_operators_are_kept_with_operands() {
        let content = b"0.5 g 0 0 100 100 re f /Im1 Do";
        let operators = ContentParser::parse(content).unwrap();

        assert_eq!(operators.len(), 4);
        assert_eq!(
            operators[0],
            ContentOperation::Other {
                operator: "g".to_string(),
                operands: vec![PdfObject::Real(0.5)],
            }
        );
        assert!(matches!(
            &operators[2],
            ContentOperation::Other { operator, operands } if operator == "f" && operands.is_empty()
        ));
        assert_eq!(operators[3], ContentOperation::PaintXObject("Im1".to_string()));
    }

    #[test]
    fn test_wrong_operand_types_become_other() {
        let operators = ContentParser::parse(b"/F1 Tj 12 /F1 Tf").unwrap();
        assert!(matches!(&operators[0], ContentOperation::Other { operator, .. } if operator == "Tj"));
        assert!(matches!(&operators[1], ContentOperation::Other { operator, .. } if operator == "Tf"));
    }

    #[test]
    fn test_marked_content_with_inline_dictionary() {
        let content = b"/Span << /ActualText (x) /MCID 3 >> BDC (y) Tj EMC";
        let operators = ContentParser::parse(content).unwrap();
        assert_eq!(operators.len(), 3);
        assert_eq!(operators[1], ContentOperation::ShowText(b"y".to_vec()));
    }

    #[test]
    fn test_inline_image_is_skipped() {
        let content = b"q BI /W 2 /H 1 /BPC 8 /CS /G ID \x00\xff EI Q (after) Tj";
        let operators = ContentParser::parse(content).unwrap();

        assert_eq!(operators.len(), 4);
        match &operators[1] {
            ContentOperation::InlineImage(dict) => {
                assert_eq!(dict.get("W"), Some(&PdfObject::Integer(2)));
            }
            other => panic!("Expected inline image, got {other:?}"),
        }
        assert_eq!(operators[3], ContentOperation::ShowText(b"after".to_vec()));
    }

    #[test]
    fn test_error_ends_iteration_after_valid_prefix() {
        let mut parser = ContentParser::new(b"(ok) Tj (broken");
        assert_eq!(
            parser.next().unwrap().unwrap(),
            ContentOperation::ShowText(b"ok".to_vec())
        );
        assert!(parser.next().unwrap().is_err());
        assert!(parser.next().is_none());
    }

    #[test]
    fn test_owned_parser() {
        let parser = ContentParser::from_owned(b"q Q".to_vec());
        let ops: Vec<_> = parser.map(Result::unwrap).collect();
        assert_eq!(
            ops,
            vec![
                ContentOperation::SaveGraphicsState,
                ContentOperation::RestoreGraphicsState
            ]
        );
    }

    #[test]
    fn test_trailing_operands_are_ignored() {
        let operators = ContentParser::parse(b"BT 1 2 3").unwrap();
        assert_eq!(operators, vec![ContentOperation::BeginText]);
    }
}

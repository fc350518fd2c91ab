//! PDF Object Model
//!
//! Definition nodes as produced by the object parser according to
//! ISO 32000-1 Section 7.3. A [`PdfObject::Reference`] only names an indirect
//! object; turning it into content is always an explicit call on the
//! [`Resolver`](super::Resolver).

use super::lexer::{Lexer, Token};
use super::stack_safe::MAX_RECURSION_DEPTH;
use super::{ParseError, ParseResult};
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;

/// Identity of an indirect object: object number plus generation number.
///
/// Objects with the same number but different generations are distinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId {
    pub number: u32,
    pub generation: u16,
}

impl ObjectId {
    /// Create an identity from an object number and generation number
    pub fn new(number: u32, generation: u16) -> Self {
        Self { number, generation }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.number, self.generation)
    }
}

impl From<(u32, u16)> for ObjectId {
    fn from((number, generation): (u32, u16)) -> Self {
        Self::new(number, generation)
    }
}

impl From<ObjectId> for (u32, u16) {
    fn from(id: ObjectId) -> Self {
        (id.number, id.generation)
    }
}

/// A node taken from an already parsed structure, used to build references
/// without reparsing anything.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Definition<'a> {
    /// A value standing on its own, expected to be a reference
    Direct(&'a PdfObject),
    /// A dictionary entry whose value is expected to be a reference
    Entry(&'a str, &'a PdfObject),
}

impl<'a> Definition<'a> {
    /// Borrow the entry `key` of `dict` as a definition node
    pub fn entry(dict: &'a PdfDictionary, key: &'a str) -> Option<Self> {
        dict.get(key).map(|value| Definition::Entry(key, value))
    }

    /// The node's value
    pub fn value(&self) -> &'a PdfObject {
        match self {
            Definition::Direct(value) | Definition::Entry(_, value) => value,
        }
    }
}

impl TryFrom<Definition<'_>> for ObjectId {
    type Error = ParseError;

    fn try_from(definition: Definition<'_>) -> Result<Self, Self::Error> {
        match definition.value() {
            PdfObject::Reference(id) => Ok(*id),
            other => Err(ParseError::UnexpectedToken {
                expected: match definition {
                    Definition::Direct(_) => "reference".to_string(),
                    Definition::Entry(key, _) => format!("reference for /{key}"),
                },
                found: other.type_name().to_string(),
            }),
        }
    }
}

/// PDF Name object
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PdfName(pub String);

impl Borrow<str> for PdfName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// PDF String object
#[derive(Debug, Clone, PartialEq)]
pub struct PdfString(pub Vec<u8>);

/// PDF Array object
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PdfArray(pub Vec<PdfObject>);

/// PDF Dictionary object
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PdfDictionary(pub HashMap<PdfName, PdfObject>);

/// PDF Stream object: the stream dictionary plus the undecoded bytes
/// between `stream` and `endstream`.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfStream {
    pub dict: PdfDictionary,
    pub data: Vec<u8>,
}

impl PdfStream {
    /// Get the decoded stream data
    pub fn decode(&self) -> ParseResult<Vec<u8>> {
        super::filters::decode_stream(self)
    }

    /// Get the raw (possibly compressed) stream data
    pub fn raw_data(&self) -> &[u8] {
        &self.data
    }
}

/// PDF Object types
#[derive(Debug, Clone, PartialEq)]
pub enum PdfObject {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    String(PdfString),
    Name(PdfName),
    Array(PdfArray),
    Dictionary(PdfDictionary),
    Stream(PdfStream),
    Reference(ObjectId),
}

impl PdfObject {
    /// Parse a single direct object.
    ///
    /// Stream lengths given as indirect references cannot be resolved here;
    /// such streams are delimited by their `endstream` keyword instead.
    pub fn parse(input: &[u8]) -> ParseResult<Self> {
        let mut parser = ObjectParser::new(input, |_| Ok(None));
        parser.parse_object()
    }

    /// Parse the body of an indirect object, with or without its
    /// `N G obj ... endobj` wrapper.
    ///
    /// Returns the identity declared in the header, if any. `stream_length`
    /// is consulted for `/Length` entries that are indirect references.
    pub fn parse_indirect<F>(
        input: &[u8],
        stream_length: F,
    ) -> ParseResult<(Option<ObjectId>, Self)>
    where
        F: FnMut(ObjectId) -> ParseResult<Option<usize>>,
    {
        let mut parser = ObjectParser::new(input, stream_length);
        let header = parser.parse_header();
        let object = parser.parse_object()?;
        Ok((header, object))
    }

    /// Short name of the variant, for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            PdfObject::Null => "null",
            PdfObject::Boolean(_) => "boolean",
            PdfObject::Integer(_) => "integer",
            PdfObject::Real(_) => "real",
            PdfObject::String(_) => "string",
            PdfObject::Name(_) => "name",
            PdfObject::Array(_) => "array",
            PdfObject::Dictionary(_) => "dictionary",
            PdfObject::Stream(_) => "stream",
            PdfObject::Reference(_) => "reference",
        }
    }

    /// Check if this object is null
    pub fn is_null(&self) -> bool {
        matches!(self, PdfObject::Null)
    }

    /// Get as boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PdfObject::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as integer
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            PdfObject::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as a number, accepting both integers and reals
    pub fn as_real(&self) -> Option<f64> {
        match self {
            PdfObject::Real(r) => Some(*r),
            PdfObject::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Get as string
    pub fn as_string(&self) -> Option<&PdfString> {
        match self {
            PdfObject::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as name
    pub fn as_name(&self) -> Option<&PdfName> {
        match self {
            PdfObject::Name(n) => Some(n),
            _ => None,
        }
    }

    /// Get as array
    pub fn as_array(&self) -> Option<&PdfArray> {
        match self {
            PdfObject::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Get as dictionary; a stream yields its stream dictionary
    pub fn as_dict(&self) -> Option<&PdfDictionary> {
        match self {
            PdfObject::Dictionary(d) => Some(d),
            PdfObject::Stream(s) => Some(&s.dict),
            _ => None,
        }
    }

    /// Get as stream
    pub fn as_stream(&self) -> Option<&PdfStream> {
        match self {
            PdfObject::Stream(s) => Some(s),
            _ => None,
        }
    }

    /// Get as reference
    pub fn as_reference(&self) -> Option<ObjectId> {
        match self {
            PdfObject::Reference(id) => Some(*id),
            _ => None,
        }
    }
}

impl PdfDictionary {
    /// Create a new empty dictionary
    pub fn new() -> Self {
        PdfDictionary(HashMap::new())
    }

    /// Get a value by key
    pub fn get(&self, key: &str) -> Option<&PdfObject> {
        self.0.get(key)
    }

    /// Insert a key-value pair
    pub fn insert(&mut self, key: String, value: PdfObject) {
        self.0.insert(PdfName(key), value);
    }

    /// Check if dictionary contains a key
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Get the dictionary type (value of /Type key)
    pub fn get_type(&self) -> Option<&str> {
        self.get("Type").and_then(|obj| obj.as_name()).map(|n| n.as_str())
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if dictionary is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over entries in key order
    pub fn iter_sorted(&self) -> impl Iterator<Item = (&PdfName, &PdfObject)> {
        let mut entries: Vec<_> = self.0.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries.into_iter()
    }
}

impl PdfArray {
    /// Create a new empty array
    pub fn new() -> Self {
        PdfArray(Vec::new())
    }

    /// Get array length
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if array is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get element at index
    pub fn get(&self, index: usize) -> Option<&PdfObject> {
        self.0.get(index)
    }

    /// Push an element
    pub fn push(&mut self, obj: PdfObject) {
        self.0.push(obj);
    }
}

impl PdfString {
    /// Create a new PDF string
    pub fn new(data: Vec<u8>) -> Self {
        PdfString(data)
    }

    /// Get as UTF-8 string if possible
    pub fn as_str(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.0)
    }

    /// Get as bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl PdfName {
    /// Create a new PDF name
    pub fn new(name: String) -> Self {
        PdfName(name)
    }

    /// Get the name as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PdfName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("/")?;
        for &byte in self.0.as_bytes() {
            if byte.is_ascii_graphic() && !b"()<>[]{}/%#".contains(&byte) {
                write!(f, "{}", byte as char)?;
            } else {
                write!(f, "#{byte:02X}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for PdfString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let printable = self
            .0
            .iter()
            .all(|&b| b.is_ascii_graphic() || b == b' ' || b == b'\n');
        if !printable {
            f.write_str("<")?;
            for byte in &self.0 {
                write!(f, "{byte:02X}")?;
            }
            return f.write_str(">");
        }
        f.write_str("(")?;
        for &byte in &self.0 {
            match byte {
                b'(' | b')' | b'\\' => write!(f, "\\{}", byte as char)?,
                b'\n' => f.write_str("\\n")?,
                _ => write!(f, "{}", byte as char)?,
            }
        }
        f.write_str(")")
    }
}

impl fmt::Display for PdfObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PdfObject::Null => f.write_str("null"),
            PdfObject::Boolean(b) => write!(f, "{b}"),
            PdfObject::Integer(i) => write!(f, "{i}"),
            PdfObject::Real(r) => write!(f, "{r}"),
            PdfObject::String(s) => write!(f, "{s}"),
            PdfObject::Name(n) => write!(f, "{n}"),
            PdfObject::Array(array) => {
                f.write_str("[")?;
                for (i, item) in array.0.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            PdfObject::Dictionary(dict) => write_dict(f, dict),
            PdfObject::Stream(stream) => {
                write_dict(f, &stream.dict)?;
                write!(f, " stream <{} bytes>", stream.data.len())
            }
            PdfObject::Reference(id) => write!(f, "{id} R"),
        }
    }
}

fn write_dict(f: &mut fmt::Formatter<'_>, dict: &PdfDictionary) -> fmt::Result {
    f.write_str("<<")?;
    for (key, value) in dict.iter_sorted() {
        write!(f, " {key} {value}")?;
    }
    f.write_str(" >>")
}

/// Recursive-descent parser from tokens to definition nodes
pub(crate) struct ObjectParser<'a, F> {
    lexer: Lexer<'a>,
    stream_length: F,
    depth: usize,
}

impl<'a, F> ObjectParser<'a, F>
where
    F: FnMut(ObjectId) -> ParseResult<Option<usize>>,
{
    pub(crate) fn new(input: &'a [u8], stream_length: F) -> Self {
        Self {
            lexer: Lexer::new(input),
            stream_length,
            depth: 0,
        }
    }

    /// Consume an `N G obj` header if one is present
    fn parse_header(&mut self) -> Option<ObjectId> {
        let start = self.lexer.position();
        let header = match (
            self.lexer.next_token(),
            self.lexer.next_token(),
            self.lexer.next_token(),
        ) {
            (
                Ok(Some(Token::Integer(number))),
                Ok(Some(Token::Integer(generation))),
                Ok(Some(Token::Keyword(keyword))),
            ) if keyword == "obj" => object_id(number, generation),
            _ => None,
        };
        if header.is_none() {
            self.lexer.set_position(start);
        }
        header
    }

    fn parse_object(&mut self) -> ParseResult<PdfObject> {
        match self.lexer.next_token()? {
            Some(token) => self.parse_from_token(token),
            None => Err(self.unexpected_eof()),
        }
    }

    fn unexpected_eof(&self) -> ParseError {
        ParseError::SyntaxError {
            position: self.lexer.position(),
            message: "Unexpected end of data".to_string(),
        }
    }

    fn parse_from_token(&mut self, token: Token) -> ParseResult<PdfObject> {
        match token {
            Token::Integer(number) => Ok(self
                .try_reference(number)
                .map(PdfObject::Reference)
                .unwrap_or(PdfObject::Integer(number))),
            Token::Real(r) => Ok(PdfObject::Real(r)),
            Token::String(s) | Token::HexString(s) => Ok(PdfObject::String(PdfString(s))),
            Token::Name(n) => Ok(PdfObject::Name(PdfName(n))),
            Token::ArrayStart => self.parse_array(),
            Token::DictStart => self.parse_dictionary_or_stream(),
            Token::Keyword(keyword) => match keyword.as_str() {
                "true" => Ok(PdfObject::Boolean(true)),
                "false" => Ok(PdfObject::Boolean(false)),
                "null" => Ok(PdfObject::Null),
                _ => Err(ParseError::UnexpectedToken {
                    expected: "PDF object".to_string(),
                    found: keyword,
                }),
            },
            other @ (Token::ArrayEnd | Token::DictEnd) => Err(ParseError::UnexpectedToken {
                expected: "PDF object".to_string(),
                found: format!("{other:?}"),
            }),
        }
    }

    /// Look ahead for `G R` after an object number
    fn try_reference(&mut self, number: i64) -> Option<ObjectId> {
        let mut lookahead = self.lexer.clone();
        let Ok(Some(Token::Integer(generation))) = lookahead.next_token() else {
            return None;
        };
        match lookahead.next_token() {
            Ok(Some(Token::Keyword(keyword))) if keyword == "R" => {
                let id = object_id(number, generation)?;
                self.lexer = lookahead;
                Some(id)
            }
            _ => None,
        }
    }

    fn enter(&mut self) -> ParseResult<()> {
        self.depth += 1;
        if self.depth > MAX_RECURSION_DEPTH {
            return Err(ParseError::SyntaxError {
                position: self.lexer.position(),
                message: format!("Nesting deeper than {MAX_RECURSION_DEPTH} levels"),
            });
        }
        Ok(())
    }

    fn parse_array(&mut self) -> ParseResult<PdfObject> {
        self.enter()?;
        let mut elements = Vec::new();
        loop {
            match self.lexer.next_token()? {
                Some(Token::ArrayEnd) => break,
                Some(token) => elements.push(self.parse_from_token(token)?),
                None => return Err(self.unexpected_eof()),
            }
        }
        self.depth -= 1;
        Ok(PdfObject::Array(PdfArray(elements)))
    }

    fn parse_dictionary_or_stream(&mut self) -> ParseResult<PdfObject> {
        self.enter()?;
        let mut dict = PdfDictionary::new();
        loop {
            match self.lexer.next_token()? {
                Some(Token::DictEnd) => break,
                Some(Token::Name(key)) => {
                    let value = self.parse_object()?;
                    dict.insert(key, value);
                }
                Some(token) => {
                    return Err(ParseError::UnexpectedToken {
                        expected: "dictionary key (name) or >>".to_string(),
                        found: format!("{token:?}"),
                    })
                }
                None => return Err(self.unexpected_eof()),
            }
        }
        self.depth -= 1;

        if self.lexer.peek_token()? != Some(Token::Keyword("stream".to_string())) {
            return Ok(PdfObject::Dictionary(dict));
        }
        self.lexer.next_token()?;

        let length = match dict.get("Length") {
            Some(PdfObject::Integer(len)) => usize::try_from(*len).ok(),
            Some(PdfObject::Reference(id)) => (self.stream_length)(*id)?,
            _ => None,
        };
        let data = self.lexer.read_stream_data(length)?;
        Ok(PdfObject::Stream(PdfStream { dict, data }))
    }
}

fn object_id(number: i64, generation: i64) -> Option<ObjectId> {
    Some(ObjectId::new(
        u32::try_from(number).ok()?,
        u16::try_from(generation).ok()?,
    ))
}

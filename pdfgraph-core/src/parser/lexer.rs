//! PDF Lexer
//!
//! Tokenizes PDF syntax according to ISO 32000-1 Section 7.2. The same lexer
//! serves indirect object bodies, content streams and ToUnicode CMaps; each
//! consumer gives its own meaning to bare keywords.

use super::{ParseError, ParseResult};

/// PDF Token types
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Integer number
    Integer(i64),

    /// Real number
    Real(f64),

    /// Literal string `( ... )`
    String(Vec<u8>),

    /// Hexadecimal string `< ... >`
    HexString(Vec<u8>),

    /// Name object (e.g., /Type)
    Name(String),

    /// Left square bracket [
    ArrayStart,

    /// Right square bracket ]
    ArrayEnd,

    /// Dictionary start <<
    DictStart,

    /// Dictionary end >>
    DictEnd,

    /// Any bare word: `true`, `null`, `obj`, `R`, `stream`, content operators...
    Keyword(String),
}

fn is_whitespace(ch: u8) -> bool {
    matches!(ch, b' ' | b'\t' | b'\r' | b'\n' | b'\x0C' | b'\0')
}

fn is_delimiter(ch: u8) -> bool {
    matches!(
        ch,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

fn hex_value(ch: u8) -> Option<u8> {
    match ch {
        b'0'..=b'9' => Some(ch - b'0'),
        b'A'..=b'F' => Some(ch - b'A' + 10),
        b'a'..=b'f' => Some(ch - b'a' + 10),
        _ => None,
    }
}

/// Byte-slice tokenizer
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    input: &'a [u8],
    position: usize,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer over the given bytes
    pub fn new(input: &'a [u8]) -> Self {
        Self { input, position: 0 }
    }

    /// Current byte offset
    pub fn position(&self) -> usize {
        self.position
    }

    /// Rewind or advance to an absolute byte offset
    pub fn set_position(&mut self, position: usize) {
        self.position = position.min(self.input.len());
    }

    /// Bytes not consumed yet
    pub fn remaining(&self) -> &'a [u8] {
        &self.input[self.position..]
    }

    /// Get the next token, `None` at end of input
    pub fn next_token(&mut self) -> ParseResult<Option<Token>> {
        self.skip_whitespace();

        let Some(&ch) = self.input.get(self.position) else {
            return Ok(None);
        };

        match ch {
            b'+' | b'-' | b'.' | b'0'..=b'9' => self.read_number().map(Some),
            b'(' => self.read_literal_string().map(Some),
            b'<' => {
                if self.peek_next() == Some(b'<') {
                    self.position += 2;
                    Ok(Some(Token::DictStart))
                } else {
                    self.read_hex_string().map(Some)
                }
            }
            b'>' => {
                if self.peek_next() == Some(b'>') {
                    self.position += 2;
                    Ok(Some(Token::DictEnd))
                } else {
                    Err(self.error("Unexpected '>'"))
                }
            }
            b'[' => {
                self.position += 1;
                Ok(Some(Token::ArrayStart))
            }
            b']' => {
                self.position += 1;
                Ok(Some(Token::ArrayEnd))
            }
            b'{' | b'}' => {
                self.position += 1;
                Ok(Some(Token::Keyword((ch as char).to_string())))
            }
            b')' => Err(self.error("Unbalanced ')'")),
            b'/' => self.read_name().map(Some),
            _ => Ok(Some(self.read_keyword())),
        }
    }

    /// Peek at the next token without consuming it
    pub fn peek_token(&mut self) -> ParseResult<Option<Token>> {
        let saved = self.position;
        let token = self.next_token();
        self.position = saved;
        token
    }

    fn error(&self, message: &str) -> ParseError {
        ParseError::SyntaxError {
            position: self.position,
            message: message.to_string(),
        }
    }

    fn peek_next(&self) -> Option<u8> {
        self.input.get(self.position + 1).copied()
    }

    /// Skip whitespace and comments
    pub fn skip_whitespace(&mut self) {
        while let Some(&ch) = self.input.get(self.position) {
            if is_whitespace(ch) {
                self.position += 1;
            } else if ch == b'%' {
                while let Some(&c) = self.input.get(self.position) {
                    if c == b'\n' || c == b'\r' {
                        break;
                    }
                    self.position += 1;
                }
            } else {
                break;
            }
        }
    }

    fn read_number(&mut self) -> ParseResult<Token> {
        let start = self.position;
        let mut has_dot = false;

        if matches!(self.input[self.position], b'+' | b'-') {
            self.position += 1;
        }

        while let Some(&ch) = self.input.get(self.position) {
            match ch {
                b'0'..=b'9' => self.position += 1,
                b'.' if !has_dot => {
                    has_dot = true;
                    self.position += 1;
                }
                _ => break,
            }
        }

        // Both slices are ASCII by construction
        let text = std::str::from_utf8(&self.input[start..self.position]).unwrap_or_default();
        let digits = text.trim_start_matches(['+', '-']).replace('.', "");
        if digits.is_empty() {
            // A lone sign or dot reads as zero, as most readers do
            return Ok(Token::Integer(0));
        }

        if has_dot {
            text.parse::<f64>()
                .map(Token::Real)
                .map_err(|_| ParseError::SyntaxError {
                    position: start,
                    message: format!("Invalid real number: {text}"),
                })
        } else {
            match text.parse::<i64>() {
                Ok(value) => Ok(Token::Integer(value)),
                // Out-of-range integers degrade to reals
                Err(_) => text
                    .parse::<f64>()
                    .map(Token::Real)
                    .map_err(|_| ParseError::SyntaxError {
                        position: start,
                        message: format!("Invalid integer: {text}"),
                    }),
            }
        }
    }

    fn read_literal_string(&mut self) -> ParseResult<Token> {
        self.position += 1; // Skip opening '('
        let mut result = Vec::new();
        let mut depth = 1usize;

        loop {
            let Some(&ch) = self.input.get(self.position) else {
                return Err(self.error("Unterminated literal string"));
            };
            self.position += 1;

            match ch {
                b'\\' => {
                    let Some(&esc) = self.input.get(self.position) else {
                        return Err(self.error("Unterminated literal string"));
                    };
                    self.position += 1;
                    match esc {
                        b'n' => result.push(b'\n'),
                        b'r' => result.push(b'\r'),
                        b't' => result.push(b'\t'),
                        b'b' => result.push(b'\x08'),
                        b'f' => result.push(b'\x0C'),
                        b'0'..=b'7' => {
                            let mut value = u32::from(esc - b'0');
                            for _ in 0..2 {
                                match self.input.get(self.position) {
                                    Some(&d @ b'0'..=b'7') => {
                                        value = value * 8 + u32::from(d - b'0');
                                        self.position += 1;
                                    }
                                    _ => break,
                                }
                            }
                            result.push((value & 0xFF) as u8);
                        }
                        // Line continuation
                        b'\r' => {
                            if self.input.get(self.position) == Some(&b'\n') {
                                self.position += 1;
                            }
                        }
                        b'\n' => {}
                        // \( \) \\ and unknown escapes keep the character
                        _ => result.push(esc),
                    }
                }
                b'(' => {
                    depth += 1;
                    result.push(ch);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    result.push(ch);
                }
                b'\r' => {
                    if self.input.get(self.position) == Some(&b'\n') {
                        self.position += 1;
                    }
                    result.push(b'\n');
                }
                _ => result.push(ch),
            }
        }

        Ok(Token::String(result))
    }

    fn read_hex_string(&mut self) -> ParseResult<Token> {
        self.position += 1; // Skip opening '<'
        let mut result = Vec::new();
        let mut nibble: Option<u8> = None;

        while let Some(&ch) = self.input.get(self.position) {
            self.position += 1;
            if ch == b'>' {
                if let Some(high) = nibble {
                    result.push(high << 4);
                }
                return Ok(Token::HexString(result));
            }
            if is_whitespace(ch) {
                continue;
            }
            let digit = hex_value(ch).ok_or_else(|| ParseError::SyntaxError {
                position: self.position - 1,
                message: format!("Invalid character in hex string: {:?}", ch as char),
            })?;
            match nibble.take() {
                Some(high) => result.push((high << 4) | digit),
                None => nibble = Some(digit),
            }
        }

        Err(self.error("Unterminated hex string"))
    }

    fn read_name(&mut self) -> ParseResult<Token> {
        self.position += 1; // Skip '/'
        let mut bytes = Vec::new();

        while let Some(&ch) = self.input.get(self.position) {
            if is_whitespace(ch) || is_delimiter(ch) {
                break;
            }
            self.position += 1;
            if ch == b'#' {
                let high = self.input.get(self.position).copied().and_then(hex_value);
                let low = self.input.get(self.position + 1).copied().and_then(hex_value);
                if let (Some(high), Some(low)) = (high, low) {
                    bytes.push((high << 4) | low);
                    self.position += 2;
                    continue;
                }
            }
            bytes.push(ch);
        }

        Ok(Token::Name(String::from_utf8_lossy(&bytes).into_owned()))
    }

    fn read_keyword(&mut self) -> Token {
        let start = self.position;
        while let Some(&ch) = self.input.get(self.position) {
            if is_whitespace(ch) || is_delimiter(ch) {
                break;
            }
            self.position += 1;
        }
        Token::Keyword(String::from_utf8_lossy(&self.input[start..self.position]).into_owned())
    }

    /// Read the data of a stream whose `stream` keyword was just consumed.
    ///
    /// `length` is trusted when `endstream` follows it; otherwise the data
    /// runs up to the next `endstream` keyword.
    pub fn read_stream_data(&mut self, length: Option<usize>) -> ParseResult<Vec<u8>> {
        match self.input.get(self.position) {
            Some(b'\r') => {
                self.position += 1;
                if self.input.get(self.position) == Some(&b'\n') {
                    self.position += 1;
                }
            }
            Some(b'\n') => self.position += 1,
            _ => {}
        }
        let start = self.position;

        if let Some(length) = length {
            let end = start.saturating_add(length);
            if end <= self.input.len() {
                let mut after = Lexer {
                    input: self.input,
                    position: end,
                };
                // Junk where `endstream` should be means the length is wrong
                if matches!(after.next_token(), Ok(Some(Token::Keyword(ref k))) if k == "endstream") {
                    self.position = after.position;
                    return Ok(self.input[start..end].to_vec());
                }
            }
        }

        let offset = find(&self.input[start..], b"endstream")
            .ok_or_else(|| self.error("Missing endstream keyword"))?;
        let mut end = start + offset;
        self.position = end + b"endstream".len();
        if end > start && self.input[end - 1] == b'\n' {
            end -= 1;
        }
        if end > start && self.input[end - 1] == b'\r' {
            end -= 1;
        }
        Ok(self.input[start..end].to_vec())
    }

    /// Skip inline image data after an `ID` operator up to and including `EI`
    pub fn skip_inline_image_data(&mut self) -> ParseResult<()> {
        // A single whitespace byte separates ID from the data
        if self.input.get(self.position).copied().is_some_and(is_whitespace) {
            self.position += 1;
        }
        let mut search = self.position;
        while let Some(offset) = find(&self.input[search..], b"EI") {
            let at = search + offset;
            let before_ok = at == 0 || is_whitespace(self.input[at - 1]);
            let after_ok = self
                .input
                .get(at + 2)
                .map_or(true, |&ch| is_whitespace(ch) || is_delimiter(ch));
            if before_ok && after_ok {
                self.position = at + 2;
                return Ok(());
            }
            search = at + 2;
        }
        self.position = self.input.len();
        Err(self.error("Inline image without EI"))
    }
}

/// Find the first occurrence of `needle` in `haystack`
pub fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &[u8]) -> Vec<Token> {
        let mut lexer = Lexer::new(input);
        let mut out = Vec::new();
        while let Some(token) = lexer.next_token().unwrap() {
            out.push(token);
        }
        out
    }

    #[test]
    fn test_tokenize_numbers() {
        assert_eq!(
            tokens(b"123 -45 3.5 -0.5 .5 +7"),
            vec![
                Token::Integer(123),
                Token::Integer(-45),
                Token::Real(3.5),
                Token::Real(-0.5),
                Token::Real(0.5),
                Token::Integer(7),
            ]
        );
    }

    #[test]
    fn test_tokenize_strings() {
        assert_eq!(
            tokens(b"(Hello World) (Hello\\nWorld) (Nested (paren)) (\\101\\102)"),
            vec![
                Token::String(b"Hello World".to_vec()),
                Token::String(b"Hello\nWorld".to_vec()),
                Token::String(b"Nested (paren)".to_vec()),
                Token::String(b"AB".to_vec()),
            ]
        );
    }

    #[test]
    fn test_line_continuation_in_string() {
        assert_eq!(
            tokens(b"(one\\\ntwo)"),
            vec![Token::String(b"onetwo".to_vec())]
        );
    }

    #[test]
    fn test_tokenize_hex_strings() {
        assert_eq!(
            tokens(b"<48656C6C6F> <48 65 6c 6C 6F> <414>"),
            vec![
                Token::HexString(b"Hello".to_vec()),
                Token::HexString(b"Hello".to_vec()),
                Token::HexString(vec![0x41, 0x40]),
            ]
        );
    }

    #[test]
    fn test_tokenize_names_and_delimiters() {
        assert_eq!(
            tokens(b"/Name /A#42C [ ] << >> % comment\n/F1"),
            vec![
                Token::Name("Name".to_string()),
                Token::Name("ABC".to_string()),
                Token::ArrayStart,
                Token::ArrayEnd,
                Token::DictStart,
                Token::DictEnd,
                Token::Name("F1".to_string()),
            ]
        );
    }

    #[test]
    fn test_tokenize_keywords() {
        assert_eq!(
            tokens(b"BT T* ' \" 1 0 R"),
            vec![
                Token::Keyword("BT".to_string()),
                Token::Keyword("T*".to_string()),
                Token::Keyword("'".to_string()),
                Token::Keyword("\"".to_string()),
                Token::Integer(1),
                Token::Integer(0),
                Token::Keyword("R".to_string()),
            ]
        );
    }

    #[test]
    fn test_unterminated_hex_string_is_error() {
        let mut lexer = Lexer::new(b"<4142");
        assert!(lexer.next_token().is_err());
    }

    #[test]
    fn test_stream_data_with_length() {
        let mut lexer = Lexer::new(b"stream\r\nABCDE\nendstream endobj");
        assert_eq!(
            lexer.next_token().unwrap(),
            Some(Token::Keyword("stream".to_string()))
        );
        assert_eq!(lexer.read_stream_data(Some(5)).unwrap(), b"ABCDE");
        assert_eq!(
            lexer.next_token().unwrap(),
            Some(Token::Keyword("endobj".to_string()))
        );
    }

    #[test]
    fn test_stream_data_with_wrong_length() {
        let mut lexer = Lexer::new(b"stream\nABCDE\nendstream");
        lexer.next_token().unwrap();
        assert_eq!(lexer.read_stream_data(Some(99)).unwrap(), b"ABCDE");
        assert_eq!(lexer.next_token().unwrap(), None);
    }

    #[test]
    fn test_stream_length_ending_on_unbalanced_paren() {
        let mut lexer = Lexer::new(b"stream\nA)BC\nendstream");
        lexer.next_token().unwrap();
        assert_eq!(lexer.read_stream_data(Some(1)).unwrap(), b"A)BC");
        assert_eq!(lexer.next_token().unwrap(), None);
    }

    #[test]
    fn test_skip_inline_image() {
        let mut lexer = Lexer::new(b"ID \x00EI\xff EI Q");
        assert_eq!(
            lexer.next_token().unwrap(),
            Some(Token::Keyword("ID".to_string()))
        );
        lexer.skip_inline_image_data().unwrap();
        assert_eq!(
            lexer.next_token().unwrap(),
            Some(Token::Keyword("Q".to_string()))
        );
    }

    #[test]
    fn test_find() {
        assert_eq!(find(b"some text obj more", b" obj"), Some(9));
        assert_eq!(find(b"short", b"longer needle"), None);
    }
}

//! PDF Stream Filters
//!
//! Decodes stream data for content streams and ToUnicode CMaps according to
//! ISO 32000-1 Section 7.4. Image-only filters are reported as unsupported.

use super::objects::{PdfDictionary, PdfObject, PdfStream};
use super::{ParseError, ParseResult};

#[cfg(feature = "compression")]
use flate2::read::ZlibDecoder;
#[cfg(feature = "compression")]
use std::io::Read;

/// Filters this crate can decode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    /// Flate decode (zlib/deflate compression)
    FlateDecode,

    /// ASCII hex decode
    ASCIIHexDecode,

    /// ASCII 85 decode
    ASCII85Decode,
}

impl Filter {
    /// Parse filter from name, including the abbreviations allowed in inline images
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "FlateDecode" | "Fl" => Some(Filter::FlateDecode),
            "ASCIIHexDecode" | "AHx" => Some(Filter::ASCIIHexDecode),
            "ASCII85Decode" | "A85" => Some(Filter::ASCII85Decode),
            _ => None,
        }
    }
}

/// Decode a stream's data through the filters listed in its dictionary
pub fn decode_stream(stream: &PdfStream) -> ParseResult<Vec<u8>> {
    decode_data(&stream.data, &stream.dict)
}

/// Decode raw bytes according to the `/Filter` entry of `dict`
pub fn decode_data(data: &[u8], dict: &PdfDictionary) -> ParseResult<Vec<u8>> {
    let names: Vec<&str> = match dict.get("Filter") {
        None | Some(PdfObject::Null) => return Ok(data.to_vec()),
        Some(PdfObject::Name(name)) => vec![name.as_str()],
        Some(PdfObject::Array(array)) => array
            .0
            .iter()
            .map(|obj| {
                obj.as_name().map(|n| n.as_str()).ok_or_else(|| {
                    ParseError::StreamDecodeError("Invalid entry in /Filter array".to_string())
                })
            })
            .collect::<ParseResult<_>>()?,
        Some(other) => {
            return Err(ParseError::StreamDecodeError(format!(
                "Invalid /Filter type: {other}"
            )))
        }
    };

    let mut result = data.to_vec();
    for name in names {
        let filter = Filter::from_name(name)
            .ok_or_else(|| ParseError::UnsupportedFilter(name.to_string()))?;
        result = apply_filter(&result, filter)?;
    }
    Ok(result)
}

fn apply_filter(data: &[u8], filter: Filter) -> ParseResult<Vec<u8>> {
    match filter {
        Filter::FlateDecode => decode_flate(data),
        Filter::ASCIIHexDecode => decode_ascii_hex(data),
        Filter::ASCII85Decode => decode_ascii85(data),
    }
}

#[cfg(feature = "compression")]
fn decode_flate(data: &[u8]) -> ParseResult<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut result = Vec::new();
    match decoder.read_to_end(&mut result) {
        Ok(_) => Ok(result),
        // Truncated streams are common; keep what inflated cleanly
        Err(_) if !result.is_empty() => {
            tracing::warn!(
                "Flate stream ended early, keeping {} decoded bytes",
                result.len()
            );
            Ok(result)
        }
        Err(e) => Err(ParseError::StreamDecodeError(format!(
            "Flate decode error: {e}"
        ))),
    }
}

#[cfg(not(feature = "compression"))]
fn decode_flate(_data: &[u8]) -> ParseResult<Vec<u8>> {
    Err(ParseError::UnsupportedFilter(
        "FlateDecode (enable the 'compression' feature)".to_string(),
    ))
}

fn hex_digit_value(ch: u8) -> Option<u8> {
    match ch {
        b'0'..=b'9' => Some(ch - b'0'),
        b'A'..=b'F' => Some(ch - b'A' + 10),
        b'a'..=b'f' => Some(ch - b'a' + 10),
        _ => None,
    }
}

fn decode_ascii_hex(data: &[u8]) -> ParseResult<Vec<u8>> {
    let mut result = Vec::with_capacity(data.len() / 2);
    let mut high: Option<u8> = None;

    for &ch in data.iter().filter(|b| !b.is_ascii_whitespace()) {
        if ch == b'>' {
            break;
        }
        let value = hex_digit_value(ch).ok_or_else(|| {
            ParseError::StreamDecodeError(format!("Invalid hex digit: {}", ch as char))
        })?;
        match high.take() {
            Some(h) => result.push((h << 4) | value),
            None => high = Some(value),
        }
    }
    // Odd digit count pads with 0
    if let Some(h) = high {
        result.push(h << 4);
    }
    Ok(result)
}

fn decode_ascii85(data: &[u8]) -> ParseResult<Vec<u8>> {
    let mut body: Vec<u8> = data
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    if body.starts_with(b"<~") {
        body.drain(..2);
    }
    if let Some(end) = body.windows(2).position(|w| w == b"~>") {
        body.truncate(end);
    }

    let mut result = Vec::with_capacity(body.len() * 4 / 5);
    let mut group = [0u8; 5];
    let mut len = 0usize;

    for &ch in &body {
        match ch {
            b'z' if len == 0 => result.extend_from_slice(&[0, 0, 0, 0]),
            b'!'..=b'u' => {
                group[len] = ch - b'!';
                len += 1;
                if len == 5 {
                    result.extend_from_slice(&group_value(&group).to_be_bytes());
                    len = 0;
                }
            }
            _ => {
                return Err(ParseError::StreamDecodeError(format!(
                    "Invalid ASCII85 character: {}",
                    ch as char
                )))
            }
        }
    }

    if len > 0 {
        for slot in group.iter_mut().skip(len) {
            *slot = b'u' - b'!';
        }
        let bytes = group_value(&group).to_be_bytes();
        result.extend_from_slice(&bytes[..len - 1]);
    }
    Ok(result)
}

fn group_value(group: &[u8; 5]) -> u32 {
    group
        .iter()
        .fold(0u32, |acc, &digit| acc.wrapping_mul(85).wrapping_add(u32::from(digit)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::objects::{PdfArray, PdfName};

    fn stream_with_filter(filter: PdfObject, data: &[u8]) -> PdfStream {
        let mut dict = PdfDictionary::new();
        dict.insert("Filter".to_string(), filter);
        PdfStream {
            dict,
            data: data.to_vec(),
        }
    }

    #[test]
    fn test_ascii_hex_decode() {
        assert_eq!(decode_ascii_hex(b"48656C6C6F>").unwrap(), b"Hello");
        assert_eq!(decode_ascii_hex(b"48 65 6C 6C 6F>").unwrap(), b"Hello");
        assert_eq!(decode_ascii_hex(b"48656C6C6>").unwrap(), b"Hell`");
        assert_eq!(decode_ascii_hex(b"48656C6C6F").unwrap(), b"Hello");
        assert!(decode_ascii_hex(b"GG>").is_err());
    }

    #[test]
    fn test_ascii85_decode() {
        assert_eq!(decode_ascii85(b"87cURD]j7BEbo80~>").unwrap(), b"Hello world!");
        assert_eq!(decode_ascii85(b"<~z~>").unwrap(), &[0, 0, 0, 0]);
        assert!(decode_ascii85(b"~>").unwrap().is_empty());
        assert!(decode_ascii85(b"bad{~>").is_err());
    }

    #[test]
    fn test_decode_stream_no_filter() {
        let stream = PdfStream {
            dict: PdfDictionary::new(),
            data: b"BT ET".to_vec(),
        };
        assert_eq!(decode_stream(&stream).unwrap(), b"BT ET");
    }

    #[test]
    fn test_decode_stream_filter_array() {
        let filters = PdfObject::Array(PdfArray(vec![PdfObject::Name(PdfName::new(
            "AHx".to_string(),
        ))]));
        let stream = stream_with_filter(filters, b"48656C6C6F>");
        assert_eq!(decode_stream(&stream).unwrap(), b"Hello");
    }

    #[test]
    fn test_unsupported_filter() {
        let stream = stream_with_filter(
            PdfObject::Name(PdfName::new("DCTDecode".to_string())),
            b"\xff\xd8",
        );
        match decode_stream(&stream) {
            Err(ParseError::UnsupportedFilter(name)) => assert_eq!(name, "DCTDecode"),
            other => panic!("Expected UnsupportedFilter, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_filter_type() {
        let stream = stream_with_filter(PdfObject::Integer(42), b"data");
        assert!(matches!(
            decode_stream(&stream),
            Err(ParseError::StreamDecodeError(_))
        ));
    }

    #[cfg(feature = "compression")]
    #[test]
    fn test_flate_decode() {
        use flate2::write::ZlibEncoder;
        use flate2::Compression;
        use std::io::Write;

        let original = b"BT /F1 12 Tf (Hello) Tj ET";
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(original).unwrap();
        let compressed = encoder.finish().unwrap();

        let stream = stream_with_filter(
            PdfObject::Name(PdfName::new("FlateDecode".to_string())),
            &compressed,
        );
        assert_eq!(decode_stream(&stream).unwrap(), original);
    }

    #[cfg(feature = "compression")]
    #[test]
    fn test_flate_garbage_is_error() {
        assert!(decode_flate(b"definitely not zlib").is_err());
    }
}

//! Page font dictionaries
//!
//! A [`FontDictionary`] maps the resource names used by `Tf` (`/F1`, `/F2`,
//! ...) to [`Font`] values describing how shown bytes decode to text.
//!
//! Fonts are read-only once built. The document keeps one shared [`Font`] per
//! font object identity, so every page whose resources point at the same
//! font object sees the same value.

use super::cmap::ToUnicodeMap;
use super::encoding::{FontEncoding, TextEncoding};
use crate::parser::{
    ObjectId, ObjectStore, ParseError, ParseResult, ParsedPage, PdfDictionary, PdfDocument,
    PdfObject, Resolver,
};
use std::collections::HashMap;
use std::rc::Rc;

/// A font resource
#[derive(Debug, Clone, PartialEq)]
pub struct Font {
    /// Identity of the font object, `None` for a direct dictionary
    pub id: Option<ObjectId>,
    /// `/BaseFont` name
    pub base_font: Option<String>,
    /// `/Subtype` (Type1, TrueType, Type0, ...)
    pub subtype: Option<String>,
    /// Single-byte encoding used when no ToUnicode entry applies
    pub encoding: FontEncoding,
    /// First code covered by `widths`
    pub first_char: u32,
    /// Glyph widths in thousandths of text space
    pub widths: Vec<f64>,
    /// Parsed `/ToUnicode` CMap
    pub to_unicode: Option<ToUnicodeMap>,
}

impl Font {
    /// Build a font from its dictionary.
    ///
    /// Parts that cannot be resolved (encoding, widths, ToUnicode) are left
    /// at their defaults with a warning.
    pub fn from_dict<S: ObjectStore>(
        resolver: &Resolver<S>,
        dict: &PdfDictionary,
        id: Option<ObjectId>,
    ) -> Self {
        let name_of = |key: &str| {
            dict.get(key)
                .and_then(|obj| obj.as_name())
                .map(|name| name.as_str().to_string())
        };

        let first_char = dict
            .get("FirstChar")
            .and_then(|obj| obj.as_integer())
            .and_then(|value| u32::try_from(value).ok())
            .unwrap_or(0);

        Font {
            id,
            base_font: name_of("BaseFont"),
            subtype: name_of("Subtype"),
            encoding: read_encoding(resolver, dict),
            first_char,
            widths: read_widths(resolver, dict),
            to_unicode: read_to_unicode(resolver, dict),
        }
    }

    /// Whether this is a composite (Type0) font with multi-byte codes
    pub fn is_composite(&self) -> bool {
        self.subtype.as_deref() == Some("Type0")
    }

    /// Byte length of a character code when no codespace says otherwise
    pub fn code_length(&self) -> usize {
        if self.is_composite() {
            2
        } else {
            1
        }
    }

    /// Decode the bytes of a shown string.
    ///
    /// ToUnicode wins over the encoding. Codes it does not cover fall back to
    /// the encoding for simple fonts and to U+FFFD for composite fonts.
    pub fn decode(&self, bytes: &[u8]) -> String {
        match &self.to_unicode {
            Some(map) => {
                let mut text = String::with_capacity(bytes.len());
                for code in map.split_codes(bytes, self.code_length()) {
                    match map.lookup(code) {
                        Some(mapped) => text.push_str(&mapped),
                        None => match code {
                            [byte] if !self.is_composite() => {
                                text.push(self.encoding.decode_byte(*byte))
                            }
                            _ => text.push(char::REPLACEMENT_CHARACTER),
                        },
                    }
                }
                text
            }
            None if self.is_composite() => bytes
                .chunks(2)
                .map(|_| char::REPLACEMENT_CHARACTER)
                .collect(),
            None => self.encoding.decode(bytes),
        }
    }

    /// Width of a single-byte code, if the font declares one
    pub fn width(&self, code: u32) -> Option<f64> {
        let index = code.checked_sub(self.first_char)?;
        self.widths.get(index as usize).copied()
    }
}

fn read_encoding<S: ObjectStore>(resolver: &Resolver<S>, dict: &PdfDictionary) -> FontEncoding {
    let Some(entry) = dict.get("Encoding") else {
        return FontEncoding::default();
    };
    let entry = match resolver.resolve_object(entry) {
        Ok(entry) => entry,
        Err(e) => {
            tracing::warn!("Ignoring unresolvable font /Encoding: {}", e);
            return FontEncoding::default();
        }
    };

    match &*entry {
        PdfObject::Name(name) => TextEncoding::from_name(name.as_str())
            .map(FontEncoding::new)
            .unwrap_or_default(),
        PdfObject::Dictionary(encoding_dict) => {
            let base = encoding_dict
                .get("BaseEncoding")
                .and_then(|obj| obj.as_name())
                .and_then(|name| TextEncoding::from_name(name.as_str()))
                .unwrap_or(TextEncoding::StandardEncoding);
            let mut encoding = FontEncoding::new(base);
            if let Some(differences) = encoding_dict.get("Differences") {
                match resolver.resolve_object(differences) {
                    Ok(differences) => match differences.as_array() {
                        Some(array) => encoding.apply_differences(array),
                        None => tracing::warn!("Ignoring non-array /Differences"),
                    },
                    Err(e) => tracing::warn!("Ignoring unresolvable /Differences: {}", e),
                }
            }
            encoding
        }
        other => {
            tracing::warn!("Ignoring /Encoding of type {}", other.type_name());
            FontEncoding::default()
        }
    }
}

fn read_widths<S: ObjectStore>(resolver: &Resolver<S>, dict: &PdfDictionary) -> Vec<f64> {
    let Some(entry) = dict.get("Widths") else {
        return Vec::new();
    };
    match resolver.resolve_object(entry) {
        Ok(widths) => widths
            .as_array()
            .map(|array| {
                array
                    .0
                    .iter()
                    .map(|width| width.as_real().unwrap_or(0.0))
                    .collect()
            })
            .unwrap_or_default(),
        Err(e) => {
            tracing::warn!("Ignoring unresolvable /Widths: {}", e);
            Vec::new()
        }
    }
}

fn read_to_unicode<S: ObjectStore>(
    resolver: &Resolver<S>,
    dict: &PdfDictionary,
) -> Option<ToUnicodeMap> {
    let entry = dict.get("ToUnicode")?;
    let parsed = resolver.resolve_object(entry).and_then(|object| {
        let stream = object.as_stream().ok_or_else(|| ParseError::UnexpectedToken {
            expected: "ToUnicode stream".to_string(),
            found: object.type_name().to_string(),
        })?;
        ToUnicodeMap::parse(&stream.decode()?)
    });

    match parsed {
        Ok(map) => Some(map),
        // Identity-H and friends name a predefined CMap, not a stream
        Err(_) if entry.as_name().is_some() => None,
        Err(e) => {
            tracing::warn!("Ignoring unusable /ToUnicode: {}", e);
            None
        }
    }
}

/// Fonts available to a page, keyed by resource name
#[derive(Debug, Clone, Default)]
pub struct FontDictionary {
    fonts: HashMap<String, Rc<Font>>,
}

impl FontDictionary {
    /// Build the font dictionary of a page from its inherited resources
    pub fn build<S: ObjectStore>(
        document: &PdfDocument<S>,
        page: &ParsedPage,
    ) -> ParseResult<Self> {
        let resources = document.resources(page)?;
        Ok(Self::from_resources(document, &resources))
    }

    /// Build a font dictionary from a Resources dictionary.
    ///
    /// Entries that fail to resolve, or are not dictionaries, are skipped
    /// with a warning.
    pub fn from_resources<S: ObjectStore>(
        document: &PdfDocument<S>,
        resources: &PdfDictionary,
    ) -> Self {
        let Some(entry) = resources.get("Font") else {
            return Self::default();
        };
        let font_entries = match document.resolver().resolve_object(entry) {
            Ok(font_entries) => font_entries,
            Err(e) => {
                tracing::warn!("Ignoring unresolvable /Font resources: {}", e);
                return Self::default();
            }
        };
        let Some(font_entries) = font_entries.as_dict() else {
            tracing::warn!("Ignoring /Font resources of type {}", font_entries.type_name());
            return Self::default();
        };

        let mut fonts = HashMap::with_capacity(font_entries.len());
        for (name, entry) in font_entries.iter_sorted() {
            let font = match entry {
                PdfObject::Reference(id) => document.shared_font(*id),
                PdfObject::Dictionary(dict) => {
                    Ok(Rc::new(Font::from_dict(document.resolver(), dict, None)))
                }
                other => Err(ParseError::UnexpectedToken {
                    expected: "font dictionary".to_string(),
                    found: other.type_name().to_string(),
                }),
            };
            match font {
                Ok(font) => {
                    fonts.insert(name.as_str().to_string(), font);
                }
                Err(e) => tracing::warn!("Skipping font /{}: {}", name.as_str(), e),
            }
        }

        tracing::debug!("Built font dictionary with {} fonts", fonts.len());
        FontDictionary { fonts }
    }

    /// Font registered under `name`; absence is not an error
    pub fn font(&self, name: &str) -> Option<Rc<Font>> {
        self.fonts.get(name).cloned()
    }

    /// Number of fonts
    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    /// Whether the page has no usable fonts
    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }

    /// Resource names in sorted order
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.fonts.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::MemoryStore;

    fn id(number: u32) -> ObjectId {
        ObjectId::new(number, 0)
    }

    fn font_from(objects: &[(u32, &str)], body: &str) -> Font {
        let mut store = MemoryStore::new();
        for (number, text) in objects {
            store.insert_bytes(id(*number), *text);
        }
        let resolver = Resolver::new(store);
        let object = PdfObject::parse(body.as_bytes()).unwrap();
        Font::from_dict(&resolver, object.as_dict().unwrap(), None)
    }

    #[test]
    fn test_simple_font_fields() {
        let font = font_from(
            &[(5, "[500 600 700]")],
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica \
             /Encoding /WinAnsiEncoding /FirstChar 65 /Widths 5 0 R >>",
        );
        assert_eq!(font.base_font.as_deref(), Some("Helvetica"));
        assert_eq!(font.encoding.base, TextEncoding::WinAnsiEncoding);
        assert_eq!(font.width(66), Some(600.0));
        assert_eq!(font.width(10), None);
        assert_eq!(font.decode(b"Caf\xe9"), "Café");
    }

    #[test]
    fn test_no_encoding_is_raw() {
        let font = font_from(&[], "<< /Subtype /TrueType >>");
        assert_eq!(font.encoding, FontEncoding::default());
        assert_eq!(font.decode(b"Hello"), "Hello");
    }

    #[test]
    fn test_differences_encoding() {
        let font = font_from(
            &[(7, "<< /Type /Encoding /Differences [1 /H /i] >>")],
            "<< /Subtype /Type1 /Encoding 7 0 R >>",
        );
        assert_eq!(font.encoding.base, TextEncoding::StandardEncoding);
        assert_eq!(font.decode(b"\x01\x02!"), "Hi!");
    }

    #[test]
    fn test_to_unicode_takes_precedence() {
        let font = font_from(
            &[(
                9,
                "<< /Length 35 >>\nstream\n1 beginbfchar <41> <0058> endbfchar\nendstream",
            )],
            "<< /Subtype /Type1 /Encoding /WinAnsiEncoding /ToUnicode 9 0 R >>",
        );
        assert!(font.to_unicode.is_some());
        assert_eq!(font.decode(b"AB"), "XB");
    }

    #[test]
    fn test_composite_font_uses_two_byte_codes() {
        let font = font_from(
            &[(
                9,
                "<< >>\nstream\n1 beginbfrange <0001> <0005> <0061> endbfrange\nendstream",
            )],
            "<< /Subtype /Type0 /Encoding /Identity-H /ToUnicode 9 0 R >>",
        );
        assert!(font.is_composite());
        assert_eq!(font.decode(&[0x00, 0x01, 0x00, 0x03, 0x00, 0x09]), "ac\u{FFFD}");
    }

    #[test]
    fn test_unusable_to_unicode_is_ignored() {
        let font = font_from(&[], "<< /Subtype /Type1 /ToUnicode 40 0 R >>");
        assert!(font.to_unicode.is_none());
        assert_eq!(font.decode(b"ok"), "ok");
    }
}

//! Simple-font encodings
//!
//! Maps single-byte character codes to Unicode for the base encodings of
//! ISO 32000-1 Annex D, with `/Differences` overrides resolved through glyph
//! names.

use crate::parser::{PdfArray, PdfObject};
use std::collections::HashMap;

/// Base encoding of a simple font
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    StandardEncoding,
    MacRomanEncoding,
    WinAnsiEncoding,
    PdfDocEncoding,
    /// Bytes taken as Latin-1 code points
    Raw,
}

impl TextEncoding {
    /// Encoding for a `/BaseEncoding` or `/Encoding` name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "StandardEncoding" => Some(TextEncoding::StandardEncoding),
            "MacRomanEncoding" => Some(TextEncoding::MacRomanEncoding),
            "WinAnsiEncoding" => Some(TextEncoding::WinAnsiEncoding),
            "PDFDocEncoding" => Some(TextEncoding::PdfDocEncoding),
            _ => None,
        }
    }

    /// Character for a single code, `None` where the encoding leaves it undefined
    pub fn decode_byte(&self, byte: u8) -> Option<char> {
        match self {
            TextEncoding::Raw => Some(byte as char),
            TextEncoding::WinAnsiEncoding => match byte {
                0x80..=0x9F => WIN_ANSI_HIGH[(byte - 0x80) as usize],
                _ => Some(byte as char),
            },
            TextEncoding::MacRomanEncoding => match byte {
                0x80..=0xFF => MAC_ROMAN_HIGH[(byte - 0x80) as usize].chars().next(),
                _ => Some(byte as char),
            },
            TextEncoding::PdfDocEncoding => match byte {
                0x18..=0x1F => PDF_DOC_LOW[(byte - 0x18) as usize].chars().next(),
                0x80..=0xA0 => PDF_DOC_HIGH[(byte - 0x80) as usize],
                _ => Some(byte as char),
            },
            TextEncoding::StandardEncoding => standard_char(byte),
        }
    }

    /// Decode a byte string
    pub fn decode(&self, data: &[u8]) -> String {
        data.iter()
            .map(|&byte| self.decode_byte(byte).unwrap_or(byte as char))
            .collect()
    }
}

/// Base encoding plus `/Differences`
#[derive(Debug, Clone, PartialEq)]
pub struct FontEncoding {
    pub base: TextEncoding,
    pub differences: HashMap<u8, char>,
}

impl FontEncoding {
    /// Encoding without differences
    pub fn new(base: TextEncoding) -> Self {
        Self {
            base,
            differences: HashMap::new(),
        }
    }

    /// Apply a `/Differences` array: a code followed by the glyph names of
    /// consecutive codes, repeated.
    pub fn apply_differences(&mut self, differences: &PdfArray) {
        let mut code: Option<u32> = None;
        for item in &differences.0 {
            match item {
                PdfObject::Integer(start) => code = u32::try_from(*start).ok(),
                PdfObject::Name(name) => {
                    let Some(current) = code else { continue };
                    if let Ok(byte) = u8::try_from(current) {
                        match glyph_to_char(name.as_str()) {
                            Some(ch) => {
                                self.differences.insert(byte, ch);
                            }
                            None => tracing::trace!("Unknown glyph name /{}", name.as_str()),
                        }
                    }
                    code = Some(current + 1);
                }
                _ => {}
            }
        }
    }

    /// Character for one code
    pub fn decode_byte(&self, byte: u8) -> char {
        self.differences
            .get(&byte)
            .copied()
            .or_else(|| self.base.decode_byte(byte))
            .unwrap_or(byte as char)
    }

    /// Decode a byte string
    pub fn decode(&self, data: &[u8]) -> String {
        data.iter().map(|&byte| self.decode_byte(byte)).collect()
    }
}

impl Default for FontEncoding {
    fn default() -> Self {
        Self::new(TextEncoding::Raw)
    }
}

const WIN_ANSI_HIGH: [Option<char>; 32] = [
    Some('\u{20AC}'),
    None,
    Some('\u{201A}'),
    Some('\u{0192}'),
    Some('\u{201E}'),
    Some('\u{2026}'),
    Some('\u{2020}'),
    Some('\u{2021}'),
    Some('\u{02C6}'),
    Some('\u{2030}'),
    Some('\u{0160}'),
    Some('\u{2039}'),
    Some('\u{0152}'),
    None,
    Some('\u{017D}'),
    None,
    None,
    Some('\u{2018}'),
    Some('\u{2019}'),
    Some('\u{201C}'),
    Some('\u{201D}'),
    Some('\u{2022}'),
    Some('\u{2013}'),
    Some('\u{2014}'),
    Some('\u{02DC}'),
    Some('\u{2122}'),
    Some('\u{0161}'),
    Some('\u{203A}'),
    Some('\u{0153}'),
    None,
    Some('\u{017E}'),
    Some('\u{0178}'),
];

const MAC_ROMAN_HIGH: [&str; 128] = [
    "Ä", "Å", "Ç", "É", "Ñ", "Ö", "Ü", "á", "à", "â", "ä", "ã", "å", "ç", "é", "è", //
    "ê", "ë", "í", "ì", "î", "ï", "ñ", "ó", "ò", "ô", "ö", "õ", "ú", "ù", "û", "ü", //
    "†", "°", "¢", "£", "§", "•", "¶", "ß", "®", "©", "™", "´", "¨", "≠", "Æ", "Ø", //
    "∞", "±", "≤", "≥", "¥", "µ", "∂", "∑", "∏", "π", "∫", "ª", "º", "Ω", "æ", "ø", //
    "¿", "¡", "¬", "√", "ƒ", "≈", "∆", "«", "»", "…", "\u{A0}", "À", "Ã", "Õ", "Œ", "œ", //
    "–", "—", "“", "”", "‘", "’", "÷", "◊", "ÿ", "Ÿ", "⁄", "¤", "‹", "›", "ﬁ", "ﬂ", //
    "‡", "·", "‚", "„", "‰", "Â", "Ê", "Á", "Ë", "È", "Í", "Î", "Ï", "Ì", "Ó", "Ô", //
    "\u{F8FF}", "Ò", "Ú", "Û", "Ù", "ı", "ˆ", "˜", "¯", "˘", "˙", "˚", "¸", "˝", "˛", "ˇ", //
];

const PDF_DOC_LOW: [&str; 8] = ["˘", "ˇ", "ˆ", "˙", "˝", "˛", "˚", "˜"];

const PDF_DOC_HIGH: [Option<char>; 33] = [
    Some('•'),
    Some('†'),
    Some('‡'),
    Some('…'),
    Some('—'),
    Some('–'),
    Some('ƒ'),
    Some('⁄'),
    Some('‹'),
    Some('›'),
    Some('−'),
    Some('‰'),
    Some('„'),
    Some('“'),
    Some('”'),
    Some('‘'),
    Some('’'),
    Some('‚'),
    Some('™'),
    Some('ﬁ'),
    Some('ﬂ'),
    Some('Ł'),
    Some('Œ'),
    Some('Š'),
    Some('Ÿ'),
    Some('Ž'),
    Some('ı'),
    Some('ł'),
    Some('œ'),
    Some('š'),
    Some('ž'),
    None,
    Some('€'),
];

fn standard_char(byte: u8) -> Option<char> {
    let ch = match byte {
        0x27 => '’',
        0x60 => '‘',
        0x20..=0x7E => byte as char,
        0xA1 => '¡',
        0xA2 => '¢',
        0xA3 => '£',
        0xA4 => '⁄',
        0xA5 => '¥',
        0xA6 => 'ƒ',
        0xA7 => '§',
        0xA8 => '¤',
        0xA9 => '\'',
        0xAA => '“',
        0xAB => '«',
        0xAC => '‹',
        0xAD => '›',
        0xAE => 'ﬁ',
        0xAF => 'ﬂ',
        0xB1 => '–',
        0xB2 => '†',
        0xB3 => '‡',
        0xB4 => '·',
        0xB6 => '¶',
        0xB7 => '•',
        0xB8 => '‚',
        0xB9 => '„',
        0xBA => '”',
        0xBB => '»',
        0xBC => '…',
        0xBD => '‰',
        0xBF => '¿',
        0xC1 => '`',
        0xC2 => '´',
        0xC3 => 'ˆ',
        0xC4 => '˜',
        0xC5 => '¯',
        0xC6 => '˘',
        0xC7 => '˙',
        0xC8 => '¨',
        0xCA => '˚',
        0xCB => '¸',
        0xCD => '˝',
        0xCE => '˛',
        0xCF => 'ˇ',
        0xD0 => '—',
        0xE1 => 'Æ',
        0xE3 => 'ª',
        0xE8 => 'Ł',
        0xE9 => 'Ø',
        0xEA => 'Œ',
        0xEB => 'º',
        0xF1 => 'æ',
        0xF5 => 'ı',
        0xF8 => 'ł',
        0xF9 => 'ø',
        0xFA => 'œ',
        0xFB => 'ß',
        _ => return None,
    };
    Some(ch)
}

/// Glyph names of codes 0x20..=0x7E in ASCII order
const ASCII_GLYPHS: [&str; 95] = [
    "space", "exclam", "quotedbl", "numbersign", "dollar", "percent", "ampersand",
    "quotesingle", "parenleft", "parenright", "asterisk", "plus", "comma", "hyphen", "period",
    "slash", "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine",
    "colon", "semicolon", "less", "equal", "greater", "question", "at", "A", "B", "C", "D", "E",
    "F", "G", "H", "I", "J", "K", "L", "M", "N", "O", "P", "Q", "R", "S", "T", "U", "V", "W",
    "X", "Y", "Z", "bracketleft", "backslash", "bracketright", "asciicircum", "underscore",
    "grave", "a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k", "l", "m", "n", "o", "p",
    "q", "r", "s", "t", "u", "v", "w", "x", "y", "z", "braceleft", "bar", "braceright",
    "asciitilde",
];

/// Glyph names of U+00A0..=U+00FF
const LATIN1_GLYPHS: [&str; 96] = [
    "nbspace", "exclamdown", "cent", "sterling", "currency", "yen", "brokenbar", "section",
    "dieresis", "copyright", "ordfeminine", "guillemotleft", "logicalnot", "sfthyphen",
    "registered", "macron", "degree", "plusminus", "twosuperior", "threesuperior", "acute",
    "mu", "paragraph", "periodcentered", "cedilla", "onesuperior", "ordmasculine",
    "guillemotright", "onequarter", "onehalf", "threequarters", "questiondown", "Agrave",
    "Aacute", "Acircumflex", "Atilde", "Adieresis", "Aring", "AE", "Ccedilla", "Egrave",
    "Eacute", "Ecircumflex", "Edieresis", "Igrave", "Iacute", "Icircumflex", "Idieresis",
    "Eth", "Ntilde", "Ograve", "Oacute", "Ocircumflex", "Otilde", "Odieresis", "multiply",
    "Oslash", "Ugrave", "Uacute", "Ucircumflex", "Udieresis", "Yacute", "Thorn", "germandbls",
    "agrave", "aacute", "acircumflex", "atilde", "adieresis", "aring", "ae", "ccedilla",
    "egrave", "eacute", "ecircumflex", "edieresis", "igrave", "iacute", "icircumflex",
    "idieresis", "eth", "ntilde", "ograve", "oacute", "ocircumflex", "otilde", "odieresis",
    "divide", "oslash", "ugrave", "uacute", "ucircumflex", "udieresis", "yacute", "thorn",
    "ydieresis",
];

/// Resolve a glyph name to a character
pub fn glyph_to_char(name: &str) -> Option<char> {
    if let Some(index) = ASCII_GLYPHS.iter().position(|&glyph| glyph == name) {
        return char::from_u32(0x20 + index as u32);
    }
    if let Some(index) = LATIN1_GLYPHS.iter().position(|&glyph| glyph == name) {
        return char::from_u32(0xA0 + index as u32);
    }

    let ch = match name {
        "quoteleft" => '‘',
        "quoteright" => '’',
        "quotedblleft" => '“',
        "quotedblright" => '”',
        "quotesinglbase" => '‚',
        "quotedblbase" => '„',
        "guilsinglleft" => '‹',
        "guilsinglright" => '›',
        "bullet" => '•',
        "endash" => '–',
        "emdash" => '—',
        "ellipsis" => '…',
        "dagger" => '†',
        "daggerdbl" => '‡',
        "perthousand" => '‰',
        "trademark" => '™',
        "Euro" => '€',
        "florin" => 'ƒ',
        "fraction" => '⁄',
        "minus" => '−',
        "fi" => 'ﬁ',
        "fl" => 'ﬂ',
        "ff" => 'ﬀ',
        "ffi" => 'ﬃ',
        "ffl" => 'ﬄ',
        "OE" => 'Œ',
        "oe" => 'œ',
        "Scaron" => 'Š',
        "scaron" => 'š',
        "Zcaron" => 'Ž',
        "zcaron" => 'ž',
        "Ydieresis" => 'Ÿ',
        "Lslash" => 'Ł',
        "lslash" => 'ł',
        "dotlessi" => 'ı',
        "circumflex" => 'ˆ',
        "tilde" => '˜',
        "breve" => '˘',
        "caron" => 'ˇ',
        "dotaccent" => '˙',
        "hungarumlaut" => '˝',
        "ogonek" => '˛',
        "ring" => '˚',
        "space" | "nbspace" => ' ',
        _ => return unicode_glyph(name),
    };
    Some(ch)
}

/// `uniXXXX` and `uXXXX[XX]` glyph names
fn unicode_glyph(name: &str) -> Option<char> {
    let hex = name
        .strip_prefix("uni")
        .filter(|hex| hex.len() == 4)
        .or_else(|| {
            name.strip_prefix('u')
                .filter(|hex| (4..=6).contains(&hex.len()))
        })?;
    u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::PdfName;

    #[test]
    fn test_win_ansi_decode() {
        let encoding = TextEncoding::WinAnsiEncoding;
        assert_eq!(encoding.decode(b"Caf\xe9 \x80 \x93x\x94"), "Café € “x”");
    }

    #[test]
    fn test_mac_roman_decode() {
        assert_eq!(TextEncoding::MacRomanEncoding.decode(b"\x8e\xa5"), "é•");
    }

    #[test]
    fn test_standard_quotes() {
        assert_eq!(TextEncoding::StandardEncoding.decode(b"`it's'"), "‘it’s’");
        assert_eq!(TextEncoding::StandardEncoding.decode_byte(0xAE), Some('ﬁ'));
        assert_eq!(TextEncoding::StandardEncoding.decode_byte(0x80), None);
    }

    #[test]
    fn test_pdf_doc_decode() {
        assert_eq!(TextEncoding::PdfDocEncoding.decode(b"\x84\xa0"), "—€");
    }

    #[test]
    fn test_raw_is_latin1() {
        assert_eq!(TextEncoding::Raw.decode(b"A\xe9"), "Aé");
    }

    #[test]
    fn test_glyph_names() {
        assert_eq!(glyph_to_char("A"), Some('A'));
        assert_eq!(glyph_to_char("eacute"), Some('é'));
        assert_eq!(glyph_to_char("quoteright"), Some('’'));
        assert_eq!(glyph_to_char("uni20AC"), Some('€'));
        assert_eq!(glyph_to_char("u1F600"), Some('😀'));
        assert_eq!(glyph_to_char("g123"), None);
    }

    #[test]
    fn test_differences_override_base() {
        let mut encoding = FontEncoding::new(TextEncoding::WinAnsiEncoding);
        encoding.apply_differences(&PdfArray(vec![
            PdfObject::Integer(65),
            PdfObject::Name(PdfName::new("bullet".to_string())),
            PdfObject::Name(PdfName::new("Euro".to_string())),
            PdfObject::Integer(200),
            PdfObject::Name(PdfName::new("unknownglyph".to_string())),
        ]));
        assert_eq!(encoding.decode(b"ABC\xc8"), "•€CÈ");
    }
}

//! Fonts and text extraction
//!
//! Builds per-page font dictionaries from inherited resources and turns
//! content stream text operators into decoded text.

pub mod cmap;
pub mod encoding;
pub mod extraction;
pub mod font;

pub use cmap::{CodeRange, ToUnicodeMap};
pub use encoding::{glyph_to_char, FontEncoding, TextEncoding};
pub use extraction::{
    join_fragments, ExtractionOptions, TextExtractor, TextFragment, TextFragments,
};
pub use font::{Font, FontDictionary};

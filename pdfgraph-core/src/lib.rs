//! # pdfgraph
//!
//! A lazily resolved PDF object graph for reading documents: objects are
//! parsed on first use and cached, pages inherit their attributes through the
//! page tree, and text is extracted from content streams with the fonts of
//! each page.
//!
//! ## Features
//!
//! - **Lazy resolution**: Indirect objects are parsed once, on first access, and shared afterwards
//! - **Cycle safety**: Self-referential references and page trees fail cleanly instead of looping
//! - **Page inheritance**: Resources, MediaBox, CropBox and Rotate are looked up through ancestors
//! - **Font dictionaries**: Encodings, `/Differences` and ToUnicode CMaps, shared per font object
//! - **Text extraction**: Lazy text fragments with line breaks, including form XObjects
//! - **Pluggable storage**: Any [`ObjectStore`](parser::ObjectStore) can feed the resolver
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdfgraph::parser::PdfDocument;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let document = PdfDocument::open("document.pdf")?;
//!
//! for i in 0..document.page_count()? {
//!     let page = document.page_at(i)?;
//!     println!("Page {} size: {}x{} points", i + 1, page.width(), page.height());
//!     println!("{}", document.extract_text(&page)?);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`parser`] - Object model, resolver, page tree and content stream parsing
//! - [`text`] - Fonts, encodings and text extraction
//!
//! ## Examples
//!
//! ### In-memory documents
//!
//! ```rust
//! use pdfgraph::parser::{MemoryStore, ObjectId, PdfDocument};
//!
//! let mut store = MemoryStore::new();
//! store.insert_bytes(ObjectId::new(1, 0), "<< /Type /Pages /Kids [2 0 R] /Count 1 >>");
//! store.insert_bytes(
//!     ObjectId::new(2, 0),
//!     "<< /Type /Page /Parent 1 0 R /Contents 3 0 R \
//!      /Resources << /Font << /F1 4 0 R >> >> >>",
//! );
//! store.insert_bytes(
//!     ObjectId::new(3, 0),
//!     "<< /Length 26 >>\nstream\nBT /F1 12 Tf (Hello) Tj ET\nendstream",
//! );
//! store.insert_bytes(ObjectId::new(4, 0), "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>");
//!
//! let document = PdfDocument::new(store, ObjectId::new(1, 0));
//! assert_eq!(document.extract_text_at(0).unwrap(), "Hello");
//! ```

pub mod parser;
pub mod text;

// Re-export the document model
pub use parser::{
    ContentOperation, ContentParser, ObjectId, ObjectStore, ParseError, ParseOptions,
    ParseResult, ParsedPage, PdfArray, PdfDictionary, PdfDocument, PdfName, PdfObject,
    PdfStream, PdfString, Rectangle, Resolver,
};

// Re-export text types
pub use text::{ExtractionOptions, Font, FontDictionary, TextExtractor, TextFragment};

/// Current version of pdfgraph
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

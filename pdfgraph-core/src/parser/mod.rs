//! PDF Parser Module
//!
//! This module implements the object graph of a PDF document: definition
//! nodes, the reference resolver with its per-document cache, the page tree
//! with attribute inheritance, and content stream parsing.
//!
//! Reading the file itself is delegated to an [`ObjectStore`], which hands out
//! either raw object bytes or already parsed nodes for an object identity.

pub mod content;
pub mod document;
pub mod filters;
pub mod lexer;
pub mod objects;
pub mod page_tree;
pub mod resolver;
pub mod stack_safe;
pub mod store;

pub use self::content::{ContentOperation, ContentParser, TextElement};
pub use self::document::PdfDocument;
pub use self::objects::{
    Definition, ObjectId, PdfArray, PdfDictionary, PdfName, PdfObject, PdfStream, PdfString,
};
pub use self::page_tree::{NodeKind, PageTree, ParsedPage, Rectangle, TreeNode};
pub use self::resolver::{Resolved, Resolver, ResolverStats};
pub use self::store::{MemoryStore, ObjectStore, RawObject, ScanStore};

/// Result type for parser operations
pub type ParseResult<T> = Result<T, ParseError>;

/// PDF Parser errors
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unresolved reference: {0} R")]
    UnresolvedReference(ObjectId),

    #[error("Malformed object {id} R: {message}")]
    MalformedObject { id: ObjectId, message: String },

    #[error("Cyclic reference detected while resolving {0} R")]
    CyclicReference(ObjectId),

    #[error("Syntax error at position {position}: {message}")]
    SyntaxError { position: usize, message: String },

    #[error("Unexpected token: expected {expected}, found {found}")]
    UnexpectedToken { expected: String, found: String },

    #[error("Missing required key: {0}")]
    MissingKey(String),

    #[error("Invalid page: {0}")]
    InvalidPage(String),

    #[error("Unsupported stream filter: {0}")]
    UnsupportedFilter(String),

    #[error("Stream decode error: {0}")]
    StreamDecodeError(String),
}

/// Parsing options shared by the resolver, page tree and extractor.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseOptions {
    /// Drop unreadable page-tree kids and content parts instead of
    /// keeping them as per-page failures.
    pub lenient_syntax: bool,
    /// Emit a `tracing` warning for every tolerated problem.
    pub collect_warnings: bool,
    /// Maximum nesting depth for page-tree walks, reference chains and
    /// form XObject recursion.
    pub max_depth: usize,
}

impl ParseOptions {
    /// Report unreadable pages and content parts as errors.
    pub fn strict() -> Self {
        Self {
            lenient_syntax: false,
            collect_warnings: false,
            max_depth: stack_safe::MAX_RECURSION_DEPTH,
        }
    }

    /// Recover from structural problems where a sensible fallback exists.
    pub fn lenient() -> Self {
        Self {
            lenient_syntax: true,
            collect_warnings: true,
            max_depth: stack_safe::MAX_RECURSION_DEPTH,
        }
    }
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self::strict()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let id = ObjectId::new(12, 0);
        assert_eq!(
            ParseError::UnresolvedReference(id).to_string(),
            "Unresolved reference: 12 0 R"
        );
        assert_eq!(
            ParseError::CyclicReference(ObjectId::new(3, 1)).to_string(),
            "Cyclic reference detected while resolving 3 1 R"
        );
        let malformed = ParseError::MalformedObject {
            id,
            message: "unexpected end of data".to_string(),
        };
        assert_eq!(
            malformed.to_string(),
            "Malformed object 12 0 R: unexpected end of data"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        match ParseError::from(io) {
            ParseError::Io(err) => assert_eq!(err.kind(), std::io::ErrorKind::NotFound),
            other => panic!("Expected Io variant, got {other:?}"),
        }
    }

    #[test]
    fn test_option_presets() {
        assert_eq!(ParseOptions::default(), ParseOptions::strict());
        let lenient = ParseOptions::lenient();
        assert!(lenient.lenient_syntax);
        assert!(lenient.collect_warnings);
        assert_eq!(lenient.max_depth, stack_safe::MAX_RECURSION_DEPTH);
    }
}

//! PDF Document - high-level handle over the object graph
//!
//! [`PdfDocument`] ties together the pieces a reader needs: the
//! [`Resolver`] and its cache, the lazily flattened [`PageTree`], the cache
//! of [`ParsedPage`]s and the shared font cache. All state lives behind
//! interior mutability (`RefCell`, `OnceCell`), so every operation takes
//! `&self` and values handed out stay valid while the document lives.
//!
//! A document is single-threaded. Open one document per thread when
//! processing files in parallel.
//!
//! # Example
//!
//! ```rust,no_run
//! use pdfgraph::parser::PdfDocument;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let document = PdfDocument::open("document.pdf")?;
//! println!("Pages: {}", document.page_count()?);
//!
//! for index in 0..document.page_count()? {
//!     let page = document.page_at(index)?;
//!     println!("--- page {} ---", index + 1);
//!     println!("{}", document.extract_text(&page)?);
//! }
//! # Ok(())
//! # }
//! ```

use super::objects::{ObjectId, PdfDictionary, PdfObject};
use super::page_tree::{PageTree, ParsedPage, Rectangle};
use super::resolver::Resolver;
use super::store::{ObjectStore, ScanStore};
use super::{ParseError, ParseOptions, ParseResult};
use crate::text::{ExtractionOptions, Font, FontDictionary, TextExtractor};
use std::cell::{OnceCell, RefCell};
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

/// Separator inserted between the streams of a `/Contents` array
const STREAM_SEPARATOR: u8 = b'\n';

/// Handle over the object graph of one PDF document.
pub struct PdfDocument<S: ObjectStore> {
    resolver: Resolver<S>,
    options: ParseOptions,
    pages_root: ObjectId,
    /// Flattened page tree, built on first page access
    tree: OnceCell<PageTree>,
    /// Pages by index, created on first access
    pages: RefCell<HashMap<usize, Rc<ParsedPage>>>,
    /// Fonts by object identity, shared between pages
    fonts: RefCell<HashMap<ObjectId, Rc<Font>>>,
}

impl<S: ObjectStore> PdfDocument<S> {
    /// Create a document over a store, given the root of its page tree.
    ///
    /// Nothing is read until a page is requested.
    pub fn new(store: S, pages_root: ObjectId) -> Self {
        Self::with_options(store, pages_root, ParseOptions::default())
    }

    /// Create a document with custom parse options
    pub fn with_options(store: S, pages_root: ObjectId, options: ParseOptions) -> Self {
        Self {
            resolver: Resolver::with_max_depth(store, options.max_depth),
            options,
            pages_root,
            tree: OnceCell::new(),
            pages: RefCell::new(HashMap::new()),
            fonts: RefCell::new(HashMap::new()),
        }
    }

    /// Create a document from its catalog object.
    ///
    /// # Errors
    ///
    /// Fails if the catalog cannot be resolved or has no `/Pages` reference.
    pub fn from_catalog(store: S, catalog: ObjectId, options: ParseOptions) -> ParseResult<Self> {
        let resolver = Resolver::with_max_depth(store, options.max_depth);
        let object = resolver.resolve(catalog)?;
        let dict = object.as_dict().ok_or_else(|| ParseError::MalformedObject {
            id: catalog,
            message: format!("catalog is a {}", object.type_name()),
        })?;
        let pages_root = dict
            .get("Pages")
            .and_then(|pages| pages.as_reference())
            .ok_or_else(|| ParseError::MissingKey("Pages".to_string()))?;

        tracing::debug!("Catalog {} R has page tree root {} R", catalog, pages_root);
        Ok(Self {
            resolver,
            options,
            pages_root,
            tree: OnceCell::new(),
            pages: RefCell::new(HashMap::new()),
            fonts: RefCell::new(HashMap::new()),
        })
    }

    /// The reference resolver and its cache
    pub fn resolver(&self) -> &Resolver<S> {
        &self.resolver
    }

    /// Parse options in effect
    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Identity of the page tree root
    pub fn pages_root(&self) -> ObjectId {
        self.pages_root
    }

    /// Resolve an object by identity through the document cache
    pub fn resolve(&self, id: ObjectId) -> ParseResult<Rc<PdfObject>> {
        self.resolver.resolve(id)
    }

    /// Resolve `obj` if it is a reference, otherwise return a shared copy
    pub fn resolve_object(&self, obj: &PdfObject) -> ParseResult<Rc<PdfObject>> {
        Ok(self.resolver.resolve_object(obj)?.into_shared())
    }

    /// The flattened page tree, built on first use
    pub fn page_tree(&self) -> ParseResult<&PageTree> {
        if let Some(tree) = self.tree.get() {
            return Ok(tree);
        }
        let tree = PageTree::build(&self.resolver, self.pages_root, &self.options)?;
        Ok(self.tree.get_or_init(|| tree))
    }

    /// Number of pages
    pub fn page_count(&self) -> ParseResult<usize> {
        Ok(self.page_tree()?.page_count())
    }

    /// The page at a zero-based index.
    ///
    /// Pages are created on first access and cached, so repeated calls
    /// return the same page.
    ///
    /// # Errors
    ///
    /// [`ParseError::InvalidPage`] if the index is out of range.
    pub fn page_at(&self, index: usize) -> ParseResult<Rc<ParsedPage>> {
        if let Some(page) = self.pages.borrow().get(&index) {
            return Ok(Rc::clone(page));
        }

        let page = Rc::new(self.page_tree()?.load_page(&self.resolver, index)?);
        self.pages.borrow_mut().insert(index, Rc::clone(&page));
        Ok(page)
    }

    /// The page with the given object identity.
    ///
    /// # Errors
    ///
    /// [`ParseError::InvalidPage`] if the identity is not a page of the tree.
    pub fn page_by_id(&self, id: ObjectId) -> ParseResult<Rc<ParsedPage>> {
        let index = self
            .page_index_of(id)?
            .ok_or_else(|| ParseError::InvalidPage(format!("{id} R is not a page")))?;
        self.page_at(index)
    }

    /// Index of the page with the given identity
    pub fn page_index_of(&self, id: ObjectId) -> ParseResult<Option<usize>> {
        Ok(self.page_tree()?.page_index_of(id))
    }

    /// The page dictionary
    pub fn page_object(&self, page: &ParsedPage) -> ParseResult<Rc<PdfObject>> {
        self.resolver.resolve(page.id)
    }

    /// Inherited Resources of a page, empty when no ancestor defines any
    pub fn resources(&self, page: &ParsedPage) -> ParseResult<PdfDictionary> {
        self.page_tree()?.resources(&self.resolver, page)
    }

    /// Inherited MediaBox of a page
    pub fn media_box(&self, page: &ParsedPage) -> Rectangle {
        page.media_box
    }

    /// The content streams of a page in order.
    ///
    /// An entry of a `/Contents` array that cannot be resolved, or is not a
    /// stream, is an error in strict mode and skipped in lenient mode.
    pub fn content_streams(&self, page: &ParsedPage) -> ParseResult<Vec<Rc<PdfObject>>> {
        let mut streams = Vec::new();
        for part in self.content_parts(page) {
            match part {
                Ok(stream) => streams.push(stream),
                Err(e) if self.options.lenient_syntax => {
                    if self.options.collect_warnings {
                        tracing::warn!("Skipping content stream of page {}: {}", page.index, e);
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Ok(streams)
    }

    /// Decoded content of a page.
    ///
    /// Streams are joined with a single newline so tokens never merge
    /// across a split. A stream that cannot be resolved or decoded is
    /// skipped with a warning.
    pub fn content_bytes(&self, page: &ParsedPage) -> ParseResult<Vec<u8>> {
        let mut content = Vec::new();
        for part in self.content_parts(page) {
            let decoded = part.and_then(|stream| match stream.as_stream() {
                Some(stream) => stream.decode(),
                None => Err(ParseError::StreamDecodeError(format!(
                    "content is a {}",
                    stream.type_name()
                ))),
            });
            match decoded {
                Ok(data) => {
                    if !content.is_empty() {
                        content.push(STREAM_SEPARATOR);
                    }
                    content.extend_from_slice(&data);
                }
                Err(e) => tracing::warn!("Skipping content stream of page {}: {}", page.index, e),
            }
        }
        Ok(content)
    }

    fn content_parts(&self, page: &ParsedPage) -> Vec<ParseResult<Rc<PdfObject>>> {
        let Some(contents) = page.contents.as_ref() else {
            return Vec::new();
        };
        let contents = match self.resolver.resolve_object(contents) {
            Ok(contents) => contents,
            Err(e) => return vec![Err(e)],
        };

        match &*contents {
            PdfObject::Null => return Vec::new(),
            PdfObject::Array(parts) => {
                return parts
                    .0
                    .iter()
                    .map(|part| {
                        let part = self.resolver.resolve_object(part)?;
                        if part.as_stream().is_some() {
                            Ok(part.into_shared())
                        } else {
                            Err(ParseError::UnexpectedToken {
                                expected: "content stream".to_string(),
                                found: part.type_name().to_string(),
                            })
                        }
                    })
                    .collect()
            }
            PdfObject::Stream(_) => {}
            other => {
                return vec![Err(ParseError::UnexpectedToken {
                    expected: "content stream or array".to_string(),
                    found: other.type_name().to_string(),
                })]
            }
        }
        vec![Ok(contents.into_shared())]
    }

    /// Font dictionary of a page, built on first request and cached on the
    /// page
    pub fn font_dictionary(&self, page: &ParsedPage) -> ParseResult<Rc<FontDictionary>> {
        if let Some(fonts) = page.cached_fonts() {
            return Ok(Rc::clone(fonts));
        }
        let fonts = Rc::new(FontDictionary::build(self, page)?);
        Ok(Rc::clone(page.font_cache().get_or_init(|| fonts)))
    }

    /// Font dictionary of the page with the given identity
    pub fn font_dictionary_by_id(&self, id: ObjectId) -> ParseResult<Rc<FontDictionary>> {
        let page = self.page_by_id(id)?;
        self.font_dictionary(&page)
    }

    /// The shared font built from a font object.
    ///
    /// Every font dictionary referring to the same identity gets the same
    /// `Rc`.
    pub fn shared_font(&self, id: ObjectId) -> ParseResult<Rc<Font>> {
        if let Some(font) = self.fonts.borrow().get(&id) {
            return Ok(Rc::clone(font));
        }

        let object = self.resolver.resolve(id)?;
        let dict = object.as_dict().ok_or_else(|| ParseError::UnexpectedToken {
            expected: "font dictionary".to_string(),
            found: object.type_name().to_string(),
        })?;
        let font = Rc::new(Font::from_dict(&self.resolver, dict, Some(id)));
        tracing::debug!(
            "Loaded font {} R ({})",
            id,
            font.base_font.as_deref().unwrap_or("unnamed")
        );

        Ok(Rc::clone(
            self.fonts.borrow_mut().entry(id).or_insert(font),
        ))
    }

    /// Extract the text of a page with default options.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use pdfgraph::parser::PdfDocument;
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let document = PdfDocument::open("document.pdf")?;
    /// let page = document.page_at(0)?;
    /// for line in document.extract_text(&page)?.lines() {
    ///     println!("{line}");
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn extract_text(&self, page: &ParsedPage) -> ParseResult<String> {
        TextExtractor::new().extract_text(self, page)
    }

    /// Extract the text of a page with custom options
    pub fn extract_text_with(
        &self,
        page: &ParsedPage,
        options: &ExtractionOptions,
    ) -> ParseResult<String> {
        TextExtractor::with_options(options.clone()).extract_text(self, page)
    }

    /// Extract the text of the page at `index`
    pub fn extract_text_at(&self, index: usize) -> ParseResult<String> {
        let page = self.page_at(index)?;
        self.extract_text(&page)
    }

    /// Extract the text of every page, in page order
    pub fn extract_all_text(&self) -> ParseResult<Vec<String>> {
        (0..self.page_count()?)
            .map(|index| self.extract_text_at(index))
            .collect()
    }
}

impl PdfDocument<ScanStore> {
    /// Open a file with default options.
    ///
    /// Objects are located by scanning for their headers, and the catalog
    /// is found through the trailer's `/Root` entry.
    pub fn open<P: AsRef<Path>>(path: P) -> ParseResult<Self> {
        Self::open_with_options(path, ParseOptions::default())
    }

    /// Open a file with custom options
    pub fn open_with_options<P: AsRef<Path>>(path: P, options: ParseOptions) -> ParseResult<Self> {
        Self::from_store(ScanStore::open(path)?, options)
    }

    /// Open in-memory file contents
    pub fn from_bytes(data: Vec<u8>, options: ParseOptions) -> ParseResult<Self> {
        Self::from_store(ScanStore::from_bytes(data), options)
    }

    fn from_store(store: ScanStore, options: ParseOptions) -> ParseResult<Self> {
        let catalog = store
            .root()
            .ok_or_else(|| ParseError::MissingKey("Root".to_string()))?;
        Self::from_catalog(store, catalog, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::MemoryStore;

    fn id(number: u32) -> ObjectId {
        ObjectId::new(number, 0)
    }

    fn sample_store() -> MemoryStore {
        let mut store = MemoryStore::new();
        store.insert_bytes(id(1), "<< /Type /Catalog /Pages 2 0 R >>");
        store.insert_bytes(id(2), "<< /Type /Pages /Kids [3 0 R 4 0 R] /Count 2 >>");
        store.insert_bytes(id(3), "<< /Type /Page /Parent 2 0 R /Contents [5 0 R 6 0 R] >>");
        store.insert_bytes(id(4), "<< /Type /Page /Parent 2 0 R /Contents 9 0 R >>");
        store.insert_bytes(id(5), "<< /Length 5 >>\nstream\nBT (A\nendstream");
        store.insert_bytes(id(6), "<< /Length 7 >>\nstream\n) Tj ET\nendstream");
        store
    }

    #[test]
    fn test_from_catalog() {
        let doc = PdfDocument::from_catalog(sample_store(), id(1), ParseOptions::default()).unwrap();
        assert_eq!(doc.pages_root(), id(2));
        assert_eq!(doc.page_count().unwrap(), 2);
    }

    #[test]
    fn test_catalog_without_pages() {
        let mut store = MemoryStore::new();
        store.insert_bytes(id(1), "<< /Type /Catalog >>");
        let result = PdfDocument::from_catalog(store, id(1), ParseOptions::default());
        assert!(matches!(result, Err(ParseError::MissingKey(key)) if key == "Pages"));
    }

    #[test]
    fn test_pages_are_cached() {
        let doc = PdfDocument::new(sample_store(), id(2));
        let first = doc.page_at(1).unwrap();
        let again = doc.page_at(1).unwrap();
        assert!(Rc::ptr_eq(&first, &again));
        assert!(Rc::ptr_eq(&first, &doc.page_by_id(id(4)).unwrap()));
        assert!(matches!(doc.page_by_id(id(2)), Err(ParseError::InvalidPage(_))));
    }

    #[test]
    fn test_streams_joined_with_newline() {
        let doc = PdfDocument::new(sample_store(), id(2));
        let page = doc.page_at(0).unwrap();
        assert_eq!(doc.content_streams(&page).unwrap().len(), 2);
        assert_eq!(doc.content_bytes(&page).unwrap(), b"BT (A\n) Tj ET".to_vec());
    }

    #[test]
    fn test_unresolvable_content_is_skipped() {
        let doc = PdfDocument::new(sample_store(), id(2));
        let page = doc.page_at(1).unwrap();
        assert!(doc.content_bytes(&page).unwrap().is_empty());
        assert!(matches!(
            doc.content_streams(&page),
            Err(ParseError::UnresolvedReference(_))
        ));
        assert_eq!(doc.extract_text(&page).unwrap(), "");
    }

    #[test]
    fn test_font_dictionary_cached_on_page() {
        let doc = PdfDocument::new(sample_store(), id(2));
        let page = doc.page_at(0).unwrap();
        assert!(page.cached_fonts().is_none());
        let fonts = doc.font_dictionary(&page).unwrap();
        assert!(fonts.is_empty());
        assert!(Rc::ptr_eq(&fonts, &doc.font_dictionary_by_id(id(3)).unwrap()));
    }

    #[test]
    fn test_from_bytes_uses_trailer_root() {
        let file = b"%PDF-1.4
1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj
2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj
3 0 obj << /Type /Page /Parent 2 0 R >> endobj
trailer << /Root 1 0 R /Size 4 >>
%%EOF";
        let doc = PdfDocument::from_bytes(file.to_vec(), ParseOptions::default()).unwrap();
        assert_eq!(doc.page_count().unwrap(), 1);
        assert_eq!(doc.media_box(&doc.page_at(0).unwrap()), Rectangle::LETTER);
    }
}

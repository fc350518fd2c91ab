//! Text extraction from PDF content streams
//!
//! The extractor walks the content operators of a page lazily and yields
//! [`TextFragment`]s: decoded runs of text and line breaks. Glyph positions
//! are only tracked as far as needed to decide where lines end.
//!
//! Form XObjects painted with `Do` are interpreted in place, with their own
//! resources when they declare any.

use super::font::{Font, FontDictionary};
use crate::parser::content::{ContentOperation, ContentParser, TextElement};
use crate::parser::stack_safe::StackSafeContext;
use crate::parser::{
    ObjectId, ObjectStore, ParseError, ParseResult, ParsedPage, PdfDictionary, PdfDocument,
};
use std::collections::VecDeque;
use std::rc::Rc;

/// Text extraction options
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionOptions {
    /// Text emitted for each line break when fragments are joined
    pub line_break: String,
    /// Break lines on `Td`/`TD` with a vertical offset and on `Tm` that
    /// moves to another baseline
    pub break_on_move: bool,
    /// Negative `TJ` adjustment (thousandths of text space) at which a space
    /// is inserted; `None` never inserts one
    pub space_threshold: Option<f64>,
    /// Interpret form XObjects painted with `Do`
    pub follow_form_xobjects: bool,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self {
            line_break: "\n".to_string(),
            break_on_move: true,
            space_threshold: Some(250.0),
            follow_form_xobjects: true,
        }
    }
}

/// A piece of extracted text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextFragment {
    /// Decoded text of one show operation
    Text(String),
    /// End of a line
    LineBreak,
}

/// Text extractor for PDF pages
#[derive(Debug, Clone, Default)]
pub struct TextExtractor {
    options: ExtractionOptions,
}

impl TextExtractor {
    /// Create an extractor with default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an extractor with custom options
    pub fn with_options(options: ExtractionOptions) -> Self {
        Self { options }
    }

    /// Options in use
    pub fn options(&self) -> &ExtractionOptions {
        &self.options
    }

    /// Lazily extract the fragments of a page.
    ///
    /// Fails when the page's resources, fonts or content cannot be
    /// resolved at all. Problems inside the content end the sequence early;
    /// see [`TextFragments::error`].
    pub fn fragments<'d, S: ObjectStore>(
        &self,
        document: &'d PdfDocument<S>,
        page: &ParsedPage,
    ) -> ParseResult<TextFragments<'d, S>> {
        let resources = Rc::new(document.resources(page)?);
        let fonts = document.font_dictionary(page)?;
        let content = document.content_bytes(page)?;

        tracing::debug!(
            "Extracting text from page {} ({} content bytes)",
            page.index,
            content.len()
        );
        Ok(TextFragments::new(
            document,
            self.options.clone(),
            content,
            resources,
            fonts,
        ))
    }

    /// Extract the text of a page as a single string.
    ///
    /// A malformed content stream yields the text found before the problem.
    pub fn extract_text<S: ObjectStore>(
        &self,
        document: &PdfDocument<S>,
        page: &ParsedPage,
    ) -> ParseResult<String> {
        let mut fragments = self.fragments(document, page)?;
        let text = join_fragments(fragments.by_ref(), &self.options.line_break);
        if let Some(error) = fragments.error() {
            tracing::warn!(
                "Content of page {} is malformed, returning partial text: {}",
                page.index,
                error
            );
        }
        Ok(text)
    }
}

/// Concatenate fragments, rendering each line break as `line_break`
pub fn join_fragments<I>(fragments: I, line_break: &str) -> String
where
    I: IntoIterator<Item = TextFragment>,
{
    let mut text = String::new();
    for fragment in fragments {
        match fragment {
            TextFragment::Text(run) => text.push_str(&run),
            TextFragment::LineBreak => text.push_str(line_break),
        }
    }
    text
}

/// One content stream being interpreted: the page's or a form XObject's
struct Frame {
    parser: ContentParser<'static>,
    resources: Rc<PdfDictionary>,
    fonts: Rc<FontDictionary>,
    form: Option<ObjectId>,
    font_depth: usize,
}

/// Lazy sequence of text fragments of a page.
///
/// Breaks are only materialized in front of the next text run, so the
/// sequence never starts or ends with a [`TextFragment::LineBreak`] and never
/// contains two in a row.
pub struct TextFragments<'d, S: ObjectStore> {
    document: &'d PdfDocument<S>,
    options: ExtractionOptions,
    frames: Vec<Frame>,
    font: Option<Rc<Font>>,
    font_stack: Vec<Option<Rc<Font>>>,
    line_y: Option<f64>,
    pending_break: bool,
    emitted_text: bool,
    forms: StackSafeContext,
    queue: VecDeque<TextFragment>,
    error: Option<ParseError>,
}

impl<'d, S: ObjectStore> TextFragments<'d, S> {
    fn new(
        document: &'d PdfDocument<S>,
        options: ExtractionOptions,
        content: Vec<u8>,
        resources: Rc<PdfDictionary>,
        fonts: Rc<FontDictionary>,
    ) -> Self {
        let page_frame = Frame {
            parser: ContentParser::from_owned(content),
            resources,
            fonts,
            form: None,
            font_depth: 0,
        };
        Self {
            document,
            options,
            frames: vec![page_frame],
            font: None,
            font_stack: Vec::new(),
            line_y: None,
            pending_break: false,
            emitted_text: false,
            forms: StackSafeContext::with_limit(document.options().max_depth),
            queue: VecDeque::new(),
            error: None,
        }
    }

    /// The error that ended the page content early, if any
    pub fn error(&self) -> Option<&ParseError> {
        self.error.as_ref()
    }

    fn apply(&mut self, op: ContentOperation) {
        match op {
            ContentOperation::SetFont(name, _size) => {
                let font = self.frames.last().and_then(|frame| frame.fonts.font(&name));
                if font.is_none() {
                    tracing::debug!("Font /{} not in resources, decoding raw bytes", name);
                }
                self.font = font;
            }
            ContentOperation::NextLine => self.break_line(),
            ContentOperation::MoveText(_, ty) | ContentOperation::MoveTextSetLeading(_, ty) => {
                self.line_y = self.line_y.map(|y| y + ty);
                if self.options.break_on_move && ty != 0.0 {
                    self.break_line();
                }
            }
            ContentOperation::SetTextMatrix(_, _, _, _, _, f) => {
                if self.options.break_on_move
                    && self.line_y.is_some_and(|y| (y - f).abs() > f64::EPSILON)
                {
                    self.break_line();
                }
                self.line_y = Some(f);
            }
            ContentOperation::ShowText(bytes) => self.show(&bytes),
            ContentOperation::ShowTextArray(elements) => {
                for element in elements {
                    match element {
                        TextElement::Text(bytes) => self.show(&bytes),
                        // A gap only separates words within a line
                        TextElement::Spacing(amount) => {
                            if self.emitted_text
                                && !self.pending_break
                                && self
                                    .options
                                    .space_threshold
                                    .is_some_and(|threshold| amount <= -threshold)
                            {
                                self.push_text(" ".to_string());
                            }
                        }
                    }
                }
            }
            ContentOperation::NextLineShowText(bytes)
            | ContentOperation::SetSpacingNextLineShowText(_, _, bytes) => {
                self.break_line();
                self.show(&bytes);
            }
            ContentOperation::SaveGraphicsState => self.font_stack.push(self.font.clone()),
            ContentOperation::RestoreGraphicsState => {
                let floor = self.frames.last().map_or(0, |frame| frame.font_depth);
                if self.font_stack.len() > floor {
                    if let Some(font) = self.font_stack.pop() {
                        self.font = font;
                    }
                }
            }
            ContentOperation::PaintXObject(name) if self.options.follow_form_xobjects => {
                self.enter_form(&name)
            }
            _ => {}
        }
    }

    fn break_line(&mut self) {
        self.pending_break = true;
    }

    fn show(&mut self, bytes: &[u8]) {
        let text = match &self.font {
            Some(font) => font.decode(bytes),
            None => bytes.iter().map(|&byte| byte as char).collect(),
        };
        self.push_text(text);
    }

    fn push_text(&mut self, text: String) {
        if text.is_empty() {
            return;
        }
        if self.pending_break && self.emitted_text {
            self.queue.push_back(TextFragment::LineBreak);
        }
        self.pending_break = false;
        self.emitted_text = true;
        self.queue.push_back(TextFragment::Text(text));
    }

    fn enter_form(&mut self, name: &str) {
        let Some(frame) = self.frames.last() else {
            return;
        };
        let resolver = self.document.resolver();

        let Some(id) = frame
            .resources
            .get("XObject")
            .and_then(|entry| resolver.resolve_object(entry).ok())
            .and_then(|xobjects| xobjects.as_dict().and_then(|dict| dict.get(name)).cloned())
            .and_then(|entry| entry.as_reference())
        else {
            tracing::debug!("XObject /{} not found in resources", name);
            return;
        };

        let object = match resolver.resolve(id) {
            Ok(object) => object,
            Err(e) => {
                tracing::warn!("Skipping XObject /{}: {}", name, e);
                return;
            }
        };
        let Some(stream) = object.as_stream() else {
            return;
        };
        let is_form = stream
            .dict
            .get("Subtype")
            .and_then(|obj| obj.as_name())
            .is_some_and(|subtype| subtype.as_str() == "Form");
        if !is_form {
            return;
        }

        if self.forms.is_visiting(id) {
            tracing::warn!("Skipping form XObject {} R painted inside itself", id);
            return;
        }
        if let Err(e) = self.forms.enter() {
            tracing::warn!("Skipping form XObject {} R: {}", id, e);
            return;
        }

        let content = match stream.decode() {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!("Skipping undecodable form XObject {} R: {}", id, e);
                self.forms.exit();
                return;
            }
        };

        let own_resources = stream
            .dict
            .get("Resources")
            .and_then(|entry| resolver.resolve_object(entry).ok())
            .and_then(|resources| resources.as_dict().cloned());
        let (resources, fonts) = match own_resources {
            Some(resources) => {
                let fonts = FontDictionary::from_resources(self.document, &resources);
                (Rc::new(resources), Rc::new(fonts))
            }
            None => (frame.resources.clone(), frame.fonts.clone()),
        };

        // Cannot fail: checked with is_visiting above
        let _ = self.forms.visit_ref(id);
        self.font_stack.push(self.font.clone());
        tracing::trace!("Entering form XObject {} R", id);
        self.frames.push(Frame {
            parser: ContentParser::from_owned(content),
            resources,
            fonts,
            form: Some(id),
            font_depth: self.font_stack.len(),
        });
    }

    fn leave_frame(&mut self) {
        let Some(frame) = self.frames.pop() else {
            return;
        };
        if let Some(id) = frame.form {
            self.forms.unvisit_ref(id);
            self.forms.exit();
            self.font_stack.truncate(frame.font_depth);
            if let Some(font) = self.font_stack.pop() {
                self.font = font;
            }
        }
    }
}

impl<S: ObjectStore> Iterator for TextFragments<'_, S> {
    type Item = TextFragment;

    fn next(&mut self) -> Option<TextFragment> {
        loop {
            if let Some(fragment) = self.queue.pop_front() {
                return Some(fragment);
            }
            let frame = self.frames.last_mut()?;
            let form = frame.form;
            match frame.parser.next() {
                Some(Ok(op)) => self.apply(op),
                Some(Err(e)) => match form {
                    Some(id) => {
                        tracing::warn!("Form XObject {} R is malformed: {}", id, e);
                        self.leave_frame();
                    }
                    None => {
                        self.error = Some(e);
                        self.frames.clear();
                    }
                },
                None => self.leave_frame(),
            }
        }
    }
}

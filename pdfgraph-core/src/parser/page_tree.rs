//! PDF Page Tree
//!
//! The page tree is flattened once into an arena of [`TreeNode`]s addressed
//! by index. Each node records the index of its parent, so attribute
//! inheritance is a walk up a chain of indices and never needs owning
//! pointers between nodes.
//!
//! # Inherited attributes
//!
//! `Resources`, `MediaBox`, `CropBox` and `Rotate` may be defined on any
//! ancestor of a page. Lookups start at the page and stop at the first node
//! that carries a usable value; when none does, the documented defaults
//! apply:
//!
//! | Key       | Default                         |
//! |-----------|---------------------------------|
//! | Resources | empty dictionary                |
//! | MediaBox  | US Letter, `[0 0 612 792]`      |
//! | CropBox   | the page's MediaBox             |
//! | Rotate    | `0`                             |
//!
//! # Example
//!
//! ```rust,no_run
//! use pdfgraph::parser::PdfDocument;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let document = PdfDocument::open("document.pdf")?;
//! let page = document.page_at(0)?;
//!
//! println!("Page size: {}x{} points", page.width(), page.height());
//! println!("Rotation: {}°", page.rotation);
//! # Ok(())
//! # }
//! ```

use super::objects::{ObjectId, PdfArray, PdfDictionary, PdfObject};
use super::resolver::Resolver;
use super::store::ObjectStore;
use super::{ParseError, ParseOptions, ParseResult};
use crate::text::FontDictionary;
use std::cell::OnceCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// A rectangle in default user space units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rectangle {
    pub llx: f64,
    pub lly: f64,
    pub urx: f64,
    pub ury: f64,
}

impl Rectangle {
    /// US Letter, the MediaBox used when no ancestor defines one
    pub const LETTER: Rectangle = Rectangle {
        llx: 0.0,
        lly: 0.0,
        urx: 612.0,
        ury: 792.0,
    };

    /// Create a rectangle from its corners
    pub fn new(llx: f64, lly: f64, urx: f64, ury: f64) -> Self {
        Self { llx, lly, urx, ury }
    }

    /// Read a `[llx lly urx ury]` array.
    ///
    /// Corners given in the wrong order are normalized. Anything other than
    /// four numbers yields `None`.
    pub fn from_array(array: &PdfArray) -> Option<Self> {
        if array.len() != 4 {
            return None;
        }
        let mut values = [0.0; 4];
        for (slot, item) in values.iter_mut().zip(&array.0) {
            *slot = item.as_real()?;
        }
        let [x1, y1, x2, y2] = values;
        Some(Self::new(x1.min(x2), y1.min(y2), x1.max(x2), y1.max(y2)))
    }

    /// Width of the rectangle
    pub fn width(&self) -> f64 {
        self.urx - self.llx
    }

    /// Height of the rectangle
    pub fn height(&self) -> f64 {
        self.ury - self.lly
    }
}

impl Default for Rectangle {
    fn default() -> Self {
        Self::LETTER
    }
}

/// Kind of a page tree node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Intermediate `/Pages` node
    Pages,
    /// Leaf `/Page` object
    Page,
}

/// One entry of the flattened page tree
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    /// Identity of the node's dictionary
    pub id: ObjectId,
    /// Arena index of the parent; always smaller than this node's index
    pub parent: Option<usize>,
    pub kind: NodeKind,
    /// `false` for a kid whose object could not be read
    pub resolved: bool,
}

/// Flattened page tree
#[derive(Debug, Clone, Default)]
pub struct PageTree {
    nodes: Vec<TreeNode>,
    /// Arena indices of leaf pages in document order
    pages: Vec<usize>,
    /// Page identity to page index
    page_ids: HashMap<ObjectId, usize>,
}

impl PageTree {
    /// Walk the tree below `root` and flatten it.
    ///
    /// The walk is iterative and only a root that cannot be read is an
    /// error. A node reached twice, or nested deeper than
    /// `options.max_depth`, is skipped with its subtree. A kid that cannot
    /// be resolved is kept as an unresolved page in strict mode, so the
    /// indices of its siblings do not shift and loading that one page
    /// reports the failure; lenient mode drops it.
    pub fn build<S: ObjectStore>(
        resolver: &Resolver<S>,
        root: ObjectId,
        options: &ParseOptions,
    ) -> ParseResult<Self> {
        let mut tree = PageTree::default();
        let mut visited = HashSet::new();
        // (node identity, parent index, depth)
        let mut stack: Vec<(ObjectId, Option<usize>, usize)> = vec![(root, None, 0)];

        while let Some((id, parent, depth)) = stack.pop() {
            if !visited.insert(id) {
                skip(&ParseError::CyclicReference(id));
                continue;
            }
            if depth > options.max_depth {
                skip(&ParseError::InvalidPage(format!(
                    "page tree deeper than {} levels at {id} R",
                    options.max_depth
                )));
                continue;
            }

            let object = match resolver.resolve(id) {
                Ok(object) => object,
                // A broken root leaves nothing to recover
                Err(e) if parent.is_none() => return Err(e),
                Err(e) => {
                    tree.unresolved_kid(id, parent, &e, options);
                    continue;
                }
            };
            let Some(dict) = object.as_dict() else {
                let error = ParseError::InvalidPage(format!(
                    "page tree node {id} R is a {}",
                    object.type_name()
                ));
                if parent.is_none() {
                    return Err(error);
                }
                tree.unresolved_kid(id, parent, &error, options);
                continue;
            };

            let kind = node_kind(dict);
            let index = tree.push_node(id, parent, kind, true);
            if kind == NodeKind::Page {
                continue;
            }

            let kids = match dict.get("Kids").map(|kids| resolver.resolve_object(kids)) {
                Some(Ok(kids)) => kids,
                Some(Err(e)) => {
                    skip(&e);
                    continue;
                }
                None => {
                    skip(&ParseError::MissingKey("Kids".to_string()));
                    continue;
                }
            };
            let Some(kids) = kids.as_array() else {
                skip(&ParseError::InvalidPage(format!(
                    "/Kids of {id} R is not an array"
                )));
                continue;
            };
            // Reverse so the stack pops kids in document order
            for kid in kids.0.iter().rev() {
                match kid.as_reference() {
                    Some(kid_id) => stack.push((kid_id, Some(index), depth + 1)),
                    None => skip(&ParseError::InvalidPage(format!(
                        "/Kids of {id} R contains a {}",
                        kid.type_name()
                    ))),
                }
            }
        }

        tracing::debug!(
            "Page tree has {} nodes and {} pages",
            tree.nodes.len(),
            tree.pages.len()
        );
        Ok(tree)
    }

    fn push_node(
        &mut self,
        id: ObjectId,
        parent: Option<usize>,
        kind: NodeKind,
        resolved: bool,
    ) -> usize {
        let index = self.nodes.len();
        self.nodes.push(TreeNode {
            id,
            parent,
            kind,
            resolved,
        });
        if kind == NodeKind::Page {
            self.page_ids.entry(id).or_insert(self.pages.len());
            self.pages.push(index);
        }
        index
    }

    fn unresolved_kid(
        &mut self,
        id: ObjectId,
        parent: Option<usize>,
        error: &ParseError,
        options: &ParseOptions,
    ) {
        if options.lenient_syntax {
            if options.collect_warnings {
                tracing::warn!("Dropping page tree node {} R: {}", id, error);
            }
        } else {
            tracing::warn!("Page {} R cannot be read: {}", id, error);
            self.push_node(id, parent, NodeKind::Page, false);
        }
    }

    /// Number of leaf pages
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Arena node by index
    pub fn node(&self, index: usize) -> Option<&TreeNode> {
        self.nodes.get(index)
    }

    /// Arena index of the page at `page_index`
    pub fn page_node(&self, page_index: usize) -> Option<usize> {
        self.pages.get(page_index).copied()
    }

    /// Page index of a page identity
    pub fn page_index_of(&self, id: ObjectId) -> Option<usize> {
        self.page_ids.get(&id).copied()
    }

    /// Arena indices from `node` up to the root, `node` first
    pub fn ancestors(&self, node: usize) -> impl Iterator<Item = usize> + '_ {
        std::iter::successors(
            (node < self.nodes.len()).then_some(node),
            move |&current| self.nodes[current].parent,
        )
    }

    /// Look up an inheritable key starting at `node`.
    ///
    /// `accept` turns a (resolved) value into the wanted type; a value it
    /// rejects, or one that fails to resolve, is skipped with a warning and
    /// the walk continues with the parent. Failing to resolve a node of the
    /// chain itself is an error.
    pub fn inherited<S, T, F>(
        &self,
        resolver: &Resolver<S>,
        node: usize,
        key: &str,
        mut accept: F,
    ) -> ParseResult<Option<T>>
    where
        S: ObjectStore,
        F: FnMut(&PdfObject) -> Option<T>,
    {
        for index in self.ancestors(node) {
            let id = self.nodes[index].id;
            let object = resolver.resolve(id)?;
            let Some(value) = object.as_dict().and_then(|dict| dict.get(key)) else {
                continue;
            };
            let value = match resolver.resolve_object(value) {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!("Skipping /{} of {} R: {}", key, id, e);
                    continue;
                }
            };
            match accept(&*value) {
                Some(found) => return Ok(Some(found)),
                None => tracing::warn!(
                    "Skipping malformed /{} ({}) of {} R",
                    key,
                    value.type_name(),
                    id
                ),
            }
        }
        Ok(None)
    }

    /// Create the page at `page_index` with its inherited values resolved
    pub fn load_page<S: ObjectStore>(
        &self,
        resolver: &Resolver<S>,
        page_index: usize,
    ) -> ParseResult<ParsedPage> {
        let node = self.page_node(page_index).ok_or_else(|| {
            ParseError::InvalidPage(format!(
                "index {page_index} out of range for {} pages",
                self.page_count()
            ))
        })?;
        let id = self.nodes[node].id;
        let object = resolver.resolve(id)?;
        let dict = object
            .as_dict()
            .ok_or_else(|| ParseError::InvalidPage(format!("{id} R is not a dictionary")))?;

        let media_box = self
            .inherited(resolver, node, "MediaBox", as_rectangle)?
            .unwrap_or_else(|| {
                tracing::debug!("Page {} R has no MediaBox, using Letter", id);
                Rectangle::LETTER
            });
        let crop_box = self
            .inherited(resolver, node, "CropBox", as_rectangle)?
            .unwrap_or(media_box);
        let rotation = self
            .inherited(resolver, node, "Rotate", as_rotation)?
            .unwrap_or(0);

        Ok(ParsedPage {
            index: page_index,
            id,
            node,
            contents: dict.get("Contents").cloned(),
            media_box,
            crop_box,
            rotation,
            fonts: OnceCell::new(),
        })
    }

    /// The page's Resources dictionary, inherited or empty
    pub fn resources<S: ObjectStore>(
        &self,
        resolver: &Resolver<S>,
        page: &ParsedPage,
    ) -> ParseResult<PdfDictionary> {
        Ok(self
            .inherited(resolver, page.node, "Resources", |obj| obj.as_dict().cloned())?
            .unwrap_or_default())
    }
}

fn skip(error: &ParseError) {
    tracing::warn!("Skipping page tree node: {}", error);
}

fn node_kind(dict: &PdfDictionary) -> NodeKind {
    match dict.get_type() {
        Some("Pages") => NodeKind::Pages,
        Some("Page") => NodeKind::Page,
        // Missing or odd /Type: infer from structure
        _ if dict.contains_key("Kids") => NodeKind::Pages,
        _ => NodeKind::Page,
    }
}

fn as_rectangle(obj: &PdfObject) -> Option<Rectangle> {
    obj.as_array().and_then(Rectangle::from_array)
}

fn as_rotation(obj: &PdfObject) -> Option<i32> {
    let degrees = obj.as_integer()?;
    (degrees % 90 == 0).then(|| degrees.rem_euclid(360) as i32)
}

/// A page of the document.
///
/// Holds the page identity, its position in the tree and a few small
/// inherited values. Dictionaries stay in the resolver cache.
#[derive(Debug, Clone)]
pub struct ParsedPage {
    /// Zero-based page index
    pub index: usize,
    /// Identity of the page dictionary
    pub id: ObjectId,
    /// Arena index of the page's tree node
    pub node: usize,
    /// The `/Contents` entry as written: reference, stream or array
    pub contents: Option<PdfObject>,
    /// Inherited MediaBox, defaulting to US Letter
    pub media_box: Rectangle,
    /// Inherited CropBox, defaulting to the MediaBox
    pub crop_box: Rectangle,
    /// Clockwise rotation in degrees: 0, 90, 180 or 270
    pub rotation: i32,
    fonts: OnceCell<Rc<FontDictionary>>,
}

impl ParsedPage {
    /// Effective page width accounting for rotation
    pub fn width(&self) -> f64 {
        match self.rotation {
            90 | 270 => self.media_box.height(),
            _ => self.media_box.width(),
        }
    }

    /// Effective page height accounting for rotation
    pub fn height(&self) -> f64 {
        match self.rotation {
            90 | 270 => self.media_box.width(),
            _ => self.media_box.height(),
        }
    }

    /// Whether the page declares any content
    pub fn has_contents(&self) -> bool {
        self.contents.as_ref().is_some_and(|c| !c.is_null())
    }

    /// Font dictionary built for this page, if any yet
    pub fn cached_fonts(&self) -> Option<&Rc<FontDictionary>> {
        self.fonts.get()
    }

    pub(crate) fn font_cache(&self) -> &OnceCell<Rc<FontDictionary>> {
        &self.fonts
    }
}

#[cfg(test)]
#[path = "page_tree_tests.rs"]
mod page_tree_tests;

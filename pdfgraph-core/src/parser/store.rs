//! Object stores
//!
//! An [`ObjectStore`] is the boundary between this crate and whatever reads
//! the file: given an object identity it returns either the raw bytes of the
//! object or an already parsed node. The resolver never asks a store twice
//! for the same identity.

use super::lexer::{find, Lexer, Token};
use super::objects::{ObjectId, PdfObject};
use super::ParseResult;
use std::collections::HashMap;
use std::path::Path;

/// What a store hands back for one indirect object
#[derive(Debug, Clone, PartialEq)]
pub enum RawObject {
    /// A node tokenized elsewhere, used as is
    Parsed(PdfObject),
    /// Object bytes, optionally wrapped in `N G obj ... endobj`
    Bytes(Vec<u8>),
}

/// Source of indirect objects keyed by identity
pub trait ObjectStore {
    /// Load the object with the given identity.
    ///
    /// `Ok(None)` means the store holds no such object.
    fn load(&self, id: ObjectId) -> ParseResult<Option<RawObject>>;
}

impl<S: ObjectStore + ?Sized> ObjectStore for &S {
    fn load(&self, id: ObjectId) -> ParseResult<Option<RawObject>> {
        (**self).load(id)
    }
}

impl<S: ObjectStore + ?Sized> ObjectStore for Box<S> {
    fn load(&self, id: ObjectId) -> ParseResult<Option<RawObject>> {
        (**self).load(id)
    }
}

/// In-memory store for callers that already hold objects
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    objects: HashMap<ObjectId, RawObject>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parsed node
    pub fn insert(&mut self, id: ObjectId, object: PdfObject) {
        self.objects.insert(id, RawObject::Parsed(object));
    }

    /// Add raw object bytes, parsed on first resolution
    pub fn insert_bytes(&mut self, id: ObjectId, bytes: impl Into<Vec<u8>>) {
        self.objects.insert(id, RawObject::Bytes(bytes.into()));
    }

    /// Number of stored objects
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl ObjectStore for MemoryStore {
    fn load(&self, id: ObjectId) -> ParseResult<Option<RawObject>> {
        Ok(self.objects.get(&id).cloned())
    }
}

/// Store over a whole file that locates objects by scanning for
/// `N G obj` headers instead of reading the cross-reference table.
///
/// Later definitions of the same identity replace earlier ones, which is
/// how incremental updates behave. Objects packed inside object streams are
/// not visible.
#[derive(Debug, Clone)]
pub struct ScanStore {
    data: Vec<u8>,
    offsets: HashMap<ObjectId, usize>,
    /// All header offsets in file order, used to bound each object
    starts: Vec<usize>,
}

impl ScanStore {
    /// Read and index a file
    pub fn open<P: AsRef<Path>>(path: P) -> ParseResult<Self> {
        let data = std::fs::read(path)?;
        Ok(Self::from_bytes(data))
    }

    /// Index in-memory file contents
    pub fn from_bytes(data: Vec<u8>) -> Self {
        let mut offsets = HashMap::new();
        let mut starts = Vec::new();

        let mut search = 0;
        while let Some(found) = find(&data[search..], b"obj") {
            let at = search + found;
            search = at + 3;
            let follows_ok = data
                .get(at + 3)
                .map_or(true, |&ch| !ch.is_ascii_alphanumeric());
            if !follows_ok {
                continue;
            }
            if let Some((id, start)) = header_before(&data, at) {
                offsets.insert(id, start);
                starts.push(start);
            }
        }

        tracing::debug!("Indexed {} objects by scanning", offsets.len());
        Self {
            data,
            offsets,
            starts,
        }
    }

    /// Number of distinct object identities found
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Check if no objects were found
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// All identities in ascending order
    pub fn ids(&self) -> Vec<ObjectId> {
        let mut ids: Vec<_> = self.offsets.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Bytes of one object, from its header up to the next header
    fn object_bytes(&self, start: usize) -> &[u8] {
        let next = self.starts.partition_point(|&s| s <= start);
        let end = self.starts.get(next).copied().unwrap_or(self.data.len());
        &self.data[start..end]
    }

    /// The document catalog: the trailer's `/Root`, or failing that the
    /// last object declaring `/Type /Catalog`.
    pub fn root(&self) -> Option<ObjectId> {
        self.trailer_root().or_else(|| self.scan_catalog())
    }

    fn trailer_root(&self) -> Option<ObjectId> {
        let mut search_end = self.data.len();
        // Walk `/Root` occurrences from the end of the file backwards
        while let Some(at) = rfind(&self.data[..search_end], b"/Root") {
            search_end = at;
            let mut lexer = Lexer::new(&self.data[at + 5..]);
            if let (
                Ok(Some(Token::Integer(number))),
                Ok(Some(Token::Integer(generation))),
                Ok(Some(Token::Keyword(r))),
            ) = (lexer.next_token(), lexer.next_token(), lexer.next_token())
            {
                if r == "R" {
                    if let (Ok(number), Ok(generation)) =
                        (u32::try_from(number), u16::try_from(generation))
                    {
                        return Some(ObjectId::new(number, generation));
                    }
                }
            }
        }
        None
    }

    fn scan_catalog(&self) -> Option<ObjectId> {
        let mut best: Option<(usize, ObjectId)> = None;
        for (&id, &start) in &self.offsets {
            let Ok((_, object)) = PdfObject::parse_indirect(self.object_bytes(start), |_| Ok(None))
            else {
                continue;
            };
            let is_catalog = object
                .as_dict()
                .is_some_and(|dict| dict.get_type() == Some("Catalog"));
            if is_catalog && best.map_or(true, |(offset, _)| start > offset) {
                best = Some((start, id));
            }
        }
        best.map(|(_, id)| id)
    }
}

impl ObjectStore for ScanStore {
    fn load(&self, id: ObjectId) -> ParseResult<Option<RawObject>> {
        Ok(self
            .offsets
            .get(&id)
            .map(|&start| RawObject::Bytes(self.object_bytes(start).to_vec())))
    }
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).rposition(|w| w == needle)
}

/// Parse `N G` immediately before the `obj` keyword at `at`
fn header_before(data: &[u8], at: usize) -> Option<(ObjectId, usize)> {
    let mut pos = at;
    let skip_space = |pos: &mut usize| -> bool {
        let before = *pos;
        while *pos > 0 && data[*pos - 1].is_ascii_whitespace() {
            *pos -= 1;
        }
        *pos < before
    };
    let read_digits = |pos: &mut usize| -> Option<u64> {
        let end = *pos;
        while *pos > 0 && data[*pos - 1].is_ascii_digit() {
            *pos -= 1;
        }
        if *pos == end || end - *pos > 10 {
            return None;
        }
        std::str::from_utf8(&data[*pos..end]).ok()?.parse().ok()
    };

    if !skip_space(&mut pos) {
        return None;
    }
    let generation = read_digits(&mut pos)?;
    if !skip_space(&mut pos) {
        return None;
    }
    let number = read_digits(&mut pos)?;
    if pos > 0 && !matches!(data[pos - 1], b' ' | b'\t' | b'\r' | b'\n' | b'\x0C' | b'>' | b']') {
        return None;
    }

    let id = ObjectId::new(u32::try_from(number).ok()?, u16::try_from(generation).ok()?);
    Some((id, pos))
}

//! Reference resolution with a per-document cache
//!
//! The [`Resolver`] owns the only mutable state shared by the page tree,
//! font dictionaries and text extraction: a map from object identity to
//! either an in-progress marker or the resolved node. Every identity is
//! loaded from the store and parsed at most once; a re-entrant request for
//! an identity that is still being resolved is a cycle.

use super::objects::{ObjectId, PdfObject};
use super::stack_safe::MAX_RECURSION_DEPTH;
use super::store::{ObjectStore, RawObject};
use super::{ParseError, ParseResult};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::ops::Deref;
use std::rc::Rc;

#[derive(Debug, Clone)]
enum CacheSlot {
    InProgress,
    Resolved(Rc<PdfObject>),
}

/// Cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolverStats {
    /// Requests answered from the cache
    pub hits: usize,
    /// Requests that went to the store
    pub misses: usize,
    /// Objects currently cached
    pub cached: usize,
}

/// A value that is either borrowed from a containing object or shared
/// from the resolver cache.
#[derive(Debug, Clone)]
pub enum Resolved<'a> {
    Direct(&'a PdfObject),
    Indirect(Rc<PdfObject>),
}

impl Resolved<'_> {
    /// Shared handle to the value, cloning it only if it was borrowed
    pub fn into_shared(self) -> Rc<PdfObject> {
        match self {
            Resolved::Direct(obj) => Rc::new(obj.clone()),
            Resolved::Indirect(obj) => obj,
        }
    }
}

impl Deref for Resolved<'_> {
    type Target = PdfObject;

    fn deref(&self) -> &PdfObject {
        match self {
            Resolved::Direct(obj) => obj,
            Resolved::Indirect(obj) => obj,
        }
    }
}

/// Lazily resolves indirect objects from an [`ObjectStore`]
pub struct Resolver<S> {
    store: S,
    cache: RefCell<HashMap<ObjectId, CacheSlot>>,
    hits: Cell<usize>,
    misses: Cell<usize>,
    depth: Cell<usize>,
    max_depth: usize,
}

impl<S: ObjectStore> Resolver<S> {
    /// Create a resolver over a store
    pub fn new(store: S) -> Self {
        Self::with_max_depth(store, MAX_RECURSION_DEPTH)
    }

    /// Create a resolver with a custom limit on reference chain length
    pub fn with_max_depth(store: S, max_depth: usize) -> Self {
        Self {
            store,
            cache: RefCell::new(HashMap::new()),
            hits: Cell::new(0),
            misses: Cell::new(0),
            depth: Cell::new(0),
            max_depth,
        }
    }

    /// The underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Resolve an indirect object by identity.
    ///
    /// # Errors
    ///
    /// - [`ParseError::UnresolvedReference`] if the store has no such object
    /// - [`ParseError::MalformedObject`] if its bytes do not parse
    /// - [`ParseError::CyclicReference`] if resolving it requires itself
    pub fn resolve(&self, id: ObjectId) -> ParseResult<Rc<PdfObject>> {
        match self.cache.borrow().get(&id) {
            Some(CacheSlot::Resolved(obj)) => {
                self.hits.set(self.hits.get() + 1);
                tracing::trace!("Cache hit for {} R", id);
                return Ok(Rc::clone(obj));
            }
            Some(CacheSlot::InProgress) => {
                tracing::warn!("Cyclic reference while resolving {} R", id);
                return Err(ParseError::CyclicReference(id));
            }
            None => {}
        }

        self.misses.set(self.misses.get() + 1);
        self.cache.borrow_mut().insert(id, CacheSlot::InProgress);

        match self.load(id) {
            Ok(obj) => {
                self.cache
                    .borrow_mut()
                    .insert(id, CacheSlot::Resolved(Rc::clone(&obj)));
                Ok(obj)
            }
            Err(e) => {
                // Only this request fails; the identity may be retried
                self.cache.borrow_mut().remove(&id);
                Err(e)
            }
        }
    }

    /// Resolve `obj` if it is a reference, otherwise borrow it
    pub fn resolve_object<'a>(&self, obj: &'a PdfObject) -> ParseResult<Resolved<'a>> {
        match obj {
            PdfObject::Reference(id) => self.resolve(*id).map(Resolved::Indirect),
            other => Ok(Resolved::Direct(other)),
        }
    }

    /// Whether an identity has been resolved successfully
    pub fn is_cached(&self, id: ObjectId) -> bool {
        matches!(
            self.cache.borrow().get(&id),
            Some(CacheSlot::Resolved(_))
        )
    }

    /// Cache counters
    pub fn stats(&self) -> ResolverStats {
        let cached = self
            .cache
            .borrow()
            .values()
            .filter(|slot| matches!(slot, CacheSlot::Resolved(_)))
            .count();
        ResolverStats {
            hits: self.hits.get(),
            misses: self.misses.get(),
            cached,
        }
    }

    /// Drop every cached object. Only meaningful when the underlying store
    /// now describes a different revision of the document.
    pub fn invalidate(&self) {
        tracing::debug!("Invalidating {} cached objects", self.cache.borrow().len());
        self.cache.borrow_mut().clear();
    }

    fn load(&self, id: ObjectId) -> ParseResult<Rc<PdfObject>> {
        tracing::debug!("Loading object {} R", id);
        let raw = self
            .store
            .load(id)?
            .ok_or(ParseError::UnresolvedReference(id))?;

        let object = match raw {
            RawObject::Parsed(obj) => obj,
            RawObject::Bytes(bytes) => self.parse_bytes(id, &bytes)?,
        };

        match object {
            // Reference chains resolve to the final target
            PdfObject::Reference(next) => self.nested(id, || self.resolve(next)),
            other => Ok(Rc::new(other)),
        }
    }

    fn parse_bytes(&self, id: ObjectId, bytes: &[u8]) -> ParseResult<PdfObject> {
        let parsed = PdfObject::parse_indirect(bytes, |length_id| self.stream_length(id, length_id));
        let (header, object) = parsed.map_err(|e| match e {
            ParseError::CyclicReference(_) | ParseError::Io(_) => e,
            other => ParseError::MalformedObject {
                id,
                message: other.to_string(),
            },
        })?;

        match header {
            Some(declared) if declared != id => Err(ParseError::MalformedObject {
                id,
                message: format!("object header declares {declared} R"),
            }),
            _ => Ok(object),
        }
    }

    /// Resolve an indirect `/Length`. Anything but a cycle degrades to
    /// scanning for `endstream`.
    fn stream_length(&self, owner: ObjectId, length_id: ObjectId) -> ParseResult<Option<usize>> {
        match self.nested(owner, || self.resolve(length_id)) {
            Ok(obj) => Ok(obj.as_integer().and_then(|len| usize::try_from(len).ok())),
            Err(e @ ParseError::CyclicReference(_)) => Err(e),
            Err(e) => {
                tracing::warn!("Ignoring unusable stream length of {} R: {}", owner, e);
                Ok(None)
            }
        }
    }

    fn nested<T>(&self, id: ObjectId, f: impl FnOnce() -> ParseResult<T>) -> ParseResult<T> {
        let depth = self.depth.get();
        if depth >= self.max_depth {
            return Err(ParseError::MalformedObject {
                id,
                message: format!("reference chain deeper than {} levels", self.max_depth),
            });
        }
        self.depth.set(depth + 1);
        let result = f();
        self.depth.set(depth);
        result
    }
}

impl<S> std::fmt::Debug for Resolver<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("cached", &self.cache.borrow().len())
            .field("hits", &self.hits.get())
            .field("misses", &self.misses.get())
            .finish()
    }
}

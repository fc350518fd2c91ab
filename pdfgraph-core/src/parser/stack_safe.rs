//! Stack-safe traversal utilities
//!
//! Reference chains and form XObject recursion can be nested arbitrarily deep
//! or loop back on themselves. This module provides the depth limit and the
//! in-progress identity set used to cut both off.

use super::objects::ObjectId;
use super::{ParseError, ParseResult};
use std::collections::HashSet;

/// Maximum recursion depth for nested structures
pub const MAX_RECURSION_DEPTH: usize = 1000;

/// Stack-safe traversal context
#[derive(Debug)]
pub struct StackSafeContext {
    /// Current recursion depth
    pub depth: usize,
    /// Maximum allowed depth
    pub max_depth: usize,
    /// Identities currently being processed
    pub visited_refs: HashSet<ObjectId>,
}

impl Default for StackSafeContext {
    fn default() -> Self {
        Self::new()
    }
}

impl StackSafeContext {
    /// Create a new stack-safe context
    pub fn new() -> Self {
        Self::with_limit(MAX_RECURSION_DEPTH)
    }

    /// Create a new context with a custom depth limit
    pub fn with_limit(max_depth: usize) -> Self {
        Self {
            depth: 0,
            max_depth,
            visited_refs: HashSet::new(),
        }
    }

    /// Enter a new recursion level
    pub fn enter(&mut self) -> ParseResult<()> {
        if self.depth + 1 > self.max_depth {
            return Err(ParseError::SyntaxError {
                position: 0,
                message: format!(
                    "Maximum recursion depth exceeded: {} (limit: {})",
                    self.depth + 1,
                    self.max_depth
                ),
            });
        }
        self.depth += 1;
        Ok(())
    }

    /// Exit a recursion level
    pub fn exit(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Mark an identity as in progress, failing if it already is
    pub fn visit_ref(&mut self, id: ObjectId) -> ParseResult<()> {
        if !self.visited_refs.insert(id) {
            return Err(ParseError::CyclicReference(id));
        }
        Ok(())
    }

    /// Mark an identity as no longer being processed
    pub fn unvisit_ref(&mut self, id: ObjectId) {
        self.visited_refs.remove(&id);
    }

    /// Whether an identity is currently in progress
    pub fn is_visiting(&self, id: ObjectId) -> bool {
        self.visited_refs.contains(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recursion_limits() {
        let mut context = StackSafeContext::with_limit(3);

        assert!(context.enter().is_ok());
        assert!(context.enter().is_ok());
        assert!(context.enter().is_ok());
        assert_eq!(context.depth, 3);

        assert!(context.enter().is_err());

        context.exit();
        assert_eq!(context.depth, 2);
    }

    #[test]
    fn test_exit_never_underflows() {
        let mut context = StackSafeContext::new();
        context.exit();
        assert_eq!(context.depth, 0);
    }

    #[test]
    fn test_cycle_detection() {
        let mut context = StackSafeContext::new();
        let id = ObjectId::new(1, 0);

        assert!(context.visit_ref(id).is_ok());
        assert!(matches!(
            context.visit_ref(id),
            Err(ParseError::CyclicReference(found)) if found == id
        ));

        // Other generations are distinct identities
        assert!(context.visit_ref(ObjectId::new(1, 1)).is_ok());

        context.unvisit_ref(id);
        assert!(!context.is_visiting(id));
        assert!(context.visit_ref(id).is_ok());
    }
}

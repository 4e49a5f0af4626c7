//! Boolean query trees over tags and free text.
//!
//! A [`TermTree`] owns every node of one search expression in a single arena.
//! Nodes are addressed by [`TermId`]; the parent relation is a plain back
//! index, so there are no reference cycles and no shared ownership. A node is
//! either a combinator (`And`/`Or`) holding an ordered list of children, or a
//! literal (`Tag`/`Text`) leaf.
//!
//! Structural invariants kept by every mutation:
//!
//! - only combinators have children;
//! - a node's `parent` and its parent's child list always agree;
//! - a non-root combinator that loses its last child is removed from its own
//!   parent, and that pruning continues upward until a non-empty node or the
//!   root is reached.
//!
//! All mutations validate their preconditions first and either succeed
//! completely or return a [`TermError`] without touching the tree.
//!
//! ```rust
//! # use photo_query::query::{Combinator, TermKind, TermTree};
//! # use photo_query::tag::Tag;
//! let beach = Tag::new(1, "beach");
//! let sunset = Tag::new(2, "sunset");
//!
//! let mut tree = TermTree::new(Combinator::Or);
//! let group = tree.insert(tree.root(), Combinator::And, None).unwrap();
//! tree.insert(group, TermKind::Tag(beach), None).unwrap();
//! tree.insert(group, TermKind::Tag(sunset), None).unwrap();
//!
//! assert!(tree.condition().unwrap().contains(" AND "));
//! ```

mod analysis;
mod invert;
mod sql;

pub use analysis::TagRequirement;

use crate::tag::Tag;
use std::fmt;
use thiserror::Error;
use tracing::trace;

/// Index of a node inside its [`TermTree`].
///
/// Ids are never reused within a tree, so an id that outlived its node is
/// reported as [`TermError::UnknownTerm`] rather than silently aliasing.
/// The flip side is that freed slots are not reclaimed: every combinator
/// inversion allocates a new slot, and the arena only shrinks when the tree
/// is rebuilt (a new tree, or a parse replacing it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TermId(usize);

impl fmt::Display for TermId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The two internal node types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Combinator {
    And,
    Or,
}

impl Combinator {
    /// The combinator De Morgan's law swaps this one for.
    pub fn inverse(self) -> Self {
        match self {
            Combinator::And => Combinator::Or,
            Combinator::Or => Combinator::And,
        }
    }
}

/// What a node matches.
#[derive(Debug, Clone, PartialEq)]
pub enum TermKind {
    /// All children must match.
    And,

    /// At least one child must match.
    Or,

    /// Photos carrying the given tag.
    Tag(Tag),

    /// Photos whose filename, uri or description contains the text.
    Text(String),
}

impl TermKind {
    pub fn is_literal(&self) -> bool {
        matches!(self, TermKind::Tag(_) | TermKind::Text(_))
    }

    pub fn combinator(&self) -> Option<Combinator> {
        match self {
            TermKind::And => Some(Combinator::And),
            TermKind::Or => Some(Combinator::Or),
            TermKind::Tag(_) | TermKind::Text(_) => None,
        }
    }

    pub fn tag(&self) -> Option<&Tag> {
        match self {
            TermKind::Tag(tag) => Some(tag),
            _ => None,
        }
    }
}

impl From<Combinator> for TermKind {
    fn from(value: Combinator) -> Self {
        match value {
            Combinator::And => TermKind::And,
            Combinator::Or => TermKind::Or,
        }
    }
}

/// Rejected structural operations.
///
/// These are precondition violations by the caller; the tree is left exactly
/// as it was before the call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TermError {
    #[error("term {0} does not exist in this tree")]
    UnknownTerm(TermId),

    #[error("term {0} is a literal and cannot have children")]
    LeafParent(TermId),

    #[error("attaching {term} under {parent} would create a cycle")]
    Cycle { term: TermId, parent: TermId },

    #[error("term {child} is not a child of {parent}")]
    NotAChild { parent: TermId, child: TermId },

    #[error("the root term {0} cannot be detached or removed")]
    RootMutation(TermId),

    #[error("term {0} is attached to a parent and cannot become the root")]
    AttachedRoot(TermId),
}

#[derive(Debug, Clone)]
struct Node {
    kind: TermKind,
    parent: Option<TermId>,
    children: Vec<TermId>,
    negated: bool,
}

impl Node {
    fn detached(kind: TermKind) -> Self {
        Self {
            kind,
            parent: None,
            children: vec![],
            negated: false,
        }
    }
}

/// An arena-backed query expression with a designated root combinator.
///
/// The tree also remembers the optional hidden tag: photos carrying it are
/// excluded from every `And` group that does not mention it explicitly.
#[derive(Debug, Clone)]
pub struct TermTree {
    nodes: Vec<Option<Node>>,
    root: TermId,
    hidden: Option<Tag>,
}

impl TermTree {
    /// Creates a tree holding a single, empty root combinator.
    pub fn new(root: Combinator) -> Self {
        Self {
            nodes: vec![Some(Node::detached(root.into()))],
            root: TermId(0),
            hidden: None,
        }
    }

    /// Builds a flat `Or` of one tag literal per tag, or `None` for no tags.
    pub fn from_tags(tags: &[Tag]) -> Option<Self> {
        if tags.is_empty() {
            return None;
        }

        let mut tree = Self::new(Combinator::Or);
        for tag in tags {
            let leaf = tree.alloc(Node::detached(TermKind::Tag(tag.clone())));
            tree.link(tree.root, leaf, None);
        }

        Some(tree)
    }

    /// Sets the hidden tag used by the visibility rule of `And` groups.
    pub fn with_hidden_tag(mut self, tag: Tag) -> Self {
        self.hidden = Some(tag);
        self
    }

    pub fn set_hidden_tag(&mut self, tag: Option<Tag>) {
        self.hidden = tag;
    }

    pub fn hidden_tag(&self) -> Option<&Tag> {
        self.hidden.as_ref()
    }

    pub fn root(&self) -> TermId {
        self.root
    }

    /// True when the root has no children, i.e. the query filters nothing.
    pub fn is_empty(&self) -> bool {
        self.children(self.root).is_empty()
    }

    pub fn contains(&self, id: TermId) -> bool {
        self.get(id).is_some()
    }

    pub fn kind(&self, id: TermId) -> Option<&TermKind> {
        self.get(id).map(|node| &node.kind)
    }

    pub fn parent(&self, id: TermId) -> Option<TermId> {
        self.get(id).and_then(|node| node.parent)
    }

    /// Direct children in order; empty for literals and unknown ids.
    pub fn children(&self, id: TermId) -> &[TermId] {
        self.get(id).map(|node| node.children.as_slice()).unwrap_or(&[])
    }

    pub fn child_count(&self, id: TermId) -> usize {
        self.children(id).len()
    }

    pub fn has_multiple(&self, id: TermId) -> bool {
        self.child_count(id) > 1
    }

    /// The last child of `id`, if any.
    pub fn last(&self, id: TermId) -> Option<TermId> {
        self.children(id).last().copied()
    }

    pub fn is_negated(&self, id: TermId) -> bool {
        self.get(id).is_some_and(|node| node.negated)
    }

    /// Number of live nodes, attached or not.
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|slot| slot.is_some()).count()
    }

    /// Ids of every node in the subtree rooted at `id`, parents before children.
    pub fn descendants(&self, id: TermId) -> Vec<TermId> {
        let mut out = vec![];
        let mut stack = vec![id];

        while let Some(current) = stack.pop() {
            if let Some(node) = self.get(current) {
                out.push(current);
                stack.extend(node.children.iter().rev().copied());
            }
        }

        out
    }

    /// Allocates a detached node. It takes part in the query only once it is
    /// attached with [`TermTree::set_parent`] or made the root.
    pub fn create(&mut self, kind: TermKind) -> TermId {
        self.alloc(Node::detached(kind))
    }

    /// Creates a node under `parent`, right after the sibling `after` or at
    /// the end when `after` is `None`.
    pub fn insert<K: Into<TermKind>>(
        &mut self,
        parent: TermId,
        kind: K,
        after: Option<TermId>,
    ) -> Result<TermId, TermError> {
        self.check_parent(parent)?;
        if let Some(after) = after {
            self.check_child(parent, after)?;
        }

        let id = self.alloc(Node::detached(kind.into()));
        self.link(parent, id, after);

        Ok(id)
    }

    /// Appends an existing node to `parent`; see [`TermTree::set_parent`].
    pub fn add(&mut self, parent: TermId, child: TermId) -> Result<(), TermError> {
        self.set_parent(child, parent)
    }

    /// Moves `term` under `parent`, appending it to the parent's children.
    ///
    /// If `term` was attached elsewhere it is unlinked from the old parent,
    /// which is pruned if that left it empty.
    pub fn set_parent(&mut self, term: TermId, parent: TermId) -> Result<(), TermError> {
        let old = self.node(term)?.parent;
        if old == Some(parent) {
            return Ok(());
        }

        self.check_parent(parent)?;
        if term == self.root {
            return Err(TermError::RootMutation(term));
        }
        if term == parent || self.is_ancestor(term, parent) {
            return Err(TermError::Cycle { term, parent });
        }

        if let Some(node) = old.and_then(|old| self.get_mut(old)) {
            node.children.retain(|c| *c != term);
        }
        // Link before pruning so that pruning the old parent stops at the new one.
        self.link(parent, term, None);
        if let Some(old) = old {
            self.prune(old);
        }

        Ok(())
    }

    /// Removes `child` from `parent` and discards its subtree. When `parent`
    /// becomes empty it is removed from its own parent, recursively.
    pub fn remove(&mut self, parent: TermId, child: TermId) -> Result<(), TermError> {
        self.check_child(parent, child)?;

        self.unlink_from(parent, child);
        self.free(child);
        self.prune(parent);

        Ok(())
    }

    /// Removes `term` from wherever it is attached, or discards it if detached.
    pub fn remove_term(&mut self, term: TermId) -> Result<(), TermError> {
        if term == self.root {
            return Err(TermError::RootMutation(term));
        }

        match self.node(term)?.parent {
            Some(parent) => self.remove(parent, term),
            None => {
                self.free(term);
                Ok(())
            }
        }
    }

    /// Removes every child of the root.
    pub fn clear(&mut self) {
        let root = self.root;
        let children = self
            .get_mut(root)
            .map(|node| std::mem::take(&mut node.children))
            .unwrap_or_default();

        for child in children {
            self.free(child);
        }
    }

    /// Sets the negation flag of `term` and returns the id that now stands in
    /// its place.
    ///
    /// Literals are flagged in place. Combinators change through a single,
    /// non-recursive inversion, which replaces the node.
    pub fn set_negated(&mut self, term: TermId, negated: bool) -> Result<TermId, TermError> {
        let node = self.node_mut(term)?;
        if node.negated == negated {
            return Ok(term);
        }
        if node.kind.is_literal() {
            node.negated = negated;
            return Ok(term);
        }

        let replacement = self.invert(term, false)?;
        if let Some(node) = self.get_mut(replacement) {
            node.negated = negated;
        }

        Ok(replacement)
    }

    /// Puts a fresh `combinator` in the place of `term` (same parent, same
    /// position, or the root) and moves `term` under it as its only child.
    ///
    /// Returns the id of the new combinator.
    pub fn wrap(&mut self, term: TermId, combinator: Combinator) -> Result<TermId, TermError> {
        let parent = self.node(term)?.parent;
        let wrapper = self.alloc(Node {
            kind: combinator.into(),
            parent,
            children: vec![term],
            negated: false,
        });

        if let Some(parent) = parent.and_then(|p| self.get_mut(p)) {
            if let Some(slot) = parent.children.iter_mut().find(|c| **c == term) {
                *slot = wrapper;
            }
        }
        if let Some(node) = self.get_mut(term) {
            node.parent = Some(wrapper);
        }
        if self.root == term {
            self.root = wrapper;
        }

        trace!(term = %term, wrapper = %wrapper, "wrapped term");
        Ok(wrapper)
    }

    /// Makes the detached combinator `term` the root, discarding the old root
    /// and everything under it.
    pub fn replace_root(&mut self, term: TermId) -> Result<(), TermError> {
        if term == self.root {
            return Ok(());
        }

        let node = self.node(term)?;
        if node.parent.is_some() {
            return Err(TermError::AttachedRoot(term));
        }
        if node.kind.is_literal() {
            return Err(TermError::LeafParent(term));
        }

        let old = std::mem::replace(&mut self.root, term);
        self.free(old);

        Ok(())
    }

    fn get(&self, id: TermId) -> Option<&Node> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    fn get_mut(&mut self, id: TermId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0).and_then(Option::as_mut)
    }

    fn node(&self, id: TermId) -> Result<&Node, TermError> {
        self.get(id).ok_or(TermError::UnknownTerm(id))
    }

    fn node_mut(&mut self, id: TermId) -> Result<&mut Node, TermError> {
        self.get_mut(id).ok_or(TermError::UnknownTerm(id))
    }

    fn alloc(&mut self, node: Node) -> TermId {
        self.nodes.push(Some(node));
        TermId(self.nodes.len() - 1)
    }

    fn check_parent(&self, parent: TermId) -> Result<(), TermError> {
        if self.node(parent)?.kind.is_literal() {
            return Err(TermError::LeafParent(parent));
        }
        Ok(())
    }

    fn check_child(&self, parent: TermId, child: TermId) -> Result<(), TermError> {
        self.node(child)?;
        if !self.node(parent)?.children.contains(&child) {
            return Err(TermError::NotAChild { parent, child });
        }
        Ok(())
    }

    /// True when `ancestor` appears on the parent chain of `id`.
    fn is_ancestor(&self, ancestor: TermId, id: TermId) -> bool {
        let mut current = self.parent(id);
        while let Some(p) = current {
            if p == ancestor {
                return true;
            }
            current = self.parent(p);
        }
        false
    }

    /// Attaches a validated, detached `child` under `parent`.
    fn link(&mut self, parent: TermId, child: TermId, after: Option<TermId>) {
        if let Some(node) = self.get_mut(parent) {
            let position = after
                .and_then(|after| node.children.iter().position(|c| *c == after))
                .map(|idx| idx + 1)
                .unwrap_or(node.children.len());
            node.children.insert(position, child);
        }
        if let Some(node) = self.get_mut(child) {
            node.parent = Some(parent);
        }
    }

    fn unlink_from(&mut self, parent: TermId, child: TermId) {
        if let Some(node) = self.get_mut(parent) {
            node.children.retain(|c| *c != child);
        }
        if let Some(node) = self.get_mut(child) {
            node.parent = None;
        }
    }

    /// Drops `id` and its whole subtree from the arena.
    fn free(&mut self, id: TermId) {
        for doomed in self.descendants(id) {
            if let Some(slot) = self.nodes.get_mut(doomed.0) {
                *slot = None;
            }
        }
    }

    /// Removes emptied combinators walking up from `start`; stops at the
    /// first node that still has children or has no parent.
    fn prune(&mut self, start: TermId) {
        let mut current = start;
        loop {
            let Some(node) = self.get(current) else {
                return;
            };
            if !node.children.is_empty() {
                return;
            }
            let Some(parent) = node.parent else {
                return;
            };

            trace!(term = %current, parent = %parent, "pruning empty term");
            self.unlink_from(parent, current);
            self.free(current);
            current = parent;
        }
    }
}

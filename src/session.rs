//! # Query Session Module
//!
//! A [`QuerySession`] is the single owner of one search's term tree. Whatever
//! drives the search (a tag browser, a drag-and-drop query bar, a text entry)
//! talks to the session instead of the tree, and the session:
//!
//! - serializes every mutation through `&mut self`;
//! - implements the tag-oriented helpers a browser needs (include a tag on its
//!   own, require it across every group, and their undo operations);
//! - recompiles the condition after each mutation and hands it to every
//!   registered observer.
//!
//! Observers receive `None` when the query is empty, which means "no tag or
//! text filter", i.e. match every photo.
//!
//! ```rust
//! # use photo_query::session::QuerySession;
//! # use photo_query::tag::Tag;
//! # use std::{cell::RefCell, rc::Rc};
//! let seen = Rc::new(RefCell::new(vec![]));
//! let sink = seen.clone();
//!
//! let mut session = QuerySession::new();
//! session.subscribe(move |condition| sink.borrow_mut().push(condition.map(String::from)));
//! session.include(&[Tag::new(1, "beach")]);
//!
//! assert!(seen.borrow()[0].is_some());
//! ```

use crate::{
    config::QueryConfig,
    parser::{ParseError, parse_query},
    query::{Combinator, TermError, TermId, TermKind, TermTree},
    tag::Tag,
};
use tracing::{debug, trace};

type Observer = Box<dyn FnMut(Option<&str>)>;

/// Owns a term tree rooted at an `Or` of groups and keeps observers in sync.
pub struct QuerySession {
    tree: TermTree,
    config: QueryConfig,
    observers: Vec<Observer>,
}

impl Default for QuerySession {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for QuerySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuerySession")
            .field("tree", &self.tree)
            .field("config", &self.config)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl QuerySession {
    pub fn new() -> Self {
        Self::with_config(QueryConfig::default())
    }

    pub fn with_config(config: QueryConfig) -> Self {
        Self {
            tree: TermTree::new(Combinator::Or),
            config,
            observers: vec![],
        }
    }

    /// Sets the tag whose photos stay hidden unless explicitly searched for.
    pub fn with_hidden_tag(mut self, tag: Tag) -> Self {
        self.tree.set_hidden_tag(Some(tag));
        self
    }

    pub fn tree(&self) -> &TermTree {
        &self.tree
    }

    pub fn root(&self) -> TermId {
        self.tree.root()
    }

    /// Registers a callback run with the new condition after every mutation.
    pub fn subscribe<F>(&mut self, observer: F)
    where
        F: FnMut(Option<&str>) + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    /// The compiled condition, or `None` when nothing is filtered.
    pub fn condition(&self) -> Option<String> {
        self.tree.condition()
    }

    pub fn is_clear(&self) -> bool {
        self.tree.is_empty()
    }

    pub fn tag_included(&self, tag: &Tag) -> bool {
        self.tree.tag_included(self.tree.root(), tag)
    }

    pub fn tag_required(&self, tag: &Tag) -> bool {
        self.tree.tag_required(self.tree.root(), tag)
    }

    /// Inserts one tag literal per tag under `parent`, after `after`.
    ///
    /// Tags already present directly under `parent` are skipped. Under an
    /// `Or`, the first new literal is wrapped in a fresh `And` group and the
    /// remaining tags of the same call join that group, so they end up ANDed
    /// together and later tags can be ANDed in as well.
    pub fn insert_tags(
        &mut self,
        tags: &[Tag],
        parent: TermId,
        after: Option<TermId>,
    ) -> Result<Vec<TermId>, TermError> {
        let added = self.insert_tags_quietly(tags, parent, after)?;
        self.notify();
        Ok(added)
    }

    /// Adds a free-text literal under `parent`, wrapped like a tag literal.
    pub fn insert_text(
        &mut self,
        text: &str,
        parent: TermId,
        after: Option<TermId>,
    ) -> Result<TermId, TermError> {
        let (parent, after) = self.group_for(parent, after)?;
        let id = self
            .tree
            .insert(parent, TermKind::Text(text.to_string()), after)?;
        self.notify();
        Ok(id)
    }

    /// Adds each tag that is not yet included as a group of its own.
    pub fn include(&mut self, tags: &[Tag]) {
        let fresh = tags
            .iter()
            .filter(|tag| !self.tag_included(tag))
            .cloned()
            .collect::<Vec<_>>();

        if fresh.is_empty() {
            return;
        }

        let root = self.tree.root();
        match self.insert_tags_quietly(&fresh, root, None) {
            Ok(added) => trace!(count = added.len(), "included tags"),
            Err(err) => debug!(%err, "could not include tags"),
        }
        self.notify();
    }

    /// Removes the single-tag groups searching for any of `tags`.
    pub fn uninclude(&mut self, tags: &[Tag]) {
        let included = tags
            .iter()
            .filter(|tag| self.tag_included(tag))
            .collect::<Vec<_>>();

        if included.is_empty() {
            return;
        }

        let mut changed = false;
        for group in self.tree.literal_parents(self.tree.root()) {
            if self.tree.child_count(group) != 1 {
                continue;
            }
            let Some(last) = self.tree.last(group) else {
                continue;
            };

            let matches = self
                .tree
                .kind(last)
                .and_then(TermKind::tag)
                .is_some_and(|t| included.contains(&t));
            if matches && self.tree.remove_term(last).is_ok() {
                changed = true;
            }
        }

        if changed {
            self.notify();
        }
    }

    /// ANDs each tag that is not yet required into every group, or adds it
    /// as a new group when there are none.
    ///
    /// An `And` group takes the tags directly. An `Or` group is ANDed with
    /// them through its `And` parent, which is created around the group when
    /// it has none.
    pub fn require(&mut self, tags: &[Tag]) {
        let fresh = tags
            .iter()
            .filter(|tag| !self.tag_required(tag))
            .cloned()
            .collect::<Vec<_>>();

        if fresh.is_empty() {
            return;
        }

        let groups = self.tree.literal_parents(self.tree.root());
        if groups.is_empty() {
            let root = self.tree.root();
            if let Err(err) = self.insert_tags_quietly(&fresh, root, None) {
                debug!(%err, "could not require tags");
            }
        }
        for group in groups {
            let inserted = self.and_context(group).and_then(|target| {
                let last = self.tree.last(target);
                self.insert_tags_quietly(&fresh, target, last)
            });
            if let Err(err) = inserted {
                debug!(%err, group = %group, "could not require tags");
            }
        }

        self.notify();
    }

    /// Drops `tags` from every multi-child group; a group holding nothing
    /// else keeps its tag.
    pub fn unrequire(&mut self, tags: &[Tag]) {
        let required = tags
            .iter()
            .filter(|tag| self.tag_required(tag))
            .collect::<Vec<_>>();

        if required.is_empty() {
            return;
        }

        for group in self.tree.literal_parents(self.tree.root()) {
            for tag in &required {
                if self.tree.child_count(group) < 2 {
                    break;
                }
                if let Some(literal) = self.tree.find_by_tag(group, tag, false).first() {
                    if let Err(err) = self.tree.remove_term(*literal) {
                        debug!(%err, "could not unrequire tag");
                    }
                }
            }
        }

        self.notify();
    }

    /// Moves tag literals to a new place, keeping their negation.
    ///
    /// `parent` must be a combinator and `after`, if given, one of its
    /// children; otherwise nothing is moved.
    pub fn move_literals(
        &mut self,
        literals: &[TermId],
        parent: TermId,
        after: Option<TermId>,
    ) -> Result<(), TermError> {
        if self
            .tree
            .kind(parent)
            .ok_or(TermError::UnknownTerm(parent))?
            .combinator()
            .is_none()
        {
            return Err(TermError::LeafParent(parent));
        }
        if let Some(after) = after.filter(|a| !self.tree.children(parent).contains(a)) {
            return Err(TermError::NotAChild {
                parent,
                child: after,
            });
        }

        let mut parent = parent;
        for literal in literals {
            let Some(tag) = self.tree.kind(*literal).and_then(TermKind::tag).cloned() else {
                continue;
            };
            let negated = self.tree.is_negated(*literal);

            self.tree.remove_term(*literal)?;
            if !self.tree.contains(parent) {
                parent = self.tree.root();
            }
            let after = after.filter(|a| self.tree.parent(*a) == Some(parent));

            for added in self.insert_tags_quietly(&[tag], parent, after)? {
                self.tree.set_negated(added, negated)?;
            }
        }

        self.notify();
        Ok(())
    }

    /// Removes a term and whatever it leaves empty above it.
    pub fn remove_term(&mut self, term: TermId) -> Result<(), TermError> {
        self.tree.remove_term(term)?;
        self.notify();
        Ok(())
    }

    /// Sets the negation of a term, returning the id now standing in its place.
    pub fn set_negated(&mut self, term: TermId, negated: bool) -> Result<TermId, TermError> {
        let id = self.tree.set_negated(term, negated)?;
        self.notify();
        Ok(id)
    }

    /// Inverts a term, returning the id now standing in its place.
    pub fn invert(&mut self, term: TermId, recurse: bool) -> Result<TermId, TermError> {
        let id = self.tree.invert(term, recurse)?;
        self.notify();
        Ok(id)
    }

    /// Tells observers the query changed if any of `tags` takes part in it,
    /// e.g. after those tags were attached to or removed from photos.
    pub fn tags_changed(&mut self, tags: &[Tag]) {
        let root = self.tree.root();
        if tags
            .iter()
            .any(|tag| !self.tree.find_by_tag(root, tag, true).is_empty())
        {
            self.notify();
        }
    }

    /// Drops every literal referring to a tag that no longer exists.
    pub fn tag_deleted(&mut self, tag: &Tag) {
        let root = self.tree.root();
        let literals = self.tree.find_by_tag(root, tag, true);
        if literals.is_empty() {
            return;
        }

        for literal in literals {
            // Earlier removals may already have pruned this one.
            if self.tree.contains(literal) {
                if let Err(err) = self.tree.remove_term(literal) {
                    debug!(%err, tag = %tag, "could not drop deleted tag");
                }
            }
        }
        self.notify();
    }

    /// Replaces the query with the parse of `input`.
    ///
    /// On error the current query is left untouched.
    pub fn parse<F>(&mut self, input: &str, lookup: F) -> Result<(), ParseError>
    where
        F: Fn(&str) -> Option<Tag>,
    {
        let mut tree = parse_query(input, &self.config.operators, lookup)?;
        tree.set_hidden_tag(self.tree.hidden_tag().cloned());
        self.tree = tree;
        self.notify();
        Ok(())
    }

    /// Starts afresh with an empty `Or` root.
    pub fn clear(&mut self) {
        let hidden = self.tree.hidden_tag().cloned();
        self.tree = TermTree::new(Combinator::Or);
        self.tree.set_hidden_tag(hidden);
        self.notify();
    }

    fn insert_tags_quietly(
        &mut self,
        tags: &[Tag],
        parent: TermId,
        after: Option<TermId>,
    ) -> Result<Vec<TermId>, TermError> {
        let mut parent = parent;
        let mut after = after;
        let mut added = vec![];

        for tag in tags {
            if !self.tree.find_by_tag(parent, tag, false).is_empty() {
                continue;
            }

            (parent, after) = self.group_for(parent, after)?;
            let id = self.tree.insert(parent, TermKind::Tag(tag.clone()), after)?;
            after = Some(id);
            added.push(id);
        }

        Ok(added)
    }

    /// Where a new literal aimed at `parent` goes: an `Or` gets a fresh `And`
    /// group (placed after `after`) for the literal to live in.
    fn group_for(
        &mut self,
        parent: TermId,
        after: Option<TermId>,
    ) -> Result<(TermId, Option<TermId>), TermError> {
        match self.tree.kind(parent) {
            Some(TermKind::Or) => Ok((self.tree.insert(parent, Combinator::And, after)?, None)),
            Some(_) => Ok((parent, after)),
            None => Err(TermError::UnknownTerm(parent)),
        }
    }

    /// The `And` that new literals for `group` are ANDed into: the group
    /// itself, the `And` directly holding an `Or` group, or a fresh `And`
    /// put in the group's place.
    fn and_context(&mut self, group: TermId) -> Result<TermId, TermError> {
        match self.tree.kind(group) {
            Some(TermKind::Or) => match self.tree.parent(group) {
                Some(parent) if self.tree.kind(parent) == Some(&TermKind::And) => Ok(parent),
                _ => self.tree.wrap(group, Combinator::And),
            },
            Some(_) => Ok(group),
            None => Err(TermError::UnknownTerm(group)),
        }
    }

    fn notify(&mut self) {
        let condition = self.tree.condition();
        trace!(observers = self.observers.len(), ?condition, "query changed");

        for observer in &mut self.observers {
            observer(condition.as_deref());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::QuerySession;
    use crate::{
        dialect::{CurrentDialect, Dialect},
        query::{TermError, TermKind, TermTree},
        tag::Tag,
    };
    use std::{cell::RefCell, rc::Rc};

    fn tags() -> (Tag, Tag, Tag) {
        (Tag::new(1, "a"), Tag::new(2, "b"), Tag::new(3, "c"))
    }

    #[test]
    fn test_insert_wraps_or_context_in_and_group() {
        let (a, b, _) = tags();
        let mut session = QuerySession::new();
        let root = session.root();

        let added = session.insert_tags(&[a.clone(), b.clone()], root, None).unwrap();

        assert_eq!(2, added.len());
        let tree = session.tree();
        let group = tree.parent(added[0]).unwrap();
        assert_eq!(Some(&TermKind::And), tree.kind(group));
        assert_eq!(Some(group), tree.parent(added[1]));
        assert_eq!(&[group], tree.children(root));
    }

    #[test]
    fn test_insert_skips_duplicates_in_group() {
        let (a, b, _) = tags();
        let mut session = QuerySession::new();
        let root = session.root();
        let added = session.insert_tags(&[a.clone()], root, None).unwrap();
        let group = session.tree().parent(added[0]).unwrap();

        let again = session.insert_tags(&[a.clone(), b], group, None).unwrap();

        assert_eq!(1, again.len());
        assert_eq!(2, session.tree().child_count(group));
        assert_eq!(1, session.tree().find_by_tag(group, &a, false).len());
    }

    #[test]
    fn test_include_and_uninclude() {
        let (a, b, _) = tags();
        let mut session = QuerySession::new();

        session.include(&[a.clone()]);
        session.include(&[a.clone()]);
        assert_eq!(1, session.tree().child_count(session.root()));
        assert!(session.tag_included(&a));
        assert!(!session.tag_included(&b));

        session.uninclude(&[a.clone()]);
        assert!(session.is_clear());
        assert_eq!(None, session.condition());
    }

    #[test]
    fn test_require_and_unrequire() {
        let (a, b, c) = tags();
        let mut session = QuerySession::new();
        session.include(&[a.clone()]);
        session.include(&[b.clone()]);

        session.require(&[c.clone()]);

        assert!(session.tag_required(&c));
        assert!(!session.tag_required(&a));
        let root = session.root();
        assert_eq!(2, session.tree().find_by_tag(root, &c, true).len());

        session.unrequire(&[c.clone()]);

        assert!(session.tree().find_by_tag(root, &c, true).is_empty());
        assert!(session.tag_included(&a) && session.tag_included(&b));
    }

    #[test]
    fn test_require_narrows_parsed_query() {
        let (a, b, _) = tags();
        let lookup = |name: &str| (name == "a").then(|| Tag::new(1, "a"));
        let mut session = QuerySession::new();
        session.parse("a", lookup).unwrap();

        session.require(&[b.clone()]);
        let once = session.condition();
        session.require(&[b.clone()]);

        assert!(session.tag_required(&b));
        assert_eq!(once, session.condition());

        let tree = session.tree();
        let root = session.root();
        assert_eq!(Some(&TermKind::And), tree.kind(root));
        assert_eq!(1, tree.find_by_tag(root, &b, true).len());
        assert_eq!(
            Some(root),
            tree.find_by_tag(root, &a, true)
                .first()
                .and_then(|literal| tree.parent(*literal))
                .and_then(|group| tree.parent(group))
        );
    }

    #[test]
    fn test_require_narrows_flat_tag_query() {
        let (a, b, c) = tags();
        let mut session = QuerySession::new();
        let flat = TermTree::from_tags(&[a.clone(), b.clone()]).unwrap();
        session.tree = flat;

        session.require(&[c.clone()]);

        assert!(session.tag_required(&c));
        let tree = session.tree();
        let root = session.root();
        assert_eq!(Some(&TermKind::And), tree.kind(root));
        assert_eq!(2, tree.child_count(root));
        assert_eq!(
            CurrentDialect::tag_membership(&[3], false),
            tree.sql_condition(tree.children(root)[1])
        );
    }

    #[test]
    fn test_move_literals_rejects_leaf_target_untouched() {
        let (a, b, _) = tags();
        let mut session = QuerySession::new();
        let root = session.root();
        let first = session.insert_tags(&[a.clone()], root, None).unwrap()[0];
        let second = session.insert_tags(&[b.clone()], root, None).unwrap()[0];
        let before = session.condition();

        assert_eq!(
            Err(TermError::LeafParent(second)),
            session.move_literals(&[first], second, None)
        );
        assert_eq!(
            Err(TermError::NotAChild {
                parent: root,
                child: first
            }),
            session.move_literals(&[first], root, Some(first))
        );

        assert_eq!(before, session.condition());
        assert!(session.tree().contains(first));
    }

    #[test]
    fn test_require_on_empty_query_adds_group() {
        let (a, _, _) = tags();
        let mut session = QuerySession::new();

        session.require(&[a.clone()]);

        assert!(session.tag_included(&a));
    }

    #[test]
    fn test_observers_see_every_change() {
        let (a, _, _) = tags();
        let seen = Rc::new(RefCell::new(vec![]));
        let sink = seen.clone();

        let mut session = QuerySession::new();
        session.subscribe(move |c| sink.borrow_mut().push(c.map(String::from)));

        session.include(&[a.clone()]);
        session.clear();

        let seen = seen.borrow();
        assert_eq!(2, seen.len());
        assert!(
            seen[0]
                .as_deref()
                .unwrap()
                .contains(&CurrentDialect::tag_membership(&[1], false))
        );
        assert_eq!(None, seen[1]);
    }

    #[test]
    fn test_tags_changed_only_notifies_for_used_tags() {
        let (a, b, _) = tags();
        let count = Rc::new(RefCell::new(0));
        let sink = count.clone();

        let mut session = QuerySession::new();
        session.include(&[a.clone()]);
        session.subscribe(move |_| *sink.borrow_mut() += 1);

        session.tags_changed(&[b]);
        assert_eq!(0, *count.borrow());
        session.tags_changed(&[a]);
        assert_eq!(1, *count.borrow());
    }

    #[test]
    fn test_tag_deleted_removes_literals() {
        let (a, b, _) = tags();
        let mut session = QuerySession::new();
        session.include(&[a.clone()]);
        session.include(&[b.clone()]);
        session.require(&[a.clone()]);

        session.tag_deleted(&a);

        let root = session.root();
        assert!(session.tree().find_by_tag(root, &a, true).is_empty());
        assert!(session.tag_included(&b));
    }

    #[test]
    fn test_move_literals_keeps_negation() {
        let (a, b, _) = tags();
        let mut session = QuerySession::new();
        let root = session.root();
        let first = session.insert_tags(&[a.clone()], root, None).unwrap()[0];
        let second = session.insert_tags(&[b.clone()], root, None).unwrap()[0];
        let target = session.tree().parent(second).unwrap();
        session.set_negated(first, true).unwrap();

        session.move_literals(&[first], target, Some(second)).unwrap();

        let tree = session.tree();
        let moved = tree.find_by_tag(root, &a, true);
        assert_eq!(1, moved.len());
        assert_eq!(Some(target), tree.parent(moved[0]));
        assert!(tree.is_negated(moved[0]));
        assert_eq!(&[target], tree.children(root));
    }

    #[test]
    fn test_parse_keeps_hidden_tag() {
        let hidden = Tag::new(9, "hidden");
        let mut session = QuerySession::new().with_hidden_tag(hidden.clone());

        session.parse("beach and sea", |_| None).unwrap();

        assert_eq!(Some(&hidden), session.tree().hidden_tag());
        assert!(
            session
                .condition()
                .unwrap()
                .contains(&CurrentDialect::hidden_exclusion(9))
        );
        assert!(session.parse("(beach", |_| None).is_err());
    }
}

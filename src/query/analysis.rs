//! Read-only questions the tag-query controller asks about a tree.
//!
//! A *group* is a combinator with at least one literal among its direct
//! children; groups are the unit at which "this tag is included" and "this
//! tag is required" are judged.

use super::{TermId, TermKind, TermTree};
use crate::tag::Tag;

/// How strongly a tag constrains the query, as reported by
/// [`TermTree::tag_requirement`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TagRequirement {
    /// The tag sits in every group, and every group has more than one child.
    pub required: bool,

    /// Number of groups found holding the tag before the scan stopped.
    pub num_terms: usize,

    /// Size of the smallest group seen holding the tag.
    pub grouped_with: Option<usize>,
}

impl TermTree {
    /// Nodes under `term` whose own tag is `tag`.
    ///
    /// With `recursive` the whole subtree is searched; without it only `term`
    /// itself and its direct children are inspected.
    pub fn find_by_tag(&self, term: TermId, tag: &Tag, recursive: bool) -> Vec<TermId> {
        let has_tag = |id: &TermId| self.kind(*id).and_then(|k| k.tag()) == Some(tag);

        if recursive {
            return self.descendants(term).into_iter().filter(has_tag).collect();
        }

        std::iter::once(term)
            .filter(|_| self.contains(term))
            .chain(self.children(term).iter().copied())
            .filter(has_tag)
            .collect()
    }

    /// Every group under `term`, deepest first, including `term` itself.
    pub fn literal_parents(&self, term: TermId) -> Vec<TermId> {
        let mut results = vec![];
        self.collect_literal_parents(term, &mut results);
        results
    }

    fn collect_literal_parents(&self, term: TermId, results: &mut Vec<TermId>) {
        let mut has_literal = false;

        for child in self.children(term) {
            if self.kind(*child).is_some_and(|k| k.is_literal()) {
                has_literal = true;
            }
            self.collect_literal_parents(*child, results);
        }

        if has_literal {
            results.push(term);
        }
    }

    /// True when some group under `term` searches for `tag` on its own, i.e.
    /// it holds `tag` and no other tag literal.
    pub fn tag_included(&self, term: TermId, tag: &Tag) -> bool {
        self.literal_parents(term).into_iter().any(|group| {
            let mut tags = self
                .children(group)
                .iter()
                .filter_map(|child| self.kind(*child).and_then(|k| k.tag()));

            let mut has_tag = false;
            let only = tags.all(|t| {
                has_tag |= t == tag;
                t == tag
            });

            has_tag && only
        })
    }

    /// True when `tag` is effectively ANDed with the whole query under `term`.
    pub fn tag_required(&self, term: TermId, tag: &Tag) -> bool {
        self.tag_requirement(term, tag).required
    }

    /// Like [`TermTree::tag_required`], also reporting how many groups hold
    /// the tag and the size of the smallest of them.
    ///
    /// A group with a single child never counts as requiring its tag: that
    /// case is reported by [`TermTree::tag_included`] instead.
    pub fn tag_requirement(&self, term: TermId, tag: &Tag) -> TagRequirement {
        let mut requirement = TagRequirement::default();
        let groups = self.literal_parents(term);

        if groups.is_empty() {
            return requirement;
        }

        for group in groups {
            let Some(size) = self.held_with(group, tag) else {
                return requirement;
            };

            requirement.num_terms += 1;
            requirement.grouped_with =
                Some(requirement.grouped_with.map_or(size, |min| min.min(size)));
        }

        requirement.required = true;
        requirement
    }

    /// The number of terms `tag` is ANDed with for `group`, if it is.
    ///
    /// The tag counts when it is a direct child of a multi-child `group`, or
    /// when `group` is an `Or` sitting directly in an `And` that holds it.
    fn held_with(&self, group: TermId, tag: &Tag) -> Option<usize> {
        let holds = |term: TermId| {
            let children = self.children(term);
            (children.len() > 1
                && children
                    .iter()
                    .any(|child| self.kind(*child).and_then(|k| k.tag()) == Some(tag)))
            .then_some(children.len())
        };

        holds(group).or_else(|| {
            let parent = self.parent(group)?;
            match (self.kind(group), self.kind(parent)) {
                (Some(TermKind::Or), Some(TermKind::And)) => holds(parent),
                _ => None,
            }
        })
    }
}

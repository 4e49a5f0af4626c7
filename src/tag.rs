//! Tag identities as seen by the query tree.
//!
//! Tags are owned by an external store. The query tree only needs a stable
//! numeric id (used in emitted SQL) and a display name (used by the free-text
//! parser lookup). Category tags additionally carry the ids of every tag below
//! them, so that searching for a category also matches its descendants.

use std::fmt;

/// Stable primary-key-like identifier of a tag.
pub type TagId = i64;

/// An opaque, comparable tag identity.
///
/// Two tags are equal when their ids are equal, regardless of name: the
/// store may hold distinct tags that share a display name.
#[derive(Debug, Clone)]
pub struct Tag {
    id: TagId,
    name: String,
    descendants: Vec<TagId>,
}

impl Tag {
    pub fn new<N: Into<String>>(id: TagId, name: N) -> Self {
        Self {
            id,
            name: name.into(),
            descendants: vec![],
        }
    }

    /// Marks this tag as a category whose search also covers `descendants`.
    pub fn with_descendants<I: IntoIterator<Item = TagId>>(mut self, descendants: I) -> Self {
        self.descendants = descendants.into_iter().collect();
        self
    }

    pub fn id(&self) -> TagId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn descendants(&self) -> &[TagId] {
        &self.descendants
    }

    /// Ids matched by a membership predicate for this tag: its own id first,
    /// followed by any descendants.
    pub fn member_ids(&self) -> impl Iterator<Item = TagId> + '_ {
        std::iter::once(self.id).chain(self.descendants.iter().copied())
    }
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Tag {}

impl std::hash::Hash for Tag {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::Tag;

    #[test]
    fn test_equality_is_by_id() {
        let a = Tag::new(1, "beach");
        let b = Tag::new(2, "beach");
        let c = Tag::new(1, "renamed");

        assert_ne!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn test_member_ids_include_descendants() {
        let places = Tag::new(10, "places").with_descendants([11, 12]);

        assert_eq!(vec![10, 11, 12], places.member_ids().collect::<Vec<_>>());
        assert_eq!(vec![3], Tag::new(3, "x").member_ids().collect::<Vec<_>>());
    }
}

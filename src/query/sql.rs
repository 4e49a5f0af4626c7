use super::{TermId, TermKind, TermTree};
use crate::dialect::{CurrentDialect, Dialect};
use crate::tag::TagId;

impl TermTree {
    /// The operator joining the children of `term`: `" AND "`, `" OR "`, or
    /// empty for literals.
    pub fn sql_operator(&self, term: TermId) -> &'static str {
        match self.kind(term) {
            Some(TermKind::And) => " AND ",
            Some(TermKind::Or) => " OR ",
            Some(TermKind::Tag(_)) | Some(TermKind::Text(_)) | None => "",
        }
    }

    /// Compiles the subtree at `term` with the [`CurrentDialect`].
    pub fn sql_condition(&self, term: TermId) -> String {
        self.sql_condition_in::<CurrentDialect>(term)
    }

    /// Compiles the subtree at `term` into a boolean SQL expression.
    ///
    /// Combinators render as `(c1 OP c2 ...)`; an empty combinator renders as
    /// `()`. Every `And` additionally excludes photos carrying the hidden tag,
    /// unless that tag appears somewhere below it.
    pub fn sql_condition_in<D: Dialect>(&self, term: TermId) -> String {
        let Some(node) = self.get(term) else {
            return "()".to_string();
        };

        match &node.kind {
            TermKind::Tag(tag) => {
                D::tag_membership(&tag.member_ids().collect::<Vec<_>>(), node.negated)
            }
            TermKind::Text(text) => D::text_match(text, node.negated),
            TermKind::Or => self.joined_children::<D>(term),
            TermKind::And => {
                let base = self.joined_children::<D>(term);
                match self.hidden_to_exclude(term) {
                    Some(hidden) => format!("({} AND {})", base, D::hidden_exclusion(hidden)),
                    None => format!("({})", base),
                }
            }
        }
    }

    /// Compiles the whole tree, or `None` when the root has no children and
    /// the query therefore filters nothing.
    pub fn condition(&self) -> Option<String> {
        self.condition_in::<CurrentDialect>()
    }

    pub fn condition_in<D: Dialect>(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        Some(self.sql_condition_in::<D>(self.root))
    }

    fn joined_children<D: Dialect>(&self, term: TermId) -> String {
        let clauses = self
            .children(term)
            .iter()
            .map(|child| self.sql_condition_in::<D>(*child))
            .collect::<Vec<_>>();

        format!("({})", clauses.join(self.sql_operator(term)))
    }

    fn hidden_to_exclude(&self, term: TermId) -> Option<TagId> {
        let hidden = self.hidden.as_ref()?;
        if self.find_by_tag(term, hidden, true).is_empty() {
            Some(hidden.id())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::dialect::{Dialect, SqliteDialect};
    use crate::query::{Combinator, TermKind, TermTree};
    use crate::tag::Tag;

    fn tag_sql(id: i64, negated: bool) -> String {
        SqliteDialect::tag_membership(&[id], negated)
    }

    #[test]
    fn test_sql_operator() {
        let mut tree = TermTree::new(Combinator::Or);
        let and = tree.insert(tree.root(), Combinator::And, None).unwrap();
        let leaf = tree.insert(and, TermKind::Text("x".into()), None).unwrap();

        assert_eq!(" OR ", tree.sql_operator(tree.root()));
        assert_eq!(" AND ", tree.sql_operator(and));
        assert_eq!("", tree.sql_operator(leaf));
    }

    #[test]
    fn test_empty_root_has_no_condition() {
        let tree = TermTree::new(Combinator::Or);

        assert_eq!(None, tree.condition());
        assert_eq!("()", tree.sql_condition_in::<SqliteDialect>(tree.root()));
    }

    #[test]
    fn test_end_to_end_with_hidden_tag() {
        let beach = Tag::new(1, "beach");
        let sunset = Tag::new(2, "sunset");
        let hidden = Tag::new(99, "hidden");

        let mut tree = TermTree::new(Combinator::Or).with_hidden_tag(hidden.clone());
        let group = tree.insert(tree.root(), Combinator::And, None).unwrap();
        tree.insert(group, TermKind::Tag(beach), None).unwrap();
        tree.insert(group, TermKind::Tag(sunset), None).unwrap();

        assert_eq!(
            Some(format!(
                "((({} AND {}) AND {}))",
                tag_sql(1, false),
                tag_sql(2, false),
                SqliteDialect::hidden_exclusion(99)
            )),
            tree.condition_in::<SqliteDialect>()
        );
    }

    #[test]
    fn test_explicit_hidden_tag_is_not_excluded() {
        let hidden = Tag::new(99, "hidden");
        let mut tree = TermTree::new(Combinator::And).with_hidden_tag(hidden.clone());
        tree.insert(tree.root(), TermKind::Tag(hidden), None).unwrap();

        assert_eq!(
            format!("(({}))", tag_sql(99, false)),
            tree.sql_condition_in::<SqliteDialect>(tree.root())
        );
    }

    #[test]
    fn test_hidden_tag_is_excluded_from_and_root() {
        let hidden = Tag::new(99, "hidden");
        let mut tree = TermTree::new(Combinator::And).with_hidden_tag(hidden);
        tree.insert(tree.root(), TermKind::Tag(Tag::new(5, "x")), None)
            .unwrap();

        let sql = tree.sql_condition_in::<SqliteDialect>(tree.root());
        assert!(sql.contains(&SqliteDialect::hidden_exclusion(99)));
    }

    #[test]
    fn test_or_root_has_no_exclusion_of_its_own() {
        let hidden = Tag::new(99, "hidden");
        let mut tree = TermTree::new(Combinator::Or).with_hidden_tag(hidden);
        tree.insert(tree.root(), TermKind::Tag(Tag::new(5, "x")), None)
            .unwrap();

        assert_eq!(
            format!("({})", tag_sql(5, false)),
            tree.sql_condition_in::<SqliteDialect>(tree.root())
        );
    }

    #[test]
    fn test_recursive_inversion_compiles_to_negated_or() {
        let mut tree = TermTree::new(Combinator::And);
        let root = tree.root();
        tree.insert(root, TermKind::Tag(Tag::new(1, "a")), None).unwrap();
        tree.insert(root, TermKind::Tag(Tag::new(2, "b")), None).unwrap();

        let inverted = tree.invert(root, true).unwrap();

        let mut expected = TermTree::new(Combinator::Or);
        let a = expected
            .insert(expected.root(), TermKind::Tag(Tag::new(1, "a")), None)
            .unwrap();
        let b = expected
            .insert(expected.root(), TermKind::Tag(Tag::new(2, "b")), None)
            .unwrap();
        expected.set_negated(a, true).unwrap();
        expected.set_negated(b, true).unwrap();

        assert_eq!(
            expected.sql_condition_in::<SqliteDialect>(expected.root()),
            tree.sql_condition_in::<SqliteDialect>(inverted)
        );
        assert_eq!(
            format!("({} OR {})", tag_sql(1, true), tag_sql(2, true)),
            tree.sql_condition_in::<SqliteDialect>(inverted)
        );
    }

    #[test]
    fn test_text_literal_sql() {
        let mut tree = TermTree::new(Combinator::Or);
        let quoted = tree
            .insert(tree.root(), TermKind::Text("O'Brien".into()), None)
            .unwrap();
        let wildcard = tree
            .insert(tree.root(), TermKind::Text("50%off".into()), None)
            .unwrap();
        tree.set_negated(wildcard, true).unwrap();

        assert!(
            tree.sql_condition_in::<SqliteDialect>(quoted)
                .contains("LIKE '%O''Brien%'")
        );
        let negated = tree.sql_condition_in::<SqliteDialect>(wildcard);
        assert!(negated.starts_with("NOT ("));
        assert!(negated.contains("LIKE '%50%off%'"));
    }

    #[test]
    fn test_category_tag_covers_descendants() {
        let places = Tag::new(10, "places").with_descendants([11, 12]);
        let mut tree = TermTree::new(Combinator::Or);
        let leaf = tree.insert(tree.root(), TermKind::Tag(places), None).unwrap();

        assert_eq!(
            SqliteDialect::tag_membership(&[10, 11, 12], false),
            tree.sql_condition_in::<SqliteDialect>(leaf)
        );
    }
}

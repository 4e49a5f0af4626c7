//! # SQL Dialect Module
//!
//! This module defines the `Dialect` trait, which abstracts over the differences
//! in SQL syntax across the databases a photo collection may live in. The query
//! tree compiles itself into a boolean condition through these methods, so the
//! exact predicate shapes (table names, columns, text matching operator) live in
//! one place.
//!
//! The dialect used by default is chosen at compile time: the `sqlite` feature
//! (on by default) selects [`SqliteDialect`]; building with
//! `--no-default-features --features postgres` selects [`PostgresDialect`].
//! Both are always available for callers that want to pick one explicitly through
//! [`TermTree::sql_condition_in`](crate::query::TermTree::sql_condition_in).
//!
//! ## Relations referenced
//! - `photos (id, filename, base_uri, description)`
//! - `photo_tags (photo_id, tag_id)`
//!
//! Predicates only ever embed numeric tag ids. User text is embedded as a
//! quoted `LIKE` pattern with single quotes doubled; `%` and `_` are left
//! alone on purpose so users can type their own wildcards.

mod postgres;
mod sqlite;

pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;

use crate::tag::TagId;

/// The SQL dialect used when none is named, determined by feature flags.
#[cfg(feature = "sqlite")]
pub type CurrentDialect = SqliteDialect;

#[cfg(all(feature = "postgres", not(feature = "sqlite")))]
pub type CurrentDialect = PostgresDialect;

#[cfg(not(any(feature = "sqlite", feature = "postgres")))]
compile_error!("enable the `sqlite` or the `postgres` feature to select a SQL dialect");

/// A trait for SQL dialects to support database-specific condition generation.
pub trait Dialect {
    /// Returns the membership test for photos tagged with any of `tag_ids`.
    ///
    /// # Parameters
    /// - `tag_ids`: The tag's own id followed by its descendants, if any.
    /// - `negated`: Whether to match photos *without* any of those tags.
    fn tag_membership(tag_ids: &[TagId], negated: bool) -> String {
        let ids = tag_ids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "id {}IN (SELECT photo_id FROM photo_tags WHERE tag_id IN ({}))",
            if negated { "NOT " } else { "" },
            ids
        )
    }

    /// Returns the clause excluding photos carrying the hidden tag.
    fn hidden_exclusion(hidden: TagId) -> String {
        format!("id NOT IN (SELECT photo_id FROM photo_tags WHERE tag_id = {hidden})")
    }

    /// Columns searched by free-text literals.
    fn text_columns() -> &'static [&'static str] {
        &["filename", "base_uri", "description"]
    }

    /// Operator used for substring matches.
    fn like_operator() -> &'static str {
        "LIKE"
    }

    /// Escapes raw user text for use inside a single-quoted SQL literal.
    ///
    /// Only the quote is escaped; wildcards pass through untouched.
    fn quote_text(raw: &str) -> String {
        raw.replace('\'', "''")
    }

    /// Returns the substring match of `text` against every text column.
    fn text_match(text: &str, negated: bool) -> String {
        let escaped = Self::quote_text(text);
        let clauses = Self::text_columns()
            .iter()
            .map(|column| format!("{} {} '%{}%'", column, Self::like_operator(), escaped))
            .collect::<Vec<_>>()
            .join(" OR ");

        format!("{}({})", if negated { "NOT " } else { "" }, clauses)
    }

    /// DDL for the relations the predicates above refer to.
    fn schema() -> &'static [&'static str];
}

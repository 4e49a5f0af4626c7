//! # Photo Query Expressions
//!
//! This crate lets a photo browser describe an ad-hoc search as a boolean
//! combination of tag filters and free-text filters, and compiles that
//! combination into a SQL condition usable in the `WHERE` clause of a query
//! against the photo database.
//!
//! ## Features
//!
//! - **Term Trees**: `And`/`Or` combinators over tag and text literals, kept in
//!   an arena with parent links, automatic pruning of emptied groups, and
//!   De Morgan inversion of any subtree.
//! - **Tag Analysis**: whether a tag is searched for on its own ("included") or
//!   ANDed into every group ("required"), for tag browsers to reflect.
//! - **SQL Compilation**: parenthesized conditions built through a `Dialect`,
//!   with photos carrying the hidden tag left out unless explicitly requested.
//! - **Free-Text Queries**: a parser for `beach and (sunset or not(people))`
//!   with localizable connectives.
//! - **Sessions**: a controller owning one tree and notifying observers of the
//!   new condition after every change.
//!
//! ## Usage
//!
//! ```rust
//! use photo_query::session::QuerySession;
//! use photo_query::tag::Tag;
//!
//! let beach = Tag::new(1, "beach");
//! let sunset = Tag::new(2, "sunset");
//!
//! let mut session = QuerySession::new().with_hidden_tag(Tag::new(99, "hidden"));
//! session.include(&[beach.clone()]);
//! session.require(&[sunset.clone()]);
//!
//! assert!(session.tag_required(&sunset));
//! let condition = session.condition().expect("query is not empty");
//! assert!(condition.contains("tag_id = 99"));
//! ```
//!
//! The tree itself is single-threaded and performs no synchronization; the
//! session (or whatever else owns the tree) serializes access to it.

pub mod config;
pub mod dialect;
pub mod operator;
pub mod parser;
pub mod query;
pub mod session;
pub mod tag;

pub mod prelude {
    pub use crate::config::QueryConfig;
    pub use crate::dialect::{CurrentDialect, Dialect, PostgresDialect, SqliteDialect};
    pub use crate::operator::OperatorTable;
    pub use crate::parser::{ParseError, ParseErrorKind, parse_query};
    pub use crate::query::{Combinator, TagRequirement, TermError, TermId, TermKind, TermTree};
    pub use crate::session::QuerySession;
    pub use crate::tag::{Tag, TagId};
}

//! Maps textual connectives to combinators.
//!
//! The free-text query parser splits input on connective tokens such as
//! `" and "`, `", "` or `" or "`. The accepted tokens are localizable, so they
//! come from an [`OperatorTable`] rather than being hard-coded.

use crate::query::{Combinator, TermError, TermId, TermTree};
use serde::Deserialize;
use tracing::debug;

/// Localized synonyms for each combinator, matched case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OperatorTable {
    #[serde(default = "default_and")]
    pub and: Vec<String>,

    #[serde(default = "default_or")]
    pub or: Vec<String>,
}

fn default_and() -> Vec<String> {
    vec![" and ".to_string(), ", ".to_string()]
}

fn default_or() -> Vec<String> {
    vec![" or ".to_string()]
}

impl Default for OperatorTable {
    fn default() -> Self {
        Self {
            and: default_and(),
            or: default_or(),
        }
    }
}

impl OperatorTable {
    /// Returns the combinator `token` stands for, or `None` if it is not a
    /// known connective.
    pub fn resolve(&self, token: &str) -> Option<Combinator> {
        let token = token.to_lowercase();
        let matches = |synonyms: &[String]| synonyms.iter().any(|s| s.to_lowercase() == token);

        if matches(&self.and) {
            Some(Combinator::And)
        } else if matches(&self.or) {
            Some(Combinator::Or)
        } else {
            None
        }
    }

    /// Every synonym of either combinator, longest first so that a scanner
    /// trying them in order never stops at a shorter prefix.
    pub fn tokens(&self) -> Vec<&str> {
        let mut tokens = self
            .and
            .iter()
            .chain(self.or.iter())
            .map(String::as_str)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();
        tokens.sort_by_key(|s| std::cmp::Reverse(s.len()));
        tokens
    }

    /// Creates the combinator `token` stands for under `parent` (after the
    /// sibling `after`, or at the end), or under no parent when `parent` is
    /// `None`.
    ///
    /// An unrecognized token is not an error: it yields `Ok(None)` so the
    /// caller can report a parse failure to the user.
    pub fn term_from_operator(
        &self,
        tree: &mut TermTree,
        token: &str,
        parent: Option<TermId>,
        after: Option<TermId>,
    ) -> Result<Option<TermId>, TermError> {
        let Some(combinator) = self.resolve(token) else {
            debug!(token, "no term for operator");
            return Ok(None);
        };

        let id = match parent {
            Some(parent) => tree.insert(parent, combinator, after)?,
            None => tree.create(combinator.into()),
        };

        Ok(Some(id))
    }
}

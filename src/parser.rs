//! # Query Parser Module
//!
//! This module turns a typed search such as `beach and (sunset or not(people))`
//! into a [`TermTree`]. It is the text-entry counterpart of building a tree by
//! hand through [`QuerySession`](crate::session::QuerySession).
//!
//! ## Supported Expressions
//!
//! - **Literal**: any run of text without parentheses or connectives. Each
//!   literal becomes an `Or` group holding a tag literal (when the lookup knows
//!   a tag of that name) and a text literal, so it matches both photos tagged
//!   with it and photos whose filename, uri or description contains it.
//! - **Negation**: `not(...)` around a literal or a whole sub-query.
//! - **Parentheses**: explicit grouping.
//! - **Connectives**: the AND/OR synonyms of an [`OperatorTable`]. Operator
//!   precedence is not guessed: one nesting level may use only one kind of
//!   connective, anything else must be parenthesized.
//!
//! ```rust
//! # use photo_query::operator::OperatorTable;
//! # use photo_query::parser::parse_query;
//! # use photo_query::query::TermKind;
//! # use photo_query::tag::Tag;
//! let lookup = |name: &str| (name == "beach").then(|| Tag::new(1, "beach"));
//! let tree = parse_query("beach and not(crowd)", &OperatorTable::default(), lookup).unwrap();
//!
//! assert_eq!(Some(&TermKind::And), tree.kind(tree.root()));
//! assert_eq!(2, tree.child_count(tree.root()));
//! ```

use crate::{
    operator::OperatorTable,
    query::{Combinator, TermError, TermId, TermKind, TermTree},
    tag::Tag,
};
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::tag_no_case,
    character::complete::{char, multispace0, multispace1},
    multi::many0,
    sequence::{delimited, preceded},
};
use thiserror::Error;
use tracing::debug;

// <query>   ::= <term> { <op> <term> }      -- one kind of <op> per level
// <term>    ::= "not" "(" <query> ")"
//             | "(" <query> ")"
//             | <literal>
// <literal> ::= text up to the next <op>, "(" or ")"
pub fn parse_query<F>(
    input: &str,
    operators: &OperatorTable,
    lookup: F,
) -> Result<TermTree, ParseError>
where
    F: Fn(&str) -> Option<Tag>,
{
    if input.trim().is_empty() {
        return Err(ParseError::new(ParseErrorKind::EmptyQuery, input));
    }
    if !parens_balanced(input) {
        return Err(ParseError::new(ParseErrorKind::UnbalancedParens, input));
    }

    let grammar = Grammar::new(operators);
    let (rest, expr) = grammar.query(input).map_err(|e| match e {
        nom::Err::Error(e) | nom::Err::Failure(e) => e,
        nom::Err::Incomplete(_) => ParseError::new(ParseErrorKind::UnexpectedToken, "<incomplete>"),
    })?;

    if !rest.trim().is_empty() {
        return Err(ParseError::new(ParseErrorKind::UnexpectedToken, rest));
    }

    let mut builder = Builder {
        tree: TermTree::new(Combinator::Or),
        operators,
        lookup,
    };
    let top = builder.build(None, &expr, false)?;
    builder.tree.replace_root(top)?;

    Ok(builder.tree)
}

fn parens_balanced(input: &str) -> bool {
    let mut depth = 0usize;
    for c in input.chars() {
        match c {
            '(' => depth += 1,
            ')' => match depth.checked_sub(1) {
                Some(d) => depth = d,
                None => return false,
            },
            _ => {}
        }
    }
    depth == 0
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Literal(String),
    Not(Box<Expr>),
    Group { op: String, items: Vec<Expr> },
}

struct Grammar<'a> {
    operators: &'a OperatorTable,
    tokens: Vec<&'a str>,
}

impl<'a> Grammar<'a> {
    fn new(operators: &'a OperatorTable) -> Self {
        Self {
            operators,
            tokens: operators.tokens(),
        }
    }

    fn query<'i>(&self, input: &'i str) -> IResult<&'i str, Expr, ParseError> {
        let (input, first) = self.term(input)?;
        let (input, rest) = many0((|i| self.op(i), |i| self.term(i))).parse(input)?;

        if rest.is_empty() {
            return Ok((input, first));
        }

        let op = rest[0].0;
        let combinator = self.operators.resolve(op);
        if rest.iter().any(|(o, _)| self.operators.resolve(o) != combinator) {
            return Err(nom::Err::Failure(ParseError::new(
                ParseErrorKind::AmbiguousOperator,
                input,
            )));
        }

        let items = std::iter::once(first)
            .chain(rest.into_iter().map(|(_, e)| e))
            .collect();

        Ok((
            input,
            Expr::Group {
                op: op.to_string(),
                items,
            },
        ))
    }

    fn term<'i>(&self, input: &'i str) -> IResult<&'i str, Expr, ParseError> {
        alt((|i| self.not_expr(i), |i| self.paren_expr(i), |i| self.literal(i))).parse(input)
    }

    fn not_expr<'i>(&self, input: &'i str) -> IResult<&'i str, Expr, ParseError> {
        preceded((multispace0, tag_no_case("not"), multispace0), |i| {
            self.paren_expr(i)
        })
        .parse(input)
        .map(|(i, e)| (i, Expr::Not(Box::new(e))))
    }

    fn paren_expr<'i>(&self, input: &'i str) -> IResult<&'i str, Expr, ParseError> {
        delimited(
            (multispace0, char('(')),
            |i| self.query(i),
            (multispace0, char(')')),
        )
        .parse(input)
    }

    fn literal<'i>(&self, input: &'i str) -> IResult<&'i str, Expr, ParseError> {
        let end = input
            .char_indices()
            .find(|(idx, c)| *c == '(' || *c == ')' || self.op(&input[*idx..]).is_ok())
            .map(|(idx, _)| idx)
            .unwrap_or(input.len());

        let text = input[..end].trim();
        if text.is_empty() {
            return Err(nom::Err::Error(ParseError::new(
                ParseErrorKind::UnexpectedToken,
                input,
            )));
        }

        Ok((&input[end..], Expr::Literal(text.to_string())))
    }

    /// Matches any configured connective. Whitespace at either end of a
    /// synonym means "at least one whitespace character" there.
    fn op<'i>(&self, input: &'i str) -> IResult<&'i str, &'a str, ParseError> {
        for token in &self.tokens {
            if let Ok((rest, ())) = Self::connective(input, token) {
                return Ok((rest, *token));
            }
        }

        Err(nom::Err::Error(ParseError::new(
            ParseErrorKind::UnexpectedToken,
            input,
        )))
    }

    fn connective<'i>(input: &'i str, token: &str) -> IResult<&'i str, (), ParseError> {
        let lead = token.starts_with(char::is_whitespace);
        let trail = token.ends_with(char::is_whitespace);

        (
            |i| whitespace(lead, i),
            tag_no_case(token.trim()),
            |i| whitespace(trail, i),
        )
            .parse(input)
            .map(|(rest, _)| (rest, ()))
    }
}

fn whitespace(required: bool, input: &str) -> IResult<&str, &str, ParseError> {
    if required {
        multispace1(input)
    } else {
        multispace0(input)
    }
}

struct Builder<'a, F> {
    tree: TermTree,
    operators: &'a OperatorTable,
    lookup: F,
}

impl<F> Builder<'_, F>
where
    F: Fn(&str) -> Option<Tag>,
{
    /// Adds `expr` under `parent` (or detached when `None`) and returns the
    /// id of the node representing it.
    fn build(
        &mut self,
        parent: Option<TermId>,
        expr: &Expr,
        negated: bool,
    ) -> Result<TermId, ParseError> {
        match expr {
            Expr::Not(inner) => self.build(parent, inner, !negated),
            Expr::Literal(text) => {
                let group = match parent {
                    Some(parent) => self.tree.insert(parent, Combinator::Or, None)?,
                    None => self.tree.create(TermKind::Or),
                };

                if let Some(tag) = (self.lookup)(text.as_str()) {
                    self.tree.insert(group, TermKind::Tag(tag), None)?;
                }
                self.tree.insert(group, TermKind::Text(text.clone()), None)?;

                if negated {
                    return Ok(self.tree.invert(group, true)?);
                }
                Ok(group)
            }
            Expr::Group { op, items } => {
                let group = self
                    .operators
                    .term_from_operator(&mut self.tree, op, parent, None)?
                    .ok_or_else(|| ParseError::new(ParseErrorKind::UnknownOperator, op))?;

                for item in items {
                    self.build(Some(group), item, negated)?;
                }

                if negated {
                    debug!(op = %op, "negating group");
                    return Ok(self.tree.invert(group, false)?);
                }
                Ok(group)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseErrorKind {
    #[error("unexpected token")]
    UnexpectedToken,

    #[error("unbalanced parentheses")]
    UnbalancedParens,

    #[error("ambiguous operator sequence, use parentheses to define evaluation order")]
    AmbiguousOperator,

    #[error("unknown operator")]
    UnknownOperator,

    #[error("empty query")]
    EmptyQuery,

    #[error(transparent)]
    Term(TermError),
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind} at {location:?}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub location: String,
}

impl ParseError {
    fn new<S: Into<String>>(kind: ParseErrorKind, location: S) -> Self {
        Self {
            kind,
            location: location.into(),
        }
    }
}

impl From<TermError> for ParseError {
    fn from(value: TermError) -> Self {
        ParseError::new(ParseErrorKind::Term(value), "")
    }
}

impl nom::error::ParseError<&str> for ParseError {
    fn from_error_kind(input: &str, _kind: nom::error::ErrorKind) -> Self {
        ParseError::new(ParseErrorKind::UnexpectedToken, input)
    }

    fn append(_input: &str, _kind: nom::error::ErrorKind, other: Self) -> Self {
        other
    }
}

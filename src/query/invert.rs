use super::{Node, TermError, TermId, TermTree};
use tracing::trace;

impl TermTree {
    /// Applies De Morgan's law to `term` and returns the id standing in its place.
    ///
    /// A literal only toggles its negation and keeps its id. A combinator is
    /// replaced by a fresh node of the opposite type, flagged as negated and
    /// placed at the same position under the same parent; its children move
    /// across unchanged, or are themselves inverted first when `recurse` is
    /// set. Callers must switch to the returned id: the old one is gone.
    ///
    /// Inverting `A and (B or C)` with `recurse` yields
    /// `not A or (not B and not C)`.
    pub fn invert(&mut self, term: TermId, recurse: bool) -> Result<TermId, TermError> {
        let node = self.node_mut(term)?;
        let Some(combinator) = node.kind.combinator() else {
            node.negated = !node.negated;
            return Ok(term);
        };

        let parent = node.parent;
        let replacement = self.alloc(Node {
            kind: combinator.inverse().into(),
            parent,
            children: vec![],
            negated: false,
        });

        if let Some(parent) = parent.and_then(|p| self.get_mut(p)) {
            if let Some(slot) = parent.children.iter_mut().find(|c| **c == term) {
                *slot = replacement;
            }
        }

        self.copy_and_invert_children(term, replacement, recurse)?;

        if let Some(slot) = self.nodes.get_mut(term.0) {
            *slot = None;
        }
        if self.root == term {
            self.root = replacement;
        }

        trace!(from = %term, to = %replacement, recurse, "inverted term");
        Ok(replacement)
    }

    /// Moves every child of `from` under `to`, inverting each one first when
    /// `recurse` is set, and flags `to` as negated.
    fn copy_and_invert_children(
        &mut self,
        from: TermId,
        to: TermId,
        recurse: bool,
    ) -> Result<(), TermError> {
        self.node_mut(to)?.negated = true;
        let moved = std::mem::take(&mut self.node_mut(from)?.children);

        for child in moved {
            // `from` no longer lists the child, so a recursive inversion
            // cannot touch it and leaves the replacement for us to attach.
            let child = if recurse {
                self.invert(child, true)?
            } else {
                child
            };

            self.node_mut(child)?.parent = Some(to);
            self.node_mut(to)?.children.push(child);
        }

        Ok(())
    }
}

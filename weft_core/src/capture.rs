//! Capture-group metadata.
//!
//! Captures are numbered left to right by opening order; index 0 is the
//! implicit whole-match capture. The parser normally builds the list while
//! converting syntax, but [`CaptureList::from_tree`] derives it directly from
//! a pattern tree for callers that only have the tree.

use crate::pattern::Node;
use std::sync::Arc;

/// Metadata for one capture group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureEntry {
    /// The group name, if the capture is named.
    pub name: Option<Arc<str>>,
}

/// The ordered list of captures in a pattern, whole-match first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureList {
    entries: Vec<CaptureEntry>,
}

impl CaptureList {
    /// A list containing only the implicit whole-match capture.
    #[must_use]
    pub fn whole_match() -> Self {
        Self {
            entries: vec![CaptureEntry::default()],
        }
    }

    /// Append a capture, returning its index.
    pub fn push(&mut self, name: Option<Arc<str>>) -> u16 {
        let index = self.entries.len() as u16;
        self.entries.push(CaptureEntry { name });
        index
    }

    /// Number of captures, including the whole match.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the list is empty. A well-formed list never is.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entry at `index`.
    #[must_use]
    pub fn entry(&self, index: usize) -> Option<&CaptureEntry> {
        self.entries.get(index)
    }

    /// Iterate over the entries, whole-match first.
    pub fn iter(&self) -> impl Iterator<Item = &CaptureEntry> {
        self.entries.iter()
    }

    /// Resolve a capture name to its index.
    #[must_use]
    pub fn index_of_name(&self, name: &str) -> Option<u16> {
        self.entries
            .iter()
            .position(|entry| entry.name.as_deref() == Some(name))
            .map(|index| index as u16)
    }

    /// Derive the capture list of a pattern tree.
    ///
    /// Visits `Capture` nodes in opening (pre-)order, matching the numbering
    /// the code generator assigns.
    #[must_use]
    pub fn from_tree(root: &Node) -> Self {
        let mut list = Self::whole_match();
        collect(root, &mut list);
        list
    }
}

fn collect(node: &Node, list: &mut CaptureList) {
    match node {
        Node::Concatenation(children) | Node::OrderedChoice(children) => {
            for child in children {
                collect(child, list);
            }
        }
        Node::Capture { name, child, .. } => {
            list.push(name.clone());
            collect(child, list);
        }
        Node::NonCapturingGroup { child, .. } | Node::Quantification { child, .. } => {
            collect(child, list);
        }
        Node::Atom(_)
        | Node::CustomCharacterClass(_)
        | Node::QuotedLiteral(_)
        | Node::Matcher(_)
        | Node::Trivia
        | Node::Empty => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::Atom;

    fn capture(name: Option<&str>, child: Node) -> Node {
        Node::Capture {
            name: name.map(Arc::from),
            reference: None,
            child: Box::new(child),
            transform: None,
        }
    }

    #[test]
    fn test_whole_match_only() {
        let list = CaptureList::from_tree(&Node::Atom(Atom::Char('a')));
        assert_eq!(list.len(), 1);
        assert!(list.entry(0).unwrap().name.is_none());
    }

    #[test]
    fn test_opening_order_numbering() {
        // (a(b))(c) numbers outer-left first, then its nested child.
        let tree = Node::Concatenation(vec![
            capture(
                Some("outer"),
                Node::Concatenation(vec![
                    Node::Atom(Atom::Char('a')),
                    capture(Some("inner"), Node::Atom(Atom::Char('b'))),
                ]),
            ),
            capture(Some("last"), Node::Atom(Atom::Char('c'))),
        ]);
        let list = CaptureList::from_tree(&tree);
        assert_eq!(list.len(), 4);
        assert_eq!(list.index_of_name("outer"), Some(1));
        assert_eq!(list.index_of_name("inner"), Some(2));
        assert_eq!(list.index_of_name("last"), Some(3));
        assert_eq!(list.index_of_name("missing"), None);
    }

    #[test]
    fn test_captures_inside_quantifiers_and_groups() {
        let tree = Node::Quantification {
            low: 0,
            high: None,
            kind: crate::pattern::QuantificationKind::Eager,
            child: Box::new(Node::NonCapturingGroup {
                kind: crate::pattern::GroupKind::Plain,
                child: Box::new(capture(None, Node::Atom(Atom::Char('x')))),
            }),
        };
        assert_eq!(CaptureList::from_tree(&tree).len(), 2);
    }

    #[test]
    fn test_push_returns_index() {
        let mut list = CaptureList::whole_match();
        assert_eq!(list.push(None), 1);
        assert_eq!(list.push(Some(Arc::from("n"))), 2);
        assert_eq!(list.index_of_name("n"), Some(2));
    }
}

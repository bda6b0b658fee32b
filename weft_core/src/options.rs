//! Matching options and their lexical scoping.
//!
//! Options are tracked as a stack of flag sets. Entering a group pushes a
//! scope, leaving it pops the scope, and `(?i)`-style option-change sequences
//! mutate the top of the stack only. Writes inside a scope never leak out.
//!
//! The compiler additionally tracks *initial options* on the side: option
//! changes that occur before the first matchable atom take effect at match
//! start regardless of scoping.

use crate::pattern::QuantificationKind;
use smallvec::{smallvec, SmallVec};

bitflags::bitflags! {
    /// A set of matching options, as carried by one scope level.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct OptionFlags: u32 {
        /// Letters match without regard to case.
        const CASE_INSENSITIVE = 1 << 0;
        /// `.` also matches newline characters.
        const DOT_MATCHES_NEWLINE = 1 << 1;
        /// `^` / `$` anchors match at internal line boundaries.
        const ANCHORS_MATCH_NEWLINES = 1 << 2;
        /// Match at Unicode-scalar granularity instead of grapheme clusters.
        const UNICODE_SCALAR_SEMANTICS = 1 << 3;
        /// Bare quantifiers are reluctant.
        const RELUCTANT_BY_DEFAULT = 1 << 4;
        /// Bare quantifiers are possessive.
        const POSSESSIVE_BY_DEFAULT = 1 << 5;
        /// Word boundaries use the simple (non-default-Unicode) rules.
        const SIMPLE_UNICODE_BOUNDARIES = 1 << 6;
        /// `\w` and word boundaries consider ASCII word characters only.
        const ASCII_WORD = 1 << 7;
    }
}

/// The granularity at which the subject is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SemanticLevel {
    /// One element is an extended grapheme cluster.
    GraphemeCluster,
    /// One element is a Unicode scalar value.
    UnicodeScalar,
}

/// A single option directive, as written in `(?i)`, `(?-s)`, etc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchOption {
    /// `i`
    CaseInsensitive,
    /// `s`
    DotMatchesNewline,
    /// `m`
    AnchorsMatchNewlines,
    /// Grapheme-cluster semantics (the default level).
    GraphemeClusterSemantics,
    /// Unicode-scalar semantics.
    UnicodeScalarSemantics,
    /// `U`: bare quantifiers become reluctant.
    ReluctantByDefault,
    /// Bare quantifiers become possessive.
    PossessiveByDefault,
    /// `b`: simple word boundaries.
    SimpleUnicodeBoundaries,
    /// `w`: ASCII-only word characters.
    AsciiWord,
}

/// An option-change sequence: the removals apply first, then the additions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchingOptionSequence {
    /// Options switched on.
    pub adding: Vec<MatchOption>,
    /// Options switched off.
    pub removing: Vec<MatchOption>,
}

impl MatchingOptionSequence {
    /// A sequence that only adds options.
    #[must_use]
    pub fn adding(options: impl IntoIterator<Item = MatchOption>) -> Self {
        Self {
            adding: options.into_iter().collect(),
            removing: Vec::new(),
        }
    }

    /// A sequence that only removes options.
    #[must_use]
    pub fn removing(options: impl IntoIterator<Item = MatchOption>) -> Self {
        Self {
            adding: Vec::new(),
            removing: options.into_iter().collect(),
        }
    }
}

impl OptionFlags {
    /// Return these flags with an option-change sequence applied.
    #[must_use]
    pub fn applying(mut self, seq: &MatchingOptionSequence) -> Self {
        for &opt in &seq.removing {
            self.apply_one(opt, false);
        }
        for &opt in &seq.adding {
            self.apply_one(opt, true);
        }
        self
    }

    fn apply_one(&mut self, opt: MatchOption, on: bool) {
        match opt {
            MatchOption::CaseInsensitive => self.set(Self::CASE_INSENSITIVE, on),
            MatchOption::DotMatchesNewline => self.set(Self::DOT_MATCHES_NEWLINE, on),
            MatchOption::AnchorsMatchNewlines => self.set(Self::ANCHORS_MATCH_NEWLINES, on),
            // Grapheme semantics is the absence of the scalar flag; removing
            // the default level is a no-op.
            MatchOption::GraphemeClusterSemantics => {
                if on {
                    self.remove(Self::UNICODE_SCALAR_SEMANTICS);
                }
            }
            MatchOption::UnicodeScalarSemantics => self.set(Self::UNICODE_SCALAR_SEMANTICS, on),
            MatchOption::ReluctantByDefault => {
                self.set(Self::RELUCTANT_BY_DEFAULT, on);
                if on {
                    self.remove(Self::POSSESSIVE_BY_DEFAULT);
                }
            }
            MatchOption::PossessiveByDefault => {
                self.set(Self::POSSESSIVE_BY_DEFAULT, on);
                if on {
                    self.remove(Self::RELUCTANT_BY_DEFAULT);
                }
            }
            MatchOption::SimpleUnicodeBoundaries => {
                self.set(Self::SIMPLE_UNICODE_BOUNDARIES, on)
            }
            MatchOption::AsciiWord => self.set(Self::ASCII_WORD, on),
        }
    }

    /// Whether letters match case-insensitively.
    #[inline]
    #[must_use]
    pub fn is_case_insensitive(self) -> bool {
        self.contains(Self::CASE_INSENSITIVE)
    }

    /// Whether `.` matches newlines.
    #[inline]
    #[must_use]
    pub fn dot_matches_newline(self) -> bool {
        self.contains(Self::DOT_MATCHES_NEWLINE)
    }

    /// Whether `^` / `$` match at internal line boundaries.
    #[inline]
    #[must_use]
    pub fn anchors_match_newlines(self) -> bool {
        self.contains(Self::ANCHORS_MATCH_NEWLINES)
    }

    /// The current matching granularity.
    #[inline]
    #[must_use]
    pub fn semantic_level(self) -> SemanticLevel {
        if self.contains(Self::UNICODE_SCALAR_SEMANTICS) {
            SemanticLevel::UnicodeScalar
        } else {
            SemanticLevel::GraphemeCluster
        }
    }

    /// The quantification kind a bare quantifier resolves to.
    #[inline]
    #[must_use]
    pub fn default_quantification(self) -> QuantificationKind {
        if self.contains(Self::RELUCTANT_BY_DEFAULT) {
            QuantificationKind::Reluctant
        } else if self.contains(Self::POSSESSIVE_BY_DEFAULT) {
            QuantificationKind::Possessive
        } else {
            QuantificationKind::Eager
        }
    }

    /// Whether word boundaries use the simple rules.
    #[inline]
    #[must_use]
    pub fn uses_simple_unicode_boundaries(self) -> bool {
        self.contains(Self::SIMPLE_UNICODE_BOUNDARIES)
    }

    /// Whether word characters are restricted to ASCII.
    #[inline]
    #[must_use]
    pub fn uses_ascii_word(self) -> bool {
        self.contains(Self::ASCII_WORD)
    }
}

/// The scoped option state consulted during code generation.
///
/// The stack is never empty; the bottom entry holds the options the
/// compilation started with.
#[derive(Debug, Clone)]
pub struct MatchingOptions {
    stack: SmallVec<[OptionFlags; 4]>,
}

impl MatchingOptions {
    /// Create an option stack seeded with the given flags.
    #[must_use]
    pub fn new(initial: OptionFlags) -> Self {
        Self {
            stack: smallvec![initial],
        }
    }

    /// Enter a group scope. Must be balanced by [`end_scope`](Self::end_scope).
    pub fn begin_scope(&mut self) {
        let top = self.current();
        self.stack.push(top);
    }

    /// Leave the innermost group scope, discarding its option writes.
    pub fn end_scope(&mut self) {
        debug_assert!(self.stack.len() > 1, "unbalanced option scope");
        self.stack.pop();
    }

    /// The options in effect at the current point of generation.
    #[inline]
    #[must_use]
    pub fn current(&self) -> OptionFlags {
        *self.stack.last().expect("options stack is never empty")
    }

    /// Apply an option-change sequence to the innermost scope.
    pub fn apply(&mut self, seq: &MatchingOptionSequence) {
        let top = self.stack.last_mut().expect("options stack is never empty");
        *top = top.applying(seq);
    }
}

impl Default for MatchingOptions {
    fn default() -> Self {
        Self::new(OptionFlags::empty())
    }
}

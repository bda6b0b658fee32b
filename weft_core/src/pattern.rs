//! The intermediate pattern tree consumed by the bytecode compiler.
//!
//! The surface parser lowers regex syntax (or a builder DSL) into this tree;
//! the compiler walks it once, depth-first, and emits bytecode. The tree is
//! deliberately small: every variant here has a defined lowering, and
//! constructs the backend does not implement are either unrepresentable or
//! carried as [`Atom::Unconverted`] so compilation can fail with a name.

use crate::chars;
use crate::options::MatchingOptionSequence;
use std::any::Any;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

/// Identifier used to tie a [`Node::Capture`] to symbolic references.
pub type ReferenceId = u32;

/// A value produced by a custom matcher function.
pub type MatchedValue = Arc<dyn Any + Send + Sync>;

/// A custom consumer: given the subject and the remaining search bounds,
/// returns the position after the consumed input, or `None` on failure.
pub type ConsumeFn = Arc<dyn Fn(&str, Range<usize>) -> Option<usize> + Send + Sync>;

/// A custom zero-width assertion over the subject and a position.
pub type AssertionFn = Arc<dyn Fn(&str, usize) -> bool + Send + Sync>;

/// A post-match capture transform over the captured substring.
pub type TransformFn = Arc<dyn Fn(&str) -> Option<Arc<str>> + Send + Sync>;

/// A custom matcher: given the subject and a start position, returns the end
/// position and a produced value, or `None` on failure.
pub type MatcherFn =
    Arc<dyn Fn(&str, usize) -> Option<(usize, MatchedValue)> + Send + Sync>;

/// A node of the pattern tree.
#[derive(Clone)]
pub enum Node {
    /// An ordered sequence of children, matched one after another.
    Concatenation(Vec<Node>),
    /// Ordered alternation: earlier children are preferred.
    OrderedChoice(Vec<Node>),
    /// A numbered (and optionally named) capture group.
    Capture {
        /// Group name, if any.
        name: Option<Arc<str>>,
        /// Identifier that symbolic references resolve against.
        reference: Option<ReferenceId>,
        /// The captured subpattern.
        child: Box<Node>,
        /// Post-match transform applied to the captured value.
        transform: Option<TransformFn>,
    },
    /// A group that does not capture.
    NonCapturingGroup {
        /// What flavor of group this is.
        kind: GroupKind,
        /// The grouped subpattern.
        child: Box<Node>,
    },
    /// Repetition of a subpattern.
    Quantification {
        /// Minimum number of trips.
        low: u32,
        /// Maximum number of trips; `None` means unbounded.
        high: Option<u32>,
        /// Greediness mode.
        kind: QuantificationKind,
        /// The repeated subpattern.
        child: Box<Node>,
    },
    /// A single atom.
    Atom(Atom),
    /// A bracketed character class.
    CustomCharacterClass(CharacterClass),
    /// A literal string, matched verbatim.
    QuotedLiteral(Arc<str>),
    /// A custom matcher function producing a value.
    Matcher(MatcherFn),
    /// Non-semantic syntax (comments, ignored whitespace).
    Trivia,
    /// The empty pattern.
    Empty,
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Concatenation(children) => {
                f.debug_tuple("Concatenation").field(children).finish()
            }
            Self::OrderedChoice(children) => {
                f.debug_tuple("OrderedChoice").field(children).finish()
            }
            Self::Capture {
                name,
                reference,
                child,
                transform,
            } => f
                .debug_struct("Capture")
                .field("name", name)
                .field("reference", reference)
                .field("child", child)
                .field("transform", &transform.as_ref().map(|_| ".."))
                .finish(),
            Self::NonCapturingGroup { kind, child } => f
                .debug_struct("NonCapturingGroup")
                .field("kind", kind)
                .field("child", child)
                .finish(),
            Self::Quantification {
                low,
                high,
                kind,
                child,
            } => f
                .debug_struct("Quantification")
                .field("low", low)
                .field("high", high)
                .field("kind", kind)
                .field("child", child)
                .finish(),
            Self::Atom(atom) => f.debug_tuple("Atom").field(atom).finish(),
            Self::CustomCharacterClass(ccc) => {
                f.debug_tuple("CustomCharacterClass").field(ccc).finish()
            }
            Self::QuotedLiteral(s) => f.debug_tuple("QuotedLiteral").field(s).finish(),
            Self::Matcher(_) => f.write_str("Matcher(..)"),
            Self::Trivia => f.write_str("Trivia"),
            Self::Empty => f.write_str("Empty"),
        }
    }
}

/// The flavor of a non-capturing group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupKind {
    /// `(?:...)`
    Plain,
    /// `(?>...)` - a successful match is committed.
    Atomic,
    /// `(?=...)`
    Lookahead,
    /// `(?!...)`
    NegativeLookahead,
    /// `(?<=...)`
    Lookbehind,
    /// `(?<!...)`
    NegativeLookbehind,
    /// `(?i:...)` and friends: options scoped to the group body.
    ChangeMatchingOptions(MatchingOptionSequence),
}

/// Greediness of a quantifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuantificationKind {
    /// Match as much as possible, giving back on backtracking.
    Eager,
    /// Match as little as possible, taking more on backtracking.
    Reluctant,
    /// Match as much as possible and never give it back.
    Possessive,
    /// Resolved from the scope's default-quantification option.
    Default,
}

/// The target of an explicit backreference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// `\1`, `\2`, ... - absolute capture number.
    Index(u32),
    /// `\k<name>` - a named capture.
    Named(Arc<str>),
    /// `\k<-1>` - relative to the reference site.
    Relative(i32),
    /// `(?R)` - recurse the whole pattern.
    RecurseWholePattern,
}

/// Zero-width assertion kinds.
///
/// Source-level `^` / `$` lower to [`CaretAnchor`](Self::CaretAnchor) and
/// [`DollarAnchor`](Self::DollarAnchor), which honor the
/// anchors-match-newlines option. [`StartOfLine`](Self::StartOfLine) and
/// [`EndOfLine`](Self::EndOfLine) always match at line boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssertionKind {
    /// `\A`: the absolute start of the subject.
    StartOfSubject,
    /// `\z`: the absolute end of the subject.
    EndOfSubject,
    /// `\Z`: the end of the subject, or just before a final newline.
    EndOfSubjectBeforeNewline,
    /// `\G`: the position where the current search began.
    FirstMatchingPositionInSubject,
    /// Start of a line, regardless of options.
    StartOfLine,
    /// End of a line, regardless of options.
    EndOfLine,
    /// `^`: subject start, or a line start when anchors match newlines.
    CaretAnchor,
    /// `$`: subject end, or a line end when anchors match newlines.
    DollarAnchor,
    /// `\b`
    WordBoundary,
    /// `\B`
    NotWordBoundary,
    /// `\y`: a grapheme-cluster boundary.
    TextSegmentBoundary,
    /// `\Y`
    NotTextSegmentBoundary,
    /// `\K`: reset the reported match start.
    ResetStartOfMatch,
}

/// A single unit of the pattern.
#[derive(Debug, Clone)]
pub enum Atom {
    /// Match any element unconditionally.
    Any,
    /// Match any element except a newline.
    AnyNonNewline,
    /// `.` - behavior depends on the dot-matches-newline option.
    Dot,
    /// A literal character.
    Char(char),
    /// An explicit Unicode scalar literal (`\u{...}`).
    Scalar(char),
    /// A builtin character class (`\d`, `\w`, ...).
    CharacterClass(BuiltinClass),
    /// A zero-width assertion.
    Assertion(AssertionKind),
    /// An explicit backreference.
    Backreference(Reference),
    /// A reference resolved against a capture's [`ReferenceId`].
    SymbolicReference(ReferenceId),
    /// An inline option change, e.g. `(?i)`.
    ChangeMatchingOptions(MatchingOptionSequence),
    /// A surface construct the converter kept by name; always unsupported.
    Unconverted(Arc<str>),
}

impl Atom {
    /// Whether this atom consumes or asserts on input.
    ///
    /// Option changes are directives to the compiler, not matchers.
    #[must_use]
    pub fn is_matchable(&self) -> bool {
        !matches!(self, Self::ChangeMatchingOptions(_))
    }
}

/// The shape of a builtin character class, without polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassKind {
    /// Any single grapheme cluster, including newlines.
    AnyGrapheme,
    /// `\d`
    Digit,
    /// `\h`
    HorizontalWhitespace,
    /// `\R`: a newline sequence (may span `\r\n`).
    NewlineSequence,
    /// `\v`
    VerticalWhitespace,
    /// `\s`
    Whitespace,
    /// `\w`
    Word,
}

/// A builtin character class with polarity, e.g. `\d` or `\D`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BuiltinClass {
    /// The class shape.
    pub kind: ClassKind,
    /// Whether the class is negated.
    pub inverted: bool,
}

impl BuiltinClass {
    /// Create a positive class.
    #[must_use]
    pub const fn new(kind: ClassKind) -> Self {
        Self {
            kind,
            inverted: false,
        }
    }

    /// Create a negated class.
    #[must_use]
    pub const fn inverted(kind: ClassKind) -> Self {
        Self {
            kind,
            inverted: true,
        }
    }

    /// Whether a single character belongs to the class.
    ///
    /// `strict_ascii` restricts membership to the ASCII subset.
    #[must_use]
    pub fn matches(&self, c: char, strict_ascii: bool) -> bool {
        let base = match self.kind {
            ClassKind::AnyGrapheme => true,
            ClassKind::Digit => {
                if strict_ascii {
                    c.is_ascii_digit()
                } else {
                    c.is_numeric()
                }
            }
            ClassKind::HorizontalWhitespace => chars::is_horizontal_whitespace(c),
            ClassKind::NewlineSequence | ClassKind::VerticalWhitespace => {
                chars::is_vertical_whitespace(c)
            }
            ClassKind::Whitespace => {
                if strict_ascii {
                    c.is_ascii_whitespace()
                } else {
                    c.is_whitespace()
                }
            }
            ClassKind::Word => {
                if strict_ascii {
                    c.is_ascii_alphanumeric() || c == '_'
                } else {
                    chars::is_word_char(c)
                }
            }
        };
        base != self.inverted
    }

    /// Whether one match of the class consumes exactly one grapheme cluster.
    ///
    /// A newline sequence may consume a `\r\n` pair, so it is excluded from
    /// the tight-loop quantifier specialization.
    #[must_use]
    pub const fn consumes_single_grapheme(&self) -> bool {
        !matches!(self.kind, ClassKind::NewlineSequence)
    }
}

/// One member of a bracketed character class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassMember {
    /// A single character.
    Char(char),
    /// An inclusive character range.
    Range(char, char),
    /// A builtin class nested in the brackets, e.g. `[\d-]`.
    Builtin(BuiltinClass),
    /// The "any character" member, e.g. a DSL-level `.` inside brackets.
    Any,
}

/// A bracketed character class: a set of members plus an inversion flag.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CharacterClass {
    /// The members of the class.
    pub members: Vec<ClassMember>,
    /// Whether membership is negated.
    pub inverted: bool,
}

impl CharacterClass {
    /// A class containing the given members.
    #[must_use]
    pub fn of(members: impl IntoIterator<Item = ClassMember>) -> Self {
        Self {
            members: members.into_iter().collect(),
            inverted: false,
        }
    }

    /// The negation of this class.
    #[must_use]
    pub fn negated(mut self) -> Self {
        self.inverted = !self.inverted;
        self
    }

    /// Whether the class is exactly a non-inverted "any" member.
    #[must_use]
    pub fn is_plain_any(&self) -> bool {
        !self.inverted && matches!(self.members.as_slice(), [ClassMember::Any])
    }

    /// Whether the class is an inverted "any" member, which matches nothing.
    #[must_use]
    pub fn is_inverted_any(&self) -> bool {
        self.inverted && matches!(self.members.as_slice(), [ClassMember::Any])
    }

    /// Whether a character is in the class.
    #[must_use]
    pub fn matches(&self, c: char, case_insensitive: bool) -> bool {
        let hit = self
            .members
            .iter()
            .any(|m| Self::member_matches(m, c, case_insensitive));
        hit != self.inverted
    }

    fn member_matches(member: &ClassMember, c: char, case_insensitive: bool) -> bool {
        match member {
            ClassMember::Any => true,
            ClassMember::Char(m) => {
                c == *m || (case_insensitive && c.to_lowercase().eq(m.to_lowercase()))
            }
            ClassMember::Range(lo, hi) => {
                if (*lo..=*hi).contains(&c) {
                    return true;
                }
                case_insensitive
                    && simple_case_swap(c).is_some_and(|swapped| (*lo..=*hi).contains(&swapped))
            }
            ClassMember::Builtin(builtin) => builtin.matches(c, false),
        }
    }

    /// Convert the class to a 128-bit ASCII bitset, if every member is an
    /// ASCII character or range. Builtin and "any" members are not
    /// convertible.
    #[must_use]
    pub fn ascii_bitset(&self, case_insensitive: bool) -> Option<AsciiBitset> {
        let mut bitset = AsciiBitset::new(self.inverted);
        for member in &self.members {
            let ok = match member {
                ClassMember::Char(c) => bitset.add_char(*c, case_insensitive),
                ClassMember::Range(lo, hi) => bitset.add_range(*lo, *hi, case_insensitive),
                ClassMember::Builtin(_) | ClassMember::Any => false,
            };
            if !ok {
                return None;
            }
        }
        Some(bitset)
    }
}

/// The single-character case counterpart, when the mapping is 1:1.
fn simple_case_swap(c: char) -> Option<char> {
    if c.is_lowercase() {
        let mut upper = c.to_uppercase();
        match (upper.next(), upper.next()) {
            (Some(u), None) => Some(u),
            _ => None,
        }
    } else if c.is_uppercase() {
        let mut lower = c.to_lowercase();
        match (lower.next(), lower.next()) {
            (Some(l), None) => Some(l),
            _ => None,
        }
    } else {
        None
    }
}

/// A 128-bit membership table over the ASCII range.
///
/// When inverted, characters outside ASCII are considered members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AsciiBitset {
    bits: [u64; 2],
    inverted: bool,
}

impl AsciiBitset {
    /// An empty bitset with the given polarity.
    #[must_use]
    pub const fn new(inverted: bool) -> Self {
        Self {
            bits: [0; 2],
            inverted,
        }
    }

    #[inline]
    fn set(&mut self, byte: u8) {
        debug_assert!(byte < 128);
        self.bits[(byte >> 6) as usize] |= 1 << (byte & 63);
    }

    #[inline]
    fn get(&self, byte: u8) -> bool {
        self.bits[(byte >> 6) as usize] & (1 << (byte & 63)) != 0
    }

    /// Add a character; fails if it is not ASCII.
    pub fn add_char(&mut self, c: char, case_insensitive: bool) -> bool {
        if !c.is_ascii() {
            return false;
        }
        self.set(c as u8);
        if case_insensitive && c.is_ascii_alphabetic() {
            self.set((c as u8) ^ 0x20);
        }
        true
    }

    /// Add an inclusive range; fails unless both ends are ASCII and ordered.
    pub fn add_range(&mut self, lo: char, hi: char, case_insensitive: bool) -> bool {
        if !lo.is_ascii() || !hi.is_ascii() || lo > hi {
            return false;
        }
        for byte in (lo as u8)..=(hi as u8) {
            self.set(byte);
            if case_insensitive && byte.is_ascii_alphabetic() {
                self.set(byte ^ 0x20);
            }
        }
        true
    }

    /// Whether the bitset is negated.
    #[inline]
    #[must_use]
    pub const fn is_inverted(&self) -> bool {
        self.inverted
    }

    /// Whether a character is a member.
    #[inline]
    #[must_use]
    pub fn matches(&self, c: char) -> bool {
        if c.is_ascii() {
            self.get(c as u8) != self.inverted
        } else {
            self.inverted
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::MatchOption;

    #[test]
    fn test_option_change_is_not_matchable() {
        let seq = MatchingOptionSequence::adding([MatchOption::CaseInsensitive]);
        assert!(!Atom::ChangeMatchingOptions(seq).is_matchable());
        assert!(Atom::Char('a').is_matchable());
        assert!(Atom::Assertion(AssertionKind::WordBoundary).is_matchable());
    }

    #[test]
    fn test_builtin_class_polarity() {
        let digit = BuiltinClass::new(ClassKind::Digit);
        let not_digit = BuiltinClass::inverted(ClassKind::Digit);
        assert!(digit.matches('7', false));
        assert!(!digit.matches('x', false));
        assert!(not_digit.matches('x', false));
        assert!(!not_digit.matches('7', false));
    }

    #[test]
    fn test_builtin_class_strict_ascii() {
        let word = BuiltinClass::new(ClassKind::Word);
        assert!(word.matches('ü', false));
        assert!(!word.matches('ü', true));
        assert!(word.matches('_', true));
    }

    #[test]
    fn test_character_class_matching() {
        let ccc = CharacterClass::of([
            ClassMember::Char('x'),
            ClassMember::Range('0', '9'),
            ClassMember::Builtin(BuiltinClass::new(ClassKind::Whitespace)),
        ]);
        assert!(ccc.matches('x', false));
        assert!(ccc.matches('5', false));
        assert!(ccc.matches(' ', false));
        assert!(!ccc.matches('y', false));
        assert!(ccc.matches('X', true));

        let negated = ccc.negated();
        assert!(negated.matches('y', false));
        assert!(!negated.matches('5', false));
    }

    #[test]
    fn test_ascii_bitset_conversion() {
        let ccc = CharacterClass::of([ClassMember::Char('a'), ClassMember::Range('0', '3')]);
        let bitset = ccc.ascii_bitset(false).expect("all-ASCII class");
        assert!(bitset.matches('a'));
        assert!(bitset.matches('2'));
        assert!(!bitset.matches('A'));
        assert!(!bitset.matches('9'));
        assert!(!bitset.matches('é'));
    }

    #[test]
    fn test_ascii_bitset_case_insensitive() {
        let ccc = CharacterClass::of([ClassMember::Range('a', 'f')]);
        let bitset = ccc.ascii_bitset(true).expect("all-ASCII class");
        assert!(bitset.matches('c'));
        assert!(bitset.matches('C'));
        assert!(!bitset.matches('g'));
    }

    #[test]
    fn test_ascii_bitset_inverted_matches_non_ascii() {
        let bitset = CharacterClass::of([ClassMember::Char('a')])
            .negated()
            .ascii_bitset(false)
            .expect("all-ASCII class");
        assert!(!bitset.matches('a'));
        assert!(bitset.matches('b'));
        assert!(bitset.matches('é'));
    }

    #[test]
    fn test_non_ascii_class_is_not_bitset_convertible() {
        let ccc = CharacterClass::of([ClassMember::Char('é')]);
        assert!(ccc.ascii_bitset(false).is_none());

        let with_builtin =
            CharacterClass::of([ClassMember::Builtin(BuiltinClass::new(ClassKind::Digit))]);
        assert!(with_builtin.ascii_bitset(false).is_none());
    }

    #[test]
    fn test_plain_any_detection() {
        let any = CharacterClass::of([ClassMember::Any]);
        assert!(any.is_plain_any());
        assert!(!any.is_inverted_any());
        assert!(any.clone().negated().is_inverted_any());

        let mixed = CharacterClass::of([ClassMember::Any, ClassMember::Char('a')]);
        assert!(!mixed.is_plain_any());
    }

    #[test]
    fn test_node_debug_hides_functions() {
        let node = Node::Capture {
            name: None,
            reference: None,
            child: Box::new(Node::Matcher(Arc::new(|_, _| None))),
            transform: Some(Arc::new(|s| Some(Arc::from(s)))),
        };
        let rendered = format!("{node:?}");
        assert!(rendered.contains("Capture"));
        assert!(rendered.contains("Matcher(..)"));
    }
}

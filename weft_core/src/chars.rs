//! Small character predicates shared by the compiler and generated consumers.
//!
//! These are the classifications the instruction set needs at compile time.
//! Full Unicode property lookups and grapheme segmentation are the matching
//! engine's responsibility.

/// Whether a character participates in case conversion.
#[inline]
#[must_use]
pub fn is_cased(c: char) -> bool {
    c.is_lowercase() || c.is_uppercase()
}

/// Whether a character terminates a line.
///
/// Matches the recommended newline set: LF, VT, FF, CR, NEL, LS, PS.
#[inline]
#[must_use]
pub fn is_newline(c: char) -> bool {
    matches!(
        c,
        '\n' | '\u{0B}' | '\u{0C}' | '\r' | '\u{85}' | '\u{2028}' | '\u{2029}'
    )
}

/// Whether a character is horizontal whitespace (`\h`).
#[inline]
#[must_use]
pub fn is_horizontal_whitespace(c: char) -> bool {
    matches!(
        c,
        '\t' | ' '
            | '\u{A0}'
            | '\u{1680}'
            | '\u{2000}'..='\u{200A}'
            | '\u{202F}'
            | '\u{205F}'
            | '\u{3000}'
    )
}

/// Whether a character is vertical whitespace (`\v`).
#[inline]
#[must_use]
pub fn is_vertical_whitespace(c: char) -> bool {
    is_newline(c)
}

/// Whether a character belongs to the `\w` class.
#[inline]
#[must_use]
pub fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

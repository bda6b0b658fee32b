//! 64-bit bytecode instruction definitions.
//!
//! Every instruction is one 64-bit word: an 8-bit encoded opcode in the top
//! byte and a 56-bit opcode-specific payload below it.
//!
//! # Instruction format
//!
//! ```text
//! ┌──────────┬──────────────────────────────────┐
//! │  opcode  │             payload              │
//! │  (8 bit) │             (56 bit)             │
//! └──────────┴──────────────────────────────────┘
//! ```
//!
//! # Opcode encoding
//!
//! The encoded opcode byte carries a category in its top bits so the VM can
//! route hot instructions without a full decode:
//!
//! - bit 7 set: match family (`Match`, `MatchScalar`, `MatchBitset`,
//!   `MatchBuiltin`, `ConsumeBy`), one-hot tag in the low bits
//! - bit 6 set, bit 7 clear: priority family (`SplitSaving`, `Branch`,
//!   `Quantify`, `Save`, `BeginCapture`, `EndCapture`), one-hot tag
//! - otherwise the low 6 bits are the plain opcode value

use std::fmt;
use weft_core::pattern::{AssertionKind, ClassKind, QuantificationKind};

// =============================================================================
// Registers and interned-table indices
// =============================================================================

/// Address of an instruction in the assembled program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
#[repr(transparent)]
pub struct InstructionAddress(pub u32);

impl fmt::Display for InstructionAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "->{}", self.0)
    }
}

/// Index of an integer register (trip counters).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct IntRegister(pub u16);

/// Index of a boolean register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct BoolRegister(pub u16);

/// Index of a saved-input-position register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct PositionRegister(pub u16);

/// Index of a generic value register (matcher results).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct ValueRegister(pub u16);

/// Index of a capture register. Capture 0 is the whole match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct CaptureRegister(pub u16);

impl fmt::Display for IntRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "i{}", self.0)
    }
}

impl fmt::Display for PositionRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

impl fmt::Display for ValueRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl fmt::Display for CaptureRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// Index into the interned element table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct ElementIndex(pub u32);

/// Index into the interned sequence table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct SequenceIndex(pub u32);

/// Index into the interned string table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct StringIndex(pub u32);

/// Index into the interned ASCII-bitset table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct BitsetIndex(pub u32);

/// Index into the consume-function table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct ConsumeFnIndex(pub u32);

/// Index into the assertion-function table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct AssertionFnIndex(pub u32);

/// Index into the transform-function table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct TransformFnIndex(pub u32);

/// Index into the matcher-function table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct MatcherFnIndex(pub u32);

// =============================================================================
// Opcodes
// =============================================================================

/// Bytecode opcodes.
///
/// The discriminant of each variant is its encoded byte, so
/// [`encoded`](Self::encoded) and [`from_encoded`](Self::from_encoded) are a
/// lossless pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    // -- Ordinary opcodes (low 6 bits) ---------------------------------------
    /// No operation.
    Nop = 0x00,
    /// The match succeeded.
    Accept = 0x01,
    /// Restore the most recent save point, or end the match attempt.
    Fail = 0x02,
    /// Advance the current position by an element count.
    Advance = 0x03,
    /// Store the current position into a position register.
    MoveCurrentPosition = 0x04,
    /// If the integer register is zero, branch; otherwise decrement it.
    CondBranchZeroElseDecrement = 0x05,
    /// Branch if the current position equals the saved position.
    CondBranchSamePosition = 0x06,
    /// Push a resume-only save point (position is not restored).
    SaveAddress = 0x07,
    /// Pop the most recent save point.
    Clear = 0x08,
    /// Pop save points until the one resuming at the address is popped.
    ClearThrough = 0x09,
    /// Zero-width assertion described by the payload.
    AssertBy = 0x0A,
    /// Invoke a matcher function and store its value.
    MatchBy = 0x0B,
    /// Match the text of a previously captured group.
    Backreference = 0x0C,
    /// Override a capture's value with a value register.
    CaptureValue = 0x0D,
    /// Apply a transform function to a capture.
    TransformCapture = 0x0E,

    // -- Priority family (bit 6 + one-hot tag) -------------------------------
    /// Push save(saving), then branch to the target. Fused backtrack fork.
    SplitSaving = 0x41,
    /// Unconditional branch.
    Branch = 0x42,
    /// Tight-loop quantifier super-instruction.
    Quantify = 0x44,
    /// Push a save point restoring the current position.
    Save = 0x48,
    /// Open a capture at the current position.
    BeginCapture = 0x50,
    /// Close a capture at the current position.
    EndCapture = 0x60,

    // -- Match family (bit 7 + one-hot tag) ----------------------------------
    /// Match one interned element.
    Match = 0x81,
    /// Match one Unicode scalar.
    MatchScalar = 0x82,
    /// Match one character against an interned ASCII bitset.
    MatchBitset = 0x84,
    /// Match one character against a builtin class.
    MatchBuiltin = 0x88,
    /// Invoke a consume function.
    ConsumeBy = 0x90,
}

impl Opcode {
    /// All opcodes, for exhaustive iteration.
    pub const ALL: [Opcode; 26] = [
        Opcode::Nop,
        Opcode::Accept,
        Opcode::Fail,
        Opcode::Advance,
        Opcode::MoveCurrentPosition,
        Opcode::CondBranchZeroElseDecrement,
        Opcode::CondBranchSamePosition,
        Opcode::SaveAddress,
        Opcode::Clear,
        Opcode::ClearThrough,
        Opcode::AssertBy,
        Opcode::MatchBy,
        Opcode::Backreference,
        Opcode::CaptureValue,
        Opcode::TransformCapture,
        Opcode::SplitSaving,
        Opcode::Branch,
        Opcode::Quantify,
        Opcode::Save,
        Opcode::BeginCapture,
        Opcode::EndCapture,
        Opcode::Match,
        Opcode::MatchScalar,
        Opcode::MatchBitset,
        Opcode::MatchBuiltin,
        Opcode::ConsumeBy,
    ];

    /// The encoded opcode byte.
    #[inline]
    #[must_use]
    pub const fn encoded(self) -> u8 {
        self as u8
    }

    /// Decode an opcode byte, returning `None` if invalid.
    #[must_use]
    pub fn from_encoded(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Opcode::Nop),
            0x01 => Some(Opcode::Accept),
            0x02 => Some(Opcode::Fail),
            0x03 => Some(Opcode::Advance),
            0x04 => Some(Opcode::MoveCurrentPosition),
            0x05 => Some(Opcode::CondBranchZeroElseDecrement),
            0x06 => Some(Opcode::CondBranchSamePosition),
            0x07 => Some(Opcode::SaveAddress),
            0x08 => Some(Opcode::Clear),
            0x09 => Some(Opcode::ClearThrough),
            0x0A => Some(Opcode::AssertBy),
            0x0B => Some(Opcode::MatchBy),
            0x0C => Some(Opcode::Backreference),
            0x0D => Some(Opcode::CaptureValue),
            0x0E => Some(Opcode::TransformCapture),

            0x41 => Some(Opcode::SplitSaving),
            0x42 => Some(Opcode::Branch),
            0x44 => Some(Opcode::Quantify),
            0x48 => Some(Opcode::Save),
            0x50 => Some(Opcode::BeginCapture),
            0x60 => Some(Opcode::EndCapture),

            0x81 => Some(Opcode::Match),
            0x82 => Some(Opcode::MatchScalar),
            0x84 => Some(Opcode::MatchBitset),
            0x88 => Some(Opcode::MatchBuiltin),
            0x90 => Some(Opcode::ConsumeBy),

            _ => None,
        }
    }

    /// Whether this opcode consumes or tests input (bit 7 of the encoding).
    #[inline]
    #[must_use]
    pub const fn is_match_family(self) -> bool {
        (self as u8) & 0x80 != 0
    }

    /// Whether this opcode manages backtracking priority (bit 6, bit 7 clear).
    #[inline]
    #[must_use]
    pub const fn is_priority_family(self) -> bool {
        (self as u8) & 0xC0 == 0x40
    }
}

// =============================================================================
// Structured payloads
// =============================================================================

/// Decoded payload of an [`Opcode::AssertBy`] instruction: the assertion kind
/// plus the option bits it depends on, snapshotted at emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssertionPayload {
    /// Which anchor or boundary to test.
    pub kind: AssertionKind,
    /// Snapshot of the anchors-match-newlines option.
    pub anchors_match_newlines: bool,
    /// Snapshot of the simple-word-boundaries option.
    pub uses_simple_unicode_boundaries: bool,
    /// Snapshot of the ASCII-word option.
    pub uses_ascii_word: bool,
    /// Whether matching runs at scalar granularity.
    pub is_scalar_semantics: bool,
}

/// Decoded payload of an [`Opcode::MatchBuiltin`] instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinClassPayload {
    /// The class shape.
    pub kind: ClassKind,
    /// Whether the class is negated.
    pub inverted: bool,
    /// Whether membership is restricted to ASCII.
    pub strict_ascii: bool,
    /// Whether matching runs at scalar granularity.
    pub is_scalar: bool,
}

/// Body shape of a [`Opcode::Quantify`] instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantifyBody {
    /// A single ASCII character.
    AsciiChar(u8),
    /// An interned ASCII bitset.
    AsciiBitset(BitsetIndex),
    /// Any element, newlines included.
    Any,
    /// Any element except newlines.
    AnyNonNewline,
    /// A builtin class consuming one grapheme per trip.
    Builtin {
        /// The class shape.
        kind: ClassKind,
        /// Whether the class is negated.
        inverted: bool,
        /// Whether membership is restricted to ASCII.
        strict_ascii: bool,
    },
}

/// Decoded payload of an [`Opcode::Quantify`] instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantifyPayload {
    /// Greediness; never [`QuantificationKind::Default`].
    pub kind: QuantificationKind,
    /// Mandatory trips.
    pub min_trips: u16,
    /// Optional extra trips; `None` means unbounded.
    pub extra_trips: Option<u16>,
    /// What one trip matches.
    pub body: QuantifyBody,
}

impl QuantifyPayload {
    /// Largest trip count the packed payload can carry.
    pub const MAX_STORABLE_TRIPS: u16 = 255;
}

fn quantification_kind_code(kind: QuantificationKind) -> u64 {
    match kind {
        QuantificationKind::Eager => 0,
        QuantificationKind::Reluctant => 1,
        QuantificationKind::Possessive => 2,
        QuantificationKind::Default => {
            unreachable!("default quantification kind is resolved before encoding")
        }
    }
}

fn quantification_kind_from_code(code: u64) -> QuantificationKind {
    match code {
        0 => QuantificationKind::Eager,
        1 => QuantificationKind::Reluctant,
        2 => QuantificationKind::Possessive,
        _ => unreachable!("corrupt quantify payload"),
    }
}

fn class_kind_code(kind: ClassKind) -> u64 {
    match kind {
        ClassKind::AnyGrapheme => 0,
        ClassKind::Digit => 1,
        ClassKind::HorizontalWhitespace => 2,
        ClassKind::NewlineSequence => 3,
        ClassKind::VerticalWhitespace => 4,
        ClassKind::Whitespace => 5,
        ClassKind::Word => 6,
    }
}

fn class_kind_from_code(code: u64) -> ClassKind {
    match code {
        0 => ClassKind::AnyGrapheme,
        1 => ClassKind::Digit,
        2 => ClassKind::HorizontalWhitespace,
        3 => ClassKind::NewlineSequence,
        4 => ClassKind::VerticalWhitespace,
        5 => ClassKind::Whitespace,
        6 => ClassKind::Word,
        _ => unreachable!("corrupt builtin-class payload"),
    }
}

fn assertion_kind_code(kind: AssertionKind) -> u64 {
    match kind {
        AssertionKind::StartOfSubject => 0,
        AssertionKind::EndOfSubject => 1,
        AssertionKind::EndOfSubjectBeforeNewline => 2,
        AssertionKind::FirstMatchingPositionInSubject => 3,
        AssertionKind::StartOfLine => 4,
        AssertionKind::EndOfLine => 5,
        AssertionKind::CaretAnchor => 6,
        AssertionKind::DollarAnchor => 7,
        AssertionKind::WordBoundary => 8,
        AssertionKind::NotWordBoundary => 9,
        AssertionKind::TextSegmentBoundary => 10,
        AssertionKind::NotTextSegmentBoundary => 11,
        AssertionKind::ResetStartOfMatch => 12,
    }
}

fn assertion_kind_from_code(code: u64) -> AssertionKind {
    match code {
        0 => AssertionKind::StartOfSubject,
        1 => AssertionKind::EndOfSubject,
        2 => AssertionKind::EndOfSubjectBeforeNewline,
        3 => AssertionKind::FirstMatchingPositionInSubject,
        4 => AssertionKind::StartOfLine,
        5 => AssertionKind::EndOfLine,
        6 => AssertionKind::CaretAnchor,
        7 => AssertionKind::DollarAnchor,
        8 => AssertionKind::WordBoundary,
        9 => AssertionKind::NotWordBoundary,
        10 => AssertionKind::TextSegmentBoundary,
        11 => AssertionKind::NotTextSegmentBoundary,
        12 => AssertionKind::ResetStartOfMatch,
        _ => unreachable!("corrupt assertion payload"),
    }
}

// =============================================================================
// Instruction
// =============================================================================

const OPCODE_SHIFT: u32 = 56;
const PAYLOAD_MASK: u64 = (1 << OPCODE_SHIFT) - 1;
const ADDRESS_MASK: u64 = 0xFFFF_FFFF;
const PAIR_ADDRESS_BITS: u32 = 28;
const PAIR_ADDRESS_MASK: u64 = (1 << PAIR_ADDRESS_BITS) - 1;
const REGISTER_SHIFT: u32 = 32;

/// A 64-bit bytecode instruction.
///
/// Payload layouts are opcode-specific; single branch targets always occupy
/// the low 32 bits so address fixups can patch any of them uniformly.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct Instruction(u64);

impl Instruction {
    /// Create an instruction from an opcode and a raw payload.
    #[inline]
    #[must_use]
    pub const fn new(opcode: Opcode, payload: u64) -> Self {
        Instruction(((opcode as u64) << OPCODE_SHIFT) | (payload & PAYLOAD_MASK))
    }

    /// Create an instruction with an empty payload.
    #[inline]
    #[must_use]
    pub const fn op(opcode: Opcode) -> Self {
        Self::new(opcode, 0)
    }

    /// The encoded opcode byte.
    #[inline]
    #[must_use]
    pub const fn encoded_opcode(self) -> u8 {
        (self.0 >> OPCODE_SHIFT) as u8
    }

    /// The decoded opcode, or `None` for an invalid word.
    #[inline]
    #[must_use]
    pub fn opcode(self) -> Option<Opcode> {
        Opcode::from_encoded(self.encoded_opcode())
    }

    /// The raw 56-bit payload.
    #[inline]
    #[must_use]
    pub const fn payload(self) -> u64 {
        self.0 & PAYLOAD_MASK
    }

    /// The raw 64-bit word.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Reconstruct an instruction from a raw 64-bit word.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Instruction(raw)
    }

    // -------------------------------------------------------------------------
    // Constructors
    // -------------------------------------------------------------------------

    /// `branch(addr)`
    #[must_use]
    pub fn branch(target: InstructionAddress) -> Self {
        Self::new(Opcode::Branch, target.0 as u64)
    }

    /// `condBranchZeroElseDecrement(addr, intReg)`
    #[must_use]
    pub fn cond_branch_zero_else_decrement(
        target: InstructionAddress,
        register: IntRegister,
    ) -> Self {
        Self::new(
            Opcode::CondBranchZeroElseDecrement,
            target.0 as u64 | ((register.0 as u64) << REGISTER_SHIFT),
        )
    }

    /// `condBranchSamePosition(addr, posReg)`
    #[must_use]
    pub fn cond_branch_same_position(
        target: InstructionAddress,
        register: PositionRegister,
    ) -> Self {
        Self::new(
            Opcode::CondBranchSamePosition,
            target.0 as u64 | ((register.0 as u64) << REGISTER_SHIFT),
        )
    }

    /// `save(addr)` - restores position and call-stack depth on failure.
    #[must_use]
    pub fn save(target: InstructionAddress) -> Self {
        Self::new(Opcode::Save, target.0 as u64)
    }

    /// `saveAddress(addr)` - resume-only save point.
    #[must_use]
    pub fn save_address(target: InstructionAddress) -> Self {
        Self::new(Opcode::SaveAddress, target.0 as u64)
    }

    /// `clearThrough(addr)`
    #[must_use]
    pub fn clear_through(target: InstructionAddress) -> Self {
        Self::new(Opcode::ClearThrough, target.0 as u64)
    }

    /// `splitSaving(to, saving)` - both addresses packed at 28 bits.
    #[must_use]
    pub fn split_saving(to: InstructionAddress, saving: InstructionAddress) -> Self {
        debug_assert!((to.0 as u64) <= PAIR_ADDRESS_MASK);
        debug_assert!((saving.0 as u64) <= PAIR_ADDRESS_MASK);
        Self::new(
            Opcode::SplitSaving,
            (to.0 as u64) | ((saving.0 as u64) << PAIR_ADDRESS_BITS),
        )
    }

    /// `moveCurrentPosition(posReg)`
    #[must_use]
    pub fn move_current_position(register: PositionRegister) -> Self {
        Self::new(
            Opcode::MoveCurrentPosition,
            (register.0 as u64) << REGISTER_SHIFT,
        )
    }

    /// `advance(n)`
    #[must_use]
    pub fn advance(distance: u32) -> Self {
        Self::new(Opcode::Advance, distance as u64)
    }

    /// `match(element, caseInsensitive)`
    #[must_use]
    pub fn match_element(element: ElementIndex, case_insensitive: bool) -> Self {
        Self::new(
            Opcode::Match,
            element.0 as u64 | ((case_insensitive as u64) << 32),
        )
    }

    /// `matchScalar(scalar, caseInsensitive, boundaryCheck)`
    #[must_use]
    pub fn match_scalar(scalar: char, case_insensitive: bool, boundary_check: bool) -> Self {
        Self::new(
            Opcode::MatchScalar,
            scalar as u64 | ((case_insensitive as u64) << 32) | ((boundary_check as u64) << 33),
        )
    }

    /// `matchBitset(bitset, isScalar)`
    #[must_use]
    pub fn match_bitset(bitset: BitsetIndex, is_scalar: bool) -> Self {
        Self::new(
            Opcode::MatchBitset,
            bitset.0 as u64 | ((is_scalar as u64) << 32),
        )
    }

    /// `matchBuiltin(class, inverted, strictAscii, isScalar)`
    #[must_use]
    pub fn match_builtin(payload: BuiltinClassPayload) -> Self {
        Self::new(
            Opcode::MatchBuiltin,
            class_kind_code(payload.kind)
                | ((payload.inverted as u64) << 8)
                | ((payload.strict_ascii as u64) << 9)
                | ((payload.is_scalar as u64) << 10),
        )
    }

    /// `consumeBy(fn)`
    #[must_use]
    pub fn consume_by(function: ConsumeFnIndex) -> Self {
        Self::new(Opcode::ConsumeBy, function.0 as u64)
    }

    /// `assertBy(payload)`
    #[must_use]
    pub fn assert_by(payload: AssertionPayload) -> Self {
        Self::new(
            Opcode::AssertBy,
            assertion_kind_code(payload.kind)
                | ((payload.anchors_match_newlines as u64) << 8)
                | ((payload.uses_simple_unicode_boundaries as u64) << 9)
                | ((payload.uses_ascii_word as u64) << 10)
                | ((payload.is_scalar_semantics as u64) << 11),
        )
    }

    /// `matchBy(matcher, valueReg)`
    #[must_use]
    pub fn match_by(matcher: MatcherFnIndex, value: ValueRegister) -> Self {
        debug_assert!((matcher.0 as u64) <= PAIR_ADDRESS_MASK);
        Self::new(
            Opcode::MatchBy,
            matcher.0 as u64 | ((value.0 as u64) << PAIR_ADDRESS_BITS),
        )
    }

    /// `beginCapture(capReg)`
    #[must_use]
    pub fn begin_capture(capture: CaptureRegister) -> Self {
        Self::new(Opcode::BeginCapture, capture.0 as u64)
    }

    /// `endCapture(capReg)`
    #[must_use]
    pub fn end_capture(capture: CaptureRegister) -> Self {
        Self::new(Opcode::EndCapture, capture.0 as u64)
    }

    /// `captureValue(valueReg, capReg)`
    #[must_use]
    pub fn capture_value(value: ValueRegister, capture: CaptureRegister) -> Self {
        Self::new(
            Opcode::CaptureValue,
            value.0 as u64 | ((capture.0 as u64) << 16),
        )
    }

    /// `transformCapture(capReg, transform)`
    #[must_use]
    pub fn transform_capture(capture: CaptureRegister, transform: TransformFnIndex) -> Self {
        Self::new(
            Opcode::TransformCapture,
            capture.0 as u64 | ((transform.0 as u64) << 16),
        )
    }

    /// `backreference(capReg)`
    #[must_use]
    pub fn backreference(capture: CaptureRegister) -> Self {
        Self::new(Opcode::Backreference, capture.0 as u64)
    }

    /// `quantify(payload)`
    #[must_use]
    pub fn quantify(payload: QuantifyPayload) -> Self {
        debug_assert!(payload.min_trips <= QuantifyPayload::MAX_STORABLE_TRIPS);
        debug_assert!(
            payload
                .extra_trips
                .map_or(true, |e| e <= QuantifyPayload::MAX_STORABLE_TRIPS)
        );
        let (tag, operand): (u64, u64) = match payload.body {
            QuantifyBody::AsciiChar(byte) => (0, byte as u64),
            QuantifyBody::AsciiBitset(bitset) => (1, bitset.0 as u64),
            QuantifyBody::Any => (2, 0),
            QuantifyBody::AnyNonNewline => (3, 0),
            QuantifyBody::Builtin {
                kind,
                inverted,
                strict_ascii,
            } => (
                4,
                class_kind_code(kind) | ((inverted as u64) << 8) | ((strict_ascii as u64) << 9),
            ),
        };
        debug_assert!(operand <= 0xFFFF);
        let extra = payload.extra_trips.map_or(0, |e| e as u64 + 1);
        Self::new(
            Opcode::Quantify,
            quantification_kind_code(payload.kind)
                | (tag << 2)
                | (operand << 8)
                | ((payload.min_trips as u64) << 24)
                | (extra << 32),
        )
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// The branch target of a single-address instruction.
    #[inline]
    #[must_use]
    pub fn address(self) -> InstructionAddress {
        InstructionAddress((self.payload() & ADDRESS_MASK) as u32)
    }

    /// The `(to, saving)` pair of a `splitSaving` instruction.
    #[inline]
    #[must_use]
    pub fn address_pair(self) -> (InstructionAddress, InstructionAddress) {
        let payload = self.payload();
        (
            InstructionAddress((payload & PAIR_ADDRESS_MASK) as u32),
            InstructionAddress(((payload >> PAIR_ADDRESS_BITS) & PAIR_ADDRESS_MASK) as u32),
        )
    }

    /// The integer register of a `condBranchZeroElseDecrement`.
    #[inline]
    #[must_use]
    pub fn int_register(self) -> IntRegister {
        IntRegister(((self.payload() >> REGISTER_SHIFT) & 0xFFFF) as u16)
    }

    /// The position register of a position-carrying instruction.
    #[inline]
    #[must_use]
    pub fn position_register(self) -> PositionRegister {
        PositionRegister(((self.payload() >> REGISTER_SHIFT) & 0xFFFF) as u16)
    }

    /// The element count of an `advance`.
    #[inline]
    #[must_use]
    pub fn distance(self) -> u32 {
        (self.payload() & ADDRESS_MASK) as u32
    }

    /// The element index of a `match`.
    #[inline]
    #[must_use]
    pub fn element(self) -> ElementIndex {
        ElementIndex((self.payload() & ADDRESS_MASK) as u32)
    }

    /// The scalar of a `matchScalar`.
    #[inline]
    #[must_use]
    pub fn scalar(self) -> char {
        char::from_u32((self.payload() & ADDRESS_MASK) as u32).unwrap_or(char::REPLACEMENT_CHARACTER)
    }

    /// The case-insensitivity flag of a `match` / `matchScalar`.
    #[inline]
    #[must_use]
    pub fn is_case_insensitive(self) -> bool {
        self.payload() & (1 << 32) != 0
    }

    /// The boundary-check flag of a `matchScalar`.
    #[inline]
    #[must_use]
    pub fn has_boundary_check(self) -> bool {
        self.payload() & (1 << 33) != 0
    }

    /// The bitset index of a `matchBitset`.
    #[inline]
    #[must_use]
    pub fn bitset(self) -> BitsetIndex {
        BitsetIndex((self.payload() & ADDRESS_MASK) as u32)
    }

    /// The scalar-granularity flag of a `matchBitset`.
    #[inline]
    #[must_use]
    pub fn is_scalar_mode(self) -> bool {
        self.payload() & (1 << 32) != 0
    }

    /// The decoded payload of a `matchBuiltin`.
    #[must_use]
    pub fn builtin_class(self) -> BuiltinClassPayload {
        let payload = self.payload();
        BuiltinClassPayload {
            kind: class_kind_from_code(payload & 0xFF),
            inverted: payload & (1 << 8) != 0,
            strict_ascii: payload & (1 << 9) != 0,
            is_scalar: payload & (1 << 10) != 0,
        }
    }

    /// The consume-function index of a `consumeBy`.
    #[inline]
    #[must_use]
    pub fn consume_fn(self) -> ConsumeFnIndex {
        ConsumeFnIndex((self.payload() & ADDRESS_MASK) as u32)
    }

    /// The decoded payload of an `assertBy`.
    #[must_use]
    pub fn assertion(self) -> AssertionPayload {
        let payload = self.payload();
        AssertionPayload {
            kind: assertion_kind_from_code(payload & 0xFF),
            anchors_match_newlines: payload & (1 << 8) != 0,
            uses_simple_unicode_boundaries: payload & (1 << 9) != 0,
            uses_ascii_word: payload & (1 << 10) != 0,
            is_scalar_semantics: payload & (1 << 11) != 0,
        }
    }

    /// The `(matcher, value)` pair of a `matchBy`.
    #[inline]
    #[must_use]
    pub fn matcher(self) -> (MatcherFnIndex, ValueRegister) {
        let payload = self.payload();
        (
            MatcherFnIndex((payload & PAIR_ADDRESS_MASK) as u32),
            ValueRegister(((payload >> PAIR_ADDRESS_BITS) & 0xFFFF) as u16),
        )
    }

    /// The capture register of a capture-addressed instruction.
    #[inline]
    #[must_use]
    pub fn capture_register(self) -> CaptureRegister {
        CaptureRegister((self.payload() & 0xFFFF) as u16)
    }

    /// The `(value, capture)` pair of a `captureValue`.
    #[inline]
    #[must_use]
    pub fn capture_value_payload(self) -> (ValueRegister, CaptureRegister) {
        let payload = self.payload();
        (
            ValueRegister((payload & 0xFFFF) as u16),
            CaptureRegister(((payload >> 16) & 0xFFFF) as u16),
        )
    }

    /// The `(capture, transform)` pair of a `transformCapture`.
    #[inline]
    #[must_use]
    pub fn transform_payload(self) -> (CaptureRegister, TransformFnIndex) {
        let payload = self.payload();
        (
            CaptureRegister((payload & 0xFFFF) as u16),
            TransformFnIndex(((payload >> 16) & 0xFFFF_FFFF) as u32),
        )
    }

    /// The decoded payload of a `quantify`.
    #[must_use]
    pub fn quantify_payload(self) -> QuantifyPayload {
        let payload = self.payload();
        let operand = (payload >> 8) & 0xFFFF;
        let body = match (payload >> 2) & 0x7 {
            0 => QuantifyBody::AsciiChar(operand as u8),
            1 => QuantifyBody::AsciiBitset(BitsetIndex(operand as u32)),
            2 => QuantifyBody::Any,
            3 => QuantifyBody::AnyNonNewline,
            4 => QuantifyBody::Builtin {
                kind: class_kind_from_code(operand & 0xFF),
                inverted: operand & (1 << 8) != 0,
                strict_ascii: operand & (1 << 9) != 0,
            },
            _ => unreachable!("corrupt quantify payload"),
        };
        let extra = (payload >> 32) & 0x1FF;
        QuantifyPayload {
            kind: quantification_kind_from_code(payload & 0x3),
            min_trips: ((payload >> 24) & 0xFF) as u16,
            extra_trips: extra.checked_sub(1).map(|e| e as u16),
            body,
        }
    }

    // -------------------------------------------------------------------------
    // Patching
    // -------------------------------------------------------------------------

    /// Replace the low-32-bit branch target, keeping everything else.
    #[inline]
    #[must_use]
    pub fn with_address(self, target: InstructionAddress) -> Self {
        Instruction((self.0 & !ADDRESS_MASK) | target.0 as u64)
    }

    /// Replace both targets of a `splitSaving`.
    #[inline]
    #[must_use]
    pub fn with_address_pair(self, to: InstructionAddress, saving: InstructionAddress) -> Self {
        Instruction(
            (self.0 & !PAYLOAD_MASK) | (to.0 as u64) | ((saving.0 as u64) << PAIR_ADDRESS_BITS),
        )
    }

    /// Replace the capture register of a capture-addressed instruction.
    #[inline]
    #[must_use]
    pub fn with_capture_register(self, capture: CaptureRegister) -> Self {
        Instruction((self.0 & !0xFFFF) | capture.0 as u64)
    }
}

impl fmt::Debug for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Instruction({:02x}, {:014x})",
            self.encoded_opcode(),
            self.payload()
        )
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(op) = self.opcode() else {
            return write!(f, "invalid({:016x})", self.0);
        };
        match op {
            Opcode::Nop => write!(f, "nop"),
            Opcode::Accept => write!(f, "accept"),
            Opcode::Fail => write!(f, "fail"),
            Opcode::Clear => write!(f, "clear"),
            Opcode::Advance => write!(f, "advance {}", self.distance()),
            Opcode::MoveCurrentPosition => {
                write!(f, "move-current-position {}", self.position_register())
            }
            Opcode::Branch => write!(f, "branch {}", self.address()),
            Opcode::CondBranchZeroElseDecrement => write!(
                f,
                "cond-branch-zero-else-decrement {} {}",
                self.address(),
                self.int_register()
            ),
            Opcode::CondBranchSamePosition => write!(
                f,
                "cond-branch-same-position {} {}",
                self.address(),
                self.position_register()
            ),
            Opcode::Save => write!(f, "save {}", self.address()),
            Opcode::SaveAddress => write!(f, "save-address {}", self.address()),
            Opcode::ClearThrough => write!(f, "clear-through {}", self.address()),
            Opcode::SplitSaving => {
                let (to, saving) = self.address_pair();
                write!(f, "split-saving to={to} saving={saving}")
            }
            Opcode::Match => write!(
                f,
                "match e{}{}",
                self.element().0,
                if self.is_case_insensitive() { " ci" } else { "" }
            ),
            Opcode::MatchScalar => write!(
                f,
                "match-scalar {:?}{}{}",
                self.scalar(),
                if self.is_case_insensitive() { " ci" } else { "" },
                if self.has_boundary_check() { " bc" } else { "" }
            ),
            Opcode::MatchBitset => write!(f, "match-bitset b{}", self.bitset().0),
            Opcode::MatchBuiltin => {
                let payload = self.builtin_class();
                write!(
                    f,
                    "match-builtin {:?}{}",
                    payload.kind,
                    if payload.inverted { " inverted" } else { "" }
                )
            }
            Opcode::ConsumeBy => write!(f, "consume-by f{}", self.consume_fn().0),
            Opcode::AssertBy => write!(f, "assert-by {:?}", self.assertion().kind),
            Opcode::MatchBy => {
                let (matcher, value) = self.matcher();
                write!(f, "match-by m{} {}", matcher.0, value)
            }
            Opcode::Backreference => write!(f, "backreference {}", self.capture_register()),
            Opcode::BeginCapture => write!(f, "begin-capture {}", self.capture_register()),
            Opcode::EndCapture => write!(f, "end-capture {}", self.capture_register()),
            Opcode::CaptureValue => {
                let (value, capture) = self.capture_value_payload();
                write!(f, "capture-value {value} {capture}")
            }
            Opcode::TransformCapture => {
                let (capture, transform) = self.transform_payload();
                write!(f, "transform-capture {capture} t{}", transform.0)
            }
            Opcode::Quantify => {
                let payload = self.quantify_payload();
                write!(
                    f,
                    "quantify {:?} min={} extra={} body={:?}",
                    payload.kind,
                    payload.min_trips,
                    payload
                        .extra_trips
                        .map_or("inf".to_string(), |e| e.to_string()),
                    payload.body
                )
            }
        }
    }
}

//! The assembled program artifact.

use super::instruction::Instruction;
use rustc_hash::FxHashMap;
use std::fmt;
use std::fmt::Write as _;
use std::sync::Arc;
use weft_core::capture::CaptureList;
use weft_core::options::OptionFlags;
use weft_core::pattern::{
    AsciiBitset, AssertionFn, ConsumeFn, MatcherFn, ReferenceId, TransformFn,
};

/// A compiled pattern, ready for the matching VM.
///
/// Immutable after assembly; may be shared freely across matching threads.
/// The interned function tables hold `Send + Sync` closures the VM invokes.
pub struct Program {
    /// The instruction words, in execution order.
    pub instructions: Box<[Instruction]>,

    /// Interned single elements referenced by `match`.
    pub elements: Box<[char]>,
    /// Interned element sequences.
    pub sequences: Box<[Arc<str>]>,
    /// Interned strings.
    pub strings: Box<[Arc<str>]>,
    /// Interned ASCII bitsets referenced by `matchBitset` and `quantify`.
    pub bitsets: Box<[AsciiBitset]>,
    /// Consume functions referenced by `consumeBy`.
    pub consume_functions: Box<[ConsumeFn]>,
    /// Custom assertion functions.
    pub assertion_functions: Box<[AssertionFn]>,
    /// Capture transform functions referenced by `transformCapture`.
    pub transform_functions: Box<[TransformFn]>,
    /// Matcher functions referenced by `matchBy`.
    pub matcher_functions: Box<[MatcherFn]>,

    /// Initial values of the integer registers, one per register.
    pub int_registers: Box<[u32]>,
    /// Number of boolean registers the VM must allocate.
    pub bool_register_count: usize,
    /// Number of position registers the VM must allocate.
    pub position_register_count: usize,
    /// Number of value registers the VM must allocate.
    pub value_register_count: usize,

    /// Capture metadata, whole-match first.
    pub capture_list: CaptureList,
    /// Map from a capture's reference id to its capture number.
    pub referenced_capture_offsets: FxHashMap<ReferenceId, u16>,
    /// The options in effect at match start.
    pub initial_options: OptionFlags,
}

impl Program {
    /// Number of instructions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Whether the program is empty. An assembled program never is.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Number of integer registers the VM must allocate.
    #[must_use]
    pub fn int_register_count(&self) -> usize {
        self.int_registers.len()
    }

    /// Number of capture registers the VM must allocate.
    #[must_use]
    pub fn capture_register_count(&self) -> usize {
        self.capture_list.len()
    }

    /// Render the program one instruction per line, with addresses.
    #[must_use]
    pub fn disassemble(&self) -> String {
        let mut out = String::new();
        for (address, instruction) in self.instructions.iter().enumerate() {
            let _ = writeln!(out, "{address:4}: {instruction}");
        }
        out
    }
}

impl fmt::Debug for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Program")
            .field("instructions", &self.instructions.len())
            .field("elements", &self.elements.len())
            .field("bitsets", &self.bitsets.len())
            .field("consume_functions", &self.consume_functions.len())
            .field("matcher_functions", &self.matcher_functions.len())
            .field("captures", &self.capture_list.len())
            .field("initial_options", &self.initial_options)
            .finish_non_exhaustive()
    }
}

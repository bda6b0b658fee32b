//! Program builder: instruction emission, labels, registers, interning.
//!
//! Emission is single-pass, but many jumps target addresses that have not
//! been emitted yet. The builder hands out [`AddressToken`]s (indices into a
//! table of resolved-or-pending addresses) and keeps a fixup list of
//! instructions whose payload must be patched once their token resolves.
//! [`assemble`](ProgramBuilder::assemble) resolves everything and produces
//! the immutable [`Program`].

use super::instruction::{
    AssertionFnIndex, AssertionPayload, BitsetIndex, BoolRegister, BuiltinClassPayload,
    CaptureRegister, ConsumeFnIndex, ElementIndex, Instruction, InstructionAddress, IntRegister,
    MatcherFnIndex, PositionRegister, QuantifyPayload, SequenceIndex, StringIndex,
    TransformFnIndex, ValueRegister,
};
use super::program::Program;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::sync::Arc;
use weft_core::capture::CaptureList;
use weft_core::error::{CompileError, CompileResult};
use weft_core::options::OptionFlags;
use weft_core::pattern::{AsciiBitset, AssertionFn, ConsumeFn, MatcherFn, ReferenceId, TransformFn};

/// A forward label handed out by [`ProgramBuilder::make_address`].
///
/// Tokens are indices into a builder-local table and are invalid once the
/// program has been assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressToken(u32);

/// A recorded payload patch: `instruction`'s address operand(s) get the
/// resolved values of the token(s) at assembly.
#[derive(Debug, Clone, Copy)]
struct AddressFixup {
    instruction: usize,
    first: AddressToken,
    second: Option<AddressToken>,
}

/// Builder for one program.
///
/// One builder is owned by one code generator for the duration of a
/// compilation; after [`assemble`](Self::assemble) it is consumed.
pub struct ProgramBuilder {
    instructions: Vec<Instruction>,

    /// Token table: `None` until the token is labeled.
    address_tokens: Vec<Option<InstructionAddress>>,
    fixups: Vec<AddressFixup>,

    /// Initial values double as the allocation count.
    int_registers: Vec<u32>,
    next_bool_register: u16,
    next_position_register: u16,
    next_value_register: u16,
    next_capture_register: u16,

    elements: Vec<char>,
    element_map: FxHashMap<char, ElementIndex>,
    sequences: Vec<Arc<str>>,
    sequence_map: FxHashMap<Arc<str>, SequenceIndex>,
    strings: Vec<Arc<str>>,
    string_map: FxHashMap<Arc<str>, StringIndex>,
    bitsets: Vec<AsciiBitset>,
    bitset_map: FxHashMap<AsciiBitset, BitsetIndex>,
    consume_functions: Vec<ConsumeFn>,
    assertion_functions: Vec<AssertionFn>,
    transform_functions: Vec<TransformFn>,
    matcher_functions: Vec<MatcherFn>,

    capture_list: CaptureList,
    /// Reference id of an emitted capture → its capture number.
    referenced_capture_offsets: FxHashMap<ReferenceId, u16>,
    /// Reference id → backreference sites awaiting that capture's number.
    unresolved_references: FxHashMap<ReferenceId, SmallVec<[usize; 2]>>,

    /// Shared target of `push_empty_save_point`, lazily created and
    /// materialized as a terminal `fail` at assembly.
    fail_sink: Option<AddressToken>,

    initial_options: OptionFlags,
}

impl ProgramBuilder {
    /// Create a builder for a pattern with the given capture list.
    #[must_use]
    pub fn new(capture_list: CaptureList) -> Self {
        Self {
            instructions: Vec::new(),
            address_tokens: Vec::new(),
            fixups: Vec::new(),
            int_registers: Vec::new(),
            next_bool_register: 0,
            next_position_register: 0,
            next_value_register: 0,
            next_capture_register: 0,
            elements: Vec::new(),
            element_map: FxHashMap::default(),
            sequences: Vec::new(),
            sequence_map: FxHashMap::default(),
            strings: Vec::new(),
            string_map: FxHashMap::default(),
            bitsets: Vec::new(),
            bitset_map: FxHashMap::default(),
            consume_functions: Vec::new(),
            assertion_functions: Vec::new(),
            transform_functions: Vec::new(),
            matcher_functions: Vec::new(),
            capture_list,
            referenced_capture_offsets: FxHashMap::default(),
            unresolved_references: FxHashMap::default(),
            fail_sink: None,
            initial_options: OptionFlags::empty(),
        }
    }

    // =========================================================================
    // Labels and fixups
    // =========================================================================

    /// Allocate a forward label.
    pub fn make_address(&mut self) -> AddressToken {
        let token = AddressToken(self.address_tokens.len() as u32);
        self.address_tokens.push(None);
        token
    }

    /// Bind a token to the address of the next instruction to be emitted.
    pub fn label(&mut self, token: AddressToken) {
        self.address_tokens[token.0 as usize] =
            Some(InstructionAddress(self.instructions.len() as u32));
    }

    /// Record that the most recently emitted instruction's address operand
    /// must be patched with the token's resolved address.
    pub fn fixup(&mut self, to: AddressToken) {
        let instruction = self
            .instructions
            .len()
            .checked_sub(1)
            .expect("fixup requires an emitted instruction");
        self.fixups.push(AddressFixup {
            instruction,
            first: to,
            second: None,
        });
    }

    /// Record a two-address patch for the most recent instruction
    /// (`splitSaving`).
    pub fn fixup_pair(&mut self, to: AddressToken, saving: AddressToken) {
        let instruction = self
            .instructions
            .len()
            .checked_sub(1)
            .expect("fixup requires an emitted instruction");
        self.fixups.push(AddressFixup {
            instruction,
            first: to,
            second: Some(saving),
        });
    }

    /// The address the next emitted instruction will occupy.
    #[must_use]
    pub fn current_address(&self) -> InstructionAddress {
        InstructionAddress(self.instructions.len() as u32)
    }

    /// Number of instructions emitted so far.
    #[must_use]
    pub fn instruction_count(&self) -> usize {
        self.instructions.len()
    }

    // =========================================================================
    // Registers
    // =========================================================================

    /// Allocate an integer register seeded with `initial`.
    pub fn alloc_int_register(&mut self, initial: u32) -> IntRegister {
        let register = IntRegister(self.int_registers.len() as u16);
        self.int_registers.push(initial);
        register
    }

    /// Allocate a boolean register.
    pub fn alloc_bool_register(&mut self) -> BoolRegister {
        let register = BoolRegister(self.next_bool_register);
        self.next_bool_register += 1;
        register
    }

    /// Allocate a position register.
    pub fn alloc_position_register(&mut self) -> PositionRegister {
        let register = PositionRegister(self.next_position_register);
        self.next_position_register += 1;
        register
    }

    /// Allocate a value register.
    pub fn alloc_value_register(&mut self) -> ValueRegister {
        let register = ValueRegister(self.next_value_register);
        self.next_value_register += 1;
        register
    }

    /// Allocate the next capture register, in capture-list order.
    pub fn alloc_capture_register(&mut self) -> CaptureRegister {
        let register = CaptureRegister(self.next_capture_register);
        self.next_capture_register += 1;
        register
    }

    /// Number of capture registers allocated so far.
    #[must_use]
    pub fn capture_registers_allocated(&self) -> usize {
        self.next_capture_register as usize
    }

    /// The capture list this program is being built against.
    #[must_use]
    pub fn capture_list(&self) -> &CaptureList {
        &self.capture_list
    }

    // =========================================================================
    // Interning
    // =========================================================================

    /// Intern a single element.
    pub fn intern_element(&mut self, element: char) -> ElementIndex {
        if let Some(&index) = self.element_map.get(&element) {
            return index;
        }
        let index = ElementIndex(self.elements.len() as u32);
        self.elements.push(element);
        self.element_map.insert(element, index);
        index
    }

    /// Intern an element sequence.
    pub fn intern_sequence(&mut self, sequence: impl AsRef<str>) -> SequenceIndex {
        let sequence: Arc<str> = Arc::from(sequence.as_ref());
        if let Some(&index) = self.sequence_map.get(&sequence) {
            return index;
        }
        let index = SequenceIndex(self.sequences.len() as u32);
        self.sequences.push(sequence.clone());
        self.sequence_map.insert(sequence, index);
        index
    }

    /// Intern a string.
    pub fn intern_string(&mut self, string: impl AsRef<str>) -> StringIndex {
        let string: Arc<str> = Arc::from(string.as_ref());
        if let Some(&index) = self.string_map.get(&string) {
            return index;
        }
        let index = StringIndex(self.strings.len() as u32);
        self.strings.push(string.clone());
        self.string_map.insert(string, index);
        index
    }

    /// Intern an ASCII bitset.
    pub fn intern_bitset(&mut self, bitset: AsciiBitset) -> BitsetIndex {
        if let Some(&index) = self.bitset_map.get(&bitset) {
            return index;
        }
        let index = BitsetIndex(self.bitsets.len() as u32);
        self.bitsets.push(bitset);
        self.bitset_map.insert(bitset, index);
        index
    }

    /// Register a consume function.
    pub fn intern_consume_fn(&mut self, function: ConsumeFn) -> ConsumeFnIndex {
        let index = ConsumeFnIndex(self.consume_functions.len() as u32);
        self.consume_functions.push(function);
        index
    }

    /// Register a custom assertion function.
    pub fn intern_assertion_fn(&mut self, function: AssertionFn) -> AssertionFnIndex {
        let index = AssertionFnIndex(self.assertion_functions.len() as u32);
        self.assertion_functions.push(function);
        index
    }

    /// Register a capture transform function.
    pub fn intern_transform_fn(&mut self, function: TransformFn) -> TransformFnIndex {
        let index = TransformFnIndex(self.transform_functions.len() as u32);
        self.transform_functions.push(function);
        index
    }

    /// Register a matcher function.
    pub fn intern_matcher_fn(&mut self, function: MatcherFn) -> MatcherFnIndex {
        let index = MatcherFnIndex(self.matcher_functions.len() as u32);
        self.matcher_functions.push(function);
        index
    }

    // =========================================================================
    // Emission
    // =========================================================================

    #[inline]
    fn emit(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }

    /// Emit `nop`.
    pub fn emit_nop(&mut self) {
        self.emit(Instruction::op(super::Opcode::Nop));
    }

    /// Emit `accept`.
    pub fn emit_accept(&mut self) {
        self.emit(Instruction::op(super::Opcode::Accept));
    }

    /// Emit `fail`.
    pub fn emit_fail(&mut self) {
        self.emit(Instruction::op(super::Opcode::Fail));
    }

    /// Emit `clear`.
    pub fn emit_clear(&mut self) {
        self.emit(Instruction::op(super::Opcode::Clear));
    }

    /// Emit `branch` to a label.
    pub fn emit_branch(&mut self, target: AddressToken) {
        self.emit(Instruction::branch(InstructionAddress(0)));
        self.fixup(target);
    }

    /// Emit `condBranchZeroElseDecrement` to a label.
    pub fn emit_cond_branch_zero_else_decrement(
        &mut self,
        target: AddressToken,
        register: IntRegister,
    ) {
        self.emit(Instruction::cond_branch_zero_else_decrement(
            InstructionAddress(0),
            register,
        ));
        self.fixup(target);
    }

    /// Emit `condBranchSamePosition` to a label.
    pub fn emit_cond_branch_same_position(
        &mut self,
        target: AddressToken,
        register: PositionRegister,
    ) {
        self.emit(Instruction::cond_branch_same_position(
            InstructionAddress(0),
            register,
        ));
        self.fixup(target);
    }

    /// Emit `save` to a label.
    pub fn emit_save(&mut self, target: AddressToken) {
        self.emit(Instruction::save(InstructionAddress(0)));
        self.fixup(target);
    }

    /// Emit `saveAddress` to a label.
    pub fn emit_save_address(&mut self, target: AddressToken) {
        self.emit(Instruction::save_address(InstructionAddress(0)));
        self.fixup(target);
    }

    /// Emit `clearThrough` to a label.
    pub fn emit_clear_through(&mut self, target: AddressToken) {
        self.emit(Instruction::clear_through(InstructionAddress(0)));
        self.fixup(target);
    }

    /// Emit `splitSaving` to a pair of labels.
    pub fn emit_split_saving(&mut self, to: AddressToken, saving: AddressToken) {
        self.emit(Instruction::split_saving(
            InstructionAddress(0),
            InstructionAddress(0),
        ));
        self.fixup_pair(to, saving);
    }

    /// Emit a `saveAddress` aimed at the shared terminal `fail` sink.
    ///
    /// Possessive quantifiers push this ratchet point so their exit-policy
    /// `clear` always has a save point of their own to pop.
    pub fn push_empty_save_point(&mut self) {
        let sink = match self.fail_sink {
            Some(token) => token,
            None => {
                let token = self.make_address();
                self.fail_sink = Some(token);
                token
            }
        };
        self.emit_save_address(sink);
    }

    /// Emit `moveCurrentPosition`.
    pub fn emit_move_current_position(&mut self, register: PositionRegister) {
        self.emit(Instruction::move_current_position(register));
    }

    /// Emit `advance`.
    pub fn emit_advance(&mut self, distance: u32) {
        self.emit(Instruction::advance(distance));
    }

    /// Emit `match` for one element, interning it.
    pub fn emit_match(&mut self, element: char, case_insensitive: bool) {
        let index = self.intern_element(element);
        self.emit(Instruction::match_element(index, case_insensitive));
    }

    /// Emit `matchScalar`.
    pub fn emit_match_scalar(&mut self, scalar: char, case_insensitive: bool, boundary_check: bool) {
        self.emit(Instruction::match_scalar(
            scalar,
            case_insensitive,
            boundary_check,
        ));
    }

    /// Emit `matchBitset`, interning the bitset.
    pub fn emit_match_bitset(&mut self, bitset: AsciiBitset, is_scalar: bool) {
        let index = self.intern_bitset(bitset);
        self.emit(Instruction::match_bitset(index, is_scalar));
    }

    /// Emit `matchBuiltin`.
    pub fn emit_match_builtin(&mut self, payload: BuiltinClassPayload) {
        self.emit(Instruction::match_builtin(payload));
    }

    /// Emit `consumeBy`, registering the function.
    pub fn emit_consume_by(&mut self, function: ConsumeFn) {
        let index = self.intern_consume_fn(function);
        self.emit(Instruction::consume_by(index));
    }

    /// Emit `assertBy`.
    pub fn emit_assert_by(&mut self, payload: AssertionPayload) {
        self.emit(Instruction::assert_by(payload));
    }

    /// Emit `matchBy` for an already-registered matcher.
    pub fn emit_match_by(&mut self, matcher: MatcherFnIndex, value: ValueRegister) {
        self.emit(Instruction::match_by(matcher, value));
    }

    /// Emit `beginCapture`.
    pub fn emit_begin_capture(&mut self, capture: CaptureRegister) {
        self.emit(Instruction::begin_capture(capture));
    }

    /// Emit `endCapture`.
    pub fn emit_end_capture(&mut self, capture: CaptureRegister) {
        self.emit(Instruction::end_capture(capture));
    }

    /// Emit `captureValue`.
    pub fn emit_capture_value(&mut self, value: ValueRegister, capture: CaptureRegister) {
        self.emit(Instruction::capture_value(value, capture));
    }

    /// Emit `transformCapture`.
    pub fn emit_transform_capture(
        &mut self,
        capture: CaptureRegister,
        transform: TransformFnIndex,
    ) {
        self.emit(Instruction::transform_capture(capture, transform));
    }

    /// Emit `backreference` to a known capture.
    pub fn emit_backreference(&mut self, capture: CaptureRegister) {
        self.emit(Instruction::backreference(capture));
    }

    /// Emit the `quantify` super-instruction.
    pub fn emit_quantify(&mut self, payload: QuantifyPayload) {
        self.emit(Instruction::quantify(payload));
    }

    // =========================================================================
    // Symbolic references
    // =========================================================================

    /// Record that the capture numbered `capture` carries reference id `id`.
    pub fn note_capture_reference(&mut self, id: ReferenceId, capture: CaptureRegister) {
        self.referenced_capture_offsets.insert(id, capture.0);
    }

    /// Emit a `backreference` whose capture number is not known yet.
    ///
    /// The placeholder is patched at assembly from the captures recorded by
    /// [`note_capture_reference`](Self::note_capture_reference).
    pub fn emit_unresolved_reference(&mut self, id: ReferenceId) {
        let site = self.instructions.len();
        self.emit(Instruction::backreference(CaptureRegister(0)));
        self.unresolved_references.entry(id).or_default().push(site);
    }

    // =========================================================================
    // Assembly
    // =========================================================================

    /// Set the options the program starts matching with.
    pub fn set_initial_options(&mut self, options: OptionFlags) {
        self.initial_options = options;
    }

    /// Resolve every pending label and reference and produce the program.
    pub fn assemble(mut self) -> CompileResult<Program> {
        // Materialize the shared fail sink, if any possessive quantifier
        // asked for one.
        if let Some(sink) = self.fail_sink.take() {
            self.label(sink);
            self.emit_fail();
        }

        // Patch symbolic backreferences with their capture numbers.
        for (id, sites) in &self.unresolved_references {
            let Some(&capture) = self.referenced_capture_offsets.get(id) else {
                return Err(CompileError::uncaptured(id.to_string()));
            };
            for &site in sites {
                self.instructions[site] =
                    self.instructions[site].with_capture_register(CaptureRegister(capture));
            }
        }

        // Patch forward branches. An unresolved token is a compiler bug, not
        // a user error.
        for fixup in &self.fixups {
            let first = self.address_tokens[fixup.first.0 as usize]
                .ok_or_else(|| CompileError::unreachable("unresolved address token"))?;
            let instruction = self.instructions[fixup.instruction];
            self.instructions[fixup.instruction] = match fixup.second {
                Some(second) => {
                    let saving = self.address_tokens[second.0 as usize]
                        .ok_or_else(|| CompileError::unreachable("unresolved address token"))?;
                    instruction.with_address_pair(first, saving)
                }
                None => instruction.with_address(first),
            };
        }

        Ok(Program {
            instructions: self.instructions.into_boxed_slice(),
            elements: self.elements.into_boxed_slice(),
            sequences: self.sequences.into_boxed_slice(),
            strings: self.strings.into_boxed_slice(),
            bitsets: self.bitsets.into_boxed_slice(),
            consume_functions: self.consume_functions.into_boxed_slice(),
            assertion_functions: self.assertion_functions.into_boxed_slice(),
            transform_functions: self.transform_functions.into_boxed_slice(),
            matcher_functions: self.matcher_functions.into_boxed_slice(),
            int_registers: self.int_registers.into_boxed_slice(),
            bool_register_count: self.next_bool_register as usize,
            position_register_count: self.next_position_register as usize,
            value_register_count: self.next_value_register as usize,
            capture_list: self.capture_list,
            referenced_capture_offsets: self.referenced_capture_offsets,
            initial_options: self.initial_options,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::Opcode;
    use super::*;

    fn builder() -> ProgramBuilder {
        ProgramBuilder::new(CaptureList::whole_match())
    }

    #[test]
    fn test_forward_branch_is_patched() {
        let mut b = builder();
        let done = b.make_address();
        b.emit_branch(done);
        b.emit_nop();
        b.label(done);
        b.emit_accept();

        let program = b.assemble().expect("assembles");
        assert_eq!(program.instructions[0].opcode(), Some(Opcode::Branch));
        assert_eq!(program.instructions[0].address(), InstructionAddress(2));
    }

    #[test]
    fn test_backward_branch_is_patched() {
        let mut b = builder();
        let top = b.make_address();
        b.label(top);
        b.emit_nop();
        b.emit_branch(top);

        let program = b.assemble().expect("assembles");
        assert_eq!(program.instructions[1].address(), InstructionAddress(0));
    }

    #[test]
    fn test_split_saving_patches_both_targets() {
        let mut b = builder();
        let to = b.make_address();
        let saving = b.make_address();
        b.emit_split_saving(to, saving);
        b.label(to);
        b.emit_nop();
        b.label(saving);
        b.emit_accept();

        let program = b.assemble().expect("assembles");
        assert_eq!(
            program.instructions[0].address_pair(),
            (InstructionAddress(1), InstructionAddress(2))
        );
    }

    #[test]
    fn test_unresolved_token_is_a_builder_bug() {
        let mut b = builder();
        let dangling = b.make_address();
        b.emit_branch(dangling);

        match b.assemble() {
            Err(CompileError::Unreachable(_)) => {}
            other => panic!("expected Unreachable, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_save_point_shares_one_fail_sink() {
        let mut b = builder();
        b.push_empty_save_point();
        b.emit_nop();
        b.push_empty_save_point();
        b.emit_accept();

        let program = b.assemble().expect("assembles");
        // One fail appended at the end, both saveAddress point at it.
        let sink = InstructionAddress(program.len() as u32 - 1);
        assert_eq!(program.instructions[sink.0 as usize].opcode(), Some(Opcode::Fail));
        assert_eq!(program.instructions[0].opcode(), Some(Opcode::SaveAddress));
        assert_eq!(program.instructions[0].address(), sink);
        assert_eq!(program.instructions[2].address(), sink);
    }

    #[test]
    fn test_no_fail_sink_without_empty_save_points() {
        let mut b = builder();
        b.emit_accept();
        let program = b.assemble().expect("assembles");
        assert_eq!(program.len(), 1);
    }

    #[test]
    fn test_element_interning_deduplicates() {
        let mut b = builder();
        let first = b.intern_element('x');
        let second = b.intern_element('x');
        let third = b.intern_element('y');
        assert_eq!(first, second);
        assert_ne!(first, third);
        assert_eq!(third, ElementIndex(1));
    }

    #[test]
    fn test_string_and_sequence_interning() {
        let mut b = builder();
        assert_eq!(b.intern_string("abc"), b.intern_string("abc"));
        assert_eq!(b.intern_sequence("abc"), b.intern_sequence("abc"));
        assert_ne!(b.intern_string("abc"), b.intern_string("abd"));
    }

    #[test]
    fn test_bitset_interning_deduplicates() {
        use weft_core::pattern::{CharacterClass, ClassMember};
        let bitset = CharacterClass::of([ClassMember::Char('a')])
            .ascii_bitset(false)
            .unwrap();
        let mut b = builder();
        assert_eq!(b.intern_bitset(bitset), b.intern_bitset(bitset));
    }

    #[test]
    fn test_registers_are_monotonic() {
        let mut b = builder();
        assert_eq!(b.alloc_int_register(3), IntRegister(0));
        assert_eq!(b.alloc_int_register(5), IntRegister(1));
        assert_eq!(b.alloc_position_register(), PositionRegister(0));
        assert_eq!(b.alloc_value_register(), ValueRegister(0));
        assert_eq!(b.alloc_capture_register(), CaptureRegister(0));
        assert_eq!(b.alloc_capture_register(), CaptureRegister(1));

        let program = b.assemble().expect("assembles");
        assert_eq!(&*program.int_registers, &[3, 5]);
        assert_eq!(program.position_register_count, 1);
        assert_eq!(program.value_register_count, 1);
    }

    #[test]
    fn test_symbolic_reference_resolves() {
        let mut b = builder();
        b.emit_unresolved_reference(9);
        b.note_capture_reference(9, CaptureRegister(2));
        b.emit_accept();

        let program = b.assemble().expect("assembles");
        assert_eq!(program.instructions[0].capture_register(), CaptureRegister(2));
        assert_eq!(program.referenced_capture_offsets.get(&9), Some(&2));
    }

    #[test]
    fn test_unresolved_symbolic_reference_fails() {
        let mut b = builder();
        b.emit_unresolved_reference(4);
        b.emit_accept();

        match b.assemble() {
            Err(CompileError::UncapturedReference(id)) => assert_eq!(id, "4"),
            other => panic!("expected UncapturedReference, got {other:?}"),
        }
    }

    #[test]
    fn test_assertion_fn_registration() {
        let mut b = builder();
        let index = b.intern_assertion_fn(Arc::new(|_, _| true));
        assert_eq!(index, AssertionFnIndex(0));
        b.emit_accept();
        let program = b.assemble().expect("assembles");
        assert_eq!(program.assertion_functions.len(), 1);
    }
}

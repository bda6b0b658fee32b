//! Quantifier lowering tests: the fast `quantify` specialization and the
//! general loop.

use weft_compiler::{CompileOptions, Compiler, Opcode, Program, QuantifyBody};
use weft_core::options::OptionFlags;
use weft_core::pattern::{
    Atom, BuiltinClass, CharacterClass, ClassKind, ClassMember, GroupKind, Node,
    QuantificationKind,
};

// ============================================================================
// Test utilities
// ============================================================================

fn compile(tree: &Node) -> Program {
    Compiler::compile(tree, OptionFlags::empty(), CompileOptions::empty())
        .expect("compilation should succeed")
}

fn compile_with(tree: &Node, options: OptionFlags) -> Program {
    Compiler::compile(tree, options, CompileOptions::empty())
        .expect("compilation should succeed")
}

fn ch(c: char) -> Node {
    Node::Atom(Atom::Char(c))
}

fn quant(low: u32, high: Option<u32>, kind: QuantificationKind, child: Node) -> Node {
    Node::Quantification {
        low,
        high,
        kind,
        child: Box::new(child),
    }
}

fn count_opcode(program: &Program, opcode: Opcode) -> usize {
    program
        .instructions
        .iter()
        .filter(|inst| inst.opcode() == Some(opcode))
        .count()
}

fn find_one(program: &Program, opcode: Opcode) -> weft_compiler::Instruction {
    let mut found = program
        .instructions
        .iter()
        .filter(|inst| inst.opcode() == Some(opcode));
    let inst = *found.next().unwrap_or_else(|| panic!("no {opcode:?}"));
    assert!(found.next().is_none(), "more than one {opcode:?}");
    inst
}

fn assert_no_general_loop(program: &Program) {
    assert_eq!(count_opcode(program, Opcode::SplitSaving), 0);
    assert_eq!(count_opcode(program, Opcode::Save), 0);
    assert_eq!(count_opcode(program, Opcode::CondBranchZeroElseDecrement), 0);
    assert_eq!(count_opcode(program, Opcode::MoveCurrentPosition), 0);
}

// ============================================================================
// Fast quantify
// ============================================================================

#[test]
fn test_eager_star_over_ascii_char() {
    // E4: `a*` collapses to one quantify instruction.
    let program = compile(&quant(0, None, QuantificationKind::Eager, ch('a')));
    assert_eq!(program.len(), 4);
    let payload = find_one(&program, Opcode::Quantify).quantify_payload();
    assert_eq!(payload.kind, QuantificationKind::Eager);
    assert_eq!(payload.min_trips, 0);
    assert_eq!(payload.extra_trips, None);
    assert_eq!(payload.body, QuantifyBody::AsciiChar(b'a'));
    assert_no_general_loop(&program);
}

#[test]
fn test_fast_quantify_trigger_grid() {
    // Every listed (shape, kind, bounds) combination must produce exactly
    // one quantify instruction and no loop scaffolding.
    let shapes: Vec<Node> = vec![
        ch('a'),
        Node::CustomCharacterClass(CharacterClass::of([ClassMember::Range('a', 'z')])),
        Node::Atom(Atom::Any),
        Node::Atom(Atom::AnyNonNewline),
        Node::Atom(Atom::Dot),
        Node::Atom(Atom::CharacterClass(BuiltinClass::new(ClassKind::Digit))),
    ];
    let kinds = [QuantificationKind::Eager, QuantificationKind::Possessive];
    let bounds: [(u32, Option<u32>); 4] = [(0, None), (1, None), (2, Some(5)), (0, Some(1))];

    for shape in &shapes {
        for &kind in &kinds {
            for &(low, high) in &bounds {
                let program = compile(&quant(low, high, kind, shape.clone()));
                assert_eq!(
                    count_opcode(&program, Opcode::Quantify),
                    1,
                    "shape {shape:?}, kind {kind:?}, bounds ({low}, {high:?})"
                );
                assert_no_general_loop(&program);
                assert_eq!(program.len(), 4);

                let payload = program.instructions[1].quantify_payload();
                assert_eq!(payload.kind, kind);
                assert_eq!(payload.min_trips as u32, low);
                assert_eq!(payload.extra_trips.map(u32::from), high.map(|h| h - low));
            }
        }
    }
}

#[test]
fn test_fast_quantify_unwraps_plain_groups() {
    let tree = quant(
        0,
        None,
        QuantificationKind::Eager,
        Node::NonCapturingGroup {
            kind: GroupKind::Plain,
            child: Box::new(Node::Concatenation(vec![ch('x')])),
        },
    );
    let program = compile(&tree);
    let payload = find_one(&program, Opcode::Quantify).quantify_payload();
    assert_eq!(payload.body, QuantifyBody::AsciiChar(b'x'));
}

#[test]
fn test_fast_quantify_bitset_body() {
    let tree = quant(
        1,
        None,
        QuantificationKind::Eager,
        Node::CustomCharacterClass(CharacterClass::of([ClassMember::Range('0', '9')])),
    );
    let program = compile(&tree);
    let payload = find_one(&program, Opcode::Quantify).quantify_payload();
    match payload.body {
        QuantifyBody::AsciiBitset(index) => {
            assert!(program.bitsets[index.0 as usize].matches('5'));
            assert!(!program.bitsets[index.0 as usize].matches('a'));
        }
        other => panic!("expected bitset body, got {other:?}"),
    }
}

#[test]
fn test_fast_quantify_dot_body_tracks_options() {
    let tree = quant(0, None, QuantificationKind::Eager, Node::Atom(Atom::Dot));
    let program = compile(&tree);
    assert_eq!(
        find_one(&program, Opcode::Quantify).quantify_payload().body,
        QuantifyBody::AnyNonNewline
    );

    let program = compile_with(&tree, OptionFlags::DOT_MATCHES_NEWLINE);
    assert_eq!(
        find_one(&program, Opcode::Quantify).quantify_payload().body,
        QuantifyBody::Any
    );
}

#[test]
fn test_default_kind_resolves_from_options() {
    let tree = quant(0, None, QuantificationKind::Default, ch('a'));

    // Default defaults to eager: fast path applies.
    let program = compile(&tree);
    assert_eq!(count_opcode(&program, Opcode::Quantify), 1);
    assert_eq!(
        find_one(&program, Opcode::Quantify).quantify_payload().kind,
        QuantificationKind::Eager
    );

    // Reluctant-by-default scope: no fast path, reluctant loop.
    let program = compile_with(&tree, OptionFlags::RELUCTANT_BY_DEFAULT);
    assert_eq!(count_opcode(&program, Opcode::Quantify), 0);
    assert_eq!(count_opcode(&program, Opcode::Save), 1);
}

// ============================================================================
// Fast-path refusals
// ============================================================================

#[test]
fn test_reluctant_never_fast_quantifies() {
    let program = compile(&quant(0, None, QuantificationKind::Reluctant, ch('a')));
    assert_eq!(count_opcode(&program, Opcode::Quantify), 0);
}

#[test]
fn test_scalar_semantics_disable_fast_quantify() {
    let program = compile_with(
        &quant(0, None, QuantificationKind::Eager, ch('a')),
        OptionFlags::UNICODE_SCALAR_SEMANTICS,
    );
    assert_eq!(count_opcode(&program, Opcode::Quantify), 0);
}

#[test]
fn test_case_insensitive_cased_char_disables_fast_quantify() {
    let program = compile_with(
        &quant(0, None, QuantificationKind::Eager, ch('a')),
        OptionFlags::CASE_INSENSITIVE,
    );
    assert_eq!(count_opcode(&program, Opcode::Quantify), 0);

    // An uncased ASCII char is still eligible.
    let program = compile_with(
        &quant(0, None, QuantificationKind::Eager, ch('7')),
        OptionFlags::CASE_INSENSITIVE,
    );
    assert_eq!(count_opcode(&program, Opcode::Quantify), 1);
}

#[test]
fn test_overlong_trip_counts_disable_fast_quantify() {
    let program = compile(&quant(300, None, QuantificationKind::Eager, ch('a')));
    assert_eq!(count_opcode(&program, Opcode::Quantify), 0);
    assert_eq!(count_opcode(&program, Opcode::CondBranchZeroElseDecrement), 1);
    assert_eq!(&*program.int_registers, &[300]);
}

#[test]
fn test_newline_sequence_class_disables_fast_quantify() {
    let tree = quant(
        0,
        None,
        QuantificationKind::Eager,
        Node::Atom(Atom::CharacterClass(BuiltinClass::new(
            ClassKind::NewlineSequence,
        ))),
    );
    let program = compile(&tree);
    assert_eq!(count_opcode(&program, Opcode::Quantify), 0);
}

#[test]
fn test_disabled_optimizations_use_general_loop() {
    let program = Compiler::compile(
        &quant(0, None, QuantificationKind::Eager, ch('a')),
        OptionFlags::empty(),
        CompileOptions::DISABLE_OPTIMIZATIONS,
    )
    .expect("compilation should succeed");
    assert_eq!(count_opcode(&program, Opcode::Quantify), 0);
    assert_eq!(count_opcode(&program, Opcode::SplitSaving), 1);
}

// ============================================================================
// No-op bounds
// ============================================================================

#[test]
fn test_zero_trip_quantifier_is_a_no_op() {
    let program = compile(&quant(0, Some(0), QuantificationKind::Eager, ch('a')));
    assert_eq!(program.len(), 3);
}

#[test]
fn test_inverted_bounds_are_a_no_op() {
    let program = compile(&quant(3, Some(2), QuantificationKind::Eager, ch('a')));
    assert_eq!(program.len(), 3);
}

// ============================================================================
// General loop structure
// ============================================================================

#[test]
fn test_reluctant_star_general_loop() {
    // E6: the quantifier inside `(.*?);` - reluctant loop, save(loopBody) in
    // the exit policy, no fast path.
    let tree = Node::Concatenation(vec![
        Node::Capture {
            name: None,
            reference: None,
            child: Box::new(quant(
                0,
                None,
                QuantificationKind::Reluctant,
                Node::Atom(Atom::Dot),
            )),
            transform: None,
        },
        ch(';'),
    ]);
    let program = compile(&tree);
    assert_eq!(count_opcode(&program, Opcode::Quantify), 0);

    // Layout: begin0 begin1 branch(exitPolicy) <dot> save(loopBody) end1 ...
    assert_eq!(program.instructions[2].opcode(), Some(Opcode::Branch));
    assert_eq!(program.instructions[2].address().0, 4);
    assert_eq!(program.instructions[3].opcode(), Some(Opcode::ConsumeBy));
    let save = find_one(&program, Opcode::Save);
    assert_eq!(save.address().0, 3, "reluctant save resumes at the loop body");
    // Dot guarantees forward progress: no zero-width guard needed.
    assert_eq!(count_opcode(&program, Opcode::MoveCurrentPosition), 0);
}

#[test]
fn test_bounded_general_loop_uses_trip_registers() {
    // a{2,5} with optimizations off: both counters materialize.
    let program = Compiler::compile(
        &quant(2, Some(5), QuantificationKind::Eager, ch('a')),
        OptionFlags::empty(),
        CompileOptions::DISABLE_OPTIMIZATIONS,
    )
    .expect("compilation should succeed");

    assert_eq!(&*program.int_registers, &[2, 3]);
    assert_eq!(count_opcode(&program, Opcode::CondBranchZeroElseDecrement), 2);
    // minTrips > 1 loops back to the counter check.
    assert_eq!(program.instructions[1].opcode(), Some(Opcode::CondBranchZeroElseDecrement));
    assert_eq!(program.instructions[3].opcode(), Some(Opcode::Branch));
    assert_eq!(program.instructions[3].address().0, 1);
    assert_eq!(count_opcode(&program, Opcode::SplitSaving), 1);
}

#[test]
fn test_exactly_n_loop_branches_straight_to_exit() {
    // a{2} = a{2,2}: extraTrips is zero, the exit policy is a plain branch.
    let program = Compiler::compile(
        &quant(2, Some(2), QuantificationKind::Eager, ch('a')),
        OptionFlags::empty(),
        CompileOptions::DISABLE_OPTIMIZATIONS,
    )
    .expect("compilation should succeed");
    assert_eq!(&*program.int_registers, &[2]);
    // One counter branch for minTrips, one unconditional branch to exit.
    assert_eq!(count_opcode(&program, Opcode::CondBranchZeroElseDecrement), 1);
}

#[test]
fn test_forward_progress_guard_on_zero_width_body() {
    // (?:(?=a))* can match zero-width forever; the loop pins the position.
    let tree = quant(
        0,
        None,
        QuantificationKind::Eager,
        Node::NonCapturingGroup {
            kind: GroupKind::Lookahead,
            child: Box::new(ch('a')),
        },
    );
    let program = compile(&tree);
    assert_eq!(count_opcode(&program, Opcode::MoveCurrentPosition), 1);
    assert_eq!(count_opcode(&program, Opcode::CondBranchSamePosition), 1);
    assert_eq!(program.position_register_count, 1);
}

#[test]
fn test_no_progress_guard_for_bounded_quantifier() {
    // Bounded repetition terminates regardless; no guard emitted.
    let tree = quant(
        0,
        Some(4),
        QuantificationKind::Eager,
        Node::NonCapturingGroup {
            kind: GroupKind::Lookahead,
            child: Box::new(ch('a')),
        },
    );
    let program = compile(&tree);
    assert_eq!(count_opcode(&program, Opcode::MoveCurrentPosition), 0);
}

#[test]
fn test_possessive_ratchet_in_general_loop() {
    // `é+` possessive: non-ASCII body forces the general path.
    let tree = quant(1, None, QuantificationKind::Possessive, ch('é'));
    let program = compile(&tree);

    assert_eq!(
        program
            .instructions
            .iter()
            .map(|inst| inst.opcode().unwrap())
            .collect::<Vec<_>>(),
        vec![
            Opcode::BeginCapture, // 0
            Opcode::SaveAddress,  // 1: ratchet -> fail sink
            Opcode::Match,        // 2: loop body
            Opcode::Clear,        // 3: exit policy pops the ratchet
            Opcode::SplitSaving,  // 4
            Opcode::EndCapture,   // 5
            Opcode::Accept,       // 6
            Opcode::Fail,         // 7: shared fail sink
        ]
    );
    // The ratchet's resume address is the terminal fail.
    assert_eq!(program.instructions[1].address().0, 7);
    let (to, saving) = program.instructions[4].address_pair();
    assert_eq!(to.0, 2);
    assert_eq!(saving.0, 5);
}

#[test]
fn test_plus_falls_through_min_trips_control() {
    // a+ with optimizations off: one mandatory trip, no counter register.
    let program = Compiler::compile(
        &quant(1, None, QuantificationKind::Eager, ch('a')),
        OptionFlags::empty(),
        CompileOptions::DISABLE_OPTIMIZATIONS,
    )
    .expect("compilation should succeed");
    assert!(program.int_registers.is_empty());
    assert_eq!(count_opcode(&program, Opcode::CondBranchZeroElseDecrement), 0);
    assert_eq!(count_opcode(&program, Opcode::SplitSaving), 1);
}

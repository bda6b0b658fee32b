//! Group lowering tests: lookaround and atomic scaffolds.

use weft_compiler::{CompileOptions, Compiler, Opcode, Program};
use weft_core::error::CompileError;
use weft_core::options::OptionFlags;
use weft_core::pattern::{Atom, GroupKind, Node};

// ============================================================================
// Test utilities
// ============================================================================

fn compile(tree: &Node) -> Program {
    Compiler::compile(tree, OptionFlags::empty(), CompileOptions::empty())
        .expect("compilation should succeed")
}

fn ch(c: char) -> Node {
    Node::Atom(Atom::Char(c))
}

fn group(kind: GroupKind, child: Node) -> Node {
    Node::NonCapturingGroup {
        kind,
        child: Box::new(child),
    }
}

fn opcodes(program: &Program) -> Vec<Opcode> {
    program
        .instructions
        .iter()
        .map(|inst| inst.opcode().expect("valid opcode"))
        .collect()
}

// ============================================================================
// Plain groups
// ============================================================================

#[test]
fn test_plain_group_is_transparent() {
    let program = compile(&group(GroupKind::Plain, ch('a')));
    assert_eq!(
        opcodes(&program),
        vec![
            Opcode::BeginCapture,
            Opcode::MatchScalar,
            Opcode::EndCapture,
            Opcode::Accept,
        ]
    );
}

// ============================================================================
// Lookahead
// ============================================================================

#[test]
fn test_positive_lookahead_scaffold() {
    let program = compile(&group(GroupKind::Lookahead, ch('a')));
    assert_eq!(
        opcodes(&program),
        vec![
            Opcode::BeginCapture,
            Opcode::Save,         // 1: success
            Opcode::Save,         // 2: intercept
            Opcode::MatchScalar,  // 3: child
            Opcode::ClearThrough, // 4
            Opcode::Fail,         // 5: child matched -> resume at success
            Opcode::Clear,        // 6: intercept: drop success
            Opcode::Fail,         // 7: propagate child failure
            Opcode::EndCapture,   // 8: success
            Opcode::Accept,
        ]
    );
    // success save point resumes after the scaffold, rewinding the input.
    assert_eq!(program.instructions[1].address().0, 8);
    // intercept save point resumes at the failure arm.
    assert_eq!(program.instructions[2].address().0, 6);
    assert_eq!(program.instructions[4].address().0, 6);
}

#[test]
fn test_negative_lookahead_scaffold() {
    let program = compile(&group(GroupKind::NegativeLookahead, ch('a')));
    assert_eq!(
        opcodes(&program),
        vec![
            Opcode::BeginCapture,
            Opcode::Save,         // 1: success
            Opcode::Save,         // 2: intercept
            Opcode::MatchScalar,  // 3: child
            Opcode::ClearThrough, // 4
            Opcode::Clear,        // 5: drop success - child matching means failure
            Opcode::Fail,         // 6: propagate
            Opcode::Fail,         // 7: intercept: child failed -> resume at success
            Opcode::EndCapture,   // 8: success
            Opcode::Accept,
        ]
    );
    assert_eq!(program.instructions[1].address().0, 8);
    assert_eq!(program.instructions[2].address().0, 7);
}

#[test]
fn test_backward_lookaround_is_unsupported() {
    for kind in [GroupKind::Lookbehind, GroupKind::NegativeLookbehind] {
        let tree = group(kind, ch('a'));
        let err =
            Compiler::compile(&tree, OptionFlags::empty(), CompileOptions::empty()).unwrap_err();
        assert!(matches!(err, CompileError::Unsupported(_)));
    }
}

// ============================================================================
// Atomic groups
// ============================================================================

#[test]
fn test_atomic_group_over_alternation() {
    // E5: `(?>a|b)`.
    let program = compile(&group(
        GroupKind::Atomic,
        Node::OrderedChoice(vec![ch('a'), ch('b')]),
    ));
    assert_eq!(
        opcodes(&program),
        vec![
            Opcode::BeginCapture,
            Opcode::SaveAddress,  // 1: success, resume-only
            Opcode::Save,         // 2: intercept
            Opcode::Save,         // 3: alternation: next
            Opcode::MatchScalar,  // 4: a
            Opcode::Branch,       // 5: alternation: done
            Opcode::MatchScalar,  // 6: b
            Opcode::ClearThrough, // 7: pop child save points
            Opcode::Fail,         // 8: -> success, committed
            Opcode::Clear,        // 9: intercept: drop success
            Opcode::Fail,         // 10: propagate failure
            Opcode::EndCapture,   // 11: success
            Opcode::Accept,
        ]
    );
    // Resume-only save point: a successful group cannot be re-entered.
    assert_eq!(program.instructions[1].opcode(), Some(Opcode::SaveAddress));
    assert_eq!(program.instructions[1].address().0, 11);
    assert_eq!(program.instructions[2].address().0, 9);
    assert_eq!(program.instructions[7].address().0, 9);
}

#[test]
fn test_atomic_group_does_not_use_fail_sink() {
    // The atomic scaffold's saveAddress targets its own success label, not
    // the shared possessive fail sink.
    let program = compile(&group(GroupKind::Atomic, ch('a')));
    assert_ne!(
        program.instructions[program.len() - 1].opcode(),
        Some(Opcode::Fail)
    );
}

//! Bytecode compiler for the Weft regex engine.
//!
//! This crate lowers a parsed pattern tree ([`weft_core::pattern::Node`]) to
//! a linear program of 64-bit instructions executed by a backtracking
//! matching VM.
//!
//! # Architecture
//!
//! ```text
//! Pattern tree → Code generation → Fixup resolution → Program
//! ```
//!
//! # Key types
//!
//! - [`Compiler`] - one-shot tree-to-program lowering
//! - [`ProgramBuilder`] - low-level emission, labels, registers, interning
//! - [`Instruction`] / [`Opcode`] - the 64-bit instruction word
//! - [`Program`] - the immutable compiled artifact
//!
//! # Example
//!
//! ```
//! use weft_compiler::{CompileOptions, Compiler, Opcode};
//! use weft_core::{Atom, Node, OptionFlags};
//!
//! let tree = Node::Atom(Atom::Char('a'));
//! let program = Compiler::compile(&tree, OptionFlags::empty(), CompileOptions::empty())
//!     .expect("compiles");
//! // Whole-match capture, the match itself, and accept.
//! assert_eq!(program.instructions.len(), 4);
//! assert_eq!(program.instructions[1].opcode(), Some(Opcode::MatchScalar));
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

pub mod bytecode;
pub mod codegen;

pub use bytecode::{
    AddressToken, AssertionFnIndex, AssertionPayload, BitsetIndex, BoolRegister,
    BuiltinClassPayload, CaptureRegister, ConsumeFnIndex, ElementIndex, Instruction,
    InstructionAddress, IntRegister,
    MatcherFnIndex, Opcode, PositionRegister, Program, ProgramBuilder, QuantifyBody,
    QuantifyPayload, SequenceIndex, StringIndex, TransformFnIndex, ValueRegister,
};
pub use codegen::{CompileOptions, Compiler};

//! Bytecode representation: instruction words, the program builder, and the
//! assembled program artifact.

pub mod builder;
pub mod instruction;
pub mod program;

pub use builder::{AddressToken, ProgramBuilder};
pub use instruction::{
    AssertionFnIndex, AssertionPayload, BitsetIndex, BoolRegister, BuiltinClassPayload,
    CaptureRegister,
    ConsumeFnIndex, ElementIndex, Instruction, InstructionAddress, IntRegister, MatcherFnIndex,
    Opcode, PositionRegister, QuantifyBody, QuantifyPayload, SequenceIndex, StringIndex,
    TransformFnIndex, ValueRegister,
};
pub use program::Program;

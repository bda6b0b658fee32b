//! Shared data model for the Weft regex engine.
//!
//! This crate defines the pieces that flow between the surface parser and the
//! bytecode compiler:
//!
//! - [`pattern::Node`] - the intermediate pattern tree produced by the parser
//! - [`options::MatchingOptions`] - scoped matching-option state
//! - [`capture::CaptureList`] - capture name/ordinal metadata
//! - [`error::CompileError`] - the compilation error surface
//!
//! The compiler itself lives in the `weft_compiler` crate.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

pub mod capture;
pub mod chars;
pub mod error;
pub mod options;
pub mod pattern;

pub use capture::{CaptureEntry, CaptureList};
pub use error::{CompileError, CompileResult};
pub use options::{
    MatchOption, MatchingOptionSequence, MatchingOptions, OptionFlags, SemanticLevel,
};
pub use pattern::{
    AsciiBitset, AssertionKind, Atom, BuiltinClass, CharacterClass, ClassKind, ClassMember,
    GroupKind, Node, QuantificationKind, Reference, ReferenceId,
};

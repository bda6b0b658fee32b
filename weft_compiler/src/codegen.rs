//! Tree-to-bytecode lowering.
//!
//! One [`Compiler`] is created per pattern, walks the tree once depth-first,
//! and drives a [`ProgramBuilder`]. Backtracking control flow (alternation,
//! quantification, lookaround, atomic groups) is expressed entirely through
//! the save-point protocol: `save` / `saveAddress` push resume points, `fail`
//! pops and resumes, `clear` / `clearThrough` discard commitments.
//!
//! Optimizations performed here:
//!
//! - ASCII characters and literals lower to `matchScalar` instead of the
//!   generic `match`, with the grapheme-boundary check elided on all but the
//!   final scalar of a run
//! - ASCII-convertible character classes lower to `matchBitset`
//! - simple quantified bodies collapse into a single `quantify`
//!   super-instruction the VM runs as a tight loop

use crate::bytecode::{
    AssertionPayload, BuiltinClassPayload, CaptureRegister, Program, ProgramBuilder, QuantifyBody,
    QuantifyPayload, ValueRegister,
};
use std::ops::Range;
use std::sync::Arc;
use weft_core::capture::CaptureList;
use weft_core::chars;
use weft_core::error::{CompileError, CompileResult};
use weft_core::options::{MatchingOptionSequence, MatchingOptions, OptionFlags, SemanticLevel};
use weft_core::pattern::{
    AssertionKind, Atom, BuiltinClass, CharacterClass, ConsumeFn, GroupKind, MatcherFn, Node,
    QuantificationKind, Reference,
};

bitflags::bitflags! {
    /// Switches controlling compilation behavior.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CompileOptions: u32 {
        /// Emit only the general code paths: no `matchScalar` fast paths, no
        /// bitsets, no `quantify` super-instructions.
        const DISABLE_OPTIMIZATIONS = 1 << 0;
    }
}

/// One-shot code generator for a pattern tree.
pub struct Compiler {
    builder: ProgramBuilder,
    options: MatchingOptions,
    /// Options in effect at match start; updated by option changes emitted
    /// ahead of the first matchable atom.
    initial_options: OptionFlags,
    compile_options: CompileOptions,
    emitted_matchable: bool,
}

impl Compiler {
    /// Compile a pattern tree, deriving its capture list from the tree.
    pub fn compile(
        tree: &Node,
        initial_options: OptionFlags,
        compile_options: CompileOptions,
    ) -> CompileResult<Program> {
        Self::compile_with_captures(
            tree,
            CaptureList::from_tree(tree),
            initial_options,
            compile_options,
        )
    }

    /// Compile a pattern tree against a parser-built capture list.
    pub fn compile_with_captures(
        tree: &Node,
        capture_list: CaptureList,
        initial_options: OptionFlags,
        compile_options: CompileOptions,
    ) -> CompileResult<Program> {
        let mut compiler = Compiler {
            builder: ProgramBuilder::new(capture_list),
            options: MatchingOptions::new(initial_options),
            initial_options,
            compile_options,
            emitted_matchable: false,
        };
        compiler.emit_root(tree)?;
        compiler.builder.set_initial_options(compiler.initial_options);
        compiler.builder.assemble()
    }

    /// Wrap the tree in the implicit whole-match capture and finish with
    /// `accept`.
    fn emit_root(&mut self, root: &Node) -> CompileResult<()> {
        let whole_match = self.builder.alloc_capture_register();
        self.builder.emit_begin_capture(whole_match);
        let value = self.emit_node(root)?;
        self.builder.emit_end_capture(whole_match);
        if let Some(value) = value {
            self.builder.emit_capture_value(value, whole_match);
        }
        self.builder.emit_accept();

        if self.builder.capture_registers_allocated() != self.builder.capture_list().len() {
            return Err(CompileError::unreachable(
                "capture registers diverge from the capture list",
            ));
        }
        Ok(())
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Emit one node. Returns the value register a matcher produced, so an
    /// enclosing capture can override its captured value.
    fn emit_node(&mut self, node: &Node) -> CompileResult<Option<ValueRegister>> {
        match node {
            Node::Concatenation(children) => {
                for child in children {
                    self.emit_node(child)?;
                }
                Ok(None)
            }
            Node::OrderedChoice(children) => {
                self.emit_alternation(children)?;
                Ok(None)
            }
            Node::Capture {
                reference,
                child,
                transform,
                ..
            } => {
                self.emit_capture(*reference, child, transform.as_ref())?;
                Ok(None)
            }
            Node::NonCapturingGroup { kind, child } => self.emit_group(kind, child),
            Node::Quantification {
                low,
                high,
                kind,
                child,
            } => {
                self.emit_quantification(*low, *high, *kind, child)?;
                Ok(None)
            }
            Node::Atom(atom) => {
                self.emit_atom(atom)?;
                Ok(None)
            }
            Node::CustomCharacterClass(class) => {
                self.emit_custom_character_class(class)?;
                Ok(None)
            }
            Node::QuotedLiteral(literal) => {
                self.emit_quoted_literal(literal);
                Ok(None)
            }
            Node::Matcher(function) => Ok(Some(self.emit_matcher(function))),
            Node::Trivia | Node::Empty => Ok(None),
        }
    }

    // =========================================================================
    // Atoms
    // =========================================================================

    fn emit_atom(&mut self, atom: &Atom) -> CompileResult<()> {
        match atom {
            Atom::Any => self.emit_any(),
            Atom::AnyNonNewline => self.emit_any_non_newline(),
            Atom::Dot => self.emit_dot(),
            Atom::Char(c) => self.emit_char(*c),
            Atom::Scalar(scalar) => self.emit_scalar_atom(*scalar),
            Atom::CharacterClass(builtin) => self.emit_builtin_class(*builtin),
            Atom::Assertion(kind) => return self.emit_assertion(*kind),
            Atom::Backreference(reference) => return self.emit_backreference(reference),
            Atom::SymbolicReference(id) => {
                self.mark_matchable();
                self.builder.emit_unresolved_reference(*id);
            }
            Atom::ChangeMatchingOptions(seq) => self.apply_option_sequence(seq),
            Atom::Unconverted(name) => {
                return Err(CompileError::unsupported(name.to_string()));
            }
        }
        Ok(())
    }

    fn emit_char(&mut self, c: char) {
        self.mark_matchable();
        let opts = self.options.current();
        if opts.semantic_level() == SemanticLevel::UnicodeScalar {
            let ci = opts.is_case_insensitive() && chars::is_cased(c);
            self.builder.emit_match_scalar(c, ci, false);
        } else if opts.is_case_insensitive() && chars::is_cased(c) {
            if self.optimizations_enabled() && c.is_ascii() {
                self.builder.emit_match_scalar(c, true, true);
            } else {
                // Case folding may change scalar counts; match the whole
                // element.
                self.builder.emit_match(c, true);
            }
        } else if self.optimizations_enabled() && c.is_ascii() {
            // The boundary check belongs on a character's final scalar only;
            // a char is a single scalar, so it lands here.
            self.builder.emit_match_scalar(c, false, true);
        } else {
            self.builder.emit_match(c, false);
        }
    }

    fn emit_scalar_atom(&mut self, scalar: char) {
        let opts = self.options.current();
        if opts.semantic_level() == SemanticLevel::UnicodeScalar {
            self.mark_matchable();
            let ci = opts.is_case_insensitive() && chars::is_cased(scalar);
            self.builder.emit_match_scalar(scalar, ci, false);
        } else {
            // At grapheme level an explicit scalar matches as its character.
            self.emit_char(scalar);
        }
    }

    fn emit_any(&mut self) {
        self.mark_matchable();
        match self.options.current().semantic_level() {
            SemanticLevel::GraphemeCluster => self.builder.emit_advance(1),
            SemanticLevel::UnicodeScalar => {
                let consumer: ConsumeFn = Arc::new(|input, range: Range<usize>| {
                    let c = input.get(range.clone())?.chars().next()?;
                    Some(range.start + c.len_utf8())
                });
                self.builder.emit_consume_by(consumer);
            }
        }
    }

    fn emit_any_non_newline(&mut self) {
        self.mark_matchable();
        let consumer: ConsumeFn = Arc::new(|input, range: Range<usize>| {
            let c = input.get(range.clone())?.chars().next()?;
            if chars::is_newline(c) {
                None
            } else {
                Some(range.start + c.len_utf8())
            }
        });
        self.builder.emit_consume_by(consumer);
    }

    fn emit_dot(&mut self) {
        if self.options.current().dot_matches_newline() {
            self.emit_any();
        } else {
            self.emit_any_non_newline();
        }
    }

    fn emit_builtin_class(&mut self, builtin: BuiltinClass) {
        self.mark_matchable();
        let opts = self.options.current();
        let payload = BuiltinClassPayload {
            kind: builtin.kind,
            inverted: builtin.inverted,
            strict_ascii: self.strict_ascii_for(builtin),
            is_scalar: opts.semantic_level() == SemanticLevel::UnicodeScalar,
        };
        self.builder.emit_match_builtin(payload);
    }

    fn emit_assertion(&mut self, kind: AssertionKind) -> CompileResult<()> {
        if kind == AssertionKind::ResetStartOfMatch {
            return Err(CompileError::unsupported("\\K (reset match start)"));
        }
        // firstMatchingPositionInSubject has no search-bound context here;
        // the VM treats its assertion as always failing.
        self.mark_matchable();
        let opts = self.options.current();
        let payload = AssertionPayload {
            kind,
            anchors_match_newlines: opts.anchors_match_newlines(),
            uses_simple_unicode_boundaries: opts.uses_simple_unicode_boundaries(),
            uses_ascii_word: opts.uses_ascii_word(),
            is_scalar_semantics: opts.semantic_level() == SemanticLevel::UnicodeScalar,
        };
        self.builder.emit_assert_by(payload);
        Ok(())
    }

    fn emit_backreference(&mut self, reference: &Reference) -> CompileResult<()> {
        match reference {
            Reference::RecurseWholePattern => {
                Err(CompileError::unsupported("whole-pattern recursion"))
            }
            Reference::Relative(_) => Err(CompileError::unsupported("relative backreference")),
            Reference::Index(index) => {
                if *index as usize >= self.builder.capture_list().len() {
                    return Err(CompileError::uncaptured(index.to_string()));
                }
                self.mark_matchable();
                self.builder
                    .emit_backreference(CaptureRegister(*index as u16));
                Ok(())
            }
            Reference::Named(name) => {
                let Some(index) = self.builder.capture_list().index_of_name(name) else {
                    return Err(CompileError::uncaptured(name.to_string()));
                };
                self.mark_matchable();
                self.builder.emit_backreference(CaptureRegister(index));
                Ok(())
            }
        }
    }

    // =========================================================================
    // Groups and alternation
    // =========================================================================

    /// Alternation tries children in order; every non-final child runs under
    /// a save point restoring to the next alternative.
    fn emit_alternation(&mut self, children: &[Node]) -> CompileResult<()> {
        let Some((last, rest)) = children.split_last() else {
            // Parsers may produce empty alternations.
            return Ok(());
        };
        let done = self.builder.make_address();
        for child in rest {
            let next = self.builder.make_address();
            self.builder.emit_save(next);
            self.emit_node(child)?;
            self.builder.emit_branch(done);
            self.builder.label(next);
        }
        self.emit_node(last)?;
        self.builder.label(done);
        Ok(())
    }

    fn emit_capture(
        &mut self,
        reference: Option<weft_core::pattern::ReferenceId>,
        child: &Node,
        transform: Option<&weft_core::pattern::TransformFn>,
    ) -> CompileResult<()> {
        self.with_scope(|this| {
            let capture = this.builder.alloc_capture_register();
            if let Some(id) = reference {
                this.builder.note_capture_reference(id, capture);
            }
            this.builder.emit_begin_capture(capture);
            let value = this.emit_node(child)?;
            this.builder.emit_end_capture(capture);
            if let Some(value) = value {
                this.builder.emit_capture_value(value, capture);
            }
            if let Some(transform) = transform {
                let index = this.builder.intern_transform_fn(Arc::clone(transform));
                this.builder.emit_transform_capture(capture, index);
            }
            Ok(())
        })
    }

    fn emit_group(
        &mut self,
        kind: &GroupKind,
        child: &Node,
    ) -> CompileResult<Option<ValueRegister>> {
        self.with_scope(|this| match kind {
            GroupKind::Plain => this.emit_node(child),
            GroupKind::Atomic => {
                this.emit_atomic(child)?;
                Ok(None)
            }
            GroupKind::Lookahead => {
                this.emit_lookaround(child, true)?;
                Ok(None)
            }
            GroupKind::NegativeLookahead => {
                this.emit_lookaround(child, false)?;
                Ok(None)
            }
            GroupKind::Lookbehind | GroupKind::NegativeLookbehind => {
                Err(CompileError::unsupported("backward lookaround"))
            }
            GroupKind::ChangeMatchingOptions(seq) => {
                this.apply_option_sequence(seq);
                this.emit_node(child)
            }
        })
    }

    /// Zero-width lookaround: the child runs between two save points so the
    /// input position rewinds no matter how it ends.
    ///
    /// ```text
    ///       save(success)
    ///       save(intercept)
    ///       <child>
    ///       clearThrough(intercept)
    ///       [negative: clear]
    ///       fail
    /// intercept:
    ///       [positive: clear]
    ///       fail
    /// success:
    /// ```
    fn emit_lookaround(&mut self, child: &Node, positive: bool) -> CompileResult<()> {
        let success = self.builder.make_address();
        let intercept = self.builder.make_address();

        self.builder.emit_save(success);
        self.builder.emit_save(intercept);
        self.emit_node(child)?;
        self.builder.emit_clear_through(intercept);
        if !positive {
            self.builder.emit_clear();
        }
        self.builder.emit_fail();

        self.builder.label(intercept);
        if positive {
            self.builder.emit_clear();
        }
        self.builder.emit_fail();

        self.builder.label(success);
        Ok(())
    }

    /// Atomic group: `saveAddress` (not `save`) for the success path, so a
    /// successful child commits its progress and cannot be re-entered.
    ///
    /// ```text
    ///       saveAddress(success)
    ///       save(intercept)
    ///       <child>
    ///       clearThrough(intercept)
    ///       fail
    /// intercept:
    ///       clear
    ///       fail
    /// success:
    /// ```
    fn emit_atomic(&mut self, child: &Node) -> CompileResult<()> {
        let success = self.builder.make_address();
        let intercept = self.builder.make_address();

        self.builder.emit_save_address(success);
        self.builder.emit_save(intercept);
        self.emit_node(child)?;
        self.builder.emit_clear_through(intercept);
        self.builder.emit_fail();

        self.builder.label(intercept);
        self.builder.emit_clear();
        self.builder.emit_fail();

        self.builder.label(success);
        Ok(())
    }

    // =========================================================================
    // Quantification
    // =========================================================================

    fn emit_quantification(
        &mut self,
        low: u32,
        high: Option<u32>,
        kind: QuantificationKind,
        child: &Node,
    ) -> CompileResult<()> {
        // Silent no-ops the parser is allowed to produce.
        if high == Some(0) || high.is_some_and(|h| low > h) {
            return Ok(());
        }
        let kind = match kind {
            QuantificationKind::Default => self.options.current().default_quantification(),
            explicit => explicit,
        };
        let min_trips = low;
        let extra_trips = high.map(|h| h - low);

        if self.try_emit_fast_quantify(min_trips, extra_trips, kind, child) {
            return Ok(());
        }

        let min_register = (min_trips > 1).then(|| self.builder.alloc_int_register(min_trips));
        let extra_register = match extra_trips {
            Some(extra) if extra > 0 => Some(self.builder.alloc_int_register(extra)),
            _ => None,
        };
        if kind == QuantificationKind::Possessive {
            // The ratchet: gives the exit-policy `clear` a save point that
            // belongs to this quantifier.
            self.builder.push_empty_save_point();
        }

        let min_trips_control = self.builder.make_address();
        let loop_body = self.builder.make_address();
        let exit_policy = self.builder.make_address();
        let exit = self.builder.make_address();

        self.builder.label(min_trips_control);
        match min_trips {
            0 => self.builder.emit_branch(exit_policy),
            1 => {}
            _ => {
                let register = min_register.expect("allocated when minTrips > 1");
                self.builder
                    .emit_cond_branch_zero_else_decrement(exit_policy, register);
            }
        }

        self.builder.label(loop_body);
        // An unbounded loop over a body that can match zero-width would spin
        // forever; pin the position and bail out when a trip does not move.
        let start_position = (extra_trips.is_none() && !guarantees_forward_progress(child))
            .then(|| {
                let register = self.builder.alloc_position_register();
                self.builder.emit_move_current_position(register);
                register
            });
        self.emit_node(child)?;
        if let Some(register) = start_position {
            self.builder.emit_cond_branch_same_position(exit, register);
        }
        if min_trips > 1 {
            self.builder.emit_branch(min_trips_control);
        }

        self.builder.label(exit_policy);
        match extra_trips {
            None => {}
            Some(0) => self.builder.emit_branch(exit),
            Some(_) => {
                let register = extra_register.expect("allocated when extraTrips > 0");
                self.builder.emit_cond_branch_zero_else_decrement(exit, register);
            }
        }
        match kind {
            QuantificationKind::Eager => self.builder.emit_split_saving(loop_body, exit),
            QuantificationKind::Possessive => {
                self.builder.emit_clear();
                self.builder.emit_split_saving(loop_body, exit);
            }
            QuantificationKind::Reluctant => self.builder.emit_save(loop_body),
            QuantificationKind::Default => unreachable!("resolved above"),
        }
        self.builder.label(exit);
        Ok(())
    }

    /// Try to collapse the quantifier into a single `quantify` instruction.
    fn try_emit_fast_quantify(
        &mut self,
        min_trips: u32,
        extra_trips: Option<u32>,
        kind: QuantificationKind,
        child: &Node,
    ) -> bool {
        if !self.optimizations_enabled() || kind == QuantificationKind::Reluctant {
            return false;
        }
        if self.options.current().semantic_level() != SemanticLevel::GraphemeCluster {
            return false;
        }
        let max = QuantifyPayload::MAX_STORABLE_TRIPS as u32;
        if min_trips > max || extra_trips.is_some_and(|e| e > max) {
            return false;
        }
        let Some(body) = self.fast_quantify_body(child) else {
            return false;
        };
        self.mark_matchable();
        self.builder.emit_quantify(QuantifyPayload {
            kind,
            min_trips: min_trips as u16,
            extra_trips: extra_trips.map(|e| e as u16),
            body,
        });
        true
    }

    /// The `quantify` body for a subtree, if it is simple enough for the
    /// VM's tight loop. Unwraps plain groups and single-child concatenations.
    fn fast_quantify_body(&mut self, node: &Node) -> Option<QuantifyBody> {
        let opts = self.options.current();
        match node {
            Node::NonCapturingGroup {
                kind: GroupKind::Plain,
                child,
            } => self.fast_quantify_body(child),
            Node::Concatenation(children) if children.len() == 1 => {
                self.fast_quantify_body(&children[0])
            }
            Node::QuotedLiteral(literal) => {
                let mut scalars = literal.chars();
                match (scalars.next(), scalars.next()) {
                    (Some(c), None) => self.fast_ascii_char(c),
                    _ => None,
                }
            }
            Node::Atom(Atom::Char(c)) => self.fast_ascii_char(*c),
            Node::Atom(Atom::Any) => Some(QuantifyBody::Any),
            Node::Atom(Atom::AnyNonNewline) => Some(QuantifyBody::AnyNonNewline),
            Node::Atom(Atom::Dot) => Some(self.fast_dot_body()),
            Node::Atom(Atom::CharacterClass(builtin)) if builtin.consumes_single_grapheme() => {
                Some(QuantifyBody::Builtin {
                    kind: builtin.kind,
                    inverted: builtin.inverted,
                    strict_ascii: self.strict_ascii_for(*builtin),
                })
            }
            Node::CustomCharacterClass(class) => {
                if class.is_plain_any() {
                    return Some(self.fast_dot_body());
                }
                if class.is_inverted_any() {
                    return None;
                }
                class
                    .ascii_bitset(opts.is_case_insensitive())
                    .map(|bitset| QuantifyBody::AsciiBitset(self.builder.intern_bitset(bitset)))
            }
            _ => None,
        }
    }

    fn fast_dot_body(&self) -> QuantifyBody {
        if self.options.current().dot_matches_newline() {
            QuantifyBody::Any
        } else {
            QuantifyBody::AnyNonNewline
        }
    }

    fn fast_ascii_char(&self, c: char) -> Option<QuantifyBody> {
        let opts = self.options.current();
        if c.is_ascii() && !(opts.is_case_insensitive() && chars::is_cased(c)) {
            Some(QuantifyBody::AsciiChar(c as u8))
        } else {
            None
        }
    }

    // =========================================================================
    // Character classes, literals, matchers
    // =========================================================================

    fn emit_custom_character_class(&mut self, class: &CharacterClass) -> CompileResult<()> {
        if class.is_inverted_any() {
            return Err(CompileError::unsupported("inverted 'any' character class"));
        }
        if class.is_plain_any() {
            self.emit_dot();
            return Ok(());
        }
        self.mark_matchable();
        let opts = self.options.current();
        if self.optimizations_enabled() {
            if let Some(bitset) = class.ascii_bitset(opts.is_case_insensitive()) {
                let is_scalar = opts.semantic_level() == SemanticLevel::UnicodeScalar;
                self.builder.emit_match_bitset(bitset, is_scalar);
                return Ok(());
            }
        }
        let class = class.clone();
        let case_insensitive = opts.is_case_insensitive();
        let consumer: ConsumeFn = Arc::new(move |input, range: Range<usize>| {
            let c = input.get(range.clone())?.chars().next()?;
            class
                .matches(c, case_insensitive)
                .then(|| range.start + c.len_utf8())
        });
        self.builder.emit_consume_by(consumer);
        Ok(())
    }

    fn emit_quoted_literal(&mut self, literal: &str) {
        if literal.is_empty() {
            return;
        }
        let opts = self.options.current();
        if opts.semantic_level() == SemanticLevel::GraphemeCluster
            && self.optimizations_enabled()
            && literal.is_ascii()
        {
            self.mark_matchable();
            let ci = opts.is_case_insensitive();
            // ASCII, so byte positions are scalar positions; check the
            // grapheme boundary only after the final scalar.
            let last = literal.len() - 1;
            for (index, c) in literal.char_indices() {
                self.builder
                    .emit_match_scalar(c, ci && chars::is_cased(c), index == last);
            }
            return;
        }
        for c in literal.chars() {
            self.emit_char(c);
        }
    }

    fn emit_matcher(&mut self, function: &MatcherFn) -> ValueRegister {
        self.mark_matchable();
        let index = self.builder.intern_matcher_fn(Arc::clone(function));
        let value = self.builder.alloc_value_register();
        self.builder.emit_match_by(index, value);
        value
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn with_scope<T>(
        &mut self,
        body: impl FnOnce(&mut Self) -> CompileResult<T>,
    ) -> CompileResult<T> {
        self.options.begin_scope();
        let result = body(self);
        self.options.end_scope();
        result
    }

    fn apply_option_sequence(&mut self, seq: &MatchingOptionSequence) {
        // Ahead of the first matchable atom, the change also takes effect at
        // match start.
        if !self.emitted_matchable {
            self.initial_options = self.initial_options.applying(seq);
        }
        self.options.apply(seq);
    }

    #[inline]
    fn mark_matchable(&mut self) {
        self.emitted_matchable = true;
    }

    #[inline]
    fn optimizations_enabled(&self) -> bool {
        !self
            .compile_options
            .contains(CompileOptions::DISABLE_OPTIMIZATIONS)
    }

    fn strict_ascii_for(&self, builtin: BuiltinClass) -> bool {
        matches!(builtin.kind, weft_core::pattern::ClassKind::Word)
            && self.options.current().uses_ascii_word()
    }
}

/// Whether matching the subtree always advances the input.
///
/// Used to decide if an unbounded quantifier needs the position-equality
/// guard against zero-width loops.
fn guarantees_forward_progress(node: &Node) -> bool {
    match node {
        Node::OrderedChoice(children) => {
            !children.is_empty() && children.iter().all(guarantees_forward_progress)
        }
        Node::Concatenation(children) => children.iter().any(guarantees_forward_progress),
        Node::Capture { child, .. } => guarantees_forward_progress(child),
        Node::NonCapturingGroup { kind, child } => match kind {
            GroupKind::Lookahead
            | GroupKind::NegativeLookahead
            | GroupKind::Lookbehind
            | GroupKind::NegativeLookbehind => false,
            _ => guarantees_forward_progress(child),
        },
        Node::Quantification { low, child, .. } => *low >= 1 && guarantees_forward_progress(child),
        Node::Atom(atom) => !matches!(atom, Atom::ChangeMatchingOptions(_) | Atom::Assertion(_)),
        Node::QuotedLiteral(literal) => !literal.is_empty(),
        Node::CustomCharacterClass(_) => true,
        Node::Matcher(_) | Node::Trivia | Node::Empty => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_core::options::MatchOption;
    use weft_core::pattern::ClassKind;

    fn ch(c: char) -> Node {
        Node::Atom(Atom::Char(c))
    }

    #[test]
    fn test_forward_progress_atoms() {
        assert!(guarantees_forward_progress(&ch('a')));
        assert!(guarantees_forward_progress(&Node::Atom(Atom::Any)));
        assert!(!guarantees_forward_progress(&Node::Atom(Atom::Assertion(
            AssertionKind::WordBoundary
        ))));
        assert!(!guarantees_forward_progress(&Node::Atom(
            Atom::ChangeMatchingOptions(MatchingOptionSequence::adding([
                MatchOption::CaseInsensitive
            ]))
        )));
    }

    #[test]
    fn test_forward_progress_containers() {
        // Alternation: every branch must progress.
        assert!(guarantees_forward_progress(&Node::OrderedChoice(vec![
            ch('a'),
            ch('b')
        ])));
        assert!(!guarantees_forward_progress(&Node::OrderedChoice(vec![
            ch('a'),
            Node::Empty
        ])));
        assert!(!guarantees_forward_progress(&Node::OrderedChoice(vec![])));

        // Concatenation: one progressing child suffices.
        assert!(guarantees_forward_progress(&Node::Concatenation(vec![
            Node::Empty,
            ch('a')
        ])));
        assert!(!guarantees_forward_progress(&Node::Concatenation(vec![
            Node::Empty,
            Node::Trivia
        ])));
    }

    #[test]
    fn test_forward_progress_quantification_and_groups() {
        let starred = Node::Quantification {
            low: 0,
            high: None,
            kind: QuantificationKind::Eager,
            child: Box::new(ch('a')),
        };
        assert!(!guarantees_forward_progress(&starred));

        let plus = Node::Quantification {
            low: 1,
            high: None,
            kind: QuantificationKind::Eager,
            child: Box::new(ch('a')),
        };
        assert!(guarantees_forward_progress(&plus));

        let lookahead = Node::NonCapturingGroup {
            kind: GroupKind::Lookahead,
            child: Box::new(ch('a')),
        };
        assert!(!guarantees_forward_progress(&lookahead));
    }

    #[test]
    fn test_forward_progress_literals_and_classes() {
        assert!(guarantees_forward_progress(&Node::QuotedLiteral(
            "abc".into()
        )));
        assert!(!guarantees_forward_progress(&Node::QuotedLiteral("".into())));
        assert!(guarantees_forward_progress(&Node::CustomCharacterClass(
            CharacterClass::of([weft_core::pattern::ClassMember::Char('a')])
        )));
        assert!(!guarantees_forward_progress(&Node::Matcher(Arc::new(
            |_, _| None
        ))));
    }

    #[test]
    fn test_builtin_single_grapheme_rule() {
        let digit = BuiltinClass::new(ClassKind::Digit);
        assert!(digit.consumes_single_grapheme());
        let newline = BuiltinClass::new(ClassKind::NewlineSequence);
        assert!(!newline.consumes_single_grapheme());
    }
}

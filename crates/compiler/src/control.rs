//! Control-flow code generation
//!
//! Nested statements are flattened into labelled branches by a stack of
//! [`Frame`]s. A frame is *explicit* when its body is a `{ … }` block and
//! *implicit* when the body is a single brace-less statement. Implicit frames
//! whose statement is complete are closed when the next statement starts, or
//! before the `}` of the enclosing block.
//!
//! Closing an `if`/`else if` frame looks at the next token: an `else` keeps
//! the if-chain open, so the chain-end label is only marked when the last
//! arm of the family closes.

use crate::body::BodyCompiler;
use crate::emit::{Label, Op};
use crate::error::{Diagnostic, Result};
use crate::lexer::{Keyword, Token, TokenKind};
use std::collections::BTreeMap;
use std::fmt;

/// Why a label was allocated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelPurpose {
    /// Target of a failed `if`/`else if` condition
    IfFalse,
    /// Convergence point of an if/else-if/else family
    IfChainEnd,
    /// Start of a `for` or `do` body
    LoopTop,
    /// Re-test point of a loop condition
    LoopContinue,
    /// First position after a loop
    LoopEnd,
    /// `@name` label in script source
    User(String),
}

impl fmt::Display for LabelPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelPurpose::IfFalse => f.write_str("condition-false target"),
            LabelPurpose::IfChainEnd => f.write_str("end of if-chain"),
            LabelPurpose::LoopTop => f.write_str("loop top"),
            LabelPurpose::LoopContinue => f.write_str("loop continue"),
            LabelPurpose::LoopEnd => f.write_str("loop end"),
            LabelPurpose::User(name) => write!(f, "user label '@{}'", name),
        }
    }
}

#[derive(Debug, Clone)]
struct LabelRecord {
    purpose: LabelPurpose,
    construct: &'static str,
    line: usize,
    marked_at: Option<usize>,
}

/// Every label allocated while compiling one body
#[derive(Debug, Default)]
pub struct LabelBook {
    records: BTreeMap<Label, LabelRecord>,
}

impl LabelBook {
    pub fn record(&mut self, label: Label, purpose: LabelPurpose, construct: &'static str, line: usize) {
        self.records.insert(
            label,
            LabelRecord {
                purpose,
                construct,
                line,
                marked_at: None,
            },
        );
    }

    /// Note that `label` was bound at `line`; binding twice is a compiler defect
    pub fn mark(&mut self, label: Label, line: usize) -> Result<()> {
        let Some(record) = self.records.get_mut(&label) else {
            return Err(Diagnostic::internal(line, format!("label {} was never allocated", label)));
        };
        if let Some(previous) = record.marked_at {
            return Err(Diagnostic::internal(
                line,
                format!(
                    "label {} ({} of \"{}\" at line {}) resolved twice, first at line {}",
                    label, record.purpose, record.construct, record.line, previous
                ),
            ));
        }
        record.marked_at = Some(line);
        Ok(())
    }

    pub fn is_marked(&self, label: Label) -> bool {
        self.records.get(&label).is_some_and(|r| r.marked_at.is_some())
    }

    pub fn purpose(&self, label: Label) -> Option<&LabelPurpose> {
        self.records.get(&label).map(|r| &r.purpose)
    }

    /// Fail if any of `labels` is still unresolved
    pub fn expect_marked(&self, labels: &[Label], line: usize) -> Result<()> {
        match labels.iter().find(|l| !self.is_marked(**l)) {
            Some(label) => Err(self.unresolved(*label, line)),
            None => Ok(()),
        }
    }

    /// Fail on the first label of the body that was never resolved
    pub fn expect_all_marked(&self, line: usize) -> Result<()> {
        match self.records.iter().find(|(_, r)| r.marked_at.is_none()) {
            Some((label, _)) => Err(self.unresolved(*label, line)),
            None => Ok(()),
        }
    }

    fn unresolved(&self, label: Label, line: usize) -> Diagnostic {
        let detail = match self.records.get(&label) {
            Some(r) => format!("{} of \"{}\" at line {}", r.purpose, r.construct, r.line),
            None => "unknown origin".to_string(),
        };
        Diagnostic::internal(line, format!("label {} ({}) was never resolved", label, detail))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

/// A `jump`/`@` label of the body being compiled
#[derive(Debug, Clone)]
pub struct UserLabel {
    pub label: Label,
    pub first_use: usize,
    pub defined_at: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Function or event body
    Entry,
    UnconditionalBlock,
    If,
    ElseIf,
    Else,
    For,
    While,
    DoWhile,
}

impl FrameKind {
    /// Construct name used in diagnostics
    pub fn construct(self) -> &'static str {
        match self {
            FrameKind::Entry => "function entry",
            FrameKind::UnconditionalBlock => "block",
            FrameKind::If => "if",
            FrameKind::ElseIf => "else if",
            FrameKind::Else => "else",
            FrameKind::For => "for",
            FrameKind::While => "while",
            FrameKind::DoWhile => "do … while",
        }
    }

    pub fn is_loop(self) -> bool {
        matches!(self, FrameKind::For | FrameKind::While | FrameKind::DoWhile)
    }
}

/// One open construct
#[derive(Debug, Clone)]
pub struct Frame {
    pub kind: FrameKind,
    pub explicit: bool,
    /// An implicit frame's single statement has been compiled
    pub body_done: bool,
    pub line: usize,
    pub top: Option<Label>,
    pub continue_label: Option<Label>,
    pub end: Option<Label>,
    /// Shared by every arm of an if/else-if/else family
    pub chain_end: Option<Label>,
    /// `for` step expressions, compiled when the frame closes
    pub step: Vec<Token>,
}

impl Frame {
    pub fn new(kind: FrameKind, explicit: bool, line: usize) -> Self {
        Self {
            kind,
            explicit,
            body_done: false,
            line,
            top: None,
            continue_label: None,
            end: None,
            chain_end: None,
            step: Vec::new(),
        }
    }

    /// Labels that must be resolved once this frame has closed
    fn owned_labels(&self) -> Vec<Label> {
        let mut labels: Vec<Label> = [self.top, self.continue_label, self.end].into_iter().flatten().collect();
        if self.kind == FrameKind::Else {
            labels.extend(self.chain_end);
        }
        labels
    }
}

fn required(label: Option<Label>, frame: &Frame) -> Result<Label> {
    label.ok_or_else(|| {
        Diagnostic::internal(
            frame.line,
            format!("\"{}\" frame is missing a label", frame.kind.construct()),
        )
    })
}

impl BodyCompiler<'_> {
    pub(crate) fn push_frame(&mut self, frame: Frame) {
        self.state.push_scope();
        self.state.frames.push(frame);
    }

    pub(crate) fn innermost(&self) -> Result<&Frame> {
        self.state
            .frames
            .last()
            .ok_or_else(|| Diagnostic::internal(self.line(), "control-flow frame stack is empty"))
    }

    /// Record that a complete statement was compiled in the current frame
    pub(crate) fn statement_completed(&mut self) {
        if let Some(top) = self.state.frames.last_mut() {
            if !top.explicit {
                top.body_done = true;
            }
        }
    }

    /// Close implicit frames whose single statement is complete
    pub(crate) fn close_finished_frames(&mut self) -> Result<()> {
        loop {
            let top = self.innermost()?;
            if top.explicit || !top.body_done {
                return Ok(());
            }
            self.close_frame()?;
        }
    }

    /// Consume a `{` opening an explicit body
    fn take_open_brace(&mut self) -> bool {
        if self.peek().is_some_and(|t| t.kind == TokenKind::LBrace) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub(crate) fn if_statement(&mut self) -> Result<()> {
        let line = self.advance_line();
        let condition = self.take_parenthesized("if")?;
        self.condition(condition, line)?;

        let end = self.new_label(LabelPurpose::IfFalse, "if", line);
        self.em.branch_if_false(end);

        let mut frame = Frame::new(FrameKind::If, self.take_open_brace(), line);
        frame.end = Some(end);
        self.push_frame(frame);
        Ok(())
    }

    /// Open the arm that follows a consumed `else`
    fn else_arm(&mut self, chain_end: Label, line: usize) -> Result<()> {
        let mut frame = if self.peek_keyword(Keyword::If) {
            self.pos += 1;
            let condition = self.take_parenthesized("else if")?;
            self.condition(condition, line)?;
            let end = self.new_label(LabelPurpose::IfFalse, "else if", line);
            self.em.branch_if_false(end);

            let mut frame = Frame::new(FrameKind::ElseIf, self.take_open_brace(), line);
            frame.end = Some(end);
            frame
        } else {
            Frame::new(FrameKind::Else, self.take_open_brace(), line)
        };
        frame.chain_end = Some(chain_end);
        self.push_frame(frame);
        Ok(())
    }

    pub(crate) fn while_statement(&mut self) -> Result<()> {
        let line = self.advance_line();
        let condition = self.take_parenthesized("while")?;

        let continue_label = self.new_label(LabelPurpose::LoopContinue, "while", line);
        let end = self.new_label(LabelPurpose::LoopEnd, "while", line);
        self.mark(continue_label)?;
        self.condition(condition, line)?;
        self.em.branch_if_false(end);

        let mut frame = Frame::new(FrameKind::While, self.take_open_brace(), line);
        frame.continue_label = Some(continue_label);
        frame.end = Some(end);
        self.push_frame(frame);
        Ok(())
    }

    pub(crate) fn for_statement(&mut self) -> Result<()> {
        let line = self.advance_line();
        let header = self.take_parenthesized("for")?;
        let parts: Vec<&[Token]> = header.split(|t| t.kind == TokenKind::Semicolon).collect();
        let [init, condition, step] = parts.as_slice() else {
            return Err(Diagnostic::syntax(line, "expected 'for (init; condition; step)'"));
        };

        if !init.is_empty() {
            for expr in self.resolve_list(init, line)? {
                self.discard(&expr)?;
            }
        }

        let top = self.new_label(LabelPurpose::LoopTop, "for", line);
        let continue_label = self.new_label(LabelPurpose::LoopContinue, "for", line);
        let end = self.new_label(LabelPurpose::LoopEnd, "for", line);
        self.mark(top)?;
        if !condition.is_empty() {
            self.condition(condition, line)?;
            self.em.branch_if_false(end);
        }

        let mut frame = Frame::new(FrameKind::For, self.take_open_brace(), line);
        frame.top = Some(top);
        frame.continue_label = Some(continue_label);
        frame.end = Some(end);
        frame.step = step.to_vec();
        self.push_frame(frame);
        Ok(())
    }

    pub(crate) fn do_statement(&mut self) -> Result<()> {
        let line = self.advance_line();
        let top = self.new_label(LabelPurpose::LoopTop, "do … while", line);
        let continue_label = self.new_label(LabelPurpose::LoopContinue, "do … while", line);
        let end = self.new_label(LabelPurpose::LoopEnd, "do … while", line);
        self.mark(top)?;

        let mut frame = Frame::new(FrameKind::DoWhile, self.take_open_brace(), line);
        frame.top = Some(top);
        frame.continue_label = Some(continue_label);
        frame.end = Some(end);
        self.push_frame(frame);
        Ok(())
    }

    /// `break;` or `continue;`
    pub(crate) fn loop_control(&mut self, is_break: bool) -> Result<()> {
        let line = self.advance_line();
        let word = if is_break { "break" } else { "continue" };
        self.expect_semicolon(word)?;

        let target = self
            .state
            .frames
            .iter()
            .rev()
            .take_while(|f| f.kind != FrameKind::Entry)
            .find(|f| f.kind.is_loop())
            .map(|f| if is_break { f.end } else { f.continue_label });
        match target {
            Some(Some(label)) => self.em.branch(label),
            Some(None) => return Err(Diagnostic::internal(line, format!("loop frame has no {} target", word))),
            None => return Err(Diagnostic::syntax(line, format!("'{}' outside of a loop", word))),
        }
        self.statement_completed();
        Ok(())
    }

    /// Handle `}`: finish implicit frames inside the block, then close it
    pub(crate) fn close_brace(&mut self) -> Result<()> {
        let line = self.line();
        loop {
            let top = self.innermost()?;
            if top.explicit {
                break;
            }
            if !top.body_done {
                return Err(Diagnostic::syntax(
                    line,
                    format!("expected a statement before '}}' to complete \"{}\"", top.kind.construct()),
                ));
            }
            self.close_frame()?;
        }

        if self.innermost()?.kind == FrameKind::Entry {
            // Only the last token of the run may close the body itself
            if self.pos + 1 < self.tokens.len() {
                return Err(Diagnostic::syntax(
                    line,
                    "mismatched '}': nothing left to close inside \"function entry\"",
                ));
            }
            self.pos += 1;
            self.entry_closed = true;
            return Ok(());
        }
        self.pos += 1;
        self.close_frame()
    }

    /// Pop the innermost frame and emit its closing code
    pub(crate) fn close_frame(&mut self) -> Result<()> {
        let line = self.line();
        self.em.set_line(line);
        let Some(frame) = self.state.frames.pop() else {
            return Err(Diagnostic::internal(line, "control-flow frame stack is empty"));
        };
        self.state.pop_scope();

        match frame.kind {
            FrameKind::Entry => {
                return Err(Diagnostic::internal(
                    line,
                    "\"function entry\" frame closed before the end of the body",
                ));
            }
            FrameKind::UnconditionalBlock => {}
            FrameKind::If | FrameKind::ElseIf => {
                let end = required(frame.end, &frame)?;
                if self.peek_keyword(Keyword::Else) {
                    let else_line = self.advance_line();
                    let chain_end = match frame.chain_end {
                        Some(label) => label,
                        None => self.new_label(LabelPurpose::IfChainEnd, "if", frame.line),
                    };
                    self.em.branch(chain_end);
                    self.mark(end)?;
                    self.state.labels.expect_marked(&frame.owned_labels(), line)?;
                    return self.else_arm(chain_end, else_line);
                }
                self.mark(end)?;
                if let Some(chain_end) = frame.chain_end {
                    self.mark(chain_end)?;
                }
            }
            FrameKind::Else => self.mark(required(frame.chain_end, &frame)?)?,
            FrameKind::While => {
                self.em.branch(required(frame.continue_label, &frame)?);
                self.mark(required(frame.end, &frame)?)?;
            }
            FrameKind::For => {
                self.mark(required(frame.continue_label, &frame)?)?;
                if !frame.step.is_empty() {
                    for expr in self.resolve_list(&frame.step, frame.line)? {
                        self.discard(&expr)?;
                    }
                }
                self.em.branch(required(frame.top, &frame)?);
                self.mark(required(frame.end, &frame)?)?;
            }
            FrameKind::DoWhile => self.close_do_while(&frame)?,
        }

        self.state.labels.expect_marked(&frame.owned_labels(), line)?;
        self.statement_completed();
        Ok(())
    }

    fn close_do_while(&mut self, frame: &Frame) -> Result<()> {
        let line = self.line();
        if !self.peek_keyword(Keyword::While) {
            return Err(Diagnostic::syntax(
                line,
                "expected 'while (condition);' to close \"do … while\"",
            ));
        }
        self.pos += 1;
        let condition = self.take_parenthesized("do … while")?;
        self.expect_semicolon("\"do … while\" condition")?;

        self.mark(required(frame.continue_label, frame)?)?;
        self.condition(condition, line)?;
        self.em.branch_if_false(required(frame.end, frame)?);
        self.em.branch(required(frame.top, frame)?);
        self.mark(required(frame.end, frame)?)
    }

    /// Check the frame stack once every statement of the body is compiled
    pub(crate) fn close_body(&mut self) -> Result<()> {
        self.close_finished_frames()?;

        let top = self.innermost()?;
        if top.kind != FrameKind::Entry {
            let message = if top.explicit {
                format!("missing '}}' to close \"{}\"", top.kind.construct())
            } else {
                format!("expected a statement to complete \"{}\"", top.kind.construct())
            };
            return Err(Diagnostic::syntax(top.line, message));
        }
        if !self.entry_closed {
            return Err(Diagnostic::syntax(top.line, "missing '}' to close \"function entry\""));
        }

        if let Some((name, label)) = self.state.user_labels.iter().find(|(_, l)| l.defined_at.is_none()) {
            return Err(Diagnostic::semantic(
                label.first_use,
                format!("jump to undefined label '{}'", name),
            ));
        }

        self.em.set_line(self.end_line);
        match self.returns {
            Some(ty) => {
                self.em.emit(Op::Push(ty.default_value()));
                self.em.emit(Op::Return { with_value: true });
            }
            None => self.em.emit(Op::Return { with_value: false }),
        }

        self.state.frames.pop();
        self.state.pop_scope();
        self.state.labels.expect_all_marked(self.end_line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{BodyCompiler, BodyKind};
    use crate::bytecode::{ChunkEmitter, Instr};
    use crate::emit::Emitter;
    use crate::error::DiagnosticKind;
    use crate::lexer::Lexer;
    use crate::state::CompileState;
    use gridscript_registry::{Registry, Visibility};

    /// Compile `source` as a complete body, closing brace included
    fn compile_body(source: &str) -> Result<Vec<Instr>> {
        compile_run(&format!("{}\n}}", source))
    }

    /// Compile a raw body token run that may lack its closing brace
    fn compile_run(source: &str) -> Result<Vec<Instr>> {
        let registry = Registry::standard();
        let vis = Visibility::default();
        let tokens = Lexer::new(source).tokenize()?;
        let mut state = CompileState::new();
        let mut em = ChunkEmitter::new();
        let locals = BodyCompiler::new(&registry, &vis, &mut state, &mut em, &tokens, BodyKind::Event, 99)
            .compile(&[], 1)?;
        Ok(em.finish(locals).expect("all labels resolved").code)
    }

    #[test]
    fn test_label_book_double_mark() {
        let mut book = LabelBook::default();
        book.record(Label(0), LabelPurpose::LoopEnd, "while", 3);
        book.mark(Label(0), 5).unwrap();

        let err = book.mark(Label(0), 6).unwrap_err();
        assert!(err.is_internal());
        assert!(err.message.contains("resolved twice"));
    }

    #[test]
    fn test_label_book_reports_unresolved_origin() {
        let mut book = LabelBook::default();
        book.record(Label(4), LabelPurpose::IfChainEnd, "if", 12);

        let err = book.expect_all_marked(20).unwrap_err();
        assert_eq!(err.kind, DiagnosticKind::Internal);
        assert_eq!(err.line, 20);
        assert!(err.message.contains("end of if-chain"));
        assert!(err.message.contains("\"if\" at line 12"));
    }

    #[test]
    fn test_braceless_if_closes_before_next_statement() {
        let code = compile_body("integer x = 1; integer y; integer z; if (x) y = 1; z = 2;").unwrap();
        // The branch over `y = 1` must land on the `z = 2` store sequence.
        let target = code
            .iter()
            .find_map(|i| match i {
                Instr::JumpIfFalse(t) => Some(*t),
                _ => None,
            })
            .unwrap();
        assert!(matches!(&code[target], Instr::Op(Op::Push(gridscript_core::Value::Integer(2)))));
    }

    #[test]
    fn test_else_binds_to_nearest_if() {
        assert!(compile_body("integer a; integer b; if (a) if (b) a = 1; else a = 2; a = 3;").is_ok());
    }

    #[test]
    fn test_else_if_chain_and_loops() {
        let source = "
            integer i; integer n;
            if (n == 0) n = 1; else if (n == 1) { n = 2; } else n = 3;
            for (i = 0; i < 3; i++) n += i;
            while (n > 0) { n--; if (n == 2) break; else continue; }
            do n++; while (n < 10);
            do { n--; } while (n > 5);
        ";
        assert!(compile_body(source).is_ok());
    }

    #[test]
    fn test_popping_function_entry_is_rejected() {
        let err = compile_body("integer a = 1; }").unwrap_err();
        assert_eq!(err.kind, DiagnosticKind::Syntax);
        assert!(err.message.contains("function entry"));
    }

    #[test]
    fn test_missing_close_brace_cites_construct() {
        let err = compile_run("integer a;\nwhile (a) {\n  a--;\n").unwrap_err();
        assert_eq!(err.kind, DiagnosticKind::Syntax);
        assert_eq!(err.line, 2);
        assert_eq!(err.message, "missing '}' to close \"while\"");

        let err = compile_run("integer a;\nif (a) a = 2;\n").unwrap_err();
        assert_eq!(err.line, 1);
        assert_eq!(err.message, "missing '}' to close \"function entry\"");
    }

    #[test]
    fn test_statements_after_early_close() {
        let err = compile_run("integer a;\n}\na = 2;\n}").unwrap_err();
        assert_eq!(err.kind, DiagnosticKind::Syntax);
        assert_eq!(err.line, 2);
        assert!(err.message.contains("\"function entry\""));
    }

    #[test]
    fn test_dangling_implicit_body() {
        let err = compile_body("integer a; if (a)").unwrap_err();
        assert!(err.message.contains("\"if\""));

        let err = compile_body("integer a; { if (a) }").unwrap_err();
        assert!(err.message.contains("before '}'"));
    }

    #[test]
    fn test_do_requires_while() {
        let err = compile_body("integer a; do a++; a--;").unwrap_err();
        assert_eq!(err.kind, DiagnosticKind::Syntax);
        assert!(err.message.contains("do … while"));
    }

    #[test]
    fn test_break_outside_loop() {
        let err = compile_body("break;").unwrap_err();
        assert_eq!(err.message, "'break' outside of a loop");
    }

    #[test]
    fn test_user_labels() {
        assert!(compile_body("integer a; jump done; a = 1; @done; a = 2;").is_ok());

        let err = compile_body("jump nowhere;").unwrap_err();
        assert_eq!(err.kind, DiagnosticKind::Semantic);

        let err = compile_body("@twice; @twice;").unwrap_err();
        assert!(err.message.contains("defined twice"));
    }

    #[test]
    fn test_check_emitter_runs_same_machine() {
        let registry = Registry::standard();
        let vis = Visibility::default();
        let tokens = Lexer::new("integer a; while (a < 3) a++; }").tokenize().unwrap();
        let mut state = CompileState::new();
        let mut em = crate::emit::CheckEmitter::new();
        BodyCompiler::new(&registry, &vis, &mut state, &mut em, &tokens, BodyKind::Event, 1)
            .compile(&[], 1)
            .unwrap();
        assert_eq!(em.labels_issued(), 2);
        assert_eq!(em.new_label(), Label(2));
    }
}

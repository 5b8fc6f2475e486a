//! Statement compilation for one function or event body

use crate::ast::{Expr, ExprKind, VarRef};
use crate::bytecode::LocalSlot;
use crate::codegen;
use crate::control::{Frame, FrameKind, LabelPurpose, UserLabel};
use crate::emit::{Emitter, Label, Op};
use crate::error::{Diagnostic, Result};
use crate::lexer::{Keyword, Token, TokenKind};
use crate::resolver::Resolver;
use crate::state::{CompileState, Param};
use gridscript_core::ScriptType;
use gridscript_registry::{Registry, Visibility};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Function { returns: Option<ScriptType> },
    Event,
}

/// Compiles the token run of one body through an [`Emitter`]
pub struct BodyCompiler<'a> {
    pub(crate) registry: &'a Registry,
    pub(crate) vis: &'a Visibility,
    pub(crate) state: &'a mut CompileState,
    pub(crate) em: &'a mut dyn Emitter,
    pub(crate) tokens: &'a [Token],
    pub(crate) pos: usize,
    pub(crate) kind: BodyKind,
    pub(crate) returns: Option<ScriptType>,
    /// Line of the body's closing brace
    pub(crate) end_line: usize,
    /// The entry frame has seen the body's closing `}`
    pub(crate) entry_closed: bool,
}

impl<'a> BodyCompiler<'a> {
    pub fn new(
        registry: &'a Registry,
        vis: &'a Visibility,
        state: &'a mut CompileState,
        em: &'a mut dyn Emitter,
        tokens: &'a [Token],
        kind: BodyKind,
        end_line: usize,
    ) -> Self {
        let returns = match kind {
            BodyKind::Function { returns } => returns,
            BodyKind::Event => None,
        };
        Self {
            registry,
            vis,
            state,
            em,
            tokens,
            pos: 0,
            kind,
            returns,
            end_line,
            entry_closed: false,
        }
    }

    /// Compile every statement up to and including the body's closing `}`;
    /// returns the body's local slots
    pub fn compile(mut self, params: &[Param], open_line: usize) -> Result<Vec<LocalSlot>> {
        self.state.begin_body();
        self.push_frame(Frame::new(FrameKind::Entry, true, open_line));
        for param in params {
            self.state.declare_local(&param.name, param.ty, open_line)?;
        }

        while self.pos < self.tokens.len() {
            self.statement()?;
        }
        self.close_body()?;

        trace!(labels = self.state.labels.len(), "body compiled");
        Ok(self.state.take_locals())
    }

    fn statement(&mut self) -> Result<()> {
        self.close_finished_frames()?;

        let tokens = self.tokens;
        let Some(token) = tokens.get(self.pos) else {
            return Ok(());
        };
        self.em.set_line(token.line);

        match &token.kind {
            TokenKind::RBrace => self.close_brace(),
            TokenKind::LBrace => {
                self.pos += 1;
                self.push_frame(Frame::new(FrameKind::UnconditionalBlock, true, token.line));
                Ok(())
            }
            TokenKind::Semicolon => {
                self.pos += 1;
                self.statement_completed();
                Ok(())
            }
            TokenKind::Type(ty) => self.local_declaration(*ty),
            TokenKind::Keyword(keyword) => match keyword {
                Keyword::If => self.if_statement(),
                Keyword::While => self.while_statement(),
                Keyword::For => self.for_statement(),
                Keyword::Do => self.do_statement(),
                Keyword::Break => self.loop_control(true),
                Keyword::Continue => self.loop_control(false),
                Keyword::Return => self.return_statement(),
                Keyword::State => self.state_change(),
                Keyword::Jump => self.jump_statement(),
                Keyword::Else => Err(Diagnostic::syntax(
                    token.line,
                    format!(
                        "'else' without a matching 'if' (innermost open construct is \"{}\")",
                        self.innermost()?.kind.construct()
                    ),
                )),
                Keyword::Default => Err(Diagnostic::syntax(token.line, "unexpected 'default' inside a body")),
            },
            _ => self.expression_statement(),
        }
    }

    fn local_declaration(&mut self, ty: ScriptType) -> Result<()> {
        let line = self.advance_line();
        let name = match self.advance() {
            Some(Token {
                kind: TokenKind::Identifier(name),
                ..
            }) => name.clone(),
            _ => {
                return Err(Diagnostic::syntax(
                    line,
                    format!("expected a variable name after '{}'", ty),
                ))
            }
        };

        match self.peek() {
            Some(t) if t.kind == TokenKind::Semicolon => {
                self.pos += 1;
                self.em.emit(Op::Push(ty.default_value()));
            }
            Some(t) if t.is_op("=") => {
                self.pos += 1;
                let init = self.take_until_semicolon("variable declaration")?;
                let value = self.value(init, line)?;
                let found = value.ty.unwrap_or(ty);
                if !ty.accepts(found) {
                    return Err(Diagnostic::semantic(
                        line,
                        format!("cannot initialize {} '{}' with a {} value", ty, name, found),
                    ));
                }
                codegen::emit_value(self.em, &value.converted(ty))?;
            }
            _ => {
                return Err(Diagnostic::syntax(
                    line,
                    format!("expected '=' or ';' after variable '{}'", name),
                ))
            }
        }

        // The initializer is resolved before the name comes into scope.
        let slot = self.state.declare_local(&name, ty, line)?;
        self.em.emit(Op::Store(VarRef::Local(slot)));
        self.statement_completed();
        Ok(())
    }

    fn expression_statement(&mut self) -> Result<()> {
        let line = self.line();
        let tokens = self.take_until_semicolon("expression")?;
        let expr = self.resolve(tokens, line)?;
        match &expr.kind {
            ExprKind::Label(name) => self.define_label(name, line)?,
            _ => self.discard(&expr)?,
        }
        self.statement_completed();
        Ok(())
    }

    fn return_statement(&mut self) -> Result<()> {
        let line = self.advance_line();
        let tokens = self.take_until_semicolon("return")?;

        match (self.returns, tokens.is_empty()) {
            (Some(ty), false) => {
                let value = self.value(tokens, line)?;
                let found = value.ty.unwrap_or(ty);
                if !ty.accepts(found) {
                    return Err(Diagnostic::semantic(
                        line,
                        format!("cannot return a {} value from a function returning {}", found, ty),
                    ));
                }
                codegen::emit_value(self.em, &value.converted(ty))?;
                self.em.emit(Op::Return { with_value: true });
            }
            (Some(ty), true) => {
                return Err(Diagnostic::semantic(
                    line,
                    format!("function must return a {} value", ty),
                ));
            }
            (None, false) => {
                let what = match self.kind {
                    BodyKind::Event => "an event handler",
                    BodyKind::Function { .. } => "a function without a return type",
                };
                return Err(Diagnostic::semantic(line, format!("cannot return a value from {}", what)));
            }
            (None, true) => self.em.emit(Op::Return { with_value: false }),
        }
        self.statement_completed();
        Ok(())
    }

    fn state_change(&mut self) -> Result<()> {
        let line = self.advance_line();
        let name = match self.advance() {
            Some(t) if t.is_keyword(Keyword::Default) => "default".to_string(),
            Some(Token {
                kind: TokenKind::Identifier(name),
                ..
            }) => name.clone(),
            _ => return Err(Diagnostic::syntax(line, "expected a state name after 'state'")),
        };
        self.expect_semicolon("state change")?;

        if self.kind != BodyKind::Event {
            return Err(Diagnostic::semantic(
                line,
                "state changes are only allowed inside event handlers",
            ));
        }
        let Some(index) = self.state.state_index(&name) else {
            return Err(Diagnostic::semantic(line, format!("undeclared state \"{}\"", name)));
        };
        self.em.emit(Op::ChangeState(index));
        self.statement_completed();
        Ok(())
    }

    fn jump_statement(&mut self) -> Result<()> {
        let line = self.advance_line();
        let Some(name) = self.advance().and_then(Token::identifier) else {
            return Err(Diagnostic::syntax(line, "expected a label name after 'jump'"));
        };
        self.expect_semicolon("jump")?;

        let label = self.user_label(name, line);
        self.em.branch(label);
        self.statement_completed();
        Ok(())
    }

    fn user_label(&mut self, name: &str, line: usize) -> Label {
        if let Some(existing) = self.state.user_labels.get(name) {
            return existing.label;
        }
        let label = self.new_label(LabelPurpose::User(name.to_string()), "jump", line);
        self.state.user_labels.insert(
            name.to_string(),
            UserLabel {
                label,
                first_use: line,
                defined_at: None,
            },
        );
        label
    }

    fn define_label(&mut self, name: &str, line: usize) -> Result<()> {
        let label = self.user_label(name, line);
        if let Some(entry) = self.state.user_labels.get_mut(name) {
            if let Some(previous) = entry.defined_at {
                return Err(Diagnostic::semantic(
                    line,
                    format!("label '{}' is defined twice (first at line {})", name, previous),
                ));
            }
            entry.defined_at = Some(line);
        }
        self.mark(label)
    }

    // ---- labels ----

    pub(crate) fn new_label(&mut self, purpose: LabelPurpose, construct: &'static str, line: usize) -> Label {
        let label = self.em.new_label();
        self.state.labels.record(label, purpose, construct, line);
        label
    }

    pub(crate) fn mark(&mut self, label: Label) -> Result<()> {
        self.state.labels.mark(label, self.line())?;
        self.em.mark_label(label);
        Ok(())
    }

    // ---- expressions ----

    pub(crate) fn resolve(&self, tokens: &[Token], line: usize) -> Result<Expr> {
        Resolver::new(self.registry, self.vis, self.state, tokens, line).resolve()
    }

    /// Comma-separated expressions (`for` init and step lists)
    pub(crate) fn resolve_list(&self, tokens: &[Token], line: usize) -> Result<Vec<Expr>> {
        Resolver::new(self.registry, self.vis, self.state, tokens, line).resolve_list()
    }

    /// Resolve an expression that must produce a value
    fn value(&self, tokens: &[Token], line: usize) -> Result<Expr> {
        let expr = self.resolve(tokens, line)?;
        if expr.ty.is_none() {
            return Err(Diagnostic::semantic(line, "expression has no value"));
        }
        Ok(expr)
    }

    /// Emit a condition; its value is left for a conditional branch
    pub(crate) fn condition(&mut self, tokens: &[Token], line: usize) -> Result<()> {
        if tokens.is_empty() {
            return Err(Diagnostic::syntax(line, "expected a condition"));
        }
        let expr = self.value(tokens, line)?;
        codegen::emit_value(self.em, &expr)
    }

    pub(crate) fn discard(&mut self, expr: &Expr) -> Result<()> {
        codegen::emit_discard(self.em, expr)
    }

    // ---- cursor ----

    pub(crate) fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    pub(crate) fn peek_keyword(&self, keyword: Keyword) -> bool {
        self.peek().is_some_and(|t| t.is_keyword(keyword))
    }

    fn advance(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Consume the current token, returning its line
    pub(crate) fn advance_line(&mut self) -> usize {
        let line = self.line();
        self.pos += 1;
        line
    }

    /// Line of the current token, or of the closing brace at the end
    pub(crate) fn line(&self) -> usize {
        self.peek().map_or(self.end_line, |t| t.line)
    }

    pub(crate) fn expect_semicolon(&mut self, after: &str) -> Result<()> {
        match self.peek() {
            Some(t) if t.kind == TokenKind::Semicolon => {
                self.pos += 1;
                Ok(())
            }
            Some(t) => Err(Diagnostic::syntax(t.line, format!("expected ';' after {}, found {}", after, t))),
            None => Err(Diagnostic::syntax(self.end_line, format!("expected ';' after {}", after))),
        }
    }

    /// Tokens up to the next `;` outside brackets; the `;` is consumed
    pub(crate) fn take_until_semicolon(&mut self, what: &str) -> Result<&'a [Token]> {
        let tokens = self.tokens;
        let start = self.pos;
        let mut depth = 0usize;
        for (i, token) in tokens.iter().enumerate().skip(start) {
            match token.kind {
                TokenKind::LParen | TokenKind::LBracket => depth += 1,
                TokenKind::RParen | TokenKind::RBracket => depth = depth.saturating_sub(1),
                TokenKind::Semicolon if depth == 0 => {
                    self.pos = i + 1;
                    return Ok(&tokens[start..i]);
                }
                TokenKind::LBrace | TokenKind::RBrace => {
                    return Err(Diagnostic::syntax(
                        token.line,
                        format!("expected ';' after {}, found {}", what, token),
                    ));
                }
                _ => {}
            }
        }
        let line = tokens.last().map_or(self.end_line, |t| t.line);
        Err(Diagnostic::syntax(line, format!("expected ';' after {}", what)))
    }

    /// `( … )` following a keyword; returns the inner tokens
    pub(crate) fn take_parenthesized(&mut self, construct: &str) -> Result<&'a [Token]> {
        let tokens = self.tokens;
        let line = self.line();
        if !self.peek().is_some_and(|t| t.kind == TokenKind::LParen) {
            return Err(Diagnostic::syntax(line, format!("expected '(' after '{}'", construct)));
        }
        let close = matching_close(tokens, self.pos)?;
        let inner = &tokens[self.pos + 1..close];
        self.pos = close + 1;
        Ok(inner)
    }
}

/// Index of the bracket closing the one at `open`
pub(crate) fn matching_close(tokens: &[Token], open: usize) -> Result<usize> {
    let mut stack: Vec<&Token> = Vec::new();
    for (i, token) in tokens.iter().enumerate().skip(open) {
        let expected_open = match token.kind {
            TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => {
                stack.push(token);
                continue;
            }
            TokenKind::RParen => TokenKind::LParen,
            TokenKind::RBracket => TokenKind::LBracket,
            TokenKind::RBrace => TokenKind::LBrace,
            _ => continue,
        };
        match stack.pop() {
            Some(opener) if opener.kind == expected_open => {
                if stack.is_empty() {
                    return Ok(i);
                }
            }
            Some(opener) => {
                return Err(Diagnostic::syntax(
                    token.line,
                    format!("mismatched brackets: {} closes {} from line {}", token, opener, opener.line),
                ))
            }
            None => return Err(Diagnostic::syntax(token.line, format!("unexpected {}", token))),
        }
    }
    let opener = &tokens[open];
    Err(Diagnostic::syntax(opener.line, format!("unclosed {}", opener)))
}

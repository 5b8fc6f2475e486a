//! Compiler frontend
//!
//! One compile call runs four passes over a private [`CompileState`]:
//!
//! 1. directive preprocessing (`#dialect`, `#extension`, host-resolved lines)
//! 2. tokenizing
//! 3. declaration collection: globals, functions and states with their event
//!    bodies kept as raw token runs
//! 4. body compilation through an [`Emitter`] backend
//!
//! The registry is only read, so any number of compiles may share it.

use crate::body::{matching_close, BodyCompiler, BodyKind};
use crate::bytecode::{Chunk, ChunkEmitter};
use crate::codegen;
use crate::emit::{CheckEmitter, Emitter};
use crate::error::{CompileReport, Diagnostic, Result};
use crate::lexer::{tokenize, Keyword, Token, TokenKind};
use crate::resolver::Resolver;
use crate::state::{Body, CompileState, EventDecl, FunctionDecl, GlobalDecl, Param, StateDecl};
use crate::unit::{
    collect_call_sites, CompiledState, CompiledUnit, EventHandler, GlobalSlot, ScriptFunction,
};
use gridscript_core::{Dialect, ScriptType};
use gridscript_registry::{FunctionId, Registry, Visibility};
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// Per-call compiler settings
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Dialects and extension groups enabled before any `#dialect` directive
    pub visibility: Visibility,

    /// Stop collecting diagnostics after this many
    pub max_errors: usize,

    /// Keep compiling other bodies after one fails
    pub continue_after_error: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            visibility: Visibility::default(),
            max_errors: 20,
            continue_after_error: true,
        }
    }
}

/// Script compiler bound to one registry
#[derive(Debug, Clone)]
pub struct Compiler<'r> {
    registry: &'r Registry,
    options: CompileOptions,
}

/// Which backend bodies are compiled with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Emit,
    Check,
}

impl<'r> Compiler<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self::with_options(registry, CompileOptions::default())
    }

    pub fn with_options(registry: &'r Registry, options: CompileOptions) -> Self {
        Self { registry, options }
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Compile one script
    ///
    /// `directives` maps line numbers to host-resolved text that replaces
    /// those source lines.
    pub fn compile(
        &self,
        source: &str,
        directives: &BTreeMap<usize, String>,
    ) -> std::result::Result<CompiledUnit, CompileReport> {
        let mut session = Session::new(self, Mode::Emit);
        let unit = session.run(source, directives);
        match unit {
            Some(unit) if session.diagnostics.is_empty() => Ok(unit),
            _ => Err(session.report()),
        }
    }

    /// Parse and check a script without producing code
    pub fn check(
        &self,
        source: &str,
        directives: &BTreeMap<usize, String>,
    ) -> std::result::Result<(), CompileReport> {
        let mut session = Session::new(self, Mode::Check);
        session.run(source, directives);
        if session.diagnostics.is_empty() {
            Ok(())
        } else {
            Err(session.report())
        }
    }
}

/// State of one compile call
struct Session<'c, 'r> {
    compiler: &'c Compiler<'r>,
    mode: Mode,
    vis: Visibility,
    diagnostics: Vec<Diagnostic>,
}

impl<'c, 'r> Session<'c, 'r> {
    fn new(compiler: &'c Compiler<'r>, mode: Mode) -> Self {
        Self {
            compiler,
            mode,
            vis: compiler.options.visibility.clone(),
            diagnostics: Vec::new(),
        }
    }

    fn registry(&self) -> &'r Registry {
        self.compiler.registry
    }

    fn report(self) -> CompileReport {
        CompileReport::new(self.diagnostics)
    }

    /// Record a diagnostic; returns whether compilation should go on
    fn record(&mut self, diagnostic: Diagnostic) -> bool {
        trace!(line = diagnostic.line, message = %diagnostic.message, "diagnostic");
        let options = &self.compiler.options;
        if self.diagnostics.len() < options.max_errors.max(1) {
            self.diagnostics.push(diagnostic);
        }
        options.continue_after_error && self.diagnostics.len() < options.max_errors.max(1)
    }

    fn run(&mut self, source: &str, directives: &BTreeMap<usize, String>) -> Option<CompiledUnit> {
        let lines = match self.preprocess(source, directives) {
            Ok(lines) => lines,
            Err(diagnostic) => {
                self.record(diagnostic);
                return None;
            }
        };
        let tokens = match tokenize(source, &lines) {
            Ok(tokens) => tokens,
            Err(diagnostic) => {
                self.record(diagnostic);
                return None;
            }
        };

        if !self.registry().long_integers() {
            let disabled = tokens
                .iter()
                .filter(|t| t.kind == TokenKind::Type(ScriptType::Long))
                .map(|t| Diagnostic::semantic(t.line, "type 'long' is not enabled for this registry"));
            let mut any = false;
            for diagnostic in disabled {
                any = true;
                if !self.record(diagnostic) {
                    return None;
                }
            }
            if any {
                return None;
            }
        }

        let mut state = CompileState::new();
        let declared = Declarations::new(&tokens).collect(&mut state);
        let last_line = tokens.last().map_or(1, |t| t.line);
        let keep_going = match declared {
            Ok(problems) => problems.into_iter().all(|d| self.record(d)),
            Err(diagnostic) => {
                self.record(diagnostic);
                false
            }
        };
        if !keep_going {
            return None;
        }
        if let Err(diagnostic) = self.validate(&state, last_line) {
            if !diagnostic.into_iter().all(|d| self.record(d)) {
                return None;
            }
        }
        debug!(
            globals = state.globals.len(),
            functions = state.functions.len(),
            states = state.states.len(),
            "declarations collected"
        );

        self.compile_bodies(&mut state)
    }

    /// Apply directive lines, returning the line map the tokenizer uses
    fn preprocess(&mut self, source: &str, directives: &BTreeMap<usize, String>) -> Result<BTreeMap<usize, String>> {
        let mut lines = directives.clone();
        for (index, original) in source.lines().enumerate() {
            let number = index + 1;
            let text = directives.get(&number).map_or(original, String::as_str);
            let Some(directive) = text.trim_start().strip_prefix('#') else {
                continue;
            };

            let mut words = directive.split_whitespace();
            match (words.next(), words.next()) {
                (Some("dialect"), Some(name)) => {
                    let dialect = Dialect::from_name(name)
                        .ok_or_else(|| Diagnostic::syntax(number, format!("unknown dialect '{}'", name)))?;
                    self.vis = self.vis.clone().with_dialect(dialect);
                }
                (Some("extension"), Some(group)) => {
                    self.vis = self.vis.clone().with_group(group);
                }
                _ => {
                    return Err(Diagnostic::syntax(
                        number,
                        format!("unresolved preprocessor directive '#{}'", directive.trim()),
                    ))
                }
            }
            lines.insert(number, String::new());
        }
        Ok(lines)
    }

    /// Checks that need the registry or the whole declaration set
    fn validate(&self, state: &CompileState, last_line: usize) -> std::result::Result<(), Vec<Diagnostic>> {
        let registry = self.registry();
        let mut problems = Vec::new();

        for global in &state.globals {
            if registry.constant(&global.name, &self.vis).is_some() {
                problems.push(Diagnostic::semantic(
                    global.line,
                    format!("'{}' is a built-in constant and cannot be redeclared", global.name),
                ));
            }
        }
        for function in &state.functions {
            if registry.has_function(&function.name, &self.vis) {
                problems.push(Diagnostic::semantic(
                    function.line,
                    format!("'{}' is a built-in function and cannot be redeclared", function.name),
                ));
            }
        }

        if state.state_index("default").is_none() {
            problems.push(Diagnostic::semantic(last_line, "script has no default state"));
        }

        for decl in &state.states {
            for (i, event) in decl.events.iter().enumerate() {
                if decl.events[..i].iter().any(|e| e.name == event.name) {
                    problems.push(Diagnostic::semantic(
                        event.line,
                        format!("event '{}' is already declared in state \"{}\"", event.name, decl.name),
                    ));
                    continue;
                }
                let Some(api) = registry.event(&event.name, &self.vis) else {
                    problems.push(Diagnostic::semantic(event.line, format!("unknown event '{}'", event.name)));
                    continue;
                };
                let declared: Vec<ScriptType> = event.params.iter().map(|p| p.ty).collect();
                if declared != api.params {
                    let expected: Vec<&str> = api.params.iter().map(|t| t.keyword()).collect();
                    problems.push(Diagnostic::semantic(
                        event.line,
                        format!("event '{}' takes ({})", event.name, expected.join(", ")),
                    ));
                }
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }

    /// Compile one body with the session's backend
    fn body(
        &self,
        state: &mut CompileState,
        body: &Body,
        params: &[Param],
        kind: BodyKind,
    ) -> Result<Option<Chunk>> {
        let registry = self.registry();
        match self.mode {
            Mode::Emit => {
                let mut em = ChunkEmitter::new();
                let locals = BodyCompiler::new(registry, &self.vis, state, &mut em, &body.tokens, kind, body.close_line)
                    .compile(params, body.open_line)?;
                let chunk = em.finish(locals).map_err(|label| {
                    Diagnostic::internal(body.close_line, format!("label {} was never bound to a position", label))
                })?;
                Ok(Some(chunk))
            }
            Mode::Check => {
                let mut em = CheckEmitter::new();
                BodyCompiler::new(registry, &self.vis, state, &mut em, &body.tokens, kind, body.close_line)
                    .compile(params, body.open_line)?;
                Ok(None)
            }
        }
    }

    fn global(&self, state: &mut CompileState, index: usize) -> Result<Option<Chunk>> {
        let decl = state.globals[index].clone();
        state.begin_body();
        state.set_visible_globals(index);

        let init = if decl.init.is_empty() {
            None
        } else {
            let expr = Resolver::new(self.registry(), &self.vis, state, &decl.init, decl.line).resolve()?;
            let found = expr
                .ty
                .ok_or_else(|| Diagnostic::semantic(decl.line, "expression has no value"))?;
            if !decl.ty.accepts(found) {
                return Err(Diagnostic::semantic(
                    decl.line,
                    format!("cannot initialize {} '{}' with a {} value", decl.ty, decl.name, found),
                ));
            }
            Some(expr.converted(decl.ty))
        };

        match self.mode {
            Mode::Emit => {
                let mut em = ChunkEmitter::new();
                em.set_line(decl.line);
                codegen::emit_initializer(&mut em, init.as_ref(), decl.ty)?;
                let chunk = em
                    .finish(Vec::new())
                    .map_err(|label| Diagnostic::internal(decl.line, format!("label {} in an initializer", label)))?;
                Ok(Some(chunk))
            }
            Mode::Check => {
                codegen::emit_initializer(&mut CheckEmitter::new(), init.as_ref(), decl.ty)?;
                Ok(None)
            }
        }
    }

    fn compile_bodies(&mut self, state: &mut CompileState) -> Option<CompiledUnit> {
        let mut globals = Vec::new();
        for index in 0..state.globals.len() {
            match self.global(state, index) {
                Ok(chunk) => {
                    let decl = &state.globals[index];
                    globals.push(GlobalSlot {
                        name: decl.name.clone(),
                        ty: decl.ty,
                        init: chunk.unwrap_or_default(),
                    });
                }
                Err(diagnostic) => {
                    if !self.record(diagnostic) {
                        return None;
                    }
                }
            }
        }

        let mut functions = Vec::new();
        for decl in state.functions.clone() {
            let kind = BodyKind::Function { returns: decl.returns };
            match self.body(state, &decl.body, &decl.params, kind) {
                Ok(chunk) => {
                    let chunk = chunk.unwrap_or_default();
                    debug!(function = %decl.name, instructions = chunk.len(), "compiled function");
                    functions.push(ScriptFunction {
                        name: decl.name,
                        params: decl.params,
                        returns: decl.returns,
                        chunk,
                    });
                }
                Err(diagnostic) => {
                    if !self.record(diagnostic) {
                        return None;
                    }
                }
            }
        }

        let mut states = Vec::new();
        for decl in state.states.clone() {
            let mut events = Vec::new();
            for event in decl.events {
                match self.body(state, &event.body, &event.params, BodyKind::Event) {
                    Ok(chunk) => {
                        let chunk = chunk.unwrap_or_default();
                        debug!(state = %decl.name, event = %event.name, instructions = chunk.len(), "compiled event");
                        events.push(EventHandler {
                            name: event.name,
                            params: event.params,
                            chunk,
                        });
                    }
                    Err(diagnostic) => {
                        if !self.record(diagnostic) {
                            return None;
                        }
                    }
                }
            }
            states.push(CompiledState { name: decl.name, events });
        }

        if !self.diagnostics.is_empty() || self.mode == Mode::Check {
            return None;
        }

        let registry = self.registry();
        let name_of = |id: FunctionId| registry.function(id).name.clone();
        let mut call_sites = Vec::new();
        for global in &globals {
            collect_call_sites(&global.init, &format!("global {}", global.name), name_of, &mut call_sites);
        }
        for function in &functions {
            collect_call_sites(&function.chunk, &function.name, name_of, &mut call_sites);
        }
        for compiled in &states {
            for event in &compiled.events {
                let body = format!("{}.{}", compiled.name, event.name);
                collect_call_sites(&event.chunk, &body, name_of, &mut call_sites);
            }
        }

        Some(CompiledUnit {
            globals,
            functions,
            states,
            call_sites,
        })
    }
}

/// What encloses a body, which decides what may follow its closing brace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Enclosing {
    TopLevel,
    State,
}

/// Declaration-collection pass over the whole token stream
struct Declarations<'t> {
    tokens: &'t [Token],
    pos: usize,
    /// Most recently completed state or function, for stray `}` diagnostics
    last_closed: Option<String>,
}

impl<'t> Declarations<'t> {
    fn new(tokens: &'t [Token]) -> Self {
        Self {
            tokens,
            pos: 0,
            last_closed: None,
        }
    }

    /// Fill `state` with every top-level declaration
    ///
    /// Malformed structure aborts the pass; duplicate names are returned as
    /// diagnostics and the pass continues.
    fn collect(mut self, state: &mut CompileState) -> Result<Vec<Diagnostic>> {
        let mut problems = Vec::new();
        while let Some(token) = self.peek() {
            let declared = match &token.kind {
                TokenKind::Type(ty) => self.typed_declaration(*ty, state)?,
                TokenKind::Identifier(name) if self.peek_at(1).is_some_and(|t| t.kind == TokenKind::LParen) => {
                    self.pos += 1;
                    self.function(None, name.clone(), token.line, state)?
                }
                TokenKind::Keyword(Keyword::Default) => {
                    self.pos += 1;
                    self.state_block("default".to_string(), token.line, state)?
                }
                TokenKind::Keyword(Keyword::State) => {
                    self.pos += 1;
                    let name = match self.next() {
                        Some(t) if t.is_keyword(Keyword::Default) => "default".to_string(),
                        Some(Token {
                            kind: TokenKind::Identifier(name),
                            ..
                        }) => name.clone(),
                        _ => return Err(Diagnostic::syntax(token.line, "expected a state name after 'state'")),
                    };
                    self.state_block(name, token.line, state)?
                }
                TokenKind::RBrace => {
                    let message = match &self.last_closed {
                        Some(construct) => format!("mismatched '}}': nothing left to close after {}", construct),
                        None => "mismatched '}': nothing is open at top level".to_string(),
                    };
                    return Err(Diagnostic::syntax(token.line, message));
                }
                _ => {
                    return Err(Diagnostic::syntax(
                        token.line,
                        format!("unexpected {} at top level", token),
                    ))
                }
            };
            if let Err(problem) = declared {
                problems.push(problem);
            }
        }
        Ok(problems)
    }

    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&'t Token> {
        self.tokens.get(self.pos + offset)
    }

    fn next(&mut self) -> Option<&'t Token> {
        let token = self.peek();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn end_line(&self) -> usize {
        self.tokens.last().map_or(1, |t| t.line)
    }

    /// `type name = init;`, `type name;` or `type name(params) { … }`
    fn typed_declaration(&mut self, ty: ScriptType, state: &mut CompileState) -> Result<Result<()>> {
        let line = self.tokens[self.pos].line;
        self.pos += 1;
        let Some(name) = self.next().and_then(Token::identifier) else {
            return Err(Diagnostic::syntax(line, format!("expected a name after '{}'", ty)));
        };

        match self.peek().map(|t| &t.kind) {
            Some(TokenKind::LParen) => self.function(Some(ty), name.to_string(), line, state),
            Some(TokenKind::Semicolon) => {
                self.pos += 1;
                Ok(state.declare_global(GlobalDecl {
                    name: name.to_string(),
                    ty,
                    line,
                    init: Vec::new(),
                }))
            }
            Some(TokenKind::Operator("=")) => {
                self.pos += 1;
                let init = self.initializer(name)?;
                Ok(state.declare_global(GlobalDecl {
                    name: name.to_string(),
                    ty,
                    line,
                    init,
                }))
            }
            _ => Err(Diagnostic::syntax(
                line,
                format!("expected '(', '=' or ';' after '{}'", name),
            )),
        }
    }

    fn initializer(&mut self, name: &str) -> Result<Vec<Token>> {
        let start = self.pos;
        let mut depth = 0usize;
        while let Some(token) = self.next() {
            match token.kind {
                TokenKind::LParen | TokenKind::LBracket => depth += 1,
                TokenKind::RParen | TokenKind::RBracket => depth = depth.saturating_sub(1),
                TokenKind::Semicolon if depth == 0 => return Ok(self.tokens[start..self.pos - 1].to_vec()),
                TokenKind::LBrace | TokenKind::RBrace => {
                    return Err(Diagnostic::syntax(
                        token.line,
                        format!("expected ';' after the initializer of '{}', found {}", name, token),
                    ))
                }
                _ => {}
            }
        }
        Err(Diagnostic::syntax(
            self.end_line(),
            format!("expected ';' after the initializer of '{}'", name),
        ))
    }

    /// Parameter list starting at the current `(`
    fn params(&mut self) -> Result<Vec<Param>> {
        let open = self.pos;
        let close = matching_close(self.tokens, open)?;
        let inner = &self.tokens[open + 1..close];
        self.pos = close + 1;

        let mut params = Vec::new();
        if inner.is_empty() {
            return Ok(params);
        }
        for part in inner.split(|t| t.kind == TokenKind::Comma) {
            match part {
                [ty, name] => match (ty.script_type(), name.identifier()) {
                    (Some(ty), Some(name)) => params.push(Param {
                        name: name.to_string(),
                        ty,
                    }),
                    _ => return Err(Diagnostic::syntax(ty.line, "expected 'type name' in parameter list")),
                },
                _ => {
                    let line = part.first().map_or(self.tokens[open].line, |t| t.line);
                    return Err(Diagnostic::syntax(line, "expected 'type name' in parameter list"));
                }
            }
        }
        Ok(params)
    }

    /// `{ … }` starting at the current token
    ///
    /// The body runs to the `}` that balances its opening brace, unless what
    /// follows that brace can only be more statements of the body (a `}`
    /// closed it early). It stops short, unclosed, at a declaration header
    /// found where a statement should start, or at the end of input.
    fn block(&mut self, construct: &str, line: usize, enclosing: Enclosing) -> Result<Body> {
        match self.peek() {
            Some(t) if t.kind == TokenKind::LBrace => {}
            Some(t) => {
                return Err(Diagnostic::syntax(
                    t.line,
                    format!("expected '{{' to open {}, found {}", construct, t),
                ))
            }
            None => return Err(Diagnostic::syntax(line, format!("expected '{{' to open {}", construct))),
        }

        let tokens = self.tokens;
        let open = self.pos;
        let mut depth = 0usize;
        for (i, token) in tokens.iter().enumerate().skip(open) {
            match token.kind {
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 && !self.continues_body(i + 1, enclosing) {
                        self.pos = i + 1;
                        return Ok(Body {
                            tokens: tokens[open + 1..=i].to_vec(),
                            open_line: tokens[open].line,
                            close_line: token.line,
                            closed: true,
                        });
                    }
                }
                _ if i > open && starts_statement(tokens, i) && is_header(tokens, i) => {
                    return Ok(self.unclosed(open, i));
                }
                _ => {}
            }
        }
        Ok(self.unclosed(open, tokens.len()))
    }

    /// Body from `open` up to (not including) `end`, missing its `}`
    fn unclosed(&mut self, open: usize, end: usize) -> Body {
        self.pos = end;
        let open_line = self.tokens[open].line;
        Body {
            tokens: self.tokens[open + 1..end].to_vec(),
            open_line,
            close_line: self.tokens[open..end].last().map_or(open_line, |t| t.line),
            closed: false,
        }
    }

    /// Whether the token at `index`, right after a body's balancing `}`, can
    /// only be read as another statement of that body
    fn continues_body(&self, index: usize, enclosing: Enclosing) -> bool {
        let Some(token) = self.tokens.get(index) else {
            return false;
        };
        if is_header(self.tokens, index) {
            return false;
        }
        match &token.kind {
            TokenKind::RBrace => false,
            // A malformed handler or function header is left to the declaration parser
            TokenKind::Identifier(_) if self.tokens.get(index + 1).is_some_and(|t| t.kind == TokenKind::LParen) => {
                match matching_close(self.tokens, index + 1) {
                    Ok(close) => !self.tokens.get(close + 1).is_some_and(|t| t.kind == TokenKind::LBrace),
                    Err(_) => false,
                }
            }
            TokenKind::Type(_) | TokenKind::Keyword(Keyword::Default) => enclosing == Enclosing::State,
            _ => true,
        }
    }

    fn function(
        &mut self,
        returns: Option<ScriptType>,
        name: String,
        line: usize,
        state: &mut CompileState,
    ) -> Result<Result<()>> {
        let params = self.params()?;
        let body = self.block(&format!("function \"{}\"", name), line, Enclosing::TopLevel)?;
        self.last_closed = Some(format!("function \"{}\"", name));
        Ok(state.declare_function(FunctionDecl {
            name,
            returns,
            params,
            body,
            line,
        }))
    }

    /// `{ event(params) { … } … }` after a state header
    fn state_block(&mut self, name: String, line: usize, state: &mut CompileState) -> Result<Result<()>> {
        let construct = format!("state \"{}\"", name);
        match self.next() {
            Some(t) if t.kind == TokenKind::LBrace => {}
            Some(t) => {
                return Err(Diagnostic::syntax(
                    t.line,
                    format!("expected '{{' to open {}, found {}", construct, t),
                ))
            }
            None => return Err(Diagnostic::syntax(line, format!("expected '{{' to open {}", construct))),
        }

        let mut events: Vec<EventDecl> = Vec::new();
        let mut closed = true;
        loop {
            // End of input or the next state's header: this state lost its `}`
            let token = match self.peek() {
                Some(t) if !(matches!(t.kind, TokenKind::Keyword(_)) && is_header(self.tokens, self.pos)) => t,
                _ => {
                    // An unclosed handler reports its own innermost open construct
                    if events.last().map_or(true, |e| e.body.closed) {
                        return Err(Diagnostic::syntax(line, format!("missing '}}' to close {}", construct)));
                    }
                    closed = false;
                    break;
                }
            };
            match &token.kind {
                TokenKind::RBrace => {
                    self.pos += 1;
                    break;
                }
                TokenKind::Identifier(event) if self.peek_at(1).is_some_and(|t| t.kind == TokenKind::LParen) => {
                    self.pos += 1;
                    let params = self.params()?;
                    let body = self.block(&format!("event \"{}\"", event), token.line, Enclosing::State)?;
                    events.push(EventDecl {
                        name: event.clone(),
                        params,
                        body,
                        line: token.line,
                    });
                }
                _ => {
                    return Err(Diagnostic::syntax(
                        token.line,
                        format!("expected an event handler in {}, found {}", construct, token),
                    ))
                }
            }
        }
        trace!(state = %name, events = events.len(), closed, "state collected");
        self.last_closed = Some(construct);
        Ok(state.declare_state(StateDecl { name, line, events }))
    }
}

/// Whether a statement could begin at `index`
fn starts_statement(tokens: &[Token], index: usize) -> bool {
    index == 0
        || matches!(
            tokens[index - 1].kind,
            TokenKind::Semicolon | TokenKind::LBrace | TokenKind::RBrace
        )
}

/// `default {`, `state name {` or `[type] name(type name, …) {` at `index`
fn is_header(tokens: &[Token], index: usize) -> bool {
    let kind = |offset: usize| tokens.get(index + offset).map(|t| &t.kind);
    match kind(0) {
        Some(TokenKind::Keyword(Keyword::Default)) => kind(1) == Some(&TokenKind::LBrace),
        Some(TokenKind::Keyword(Keyword::State)) => {
            matches!(
                kind(1),
                Some(TokenKind::Identifier(_)) | Some(TokenKind::Keyword(Keyword::Default))
            ) && kind(2) == Some(&TokenKind::LBrace)
        }
        Some(TokenKind::Type(_)) => {
            matches!(kind(1), Some(TokenKind::Identifier(_))) && is_signature(tokens, index + 2)
        }
        Some(TokenKind::Identifier(_)) => is_signature(tokens, index + 1),
        _ => false,
    }
}

/// `(type name, …) {` starting at `open`
fn is_signature(tokens: &[Token], open: usize) -> bool {
    let is = |i: usize, kind: &TokenKind| tokens.get(i).is_some_and(|t| &t.kind == kind);
    if !is(open, &TokenKind::LParen) {
        return false;
    }
    let mut i = open + 1;
    if is(i, &TokenKind::RParen) {
        return is(i + 1, &TokenKind::LBrace);
    }
    loop {
        let typed = tokens.get(i).and_then(Token::script_type).is_some();
        let named = tokens.get(i + 1).and_then(Token::identifier).is_some();
        if !(typed && named) {
            return false;
        }
        i += 2;
        if is(i, &TokenKind::Comma) {
            i += 1;
        } else {
            return is(i, &TokenKind::RParen) && is(i + 1, &TokenKind::LBrace);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DiagnosticKind;
    use gridscript_core::Dialects;

    fn compile(source: &str) -> std::result::Result<CompiledUnit, CompileReport> {
        let registry = Registry::standard();
        Compiler::new(&registry).compile(source, &BTreeMap::new())
    }

    fn first_error(source: &str) -> Diagnostic {
        compile(source).unwrap_err().diagnostics[0].clone()
    }

    #[test]
    fn test_declarations_are_collected() {
        let unit = compile(
            "integer count = 3;\nstring name;\nfloat half(float x) { return x / 2; }\nreset() { count = 0; }\n\
             default { state_entry() { reset(); } touch_start(integer n) { state busy; } }\n\
             state busy { state_entry() { } }",
        )
        .unwrap();

        assert_eq!(unit.globals().len(), 2);
        assert_eq!(unit.functions()[0].returns, Some(ScriptType::Float));
        assert_eq!(unit.functions()[1].returns, None);
        assert_eq!(unit.states().len(), 2);
        assert!(unit.state("default").unwrap().event("touch_start").is_some());
        assert_eq!(unit.state_index("busy"), Some(1));
    }

    #[test]
    fn test_long_follows_the_registry() {
        let source = "long big = 5;\ndefault { state_entry() { big = (long)7; } }";
        let report = compile(source).unwrap_err();
        assert_eq!(report.len(), 2);
        assert_eq!(report.diagnostics[0].line, 1);
        assert!(report.diagnostics[0].message.contains("type 'long' is not enabled"));
        assert_eq!(report.diagnostics[1].line, 2);

        let mut builder = Registry::builder().allow_long_integers(true);
        for provider in gridscript_registry::providers::standard_providers() {
            builder.install(provider.as_ref());
        }
        let registry = builder.build();
        assert!(Compiler::new(&registry).compile(source, &BTreeMap::new()).is_ok());
    }

    #[test]
    fn test_default_state_is_required() {
        let err = first_error("state other { state_entry() { } }");
        assert_eq!(err.kind, DiagnosticKind::Semantic);
        assert!(err.message.contains("no default state"));
    }

    #[test]
    fn test_unknown_and_mistyped_events() {
        let err = first_error("default { nonsense() { } }");
        assert!(err.message.contains("unknown event 'nonsense'"));

        let err = first_error("default { touch_start(string s) { } }");
        assert!(err.message.contains("takes (integer)"));

        let err = first_error("default { timer() { }\n timer() { } }");
        assert_eq!(err.line, 2);
        assert!(err.message.contains("already declared"));
    }

    #[test]
    fn test_builtins_cannot_be_redeclared() {
        let err = first_error("llAbs() { }\ndefault { state_entry() { } }");
        assert!(err.message.contains("built-in function"));

        let err = first_error("float PI = 3;\ndefault { state_entry() { } }");
        assert!(err.message.contains("built-in constant"));
    }

    #[test]
    fn test_global_initializers_see_earlier_globals_only() {
        assert!(compile("integer a = 1;\ninteger b = a + 1;\ndefault { state_entry() { } }").is_ok());

        let err = first_error("integer b = a + 1;\ninteger a = 1;\ndefault { state_entry() { } }");
        assert_eq!(err.line, 1);
        assert!(err.message.contains("undeclared identifier 'a'"));
    }

    #[test]
    fn test_directives() {
        let source = "#dialect ossl\ndefault { state_entry() { integer m = osMax(1, 2); } }";
        assert!(compile(source).is_ok());

        let err = first_error("#include \"lib.lsl\"\ndefault { state_entry() { } }");
        assert_eq!(err.kind, DiagnosticKind::Syntax);
        assert!(err.message.contains("unresolved preprocessor directive"));

        let err = first_error("#dialect cobol\ndefault { state_entry() { } }");
        assert!(err.message.contains("unknown dialect"));
    }

    #[test]
    fn test_host_resolved_directive_lines() {
        let registry = Registry::standard();
        let mut lines = BTreeMap::new();
        lines.insert(1, "integer shared = 7;".to_string());
        let unit = Compiler::new(&registry)
            .compile("#include \"shared.lsl\"\ndefault { state_entry() { shared += 1; } }", &lines)
            .unwrap();
        assert_eq!(unit.globals()[0].name, "shared");
    }

    #[test]
    fn test_diagnostics_are_collected_across_bodies() {
        let source = "default {\n state_entry() { x = 1; }\n touch_start(integer n) { y = 2; }\n}";
        let report = compile(source).unwrap_err();
        let lines: Vec<usize> = report.iter().map(|d| d.line).collect();
        assert_eq!(lines, vec![2, 3]);

        let registry = Registry::standard();
        let options = CompileOptions {
            continue_after_error: false,
            ..CompileOptions::default()
        };
        let report = Compiler::with_options(&registry, options)
            .compile(source, &BTreeMap::new())
            .unwrap_err();
        assert_eq!(report.len(), 1);
    }

    #[test]
    fn test_max_errors_caps_the_report() {
        let source = "default {\n state_entry() { a = 1; }\n timer() { b = 1; }\n on_rez(integer p) { c = 1; }\n}";
        let registry = Registry::standard();
        let options = CompileOptions {
            max_errors: 2,
            ..CompileOptions::default()
        };
        let report = Compiler::with_options(&registry, options)
            .compile(source, &BTreeMap::new())
            .unwrap_err();
        assert_eq!(report.len(), 2);
    }

    #[test]
    fn test_call_sites_are_bound() {
        let unit = compile("default { state_entry() {\n llSay(0, \"hi\");\n float f = llFabs(-1.5); } }").unwrap();
        let sites = unit.call_sites();
        assert_eq!(sites.len(), 2);
        assert_eq!(sites[0].name, "llSay");
        assert_eq!(sites[0].line, 2);
        assert_eq!(sites[0].body, "default.state_entry");
        assert_eq!(sites[1].name, "llFabs");
    }

    #[test]
    fn test_check_mode_reports_the_same_errors() {
        let registry = Registry::standard();
        let compiler = Compiler::with_options(
            &registry,
            CompileOptions {
                visibility: Visibility::new(Dialects::LSL),
                ..CompileOptions::default()
            },
        );
        let good = "default { state_entry() { integer i; for (i = 0; i < 3; i++) llSay(0, (string)i); } }";
        assert!(compiler.check(good, &BTreeMap::new()).is_ok());

        let bad = "default { state_entry() { if (1) { } } } }";
        let checked = compiler.check(bad, &BTreeMap::new()).unwrap_err();
        let compiled = compiler.compile(bad, &BTreeMap::new()).unwrap_err();
        assert_eq!(checked, compiled);
    }

    #[test]
    fn test_unclosed_state() {
        let err = first_error("default {\n state_entry() {\n }\n");
        assert_eq!(err.kind, DiagnosticKind::Syntax);
        assert_eq!(err.line, 1);
        assert_eq!(err.message, "missing '}' to close state \"default\"");
    }
}

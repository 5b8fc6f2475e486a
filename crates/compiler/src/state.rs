//! Per-compilation tables
//!
//! A [`CompileState`] is created for one compile call and owned by it
//! exclusively; nothing in it outlives the call.

use crate::ast::VarRef;
use crate::bytecode::LocalSlot;
use crate::control::{Frame, LabelBook, UserLabel};
use crate::error::{Diagnostic, Result};
use crate::lexer::Token;
use gridscript_core::ScriptType;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: ScriptType,
}

/// Top-level variable; the initializer stays a raw token run until the body pass
#[derive(Debug, Clone)]
pub struct GlobalDecl {
    pub name: String,
    pub ty: ScriptType,
    pub line: usize,
    pub init: Vec<Token>,
}

/// Token run of a `{ … }` body after its opening brace
///
/// The run ends with the body's closing `}` when one was found; the body
/// compiler's entry frame is what consumes it.
#[derive(Debug, Clone)]
pub struct Body {
    pub tokens: Vec<Token>,
    pub open_line: usize,
    pub close_line: usize,
    /// The run ends with a closing `}` rather than at a declaration or the end of input
    pub closed: bool,
}

#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub name: String,
    pub returns: Option<ScriptType>,
    pub params: Vec<Param>,
    pub body: Body,
    pub line: usize,
}

#[derive(Debug, Clone)]
pub struct EventDecl {
    pub name: String,
    pub params: Vec<Param>,
    pub body: Body,
    pub line: usize,
}

#[derive(Debug, Clone)]
pub struct StateDecl {
    pub name: String,
    pub line: usize,
    pub events: Vec<EventDecl>,
}

#[derive(Debug, Default)]
pub struct CompileState {
    pub globals: Vec<GlobalDecl>,
    pub functions: Vec<FunctionDecl>,
    pub states: Vec<StateDecl>,
    global_index: HashMap<String, usize>,
    function_index: HashMap<String, usize>,
    state_index: HashMap<String, usize>,

    /// Globals an expression may reference; initializers only see earlier ones
    visible_globals: usize,

    scopes: Vec<Vec<(String, usize)>>,
    locals: Vec<LocalSlot>,

    pub(crate) frames: Vec<Frame>,
    pub(crate) labels: LabelBook,
    pub(crate) user_labels: BTreeMap<String, UserLabel>,
}

impl CompileState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare_global(&mut self, decl: GlobalDecl) -> Result<()> {
        if self.global_index.contains_key(&decl.name) || self.function_index.contains_key(&decl.name) {
            return Err(Diagnostic::semantic(
                decl.line,
                format!("'{}' is already declared", decl.name),
            ));
        }
        self.global_index.insert(decl.name.clone(), self.globals.len());
        self.globals.push(decl);
        self.visible_globals = self.globals.len();
        Ok(())
    }

    pub fn declare_function(&mut self, decl: FunctionDecl) -> Result<()> {
        if self.global_index.contains_key(&decl.name) || self.function_index.contains_key(&decl.name) {
            return Err(Diagnostic::semantic(
                decl.line,
                format!("'{}' is already declared", decl.name),
            ));
        }
        self.function_index.insert(decl.name.clone(), self.functions.len());
        self.functions.push(decl);
        Ok(())
    }

    pub fn declare_state(&mut self, decl: StateDecl) -> Result<()> {
        if self.state_index.contains_key(&decl.name) {
            return Err(Diagnostic::semantic(
                decl.line,
                format!("state \"{}\" is already declared", decl.name),
            ));
        }
        self.state_index.insert(decl.name.clone(), self.states.len());
        self.states.push(decl);
        Ok(())
    }

    pub fn function_index(&self, name: &str) -> Option<usize> {
        self.function_index.get(name).copied()
    }

    pub fn state_index(&self, name: &str) -> Option<usize> {
        self.state_index.get(name).copied()
    }

    /// Restrict global lookups to the first `count` globals
    pub fn set_visible_globals(&mut self, count: usize) {
        self.visible_globals = count.min(self.globals.len());
    }

    /// Resolve a variable name, innermost scope first
    pub fn lookup_variable(&self, name: &str) -> Option<(VarRef, ScriptType)> {
        for scope in self.scopes.iter().rev() {
            if let Some((_, slot)) = scope.iter().rev().find(|(n, _)| n == name) {
                return Some((VarRef::Local(*slot), self.locals[*slot].ty));
            }
        }
        self.global_index
            .get(name)
            .filter(|index| **index < self.visible_globals)
            .map(|index| (VarRef::Global(*index), self.globals[*index].ty))
    }

    /// Reset per-body bookkeeping before compiling a new body
    pub fn begin_body(&mut self) {
        self.visible_globals = self.globals.len();
        self.scopes.clear();
        self.locals.clear();
        self.frames.clear();
        self.labels.clear();
        self.user_labels.clear();
    }

    /// Slots used by the body just compiled
    pub fn take_locals(&mut self) -> Vec<LocalSlot> {
        std::mem::take(&mut self.locals)
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Vec::new());
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    /// Allocate a fresh slot for a local in the innermost scope
    pub fn declare_local(&mut self, name: &str, ty: ScriptType, line: usize) -> Result<usize> {
        let Some(scope) = self.scopes.last_mut() else {
            return Err(Diagnostic::internal(line, format!("no open scope for local '{}'", name)));
        };
        if scope.iter().any(|(n, _)| n == name) {
            return Err(Diagnostic::semantic(
                line,
                format!("'{}' is already declared in this scope", name),
            ));
        }
        let slot = self.locals.len();
        scope.push((name.to_string(), slot));
        self.locals.push(LocalSlot {
            name: name.to_string(),
            ty,
        });
        Ok(slot)
    }
}

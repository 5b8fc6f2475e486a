//! Compiled unit
//!
//! The output of a successful compile: everything an external loader needs to
//! instantiate the script, with no remaining reference to the source.

use crate::bytecode::{Chunk, Instr};
use crate::ast::CallTarget;
use crate::state::Param;
use gridscript_core::ScriptType;
use gridscript_registry::FunctionId;
use serde::Serialize;

/// A script-wide variable and the code computing its initial value
#[derive(Debug, Clone)]
pub struct GlobalSlot {
    pub name: String,
    pub ty: ScriptType,
    pub init: Chunk,
}

/// A user-defined function
#[derive(Debug, Clone)]
pub struct ScriptFunction {
    pub name: String,
    pub params: Vec<Param>,
    pub returns: Option<ScriptType>,
    pub chunk: Chunk,
}

/// Entry point for one event in one state
#[derive(Debug, Clone)]
pub struct EventHandler {
    pub name: String,
    pub params: Vec<Param>,
    pub chunk: Chunk,
}

#[derive(Debug, Clone)]
pub struct CompiledState {
    pub name: String,
    pub events: Vec<EventHandler>,
}

impl CompiledState {
    pub fn event(&self, name: &str) -> Option<&EventHandler> {
        self.events.iter().find(|e| e.name == name)
    }
}

/// A call bound to one registry overload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallSite {
    /// `function`, `state.event` or `global` the call appears in
    pub body: String,
    pub line: usize,
    pub function: FunctionId,
    pub name: String,
}

/// Executable form of one script
#[derive(Debug, Clone)]
pub struct CompiledUnit {
    pub(crate) globals: Vec<GlobalSlot>,
    pub(crate) functions: Vec<ScriptFunction>,
    pub(crate) states: Vec<CompiledState>,
    pub(crate) call_sites: Vec<CallSite>,
}

impl CompiledUnit {
    pub fn globals(&self) -> &[GlobalSlot] {
        &self.globals
    }

    pub fn functions(&self) -> &[ScriptFunction] {
        &self.functions
    }

    /// States in declaration order
    pub fn states(&self) -> &[CompiledState] {
        &self.states
    }

    pub fn state(&self, name: &str) -> Option<&CompiledState> {
        self.states.iter().find(|s| s.name == name)
    }

    pub fn state_index(&self, name: &str) -> Option<usize> {
        self.states.iter().position(|s| s.name == name)
    }

    pub fn call_sites(&self) -> &[CallSite] {
        &self.call_sites
    }

    /// Human-readable listing of every chunk
    pub fn disassemble(&self) -> String {
        let mut out = String::new();
        for global in &self.globals {
            out.push_str(&global.init.disassemble(&format!("global {} {}", global.ty, global.name)));
        }
        for function in &self.functions {
            out.push_str(&function.chunk.disassemble(&format!("function {}", function.name)));
        }
        for state in &self.states {
            for event in &state.events {
                out.push_str(&event.chunk.disassemble(&format!("{}.{}", state.name, event.name)));
            }
        }
        out
    }
}

/// Registry calls made by `chunk`, attributed to `body`
pub(crate) fn collect_call_sites(
    chunk: &Chunk,
    body: &str,
    name_of: impl Fn(FunctionId) -> String,
    out: &mut Vec<CallSite>,
) {
    for (instr, line) in chunk.code.iter().zip(&chunk.lines) {
        if let Instr::Call {
            target: CallTarget::Api(id),
            ..
        } = instr
        {
            out.push(CallSite {
                body: body.to_string(),
                line: *line,
                function: *id,
                name: name_of(*id),
            });
        }
    }
}

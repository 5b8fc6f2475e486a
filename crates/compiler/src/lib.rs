//! # GridScript Compiler
//!
//! Turns script source into a [`CompiledUnit`] bound to a [`Registry`].
//!
//! ## Pipeline
//! - Tokenizer with host-resolved directive lines
//! - Table-driven precedence resolver producing typed expressions
//! - Frame-stack control-flow generator emitting labels and branches
//! - Frontend: preprocessing, declaration pass, body pass, check mode
//!
//! ## Backends
//! Code generation only talks to the [`Emitter`] trait. [`ChunkEmitter`]
//! produces bytecode chunks and [`CheckEmitter`] discards everything.
//! The simulation [`Vm`] runs compiled units for tests and tooling.
//!
//! [`Registry`]: gridscript_registry::Registry

pub mod error;
pub mod lexer;
pub mod operators;
pub mod ast;
pub mod emit;
pub mod bytecode;
pub mod state;
pub mod resolver;
pub mod codegen;
pub mod control;
pub mod body;
pub mod compiler;
pub mod unit;
pub mod arith;
pub mod vm;

pub use error::{CompileReport, Diagnostic, DiagnosticKind, Result};
pub use lexer::{tokenize, Lexer, Token, TokenKind};
pub use emit::{CheckEmitter, Emitter, Label, Op};
pub use bytecode::{Chunk, ChunkEmitter, Instr};
pub use compiler::{CompileOptions, Compiler};
pub use unit::{CallSite, CompiledState, CompiledUnit, EventHandler, GlobalSlot, ScriptFunction};
pub use vm::Vm;

//! Code-emission interface
//!
//! The control-flow generator and expression code generator talk only to
//! [`Emitter`], so one frontend drives several backends: [`ChunkEmitter`]
//! builds bytecode and [`CheckEmitter`] discards everything for syntax checks.
//!
//! [`ChunkEmitter`]: crate::bytecode::ChunkEmitter

use crate::ast::{Axis, CallTarget, VarRef};
use crate::operators::{BinaryOp, UnaryOp};
use gridscript_core::{ScriptType, Value};
use std::fmt;

/// Opaque branch target issued by an emitter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(pub u32);

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Non-branching stack operations
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Push(Value),
    Load(VarRef),
    Store(VarRef),
    /// Replace the vector/rotation on top of the stack with one component
    GetMember(Axis),
    /// Pop a float into one component of a variable
    StoreMember(VarRef, Axis),
    Pop,
    Dup,
    Unary(UnaryOp),
    Binary(BinaryOp),
    Cast(ScriptType),
    Convert(ScriptType),
    MakeVector,
    MakeRotation,
    MakeList(usize),
    Return { with_value: bool },
    ChangeState(usize),
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Push(Value::String(s)) => write!(f, "PUSH {:?}", s),
            Op::Push(value) => write!(f, "PUSH {}", value),
            Op::Load(var) => write!(f, "LOAD {}", var),
            Op::Store(var) => write!(f, "STORE {}", var),
            Op::GetMember(axis) => write!(f, "GET_MEMBER .{}", axis.name()),
            Op::StoreMember(var, axis) => write!(f, "STORE_MEMBER {}.{}", var, axis.name()),
            Op::Pop => f.write_str("POP"),
            Op::Dup => f.write_str("DUP"),
            Op::Unary(op) => write!(f, "UNARY {}", op),
            Op::Binary(op) => write!(f, "BINARY {}", op),
            Op::Cast(ty) => write!(f, "CAST {}", ty),
            Op::Convert(ty) => write!(f, "CONVERT {}", ty),
            Op::MakeVector => f.write_str("MAKE_VECTOR"),
            Op::MakeRotation => f.write_str("MAKE_ROTATION"),
            Op::MakeList(n) => write!(f, "MAKE_LIST {}", n),
            Op::Return { with_value: true } => f.write_str("RETURN_VALUE"),
            Op::Return { with_value: false } => f.write_str("RETURN"),
            Op::ChangeState(index) => write!(f, "STATE {}", index),
        }
    }
}

/// Backend interface
pub trait Emitter {
    fn new_label(&mut self) -> Label;

    /// Bind `label` to the next emitted position
    fn mark_label(&mut self, label: Label);

    fn branch(&mut self, label: Label);

    /// Pop a value and branch when it is false
    fn branch_if_false(&mut self, label: Label);

    /// Call with `argc` arguments already pushed
    fn emit_call(&mut self, target: CallTarget, argc: usize);

    fn emit(&mut self, op: Op);

    /// Source line attributed to code emitted from now on
    fn set_line(&mut self, _line: usize) {}
}

/// Backend for syntax-check mode
#[derive(Debug, Default)]
pub struct CheckEmitter {
    labels: u32,
}

impl CheckEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn labels_issued(&self) -> u32 {
        self.labels
    }
}

impl Emitter for CheckEmitter {
    fn new_label(&mut self) -> Label {
        self.labels += 1;
        Label(self.labels - 1)
    }

    fn mark_label(&mut self, _label: Label) {}

    fn branch(&mut self, _label: Label) {}

    fn branch_if_false(&mut self, _label: Label) {}

    fn emit_call(&mut self, _target: CallTarget, _argc: usize) {}

    fn emit(&mut self, _op: Op) {}
}

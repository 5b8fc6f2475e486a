//! Typed expression tree
//!
//! Every node produced by the resolver already has its names bound (to
//! variable slots, registry overloads or script functions) and its result
//! type computed, so code generation never looks anything up.

use crate::operators::{BinaryOp, UnaryOp};
use gridscript_core::{ScriptType, Value};
use gridscript_registry::FunctionId;
use std::fmt;

/// Storage slot of a variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarRef {
    /// Slot in the current body's frame
    Local(usize),
    /// Script-wide slot
    Global(usize),
}

/// Component of a vector or rotation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
    S,
}

impl Axis {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "x" => Some(Axis::X),
            "y" => Some(Axis::Y),
            "z" => Some(Axis::Z),
            "s" => Some(Axis::S),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
            Axis::S => "s",
        }
    }

    /// Whether values of `ty` have this component
    pub fn applies_to(self, ty: ScriptType) -> bool {
        match ty {
            ScriptType::Vector => self != Axis::S,
            ScriptType::Rotation => true,
            _ => false,
        }
    }
}

/// Statically selected callee
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallTarget {
    /// Registry overload
    Api(FunctionId),
    /// Index into the script's own function table
    Script(usize),
}

/// Assignable location
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Place {
    Var(VarRef),
    Member(VarRef, Axis),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Value),
    Load(VarRef),
    Member {
        base: Box<Expr>,
        axis: Axis,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `place = value` or `place op= value`
    Assign {
        place: Place,
        op: Option<BinaryOp>,
        value: Box<Expr>,
    },
    /// `++`/`--` in either position
    Step {
        place: Place,
        increment: bool,
        prefix: bool,
    },
    /// Explicit `(type)` cast
    Cast {
        to: ScriptType,
        operand: Box<Expr>,
    },
    /// Implicit conversion inserted by the resolver
    Convert {
        to: ScriptType,
        operand: Box<Expr>,
    },
    Call {
        target: CallTarget,
        args: Vec<Expr>,
    },
    Vector(Vec<Expr>),
    Rotation(Vec<Expr>),
    List(Vec<Expr>),
    /// `@name` label definition
    Label(String),
}

/// A resolved expression; `ty` is `None` for void calls and labels
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: Option<ScriptType>,
    pub line: usize,
}

impl Expr {
    pub fn new(kind: ExprKind, ty: Option<ScriptType>, line: usize) -> Self {
        Self { kind, ty, line }
    }

    pub fn literal(value: Value, line: usize) -> Self {
        let ty = value.script_type();
        Self::new(ExprKind::Literal(value), Some(ty), line)
    }

    /// Location this expression names, if it is assignable
    pub fn place(&self) -> Option<Place> {
        match &self.kind {
            ExprKind::Load(var) => Some(Place::Var(*var)),
            ExprKind::Member { base, axis } => match base.kind {
                ExprKind::Load(var) => Some(Place::Member(var, *axis)),
                _ => None,
            },
            _ => None,
        }
    }

    /// Wrap in an implicit conversion when the type differs from `to`
    pub fn converted(self, to: ScriptType) -> Expr {
        if self.ty == Some(to) {
            return self;
        }
        let line = self.line;
        Expr::new(
            ExprKind::Convert {
                to,
                operand: Box::new(self),
            },
            Some(to),
            line,
        )
    }

    pub fn as_literal(&self) -> Option<&Value> {
        match &self.kind {
            ExprKind::Literal(value) => Some(value),
            _ => None,
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, open: &str, items: &[Expr], close: &str) -> fmt::Result {
    f.write_str(open)?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item)?;
    }
    f.write_str(close)
}

impl fmt::Display for VarRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VarRef::Local(slot) => write!(f, "local{}", slot),
            VarRef::Global(slot) => write!(f, "global{}", slot),
        }
    }
}

impl fmt::Display for Place {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Place::Var(var) => write!(f, "{}", var),
            Place::Member(var, axis) => write!(f, "{}.{}", var, axis.name()),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Literal(Value::String(s)) => write!(f, "{:?}", s),
            ExprKind::Literal(value) => write!(f, "{}", value),
            ExprKind::Load(var) => write!(f, "{}", var),
            ExprKind::Member { base, axis } => write!(f, "{}.{}", base, axis.name()),
            ExprKind::Unary { op, operand } => write!(f, "{}{}", op, operand),
            ExprKind::Binary { op, left, right } => write!(f, "({} {} {})", left, op, right),
            ExprKind::Assign { place, op, value } => match op {
                Some(op) => write!(f, "({} {}= {})", place, op, value),
                None => write!(f, "({} = {})", place, value),
            },
            ExprKind::Step { place, increment, prefix } => {
                let symbol = if *increment { "++" } else { "--" };
                if *prefix {
                    write!(f, "{}{}", symbol, place)
                } else {
                    write!(f, "{}{}", place, symbol)
                }
            }
            ExprKind::Cast { to, operand } => write!(f, "({}){}", to, operand),
            ExprKind::Convert { operand, .. } => write!(f, "{}", operand),
            ExprKind::Call { target, args } => {
                match target {
                    CallTarget::Api(id) => write!(f, "api{}", id.0)?,
                    CallTarget::Script(index) => write!(f, "fn{}", index)?,
                }
                write_list(f, "(", args, ")")
            }
            ExprKind::Vector(parts) | ExprKind::Rotation(parts) => write_list(f, "<", parts, ">"),
            ExprKind::List(items) => write_list(f, "[", items, "]"),
            ExprKind::Label(name) => write!(f, "@{}", name),
        }
    }
}

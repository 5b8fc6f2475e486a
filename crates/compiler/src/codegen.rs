//! Expression code generation
//!
//! Lowers resolved expressions onto an [`Emitter`]. Operands are pushed left
//! to right; every value-producing node leaves exactly one value behind.

use crate::ast::{Expr, ExprKind, Place};
use crate::emit::{Emitter, Op};
use crate::error::{Diagnostic, Result};
use crate::operators::BinaryOp;
use crate::resolver::binary_type;
use gridscript_core::{ScriptType, Value};

/// Emit `expr`, leaving its value on the stack
pub fn emit_value(em: &mut dyn Emitter, expr: &Expr) -> Result<()> {
    match &expr.kind {
        ExprKind::Literal(value) => em.emit(Op::Push(value.clone())),
        ExprKind::Load(var) => em.emit(Op::Load(*var)),
        ExprKind::Member { base, axis } => {
            emit_value(em, base)?;
            em.emit(Op::GetMember(*axis));
        }
        ExprKind::Unary { op, operand } => {
            emit_value(em, operand)?;
            em.emit(Op::Unary(*op));
        }
        ExprKind::Binary { op, left, right } => {
            emit_value(em, left)?;
            emit_value(em, right)?;
            em.emit(Op::Binary(*op));
        }
        ExprKind::Assign { place, op, value } => emit_assign(em, expr, *place, *op, value, true)?,
        ExprKind::Step {
            place,
            increment,
            prefix,
        } => emit_step(em, expr, *place, *increment, *prefix, true)?,
        ExprKind::Cast { to, operand } => {
            emit_value(em, operand)?;
            em.emit(Op::Cast(*to));
        }
        ExprKind::Convert { to, operand } => {
            emit_value(em, operand)?;
            em.emit(Op::Convert(*to));
        }
        ExprKind::Call { target, args } => {
            if expr.ty.is_none() {
                return Err(Diagnostic::semantic(expr.line, "function returns no value"));
            }
            for arg in args {
                emit_value(em, arg)?;
            }
            em.emit_call(*target, args.len());
        }
        ExprKind::Vector(parts) => {
            for part in parts {
                emit_value(em, part)?;
            }
            em.emit(Op::MakeVector);
        }
        ExprKind::Rotation(parts) => {
            for part in parts {
                emit_value(em, part)?;
            }
            em.emit(Op::MakeRotation);
        }
        ExprKind::List(items) => {
            for item in items {
                emit_value(em, item)?;
            }
            em.emit(Op::MakeList(items.len()));
        }
        ExprKind::Label(name) => {
            return Err(Diagnostic::semantic(
                expr.line,
                format!("label '@{}' cannot be used as a value", name),
            ))
        }
    }
    Ok(())
}

/// Emit `expr` for its side effects only
pub fn emit_discard(em: &mut dyn Emitter, expr: &Expr) -> Result<()> {
    match &expr.kind {
        ExprKind::Assign { place, op, value } => emit_assign(em, expr, *place, *op, value, false),
        ExprKind::Step {
            place,
            increment,
            prefix,
        } => emit_step(em, expr, *place, *increment, *prefix, false),
        ExprKind::Call { target, args } => {
            for arg in args {
                emit_value(em, arg)?;
            }
            em.emit_call(*target, args.len());
            if expr.ty.is_some() {
                em.emit(Op::Pop);
            }
            Ok(())
        }
        ExprKind::Label(name) => Err(Diagnostic::syntax(
            expr.line,
            format!("label '@{}' must stand on its own as a statement", name),
        )),
        _ => {
            emit_value(em, expr)?;
            em.emit(Op::Pop);
            Ok(())
        }
    }
}

fn place_type(expr: &Expr) -> Result<ScriptType> {
    expr.ty
        .ok_or_else(|| Diagnostic::internal(expr.line, "assignment without a target type"))
}

fn load_place(em: &mut dyn Emitter, place: Place) {
    match place {
        Place::Var(var) => em.emit(Op::Load(var)),
        Place::Member(var, axis) => {
            em.emit(Op::Load(var));
            em.emit(Op::GetMember(axis));
        }
    }
}

fn store_place(em: &mut dyn Emitter, place: Place) {
    match place {
        Place::Var(var) => em.emit(Op::Store(var)),
        Place::Member(var, axis) => em.emit(Op::StoreMember(var, axis)),
    }
}

fn emit_assign(
    em: &mut dyn Emitter,
    expr: &Expr,
    place: Place,
    op: Option<BinaryOp>,
    value: &Expr,
    keep: bool,
) -> Result<()> {
    let target = place_type(expr)?;
    match op {
        None => emit_value(em, value)?,
        Some(op) => {
            let found = value
                .ty
                .ok_or_else(|| Diagnostic::semantic(value.line, "expression has no value"))?;
            load_place(em, place);
            emit_value(em, value)?;
            em.emit(Op::Binary(op));
            if binary_type(op, target, found, expr.line)? != target {
                em.emit(Op::Convert(target));
            }
        }
    }
    if keep {
        em.emit(Op::Dup);
    }
    store_place(em, place);
    Ok(())
}

fn emit_step(
    em: &mut dyn Emitter,
    expr: &Expr,
    place: Place,
    increment: bool,
    prefix: bool,
    keep: bool,
) -> Result<()> {
    let one = match place_type(expr)? {
        ScriptType::Integer => Value::Integer(1),
        ScriptType::Long => Value::Long(1),
        ScriptType::Float => Value::Float(1.0),
        other => {
            return Err(Diagnostic::internal(
                expr.line,
                format!("increment of a {} place reached code generation", other),
            ))
        }
    };
    let op = if increment { BinaryOp::Add } else { BinaryOp::Sub };

    load_place(em, place);
    if keep && !prefix {
        em.emit(Op::Dup);
    }
    em.emit(Op::Push(one));
    em.emit(Op::Binary(op));
    if keep && prefix {
        em.emit(Op::Dup);
    }
    store_place(em, place);
    Ok(())
}

/// Code for a global initializer: the value, then a return
pub(crate) fn emit_initializer(em: &mut dyn Emitter, init: Option<&Expr>, ty: ScriptType) -> Result<()> {
    match init {
        Some(expr) => emit_value(em, expr)?,
        None => em.emit(Op::Push(ty.default_value())),
    }
    em.emit(Op::Return { with_value: true });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Axis, VarRef};
    use crate::bytecode::{ChunkEmitter, Instr};

    fn code(expr: &Expr, discard: bool) -> Vec<Instr> {
        let mut em = ChunkEmitter::new();
        if discard {
            emit_discard(&mut em, expr).unwrap();
        } else {
            emit_value(&mut em, expr).unwrap();
        }
        em.finish(Vec::new()).unwrap().code
    }

    fn local(slot: usize, ty: ScriptType) -> Expr {
        Expr::new(ExprKind::Load(VarRef::Local(slot)), Some(ty), 1)
    }

    #[test]
    fn test_chained_assignment_keeps_value() {
        let inner = Expr::new(
            ExprKind::Assign {
                place: Place::Var(VarRef::Local(1)),
                op: None,
                value: Box::new(Expr::literal(Value::Integer(5), 1)),
            },
            Some(ScriptType::Integer),
            1,
        );
        let outer = Expr::new(
            ExprKind::Assign {
                place: Place::Var(VarRef::Local(0)),
                op: None,
                value: Box::new(inner),
            },
            Some(ScriptType::Integer),
            1,
        );

        let ops: Vec<Instr> = vec![
            Instr::Op(Op::Push(Value::Integer(5))),
            Instr::Op(Op::Dup),
            Instr::Op(Op::Store(VarRef::Local(1))),
            Instr::Op(Op::Store(VarRef::Local(0))),
        ];
        assert_eq!(code(&outer, true), ops);
    }

    #[test]
    fn test_compound_assignment_converts_result() {
        let compound = |ty: ScriptType, value: Value| {
            Expr::new(
                ExprKind::Assign {
                    place: Place::Var(VarRef::Local(0)),
                    op: Some(BinaryOp::Add),
                    value: Box::new(Expr::literal(value, 1)),
                },
                Some(ty),
                1,
            )
        };

        // key += string concatenates to a string, stored back as a key
        let code_key = code(&compound(ScriptType::Key, Value::String("-x".into())), true);
        assert_eq!(code_key[3], Instr::Op(Op::Convert(ScriptType::Key)));

        let code_float = code(&compound(ScriptType::Float, Value::Integer(1)), true);
        assert_eq!(code_float.len(), 4);
    }

    #[test]
    fn test_postfix_step_leaves_old_value() {
        let expr = Expr::new(
            ExprKind::Step {
                place: Place::Var(VarRef::Local(0)),
                increment: true,
                prefix: false,
            },
            Some(ScriptType::Integer),
            1,
        );
        assert_eq!(
            code(&expr, false),
            vec![
                Instr::Op(Op::Load(VarRef::Local(0))),
                Instr::Op(Op::Dup),
                Instr::Op(Op::Push(Value::Integer(1))),
                Instr::Op(Op::Binary(BinaryOp::Add)),
                Instr::Op(Op::Store(VarRef::Local(0))),
            ]
        );
    }

    #[test]
    fn test_member_store() {
        let expr = Expr::new(
            ExprKind::Assign {
                place: Place::Member(VarRef::Global(2), Axis::Y),
                op: None,
                value: Box::new(Expr::literal(Value::Float(0.5), 1)),
            },
            Some(ScriptType::Float),
            1,
        );
        assert_eq!(
            code(&expr, true),
            vec![
                Instr::Op(Op::Push(Value::Float(0.5))),
                Instr::Op(Op::StoreMember(VarRef::Global(2), Axis::Y)),
            ]
        );
    }

    #[test]
    fn test_discarded_value_is_popped() {
        let code = code(&local(0, ScriptType::String), true);
        assert_eq!(code.last(), Some(&Instr::Op(Op::Pop)));
    }

    #[test]
    fn test_label_is_not_a_value() {
        let mut em = ChunkEmitter::new();
        let label = Expr::new(ExprKind::Label("top".into()), None, 3);
        let err = emit_value(&mut em, &label).unwrap_err();
        assert_eq!(err.line, 3);
    }
}

//! Runtime operator semantics for the simulation VM

use crate::ast::Axis;
use crate::operators::{BinaryOp, UnaryOp};
use gridscript_core::{Rotation, ScriptType, Value, Vector};
use gridscript_registry::{Result, ScriptError};
use nom::branch::alt;
use nom::bytes::complete::tag_no_case;
use nom::character::complete::{char, digit1, hex_digit1, multispace0, one_of};
use nom::combinator::{opt, recognize};
use nom::multi::separated_list1;
use nom::number::complete::double;
use nom::sequence::{delimited, pair, preceded, tuple};
use nom::IResult;
use std::cmp::Ordering;

fn type_error(op: impl std::fmt::Display, left: &Value, right: &Value) -> ScriptError {
    ScriptError::RuntimeError(format!(
        "operator '{}' cannot be applied to {} and {}",
        op,
        left.script_type(),
        right.script_type()
    ))
}

pub fn apply_unary(op: UnaryOp, value: Value) -> Result<Value> {
    Ok(match (op, value) {
        (UnaryOp::Not, value) => Value::bool(!value.is_truthy()),
        (UnaryOp::Negate, Value::Integer(i)) => Value::Integer(i.wrapping_neg()),
        (UnaryOp::Negate, Value::Long(l)) => Value::Long(l.wrapping_neg()),
        (UnaryOp::Negate, Value::Float(f)) => Value::Float(-f),
        (UnaryOp::Negate, Value::Vector(v)) => Value::Vector(v.scale(-1.0)),
        (UnaryOp::Negate, Value::Rotation(r)) => Value::Rotation(Rotation::new(-r.x, -r.y, -r.z, -r.s)),
        (UnaryOp::BitNot, Value::Integer(i)) => Value::Integer(!i),
        (UnaryOp::BitNot, Value::Long(l)) => Value::Long(!l),
        (op, value) => {
            return Err(ScriptError::RuntimeError(format!(
                "operator '{}' cannot be applied to {}",
                op,
                value.script_type()
            )))
        }
    })
}

/// Numeric operands promoted to a common representation
enum Promoted {
    Int(i32, i32),
    Long(i64, i64),
    Float(f64, f64),
}

fn promote(left: &Value, right: &Value) -> Option<Promoted> {
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => Some(Promoted::Int(*a, *b)),
        (Value::Float(_), _) | (_, Value::Float(_)) => Some(Promoted::Float(left.as_float()?, right.as_float()?)),
        (Value::Long(a), Value::Long(b)) => Some(Promoted::Long(*a, *b)),
        (Value::Long(a), Value::Integer(b)) => Some(Promoted::Long(*a, *b as i64)),
        (Value::Integer(a), Value::Long(b)) => Some(Promoted::Long(*a as i64, *b)),
        _ => None,
    }
}

fn equals(left: &Value, right: &Value) -> bool {
    if let Some(promoted) = promote(left, right) {
        return match promoted {
            Promoted::Int(a, b) => a == b,
            Promoted::Long(a, b) => a == b,
            Promoted::Float(a, b) => a == b,
        };
    }
    match (left, right) {
        (Value::String(a) | Value::Key(a), Value::String(b) | Value::Key(b)) => a == b,
        // Lists compare by length
        (Value::List(a), Value::List(b)) => a.len() == b.len(),
        _ => left == right,
    }
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> Result<Value> {
    let ordering = match promote(left, right) {
        Some(Promoted::Int(a, b)) => a.partial_cmp(&b),
        Some(Promoted::Long(a, b)) => a.partial_cmp(&b),
        Some(Promoted::Float(a, b)) => a.partial_cmp(&b),
        None => return Err(type_error(op, left, right)),
    };
    let result = match (op, ordering) {
        (_, None) => false,
        (BinaryOp::Less, Some(o)) => o == Ordering::Less,
        (BinaryOp::LessEqual, Some(o)) => o != Ordering::Greater,
        (BinaryOp::Greater, Some(o)) => o == Ordering::Greater,
        (BinaryOp::GreaterEqual, Some(o)) => o != Ordering::Less,
        _ => return Err(type_error(op, left, right)),
    };
    Ok(Value::bool(result))
}

fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> Result<Value> {
    let Some(promoted) = promote(left, right) else {
        return Err(type_error(op, left, right));
    };
    Ok(match promoted {
        Promoted::Int(a, b) => Value::Integer(match op {
            BinaryOp::Add => a.wrapping_add(b),
            BinaryOp::Sub => a.wrapping_sub(b),
            BinaryOp::Mul => a.wrapping_mul(b),
            BinaryOp::Div | BinaryOp::Mod if b == 0 => return Err(ScriptError::DivisionByZero),
            BinaryOp::Div => a.wrapping_div(b),
            BinaryOp::Mod => a.wrapping_rem(b),
            BinaryOp::LeftShift => a.wrapping_shl(b as u32),
            BinaryOp::RightShift => a.wrapping_shr(b as u32),
            BinaryOp::BitAnd => a & b,
            BinaryOp::BitXor => a ^ b,
            BinaryOp::BitOr => a | b,
            _ => return Err(type_error(op, left, right)),
        }),
        Promoted::Long(a, b) => Value::Long(match op {
            BinaryOp::Add => a.wrapping_add(b),
            BinaryOp::Sub => a.wrapping_sub(b),
            BinaryOp::Mul => a.wrapping_mul(b),
            BinaryOp::Div | BinaryOp::Mod if b == 0 => return Err(ScriptError::DivisionByZero),
            BinaryOp::Div => a.wrapping_div(b),
            BinaryOp::Mod => a.wrapping_rem(b),
            BinaryOp::LeftShift => a.wrapping_shl(b as u32),
            BinaryOp::RightShift => a.wrapping_shr(b as u32),
            BinaryOp::BitAnd => a & b,
            BinaryOp::BitXor => a ^ b,
            BinaryOp::BitOr => a | b,
            _ => return Err(type_error(op, left, right)),
        }),
        Promoted::Float(a, b) => Value::Float(match op {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div if b == 0.0 => return Err(ScriptError::DivisionByZero),
            BinaryOp::Div => a / b,
            _ => return Err(type_error(op, left, right)),
        }),
    })
}

fn spatial(op: BinaryOp, left: Value, right: Value) -> Result<Value> {
    Ok(match (op, &left, &right) {
        (BinaryOp::Add, Value::Vector(a), Value::Vector(b)) => Value::Vector(a.add(*b)),
        (BinaryOp::Sub, Value::Vector(a), Value::Vector(b)) => Value::Vector(a.sub(*b)),
        (BinaryOp::Mul, Value::Vector(a), Value::Vector(b)) => Value::Float(a.dot(*b)),
        (BinaryOp::Mod, Value::Vector(a), Value::Vector(b)) => Value::Vector(a.cross(*b)),
        (BinaryOp::Mul, Value::Vector(v), Value::Rotation(r)) => Value::Vector(v.rotate(*r)),
        (BinaryOp::Div, Value::Vector(v), Value::Rotation(r)) => Value::Vector(v.rotate(r.conjugate())),
        (BinaryOp::Add, Value::Rotation(a), Value::Rotation(b)) => Value::Rotation(a.add(*b)),
        (BinaryOp::Sub, Value::Rotation(a), Value::Rotation(b)) => Value::Rotation(a.sub(*b)),
        (BinaryOp::Mul, Value::Rotation(a), Value::Rotation(b)) => Value::Rotation(a.mul(*b)),
        (BinaryOp::Div, Value::Rotation(a), Value::Rotation(b)) => Value::Rotation(a.mul(b.conjugate())),
        (BinaryOp::Mul, Value::Vector(v), n) | (BinaryOp::Mul, n, Value::Vector(v)) if n.as_float().is_some() => {
            Value::Vector(v.scale(n.as_float().unwrap_or_default()))
        }
        (BinaryOp::Div, Value::Vector(v), n) => match n.as_float() {
            Some(d) if d == 0.0 => return Err(ScriptError::DivisionByZero),
            Some(d) => Value::Vector(v.scale(1.0 / d)),
            None => return Err(type_error(op, &left, &right)),
        },
        _ => return Err(type_error(op, &left, &right)),
    })
}

pub fn apply_binary(op: BinaryOp, left: Value, right: Value) -> Result<Value> {
    match op {
        BinaryOp::And => return Ok(Value::bool(left.is_truthy() && right.is_truthy())),
        BinaryOp::Or => return Ok(Value::bool(left.is_truthy() || right.is_truthy())),
        BinaryOp::Equal => return Ok(Value::bool(equals(&left, &right))),
        BinaryOp::NotEqual => return Ok(Value::bool(!equals(&left, &right))),
        BinaryOp::Less | BinaryOp::LessEqual | BinaryOp::Greater | BinaryOp::GreaterEqual => {
            return compare(op, &left, &right)
        }
        _ => {}
    }

    match (op, left, right) {
        (BinaryOp::Add, Value::List(mut a), Value::List(b)) => {
            a.extend(b);
            Ok(Value::List(a))
        }
        (BinaryOp::Add, Value::List(mut a), item) => {
            a.push(item);
            Ok(Value::List(a))
        }
        (BinaryOp::Add, item, Value::List(mut b)) => {
            b.insert(0, item);
            Ok(Value::List(b))
        }
        (BinaryOp::Add, Value::String(a) | Value::Key(a), Value::String(b) | Value::Key(b)) => {
            Ok(Value::String(a + &b))
        }
        (op, left @ (Value::Vector(_) | Value::Rotation(_)), right)
        | (op, left, right @ (Value::Vector(_) | Value::Rotation(_))) => spatial(op, left, right),
        (op, left, right) => arithmetic(op, &left, &right),
    }
}

/// Explicit `(type)` conversion
pub fn cast(value: Value, to: ScriptType) -> Result<Value> {
    if value.script_type() == to {
        return Ok(value);
    }
    let cast = match (to, value) {
        (ScriptType::String, value) => Value::String(value.to_string()),
        (ScriptType::List, value) => Value::List(vec![value]),
        (ScriptType::Key, Value::String(s)) => Value::Key(s),
        (ScriptType::Integer, Value::String(s)) => Value::Integer(parse_integer(&s).map_or(0, |i| i as i32)),
        (ScriptType::Long, Value::String(s)) => Value::Long(parse_integer(&s).unwrap_or(0)),
        (ScriptType::Float, Value::String(s)) => Value::Float(parse_float(&s).unwrap_or(0.0)),
        (ScriptType::Vector, Value::String(s)) => Value::Vector(parse_vector(&s).unwrap_or(Vector::ZERO)),
        (ScriptType::Rotation, Value::String(s)) => {
            Value::Rotation(parse_rotation(&s).unwrap_or(Rotation::IDENTITY))
        }
        (ScriptType::Integer, value) if value.as_integer().is_some() => Value::Integer(float_to_int(&value)),
        (ScriptType::Long, Value::Integer(i)) => Value::Long(i as i64),
        (ScriptType::Long, Value::Float(f)) => Value::Long(f as i64),
        (ScriptType::Float, value) if value.as_float().is_some() => Value::Float(value.as_float().unwrap_or_default()),
        (to, value) => {
            return Err(ScriptError::RuntimeError(format!(
                "cannot cast {} to {}",
                value.script_type(),
                to
            )))
        }
    };
    Ok(cast)
}

fn float_to_int(value: &Value) -> i32 {
    match value {
        // Out-of-range floats become the "integer indefinite" value
        Value::Float(f) if !(i32::MIN as f64..=i32::MAX as f64).contains(f) => i32::MIN,
        Value::Long(l) => *l as i32,
        other => other.as_integer().unwrap_or_default(),
    }
}

/// Component `axis` of a vector or rotation
pub fn component(value: &Value, axis: Axis) -> Result<Value> {
    let f = match (value, axis) {
        (Value::Vector(v), Axis::X) => v.x,
        (Value::Vector(v), Axis::Y) => v.y,
        (Value::Vector(v), Axis::Z) => v.z,
        (Value::Rotation(r), Axis::X) => r.x,
        (Value::Rotation(r), Axis::Y) => r.y,
        (Value::Rotation(r), Axis::Z) => r.z,
        (Value::Rotation(r), Axis::S) => r.s,
        _ => {
            return Err(ScriptError::RuntimeError(format!(
                "{} has no member '.{}'",
                value.script_type(),
                axis.name()
            )))
        }
    };
    Ok(Value::Float(f))
}

pub fn set_component(target: &mut Value, axis: Axis, f: f64) -> Result<()> {
    let slot = match (target, axis) {
        (Value::Vector(v), Axis::X) => &mut v.x,
        (Value::Vector(v), Axis::Y) => &mut v.y,
        (Value::Vector(v), Axis::Z) => &mut v.z,
        (Value::Rotation(r), Axis::X) => &mut r.x,
        (Value::Rotation(r), Axis::Y) => &mut r.y,
        (Value::Rotation(r), Axis::Z) => &mut r.z,
        (Value::Rotation(r), Axis::S) => &mut r.s,
        (other, axis) => {
            return Err(ScriptError::RuntimeError(format!(
                "{} has no member '.{}'",
                other.script_type(),
                axis.name()
            )))
        }
    };
    *slot = f;
    Ok(())
}

// ---- text parsers used by string casts ----

fn hex_integer(input: &str) -> IResult<&str, i64> {
    let (rest, digits) = preceded(tag_no_case("0x"), hex_digit1)(input)?;
    // Only the low 32 bits survive, like an unsigned 32-bit read
    let value = digits
        .chars()
        .fold(0u32, |acc, c| acc.wrapping_shl(4) | c.to_digit(16).unwrap_or(0));
    Ok((rest, value as i32 as i64))
}

fn decimal_integer(input: &str) -> IResult<&str, i64> {
    let (rest, text) = recognize(pair(opt(one_of("+-")), digit1))(input)?;
    let value = text.parse::<i64>().unwrap_or(if text.starts_with('-') { i64::MIN } else { i64::MAX });
    Ok((rest, value))
}

/// Leading integer of `text`, ignoring whatever follows it
pub fn parse_integer(text: &str) -> Option<i64> {
    let parsed: IResult<&str, i64> = preceded(multispace0, alt((hex_integer, decimal_integer)))(text);
    parsed.ok().map(|(_, value)| value)
}

/// Leading float of `text`, ignoring whatever follows it
pub fn parse_float(text: &str) -> Option<f64> {
    let parsed: IResult<&str, f64> = preceded(multispace0, double)(text);
    parsed.ok().map(|(_, value)| value)
}

fn components(input: &str) -> IResult<&str, Vec<f64>> {
    delimited(
        pair(multispace0, char('<')),
        separated_list1(tuple((multispace0, char(','))), preceded(multispace0, double)),
        pair(multispace0, char('>')),
    )(input)
}

/// `<x, y, z>` text
pub fn parse_vector(text: &str) -> Option<Vector> {
    match components(text).ok()?.1.as_slice() {
        [x, y, z] => Some(Vector::new(*x, *y, *z)),
        _ => None,
    }
}

/// `<x, y, z, s>` text
pub fn parse_rotation(text: &str) -> Option<Rotation> {
    match components(text).ok()?.1.as_slice() {
        [x, y, z, s] => Some(Rotation::new(*x, *y, *z, *s)),
        _ => None,
    }
}

//! Expression resolver
//!
//! Precedence climbing driven by [`OPERATOR_TABLE`]: each binary tier parses
//! the next tighter tier for its operands, and the unary tiers (prefix,
//! postfix, label, cast) sit below the binary ones in the same order the
//! table lists them. Names are bound while parsing, so the resulting
//! [`Expr`] is fully typed.

use crate::ast::{Axis, CallTarget, Expr, ExprKind};
use crate::body::matching_close;
use crate::error::{Diagnostic, Result};
use crate::lexer::{Token, TokenKind};
use crate::operators::{
    assignment_tier, Assoc, BinaryOp, Position, UnaryOp, FIRST_BINARY_TIER, OPERATOR_TABLE, TIER_LABEL,
    TIER_POSTFIX, TIER_PREFIX,
};
use crate::state::CompileState;
use gridscript_core::{ScriptType, Value};
use gridscript_registry::{ApiFunction, Registry, Visibility};

/// Resolves one token run into a typed expression
pub struct Resolver<'a> {
    registry: &'a Registry,
    vis: &'a Visibility,
    state: &'a CompileState,
    tokens: &'a [Token],
    pos: usize,
    /// Line reported when the run is empty or exhausted
    line: usize,
    /// Inside `< … >`, where `>` closes the literal
    in_angle: bool,
}

impl<'a> Resolver<'a> {
    pub fn new(
        registry: &'a Registry,
        vis: &'a Visibility,
        state: &'a CompileState,
        tokens: &'a [Token],
        line: usize,
    ) -> Self {
        Self {
            registry,
            vis,
            state,
            tokens,
            pos: 0,
            line,
            in_angle: false,
        }
    }

    /// Resolver for a bracketed sub-run
    fn nested(&self, tokens: &'a [Token]) -> Resolver<'a> {
        Resolver::new(self.registry, self.vis, self.state, tokens, self.line())
    }

    /// Resolve the whole run as one expression
    pub fn resolve(mut self) -> Result<Expr> {
        if self.tokens.is_empty() {
            return Err(Diagnostic::syntax(self.line, "expected an expression"));
        }
        let expr = self.expression()?;
        match self.peek() {
            Some(token) => Err(Diagnostic::syntax(
                token.line,
                format!("unexpected {} in expression", token),
            )),
            None => Ok(expr),
        }
    }

    /// Resolve a comma-separated run; an empty run is an empty list
    pub fn resolve_list(mut self) -> Result<Vec<Expr>> {
        let mut items = Vec::new();
        if self.tokens.is_empty() {
            return Ok(items);
        }
        loop {
            items.push(self.expression()?);
            match self.peek() {
                None => return Ok(items),
                Some(token) if token.kind == TokenKind::Comma => {
                    self.pos += 1;
                    if self.peek().is_none() {
                        return Err(Diagnostic::syntax(token.line, "expected an expression after ','"));
                    }
                }
                Some(token) => {
                    return Err(Diagnostic::syntax(
                        token.line,
                        format!("unexpected {} in expression list", token),
                    ))
                }
            }
        }
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn line(&self) -> usize {
        self.peek()
            .or_else(|| self.tokens.last())
            .map_or(self.line, |t| t.line)
    }

    fn expression(&mut self) -> Result<Expr> {
        self.binary_tier(assignment_tier())
    }

    /// Operator of tier `level` at the cursor, if any
    fn operator_at(&self, level: usize, position: Position) -> Option<(&'static str, usize)> {
        let token = self.peek()?;
        let TokenKind::Operator(symbol) = &token.kind else {
            return None;
        };
        if self.in_angle && *symbol == ">" && position == Position::Binary {
            return None;
        }
        OPERATOR_TABLE[level]
            .contains(symbol, position)
            .then_some((*symbol, token.line))
    }

    fn binary_tier(&mut self, level: usize) -> Result<Expr> {
        if level < FIRST_BINARY_TIER {
            return self.prefix();
        }
        let tier = &OPERATOR_TABLE[level];
        let mut left = self.binary_tier(level - 1)?;
        while let Some((symbol, line)) = self.operator_at(level, Position::Binary) {
            self.pos += 1;
            if tier.assoc == Assoc::Right {
                let right = self.binary_tier(level)?;
                return self.combine(symbol, left, right, line);
            }
            let right = self.binary_tier(level - 1)?;
            left = self.combine(symbol, left, right, line)?;
        }
        Ok(left)
    }

    fn combine(&self, symbol: &str, left: Expr, right: Expr, line: usize) -> Result<Expr> {
        if let Some(op) = BinaryOp::from_assignment(symbol) {
            return self.assign(left, op, right, symbol, line);
        }
        match BinaryOp::from_symbol(symbol) {
            Some(op) => self.binary(op, left, right, line),
            None => Err(Diagnostic::internal(line, format!("operator '{}' has no binary form", symbol))),
        }
    }

    fn prefix(&mut self) -> Result<Expr> {
        let Some((symbol, line)) = self.operator_at(TIER_PREFIX, Position::LeftUnary) else {
            return self.postfix();
        };
        self.pos += 1;
        let operand = self.prefix()?;
        match symbol {
            "++" | "--" => step(operand, symbol == "++", true, line),
            _ => match UnaryOp::from_symbol(symbol) {
                Some(op) => unary(op, operand, line),
                None => Err(Diagnostic::internal(line, format!("operator '{}' has no prefix form", symbol))),
            },
        }
    }

    fn postfix(&mut self) -> Result<Expr> {
        let mut expr = self.label()?;
        loop {
            if let Some((symbol, line)) = self.operator_at(TIER_POSTFIX, Position::RightUnary) {
                self.pos += 1;
                expr = step(expr, symbol == "++", false, line)?;
            } else if let Some((_, line)) = self.operator_at(TIER_POSTFIX, Position::Binary) {
                self.pos += 1;
                expr = self.member(expr, line)?;
            } else {
                return Ok(expr);
            }
        }
    }

    fn member(&mut self, base: Expr, line: usize) -> Result<Expr> {
        let Some(name) = self.peek().and_then(Token::identifier) else {
            return Err(Diagnostic::syntax(line, "expected a member name after '.'"));
        };
        self.pos += 1;
        let ty = value_type(&base)?;
        match Axis::from_name(name) {
            Some(axis) if axis.applies_to(ty) => Ok(Expr::new(
                ExprKind::Member {
                    base: Box::new(base),
                    axis,
                },
                Some(ScriptType::Float),
                line,
            )),
            _ => Err(Diagnostic::semantic(line, format!("{} has no member '.{}'", ty, name))),
        }
    }

    fn label(&mut self) -> Result<Expr> {
        let Some((_, line)) = self.operator_at(TIER_LABEL, Position::LeftUnary) else {
            return self.cast();
        };
        self.pos += 1;
        match self.peek().and_then(Token::identifier) {
            Some(name) => {
                self.pos += 1;
                Ok(Expr::new(ExprKind::Label(name.to_string()), None, line))
            }
            None => Err(Diagnostic::syntax(line, "expected a label name after '@'")),
        }
    }

    /// `(type)` at the cursor
    fn cast_prefix(&self) -> Option<(ScriptType, usize)> {
        match self.tokens.get(self.pos..self.pos + 3)? {
            [open, ty, close] if open.kind == TokenKind::LParen && close.kind == TokenKind::RParen => {
                ty.script_type().map(|ty| (ty, open.line))
            }
            _ => None,
        }
    }

    fn cast(&mut self) -> Result<Expr> {
        let Some((to, line)) = self.cast_prefix() else {
            return self.atom();
        };
        self.pos += 3;

        let operand = if self.cast_prefix().is_some() {
            self.cast()?
        } else if let Some(literal) = self.negative_literal() {
            literal
        } else {
            self.atom()?
        };
        let from = value_type(&operand)?;
        if !to.castable_from(from) {
            return Err(Diagnostic::semantic(line, format!("cannot cast {} to {}", from, to)));
        }
        Ok(Expr::new(
            ExprKind::Cast {
                to,
                operand: Box::new(operand),
            },
            Some(to),
            line,
        ))
    }

    /// `-` directly followed by a number, as in `(float)-1`
    fn negative_literal(&mut self) -> Option<Expr> {
        let [minus, number] = self.tokens.get(self.pos..self.pos + 2)? else {
            return None;
        };
        if !minus.is_op("-") {
            return None;
        }
        let value = match number.kind {
            TokenKind::Integer(i) => Value::Integer(i.wrapping_neg()),
            TokenKind::Float(f) => Value::Float(-f),
            _ => return None,
        };
        self.pos += 2;
        Some(Expr::literal(value, minus.line))
    }

    fn atom(&mut self) -> Result<Expr> {
        let Some(token) = self.peek() else {
            return Err(Diagnostic::syntax(self.line(), "expected an operand at the end of the expression"));
        };
        let line = token.line;
        match &token.kind {
            TokenKind::Integer(i) => {
                self.pos += 1;
                Ok(Expr::literal(Value::Integer(*i), line))
            }
            TokenKind::Float(f) => {
                self.pos += 1;
                Ok(Expr::literal(Value::Float(*f), line))
            }
            TokenKind::String(s) => {
                self.pos += 1;
                Ok(Expr::literal(Value::String(s.clone()), line))
            }
            TokenKind::Identifier(name) => {
                self.pos += 1;
                if self.peek().is_some_and(|t| t.kind == TokenKind::LParen) {
                    self.call(name, line)
                } else {
                    self.name(name, line)
                }
            }
            TokenKind::LParen => {
                let inner = self.bracketed()?;
                if inner.is_empty() {
                    return Err(Diagnostic::syntax(line, "expected an expression inside '( )'"));
                }
                self.nested(inner).resolve()
            }
            TokenKind::LBracket => self.list(line),
            TokenKind::Operator("<") => self.vector(line),
            _ => Err(Diagnostic::syntax(line, format!("expected an operand, found {}", token))),
        }
    }

    /// Tokens between the bracket at the cursor and its partner
    fn bracketed(&mut self) -> Result<&'a [Token]> {
        let tokens = self.tokens;
        let close = matching_close(tokens, self.pos)?;
        let inner = &tokens[self.pos + 1..close];
        self.pos = close + 1;
        Ok(inner)
    }

    fn name(&self, name: &str, line: usize) -> Result<Expr> {
        if let Some((var, ty)) = self.state.lookup_variable(name) {
            return Ok(Expr::new(ExprKind::Load(var), Some(ty), line));
        }
        if let Some(constant) = self.registry.constant(name, self.vis) {
            return Ok(Expr::literal(constant.value.clone().coerce(constant.ty), line));
        }
        if self.state.function_index(name).is_some() || self.registry.has_function(name, self.vis) {
            return Err(Diagnostic::semantic(line, format!("function '{}' used without a call", name)));
        }
        Err(undeclared(name, line))
    }

    fn call(&mut self, name: &str, line: usize) -> Result<Expr> {
        let inner = self.bracketed()?;
        let args = self.nested(inner).resolve_list()?;
        let types = args.iter().map(value_type).collect::<Result<Vec<_>>>()?;

        if let Some(index) = self.state.function_index(name) {
            let decl = &self.state.functions[index];
            if decl.params.len() != args.len() {
                return Err(Diagnostic::semantic(
                    line,
                    format!("'{}' expects {} argument(s), found {}", name, decl.params.len(), args.len()),
                ));
            }
            let mut converted = Vec::with_capacity(args.len());
            for (i, (arg, param)) in args.into_iter().zip(&decl.params).enumerate() {
                if !param.ty.accepts(types[i]) {
                    return Err(Diagnostic::semantic(
                        line,
                        format!("argument {} of '{}' must be {}, found {}", i + 1, name, param.ty, types[i]),
                    ));
                }
                converted.push(arg.converted(param.ty));
            }
            return Ok(Expr::new(
                ExprKind::Call {
                    target: CallTarget::Script(index),
                    args: converted,
                },
                decl.returns,
                line,
            ));
        }

        let function = self.select_overload(name, &types, line)?;
        let args = args
            .into_iter()
            .zip(&function.params)
            .map(|(arg, ty)| arg.converted(*ty))
            .collect();
        Ok(Expr::new(
            ExprKind::Call {
                target: CallTarget::Api(function.id),
                args,
            },
            function.returns,
            line,
        ))
    }

    /// Exact match first, then the single overload reachable by conversions
    fn select_overload(&self, name: &str, types: &[ScriptType], line: usize) -> Result<&'a ApiFunction> {
        let candidates: Vec<&'a ApiFunction> = self.registry.overloads(name, self.vis).collect();
        if candidates.is_empty() {
            return Err(undeclared(name, line));
        }
        if let Some(exact) = candidates.iter().find(|f| f.params == types) {
            return Ok(*exact);
        }

        let viable: Vec<&'a ApiFunction> = candidates
            .iter()
            .copied()
            .filter(|f| f.params.len() == types.len() && f.params.iter().zip(types).all(|(p, a)| p.accepts(*a)))
            .collect();
        let signatures = |list: &[&ApiFunction]| list.iter().map(|f| f.signature()).collect::<Vec<_>>().join(", ");
        let found = types.iter().map(|t| t.keyword()).collect::<Vec<_>>().join(", ");

        match viable.as_slice() {
            [only] => Ok(*only),
            [] => Err(Diagnostic::semantic(
                line,
                format!(
                    "no overload of '{}' accepts ({}); candidates: {}",
                    name,
                    found,
                    signatures(candidates.as_slice())
                ),
            )),
            _ => Err(Diagnostic::semantic(
                line,
                format!("ambiguous call to '{}' with ({}); candidates: {}", name, found, signatures(viable.as_slice())),
            )),
        }
    }

    fn list(&mut self, line: usize) -> Result<Expr> {
        let inner = self.bracketed()?;
        let items = self.nested(inner).resolve_list()?;
        for item in &items {
            if value_type(item)? == ScriptType::List {
                return Err(Diagnostic::semantic(item.line, "lists cannot contain lists"));
            }
        }
        Ok(Expr::new(ExprKind::List(items), Some(ScriptType::List), line))
    }

    /// `<x, y, z>` or `<x, y, z, s>`
    fn vector(&mut self, line: usize) -> Result<Expr> {
        self.pos += 1;
        let outer = std::mem::replace(&mut self.in_angle, true);
        let mut parts = Vec::with_capacity(4);
        loop {
            let part = self.expression()?;
            let ty = value_type(&part)?;
            if !ScriptType::Float.accepts(ty) {
                return Err(Diagnostic::semantic(
                    part.line,
                    format!("vector and rotation components must be numeric, found {}", ty),
                ));
            }
            parts.push(part.converted(ScriptType::Float));

            match self.peek() {
                Some(t) if t.kind == TokenKind::Comma => self.pos += 1,
                Some(t) if t.is_op(">") => {
                    self.pos += 1;
                    break;
                }
                Some(t) => {
                    return Err(Diagnostic::syntax(t.line, format!("unexpected {} in vector literal", t)));
                }
                None => return Err(Diagnostic::syntax(line, "missing '>' to close vector literal")),
            }
        }
        self.in_angle = outer;

        match parts.len() {
            3 => Ok(Expr::new(ExprKind::Vector(parts), Some(ScriptType::Vector), line)),
            4 => Ok(Expr::new(ExprKind::Rotation(parts), Some(ScriptType::Rotation), line)),
            n => Err(Diagnostic::syntax(
                line,
                format!("'< >' literal needs 3 (vector) or 4 (rotation) components, found {}", n),
            )),
        }
    }

    fn binary(&self, op: BinaryOp, left: Expr, right: Expr, line: usize) -> Result<Expr> {
        let ty = binary_type(op, value_type(&left)?, value_type(&right)?, line)?;
        Ok(Expr::new(
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            Some(ty),
            line,
        ))
    }

    fn assign(&self, target: Expr, op: Option<BinaryOp>, value: Expr, symbol: &str, line: usize) -> Result<Expr> {
        let Some(place) = target.place() else {
            return Err(Diagnostic::semantic(
                line,
                format!("left side of '{}' is not assignable", symbol),
            ));
        };
        let target_ty = value_type(&target)?;
        let found = value_type(&value)?;

        let (stored, value) = match op {
            None => (found, value.converted(target_ty)),
            Some(op) => (binary_type(op, target_ty, found, line)?, value),
        };
        if !target_ty.accepts(stored) {
            return Err(Diagnostic::semantic(
                line,
                format!("cannot assign a {} value to a {} variable", stored, target_ty),
            ));
        }
        Ok(Expr::new(
            ExprKind::Assign {
                place,
                op,
                value: Box::new(value),
            },
            Some(target_ty),
            line,
        ))
    }
}

fn undeclared(name: &str, line: usize) -> Diagnostic {
    Diagnostic::semantic(line, format!("undeclared identifier '{}'", name))
}

fn value_type(expr: &Expr) -> Result<ScriptType> {
    expr.ty.ok_or_else(|| match &expr.kind {
        ExprKind::Label(name) => Diagnostic::semantic(expr.line, format!("label '@{}' cannot be used as a value", name)),
        _ => Diagnostic::semantic(expr.line, "expression has no value"),
    })
}

fn unary(op: UnaryOp, operand: Expr, line: usize) -> Result<Expr> {
    let ty = value_type(&operand)?;
    if op == UnaryOp::Negate {
        let folded = match operand.as_literal() {
            Some(Value::Integer(i)) => Some(Value::Integer(i.wrapping_neg())),
            Some(Value::Float(f)) => Some(Value::Float(-f)),
            Some(Value::Long(l)) => Some(Value::Long(l.wrapping_neg())),
            _ => None,
        };
        if let Some(value) = folded {
            return Ok(Expr::literal(value, line));
        }
    }

    let result = match op {
        UnaryOp::Negate if ty.is_numeric() || matches!(ty, ScriptType::Vector | ScriptType::Rotation) => ty,
        UnaryOp::Not if ty.is_integral() => ScriptType::Integer,
        UnaryOp::BitNot if ty.is_integral() => ty,
        _ => {
            return Err(Diagnostic::semantic(
                line,
                format!("operator '{}' cannot be applied to {}", op, ty),
            ))
        }
    };
    Ok(Expr::new(
        ExprKind::Unary {
            op,
            operand: Box::new(operand),
        },
        Some(result),
        line,
    ))
}

fn step(operand: Expr, increment: bool, prefix: bool, line: usize) -> Result<Expr> {
    let symbol = if increment { "++" } else { "--" };
    let Some(place) = operand.place() else {
        return Err(Diagnostic::semantic(line, format!("'{}' needs a variable", symbol)));
    };
    let ty = value_type(&operand)?;
    if !ty.is_numeric() {
        return Err(Diagnostic::semantic(
            line,
            format!("operator '{}' cannot be applied to {}", symbol, ty),
        ));
    }
    Ok(Expr::new(
        ExprKind::Step {
            place,
            increment,
            prefix,
        },
        Some(ty),
        line,
    ))
}

fn numeric_result(left: ScriptType, right: ScriptType) -> ScriptType {
    if left == ScriptType::Float || right == ScriptType::Float {
        ScriptType::Float
    } else if left == ScriptType::Long || right == ScriptType::Long {
        ScriptType::Long
    } else {
        ScriptType::Integer
    }
}

/// Result type of `left op right`
pub(crate) fn binary_type(op: BinaryOp, left: ScriptType, right: ScriptType, line: usize) -> Result<ScriptType> {
    use ScriptType::*;

    let numeric = left.is_numeric() && right.is_numeric();
    let integral = left.is_integral() && right.is_integral();
    let result = match op {
        BinaryOp::And | BinaryOp::Or if integral => Some(Integer),
        BinaryOp::Equal | BinaryOp::NotEqual if left.accepts(right) || right.accepts(left) => Some(Integer),
        BinaryOp::Less | BinaryOp::LessEqual | BinaryOp::Greater | BinaryOp::GreaterEqual if numeric => {
            Some(Integer)
        }
        BinaryOp::LeftShift | BinaryOp::RightShift | BinaryOp::BitAnd | BinaryOp::BitXor | BinaryOp::BitOr
            if integral =>
        {
            Some(numeric_result(left, right))
        }
        BinaryOp::Mod => match (left, right) {
            _ if integral => Some(numeric_result(left, right)),
            (Vector, Vector) => Some(Vector),
            _ => None,
        },
        BinaryOp::Add => match (left, right) {
            (List, _) | (_, List) => Some(List),
            (String | Key, String | Key) => Some(String),
            (Vector, Vector) => Some(Vector),
            (Rotation, Rotation) => Some(Rotation),
            _ if numeric => Some(numeric_result(left, right)),
            _ => None,
        },
        BinaryOp::Sub => match (left, right) {
            (Vector, Vector) => Some(Vector),
            (Rotation, Rotation) => Some(Rotation),
            _ if numeric => Some(numeric_result(left, right)),
            _ => None,
        },
        BinaryOp::Mul => match (left, right) {
            (Vector, Vector) => Some(Float),
            (Vector, Integer | Float) | (Integer | Float, Vector) => Some(Vector),
            (Vector, Rotation) => Some(Vector),
            (Rotation, Rotation) => Some(Rotation),
            _ if numeric => Some(numeric_result(left, right)),
            _ => None,
        },
        BinaryOp::Div => match (left, right) {
            (Vector, Integer | Float) | (Vector, Rotation) => Some(Vector),
            (Rotation, Rotation) => Some(Rotation),
            _ if numeric => Some(numeric_result(left, right)),
            _ => None,
        },
        _ => None,
    };
    result.ok_or_else(|| {
        Diagnostic::semantic(
            line,
            format!("operator '{}' cannot be applied to {} and {}", op, left, right),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DiagnosticKind;
    use crate::lexer::Lexer;
    use gridscript_core::Dialect;
    use gridscript_registry::{FunctionDescriptor, ScriptContext};

    fn resolve_in(registry: &Registry, vis: &Visibility, locals: &[(&str, ScriptType)], source: &str) -> Result<Expr> {
        let mut state = CompileState::new();
        state.begin_body();
        state.push_scope();
        for (name, ty) in locals {
            state.declare_local(name, *ty, 1).unwrap();
        }
        let tokens = Lexer::new(source).tokenize()?;
        Resolver::new(registry, vis, &state, &tokens, 1).resolve()
    }

    fn resolve(locals: &[(&str, ScriptType)], source: &str) -> Result<Expr> {
        resolve_in(&Registry::standard(), &Visibility::default(), locals, source)
    }

    fn shape(source: &str) -> String {
        resolve(&[], source).unwrap().to_string()
    }

    #[test]
    fn test_precedence() {
        assert_eq!(shape("2 + 3 * 4"), "(2 + (3 * 4))");
        assert_eq!(shape("-2 + 3"), "(-2 + 3)");
        assert_eq!(shape("(integer)\"3\" + 1"), "((integer)\"3\" + 1)");
        assert_eq!(shape("1 << 2 + 1"), "(1 << (2 + 1))");
        assert_eq!(shape("1 < 2 == 1"), "((1 < 2) == 1)");
        assert_eq!(shape("1 | 2 ^ 3 & 4"), "(1 | (2 ^ (3 & 4)))");
        assert_eq!(shape("(2 + 3) * 4"), "((2 + 3) * 4)");
    }

    #[test]
    fn test_binary_tiers_are_left_associative() {
        assert_eq!(shape("10 - 4 - 3"), "((10 - 4) - 3)");
        assert_eq!(shape("1 && 0 || 1"), "((1 && 0) || 1)");
    }

    #[test]
    fn test_assignment_is_right_associative() {
        let locals = [("a", ScriptType::Integer), ("b", ScriptType::Integer)];
        let expr = resolve(&locals, "a = b = 5").unwrap();
        assert_eq!(expr.to_string(), "(local0 = (local1 = 5))");
        assert_eq!(expr.ty, Some(ScriptType::Integer));
    }

    #[test]
    fn test_mixed_arithmetic_types() {
        assert_eq!(resolve(&[], "1 + 2.5").unwrap().ty, Some(ScriptType::Float));
        assert_eq!(resolve(&[], "\"a\" + \"b\"").unwrap().ty, Some(ScriptType::String));
        assert_eq!(resolve(&[], "[1] + 2").unwrap().ty, Some(ScriptType::List));
        assert_eq!(resolve(&[], "<1, 2, 3> * 2").unwrap().ty, Some(ScriptType::Vector));
        assert_eq!(resolve(&[], "<1, 2, 3> * <1, 0, 0>").unwrap().ty, Some(ScriptType::Float));
        assert_eq!(resolve(&[], "<0, 0, 0, 1>").unwrap().ty, Some(ScriptType::Rotation));

        let err = resolve(&[], "\"a\" - 1").unwrap_err();
        assert_eq!(err.kind, DiagnosticKind::Semantic);
        assert!(resolve(&[], "7 % 2.0").is_err());
    }

    #[test]
    fn test_vector_literal_inside_comparison() {
        let locals = [("v", ScriptType::Vector)];
        let expr = resolve(&locals, "v == <1, 2, 3>").unwrap();
        assert_eq!(expr.ty, Some(ScriptType::Integer));
        assert!(resolve(&[], "<1, 2>").is_err());
    }

    #[test]
    fn test_member_access() {
        let locals = [("v", ScriptType::Vector), ("r", ScriptType::Rotation), ("f", ScriptType::Float)];
        assert_eq!(resolve(&locals, "v.x").unwrap().ty, Some(ScriptType::Float));
        assert!(resolve(&locals, "r.s = 1").is_ok());
        assert!(resolve(&locals, "v.s").unwrap_err().message.contains("no member"));
        assert!(resolve(&locals, "f.x").is_err());
    }

    #[test]
    fn test_assignment_checks() {
        let locals = [("i", ScriptType::Integer), ("f", ScriptType::Float), ("k", ScriptType::Key)];
        assert!(resolve(&locals, "f = i").is_ok());
        assert!(resolve(&locals, "k = \"abc\"").is_ok());
        assert!(resolve(&locals, "f += 1").is_ok());
        assert!(resolve(&locals, "i = 1.5").unwrap_err().message.contains("cannot assign"));
        assert!(resolve(&locals, "i += 1.5").is_err());
        assert!(resolve(&locals, "1 = 2").unwrap_err().message.contains("not assignable"));
        assert!(resolve(&locals, "i++").is_ok());
        assert!(resolve(&locals, "k++").is_err());
    }

    #[test]
    fn test_constants_are_inlined() {
        let expr = resolve(&[], "PI").unwrap();
        assert!(matches!(expr.as_literal(), Some(Value::Float(_))));
        assert_eq!(shape("TRUE + 1"), "(1 + 1)");
    }

    #[test]
    fn test_names() {
        assert!(resolve(&[], "llAbs(-5)").is_ok());
        assert!(resolve(&[], "llAbs").unwrap_err().message.contains("without a call"));
        assert_eq!(resolve(&[], "nope").unwrap_err().message, "undeclared identifier 'nope'");
        assert!(resolve(&[], "llAbs(1, 2)").unwrap_err().message.contains("no overload"));
    }

    #[test]
    fn test_dialect_gating() {
        let registry = Registry::standard();
        let lsl = Visibility::default();
        let ossl = Visibility::default().with_dialect(Dialect::Ossl);

        let err = resolve_in(&registry, &lsl, &[], "osMax(1, 2)").unwrap_err();
        assert_eq!(err.kind, DiagnosticKind::Semantic);
        assert!(err.message.contains("undeclared identifier 'osMax'"));
        assert!(resolve_in(&registry, &ossl, &[], "osMax(1, 2)").is_ok());

        assert!(resolve_in(&registry, &lsl, &[], "OS_LISTEN_REGEX_NAME").is_err());
        assert!(resolve_in(&registry, &ossl, &[], "OS_LISTEN_REGEX_NAME").is_ok());
    }

    #[test]
    fn test_overload_selection() {
        let registry = Registry::standard();
        let vis = Visibility::default().with_dialect(Dialect::Ossl);
        let member = |source: &str| {
            let expr = resolve_in(&registry, &vis, &[], source).unwrap();
            match expr.kind {
                ExprKind::Call {
                    target: CallTarget::Api(id),
                    ..
                } => registry.function(id).member,
                other => panic!("expected an api call, got {:?}", other),
            }
        };
        assert_eq!(member("osMax(1, 2)"), "osMaxInteger");
        assert_eq!(member("osMax(1.5, 2.5)"), "osMaxFloat");
        assert_eq!(member("osMax(1, 2.5)"), "osMaxFloat");

        let err = resolve_in(&registry, &vis, &[], "osMax(\"a\", 1)").unwrap_err();
        assert_eq!(err.kind, DiagnosticKind::Semantic);
        assert!(err.message.starts_with("no overload of 'osMax' accepts (string, integer)"));
    }

    #[test]
    fn test_ambiguous_overload() {
        fn noop(_ctx: &mut ScriptContext, _args: &[Value]) -> gridscript_registry::Result<Option<Value>> {
            Ok(None)
        }
        let mut builder = Registry::builder();
        builder.register_function(
            FunctionDescriptor::method("pickFloatFirst", noop)
                .named("pick")
                .param(ScriptType::Float)
                .param(ScriptType::Integer),
        );
        builder.register_function(
            FunctionDescriptor::method("pickFloatSecond", noop)
                .named("pick")
                .param(ScriptType::Integer)
                .param(ScriptType::Float),
        );
        let registry = builder.build();
        let vis = Visibility::default();

        let err = resolve_in(&registry, &vis, &[], "pick(1, 1)").unwrap_err();
        assert!(err.message.starts_with("ambiguous call to 'pick'"));
        assert!(resolve_in(&registry, &vis, &[], "pick(1.0, 1)").is_ok());
    }

    #[test]
    fn test_lists() {
        assert!(resolve(&[], "[]").is_ok());
        assert!(resolve(&[], "[1, \"a\", <0, 0, 0>]").is_ok());
        assert!(resolve(&[], "[[1]]").unwrap_err().message.contains("lists cannot contain lists"));
    }

    #[test]
    fn test_syntax_errors() {
        assert_eq!(resolve(&[], "(1 + 2").unwrap_err().kind, DiagnosticKind::Syntax);
        assert_eq!(resolve(&[], "1 2").unwrap_err().kind, DiagnosticKind::Syntax);
        assert_eq!(resolve(&[], "1 +").unwrap_err().kind, DiagnosticKind::Syntax);
        assert_eq!(resolve(&[], "()").unwrap_err().kind, DiagnosticKind::Syntax);
    }

    #[test]
    fn test_casts() {
        assert_eq!(shape("(float)-1"), "(float)-1");
        assert_eq!(resolve(&[], "(string)(integer)2.7").unwrap().ty, Some(ScriptType::String));
        assert!(resolve(&[], "(vector)1").unwrap_err().message.contains("cannot cast"));
    }

    #[test]
    fn test_resolve_list() {
        let registry = Registry::standard();
        let vis = Visibility::default();
        let state = CompileState::new();
        let tokens = Lexer::new("1, 2 + 3, \"x\"").tokenize().unwrap();
        let items = Resolver::new(&registry, &vis, &state, &tokens, 1).resolve_list().unwrap();
        assert_eq!(items.len(), 3);

        let tokens = Lexer::new("1,").tokenize().unwrap();
        assert!(Resolver::new(&registry, &vis, &state, &tokens, 1).resolve_list().is_err());
    }
}

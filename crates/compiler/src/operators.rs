//! Operator precedence table
//!
//! Tiers are listed from tightest to loosest binding. The order is part of
//! the language definition; the resolver walks it rather than hard-coding
//! precedence.

use std::fmt;

/// Where an operator sits relative to its operand(s)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// Prefix (`-x`, `!x`, `(float)x`)
    LeftUnary,
    /// Postfix (`x++`)
    RightUnary,
    Binary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assoc {
    Left,
    Right,
}

/// One precedence tier
#[derive(Debug)]
pub struct Tier {
    pub name: &'static str,
    pub assoc: Assoc,
    pub operators: &'static [(&'static str, Position)],
}

impl Tier {
    pub fn contains(&self, symbol: &str, position: Position) -> bool {
        self.operators.iter().any(|(s, p)| *s == symbol && *p == position)
    }
}

/// Pseudo-symbol standing for any `(type)` cast
pub const CAST: &str = "(type)";

pub const TIER_CAST: usize = 0;
pub const TIER_LABEL: usize = 1;
pub const TIER_POSTFIX: usize = 2;
pub const TIER_PREFIX: usize = 3;
/// First tier made of binary operators
pub const FIRST_BINARY_TIER: usize = 4;

pub static OPERATOR_TABLE: &[Tier] = &[
    Tier {
        name: "cast",
        assoc: Assoc::Right,
        operators: &[(CAST, Position::LeftUnary)],
    },
    Tier {
        name: "label",
        assoc: Assoc::Right,
        operators: &[("@", Position::LeftUnary)],
    },
    Tier {
        name: "postfix",
        assoc: Assoc::Left,
        operators: &[("++", Position::RightUnary), ("--", Position::RightUnary), (".", Position::Binary)],
    },
    Tier {
        name: "prefix",
        assoc: Assoc::Right,
        operators: &[
            ("-", Position::LeftUnary),
            ("!", Position::LeftUnary),
            ("~", Position::LeftUnary),
            ("++", Position::LeftUnary),
            ("--", Position::LeftUnary),
        ],
    },
    Tier {
        name: "multiplicative",
        assoc: Assoc::Left,
        operators: &[("*", Position::Binary), ("/", Position::Binary), ("%", Position::Binary)],
    },
    Tier {
        name: "additive",
        assoc: Assoc::Left,
        operators: &[("+", Position::Binary), ("-", Position::Binary)],
    },
    Tier {
        name: "shift",
        assoc: Assoc::Left,
        operators: &[("<<", Position::Binary), (">>", Position::Binary)],
    },
    Tier {
        name: "relational",
        assoc: Assoc::Left,
        operators: &[
            ("<", Position::Binary),
            ("<=", Position::Binary),
            (">", Position::Binary),
            (">=", Position::Binary),
        ],
    },
    Tier {
        name: "equality",
        assoc: Assoc::Left,
        operators: &[("==", Position::Binary), ("!=", Position::Binary)],
    },
    Tier {
        name: "bitwise and",
        assoc: Assoc::Left,
        operators: &[("&", Position::Binary)],
    },
    Tier {
        name: "bitwise xor",
        assoc: Assoc::Left,
        operators: &[("^", Position::Binary)],
    },
    Tier {
        name: "bitwise or",
        assoc: Assoc::Left,
        operators: &[("|", Position::Binary)],
    },
    Tier {
        name: "logical",
        assoc: Assoc::Left,
        operators: &[("&&", Position::Binary), ("||", Position::Binary)],
    },
    Tier {
        name: "assignment",
        assoc: Assoc::Right,
        operators: &[
            ("=", Position::Binary),
            ("+=", Position::Binary),
            ("-=", Position::Binary),
            ("*=", Position::Binary),
            ("/=", Position::Binary),
            ("%=", Position::Binary),
        ],
    },
];

/// Index of the loosest (assignment) tier
pub fn assignment_tier() -> usize {
    OPERATOR_TABLE.len() - 1
}

/// Tier holding `symbol` at `position`, if any
pub fn tier_of(symbol: &str, position: Position) -> Option<usize> {
    OPERATOR_TABLE.iter().position(|tier| tier.contains(symbol, position))
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Mul,
    Div,
    Mod,
    Add,
    Sub,
    LeftShift,
    RightShift,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    NotEqual,
    BitAnd,
    BitXor,
    BitOr,
    And,
    Or,
}

impl BinaryOp {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "%" => BinaryOp::Mod,
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "<<" => BinaryOp::LeftShift,
            ">>" => BinaryOp::RightShift,
            "<" => BinaryOp::Less,
            "<=" => BinaryOp::LessEqual,
            ">" => BinaryOp::Greater,
            ">=" => BinaryOp::GreaterEqual,
            "==" => BinaryOp::Equal,
            "!=" => BinaryOp::NotEqual,
            "&" => BinaryOp::BitAnd,
            "^" => BinaryOp::BitXor,
            "|" => BinaryOp::BitOr,
            "&&" => BinaryOp::And,
            "||" => BinaryOp::Or,
            _ => return None,
        })
    }

    /// Arithmetic operator a compound assignment applies (`None` for plain `=`)
    pub fn from_assignment(symbol: &str) -> Option<Option<Self>> {
        Some(match symbol {
            "=" => None,
            "+=" => Some(BinaryOp::Add),
            "-=" => Some(BinaryOp::Sub),
            "*=" => Some(BinaryOp::Mul),
            "/=" => Some(BinaryOp::Div),
            "%=" => Some(BinaryOp::Mod),
            _ => return None,
        })
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::LeftShift => "<<",
            BinaryOp::RightShift => ">>",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitXor => "^",
            BinaryOp::BitOr => "|",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Prefix operators producing a value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Not,
    BitNot,
}

impl UnaryOp {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "-" => UnaryOp::Negate,
            "!" => UnaryOp::Not,
            "~" => UnaryOp::BitNot,
            _ => return None,
        })
    }

    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Negate => "-",
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "~",
        }
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

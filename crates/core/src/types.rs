//! Core type definitions

use crate::spatial::{Rotation, Vector};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The all-zero key
pub const NULL_KEY: &str = "00000000-0000-0000-0000-000000000000";

/// Script-representable semantic type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptType {
    /// 32-bit integer (also used for booleans)
    Integer,
    /// Double precision float
    Float,
    /// UTF-8 string
    String,
    /// UUID-like key
    Key,
    /// 3-vector
    Vector,
    /// Quaternion
    Rotation,
    /// Heterogeneous ordered list
    List,
    /// 64-bit integer
    Long,
}

impl ScriptType {
    pub const ALL: [ScriptType; 8] = [
        ScriptType::Integer,
        ScriptType::Float,
        ScriptType::String,
        ScriptType::Key,
        ScriptType::Vector,
        ScriptType::Rotation,
        ScriptType::List,
        ScriptType::Long,
    ];

    pub fn keyword(self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Float => "float",
            Self::String => "string",
            Self::Key => "key",
            Self::Vector => "vector",
            Self::Rotation => "rotation",
            Self::List => "list",
            Self::Long => "long",
        }
    }

    /// Parse a type keyword (`quaternion` is an alias of `rotation`)
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "integer" => Some(Self::Integer),
            "float" => Some(Self::Float),
            "string" => Some(Self::String),
            "key" => Some(Self::Key),
            "vector" => Some(Self::Vector),
            "rotation" | "quaternion" => Some(Self::Rotation),
            "list" => Some(Self::List),
            "long" => Some(Self::Long),
            _ => None,
        }
    }

    /// Value a freshly declared variable of this type holds
    pub fn default_value(self) -> Value {
        match self {
            Self::Integer => Value::Integer(0),
            Self::Float => Value::Float(0.0),
            Self::String => Value::String(String::new()),
            Self::Key => Value::Key(String::new()),
            Self::Vector => Value::Vector(Vector::ZERO),
            Self::Rotation => Value::Rotation(Rotation::IDENTITY),
            Self::List => Value::List(Vec::new()),
            Self::Long => Value::Long(0),
        }
    }

    pub fn is_integral(self) -> bool {
        matches!(self, Self::Integer | Self::Long)
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Long | Self::Float)
    }

    /// Whether a value of type `from` may be stored where `self` is expected
    /// without an explicit cast.
    pub fn accepts(self, from: ScriptType) -> bool {
        self == from
            || matches!(
                (self, from),
                (Self::Float, Self::Integer)
                    | (Self::Float, Self::Long)
                    | (Self::Long, Self::Integer)
                    | (Self::String, Self::Key)
                    | (Self::Key, Self::String)
            )
    }

    /// Whether an explicit `(self)` cast from `from` is permitted
    pub fn castable_from(self, from: ScriptType) -> bool {
        if self == from || self == Self::String || self == Self::List {
            return true;
        }
        match self {
            Self::Integer | Self::Float | Self::Long => from.is_numeric() || from == Self::String,
            Self::Key => from == Self::String,
            Self::Vector | Self::Rotation => from == Self::String,
            Self::String | Self::List => true,
        }
    }
}

impl fmt::Display for ScriptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Runtime value of a script type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    Integer(i32),
    Float(f64),
    String(String),
    Key(String),
    Vector(Vector),
    Rotation(Rotation),
    List(Vec<Value>),
    Long(i64),
}

impl Value {
    pub fn script_type(&self) -> ScriptType {
        match self {
            Value::Integer(_) => ScriptType::Integer,
            Value::Float(_) => ScriptType::Float,
            Value::String(_) => ScriptType::String,
            Value::Key(_) => ScriptType::Key,
            Value::Vector(_) => ScriptType::Vector,
            Value::Rotation(_) => ScriptType::Rotation,
            Value::List(_) => ScriptType::List,
            Value::Long(_) => ScriptType::Long,
        }
    }

    /// Check if value is truthy
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Integer(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Key(k) => !k.is_empty() && k != NULL_KEY,
            Value::Vector(v) => *v != Vector::ZERO,
            Value::Rotation(r) => *r != Rotation::IDENTITY,
            Value::List(l) => !l.is_empty(),
            Value::Long(l) => *l != 0,
        }
    }

    pub fn bool(b: bool) -> Value {
        Value::Integer(b as i32)
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Long(l) => Some(*l as f64),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i32> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Float(f) => Some(*f as i32),
            Value::Long(l) => Some(*l as i32),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Key(s) => Some(s),
            _ => None,
        }
    }

    /// Convert a value into the representation required by `target`,
    /// applying the implicit conversions allowed by [`ScriptType::accepts`].
    pub fn coerce(self, target: ScriptType) -> Value {
        match (target, self) {
            (ScriptType::Float, Value::Integer(i)) => Value::Float(i as f64),
            (ScriptType::Float, Value::Long(l)) => Value::Float(l as f64),
            (ScriptType::Long, Value::Integer(i)) => Value::Long(i as i64),
            (ScriptType::String, Value::Key(k)) => Value::String(k),
            (ScriptType::Key, Value::String(s)) => Value::Key(s),
            (_, v) => v,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{:.6}", x),
            Value::String(s) | Value::Key(s) => f.write_str(s),
            Value::Vector(v) => write!(f, "{}", v),
            Value::Rotation(r) => write!(f, "{}", r),
            Value::List(items) => {
                for item in items {
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
            Value::Long(l) => write!(f, "{}", l),
        }
    }
}

/// Language dialect a script or capability may target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Base language
    Lsl,
    /// Simulator extension functions
    Ossl,
    /// Extended engine dialect
    Xmr,
}

impl Dialect {
    pub const ALL: [Dialect; 3] = [Dialect::Lsl, Dialect::Ossl, Dialect::Xmr];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lsl => "lsl",
            Self::Ossl => "ossl",
            Self::Xmr => "xmr",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "lsl" => Some(Self::Lsl),
            "ossl" => Some(Self::Ossl),
            "xmr" => Some(Self::Xmr),
            _ => None,
        }
    }

    const fn bit(self) -> u8 {
        1 << self as u8
    }
}

/// Set of dialects (applicability flags)
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Dialects(u8);

impl Dialects {
    pub const NONE: Dialects = Dialects(0);
    pub const ALL: Dialects = Dialects(0b111);
    pub const LSL: Dialects = Dialects::only(Dialect::Lsl);

    pub const fn only(dialect: Dialect) -> Self {
        Self(dialect.bit())
    }

    pub const fn with(self, dialect: Dialect) -> Self {
        Self(self.0 | dialect.bit())
    }

    pub fn contains(self, dialect: Dialect) -> bool {
        self.0 & dialect.bit() != 0
    }

    pub fn intersects(self, other: Dialects) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = Dialect> {
        Dialect::ALL.into_iter().filter(move |d| self.contains(*d))
    }
}

impl From<Dialect> for Dialects {
    fn from(dialect: Dialect) -> Self {
        Self::only(dialect)
    }
}

impl FromIterator<Dialect> for Dialects {
    fn from_iter<I: IntoIterator<Item = Dialect>>(iter: I) -> Self {
        iter.into_iter().fold(Dialects::NONE, Dialects::with)
    }
}

impl std::ops::BitOr for Dialects {
    type Output = Dialects;

    fn bitor(self, rhs: Dialects) -> Dialects {
        Dialects(self.0 | rhs.0)
    }
}

impl fmt::Display for Dialects {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(|d| d.as_str()).collect();
        f.write_str(&names.join("|"))
    }
}

impl fmt::Debug for Dialects {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Dialects({})", self)
    }
}

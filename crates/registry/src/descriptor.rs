//! Capability descriptors
//!
//! Providers describe each member the way the host sees it. Host-side types
//! may include things scripts cannot represent; the registry builder decides
//! what is admitted.

use crate::context::ScriptContext;
use crate::error::Result;
use gridscript_core::{Dialects, ScriptType, Value};
use std::fmt;

/// Host implementation of a script-callable function.
///
/// Receives the execution context followed by the script arguments and
/// returns `None` for void functions.
pub type ApiFn = fn(&mut ScriptContext, &[Value]) -> Result<Option<Value>>;

/// A parameter or return type as declared by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostType {
    /// The implicit execution context
    Context,
    /// A script-representable type
    Script(ScriptType),
    /// A host type with no script representation
    Foreign(&'static str),
}

impl From<ScriptType> for HostType {
    fn from(ty: ScriptType) -> Self {
        HostType::Script(ty)
    }
}

impl fmt::Display for HostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostType::Context => f.write_str("<context>"),
            HostType::Script(ty) => write!(f, "{}", ty),
            HostType::Foreign(name) => f.write_str(name),
        }
    }
}

/// Scheduling hints passed through to the runtime untouched
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExecutionMeta {
    /// Energy cost of one call
    pub energy: f64,
    /// Forced delay in seconds after the call
    pub delay: f64,
}

impl Default for ExecutionMeta {
    fn default() -> Self {
        Self { energy: 10.0, delay: 0.0 }
    }
}

/// A host function offered to scripts
#[derive(Debug, Clone)]
pub struct FunctionDescriptor {
    pub member: &'static str,
    pub script_name: Option<&'static str>,
    pub params: Vec<HostType>,
    pub returns: Option<HostType>,
    pub dialects: Dialects,
    pub group: Option<String>,
    pub meta: ExecutionMeta,
    pub description: Option<String>,
    pub implementation: ApiFn,
}

impl FunctionDescriptor {
    /// A member taking the execution context as its first parameter
    pub fn method(member: &'static str, implementation: ApiFn) -> Self {
        Self {
            params: vec![HostType::Context],
            ..Self::free(member, implementation)
        }
    }

    /// A member without an execution context parameter
    pub fn free(member: &'static str, implementation: ApiFn) -> Self {
        Self {
            member,
            script_name: None,
            params: Vec::new(),
            returns: None,
            dialects: Dialects::ALL,
            group: None,
            meta: ExecutionMeta::default(),
            description: None,
            implementation,
        }
    }

    /// Expose the member to scripts under a different name
    pub fn named(mut self, script_name: &'static str) -> Self {
        self.script_name = Some(script_name);
        self
    }

    pub fn param(mut self, ty: impl Into<HostType>) -> Self {
        self.params.push(ty.into());
        self
    }

    pub fn returns(mut self, ty: impl Into<HostType>) -> Self {
        self.returns = Some(ty.into());
        self
    }

    pub fn dialects(mut self, dialects: impl Into<Dialects>) -> Self {
        self.dialects = dialects.into();
        self
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn energy(mut self, energy: f64) -> Self {
        self.meta.energy = energy;
        self
    }

    pub fn delay(mut self, delay: f64) -> Self {
        self.meta.delay = delay;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Name scripts call the function by
    pub fn visible_name(&self) -> &'static str {
        self.script_name.unwrap_or(self.member)
    }
}

/// A named constant inlined at compile time
#[derive(Debug, Clone)]
pub struct ConstantDescriptor {
    pub name: &'static str,
    pub ty: HostType,
    pub value: Value,
    pub read_only: bool,
    pub dialects: Dialects,
    pub group: Option<String>,
    pub description: Option<String>,
}

impl ConstantDescriptor {
    pub fn new(name: &'static str, value: Value) -> Self {
        Self {
            name,
            ty: HostType::Script(value.script_type()),
            value,
            read_only: true,
            dialects: Dialects::ALL,
            group: None,
            description: None,
        }
    }

    /// Override the declared host type
    pub fn typed(mut self, ty: HostType) -> Self {
        self.ty = ty;
        self
    }

    /// Mark the host member as writable
    pub fn writable(mut self) -> Self {
        self.read_only = false;
        self
    }

    pub fn dialects(mut self, dialects: impl Into<Dialects>) -> Self {
        self.dialects = dialects.into();
        self
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// An event scripts may handle in a state block
#[derive(Debug, Clone)]
pub struct EventDescriptor {
    pub name: &'static str,
    pub params: Vec<HostType>,
    pub returns: Option<HostType>,
    pub dialects: Dialects,
    pub group: Option<String>,
    pub description: Option<String>,
}

impl EventDescriptor {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            params: Vec::new(),
            returns: None,
            dialects: Dialects::ALL,
            group: None,
            description: None,
        }
    }

    pub fn param(mut self, ty: impl Into<HostType>) -> Self {
        self.params.push(ty.into());
        self
    }

    pub fn returns(mut self, ty: impl Into<HostType>) -> Self {
        self.returns = Some(ty.into());
        self
    }

    pub fn dialects(mut self, dialects: impl Into<Dialects>) -> Self {
        self.dialects = dialects.into();
        self
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_ctx: &mut ScriptContext, _args: &[Value]) -> Result<Option<Value>> {
        Ok(None)
    }

    #[test]
    fn test_method_has_leading_context() {
        let desc = FunctionDescriptor::method("llFoo", noop).param(ScriptType::Integer);
        assert_eq!(desc.params, vec![HostType::Context, HostType::Script(ScriptType::Integer)]);
        assert_eq!(desc.visible_name(), "llFoo");
        assert_eq!(desc.meta, ExecutionMeta { energy: 10.0, delay: 0.0 });
    }

    #[test]
    fn test_script_name_override() {
        let desc = FunctionDescriptor::method("FooImpl", noop).named("llFoo");
        assert_eq!(desc.visible_name(), "llFoo");
    }

    #[test]
    fn test_constant_type_follows_value() {
        let desc = ConstantDescriptor::new("PI", Value::Float(std::f64::consts::PI));
        assert_eq!(desc.ty, HostType::Script(ScriptType::Float));
        assert!(desc.read_only);
    }
}

//! Extension-dialect functions

use super::{float_arg, int_arg, str_arg};
use crate::context::ScriptContext;
use crate::descriptor::{ConstantDescriptor, FunctionDescriptor};
use crate::error::Result;
use crate::registry::{CapabilityProvider, RegistryBuilder};
use gridscript_core::{Dialect, ScriptType, Value};

/// Simulator extension functions (`ossl` dialect only)
pub struct OsslProvider;

impl CapabilityProvider for OsslProvider {
    fn name(&self) -> &str {
        "ossl"
    }

    fn register(&self, registry: &mut RegistryBuilder) {
        use ScriptType::{Float, Integer, Key, String};

        registry.register_constant(
            ConstantDescriptor::new("OS_LISTEN_REGEX_NAME", Value::Integer(1)).dialects(Dialect::Ossl),
        );
        registry.register_constant(
            ConstantDescriptor::new("OS_LISTEN_REGEX_MESSAGE", Value::Integer(2)).dialects(Dialect::Ossl),
        );

        registry.register_function(
            FunctionDescriptor::method("osGetSimulatorVersion", os_get_simulator_version)
                .returns(String)
                .dialects(Dialect::Ossl),
        );
        registry.register_function(
            FunctionDescriptor::method("osIsNpc", os_is_npc)
                .param(Key)
                .returns(Integer)
                .dialects(Dialect::Ossl),
        );
        // Two overloads sharing one script-visible name.
        registry.register_function(
            FunctionDescriptor::method("osMaxInteger", os_max_integer)
                .named("osMax")
                .param(Integer)
                .param(Integer)
                .returns(Integer)
                .dialects(Dialect::Ossl),
        );
        registry.register_function(
            FunctionDescriptor::method("osMaxFloat", os_max_float)
                .named("osMax")
                .param(Float)
                .param(Float)
                .returns(Float)
                .dialects(Dialect::Ossl),
        );
    }
}

/// Engine introspection functions (`xmr` dialect only)
pub struct XmrProvider;

impl CapabilityProvider for XmrProvider {
    fn name(&self) -> &str {
        "xmr"
    }

    fn register(&self, registry: &mut RegistryBuilder) {
        registry.register_function(
            FunctionDescriptor::method("xmrStackLeft", xmr_stack_left)
                .returns(ScriptType::Integer)
                .dialects(Dialect::Xmr)
                .energy(0.0),
        );
    }
}

fn os_get_simulator_version(_ctx: &mut ScriptContext, _args: &[Value]) -> Result<Option<Value>> {
    Ok(Some(Value::String(format!("GridScript {}", env!("CARGO_PKG_VERSION")))))
}

fn os_is_npc(_ctx: &mut ScriptContext, args: &[Value]) -> Result<Option<Value>> {
    str_arg("osIsNpc", args, 0)?;
    Ok(Some(Value::Integer(0)))
}

fn os_max_integer(_ctx: &mut ScriptContext, args: &[Value]) -> Result<Option<Value>> {
    let a = int_arg("osMax", args, 0)?;
    let b = int_arg("osMax", args, 1)?;
    Ok(Some(Value::Integer(a.max(b))))
}

fn os_max_float(_ctx: &mut ScriptContext, args: &[Value]) -> Result<Option<Value>> {
    let a = float_arg("osMax", args, 0)?;
    let b = float_arg("osMax", args, 1)?;
    Ok(Some(Value::Float(a.max(b))))
}

fn xmr_stack_left(_ctx: &mut ScriptContext, _args: &[Value]) -> Result<Option<Value>> {
    Ok(Some(Value::Integer(i32::MAX)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Registry, Visibility};

    #[test]
    fn test_overloads_registered_under_script_name() {
        let registry = Registry::standard();
        let vis = Visibility::new(Dialect::Ossl);
        let members: Vec<&str> = registry.overloads("osMax", &vis).map(|f| f.member).collect();
        assert_eq!(members, vec!["osMaxInteger", "osMaxFloat"]);
        assert!(registry.overloads("osMaxInteger", &vis).next().is_none());
    }

    #[test]
    fn test_max_overloads() {
        let mut ctx = ScriptContext::default();
        assert_eq!(
            os_max_integer(&mut ctx, &[Value::Integer(3), Value::Integer(9)]).unwrap(),
            Some(Value::Integer(9))
        );
        assert_eq!(
            os_max_float(&mut ctx, &[Value::Float(3.5), Value::Float(-1.0)]).unwrap(),
            Some(Value::Float(3.5))
        );
    }
}

//! List functions

use super::{int_arg, list_arg, resolve_index, str_arg};
use crate::context::ScriptContext;
use crate::descriptor::FunctionDescriptor;
use crate::error::Result;
use crate::registry::{CapabilityProvider, RegistryBuilder};
use gridscript_core::{ScriptType, Value};

pub struct ListProvider;

impl CapabilityProvider for ListProvider {
    fn name(&self) -> &str {
        "list"
    }

    fn register(&self, registry: &mut RegistryBuilder) {
        use ScriptType::{Float, Integer, List, String};

        registry.register_function(
            FunctionDescriptor::method("llGetListLength", ll_get_list_length).param(List).returns(Integer),
        );
        registry.register_function(
            FunctionDescriptor::method("llList2Integer", ll_list2_integer).param(List).param(Integer).returns(Integer),
        );
        registry.register_function(
            FunctionDescriptor::method("llList2Float", ll_list2_float).param(List).param(Integer).returns(Float),
        );
        registry.register_function(
            FunctionDescriptor::method("llList2String", ll_list2_string).param(List).param(Integer).returns(String),
        );
        registry.register_function(
            FunctionDescriptor::method("llDumpList2String", ll_dump_list2_string)
                .param(List)
                .param(String)
                .returns(String),
        );
    }
}

fn element<'a>(function: &str, args: &'a [Value]) -> Result<Option<&'a Value>> {
    let items = list_arg(function, args, 0)?;
    let index = int_arg(function, args, 1)?;
    Ok(resolve_index(index, items.len()).map(|i| &items[i]))
}

fn ll_get_list_length(_ctx: &mut ScriptContext, args: &[Value]) -> Result<Option<Value>> {
    Ok(Some(Value::Integer(list_arg("llGetListLength", args, 0)?.len() as i32)))
}

fn ll_list2_integer(_ctx: &mut ScriptContext, args: &[Value]) -> Result<Option<Value>> {
    let value = match element("llList2Integer", args)? {
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        Some(other) => other.as_integer().unwrap_or(0),
        None => 0,
    };
    Ok(Some(Value::Integer(value)))
}

fn ll_list2_float(_ctx: &mut ScriptContext, args: &[Value]) -> Result<Option<Value>> {
    let value = match element("llList2Float", args)? {
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        Some(other) => other.as_float().unwrap_or(0.0),
        None => 0.0,
    };
    Ok(Some(Value::Float(value)))
}

fn ll_list2_string(_ctx: &mut ScriptContext, args: &[Value]) -> Result<Option<Value>> {
    let value = element("llList2String", args)?.map(Value::to_string).unwrap_or_default();
    Ok(Some(Value::String(value)))
}

fn ll_dump_list2_string(_ctx: &mut ScriptContext, args: &[Value]) -> Result<Option<Value>> {
    let items = list_arg("llDumpList2String", args, 0)?;
    let separator = str_arg("llDumpList2String", args, 1)?;
    let parts: Vec<String> = items.iter().map(Value::to_string).collect();
    Ok(Some(Value::String(parts.join(separator))))
}

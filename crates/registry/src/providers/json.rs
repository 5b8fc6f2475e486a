//! JSON helpers (extension group `json`)

use super::{list_arg, str_arg};
use crate::context::ScriptContext;
use crate::descriptor::{ConstantDescriptor, FunctionDescriptor};
use crate::error::Result;
use crate::registry::{CapabilityProvider, RegistryBuilder};
use gridscript_core::{ScriptType, Value};
use serde_json::Value as Json;

pub const GROUP: &str = "json";

const JSON_INVALID: &str = "\u{FDD0}";
const JSON_OBJECT: &str = "\u{FDD1}";
const JSON_ARRAY: &str = "\u{FDD2}";
const JSON_NUMBER: &str = "\u{FDD3}";
const JSON_STRING: &str = "\u{FDD4}";
const JSON_NULL: &str = "\u{FDD5}";
const JSON_TRUE: &str = "\u{FDD6}";
const JSON_FALSE: &str = "\u{FDD7}";

pub struct JsonProvider;

impl CapabilityProvider for JsonProvider {
    fn name(&self) -> &str {
        "json"
    }

    fn register(&self, registry: &mut RegistryBuilder) {
        use ScriptType::{List, String};

        let constants = [
            ("JSON_INVALID", JSON_INVALID),
            ("JSON_OBJECT", JSON_OBJECT),
            ("JSON_ARRAY", JSON_ARRAY),
            ("JSON_NUMBER", JSON_NUMBER),
            ("JSON_STRING", JSON_STRING),
            ("JSON_NULL", JSON_NULL),
            ("JSON_TRUE", JSON_TRUE),
            ("JSON_FALSE", JSON_FALSE),
        ];
        for (name, value) in constants {
            registry.register_constant(ConstantDescriptor::new(name, Value::String(value.into())).group(GROUP));
        }

        registry.register_function(
            FunctionDescriptor::method("llJsonGetValue", ll_json_get_value)
                .param(String)
                .param(List)
                .returns(String)
                .group(GROUP),
        );
        registry.register_function(
            FunctionDescriptor::method("llJsonValueType", ll_json_value_type)
                .param(String)
                .param(List)
                .returns(String)
                .group(GROUP),
        );
        registry.register_function(
            FunctionDescriptor::method("llList2Json", ll_list2_json)
                .param(String)
                .param(List)
                .returns(String)
                .group(GROUP),
        );
    }
}

/// Walk a parsed document along a specifier list of keys and indices
fn select<'a>(doc: &'a Json, specifiers: &[Value]) -> Option<&'a Json> {
    specifiers.iter().try_fold(doc, |node, spec| match (node, spec) {
        (Json::Object(map), Value::String(key)) => map.get(key),
        (Json::Array(items), Value::Integer(i)) => usize::try_from(*i).ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn lookup(function: &str, args: &[Value]) -> Result<Option<Json>> {
    let text = str_arg(function, args, 0)?;
    let specifiers = list_arg(function, args, 1)?;
    let Ok(doc) = serde_json::from_str::<Json>(text) else {
        return Ok(None);
    };
    Ok(select(&doc, specifiers).cloned())
}

fn ll_json_get_value(_ctx: &mut ScriptContext, args: &[Value]) -> Result<Option<Value>> {
    let text = match lookup("llJsonGetValue", args)? {
        None => JSON_INVALID.to_string(),
        Some(Json::String(s)) => s,
        Some(Json::Null) => JSON_NULL.to_string(),
        Some(Json::Bool(true)) => JSON_TRUE.to_string(),
        Some(Json::Bool(false)) => JSON_FALSE.to_string(),
        Some(other) => other.to_string(),
    };
    Ok(Some(Value::String(text)))
}

fn ll_json_value_type(_ctx: &mut ScriptContext, args: &[Value]) -> Result<Option<Value>> {
    let ty = match lookup("llJsonValueType", args)? {
        None => JSON_INVALID,
        Some(Json::Object(_)) => JSON_OBJECT,
        Some(Json::Array(_)) => JSON_ARRAY,
        Some(Json::Number(_)) => JSON_NUMBER,
        Some(Json::String(_)) => JSON_STRING,
        Some(Json::Null) => JSON_NULL,
        Some(Json::Bool(true)) => JSON_TRUE,
        Some(Json::Bool(false)) => JSON_FALSE,
    };
    Ok(Some(Value::String(ty.to_string())))
}

fn to_json(value: &Value) -> Json {
    match value {
        Value::Integer(i) => Json::from(*i),
        Value::Long(l) => Json::from(*l),
        Value::Float(f) => Json::from(*f),
        Value::String(s) if s == JSON_TRUE => Json::Bool(true),
        Value::String(s) if s == JSON_FALSE => Json::Bool(false),
        Value::String(s) if s == JSON_NULL => Json::Null,
        other => Json::String(other.to_string()),
    }
}

fn ll_list2_json(_ctx: &mut ScriptContext, args: &[Value]) -> Result<Option<Value>> {
    let kind = str_arg("llList2Json", args, 0)?;
    let items = list_arg("llList2Json", args, 1)?;

    let doc = match kind {
        JSON_ARRAY => Json::Array(items.iter().map(to_json).collect()),
        JSON_OBJECT if items.len() % 2 == 0 => Json::Object(
            items
                .chunks(2)
                .map(|pair| (pair[0].to_string(), to_json(&pair[1])))
                .collect(),
        ),
        _ => return Ok(Some(Value::String(JSON_INVALID.to_string()))),
    };
    Ok(Some(Value::String(doc.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(text: &str) -> Value {
        Value::String(text.into())
    }

    #[test]
    fn test_get_value() {
        let mut ctx = ScriptContext::default();
        let doc = s(r#"{"a": [10, "x", true]}"#);

        let get = |ctx: &mut ScriptContext, spec: Vec<Value>| {
            ll_json_get_value(ctx, &[doc.clone(), Value::List(spec)]).unwrap()
        };
        assert_eq!(get(&mut ctx, vec![s("a"), Value::Integer(0)]), Some(s("10")));
        assert_eq!(get(&mut ctx, vec![s("a"), Value::Integer(1)]), Some(s("x")));
        assert_eq!(get(&mut ctx, vec![s("a"), Value::Integer(2)]), Some(s(JSON_TRUE)));
        assert_eq!(get(&mut ctx, vec![s("missing")]), Some(s(JSON_INVALID)));
    }

    #[test]
    fn test_value_type() {
        let mut ctx = ScriptContext::default();
        let result = ll_json_value_type(&mut ctx, &[s("[1]"), Value::List(vec![])]).unwrap();
        assert_eq!(result, Some(s(JSON_ARRAY)));
    }

    #[test]
    fn test_list_to_json() {
        let mut ctx = ScriptContext::default();
        let array = ll_list2_json(&mut ctx, &[s(JSON_ARRAY), Value::List(vec![Value::Integer(1), s("b")])]).unwrap();
        assert_eq!(array, Some(s(r#"[1,"b"]"#)));

        let odd = ll_list2_json(&mut ctx, &[s(JSON_OBJECT), Value::List(vec![s("k")])]).unwrap();
        assert_eq!(odd, Some(s(JSON_INVALID)));
    }
}

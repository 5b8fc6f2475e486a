//! String functions

use super::{int_arg, resolve_index, str_arg};
use crate::context::ScriptContext;
use crate::descriptor::{ConstantDescriptor, FunctionDescriptor};
use crate::error::Result;
use crate::registry::{CapabilityProvider, RegistryBuilder};
use gridscript_core::{ScriptType, Value};
use sha2::{Digest, Sha256};

pub struct StringProvider;

const STRING_TRIM_HEAD: i32 = 1;
const STRING_TRIM_TAIL: i32 = 2;

impl CapabilityProvider for StringProvider {
    fn name(&self) -> &str {
        "string"
    }

    fn register(&self, registry: &mut RegistryBuilder) {
        use ScriptType::{Integer, String};

        registry.register_constant(ConstantDescriptor::new("STRING_TRIM_HEAD", Value::Integer(STRING_TRIM_HEAD)));
        registry.register_constant(ConstantDescriptor::new("STRING_TRIM_TAIL", Value::Integer(STRING_TRIM_TAIL)));
        registry.register_constant(ConstantDescriptor::new(
            "STRING_TRIM",
            Value::Integer(STRING_TRIM_HEAD | STRING_TRIM_TAIL),
        ));

        registry.register_function(
            FunctionDescriptor::method("llStringLength", ll_string_length).param(String).returns(Integer),
        );
        registry.register_function(
            FunctionDescriptor::method("llGetSubString", ll_get_sub_string)
                .param(String)
                .param(Integer)
                .param(Integer)
                .returns(String)
                .describe("Substring between two inclusive, possibly negative, indices"),
        );
        registry.register_function(FunctionDescriptor::method("llToUpper", ll_to_upper).param(String).returns(String));
        registry.register_function(FunctionDescriptor::method("llToLower", ll_to_lower).param(String).returns(String));
        registry.register_function(
            FunctionDescriptor::method("llSubStringIndex", ll_sub_string_index)
                .param(String)
                .param(String)
                .returns(Integer),
        );
        registry.register_function(
            FunctionDescriptor::method("llStringTrim", ll_string_trim).param(String).param(Integer).returns(String),
        );
        registry.register_function(
            FunctionDescriptor::method("llSHA256String", ll_sha256_string)
                .param(String)
                .returns(String)
                .energy(20.0),
        );
    }
}

fn ll_string_length(_ctx: &mut ScriptContext, args: &[Value]) -> Result<Option<Value>> {
    let s = str_arg("llStringLength", args, 0)?;
    Ok(Some(Value::Integer(s.chars().count() as i32)))
}

fn ll_get_sub_string(_ctx: &mut ScriptContext, args: &[Value]) -> Result<Option<Value>> {
    let chars: Vec<char> = str_arg("llGetSubString", args, 0)?.chars().collect();
    let start = int_arg("llGetSubString", args, 1)?;
    let end = int_arg("llGetSubString", args, 2)?;

    let (Some(start), Some(end)) = (resolve_index(start, chars.len()), resolve_index(end, chars.len())) else {
        return Ok(Some(Value::String(String::new())));
    };
    let result = if start <= end {
        chars[start..=end].iter().collect()
    } else {
        // Inverted range selects everything outside it.
        chars[..=end].iter().chain(chars[start..].iter()).collect()
    };
    Ok(Some(Value::String(result)))
}

fn ll_to_upper(_ctx: &mut ScriptContext, args: &[Value]) -> Result<Option<Value>> {
    Ok(Some(Value::String(str_arg("llToUpper", args, 0)?.to_uppercase())))
}

fn ll_to_lower(_ctx: &mut ScriptContext, args: &[Value]) -> Result<Option<Value>> {
    Ok(Some(Value::String(str_arg("llToLower", args, 0)?.to_lowercase())))
}

fn ll_sub_string_index(_ctx: &mut ScriptContext, args: &[Value]) -> Result<Option<Value>> {
    let haystack = str_arg("llSubStringIndex", args, 0)?;
    let needle = str_arg("llSubStringIndex", args, 1)?;
    let index = haystack
        .find(needle)
        .map(|byte| haystack[..byte].chars().count() as i32)
        .unwrap_or(-1);
    Ok(Some(Value::Integer(index)))
}

fn ll_string_trim(_ctx: &mut ScriptContext, args: &[Value]) -> Result<Option<Value>> {
    let s = str_arg("llStringTrim", args, 0)?;
    let mode = int_arg("llStringTrim", args, 1)?;
    let mut trimmed = s;
    if mode & STRING_TRIM_HEAD != 0 {
        trimmed = trimmed.trim_start();
    }
    if mode & STRING_TRIM_TAIL != 0 {
        trimmed = trimmed.trim_end();
    }
    Ok(Some(Value::String(trimmed.to_string())))
}

fn ll_sha256_string(_ctx: &mut ScriptContext, args: &[Value]) -> Result<Option<Value>> {
    let digest = Sha256::digest(str_arg("llSHA256String", args, 0)?.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    Ok(Some(Value::String(hex)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(text: &str) -> Value {
        Value::String(text.into())
    }

    #[test]
    fn test_string_functions() {
        let mut ctx = ScriptContext::default();

        assert_eq!(ll_string_length(&mut ctx, &[s("héllo")]).unwrap(), Some(Value::Integer(5)));
        assert_eq!(ll_to_upper(&mut ctx, &[s("hello")]).unwrap(), Some(s("HELLO")));
        assert_eq!(ll_sub_string_index(&mut ctx, &[s("grid script"), s("script")]).unwrap(), Some(Value::Integer(5)));
        assert_eq!(ll_sub_string_index(&mut ctx, &[s("grid"), s("x")]).unwrap(), Some(Value::Integer(-1)));
        assert_eq!(
            ll_string_trim(&mut ctx, &[s("  pad  "), Value::Integer(STRING_TRIM_HEAD)]).unwrap(),
            Some(s("pad  "))
        );
    }

    #[test]
    fn test_get_sub_string_indices() {
        let mut ctx = ScriptContext::default();
        let call = |ctx: &mut ScriptContext, a: i32, b: i32| {
            ll_get_sub_string(ctx, &[s("abcdef"), Value::Integer(a), Value::Integer(b)]).unwrap()
        };

        assert_eq!(call(&mut ctx, 1, 3), Some(s("bcd")));
        assert_eq!(call(&mut ctx, -2, -1), Some(s("ef")));
        assert_eq!(call(&mut ctx, 4, 1), Some(s("abef")));
        assert_eq!(call(&mut ctx, 9, 10), Some(s("")));
    }

    #[test]
    fn test_sha256() {
        let mut ctx = ScriptContext::default();
        assert_eq!(
            ll_sha256_string(&mut ctx, &[s("")]).unwrap(),
            Some(s("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"))
        );
    }
}

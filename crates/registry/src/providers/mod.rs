//! Built-in capability providers
//!
//! Thin bindings used by tooling and tests. Each provider registers its
//! members explicitly at startup.

mod chat;
mod json;
mod lists;
mod math;
mod ossl;
mod strings;

pub use chat::ChatProvider;
pub use json::JsonProvider;
pub use lists::ListProvider;
pub use math::MathProvider;
pub use ossl::{OsslProvider, XmrProvider};
pub use strings::StringProvider;

use crate::error::{Result, ScriptError};
use crate::registry::CapabilityProvider;
use gridscript_core::{Value, Vector};

/// Every built-in provider, in installation order
pub fn standard_providers() -> Vec<Box<dyn CapabilityProvider>> {
    vec![
        Box::new(MathProvider),
        Box::new(StringProvider),
        Box::new(ListProvider),
        Box::new(ChatProvider),
        Box::new(OsslProvider),
        Box::new(XmrProvider),
        Box::new(JsonProvider),
    ]
}

// Argument accessors. The compiler guarantees arity and types, so these only
// fail when a host calls a binding directly with bad input.

pub(crate) fn int_arg(function: &str, args: &[Value], index: usize) -> Result<i32> {
    args.get(index)
        .and_then(Value::as_integer)
        .ok_or_else(|| ScriptError::invalid_args(function, format!("argument {} must be an integer", index + 1)))
}

pub(crate) fn float_arg(function: &str, args: &[Value], index: usize) -> Result<f64> {
    args.get(index)
        .and_then(Value::as_float)
        .ok_or_else(|| ScriptError::invalid_args(function, format!("argument {} must be a float", index + 1)))
}

pub(crate) fn str_arg<'a>(function: &str, args: &'a [Value], index: usize) -> Result<&'a str> {
    args.get(index)
        .and_then(Value::as_str)
        .ok_or_else(|| ScriptError::invalid_args(function, format!("argument {} must be a string", index + 1)))
}

pub(crate) fn vector_arg(function: &str, args: &[Value], index: usize) -> Result<Vector> {
    match args.get(index) {
        Some(Value::Vector(v)) => Ok(*v),
        _ => Err(ScriptError::invalid_args(function, format!("argument {} must be a vector", index + 1))),
    }
}

pub(crate) fn list_arg<'a>(function: &str, args: &'a [Value], index: usize) -> Result<&'a [Value]> {
    match args.get(index) {
        Some(Value::List(items)) => Ok(items),
        _ => Err(ScriptError::invalid_args(function, format!("argument {} must be a list", index + 1))),
    }
}

/// Resolve a possibly negative list/string index against a length
pub(crate) fn resolve_index(index: i32, len: usize) -> Option<usize> {
    let len = len as i64;
    let index = if index < 0 { len + index as i64 } else { index as i64 };
    (0..len).contains(&index).then_some(index as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Registry, Visibility};
    use gridscript_core::Dialect;

    #[test]
    fn test_standard_registry_has_no_rejections() {
        let registry = Registry::standard();
        assert!(registry.rejections().is_empty(), "{:?}", registry.rejections());
    }

    #[test]
    fn test_resolve_index() {
        assert_eq!(resolve_index(0, 3), Some(0));
        assert_eq!(resolve_index(-1, 3), Some(2));
        assert_eq!(resolve_index(3, 3), None);
        assert_eq!(resolve_index(-4, 3), None);
    }

    #[test]
    fn test_extension_dialects_are_separate() {
        let registry = Registry::standard();
        let lsl = Visibility::default();
        let ossl = Visibility::new(Dialect::Ossl);

        assert!(registry.has_function("llSay", &lsl));
        assert!(!registry.has_function("osGetSimulatorVersion", &lsl));
        assert!(registry.has_function("osGetSimulatorVersion", &ossl));
        assert!(!registry.has_function("xmrStackLeft", &ossl));
    }
}

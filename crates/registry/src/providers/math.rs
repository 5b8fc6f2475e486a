//! Math functions and core constants

use super::{float_arg, int_arg, vector_arg};
use crate::context::ScriptContext;
use crate::descriptor::{ConstantDescriptor, FunctionDescriptor};
use crate::error::Result;
use crate::registry::{CapabilityProvider, RegistryBuilder};
use gridscript_core::{Rotation, ScriptType, Value, Vector, NULL_KEY};
use rand::Rng;
use std::f64::consts::PI;

pub struct MathProvider;

impl CapabilityProvider for MathProvider {
    fn name(&self) -> &str {
        "math"
    }

    fn register(&self, registry: &mut RegistryBuilder) {
        register_constants(registry);
        register_scalar_functions(registry);
        register_vector_functions(registry);
    }
}

fn register_constants(registry: &mut RegistryBuilder) {
    let constants = [
        ("TRUE", Value::Integer(1)),
        ("FALSE", Value::Integer(0)),
        ("PI", Value::Float(PI)),
        ("TWO_PI", Value::Float(PI * 2.0)),
        ("PI_BY_TWO", Value::Float(PI / 2.0)),
        ("DEG_TO_RAD", Value::Float(PI / 180.0)),
        ("RAD_TO_DEG", Value::Float(180.0 / PI)),
        ("SQRT2", Value::Float(std::f64::consts::SQRT_2)),
        ("ZERO_VECTOR", Value::Vector(Vector::ZERO)),
        ("ZERO_ROTATION", Value::Rotation(Rotation::IDENTITY)),
        ("NULL_KEY", Value::Key(NULL_KEY.to_string())),
    ];
    for (name, value) in constants {
        registry.register_constant(ConstantDescriptor::new(name, value));
    }
}

fn register_scalar_functions(registry: &mut RegistryBuilder) {
    use ScriptType::{Float, Integer};

    registry.register_function(
        FunctionDescriptor::method("llAbs", ll_abs).param(Integer).returns(Integer).describe("Absolute value of an integer"),
    );
    registry.register_function(
        FunctionDescriptor::method("llFabs", ll_fabs).param(Float).returns(Float).describe("Absolute value of a float"),
    );
    registry.register_function(FunctionDescriptor::method("llFloor", ll_floor).param(Float).returns(Integer));
    registry.register_function(FunctionDescriptor::method("llCeil", ll_ceil).param(Float).returns(Integer));
    registry.register_function(FunctionDescriptor::method("llRound", ll_round).param(Float).returns(Integer));
    registry.register_function(FunctionDescriptor::method("llSqrt", ll_sqrt).param(Float).returns(Float));
    registry.register_function(
        FunctionDescriptor::method("llPow", ll_pow).param(Float).param(Float).returns(Float),
    );
    registry.register_function(
        FunctionDescriptor::method("llFrand", ll_frand)
            .param(Float)
            .returns(Float)
            .describe("Random float between 0 and the argument"),
    );
}

fn register_vector_functions(registry: &mut RegistryBuilder) {
    use ScriptType::{Float, Vector};

    registry.register_function(FunctionDescriptor::method("llVecMag", ll_vec_mag).param(Vector).returns(Float));
    registry.register_function(FunctionDescriptor::method("llVecNorm", ll_vec_norm).param(Vector).returns(Vector));
    registry.register_function(
        FunctionDescriptor::method("llVecDist", ll_vec_dist).param(Vector).param(Vector).returns(Float),
    );
}

// ============================================================================
// SCALAR FUNCTIONS
// ============================================================================

fn ll_abs(_ctx: &mut ScriptContext, args: &[Value]) -> Result<Option<Value>> {
    let n = int_arg("llAbs", args, 0)?;
    Ok(Some(Value::Integer(n.wrapping_abs())))
}

fn ll_fabs(_ctx: &mut ScriptContext, args: &[Value]) -> Result<Option<Value>> {
    Ok(Some(Value::Float(float_arg("llFabs", args, 0)?.abs())))
}

fn ll_floor(_ctx: &mut ScriptContext, args: &[Value]) -> Result<Option<Value>> {
    Ok(Some(Value::Integer(float_arg("llFloor", args, 0)?.floor() as i32)))
}

fn ll_ceil(_ctx: &mut ScriptContext, args: &[Value]) -> Result<Option<Value>> {
    Ok(Some(Value::Integer(float_arg("llCeil", args, 0)?.ceil() as i32)))
}

fn ll_round(_ctx: &mut ScriptContext, args: &[Value]) -> Result<Option<Value>> {
    // Halves round up, including negatives.
    Ok(Some(Value::Integer((float_arg("llRound", args, 0)? + 0.5).floor() as i32)))
}

fn ll_sqrt(_ctx: &mut ScriptContext, args: &[Value]) -> Result<Option<Value>> {
    Ok(Some(Value::Float(float_arg("llSqrt", args, 0)?.sqrt())))
}

fn ll_pow(_ctx: &mut ScriptContext, args: &[Value]) -> Result<Option<Value>> {
    let base = float_arg("llPow", args, 0)?;
    let exp = float_arg("llPow", args, 1)?;
    Ok(Some(Value::Float(base.powf(exp))))
}

fn ll_frand(_ctx: &mut ScriptContext, args: &[Value]) -> Result<Option<Value>> {
    let max = float_arg("llFrand", args, 0)?;
    let unit: f64 = rand::thread_rng().gen();
    Ok(Some(Value::Float(unit * max)))
}

// ============================================================================
// VECTOR FUNCTIONS
// ============================================================================

fn ll_vec_mag(_ctx: &mut ScriptContext, args: &[Value]) -> Result<Option<Value>> {
    Ok(Some(Value::Float(vector_arg("llVecMag", args, 0)?.magnitude())))
}

fn ll_vec_norm(_ctx: &mut ScriptContext, args: &[Value]) -> Result<Option<Value>> {
    Ok(Some(Value::Vector(vector_arg("llVecNorm", args, 0)?.normalize())))
}

fn ll_vec_dist(_ctx: &mut ScriptContext, args: &[Value]) -> Result<Option<Value>> {
    let a = vector_arg("llVecDist", args, 0)?;
    let b = vector_arg("llVecDist", args, 1)?;
    Ok(Some(Value::Float(a.sub(b).magnitude())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_math_functions() {
        let mut ctx = ScriptContext::default();

        assert_eq!(ll_abs(&mut ctx, &[Value::Integer(-5)]).unwrap(), Some(Value::Integer(5)));
        assert_eq!(ll_floor(&mut ctx, &[Value::Float(2.7)]).unwrap(), Some(Value::Integer(2)));
        assert_eq!(ll_ceil(&mut ctx, &[Value::Float(2.1)]).unwrap(), Some(Value::Integer(3)));
        assert_eq!(ll_round(&mut ctx, &[Value::Float(-2.5)]).unwrap(), Some(Value::Integer(-2)));
        assert_eq!(
            ll_pow(&mut ctx, &[Value::Float(2.0), Value::Float(10.0)]).unwrap(),
            Some(Value::Float(1024.0))
        );
    }

    #[test]
    fn test_frand_in_range() {
        let mut ctx = ScriptContext::default();
        for _ in 0..32 {
            let Some(Value::Float(f)) = ll_frand(&mut ctx, &[Value::Float(4.0)]).unwrap() else {
                panic!("llFrand must return a float");
            };
            assert!((0.0..4.0).contains(&f));
        }
    }

    #[test]
    fn test_bad_arguments() {
        let mut ctx = ScriptContext::default();
        assert!(ll_vec_mag(&mut ctx, &[Value::Integer(1)]).is_err());
    }
}

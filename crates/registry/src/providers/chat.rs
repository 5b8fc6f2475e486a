//! Object identity, chat, timers and the standard event set

use super::{float_arg, int_arg, str_arg};
use crate::context::ScriptContext;
use crate::descriptor::{ConstantDescriptor, EventDescriptor, FunctionDescriptor};
use crate::error::Result;
use crate::registry::{CapabilityProvider, RegistryBuilder};
use gridscript_core::{ScriptType, Value};

pub struct ChatProvider;

pub const PUBLIC_CHANNEL: i32 = 0;
pub const DEBUG_CHANNEL: i32 = 0x7FFF_FFFF;

impl CapabilityProvider for ChatProvider {
    fn name(&self) -> &str {
        "chat"
    }

    fn register(&self, registry: &mut RegistryBuilder) {
        register_chat_functions(registry);
        register_object_functions(registry);
        register_events(registry);
    }
}

fn register_chat_functions(registry: &mut RegistryBuilder) {
    use ScriptType::{Integer, Key, String};

    registry.register_constant(ConstantDescriptor::new("PUBLIC_CHANNEL", Value::Integer(PUBLIC_CHANNEL)));
    registry.register_constant(ConstantDescriptor::new("DEBUG_CHANNEL", Value::Integer(DEBUG_CHANNEL)));

    registry.register_function(
        FunctionDescriptor::method("llSay", ll_say)
            .param(Integer)
            .param(String)
            .describe("Say text on a channel"),
    );
    registry.register_function(FunctionDescriptor::method("llWhisper", ll_say).param(Integer).param(String));
    registry.register_function(FunctionDescriptor::method("llShout", ll_say).param(Integer).param(String));
    registry.register_function(FunctionDescriptor::method("llOwnerSay", ll_owner_say).param(String));
    registry.register_function(
        FunctionDescriptor::method("llInstantMessage", ll_instant_message)
            .param(Key)
            .param(String)
            .delay(2.0),
    );
}

fn register_object_functions(registry: &mut RegistryBuilder) {
    use ScriptType::{Float, Key, String};

    registry.register_function(FunctionDescriptor::method("llGetKey", ll_get_key).returns(Key));
    registry.register_function(FunctionDescriptor::method("llGetOwner", ll_get_owner).returns(Key));
    registry.register_function(FunctionDescriptor::method("llGetObjectName", ll_get_object_name).returns(String));
    registry.register_function(FunctionDescriptor::method("llSetTimerEvent", ll_set_timer_event).param(Float));
    registry.register_function(
        FunctionDescriptor::method("llSleep", ll_sleep)
            .param(Float)
            .energy(0.0)
            .describe("Suspend the script; the scheduler applies the pause"),
    );
}

fn register_events(registry: &mut RegistryBuilder) {
    use ScriptType::{Integer, Key, String};

    registry.register_event(EventDescriptor::new("state_entry").describe("Entered a state"));
    registry.register_event(EventDescriptor::new("state_exit").describe("Leaving a state"));
    registry.register_event(EventDescriptor::new("timer"));
    registry.register_event(EventDescriptor::new("touch_start").param(Integer));
    registry.register_event(EventDescriptor::new("touch_end").param(Integer));
    registry.register_event(EventDescriptor::new("collision_start").param(Integer));
    registry.register_event(EventDescriptor::new("on_rez").param(Integer));
    registry.register_event(EventDescriptor::new("changed").param(Integer));
    registry.register_event(
        EventDescriptor::new("listen")
            .param(Integer)
            .param(String)
            .param(Key)
            .param(String),
    );
}

fn ll_say(ctx: &mut ScriptContext, args: &[Value]) -> Result<Option<Value>> {
    let channel = int_arg("llSay", args, 0)?;
    let text = str_arg("llSay", args, 1)?;
    ctx.say(channel, text);
    Ok(None)
}

fn ll_owner_say(ctx: &mut ScriptContext, args: &[Value]) -> Result<Option<Value>> {
    let text = str_arg("llOwnerSay", args, 0)?;
    ctx.say(DEBUG_CHANNEL, text);
    Ok(None)
}

fn ll_instant_message(ctx: &mut ScriptContext, args: &[Value]) -> Result<Option<Value>> {
    let to = str_arg("llInstantMessage", args, 0)?;
    let text = str_arg("llInstantMessage", args, 1)?;
    ctx.say(DEBUG_CHANNEL, format!("[IM {}] {}", to, text));
    Ok(None)
}

fn ll_get_key(ctx: &mut ScriptContext, _args: &[Value]) -> Result<Option<Value>> {
    Ok(Some(Value::Key(ctx.object_key().to_string())))
}

fn ll_get_owner(ctx: &mut ScriptContext, _args: &[Value]) -> Result<Option<Value>> {
    Ok(Some(Value::Key(ctx.owner_key().to_string())))
}

fn ll_get_object_name(ctx: &mut ScriptContext, _args: &[Value]) -> Result<Option<Value>> {
    Ok(Some(Value::String(ctx.object_name().to_string())))
}

fn ll_set_timer_event(ctx: &mut ScriptContext, args: &[Value]) -> Result<Option<Value>> {
    ctx.set_timer_interval(float_arg("llSetTimerEvent", args, 0)?);
    Ok(None)
}

fn ll_sleep(_ctx: &mut ScriptContext, args: &[Value]) -> Result<Option<Value>> {
    float_arg("llSleep", args, 0)?;
    Ok(None)
}

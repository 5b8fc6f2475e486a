//! Script execution context
//!
//! Every host function receives the context of the object running the
//! script as its implicit leading parameter.

use gridscript_core::NULL_KEY;

/// One line of chat produced by a script
#[derive(Debug, Clone, PartialEq)]
pub struct ChatLine {
    pub channel: i32,
    pub text: String,
}

/// Script execution context
#[derive(Debug, Clone)]
pub struct ScriptContext {
    /// Name of the object hosting the script
    object_name: String,

    /// Key of the object hosting the script
    object_key: String,

    /// Key of the object's owner
    owner_key: String,

    /// Chat emitted so far
    chat: Vec<ChatLine>,

    /// Seconds requested by the last timer call
    timer_interval: f64,
}

impl ScriptContext {
    /// Create a context for a named object
    pub fn new(object_name: impl Into<String>) -> Self {
        Self {
            object_name: object_name.into(),
            object_key: NULL_KEY.to_string(),
            owner_key: NULL_KEY.to_string(),
            chat: Vec::new(),
            timer_interval: 0.0,
        }
    }

    pub fn with_keys(mut self, object_key: impl Into<String>, owner_key: impl Into<String>) -> Self {
        self.object_key = object_key.into();
        self.owner_key = owner_key.into();
        self
    }

    pub fn object_name(&self) -> &str {
        &self.object_name
    }

    pub fn object_key(&self) -> &str {
        &self.object_key
    }

    pub fn owner_key(&self) -> &str {
        &self.owner_key
    }

    /// Record chat on a channel
    pub fn say(&mut self, channel: i32, text: impl Into<String>) {
        let text = text.into();
        tracing::trace!(channel, %text, object = %self.object_name, "chat");
        self.chat.push(ChatLine { channel, text });
    }

    /// Chat produced so far
    pub fn chat(&self) -> &[ChatLine] {
        &self.chat
    }

    /// Drain and return the recorded chat
    pub fn take_chat(&mut self) -> Vec<ChatLine> {
        std::mem::take(&mut self.chat)
    }

    pub fn timer_interval(&self) -> f64 {
        self.timer_interval
    }

    pub fn set_timer_interval(&mut self, seconds: f64) {
        self.timer_interval = seconds.max(0.0);
    }
}

impl Default for ScriptContext {
    fn default() -> Self {
        Self::new("Object")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_chat() {
        let mut ctx = ScriptContext::new("Box");

        assert!(ctx.chat().is_empty());

        ctx.say(0, "hello");
        assert_eq!(ctx.chat(), &[ChatLine { channel: 0, text: "hello".into() }]);

        let drained = ctx.take_chat();
        assert_eq!(drained.len(), 1);
        assert!(ctx.chat().is_empty());
    }

    #[test]
    fn test_timer_never_negative() {
        let mut ctx = ScriptContext::default();
        ctx.set_timer_interval(-3.0);
        assert_eq!(ctx.timer_interval(), 0.0);
    }
}

//! Error types raised while executing host functions

use gridscript_core::GridScriptError;

/// Script runtime error types
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScriptError {
    /// Runtime error
    #[error("Runtime error: {0}")]
    RuntimeError(String),

    /// Arguments did not fit what a host function expects
    #[error("Invalid arguments to {function}: {message}")]
    InvalidArguments { function: String, message: String },

    /// Invalid function call
    #[error("Invalid function call: {0}")]
    InvalidFunctionCall(String),

    /// Division or modulo by zero
    #[error("Math error: division by zero")]
    DivisionByZero,

    /// Stack overflow
    #[error("Stack overflow")]
    StackOverflow,
}

impl ScriptError {
    pub fn invalid_args(function: &str, message: impl Into<String>) -> Self {
        ScriptError::InvalidArguments {
            function: function.to_string(),
            message: message.into(),
        }
    }
}

impl From<ScriptError> for GridScriptError {
    fn from(err: ScriptError) -> Self {
        GridScriptError::Runtime(err.to_string())
    }
}

/// Result type for script runtime operations
pub type Result<T> = std::result::Result<T, ScriptError>;

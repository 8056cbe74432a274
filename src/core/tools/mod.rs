//! Tool dispatch for model-issued function calls.

pub mod builtin;
pub mod registry;

use thiserror::Error;

pub use builtin::{BUILTIN_TOOL_NAMES, DEFAULT_DECLARED_TOOLS, builtin_registry, register_builtin_tools};
pub use registry::{
    FAILED_TOOL_ACK, ToolCall, ToolContext, ToolEnvironment, ToolHandlerFn, ToolRegistry,
    UNKNOWN_TOOL_ACK,
};

/// Errors raised by tool handlers.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Arguments did not match the tool's schema
    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    /// A collaborator the tool needs is not configured
    #[error("Tool unavailable: {0}")]
    Unavailable(String),

    /// The side effect failed
    #[error("Tool failed: {0}")]
    Failed(String),
}

/// Result type for tool handlers.
pub type ToolResult<T> = Result<T, ToolError>;

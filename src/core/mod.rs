pub mod realtime;
pub mod relay;
pub mod session;
pub mod telephony;
pub mod tools;

// Re-export commonly used types for convenience
pub use realtime::{
    BaseRealtime, BoxedRealtime, ClientEvent, OpenAIRealtime, RealtimeConfig, RealtimeError,
    RealtimeProvider, RealtimeResult, ServerEvent, create_realtime_provider,
    get_supported_realtime_providers,
};

pub use relay::{PendingToolCall, RelayAction, RelayEngine, ToolOutcome};

pub use session::{CallSession, Interruption, MARK_NAME};

pub use telephony::{
    CallTransfer, TelephonyError, TelephonyIncoming, TelephonyOutgoing, TelephonyResult,
    TwilioCallTransfer,
};

pub use tools::{ToolCall, ToolContext, ToolEnvironment, ToolError, ToolRegistry, ToolResult};

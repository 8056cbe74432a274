//! Tool Registry
//!
//! Maps tool names to handlers and their declared schemas. The relay engine
//! dispatches every completed function-call item through the registry and
//! always receives an acknowledgement string back, whatever the handler did.
//!
//! # Architecture
//!
//! The registry uses DashMap for concurrent lookup so a single instance can be
//! shared by every call through an `Arc`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use tracing::{debug, error, warn};

use super::{ToolError, ToolResult};
use crate::core::realtime::{ConversationItem, FunctionDefinition, ToolDefinition};
use crate::core::telephony::CallTransfer;

/// Acknowledgement sent back for a tool name with no handler.
pub const UNKNOWN_TOOL_ACK: &str = "That action is not available right now.";

/// Acknowledgement sent back when a handler fails or times out.
pub const FAILED_TOOL_ACK: &str = "Sorry, I wasn't able to complete that just now.";

/// Upper bound on a single handler invocation.
const HANDLER_TIMEOUT: Duration = Duration::from_secs(5);

/// Handler function type for tools.
///
/// Takes the call and its per-call context, returns a future resolving to the
/// acknowledgement string fed back to the model.
pub type ToolHandlerFn = Arc<
    dyn Fn(ToolCall, ToolContext) -> Pin<Box<dyn Future<Output = ToolResult<String>> + Send>>
        + Send
        + Sync,
>;

/// A completed function-call request from the model.
#[derive(Debug, Clone)]
pub struct ToolCall {
    /// Correlates the output with the request
    pub call_id: String,
    /// Tool name
    pub name: String,
    /// Parsed arguments; `Null` when the model sent unparseable JSON
    pub arguments: Value,
    /// Conversation item that carried the request
    pub item_id: Option<String>,
}

impl ToolCall {
    /// Build a call from a function-call conversation item.
    ///
    /// Returns `None` if the item is not a function call or lacks a call ID.
    pub fn from_item(item: &ConversationItem) -> Option<Self> {
        if !item.is_function_call() {
            return None;
        }
        let call_id = item.call_id.clone().filter(|id| !id.is_empty())?;
        let name = item.name.clone().unwrap_or_default();

        let arguments = match item.arguments.as_deref() {
            None | Some("") => Value::Null,
            Some(raw) => serde_json::from_str(raw).unwrap_or_else(|e| {
                warn!(tool = %name, raw, "Unparseable tool arguments: {}", e);
                Value::Null
            }),
        };

        Some(Self {
            call_id,
            name,
            arguments,
            item_id: item.id.clone(),
        })
    }

    /// Deserialize the arguments into a handler-specific record.
    pub fn parse_arguments<T: serde::de::DeserializeOwned + Default>(&self) -> ToolResult<T> {
        if self.arguments.is_null() {
            return Ok(T::default());
        }
        serde_json::from_value(self.arguments.clone())
            .map_err(|e| ToolError::InvalidArguments(format!("{}: {}", self.name, e)))
    }
}

/// Process-wide collaborators available to tool handlers.
#[derive(Clone, Default)]
pub struct ToolEnvironment {
    /// Live call transfer, when configured
    pub transfer: Option<Arc<dyn CallTransfer>>,
    /// Number calls are transferred to
    pub transfer_destination: Option<String>,
}

impl std::fmt::Debug for ToolEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolEnvironment")
            .field("transfer", &self.transfer.is_some())
            .field("transfer_destination", &self.transfer_destination)
            .finish()
    }
}

/// Per-call context handed to a handler.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    /// Identifier of the phone call the tool was invoked from
    pub call_sid: Option<String>,
    /// Shared collaborators
    pub env: ToolEnvironment,
}

struct ToolEntry {
    definition: FunctionDefinition,
    handler: ToolHandlerFn,
}

/// Registry of tool handlers keyed by name.
#[derive(Default)]
pub struct ToolRegistry {
    tools: DashMap<String, ToolEntry>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. Replaces any handler already registered under the
    /// definition's name.
    pub fn register<F, Fut>(&self, definition: FunctionDefinition, handler: F)
    where
        F: Fn(ToolCall, ToolContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ToolResult<String>> + Send + 'static,
    {
        let handler: ToolHandlerFn = Arc::new(move |call, ctx| Box::pin(handler(call, ctx)));
        let name = definition.name.clone();
        if self
            .tools
            .insert(name.clone(), ToolEntry { definition, handler })
            .is_some()
        {
            warn!(tool = %name, "Replaced existing tool handler");
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Registered tool names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Schema of one registered tool.
    pub fn definition(&self, name: &str) -> Option<FunctionDefinition> {
        self.tools.get(name).map(|e| e.definition.clone())
    }

    /// Tool definitions to declare to the model, in the order given.
    ///
    /// Names without a registered handler are skipped.
    pub fn definitions_for(&self, declared: &[String]) -> Vec<ToolDefinition> {
        declared
            .iter()
            .filter_map(|name| {
                let def = self.definition(name);
                if def.is_none() {
                    warn!(tool = %name, "Declared tool has no handler");
                }
                def
            })
            .map(ToolDefinition::function)
            .collect()
    }

    /// Invoke the handler for `call` and return the acknowledgement.
    ///
    /// Never fails: unknown tools, handler errors and timeouts each map to a
    /// fallback acknowledgement so the model is never left waiting.
    pub async fn dispatch(&self, call: ToolCall, ctx: ToolContext) -> String {
        // Clone the handler out so no map guard is held across the await
        let handler = self.tools.get(&call.name).map(|e| e.handler.clone());
        let Some(handler) = handler else {
            warn!(tool = %call.name, call_id = %call.call_id, "Unknown tool requested");
            return UNKNOWN_TOOL_ACK.to_string();
        };

        let name = call.name.clone();
        let call_id = call.call_id.clone();
        debug!(tool = %name, call_id = %call_id, arguments = %call.arguments, "Dispatching tool");

        match tokio::time::timeout(HANDLER_TIMEOUT, handler(call, ctx)).await {
            Ok(Ok(ack)) => ack,
            Ok(Err(e)) => {
                error!(tool = %name, call_id = %call_id, "Tool handler failed: {}", e);
                FAILED_TOOL_ACK.to_string()
            }
            Err(_) => {
                error!(tool = %name, call_id = %call_id, "Tool handler timed out");
                FAILED_TOOL_ACK.to_string()
            }
        }
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    fn definition(name: &str) -> FunctionDefinition {
        FunctionDefinition {
            name: name.to_string(),
            description: Some(format!("{name} tool")),
            parameters: Some(json!({"type": "object", "properties": {}})),
        }
    }

    fn call(name: &str, arguments: Value) -> ToolCall {
        ToolCall {
            call_id: "c1".to_string(),
            name: name.to_string(),
            arguments,
            item_id: None,
        }
    }

    #[tokio::test]
    async fn test_dispatch_registered_tool() {
        let registry = ToolRegistry::new();
        registry.register(definition("echo"), |call, _ctx| async move {
            Ok(format!("echo {}", call.arguments["word"].as_str().unwrap_or("")))
        });

        let ack = registry
            .dispatch(call("echo", json!({"word": "hi"})), ToolContext::default())
            .await;
        assert_eq!(ack, "echo hi");
    }

    #[tokio::test]
    async fn test_unknown_tool_gets_fallback_ack() {
        let registry = ToolRegistry::new();
        let ack = registry
            .dispatch(call("nope", Value::Null), ToolContext::default())
            .await;
        assert_eq!(ack, UNKNOWN_TOOL_ACK);
    }

    #[tokio::test]
    async fn test_failing_handler_gets_fallback_ack() {
        let registry = ToolRegistry::new();
        registry.register(definition("broken"), |_call, _ctx| async move {
            Err(ToolError::Failed("downstream unavailable".to_string()))
        });

        let ack = registry
            .dispatch(call("broken", Value::Null), ToolContext::default())
            .await;
        assert_eq!(ack, FAILED_TOOL_ACK);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_handler_times_out() {
        let registry = ToolRegistry::new();
        registry.register(definition("slow"), |_call, _ctx| async move {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("late".to_string())
        });

        let ack = registry
            .dispatch(call("slow", Value::Null), ToolContext::default())
            .await;
        assert_eq!(ack, FAILED_TOOL_ACK);
    }

    #[test]
    fn test_definitions_for_skips_unregistered() {
        let registry = ToolRegistry::new();
        registry.register(definition("a"), |_c, _x| async { Ok(String::new()) });
        registry.register(definition("b"), |_c, _x| async { Ok(String::new()) });

        let declared = vec!["b".to_string(), "missing".to_string(), "a".to_string()];
        let defs = registry.definitions_for(&declared);
        let names: Vec<_> = defs.iter().map(|d| d.function.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert!(defs.iter().all(|d| d.tool_type == "function"));
        assert_eq!(registry.names(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_tool_call_from_item() {
        let item = ConversationItem {
            id: Some("item_1".to_string()),
            item_type: "function_call".to_string(),
            call_id: Some("c1".to_string()),
            name: Some("addToDNC".to_string()),
            arguments: Some(r#"{"phone":"+15550100"}"#.to_string()),
            ..Default::default()
        };
        let call = ToolCall::from_item(&item).unwrap();
        assert_eq!(call.call_id, "c1");
        assert_eq!(call.name, "addToDNC");
        assert_eq!(call.arguments["phone"], "+15550100");
        assert_eq!(call.item_id.as_deref(), Some("item_1"));
    }

    #[test]
    fn test_tool_call_from_non_function_item() {
        let item = ConversationItem {
            item_type: "message".to_string(),
            ..Default::default()
        };
        assert!(ToolCall::from_item(&item).is_none());

        let missing_id = ConversationItem {
            item_type: "function_call".to_string(),
            name: Some("addToDNC".to_string()),
            ..Default::default()
        };
        assert!(ToolCall::from_item(&missing_id).is_none());
    }

    #[test]
    fn test_malformed_arguments_become_null() {
        let item = ConversationItem {
            item_type: "function_call".to_string(),
            call_id: Some("c1".to_string()),
            name: Some("addToDNC".to_string()),
            arguments: Some("{phone:".to_string()),
            ..Default::default()
        };
        let call = ToolCall::from_item(&item).unwrap();
        assert!(call.arguments.is_null());

        #[derive(Debug, Default, Deserialize)]
        struct Args {
            phone: Option<String>,
        }
        let args: Args = call.parse_arguments().unwrap();
        assert!(args.phone.is_none());
    }

    #[test]
    fn test_parse_arguments_type_mismatch() {
        #[derive(Debug, Default, Deserialize)]
        struct Args {
            #[allow(dead_code)]
            phone: Option<String>,
        }
        let call = call("addToDNC", json!({"phone": 42}));
        assert!(matches!(
            call.parse_arguments::<Args>(),
            Err(ToolError::InvalidArguments(_))
        ));
    }
}

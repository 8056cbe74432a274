//! Built-in tool handlers.
//!
//! The business actions behind these tools live outside the gateway; each
//! handler records the request and acknowledges it. `transferToAgent` is the
//! exception: it hands the live call to [`CallTransfer`] in a background task.
//!
//! [`CallTransfer`]: crate::core::telephony::CallTransfer

use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use super::registry::{ToolCall, ToolContext, ToolRegistry};
use super::{ToolError, ToolResult};
use crate::core::realtime::FunctionDefinition;

pub const SCHEDULE_CALLBACK: &str = "scheduleCallback";
pub const ADD_TO_DNC: &str = "addToDNC";
pub const FIND_HISTORY: &str = "findHistory";
pub const MERGE_CALLS: &str = "mergeCalls";
pub const TRANSFER_TO_SPECIALIST: &str = "transferToSpecialist";
pub const TRANSFER_TO_AGENT: &str = "transferToAgent";

/// Every tool registered by [`register_builtin_tools`].
pub const BUILTIN_TOOL_NAMES: [&str; 6] = [
    SCHEDULE_CALLBACK,
    ADD_TO_DNC,
    FIND_HISTORY,
    MERGE_CALLS,
    TRANSFER_TO_SPECIALIST,
    TRANSFER_TO_AGENT,
];

/// Tools declared to the model unless configured otherwise.
pub const DEFAULT_DECLARED_TOOLS: [&str; 2] = [SCHEDULE_CALLBACK, ADD_TO_DNC];

const PHONE_DESCRIPTION: &str = "the customer's phone number";
const SID_DESCRIPTION: &str = "the current call SID";

#[derive(Debug, Default, Deserialize)]
struct CallbackArgs {
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    time: Option<String>,
    #[serde(default)]
    date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PhoneArgs {
    #[serde(default)]
    phone: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SidArgs {
    #[serde(default)]
    sid: Option<String>,
}

fn string_property(description: &str) -> serde_json::Value {
    json!({ "type": "string", "description": description })
}

fn definition(name: &str, description: &str, properties: &[(&str, &str)]) -> FunctionDefinition {
    let props: serde_json::Map<String, serde_json::Value> = properties
        .iter()
        .map(|(field, desc)| (field.to_string(), string_property(desc)))
        .collect();
    let required: Vec<&str> = properties.iter().map(|(field, _)| *field).collect();

    FunctionDefinition {
        name: name.to_string(),
        description: Some(description.to_string()),
        parameters: Some(json!({
            "type": "object",
            "properties": props,
            "required": required,
        })),
    }
}

async fn schedule_callback(call: ToolCall, ctx: ToolContext) -> ToolResult<String> {
    let args: CallbackArgs = call.parse_arguments()?;
    info!(
        call_sid = ctx.call_sid.as_deref().unwrap_or_default(),
        phone = args.phone.as_deref().unwrap_or_default(),
        time = args.time.as_deref().unwrap_or_default(),
        date = args.date.as_deref().unwrap_or_default(),
        "Scheduling callback"
    );
    Ok("Callback Scheduled".to_string())
}

async fn add_to_dnc(call: ToolCall, ctx: ToolContext) -> ToolResult<String> {
    let args: PhoneArgs = call.parse_arguments()?;
    info!(
        call_sid = ctx.call_sid.as_deref().unwrap_or_default(),
        phone = args.phone.as_deref().unwrap_or_default(),
        "Adding to do-not-call list"
    );
    Ok("Added to DNC".to_string())
}

async fn find_history(call: ToolCall, _ctx: ToolContext) -> ToolResult<String> {
    let args: PhoneArgs = call.parse_arguments()?;
    info!(phone = args.phone.as_deref().unwrap_or_default(), "Looking up history");
    Ok(
        "Right here, I'm pulling up your home loan history and current loan balance."
            .to_string(),
    )
}

async fn merge_calls(call: ToolCall, ctx: ToolContext) -> ToolResult<String> {
    let args: SidArgs = call.parse_arguments()?;
    info!(
        call_sid = ctx.call_sid.as_deref().or(args.sid.as_deref()).unwrap_or_default(),
        "Merging calls"
    );
    Ok("Right here, merge the calls".to_string())
}

async fn transfer_to_specialist(call: ToolCall, ctx: ToolContext) -> ToolResult<String> {
    let args: SidArgs = call.parse_arguments()?;
    info!(
        call_sid = ctx.call_sid.as_deref().or(args.sid.as_deref()).unwrap_or_default(),
        "Transferring to specialist"
    );
    Ok("Right here, transfer to specialist".to_string())
}

async fn transfer_to_agent(call: ToolCall, ctx: ToolContext) -> ToolResult<String> {
    let args: SidArgs = call.parse_arguments()?;

    // The call the relay is serving wins over whatever SID the model echoed
    let call_sid = ctx
        .call_sid
        .or(args.sid)
        .filter(|sid| !sid.is_empty())
        .ok_or_else(|| ToolError::Unavailable("no call SID for this call".to_string()))?;
    let transfer = ctx
        .env
        .transfer
        .ok_or_else(|| ToolError::Unavailable("call transfer is not configured".to_string()))?;
    let destination = ctx
        .env
        .transfer_destination
        .filter(|d| !d.trim().is_empty())
        .ok_or_else(|| ToolError::Unavailable("no transfer destination".to_string()))?;

    info!(call_sid = %call_sid, "Transferring caller to an agent");
    tokio::spawn(async move {
        if let Err(e) = transfer.transfer_call(&call_sid, &destination).await {
            error!(call_sid = %call_sid, "Error initiating transfer: {}", e);
        }
    });

    Ok("I understand you'd like to speak with a human agent. I'm transferring you now.".to_string())
}

/// Register every built-in tool.
pub fn register_builtin_tools(registry: &ToolRegistry) {
    registry.register(
        definition(
            SCHEDULE_CALLBACK,
            "Schedules a callback with the customer. Make sure you ask for the time and date they would like to be called back.",
            &[
                ("phone", PHONE_DESCRIPTION),
                ("time", "the time the customer would like to be called back"),
                ("date", "the date the customer would like to be called back"),
            ],
        ),
        schedule_callback,
    );
    registry.register(
        definition(
            ADD_TO_DNC,
            "Adds the customer to the do not call list. Make sure you ask for their phone number before adding them.",
            &[("phone", PHONE_DESCRIPTION)],
        ),
        add_to_dnc,
    );
    registry.register(
        definition(
            FIND_HISTORY,
            "Pulls up the customer's home loan history and current loan balance",
            &[("phone", PHONE_DESCRIPTION)],
        ),
        find_history,
    );
    registry.register(
        definition(
            MERGE_CALLS,
            "Merges the customer call with the specialist call",
            &[("sid", SID_DESCRIPTION)],
        ),
        merge_calls,
    );
    registry.register(
        definition(
            TRANSFER_TO_SPECIALIST,
            "completes the call and transfers the caller to a specialist. ONLY USE THIS IF THE CALLER IS INTERESTED IN LEARNING MORE ABOUT HOME SECURITY SOLUTIONS",
            &[("sid", SID_DESCRIPTION)],
        ),
        transfer_to_specialist,
    );
    registry.register(
        definition(
            TRANSFER_TO_AGENT,
            "transfers the caller to an agent. typically in the event that they are getting really frustrated and need to be transferred to a human. ONLY USE THIS IF THE USER IS FRUSTRATED",
            &[("sid", SID_DESCRIPTION)],
        ),
        transfer_to_agent,
    );
}

/// A registry holding all built-in tools.
pub fn builtin_registry() -> ToolRegistry {
    let registry = ToolRegistry::new();
    register_builtin_tools(&registry);
    registry
}

//! MCP `ServerHandler` exposing [`TimerRegistry`] as tools.

use rmcp::{
    ServerHandler,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::*,
    schemars, tool, tool_handler, tool_router,
};

use crate::internal::mcp::timer::{TimerError, TimerRegistry};

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct StartTimerParams {
    /// Hours for the timer duration.
    #[serde(default)]
    pub hours: u64,
    /// Minutes for the timer duration.
    #[serde(default)]
    pub minutes: u64,
    /// Seconds for the timer duration.
    #[serde(default)]
    pub seconds: u64,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct CancelTimerParams {
    /// ID returned by `start_timer`.
    pub timer_id: String,
}

#[derive(Debug, Default, serde::Deserialize, schemars::JsonSchema)]
pub struct ListTimersParams {}

#[derive(Clone)]
pub struct TimerMcpServer {
    pub registry: TimerRegistry,
    tool_router: ToolRouter<TimerMcpServer>,
}

impl Default for TimerMcpServer {
    fn default() -> Self {
        Self::new(TimerRegistry::new())
    }
}

fn to_error(e: TimerError) -> ErrorData {
    ErrorData::invalid_params(e.to_string(), None)
}

fn json_text<T: serde::Serialize>(value: &T) -> Result<CallToolResult, ErrorData> {
    let text =
        serde_json::to_string(value).map_err(|e| ErrorData::internal_error(e.to_string(), None))?;
    Ok(CallToolResult::success(vec![Content::text(text)]))
}

#[tool_router]
impl TimerMcpServer {
    pub fn new(registry: TimerRegistry) -> Self {
        Self {
            registry,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Start a countdown timer")]
    pub async fn start_timer(
        &self,
        Parameters(params): Parameters<StartTimerParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let started = self
            .registry
            .start(params.hours, params.minutes, params.seconds)
            .map_err(to_error)?;
        json_text(&serde_json::json!({
            "timer_id": started.timer_id,
            "message": format!("Timer started for {} seconds.", started.seconds),
        }))
    }

    #[tool(description = "Cancel an active timer")]
    pub async fn cancel_timer(
        &self,
        Parameters(params): Parameters<CancelTimerParams>,
    ) -> Result<CallToolResult, ErrorData> {
        self.registry.cancel(&params.timer_id).map_err(to_error)?;
        json_text(&serde_json::json!({
            "timer_id": params.timer_id,
            "message": "Timer cancelled.",
        }))
    }

    #[tool(description = "List active timers with their remaining seconds")]
    pub async fn list_timers(
        &self,
        Parameters(_params): Parameters<ListTimersParams>,
    ) -> Result<CallToolResult, ErrorData> {
        json_text(&serde_json::json!({ "active_timers": self.registry.list() }))
    }
}

#[tool_handler]
impl ServerHandler for TimerMcpServer {
    fn get_info(&self) -> ServerInfo {
        let mut server_info = Implementation::default();
        server_info.name = "solo-timer".to_string();
        server_info.version = env!("CARGO_PKG_VERSION").to_string();

        let mut info = ServerInfo::default();
        info.protocol_version = ProtocolVersion::V_2024_11_05;
        info.capabilities = ServerCapabilities::builder().enable_tools().build();
        info.server_info = server_info;
        info.instructions =
            Some("Manages timers: start, cancel, and list active timers.".to_string());
        info
    }
}

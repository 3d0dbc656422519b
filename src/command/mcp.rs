use clap::Subcommand;
use rmcp::{
    service::serve_server,
    transport::{async_rw::AsyncRwTransport, io::stdio},
};

use crate::{
    error::SoloError,
    internal::mcp::{server::TimerMcpServer, timer::TimerRegistry},
};

#[derive(Subcommand, Debug)]
pub enum McpCmds {
    /// Serve the countdown-timer tools over stdio
    Timer,
}

pub async fn execute(cmd: McpCmds) -> Result<(), SoloError> {
    match cmd {
        McpCmds::Timer => serve_timer().await,
    }
}

async fn serve_timer() -> Result<(), SoloError> {
    let server = TimerMcpServer::new(TimerRegistry::new());
    let (stdin, stdout) = stdio();
    let transport = AsyncRwTransport::new_server(stdin, stdout);

    match serve_server(server, transport).await {
        Ok(running) => {
            if let Err(e) = running.waiting().await {
                eprintln!("MCP timer server error: {e}");
                return Err(SoloError::Exit(1));
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("Failed to start MCP timer server: {e}");
            Err(SoloError::Exit(1))
        }
    }
}

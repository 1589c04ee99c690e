//! Line-oriented control surface
//!
//! One command per input line (`start`, `stop`, `status`); one JSON
//! [`ControlResponse`] per output line.

use anyhow::Result;
use moderation::{ControlResponse, ReportWatcher};
use std::str::FromStr;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

/// A control command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    /// Start watching
    Start,
    /// Stop watching
    Stop,
    /// Report status
    Status,
}

impl FromStr for ControlCommand {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" => Ok(ControlCommand::Start),
            "stop" => Ok(ControlCommand::Stop),
            "status" => Ok(ControlCommand::Status),
            other => Err(format!("unknown command: {}", other)),
        }
    }
}

/// Run one command against the watcher
pub async fn execute(watcher: &ReportWatcher, command: ControlCommand) -> moderation::Result<ControlResponse> {
    match command {
        ControlCommand::Start => watcher.start().await,
        ControlCommand::Stop => watcher.stop().await,
        ControlCommand::Status => watcher.status().await,
    }
}

/// Answer commands from `input` until it ends
pub async fn serve<R, W>(watcher: &ReportWatcher, input: R, mut output: W) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = BufReader::new(input).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let response = match line.parse::<ControlCommand>() {
            Ok(command) => execute(watcher, command).await?,
            Err(message) => {
                tracing::warn!("{}", message);
                let mut response = watcher.status().await?;
                response.success = false;
                response.message = message;
                response
            }
        };

        let mut json = serde_json::to_string(&response)?;
        json.push('\n');
        output.write_all(json.as_bytes()).await?;
        output.flush().await?;
    }

    Ok(())
}

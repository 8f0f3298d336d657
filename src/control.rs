//! Line-oriented control channel for a running crawl service
//!
//! Each input line is one command (`trigger`, `status`, `stats`, `projects`,
//! `quit`); each reply is one JSON object on its own line.

use crate::crawler::CrawlHandle;
use crate::store::IngestionStore;
use crate::types::{CrawlStatus, ProjectSummary, StoreTotals};
use anyhow::{Context, Result};
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

/// Commands accepted on the control channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Trigger,
    Status,
    Stats,
    Projects,
    Help,
    Quit,
}

impl FromStr for ControlCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trigger" | "crawl" => Ok(Self::Trigger),
            "status" => Ok(Self::Status),
            "stats" => Ok(Self::Stats),
            "projects" => Ok(Self::Projects),
            "help" => Ok(Self::Help),
            "quit" | "exit" => Ok(Self::Quit),
            other => Err(format!("Unknown command: {}", other)),
        }
    }
}

/// One reply line
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlResponse {
    Trigger { accepted: bool },
    Status(CrawlStatus),
    Stats(StoreTotals),
    Projects { projects: Vec<ProjectSummary> },
    Help { commands: Vec<&'static str> },
    Error { message: String },
    Bye,
}

/// Serves control commands against a crawl handle and the store
pub struct ControlServer {
    handle: CrawlHandle,
    store: Arc<dyn IngestionStore>,
}

impl ControlServer {
    pub fn new(handle: CrawlHandle, store: Arc<dyn IngestionStore>) -> Self {
        Self { handle, store }
    }

    /// Execute a single command
    pub async fn execute(&self, command: ControlCommand) -> ControlResponse {
        match command {
            ControlCommand::Trigger => ControlResponse::Trigger {
                accepted: self.handle.trigger(),
            },
            ControlCommand::Status => ControlResponse::Status(self.handle.status().await),
            ControlCommand::Stats => match self.store.totals().await {
                Ok(totals) => ControlResponse::Stats(totals),
                Err(e) => ControlResponse::Error {
                    message: e.to_string(),
                },
            },
            ControlCommand::Projects => match self.store.list_projects().await {
                Ok(projects) => ControlResponse::Projects { projects },
                Err(e) => ControlResponse::Error {
                    message: e.to_string(),
                },
            },
            ControlCommand::Help => ControlResponse::Help {
                commands: vec!["trigger", "status", "stats", "projects", "help", "quit"],
            },
            ControlCommand::Quit => ControlResponse::Bye,
        }
    }

    /// Read commands until end of input, `quit`, or cancellation
    ///
    /// Returns `true` when the peer asked to quit.
    pub async fn serve<R, W>(
        &self,
        reader: R,
        mut writer: W,
        cancel: &CancellationToken,
    ) -> Result<bool>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();

        loop {
            let line = tokio::select! {
                line = lines.next_line() => line.context("Failed to read control input")?,
                _ = cancel.cancelled() => return Ok(false),
            };

            let Some(line) = line else {
                tracing::debug!("Control input closed");
                return Ok(false);
            };

            if line.trim().is_empty() {
                continue;
            }

            let response = match line.parse::<ControlCommand>() {
                Ok(command) => {
                    tracing::debug!("Control command: {:?}", command);
                    self.execute(command).await
                }
                Err(message) => ControlResponse::Error { message },
            };

            let mut payload =
                serde_json::to_string(&response).context("Failed to serialize response")?;
            payload.push('\n');
            writer
                .write_all(payload.as_bytes())
                .await
                .context("Failed to write control response")?;
            writer.flush().await.context("Failed to flush control output")?;

            if response == ControlResponse::Bye {
                return Ok(true);
            }
        }
    }

    /// Serve on the process's stdin/stdout
    pub async fn serve_stdio(&self, cancel: &CancellationToken) -> Result<bool> {
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        self.serve(stdin, tokio::io::stdout(), cancel).await
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thin client over the daemon's Unix socket. Every call opens its own
//! connection — `hced` handles one request per connection, so there is no
//! long-lived session to manage here.

use std::path::PathBuf;
use std::time::Duration;

use hce_rpc::{read_response, write_request, ProtocolError, Request, Response, StreamFrame};
use thiserror::Error;
use tokio::net::UnixStream;

use crate::env;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("could not determine state directory")]
    NoStateDir,
    #[error("could not connect to the daemon: {0}")]
    Connect(#[source] std::io::Error),
    #[error("no daemon handshake token found")]
    NoToken,
    #[error("failed to spawn daemon: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("timed out waiting for a response")]
    Timeout,
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("unexpected response from daemon: {0}")]
    Rejected(String),
}

impl ClientError {
    /// True when the failure looks like "nothing is listening" rather than
    /// a protocol or I/O error against a live daemon.
    pub fn is_not_running(&self) -> bool {
        matches!(self, ClientError::NoStateDir | ClientError::Connect(_) | ClientError::NoToken)
    }
}

pub struct DaemonClient {
    stream: UnixStream,
}

impl DaemonClient {
    /// Opens the socket and performs the `Hello` handshake (§4.6) before
    /// returning, so every other method can assume it's talking to a daemon
    /// that has already accepted this connection's token.
    pub async fn connect() -> Result<Self, ClientError> {
        let socket_path = env::socket_path()?;
        let token = std::fs::read_to_string(env::token_path()?).map_err(|_| ClientError::NoToken)?;
        let mut stream = UnixStream::connect(&socket_path).await.map_err(ClientError::Connect)?;

        let hello = Request::Hello { version: env!("CARGO_PKG_VERSION").to_string(), token: token.trim().to_string() };
        write_request(&mut stream, &hello).await?;
        match read_response(&mut stream).await? {
            Response::Hello { .. } => Ok(Self { stream }),
            Response::Error { message } => Err(ClientError::Rejected(message)),
            other => Self::reject(other),
        }
    }

    /// Connects to a running daemon, spawning one in the background first if
    /// none is reachable.
    pub async fn connect_or_start() -> Result<Self, ClientError> {
        match Self::connect().await {
            Ok(client) => Ok(client),
            Err(e) if e.is_not_running() => {
                spawn_daemon()?;
                wait_for_socket().await
            }
            Err(e) => Err(e),
        }
    }

    async fn send(&mut self, request: &Request) -> Result<Response, ClientError> {
        write_request(&mut self.stream, request).await?;
        tokio::time::timeout(env::ipc_timeout(), read_response(&mut self.stream))
            .await
            .map_err(|_| ClientError::Timeout)?
            .map_err(ClientError::from)
    }

    fn reject<T>(response: Response) -> Result<T, ClientError> {
        Err(ClientError::Rejected(format!("{response:?}")))
    }

    pub async fn ping(&mut self) -> Result<(), ClientError> {
        match self.send(&Request::Ping).await? {
            Response::Pong => Ok(()),
            other => Self::reject(other),
        }
    }

    pub async fn status(&mut self) -> Result<hce_rpc::StatusSummary, ClientError> {
        match self.send(&Request::Status).await? {
            Response::Status(summary) => Ok(summary),
            other => Self::reject(other),
        }
    }

    pub async fn shutdown(&mut self, kill: bool) -> Result<(), ClientError> {
        match self.send(&Request::Shutdown { kill }).await? {
            Response::Ok | Response::ShuttingDown => Ok(()),
            other => Self::reject(other),
        }
    }

    pub async fn list_leases(&mut self) -> Result<Vec<hce_rpc::LeaseSummary>, ClientError> {
        match self.send(&Request::ListLeases).await? {
            Response::Leases(leases) => Ok(leases),
            other => Self::reject(other),
        }
    }

    pub async fn start_orchestration(
        &mut self,
        hook_event: hce_core::HookEvent,
        project_root: PathBuf,
        session_id: Option<String>,
    ) -> Result<hce_core::OrchestrationId, ClientError> {
        let request = Request::StartOrchestration { hook_event, project_root, session_id };
        match self.send(&request).await? {
            Response::OrchestrationStarted { orchestration_id } => Ok(orchestration_id),
            other => Self::reject(other),
        }
    }

    pub async fn end_orchestration(
        &mut self,
        orchestration_id: hce_core::OrchestrationId,
    ) -> Result<i32, ClientError> {
        match self.send(&Request::EndOrchestration { orchestration_id }).await? {
            Response::OrchestrationEnded { worst_exit_code, .. } => Ok(worst_exit_code),
            other => Self::reject(other),
        }
    }

    pub async fn query_orchestration(
        &mut self,
        orchestration_id: hce_core::OrchestrationId,
    ) -> Result<hce_rpc::OrchestrationSummary, ClientError> {
        match self.send(&Request::QueryOrchestration { orchestration_id }).await? {
            Response::OrchestrationState(summary) => Ok(summary),
            other => Self::reject(other),
        }
    }

    /// Runs `hooks` as one fan-out group, relaying each streamed line to
    /// `on_frame` as it arrives, and returns the worst exit code seen.
    pub async fn execute_hooks(
        &mut self,
        orchestration_id: hce_core::OrchestrationId,
        hooks: Vec<hce_rpc::HookToRun>,
        fail_fast: Option<bool>,
        mut on_frame: impl FnMut(StreamFrame),
    ) -> Result<i32, ClientError> {
        let request = Request::ExecuteHooks { orchestration_id, hooks, fail_fast };
        write_request(&mut self.stream, &request).await?;

        let mut worst_exit_code = 0;
        loop {
            let response = read_response(&mut self.stream).await?;
            match response {
                Response::Stream(frame) => {
                    if let StreamFrame::Complete { exit_code, .. } = &frame {
                        worst_exit_code = worst_exit_code.max(*exit_code);
                    }
                    on_frame(frame);
                }
                Response::Ok => return Ok(worst_exit_code),
                Response::Error { message } => return Err(ClientError::Rejected(message)),
                other => return Self::reject(other),
            }
        }
    }
}

fn spawn_daemon() -> Result<(), ClientError> {
    let path = find_hced_binary();
    std::process::Command::new(path).spawn().map_err(ClientError::Spawn)?;
    Ok(())
}

async fn wait_for_socket() -> Result<DaemonClient, ClientError> {
    let deadline = tokio::time::Instant::now() + env::start_timeout();
    loop {
        match DaemonClient::connect().await {
            Ok(client) => return Ok(client),
            Err(e) if e.is_not_running() && tokio::time::Instant::now() < deadline => {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            Err(e) => return Err(e),
        }
    }
}

fn find_hced_binary() -> PathBuf {
    if let Some(dir) = std::env::current_exe().ok().and_then(|exe| exe.parent().map(PathBuf::from)) {
        let sibling: PathBuf = dir.join("hced");
        if sibling.exists() {
            return sibling;
        }
    }
    PathBuf::from("hced")
}

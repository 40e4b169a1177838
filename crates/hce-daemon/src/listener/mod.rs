// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for handling socket I/O.
//!
//! The listener runs in a spawned task, accepting connections and
//! dispatching each `Request` against the shared [`ListenCtx`] without
//! blocking other connections. Streaming requests (`ExecuteHooks`,
//! `DispatchSingleHook`) write a sequence of `Response::Stream` frames
//! followed by a terminal `Response::Ok` on the same connection.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use hce_core::{Fingerprint, SystemClock};
use hce_engine::{Coordinator, Frame, SlotManager};
use hce_rpc::{
    read_request, write_response, HookToRun, LeaseSummary, OrchestrationSummary, ProtocolError,
    Request, Response, StatusSummary, StreamFrame,
};
use hce_storage::Store;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UnixListener;
use tokio::sync::Notify;
use tracing::{debug, error, info};

use crate::env::ipc_timeout;

pub(crate) struct ListenCtx {
    pub store: Store,
    pub slots: Arc<SlotManager<SystemClock>>,
    pub coordinator: Arc<Coordinator<SystemClock>>,
    pub start_time: Instant,
    pub shutdown: Arc<Notify>,
    /// Shared secret written to `daemon.token` at startup; every connection
    /// must present it in its opening `Hello` before anything else is read.
    pub token: String,
}

pub(crate) struct Listener {
    unix: UnixListener,
    ctx: Arc<ListenCtx>,
}

impl Listener {
    pub fn new(unix: UnixListener, ctx: Arc<ListenCtx>) -> Self {
        Self { unix, ctx }
    }

    pub async fn run(self) {
        loop {
            match self.unix.accept().await {
                Ok((stream, _)) => {
                    let ctx = Arc::clone(&self.ctx);
                    tokio::spawn(async move {
                        let (reader, writer) = stream.into_split();
                        if let Err(e) = handle_connection(reader, writer, &ctx).await {
                            log_connection_error(e);
                        }
                    });
                }
                Err(e) => error!("unix accept error: {}", e),
            }
        }
    }
}

fn log_connection_error(e: ProtocolError) {
    match e {
        ProtocolError::Io(ref io) if io.kind() == std::io::ErrorKind::UnexpectedEof => {
            debug!("client disconnected")
        }
        _ => error!("connection error: {}", e),
    }
}

async fn handle_connection<R, W>(mut reader: R, mut writer: W, ctx: &ListenCtx) -> Result<(), ProtocolError>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    if !handshake(&mut reader, &mut writer, ctx).await? {
        return Ok(());
    }

    let request = tokio::time::timeout(ipc_timeout(), read_request(&mut reader))
        .await
        .map_err(|_| ProtocolError::Io(std::io::Error::new(std::io::ErrorKind::TimedOut, "read timed out")))??;

    if matches!(request, Request::Status) {
        debug!(?request, "received request");
    } else {
        info!(?request, "received request");
    }

    match request {
        Request::ExecuteHooks { orchestration_id, hooks, fail_fast } => {
            stream_hooks(ctx, orchestration_id, hooks, fail_fast, &mut writer).await
        }
        Request::DispatchSingleHook { orchestration_id, hook } => {
            stream_hooks(ctx, orchestration_id, vec![hook], Some(false), &mut writer).await
        }
        other => {
            let response = handle_request(other, ctx).await;
            write_response(&mut writer, &response).await
        }
    }
}

/// Reads the connection's opening frame and enforces the `Hello` handshake
/// (§4.6): any other first frame, or a token that doesn't match the one
/// written to `daemon.token` at startup, closes the connection with a
/// `Response::Error` instead of proceeding. Returns `Ok(true)` once the
/// handshake has succeeded and the caller should read the real request.
async fn handshake<R, W>(reader: &mut R, writer: &mut W, ctx: &ListenCtx) -> Result<bool, ProtocolError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let hello = tokio::time::timeout(ipc_timeout(), read_request(reader))
        .await
        .map_err(|_| ProtocolError::Io(std::io::Error::new(std::io::ErrorKind::TimedOut, "read timed out")))??;

    match hello {
        Request::Hello { version, token } if token == ctx.token => {
            write_response(writer, &Response::Hello { version: env!("CARGO_PKG_VERSION").to_string() }).await?;
            Ok(true)
        }
        Request::Hello { .. } => {
            write_response(writer, &Response::Error { message: "invalid token".to_string() }).await?;
            Ok(false)
        }
        _ => {
            write_response(writer, &Response::Error { message: "expected Hello handshake".to_string() }).await?;
            Ok(false)
        }
    }
}

async fn handle_request(request: Request, ctx: &ListenCtx) -> Response {
    match request {
        Request::Ping => Response::Pong,
        Request::Hello { version, .. } => Response::Hello { version },
        Request::Shutdown { .. } => {
            ctx.shutdown.notify_one();
            Response::ShuttingDown
        }
        Request::StartOrchestration { hook_event, project_root, session_id } => {
            match ctx.store.start_orchestration(session_id, hook_event, project_root) {
                Ok(orchestration_id) => Response::OrchestrationStarted { orchestration_id },
                Err(e) => Response::Error { message: e.to_string() },
            }
        }
        Request::EndOrchestration { orchestration_id } => match ctx.store.end_orchestration(orchestration_id) {
            Ok(()) => {
                let worst_exit_code =
                    ctx.store.get_orchestration(orchestration_id).map(|o| o.worst_exit_code).unwrap_or(0);
                Response::OrchestrationEnded { orchestration_id, worst_exit_code }
            }
            Err(e) => Response::Error { message: e.to_string() },
        },
        Request::QueryOrchestration { orchestration_id } => match ctx.store.get_orchestration(orchestration_id) {
            Some(orch) => {
                let invocation_count = ctx
                    .store
                    .snapshot_state()
                    .invocations
                    .values()
                    .filter(|inv| inv.orchestration_id == orchestration_id)
                    .count();
                Response::OrchestrationState(OrchestrationSummary {
                    orchestration_id,
                    worst_exit_code: orch.worst_exit_code,
                    is_terminal: orch.is_terminal(),
                    invocation_count,
                })
            }
            None => Response::Error { message: format!("no such orchestration: {orchestration_id}") },
        },
        Request::WaitForDeferred {
            orchestration_id,
            deferred_hook_id,
            env,
            env_whitelist,
            idle_timeout_ms,
            wall_timeout_ms,
        } => wait_for_deferred(ctx, orchestration_id, deferred_hook_id, env, env_whitelist, idle_timeout_ms, wall_timeout_ms).await,
        Request::RaiseMaxAttempts { session_or_project, plugin, hook_name, directory } => {
            let key = hce_core::attempt_key(&session_or_project, &plugin, &hook_name, &directory);
            match ctx.store.attempts_raise_max(key, 1) {
                Ok(()) => Response::Ok,
                Err(e) => Response::Error { message: e.to_string() },
            }
        }
        Request::AcquireSlot { directory, holder, wait_timeout_ms } => {
            match ctx.slots.acquire(directory, holder, Duration::from_secs(3600), Duration::from_millis(wait_timeout_ms)).await {
                Ok(_lease) => Response::Ok,
                Err(e) => Response::Error { message: e.to_string() },
            }
        }
        Request::ReleaseSlot { directory, holder } => match ctx.slots.release(directory, holder) {
            Ok(_) => Response::Ok,
            Err(e) => Response::Error { message: e.to_string() },
        },
        Request::ListLeases => {
            let leases = ctx
                .slots
                .active_leases()
                .into_iter()
                .map(|lease| LeaseSummary {
                    queue_depth: ctx.slots.queue_depth(&lease.directory),
                    directory: lease.directory.display().to_string(),
                    holder: lease.holder,
                    acquired_at_ms: lease.acquired_at_ms,
                    deadline_ms: lease.deadline_ms,
                })
                .collect();
            Response::Leases(leases)
        }
        Request::Status => {
            let state = ctx.store.snapshot_state();
            Response::Status(StatusSummary {
                version: env!("CARGO_PKG_VERSION").to_string(),
                uptime_ms: ctx.start_time.elapsed().as_millis() as u64,
                active_invocations: state.invocations.values().filter(|i| !i.status.is_terminal()).count(),
                active_orchestrations: state.orchestrations.values().filter(|o| !o.is_terminal()).count(),
            })
        }
        Request::ExecuteHooks { .. } | Request::DispatchSingleHook { .. } => {
            unreachable!("streamed by handle_connection before reaching handle_request")
        }
    }
}

/// Dispatches `hooks` as one fan-out group and relays every frame as a
/// `Response::Stream`, finishing with `Response::Ok`.
async fn stream_hooks<W>(
    ctx: &ListenCtx,
    orchestration_id: hce_core::OrchestrationId,
    hooks: Vec<HookToRun>,
    fail_fast: Option<bool>,
    writer: &mut W,
) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    let fail_fast = fail_fast.unwrap_or(false);
    let requests =
        hooks.into_iter().map(|hook| to_dispatch_request(orchestration_id, hook)).collect::<Vec<_>>();

    let dispatched = match ctx.coordinator.dispatch_group(orchestration_id, requests, fail_fast).await {
        Ok(d) => d,
        Err(e) => {
            write_response(writer, &Response::Error { message: e.to_string() }).await?;
            return Ok(());
        }
    };

    for (invocation_id, mut rx) in dispatched {
        while let Some(frame) = rx.recv().await {
            let stream_frame = match frame {
                Frame::StdoutLine(line) => StreamFrame::Stdout { invocation_id, line },
                Frame::StderrLine(line) => StreamFrame::Stderr { invocation_id, line },
                Frame::Complete { exit_code, duration_ms, error } => {
                    StreamFrame::Complete { invocation_id, exit_code, cached: false, duration_ms, error }
                }
            };
            write_response(writer, &Response::Stream(stream_frame)).await?;
        }
    }

    write_response(writer, &Response::Ok).await
}

fn to_dispatch_request(orchestration_id: hce_core::OrchestrationId, hook: HookToRun) -> hce_engine::DispatchRequest {
    hce_engine::DispatchRequest {
        orchestration_id,
        plugin: hook.plugin,
        hook_name: hook.hook_name,
        directory: hook.directory.clone(),
        command: hook.command.clone(),
        env: hook.env,
        env_whitelist: hook.env_whitelist,
        idle_timeout: Duration::from_millis(hook.idle_timeout_ms),
        wall_timeout: Duration::from_millis(hook.wall_timeout_ms),
        slot_wait_timeout: Duration::from_millis(hook.wall_timeout_ms),
        stdin_payload: hook.stdin_payload.map(String::into_bytes),
        fingerprint: Fingerprint::from_segments([hook.command.as_bytes()]),
        deferrable: hook.deferrable,
        session_or_project: hook.directory.display().to_string(),
    }
}

async fn wait_for_deferred(
    ctx: &ListenCtx,
    orchestration_id: hce_core::OrchestrationId,
    deferred_hook_id: hce_core::DeferredHookId,
    env: HashMap<String, String>,
    env_whitelist: Vec<String>,
    idle_timeout_ms: u64,
    wall_timeout_ms: u64,
) -> Response {
    let Some(deferred) =
        ctx.store.deferred_list(orchestration_id).into_iter().find(|d| d.id == deferred_hook_id)
    else {
        return Response::Error { message: format!("no such deferred hook: {deferred_hook_id}") };
    };

    let request = hce_engine::DispatchRequest {
        orchestration_id,
        plugin: deferred.plugin.clone(),
        hook_name: deferred.hook_name.clone(),
        directory: deferred.directory.clone(),
        command: deferred.command.clone(),
        env,
        env_whitelist,
        idle_timeout: Duration::from_millis(idle_timeout_ms),
        wall_timeout: Duration::from_millis(wall_timeout_ms),
        slot_wait_timeout: Duration::from_millis(wall_timeout_ms),
        stdin_payload: None,
        fingerprint: Fingerprint::from_segments([deferred.command.as_bytes()]),
        deferrable: false,
        session_or_project: deferred.directory.display().to_string(),
    };

    let (_, mut rx) =
        match ctx.coordinator.dispatch(request, tokio_util::sync::CancellationToken::new()).await {
            Ok(r) => r,
            Err(e) => return Response::Error { message: e.to_string() },
        };

    let mut exit_code = 1;
    while let Some(frame) = rx.recv().await {
        if let Frame::Complete { exit_code: code, .. } = frame {
            exit_code = code;
        }
    }

    if exit_code == 0 {
        let _ = ctx.store.deferred_complete(deferred_hook_id);
    } else {
        let _ = ctx.store.deferred_fail(deferred_hook_id, format!("exit code {exit_code}"));
    }

    Response::DeferredResolved { deferred_hook_id, exit_code }
}

//! Background renewal loop.
//!
//! One task per started session: sleep until the renewal is due, extend
//! the session, store the new grant and go around again. The loop ends on
//! cancellation or on the first failed extension; there is no retry.

use std::sync::Arc;

use camlink_core::{ApiError, Clock, RenewalEvent, RenewalSink, Session, SessionApi, SessionGrant};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::{
    sync::{RwLock, watch},
    task::JoinHandle,
};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::RenewalSchedule;

/// Observable state of the renewal loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RenewalState {
    /// Not started yet.
    Idle,
    /// Waiting to extend at `fire_at`.
    Armed { fire_at: DateTime<Utc> },
    /// Extension call in flight.
    Firing,
    /// The last extension failed. The session runs until it expires.
    Unrenewed,
    /// Stopped before the session could be renewed again.
    Cancelled,
}

/// Everything the renewal task shares with its session manager.
pub(crate) struct RenewalContext<A> {
    pub(crate) id: Uuid,
    pub(crate) api: Arc<A>,
    pub(crate) session: Arc<RwLock<Session>>,
    pub(crate) schedule: RenewalSchedule,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) sink: Arc<dyn RenewalSink>,
    pub(crate) state: Arc<watch::Sender<RenewalState>>,
}

/// Handle to a running renewal task. Dropping it cancels the task.
pub(crate) struct RenewalHandle {
    guard: DropGuard,
    task: JoinHandle<()>,
}

impl RenewalHandle {
    /// Cancel the task and wait for it to finish.
    pub(crate) async fn cancel(self) {
        let Self { guard, task } = self;
        drop(guard);
        if let Err(e) = task.await {
            if e.is_panic() {
                error!("Renewal task panicked: {e}");
            }
        }
    }
}

/// Spawn the renewal loop for `ctx`.
pub(crate) fn spawn<A: SessionApi>(ctx: RenewalContext<A>) -> RenewalHandle {
    let token = CancellationToken::new();
    let task = tokio::spawn(run(ctx, token.clone()));
    RenewalHandle {
        guard: token.drop_guard(),
        task,
    }
}

async fn run<A: SessionApi>(ctx: RenewalContext<A>, cancel: CancellationToken) {
    let (scope, target) = {
        let session = ctx.session.read().await;
        (session.scope.clone(), session.target.clone())
    };

    loop {
        let (session_id, expires_at) = {
            let session = ctx.session.read().await;
            (session.session_id.clone(), session.expires_at)
        };

        let fire_at = ctx.schedule.fire_at(expires_at);
        let delay = ctx.schedule.delay_until(fire_at, ctx.clock.now());
        ctx.state.send_replace(RenewalState::Armed { fire_at });
        debug!(stream = %ctx.id, %session_id, %fire_at, ?delay, "Renewal armed");

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }

        ctx.state.send_replace(RenewalState::Firing);
        debug!(stream = %ctx.id, %session_id, "Extending session");

        // A cancelled extension is dropped and its result never applied.
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = ctx.api.extend_session(&scope, &target, &session_id) => result,
        };

        match result.and_then(check_grant) {
            Ok(grant) => {
                if grant.expires_at <= expires_at {
                    warn!(
                        stream = %ctx.id,
                        previous = %expires_at,
                        renewed = %grant.expires_at,
                        "Renewed session does not outlive the previous one"
                    );
                }
                ctx.session.write().await.apply(grant.clone());
                info!(
                    stream = %ctx.id,
                    previous = %session_id,
                    session_id = %grant.session_id,
                    expires_at = %grant.expires_at,
                    "Session renewed"
                );
                ctx.sink.report(RenewalEvent::Renewed {
                    previous_session_id: session_id,
                    session_id: grant.session_id,
                    expires_at: grant.expires_at,
                });
            }
            Err(err) => {
                error!(
                    stream = %ctx.id,
                    %session_id,
                    %expires_at,
                    "Session renewal failed, stream ends at expiry: {err}"
                );
                ctx.state.send_replace(RenewalState::Unrenewed);
                ctx.sink.report(RenewalEvent::Failed {
                    session_id,
                    expires_at,
                    error: err,
                });
                return;
            }
        }
    }

    let session_id = ctx.session.read().await.session_id.clone();
    debug!(stream = %ctx.id, %session_id, "Renewal cancelled");
    ctx.state.send_replace(RenewalState::Cancelled);
    ctx.sink.report(RenewalEvent::Cancelled { session_id });
}

fn check_grant(grant: SessionGrant) -> Result<SessionGrant, ApiError> {
    if grant.session_id.is_empty() {
        return Err(ApiError::RemoteSession("empty session id".into()));
    }
    Ok(grant)
}

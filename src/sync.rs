//! Remote profile mirroring.
//!
//! Local preference state is the source of truth. After every local save the
//! dashboard publishes a snapshot here; a background worker pushes the most
//! recent one to the remote profile. Snapshots that arrive while a push is in
//! flight coalesce, so the remote copy converges on the last write. Failures
//! are logged and dropped: they never reach the caller and never roll back
//! local state.

use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::preferences::UserPreferenceState;
use crate::remote::{GraphQlError, ProfileClient};
use crate::session::SessionIdentity;

/// Destination for preference snapshots.
pub trait ProfileMirror: Send + Sync + 'static {
    fn push(
        &self,
        identity: &SessionIdentity,
        state: &UserPreferenceState,
    ) -> impl Future<Output = Result<(), GraphQlError>> + Send;
}

impl ProfileMirror for ProfileClient {
    fn push(
        &self,
        identity: &SessionIdentity,
        state: &UserPreferenceState,
    ) -> impl Future<Output = Result<(), GraphQlError>> + Send {
        let client = self.clone();
        let identity = identity.clone();
        let state = state.clone();
        async move { client.push_preferences(&identity, &state).await }
    }
}

/// One snapshot to mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRequest {
    pub identity: SessionIdentity,
    pub state: UserPreferenceState,
}

// ============================================================================
// SyncHandle
// ============================================================================

/// Sending side of the mirror. Cheap to notify; never blocks on the network.
pub struct SyncHandle {
    tx: watch::Sender<Option<SyncRequest>>,
    worker: Option<JoinHandle<()>>,
}

impl SyncHandle {
    /// A handle with no worker. Notifications go nowhere; used when remote
    /// sync is switched off.
    pub fn disabled() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx, worker: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.worker.is_some()
    }

    /// Publish the latest snapshot, replacing any not yet pushed.
    pub fn notify(&self, identity: &SessionIdentity, state: &UserPreferenceState) {
        if self.worker.is_none() {
            return;
        }
        self.tx.send_replace(Some(SyncRequest {
            identity: identity.clone(),
            state: state.clone(),
        }));
    }

    /// Close the channel and wait for the worker to push whatever snapshot is
    /// still pending.
    pub async fn shutdown(self) {
        let Self { tx, worker } = self;
        drop(tx);
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                tracing::error!(error = %e, "Profile sync worker failed to join");
            }
        }
    }
}

/// Start the background worker. Must be called from within a Tokio runtime.
pub fn spawn_profile_sync<M: ProfileMirror>(mirror: M) -> SyncHandle {
    let (tx, rx) = watch::channel(None);
    let worker = tokio::spawn(run_worker(mirror, rx));
    SyncHandle {
        tx,
        worker: Some(worker),
    }
}

async fn run_worker<M: ProfileMirror>(mirror: M, mut rx: watch::Receiver<Option<SyncRequest>>) {
    // `changed` still reports a value sent just before the sender dropped, so
    // the final snapshot is pushed before the loop ends.
    while rx.changed().await.is_ok() {
        let Some(request) = rx.borrow_and_update().clone() else {
            continue;
        };

        match catch_task_panic(mirror.push(&request.identity, &request.state)).await {
            Ok(Ok(())) => {
                tracing::debug!(identity = %request.identity, "Profile sync pushed snapshot");
            }
            Ok(Err(e)) => {
                tracing::warn!(identity = %request.identity, error = %e, "Profile sync failed, local state kept");
            }
            Err(panic_msg) => {
                tracing::error!(identity = %request.identity, error = %panic_msg, "Profile sync panicked");
            }
        }
    }
    tracing::debug!("Profile sync worker stopped");
}

/// Run `future`, turning a panic into `Err` with the panic message.
async fn catch_task_panic<F, T>(future: F) -> Result<T, String>
where
    F: Future<Output = T>,
{
    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .map_err(|panic| {
            if let Some(s) = panic.downcast_ref::<&'static str>() {
                s.to_string()
            } else if let Some(s) = panic.downcast_ref::<String>() {
                s.clone()
            } else {
                "Unknown panic".to_string()
            }
        })
}

//! File polling with a deadline, and detached temp-file cleanup.
//!
//! The snapshot action gives no completion signal, so the only way to know
//! the image is there is to look for it.

use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Poll interval and overall deadline for a file wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl WaitPolicy {
    /// Waiting for a requested snapshot to land.
    pub const ACQUIRE: WaitPolicy = WaitPolicy {
        interval: Duration::from_millis(500),
        timeout: Duration::from_secs(5),
    };

    /// Waiting for a temp image before deleting it.
    pub const CLEANUP: WaitPolicy = WaitPolicy {
        interval: Duration::from_secs(1),
        timeout: Duration::from_secs(60),
    };
}

/// Returns `true` once `path` exists, `false` if the deadline passes first.
pub async fn wait_for_file(path: &Path, policy: WaitPolicy) -> bool {
    let poll = async {
        loop {
            if tokio::fs::try_exists(path).await.unwrap_or(false) {
                return;
            }
            tokio::time::sleep(policy.interval).await;
        }
    };

    tokio::time::timeout(policy.timeout, poll).await.is_ok()
}

/// Delete `path` once it shows up, in a detached task.
///
/// Nothing is reported back: a file that never appears or cannot be removed
/// is only logged. The handle exists so tests can wait for completion.
pub fn spawn_cleanup(path: PathBuf, policy: WaitPolicy) -> JoinHandle<()> {
    tokio::spawn(async move {
        if !wait_for_file(&path, policy).await {
            tracing::debug!(path = %path.display(), "cleanup: image never appeared");
            return;
        }

        match tokio::fs::remove_file(&path).await {
            Ok(()) => tracing::debug!(path = %path.display(), "cleanup: image removed"),
            Err(e) => tracing::debug!(path = %path.display(), error = %e, "cleanup: remove failed"),
        }
    })
}

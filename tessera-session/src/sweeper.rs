//! Expiry for backends that do not drop keys on their own.
//!
//! Each session gets a task that sleeps until the recorded `expires` instant,
//! then re-reads the record. An extended session is rescheduled, an expired
//! one deleted, a vanished one forgotten.

use crate::backend::{BackendConnection, SessionBackend};
use crate::error::SessionResult;
use crate::key::SessionKey;
use crate::record::fields;
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Seconds to wait before retrying after a backend error.
const RETRY_DELAY_SECS: i64 = 5;

/// Consecutive backend errors after which a sweep is abandoned.
const MAX_FAILURES: u32 = 5;

#[derive(Debug, PartialEq, Eq)]
enum Sweep {
    /// Record already gone.
    Vanished,
    /// Record was past its deadline and has been deleted.
    Deleted,
    /// Record was extended; sleep until the new deadline.
    Extended(DateTime<Utc>),
}

/// Schedule deletion of `key` at `expires_at`.
pub(crate) fn spawn<B: SessionBackend>(
    backend: Arc<B>,
    key: SessionKey,
    expires_at: DateTime<Utc>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut deadline = expires_at;
        let mut failures = 0;

        loop {
            tokio::time::sleep(until(deadline)).await;

            match sweep(backend.as_ref(), &key).await {
                Ok(Sweep::Vanished) => return,
                Ok(Sweep::Deleted) => {
                    debug!("Expired session swept");
                    return;
                }
                Ok(Sweep::Extended(next)) => {
                    failures = 0;
                    deadline = next;
                }
                Err(e) => {
                    failures += 1;
                    if failures >= MAX_FAILURES {
                        error!(error = %e, "Giving up on session expiry");
                        return;
                    }
                    warn!(error = %e, attempt = failures, "Session expiry check failed");
                    deadline = Utc::now() + TimeDelta::seconds(RETRY_DELAY_SECS);
                }
            }
        }
    })
}

fn until(deadline: DateTime<Utc>) -> Duration {
    (deadline - Utc::now()).to_std().unwrap_or_default()
}

async fn sweep<B: SessionBackend>(backend: &B, key: &SessionKey) -> SessionResult<Sweep> {
    let mut conn = backend.connection().await?;
    let record = conn.hgetall(key.as_str()).await?;
    if record.is_empty() {
        return Ok(Sweep::Vanished);
    }

    let deadline = record
        .get(fields::EXPIRES)
        .and_then(|s| s.parse::<i64>().ok())
        .and_then(|secs| DateTime::from_timestamp(secs, 0));

    match deadline {
        Some(at) if at > Utc::now() => Ok(Sweep::Extended(at)),
        // Past due, or unreadable and therefore unusable.
        _ => {
            conn.del(key.as_str()).await?;
            Ok(Sweep::Deleted)
        }
    }
}

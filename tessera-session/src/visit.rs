//! Visit logging keyed by session user.

use crate::backend::SessionBackend;
use crate::error::BoxError;
use crate::handle::SessionHandle;
use crate::request::RequestMeta;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// One recorded page view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Visit {
    /// Logged-in user, empty for anonymous visitors.
    pub user: String,
    pub time: DateTime<Utc>,
    pub ip: String,
    pub user_agent: String,
    pub path: String,
    pub method: String,
    /// Query parameters as a JSON object of string arrays.
    pub params: String,
}

impl Visit {
    /// Build a visit for `request` by `user` at the current time.
    pub fn from_request(request: &RequestMeta, user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            time: Utc::now(),
            ip: request.remote_addr.clone(),
            user_agent: request.user_agent.clone(),
            path: request.path().to_string(),
            method: request.method.clone(),
            params: query_params_json(request.query().unwrap_or_default()),
        }
    }
}

/// Where visits are written.
#[async_trait]
pub trait VisitSink: Send + Sync {
    async fn record(&self, visit: Visit) -> Result<(), BoxError>;
}

/// Record `request` against the session's user.
///
/// Best effort: a failing session lookup records the visit as anonymous and a
/// failing sink is only logged.
pub async fn record_visit<B: SessionBackend>(
    handle: &mut SessionHandle<B>,
    request: &RequestMeta,
    sink: &dyn VisitSink,
) {
    let user = match handle.is_logged_in().await {
        Ok(user) => user.unwrap_or_default(),
        Err(e) => {
            warn!(error = %e, "Could not resolve visitor");
            String::new()
        }
    };

    if let Err(e) = sink.record(Visit::from_request(request, user)).await {
        warn!(path = %request.path(), error = %e, "Failed to record visit");
    }
}

fn query_params_json(query: &str) -> String {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query).unwrap_or_default();
    let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in pairs {
        params.entry(name).or_default().push(value);
    }
    serde_json::to_string(&params).unwrap_or_else(|_| "{}".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::config::SessionConfig;
    use crate::store::SessionStore;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<Visit>>);

    #[async_trait]
    impl VisitSink for Recorder {
        async fn record(&self, visit: Visit) -> Result<(), BoxError> {
            self.0.lock().push(visit);
            Ok(())
        }
    }

    struct Broken;

    #[async_trait]
    impl VisitSink for Broken {
        async fn record(&self, _visit: Visit) -> Result<(), BoxError> {
            Err("disk full".into())
        }
    }

    #[test]
    fn test_query_params_json() {
        assert_eq!(query_params_json(""), "{}");
        assert_eq!(
            query_params_json("tag=a&tag=b&page=2"),
            r#"{"page":["2"],"tag":["a","b"]}"#
        );
        assert_eq!(query_params_json("q=hello%20world"), r#"{"q":["hello world"]}"#);
    }

    #[tokio::test]
    async fn test_records_user() {
        let store = SessionStore::new(MemoryBackend::new(), SessionConfig::default()).unwrap();
        let request = RequestMeta::new("1.2.3.4", "/posts?page=2").with_user_agent("agent");
        let mut handle = store.open(&request).await.unwrap();
        handle.claim_user("alice").await.unwrap();

        let recorder = Recorder::default();
        record_visit(&mut handle, &request, &recorder).await;

        let visits = recorder.0.lock();
        assert_eq!(visits.len(), 1);
        assert_eq!(visits[0].user, "alice");
        assert_eq!(visits[0].path, "/posts");
        assert_eq!(visits[0].method, "GET");
        assert_eq!(visits[0].params, r#"{"page":["2"]}"#);
    }

    #[tokio::test]
    async fn test_sink_failure_is_swallowed() {
        let store = SessionStore::new(MemoryBackend::new(), SessionConfig::default()).unwrap();
        let request = RequestMeta::new("1.2.3.4", "/");
        let mut handle = store.open(&request).await.unwrap();
        record_visit(&mut handle, &request, &Broken).await;
    }
}

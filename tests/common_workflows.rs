//! Integration tests for common Tessera workflows.
//!
//! A visitor browses anonymously, logs in as an administrator, reaches the
//! admin area and logs out, with every request passing through the session
//! middleware.

use async_trait::async_trait;
use http::header::{COOKIE, SET_COOKIE, USER_AGENT};
use http::{Request, Response, StatusCode};
use parking_lot::Mutex;
use tessera::auth::{self, LoginError, UserDirectory};
use tessera::visit::{self, Visit, VisitSink};
use tessera::*;

struct Site;

#[async_trait]
impl UserDirectory for Site {
    async fn can_login(&self, user: &str, password: &str) -> Result<bool, BoxError> {
        Ok(user == "alice" && password == "secret")
    }

    async fn is_admin(&self, user: &str) -> Result<bool, BoxError> {
        Ok(user == "alice")
    }
}

#[derive(Default)]
struct VisitLog(Mutex<Vec<Visit>>);

#[async_trait]
impl VisitSink for VisitLog {
    async fn record(&self, visit: Visit) -> Result<(), BoxError> {
        self.0.lock().push(visit);
        Ok(())
    }
}

fn middleware() -> SessionMiddleware<MemoryBackend> {
    let store = SessionStore::new(MemoryBackend::new(), SessionConfig::default()).unwrap();
    SessionMiddleware::new(store)
}

fn get(uri: &str, cookie: Option<&str>) -> Request<()> {
    let mut builder = Request::builder().uri(uri).header(USER_AGENT, "test-agent");
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie);
    }
    builder.body(()).unwrap()
}

fn cookie_pair(response: &Response<String>) -> String {
    let header = response.headers()[SET_COOKIE].to_str().unwrap();
    header.split(';').next().unwrap().to_string()
}

#[tokio::test]
async fn test_login_workflow() {
    let middleware = middleware();

    // Anonymous visit mints a session.
    let response: Response<String> = middleware
        .run(get("/blog", None), "1.2.3.4", |_req, session| {
            Box::pin(async move {
                assert!(session.is_new());
                Response::new(String::new())
            })
        })
        .await;
    let cookie = cookie_pair(&response);

    // The admin area refuses anonymous sessions.
    let response: Response<String> = middleware
        .run(get("/admin", Some(&cookie)), "1.2.3.4", |_req, session| {
            Box::pin(async move {
                let err = auth::require_admin(session, &Site).await.unwrap_err();
                assert!(matches!(err, LoginError::NotLoggedIn));
                let mut response = Response::new(String::new());
                *response.status_mut() = err.status_code();
                response
            })
        })
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Login claims the session and refreshes the cookie.
    let response: Response<String> = middleware
        .run(get("/login", Some(&cookie)), "1.2.3.4", |_req, session| {
            Box::pin(async move {
                auth::log_in(session, &Site, "alice", "secret").await.unwrap();
                Response::new(String::new())
            })
        })
        .await;
    assert_eq!(cookie_pair(&response), cookie);

    // Same cookie, now an administrator.
    let response: Response<String> = middleware
        .run(get("/admin", Some(&cookie)), "1.2.3.4", |_req, session| {
            Box::pin(async move {
                let user = auth::require_admin(session, &Site).await.unwrap();
                Response::new(user)
            })
        })
        .await;
    assert_eq!(response.body(), "alice");

    // Logout deletes the session and clears the cookie.
    let response: Response<String> = middleware
        .run(get("/logout", Some(&cookie)), "1.2.3.4", |_req, session| {
            Box::pin(async move {
                session.log_out().await.unwrap();
                Response::new(String::new())
            })
        })
        .await;
    let header = response.headers()[SET_COOKIE].to_str().unwrap();
    assert!(header.contains("Max-Age=0"));
    assert!(middleware.store().backend().is_empty());

    // The old cookie now gets a fresh anonymous session.
    let response: Response<String> = middleware
        .run(get("/admin", Some(&cookie)), "1.2.3.4", |_req, session| {
            Box::pin(async move {
                assert!(session.is_new());
                assert_eq!(session.is_logged_in().await.unwrap(), None);
                Response::new(String::new())
            })
        })
        .await;
    assert_ne!(cookie_pair(&response), cookie);
}

#[tokio::test]
async fn test_visits_are_attributed() {
    let middleware = middleware();
    let log = VisitLog::default();

    let request = RequestMeta::new("5.6.7.8", "/posts?tag=rust&tag=web")
        .with_user_agent("test-agent");
    let mut session = middleware.begin_with(&request).await.unwrap();
    visit::record_visit(&mut session, &request, &log).await;
    session.claim_user("alice").await.unwrap();
    visit::record_visit(&mut session, &request, &log).await;
    session.close();

    let visits = log.0.lock();
    assert_eq!(visits.len(), 2);
    assert_eq!(visits[0].user, "");
    assert_eq!(visits[1].user, "alice");
    assert_eq!(visits[1].ip, "5.6.7.8");
    assert_eq!(visits[1].path, "/posts");
    assert_eq!(visits[1].params, r#"{"tag":["rust","web"]}"#);
}

#[test]
fn test_log_format_names() {
    assert_eq!(logging::Format::parse("json"), Some(logging::Format::Json));
    assert_eq!(logging::Format::default(), logging::Format::Compact);
}

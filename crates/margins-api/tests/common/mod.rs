#![allow(dead_code)]

use std::net::SocketAddr;

use axum::body::Body;
use axum::http::header::{ACCEPT_RANGES, CONTENT_RANGE, CONTENT_TYPE, COOKIE, RANGE, SET_COOKIE};
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use margins_api::state::upstream_client;
use margins_api::{ApiConfig, AppState, AppStateInner, api_router};
use margins_db::Database;

pub const PASSWORD: &str = "a long enough password";

/// A router over a fresh database and data directory. The directory lives as
/// long as the struct.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub dir: TempDir,
}

pub fn test_config(dir: &TempDir) -> ApiConfig {
    ApiConfig {
        secret: "test-secret".to_string(),
        data_dir: dir.path().to_path_buf(),
        session_days: 30,
        cookie_secure: false,
        audio_hosts: vec![
            "dropbox.com".to_string(),
            "dropboxusercontent.com".to_string(),
            "127.0.0.1".to_string(),
        ],
        book_title: "The Enemy Within".to_string(),
        book_file_stem: "The_Enemy_Within".to_string(),
    }
}

impl TestApp {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("margins.db")).unwrap();

        let config = test_config(&dir);
        // Local upstreams must not be routed through an environment proxy.
        let http = upstream_client(&config.audio_hosts).no_proxy().build().unwrap();
        let state = AppStateInner::with_client(db, config, http);

        Self {
            router: api_router(state.clone()),
            state,
            dir,
        }
    }

    pub fn write_data_file(&self, relative: &str, contents: &[u8]) {
        let path = self.dir.path().join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    pub async fn send(&self, method: Method, uri: &str, body: Option<Value>, cookie: Option<&str>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        self.router.clone().oneshot(builder.body(body).unwrap()).await.unwrap()
    }

    pub async fn get(&self, uri: &str, cookie: &str) -> Response {
        self.send(Method::GET, uri, None, Some(cookie)).await
    }

    pub async fn post(&self, uri: &str, body: Value, cookie: &str) -> Response {
        self.send(Method::POST, uri, Some(body), Some(cookie)).await
    }

    pub async fn put(&self, uri: &str, body: Value, cookie: &str) -> Response {
        self.send(Method::PUT, uri, Some(body), Some(cookie)).await
    }

    pub async fn delete(&self, uri: &str, cookie: &str) -> Response {
        self.send(Method::DELETE, uri, None, Some(cookie)).await
    }

    /// Creates an invite and signs up with it, returning the session cookie.
    pub async fn signup(&self, name: &str, email: &str) -> String {
        let code = format!("invite-{email}");
        assert!(self.state.db.create_invite(&code).unwrap());

        let body = serde_json::json!({
            "name": name,
            "email": email,
            "password": PASSWORD,
            "inviteCode": code,
        });
        let response = self.send(Method::POST, "/api/auth/signup", Some(body), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        session_cookie(&response)
    }

    pub async fn admin(&self) -> String {
        let cookie = self.signup("Author", "author@example.com").await;
        assert!(self.state.db.make_admin("author@example.com").unwrap());
        cookie
    }
}

/// `name=value` from the response's session `Set-Cookie` header.
pub fn session_cookie(response: &Response) -> String {
    let header = response
        .headers()
        .get(SET_COOKIE)
        .expect("response sets a cookie")
        .to_str()
        .unwrap();
    header.split(';').next().unwrap().trim().to_string()
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Asserts the status and returns the `error` message of a failed request.
pub async fn error_message(response: Response, status: StatusCode) -> String {
    assert_eq!(response.status(), status);
    body_json(response).await["error"].as_str().unwrap().to_string()
}

pub const UPSTREAM_AUDIO: &[u8] = b"0123456789";

/// A stand-in audio host on a random local port. `/ch01.mp3` honours a
/// `Range` header with a fixed partial response; `/gone.mp3` is a 404;
/// `/moved.mp3` redirects to `/ch01.mp3` and `/away.mp3` to a host that is
/// not allow-listed.
pub async fn spawn_upstream() -> SocketAddr {
    async fn audio(headers: HeaderMap) -> Response {
        if headers.contains_key(RANGE) {
            (
                StatusCode::PARTIAL_CONTENT,
                [
                    (CONTENT_TYPE, "audio/ogg"),
                    (CONTENT_RANGE, "bytes 2-5/10"),
                    (ACCEPT_RANGES, "bytes"),
                ],
                &UPSTREAM_AUDIO[2..6],
            )
                .into_response()
        } else {
            (StatusCode::OK, [(ACCEPT_RANGES, "bytes")], UPSTREAM_AUDIO).into_response()
        }
    }

    let app = Router::new()
        .route("/ch01.mp3", get(audio))
        .route("/gone.mp3", get(|| async { StatusCode::NOT_FOUND }))
        .route("/moved.mp3", get(|| async { Redirect::temporary("/ch01.mp3") }))
        .route(
            "/away.mp3",
            get(|| async { Redirect::temporary("http://evil.example.net/x.mp3") }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

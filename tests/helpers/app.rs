use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode};
use axum::Router;
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`

use reelmark::identity::UsernameMatch;
use reelmark::settings::{Auth, Settings};
use reelmark::tokens::TokenIssuer;
use reelmark::uploads::FileStore;
use reelmark::web::{router, AppState};

use super::db::TestDb;

/// Fully wired application over a throwaway database and upload directory.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    _db: TestDb,
    _uploads: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let db = TestDb::new().await;
        let uploads = TempDir::new().expect("Failed to create upload dir");

        let mut settings = Settings::default();
        settings.server.public_base_url = Some("http://testserver".to_string());
        settings.uploads.dir = uploads.path().to_path_buf();
        settings.auth = Auth {
            token_ttl_secs: 3600,
            token_secret: Some("integration-test-secret".to_string()),
            secret_path: "unused".into(),
        };

        let tokens = TokenIssuer::new(&settings.auth).expect("Failed to build token issuer");
        let files = FileStore::new(&settings.uploads.dir).expect("Failed to create file store");

        let state = AppState {
            settings: Arc::new(settings),
            db: db.connection().clone(),
            tokens,
            verifier: Arc::new(UsernameMatch),
            files,
        };

        Self {
            router: router(state.clone()),
            state,
            _db: db,
            _uploads: uploads,
        }
    }

    /// Send a request and decode the response body as JSON (Null when empty
    /// or not JSON).
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let (status, bytes) = self.send_raw(request).await;
        let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, value)
    }

    pub async fn send_raw(&self, request: Request<Body>) -> (StatusCode, Bytes) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Request failed");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body");
        (status, bytes)
    }

    /// Sign up (or log in) and return the bearer token.
    pub async fn auth_token(&self, username: &str, email: &str) -> String {
        let (status, body) = self
            .send(json_request(
                "POST",
                "/api/auth",
                None,
                serde_json::json!({"username": username, "email": email}),
            ))
            .await;
        assert!(
            status == StatusCode::OK || status == StatusCode::CREATED,
            "auth failed with {status}: {body}"
        );
        body["access_token"]
            .as_str()
            .expect("No access_token in response")
            .to_string()
    }
}

pub fn json_request(
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: serde_json::Value,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("Failed to build request")
}

pub fn bare_request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder
        .body(Body::empty())
        .expect("Failed to build request")
}

pub fn form_request(method: &str, uri: &str, token: Option<&str>, form: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/x-www-form-urlencoded");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder
        .body(Body::from(form.to_string()))
        .expect("Failed to build request")
}

/// Single-field multipart body with the given file name and contents.
pub fn multipart_request(
    uri: &str,
    token: Option<&str>,
    field: &str,
    file_name: &str,
    contents: &[u8],
) -> Request<Body> {
    let boundary = "reelmark-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(contents);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={boundary}"),
        );
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder
        .body(Body::from(body))
        .expect("Failed to build request")
}

//! HTTP surface of the favorites API. Routes are thin: a bearer check, one or
//! two storage calls, JSON out. All shared process state lives in [`AppState`]
//! and is handed to handlers explicitly.
use crate::identity::{Credentials, IdentityVerifier};
use crate::settings::Settings;
use crate::storage;
use crate::tokens::TokenIssuer;
use crate::uploads::FileStore;
use axum::extract::{DefaultBodyLimit, Form, Multipart, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use miette::IntoDiagnostic;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub db: DatabaseConnection,
    pub tokens: TokenIssuer,
    pub verifier: Arc<dyn IdentityVerifier>,
    pub files: FileStore,
}

pub fn router(state: AppState) -> Router {
    let max_body = state.settings.uploads.max_bytes;
    let uploads_dir = state.settings.uploads.dir.clone();

    Router::new()
        .route("/", get(home))
        .route("/api/auth", post(auth))
        .route("/api/update", put(update_profile))
        // Route name (including the typo) is what deployed clients call
        .route("/api/toogle_favorites", post(toggle_favorite))
        .route("/api/check_favorite", get(check_favorite))
        .route("/api/favorites", get(get_favorites))
        .route("/api/upload", post(upload_picture))
        .nest_service("/uploads", ServeDir::new(uploads_dir))
        .layer(DefaultBodyLimit::max(max_body))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(
    settings: Settings,
    db: DatabaseConnection,
    tokens: TokenIssuer,
    verifier: Arc<dyn IdentityVerifier>,
    files: FileStore,
) -> miette::Result<()> {
    let state = AppState {
        settings: Arc::new(settings),
        db,
        tokens,
        verifier,
        files,
    };

    let addr: SocketAddr = format!(
        "{}:{}",
        state.settings.server.host, state.settings.server.port
    )
    .parse()
    .map_err(|e| miette::miette!("bad listen addr: {e}"))?;

    let app = router(state);

    tracing::info!(%addr, "API listening");
    let listener = tokio::net::TcpListener::bind(addr).await.into_diagnostic()?;
    axum::serve(listener, app).await.into_diagnostic()?;
    Ok(())
}

async fn home() -> &'static str {
    "Home"
}

/// Resolves the caller from the `Authorization: Bearer` header, or produces
/// the 401 response to send back.
fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<i32, Response> {
    let token = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                Json(
                    json!({"error": "missing_token", "error_description": "Bearer token required"}),
                ),
            )
                .into_response()
        })?;

    state.tokens.verify(token).map_err(|_| {
        (
            StatusCode::UNAUTHORIZED,
            Json(
                json!({"error": "invalid_token", "error_description": "Invalid or expired token"}),
            ),
        )
            .into_response()
    })
}

fn internal_error(err: impl std::fmt::Display) -> Response {
    tracing::error!("request failed: {err}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": err.to_string()})),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
struct AuthRequest {
    username: Option<String>,
    email: Option<String>,
    phone: Option<String>,
}

/// POST /api/auth - combined signup/login keyed on email
async fn auth(State(state): State<AppState>, Json(req): Json<AuthRequest>) -> Response {
    let (username, email) = match (req.username, req.email) {
        (Some(u), Some(e)) if !u.is_empty() && !e.is_empty() => (u, e),
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"message": "Fill all fields"})),
            )
                .into_response();
        }
    };

    let existing = match storage::get_user_by_email(&state.db, &email).await {
        Ok(user) => user,
        Err(e) => return internal_error(e),
    };

    if let Some(user) = existing {
        let supplied = Credentials { username, email };
        if !state.verifier.verify(&user, &supplied) {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"message": "Invalid credentials"})),
            )
                .into_response();
        }

        let token = match state.tokens.issue(user.id) {
            Ok(t) => t,
            Err(e) => return internal_error(e),
        };
        tracing::debug!(user_id = user.id, "login");
        return (
            StatusCode::OK,
            Json(json!({"message": "Login successful", "access_token": token})),
        )
            .into_response();
    }

    let user = match storage::create_user(&state.db, &username, &email, req.phone).await {
        Ok(u) => u,
        Err(e) if storage::is_unique_violation(&e) => {
            // Fresh email but the username belongs to someone else
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"message": "Invalid credentials"})),
            )
                .into_response();
        }
        Err(e) => return internal_error(e),
    };

    let token = match state.tokens.issue(user.id) {
        Ok(t) => t,
        Err(e) => return internal_error(e),
    };
    tracing::debug!(user_id = user.id, "signup");
    (
        StatusCode::CREATED,
        Json(json!({"message": "User created successfully", "access_token": token})),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
struct UpdateForm {
    username: Option<String>,
    email: Option<String>,
    phone: Option<String>,
}

/// PUT /api/update - overwrite any supplied profile fields
async fn update_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<UpdateForm>,
) -> Response {
    let user_id = match authenticate(&state, &headers) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let changes = storage::ProfileChanges {
        username: form.username,
        email: form.email,
        phone: form.phone,
    };

    match storage::update_profile(&state.db, user_id, changes).await {
        Ok(Some(user)) => (
            StatusCode::OK,
            Json(json!({
                "message": "User updated successfully",
                "user": {
                    "username": user.username,
                    "email": user.email,
                    "phone": user.phone,
                },
            })),
        )
            .into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({"message": "User not found"})),
        )
            .into_response(),
        Err(e) => internal_error(e),
    }
}

#[derive(Debug, Deserialize)]
struct ToggleRequest {
    movie_id: i32,
    title: String,
}

/// POST /api/toogle_favorites - insert if absent, delete if present
async fn toggle_favorite(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ToggleRequest>,
) -> Response {
    let user_id = match authenticate(&state, &headers) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match storage::remove_favorite(&state.db, user_id, req.movie_id).await {
        Ok(true) => {
            return (StatusCode::OK, Json(json!({"action": "removed"}))).into_response();
        }
        Ok(false) => {}
        Err(e) => return internal_error(e),
    }

    // Not present: insert. An insert conflict means a concurrent request beat
    // us to it; either way the favorite now exists.
    match storage::add_favorite(&state.db, user_id, req.movie_id, &req.title).await {
        Ok(_) => (StatusCode::OK, Json(json!({"action": "added"}))).into_response(),
        Err(e) => internal_error(e),
    }
}

#[derive(Debug, Deserialize)]
struct CheckFavoriteQuery {
    movie_id: i32,
}

/// GET /api/check_favorite?movie_id=N
async fn check_favorite(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<CheckFavoriteQuery>,
) -> Response {
    let user_id = match authenticate(&state, &headers) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match storage::is_favorite(&state.db, user_id, q.movie_id).await {
        Ok(found) => (StatusCode::OK, Json(json!({"is_favorite": found}))).into_response(),
        Err(e) => internal_error(e),
    }
}

/// The `id` here is the movie's identifier, not the favorite row id; that is
/// the shape clients were built against.
#[derive(Debug, Serialize)]
struct FavoriteSummary {
    id: i32,
    title: String,
}

/// GET /api/favorites - the caller's favorites, oldest first
async fn get_favorites(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let user_id = match authenticate(&state, &headers) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match storage::list_favorites(&state.db, user_id).await {
        Ok(rows) => {
            let favorites: Vec<FavoriteSummary> = rows
                .into_iter()
                .map(|f| FavoriteSummary {
                    id: f.movie_id,
                    title: f.title,
                })
                .collect();
            (StatusCode::OK, Json(json!({"favorites": favorites}))).into_response()
        }
        Err(e) => internal_error(e),
    }
}

/// POST /api/upload - multipart profile picture, stored under a fresh name
async fn upload_picture(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    let user_id = match authenticate(&state, &headers) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let user = match storage::get_user_by_id(&state.db, user_id).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({"error": "User not found"})),
            )
                .into_response();
        }
        Err(e) => return internal_error(e),
    };

    let mut upload: Option<(String, axum::body::Bytes)> = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() != Some("profile_picture") {
                    continue;
                }
                let original = field.file_name().unwrap_or("profile_picture").to_string();
                match field.bytes().await {
                    Ok(bytes) => {
                        upload = Some((original, bytes));
                        break;
                    }
                    Err(e) => {
                        return (StatusCode::BAD_REQUEST, Json(json!({"error": e.to_string()})))
                            .into_response();
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                return (StatusCode::BAD_REQUEST, Json(json!({"error": e.to_string()})))
                    .into_response();
            }
        }
    }

    let (original, bytes) = match upload {
        Some((name, bytes)) if !bytes.is_empty() => (name, bytes),
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "No file uploaded"})),
            )
                .into_response();
        }
    };

    let stored = match state.files.save(&original, &bytes).await {
        Ok(name) => name,
        Err(e) => return internal_error(e),
    };

    let url = format!("{}/uploads/{}", state.settings.public_url(), stored);
    if let Err(e) = storage::set_profile_picture(&state.db, user.id, &url).await {
        return internal_error(e);
    }

    tracing::info!(user_id = user.id, file = %stored, "profile picture uploaded");
    (StatusCode::OK, Json(json!({"profile_picture": url}))).into_response()
}

//! Route table and handlers.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::middleware;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use sharehub_common::Error;
use sharehub_transfer::{AccessRule, DirEntry};

use crate::auth::require_api_key;
use crate::error::ApiError;
use crate::extract::ApiQuery;
use crate::AppState;

const PROTECTED_ROUTES: &[(&str, &str)] = &[
    ("POST", "/create-shared-dir"),
    ("GET", "/list-dir"),
    ("GET", "/get-shared-dirs"),
    ("DELETE", "/unshare-dir"),
    ("DELETE", "/delete-zombie-shares"),
    ("DELETE", "/delete-dir"),
    ("DELETE", "/delete-old-dirs"),
    ("GET", "/get-file"),
    ("PUT", "/log/{level}"),
];

#[derive(Debug, Deserialize)]
pub struct CreateParams {
    #[serde(alias = "globus_username")]
    pub identity: String,
    #[serde(default, alias = "dir_name")]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PathParams {
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct RetentionParams {
    pub path: String,
    #[serde(alias = "minDays", alias = "num_of_days")]
    pub min_days: i64,
}

/// Build the application router.
///
/// Access logging wraps every route except `/health`.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/create-shared-dir", post(create_shared_dir))
        .route("/list-dir", get(list_dir))
        .route("/get-shared-dirs", get(get_shared_dirs))
        .route("/unshare-dir", delete(unshare_dir))
        .route("/delete-zombie-shares", delete(delete_zombie_shares))
        .route("/delete-dir", delete(delete_dir))
        .route("/delete-old-dirs", delete(delete_old_dirs))
        .route("/get-file", get(get_file))
        .route("/log/{level}", put(set_log_level))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    Router::new()
        .route("/", get(describe))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> Json<&'static str> {
    Json("alive")
}

async fn describe() -> Json<serde_json::Value> {
    let routes: Vec<_> = PROTECTED_ROUTES
        .iter()
        .map(|(method, path)| serde_json::json!({ "method": method, "path": path }))
        .collect();

    Json(serde_json::json!({
        "name": "sharehub",
        "version": env!("CARGO_PKG_VERSION"),
        "routes": routes,
    }))
}

async fn create_shared_dir(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<CreateParams>,
) -> Result<Json<String>, ApiError> {
    let path = state
        .service
        .create_shared_dir(&params.identity, params.name.as_deref())
        .await?;
    Ok(Json(path.into()))
}

async fn list_dir(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<PathParams>,
) -> Result<Json<Vec<DirEntry>>, ApiError> {
    Ok(Json(state.service.list_dir(&params.path).await?))
}

async fn get_shared_dirs(
    State(state): State<AppState>,
) -> Result<Json<Vec<AccessRule>>, ApiError> {
    Ok(Json(state.service.shared_dirs().await?))
}

async fn unshare_dir(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<PathParams>,
) -> Result<StatusCode, ApiError> {
    state.service.unshare_dir(&params.path).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_zombie_shares(
    State(state): State<AppState>,
) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.service.delete_zombie_shares().await?))
}

async fn delete_dir(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<PathParams>,
) -> Result<StatusCode, ApiError> {
    state.service.delete_dir(&params.path).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_old_dirs(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<RetentionParams>,
) -> Result<Json<Vec<String>>, ApiError> {
    let submitted = state
        .service
        .delete_old_dirs(&params.path, params.min_days)
        .await?;
    Ok(Json(submitted))
}

async fn get_file(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<PathParams>,
) -> Result<Body, ApiError> {
    let stream = state.service.fetch_file(&params.path).await?;
    Ok(Body::from_stream(stream))
}

async fn set_log_level(
    State(state): State<AppState>,
    Path(level): Path<String>,
) -> Result<Json<String>, ApiError> {
    let control = state.log_level.as_ref().ok_or_else(|| {
        Error::Config("Runtime log level control is not enabled".to_string())
    })?;
    Ok(Json(control.set(&level)?.to_string()))
}

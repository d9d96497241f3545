//! HTTP transport for coachvault.
//!
//! A thin axum adapter over [`UnlockService`]: it extracts the request
//! context, runs the (blocking) service call on the blocking pool, and maps
//! every [`UnlockError`] kind to its own status code and a JSON
//! [`ErrorBody`]. An unreadable unlock body is answered with a 400
//! `bad_request` body before the guard sees the request.
//!
//! Routes:
//! - `GET  /healthz`
//! - `GET  /catalog` (alias `/coaches`)
//! - `GET  /users/:user_id` (alias `/coaches/user/:user_id`)
//! - `GET  /users/:user_id/history`
//! - `POST /catalog/:item_id/unlock` (alias `/coaches/:item_id/unlock`)

use std::net::SocketAddr;

use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use crate::error::{retry_after_secs, UnlockError};
use crate::guard::RequestContext;
use crate::item::{Item, ItemId};
use crate::record::UnlockRecord;
use crate::service::{ErrorBody, UnlockRequest, UnlockResponse, UnlockService};
use crate::user::{User, UserId};

/// Operation name the unlock route reports to the guard.
pub const UNLOCK_OPERATION: &str = "POST:/catalog/:item_id/unlock";

/// Build the router over `service`.
///
/// Serve it with `into_make_service_with_connect_info::<SocketAddr>()` so the
/// guard can key on the client address.
pub fn router(service: UnlockService) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/catalog", get(catalog))
        .route("/catalog/:item_id/unlock", post(unlock_item))
        .route("/users/:user_id", get(user))
        .route("/users/:user_id/history", get(history))
        .route("/coaches", get(catalog))
        .route("/coaches/user/:user_id", get(user))
        .route("/coaches/:item_id/unlock", post(unlock_item))
        .with_state(service)
}

/// A failed request on its way out as an HTTP response.
#[derive(Debug)]
pub enum ApiError {
    /// The unlock path rejected the request.
    Unlock(UnlockError),
    /// The request body could not be decoded.
    BadRequest(String),
}

impl From<UnlockError> for ApiError {
    fn from(e: UnlockError) -> Self {
        Self::Unlock(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

fn status_from_unlock_error(err: &UnlockError) -> StatusCode {
    match err {
        UnlockError::NotFound { .. } => StatusCode::NOT_FOUND,
        UnlockError::PreconditionFailed(_) => StatusCode::BAD_REQUEST,
        UnlockError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        UnlockError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        UnlockError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = match self {
            Self::Unlock(err) => err,
            Self::BadRequest(message) => {
                return (StatusCode::BAD_REQUEST, Json(ErrorBody::bad_request(message)))
                    .into_response();
            }
        };
        let status = status_from_unlock_error(&err);
        let mut response = (status, Json(ErrorBody::from(&err))).into_response();
        if let UnlockError::RateLimited { retry_after_ms } = err {
            response.headers_mut().insert(
                header::RETRY_AFTER,
                HeaderValue::from(retry_after_secs(retry_after_ms)),
            );
        }
        response
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, UnlockError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| UnlockError::internal(format!("blocking task failed: {e}")))?
        .map_err(ApiError::Unlock)
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
}

async fn healthz() -> Json<Health> {
    Json(Health { status: "ok" })
}

async fn catalog(State(service): State<UnlockService>) -> Result<Json<Vec<Item>>, ApiError> {
    run_blocking(move || service.catalog()).await.map(Json)
}

async fn user(
    State(service): State<UnlockService>,
    Path(user_id): Path<String>,
) -> Result<Json<User>, ApiError> {
    let id = UserId::new(user_id);
    run_blocking(move || service.user(&id)).await.map(Json)
}

async fn history(
    State(service): State<UnlockService>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<UnlockRecord>>, ApiError> {
    let id = UserId::new(user_id);
    run_blocking(move || service.history(&id)).await.map(Json)
}

async fn unlock_item(
    State(service): State<UnlockService>,
    Path(item_id): Path<String>,
    connect: Option<ConnectInfo<SocketAddr>>,
    body: Result<Json<UnlockRequest>, JsonRejection>,
) -> Result<Json<UnlockResponse>, ApiError> {
    let Json(request) = body?;
    let mut ctx = RequestContext::new(UNLOCK_OPERATION);
    if let Some(ConnectInfo(addr)) = connect {
        ctx = ctx.with_client(addr.ip());
    }
    let item_id = ItemId::new(item_id);
    run_blocking(move || service.unlock(&ctx, &item_id, &request))
        .await
        .map(Json)
}

use super::state::AppState;
use crate::sign::{compute_sign, SignErrorResponse, SignRequest, SignResponse};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use tracing::{error, info, warn};

/// POST /api/unisound
/// Sign `{key, time}` with the server-held secret
pub async fn sign(State(state): State<AppState>, Json(req): Json<SignRequest>) -> impl IntoResponse {
    let credentials = &state.credentials;

    if req.key != credentials.app_key {
        warn!("Refusing to sign for unknown app key");
        return (
            StatusCode::FORBIDDEN,
            Json(SignErrorResponse::with_code("invalid_key")),
        )
            .into_response();
    }

    let Some(secret) = credentials.secret.as_deref().filter(|s| !s.is_empty()) else {
        error!("Sign requested but no secret is configured");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(SignErrorResponse::with_code("sign_unavailable")),
        )
            .into_response();
    };

    info!("Signing channel request (time={})", req.time);

    (
        StatusCode::OK,
        Json(SignResponse {
            sign: compute_sign(&req.key, req.time, secret),
        }),
    )
        .into_response()
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

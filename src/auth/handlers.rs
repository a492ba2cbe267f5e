use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{LoginRequest, RefreshRequest, RegisterRequest},
        jwt::TokenPair,
        services,
    },
    errors::ApiError,
    state::AppState,
    users::repo_types::PublicUser,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/token/refresh", post(refresh))
}

/// Turns axum's JSON rejection into our 400 body.
pub(crate) fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    let Json(v) = payload?;
    Ok(v)
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PublicUser>), ApiError> {
    let user = services::register(state.store.as_ref(), state.hasher.as_ref(), body(payload)?).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<TokenPair>, ApiError> {
    let pair = services::login(
        state.store.as_ref(),
        state.hasher.as_ref(),
        state.tokens.as_ref(),
        body(payload)?,
    )
    .await?;
    Ok(Json(pair))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<TokenPair>, ApiError> {
    let pair = services::refresh(state.store.as_ref(), state.tokens.as_ref(), body(payload)?).await?;
    Ok(Json(pair))
}

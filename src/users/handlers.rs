use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::{extractors::AuthUser, handlers::body},
    errors::ApiError,
    state::AppState,
    users::{
        dto::{Pagination, UpdateUserRequest},
        repo_types::PublicUser,
        services,
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route(
            "/users/:id",
            get(get_user).patch(update_user).delete(delete_user),
        )
        .route("/me", get(get_me))
}

#[instrument(skip(state, auth, page), fields(caller = %auth.0.sub))]
pub async fn list_users(
    State(state): State<AppState>,
    auth: AuthUser,
    page: Result<Query<Pagination>, QueryRejection>,
) -> Result<Json<Vec<PublicUser>>, ApiError> {
    let Query(p) = page?;
    services::caller(state.store.as_ref(), auth.0.sub).await?;
    Ok(Json(services::list(state.store.as_ref(), &p).await?))
}

#[instrument(skip(state, auth, id), fields(caller = %auth.0.sub))]
pub async fn get_user(
    State(state): State<AppState>,
    auth: AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<PublicUser>, ApiError> {
    let Path(id) = id?;
    services::caller(state.store.as_ref(), auth.0.sub).await?;
    Ok(Json(services::get(state.store.as_ref(), id).await?))
}

#[instrument(skip(state, auth, id, payload), fields(caller = %auth.0.sub))]
pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<PublicUser>, ApiError> {
    let Path(id) = id?;
    let actor = services::caller(state.store.as_ref(), auth.0.sub).await?;
    let user = services::update(state.store.as_ref(), &actor, id, body(payload)?).await?;
    Ok(Json(user))
}

#[instrument(skip(state, auth, id), fields(caller = %auth.0.sub))]
pub async fn delete_user(
    State(state): State<AppState>,
    auth: AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let Path(id) = id?;
    let actor = services::caller(state.store.as_ref(), auth.0.sub).await?;
    services::delete(state.store.as_ref(), &actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, auth), fields(caller = %auth.0.sub))]
pub async fn get_me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<PublicUser>, ApiError> {
    let me = services::caller(state.store.as_ref(), auth.0.sub).await?;
    Ok(Json(PublicUser::from(me)))
}

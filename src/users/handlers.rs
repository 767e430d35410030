use axum::{
    extract::{FromRef, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{AuthUser, JwtKeys},
    state::AppState,
    users::{
        dto::{AuthResponse, LoginRequest, PublicUser},
        error::UserError,
        repo_types::{NewUser, User, UserChanges},
        services,
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/login", post(login))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

fn reject(e: UserError) -> (StatusCode, String) {
    let status = e.status();
    if status.is_server_error() {
        error!(error = %e, "user operation failed");
    }
    (status, e.to_string())
}

fn issue_token(state: &AppState, user: User) -> Result<AuthResponse, (StatusCode, String)> {
    let keys = JwtKeys::from_ref(state);
    let access_token = keys.sign(user.id).map_err(|e| {
        error!(error = %e, "jwt sign failed");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;
    Ok(AuthResponse {
        access_token,
        user: user.into(),
    })
}

fn ensure_self(caller: i32, id: i32) -> Result<(), (StatusCode, String)> {
    if caller != id {
        warn!(caller, target = id, "attempt to modify another user");
        return Err((StatusCode::FORBIDDEN, "Not allowed".into()));
    }
    Ok(())
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
) -> Result<Json<Vec<PublicUser>>, (StatusCode, String)> {
    let users = state.users.list().await.map_err(reject)?;
    Ok(Json(users.into_iter().map(PublicUser::from).collect()))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<PublicUser>, (StatusCode, String)> {
    match state.users.find_by_id(id).await.map_err(reject)? {
        Some(user) => Ok(Json(user.into())),
        None => Err(reject(UserError::NotFound)),
    }
}

#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<NewUser>,
) -> Result<(StatusCode, Json<AuthResponse>), (StatusCode, String)> {
    let user = services::create_user(state.users.as_ref(), payload)
        .await
        .map_err(reject)?;

    info!(user_id = user.id, email = %user.email, "user registered");
    let body = issue_token(&state, user)?;
    Ok((StatusCode::CREATED, Json(body)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    let user = services::authenticate(state.users.as_ref(), &payload.email, &payload.password)
        .await
        .map_err(reject)?;

    info!(user_id = user.id, email = %user.email, "user logged in");
    Ok(Json(issue_token(&state, user)?))
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<i32>,
    Json(payload): Json<UserChanges>,
) -> Result<Json<PublicUser>, (StatusCode, String)> {
    ensure_self(caller, id)?;
    let user = services::update_user(state.users.as_ref(), id, payload)
        .await
        .map_err(reject)?;
    info!(user_id = user.id, "user updated");
    Ok(Json(user.into()))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<i32>,
) -> Result<StatusCode, (StatusCode, String)> {
    ensure_self(caller, id)?;
    services::delete_user(state.users.as_ref(), id)
        .await
        .map_err(reject)?;
    info!(user_id = id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, (StatusCode, String)> {
    match state.users.find_by_id(user_id).await.map_err(reject)? {
        Some(user) => Ok(Json(user.into())),
        None => {
            error!(user_id, "user not found");
            Err((StatusCode::UNAUTHORIZED, "User not found".into()))
        }
    }
}

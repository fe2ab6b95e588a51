use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use plantao_domain::{services::UserChanges, Role, UserView};
use serde::{Deserialize, Serialize};

use super::{parse_enum, parse_id, MessageBody};
use crate::{
    auth::{AuthUser, JsonBody},
    error::ApiError,
    state::{blocking, SharedState},
};

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_users))
        .route("/{id}", get(get_user).put(update_user).delete(delete_user))
}

#[derive(Debug, Serialize)]
pub struct UsersEnvelope {
    users: Vec<UserView>,
}

#[derive(Debug, Serialize)]
pub struct UserEnvelope {
    user: UserView,
}

async fn list_users(State(state): State<SharedState>, _auth: AuthUser) -> Result<Json<UsersEnvelope>, ApiError> {
    let users = blocking(move || state.users().list()).await?;
    Ok(Json(UsersEnvelope {
        users: users.iter().map(|u| u.view()).collect(),
    }))
}

async fn get_user(
    State(state): State<SharedState>,
    _auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<UserEnvelope>, ApiError> {
    let id = parse_id(&id)?;
    let user = blocking(move || state.users().get(&id)).await?;
    Ok(Json(UserEnvelope { user: user.view() }))
}

/// Campos ausentes no se tocan. `callmebot_key` llega en claro y se guarda
/// cifrada.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserBody {
    name: Option<String>,
    role: Option<String>,
    telefone: Option<String>,
    telefone_whatsapp: Option<String>,
    callmebot_key: Option<String>,
    active: Option<bool>,
    password: Option<String>,
}

async fn update_user(
    State(state): State<SharedState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<UpdateUserBody>,
) -> Result<Json<UserEnvelope>, ApiError> {
    let id = parse_id(&id)?;
    let changes = UserChanges {
        name: body.name,
        role: parse_enum::<Role>(body.role.as_deref())?,
        telefone: body.telefone,
        telefone_whatsapp: body.telefone_whatsapp,
        callmebot_key: body.callmebot_key,
        active: body.active,
        password: body.password,
    };
    let user = blocking(move || state.users().update(&actor, &id, changes, Utc::now())).await?;
    Ok(Json(UserEnvelope { user: user.view() }))
}

async fn delete_user(
    State(state): State<SharedState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<MessageBody>, ApiError> {
    let id = parse_id(&id)?;
    blocking(move || state.users().deactivate(&actor, &id, Utc::now())).await?;
    Ok(Json(MessageBody::new("Usuário deletado com sucesso")))
}

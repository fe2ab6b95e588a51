use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use plantao_domain::{services::NewUser, Role, UserSummary, UserView};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::MessageBody;
use crate::{
    auth::{AuthUser, JsonBody},
    error::ApiError,
    state::{blocking, SharedState},
};

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
        .route("/change-password", post(change_password))
}

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
    #[serde(default)]
    email: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    password: String,
    role: Option<String>,
    telefone: Option<String>,
    telefone_whatsapp: Option<String>,
}

async fn register(
    State(state): State<SharedState>,
    AuthUser(actor): AuthUser,
    JsonBody(body): JsonBody<RegisterBody>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    actor.require_admin("Apenas administradores podem criar usuários")?;
    let role: Role = body.role.as_deref().unwrap_or_default().parse()?;
    let input = NewUser {
        email: body.email,
        name: body.name,
        password: body.password,
        role,
        telefone: body.telefone,
        telefone_whatsapp: body.telefone_whatsapp,
    };
    let user = blocking(move || state.auth().register(&actor, input, Utc::now())).await?;
    Ok((StatusCode::CREATED, Json(json!({ "user": user.view() }))))
}

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    token: String,
    user: UserSummary,
}

async fn login(
    State(state): State<SharedState>,
    JsonBody(body): JsonBody<LoginBody>,
) -> Result<Json<LoginResponse>, ApiError> {
    let service_state = state.clone();
    let user = blocking(move || service_state.auth().login(&body.email, &body.password)).await?;
    let token = state.jwt.issue(&user, Utc::now())?;
    Ok(Json(LoginResponse {
        token,
        user: user.summary(),
    }))
}

#[derive(Debug, Serialize)]
pub struct UserEnvelope {
    user: UserView,
}

async fn me(State(state): State<SharedState>, AuthUser(actor): AuthUser) -> Result<Json<UserEnvelope>, ApiError> {
    let user = blocking(move || state.auth().me(&actor)).await?;
    Ok(Json(UserEnvelope { user: user.view() }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordBody {
    #[serde(default)]
    current_password: String,
    #[serde(default)]
    new_password: String,
}

async fn change_password(
    State(state): State<SharedState>,
    AuthUser(actor): AuthUser,
    JsonBody(body): JsonBody<ChangePasswordBody>,
) -> Result<Json<MessageBody>, ApiError> {
    blocking(move || {
        state
            .auth()
            .change_password(&actor, &body.current_password, &body.new_password, Utc::now())
    })
    .await?;
    Ok(Json(MessageBody::new("Senha alterada com sucesso")))
}

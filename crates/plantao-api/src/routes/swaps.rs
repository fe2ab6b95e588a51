use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, patch},
    Json, Router,
};
use chrono::Utc;
use plantao_domain::{
    services::{NewSwap, SwapResponse},
    SwapRequest, SwapStatus,
};
use serde::Deserialize;

use super::{parse_enum, parse_id, parse_opt_id};
use crate::{
    auth::{AuthUser, JsonBody},
    error::ApiError,
    state::{blocking, SharedState},
};

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_swaps).post(create_swap))
        .route("/{id}", delete(cancel_swap))
        .route("/{id}/respond", patch(respond_swap))
        .route("/{id}/approve", patch(approve_swap))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapBody {
    shift_id: Option<String>,
    target_id: Option<String>,
    target_shift_id: Option<String>,
    reason: Option<String>,
}

async fn create_swap(
    State(state): State<SharedState>,
    AuthUser(actor): AuthUser,
    JsonBody(body): JsonBody<SwapBody>,
) -> Result<(StatusCode, Json<SwapRequest>), ApiError> {
    let shift_id =
        parse_opt_id(body.shift_id.as_deref())?.ok_or_else(|| ApiError::bad_request("Plantão é obrigatório"))?;
    let input = NewSwap {
        shift_id,
        target_id: parse_opt_id(body.target_id.as_deref())?,
        target_shift_id: parse_opt_id(body.target_shift_id.as_deref())?,
        reason: body.reason,
    };
    let swap = blocking(move || state.swaps().create(&actor, input, Utc::now())).await?;
    Ok((StatusCode::CREATED, Json(swap)))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapQuery {
    status: Option<String>,
    user_id: Option<String>,
}

async fn list_swaps(
    State(state): State<SharedState>,
    AuthUser(actor): AuthUser,
    Query(query): Query<SwapQuery>,
) -> Result<Json<Vec<SwapRequest>>, ApiError> {
    let status = parse_enum::<SwapStatus>(query.status.as_deref())?;
    let user_id = parse_opt_id(query.user_id.as_deref())?;
    let swaps = blocking(move || state.swaps().list(&actor, status, user_id)).await?;
    Ok(Json(swaps))
}

#[derive(Debug, Default, Deserialize)]
pub struct RespondBody {
    status: Option<String>,
}

async fn respond_swap(
    State(state): State<SharedState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<RespondBody>,
) -> Result<Json<SwapRequest>, ApiError> {
    let id = parse_id(&id)?;
    let status = parse_enum::<SwapStatus>(body.status.as_deref())?
        .ok_or_else(|| ApiError::bad_request("Status inválido. Use: aceito ou recusado"))?;
    let swap = blocking(move || {
        state
            .swaps()
            .respond(&actor, &id, SwapResponse { status }, Utc::now())
    })
    .await?;
    Ok(Json(swap))
}

async fn approve_swap(
    State(state): State<SharedState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<SwapRequest>, ApiError> {
    let id = parse_id(&id)?;
    let swap = blocking(move || state.swaps().approve(&actor, &id, Utc::now())).await?;
    Ok(Json(swap))
}

async fn cancel_swap(
    State(state): State<SharedState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<SwapRequest>, ApiError> {
    let id = parse_id(&id)?;
    let swap = blocking(move || state.swaps().cancel(&actor, &id, Utc::now())).await?;
    Ok(Json(swap))
}

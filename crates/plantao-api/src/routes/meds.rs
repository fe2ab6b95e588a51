use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use plantao_domain::{
    services::{MedicationChanges, NewMedication},
    Medication,
};
use serde::{Deserialize, Serialize};

use super::{parse_id, MessageBody};
use crate::{
    auth::{AuthUser, JsonBody},
    error::ApiError,
    state::{blocking, SharedState},
};

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_meds).post(create_med))
        .route("/{id}", get(get_med).put(update_med).delete(delete_med))
}

#[derive(Debug, Serialize)]
pub struct MedsEnvelope {
    meds: Vec<Medication>,
}

#[derive(Debug, Serialize)]
pub struct MedEnvelope {
    med: Medication,
}

#[derive(Debug, Default, Deserialize)]
pub struct MedBody {
    code: Option<String>,
    name: Option<String>,
    unit: Option<String>,
    location: Option<String>,
}

async fn list_meds(State(state): State<SharedState>, _auth: AuthUser) -> Result<Json<MedsEnvelope>, ApiError> {
    let meds = blocking(move || state.meds().list()).await?;
    Ok(Json(MedsEnvelope { meds }))
}

async fn get_med(
    State(state): State<SharedState>,
    _auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<MedEnvelope>, ApiError> {
    let id = parse_id(&id)?;
    let med = blocking(move || state.meds().get(&id)).await?;
    Ok(Json(MedEnvelope { med }))
}

async fn create_med(
    State(state): State<SharedState>,
    AuthUser(actor): AuthUser,
    JsonBody(body): JsonBody<MedBody>,
) -> Result<(StatusCode, Json<MedEnvelope>), ApiError> {
    let (Some(code), Some(name), Some(unit)) = (body.code, body.name, body.unit) else {
        return Err(ApiError::bad_request("Código, nome e unidade são obrigatórios"));
    };
    let input = NewMedication {
        code,
        name,
        unit,
        location: body.location,
    };
    let med = blocking(move || state.meds().create(&actor, input, Utc::now())).await?;
    Ok((StatusCode::CREATED, Json(MedEnvelope { med })))
}

async fn update_med(
    State(state): State<SharedState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<MedBody>,
) -> Result<Json<MedEnvelope>, ApiError> {
    let id = parse_id(&id)?;
    let changes = MedicationChanges {
        code: body.code,
        name: body.name,
        unit: body.unit,
        location: body.location,
    };
    let med = blocking(move || state.meds().update(&actor, &id, changes, Utc::now())).await?;
    Ok(Json(MedEnvelope { med }))
}

async fn delete_med(
    State(state): State<SharedState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<MessageBody>, ApiError> {
    let id = parse_id(&id)?;
    blocking(move || state.meds().delete(&actor, &id)).await?;
    Ok(Json(MessageBody::new("Medicamento deletado com sucesso")))
}

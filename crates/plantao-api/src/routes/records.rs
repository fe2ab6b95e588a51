use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use plantao_domain::{
    services::{NewRecord, ReceiveRecord, RecordChanges},
    AuditFilter, AuditLogView, RecordFilter, RecordStatus, RecordView,
};
use serde::{Deserialize, Serialize};

use super::{parse_enum, parse_id, parse_instant, parse_opt_id, range_end, range_start, MessageBody};
use crate::{
    auth::{AuthUser, JsonBody},
    error::ApiError,
    state::{blocking, SharedState},
};

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_records).post(create_record))
        .route("/audit-logs", get(audit_logs))
        .route("/{id}", get(get_record).put(update_record).delete(delete_record))
        .route("/{id}/receive", post(receive_record))
}

#[derive(Debug, Serialize)]
pub struct RecordsEnvelope {
    records: Vec<RecordView>,
}

#[derive(Debug, Serialize)]
pub struct RecordEnvelope {
    record: RecordView,
}

#[derive(Debug, Serialize)]
pub struct LogsEnvelope {
    logs: Vec<AuditLogView>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordQuery {
    med_id: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
    status: Option<String>,
    user_id: Option<String>,
}

async fn list_records(
    State(state): State<SharedState>,
    _auth: AuthUser,
    Query(query): Query<RecordQuery>,
) -> Result<Json<RecordsEnvelope>, ApiError> {
    let filter = RecordFilter {
        med_id: parse_opt_id(query.med_id.as_deref())?,
        status: parse_enum::<RecordStatus>(query.status.as_deref())?,
        user_id: parse_opt_id(query.user_id.as_deref())?,
        from: range_start(query.start_date.as_deref(), &state.policy)?,
        to: range_end(query.end_date.as_deref(), &state.policy)?,
    };
    let records = blocking(move || state.records().list(&filter)).await?;
    Ok(Json(RecordsEnvelope { records }))
}

async fn get_record(
    State(state): State<SharedState>,
    _auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<RecordEnvelope>, ApiError> {
    let id = parse_id(&id)?;
    let record = blocking(move || state.records().get(&id)).await?;
    Ok(Json(RecordEnvelope { record }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRecordBody {
    med_id: Option<String>,
    shift_start: Option<String>,
    shift_end: Option<String>,
    qty_delivered: Option<i32>,
    photo_url: Option<String>,
    notes: Option<String>,
}

async fn create_record(
    State(state): State<SharedState>,
    AuthUser(actor): AuthUser,
    JsonBody(body): JsonBody<CreateRecordBody>,
) -> Result<(StatusCode, Json<RecordEnvelope>), ApiError> {
    let (Some(med_id), Some(qty_delivered)) = (parse_opt_id(body.med_id.as_deref())?, body.qty_delivered) else {
        return Err(ApiError::bad_request("Medicamento e quantidade são obrigatórios"));
    };
    let input = NewRecord {
        med_id,
        shift_start: body.shift_start.as_deref().map(parse_instant).transpose()?,
        shift_end: body.shift_end.as_deref().map(parse_instant).transpose()?,
        qty_delivered,
        photo_url: body.photo_url,
        notes: body.notes,
    };
    let record = blocking(move || state.records().create(&actor, input, Utc::now())).await?;
    Ok((StatusCode::CREATED, Json(RecordEnvelope { record })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiveBody {
    qty_received: Option<i32>,
    notes: Option<String>,
}

async fn receive_record(
    State(state): State<SharedState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<ReceiveBody>,
) -> Result<Json<RecordEnvelope>, ApiError> {
    let id = parse_id(&id)?;
    let qty_received = body
        .qty_received
        .ok_or_else(|| ApiError::bad_request("Quantidade recebida é obrigatória"))?;
    let input = ReceiveRecord {
        qty_received,
        notes: body.notes,
    };
    let record = blocking(move || state.records().receive(&actor, &id, input, Utc::now())).await?;
    Ok(Json(RecordEnvelope { record }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRecordBody {
    qty_delivered: Option<i32>,
    qty_received: Option<i32>,
    status: Option<String>,
    photo_url: Option<String>,
}

async fn update_record(
    State(state): State<SharedState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<UpdateRecordBody>,
) -> Result<Json<RecordEnvelope>, ApiError> {
    let id = parse_id(&id)?;
    let changes = RecordChanges {
        qty_delivered: body.qty_delivered,
        qty_received: body.qty_received,
        status: parse_enum::<RecordStatus>(body.status.as_deref())?,
        photo_url: body.photo_url,
    };
    let record = blocking(move || state.records().update(&actor, &id, changes, Utc::now())).await?;
    Ok(Json(RecordEnvelope { record }))
}

async fn delete_record(
    State(state): State<SharedState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<MessageBody>, ApiError> {
    let id = parse_id(&id)?;
    blocking(move || state.records().delete(&actor, &id, Utc::now())).await?;
    Ok(Json(MessageBody::new("Registro deletado com sucesso")))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditQuery {
    record_id: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
}

async fn audit_logs(
    State(state): State<SharedState>,
    AuthUser(actor): AuthUser,
    Query(query): Query<AuditQuery>,
) -> Result<Json<LogsEnvelope>, ApiError> {
    let filter = AuditFilter {
        record_id: parse_opt_id(query.record_id.as_deref())?,
        from: range_start(query.start_date.as_deref(), &state.policy)?,
        to: range_end(query.end_date.as_deref(), &state.policy)?,
        limit: None,
    };
    let logs = blocking(move || state.records().audit_logs(&actor, filter)).await?;
    Ok(Json(LogsEnvelope { logs }))
}

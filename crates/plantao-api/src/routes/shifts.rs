use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use plantao_domain::{
    recurring::{parse_date, parse_time},
    services::{NewRecurringShifts, NewShift, ShiftChanges},
    RecurrencePattern, RecurrenceRequest, ShiftView,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{parse_id, parse_instant, parse_opt_id, range_end, range_start, MessageBody};
use crate::{
    auth::{AuthUser, JsonBody},
    error::ApiError,
    state::{blocking, SharedState},
};

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_shifts).post(create_shift))
        .route("/recurring", post(create_recurring))
        .route("/{id}", get(get_shift).put(update_shift).delete(delete_shift))
}

#[derive(Debug, Serialize)]
pub struct ShiftsEnvelope {
    shifts: Vec<ShiftView>,
}

#[derive(Debug, Serialize)]
pub struct ShiftEnvelope {
    shift: ShiftView,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftQuery {
    date: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
}

async fn list_shifts(
    State(state): State<SharedState>,
    AuthUser(actor): AuthUser,
    Query(query): Query<ShiftQuery>,
) -> Result<Json<ShiftsEnvelope>, ApiError> {
    let date = query
        .date
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .map(parse_date)
        .transpose()?;
    let from = range_start(query.start_date.as_deref(), &state.policy)?;
    let to = range_end(query.end_date.as_deref(), &state.policy)?;
    let shifts = blocking(move || state.shifts().list(&actor, date, from, to)).await?;
    Ok(Json(ShiftsEnvelope { shifts }))
}

async fn get_shift(
    State(state): State<SharedState>,
    _auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ShiftEnvelope>, ApiError> {
    let id = parse_id(&id)?;
    let shift = blocking(move || {
        let service = state.shifts();
        service.get(&id).and_then(|s| service.view(s))
    })
    .await?;
    Ok(Json(ShiftEnvelope { shift }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftBody {
    start: Option<String>,
    end: Option<String>,
    employee_id: Option<String>,
}

async fn create_shift(
    State(state): State<SharedState>,
    AuthUser(actor): AuthUser,
    JsonBody(body): JsonBody<ShiftBody>,
) -> Result<(StatusCode, Json<ShiftEnvelope>), ApiError> {
    let (Some(start), Some(end)) = (body.start, body.end) else {
        return Err(ApiError::bad_request("Data de início e fim são obrigatórias"));
    };
    let input = NewShift {
        start: parse_instant(&start)?,
        end: parse_instant(&end)?,
        employee_id: parse_opt_id(body.employee_id.as_deref())?,
    };
    let shift = blocking(move || state.shifts().create(&actor, input, Utc::now())).await?;
    Ok((StatusCode::CREATED, Json(ShiftEnvelope { shift })))
}

/// `employeeId: null` o `""` deja el plantão sin funcionario; ausente no
/// cambia nada.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateShiftBody {
    start: Option<String>,
    end: Option<String>,
    #[serde(default, deserialize_with = "present")]
    employee_id: Option<Value>,
    notification_sent: Option<bool>,
}

/// Distingue `null` explícito de campo ausente.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

fn employee_change(raw: Option<Value>) -> Result<Option<Option<uuid::Uuid>>, ApiError> {
    match raw {
        None => Ok(None),
        Some(Value::Null) => Ok(Some(None)),
        Some(Value::String(s)) => parse_opt_id(Some(&s)).map(Some),
        Some(_) => Err(ApiError::bad_request("ID inválido")),
    }
}

async fn update_shift(
    State(state): State<SharedState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<UpdateShiftBody>,
) -> Result<Json<ShiftEnvelope>, ApiError> {
    let id = parse_id(&id)?;
    let changes = ShiftChanges {
        start: body.start.as_deref().map(parse_instant).transpose()?,
        end: body.end.as_deref().map(parse_instant).transpose()?,
        employee_id: employee_change(body.employee_id)?,
        notification_sent: body.notification_sent,
    };
    let shift = blocking(move || state.shifts().update(&actor, &id, changes, Utc::now())).await?;
    Ok(Json(ShiftEnvelope { shift }))
}

async fn delete_shift(
    State(state): State<SharedState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<MessageBody>, ApiError> {
    let id = parse_id(&id)?;
    blocking(move || state.shifts().delete(&actor, &id, Utc::now())).await?;
    Ok(Json(MessageBody::new("Plantão deletado com sucesso")))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurringBody {
    employee_id: Option<String>,
    pattern: RecurrencePattern,
    start_date: Option<String>,
    end_date: Option<String>,
    shift_start: Option<String>,
    shift_end: Option<String>,
    #[serde(default)]
    custom_days: Vec<u32>,
}

#[derive(Debug, Serialize)]
pub struct RecurringResponse {
    message: String,
    count: usize,
}

fn created_message(count: usize) -> String {
    if count == 1 {
        "1 plantão criado com sucesso".to_string()
    } else {
        format!("{count} plantões criados com sucesso")
    }
}

async fn create_recurring(
    State(state): State<SharedState>,
    AuthUser(actor): AuthUser,
    JsonBody(body): JsonBody<RecurringBody>,
) -> Result<Json<RecurringResponse>, ApiError> {
    let (Some(shift_start), Some(shift_end)) = (body.shift_start, body.shift_end) else {
        return Err(ApiError::bad_request("Horários de início e fim são obrigatórios"));
    };
    let (Some(start_date), Some(end_date)) = (body.start_date, body.end_date) else {
        return Err(ApiError::bad_request("Período (data inicial e final) é obrigatório"));
    };
    let input = NewRecurringShifts {
        employee_id: parse_opt_id(body.employee_id.as_deref())?,
        request: RecurrenceRequest {
            pattern: body.pattern,
            start_date: parse_date(&start_date)?,
            end_date: parse_date(&end_date)?,
            shift_start: parse_time(&shift_start)?,
            shift_end: parse_time(&shift_end)?,
            custom_days: body.custom_days,
        },
    };
    let count = blocking(move || state.shifts().create_recurring(&actor, input, Utc::now())).await?;
    Ok(Json(RecurringResponse {
        message: created_message(count),
        count,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn employee_can_be_cleared_or_kept() {
        assert_eq!(employee_change(None).unwrap(), None);
        assert_eq!(employee_change(Some(Value::Null)).unwrap(), Some(None));
        assert_eq!(employee_change(Some(Value::String(String::new()))).unwrap(), Some(None));
        assert!(employee_change(Some(Value::from(3))).is_err());
    }

    #[test]
    fn explicit_null_differs_from_missing() {
        let body: UpdateShiftBody = serde_json::from_str(r#"{"employeeId": null}"#).unwrap();
        assert_eq!(body.employee_id, Some(Value::Null));
        let body: UpdateShiftBody = serde_json::from_str("{}").unwrap();
        assert_eq!(body.employee_id, None);
    }

    #[test]
    fn recurring_message_is_pluralized() {
        assert_eq!(created_message(1), "1 plantão criado com sucesso");
        assert_eq!(created_message(15), "15 plantões criados com sucesso");
    }
}

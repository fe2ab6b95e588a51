use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use plantao_domain::{recurring::parse_date, services::NewAbsence, services::Policy, Absence, AbsenceFilter};
use serde::Deserialize;

use super::{parse_id, parse_instant, parse_opt_id, range_end, range_start, MessageBody};
use crate::{
    auth::{AuthUser, JsonBody},
    error::ApiError,
    state::{blocking, SharedState},
};

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_absences).post(create_absence))
        .route("/{id}", delete(delete_absence))
}

/// Acepta `YYYY-MM-DD` o un instante completo; en ese caso vale el día local.
fn absence_day(raw: &str, policy: &Policy) -> Result<NaiveDate, ApiError> {
    let raw = raw.trim();
    if raw.len() == 10 {
        return Ok(parse_date(raw)?);
    }
    Ok(parse_instant(raw)?.with_timezone(&policy.offset).date_naive())
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbsenceBody {
    user_id: Option<String>,
    date: Option<String>,
    reason: Option<String>,
    description: Option<String>,
}

async fn create_absence(
    State(state): State<SharedState>,
    AuthUser(actor): AuthUser,
    JsonBody(body): JsonBody<AbsenceBody>,
) -> Result<(StatusCode, Json<Absence>), ApiError> {
    let (Some(user_id), Some(date)) = (parse_opt_id(body.user_id.as_deref())?, body.date) else {
        return Err(ApiError::bad_request("Usuário e data são obrigatórios"));
    };
    let input = NewAbsence {
        user_id,
        date: absence_day(&date, &state.policy)?,
        reason: body.reason,
        description: body.description,
    };
    let absence = blocking(move || state.absences().create(&actor, input, Utc::now())).await?;
    Ok((StatusCode::CREATED, Json(absence)))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbsenceQuery {
    start_date: Option<String>,
    end_date: Option<String>,
    user_id: Option<String>,
}

async fn list_absences(
    State(state): State<SharedState>,
    _auth: AuthUser,
    Query(query): Query<AbsenceQuery>,
) -> Result<Json<Vec<Absence>>, ApiError> {
    let filter = AbsenceFilter {
        user_id: parse_opt_id(query.user_id.as_deref())?,
        from: range_start(query.start_date.as_deref(), &state.policy)?,
        to: range_end(query.end_date.as_deref(), &state.policy)?,
    };
    let absences = blocking(move || state.absences().list(&filter)).await?;
    Ok(Json(absences))
}

async fn delete_absence(
    State(state): State<SharedState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<MessageBody>, ApiError> {
    let id = parse_id(&id)?;
    blocking(move || state.absences().delete(&actor, &id, Utc::now())).await?;
    Ok(Json(MessageBody::new("Ausência removida com sucesso")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instants_resolve_to_the_local_day() {
        let policy = Policy::new(120, -180, 4).unwrap();
        let day = absence_day("2025-03-11T01:30:00Z", &policy).unwrap();
        assert_eq!(day, NaiveDate::from_ymd_opt(2025, 3, 10).unwrap());
        let day = absence_day("2025-03-11", &policy).unwrap();
        assert_eq!(day, NaiveDate::from_ymd_opt(2025, 3, 11).unwrap());
    }
}

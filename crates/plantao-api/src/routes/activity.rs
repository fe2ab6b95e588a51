use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use plantao_domain::{ActivityFilter, ActivityKind, ActivityLog, ActivityStats};
use serde::Deserialize;

use super::{parse_enum, parse_opt_id, range_end, range_start};
use crate::{
    auth::AuthUser,
    error::ApiError,
    state::{blocking, SharedState},
};

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_activities))
        .route("/stats", get(stats))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityQuery {
    #[serde(rename = "type")]
    kind: Option<String>,
    user_id: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
    limit: Option<String>,
}

async fn list_activities(
    State(state): State<SharedState>,
    AuthUser(actor): AuthUser,
    Query(query): Query<ActivityQuery>,
) -> Result<Json<Vec<ActivityLog>>, ApiError> {
    let limit = match query.limit.as_deref().map(str::trim).filter(|l| !l.is_empty()) {
        Some(l) => Some(
            l.parse::<i64>()
                .map_err(|_| ApiError::bad_request(format!("Limite inválido: {l}")))?,
        ),
        None => None,
    };
    let filter = ActivityFilter {
        kind: parse_enum::<ActivityKind>(query.kind.as_deref())?,
        user_id: parse_opt_id(query.user_id.as_deref())?,
        from: range_start(query.start_date.as_deref(), &state.policy)?,
        to: range_end(query.end_date.as_deref(), &state.policy)?,
        limit,
    };
    let activities = blocking(move || state.activity().list(&actor, &filter)).await?;
    Ok(Json(activities))
}

async fn stats(State(state): State<SharedState>, AuthUser(actor): AuthUser) -> Result<Json<ActivityStats>, ApiError> {
    let stats = blocking(move || state.activity().stats(&actor, Utc::now())).await?;
    Ok(Json(stats))
}

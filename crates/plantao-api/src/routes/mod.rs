//! Handlers HTTP agrupados por recurso.

use axum::Router;
use chrono::{DateTime, Duration, Utc};
use plantao_domain::{recurring::parse_date, services::Policy};
use serde::Serialize;
use uuid::Uuid;

use crate::{error::ApiError, state::SharedState};

pub mod absences;
pub mod activity;
pub mod auth;
pub mod meds;
pub mod notify;
pub mod records;
pub mod shifts;
pub mod swaps;
pub mod users;

/// Todas las rutas bajo `/api`.
pub fn api_router() -> Router<SharedState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/users", users::router())
        .nest("/shifts", shifts::router())
        .nest("/meds", meds::router())
        .nest("/records", records::router())
        .nest("/swaps", swaps::router())
        .nest("/absences", absences::router())
        .nest("/activity", activity::router())
        .nest("/notify", notify::router())
}

#[derive(Debug, Serialize)]
pub struct MessageBody {
    pub message: String,
}

impl MessageBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub(crate) fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::bad_request("ID inválido"))
}

/// Cadena vacía o ausente → `None`.
pub(crate) fn parse_opt_id(raw: Option<&str>) -> Result<Option<Uuid>, ApiError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => parse_id(s).map(Some),
        None => Ok(None),
    }
}

pub(crate) fn parse_instant(raw: &str) -> Result<DateTime<Utc>, ApiError> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ApiError::bad_request(format!("Data inválida: {raw}")))
}

/// Límite inferior de un filtro: instante RFC 3339 o día local `YYYY-MM-DD`
/// (desde las 00:00).
pub(crate) fn range_start(raw: Option<&str>, policy: &Policy) -> Result<Option<DateTime<Utc>>, ApiError> {
    range_bound(raw, policy, false)
}

/// Límite superior inclusivo; un día sin hora cubre hasta el final del día.
pub(crate) fn range_end(raw: Option<&str>, policy: &Policy) -> Result<Option<DateTime<Utc>>, ApiError> {
    range_bound(raw, policy, true)
}

fn range_bound(raw: Option<&str>, policy: &Policy, end: bool) -> Result<Option<DateTime<Utc>>, ApiError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    if raw.len() == 10 {
        let (from, to) = policy.day_bounds(parse_date(raw)?);
        return Ok(Some(if end { to - Duration::milliseconds(1) } else { from }));
    }
    parse_instant(raw).map(Some)
}

pub(crate) fn parse_enum<T>(raw: Option<&str>) -> Result<Option<T>, ApiError>
where
    T: std::str::FromStr<Err = plantao_domain::DomainError>,
{
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse::<T>)
        .transpose()
        .map_err(ApiError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn date_only_bounds_cover_the_local_day() {
        let policy = Policy::new(120, -180, 4).unwrap();
        let from = range_start(Some("2025-03-10"), &policy).unwrap().unwrap();
        let to = range_end(Some("2025-03-10"), &policy).unwrap().unwrap();
        assert_eq!(from, Utc.with_ymd_and_hms(2025, 3, 10, 3, 0, 0).unwrap());
        assert_eq!(to, Utc.with_ymd_and_hms(2025, 3, 11, 3, 0, 0).unwrap() - Duration::milliseconds(1));

        let exact = range_end(Some("2025-03-10T12:00:00Z"), &policy).unwrap().unwrap();
        assert_eq!(exact, Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap());
        assert!(range_start(Some("ontem"), &policy).is_err());
        assert_eq!(range_start(Some(" "), &policy).unwrap(), None);
    }

    #[test]
    fn ids_are_validated() {
        assert!(matches!(parse_id("abc"), Err(ApiError::BadRequest(_))));
        assert_eq!(parse_opt_id(Some("")).unwrap(), None);
    }
}

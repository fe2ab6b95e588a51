// shift.rs
use crate::{DomainError, UserSummary};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tolerancia por defecto alrededor del plantão para entregar/recibir.
pub const DEFAULT_TOLERANCE_MINUTES: i64 = 120;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shift {
  pub id: Uuid,
  pub start: DateTime<Utc>,
  pub end: DateTime<Utc>,
  pub employee_id: Option<Uuid>,
  pub notification_sent: bool,
  pub created_by: String,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Shift {
  pub fn new(start: DateTime<Utc>,
             end: DateTime<Utc>,
             employee_id: Option<Uuid>,
             created_by: &str,
             now: DateTime<Utc>)
             -> Result<Self, DomainError> {
    validate_interval(start, end)?;
    Ok(Self { id: Uuid::new_v4(),
              start,
              end,
              employee_id,
              notification_sent: false,
              created_by: created_by.to_string(),
              created_at: now,
              updated_at: now })
  }

  pub fn overlaps(&self, other: &Shift) -> bool {
    overlaps(self.start, self.end, other.start, other.end)
  }

  pub fn within_tolerance(&self, now: DateTime<Utc>, tolerance: Duration) -> bool {
    within_tolerance(self.start, self.end, now, tolerance)
  }

  pub fn handover_phase(&self, now: DateTime<Utc>, tolerance: Duration) -> HandoverPhase {
    handover_phase(self.start, self.end, now, tolerance)
  }
}

/// Intervalos semiabiertos `[start, end)`: un plantão que termina a las 08:00
/// no choca con otro que empieza a las 08:00.
pub fn overlaps(a_start: DateTime<Utc>, a_end: DateTime<Utc>, b_start: DateTime<Utc>, b_end: DateTime<Utc>) -> bool {
  a_start < b_end && b_start < a_end
}

pub fn validate_interval(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), DomainError> {
  if start >= end {
    return Err(DomainError::validation("O fim do plantão deve ser posterior ao início"));
  }
  Ok(())
}

pub fn within_tolerance(start: DateTime<Utc>, end: DateTime<Utc>, now: DateTime<Utc>, tolerance: Duration) -> bool {
  now >= start - tolerance && now <= end + tolerance
}

/// En qué momento del plantão está el funcionario respecto a la passagem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandoverPhase {
  /// Dentro de la tolerancia tras el inicio: recibe del plantão anterior.
  pub receiving: bool,
  /// Dentro de la tolerancia antes del fin: entrega al siguiente.
  pub delivering: bool,
}

pub fn handover_phase(start: DateTime<Utc>, end: DateTime<Utc>, now: DateTime<Utc>, tolerance: Duration) -> HandoverPhase {
  let since_start = now - start;
  let until_end = end - now;
  HandoverPhase { receiving: since_start >= Duration::zero() && since_start <= tolerance,
                  delivering: until_end >= Duration::zero() && until_end <= tolerance }
}

/// Plantão con el funcionario asignado ya resuelto, tal como lo consume el SPA.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ShiftView {
  #[serde(flatten)]
  pub shift: Shift,
  pub employee: Option<UserSummary>,
}

#[derive(Debug, Clone, Default)]
pub struct ShiftFilter {
  pub employee_id: Option<Uuid>,
  /// Plantões que intersectan el intervalo semiabierto `[from, to)`.
  pub overlapping: Option<(DateTime<Utc>, DateTime<Utc>)>,
  pub start_from: Option<DateTime<Utc>>,
  pub start_to: Option<DateTime<Utc>>,
}

impl ShiftFilter {
  pub fn matches(&self, s: &Shift) -> bool {
    if let Some(e) = self.employee_id {
      if s.employee_id != Some(e) {
        return false;
      }
    }
    if let Some((from, to)) = self.overlapping {
      if !overlaps(s.start, s.end, from, to) {
        return false;
      }
    }
    if let Some(from) = self.start_from {
      if s.start < from {
        return false;
      }
    }
    if let Some(to) = self.start_to {
      if s.start > to {
        return false;
      }
    }
    true
  }
}

// activity.rs
use crate::{Actor, DomainError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub const DEFAULT_ACTIVITY_LIMIT: i64 = 50;
pub const MAX_ACTIVITY_LIMIT: i64 = 500;

macro_rules! activity_kinds {
  ($($variant:ident => $wire:literal),+ $(,)?) => {
    /// Tipos de evento de la timeline.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub enum ActivityKind {
      $(#[serde(rename = $wire)] $variant),+
    }

    impl ActivityKind {
      pub fn as_str(&self) -> &'static str {
        match self {
          $(ActivityKind::$variant => $wire),+
        }
      }
    }

    impl FromStr for ActivityKind {
      type Err = DomainError;

      fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
          $($wire => Ok(ActivityKind::$variant),)+
          other => Err(DomainError::validation(format!("Tipo de atividade inválido: {}", other))),
        }
      }
    }
  };
}

activity_kinds! {
  RecordCreated => "record_created",
  RecordReceived => "record_received",
  RecordUpdated => "record_updated",
  RecordDeleted => "record_deleted",
  SwapRequested => "swap_requested",
  SwapAccepted => "swap_accepted",
  SwapRejected => "swap_rejected",
  SwapApproved => "swap_approved",
  SwapCancelled => "swap_cancelled",
  AbsenceCreated => "absence_created",
  AbsenceDeleted => "absence_deleted",
  ShiftCreated => "shift_created",
  ShiftUpdated => "shift_updated",
  ShiftDeleted => "shift_deleted",
  ShiftsGenerated => "shifts_generated",
  UserCreated => "user_created",
  UserUpdated => "user_updated",
  UserDeactivated => "user_deactivated",
}

impl fmt::Display for ActivityKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Entrada append-only de la timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLog {
  pub id: Uuid,
  #[serde(rename = "type")]
  pub kind: ActivityKind,
  pub user_id: Uuid,
  pub user_name: String,
  pub user_email: Option<String>,
  pub entity_type: String,
  pub entity_id: Uuid,
  pub description: String,
  pub metadata: serde_json::Value,
  pub created_at: DateTime<Utc>,
}

impl ActivityLog {
  pub fn new(kind: ActivityKind,
             actor: &Actor,
             entity_type: &str,
             entity_id: Uuid,
             description: impl Into<String>,
             metadata: serde_json::Value,
             now: DateTime<Utc>)
             -> Self {
    Self { id: Uuid::new_v4(),
           kind,
           user_id: actor.id,
           user_name: actor.name.clone(),
           user_email: Some(actor.email.clone()),
           entity_type: entity_type.to_string(),
           entity_id,
           description: description.into(),
           metadata,
           created_at: now }
  }
}

#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
  pub kind: Option<ActivityKind>,
  pub user_id: Option<Uuid>,
  pub from: Option<DateTime<Utc>>,
  pub to: Option<DateTime<Utc>>,
  pub limit: Option<i64>,
}

impl ActivityFilter {
  pub fn matches(&self, a: &ActivityLog) -> bool {
    self.kind.is_none_or(|k| a.kind == k)
    && self.user_id.is_none_or(|u| a.user_id == u)
    && self.from.is_none_or(|f| a.created_at >= f)
    && self.to.is_none_or(|t| a.created_at <= t)
  }

  pub fn effective_limit(&self) -> i64 {
    self.limit.unwrap_or(DEFAULT_ACTIVITY_LIMIT).clamp(1, MAX_ACTIVITY_LIMIT)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityStats {
  pub today_activities: i64,
  pub records_created_today: i64,
  pub records_received_today: i64,
  pub pending_swaps: i64,
  pub absences_today: i64,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn kind_wire_names_round_trip_through_from_str() {
    for k in [ActivityKind::RecordCreated, ActivityKind::SwapCancelled, ActivityKind::ShiftsGenerated] {
      assert_eq!(k.as_str().parse::<ActivityKind>().unwrap(), k);
      assert_eq!(serde_json::to_value(k).unwrap(), serde_json::json!(k.as_str()));
    }
  }

  #[test]
  fn limit_is_clamped() {
    let f = ActivityFilter { limit: Some(10_000), ..Default::default() };
    assert_eq!(f.effective_limit(), MAX_ACTIVITY_LIMIT);
    assert_eq!(ActivityFilter::default().effective_limit(), DEFAULT_ACTIVITY_LIMIT);
  }
}

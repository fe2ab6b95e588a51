// absence.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_REASON: &str = "folga";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Absence {
  pub id: Uuid,
  pub user_id: Uuid,
  pub user_name: String,
  pub user_email: Option<String>,
  pub date: DateTime<Utc>,
  pub reason: String,
  pub description: Option<String>,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct AbsenceFilter {
  pub user_id: Option<Uuid>,
  pub from: Option<DateTime<Utc>>,
  pub to: Option<DateTime<Utc>>,
}

impl AbsenceFilter {
  pub fn matches(&self, a: &Absence) -> bool {
    self.user_id.is_none_or(|u| a.user_id == u)
    && self.from.is_none_or(|f| a.date >= f)
    && self.to.is_none_or(|t| a.date <= t)
  }
}

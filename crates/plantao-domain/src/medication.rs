// medication.rs
use crate::DomainError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Medication {
  pub id: Uuid,
  pub code: String,
  pub name: String,
  pub unit: String,
  pub location: Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Medication {
  pub fn new(code: &str,
             name: &str,
             unit: &str,
             location: Option<String>,
             now: DateTime<Utc>)
             -> Result<Self, DomainError> {
    if code.trim().is_empty() || name.trim().is_empty() || unit.trim().is_empty() {
      return Err(DomainError::validation("Código, nome e unidade são obrigatórios"));
    }
    Ok(Self { id: Uuid::new_v4(),
              code: normalize_code(code),
              name: name.trim().to_string(),
              unit: unit.trim().to_string(),
              location: location.map(|l| l.trim().to_string()).filter(|l| !l.is_empty()),
              created_at: now,
              updated_at: now })
  }
}

pub fn normalize_code(code: &str) -> String {
  code.trim().to_uppercase()
}

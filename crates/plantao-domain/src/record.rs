// record.rs
use crate::{DomainError, Medication, UserSummary};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
  Pendente,
  Finalizado,
  Discrepancia,
}

impl RecordStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      RecordStatus::Pendente => "pendente",
      RecordStatus::Finalizado => "finalizado",
      RecordStatus::Discrepancia => "discrepancia",
    }
  }

  /// Estado tras la conferencia: cualquier diferencia es una discrepância.
  pub fn after_receipt(qty_delivered: i32, qty_received: i32) -> Self {
    if qty_delivered == qty_received {
      RecordStatus::Finalizado
    } else {
      RecordStatus::Discrepancia
    }
  }
}

impl fmt::Display for RecordStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for RecordStatus {
  type Err = DomainError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim() {
      "pendente" => Ok(RecordStatus::Pendente),
      "finalizado" => Ok(RecordStatus::Finalizado),
      "discrepancia" => Ok(RecordStatus::Discrepancia),
      other => Err(DomainError::validation(format!("Status inválido: {}", other))),
    }
  }
}

/// Registro de passagem de plantão de un medicamento controlado.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
  pub id: Uuid,
  pub med_id: Uuid,
  pub shift_start: Option<DateTime<Utc>>,
  pub shift_end: Option<DateTime<Utc>>,
  pub qty_delivered: i32,
  pub qty_received: Option<i32>,
  pub delivered_by_id: Uuid,
  pub delivered_at: DateTime<Utc>,
  pub received_by_id: Option<Uuid>,
  pub received_at: Option<DateTime<Utc>>,
  pub photo_url: Option<String>,
  pub notes: Option<String>,
  pub status: RecordStatus,
  pub created_by: String,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Record {
  pub fn is_received(&self) -> bool {
    self.received_by_id.is_some()
  }

  /// Marca el registro como recibido y recalcula el estado.
  pub fn receive(&mut self,
                 receiver: Uuid,
                 qty_received: i32,
                 notes: Option<String>,
                 now: DateTime<Utc>)
                 -> Result<RecordStatus, DomainError> {
    if self.is_received() {
      return Err(DomainError::validation("Registro já foi recebido"));
    }
    validate_quantity(qty_received)?;
    let status = RecordStatus::after_receipt(self.qty_delivered, qty_received);
    self.qty_received = Some(qty_received);
    self.received_by_id = Some(receiver);
    self.received_at = Some(now);
    self.notes = notes.or_else(|| self.notes.take());
    self.status = status;
    self.updated_at = now;
    Ok(status)
  }
}

pub fn validate_quantity(qty: i32) -> Result<(), DomainError> {
  if qty < 0 {
    return Err(DomainError::validation("Quantidade não pode ser negativa"));
  }
  Ok(())
}

/// Condición que la fila guardada tiene que cumplir en el momento de escribir
/// la nueva versión del registro.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordGuard {
  /// Nadie lo recibió todavía.
  Unreceived,
  /// Sin escrituras desde la versión leída (su `updated_at`).
  UpdatedAt(DateTime<Utc>),
}

impl RecordGuard {
  pub fn holds(&self, stored: &Record) -> bool {
    match self {
      RecordGuard::Unreceived => !stored.is_received(),
      RecordGuard::UpdatedAt(at) => stored.updated_at == *at,
    }
  }

  pub fn conflict(&self) -> DomainError {
    match self {
      RecordGuard::Unreceived => DomainError::validation("Registro já foi recebido"),
      RecordGuard::UpdatedAt(_) => {
        DomainError::validation("Registro foi alterado por outra operação. Recarregue e tente novamente")
      }
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditAction {
  Create,
  Receive,
  Update,
  Delete,
}

impl AuditAction {
  pub fn as_str(&self) -> &'static str {
    match self {
      AuditAction::Create => "CREATE",
      AuditAction::Receive => "RECEIVE",
      AuditAction::Update => "UPDATE",
      AuditAction::Delete => "DELETE",
    }
  }
}

impl FromStr for AuditAction {
  type Err = DomainError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "CREATE" => Ok(AuditAction::Create),
      "RECEIVE" => Ok(AuditAction::Receive),
      "UPDATE" => Ok(AuditAction::Update),
      "DELETE" => Ok(AuditAction::Delete),
      other => Err(DomainError::SerializationError(format!("acción de auditoría desconocida: {}", other))),
    }
  }
}

/// Entrada de la trilha de auditoria de un registro. Se conserva aun después
/// de borrar el registro.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLog {
  pub id: Uuid,
  pub record_id: Uuid,
  pub action: AuditAction,
  pub field: Option<String>,
  pub old_value: Option<String>,
  pub new_value: Option<String>,
  pub user_email: String,
  pub created_at: DateTime<Utc>,
}

impl AuditLog {
  pub fn new(record_id: Uuid,
             action: AuditAction,
             field: Option<&str>,
             old_value: Option<String>,
             new_value: Option<String>,
             user_email: &str,
             now: DateTime<Utc>)
             -> Self {
    Self { id: Uuid::new_v4(),
           record_id,
           action,
           field: field.map(str::to_string),
           old_value,
           new_value,
           user_email: user_email.to_string(),
           created_at: now }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RecordView {
  #[serde(flatten)]
  pub record: Record,
  pub med: Option<Medication>,
  pub delivered_by: Option<UserSummary>,
  pub received_by: Option<UserSummary>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub audit_logs: Option<Vec<AuditLog>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuditRecordRef {
  pub id: Uuid,
  pub med: Option<MedRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MedRef {
  pub name: String,
  pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogView {
  #[serde(flatten)]
  pub log: AuditLog,
  /// `None` cuando el registro ya fue eliminado.
  pub record: Option<AuditRecordRef>,
}

#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
  pub med_id: Option<Uuid>,
  pub status: Option<RecordStatus>,
  /// Entregado o recibido por este usuario.
  pub user_id: Option<Uuid>,
  pub from: Option<DateTime<Utc>>,
  pub to: Option<DateTime<Utc>>,
}

impl RecordFilter {
  pub fn matches(&self, r: &Record) -> bool {
    self.med_id.is_none_or(|m| r.med_id == m)
    && self.status.is_none_or(|s| r.status == s)
    && self.user_id.is_none_or(|u| r.delivered_by_id == u || r.received_by_id == Some(u))
    && self.from.is_none_or(|f| r.created_at >= f)
    && self.to.is_none_or(|t| r.created_at <= t)
  }
}

#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
  pub record_id: Option<Uuid>,
  pub from: Option<DateTime<Utc>>,
  pub to: Option<DateTime<Utc>>,
  pub limit: Option<i64>,
}

impl AuditFilter {
  pub fn matches(&self, a: &AuditLog) -> bool {
    self.record_id.is_none_or(|r| a.record_id == r)
    && self.from.is_none_or(|f| a.created_at >= f)
    && self.to.is_none_or(|t| a.created_at <= t)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sample() -> Record {
    let now = Utc::now();
    Record { id: Uuid::new_v4(),
             med_id: Uuid::new_v4(),
             shift_start: None,
             shift_end: None,
             qty_delivered: 30,
             qty_received: None,
             delivered_by_id: Uuid::new_v4(),
             delivered_at: now,
             received_by_id: None,
             received_at: None,
             photo_url: None,
             notes: None,
             status: RecordStatus::Pendente,
             created_by: "a@farm.com".into(),
             created_at: now,
             updated_at: now }
  }

  #[test]
  fn receipt_sets_status_from_quantities() {
    let mut r = sample();
    assert_eq!(r.receive(Uuid::new_v4(), 30, None, Utc::now()).unwrap(), RecordStatus::Finalizado);
    let mut r = sample();
    assert_eq!(r.receive(Uuid::new_v4(), 29, Some("faltou 1".into()), Utc::now()).unwrap(),
               RecordStatus::Discrepancia);
    assert_eq!(r.notes.as_deref(), Some("faltou 1"));
  }

  #[test]
  fn second_receipt_is_rejected() {
    let mut r = sample();
    r.receive(Uuid::new_v4(), 30, None, Utc::now()).unwrap();
    assert!(matches!(r.receive(Uuid::new_v4(), 30, None, Utc::now()), Err(DomainError::ValidationError(_))));
  }
}

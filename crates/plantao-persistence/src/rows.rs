// Filas Diesel y su conversión desde/hacia las entidades del dominio.
use crate::schema;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use plantao_domain::{Absence, ActivityLog, AuditLog, DomainError, Medication, Record, Shift, SwapRequest, User};
use uuid::Uuid;

pub(crate) fn to_ms(dt: DateTime<Utc>) -> i64 {
  dt.timestamp_millis()
}

fn from_ms(ms: i64) -> Result<DateTime<Utc>, DomainError> {
  DateTime::from_timestamp_millis(ms).ok_or_else(|| DomainError::SerializationError(format!("timestamp inválido: {}", ms)))
}

fn opt_from_ms(ms: Option<i64>) -> Result<Option<DateTime<Utc>>, DomainError> {
  ms.map(from_ms).transpose()
}

fn parse_id(s: &str) -> Result<Uuid, DomainError> {
  Uuid::parse_str(s).map_err(|e| DomainError::SerializationError(format!("uuid inválido '{}': {}", s, e)))
}

fn opt_id(s: Option<String>) -> Result<Option<Uuid>, DomainError> {
  s.as_deref().map(parse_id).transpose()
}

#[derive(Debug, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = schema::users)]
#[diesel(treat_none_as_null = true)]
pub(crate) struct UserRow {
  pub id: String,
  pub email: String,
  pub name: String,
  pub password_hash: String,
  pub role: String,
  pub telefone: Option<String>,
  pub telefone_whatsapp: Option<String>,
  pub callmebot_key: Option<String>,
  pub active: bool,
  pub first_login: bool,
  pub created_at_ms: i64,
  pub updated_at_ms: i64,
}

impl From<&User> for UserRow {
  fn from(u: &User) -> Self {
    Self { id: u.id.to_string(),
           email: u.email.clone(),
           name: u.name.clone(),
           password_hash: u.password_hash.clone(),
           role: u.role.as_str().to_string(),
           telefone: u.telefone.clone(),
           telefone_whatsapp: u.telefone_whatsapp.clone(),
           callmebot_key: u.callmebot_key.clone(),
           active: u.active,
           first_login: u.first_login,
           created_at_ms: to_ms(u.created_at),
           updated_at_ms: to_ms(u.updated_at) }
  }
}

impl TryFrom<UserRow> for User {
  type Error = DomainError;

  fn try_from(r: UserRow) -> Result<Self, Self::Error> {
    Ok(User { id: parse_id(&r.id)?,
              email: r.email,
              name: r.name,
              password_hash: r.password_hash,
              // filas antiguas pueden contener "assistente"
              role: r.role.parse()?,
              telefone: r.telefone,
              telefone_whatsapp: r.telefone_whatsapp,
              callmebot_key: r.callmebot_key,
              active: r.active,
              first_login: r.first_login,
              created_at: from_ms(r.created_at_ms)?,
              updated_at: from_ms(r.updated_at_ms)? })
  }
}

#[derive(Debug, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = schema::medications)]
#[diesel(treat_none_as_null = true)]
pub(crate) struct MedicationRow {
  pub id: String,
  pub code: String,
  pub name: String,
  pub unit: String,
  pub location: Option<String>,
  pub created_at_ms: i64,
  pub updated_at_ms: i64,
}

impl From<&Medication> for MedicationRow {
  fn from(m: &Medication) -> Self {
    Self { id: m.id.to_string(),
           code: m.code.clone(),
           name: m.name.clone(),
           unit: m.unit.clone(),
           location: m.location.clone(),
           created_at_ms: to_ms(m.created_at),
           updated_at_ms: to_ms(m.updated_at) }
  }
}

impl TryFrom<MedicationRow> for Medication {
  type Error = DomainError;

  fn try_from(r: MedicationRow) -> Result<Self, Self::Error> {
    Ok(Medication { id: parse_id(&r.id)?,
                    code: r.code,
                    name: r.name,
                    unit: r.unit,
                    location: r.location,
                    created_at: from_ms(r.created_at_ms)?,
                    updated_at: from_ms(r.updated_at_ms)? })
  }
}

#[derive(Debug, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = schema::shifts)]
#[diesel(treat_none_as_null = true)]
pub(crate) struct ShiftRow {
  pub id: String,
  pub start_ms: i64,
  pub end_ms: i64,
  pub employee_id: Option<String>,
  pub notification_sent: bool,
  pub created_by: String,
  pub created_at_ms: i64,
  pub updated_at_ms: i64,
}

impl From<&Shift> for ShiftRow {
  fn from(s: &Shift) -> Self {
    Self { id: s.id.to_string(),
           start_ms: to_ms(s.start),
           end_ms: to_ms(s.end),
           employee_id: s.employee_id.map(|e| e.to_string()),
           notification_sent: s.notification_sent,
           created_by: s.created_by.clone(),
           created_at_ms: to_ms(s.created_at),
           updated_at_ms: to_ms(s.updated_at) }
  }
}

impl TryFrom<ShiftRow> for Shift {
  type Error = DomainError;

  fn try_from(r: ShiftRow) -> Result<Self, Self::Error> {
    Ok(Shift { id: parse_id(&r.id)?,
               start: from_ms(r.start_ms)?,
               end: from_ms(r.end_ms)?,
               employee_id: opt_id(r.employee_id)?,
               notification_sent: r.notification_sent,
               created_by: r.created_by,
               created_at: from_ms(r.created_at_ms)?,
               updated_at: from_ms(r.updated_at_ms)? })
  }
}

#[derive(Debug, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = schema::records)]
#[diesel(treat_none_as_null = true)]
pub(crate) struct RecordRow {
  pub id: String,
  pub med_id: String,
  pub shift_start_ms: Option<i64>,
  pub shift_end_ms: Option<i64>,
  pub qty_delivered: i32,
  pub qty_received: Option<i32>,
  pub delivered_by_id: String,
  pub delivered_at_ms: i64,
  pub received_by_id: Option<String>,
  pub received_at_ms: Option<i64>,
  pub photo_url: Option<String>,
  pub notes: Option<String>,
  pub status: String,
  pub created_by: String,
  pub created_at_ms: i64,
  pub updated_at_ms: i64,
}

impl From<&Record> for RecordRow {
  fn from(r: &Record) -> Self {
    Self { id: r.id.to_string(),
           med_id: r.med_id.to_string(),
           shift_start_ms: r.shift_start.map(to_ms),
           shift_end_ms: r.shift_end.map(to_ms),
           qty_delivered: r.qty_delivered,
           qty_received: r.qty_received,
           delivered_by_id: r.delivered_by_id.to_string(),
           delivered_at_ms: to_ms(r.delivered_at),
           received_by_id: r.received_by_id.map(|u| u.to_string()),
           received_at_ms: r.received_at.map(to_ms),
           photo_url: r.photo_url.clone(),
           notes: r.notes.clone(),
           status: r.status.as_str().to_string(),
           created_by: r.created_by.clone(),
           created_at_ms: to_ms(r.created_at),
           updated_at_ms: to_ms(r.updated_at) }
  }
}

impl TryFrom<RecordRow> for Record {
  type Error = DomainError;

  fn try_from(r: RecordRow) -> Result<Self, Self::Error> {
    Ok(Record { id: parse_id(&r.id)?,
                med_id: parse_id(&r.med_id)?,
                shift_start: opt_from_ms(r.shift_start_ms)?,
                shift_end: opt_from_ms(r.shift_end_ms)?,
                qty_delivered: r.qty_delivered,
                qty_received: r.qty_received,
                delivered_by_id: parse_id(&r.delivered_by_id)?,
                delivered_at: from_ms(r.delivered_at_ms)?,
                received_by_id: opt_id(r.received_by_id)?,
                received_at: opt_from_ms(r.received_at_ms)?,
                photo_url: r.photo_url,
                notes: r.notes,
                status: r.status.parse()?,
                created_by: r.created_by,
                created_at: from_ms(r.created_at_ms)?,
                updated_at: from_ms(r.updated_at_ms)? })
  }
}

#[derive(Debug, Queryable, Selectable, Insertable)]
#[diesel(table_name = schema::audit_logs)]
pub(crate) struct AuditLogRow {
  pub id: String,
  pub record_id: String,
  pub action: String,
  pub field: Option<String>,
  pub old_value: Option<String>,
  pub new_value: Option<String>,
  pub user_email: String,
  pub created_at_ms: i64,
}

impl From<&AuditLog> for AuditLogRow {
  fn from(a: &AuditLog) -> Self {
    Self { id: a.id.to_string(),
           record_id: a.record_id.to_string(),
           action: a.action.as_str().to_string(),
           field: a.field.clone(),
           old_value: a.old_value.clone(),
           new_value: a.new_value.clone(),
           user_email: a.user_email.clone(),
           created_at_ms: to_ms(a.created_at) }
  }
}

impl TryFrom<AuditLogRow> for AuditLog {
  type Error = DomainError;

  fn try_from(r: AuditLogRow) -> Result<Self, Self::Error> {
    Ok(AuditLog { id: parse_id(&r.id)?,
                  record_id: parse_id(&r.record_id)?,
                  action: r.action.parse()?,
                  field: r.field,
                  old_value: r.old_value,
                  new_value: r.new_value,
                  user_email: r.user_email,
                  created_at: from_ms(r.created_at_ms)? })
  }
}

#[derive(Debug, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = schema::swap_requests)]
#[diesel(treat_none_as_null = true)]
pub(crate) struct SwapRow {
  pub id: String,
  pub shift_id: String,
  pub shift_date_ms: i64,
  pub requester_id: String,
  pub requester_name: String,
  pub target_id: Option<String>,
  pub target_name: Option<String>,
  pub target_shift_id: Option<String>,
  pub reason: Option<String>,
  pub status: String,
  pub approved_by: Option<String>,
  pub approved_at_ms: Option<i64>,
  pub responded_at_ms: Option<i64>,
  pub created_at_ms: i64,
  pub updated_at_ms: i64,
}

impl From<&SwapRequest> for SwapRow {
  fn from(s: &SwapRequest) -> Self {
    Self { id: s.id.to_string(),
           shift_id: s.shift_id.to_string(),
           shift_date_ms: to_ms(s.shift_date),
           requester_id: s.requester_id.to_string(),
           requester_name: s.requester_name.clone(),
           target_id: s.target_id.map(|u| u.to_string()),
           target_name: s.target_name.clone(),
           target_shift_id: s.target_shift_id.map(|u| u.to_string()),
           reason: s.reason.clone(),
           status: s.status.as_str().to_string(),
           approved_by: s.approved_by.clone(),
           approved_at_ms: s.approved_at.map(to_ms),
           responded_at_ms: s.responded_at.map(to_ms),
           created_at_ms: to_ms(s.created_at),
           updated_at_ms: to_ms(s.updated_at) }
  }
}

impl TryFrom<SwapRow> for SwapRequest {
  type Error = DomainError;

  fn try_from(r: SwapRow) -> Result<Self, Self::Error> {
    Ok(SwapRequest { id: parse_id(&r.id)?,
                     shift_id: parse_id(&r.shift_id)?,
                     shift_date: from_ms(r.shift_date_ms)?,
                     requester_id: parse_id(&r.requester_id)?,
                     requester_name: r.requester_name,
                     target_id: opt_id(r.target_id)?,
                     target_name: r.target_name,
                     target_shift_id: opt_id(r.target_shift_id)?,
                     reason: r.reason,
                     status: r.status.parse()?,
                     approved_by: r.approved_by,
                     approved_at: opt_from_ms(r.approved_at_ms)?,
                     responded_at: opt_from_ms(r.responded_at_ms)?,
                     created_at: from_ms(r.created_at_ms)?,
                     updated_at: from_ms(r.updated_at_ms)? })
  }
}

#[derive(Debug, Queryable, Selectable, Insertable)]
#[diesel(table_name = schema::absences)]
pub(crate) struct AbsenceRow {
  pub id: String,
  pub user_id: String,
  pub user_name: String,
  pub user_email: Option<String>,
  pub date_ms: i64,
  pub reason: String,
  pub description: Option<String>,
  pub created_at_ms: i64,
}

impl From<&Absence> for AbsenceRow {
  fn from(a: &Absence) -> Self {
    Self { id: a.id.to_string(),
           user_id: a.user_id.to_string(),
           user_name: a.user_name.clone(),
           user_email: a.user_email.clone(),
           date_ms: to_ms(a.date),
           reason: a.reason.clone(),
           description: a.description.clone(),
           created_at_ms: to_ms(a.created_at) }
  }
}

impl TryFrom<AbsenceRow> for Absence {
  type Error = DomainError;

  fn try_from(r: AbsenceRow) -> Result<Self, Self::Error> {
    Ok(Absence { id: parse_id(&r.id)?,
                 user_id: parse_id(&r.user_id)?,
                 user_name: r.user_name,
                 user_email: r.user_email,
                 date: from_ms(r.date_ms)?,
                 reason: r.reason,
                 description: r.description,
                 created_at: from_ms(r.created_at_ms)? })
  }
}

#[derive(Debug, Queryable, Selectable, Insertable)]
#[diesel(table_name = schema::activity_logs)]
pub(crate) struct ActivityRow {
  pub id: String,
  pub kind: String,
  pub user_id: String,
  pub user_name: String,
  pub user_email: Option<String>,
  pub entity_type: String,
  pub entity_id: String,
  pub description: String,
  pub metadata: String,
  pub created_at_ms: i64,
}

impl TryFrom<&ActivityLog> for ActivityRow {
  type Error = DomainError;

  fn try_from(a: &ActivityLog) -> Result<Self, Self::Error> {
    Ok(Self { id: a.id.to_string(),
              kind: a.kind.as_str().to_string(),
              user_id: a.user_id.to_string(),
              user_name: a.user_name.clone(),
              user_email: a.user_email.clone(),
              entity_type: a.entity_type.clone(),
              entity_id: a.entity_id.to_string(),
              description: a.description.clone(),
              metadata: serde_json::to_string(&a.metadata)?,
              created_at_ms: to_ms(a.created_at) })
  }
}

impl TryFrom<ActivityRow> for ActivityLog {
  type Error = DomainError;

  fn try_from(r: ActivityRow) -> Result<Self, Self::Error> {
    Ok(ActivityLog { id: parse_id(&r.id)?,
                     kind: r.kind.parse()?,
                     user_id: parse_id(&r.user_id)?,
                     user_name: r.user_name,
                     user_email: r.user_email,
                     entity_type: r.entity_type,
                     entity_id: parse_id(&r.entity_id)?,
                     description: r.description,
                     metadata: serde_json::from_str(&r.metadata).unwrap_or(serde_json::Value::Null),
                     created_at: from_ms(r.created_at_ms)? })
  }
}

/// Convierte un lote de filas en entidades, fallando en la primera inválida.
pub(crate) fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>, DomainError>
  where T: TryFrom<R, Error = DomainError>
{
  rows.into_iter().map(T::try_from).collect()
}

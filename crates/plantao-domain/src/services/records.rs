// Archivo: services/records.rs
// Propósito: registros de passagem de plantão. Cada mutación persiste la
// entrada de auditoría y la de actividad en la misma operación del
// repositorio.
use super::Policy;
use crate::{validate_quantity, ActivityKind, ActivityLog, Actor, AuditAction, AuditFilter, AuditLog, AuditLogView,
            AuditRecordRef, DomainError, DomainRepository, MedRef, Medication, Record, RecordFilter, RecordGuard,
            RecordStatus, RecordView, Role, Shift, ShiftFilter};
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Límite de entradas devueltas por la consulta de auditoría.
pub const AUDIT_QUERY_LIMIT: i64 = 100;

#[derive(Debug, Clone)]
pub struct NewRecord {
    pub med_id: Uuid,
    pub shift_start: Option<DateTime<Utc>>,
    pub shift_end: Option<DateTime<Utc>>,
    pub qty_delivered: i32,
    pub photo_url: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ReceiveRecord {
    pub qty_received: i32,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RecordChanges {
    pub qty_delivered: Option<i32>,
    pub qty_received: Option<i32>,
    pub status: Option<RecordStatus>,
    pub photo_url: Option<String>,
}

pub struct RecordService<R: DomainRepository + ?Sized> {
    repo: Arc<R>,
    policy: Policy,
}

fn text<T: ToString>(v: Option<T>) -> Option<String> {
    v.map(|v| v.to_string())
}

impl<R: DomainRepository + ?Sized> RecordService<R> {
    pub fn new(repo: Arc<R>, policy: Policy) -> Self {
        Self { repo, policy }
    }

    /// Plantão del actor que contiene `now` dentro de la tolerancia. Para
    /// farmacêuticos es obligatorio; chefes quedan exentos.
    fn current_shift(&self, actor: &Actor, now: DateTime<Utc>) -> Result<Option<Shift>, DomainError> {
        let tol = self.policy.tolerance;
        // la ventana de tolerancia es cerrada y el filtro semiabierto
        let edge = Duration::milliseconds(1);
        let filter = ShiftFilter { employee_id: Some(actor.id),
                                   overlapping: Some((now - tol - edge, now + tol + edge)),
                                   ..Default::default() };
        let shift = self.repo.list_shifts(&filter)?.into_iter().find(|s| s.within_tolerance(now, tol));
        if shift.is_none() && actor.role == Role::Farmaceutico {
            return Err(DomainError::forbidden(format!("Fora do horário do seu plantão (tolerância de {} minutos)",
                                                      tol.num_minutes())));
        }
        Ok(shift)
    }

    fn medication(&self, id: &Uuid) -> Result<Option<Medication>, DomainError> {
        self.repo.get_medication(id)
    }

    pub fn view(&self, record: Record) -> Result<RecordView, DomainError> {
        let med = self.medication(&record.med_id)?;
        let delivered_by = self.repo.get_user(&record.delivered_by_id)?.map(|u| u.summary());
        let received_by = match record.received_by_id {
            Some(id) => self.repo.get_user(&id)?.map(|u| u.summary()),
            None => None,
        };
        Ok(RecordView { record, med, delivered_by, received_by, audit_logs: None })
    }

    pub fn list(&self, filter: &RecordFilter) -> Result<Vec<RecordView>, DomainError> {
        self.repo.list_records(filter)?.into_iter().map(|r| self.view(r)).collect()
    }

    fn find(&self, id: &Uuid) -> Result<Record, DomainError> {
        self.repo.get_record(id)?.ok_or_else(|| DomainError::not_found("Registro não encontrado"))
    }

    /// Registro con su trilha de auditoría, más reciente primero.
    pub fn get(&self, id: &Uuid) -> Result<RecordView, DomainError> {
        let record = self.find(id)?;
        let logs = self.repo.list_audit_logs(&AuditFilter { record_id: Some(record.id), ..Default::default() })?;
        let mut view = self.view(record)?;
        view.audit_logs = Some(logs);
        Ok(view)
    }

    pub fn create(&self, actor: &Actor, input: NewRecord, now: DateTime<Utc>) -> Result<RecordView, DomainError> {
        if !actor.role.handles_records() {
            return Err(DomainError::forbidden("Apenas farmacêuticos podem registrar entregas"));
        }
        validate_quantity(input.qty_delivered)?;
        let med = self.medication(&input.med_id)?
                      .ok_or_else(|| DomainError::validation("Medicamento não encontrado"))?;
        let current = self.current_shift(actor, now)?;

        let record = Record { id: Uuid::new_v4(),
                              med_id: med.id,
                              shift_start: input.shift_start.or(current.as_ref().map(|s| s.start)),
                              shift_end: input.shift_end.or(current.as_ref().map(|s| s.end)),
                              qty_delivered: input.qty_delivered,
                              qty_received: None,
                              delivered_by_id: actor.id,
                              delivered_at: now,
                              received_by_id: None,
                              received_at: None,
                              photo_url: input.photo_url.filter(|p| !p.trim().is_empty()),
                              notes: input.notes.filter(|n| !n.trim().is_empty()),
                              status: RecordStatus::Pendente,
                              created_by: actor.email.clone(),
                              created_at: now,
                              updated_at: now };
        let audit = AuditLog::new(record.id, AuditAction::Create, None, None, None, &actor.email, now);
        let activity = ActivityLog::new(ActivityKind::RecordCreated,
                                        actor,
                                        "record",
                                        record.id,
                                        format!("{} registrou entrega de {}", actor.name, med.name),
                                        json!({ "medId": med.id, "qtyDelivered": record.qty_delivered }),
                                        now);
        self.repo.insert_record(&record, &audit, &activity)?;
        self.view(record)
    }

    pub fn receive(&self, actor: &Actor, id: &Uuid, input: ReceiveRecord, now: DateTime<Utc>) -> Result<RecordView, DomainError> {
        if !actor.role.handles_records() {
            return Err(DomainError::forbidden("Apenas farmacêuticos podem receber entregas"));
        }
        let mut record = self.find(id)?;
        self.current_shift(actor, now)?;
        let status = record.receive(actor.id, input.qty_received, input.notes, now)?;

        let med_name = self.medication(&record.med_id)?.map(|m| m.name).unwrap_or_else(|| "medicamento".into());
        let suffix = if status == RecordStatus::Discrepancia { " (com discrepância)" } else { "" };
        let audit = AuditLog::new(record.id,
                                  AuditAction::Receive,
                                  Some("qtyReceived"),
                                  None,
                                  Some(input.qty_received.to_string()),
                                  &actor.email,
                                  now);
        let activity = ActivityLog::new(ActivityKind::RecordReceived,
                                        actor,
                                        "record",
                                        record.id,
                                        format!("{} confirmou recebimento de {}{}", actor.name, med_name, suffix),
                                        json!({ "qtyReceived": input.qty_received,
                                                "qtyDelivered": record.qty_delivered,
                                                "status": status }),
                                        now);
        self.repo.update_record(&record, RecordGuard::Unreceived, std::slice::from_ref(&audit), &activity)?;
        self.view(record)
    }

    /// Corrección administrativa: una entrada de auditoría por campo cambiado.
    pub fn update(&self, actor: &Actor, id: &Uuid, changes: RecordChanges, now: DateTime<Utc>) -> Result<RecordView, DomainError> {
        actor.require_supervisor("Apenas chefes ou administradores podem editar registros")?;
        let mut record = self.find(id)?;
        let guard = RecordGuard::UpdatedAt(record.updated_at);
        let record_id = record.id;
        let mut audits = Vec::new();
        let mut audit = |field: &str, old: Option<String>, new: Option<String>| {
            audits.push(AuditLog::new(record_id, AuditAction::Update, Some(field), old, new, &actor.email, now));
        };

        if let Some(q) = changes.qty_delivered.filter(|q| *q != record.qty_delivered) {
            validate_quantity(q)?;
            audit("qtyDelivered", text(Some(record.qty_delivered)), text(Some(q)));
            record.qty_delivered = q;
        }
        if let Some(q) = changes.qty_received.filter(|q| Some(*q) != record.qty_received) {
            validate_quantity(q)?;
            audit("qtyReceived", text(record.qty_received), text(Some(q)));
            record.qty_received = Some(q);
        }
        if let Some(s) = changes.status.filter(|s| *s != record.status) {
            audit("status", Some(record.status.to_string()), Some(s.to_string()));
            record.status = s;
        }
        if let Some(p) = changes.photo_url.filter(|p| Some(p) != record.photo_url.as_ref()) {
            audit("photoUrl", record.photo_url.clone(), Some(p.clone()));
            record.photo_url = Some(p).filter(|p| !p.is_empty());
        }
        if audits.is_empty() {
            return self.view(record);
        }
        record.updated_at = now;

        let fields: Vec<String> = audits.iter().filter_map(|a| a.field.clone()).collect();
        let activity = ActivityLog::new(ActivityKind::RecordUpdated,
                                        actor,
                                        "record",
                                        record.id,
                                        format!("{} editou um registro ({})", actor.name, fields.join(", ")),
                                        json!({ "fields": fields }),
                                        now);
        self.repo.update_record(&record, guard, &audits, &activity)?;
        self.view(record)
    }

    /// Borra el registro; la trilha de auditoría (con la instantánea) se
    /// conserva.
    pub fn delete(&self, actor: &Actor, id: &Uuid, now: DateTime<Utc>) -> Result<(), DomainError> {
        actor.require_admin("Apenas administradores podem deletar registros")?;
        let record = self.find(id)?;
        let snapshot = serde_json::to_string(&record)?;
        let audit = AuditLog::new(record.id, AuditAction::Delete, None, Some(snapshot), None, &actor.email, now);
        let activity = ActivityLog::new(ActivityKind::RecordDeleted,
                                        actor,
                                        "record",
                                        record.id,
                                        format!("{} deletou um registro", actor.name),
                                        json!({ "medId": record.med_id, "status": record.status }),
                                        now);
        self.repo.delete_record(id, &audit, &activity)
    }

    pub fn audit_logs(&self, actor: &Actor, mut filter: AuditFilter) -> Result<Vec<AuditLogView>, DomainError> {
        actor.require_supervisor("Acesso negado. Apenas chefes ou administradores.")?;
        filter.limit = Some(AUDIT_QUERY_LIMIT);
        let logs = self.repo.list_audit_logs(&filter)?;
        logs.into_iter()
            .map(|log| {
                let record = match self.repo.get_record(&log.record_id)? {
                    Some(r) => {
                        let med = self.medication(&r.med_id)?.map(|m| MedRef { name: m.name, code: m.code });
                        Some(AuditRecordRef { id: r.id, med })
                    }
                    None => None,
                };
                Ok(AuditLogView { log, record })
            })
            .collect()
    }
}

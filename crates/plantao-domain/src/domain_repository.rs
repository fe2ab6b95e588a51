use crate::{Absence, AbsenceFilter, ActivityFilter, ActivityKind, ActivityLog, AuditFilter, AuditLog, DomainError,
            Medication, Record, RecordFilter, RecordGuard, Shift, ShiftFilter, ShiftReassignment, SwapFilter,
            SwapRequest, SwapStatus, User, SWAP_ALREADY_OPEN, SWAP_CHANGED, SWAP_OVERLAP};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Contrato de persistencia del dominio de plantões.
///
/// Las operaciones que reciben entradas de auditoría o de actividad deben
/// persistirlas junto con la mutación principal de forma atómica.
pub trait DomainRepository: Send + Sync {
    // --- usuarios ---
    fn insert_user(&self, user: &User, activity: Option<&ActivityLog>) -> Result<(), DomainError>;
    fn update_user(&self, user: &User, activity: Option<&ActivityLog>) -> Result<(), DomainError>;
    fn get_user(&self, id: &Uuid) -> Result<Option<User>, DomainError>;
    fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DomainError>;
    /// Todos los usuarios ordenados por nombre.
    fn list_users(&self) -> Result<Vec<User>, DomainError>;

    // --- medicamentos ---
    fn insert_medication(&self, med: &Medication) -> Result<(), DomainError>;
    fn update_medication(&self, med: &Medication) -> Result<(), DomainError>;
    fn get_medication(&self, id: &Uuid) -> Result<Option<Medication>, DomainError>;
    fn find_medication_by_code(&self, code: &str) -> Result<Option<Medication>, DomainError>;
    /// Ordenados por nombre.
    fn list_medications(&self) -> Result<Vec<Medication>, DomainError>;
    fn delete_medication(&self, id: &Uuid) -> Result<(), DomainError>;
    fn count_records_for_medication(&self, med_id: &Uuid) -> Result<i64, DomainError>;

    // --- plantões ---
    /// Inserta todos los plantões o ninguno.
    fn insert_shifts(&self, shifts: &[Shift], activity: &ActivityLog) -> Result<(), DomainError>;
    fn update_shift(&self, shift: &Shift, activity: Option<&ActivityLog>) -> Result<(), DomainError>;
    fn get_shift(&self, id: &Uuid) -> Result<Option<Shift>, DomainError>;
    fn delete_shift(&self, id: &Uuid, activity: &ActivityLog) -> Result<(), DomainError>;
    /// Ordenados por inicio ascendente.
    fn list_shifts(&self, filter: &ShiftFilter) -> Result<Vec<Shift>, DomainError>;

    // --- registros ---
    fn insert_record(&self, record: &Record, audit: &AuditLog, activity: &ActivityLog) -> Result<(), DomainError>;
    /// Escribe sólo si la fila guardada cumple `guard`; si no,
    /// `guard.conflict()` y nada cambia.
    fn update_record(&self,
                     record: &Record,
                     guard: RecordGuard,
                     audits: &[AuditLog],
                     activity: &ActivityLog)
                     -> Result<(), DomainError>;
    /// Borra el registro conservando su trilha (incluida `audit`).
    fn delete_record(&self, id: &Uuid, audit: &AuditLog, activity: &ActivityLog) -> Result<(), DomainError>;
    fn get_record(&self, id: &Uuid) -> Result<Option<Record>, DomainError>;
    /// Más recientes primero.
    fn list_records(&self, filter: &RecordFilter) -> Result<Vec<Record>, DomainError>;
    /// Más recientes primero, truncado a `filter.limit`.
    fn list_audit_logs(&self, filter: &AuditFilter) -> Result<Vec<AuditLog>, DomainError>;

    // --- trocas ---
    /// Rechaza una segunda troca abierta para el mismo plantão.
    fn insert_swap(&self, swap: &SwapRequest, activity: &ActivityLog) -> Result<(), DomainError>;
    /// Escribe sólo si el estado guardado está en `expected`.
    fn update_swap(&self, swap: &SwapRequest, expected: &[SwapStatus], activity: &ActivityLog) -> Result<(), DomainError>;
    /// Persiste la troca aprobada y reasigna los plantões en una transacción.
    /// La troca guardada tiene que seguir `aceito` y ningún nuevo dueño puede
    /// quedar con plantões solapados (los reasignados no cuentan).
    fn approve_swap(&self,
                    swap: &SwapRequest,
                    reassignments: &[ShiftReassignment],
                    activity: &ActivityLog)
                    -> Result<(), DomainError>;
    fn get_swap(&self, id: &Uuid) -> Result<Option<SwapRequest>, DomainError>;
    /// Más recientes primero.
    fn list_swaps(&self, filter: &SwapFilter) -> Result<Vec<SwapRequest>, DomainError>;
    fn count_swaps(&self, status: SwapStatus) -> Result<i64, DomainError>;

    // --- ausências ---
    fn insert_absence(&self, absence: &Absence, activity: &ActivityLog) -> Result<(), DomainError>;
    fn delete_absence(&self, id: &Uuid, activity: &ActivityLog) -> Result<(), DomainError>;
    fn get_absence(&self, id: &Uuid) -> Result<Option<Absence>, DomainError>;
    /// Ordenadas por fecha ascendente.
    fn list_absences(&self, filter: &AbsenceFilter) -> Result<Vec<Absence>, DomainError>;

    // --- timeline ---
    fn insert_activity(&self, activity: &ActivityLog) -> Result<(), DomainError>;
    /// Más recientes primero, truncado a `filter.effective_limit()`.
    fn list_activities(&self, filter: &ActivityFilter) -> Result<Vec<ActivityLog>, DomainError>;
    /// Cuenta en `[from, to)`.
    fn count_activities(&self,
                        kind: Option<ActivityKind>,
                        from: DateTime<Utc>,
                        to: DateTime<Utc>)
                        -> Result<i64, DomainError>;
    /// Cuenta en `[from, to)`.
    fn count_absences(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<i64, DomainError>;
}

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    medications: HashMap<Uuid, Medication>,
    shifts: HashMap<Uuid, Shift>,
    records: HashMap<Uuid, Record>,
    audit_logs: Vec<AuditLog>,
    swaps: HashMap<Uuid, SwapRequest>,
    absences: HashMap<Uuid, Absence>,
    activities: Vec<ActivityLog>,
}

/// Implementación en memoria para tests y desarrollo.
///
/// Un único mutex protege todas las tablas, así cada operación compuesta es
/// atómica igual que en la implementación Diesel.
pub struct InMemoryDomainRepository {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryDomainRepository {
    pub fn new() -> Self {
        Self { tables: Arc::new(Mutex::new(Tables::default())) }
    }

    // Helper to map poisoned mutex errors into DomainError
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Tables>, DomainError> {
        self.tables
            .lock()
            .map_err(|e| DomainError::ExternalError(format!("Mutex 'tables' poisoned: {}", e)))
    }
}

impl Default for InMemoryDomainRepository {
    fn default() -> Self {
        Self::new()
    }
}

fn newest_first<T, F>(mut items: Vec<T>, key: F) -> Vec<T>
    where F: Fn(&T) -> DateTime<Utc>
{
    items.sort_by_key(|b| std::cmp::Reverse(key(b)));
    items
}

impl DomainRepository for InMemoryDomainRepository {
    fn insert_user(&self, user: &User, activity: Option<&ActivityLog>) -> Result<(), DomainError> {
        let mut t = self.lock()?;
        if t.users.values().any(|u| u.email == user.email) {
            return Err(DomainError::validation("Email já cadastrado"));
        }
        t.users.insert(user.id, user.clone());
        if let Some(a) = activity {
            t.activities.push(a.clone());
        }
        Ok(())
    }

    fn update_user(&self, user: &User, activity: Option<&ActivityLog>) -> Result<(), DomainError> {
        let mut t = self.lock()?;
        if !t.users.contains_key(&user.id) {
            return Err(DomainError::not_found("Usuário não encontrado"));
        }
        t.users.insert(user.id, user.clone());
        if let Some(a) = activity {
            t.activities.push(a.clone());
        }
        Ok(())
    }

    fn get_user(&self, id: &Uuid) -> Result<Option<User>, DomainError> {
        Ok(self.lock()?.users.get(id).cloned())
    }

    fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DomainError> {
        Ok(self.lock()?.users.values().find(|u| u.email == email).cloned())
    }

    fn list_users(&self) -> Result<Vec<User>, DomainError> {
        let mut users: Vec<User> = self.lock()?.users.values().cloned().collect();
        users.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(users)
    }

    fn insert_medication(&self, med: &Medication) -> Result<(), DomainError> {
        let mut t = self.lock()?;
        if t.medications.values().any(|m| m.code == med.code) {
            return Err(DomainError::validation("Código já cadastrado"));
        }
        t.medications.insert(med.id, med.clone());
        Ok(())
    }

    fn update_medication(&self, med: &Medication) -> Result<(), DomainError> {
        let mut t = self.lock()?;
        if !t.medications.contains_key(&med.id) {
            return Err(DomainError::not_found("Medicamento não encontrado"));
        }
        t.medications.insert(med.id, med.clone());
        Ok(())
    }

    fn get_medication(&self, id: &Uuid) -> Result<Option<Medication>, DomainError> {
        Ok(self.lock()?.medications.get(id).cloned())
    }

    fn find_medication_by_code(&self, code: &str) -> Result<Option<Medication>, DomainError> {
        Ok(self.lock()?.medications.values().find(|m| m.code == code).cloned())
    }

    fn list_medications(&self) -> Result<Vec<Medication>, DomainError> {
        let mut meds: Vec<Medication> = self.lock()?.medications.values().cloned().collect();
        meds.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(meds)
    }

    fn delete_medication(&self, id: &Uuid) -> Result<(), DomainError> {
        self.lock()?.medications.remove(id);
        Ok(())
    }

    fn count_records_for_medication(&self, med_id: &Uuid) -> Result<i64, DomainError> {
        Ok(self.lock()?.records.values().filter(|r| &r.med_id == med_id).count() as i64)
    }

    fn insert_shifts(&self, shifts: &[Shift], activity: &ActivityLog) -> Result<(), DomainError> {
        let mut t = self.lock()?;
        for s in shifts {
            t.shifts.insert(s.id, s.clone());
        }
        t.activities.push(activity.clone());
        Ok(())
    }

    fn update_shift(&self, shift: &Shift, activity: Option<&ActivityLog>) -> Result<(), DomainError> {
        let mut t = self.lock()?;
        if !t.shifts.contains_key(&shift.id) {
            return Err(DomainError::not_found("Plantão não encontrado"));
        }
        t.shifts.insert(shift.id, shift.clone());
        if let Some(a) = activity {
            t.activities.push(a.clone());
        }
        Ok(())
    }

    fn get_shift(&self, id: &Uuid) -> Result<Option<Shift>, DomainError> {
        Ok(self.lock()?.shifts.get(id).cloned())
    }

    fn delete_shift(&self, id: &Uuid, activity: &ActivityLog) -> Result<(), DomainError> {
        let mut t = self.lock()?;
        t.shifts.remove(id);
        t.activities.push(activity.clone());
        Ok(())
    }

    fn list_shifts(&self, filter: &ShiftFilter) -> Result<Vec<Shift>, DomainError> {
        let mut out: Vec<Shift> = self.lock()?.shifts.values().filter(|s| filter.matches(s)).cloned().collect();
        out.sort_by_key(|s| s.start);
        Ok(out)
    }

    fn insert_record(&self, record: &Record, audit: &AuditLog, activity: &ActivityLog) -> Result<(), DomainError> {
        let mut t = self.lock()?;
        t.records.insert(record.id, record.clone());
        t.audit_logs.push(audit.clone());
        t.activities.push(activity.clone());
        Ok(())
    }

    fn update_record(&self,
                     record: &Record,
                     guard: RecordGuard,
                     audits: &[AuditLog],
                     activity: &ActivityLog)
                     -> Result<(), DomainError> {
        let mut t = self.lock()?;
        match t.records.get(&record.id) {
            None => return Err(DomainError::not_found("Registro não encontrado")),
            Some(stored) if !guard.holds(stored) => return Err(guard.conflict()),
            Some(_) => {}
        }
        t.records.insert(record.id, record.clone());
        t.audit_logs.extend(audits.iter().cloned());
        t.activities.push(activity.clone());
        Ok(())
    }

    fn delete_record(&self, id: &Uuid, audit: &AuditLog, activity: &ActivityLog) -> Result<(), DomainError> {
        let mut t = self.lock()?;
        t.records.remove(id);
        t.audit_logs.push(audit.clone());
        t.activities.push(activity.clone());
        Ok(())
    }

    fn get_record(&self, id: &Uuid) -> Result<Option<Record>, DomainError> {
        Ok(self.lock()?.records.get(id).cloned())
    }

    fn list_records(&self, filter: &RecordFilter) -> Result<Vec<Record>, DomainError> {
        let items: Vec<Record> = self.lock()?.records.values().filter(|r| filter.matches(r)).cloned().collect();
        Ok(newest_first(items, |r| r.created_at))
    }

    fn list_audit_logs(&self, filter: &AuditFilter) -> Result<Vec<AuditLog>, DomainError> {
        let items: Vec<AuditLog> = self.lock()?.audit_logs.iter().filter(|a| filter.matches(a)).cloned().collect();
        let mut items = newest_first(items, |a| a.created_at);
        if let Some(limit) = filter.limit {
            items.truncate(limit.max(0) as usize);
        }
        Ok(items)
    }

    fn insert_swap(&self, swap: &SwapRequest, activity: &ActivityLog) -> Result<(), DomainError> {
        let mut t = self.lock()?;
        if t.swaps.values().any(|s| s.shift_id == swap.shift_id && s.status.is_open()) {
            return Err(DomainError::validation(SWAP_ALREADY_OPEN));
        }
        t.swaps.insert(swap.id, swap.clone());
        t.activities.push(activity.clone());
        Ok(())
    }

    fn update_swap(&self, swap: &SwapRequest, expected: &[SwapStatus], activity: &ActivityLog) -> Result<(), DomainError> {
        let mut t = self.lock()?;
        match t.swaps.get(&swap.id) {
            None => return Err(DomainError::not_found("Solicitação não encontrada")),
            Some(stored) if !expected.contains(&stored.status) => return Err(DomainError::validation(SWAP_CHANGED)),
            Some(_) => {}
        }
        t.swaps.insert(swap.id, swap.clone());
        t.activities.push(activity.clone());
        Ok(())
    }

    fn approve_swap(&self,
                    swap: &SwapRequest,
                    reassignments: &[ShiftReassignment],
                    activity: &ActivityLog)
                    -> Result<(), DomainError> {
        let mut t = self.lock()?;
        // validar todo antes de tocar nada
        if t.swaps.get(&swap.id).is_none_or(|s| s.status != SwapStatus::Aceito) {
            return Err(DomainError::validation(SWAP_CHANGED));
        }
        let moved: Vec<Uuid> = reassignments.iter().map(|r| r.shift_id).collect();
        for r in reassignments {
            let shift = t.shifts.get(&r.shift_id).ok_or_else(|| DomainError::not_found("Plantão não encontrado"))?;
            let clash = t.shifts
                         .values()
                         .any(|o| o.employee_id == Some(r.employee_id) && !moved.contains(&o.id) && o.overlaps(shift));
            if clash {
                return Err(DomainError::validation(SWAP_OVERLAP));
            }
        }
        for r in reassignments {
            if let Some(s) = t.shifts.get_mut(&r.shift_id) {
                s.employee_id = Some(r.employee_id);
                s.updated_at = activity.created_at;
            }
        }
        t.swaps.insert(swap.id, swap.clone());
        t.activities.push(activity.clone());
        Ok(())
    }

    fn get_swap(&self, id: &Uuid) -> Result<Option<SwapRequest>, DomainError> {
        Ok(self.lock()?.swaps.get(id).cloned())
    }

    fn list_swaps(&self, filter: &SwapFilter) -> Result<Vec<SwapRequest>, DomainError> {
        let items: Vec<SwapRequest> = self.lock()?.swaps.values().filter(|s| filter.matches(s)).cloned().collect();
        Ok(newest_first(items, |s| s.created_at))
    }

    fn count_swaps(&self, status: SwapStatus) -> Result<i64, DomainError> {
        Ok(self.lock()?.swaps.values().filter(|s| s.status == status).count() as i64)
    }

    fn insert_absence(&self, absence: &Absence, activity: &ActivityLog) -> Result<(), DomainError> {
        let mut t = self.lock()?;
        t.absences.insert(absence.id, absence.clone());
        t.activities.push(activity.clone());
        Ok(())
    }

    fn delete_absence(&self, id: &Uuid, activity: &ActivityLog) -> Result<(), DomainError> {
        let mut t = self.lock()?;
        t.absences.remove(id);
        t.activities.push(activity.clone());
        Ok(())
    }

    fn get_absence(&self, id: &Uuid) -> Result<Option<Absence>, DomainError> {
        Ok(self.lock()?.absences.get(id).cloned())
    }

    fn list_absences(&self, filter: &AbsenceFilter) -> Result<Vec<Absence>, DomainError> {
        let mut out: Vec<Absence> = self.lock()?.absences.values().filter(|a| filter.matches(a)).cloned().collect();
        out.sort_by_key(|a| a.date);
        Ok(out)
    }

    fn insert_activity(&self, activity: &ActivityLog) -> Result<(), DomainError> {
        self.lock()?.activities.push(activity.clone());
        Ok(())
    }

    fn list_activities(&self, filter: &ActivityFilter) -> Result<Vec<ActivityLog>, DomainError> {
        let items: Vec<ActivityLog> = self.lock()?.activities.iter().filter(|a| filter.matches(a)).cloned().collect();
        let mut items = newest_first(items, |a| a.created_at);
        items.truncate(filter.effective_limit() as usize);
        Ok(items)
    }

    fn count_activities(&self,
                        kind: Option<ActivityKind>,
                        from: DateTime<Utc>,
                        to: DateTime<Utc>)
                        -> Result<i64, DomainError> {
        Ok(self.lock()?
               .activities
               .iter()
               .filter(|a| kind.is_none_or(|k| a.kind == k) && a.created_at >= from && a.created_at < to)
               .count() as i64)
    }

    fn count_absences(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<i64, DomainError> {
        Ok(self.lock()?.absences.values().filter(|a| a.date >= from && a.date < to).count() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Actor, Role};
    use chrono::Duration;

    fn actor() -> Actor {
        Actor { id: Uuid::new_v4(), email: "chefe@farm.com".into(), name: "Chefe".into(), role: Role::Chefe }
    }

    #[test]
    fn approve_swap_is_all_or_nothing() {
        let repo = InMemoryDomainRepository::new();
        let now = Utc::now();
        let a = actor();
        let shift = Shift::new(now, now + Duration::hours(12), Some(Uuid::new_v4()), "x", now).unwrap();
        let act = ActivityLog::new(ActivityKind::ShiftCreated, &a, "shift", shift.id, "c", serde_json::json!({}), now);
        repo.insert_shifts(std::slice::from_ref(&shift), &act).unwrap();

        let swap = SwapRequest { id: Uuid::new_v4(),
                                 shift_id: shift.id,
                                 shift_date: shift.start,
                                 requester_id: shift.employee_id.unwrap(),
                                 requester_name: "A".into(),
                                 target_id: Some(Uuid::new_v4()),
                                 target_name: Some("B".into()),
                                 target_shift_id: Some(Uuid::new_v4()),
                                 reason: None,
                                 status: SwapStatus::Aceito,
                                 approved_by: None,
                                 approved_at: None,
                                 responded_at: None,
                                 created_at: now,
                                 updated_at: now };
        let act = ActivityLog::new(ActivityKind::SwapRequested, &a, "swap", swap.id, "r", serde_json::json!({}), now);
        repo.insert_swap(&swap, &act).unwrap();

        let mut approved = swap.clone();
        approved.status = SwapStatus::Aprovado;
        let reassign = crate::swap::reassignments_for(&approved).unwrap();
        let act = ActivityLog::new(ActivityKind::SwapApproved, &a, "swap", swap.id, "ok", serde_json::json!({}), now);
        // el plantão alvo no existe: nada debe cambiar
        assert!(matches!(repo.approve_swap(&approved, &reassign, &act), Err(DomainError::NotFound(_))));
        assert_eq!(repo.get_shift(&shift.id).unwrap().unwrap().employee_id, shift.employee_id);
        assert_eq!(repo.get_swap(&swap.id).unwrap().unwrap().status, SwapStatus::Aceito);
    }

    #[test]
    fn swap_writes_are_conditional_on_stored_status() {
        let repo = InMemoryDomainRepository::new();
        let now = Utc::now();
        let a = actor();
        let shift = Shift::new(now, now + Duration::hours(12), Some(Uuid::new_v4()), "x", now).unwrap();
        let swap = SwapRequest { id: Uuid::new_v4(),
                                 shift_id: shift.id,
                                 shift_date: shift.start,
                                 requester_id: shift.employee_id.unwrap(),
                                 requester_name: "A".into(),
                                 target_id: None,
                                 target_name: None,
                                 target_shift_id: None,
                                 reason: None,
                                 status: SwapStatus::Pendente,
                                 approved_by: None,
                                 approved_at: None,
                                 responded_at: None,
                                 created_at: now,
                                 updated_at: now };
        let act = ActivityLog::new(ActivityKind::SwapRequested, &a, "swap", swap.id, "r", serde_json::json!({}), now);
        repo.insert_swap(&swap, &act).unwrap();

        let mut second = swap.clone();
        second.id = Uuid::new_v4();
        assert_eq!(repo.insert_swap(&second, &act), Err(DomainError::validation(SWAP_ALREADY_OPEN)));

        let mut cancelled = swap.clone();
        cancelled.status = SwapStatus::Cancelado;
        repo.update_swap(&cancelled, &[SwapStatus::Pendente, SwapStatus::Aceito], &act).unwrap();

        // una respuesta leída antes de la cancelación ya no puede escribirse
        let mut accepted = swap.clone();
        accepted.status = SwapStatus::Aceito;
        assert_eq!(repo.update_swap(&accepted, &[SwapStatus::Pendente], &act),
                   Err(DomainError::validation(SWAP_CHANGED)));
        assert_eq!(repo.get_swap(&swap.id).unwrap().unwrap().status, SwapStatus::Cancelado);
    }

    #[test]
    fn mutex_poisoning_returns_error() {
        use std::thread;

        let repo = InMemoryDomainRepository::new();
        let tables = repo.tables.clone();
        let handle = thread::spawn(move || {
            let _g = tables.lock().unwrap();
            panic!("force poison");
        });
        let _ = handle.join();

        match repo.list_users() {
            Err(DomainError::ExternalError(_)) => (),
            other => panic!("expected ExternalError, got {:?}", other),
        }
    }
}

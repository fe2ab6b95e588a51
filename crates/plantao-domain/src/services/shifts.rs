use super::Policy;
use crate::recurring::{self, RecurrenceRequest};
use crate::{validate_interval, ActivityKind, ActivityLog, Actor, DomainError, DomainRepository, Role, Shift,
            ShiftFilter, ShiftView, User};
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

const SUPERVISOR_ONLY: &str = "Acesso negado. Apenas chefes ou administradores.";

#[derive(Debug, Clone)]
pub struct NewShift {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub employee_id: Option<Uuid>,
}

/// `employee_id: Some(None)` deja el plantão sin funcionario.
#[derive(Debug, Clone, Default)]
pub struct ShiftChanges {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub employee_id: Option<Option<Uuid>>,
    pub notification_sent: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct NewRecurringShifts {
    pub employee_id: Option<Uuid>,
    pub request: RecurrenceRequest,
}

/// Escala de plantões.
pub struct ShiftService<R: DomainRepository + ?Sized> {
    repo: Arc<R>,
    policy: Policy,
}

impl<R: DomainRepository + ?Sized> ShiftService<R> {
    pub fn new(repo: Arc<R>, policy: Policy) -> Self {
        Self { repo, policy }
    }

    /// `date` filtra los plantões que tocan ese día local; si no, `from`/`to`
    /// filtran por inicio. Atendentes sólo ven sus propios plantões.
    pub fn list(&self,
                actor: &Actor,
                date: Option<NaiveDate>,
                from: Option<DateTime<Utc>>,
                to: Option<DateTime<Utc>>)
                -> Result<Vec<ShiftView>, DomainError> {
        let mut filter = ShiftFilter::default();
        if actor.role == Role::Atendente {
            filter.employee_id = Some(actor.id);
        }
        match date {
            Some(day) => filter.overlapping = Some(self.policy.day_bounds(day)),
            None => {
                filter.start_from = from;
                filter.start_to = to;
            }
        }
        let shifts = self.repo.list_shifts(&filter)?;
        self.views(shifts)
    }

    pub fn get(&self, id: &Uuid) -> Result<Shift, DomainError> {
        self.repo.get_shift(id)?.ok_or_else(|| DomainError::not_found("Plantão não encontrado"))
    }

    pub fn view(&self, shift: Shift) -> Result<ShiftView, DomainError> {
        let employee = match shift.employee_id {
            Some(id) => self.repo.get_user(&id)?.map(|u| u.summary()),
            None => None,
        };
        Ok(ShiftView { shift, employee })
    }

    fn views(&self, shifts: Vec<Shift>) -> Result<Vec<ShiftView>, DomainError> {
        shifts.into_iter().map(|s| self.view(s)).collect()
    }

    fn active_employee(&self, id: &Uuid) -> Result<User, DomainError> {
        self.repo
            .get_user(id)?
            .filter(|u| u.active)
            .ok_or_else(|| DomainError::validation("Funcionário não encontrado ou inativo"))
    }

    /// Falla si `employee` ya tiene un plantão que se solapa con
    /// `[start, end)`, ignorando `exclude`.
    fn ensure_free(&self,
                   employee: Uuid,
                   start: DateTime<Utc>,
                   end: DateTime<Utc>,
                   exclude: Option<Uuid>)
                   -> Result<(), DomainError> {
        let filter = ShiftFilter { employee_id: Some(employee), overlapping: Some((start, end)), ..Default::default() };
        let clash = self.repo
                        .list_shifts(&filter)?
                        .into_iter()
                        .find(|s| Some(s.id) != exclude && crate::overlaps(s.start, s.end, start, end));
        if let Some(s) = clash {
            return Err(DomainError::validation(format!("Funcionário já possui plantão neste horário ({} - {})",
                                                       s.start.with_timezone(&self.policy.offset).format("%d/%m %H:%M"),
                                                       s.end.with_timezone(&self.policy.offset).format("%d/%m %H:%M"))));
        }
        Ok(())
    }

    pub fn create(&self, actor: &Actor, input: NewShift, now: DateTime<Utc>) -> Result<ShiftView, DomainError> {
        actor.require_supervisor(SUPERVISOR_ONLY)?;
        let shift = Shift::new(input.start, input.end, input.employee_id, &actor.email, now)?;
        let mut who = String::from("sem funcionário");
        if let Some(emp) = input.employee_id {
            who = self.active_employee(&emp)?.name;
            self.ensure_free(emp, shift.start, shift.end, None)?;
        }
        let activity = ActivityLog::new(ActivityKind::ShiftCreated,
                                        actor,
                                        "shift",
                                        shift.id,
                                        format!("{} criou plantão para {}", actor.name, who),
                                        json!({ "start": shift.start, "end": shift.end, "employeeId": shift.employee_id }),
                                        now);
        self.repo.insert_shifts(std::slice::from_ref(&shift), &activity)?;
        self.view(shift)
    }

    pub fn update(&self, actor: &Actor, id: &Uuid, changes: ShiftChanges, now: DateTime<Utc>) -> Result<ShiftView, DomainError> {
        actor.require_supervisor(SUPERVISOR_ONLY)?;
        let mut shift = self.get(id)?;
        if let Some(start) = changes.start {
            shift.start = start;
        }
        if let Some(end) = changes.end {
            shift.end = end;
        }
        if let Some(emp) = changes.employee_id {
            shift.employee_id = emp;
        }
        if let Some(sent) = changes.notification_sent {
            shift.notification_sent = sent;
        }
        validate_interval(shift.start, shift.end)?;
        if let Some(emp) = shift.employee_id {
            self.active_employee(&emp)?;
            self.ensure_free(emp, shift.start, shift.end, Some(shift.id))?;
        }
        shift.updated_at = now;
        let activity = ActivityLog::new(ActivityKind::ShiftUpdated,
                                        actor,
                                        "shift",
                                        shift.id,
                                        format!("{} atualizou um plantão", actor.name),
                                        json!({ "start": shift.start, "end": shift.end, "employeeId": shift.employee_id }),
                                        now);
        self.repo.update_shift(&shift, Some(&activity))?;
        self.view(shift)
    }

    pub fn delete(&self, actor: &Actor, id: &Uuid, now: DateTime<Utc>) -> Result<(), DomainError> {
        actor.require_supervisor(SUPERVISOR_ONLY)?;
        let shift = self.get(id)?;
        let activity = ActivityLog::new(ActivityKind::ShiftDeleted,
                                        actor,
                                        "shift",
                                        shift.id,
                                        format!("{} removeu um plantão", actor.name),
                                        json!({ "start": shift.start, "end": shift.end, "employeeId": shift.employee_id }),
                                        now);
        self.repo.delete_shift(id, &activity)
    }

    /// Genera la serie completa o nada. Devuelve la cantidad creada.
    pub fn create_recurring(&self, actor: &Actor, input: NewRecurringShifts, now: DateTime<Utc>) -> Result<usize, DomainError> {
        actor.require_supervisor(SUPERVISOR_ONLY)?;
        let intervals = recurring::generate(&input.request, &self.policy.offset)?;
        if let Some(emp) = input.employee_id {
            self.active_employee(&emp)?;
            for (start, end) in &intervals {
                self.ensure_free(emp, *start, *end, None)?;
            }
        }
        let shifts = intervals.into_iter()
                              .map(|(start, end)| Shift::new(start, end, input.employee_id, &actor.email, now))
                              .collect::<Result<Vec<_>, _>>()?;
        let first = shifts.first().map(|s| s.id).unwrap_or_else(Uuid::nil);
        let activity = ActivityLog::new(ActivityKind::ShiftsGenerated,
                                        actor,
                                        "shift",
                                        first,
                                        format!("{} gerou {} plantões recorrentes", actor.name, shifts.len()),
                                        json!({ "count": shifts.len(), "employeeId": input.employee_id }),
                                        now);
        self.repo.insert_shifts(&shifts, &activity)?;
        log::info!("{} plantões generados por {}", shifts.len(), actor.email);
        Ok(shifts.len())
    }

    /// Marca el aviso como enviado; falla si ya lo estaba.
    pub fn mark_notified(&self, id: &Uuid, now: DateTime<Utc>) -> Result<Shift, DomainError> {
        let mut shift = self.get(id)?;
        if shift.notification_sent {
            return Err(DomainError::validation("Notificação já foi enviada"));
        }
        shift.notification_sent = true;
        shift.updated_at = now;
        self.repo.update_shift(&shift, None)?;
        Ok(shift)
    }
}

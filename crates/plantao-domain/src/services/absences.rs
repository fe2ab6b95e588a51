use super::Policy;
use crate::{Absence, AbsenceFilter, ActivityKind, ActivityLog, Actor, DomainError, DomainRepository, DEFAULT_REASON};
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NewAbsence {
    pub user_id: Uuid,
    /// Día local de la ausência.
    pub date: NaiveDate,
    pub reason: Option<String>,
    pub description: Option<String>,
}

pub struct AbsenceService<R: DomainRepository + ?Sized> {
    repo: Arc<R>,
    policy: Policy,
}

impl<R: DomainRepository + ?Sized> AbsenceService<R> {
    pub fn new(repo: Arc<R>, policy: Policy) -> Self {
        Self { repo, policy }
    }

    pub fn create(&self, actor: &Actor, input: NewAbsence, now: DateTime<Utc>) -> Result<Absence, DomainError> {
        actor.require_supervisor("Acesso negado. Apenas chefes ou administradores.")?;
        let user = self.repo
                       .get_user(&input.user_id)?
                       .ok_or_else(|| DomainError::not_found("Usuário não encontrado"))?;
        let (date, _) = self.policy.day_bounds(input.date);
        let absence = Absence { id: Uuid::new_v4(),
                                user_id: user.id,
                                user_name: user.name.clone(),
                                user_email: Some(user.email.clone()),
                                date,
                                reason: input.reason
                                             .map(|r| r.trim().to_string())
                                             .filter(|r| !r.is_empty())
                                             .unwrap_or_else(|| DEFAULT_REASON.to_string()),
                                description: input.description.filter(|d| !d.trim().is_empty()),
                                created_at: now };
        let activity = ActivityLog::new(ActivityKind::AbsenceCreated,
                                        actor,
                                        "absence",
                                        absence.id,
                                        format!("{} marcou ausência em {} - {}",
                                                absence.user_name,
                                                input.date.format("%d/%m/%Y"),
                                                absence.reason),
                                        json!({ "reason": absence.reason, "description": absence.description }),
                                        now);
        self.repo.insert_absence(&absence, &activity)?;
        Ok(absence)
    }

    pub fn list(&self, filter: &AbsenceFilter) -> Result<Vec<Absence>, DomainError> {
        self.repo.list_absences(filter)
    }

    pub fn delete(&self, actor: &Actor, id: &Uuid, now: DateTime<Utc>) -> Result<(), DomainError> {
        actor.require_supervisor("Acesso negado. Apenas chefes ou administradores.")?;
        let absence = self.repo
                          .get_absence(id)?
                          .ok_or_else(|| DomainError::not_found("Ausência não encontrada"))?;
        let local = absence.date.with_timezone(&self.policy.offset);
        let activity = ActivityLog::new(ActivityKind::AbsenceDeleted,
                                        actor,
                                        "absence",
                                        absence.id,
                                        format!("Ausência de {} em {} foi removida",
                                                absence.user_name,
                                                local.format("%d/%m/%Y")),
                                        json!({ "userId": absence.user_id }),
                                        now);
        self.repo.delete_absence(id, &activity)
    }
}

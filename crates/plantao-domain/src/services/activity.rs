use super::Policy;
use crate::{ActivityFilter, ActivityKind, ActivityLog, ActivityStats, Actor, DomainError, DomainRepository, SwapStatus};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Timeline de actividad y contadores del panel.
pub struct ActivityService<R: DomainRepository + ?Sized> {
    repo: Arc<R>,
    policy: Policy,
}

impl<R: DomainRepository + ?Sized> ActivityService<R> {
    pub fn new(repo: Arc<R>, policy: Policy) -> Self {
        Self { repo, policy }
    }

    pub fn list(&self, actor: &Actor, filter: &ActivityFilter) -> Result<Vec<ActivityLog>, DomainError> {
        actor.require_supervisor("Acesso negado. Apenas chefes ou administradores.")?;
        self.repo.list_activities(filter)
    }

    pub fn stats(&self, actor: &Actor, now: DateTime<Utc>) -> Result<ActivityStats, DomainError> {
        actor.require_supervisor("Acesso negado. Apenas chefes ou administradores.")?;
        let (from, to) = self.policy.today_bounds(now);
        Ok(ActivityStats { today_activities: self.repo.count_activities(None, from, to)?,
                           records_created_today: self.repo.count_activities(Some(ActivityKind::RecordCreated), from, to)?,
                           records_received_today: self.repo
                                                       .count_activities(Some(ActivityKind::RecordReceived), from, to)?,
                           pending_swaps: self.repo.count_swaps(SwapStatus::Pendente)?,
                           absences_today: self.repo.count_absences(from, to)? })
    }
}

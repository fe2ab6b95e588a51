// Archivo: services/swaps.rs
// Propósito: ciclo de vida de las trocas de plantão
// (pendente → aceito → aprovado, o recusado / cancelado).
use crate::{partner_allowed, reassignments_for, ActivityKind, ActivityLog, Actor, DomainError, DomainRepository, Role,
            SwapFilter, SwapRequest, SwapStatus, User};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NewSwap {
    pub shift_id: Uuid,
    pub target_id: Option<Uuid>,
    pub target_shift_id: Option<Uuid>,
    pub reason: Option<String>,
}

/// Respuesta del colega: sólo `aceito` o `recusado`.
#[derive(Debug, Clone, Copy)]
pub struct SwapResponse {
    pub status: SwapStatus,
}

pub struct SwapService<R: DomainRepository + ?Sized> {
    repo: Arc<R>,
}

fn day(dt: DateTime<Utc>) -> String {
    dt.format("%d/%m/%Y").to_string()
}

impl<R: DomainRepository + ?Sized> SwapService<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    fn find(&self, id: &Uuid) -> Result<SwapRequest, DomainError> {
        self.repo.get_swap(id)?.ok_or_else(|| DomainError::not_found("Solicitação não encontrada"))
    }

    fn user(&self, id: &Uuid, missing: &str) -> Result<User, DomainError> {
        self.repo.get_user(id)?.ok_or_else(|| DomainError::not_found(missing))
    }

    pub fn create(&self, actor: &Actor, input: NewSwap, now: DateTime<Utc>) -> Result<SwapRequest, DomainError> {
        let shift = self.repo
                        .get_shift(&input.shift_id)?
                        .ok_or_else(|| DomainError::not_found("Plantão não encontrado"))?;
        if shift.employee_id != Some(actor.id) {
            return Err(DomainError::forbidden("Você só pode solicitar troca dos seus próprios plantões"));
        }

        let target = match input.target_id {
            Some(id) => {
                if id == actor.id {
                    return Err(DomainError::validation("Não é possível trocar plantão consigo mesmo"));
                }
                let target = self.user(&id, "Usuário alvo não encontrado")?;
                if !target.active {
                    return Err(DomainError::validation("Usuário alvo está inativo"));
                }
                partner_allowed(actor.role, target.role)?;
                Some(target)
            }
            None => None,
        };

        let target_shift = match input.target_shift_id {
            Some(id) => {
                let target = target.as_ref()
                                   .ok_or_else(|| DomainError::validation("Troca bilateral exige um colega definido"))?;
                let ts = self.repo
                             .get_shift(&id)?
                             .ok_or_else(|| DomainError::not_found("Plantão do colega não encontrado"))?;
                if ts.employee_id != Some(target.id) {
                    return Err(DomainError::validation("O plantão selecionado não pertence ao colega escolhido"));
                }
                Some(ts)
            }
            None => None,
        };

        let swap = SwapRequest { id: Uuid::new_v4(),
                                 shift_id: shift.id,
                                 shift_date: shift.start,
                                 requester_id: actor.id,
                                 requester_name: actor.name.clone(),
                                 target_id: target.as_ref().map(|t| t.id),
                                 target_name: target.as_ref().map(|t| t.name.clone()),
                                 target_shift_id: target_shift.as_ref().map(|s| s.id),
                                 reason: input.reason.filter(|r| !r.trim().is_empty()),
                                 status: SwapStatus::Pendente,
                                 approved_by: None,
                                 approved_at: None,
                                 responded_at: None,
                                 created_at: now,
                                 updated_at: now };

        let description = match (&target, &target_shift) {
            (Some(t), Some(ts)) => format!("{} solicitou troca de plantão do dia {} com {} do dia {}",
                                           actor.name,
                                           day(swap.shift_date),
                                           t.name,
                                           day(ts.start)),
            (Some(t), None) => {
                format!("{} solicitou troca de plantão com {} em {}", actor.name, t.name, day(swap.shift_date))
            }
            _ => format!("{} solicitou troca de plantão para qualquer disponível em {}",
                         actor.name,
                         day(swap.shift_date)),
        };
        let activity = ActivityLog::new(ActivityKind::SwapRequested,
                                        actor,
                                        "swap",
                                        swap.id,
                                        description,
                                        json!({ "shiftId": swap.shift_id,
                                                "targetId": swap.target_id,
                                                "targetShiftId": swap.target_shift_id,
                                                "reason": swap.reason }),
                                        now);
        self.repo.insert_swap(&swap, &activity)?;
        Ok(swap)
    }

    /// Atendentes sólo ven trocas en las que participan.
    pub fn list(&self,
                actor: &Actor,
                status: Option<SwapStatus>,
                user_id: Option<Uuid>)
                -> Result<Vec<SwapRequest>, DomainError> {
        let user_id = if actor.role == Role::Atendente { Some(actor.id) } else { user_id };
        self.repo.list_swaps(&SwapFilter { status, user_id, shift_id: None })
    }

    pub fn respond(&self,
                   actor: &Actor,
                   id: &Uuid,
                   response: SwapResponse,
                   now: DateTime<Utc>)
                   -> Result<SwapRequest, DomainError> {
        let accepted = match response.status {
            SwapStatus::Aceito => true,
            SwapStatus::Recusado => false,
            _ => return Err(DomainError::validation("Status inválido. Use: aceito ou recusado")),
        };
        let mut swap = self.find(id)?;
        if swap.status != SwapStatus::Pendente {
            return Err(DomainError::validation("Esta solicitação já foi respondida"));
        }
        match swap.target_id {
            Some(target) if target != actor.id => {
                return Err(DomainError::forbidden("Apenas o colega convidado pode responder a esta solicitação"));
            }
            Some(_) => {}
            None => {
                // oferta abierta: quien acepta pasa a ser el alvo
                if actor.id == swap.requester_id {
                    return Err(DomainError::forbidden("Você não pode responder à sua própria solicitação"));
                }
                if !accepted {
                    return Err(DomainError::validation("Ofertas abertas só podem ser aceitas"));
                }
                let requester = self.user(&swap.requester_id, "Solicitante não encontrado")?;
                partner_allowed(requester.role, actor.role)?;
                swap.target_id = Some(actor.id);
                swap.target_name = Some(actor.name.clone());
            }
        }
        swap.status = response.status;
        swap.responded_at = Some(now);
        swap.updated_at = now;

        let (kind, verb) = if accepted { (ActivityKind::SwapAccepted, "aceitou") } else { (ActivityKind::SwapRejected, "recusou") };
        let activity = ActivityLog::new(kind,
                                        actor,
                                        "swap",
                                        swap.id,
                                        format!("{} {} a troca de plantão solicitada por {}",
                                                actor.name, verb, swap.requester_name),
                                        json!({ "requesterId": swap.requester_id, "shiftDate": swap.shift_date }),
                                        now);
        self.repo.update_swap(&swap, &[SwapStatus::Pendente], &activity)?;
        Ok(swap)
    }

    /// Aprueba una troca aceita y reasigna los plantões en la misma
    /// operación.
    pub fn approve(&self, actor: &Actor, id: &Uuid, now: DateTime<Utc>) -> Result<SwapRequest, DomainError> {
        actor.require_supervisor("Acesso negado. Apenas chefes ou administradores.")?;
        let mut swap = self.find(id)?;
        if swap.status != SwapStatus::Aceito {
            return Err(DomainError::validation("Apenas solicitações aceitas podem ser aprovadas"));
        }
        let reassignments = reassignments_for(&swap)?;
        swap.status = SwapStatus::Aprovado;
        swap.approved_by = Some(actor.email.clone());
        swap.approved_at = Some(now);
        swap.updated_at = now;

        let activity = ActivityLog::new(ActivityKind::SwapApproved,
                                        actor,
                                        "swap",
                                        swap.id,
                                        format!("{} aprovou a troca de plantão entre {} e {}",
                                                actor.name,
                                                swap.requester_name,
                                                swap.target_name.as_deref().unwrap_or("-")),
                                        json!({ "shiftId": swap.shift_id, "targetShiftId": swap.target_shift_id }),
                                        now);
        self.repo.approve_swap(&swap, &reassignments, &activity)?;
        log::info!("troca {} aprobada por {}", swap.id, actor.email);
        Ok(swap)
    }

    pub fn cancel(&self, actor: &Actor, id: &Uuid, now: DateTime<Utc>) -> Result<SwapRequest, DomainError> {
        let mut swap = self.find(id)?;
        if swap.requester_id != actor.id {
            return Err(DomainError::forbidden("Apenas o solicitante pode cancelar"));
        }
        if !swap.status.is_open() {
            return Err(DomainError::validation("Esta solicitação não pode mais ser cancelada"));
        }
        swap.status = SwapStatus::Cancelado;
        swap.updated_at = now;
        let activity = ActivityLog::new(ActivityKind::SwapCancelled,
                                        actor,
                                        "swap",
                                        swap.id,
                                        format!("{} cancelou a solicitação de troca de plantão", actor.name),
                                        json!({ "shiftId": swap.shift_id }),
                                        now);
        self.repo.update_swap(&swap, &[SwapStatus::Pendente, SwapStatus::Aceito], &activity)?;
        Ok(swap)
    }
}

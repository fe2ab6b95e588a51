// swap.rs
use crate::{DomainError, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Ciclo de vida de una solicitud de troca:
/// `pendente → aceito → aprovado`, o bien `recusado` / `cancelado`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwapStatus {
  Pendente,
  Aceito,
  Recusado,
  Aprovado,
  Cancelado,
}

impl SwapStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      SwapStatus::Pendente => "pendente",
      SwapStatus::Aceito => "aceito",
      SwapStatus::Recusado => "recusado",
      SwapStatus::Aprovado => "aprovado",
      SwapStatus::Cancelado => "cancelado",
    }
  }

  /// Solicitudes todavía vivas (pueden avanzar o cancelarse).
  pub fn is_open(&self) -> bool {
    matches!(self, SwapStatus::Pendente | SwapStatus::Aceito)
  }
}

impl fmt::Display for SwapStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for SwapStatus {
  type Err = DomainError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim() {
      "pendente" => Ok(SwapStatus::Pendente),
      "aceito" => Ok(SwapStatus::Aceito),
      "recusado" => Ok(SwapStatus::Recusado),
      "aprovado" => Ok(SwapStatus::Aprovado),
      "cancelado" => Ok(SwapStatus::Cancelado),
      other => Err(DomainError::validation(format!("Status inválido: {}", other))),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapRequest {
  pub id: Uuid,
  pub shift_id: Uuid,
  pub shift_date: DateTime<Utc>,
  pub requester_id: Uuid,
  pub requester_name: String,
  /// `None`: oferta abierta a cualquier colega elegible.
  pub target_id: Option<Uuid>,
  pub target_name: Option<String>,
  /// Presente en trocas bilaterales.
  pub target_shift_id: Option<Uuid>,
  pub reason: Option<String>,
  pub status: SwapStatus,
  pub approved_by: Option<String>,
  pub approved_at: Option<DateTime<Utc>>,
  pub responded_at: Option<DateTime<Utc>>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl SwapRequest {
  pub fn is_bilateral(&self) -> bool {
    self.target_shift_id.is_some()
  }

  pub fn involves(&self, user_id: Uuid) -> bool {
    self.requester_id == user_id || self.target_id == Some(user_id)
  }
}

/// Reglas de elegibilidad por perfil: atendentes sólo entre sí;
/// farmacêuticos y chefes entre ellos; admin con cualquiera.
pub fn partner_allowed(requester: Role, target: Role) -> Result<(), DomainError> {
  let ok = match requester {
    Role::Admin => true,
    Role::Atendente => target == Role::Atendente,
    Role::Farmaceutico | Role::Chefe => matches!(target, Role::Farmaceutico | Role::Chefe),
  };
  if ok {
    return Ok(());
  }
  let msg = match requester {
    Role::Atendente => "Atendentes só podem trocar plantões com outros atendentes",
    Role::Chefe => "Chefes só podem trocar plantões com farmacêuticos e outros chefes",
    _ => "Farmacêuticos só podem trocar plantões com outros farmacêuticos e chefes",
  };
  Err(DomainError::forbidden(msg))
}

pub const SWAP_ALREADY_OPEN: &str = "Já existe uma solicitação em aberto para este plantão";
/// La troca cambió de estado entre la lectura y la escritura.
pub const SWAP_CHANGED: &str = "Esta solicitação foi alterada por outra operação";
pub const SWAP_OVERLAP: &str = "A troca deixaria um funcionário com plantões sobrepostos";

/// Reasignación de un plantão como parte de una aprobación.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShiftReassignment {
  pub shift_id: Uuid,
  pub employee_id: Uuid,
}

/// Plantões que cambian de dueño al aprobar la troca.
pub fn reassignments_for(swap: &SwapRequest) -> Result<Vec<ShiftReassignment>, DomainError> {
  let target = swap.target_id
                   .ok_or_else(|| DomainError::validation("Solicitação sem colega definido não pode ser aprovada"))?;
  let mut out = vec![ShiftReassignment { shift_id: swap.shift_id, employee_id: target }];
  if let Some(target_shift) = swap.target_shift_id {
    out.push(ShiftReassignment { shift_id: target_shift, employee_id: swap.requester_id });
  }
  Ok(out)
}

#[derive(Debug, Clone, Default)]
pub struct SwapFilter {
  pub status: Option<SwapStatus>,
  /// Solicitante o alvo.
  pub user_id: Option<Uuid>,
  pub shift_id: Option<Uuid>,
}

impl SwapFilter {
  pub fn matches(&self, s: &SwapRequest) -> bool {
    self.status.is_none_or(|st| s.status == st)
    && self.user_id.is_none_or(|u| s.involves(u))
    && self.shift_id.is_none_or(|id| s.shift_id == id)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn eligibility_matrix() {
    assert!(partner_allowed(Role::Atendente, Role::Atendente).is_ok());
    assert!(partner_allowed(Role::Atendente, Role::Farmaceutico).is_err());
    assert!(partner_allowed(Role::Farmaceutico, Role::Chefe).is_ok());
    assert!(partner_allowed(Role::Farmaceutico, Role::Atendente).is_err());
    assert!(partner_allowed(Role::Chefe, Role::Farmaceutico).is_ok());
    assert!(partner_allowed(Role::Chefe, Role::Atendente).is_err());
    assert!(partner_allowed(Role::Admin, Role::Atendente).is_ok());
  }

  #[test]
  fn bilateral_swap_reassigns_both_shifts() {
    let now = Utc::now();
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
    let (sa, sb) = (Uuid::new_v4(), Uuid::new_v4());
    let swap = SwapRequest { id: Uuid::new_v4(),
                             shift_id: sa,
                             shift_date: now,
                             requester_id: a,
                             requester_name: "A".into(),
                             target_id: Some(b),
                             target_name: Some("B".into()),
                             target_shift_id: Some(sb),
                             reason: None,
                             status: SwapStatus::Aceito,
                             approved_by: None,
                             approved_at: None,
                             responded_at: Some(now),
                             created_at: now,
                             updated_at: now };
    let r = reassignments_for(&swap).unwrap();
    assert_eq!(r,
               vec![ShiftReassignment { shift_id: sa, employee_id: b },
                    ShiftReassignment { shift_id: sb, employee_id: a }]);
  }
}

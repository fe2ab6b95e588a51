// role.rs
use crate::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Perfil de acceso de un usuario. Los valores de cable son los que ya usa
/// el frontend (`admin`, `chefe`, `farmaceutico`, `atendente`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  Admin,
  Chefe,
  Farmaceutico,
  #[serde(alias = "assistente")]
  Atendente,
}

impl Role {
  pub fn as_str(&self) -> &'static str {
    match self {
      Role::Admin => "admin",
      Role::Chefe => "chefe",
      Role::Farmaceutico => "farmaceutico",
      Role::Atendente => "atendente",
    }
  }

  pub fn is_admin(&self) -> bool {
    matches!(self, Role::Admin)
  }

  /// Chefe o admin: puede gestionar escalas, medicamentos y aprobar trocas.
  pub fn is_supervisor(&self) -> bool {
    matches!(self, Role::Admin | Role::Chefe)
  }

  /// Perfiles que registran entregas y recibimientos de controlados.
  pub fn handles_records(&self) -> bool {
    matches!(self, Role::Farmaceutico | Role::Chefe)
  }
}

impl fmt::Display for Role {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Role {
  type Err = DomainError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "admin" => Ok(Role::Admin),
      "chefe" => Ok(Role::Chefe),
      "farmaceutico" => Ok(Role::Farmaceutico),
      // perfil renombrado; filas antiguas todavía lo contienen
      "atendente" | "assistente" => Ok(Role::Atendente),
      other => Err(DomainError::validation(format!("Role inválida: {}. Use: farmaceutico, chefe, atendente ou admin",
                                                   other))),
    }
  }
}

/// Usuario autenticado que ejecuta una operación.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
  pub id: Uuid,
  pub email: String,
  pub name: String,
  pub role: Role,
}

impl Actor {
  pub fn require_admin(&self, msg: &str) -> Result<(), DomainError> {
    if self.role.is_admin() {
      Ok(())
    } else {
      Err(DomainError::forbidden(msg))
    }
  }

  pub fn require_supervisor(&self, msg: &str) -> Result<(), DomainError> {
    if self.role.is_supervisor() {
      Ok(())
    } else {
      Err(DomainError::forbidden(msg))
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn legacy_assistente_maps_to_atendente() {
    assert_eq!("assistente".parse::<Role>().unwrap(), Role::Atendente);
    let r: Role = serde_json::from_str("\"assistente\"").unwrap();
    assert_eq!(r, Role::Atendente);
    assert_eq!(serde_json::to_string(&r).unwrap(), "\"atendente\"");
  }

  #[test]
  fn unknown_role_is_validation_error() {
    match "gerente".parse::<Role>() {
      Err(DomainError::ValidationError(_)) => {}
      other => panic!("expected validation error, got {:?}", other),
    }
  }
}

// user.rs
use crate::{Actor, DomainError, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
  pub id: Uuid,
  pub email: String,
  pub name: String,
  pub password_hash: String,
  pub role: Role,
  pub telefone: Option<String>,
  pub telefone_whatsapp: Option<String>,
  /// Clave CallMeBot cifrada (base64 de salt|iv|tag|cipher).
  pub callmebot_key: Option<String>,
  pub active: bool,
  pub first_login: bool,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl User {
  pub fn new(email: &str,
             name: &str,
             password_hash: String,
             role: Role,
             now: DateTime<Utc>)
             -> Result<Self, DomainError> {
    let email = normalize_email(email)?;
    if name.trim().is_empty() {
      return Err(DomainError::validation("Nome é obrigatório"));
    }
    Ok(Self { id: Uuid::new_v4(),
              email,
              name: name.trim().to_string(),
              password_hash,
              role,
              telefone: None,
              telefone_whatsapp: None,
              callmebot_key: None,
              active: true,
              first_login: true,
              created_at: now,
              updated_at: now })
  }

  /// Teléfono usado para WhatsApp: el específico o, en su defecto, el general.
  pub fn whatsapp_phone(&self) -> Option<&str> {
    self.telefone_whatsapp
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .or_else(|| self.telefone.as_deref().filter(|p| !p.trim().is_empty()))
  }

  pub fn view(&self) -> UserView {
    UserView::from(self)
  }

  pub fn actor(&self) -> Actor {
    Actor { id: self.id, email: self.email.clone(), name: self.name.clone(), role: self.role }
  }

  pub fn summary(&self) -> UserSummary {
    UserSummary { id: self.id, name: self.name.clone(), email: self.email.clone(), role: self.role }
  }
}

pub fn normalize_email(email: &str) -> Result<String, DomainError> {
  let e = email.trim().to_lowercase();
  if e.is_empty() || !e.contains('@') {
    return Err(DomainError::validation("Email inválido"));
  }
  Ok(e)
}

pub fn validate_password(password: &str) -> Result<(), DomainError> {
  if password.chars().count() < MIN_PASSWORD_LEN {
    return Err(DomainError::validation(format!("A senha deve ter pelo menos {} caracteres", MIN_PASSWORD_LEN)));
  }
  Ok(())
}

/// Proyección pública: nunca expone el hash ni la clave cifrada.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
  pub id: Uuid,
  pub email: String,
  pub name: String,
  pub role: Role,
  pub telefone: Option<String>,
  #[serde(rename = "telefone_whatsapp")]
  pub telefone_whatsapp: Option<String>,
  pub has_callmebot_key: bool,
  pub active: bool,
  pub first_login: bool,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserView {
  fn from(u: &User) -> Self {
    Self { id: u.id,
           email: u.email.clone(),
           name: u.name.clone(),
           role: u.role,
           telefone: u.telefone.clone(),
           telefone_whatsapp: u.telefone_whatsapp.clone(),
           has_callmebot_key: u.callmebot_key.is_some(),
           active: u.active,
           first_login: u.first_login,
           created_at: u.created_at,
           updated_at: u.updated_at }
  }
}

/// Referencia corta embebida en plantões, registros y trocas.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserSummary {
  pub id: Uuid,
  pub name: String,
  pub email: String,
  pub role: Role,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn whatsapp_phone_prefers_dedicated_number() {
    let mut u = User::new("A@Farm.com", "Ana", "h".into(), Role::Farmaceutico, Utc::now()).unwrap();
    assert_eq!(u.email, "a@farm.com");
    assert_eq!(u.whatsapp_phone(), None);
    u.telefone = Some("5516999990000".into());
    assert_eq!(u.whatsapp_phone(), Some("5516999990000"));
    u.telefone_whatsapp = Some("5516988887777".into());
    assert_eq!(u.whatsapp_phone(), Some("5516988887777"));
  }

  #[test]
  fn view_hides_secrets() {
    let mut u = User::new("b@farm.com", "Bia", "secret-hash".into(), Role::Chefe, Utc::now()).unwrap();
    u.callmebot_key = Some("cipher".into());
    let json = serde_json::to_value(u.view()).unwrap();
    assert!(json.get("passwordHash").is_none());
    assert!(json.get("callmebotKey").is_none());
    assert_eq!(json["hasCallmebotKey"], true);
  }
}

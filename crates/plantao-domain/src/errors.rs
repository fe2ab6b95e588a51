// error.rs
use thiserror::Error;

/// Errores del dominio. Cada variante corresponde a una familia de códigos
/// HTTP en la capa API (400, 401, 403, 404 y 500 respectivamente).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
  #[error("{0}")]
  ValidationError(String),
  #[error("{0}")]
  Unauthorized(String),
  #[error("{0}")]
  Forbidden(String),
  #[error("{0}")]
  NotFound(String),
  #[error("Error externo: {0}")]
  ExternalError(String),
  #[error("Error de serialización: {0}")]
  SerializationError(String),
}

impl DomainError {
  pub fn validation(msg: impl Into<String>) -> Self {
    Self::ValidationError(msg.into())
  }

  pub fn forbidden(msg: impl Into<String>) -> Self {
    Self::Forbidden(msg.into())
  }

  pub fn not_found(msg: impl Into<String>) -> Self {
    Self::NotFound(msg.into())
  }
}

impl From<serde_json::Error> for DomainError {
  fn from(e: serde_json::Error) -> Self {
    Self::SerializationError(e.to_string())
  }
}

impl From<bcrypt::BcryptError> for DomainError {
  fn from(e: bcrypt::BcryptError) -> Self {
    Self::ExternalError(format!("bcrypt: {}", e))
  }
}

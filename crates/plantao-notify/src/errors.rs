use plantao_domain::DomainError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
  #[error("CALLMEBOT_MASTER_KEY não configurada")]
  MissingMasterKey,
  #[error("dados inválidos: {0}")]
  InvalidInput(String),
  #[error("erro de criptografia: {0}")]
  Crypto(String),
  /// El usuario no tiene teléfono o clave CallMeBot registrados.
  #[error("{0}")]
  MissingContact(String),
  #[error("CallMeBot API returned status {status}")]
  Status { status: u16, body: String },
  #[error("erro HTTP: {0}")]
  Http(#[from] reqwest::Error),
}

impl From<NotifyError> for DomainError {
  fn from(e: NotifyError) -> Self {
    match e {
      NotifyError::InvalidInput(m) => DomainError::ValidationError(m),
      other => DomainError::ExternalError(other.to_string()),
    }
  }
}

use crate::errors::NotifyError;
use async_trait::async_trait;
use std::sync::Mutex;

pub const DEFAULT_CALLMEBOT_URL: &str = "https://api.callmebot.com/whatsapp.php";

/// Envío de mensajes WhatsApp. `api_key` es la clave CallMeBot ya descifrada.
#[async_trait]
pub trait WhatsAppSender: Send + Sync {
  /// Devuelve el cuerpo de la respuesta del proveedor.
  async fn send(&self, phone: &str, api_key: &str, text: &str) -> Result<String, NotifyError>;
}

/// Deja sólo los dígitos del teléfono (con código de país).
pub fn clean_phone(phone: &str) -> String {
  phone.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn check_input(phone: &str, api_key: &str, text: &str) -> Result<String, NotifyError> {
  let phone = clean_phone(phone);
  if phone.is_empty() || api_key.trim().is_empty() || text.trim().is_empty() {
    return Err(NotifyError::InvalidInput("Phone, API key, and message are required".into()));
  }
  Ok(phone)
}

#[derive(Debug, Clone)]
pub struct CallMeBotClient {
  http: reqwest::Client,
  base_url: String,
}

impl CallMeBotClient {
  pub fn new(base_url: impl Into<String>) -> Self {
    Self { http: reqwest::Client::new(), base_url: base_url.into() }
  }
}

impl Default for CallMeBotClient {
  fn default() -> Self {
    Self::new(DEFAULT_CALLMEBOT_URL)
  }
}

#[async_trait]
impl WhatsAppSender for CallMeBotClient {
  async fn send(&self, phone: &str, api_key: &str, text: &str) -> Result<String, NotifyError> {
    let phone = check_input(phone, api_key, text)?;
    let url = reqwest::Url::parse_with_params(&self.base_url,
                                              &[("phone", phone.as_str()), ("text", text), ("apikey", api_key)])
      .map_err(|e| NotifyError::InvalidInput(format!("CALLMEBOT_API_URL inválida: {}", e)))?;
    let response = self.http.get(url).send().await?;
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
      tracing::error!(status = status.as_u16(), body = %body, "CallMeBot API error");
      return Err(NotifyError::Status { status: status.as_u16(), body });
    }
    // la clave nunca va al log
    tracing::info!(phone = %phone, "WhatsApp enviado");
    Ok(body)
  }
}

/// Mensaje capturado por [`RecordingSender`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
  pub phone: String,
  pub api_key: String,
  pub text: String,
}

/// Sender en memoria para tests y entornos sin salida a internet.
#[derive(Debug, Default)]
pub struct RecordingSender {
  sent: Mutex<Vec<SentMessage>>,
  fail: bool,
}

impl RecordingSender {
  pub fn new() -> Self {
    Self::default()
  }

  /// Variante que rechaza todos los envíos con un 500 simulado.
  pub fn failing() -> Self {
    Self { sent: Mutex::new(Vec::new()), fail: true }
  }

  pub fn sent(&self) -> Vec<SentMessage> {
    self.sent.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
  }
}

#[async_trait]
impl WhatsAppSender for RecordingSender {
  async fn send(&self, phone: &str, api_key: &str, text: &str) -> Result<String, NotifyError> {
    let phone = check_input(phone, api_key, text)?;
    if self.fail {
      return Err(NotifyError::Status { status: 500, body: "simulated failure".into() });
    }
    let mut sent = self.sent.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    sent.push(SentMessage { phone, api_key: api_key.to_string(), text: text.to_string() });
    Ok("Message queued".into())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn phone_keeps_only_digits() {
    assert_eq!(clean_phone("+55 (16) 99999-0000"), "5516999990000");
  }

  #[tokio::test]
  async fn recording_sender_validates_and_records() {
    let sender = RecordingSender::new();
    assert!(matches!(sender.send("", "k", "oi").await, Err(NotifyError::InvalidInput(_))));
    sender.send("+55 16 9999-0000", "k", "olá mundo").await.unwrap();
    let sent = sender.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].phone, "551699990000");
  }

  #[tokio::test]
  async fn failing_sender_reports_status() {
    let sender = RecordingSender::failing();
    assert!(matches!(sender.send("551699990000", "k", "oi").await, Err(NotifyError::Status { status: 500, .. })));
    assert!(sender.sent().is_empty());
  }
}

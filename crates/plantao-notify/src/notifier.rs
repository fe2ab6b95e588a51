use crate::errors::NotifyError;
use crate::vault::KeyVault;
use crate::whatsapp::WhatsAppSender;
use chrono::{DateTime, FixedOffset, Utc};
use plantao_domain::User;
use std::sync::Arc;

/// Entrega mensajes a usuarios del sistema: descifra su clave CallMeBot y usa
/// `telefone_whatsapp` (o `telefone`) como destino.
#[derive(Clone)]
pub struct WhatsAppNotifier {
  vault: Option<KeyVault>,
  sender: Arc<dyn WhatsAppSender>,
}

impl WhatsAppNotifier {
  pub fn new(vault: Option<KeyVault>, sender: Arc<dyn WhatsAppSender>) -> Self {
    Self { vault, sender }
  }

  pub fn vault(&self) -> Option<&KeyVault> {
    self.vault.as_ref()
  }

  pub async fn send_to_user(&self, user: &User, message: &str) -> Result<String, NotifyError> {
    let sealed = user.callmebot_key
                     .as_deref()
                     .ok_or_else(|| {
                       NotifyError::MissingContact(format!("Usuário {} não possui callmebot_key configurada",
                                                           user.email))
                     })?;
    let phone = user.whatsapp_phone()
                    .ok_or_else(|| NotifyError::MissingContact(format!("Usuário {} não possui telefone cadastrado",
                                                                       user.email)))?;
    let vault = self.vault.clone().ok_or(NotifyError::MissingMasterKey)?;
    let sealed = sealed.to_owned();
    // PBKDF2 de 100 000 rondas: fuera de los workers del runtime
    let api_key = tokio::task::spawn_blocking(move || vault.decrypt(&sealed))
      .await
      .map_err(|e| NotifyError::Crypto(format!("tarefa de decifragem: {}", e)))??;
    self.sender.send(phone, &api_key, message).await
  }
}

/// Texto del recordatorio de plantão, con fecha y hora locales.
pub fn shift_reminder(name: Option<&str>, start: DateTime<Utc>, offset: &FixedOffset) -> String {
  let local = start.with_timezone(offset);
  format!("🏥 Lembrete de Plantão\n\nOlá {}!\n\nVocê tem um plantão agendado para:\n📅 {} às {}\n\nNão esqueça de \
           registrar a contagem de medicamentos controlados.",
          name.unwrap_or("Farmacêutico"),
          local.format("%d/%m/%Y"),
          local.format("%H:%M"))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::whatsapp::RecordingSender;
  use plantao_domain::Role;

  fn user(key: Option<String>) -> User {
    let mut u = User::new("ana@farmacia.com", "Ana", "hash".into(), Role::Farmaceutico, Utc::now()).unwrap();
    u.telefone = Some("(16) 3333-0000".into());
    u.telefone_whatsapp = Some("+55 16 99999-0000".into());
    u.callmebot_key = key;
    u
  }

  #[tokio::test]
  async fn decrypts_key_and_prefers_whatsapp_phone() {
    let vault = KeyVault::new("m").unwrap();
    let sender = Arc::new(RecordingSender::new());
    let notifier = WhatsAppNotifier::new(Some(vault.clone()), sender.clone());
    let u = user(Some(vault.encrypt("998877").unwrap()));
    notifier.send_to_user(&u, "teste").await.unwrap();
    let sent = sender.sent();
    assert_eq!(sent[0].phone, "5516999990000");
    assert_eq!(sent[0].api_key, "998877");
  }

  #[tokio::test(flavor = "current_thread")]
  async fn decryption_does_not_stall_the_runtime() {
    use std::sync::atomic::{AtomicUsize, Ordering};

    let vault = KeyVault::new("m").unwrap();
    let notifier = WhatsAppNotifier::new(Some(vault.clone()), Arc::new(RecordingSender::new()));
    let u = user(Some(vault.encrypt("998877").unwrap()));

    let ticks = Arc::new(AtomicUsize::new(0));
    let counter = ticks.clone();
    let ticker = tokio::spawn(async move {
      loop {
        counter.fetch_add(1, Ordering::Relaxed);
        tokio::task::yield_now().await;
      }
    });
    notifier.send_to_user(&u, "teste").await.unwrap();
    ticker.abort();
    // con un único hilo, el ticker sólo avanza si el descifrado cede el runtime
    assert!(ticks.load(Ordering::Relaxed) > 0);
  }

  #[tokio::test]
  async fn missing_key_or_vault_is_reported() {
    let sender = Arc::new(RecordingSender::new());
    let notifier = WhatsAppNotifier::new(None, sender.clone());
    assert!(matches!(notifier.send_to_user(&user(None), "x").await, Err(NotifyError::MissingContact(_))));
    assert!(matches!(notifier.send_to_user(&user(Some("abc".into())), "x").await,
                     Err(NotifyError::MissingMasterKey)));
    assert!(sender.sent().is_empty());
  }

  #[test]
  fn reminder_uses_local_time() {
    let offset = FixedOffset::west_opt(3 * 3600).unwrap();
    let start = DateTime::parse_from_rfc3339("2025-03-10T10:00:00Z").unwrap().with_timezone(&Utc);
    let text = shift_reminder(Some("Ana"), start, &offset);
    assert!(text.contains("Olá Ana!"));
    assert!(text.contains("10/03/2025 às 07:00"));
  }
}

//! Cifrado de las claves CallMeBot de cada usuario.
//!
//! Formato: `base64(salt[64] | iv[16] | tag[16] | ciphertext)`, con la clave
//! AES-256 derivada de la master key por PBKDF2-HMAC-SHA512 (100 000
//! iteraciones) sobre el salt aleatorio.
use crate::errors::NotifyError;
use aes_gcm::aead::consts::U16;
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::aes::Aes256;
use aes_gcm::AesGcm;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use plantao_domain::services::KeySealer;
use plantao_domain::DomainError;
use rand::RngCore;
use sha2::Sha512;

const SALT_LEN: usize = 64;
const IV_LEN: usize = 16;
const TAG_LEN: usize = 16;
const KEY_LEN: usize = 32;
const PBKDF2_ROUNDS: u32 = 100_000;

type Cipher = AesGcm<Aes256, U16>;

#[derive(Clone)]
pub struct KeyVault {
  master: String,
}

impl std::fmt::Debug for KeyVault {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("KeyVault").field("master", &"<redacted>").finish()
  }
}

impl KeyVault {
  pub fn new(master: impl Into<String>) -> Result<Self, NotifyError> {
    let master = master.into();
    if master.is_empty() {
      return Err(NotifyError::MissingMasterKey);
    }
    Ok(Self { master })
  }

  fn cipher(&self, salt: &[u8]) -> Result<Cipher, NotifyError> {
    let mut key = [0u8; KEY_LEN];
    pbkdf2::pbkdf2_hmac::<Sha512>(self.master.as_bytes(), salt, PBKDF2_ROUNDS, &mut key);
    Cipher::new_from_slice(&key).map_err(|e| NotifyError::Crypto(e.to_string()))
  }

  pub fn encrypt(&self, plain: &str) -> Result<String, NotifyError> {
    if plain.is_empty() {
      return Err(NotifyError::InvalidInput("Texto vazio não pode ser cifrado".into()));
    }
    let mut salt = [0u8; SALT_LEN];
    let mut iv = [0u8; IV_LEN];
    let mut rng = rand::thread_rng();
    rng.fill_bytes(&mut salt);
    rng.fill_bytes(&mut iv);

    // aes-gcm devuelve ciphertext || tag; el formato guardado pone el tag antes
    let sealed = self.cipher(&salt)?
                     .encrypt(GenericArray::from_slice(&iv), plain.as_bytes())
                     .map_err(|e| NotifyError::Crypto(e.to_string()))?;
    let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_LEN);

    let mut out = Vec::with_capacity(SALT_LEN + IV_LEN + sealed.len());
    out.extend_from_slice(&salt);
    out.extend_from_slice(&iv);
    out.extend_from_slice(tag);
    out.extend_from_slice(ciphertext);
    Ok(STANDARD.encode(out))
  }

  pub fn decrypt(&self, encoded: &str) -> Result<String, NotifyError> {
    let raw = STANDARD.decode(encoded.trim()).map_err(|e| NotifyError::Crypto(format!("base64: {}", e)))?;
    if raw.len() < SALT_LEN + IV_LEN + TAG_LEN {
      return Err(NotifyError::Crypto("texto cifrado truncado".into()));
    }
    let (salt, rest) = raw.split_at(SALT_LEN);
    let (iv, rest) = rest.split_at(IV_LEN);
    let (tag, ciphertext) = rest.split_at(TAG_LEN);

    let mut sealed = Vec::with_capacity(ciphertext.len() + TAG_LEN);
    sealed.extend_from_slice(ciphertext);
    sealed.extend_from_slice(tag);
    let plain = self.cipher(salt)?
                    .decrypt(GenericArray::from_slice(iv), sealed.as_slice())
                    .map_err(|_| NotifyError::Crypto("falha na autenticação do texto cifrado".into()))?;
    String::from_utf8(plain).map_err(|e| NotifyError::Crypto(e.to_string()))
  }
}

impl KeySealer for KeyVault {
  fn seal(&self, plain: &str) -> Result<String, DomainError> {
    Ok(self.encrypt(plain)?)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn layout_puts_tag_before_ciphertext() {
    let vault = KeyVault::new("master-secret").unwrap();
    let sealed = vault.encrypt("123456").unwrap();
    let raw = STANDARD.decode(&sealed).unwrap();
    assert_eq!(raw.len(), SALT_LEN + IV_LEN + TAG_LEN + "123456".len());
    assert_eq!(vault.decrypt(&sealed).unwrap(), "123456");
  }

  #[test]
  fn wrong_master_key_or_tampering_fails() {
    let sealed = KeyVault::new("a").unwrap().encrypt("apikey").unwrap();
    assert!(matches!(KeyVault::new("b").unwrap().decrypt(&sealed), Err(NotifyError::Crypto(_))));

    let mut raw = STANDARD.decode(&sealed).unwrap();
    let last = raw.len() - 1;
    raw[last] ^= 0x01;
    let tampered = STANDARD.encode(raw);
    assert!(KeyVault::new("a").unwrap().decrypt(&tampered).is_err());
  }

  #[test]
  fn empty_master_key_is_rejected() {
    assert!(matches!(KeyVault::new(""), Err(NotifyError::MissingMasterKey)));
  }
}

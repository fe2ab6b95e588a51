use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use plantao_domain::services::Policy;
use plantao_notify::DEFAULT_CALLMEBOT_URL;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("variável de ambiente obrigatória ausente: {0}")]
    Missing(&'static str),

    #[error("valor inválido para {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Usuario administrador creado al arrancar si todavía no existe ninguno.
#[derive(Clone)]
pub struct AdminSeed {
    pub email: String,
    pub name: String,
    pub password: String,
}

#[derive(Clone)]
pub struct Config {
    pub port: u16,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub callmebot_master_key: Option<String>,
    pub callmebot_api_url: String,
    pub uploads_dir: PathBuf,
    pub tz_offset_minutes: i32,
    pub shift_tolerance_minutes: i64,
    pub bcrypt_cost: u32,
    /// Sólo con un proxy delante que sobrescriba `x-forwarded-for`.
    pub trust_proxy: bool,
    pub admin: Option<AdminSeed>,
}

impl Config {
    /// Lee la configuración del entorno (y de `.env` si existe).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let jwt_secret = var("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;
        let callmebot_master_key = var("CALLMEBOT_MASTER_KEY");
        if callmebot_master_key.is_none() {
            warn!("CALLMEBOT_MASTER_KEY not set, WhatsApp notifications disabled");
        }

        let admin = match (var("ADMIN_EMAIL"), var("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(AdminSeed {
                email,
                password,
                name: var("ADMIN_NAME").unwrap_or_else(|| "Administrador".into()),
            }),
            _ => None,
        };

        Ok(Self {
            port: try_load("PORT", "3001")?,
            jwt_secret,
            token_ttl_hours: try_load("TOKEN_TTL_HOURS", "168")?,
            callmebot_master_key,
            callmebot_api_url: var("CALLMEBOT_API_URL").unwrap_or_else(|| DEFAULT_CALLMEBOT_URL.into()),
            uploads_dir: PathBuf::from(var("UPLOADS_DIR").unwrap_or_else(|| "uploads".into())),
            tz_offset_minutes: try_load("TZ_OFFSET_MINUTES", "-180")?,
            shift_tolerance_minutes: try_load("SHIFT_TOLERANCE_MINUTES", "120")?,
            bcrypt_cost: try_load("BCRYPT_COST", "10")?,
            trust_proxy: try_load("TRUST_PROXY", "false")?,
            admin,
        })
    }

    pub fn policy(&self) -> Result<Policy, ConfigError> {
        Policy::new(self.shift_tolerance_minutes, self.tz_offset_minutes, self.bcrypt_cost).map_err(|e| {
            ConfigError::Invalid {
                key: "TZ_OFFSET_MINUTES/SHIFT_TOLERANCE_MINUTES",
                reason: e.to_string(),
            }
        })
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn try_load<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_numbers_are_reported_with_their_key() {
        // variable propia del test para no pisar otras
        env::set_var("PLANTAO_TEST_PORT", "abc");
        let res: Result<u16, _> = try_load("PLANTAO_TEST_PORT", "3001");
        assert!(matches!(res, Err(ConfigError::Invalid { key: "PLANTAO_TEST_PORT", .. })));
        env::remove_var("PLANTAO_TEST_PORT");

        let port: u16 = try_load("PLANTAO_TEST_UNSET_PORT", "3001").unwrap();
        assert_eq!(port, 3001);
    }
}

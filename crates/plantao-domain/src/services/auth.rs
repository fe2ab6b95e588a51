use super::{hash_password, verify_password, Policy};
use crate::{normalize_email, validate_password, ActivityKind, ActivityLog, Actor, DomainError, DomainRepository, Role,
            User};
use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use serde_json::json;
use std::sync::Arc;

/// Hash verificado cuando el email no existe, así el login tarda lo mismo
/// para cuentas existentes e inexistentes.
static DUMMY_HASH: OnceCell<String> = OnceCell::new();

/// Datos de alta de un usuario.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password: String,
    pub role: Role,
    pub telefone: Option<String>,
    pub telefone_whatsapp: Option<String>,
}

/// Registro, login y gestión de la propia contraseña.
pub struct AuthService<R: DomainRepository + ?Sized> {
    repo: Arc<R>,
    policy: Policy,
}

impl<R: DomainRepository + ?Sized> AuthService<R> {
    pub fn new(repo: Arc<R>, policy: Policy) -> Self {
        Self { repo, policy }
    }

    pub fn register(&self, actor: &Actor, input: NewUser, now: DateTime<Utc>) -> Result<User, DomainError> {
        actor.require_admin("Apenas administradores podem criar usuários")?;
        validate_password(&input.password)?;
        let email = normalize_email(&input.email)?;
        if self.repo.find_user_by_email(&email)?.is_some() {
            return Err(DomainError::validation("Email já cadastrado"));
        }
        let hash = hash_password(&input.password, self.policy.bcrypt_cost)?;
        let mut user = User::new(&email, &input.name, hash, input.role, now)?;
        user.telefone = input.telefone.filter(|t| !t.trim().is_empty());
        user.telefone_whatsapp = input.telefone_whatsapp.filter(|t| !t.trim().is_empty());

        let activity = ActivityLog::new(ActivityKind::UserCreated,
                                        actor,
                                        "user",
                                        user.id,
                                        format!("{} cadastrou {} ({})", actor.name, user.name, user.role),
                                        json!({ "email": user.email, "role": user.role }),
                                        now);
        self.repo.insert_user(&user, Some(&activity))?;
        log::info!("usuario creado: {} ({})", user.email, user.role);
        Ok(user)
    }

    /// Devuelve el usuario cuando las credenciales son válidas. Usuarios
    /// inexistentes, inactivos o con contraseña incorrecta producen el mismo
    /// error.
    pub fn login(&self, email: &str, password: &str) -> Result<User, DomainError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(DomainError::validation("Email e senha são obrigatórios"));
        }
        let invalid = || DomainError::Unauthorized("Credenciais inválidas".to_string());
        let email = normalize_email(email).map_err(|_| invalid())?;
        let Some(user) = self.repo.find_user_by_email(&email)?.filter(|u| u.active) else {
            if let Ok(hash) = DUMMY_HASH.get_or_try_init(|| hash_password("senha-inexistente", self.policy.bcrypt_cost)) {
                verify_password(password, hash);
            }
            return Err(invalid());
        };
        if !verify_password(password, &user.password_hash) {
            log::debug!("login rechazado para {}", email);
            return Err(invalid());
        }
        Ok(user)
    }

    pub fn me(&self, actor: &Actor) -> Result<User, DomainError> {
        self.repo.get_user(&actor.id)?.ok_or_else(|| DomainError::not_found("Usuário não encontrado"))
    }

    pub fn change_password(&self,
                           actor: &Actor,
                           current: &str,
                           new_password: &str,
                           now: DateTime<Utc>)
                           -> Result<(), DomainError> {
        let mut user = self.me(actor)?;
        if !verify_password(current, &user.password_hash) {
            return Err(DomainError::validation("Senha atual incorreta"));
        }
        validate_password(new_password)?;
        user.password_hash = hash_password(new_password, self.policy.bcrypt_cost)?;
        user.first_login = false;
        user.updated_at = now;
        self.repo.update_user(&user, None)
    }

    /// Crea el administrador inicial si todavía no existe ninguno. Devuelve
    /// `true` cuando se creó.
    pub fn ensure_admin(&self, email: &str, name: &str, password: &str, now: DateTime<Utc>) -> Result<bool, DomainError> {
        if self.repo.list_users()?.iter().any(|u| u.role.is_admin()) {
            return Ok(false);
        }
        validate_password(password)?;
        let hash = hash_password(password, self.policy.bcrypt_cost)?;
        let mut admin = User::new(email, name, hash, Role::Admin, now)?;
        admin.first_login = false;
        self.repo.insert_user(&admin, None)?;
        log::info!("administrador inicial creado: {}", admin.email);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DomainStubs;

    #[test]
    fn unknown_email_still_runs_a_password_check() {
        let s = DomainStubs::sample(Utc::now()).unwrap();
        let auth = AuthService::new(s.repo.clone(), Policy::new(120, -180, 4).unwrap());
        let res = auth.login("ninguem@farmacia.com", "qualquer");
        assert!(matches!(res, Err(DomainError::Unauthorized(_))));
        let hash = DUMMY_HASH.get().expect("dummy hash initialised");
        assert!(!verify_password("qualquer", hash));
    }
}

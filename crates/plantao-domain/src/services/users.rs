use super::{hash_password, KeySealer, Policy};
use crate::{validate_password, ActivityKind, ActivityLog, Actor, DomainError, DomainRepository, Role, User};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;

/// Cambios parciales sobre un usuario. `Some("")` en los teléfonos los borra.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub role: Option<Role>,
    pub telefone: Option<String>,
    pub telefone_whatsapp: Option<String>,
    pub callmebot_key: Option<String>,
    pub active: Option<bool>,
    pub password: Option<String>,
}

pub struct UserService<R: DomainRepository + ?Sized> {
    repo: Arc<R>,
    policy: Policy,
    sealer: Option<Arc<dyn KeySealer>>,
}

fn blank_to_none(v: String) -> Option<String> {
    let v = v.trim().to_string();
    if v.is_empty() { None } else { Some(v) }
}

impl<R: DomainRepository + ?Sized> UserService<R> {
    pub fn new(repo: Arc<R>, policy: Policy, sealer: Option<Arc<dyn KeySealer>>) -> Self {
        Self { repo, policy, sealer }
    }

    pub fn list(&self) -> Result<Vec<User>, DomainError> {
        self.repo.list_users()
    }

    pub fn get(&self, id: &uuid::Uuid) -> Result<User, DomainError> {
        self.repo.get_user(id)?.ok_or_else(|| DomainError::not_found("Usuário não encontrado"))
    }

    pub fn update(&self,
                  actor: &Actor,
                  id: &uuid::Uuid,
                  changes: UserChanges,
                  now: DateTime<Utc>)
                  -> Result<User, DomainError> {
        if (changes.role.is_some() || changes.active.is_some()) && !actor.role.is_admin() {
            return Err(DomainError::forbidden("Apenas administradores podem alterar role ou status"));
        }
        if !actor.role.is_admin() && actor.id != *id {
            return Err(DomainError::forbidden("Você só pode editar seus próprios dados"));
        }
        // un admin no puede desactivarse ni quitarse el perfil a sí mismo
        if actor.id == *id && (changes.active == Some(false) || changes.role.is_some_and(|r| r != actor.role)) {
            return Err(DomainError::validation("Você não pode desativar ou alterar o perfil da sua própria conta"));
        }
        let mut user = self.get(id)?;

        if let Some(name) = changes.name {
            user.name = blank_to_none(name).ok_or_else(|| DomainError::validation("Nome é obrigatório"))?;
        }
        if let Some(t) = changes.telefone {
            user.telefone = blank_to_none(t);
        }
        if let Some(t) = changes.telefone_whatsapp {
            user.telefone_whatsapp = blank_to_none(t);
        }
        if let Some(role) = changes.role {
            user.role = role;
        }
        if let Some(active) = changes.active {
            user.active = active;
        }
        if let Some(password) = changes.password.filter(|p| !p.is_empty()) {
            validate_password(&password)?;
            user.password_hash = hash_password(&password, self.policy.bcrypt_cost)?;
        }
        if let Some(key) = changes.callmebot_key.and_then(blank_to_none) {
            let sealer = self.sealer
                             .as_ref()
                             .ok_or_else(|| DomainError::ExternalError("CALLMEBOT_MASTER_KEY não configurada".into()))?;
            user.callmebot_key = Some(sealer.seal(&key)?);
        }
        user.updated_at = now;

        let activity = ActivityLog::new(ActivityKind::UserUpdated,
                                        actor,
                                        "user",
                                        user.id,
                                        format!("{} atualizou o usuário {}", actor.name, user.name),
                                        json!({ "role": user.role, "active": user.active }),
                                        now);
        self.repo.update_user(&user, Some(&activity))?;
        Ok(user)
    }

    /// Baja lógica: el usuario queda inactivo y no puede iniciar sesión.
    pub fn deactivate(&self, actor: &Actor, id: &uuid::Uuid, now: DateTime<Utc>) -> Result<(), DomainError> {
        actor.require_admin("Apenas administradores podem deletar usuários")?;
        if actor.id == *id {
            return Err(DomainError::validation("Você não pode deletar sua própria conta"));
        }
        let mut user = self.get(id)?;
        user.active = false;
        user.updated_at = now;
        let activity = ActivityLog::new(ActivityKind::UserDeactivated,
                                        actor,
                                        "user",
                                        user.id,
                                        format!("{} desativou o usuário {}", actor.name, user.name),
                                        json!({ "email": user.email }),
                                        now);
        self.repo.update_user(&user, Some(&activity))
    }
}

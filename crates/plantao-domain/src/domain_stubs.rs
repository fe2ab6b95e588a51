use crate::domain_repository::{DomainRepository, InMemoryDomainRepository};
use crate::{Actor, DomainError, Medication, Role, Shift, User};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Contraseña de todos los usuarios de ejemplo.
pub const STUB_PASSWORD: &str = "senha123";

/// Equipo de ejemplo: un usuario por perfil (dos farmacêuticos y dos
/// atendentes), un medicamento y un plantão en curso para cada farmacêutico.
pub struct DomainStubs {
    pub repo: Arc<InMemoryDomainRepository>,
    pub admin: User,
    pub chefe: User,
    pub farm_a: User,
    pub farm_b: User,
    pub atend_a: User,
    pub atend_b: User,
    pub med: Medication,
    /// `farm_a`, de `now - 1h` a `now + 11h`.
    pub shift_a: Shift,
    /// `farm_b`, de `now + 11h` a `now + 23h`.
    pub shift_b: Shift,
}

impl DomainStubs {
    /// Crea un repositorio en memoria pre-populado. Usa coste bcrypt mínimo
    /// para que los tests sean rápidos.
    pub fn sample(now: DateTime<Utc>) -> Result<Self, DomainError> {
        let repo = Arc::new(InMemoryDomainRepository::new());
        let hash = bcrypt::hash(STUB_PASSWORD, 4)?;
        let user = |email: &str, name: &str, role: Role| -> Result<User, DomainError> {
            let mut u = User::new(email, name, hash.clone(), role, now)?;
            u.first_login = false;
            repo.insert_user(&u, None)?;
            Ok(u)
        };
        let admin = user("admin@farmacia.com", "Administrador", Role::Admin)?;
        let chefe = user("chefe@farmacia.com", "Carla Chefe", Role::Chefe)?;
        let farm_a = user("ana@farmacia.com", "Ana Farmacêutica", Role::Farmaceutico)?;
        let farm_b = user("bruno@farmacia.com", "Bruno Farmacêutico", Role::Farmaceutico)?;
        let atend_a = user("davi@farmacia.com", "Davi Atendente", Role::Atendente)?;
        let atend_b = user("eva@farmacia.com", "Eva Atendente", Role::Atendente)?;

        let med = Medication::new("MISO200",
                                  "MISOPROSTOL 200 MCG",
                                  "comprimido",
                                  Some("Armário de Controlados".into()),
                                  now)?;
        repo.insert_medication(&med)?;

        let shift_a = Shift::new(now - Duration::hours(1), now + Duration::hours(11), Some(farm_a.id), &chefe.email, now)?;
        let shift_b =
            Shift::new(now + Duration::hours(11), now + Duration::hours(23), Some(farm_b.id), &chefe.email, now)?;
        let seed = crate::ActivityLog::new(crate::ActivityKind::ShiftsGenerated,
                                           &Self::actor(&chefe),
                                           "shift",
                                           shift_a.id,
                                           "escala de ejemplo",
                                           serde_json::json!({ "count": 2 }),
                                           now);
        repo.insert_shifts(&[shift_a.clone(), shift_b.clone()], &seed)?;

        Ok(Self { repo, admin, chefe, farm_a, farm_b, atend_a, atend_b, med, shift_a, shift_b })
    }

    pub fn actor(user: &User) -> Actor {
        user.actor()
    }
}

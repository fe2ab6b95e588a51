use std::{path::PathBuf, sync::Arc};

use plantao_domain::{
    services::{
        AbsenceService, ActivityService, AuthService, KeySealer, MedicationService, Policy, RecordService,
        ShiftService, SwapService, UserService,
    },
    DomainError, DomainRepository,
};
use plantao_notify::{CalendarClient, WhatsAppNotifier};

use crate::{auth::JwtKeys, error::ApiError, rate_limit::RateLimiter};

pub type SharedState = Arc<AppState>;

pub type Repo = dyn DomainRepository;

pub struct AppState {
    pub repo: Arc<Repo>,
    pub policy: Policy,
    pub jwt: JwtKeys,
    pub notifier: WhatsAppNotifier,
    pub calendar: CalendarClient,
    pub limiter: RateLimiter,
    pub uploads_dir: PathBuf,
    /// Honrar `x-forwarded-for` al identificar al cliente.
    pub trust_proxy: bool,
}

impl AppState {
    pub fn new(
        repo: Arc<Repo>,
        policy: Policy,
        jwt: JwtKeys,
        notifier: WhatsAppNotifier,
        uploads_dir: PathBuf,
        trust_proxy: bool,
    ) -> SharedState {
        Arc::new(Self {
            repo,
            policy,
            jwt,
            notifier,
            calendar: CalendarClient,
            limiter: RateLimiter::default(),
            uploads_dir,
            trust_proxy,
        })
    }

    pub fn auth(&self) -> AuthService<Repo> {
        AuthService::new(Arc::clone(&self.repo), self.policy.clone())
    }

    /// El vault del notificador cifra las claves CallMeBot al guardarlas.
    pub fn users(&self) -> UserService<Repo> {
        let sealer = self
            .notifier
            .vault()
            .cloned()
            .map(|vault| Arc::new(vault) as Arc<dyn KeySealer>);
        UserService::new(Arc::clone(&self.repo), self.policy.clone(), sealer)
    }

    pub fn shifts(&self) -> ShiftService<Repo> {
        ShiftService::new(Arc::clone(&self.repo), self.policy.clone())
    }

    pub fn meds(&self) -> MedicationService<Repo> {
        MedicationService::new(Arc::clone(&self.repo))
    }

    pub fn records(&self) -> RecordService<Repo> {
        RecordService::new(Arc::clone(&self.repo), self.policy.clone())
    }

    pub fn swaps(&self) -> SwapService<Repo> {
        SwapService::new(Arc::clone(&self.repo))
    }

    pub fn absences(&self) -> AbsenceService<Repo> {
        AbsenceService::new(Arc::clone(&self.repo), self.policy.clone())
    }

    pub fn activity(&self) -> ActivityService<Repo> {
        ActivityService::new(Arc::clone(&self.repo), self.policy.clone())
    }
}

/// Ejecuta una operación del dominio (que bloquea en la base) fuera del
/// runtime async.
pub async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, DomainError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(format!("blocking task failed: {e}")))?
        .map_err(ApiError::from)
}

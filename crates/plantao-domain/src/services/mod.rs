// Archivo: services/mod.rs
// Propósito: capa de reglas de negocio. Cada servicio orquesta el
// `DomainRepository`, valida permisos del `Actor` y escribe las entradas de
// auditoría/actividad junto con la mutación. Está pensada para ser invocada
// desde los handlers HTTP.
mod absences;
mod activity;
mod auth;
mod meds;
mod records;
mod shifts;
mod swaps;
mod users;

pub use absences::{AbsenceService, NewAbsence};
pub use activity::ActivityService;
pub use auth::{AuthService, NewUser};
pub use meds::{MedicationChanges, MedicationService, NewMedication};
pub use records::{NewRecord, ReceiveRecord, RecordChanges, RecordService};
pub use shifts::{NewRecurringShifts, NewShift, ShiftChanges, ShiftService};
pub use swaps::{NewSwap, SwapResponse, SwapService};
pub use users::{UserChanges, UserService};

use crate::DomainError;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Offset, TimeZone, Utc};

/// Cifrado de secretos por usuario (clave CallMeBot). La implementación vive
/// en el crate de notificaciones.
pub trait KeySealer: Send + Sync {
    fn seal(&self, plain: &str) -> Result<String, DomainError>;
}

/// Parámetros de negocio configurables.
#[derive(Debug, Clone)]
pub struct Policy {
    /// Margen alrededor del plantão en que se permite entregar/recibir.
    pub tolerance: Duration,
    /// Desfase de la farmacia; define "hoy" y las horas de la geração.
    pub offset: FixedOffset,
    pub bcrypt_cost: u32,
}

impl Default for Policy {
    fn default() -> Self {
        Self { tolerance: Duration::minutes(crate::DEFAULT_TOLERANCE_MINUTES),
               offset: FixedOffset::west_opt(3 * 3600).unwrap_or_else(|| Utc.fix()),
               bcrypt_cost: bcrypt::DEFAULT_COST }
    }
}

impl Policy {
    pub fn new(tolerance_minutes: i64, offset_minutes: i32, bcrypt_cost: u32) -> Result<Self, DomainError> {
        let offset = FixedOffset::east_opt(offset_minutes * 60)
            .ok_or_else(|| DomainError::validation(format!("Desfase horário inválido: {}", offset_minutes)))?;
        if tolerance_minutes < 0 {
            return Err(DomainError::validation("Tolerância não pode ser negativa"));
        }
        Ok(Self { tolerance: Duration::minutes(tolerance_minutes), offset, bcrypt_cost })
    }

    /// `[00:00, 24:00)` del día local `date`, en UTC.
    pub fn day_bounds(&self, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = date.and_hms_opt(0, 0, 0).unwrap_or_default();
        let start = match self.offset.from_local_datetime(&start).single() {
            Some(dt) => dt.with_timezone(&Utc),
            None => Utc.from_utc_datetime(&start),
        };
        (start, start + Duration::days(1))
    }

    pub fn today_bounds(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        self.day_bounds(now.with_timezone(&self.offset).date_naive())
    }
}

pub(crate) fn hash_password(plain: &str, cost: u32) -> Result<String, DomainError> {
    Ok(bcrypt::hash(plain, cost)?)
}

pub(crate) fn verify_password(plain: &str, hash: &str) -> bool {
    // hashes corruptos se tratan como contraseña incorrecta
    bcrypt::verify(plain, hash).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn today_is_computed_in_local_offset() {
        let policy = Policy::new(120, -180, 4).unwrap();
        // 02:00 UTC del 11 = 23:00 del 10 en UTC-3
        let now = Utc.with_ymd_and_hms(2025, 3, 11, 2, 0, 0).unwrap();
        let (from, to) = policy.today_bounds(now);
        assert_eq!(from, Utc.with_ymd_and_hms(2025, 3, 10, 3, 0, 0).unwrap());
        assert_eq!(to - from, Duration::days(1));
        assert_eq!(from.hour(), 3);
    }

    #[test]
    fn invalid_offset_is_rejected() {
        assert!(Policy::new(120, 24 * 60, 4).is_err());
    }
}

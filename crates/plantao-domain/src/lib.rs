mod absence;
mod activity;
mod domain_repository;
mod domain_stubs;
mod errors;
mod medication;
mod record;
pub mod recurring;
mod role;
pub mod services;
mod shift;
mod swap;
mod user;

pub use absence::{Absence, AbsenceFilter, DEFAULT_REASON};
pub use activity::{ActivityFilter, ActivityKind, ActivityLog, ActivityStats, DEFAULT_ACTIVITY_LIMIT, MAX_ACTIVITY_LIMIT};
pub use domain_repository::{DomainRepository, InMemoryDomainRepository};
pub use errors::DomainError;
pub use medication::{normalize_code, Medication};
pub use record::{validate_quantity, AuditAction, AuditFilter, AuditLog, AuditLogView, AuditRecordRef, MedRef, Record,
                 RecordFilter, RecordGuard, RecordStatus, RecordView};
pub use recurring::{RecurrencePattern, RecurrenceRequest};
pub use role::{Actor, Role};
pub use shift::{handover_phase, overlaps, validate_interval, within_tolerance, HandoverPhase, Shift, ShiftFilter,
                ShiftView, DEFAULT_TOLERANCE_MINUTES};
pub use swap::{partner_allowed, reassignments_for, ShiftReassignment, SwapFilter, SwapRequest, SwapStatus,
               SWAP_ALREADY_OPEN, SWAP_CHANGED, SWAP_OVERLAP};
pub use user::{normalize_email, validate_password, User, UserSummary, UserView, MIN_PASSWORD_LEN};
// Re-export stubs so downstream crates can seed fixtures in their tests
pub use domain_stubs::{DomainStubs, STUB_PASSWORD};

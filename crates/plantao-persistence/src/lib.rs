//! Persistencia Diesel del dominio de plantões.
//! Expone el módulo `schema` y el repositorio que implementa
//! `plantao_domain::DomainRepository` sobre SQLite (por defecto) o Postgres
//! (feature `pg`). Las migraciones van embebidas y se aplican al abrir el pool.

mod domain_persistence;
mod rows;
pub mod schema;

#[cfg(not(feature = "pg"))]
pub use domain_persistence::new_sqlite_for_test;
pub use domain_persistence::{new_from_env, DieselDomainRepository, MIGRATIONS};

use crate::{normalize_code, Actor, DomainError, DomainRepository, Medication};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NewMedication {
    pub code: String,
    pub name: String,
    pub unit: String,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MedicationChanges {
    pub code: Option<String>,
    pub name: Option<String>,
    pub unit: Option<String>,
    pub location: Option<String>,
}

/// Catálogo de medicamentos controlados.
pub struct MedicationService<R: DomainRepository + ?Sized> {
    repo: Arc<R>,
}

const SUPERVISOR_ONLY: &str = "Acesso negado. Apenas chefes ou administradores.";

impl<R: DomainRepository + ?Sized> MedicationService<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    pub fn list(&self) -> Result<Vec<Medication>, DomainError> {
        self.repo.list_medications()
    }

    pub fn get(&self, id: &Uuid) -> Result<Medication, DomainError> {
        self.repo.get_medication(id)?.ok_or_else(|| DomainError::not_found("Medicamento não encontrado"))
    }

    pub fn create(&self, actor: &Actor, input: NewMedication, now: DateTime<Utc>) -> Result<Medication, DomainError> {
        actor.require_supervisor(SUPERVISOR_ONLY)?;
        let med = Medication::new(&input.code, &input.name, &input.unit, input.location, now)?;
        if self.repo.find_medication_by_code(&med.code)?.is_some() {
            return Err(DomainError::validation("Código já cadastrado"));
        }
        self.repo.insert_medication(&med)?;
        Ok(med)
    }

    pub fn update(&self,
                  actor: &Actor,
                  id: &Uuid,
                  changes: MedicationChanges,
                  now: DateTime<Utc>)
                  -> Result<Medication, DomainError> {
        actor.require_supervisor(SUPERVISOR_ONLY)?;
        let mut med = self.get(id)?;
        if let Some(code) = changes.code {
            let code = normalize_code(&code);
            if code.is_empty() {
                return Err(DomainError::validation("Código, nome e unidade são obrigatórios"));
            }
            if code != med.code && self.repo.find_medication_by_code(&code)?.is_some() {
                return Err(DomainError::validation("Código já cadastrado"));
            }
            med.code = code;
        }
        if let Some(name) = changes.name {
            if name.trim().is_empty() {
                return Err(DomainError::validation("Código, nome e unidade são obrigatórios"));
            }
            med.name = name.trim().to_string();
        }
        if let Some(unit) = changes.unit {
            if unit.trim().is_empty() {
                return Err(DomainError::validation("Código, nome e unidade são obrigatórios"));
            }
            med.unit = unit.trim().to_string();
        }
        if let Some(location) = changes.location {
            med.location = Some(location.trim().to_string()).filter(|l| !l.is_empty());
        }
        med.updated_at = now;
        self.repo.update_medication(&med)?;
        Ok(med)
    }

    pub fn delete(&self, actor: &Actor, id: &Uuid) -> Result<(), DomainError> {
        actor.require_supervisor(SUPERVISOR_ONLY)?;
        self.get(id)?;
        if self.repo.count_records_for_medication(id)? > 0 {
            return Err(DomainError::validation("Medicamento possui registros e não pode ser deletado"));
        }
        self.repo.delete_medication(id)
    }
}

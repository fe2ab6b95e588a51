use crate::errors::NotifyError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
  pub title: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  pub start: String,
  pub end: String,
  #[serde(default)]
  pub attendees: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CalendarResult {
  pub success: bool,
  pub message: String,
  pub event_data: CalendarEvent,
}

/// Integración de calendario sin proveedor: valida el evento y lo devuelve.
#[derive(Debug, Clone, Default)]
pub struct CalendarClient;

impl CalendarClient {
  pub fn create_event(&self, event: CalendarEvent) -> Result<CalendarResult, NotifyError> {
    if event.title.trim().is_empty() || event.start.trim().is_empty() || event.end.trim().is_empty() {
      return Err(NotifyError::InvalidInput("Título, data de início e fim são obrigatórios".into()));
    }
    Ok(CalendarResult { success: true,
                        message: "Calendar integration not fully implemented yet".into(),
                        event_data: event })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn placeholder_echoes_event_and_requires_fields() {
    let ev = CalendarEvent { title: "Plantão".into(),
                             description: None,
                             start: "2025-01-01T07:00:00Z".into(),
                             end: "2025-01-01T19:00:00Z".into(),
                             attendees: vec![] };
    let res = CalendarClient.create_event(ev.clone()).unwrap();
    assert!(res.success);
    assert_eq!(res.event_data, ev);

    let bad = CalendarEvent { title: " ".into(), ..ev };
    assert!(matches!(CalendarClient.create_event(bad), Err(NotifyError::InvalidInput(_))));
  }
}

// recurring.rs
//
// Generador de plantões recurrentes (12x36, dias úteis, dias personalizados).
// Las horas se interpretan en el desfase horario configurado y los instantes
// resultantes se devuelven en UTC.
use crate::DomainError;
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Límite de días de un único pedido de geração.
pub const MAX_SPAN_DAYS: i64 = 366;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecurrencePattern {
  /// Trabaja un día sí, un día no, a partir de la fecha inicial.
  #[serde(rename = "12x36")]
  TwelveByThirtySix,
  /// Lunes a viernes.
  Weekdays,
  /// Días de la semana explícitos, 0 = domingo … 6 = sábado.
  Custom,
}

#[derive(Debug, Clone)]
pub struct RecurrenceRequest {
  pub pattern: RecurrencePattern,
  pub start_date: NaiveDate,
  pub end_date: NaiveDate,
  pub shift_start: NaiveTime,
  pub shift_end: NaiveTime,
  pub custom_days: Vec<u32>,
}

pub fn parse_date(s: &str) -> Result<NaiveDate, DomainError> {
  NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| DomainError::validation(format!("Data inválida: {}", s)))
}

pub fn parse_time(s: &str) -> Result<NaiveTime, DomainError> {
  NaiveTime::parse_from_str(s.trim(), "%H:%M").map_err(|_| DomainError::validation(format!("Horário inválido: {}", s)))
}

fn day_selected(req: &RecurrenceRequest, date: NaiveDate) -> bool {
  match req.pattern {
    RecurrencePattern::TwelveByThirtySix => (date - req.start_date).num_days() % 2 == 0,
    RecurrencePattern::Weekdays => date.weekday().number_from_monday() <= 5,
    RecurrencePattern::Custom => req.custom_days.contains(&date.weekday().num_days_from_sunday()),
  }
}

fn local_instant(offset: &FixedOffset, date: NaiveDate, time: NaiveTime) -> Result<DateTime<Utc>, DomainError> {
  offset.from_local_datetime(&date.and_time(time))
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| DomainError::validation("Horário local ambíguo"))
}

/// Devuelve los intervalos `(start, end)` generados, en orden cronológico.
pub fn generate(req: &RecurrenceRequest, offset: &FixedOffset) -> Result<Vec<(DateTime<Utc>, DateTime<Utc>)>, DomainError> {
  if req.end_date < req.start_date {
    return Err(DomainError::validation("A data final deve ser igual ou posterior à data inicial"));
  }
  if (req.end_date - req.start_date).num_days() >= MAX_SPAN_DAYS {
    return Err(DomainError::validation(format!("O período não pode exceder {} dias", MAX_SPAN_DAYS)));
  }
  if req.pattern == RecurrencePattern::Custom {
    if req.custom_days.is_empty() {
      return Err(DomainError::validation("Selecione ao menos um dia da semana"));
    }
    if req.custom_days.iter().any(|d| *d > 6) {
      return Err(DomainError::validation("Dias da semana devem estar entre 0 (domingo) e 6 (sábado)"));
    }
  }

  let mut out = Vec::new();
  let mut date = req.start_date;
  while date <= req.end_date {
    if day_selected(req, date) {
      let start = local_instant(offset, date, req.shift_start)?;
      let mut end = local_instant(offset, date, req.shift_end)?;
      // plantão noturno: termina al día siguiente
      if end <= start {
        end += Duration::days(1);
      }
      out.push((start, end));
    }
    date += Duration::days(1);
  }

  if out.is_empty() {
    return Err(DomainError::validation("Nenhum plantão seria criado com esses parâmetros"));
  }
  Ok(out)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn brt() -> FixedOffset {
    FixedOffset::west_opt(3 * 3600).unwrap()
  }

  fn req(pattern: RecurrencePattern, from: &str, to: &str, s: &str, e: &str) -> RecurrenceRequest {
    RecurrenceRequest { pattern,
                        start_date: parse_date(from).unwrap(),
                        end_date: parse_date(to).unwrap(),
                        shift_start: parse_time(s).unwrap(),
                        shift_end: parse_time(e).unwrap(),
                        custom_days: vec![] }
  }

  #[test]
  fn twelve_by_thirty_six_alternates_days() {
    let r = req(RecurrencePattern::TwelveByThirtySix, "2025-03-01", "2025-03-07", "07:00", "19:00");
    let out = generate(&r, &brt()).unwrap();
    assert_eq!(out.len(), 4);
    // 07:00 em -03:00 == 10:00 UTC
    assert_eq!(out[0].0.to_rfc3339(), "2025-03-01T10:00:00+00:00");
    assert_eq!(out[1].0.to_rfc3339(), "2025-03-03T10:00:00+00:00");
    assert_eq!(out[0].1 - out[0].0, Duration::hours(12));
  }

  #[test]
  fn weekdays_skip_weekend_and_night_shift_rolls_over() {
    // 2025-03-07 es viernes, 08 sábado, 09 domingo, 10 lunes
    let r = req(RecurrencePattern::Weekdays, "2025-03-07", "2025-03-10", "19:00", "07:00");
    let out = generate(&r, &brt()).unwrap();
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].1.to_rfc3339(), "2025-03-08T10:00:00+00:00");
  }

  #[test]
  fn custom_days_use_sunday_zero() {
    let mut r = req(RecurrencePattern::Custom, "2025-03-02", "2025-03-15", "08:00", "14:00");
    r.custom_days = vec![0, 3];
    let out = generate(&r, &brt()).unwrap();
    // domingos 2 y 9, miércoles 5 y 12
    assert_eq!(out.len(), 4);
  }

  #[test]
  fn empty_result_and_inverted_range_are_errors() {
    let r = req(RecurrencePattern::Weekdays, "2025-03-08", "2025-03-09", "08:00", "14:00");
    assert!(generate(&r, &brt()).is_err());
    let r = req(RecurrencePattern::Weekdays, "2025-03-10", "2025-03-01", "08:00", "14:00");
    assert!(generate(&r, &brt()).is_err());
  }
}

use crate::rows::{convert_all, to_ms, AbsenceRow, ActivityRow, AuditLogRow, MedicationRow, RecordRow, ShiftRow, SwapRow,
                  UserRow};
use crate::schema::{absences, activity_logs, audit_logs, medications, records, shifts, swap_requests, users};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use plantao_domain::{Absence, AbsenceFilter, ActivityFilter, ActivityKind, ActivityLog, AuditFilter, AuditLog,
                     DomainError, DomainRepository, Medication, Record, RecordFilter, RecordGuard, Shift, ShiftFilter,
                     ShiftReassignment, SwapFilter, SwapRequest, SwapStatus, User, SWAP_ALREADY_OPEN, SWAP_CHANGED,
                     SWAP_OVERLAP};
use std::sync::Arc;
use uuid::Uuid;
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("./migrations");
#[cfg(feature = "pg")]
type DbConn = PgConnection;
#[cfg(not(feature = "pg"))]
type DbConn = SqliteConnection;
type DbPool = Pool<ConnectionManager<DbConn>>;

/// PRAGMAs por conexión: SQLite no las persiste entre conexiones del pool.
#[cfg(not(feature = "pg"))]
#[derive(Debug)]
struct SqlitePragmas;
#[cfg(not(feature = "pg"))]
impl diesel::r2d2::CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for SqlitePragmas {
  fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
    use diesel::connection::SimpleConnection;
    conn.batch_execute("PRAGMA busy_timeout = 5000; PRAGMA foreign_keys = ON;")
        .map_err(diesel::r2d2::Error::QueryError)
  }
}

/// Repo Diesel que implementa `DomainRepository`.
///
/// Todas las mutaciones que llevan auditoría o actividad corren dentro de una
/// única transacción.
pub struct DieselDomainRepository {
  pool: Arc<DbPool>,
}
impl DieselDomainRepository {
  /// Abre el pool y aplica las migraciones pendientes.
  pub fn new(database_url: &str) -> Result<Self, DomainError> {
    let manager = ConnectionManager::<DbConn>::new(database_url);
    // una base en memoria sólo existe dentro de su propia conexión
    let max_size = if database_url.contains(":memory:") { 1 } else { 8 };
    let builder = Pool::builder().max_size(max_size);
    #[cfg(not(feature = "pg"))]
    let builder = builder.connection_customizer(Box::new(SqlitePragmas));
    let pool = builder.build(manager)
                      .map_err(|e| DomainError::ExternalError(format!("no se pudo crear el pool de conexiones: {}", e)))?;
    let repo = DieselDomainRepository { pool: Arc::new(pool) };
    let mut conn = repo.conn()?;
    #[cfg(not(feature = "pg"))]
    {
      use diesel::connection::SimpleConnection;
      if let Err(e) = conn.batch_execute("PRAGMA journal_mode = WAL;") {
        log::warn!("journal_mode WAL no disponible: {}", e);
      }
    }
    let applied = conn.run_pending_migrations(MIGRATIONS)
                      .map_err(|e| DomainError::ExternalError(format!("migraciones: {}", e)))?;
    if !applied.is_empty() {
      log::info!("{} migraciones aplicadas", applied.len());
    }
    Ok(repo)
  }
  fn conn_raw(&self) -> std::result::Result<PooledConnection<ConnectionManager<DbConn>>, r2d2::Error> {
    self.pool.get()
  }
  fn conn(&self) -> Result<PooledConnection<ConnectionManager<DbConn>>, DomainError> {
    self.conn_raw().map_err(|e| DomainError::ExternalError(format!("pool: {}", e)))
  }
  fn in_transaction<T, F>(&self, f: F) -> Result<T, DomainError>
    where F: FnOnce(&mut DbConn) -> std::result::Result<T, TxError>
  {
    let mut pooled = self.conn()?;
    let conn: &mut DbConn = &mut pooled;
    conn.transaction(f).map_err(|e| match e {
                         TxError::Db(e) => db_error(e),
                         TxError::Conflict(e) => e,
                       })
  }
}
/// Fallo dentro de una transacción. `Conflict` es una escritura condicionada
/// cuya condición ya no se cumple: deshace la transacción y llega tal cual al
/// servicio.
#[derive(Debug)]
enum TxError {
  Db(DieselError),
  Conflict(DomainError),
}
impl From<DieselError> for TxError {
  fn from(e: DieselError) -> Self {
    TxError::Db(e)
  }
}
fn db_error(e: DieselError) -> DomainError {
  match e {
    DieselError::NotFound => DomainError::not_found("Registro não encontrado"),
    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
      log::debug!("violación de unicidad: {}", info.message());
      DomainError::validation("Registro duplicado")
    }
    DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
      log::debug!("violación de clave foránea: {}", info.message());
      DomainError::validation("Referência inválida")
    }
    other => DomainError::ExternalError(format!("db: {}", other)),
  }
}
fn map_db_err<T>(res: std::result::Result<T, DieselError>) -> Result<T, DomainError> {
  res.map_err(db_error)
}
/// `update` que no tocó ninguna fila equivale a "no encontrado".
fn expect_one(affected: usize) -> std::result::Result<(), DieselError> {
  if affected == 0 {
    Err(DieselError::NotFound)
  } else {
    Ok(())
  }
}
/// `update` condicionado que no tocó ninguna fila: la condición falló.
fn expect_guarded(affected: usize, conflict: impl FnOnce() -> DomainError) -> std::result::Result<(), TxError> {
  if affected == 0 {
    Err(TxError::Conflict(conflict()))
  } else {
    Ok(())
  }
}
fn insert_activity_row(conn: &mut DbConn, row: &ActivityRow) -> std::result::Result<(), TxError> {
  diesel::insert_into(activity_logs::table).values(row).execute(conn)?;
  Ok(())
}
impl DomainRepository for DieselDomainRepository {
  fn insert_user(&self, user: &User, activity: Option<&ActivityLog>) -> Result<(), DomainError> {
    let row = UserRow::from(user);
    let act = activity.map(ActivityRow::try_from).transpose()?;
    self.in_transaction(|conn| {
      diesel::insert_into(users::table).values(&row).execute(conn)?;
      if let Some(a) = &act {
        insert_activity_row(conn, a)?;
      }
      Ok(())
    })
  }
  fn update_user(&self, user: &User, activity: Option<&ActivityLog>) -> Result<(), DomainError> {
    let row = UserRow::from(user);
    let act = activity.map(ActivityRow::try_from).transpose()?;
    self.in_transaction(|conn| {
      expect_one(diesel::update(users::table.find(&row.id)).set(&row).execute(conn)?)?;
      if let Some(a) = &act {
        insert_activity_row(conn, a)?;
      }
      Ok(())
    })
  }
  fn get_user(&self, id: &Uuid) -> Result<Option<User>, DomainError> {
    let mut conn = self.conn()?;
    let row = map_db_err(users::table.find(id.to_string())
                                     .select(UserRow::as_select())
                                     .first::<UserRow>(&mut conn)
                                     .optional())?;
    row.map(User::try_from).transpose()
  }
  fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DomainError> {
    let mut conn = self.conn()?;
    let row = map_db_err(users::table.filter(users::email.eq(email))
                                     .select(UserRow::as_select())
                                     .first::<UserRow>(&mut conn)
                                     .optional())?;
    row.map(User::try_from).transpose()
  }
  fn list_users(&self) -> Result<Vec<User>, DomainError> {
    let mut conn = self.conn()?;
    let rows = map_db_err(users::table.select(UserRow::as_select())
                                      .order(users::name.asc())
                                      .load::<UserRow>(&mut conn))?;
    convert_all(rows)
  }

  fn insert_medication(&self, med: &Medication) -> Result<(), DomainError> {
    let mut conn = self.conn()?;
    map_db_err(diesel::insert_into(medications::table).values(&MedicationRow::from(med)).execute(&mut conn))?;
    Ok(())
  }
  fn update_medication(&self, med: &Medication) -> Result<(), DomainError> {
    let row = MedicationRow::from(med);
    let mut conn = self.conn()?;
    let n = map_db_err(diesel::update(medications::table.find(&row.id)).set(&row).execute(&mut conn))?;
    map_db_err(expect_one(n))
  }
  fn get_medication(&self, id: &Uuid) -> Result<Option<Medication>, DomainError> {
    let mut conn = self.conn()?;
    let row = map_db_err(medications::table.find(id.to_string())
                                           .select(MedicationRow::as_select())
                                           .first::<MedicationRow>(&mut conn)
                                           .optional())?;
    row.map(Medication::try_from).transpose()
  }
  fn find_medication_by_code(&self, code: &str) -> Result<Option<Medication>, DomainError> {
    let mut conn = self.conn()?;
    let row = map_db_err(medications::table.filter(medications::code.eq(code))
                                           .select(MedicationRow::as_select())
                                           .first::<MedicationRow>(&mut conn)
                                           .optional())?;
    row.map(Medication::try_from).transpose()
  }
  fn list_medications(&self) -> Result<Vec<Medication>, DomainError> {
    let mut conn = self.conn()?;
    let rows = map_db_err(medications::table.select(MedicationRow::as_select())
                                            .order(medications::name.asc())
                                            .load::<MedicationRow>(&mut conn))?;
    convert_all(rows)
  }
  fn delete_medication(&self, id: &Uuid) -> Result<(), DomainError> {
    let mut conn = self.conn()?;
    map_db_err(diesel::delete(medications::table.find(id.to_string())).execute(&mut conn))?;
    Ok(())
  }
  fn count_records_for_medication(&self, med_id: &Uuid) -> Result<i64, DomainError> {
    let mut conn = self.conn()?;
    map_db_err(records::table.filter(records::med_id.eq(med_id.to_string()))
                             .count()
                             .get_result::<i64>(&mut conn))
  }

  fn insert_shifts(&self, shifts: &[Shift], activity: &ActivityLog) -> Result<(), DomainError> {
    let rows: Vec<ShiftRow> = shifts.iter().map(ShiftRow::from).collect();
    let act = ActivityRow::try_from(activity)?;
    self.in_transaction(|conn| {
      diesel::insert_into(shifts::table).values(&rows).execute(conn)?;
      insert_activity_row(conn, &act)
    })?;
    log::debug!("{} plantões insertados", rows.len());
    Ok(())
  }
  fn update_shift(&self, shift: &Shift, activity: Option<&ActivityLog>) -> Result<(), DomainError> {
    let row = ShiftRow::from(shift);
    let act = activity.map(ActivityRow::try_from).transpose()?;
    self.in_transaction(|conn| {
      expect_one(diesel::update(shifts::table.find(&row.id)).set(&row).execute(conn)?)?;
      if let Some(a) = &act {
        insert_activity_row(conn, a)?;
      }
      Ok(())
    })
  }
  fn get_shift(&self, id: &Uuid) -> Result<Option<Shift>, DomainError> {
    let mut conn = self.conn()?;
    let row = map_db_err(shifts::table.find(id.to_string())
                                      .select(ShiftRow::as_select())
                                      .first::<ShiftRow>(&mut conn)
                                      .optional())?;
    row.map(Shift::try_from).transpose()
  }
  fn delete_shift(&self, id: &Uuid, activity: &ActivityLog) -> Result<(), DomainError> {
    let id_s = id.to_string();
    let act = ActivityRow::try_from(activity)?;
    self.in_transaction(|conn| {
      diesel::delete(shifts::table.find(&id_s)).execute(conn)?;
      insert_activity_row(conn, &act)
    })
  }
  fn list_shifts(&self, filter: &ShiftFilter) -> Result<Vec<Shift>, DomainError> {
    let mut conn = self.conn()?;
    let mut q = shifts::table.select(ShiftRow::as_select()).into_boxed();
    if let Some(e) = filter.employee_id {
      q = q.filter(shifts::employee_id.eq(e.to_string()));
    }
    if let Some((from, to)) = filter.overlapping {
      q = q.filter(shifts::start_ms.lt(to_ms(to))).filter(shifts::end_ms.gt(to_ms(from)));
    }
    if let Some(from) = filter.start_from {
      q = q.filter(shifts::start_ms.ge(to_ms(from)));
    }
    if let Some(to) = filter.start_to {
      q = q.filter(shifts::start_ms.le(to_ms(to)));
    }
    let rows = map_db_err(q.order(shifts::start_ms.asc()).load::<ShiftRow>(&mut conn))?;
    convert_all(rows)
  }

  fn insert_record(&self, record: &Record, audit: &AuditLog, activity: &ActivityLog) -> Result<(), DomainError> {
    let row = RecordRow::from(record);
    let audit_row = AuditLogRow::from(audit);
    let act = ActivityRow::try_from(activity)?;
    self.in_transaction(|conn| {
      diesel::insert_into(records::table).values(&row).execute(conn)?;
      diesel::insert_into(audit_logs::table).values(&audit_row).execute(conn)?;
      insert_activity_row(conn, &act)
    })
  }
  fn update_record(&self,
                   record: &Record,
                   guard: RecordGuard,
                   audits: &[AuditLog],
                   activity: &ActivityLog)
                   -> Result<(), DomainError> {
    let row = RecordRow::from(record);
    let audit_rows: Vec<AuditLogRow> = audits.iter().map(AuditLogRow::from).collect();
    let act = ActivityRow::try_from(activity)?;
    self.in_transaction(|conn| {
      let target = records::table.filter(records::id.eq(&row.id));
      let n = match guard {
        RecordGuard::Unreceived => {
          diesel::update(target.filter(records::received_by_id.is_null())).set(&row).execute(conn)?
        }
        RecordGuard::UpdatedAt(at) => {
          diesel::update(target.filter(records::updated_at_ms.eq(to_ms(at)))).set(&row).execute(conn)?
        }
      };
      expect_guarded(n, || guard.conflict())?;
      for a in &audit_rows {
        diesel::insert_into(audit_logs::table).values(a).execute(conn)?;
      }
      insert_activity_row(conn, &act)
    })
  }
  fn delete_record(&self, id: &Uuid, audit: &AuditLog, activity: &ActivityLog) -> Result<(), DomainError> {
    let id_s = id.to_string();
    let audit_row = AuditLogRow::from(audit);
    let act = ActivityRow::try_from(activity)?;
    // audit_logs no referencia records: el histórico sobrevive al borrado
    self.in_transaction(|conn| {
      diesel::delete(records::table.find(&id_s)).execute(conn)?;
      diesel::insert_into(audit_logs::table).values(&audit_row).execute(conn)?;
      insert_activity_row(conn, &act)
    })
  }
  fn get_record(&self, id: &Uuid) -> Result<Option<Record>, DomainError> {
    let mut conn = self.conn()?;
    let row = map_db_err(records::table.find(id.to_string())
                                       .select(RecordRow::as_select())
                                       .first::<RecordRow>(&mut conn)
                                       .optional())?;
    row.map(Record::try_from).transpose()
  }
  fn list_records(&self, filter: &RecordFilter) -> Result<Vec<Record>, DomainError> {
    let mut conn = self.conn()?;
    let mut q = records::table.select(RecordRow::as_select()).into_boxed();
    if let Some(m) = filter.med_id {
      q = q.filter(records::med_id.eq(m.to_string()));
    }
    if let Some(s) = filter.status {
      q = q.filter(records::status.eq(s.as_str()));
    }
    if let Some(u) = filter.user_id {
      let u = u.to_string();
      q = q.filter(records::delivered_by_id.eq(u.clone()).or(records::received_by_id.eq(u)));
    }
    if let Some(from) = filter.from {
      q = q.filter(records::created_at_ms.ge(to_ms(from)));
    }
    if let Some(to) = filter.to {
      q = q.filter(records::created_at_ms.le(to_ms(to)));
    }
    let rows = map_db_err(q.order(records::created_at_ms.desc()).load::<RecordRow>(&mut conn))?;
    convert_all(rows)
  }
  fn list_audit_logs(&self, filter: &AuditFilter) -> Result<Vec<AuditLog>, DomainError> {
    let mut conn = self.conn()?;
    let mut q = audit_logs::table.select(AuditLogRow::as_select()).into_boxed();
    if let Some(r) = filter.record_id {
      q = q.filter(audit_logs::record_id.eq(r.to_string()));
    }
    if let Some(from) = filter.from {
      q = q.filter(audit_logs::created_at_ms.ge(to_ms(from)));
    }
    if let Some(to) = filter.to {
      q = q.filter(audit_logs::created_at_ms.le(to_ms(to)));
    }
    if let Some(limit) = filter.limit {
      q = q.limit(limit.max(0));
    }
    let rows = map_db_err(q.order(audit_logs::created_at_ms.desc()).load::<AuditLogRow>(&mut conn))?;
    convert_all(rows)
  }

  fn insert_swap(&self, swap: &SwapRequest, activity: &ActivityLog) -> Result<(), DomainError> {
    let row = SwapRow::from(swap);
    let act = ActivityRow::try_from(activity)?;
    self.in_transaction(|conn| {
      // índice único parcial: una sola troca abierta por plantão
      match diesel::insert_into(swap_requests::table).values(&row).execute(conn) {
        Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
          return Err(TxError::Conflict(DomainError::validation(SWAP_ALREADY_OPEN)));
        }
        other => other?,
      };
      insert_activity_row(conn, &act)
    })
  }
  fn update_swap(&self, swap: &SwapRequest, expected: &[SwapStatus], activity: &ActivityLog) -> Result<(), DomainError> {
    let row = SwapRow::from(swap);
    let expected: Vec<&'static str> = expected.iter().map(|s| s.as_str()).collect();
    let act = ActivityRow::try_from(activity)?;
    self.in_transaction(|conn| {
      let n = diesel::update(swap_requests::table.filter(swap_requests::id.eq(&row.id))
                                                 .filter(swap_requests::status.eq_any(expected)))
        .set(&row)
        .execute(conn)?;
      expect_guarded(n, || DomainError::validation(SWAP_CHANGED))?;
      insert_activity_row(conn, &act)
    })
  }
  fn approve_swap(&self,
                  swap: &SwapRequest,
                  reassignments: &[ShiftReassignment],
                  activity: &ActivityLog)
                  -> Result<(), DomainError> {
    let row = SwapRow::from(swap);
    let act = ActivityRow::try_from(activity)?;
    let stamp = to_ms(activity.created_at);
    let moved: Vec<String> = reassignments.iter().map(|r| r.shift_id.to_string()).collect();
    self.in_transaction(|conn| {
      let n = diesel::update(swap_requests::table.filter(swap_requests::id.eq(&row.id))
                                                 .filter(swap_requests::status.eq(SwapStatus::Aceito.as_str())))
        .set(&row)
        .execute(conn)?;
      expect_guarded(n, || DomainError::validation(SWAP_CHANGED))?;

      for r in reassignments {
        // un plantão ausente deshace toda la aprobación
        let (start, end) = shifts::table.find(r.shift_id.to_string())
                                        .select((shifts::start_ms, shifts::end_ms))
                                        .first::<(i64, i64)>(conn)?;
        let clashes = shifts::table.filter(shifts::employee_id.eq(r.employee_id.to_string()))
                                   .filter(shifts::id.ne_all(moved.iter().map(String::as_str)))
                                   .filter(shifts::start_ms.lt(end))
                                   .filter(shifts::end_ms.gt(start))
                                   .count()
                                   .get_result::<i64>(conn)?;
        if clashes > 0 {
          return Err(TxError::Conflict(DomainError::validation(SWAP_OVERLAP)));
        }
      }
      for r in reassignments {
        let n = diesel::update(shifts::table.find(r.shift_id.to_string()))
          .set((shifts::employee_id.eq(Some(r.employee_id.to_string())), shifts::updated_at_ms.eq(stamp)))
          .execute(conn)?;
        expect_one(n)?;
      }
      insert_activity_row(conn, &act)
    })?;
    log::info!("troca {} aprobada ({} plantões reasignados)", swap.id, reassignments.len());
    Ok(())
  }
  fn get_swap(&self, id: &Uuid) -> Result<Option<SwapRequest>, DomainError> {
    let mut conn = self.conn()?;
    let row = map_db_err(swap_requests::table.find(id.to_string())
                                             .select(SwapRow::as_select())
                                             .first::<SwapRow>(&mut conn)
                                             .optional())?;
    row.map(SwapRequest::try_from).transpose()
  }
  fn list_swaps(&self, filter: &SwapFilter) -> Result<Vec<SwapRequest>, DomainError> {
    let mut conn = self.conn()?;
    let mut q = swap_requests::table.select(SwapRow::as_select()).into_boxed();
    if let Some(s) = filter.status {
      q = q.filter(swap_requests::status.eq(s.as_str()));
    }
    if let Some(u) = filter.user_id {
      let u = u.to_string();
      q = q.filter(swap_requests::requester_id.eq(u.clone()).or(swap_requests::target_id.eq(u)));
    }
    if let Some(id) = filter.shift_id {
      q = q.filter(swap_requests::shift_id.eq(id.to_string()));
    }
    let rows = map_db_err(q.order(swap_requests::created_at_ms.desc()).load::<SwapRow>(&mut conn))?;
    convert_all(rows)
  }
  fn count_swaps(&self, status: SwapStatus) -> Result<i64, DomainError> {
    let mut conn = self.conn()?;
    map_db_err(swap_requests::table.filter(swap_requests::status.eq(status.as_str()))
                                   .count()
                                   .get_result::<i64>(&mut conn))
  }

  fn insert_absence(&self, absence: &Absence, activity: &ActivityLog) -> Result<(), DomainError> {
    let row = AbsenceRow::from(absence);
    let act = ActivityRow::try_from(activity)?;
    self.in_transaction(|conn| {
      diesel::insert_into(absences::table).values(&row).execute(conn)?;
      insert_activity_row(conn, &act)
    })
  }
  fn delete_absence(&self, id: &Uuid, activity: &ActivityLog) -> Result<(), DomainError> {
    let id_s = id.to_string();
    let act = ActivityRow::try_from(activity)?;
    self.in_transaction(|conn| {
      diesel::delete(absences::table.find(&id_s)).execute(conn)?;
      insert_activity_row(conn, &act)
    })
  }
  fn get_absence(&self, id: &Uuid) -> Result<Option<Absence>, DomainError> {
    let mut conn = self.conn()?;
    let row = map_db_err(absences::table.find(id.to_string())
                                        .select(AbsenceRow::as_select())
                                        .first::<AbsenceRow>(&mut conn)
                                        .optional())?;
    row.map(Absence::try_from).transpose()
  }
  fn list_absences(&self, filter: &AbsenceFilter) -> Result<Vec<Absence>, DomainError> {
    let mut conn = self.conn()?;
    let mut q = absences::table.select(AbsenceRow::as_select()).into_boxed();
    if let Some(u) = filter.user_id {
      q = q.filter(absences::user_id.eq(u.to_string()));
    }
    if let Some(from) = filter.from {
      q = q.filter(absences::date_ms.ge(to_ms(from)));
    }
    if let Some(to) = filter.to {
      q = q.filter(absences::date_ms.le(to_ms(to)));
    }
    let rows = map_db_err(q.order(absences::date_ms.asc()).load::<AbsenceRow>(&mut conn))?;
    convert_all(rows)
  }

  fn insert_activity(&self, activity: &ActivityLog) -> Result<(), DomainError> {
    let act = ActivityRow::try_from(activity)?;
    let mut conn = self.conn()?;
    map_db_err(diesel::insert_into(activity_logs::table).values(&act).execute(&mut conn))?;
    Ok(())
  }
  fn list_activities(&self, filter: &ActivityFilter) -> Result<Vec<ActivityLog>, DomainError> {
    let mut conn = self.conn()?;
    let mut q = activity_logs::table.select(ActivityRow::as_select()).into_boxed();
    if let Some(k) = filter.kind {
      q = q.filter(activity_logs::kind.eq(k.as_str()));
    }
    if let Some(u) = filter.user_id {
      q = q.filter(activity_logs::user_id.eq(u.to_string()));
    }
    if let Some(from) = filter.from {
      q = q.filter(activity_logs::created_at_ms.ge(to_ms(from)));
    }
    if let Some(to) = filter.to {
      q = q.filter(activity_logs::created_at_ms.le(to_ms(to)));
    }
    let rows = map_db_err(q.order(activity_logs::created_at_ms.desc())
                           .limit(filter.effective_limit())
                           .load::<ActivityRow>(&mut conn))?;
    convert_all(rows)
  }
  fn count_activities(&self,
                      kind: Option<ActivityKind>,
                      from: DateTime<Utc>,
                      to: DateTime<Utc>)
                      -> Result<i64, DomainError> {
    let mut conn = self.conn()?;
    let window = activity_logs::table.filter(activity_logs::created_at_ms.ge(to_ms(from)))
                                     .filter(activity_logs::created_at_ms.lt(to_ms(to)));
    map_db_err(match kind {
                 Some(k) => window.filter(activity_logs::kind.eq(k.as_str())).count().get_result::<i64>(&mut conn),
                 None => window.count().get_result::<i64>(&mut conn),
               })
  }
  fn count_absences(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<i64, DomainError> {
    let mut conn = self.conn()?;
    map_db_err(absences::table.filter(absences::date_ms.ge(to_ms(from)))
                              .filter(absences::date_ms.lt(to_ms(to)))
                              .count()
                              .get_result::<i64>(&mut conn))
  }
}
/// Crea el repo a partir de `PLANTAO_DB_URL` (o `DATABASE_URL`).
#[cfg(feature = "pg")]
pub fn new_from_env() -> Result<DieselDomainRepository, DomainError> {
  dotenvy::dotenv().ok();
  let url = database_url_from_env()?;
  let l = url.to_lowercase();
  if !(l.starts_with("postgres://") || l.starts_with("postgresql://") || url.contains('@')) {
    return Err(DomainError::ExternalError("PLANTAO_DB_URL no parece una URL de Postgres".into()));
  }
  DieselDomainRepository::new(&url)
}
/// Crea el repo a partir de `PLANTAO_DB_URL` (o `DATABASE_URL`); sin ninguna
/// de las dos usa `plantao.db` en el directorio actual.
#[cfg(not(feature = "pg"))]
pub fn new_from_env() -> Result<DieselDomainRepository, DomainError> {
  dotenvy::dotenv().ok();
  let url = database_url_from_env().unwrap_or_else(|_| "plantao.db".into());
  let l = url.to_lowercase();
  if l.starts_with("postgres://") || l.starts_with("postgresql://") {
    return Err(DomainError::ExternalError("plantao-persistence se compiló sin la feature 'pg'; habilítela para usar \
                                           Postgres"
                                                    .into()));
  }
  DieselDomainRepository::new(&url)
}
fn database_url_from_env() -> Result<String, DomainError> {
  std::env::var("PLANTAO_DB_URL").or_else(|_| std::env::var("DATABASE_URL"))
                                 .map_err(|_| DomainError::ExternalError("PLANTAO_DB_URL / DATABASE_URL no definida".into()))
}
// Helper de tests: SQLite explícito sobre un fichero temporal, sin pasar por
// el entorno.
#[cfg(not(feature = "pg"))]
pub fn new_sqlite_for_test(database_url: &str) -> Result<DieselDomainRepository, DomainError> {
  DieselDomainRepository::new(database_url)
}

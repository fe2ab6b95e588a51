use chrono::{DateTime, Duration, Utc};
use plantao_domain::services::{NewRecord, NewSwap, Policy, ReceiveRecord, RecordService, SwapResponse, SwapService};
use plantao_domain::{ActivityFilter, ActivityKind, ActivityLog, AuditAction, AuditFilter, AuditLog, DomainError,
                     DomainRepository, Medication, RecordFilter, RecordGuard, RecordStatus, Role, Shift, ShiftFilter,
                     SwapStatus, User, SWAP_ALREADY_OPEN, SWAP_CHANGED, SWAP_OVERLAP};
use plantao_persistence::DieselDomainRepository;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

/// Base SQLite en un fichero temporal; se borra al salir del test.
struct TempDb {
  path: PathBuf,
  repo: Arc<DieselDomainRepository>,
}
impl TempDb {
  fn open() -> Option<Self> {
    if cfg!(feature = "pg") {
      eprintln!("skipping sqlite-only persistence test because 'pg' feature is enabled");
      return None;
    }
    let path = std::env::temp_dir().join(format!("plantao_test_{}.db", Uuid::new_v4()));
    let repo = DieselDomainRepository::new(path.to_str().unwrap()).expect("failed to create repo");
    Some(Self { path, repo: Arc::new(repo) })
  }
}
impl Drop for TempDb {
  fn drop(&mut self) {
    let _ = std::fs::remove_file(&self.path);
    let _ = std::fs::remove_file(self.path.with_extension("db-wal"));
    let _ = std::fs::remove_file(self.path.with_extension("db-shm"));
  }
}

// La base guarda milisegundos: los tests trabajan con instantes ya truncados.
fn now_ms() -> DateTime<Utc> {
  DateTime::from_timestamp_millis(Utc::now().timestamp_millis()).unwrap()
}

fn policy() -> Policy {
  Policy::new(120, -180, 4).unwrap()
}

fn seed_user(repo: &DieselDomainRepository, email: &str, role: Role, now: DateTime<Utc>) -> User {
  let hash = bcrypt::hash("senha123", 4).unwrap();
  let mut u = User::new(email, email.split('@').next().unwrap(), hash, role, now).unwrap();
  u.first_login = false;
  repo.insert_user(&u, None).unwrap();
  u
}

fn seed_shift(repo: &DieselDomainRepository, owner: &User, start: DateTime<Utc>, hours: i64, now: DateTime<Utc>) -> Shift {
  let shift = Shift::new(start, start + Duration::hours(hours), Some(owner.id), "chefe@farmacia.com", now).unwrap();
  let act = ActivityLog::new(ActivityKind::ShiftCreated,
                             &owner.actor(),
                             "shift",
                             shift.id,
                             "plantão criado",
                             serde_json::json!({}),
                             now);
  repo.insert_shifts(std::slice::from_ref(&shift), &act).unwrap();
  shift
}

#[test]
fn users_and_medications_roundtrip_with_unique_constraints() {
  let Some(db) = TempDb::open() else { return };
  let now = now_ms();
  let ana = seed_user(&db.repo, "ana@farmacia.com", Role::Farmaceutico, now);
  let _bruno = seed_user(&db.repo, "bruno@farmacia.com", Role::Atendente, now);

  let got = db.repo.find_user_by_email("ana@farmacia.com").unwrap().unwrap();
  assert_eq!(got, ana);
  let names: Vec<String> = db.repo.list_users().unwrap().into_iter().map(|u| u.name).collect();
  assert_eq!(names, vec!["ana".to_string(), "bruno".to_string()]);

  // email duplicado: la restricción única se traduce en error de validación
  let dup = User::new("ana@farmacia.com", "Outra Ana", ana.password_hash.clone(), Role::Atendente, now).unwrap();
  assert!(matches!(db.repo.insert_user(&dup, None), Err(DomainError::ValidationError(_))));

  let med = Medication::new("miso200", "MISOPROSTOL 200 MCG", "comprimido", None, now).unwrap();
  db.repo.insert_medication(&med).unwrap();
  assert_eq!(db.repo.find_medication_by_code("MISO200").unwrap().unwrap().id, med.id);

  // actualizar algo inexistente es NotFound
  let ghost = Medication::new("X1", "Fantasma", "ml", None, now).unwrap();
  assert!(matches!(db.repo.update_medication(&ghost), Err(DomainError::NotFound(_))));
}

#[test]
fn record_lifecycle_keeps_audit_trail_after_delete() {
  let Some(db) = TempDb::open() else { return };
  let now = now_ms();
  let chefe = seed_user(&db.repo, "chefe@farmacia.com", Role::Chefe, now);
  let ana = seed_user(&db.repo, "ana@farmacia.com", Role::Farmaceutico, now);
  let bruno = seed_user(&db.repo, "bruno@farmacia.com", Role::Farmaceutico, now);
  seed_shift(&db.repo, &ana, now - Duration::hours(1), 12, now);
  seed_shift(&db.repo, &bruno, now + Duration::hours(11), 12, now);
  let med = Medication::new("MISO200", "MISOPROSTOL 200 MCG", "comprimido", None, now).unwrap();
  db.repo.insert_medication(&med).unwrap();

  let records = RecordService::new(db.repo.clone(), policy());
  let created = records.create(&ana.actor(),
                               NewRecord { med_id: med.id,
                                           shift_start: None,
                                           shift_end: None,
                                           qty_delivered: 30,
                                           photo_url: None,
                                           notes: Some("gaveta 2".into()) },
                               now)
                       .unwrap();
  assert_eq!(created.record.status, RecordStatus::Pendente);

  let later = now + Duration::hours(10);
  let received = records.receive(&bruno.actor(),
                                 &created.record.id,
                                 ReceiveRecord { qty_received: 28, notes: None },
                                 later)
                        .unwrap();
  assert_eq!(received.record.status, RecordStatus::Discrepancia);
  assert_eq!(received.record.received_by_id, Some(bruno.id));

  let listed = db.repo.list_records(&RecordFilter { user_id: Some(bruno.id), ..Default::default() }).unwrap();
  assert_eq!(listed.len(), 1);

  records.delete(&chefe.actor(), &created.record.id, later + Duration::minutes(1)).unwrap();
  assert!(db.repo.get_record(&created.record.id).unwrap().is_none());

  let trail = db.repo
                .list_audit_logs(&AuditFilter { record_id: Some(created.record.id), ..Default::default() })
                .unwrap();
  let actions: Vec<AuditAction> = trail.iter().map(|a| a.action).collect();
  assert_eq!(actions.first(), Some(&AuditAction::Delete));
  assert_eq!(actions.last(), Some(&AuditAction::Create));
  assert!(actions.contains(&AuditAction::Receive));

  // la vista de auditoría resuelve el registro como ausente
  let views = records.audit_logs(&chefe.actor(), AuditFilter::default()).unwrap();
  assert!(views.iter().all(|v| v.record.is_none()));
}

#[test]
fn approve_swap_exchanges_shifts_atomically() {
  let Some(db) = TempDb::open() else { return };
  let now = now_ms();
  let chefe = seed_user(&db.repo, "chefe@farmacia.com", Role::Chefe, now);
  let ana = seed_user(&db.repo, "ana@farmacia.com", Role::Farmaceutico, now);
  let bruno = seed_user(&db.repo, "bruno@farmacia.com", Role::Farmaceutico, now);
  let shift_a = seed_shift(&db.repo, &ana, now + Duration::days(2), 12, now);
  let shift_b = seed_shift(&db.repo, &bruno, now + Duration::days(3), 12, now);

  let swaps = SwapService::new(db.repo.clone());
  let req = swaps.create(&ana.actor(),
                         NewSwap { shift_id: shift_a.id,
                                   target_id: Some(bruno.id),
                                   target_shift_id: Some(shift_b.id),
                                   reason: None },
                         now)
                 .unwrap();
  swaps.respond(&bruno.actor(), &req.id, SwapResponse { status: SwapStatus::Aceito }, now).unwrap();
  let approved = swaps.approve(&chefe.actor(), &req.id, now).unwrap();
  assert_eq!(approved.status, SwapStatus::Aprovado);
  assert_eq!(approved.approved_by.as_deref(), Some("chefe@farmacia.com"));

  assert_eq!(db.repo.get_shift(&shift_a.id).unwrap().unwrap().employee_id, Some(bruno.id));
  assert_eq!(db.repo.get_shift(&shift_b.id).unwrap().unwrap().employee_id, Some(ana.id));
  assert_eq!(db.repo.count_swaps(SwapStatus::Aprovado).unwrap(), 1);

  // una troca ya aprobada no se vuelve a aplicar
  let mut again = approved.clone();
  again.target_shift_id = Some(Uuid::new_v4());
  let reassign = plantao_domain::reassignments_for(&again).unwrap();
  let act = ActivityLog::new(ActivityKind::SwapApproved,
                             &chefe.actor(),
                             "swap",
                             again.id,
                             "aprovada",
                             serde_json::json!({}),
                             now);
  assert_eq!(db.repo.approve_swap(&again, &reassign, &act), Err(DomainError::validation(SWAP_CHANGED)));
  assert_eq!(db.repo.get_shift(&shift_a.id).unwrap().unwrap().employee_id, Some(bruno.id));
}

#[test]
fn shift_filters_and_activity_counts() {
  let Some(db) = TempDb::open() else { return };
  let now = now_ms();
  let ana = seed_user(&db.repo, "ana@farmacia.com", Role::Farmaceutico, now);
  let bruno = seed_user(&db.repo, "bruno@farmacia.com", Role::Farmaceutico, now);
  let early = seed_shift(&db.repo, &ana, now, 12, now);
  let late = seed_shift(&db.repo, &ana, now + Duration::hours(24), 12, now);
  seed_shift(&db.repo, &bruno, now + Duration::hours(12), 12, now);

  let mine = db.repo.list_shifts(&ShiftFilter { employee_id: Some(ana.id), ..Default::default() }).unwrap();
  assert_eq!(mine.iter().map(|s| s.id).collect::<Vec<_>>(), vec![early.id, late.id]);

  // intervalo semiabierto: el plantão que termina justo en `from` no cuenta
  let window = (now + Duration::hours(12), now + Duration::hours(13));
  let overlapping = db.repo.list_shifts(&ShiftFilter { overlapping: Some(window), ..Default::default() }).unwrap();
  assert_eq!(overlapping.len(), 1);
  assert_eq!(overlapping[0].employee_id, Some(bruno.id));

  // ni el que empieza justo en `to`
  let day = (now - Duration::hours(24), now + Duration::hours(24));
  let listed = db.repo
                 .list_shifts(&ShiftFilter { employee_id: Some(ana.id), overlapping: Some(day), ..Default::default() })
                 .unwrap();
  assert_eq!(listed.iter().map(|s| s.id).collect::<Vec<_>>(), vec![early.id]);

  let total = db.repo.count_activities(None, now - Duration::hours(1), now + Duration::hours(1)).unwrap();
  assert_eq!(total, 3);
  let created = db.repo
                  .count_activities(Some(ActivityKind::ShiftCreated), now, now + Duration::milliseconds(1))
                  .unwrap();
  assert_eq!(created, 3);
  assert_eq!(db.repo.count_activities(None, now + Duration::milliseconds(1), now + Duration::hours(1)).unwrap(), 0);

  let feed = db.repo.list_activities(&ActivityFilter { user_id: Some(bruno.id), limit: Some(10), ..Default::default() })
               .unwrap();
  assert_eq!(feed.len(), 1);
  assert_eq!(feed[0].metadata, serde_json::json!({}));
}

fn activity(actor: &User, kind: ActivityKind, id: Uuid, now: DateTime<Utc>) -> ActivityLog {
  ActivityLog::new(kind, &actor.actor(), "test", id, "teste", serde_json::json!({}), now)
}

#[test]
fn second_receipt_from_a_stale_read_is_rejected() {
  let Some(db) = TempDb::open() else { return };
  let now = now_ms();
  let ana = seed_user(&db.repo, "ana@farmacia.com", Role::Farmaceutico, now);
  let bruno = seed_user(&db.repo, "bruno@farmacia.com", Role::Farmaceutico, now);
  seed_shift(&db.repo, &ana, now - Duration::hours(1), 12, now);
  seed_shift(&db.repo, &bruno, now + Duration::hours(11), 12, now);
  let med = Medication::new("MISO200", "MISOPROSTOL 200 MCG", "comprimido", None, now).unwrap();
  db.repo.insert_medication(&med).unwrap();

  let records = RecordService::new(db.repo.clone(), policy());
  let created = records.create(&ana.actor(),
                               NewRecord { med_id: med.id,
                                           shift_start: None,
                                           shift_end: None,
                                           qty_delivered: 30,
                                           photo_url: None,
                                           notes: None },
                               now)
                       .unwrap();
  // dos lecturas antes de cualquier recebimento
  let mut stale = db.repo.get_record(&created.record.id).unwrap().unwrap();
  let later = now + Duration::hours(10);
  records.receive(&bruno.actor(), &created.record.id, ReceiveRecord { qty_received: 30, notes: None }, later)
         .unwrap();

  stale.receive(ana.id, 10, None, later).unwrap();
  let audit = AuditLog::new(stale.id, AuditAction::Receive, Some("qtyReceived"), None, Some("10".into()), &ana.email, later);
  let res = db.repo.update_record(&stale,
                                  RecordGuard::Unreceived,
                                  std::slice::from_ref(&audit),
                                  &activity(&ana, ActivityKind::RecordReceived, stale.id, later));
  assert_eq!(res, Err(RecordGuard::Unreceived.conflict()));

  let stored = db.repo.get_record(&created.record.id).unwrap().unwrap();
  assert_eq!(stored.qty_received, Some(30));
  assert_eq!(stored.received_by_id, Some(bruno.id));
  let receipts = db.repo
                   .list_audit_logs(&AuditFilter { record_id: Some(stored.id), ..Default::default() })
                   .unwrap()
                   .into_iter()
                   .filter(|a| a.action == AuditAction::Receive)
                   .count();
  assert_eq!(receipts, 1);

  // una edición basada en una versión anterior tampoco se aplica
  let mut old = created.record.clone();
  old.qty_delivered = 31;
  let res = db.repo.update_record(&old,
                                  RecordGuard::UpdatedAt(created.record.updated_at),
                                  &[],
                                  &activity(&ana, ActivityKind::RecordUpdated, old.id, later));
  assert!(matches!(res, Err(DomainError::ValidationError(_))));
  assert_eq!(db.repo.get_record(&old.id).unwrap().unwrap().qty_delivered, 30);
}

#[test]
fn swap_status_changes_are_conditional() {
  let Some(db) = TempDb::open() else { return };
  let now = now_ms();
  let chefe = seed_user(&db.repo, "chefe@farmacia.com", Role::Chefe, now);
  let ana = seed_user(&db.repo, "ana@farmacia.com", Role::Farmaceutico, now);
  let bruno = seed_user(&db.repo, "bruno@farmacia.com", Role::Farmaceutico, now);
  let shift_a = seed_shift(&db.repo, &ana, now + Duration::days(2), 12, now);

  let swaps = SwapService::new(db.repo.clone());
  let transfer = NewSwap { shift_id: shift_a.id, target_id: Some(bruno.id), target_shift_id: None, reason: None };
  let req = swaps.create(&ana.actor(), transfer.clone(), now).unwrap();
  assert_eq!(swaps.create(&ana.actor(), transfer, now).unwrap_err(), DomainError::validation(SWAP_ALREADY_OPEN));

  let accepted = swaps.respond(&bruno.actor(), &req.id, SwapResponse { status: SwapStatus::Aceito }, now).unwrap();
  swaps.cancel(&ana.actor(), &req.id, now).unwrap();

  // aprobación preparada antes de la cancelación
  let mut approved = accepted.clone();
  approved.status = SwapStatus::Aprovado;
  approved.approved_by = Some(chefe.email.clone());
  let reassign = plantao_domain::reassignments_for(&approved).unwrap();
  let res = db.repo.approve_swap(&approved, &reassign, &activity(&chefe, ActivityKind::SwapApproved, req.id, now));
  assert_eq!(res, Err(DomainError::validation(SWAP_CHANGED)));
  assert_eq!(db.repo.get_swap(&req.id).unwrap().unwrap().status, SwapStatus::Cancelado);
  assert_eq!(db.repo.get_shift(&shift_a.id).unwrap().unwrap().employee_id, Some(ana.id));

  // cancelada, el plantão admite una nueva solicitud
  let again = NewSwap { shift_id: shift_a.id, target_id: None, target_shift_id: None, reason: None };
  assert!(swaps.create(&ana.actor(), again, now).is_ok());
}

#[test]
fn approval_that_would_double_book_rolls_back() {
  let Some(db) = TempDb::open() else { return };
  let now = now_ms();
  let chefe = seed_user(&db.repo, "chefe@farmacia.com", Role::Chefe, now);
  let ana = seed_user(&db.repo, "ana@farmacia.com", Role::Farmaceutico, now);
  let bruno = seed_user(&db.repo, "bruno@farmacia.com", Role::Farmaceutico, now);
  let shift_a = seed_shift(&db.repo, &ana, now - Duration::hours(1), 12, now);
  seed_shift(&db.repo, &bruno, now + Duration::hours(1), 4, now);

  let swaps = SwapService::new(db.repo.clone());
  let req = swaps.create(&ana.actor(),
                         NewSwap { shift_id: shift_a.id, target_id: Some(bruno.id), target_shift_id: None, reason: None },
                         now)
                 .unwrap();
  swaps.respond(&bruno.actor(), &req.id, SwapResponse { status: SwapStatus::Aceito }, now).unwrap();

  assert_eq!(swaps.approve(&chefe.actor(), &req.id, now).unwrap_err(), DomainError::validation(SWAP_OVERLAP));
  assert_eq!(db.repo.get_swap(&req.id).unwrap().unwrap().status, SwapStatus::Aceito);
  assert_eq!(db.repo.get_shift(&shift_a.id).unwrap().unwrap().employee_id, Some(ana.id));
  let bruno_shifts = db.repo.list_shifts(&ShiftFilter { employee_id: Some(bruno.id), ..Default::default() }).unwrap();
  assert_eq!(bruno_shifts.len(), 1);
}

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use plantao_api::{auth::JwtKeys, router, AppState};
use plantao_domain::{services::Policy, DomainRepository, DomainStubs, User, STUB_PASSWORD};
use plantao_notify::{KeyVault, RecordingSender, WhatsAppNotifier};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

struct TestApp {
    app: Router,
    state: plantao_api::SharedState,
    stubs: DomainStubs,
    sender: Arc<RecordingSender>,
}

impl TestApp {
    fn new() -> Self {
        Self::with_proxy(false)
    }

    fn with_proxy(trust_proxy: bool) -> Self {
        let stubs = DomainStubs::sample(Utc::now()).unwrap();
        let sender = Arc::new(RecordingSender::new());
        let notifier = WhatsAppNotifier::new(Some(KeyVault::new("chave-mestra").unwrap()), sender.clone());
        let repo: Arc<dyn DomainRepository> = stubs.repo.clone();
        let state = AppState::new(
            repo,
            Policy::new(120, -180, 4).unwrap(),
            JwtKeys::new("segredo-de-teste", Duration::hours(1)),
            notifier,
            std::env::temp_dir(),
            trust_proxy,
        );
        Self {
            app: router(state.clone()),
            state,
            stubs,
            sender,
        }
    }

    fn token(&self, user: &User) -> String {
        self.state.jwt.issue(user, Utc::now()).unwrap()
    }

    async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        self.call_via(method, uri, token, body, None).await
    }

    async fn call_via(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
        forwarded_for: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(ip) = forwarded_for {
            req = req.header("x-forwarded-for", ip);
        }
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }
}

#[tokio::test]
async fn health_and_unknown_routes() {
    let t = TestApp::new();
    let (status, body) = t.call(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = t.call(Method::GET, "/api/nada", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Rota não encontrada");
}

#[tokio::test]
async fn protected_routes_require_a_valid_token() {
    let t = TestApp::new();
    let (status, body) = t.call(Method::GET, "/api/meds", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Token não fornecido");

    let (status, body) = t.call(Method::GET, "/api/meds", Some("lixo"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Token inválido ou expirado");
}

#[tokio::test]
async fn login_issues_a_token_for_me() {
    let t = TestApp::new();
    let login = json!({ "email": "ANA@farmacia.com", "password": STUB_PASSWORD });
    let (status, body) = t.call(Method::POST, "/api/auth/login", None, Some(login)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["role"], "farmaceutico");
    let token = body["token"].as_str().unwrap().to_string();

    let (status, body) = t.call(Method::GET, "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "ana@farmacia.com");
    assert!(body["user"].get("passwordHash").is_none());

    let wrong = json!({ "email": "ana@farmacia.com", "password": "errada" });
    let (status, _) = t.call(Method::POST, "/api/auth/login", None, Some(wrong)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn deactivated_users_lose_access() {
    let t = TestApp::new();
    let admin = t.token(&t.stubs.admin);
    let davi = t.token(&t.stubs.atend_a);

    let uri = format!("/api/users/{}", t.stubs.atend_a.id);
    let (status, body) = t.call(Method::DELETE, &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, _) = t.call(Method::GET, "/api/shifts", Some(&davi), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn records_validate_medication_and_shift_window() {
    let t = TestApp::new();
    let ana = t.token(&t.stubs.farm_a);
    let bruno = t.token(&t.stubs.farm_b);

    let unknown = json!({ "medId": Uuid::new_v4(), "qtyDelivered": 10 });
    let (status, body) = t.call(Method::POST, "/api/records", Some(&ana), Some(unknown)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Medicamento não encontrado");

    let (status, _) = t.call(Method::POST, "/api/records", Some(&ana), Some(json!({ "qtyDelivered": 1 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // el plantão de Bruno empieza en 11 h, fuera de la tolerancia
    let body = json!({ "medId": t.stubs.med.id, "qtyDelivered": 10 });
    let (status, _) = t.call(Method::POST, "/api/records", Some(&bruno), Some(body.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, created) = t.call(Method::POST, "/api/records", Some(&ana), Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["record"]["status"], "pendente");
    assert_eq!(created["record"]["med"]["code"], "MISO200");

    let chefe = t.token(&t.stubs.chefe);
    let (status, logs) = t.call(Method::GET, "/api/records/audit-logs", Some(&chefe), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(logs["logs"][0]["action"], "CREATE");

    let (status, _) = t.call(Method::GET, "/api/records/audit-logs", Some(&ana), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn bilateral_swap_is_approved_and_reassigns_shifts() {
    let t = TestApp::new();
    let (ana, bruno, chefe) = (t.token(&t.stubs.farm_a), t.token(&t.stubs.farm_b), t.token(&t.stubs.chefe));

    let request = json!({
        "shiftId": t.stubs.shift_a.id,
        "targetId": t.stubs.farm_b.id,
        "targetShiftId": t.stubs.shift_b.id,
        "reason": "consulta médica"
    });
    let (status, swap) = t.call(Method::POST, "/api/swaps", Some(&ana), Some(request)).await;
    assert_eq!(status, StatusCode::CREATED, "{swap}");
    let swap_id = swap["id"].as_str().unwrap().to_string();

    // aprobar antes de la respuesta del colega no se permite
    let approve = format!("/api/swaps/{swap_id}/approve");
    let (status, _) = t.call(Method::PATCH, &approve, Some(&chefe), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let respond = format!("/api/swaps/{swap_id}/respond");
    let (status, body) = t
        .call(Method::PATCH, &respond, Some(&bruno), Some(json!({ "status": "aceito" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "aceito");

    let (status, _) = t.call(Method::PATCH, &approve, Some(&ana), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = t.call(Method::PATCH, &approve, Some(&chefe), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "aprovado");
    assert_eq!(body["approvedBy"], "chefe@farmacia.com");

    let uri = format!("/api/shifts/{}", t.stubs.shift_a.id);
    let (_, shift) = t.call(Method::GET, &uri, Some(&ana), None).await;
    assert_eq!(shift["shift"]["employeeId"], json!(t.stubs.farm_b.id));

    let (_, stats) = t.call(Method::GET, "/api/activity/stats", Some(&chefe), None).await;
    assert_eq!(stats["pendingSwaps"], 0);
}

#[tokio::test]
async fn whatsapp_uses_the_sealed_key_and_restricts_recipients() {
    let t = TestApp::new();
    let ana = t.token(&t.stubs.farm_a);

    let uri = format!("/api/users/{}", t.stubs.farm_a.id);
    let update = json!({ "callmebot_key": "123456", "telefone_whatsapp": "+55 16 99999-0000" });
    let (status, body) = t.call(Method::PUT, &uri, Some(&ana), Some(update)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["hasCallmebotKey"], true);

    let msg = json!({ "email": "ana@farmacia.com", "message": "teste" });
    let (status, body) = t.call(Method::POST, "/api/notify/send-whatsapp", Some(&ana), Some(msg)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], true);

    let sent = t.sender.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].phone, "5516999990000");
    assert_eq!(sent[0].api_key, "123456");

    let other = json!({ "email": "bruno@farmacia.com", "message": "oi" });
    let (status, _) = t.call(Method::POST, "/api/notify/send-whatsapp", Some(&ana), Some(other)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn shift_notification_is_sent_once() {
    let t = TestApp::new();
    let chefe = t.token(&t.stubs.chefe);
    let uri = format!("/api/notify/shift/{}", t.stubs.shift_a.id);

    // sin clave CallMeBot el envío falla, pero el plantão queda notificado
    let (status, body) = t.call(Method::POST, &uri, Some(&chefe), None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(t.sender.sent().is_empty());

    let (status, body) = t.call(Method::POST, &uri, Some(&chefe), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Notificação já foi enviada para este plantão");

    let missing = format!("/api/notify/shift/{}", Uuid::new_v4());
    let (status, _) = t.call(Method::POST, &missing, Some(&chefe), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn recurring_generation_reports_count() {
    let t = TestApp::new();
    let chefe = t.token(&t.stubs.chefe);
    let body = json!({
        "employeeId": t.stubs.atend_a.id,
        "pattern": "weekdays",
        "startDate": "2030-01-07",
        "endDate": "2030-01-13",
        "shiftStart": "07:00",
        "shiftEnd": "19:00"
    });
    let (status, res) = t.call(Method::POST, "/api/shifts/recurring", Some(&chefe), Some(body)).await;
    assert_eq!(status, StatusCode::OK, "{res}");
    assert_eq!(res["count"], 5);
    assert_eq!(res["message"], "5 plantões criados com sucesso");

    let davi = t.token(&t.stubs.atend_a);
    let (_, list) = t
        .call(Method::GET, "/api/shifts?startDate=2030-01-07&endDate=2030-01-13", Some(&davi), None)
        .await;
    assert_eq!(list["shifts"].as_array().unwrap().len(), 5);
}

async fn send_to_self(t: &TestApp, token: &str, forwarded_for: &str) -> StatusCode {
    let msg = json!({ "email": "ana@farmacia.com", "message": "teste" });
    let (status, _) = t
        .call_via(Method::POST, "/api/notify/send-whatsapp", Some(token), Some(msg), Some(forwarded_for))
        .await;
    status
}

#[tokio::test]
async fn whatsapp_rate_limit_ignores_forwarded_for_by_default() {
    let t = TestApp::new();
    let ana = t.token(&t.stubs.farm_a);
    for i in 0..10 {
        let status = send_to_self(&t, &ana, &format!("10.0.0.{i}")).await;
        assert_ne!(status, StatusCode::TOO_MANY_REQUESTS, "request {i}");
    }
    assert_eq!(send_to_self(&t, &ana, "10.0.0.99").await, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn whatsapp_rate_limit_uses_forwarded_for_behind_trusted_proxy() {
    let t = TestApp::with_proxy(true);
    let ana = t.token(&t.stubs.farm_a);
    for i in 0..11 {
        let status = send_to_self(&t, &ana, &format!("10.0.0.{i}")).await;
        assert_ne!(status, StatusCode::TOO_MANY_REQUESTS, "request {i}");
    }
    for _ in 0..10 {
        assert_ne!(send_to_self(&t, &ana, "203.0.113.9").await, StatusCode::TOO_MANY_REQUESTS);
    }
    assert_eq!(send_to_self(&t, &ana, "203.0.113.9").await, StatusCode::TOO_MANY_REQUESTS);
}

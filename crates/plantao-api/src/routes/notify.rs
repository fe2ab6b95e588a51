use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use plantao_domain::{normalize_email, DomainError};
use plantao_notify::{shift_reminder, CalendarEvent, CalendarResult};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::parse_id;
use crate::{
    auth::{AuthUser, ClientIp, JsonBody},
    error::ApiError,
    state::{blocking, SharedState},
};

const SUPERVISOR_ONLY: &str = "Acesso negado. Apenas chefes ou administradores.";

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/send-whatsapp", post(send_whatsapp))
        .route("/schedule-calendar", post(schedule_calendar))
        .route("/shift/{shift_id}", post(notify_shift))
}

#[derive(Debug, Default, Deserialize)]
pub struct WhatsAppBody {
    email: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WhatsAppResponse {
    success: bool,
    message: &'static str,
    result: String,
}

async fn send_whatsapp(
    State(state): State<SharedState>,
    ClientIp(ip): ClientIp,
    AuthUser(actor): AuthUser,
    JsonBody(body): JsonBody<WhatsAppBody>,
) -> Result<Json<WhatsAppResponse>, ApiError> {
    state.limiter.check(ip)?;

    let (Some(email), Some(message)) = (
        body.email.filter(|e| !e.trim().is_empty()),
        body.message.filter(|m| !m.trim().is_empty()),
    ) else {
        return Err(ApiError::bad_request("Email e mensagem são obrigatórios"));
    };
    let email = normalize_email(&email)?;
    if !actor.role.is_supervisor() && email != actor.email {
        return Err(DomainError::forbidden("Você só pode enviar notificações para si mesmo").into());
    }

    let repo = Arc::clone(&state.repo);
    let user = blocking(move || repo.find_user_by_email(&email))
        .await?
        .ok_or_else(|| ApiError::NotFound("Usuário não encontrado".into()))?;

    let result = state.notifier.send_to_user(&user, &message).await?;
    Ok(Json(WhatsAppResponse {
        success: true,
        message: "WhatsApp enviado com sucesso",
        result,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct CalendarBody {
    title: Option<String>,
    description: Option<String>,
    start: Option<String>,
    end: Option<String>,
    #[serde(default)]
    attendees: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CalendarResponse {
    success: bool,
    message: &'static str,
    result: CalendarResult,
}

async fn schedule_calendar(
    State(state): State<SharedState>,
    AuthUser(actor): AuthUser,
    JsonBody(body): JsonBody<CalendarBody>,
) -> Result<Json<CalendarResponse>, ApiError> {
    actor.require_supervisor(SUPERVISOR_ONLY)?;
    let event = CalendarEvent {
        title: body.title.unwrap_or_default(),
        description: body.description,
        start: body.start.unwrap_or_default(),
        end: body.end.unwrap_or_default(),
        attendees: body.attendees,
    };
    let result = state.calendar.create_event(event)?;
    Ok(Json(CalendarResponse {
        success: true,
        message: "Evento de calendário criado",
        result,
    }))
}

#[derive(Debug, Serialize)]
pub struct NotifyShiftResponse {
    success: bool,
    message: &'static str,
}

/// Avisa al funcionario del plantão. Un fallo de envío queda en el log y
/// el plantão se marca como notificado igualmente.
async fn notify_shift(
    State(state): State<SharedState>,
    AuthUser(actor): AuthUser,
    Path(shift_id): Path<String>,
) -> Result<Json<NotifyShiftResponse>, ApiError> {
    actor.require_supervisor(SUPERVISOR_ONLY)?;
    let id = parse_id(&shift_id)?;

    let lookup = state.clone();
    let (shift, employee) = blocking(move || {
        let shift = lookup.shifts().get(&id)?;
        let employee = match shift.employee_id {
            Some(emp) => lookup.repo.get_user(&emp)?,
            None => None,
        };
        Ok((shift, employee))
    })
    .await?;
    if shift.notification_sent {
        return Err(ApiError::bad_request("Notificação já foi enviada para este plantão"));
    }

    if let Some(employee) = &employee {
        let text = shift_reminder(Some(&employee.name), shift.start, &state.policy.offset);
        match state.notifier.send_to_user(employee, &text).await {
            Ok(_) => info!(shift = %shift.id, "shift reminder sent"),
            Err(e) => error!(shift = %shift.id, "error sending WhatsApp to {}: {e}", employee.email),
        }
    }

    let mark = state.clone();
    blocking(move || mark.shifts().mark_notified(&id, Utc::now())).await?;
    Ok(Json(NotifyShiftResponse {
        success: true,
        message: "Notificações enviadas com sucesso",
    }))
}

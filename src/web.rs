use actix_web::{middleware, web, App, HttpRequest, HttpResponse, HttpServer, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

use crate::directory::StaffDirectory;
use crate::display::describe_conflicts;
use crate::error::SchedulingError;
use crate::form::{AppointmentDraft, AppointmentPatch};
use crate::schedule::slot_utils::STANDARD_TIME_SLOTS;
use crate::schedule::time_window::TimeFields;
use crate::schedule::types::{
    normalize_email, Appointment, AppointmentFilter, AppointmentStatus, Principal, Role,
};
use crate::schedule::SchedulingService;

pub const EMAIL_HEADER: &str = "X-User-Email";
pub const ROLE_HEADER: &str = "X-User-Role";

pub struct AppState {
    pub service: SchedulingService,
    pub directory: StaffDirectory,
}

#[derive(Deserialize)]
pub struct ListQuery {
    staff_email: Option<String>,
    status: Option<AppointmentStatus>,
}

#[derive(Deserialize)]
pub struct ConflictCheckRequest {
    staff_email: String,
    date: Option<String>,
    time_slot: Option<String>,
    start_time: Option<String>,
    end_time: Option<String>,
    exclude_id: Option<String>,
}

#[derive(Serialize)]
pub struct AppointmentView {
    #[serde(flatten)]
    appointment: Appointment,
    staff_name: String,
    allowed_transitions: Vec<AppointmentStatus>,
}

impl AppState {
    fn view(&self, principal: &Principal, appointment: Appointment) -> AppointmentView {
        AppointmentView {
            staff_name: self.directory.display_name(&appointment.staff_email),
            allowed_transitions: self.service.allowed_transitions(principal, &appointment),
            appointment,
        }
    }
}

/// Reads the principal the authentication proxy put on the request
fn principal_from(req: &HttpRequest) -> Option<Principal> {
    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };
    let email = header(EMAIL_HEADER)?;
    let role: Role = header(ROLE_HEADER)?.parse().ok()?;
    Some(Principal::new(email, role))
}

fn unauthenticated() -> HttpResponse {
    HttpResponse::Unauthorized().json(json!({
        "success": false,
        "error": "Unauthorized"
    }))
}

/// Maps a scheduling outcome to a status code and JSON body
fn error_response(err: &SchedulingError) -> HttpResponse {
    let body = |extra: serde_json::Value| {
        let mut body = json!({
            "success": false,
            "kind": err.kind(),
            "error": err.to_string(),
        });
        if let (Some(body), Some(extra)) = (body.as_object_mut(), extra.as_object()) {
            body.extend(extra.clone());
        }
        body
    };

    match err {
        SchedulingError::Validation(_) => HttpResponse::BadRequest().json(body(json!({}))),
        SchedulingError::Authorization(_) => HttpResponse::Forbidden().json(body(json!({}))),
        SchedulingError::NotFound(_) => HttpResponse::NotFound().json(body(json!({}))),
        SchedulingError::Conflict(conflicts) => HttpResponse::Conflict().json(body(json!({
            "conflicts": conflicts,
            "explanations": describe_conflicts(conflicts),
        }))),
        SchedulingError::InvalidStateTransition { from, to } => {
            HttpResponse::UnprocessableEntity().json(body(json!({
                "current_status": from,
                "requested_status": to,
            })))
        }
        SchedulingError::Internal(e) => {
            error!(error = %e, "request failed with storage error");
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "kind": err.kind(),
                "error": "Internal error",
            }))
        }
    }
}

// List appointments visible to the caller
async fn list_schedules(
    req: HttpRequest,
    query: web::Query<ListQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let Some(principal) = principal_from(&req) else {
        return Ok(unauthenticated());
    };
    let query = query.into_inner();
    let filter = AppointmentFilter {
        staff_email: query.staff_email,
        status: query.status,
    };

    match state.service.list_appointments(&principal, filter) {
        Ok(appointments) => {
            let views: Vec<AppointmentView> = appointments
                .into_iter()
                .map(|a| state.view(&principal, a))
                .collect();
            Ok(HttpResponse::Ok().json(views))
        }
        Err(e) => Ok(error_response(&e)),
    }
}

async fn get_schedule(
    req: HttpRequest,
    id: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let Some(principal) = principal_from(&req) else {
        return Ok(unauthenticated());
    };
    match state.service.get_appointment(&principal, &id) {
        Ok(appointment) => Ok(HttpResponse::Ok().json(state.view(&principal, appointment))),
        Err(e) => Ok(error_response(&e)),
    }
}

// Admin books a shift
async fn create_schedule(
    req: HttpRequest,
    draft: web::Json<AppointmentDraft>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let Some(principal) = principal_from(&req) else {
        return Ok(unauthenticated());
    };
    match state.service.create_appointment(&principal, draft.into_inner()) {
        Ok(appointment) => Ok(HttpResponse::Created().json(json!({
            "success": true,
            "appointment_id": appointment.id.clone(),
            "appointment": state.view(&principal, appointment),
        }))),
        Err(e) => Ok(error_response(&e)),
    }
}

// Staff asks for a shift
async fn request_shift(
    req: HttpRequest,
    draft: web::Json<AppointmentDraft>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let Some(principal) = principal_from(&req) else {
        return Ok(unauthenticated());
    };
    match state.service.request_shift(&principal, draft.into_inner()) {
        Ok(appointment) => Ok(HttpResponse::Created().json(json!({
            "success": true,
            "appointment_id": appointment.id.clone(),
            "appointment": state.view(&principal, appointment),
        }))),
        Err(e) => Ok(error_response(&e)),
    }
}

async fn update_schedule(
    req: HttpRequest,
    id: web::Path<String>,
    patch: web::Json<AppointmentPatch>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let Some(principal) = principal_from(&req) else {
        return Ok(unauthenticated());
    };
    match state.service.update_appointment(&principal, &id, patch.into_inner()) {
        Ok(appointment) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "appointment": state.view(&principal, appointment),
        }))),
        Err(e) => Ok(error_response(&e)),
    }
}

// Advisory check for live form feedback; a clear result can still lose the race at commit
async fn check_conflicts(
    req: HttpRequest,
    body: web::Json<ConflictCheckRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let Some(principal) = principal_from(&req) else {
        return Ok(unauthenticated());
    };
    let body = body.into_inner();
    let allowed = match principal.role {
        Role::Admin => true,
        Role::Staff => principal.email == normalize_email(&body.staff_email),
        Role::Customer => false,
    };
    if !allowed {
        return Ok(error_response(&SchedulingError::unauthorized(
            "cannot check another staff member's schedule",
        )));
    }

    let fields = TimeFields {
        date: body.date,
        time_slot: body.time_slot,
        start_time: body.start_time,
        end_time: body.end_time,
    };
    let result = match body.exclude_id.as_deref() {
        Some(id) => state.service.check_conflicts_excluding(&body.staff_email, &fields, id),
        None => state.service.check_conflicts(&body.staff_email, &fields),
    };
    match result {
        Ok(conflicts) => Ok(HttpResponse::Ok().json(json!({
            "has_conflict": !conflicts.is_empty(),
            "explanations": describe_conflicts(&conflicts),
            "conflicts": conflicts,
        }))),
        Err(e) => Ok(error_response(&e)),
    }
}

async fn get_time_slots() -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(STANDARD_TIME_SLOTS))
}

async fn get_staff(state: web::Data<AppState>) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(state.directory.members()))
}

async fn get_stats(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse> {
    let Some(principal) = principal_from(&req) else {
        return Ok(unauthenticated());
    };
    match state.service.stats(&principal) {
        Ok(stats) => Ok(HttpResponse::Ok().json(json!({ "stats": stats }))),
        Err(e) => Ok(error_response(&e)),
    }
}

/// Registers the scheduling API
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/time-slots", web::get().to(get_time_slots))
        .route("/api/staff", web::get().to(get_staff))
        .route("/api/admin/stats", web::get().to(get_stats))
        .route("/api/schedules", web::get().to(list_schedules))
        .route("/api/schedules", web::post().to(create_schedule))
        .route("/api/schedules/requests", web::post().to(request_shift))
        .route("/api/schedules/conflicts", web::post().to(check_conflicts))
        .service(
            web::resource("/api/schedules/{id}")
                .route(web::get().to(get_schedule))
                .route(web::patch().to(update_schedule)),
        );
}

pub async fn start_server(port: u16, state: AppState) -> std::io::Result<()> {
    let app_state = web::Data::new(state);
    info!(port, "starting scheduling server");

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(middleware::Logger::default())
            .configure(routes)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}

use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::{test, web as aweb, App};
use serde_json::{json, Value};

use shift_appointments::directory::StaffDirectory;
use shift_appointments::schedule::SchedulingService;
use shift_appointments::store::AppointmentStore;
use shift_appointments::web::{routes, AppState, EMAIL_HEADER, ROLE_HEADER};

fn state() -> aweb::Data<AppState> {
    aweb::Data::new(AppState {
        service: SchedulingService::new(Arc::new(AppointmentStore::in_memory())),
        directory: StaffDirectory::with_default_staff(),
    })
}

const ADMIN: (&str, &str) = ("admin@foodtruck.com", "admin");
const STAFF1: (&str, &str) = ("staff1@foodtruck.com", "staff");
const STAFF2: (&str, &str) = ("staff2@foodtruck.com", "staff");

fn as_user(req: test::TestRequest, (email, role): (&str, &str)) -> test::TestRequest {
    req.insert_header((EMAIL_HEADER, email))
        .insert_header((ROLE_HEADER, role))
}

fn shift(email: &str, label: &str) -> Value {
    json!({ "staff_email": email, "date": "2024-01-10", "time_slot": label })
}

#[actix_web::test]
async fn missing_principal_is_unauthorized() {
    let app = test::init_service(App::new().app_data(state()).configure(routes)).await;
    let req = test::TestRequest::get().uri("/api/schedules").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::get()
        .uri("/api/schedules")
        .insert_header((EMAIL_HEADER, "x@foodtruck.com"))
        .insert_header((ROLE_HEADER, "superuser"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn double_booking_returns_conflict_with_explanations() {
    let app = test::init_service(App::new().app_data(state()).configure(routes)).await;

    let req = as_user(test::TestRequest::post().uri("/api/schedules"), ADMIN)
        .set_json(shift("staff1@foodtruck.com", "9:00 AM"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = test::read_body_json(resp).await;
    assert_eq!(created["appointment"]["status"], "scheduled");
    assert_eq!(created["appointment"]["staff_name"], "Staff1");
    let id = created["appointment_id"].as_str().unwrap().to_string();

    let req = as_user(test::TestRequest::post().uri("/api/schedules"), ADMIN)
        .set_json(shift("staff1@foodtruck.com", "10:00 AM"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["kind"], "conflict_error");
    assert_eq!(body["conflicts"][0]["appointment_id"], id.as_str());
    assert_eq!(body["explanations"].as_array().unwrap().len(), 1);
}

#[actix_web::test]
async fn staff_request_then_admin_approval() {
    let app = test::init_service(App::new().app_data(state()).configure(routes)).await;

    let req = as_user(test::TestRequest::post().uri("/api/schedules/requests"), STAFF1)
        .set_json(json!({ "date": "2024-01-10", "time_slot": "1:00 PM" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    let id = body["appointment_id"].as_str().unwrap().to_string();
    assert_eq!(body["appointment"]["status"], "requested");

    let req = as_user(test::TestRequest::patch().uri(&format!("/api/schedules/{id}")), STAFF2)
        .set_json(json!({ "status": "cancelled" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let req = as_user(test::TestRequest::patch().uri(&format!("/api/schedules/{id}")), ADMIN)
        .set_json(json!({ "status": "completed" }))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::UNPROCESSABLE_ENTITY
    );

    let req = as_user(test::TestRequest::patch().uri(&format!("/api/schedules/{id}")), ADMIN)
        .set_json(json!({ "status": "scheduled" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["appointment"]["manager_email"], "admin@foodtruck.com");
}

#[actix_web::test]
async fn listing_and_lookup_are_scoped() {
    let app = test::init_service(App::new().app_data(state()).configure(routes)).await;
    let mut ids = Vec::new();
    for email in ["staff1@foodtruck.com", "staff2@foodtruck.com"] {
        let req = as_user(test::TestRequest::post().uri("/api/schedules"), ADMIN)
            .set_json(shift(email, "9:00 AM"))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        ids.push(body["appointment_id"].as_str().unwrap().to_string());
    }

    let req = as_user(test::TestRequest::get().uri("/api/schedules"), STAFF1).to_request();
    let mine: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(mine.as_array().unwrap().len(), 1);
    assert_eq!(mine[0]["staff_email"], "staff1@foodtruck.com");

    let req = test::TestRequest::get().uri("/api/schedules?status=scheduled");
    let req = as_user(req, ADMIN).to_request();
    let all: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(all.as_array().unwrap().len(), 2);

    let req = test::TestRequest::get().uri(&format!("/api/schedules/{}", ids[1]));
    let req = as_user(req, STAFF1).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let req = as_user(test::TestRequest::get().uri("/api/schedules/APT0"), ADMIN).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

    let req = as_user(test::TestRequest::get().uri("/api/admin/stats"), STAFF1).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let req = as_user(test::TestRequest::get().uri("/api/admin/stats"), ADMIN).to_request();
    let stats: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(stats["stats"]["total_appointments"], 2);
}

#[actix_web::test]
async fn advisory_conflict_check_honours_exclusion() {
    let app = test::init_service(App::new().app_data(state()).configure(routes)).await;
    let req = as_user(test::TestRequest::post().uri("/api/schedules"), ADMIN)
        .set_json(shift("staff1@foodtruck.com", "9:00 AM"))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let id = body["appointment_id"].as_str().unwrap().to_string();

    let probe = json!({
        "staff_email": "staff1@foodtruck.com",
        "date": "2024-01-10",
        "start_time": "2024-01-10T10:00:00",
        "end_time": "2024-01-10T12:00:00",
    });
    let req = as_user(test::TestRequest::post().uri("/api/schedules/conflicts"), STAFF1)
        .set_json(&probe)
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["has_conflict"], true);

    let mut excluded = probe.clone();
    excluded["exclude_id"] = json!(id);
    let req = as_user(test::TestRequest::post().uri("/api/schedules/conflicts"), STAFF1)
        .set_json(&excluded)
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["has_conflict"], false);

    let req = as_user(test::TestRequest::post().uri("/api/schedules/conflicts"), STAFF2)
        .set_json(&probe)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn bad_input_is_a_validation_error() {
    let app = test::init_service(App::new().app_data(state()).configure(routes)).await;
    let req = as_user(test::TestRequest::post().uri("/api/schedules"), ADMIN)
        .set_json(json!({
            "staff_email": "staff1@foodtruck.com",
            "date": "2024-01-10",
            "start_time": "2024-01-10T12:00:00",
            "end_time": "2024-01-10T11:00:00",
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = as_user(test::TestRequest::get().uri("/api/time-slots"), STAFF1).to_request();
    let slots: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(slots[0], "9:00 AM");
}

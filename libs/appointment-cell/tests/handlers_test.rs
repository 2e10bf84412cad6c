mod common;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use appointment_cell::appointment_routes;
use shared_utils::test_utils::{JwtTestUtils, TestUser};

use common::ClinicFixture;

struct Harness {
    clinic: ClinicFixture,
    desk: TestUser,
}

impl Harness {
    async fn new() -> Self {
        let clinic = ClinicFixture::new().await;
        let desk = TestUser::receptionist("desk@riverside.test");
        clinic
            .patients
            .insert_user(Uuid::parse_str(&desk.id).unwrap(), "receptionist", true)
            .await;
        Self { clinic, desk }
    }

    fn app(&self) -> Router {
        appointment_routes(self.clinic.state.clone())
    }

    fn bearer(&self, user: &TestUser) -> String {
        JwtTestUtils::bearer(user, &self.clinic.config.supabase_jwt_secret)
    }

    async fn send(&self, user: Option<&TestUser>, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(header::AUTHORIZATION, self.bearer(user));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn booking_body(&self, time: &str) -> Value {
        json!({
            "patient_id": self.clinic.patient_id,
            "clinic_id": self.clinic.clinic_id,
            "doctor_id": self.clinic.doctor_id,
            "appointment_date": "2024-01-10",
            "appointment_time": format!("2024-01-10 {}:00", time),
            "consultation_type": "new"
        })
    }
}

#[tokio::test]
async fn requests_without_token_are_unauthorized() {
    let harness = Harness::new().await;
    let (status, body) = harness.send(None, Method::GET, "/appointments", None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthorized");
}

#[tokio::test]
async fn patients_cannot_book_through_the_desk_api() {
    let harness = Harness::new().await;
    let patient = TestUser::patient("someone@example.com");

    let body = harness.booking_body("09:00");
    let (status, body) = harness.send(Some(&patient), Method::POST, "/appointments", Some(body)).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");
}

#[tokio::test]
async fn booking_conflicts_surface_as_409_with_kind() {
    let harness = Harness::new().await;
    let desk = &harness.desk;

    let (status, body) = harness
        .send(Some(desk), Method::POST, "/appointments", Some(harness.booking_body("09:00")))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment"]["booking_number"], "D1-20240110-0001");
    assert_eq!(body["appointment"]["status"], "booked");

    let (status, body) = harness
        .send(Some(desk), Method::POST, "/appointments", Some(harness.booking_body("09:05")))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "conflict");
    assert_eq!(body["retryable"], false);
}

#[tokio::test]
async fn invalid_payload_values_are_400() {
    let harness = Harness::new().await;
    let mut body = harness.booking_body("09:00");
    body["consultation_type"] = json!("telehealth");

    let (status, body) = harness.send(Some(&harness.desk), Method::POST, "/appointments", Some(body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");
}

#[tokio::test]
async fn slots_and_queue_reflect_the_front_desk_flow() {
    let harness = Harness::new().await;
    let desk = &harness.desk;
    let doctor = harness.clinic.doctor_id;

    let (_, created) = harness
        .send(Some(desk), Method::POST, "/appointments", Some(harness.booking_body("09:12")))
        .await;
    let appointment_id = created["appointment"]["id"].as_str().unwrap().to_string();

    let (status, slots) = harness
        .send(
            Some(desk),
            Method::GET,
            &format!("/appointments/slots/available?doctor_id={}&date=2024-01-10", doctor),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(slots["slots"][0]["is_booked"], false);
    assert_eq!(slots["slots"][1]["is_booked"], true);

    // checked_in_by defaults to the caller
    let (status, checked_in) = harness
        .send(Some(desk), Method::POST, "/checkins", Some(json!({ "appointment_id": appointment_id })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(checked_in["appointment"]["status"], "arrived");
    assert_eq!(checked_in["checkin"]["checked_in_by"], desk.id.as_str());

    let (status, queue) = harness
        .send(
            Some(desk),
            Method::GET,
            &format!("/checkins/doctor/{}/queue?date=2024-01-10", doctor),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(queue["queue"][0]["appointment_id"], appointment_id.as_str());
    assert_eq!(queue["queue"][0]["position"], 1);

    let (status, _) = harness
        .send(Some(desk), Method::POST, "/checkins", Some(json!({ "appointment_id": appointment_id })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn status_updates_and_cancellation() {
    let harness = Harness::new().await;
    let desk = &harness.desk;

    let (_, created) = harness
        .send(Some(desk), Method::POST, "/appointments", Some(harness.booking_body("10:00")))
        .await;
    let id = created["appointment"]["id"].as_str().unwrap().to_string();

    let (status, body) = harness
        .send(Some(desk), Method::PATCH, &format!("/appointments/{}/status", id), Some(json!({ "status": "no_show" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment"]["status"], "no_show");

    let (status, body) = harness
        .send(Some(desk), Method::POST, &format!("/appointments/{}/cancel", id), Some(json!({ "reason": "late" })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "conflict");

    let (status, _) = harness
        .send(Some(desk), Method::GET, &format!("/appointments/{}", Uuid::new_v4()), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn checkin_listing_and_vitals_routes() {
    let harness = Harness::new().await;
    let desk = &harness.desk;

    let (_, created) = harness
        .send(Some(desk), Method::POST, "/appointments", Some(harness.booking_body("09:00")))
        .await;
    let appointment_id = created["appointment"]["id"].as_str().unwrap().to_string();
    harness
        .send(Some(desk), Method::POST, "/checkins", Some(json!({ "appointment_id": appointment_id })))
        .await;

    let (status, listed) = harness
        .send(Some(desk), Method::GET, &format!("/checkins?doctor_id={}", harness.clinic.doctor_id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["total"], 1);
    assert_eq!(listed["checkins"][0]["appointment_id"], appointment_id.as_str());

    let (status, _) = harness
        .send(Some(desk), Method::GET, &format!("/vitals/appointment/{}", appointment_id), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, recorded) = harness
        .send(
            Some(desk),
            Method::POST,
            "/vitals",
            Some(json!({ "appointment_id": appointment_id, "height_cm": 160.0, "weight_kg": 64.0 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let vitals_id = recorded["vitals"]["id"].as_str().unwrap().to_string();

    let (status, read) = harness
        .send(Some(desk), Method::GET, &format!("/vitals/appointment/{}", appointment_id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!((read["bmi"].as_f64().unwrap() - 25.0).abs() < 1e-9);

    let (status, _) = harness
        .send(Some(desk), Method::PUT, &format!("/vitals/{}", vitals_id), Some(json!({ "weight_kg": 900.0 })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, updated) = harness
        .send(Some(desk), Method::PUT, &format!("/vitals/{}", vitals_id), Some(json!({ "pulse_rate": 68 })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["vitals"]["pulse_rate"], 68);
    assert_eq!(updated["vitals"]["weight_kg"], 64.0);

    let (status, history) = harness
        .send(
            Some(desk),
            Method::GET,
            &format!("/vitals/patient/{}/history", harness.clinic.patient_id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["count"], 1);
    assert_eq!(history["vitals_history"][0]["id"], vitals_id.as_str());
}

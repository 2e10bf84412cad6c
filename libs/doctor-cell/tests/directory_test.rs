use chrono::NaiveTime;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use assert_matches::assert_matches;
use doctor_cell::{
    DoctorDirectory, DoctorError, InMemoryScheduleCatalog, NewScheduleRequest, ScheduleCatalog,
    SupabaseDoctorDirectory, SupabaseScheduleCatalog,
};
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};

#[tokio::test]
async fn scope_code_falls_back_to_clinic_code() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase(&mock_server.uri()).to_app_config();

    let doctor_id = Uuid::new_v4();
    let clinic_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("id", format!("eq.{}", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_response(&doctor_id.to_string(), &clinic_id.to_string(), None)
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/clinics"))
        .and(query_param("id", format!("eq.{}", clinic_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::clinic_response(&clinic_id.to_string(), "CLN")
        ])))
        .mount(&mock_server)
        .await;

    let directory = SupabaseDoctorDirectory::new(&config);
    let doctor = directory.active_doctor(doctor_id).await.unwrap();
    assert_eq!(doctor.consultation_fee, Some(100.0));
    assert_eq!(directory.scope_code(&doctor).await.unwrap().as_deref(), Some("CLN"));
}

#[tokio::test]
async fn missing_doctor_is_not_found() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase(&mock_server.uri()).to_app_config();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let directory = SupabaseDoctorDirectory::new(&config);
    assert_matches!(directory.active_doctor(Uuid::new_v4()).await, Err(DoctorError::DoctorNotFound));
}

#[tokio::test]
async fn schedules_are_read_for_the_weekday() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase(&mock_server.uri()).to_app_config();
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_schedules"))
        .and(query_param("doctor_id", format!("eq.{}", doctor_id)))
        .and(query_param("day_of_week", "eq.3"))
        .and(query_param("is_active", "eq.true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::schedule_response(&doctor_id.to_string(), 3, "09:00:00", "10:00:00", 12)
        ])))
        .mount(&mock_server)
        .await;

    let catalog = SupabaseScheduleCatalog::new(&config);
    let rows = catalog.schedules_for_day(doctor_id, 3).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].start_time, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
    assert_eq!(rows[0].slot_duration_minutes, 12);
}

#[tokio::test]
async fn in_memory_catalog_rejects_overlapping_rows() {
    let catalog = InMemoryScheduleCatalog::new();
    let doctor_id = Uuid::new_v4();
    let t = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap();

    catalog
        .add_schedule(NewScheduleRequest {
            doctor_id,
            day_of_week: 1,
            start_time: t(14, 0),
            end_time: t(17, 0),
            slot_duration_minutes: Some(15),
        })
        .await
        .unwrap();
    catalog
        .add_schedule(NewScheduleRequest {
            doctor_id,
            day_of_week: 1,
            start_time: t(9, 0),
            end_time: t(12, 0),
            slot_duration_minutes: None,
        })
        .await
        .unwrap();

    let overlap = catalog
        .add_schedule(NewScheduleRequest {
            doctor_id,
            day_of_week: 1,
            start_time: t(11, 30),
            end_time: t(14, 30),
            slot_duration_minutes: None,
        })
        .await;
    assert_matches!(overlap, Err(DoctorError::ScheduleOverlap));

    let rows = catalog.schedules_for_day(doctor_id, 1).await.unwrap();
    assert_eq!(rows.iter().map(|r| r.start_time).collect::<Vec<_>>(), vec![t(9, 0), t(14, 0)]);
}

mod common;

use std::collections::HashSet;

use assert_matches::assert_matches;
use chrono::NaiveDate;
use uuid::Uuid;

use appointment_cell::models::{
    AppointmentError, AppointmentStatus, CancelAppointmentRequest, ErrorKind, ListAppointmentsParams,
    PaymentStatus, RescheduleAppointmentRequest, UpdateStatusRequest,
};
use doctor_cell::DoctorProfile;

use common::{at, ClinicFixture};

fn status(value: &str) -> UpdateStatusRequest {
    UpdateStatusRequest { status: value.to_string() }
}

#[tokio::test]
async fn adjacent_bookings_get_consecutive_numbers_and_overlaps_are_rejected() {
    let clinic = ClinicFixture::new().await;
    let service = &clinic.state.appointments;

    let first = service.create_appointment(clinic.booking("09:00")).await.unwrap();
    assert_eq!(first.appointment.booking_number, "D1-20240110-0001");
    assert_eq!(first.appointment.status, AppointmentStatus::Booked);
    assert_eq!(first.appointment.payment_status, PaymentStatus::Pending);
    assert_eq!(first.appointment.duration_minutes, 12);
    assert_eq!(first.appointment.fee_amount, Some(100.0));
    assert!(first.checkin.is_none());

    let clash = service.create_appointment(clinic.booking("09:05")).await.unwrap_err();
    assert_matches!(clash, AppointmentError::DoctorNotAvailable);
    assert_eq!(clash.kind(), ErrorKind::Conflict);

    let second = service.create_appointment(clinic.booking("09:12")).await.unwrap();
    assert_eq!(second.appointment.booking_number, "D1-20240110-0002");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_bookings_never_overlap_and_serials_stay_contiguous() {
    let clinic = ClinicFixture::new().await;

    let mut handles = Vec::new();
    for i in 0..10u32 {
        let service = clinic.state.appointments.clone();
        let minutes = 9 * 60 + 12 * i;
        let request = clinic.booking(&format!("{:02}:{:02}", minutes / 60, minutes % 60));
        handles.push(tokio::spawn(async move { service.create_appointment(request).await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    // Five requests racing for the same slot: exactly one wins.
    let mut racers = Vec::new();
    for _ in 0..5 {
        let service = clinic.state.appointments.clone();
        let request = clinic.booking("11:00");
        racers.push(tokio::spawn(async move { service.create_appointment(request).await }));
    }
    let mut winners = 0;
    for racer in racers {
        match racer.await.unwrap() {
            Ok(_) => winners += 1,
            Err(e) => assert_matches!(e, AppointmentError::DoctorNotAvailable),
        }
    }
    assert_eq!(winners, 1);

    let booked = clinic.store.all_appointments().await;
    let numbers: HashSet<String> = booked.iter().map(|a| a.booking_number.clone()).collect();
    let expected: HashSet<String> = (1..=11).map(|n| format!("D1-20240110-{:04}", n)).collect();
    assert_eq!(numbers, expected);

    for a in &booked {
        for b in &booked {
            if a.id != b.id {
                assert!(a.end_time() <= b.appointment_time || b.end_time() <= a.appointment_time);
            }
        }
    }
}

#[tokio::test]
async fn follow_up_inside_window_is_free() {
    let clinic = ClinicFixture::new().await;
    clinic.seed_completed_visit(NaiveDate::from_ymd_opt(2024, 1, 3).unwrap().and_hms_opt(9, 0, 0).unwrap()).await;

    let mut request = clinic.booking("09:00");
    request.consultation_type = "followup".to_string();
    let created = clinic.state.appointments.create_appointment(request).await.unwrap();

    assert_eq!(created.appointment.fee_amount, None);
}

#[tokio::test]
async fn follow_up_after_window_pays_follow_up_fee() {
    let clinic = ClinicFixture::new().await;
    clinic.seed_completed_visit(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap().and_hms_opt(9, 0, 0).unwrap()).await;

    let mut request = clinic.booking("09:00");
    request.consultation_type = "followup".to_string();
    let created = clinic.state.appointments.create_appointment(request).await.unwrap();

    assert_eq!(created.appointment.fee_amount, Some(50.0));
}

#[tokio::test]
async fn walk_in_carries_premium() {
    let clinic = ClinicFixture::new().await;

    let mut request = clinic.booking("09:00");
    request.consultation_type = "walkin".to_string();
    let created = clinic.state.appointments.create_appointment(request).await.unwrap();

    assert_eq!(created.appointment.fee_amount, Some(120.0));
}

#[tokio::test]
async fn payment_at_booking_records_checkin_but_keeps_status_booked() {
    let clinic = ClinicFixture::new().await;

    let mut request = clinic.booking("09:00");
    request.payment_mode = Some("upi".to_string());
    let created = clinic.state.appointments.create_appointment(request).await.unwrap();

    assert_eq!(created.appointment.payment_status, PaymentStatus::Paid);
    assert_eq!(created.appointment.status, AppointmentStatus::Booked);
    let checkin = created.checkin.expect("auto check-in");
    assert!(checkin.payment_collected);
    assert_eq!(checkin.appointment_id, created.appointment.id);
}

#[tokio::test]
async fn booking_number_falls_back_to_clinic_code() {
    let clinic = ClinicFixture::new().await;
    let uncoded = Uuid::new_v4();
    clinic
        .doctors
        .upsert_doctor(DoctorProfile {
            id: uncoded,
            clinic_id: clinic.clinic_id,
            doctor_code: None,
            consultation_fee: Some(80.0),
            follow_up_fee: None,
            follow_up_days: None,
            is_active: true,
        })
        .await;

    let mut request = clinic.booking("09:00");
    request.doctor_id = uncoded;
    let created = clinic.state.appointments.create_appointment(request).await.unwrap();

    assert_eq!(created.appointment.booking_number, "CLN-20240110-0001");
}

#[tokio::test]
async fn user_without_patient_record_gets_one() {
    let clinic = ClinicFixture::new().await;
    let user_id = clinic.patients.add_user_with_role("patient", true).await;

    let mut request = clinic.booking("09:00");
    request.patient_id = None;
    request.user_id = Some(user_id);
    let created = clinic.state.appointments.create_appointment(request).await.unwrap();

    assert!(created.patient_created);
    assert_ne!(created.appointment.patient_id, clinic.patient_id);
    assert!(clinic.patients.is_assigned(created.appointment.patient_id, clinic.clinic_id).await);
}

#[tokio::test]
async fn malformed_requests_are_validation_errors() {
    let clinic = ClinicFixture::new().await;
    let service = &clinic.state.appointments;

    let mut mismatched = clinic.booking("09:00");
    mismatched.appointment_date = "2024-01-11".to_string();
    assert_matches!(service.create_appointment(mismatched).await, Err(AppointmentError::ValidationError(_)));

    let mut both_ids = clinic.booking("09:00");
    both_ids.user_id = Some(Uuid::new_v4());
    assert_matches!(service.create_appointment(both_ids).await, Err(AppointmentError::ValidationError(_)));

    let mut telehealth = clinic.booking("09:00");
    telehealth.consultation_type = "telehealth".to_string();
    assert_matches!(service.create_appointment(telehealth).await, Err(AppointmentError::ValidationError(_)));

    let mut too_long = clinic.booking("09:00");
    too_long.duration_minutes = Some(300);
    assert_matches!(service.create_appointment(too_long).await, Err(AppointmentError::ValidationError(_)));

    assert!(clinic.store.all_appointments().await.is_empty());
}

#[tokio::test]
async fn unknown_references_are_not_found() {
    let clinic = ClinicFixture::new().await;
    let service = &clinic.state.appointments;

    let mut ghost_doctor = clinic.booking("09:00");
    ghost_doctor.doctor_id = Uuid::new_v4();
    let err = service.create_appointment(ghost_doctor).await.unwrap_err();
    assert_matches!(err, AppointmentError::DoctorNotFound);
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let mut ghost_patient = clinic.booking("09:00");
    ghost_patient.patient_id = Some(Uuid::new_v4());
    assert_matches!(service.create_appointment(ghost_patient).await, Err(AppointmentError::PatientNotFound));
}

#[tokio::test]
async fn reschedule_rechecks_availability_excluding_itself() {
    let clinic = ClinicFixture::new().await;
    let service = &clinic.state.appointments;

    let early = service.create_appointment(clinic.booking("09:00")).await.unwrap().appointment;
    let late = service.create_appointment(clinic.booking("09:24")).await.unwrap().appointment;

    let blocked = service
        .reschedule_appointment(
            late.id,
            RescheduleAppointmentRequest {
                new_appointment_time: "2024-01-10 09:06:00".to_string(),
                reason: None,
            },
        )
        .await;
    assert_matches!(blocked, Err(AppointmentError::DoctorNotAvailable));

    // Shifting into its own current slot is fine.
    let nudged = service
        .reschedule_appointment(
            early.id,
            RescheduleAppointmentRequest {
                new_appointment_time: "2024-01-10T09:05:00".to_string(),
                reason: Some("Doctor running late".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(nudged.appointment_time, at(9, 5));
    assert_eq!(nudged.booking_number, early.booking_number);
    assert_eq!(nudged.fee_amount, early.fee_amount);
}

#[tokio::test]
async fn cancelling_a_completed_visit_is_a_conflict() {
    let clinic = ClinicFixture::new().await;
    let service = &clinic.state.appointments;
    let id = service.create_appointment(clinic.booking("09:00")).await.unwrap().appointment.id;

    for next in ["arrived", "in_consultation", "completed"] {
        service.update_status(id, status(next)).await.unwrap();
    }

    let err = service
        .cancel_appointment(id, CancelAppointmentRequest { reason: "Patient asked".to_string() })
        .await
        .unwrap_err();
    assert_matches!(
        err,
        AppointmentError::InvalidStatusTransition { from: AppointmentStatus::Completed, to: AppointmentStatus::Cancelled }
    );
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(service.get_appointment(id).await.unwrap().status, AppointmentStatus::Completed);
}

#[tokio::test]
async fn cancelled_slot_can_be_rebooked_with_next_serial() {
    let clinic = ClinicFixture::new().await;
    let service = &clinic.state.appointments;
    let first = service.create_appointment(clinic.booking("09:00")).await.unwrap().appointment;

    let cancelled = service
        .cancel_appointment(first.id, CancelAppointmentRequest { reason: "Travelling".to_string() })
        .await
        .unwrap();
    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);
    assert_eq!(cancelled.cancellation_reason.as_deref(), Some("Travelling"));

    let again = service.create_appointment(clinic.booking("09:00")).await.unwrap().appointment;
    assert_eq!(again.booking_number, "D1-20240110-0002");

    let reschedule_cancelled = service
        .reschedule_appointment(
            first.id,
            RescheduleAppointmentRequest {
                new_appointment_time: "2024-01-10 10:00:00".to_string(),
                reason: None,
            },
        )
        .await;
    assert_matches!(reschedule_cancelled, Err(AppointmentError::InvalidStatusTransition { .. }));
}

#[tokio::test]
async fn terminal_statuses_reject_further_transitions() {
    let clinic = ClinicFixture::new().await;
    let service = &clinic.state.appointments;
    let id = service.create_appointment(clinic.booking("09:00")).await.unwrap().appointment.id;

    service.update_status(id, status("no_show")).await.unwrap();
    assert_matches!(
        service.update_status(id, status("arrived")).await,
        Err(AppointmentError::InvalidStatusTransition { .. })
    );
    assert_matches!(
        service.update_status(id, status("teleported")).await,
        Err(AppointmentError::ValidationError(_))
    );
}

#[tokio::test]
async fn listing_filters_and_orders_latest_first() {
    let clinic = ClinicFixture::new().await;
    let service = &clinic.state.appointments;
    let morning = service.create_appointment(clinic.booking("09:00")).await.unwrap().appointment;
    let later = service.create_appointment(clinic.booking("10:00")).await.unwrap().appointment;
    service
        .cancel_appointment(morning.id, CancelAppointmentRequest { reason: "Sick".to_string() })
        .await
        .unwrap();

    let all = service
        .list_appointments(&ListAppointmentsParams {
            clinic_id: None,
            doctor_id: Some(clinic.doctor_id),
            patient_id: None,
            status: None,
            date: Some("2024-01-10".to_string()),
            limit: Some(0),
            offset: None,
        })
        .await
        .unwrap();
    assert_eq!(all.iter().map(|a| a.id).collect::<Vec<_>>(), vec![later.id, morning.id]);

    let booked_only = service
        .list_appointments(&ListAppointmentsParams {
            clinic_id: Some(clinic.clinic_id),
            doctor_id: None,
            patient_id: None,
            status: Some("booked".to_string()),
            date: None,
            limit: None,
            offset: None,
        })
        .await
        .unwrap();
    assert_eq!(booked_only.len(), 1);
    assert_eq!(booked_only[0].id, later.id);
}

#[tokio::test]
async fn slots_are_stable_and_mark_new_bookings() {
    let clinic = ClinicFixture::new().await;
    let service = &clinic.state.appointments;
    let day = common::wednesday();

    let before = service.available_slots(clinic.doctor_id, day).await.unwrap();
    assert_eq!(before.len(), 15);
    assert_eq!(service.available_slots(clinic.doctor_id, day).await.unwrap(), before);
    assert!(before.iter().all(|s| !s.is_booked));

    let booked = service.create_appointment(clinic.booking("09:36")).await.unwrap().appointment;
    let after = service.available_slots(clinic.doctor_id, day).await.unwrap();

    for (old, new) in before.iter().zip(after.iter()) {
        if new.start_time == at(9, 36) {
            assert!(new.is_booked);
            assert_eq!(new.appointment_id, Some(booked.id));
        } else {
            assert_eq!(old, new);
        }
    }

    let thursday = NaiveDate::from_ymd_opt(2024, 1, 11).unwrap();
    assert!(service.available_slots(clinic.doctor_id, thursday).await.unwrap().is_empty());
}

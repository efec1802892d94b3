use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::services::availability::AvailabilityService;
use shared_database::supabase::SupabaseClient;
use shared_utils::test_utils::{MockStoreResponses, TestConfig};

const TOKEN: &str = "test-token";

fn monday() -> NaiveDate {
    // 2025-06-02 is a Monday.
    NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
}

async fn service_against(server: &MockServer) -> AvailabilityService {
    let config = TestConfig::with_base_url(&server.uri()).to_app_config();
    AvailabilityService::new(Arc::new(SupabaseClient::new(&config)))
}

async fn mount_doctor(server: &MockServer, doctor_id: Uuid, user_id: Uuid, schedule: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("id", format!("eq.{}", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::doctor_response(
                &doctor_id.to_string(),
                &user_id.to_string(),
                100.0,
                schedule,
            )
        ])))
        .mount(server)
        .await;
}

async fn mount_day_bookings(server: &MockServer, bookings: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(bookings))
        .mount(server)
        .await;
}

#[tokio::test]
async fn open_slot_within_schedule_is_available() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    mount_doctor(
        &server,
        doctor_id,
        Uuid::new_v4(),
        MockStoreResponses::weekday_schedule("Monday", "09:00", "17:00"),
    )
    .await;
    mount_day_bookings(&server, json!([])).await;

    let service = service_against(&server).await;
    assert!(
        service
            .is_slot_available(doctor_id, monday(), "10:00", "10:30", TOKEN)
            .await
    );
}

#[tokio::test]
async fn overlapping_booking_blocks_the_slot() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    mount_doctor(
        &server,
        doctor_id,
        Uuid::new_v4(),
        MockStoreResponses::weekday_schedule("Monday", "09:00", "17:00"),
    )
    .await;
    mount_day_bookings(
        &server,
        json!([{ "start_time": "10:00", "end_time": "10:30" }]),
    )
    .await;

    let service = service_against(&server).await;
    assert!(
        !service
            .is_slot_available(doctor_id, monday(), "10:15", "10:45", TOKEN)
            .await
    );
}

#[tokio::test]
async fn back_to_back_booking_is_allowed() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    mount_doctor(
        &server,
        doctor_id,
        Uuid::new_v4(),
        MockStoreResponses::weekday_schedule("Monday", "09:00", "17:00"),
    )
    .await;
    mount_day_bookings(
        &server,
        json!([{ "start_time": "10:00", "end_time": "10:30" }]),
    )
    .await;

    let service = service_against(&server).await;
    assert!(
        service
            .is_slot_available(doctor_id, monday(), "10:30", "11:00", TOKEN)
            .await
    );
}

#[tokio::test]
async fn slot_outside_working_hours_is_unavailable() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    mount_doctor(
        &server,
        doctor_id,
        Uuid::new_v4(),
        MockStoreResponses::weekday_schedule("Monday", "09:00", "17:00"),
    )
    .await;
    mount_day_bookings(&server, json!([])).await;

    let service = service_against(&server).await;
    assert!(
        !service
            .is_slot_available(doctor_id, monday(), "08:00", "08:30", TOKEN)
            .await
    );
    assert!(
        !service
            .is_slot_available(doctor_id, monday(), "16:45", "17:15", TOKEN)
            .await
    );
}

#[tokio::test]
async fn day_off_is_unavailable() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    // Only works Tuesdays; the request is for a Monday.
    mount_doctor(
        &server,
        doctor_id,
        Uuid::new_v4(),
        MockStoreResponses::weekday_schedule("Tuesday", "09:00", "17:00"),
    )
    .await;

    let service = service_against(&server).await;
    assert!(
        !service
            .is_slot_available(doctor_id, monday(), "10:00", "10:30", TOKEN)
            .await
    );
}

#[tokio::test]
async fn unknown_doctor_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let service = service_against(&server).await;
    assert!(
        !service
            .is_slot_available(Uuid::new_v4(), monday(), "10:00", "10:30", TOKEN)
            .await
    );
}

#[tokio::test]
async fn storage_failure_reads_as_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let service = service_against(&server).await;
    assert!(
        !service
            .is_slot_available(Uuid::new_v4(), monday(), "10:00", "10:30", TOKEN)
            .await
    );
}

#[tokio::test]
async fn malformed_times_are_unavailable() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    mount_doctor(
        &server,
        doctor_id,
        Uuid::new_v4(),
        MockStoreResponses::weekday_schedule("Monday", "09:00", "17:00"),
    )
    .await;

    let service = service_against(&server).await;
    assert!(
        !service
            .is_slot_available(doctor_id, monday(), "25:00", "26:00", TOKEN)
            .await
    );
    assert!(
        !service
            .is_slot_available(doctor_id, monday(), "10:30", "10:00", TOKEN)
            .await
    );
}

#[tokio::test]
async fn lists_open_slots_minus_bookings() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    mount_doctor(
        &server,
        doctor_id,
        Uuid::new_v4(),
        MockStoreResponses::weekday_schedule("Monday", "09:00", "11:00"),
    )
    .await;
    mount_day_bookings(
        &server,
        json!([{ "start_time": "09:30", "end_time": "10:00" }]),
    )
    .await;

    let service = service_against(&server).await;
    let slots = service
        .list_available_slots(doctor_id, monday(), "09:00", "11:00", TOKEN)
        .await
        .unwrap();

    let starts: Vec<&str> = slots.iter().map(|s| s.start.as_str()).collect();
    assert_eq!(starts, vec!["09:00", "10:00", "10:30"]);
    assert_eq!(slots[0].end, "09:30");
    assert_eq!(slots[0].display_start, "9:00 AM");
    assert_eq!(slots[0].duration_minutes, 30);
}

#[tokio::test]
async fn final_slot_is_clamped_to_closing_time() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    mount_doctor(
        &server,
        doctor_id,
        Uuid::new_v4(),
        MockStoreResponses::weekday_schedule("Monday", "09:00", "09:45"),
    )
    .await;
    mount_day_bookings(&server, json!([])).await;

    let service = service_against(&server).await;
    let slots = service
        .list_available_slots(doctor_id, monday(), "09:00", "09:45", TOKEN)
        .await
        .unwrap();

    assert_eq!(slots.len(), 2);
    assert_eq!(slots[1].start, "09:30");
    assert_eq!(slots[1].end, "09:45");
    assert_eq!(slots[1].duration_minutes, 15);
}

#[tokio::test]
async fn requested_window_is_clipped_to_open_hours() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    mount_doctor(
        &server,
        doctor_id,
        Uuid::new_v4(),
        MockStoreResponses::weekday_schedule("Monday", "09:00", "10:00"),
    )
    .await;
    mount_day_bookings(&server, json!([])).await;

    let service = service_against(&server).await;
    let slots = service
        .list_available_slots(doctor_id, monday(), "08:00", "12:00", TOKEN)
        .await
        .unwrap();

    let starts: Vec<&str> = slots.iter().map(|s| s.start.as_str()).collect();
    assert_eq!(starts, vec!["09:00", "09:30"]);
}

#[tokio::test]
async fn slot_listing_rejects_malformed_window() {
    let server = MockServer::start().await;
    let service = service_against(&server).await;

    assert!(service
        .list_available_slots(Uuid::new_v4(), monday(), "9:00", "12:00", TOKEN)
        .await
        .is_err());
    assert!(service
        .list_available_slots(Uuid::new_v4(), monday(), "12:00", "09:00", TOKEN)
        .await
        .is_err());
}

#[tokio::test]
async fn unknown_doctor_lists_no_slots() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let service = service_against(&server).await;
    let slots = service
        .list_available_slots(Uuid::new_v4(), monday(), "09:00", "12:00", TOKEN)
        .await
        .unwrap();
    assert!(slots.is_empty());
}

#[tokio::test]
async fn day_off_lists_no_slots() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    mount_doctor(
        &server,
        doctor_id,
        Uuid::new_v4(),
        MockStoreResponses::weekday_schedule("Saturday", "09:00", "12:00"),
    )
    .await;

    let service = service_against(&server).await;
    let slots = service
        .list_available_slots(doctor_id, monday(), "09:00", "12:00", TOKEN)
        .await
        .unwrap();
    assert!(slots.is_empty());
}

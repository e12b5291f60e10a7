mod common;

use common::{facility_with_capacity, gate, plate};
use parkade_facility::domain::sessions::{CheckInRequest, CheckOutRequest, LostTicketRequest};
use parkade_facility::domain::types::{Amount, SessionStatus, TicketId, TicketType};
use parkade_facility::FacilityError;
use pretty_assertions::assert_eq;

fn check_in(plate_raw: &str) -> CheckInRequest {
    CheckInRequest {
        plate: plate(plate_raw),
        vehicle_type_code: "CAR".to_string(),
        gate_id: gate("G1"),
        card_id: None,
    }
}

#[tokio::test]
async fn check_in_issues_daily_ticket_and_opens_gate() {
    let h = facility_with_capacity(10).await;
    let session = h.facility.sessions.check_in(check_in("51F-00001")).await.unwrap();

    assert_eq!(session.status, SessionStatus::Active);
    assert_eq!(session.ticket.ticket_type, TicketType::Daily);
    assert!(session.ticket.id.as_str().starts_with("G1-"));
    assert_eq!(h.gate.open_count(), 1);
}

#[tokio::test]
async fn duplicate_check_in_is_rejected() {
    let h = facility_with_capacity(10).await;
    h.facility.sessions.check_in(check_in("51F-00001")).await.unwrap();

    let err = h
        .facility
        .sessions
        .check_in(check_in("51F-00001"))
        .await
        .unwrap_err();
    assert!(matches!(err, FacilityError::DuplicateCheckIn { .. }));
    assert!(err.is_conflict());
}

#[tokio::test]
async fn capacity_exhaustion_rejects_the_overflow_vehicle() {
    let h = facility_with_capacity(2).await;
    h.facility.sessions.check_in(check_in("51F-00001")).await.unwrap();
    h.facility.sessions.check_in(check_in("51F-00002")).await.unwrap();

    let err = h
        .facility
        .sessions
        .check_in(check_in("51F-00003"))
        .await
        .unwrap_err();
    assert!(matches!(err, FacilityError::CapacityExhausted { .. }));
}

#[tokio::test]
async fn completed_session_frees_its_slot() {
    let h = facility_with_capacity(1).await;
    let session = h.facility.sessions.check_in(check_in("51F-00001")).await.unwrap();

    let session = h
        .facility
        .sessions
        .check_out(CheckOutRequest {
            plate: plate("51F-00001"),
            ticket_id: Some(session.ticket.id.clone()),
            card_id: None,
            gate_id: gate("G2"),
        })
        .await
        .unwrap();
    assert_eq!(session.status, SessionStatus::PendingPayment);

    // Still pending payment, so the slot is still taken.
    let err = h
        .facility
        .sessions
        .check_in(check_in("51F-00002"))
        .await
        .unwrap_err();
    assert!(matches!(err, FacilityError::CapacityExhausted { .. }));
}

#[tokio::test]
async fn checkout_without_matching_ticket_is_rejected() {
    let h = facility_with_capacity(10).await;
    h.facility.sessions.check_in(check_in("51F-00001")).await.unwrap();

    let err = h
        .facility
        .sessions
        .check_out(CheckOutRequest {
            plate: plate("51F-00001"),
            ticket_id: None,
            card_id: None,
            gate_id: gate("G2"),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, FacilityError::TicketMismatch));
}

#[tokio::test]
async fn checkout_with_wrong_plate_is_rejected() {
    let h = facility_with_capacity(10).await;
    let session = h.facility.sessions.check_in(check_in("51F-00001")).await.unwrap();

    let err = h
        .facility
        .sessions
        .check_out(CheckOutRequest {
            plate: plate("51F-99999"),
            ticket_id: Some(session.ticket.id.clone()),
            card_id: None,
            gate_id: gate("G2"),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, FacilityError::PlateMismatch { .. }));
}

#[tokio::test]
async fn unknown_ticket_is_not_found() {
    let h = facility_with_capacity(10).await;
    let err = h
        .facility
        .sessions
        .check_out(CheckOutRequest {
            plate: plate("51F-00001"),
            ticket_id: Some(TicketId::new("G1-250101-0001-dead")),
            card_id: None,
            gate_id: gate("G2"),
        })
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn repeated_checkout_returns_the_same_fee() {
    let h = facility_with_capacity(10).await;
    let session = h.facility.sessions.check_in(check_in("51F-00001")).await.unwrap();

    let request = CheckOutRequest {
        plate: plate("51F-00001"),
        ticket_id: Some(session.ticket.id.clone()),
        card_id: None,
        gate_id: gate("G2"),
    };
    let first = h.facility.sessions.check_out(request.clone()).await.unwrap();
    let second = h.facility.sessions.check_out(request).await.unwrap();

    assert_eq!(first.fee_amount, second.fee_amount);
    assert_eq!(first.exit_time, second.exit_time);
}

#[tokio::test]
async fn lost_ticket_adds_the_penalty_and_raises_pending_payment() {
    let h = facility_with_capacity(10).await;
    h.facility.sessions.check_in(check_in("51F-00001")).await.unwrap();

    let session = h
        .facility
        .sessions
        .lost_ticket(LostTicketRequest {
            plate: plate("51F-00001"),
            vehicle_type_code: None,
            gate_id: gate("G2"),
            reported_by: "attendant-7".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(session.status, SessionStatus::PendingPayment);
    let base = session.base_fee.unwrap();
    let penalty = session.lost_ticket_fee.unwrap();
    assert_eq!(session.fee_amount, base.add(penalty));
    assert_eq!(penalty, Amount::from_i64(200_000));
    assert!(base.is_positive());
}

#[tokio::test]
async fn lost_ticket_can_correct_the_vehicle_type() {
    let h = facility_with_capacity(10).await;
    h.facility.sessions.check_in(check_in("51F-00001")).await.unwrap();

    let session = h
        .facility
        .sessions
        .lost_ticket(LostTicketRequest {
            plate: plate("51F-00001"),
            vehicle_type_code: Some("MOTORBIKE".to_string()),
            gate_id: gate("G2"),
            reported_by: "attendant-7".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(session.vehicle.category.code(), "MOTORBIKE");
}

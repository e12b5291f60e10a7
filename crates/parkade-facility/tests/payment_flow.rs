mod common;

use common::{facility_with, facility_with_capacity, gate, plate, DecliningGateway, FailingGateway};
use parkade_facility::domain::sessions::{CheckInRequest, CheckOutRequest, ParkingSession};
use parkade_facility::domain::types::{
    Amount, PaymentMethod, PaymentStatus, SessionId, SessionStatus,
};
use parkade_facility::FacilityError;
use pretty_assertions::assert_eq;
use std::sync::Arc;

async fn pending_session(h: &common::Harness, plate_raw: &str) -> ParkingSession {
    let session = h
        .facility
        .sessions
        .check_in(CheckInRequest {
            plate: plate(plate_raw),
            vehicle_type_code: "CAR".to_string(),
            gate_id: gate("G1"),
            card_id: None,
        })
        .await
        .unwrap();
    h.facility
        .sessions
        .check_out(CheckOutRequest {
            plate: plate(plate_raw),
            ticket_id: Some(session.ticket.id.clone()),
            card_id: None,
            gate_id: gate("G2"),
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn cash_methods_are_rejected() {
    let h = facility_with_capacity(10).await;
    let session = pending_session(&h, "51F-00001").await;

    for method in [PaymentMethod::Cash, PaymentMethod::CashQr] {
        let err = h.facility.payments.settle(session.id, method).await.unwrap_err();
        assert!(matches!(err, FacilityError::MethodNotAllowed { .. }));
    }
}

#[tokio::test]
async fn settle_then_confirm_completes_the_session_once() {
    let h = facility_with_capacity(10).await;
    let session = pending_session(&h, "51F-00001").await;
    let opens_before_settlement = h.gate.open_count();

    let outcome = h
        .facility
        .payments
        .settle(session.id, PaymentMethod::OnlineQr)
        .await
        .unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.status, PaymentStatus::PendingExternal);
    let code = outcome.transaction_code.unwrap();
    assert!(outcome.qr_content.is_some());

    // The session stays open until the callback lands.
    let stored = h.facility.repos.sessions.get(&session.id).await.unwrap().unwrap();
    assert_eq!(stored.status, SessionStatus::PendingPayment);
    assert_eq!(h.gate.open_count(), opens_before_settlement);

    let confirmed = h
        .facility
        .payments
        .confirm(session.id, &code, true, None, Some(gate("G2")))
        .await
        .unwrap();
    assert_eq!(confirmed.status, SessionStatus::Completed);
    assert_eq!(h.gate.open_count(), opens_before_settlement + 1);

    // A retried callback is a no-op: no second gate open.
    let again = h
        .facility
        .payments
        .confirm(session.id, &code, true, None, Some(gate("G2")))
        .await
        .unwrap();
    assert_eq!(again.status, SessionStatus::Completed);
    assert_eq!(h.gate.open_count(), opens_before_settlement + 1);
}

#[tokio::test]
async fn confirm_with_wrong_code_is_rejected() {
    let h = facility_with_capacity(10).await;
    let session = pending_session(&h, "51F-00001").await;
    h.facility
        .payments
        .settle(session.id, PaymentMethod::OnlineQr)
        .await
        .unwrap();

    let err = h
        .facility
        .payments
        .confirm(session.id, "SIM-FORGED00", true, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, FacilityError::TransactionMismatch));
}

#[tokio::test]
async fn failed_callback_keeps_the_session_payable() {
    let h = facility_with_capacity(10).await;
    let session = pending_session(&h, "51F-00001").await;
    let outcome = h
        .facility
        .payments
        .settle(session.id, PaymentMethod::OnlineQr)
        .await
        .unwrap();
    let code = outcome.transaction_code.unwrap();

    let after = h
        .facility
        .payments
        .confirm(session.id, &code, false, Some("insufficient funds".into()), None)
        .await
        .unwrap();
    assert_eq!(after.status, SessionStatus::PendingPayment);
    assert_eq!(after.payment.unwrap().status, PaymentStatus::Failed);
}

#[tokio::test]
async fn gateway_errors_exhaust_retries_and_leave_the_session_payable() {
    let h = facility_with(10, Arc::new(FailingGateway)).await;
    let session = pending_session(&h, "51F-00001").await;

    let outcome = h
        .facility
        .payments
        .settle(session.id, PaymentMethod::OnlineQr)
        .await
        .unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.status, PaymentStatus::Failed);
    assert_eq!(outcome.attempts, 3);
    assert!(outcome.error.is_some());

    let stored = h.facility.repos.sessions.get(&session.id).await.unwrap().unwrap();
    assert_eq!(stored.status, SessionStatus::PendingPayment);
}

#[tokio::test]
async fn declined_requests_are_retried_up_to_the_limit() {
    let h = facility_with(10, Arc::new(DecliningGateway)).await;
    let session = pending_session(&h, "51F-00001").await;

    let outcome = h
        .facility
        .payments
        .settle(session.id, PaymentMethod::OnlineQr)
        .await
        .unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.attempts, 3);
}

#[tokio::test]
async fn zero_fee_settles_locally_without_the_gateway() {
    // The gateway would error if contacted.
    let h = facility_with(10, Arc::new(FailingGateway)).await;
    let mut session = pending_session(&h, "51F-00001").await;
    session.fee_amount = Amount::zero();
    h.facility.repos.sessions.update(&session).await.unwrap();
    let opens_before = h.gate.open_count();

    let outcome = h
        .facility
        .payments
        .settle(session.id, PaymentMethod::OnlineQr)
        .await
        .unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.status, PaymentStatus::Completed);
    assert_eq!(outcome.attempts, 0);

    let stored = h.facility.repos.sessions.get(&session.id).await.unwrap().unwrap();
    assert_eq!(stored.status, SessionStatus::Completed);
    assert_eq!(h.gate.open_count(), opens_before + 1);
}

#[tokio::test]
async fn settling_an_active_session_is_rejected() {
    let h = facility_with_capacity(10).await;
    let session = h
        .facility
        .sessions
        .check_in(CheckInRequest {
            plate: plate("51F-00001"),
            vehicle_type_code: "CAR".to_string(),
            gate_id: gate("G1"),
            card_id: None,
        })
        .await
        .unwrap();

    let err = h
        .facility
        .payments
        .settle(session.id, PaymentMethod::OnlineQr)
        .await
        .unwrap_err();
    assert!(matches!(err, FacilityError::NotPayable { .. }));
}

#[tokio::test]
async fn settling_a_completed_session_is_already_settled() {
    let h = facility_with_capacity(10).await;
    let session = pending_session(&h, "51F-00001").await;
    let outcome = h
        .facility
        .payments
        .settle(session.id, PaymentMethod::OnlineQr)
        .await
        .unwrap();
    h.facility
        .payments
        .confirm(session.id, &outcome.transaction_code.unwrap(), true, None, None)
        .await
        .unwrap();

    let err = h
        .facility
        .payments
        .settle(session.id, PaymentMethod::OnlineQr)
        .await
        .unwrap_err();
    assert!(matches!(err, FacilityError::AlreadySettled { .. }));
}

#[tokio::test]
async fn cancel_aborts_the_attempt_but_not_the_checkout() {
    let h = facility_with_capacity(10).await;
    let session = pending_session(&h, "51F-00001").await;
    h.facility
        .payments
        .settle(session.id, PaymentMethod::OnlineQr)
        .await
        .unwrap();

    let after = h
        .facility
        .payments
        .cancel(session.id, "customer walked away")
        .await
        .unwrap();
    assert_eq!(after.status, SessionStatus::PendingPayment);
    assert_eq!(after.payment.unwrap().status, PaymentStatus::Cancelled);
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let h = facility_with_capacity(10).await;
    let err = h
        .facility
        .payments
        .settle(SessionId::new(), PaymentMethod::OnlineQr)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

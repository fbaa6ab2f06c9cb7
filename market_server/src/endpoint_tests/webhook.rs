use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use market_common::Money;
use market_engine::{
    db_types::{OrderStatusType, PaymentStatusType, SettlementOutcomeType},
    test_utils::FakeGateway,
    traits::{MarketplaceError, SettlementFault, SettlementOutcome},
};
use serde_json::json;

use super::{
    helpers::{flow_api, sample_order, server_options, webhook_request},
    mocks::MockMarketDb,
};
use crate::{config::ServerOptions, routes::PaymentWebhookRoute};

fn webhook_route(db: MockMarketDb, gateway: FakeGateway) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        cfg.app_data(flow_api(db, gateway))
            .app_data(server_options())
            .service(PaymentWebhookRoute::<MockMarketDb, FakeGateway>::new());
    }
}

fn delivery(payload: &[u8], signature: Option<String>) -> TestRequest {
    let req = TestRequest::post().uri("/webhook/payments").set_payload(payload.to_vec());
    match signature {
        Some(sig) => req.insert_header(("Stripe-Signature", sig)),
        None => req,
    }
}

#[actix_web::test]
async fn unsigned_deliveries_are_rejected() {
    // No expectations: nothing may reach the database
    let payload = FakeGateway::succeeded_payload("pi_test_7_1", Money::from(2000));
    let route = webhook_route(MockMarketDb::new(), FakeGateway::new());
    let (status, body) = webhook_request(delivery(&payload, None), route).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "InvalidSignature");
}

#[actix_web::test]
async fn forged_deliveries_are_rejected() {
    let gateway = FakeGateway::new();
    let payload = FakeGateway::succeeded_payload("pi_test_7_1", Money::from(2000));
    let signature = gateway.sign(&payload);
    // Same signature, different amount
    let tampered = FakeGateway::succeeded_payload("pi_test_7_1", Money::from(1));
    let req = delivery(&tampered, Some(signature));
    let (status, body) = webhook_request(req, webhook_route(MockMarketDb::new(), gateway)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "InvalidSignature");

    let req = delivery(&payload, Some("t=0,v1=deadbeef".to_string()));
    let (status, _) = webhook_request(req, webhook_route(MockMarketDb::new(), FakeGateway::new())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn first_delivery_settles_the_order() {
    let mut db = MockMarketDb::new();
    db.expect_settle_payment_success()
        .withf(|r, amount, currency| r == "pi_test_7_1" && *amount == Money::from(2000) && *currency == Some("usd"))
        .times(1)
        .returning(|_, _, _| {
            Ok(SettlementOutcome::Settled(sample_order(7, OrderStatusType::Processing, PaymentStatusType::Paid)))
        });
    let gateway = FakeGateway::new();
    let payload = FakeGateway::succeeded_payload("pi_test_7_1", Money::from(2000));
    let req = delivery(&payload, Some(gateway.sign(&payload)));
    let (status, body) = webhook_request(req, webhook_route(db, gateway)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["outcome"], "settled");
}

#[actix_web::test]
async fn redeliveries_are_acknowledged() {
    let mut db = MockMarketDb::new();
    db.expect_settle_payment_success().times(1).returning(|r, _, _| {
        let reference = r.to_string();
        Ok(SettlementOutcome::Duplicate { reference, order_id: 7, payment_status: PaymentStatusType::Paid })
    });
    let gateway = FakeGateway::new();
    let payload = FakeGateway::succeeded_payload("pi_test_7_1", Money::from(2000));
    let req = delivery(&payload, Some(gateway.sign(&payload)));
    let (status, body) = webhook_request(req, webhook_route(db, gateway)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "duplicate");
}

#[actix_web::test]
async fn faults_are_acknowledged_so_the_gateway_stops_retrying() {
    let mut db = MockMarketDb::new();
    db.expect_settle_payment_success().times(1).returning(|r, _, _| {
        Ok(SettlementOutcome::Fault(SettlementFault {
            journal_id: 4,
            reference: r.to_string(),
            order_id: Some(7),
            kind: SettlementOutcomeType::Overbooked,
            detail: "Product 1 has 1 available, but 2 were ordered".to_string(),
        }))
    });
    let gateway = FakeGateway::new();
    let payload = FakeGateway::succeeded_payload("pi_test_7_1", Money::from(2000));
    let req = delivery(&payload, Some(gateway.sign(&payload)));
    let (status, body) = webhook_request(req, webhook_route(db, gateway)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "overbooked");
}

#[actix_web::test]
async fn failed_payments_are_settled() {
    let mut db = MockMarketDb::new();
    db.expect_settle_payment_failure()
        .withf(|r, reason| r == "pi_test_7_1" && reason == "Insufficient funds")
        .times(1)
        .returning(|_, reason| {
            let mut order = sample_order(7, OrderStatusType::Pending, PaymentStatusType::Failed).order;
            order.version = 2;
            Ok(SettlementOutcome::PaymentFailed { order, reason: reason.to_string() })
        });
    let gateway = FakeGateway::new();
    let payload = FakeGateway::failed_payload("pi_test_7_1", "Insufficient funds");
    let req = delivery(&payload, Some(gateway.sign(&payload)));
    let (status, body) = webhook_request(req, webhook_route(db, gateway)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "payment_failed");
}

#[actix_web::test]
async fn unknown_event_kinds_are_ignored() {
    let gateway = FakeGateway::new();
    let payload = json!({"type": "charge.refund.updated", "data": {"object": {"id": "re_1"}}}).to_string().into_bytes();
    let req = delivery(&payload, Some(gateway.sign(&payload)));
    let (status, body) = webhook_request(req, webhook_route(MockMarketDb::new(), gateway)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "ignored");
}

#[actix_web::test]
async fn database_outages_ask_for_a_redelivery() {
    let mut db = MockMarketDb::new();
    db.expect_settle_payment_success()
        .returning(|_, _, _| Err(MarketplaceError::DatabaseError("database is locked".into())));
    let gateway = FakeGateway::new();
    let payload = FakeGateway::succeeded_payload("pi_test_7_1", Money::from(2000));
    let req = delivery(&payload, Some(gateway.sign(&payload)));
    let (status, body) = webhook_request(req, webhook_route(db, gateway)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "InternalError");
}

#[actix_web::test]
async fn the_signature_header_is_configurable() {
    let mut db = MockMarketDb::new();
    db.expect_settle_payment_success().times(1).returning(|r, _, _| {
        let reference = r.to_string();
        Ok(SettlementOutcome::Duplicate { reference, order_id: 7, payment_status: PaymentStatusType::Paid })
    });
    let gateway = FakeGateway::new();
    let payload = FakeGateway::succeeded_payload("pi_test_7_1", Money::from(2000));
    let req = TestRequest::post()
        .uri("/webhook/payments")
        .insert_header(("X-Payments-Signature", gateway.sign(&payload)))
        .set_payload(payload);
    let options = web::Data::new(ServerOptions { signature_header: "X-Payments-Signature".to_string() });
    let (status, _) = webhook_request(req, move |cfg| {
        cfg.app_data(flow_api(db, gateway))
            .app_data(options)
            .service(PaymentWebhookRoute::<MockMarketDb, FakeGateway>::new());
    })
    .await;
    assert_eq!(status, StatusCode::OK);
}

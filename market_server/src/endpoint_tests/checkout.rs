use actix_web::{http::StatusCode, test::TestRequest, web::ServiceConfig};
use market_common::Money;
use market_engine::{
    db_types::{OrderStatusType, PaymentStatusType},
    test_utils::FakeGateway,
};
use serde_json::{json, Value};

use super::{
    helpers::{api_request, bearer, flow_api, issue_token, product, sample_order, BUYER, SELLER},
    mocks::MockMarketDb,
};
use crate::{
    auth::Role,
    routes::{CheckoutRoute, PaymentIntentRoute},
};

fn checkout_routes(db: MockMarketDb, gateway: FakeGateway) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        cfg.app_data(flow_api(db, gateway))
            .service(CheckoutRoute::<MockMarketDb, FakeGateway>::new())
            .service(PaymentIntentRoute::<MockMarketDb, FakeGateway>::new());
    }
}

fn checkout_body(quantity: i64) -> Value {
    json!({
        "seller_id": SELLER,
        "items": [{"product_id": 1, "quantity": quantity}],
        "shipping": {"address": "1 Orchard Lane", "contact_name": "Ada", "contact_phone": "555-0100"}
    })
}

fn buyer_checkout(body: Value) -> TestRequest {
    TestRequest::post().uri("/api/checkout").insert_header(bearer(&issue_token(BUYER, &[Role::Buyer]))).set_json(body)
}

/// A catalog with product 1 at $10.00 and `available` units in stock, that stores whatever order it is given as #7.
fn catalog_db(available: i64) -> MockMarketDb {
    let mut db = MockMarketDb::new();
    db.expect_fetch_product().returning(move |id| Ok((id == 1).then(|| product(1, 1000, available))));
    db
}

#[actix_web::test]
async fn checkout_creates_a_pending_order() {
    let mut db = catalog_db(10);
    db.expect_insert_order()
        .withf(|o| {
            o.buyer_id == BUYER &&
                o.total_amount == Money::from(2000) &&
                o.items.len() == 1 &&
                o.items[0].unit_price == Money::from(1000) &&
                o.items[0].name == "Crate of apples #1"
        })
        .times(1)
        .returning(|_| {
            let mut order = sample_order(7, OrderStatusType::Pending, PaymentStatusType::Pending);
            order.order.payment_reference = None;
            Ok(order)
        });
    db.expect_attach_payment_reference().withf(|id, r| *id == 7 && r == "pi_test_7_1").times(1).returning(|id, r| {
        let mut order = sample_order(id, OrderStatusType::Pending, PaymentStatusType::Pending).order;
        order.payment_reference = Some(r.to_string());
        Ok(order)
    });
    let gateway = FakeGateway::new();
    let (status, body) = api_request(buyer_checkout(checkout_body(2)), checkout_routes(db, gateway.clone())).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["order_id"], 7);
    assert_eq!(body["order_number"], "ORD-20240612-0007");
    assert!(body["payment_token"].as_str().unwrap().starts_with("pi_test_7_1_secret_"));
    let requests = gateway.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].0, Money::from(2000));
    assert_eq!(requests[0].2.seller_id, SELLER);
}

#[actix_web::test]
async fn empty_checkouts_are_rejected() {
    let body = json!({
        "seller_id": SELLER,
        "items": [],
        "shipping": {"address": "1 Orchard Lane", "contact_name": "Ada", "contact_phone": "555-0100"}
    });
    let routes = checkout_routes(MockMarketDb::new(), FakeGateway::new());
    let (status, body) = api_request(buyer_checkout(body), routes).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "ValidationError");
}

#[actix_web::test]
async fn malformed_bodies_are_validation_errors() {
    let body = json!({"seller_id": SELLER, "items": "two apples please"});
    let routes = checkout_routes(MockMarketDb::new(), FakeGateway::new());
    let (status, body) = api_request(buyer_checkout(body), routes).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "ValidationError");
}

#[actix_web::test]
async fn out_of_stock_creates_nothing() {
    // No insert_order expectation: creating the order would panic the mock
    let db = catalog_db(1);
    let (status, body) = api_request(buyer_checkout(checkout_body(2)), checkout_routes(db, FakeGateway::new())).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "OutOfStock");
    assert_eq!(body["error"], "Product 1 is out of stock. 2 requested, but only 1 available");
}

#[actix_web::test]
async fn gateway_outages_leave_the_order_pending() {
    let mut db = catalog_db(10);
    db.expect_insert_order().times(1).returning(|_| {
        let mut order = sample_order(7, OrderStatusType::Pending, PaymentStatusType::Pending);
        order.order.payment_reference = None;
        Ok(order)
    });
    db.expect_attach_payment_reference().times(0);
    let gateway = FakeGateway::new();
    gateway.set_offline(true);
    let (status, body) = api_request(buyer_checkout(checkout_body(2)), checkout_routes(db, gateway)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "GatewayUnavailable");
}

#[actix_web::test]
async fn payment_intents_can_be_reissued() {
    let mut db = MockMarketDb::new();
    db.expect_fetch_order().returning(|id| {
        let mut order = sample_order(id, OrderStatusType::Pending, PaymentStatusType::Pending);
        order.order.payment_reference = None;
        Ok(Some(order))
    });
    db.expect_attach_payment_reference().times(1).returning(|id, r| {
        let mut order = sample_order(id, OrderStatusType::Pending, PaymentStatusType::Pending).order;
        order.payment_reference = Some(r.to_string());
        Ok(order)
    });
    let req = TestRequest::post()
        .uri("/api/orders/7/payment_intent")
        .insert_header(bearer(&issue_token(BUYER, &[Role::Buyer])));
    let (status, body) = api_request(req, checkout_routes(db, FakeGateway::new())).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["order_number"], "ORD-20240612-0007");
}

#[actix_web::test]
async fn orders_with_a_payment_reference_are_not_reissued() {
    let mut db = MockMarketDb::new();
    db.expect_fetch_order()
        .returning(|id| Ok(Some(sample_order(id, OrderStatusType::Pending, PaymentStatusType::Pending))));
    let req = TestRequest::post()
        .uri("/api/orders/7/payment_intent")
        .insert_header(bearer(&issue_token(BUYER, &[Role::Buyer])));
    let (status, body) = api_request(req, checkout_routes(db, FakeGateway::new())).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "PaymentAlreadyInitiated");
}

#[actix_web::test]
async fn sellers_cannot_check_out() {
    let req = TestRequest::post()
        .uri("/api/checkout")
        .insert_header(bearer(&issue_token(SELLER, &[Role::Seller])))
        .set_json(checkout_body(1));
    let (status, _) = api_request(req, checkout_routes(MockMarketDb::new(), FakeGateway::new())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

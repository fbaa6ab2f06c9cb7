use actix_web::{http::StatusCode, test::TestRequest};
use market_engine::{
    db_types::{OrderStatusType, PaymentStatusType},
    test_utils::FakeGateway,
};
use serde_json::json;

use super::{
    helpers::{api_request, bearer, expired_token, flow_api, issue_token, orders_api, sample_order, BUYER, SELLER},
    mocks::MockMarketDb,
};
use crate::{
    auth::{Role, TokenIssuer},
    config::AuthConfig,
    routes::{MyOrdersRoute, UpdateStatusRoute},
};

fn my_orders(db: MockMarketDb) -> impl FnOnce(&mut actix_web::web::ServiceConfig) {
    move |cfg| {
        cfg.app_data(orders_api(db)).service(MyOrdersRoute::<MockMarketDb>::new());
    }
}

#[actix_web::test]
async fn requests_without_a_token_are_rejected() {
    let req = TestRequest::get().uri("/api/orders");
    let (status, body) = api_request(req, my_orders(MockMarketDb::new())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "NotAuthenticated");
}

#[actix_web::test]
async fn tokens_must_use_the_bearer_scheme() {
    let token = issue_token(BUYER, &[Role::Buyer]);
    let req = TestRequest::get().uri("/api/orders").insert_header(("Authorization", format!("Token {token}")));
    let (status, body) = api_request(req, my_orders(MockMarketDb::new())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "NotAuthenticated");
}

#[actix_web::test]
async fn tokens_signed_with_another_secret_are_rejected() {
    let config = AuthConfig { jwt_secret: "some-other-secret-0123456789abcdef".to_string().into() };
    let token = TokenIssuer::new(&config).issue_token(BUYER, &[Role::Buyer], None).unwrap();
    let req = TestRequest::get().uri("/api/orders").insert_header(bearer(&token));
    let (status, _) = api_request(req, my_orders(MockMarketDb::new())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn expired_tokens_are_rejected() {
    let token = expired_token(BUYER, &[Role::Buyer]);
    let req = TestRequest::get().uri("/api/orders").insert_header(bearer(&token));
    let (status, body) = api_request(req, my_orders(MockMarketDb::new())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].as_str().unwrap().contains("expired"), "{body}");
}

#[actix_web::test]
async fn any_authenticated_user_can_list_their_orders() {
    let mut db = MockMarketDb::new();
    db.expect_search_orders().times(2).returning(|query| {
        let order = sample_order(7, OrderStatusType::Pending, PaymentStatusType::Pending).order;
        match query.buyer_id.as_deref() {
            Some(BUYER) => Ok(vec![order]),
            _ => Ok(vec![]),
        }
    });
    let token = issue_token(BUYER, &[]);
    let req = TestRequest::get().uri("/api/orders").insert_header(bearer(&token));
    let (status, body) = api_request(req, my_orders(db)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["as_buyer"][0]["order_number"], "ORD-20240612-0007");
    assert_eq!(body["as_seller"], json!([]));
}

#[actix_web::test]
async fn buyers_cannot_update_order_status() {
    // No expectations: the request must not reach the database
    let db = MockMarketDb::new();
    let token = issue_token(BUYER, &[Role::Buyer]);
    let req = TestRequest::patch()
        .uri("/api/orders/7/status")
        .insert_header(bearer(&token))
        .set_json(json!({"status": "canceled"}));
    let (status, body) = api_request(req, move |cfg| {
        cfg.app_data(flow_api(db, FakeGateway::new())).service(UpdateStatusRoute::<MockMarketDb, FakeGateway>::new());
    })
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "Forbidden");
}

#[actix_web::test]
async fn roles_are_alternatives() {
    let mut db = MockMarketDb::new();
    db.expect_fetch_order()
        .returning(|id| Ok(Some(sample_order(id, OrderStatusType::Processing, PaymentStatusType::Paid))));
    db.expect_apply_status_change().returning(|change| {
        let mut order = sample_order(change.order_id, change.new_status, PaymentStatusType::Paid);
        order.order.version = 2;
        Ok(order)
    });
    // A user acting as both buyer and seller still passes the seller-only check
    let token = issue_token(SELLER, &[Role::Buyer, Role::Seller]);
    let req = TestRequest::patch()
        .uri("/api/orders/7/status")
        .insert_header(bearer(&token))
        .set_json(json!({"status": "canceled"}));
    let (status, body) = api_request(req, move |cfg| {
        cfg.app_data(flow_api(db, FakeGateway::new())).service(UpdateStatusRoute::<MockMarketDb, FakeGateway>::new());
    })
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "canceled");
}

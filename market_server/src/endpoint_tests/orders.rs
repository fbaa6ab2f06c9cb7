use actix_web::{http::StatusCode, test::TestRequest, web::ServiceConfig};
use chrono::{TimeZone, Utc};
use market_engine::{
    db_types::{OrderNote, OrderStatusType, PaymentStatusType, SettlementOutcomeType, SettlementRecord},
    test_utils::FakeGateway,
    traits::MarketplaceError,
};
use serde_json::json;

use super::{
    helpers::{api_request, bearer, flow_api, issue_token, orders_api, sample_order, BUYER, SELLER},
    mocks::MockMarketDb,
};
use crate::{
    auth::Role,
    routes::{OrderByIdRoute, OrdersSearchRoute, ResolveFaultRoute, SettlementFaultsRoute, UpdateStatusRoute},
};

fn read_routes(db: MockMarketDb) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        cfg.app_data(orders_api(db))
            .service(OrderByIdRoute::<MockMarketDb>::new())
            .service(OrdersSearchRoute::<MockMarketDb>::new())
            .service(SettlementFaultsRoute::<MockMarketDb>::new())
            .service(ResolveFaultRoute::<MockMarketDb>::new());
    }
}

fn status_route(db: MockMarketDb) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        cfg.app_data(flow_api(db, FakeGateway::new())).service(UpdateStatusRoute::<MockMarketDb, FakeGateway>::new());
    }
}

fn db_with_order(status: OrderStatusType, payment_status: PaymentStatusType) -> MockMarketDb {
    let mut db = MockMarketDb::new();
    db.expect_fetch_order().returning(move |id| Ok(Some(sample_order(id, status, payment_status))));
    db
}

fn fault(id: i64) -> SettlementRecord {
    SettlementRecord {
        id,
        payment_reference: "pi_test_7_1".to_string(),
        order_id: Some(7),
        event_kind: "payment_intent.succeeded".to_string(),
        outcome: SettlementOutcomeType::Overbooked,
        detail: Some("Product 1 has 1 available, but 2 were ordered".to_string()),
        resolved: false,
        created_at: Utc.with_ymd_and_hms(2024, 6, 12, 10, 0, 0).unwrap(),
        resolved_at: None,
    }
}

//----------------------------------------------   Fetching orders  ----------------------------------------------------

#[actix_web::test]
async fn buyers_can_fetch_their_order() {
    let db = db_with_order(OrderStatusType::Pending, PaymentStatusType::Pending);
    let req = TestRequest::get().uri("/api/orders/7").insert_header(bearer(&issue_token(BUYER, &[Role::Buyer])));
    let (status, body) = api_request(req, read_routes(db)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order_number"], "ORD-20240612-0007");
    assert_eq!(body["status"], "pending");
    assert_eq!(body["total_amount"], 2000);
    assert_eq!(body["items"][0]["unit_price"], 1000);
    assert_eq!(body["items"][0]["subtotal"], 2000);
}

#[actix_web::test]
async fn sellers_can_fetch_orders_placed_with_them() {
    let db = db_with_order(OrderStatusType::Processing, PaymentStatusType::Paid);
    let req = TestRequest::get().uri("/api/orders/7").insert_header(bearer(&issue_token(SELLER, &[Role::Seller])));
    let (status, body) = api_request(req, read_routes(db)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["payment_status"], "paid");
}

#[actix_web::test]
async fn strangers_cannot_fetch_orders() {
    let db = db_with_order(OrderStatusType::Pending, PaymentStatusType::Pending);
    let req = TestRequest::get().uri("/api/orders/7").insert_header(bearer(&issue_token("mill-2", &[Role::Seller])));
    let (status, body) = api_request(req, read_routes(db)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "Forbidden");
}

#[actix_web::test]
async fn admins_can_fetch_any_order() {
    let db = db_with_order(OrderStatusType::Pending, PaymentStatusType::Pending);
    let req = TestRequest::get().uri("/api/orders/7").insert_header(bearer(&issue_token("ops-1", &[Role::Admin])));
    let (status, _) = api_request(req, read_routes(db)).await;
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn missing_orders_are_not_found() {
    let mut db = MockMarketDb::new();
    db.expect_fetch_order().returning(|_| Ok(None));
    let req = TestRequest::get().uri("/api/orders/99").insert_header(bearer(&issue_token(BUYER, &[Role::Buyer])));
    let (status, body) = api_request(req, read_routes(db)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NotFound");
}

#[actix_web::test]
async fn order_ids_must_be_numbers() {
    let req =
        TestRequest::get().uri("/api/orders/ORD-1").insert_header(bearer(&issue_token(BUYER, &[Role::Buyer])));
    let (status, body) = api_request(req, read_routes(MockMarketDb::new())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "ValidationError");
}

#[actix_web::test]
async fn database_failures_are_not_leaked() {
    let mut db = MockMarketDb::new();
    db.expect_fetch_order()
        .returning(|_| Err(MarketplaceError::DatabaseError("unable to open database file: /srv/db".into())));
    let req = TestRequest::get().uri("/api/orders/7").insert_header(bearer(&issue_token(BUYER, &[Role::Buyer])));
    let (status, body) = api_request(req, read_routes(db)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "InternalError");
    assert!(!body["error"].as_str().unwrap().contains("/srv/db"));
}

#[actix_web::test]
async fn admins_can_search_orders() {
    let mut db = MockMarketDb::new();
    db.expect_search_orders()
        .withf(|q| {
            q.seller_id.as_deref() == Some(SELLER) &&
                q.status == Some(vec![OrderStatusType::Pending, OrderStatusType::Processing])
        })
        .times(1)
        .returning(|_| Ok(vec![sample_order(7, OrderStatusType::Pending, PaymentStatusType::Pending).order]));
    let req = TestRequest::get()
        .uri("/api/search/orders?seller_id=farm-1&status=pending,processing")
        .insert_header(bearer(&issue_token("ops-1", &[Role::Admin])));
    let (status, body) = api_request(req, read_routes(db)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(|a| a.len()), Some(1));
}

#[actix_web::test]
async fn search_rejects_unknown_statuses() {
    let req = TestRequest::get()
        .uri("/api/search/orders?status=misplaced")
        .insert_header(bearer(&issue_token("ops-1", &[Role::Admin])));
    let (status, body) = api_request(req, read_routes(MockMarketDb::new())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "InvalidStatus");
}

//----------------------------------------------   Status updates  ----------------------------------------------------

#[actix_web::test]
async fn sellers_ship_orders() {
    let mut db = db_with_order(OrderStatusType::Processing, PaymentStatusType::Paid);
    db.expect_apply_status_change()
        .withf(|c| {
            c.expected_version == 1 &&
                c.new_status == OrderStatusType::Shipped &&
                c.estimated_delivery.is_some() &&
                c.note.as_ref().map(|n| n.author.as_str()) == Some(SELLER)
        })
        .times(1)
        .returning(|change| {
            let mut order = sample_order(change.order_id, change.new_status, PaymentStatusType::Paid);
            order.order.estimated_delivery = change.estimated_delivery;
            order.order.version = 2;
            order.notes.push(OrderNote {
                id: 1,
                order_id: change.order_id,
                author: SELLER.to_string(),
                note: "Left the farm this morning".to_string(),
                created_at: Utc::now(),
            });
            Ok(order)
        });
    let req = TestRequest::patch()
        .uri("/api/orders/7/status")
        .insert_header(bearer(&issue_token(SELLER, &[Role::Seller])))
        .set_json(json!({
            "status": "shipped",
            "estimated_delivery": "2024-06-20T12:00:00Z",
            "notes": "Left the farm this morning"
        }));
    let (status, body) = api_request(req, status_route(db)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "shipped");
    assert_eq!(body["payment_status"], "paid");
    assert_eq!(body["estimated_delivery"], "2024-06-20T12:00:00Z");
    assert_eq!(body["notes"][0]["note"], "Left the farm this morning");
    assert_eq!(body["changed"], true);
}

#[actix_web::test]
async fn unknown_statuses_never_reach_the_engine() {
    let req = TestRequest::patch()
        .uri("/api/orders/7/status")
        .insert_header(bearer(&issue_token(SELLER, &[Role::Seller])))
        .set_json(json!({"status": "teleported"}));
    let (status, body) = api_request(req, status_route(MockMarketDb::new())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "InvalidStatus");
    assert_eq!(body["error"], "teleported is not a valid order status");
}

#[actix_web::test]
async fn delivered_orders_cannot_go_back_to_shipped() {
    let db = db_with_order(OrderStatusType::Delivered, PaymentStatusType::Paid);
    let req = TestRequest::patch()
        .uri("/api/orders/7/status")
        .insert_header(bearer(&issue_token(SELLER, &[Role::Seller])))
        .set_json(json!({"status": "shipped", "estimated_delivery": "2024-06-20T12:00:00Z"}));
    let (status, body) = api_request(req, status_route(db)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "IllegalTransition");
    assert_eq!(body["error"], "An order cannot move from delivered to shipped");
}

#[actix_web::test]
async fn shipping_needs_an_estimate() {
    let db = db_with_order(OrderStatusType::Processing, PaymentStatusType::Paid);
    let req = TestRequest::patch()
        .uri("/api/orders/7/status")
        .insert_header(bearer(&issue_token(SELLER, &[Role::Seller])))
        .set_json(json!({"status": "shipped"}));
    let (status, body) = api_request(req, status_route(db)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MissingField");
    assert!(body["error"].as_str().unwrap().contains("estimated_delivery"));
}

#[actix_web::test]
async fn only_the_owning_seller_may_update() {
    let db = db_with_order(OrderStatusType::Processing, PaymentStatusType::Paid);
    let req = TestRequest::patch()
        .uri("/api/orders/7/status")
        .insert_header(bearer(&issue_token("mill-2", &[Role::Seller])))
        .set_json(json!({"status": "canceled"}));
    let (status, body) = api_request(req, status_route(db)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "Forbidden");
}

#[actix_web::test]
async fn concurrent_changes_are_conflicts() {
    let mut db = db_with_order(OrderStatusType::Pending, PaymentStatusType::Pending);
    db.expect_apply_status_change()
        .returning(|c| Err(MarketplaceError::VersionConflict { order_id: c.order_id, expected_version: 1 }));
    let req = TestRequest::patch()
        .uri("/api/orders/7/status")
        .insert_header(bearer(&issue_token(SELLER, &[Role::Seller])))
        .set_json(json!({"status": "canceled"}));
    let (status, body) = api_request(req, status_route(db)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "Conflict");
}

//----------------------------------------------   Settlement faults  ---------------------------------------------------

#[actix_web::test]
async fn only_admins_see_the_fault_queue() {
    let req = TestRequest::get()
        .uri("/api/settlement/faults")
        .insert_header(bearer(&issue_token(SELLER, &[Role::Seller, Role::Buyer])));
    let (status, _) = api_request(req, read_routes(MockMarketDb::new())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let mut db = MockMarketDb::new();
    db.expect_fetch_unresolved_faults().times(1).returning(|| Ok(vec![fault(3)]));
    let req =
        TestRequest::get().uri("/api/settlement/faults").insert_header(bearer(&issue_token("ops-1", &[Role::Admin])));
    let (status, body) = api_request(req, read_routes(db)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["outcome"], "overbooked");
    assert_eq!(body[0]["resolved"], false);
}

#[actix_web::test]
async fn admins_resolve_faults() {
    let mut db = MockMarketDb::new();
    db.expect_resolve_fault().withf(|id| *id == 3).times(1).returning(|id| {
        let mut record = fault(id);
        record.resolved = true;
        record.resolved_at = Some(Utc::now());
        Ok(record)
    });
    let req = TestRequest::post()
        .uri("/api/settlement/faults/3/resolve")
        .insert_header(bearer(&issue_token("ops-1", &[Role::Admin])));
    let (status, body) = api_request(req, read_routes(db)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resolved"], true);

    let mut db = MockMarketDb::new();
    db.expect_resolve_fault().returning(|id| Err(MarketplaceError::FaultNotFound(id)));
    let req = TestRequest::post()
        .uri("/api/settlement/faults/3/resolve")
        .insert_header(bearer(&issue_token("ops-1", &[Role::Admin])));
    let (status, body) = api_request(req, read_routes(db)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NotFound");
}

use std::time::Duration;

use actix_web::{
    body::MessageBody,
    dev::ServiceResponse,
    http::StatusCode,
    test,
    test::TestRequest,
    web,
    web::ServiceConfig,
    App,
    Error,
};
use chrono::{TimeZone, Utc};
use log::debug;
use market_common::{Money, Secret};
use market_engine::{
    db_types::{
        FullOrder,
        Order,
        OrderItem,
        OrderNumber,
        OrderStatusType,
        PaymentStatusType,
        Product,
        ShippingInfo,
    },
    events::EventProducers,
    test_utils::FakeGateway,
    OrderFlowApi,
    OrdersApi,
};
use serde_json::Value;

use super::mocks::MockMarketDb;
use crate::{
    auth::{JwtClaims, Role, TokenIssuer, TokenValidator},
    config::{AuthConfig, ServerOptions},
    middleware::JwtMiddlewareFactory,
    server::{json_config, path_config, query_config},
};

pub const BUYER: &str = "buyer-ada";
pub const SELLER: &str = "farm-1";

// A fixed secret for signing test tokens. DO NOT re-use it anywhere.
pub fn get_auth_config() -> AuthConfig {
    AuthConfig { jwt_secret: Secret::new("endpoint-tests-only-0123456789abcdef".to_string()) }
}

pub fn issue_token(sub: &str, roles: &[Role]) -> String {
    TokenIssuer::new(&get_auth_config()).issue_token(sub, roles, Some(Duration::from_secs(600))).unwrap()
}

pub fn expired_token(sub: &str, roles: &[Role]) -> String {
    let claims = JwtClaims { sub: sub.to_string(), roles: roles.to_vec(), exp: Utc::now().timestamp() - 600 };
    TokenIssuer::new(&get_auth_config()).sign(&claims).unwrap()
}

pub fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {token}"))
}

/// Sends `req` to an app with the routes from `configure` mounted under `/api`, behind the JWT middleware.
pub async fn api_request<F>(req: TestRequest, configure: F) -> (StatusCode, Value)
where F: FnOnce(&mut ServiceConfig) {
    let _ = env_logger::try_init();
    let validator = TokenValidator::new(&get_auth_config());
    let app = App::new()
        .app_data(json_config())
        .app_data(path_config())
        .app_data(query_config())
        .service(web::scope("/api").wrap(JwtMiddlewareFactory::new(validator)).configure(configure));
    let service = test::init_service(app).await;
    read_response(test::try_call_service(&service, req.to_request()).await).await
}

/// Sends `req` to an app with the routes from `configure` mounted under `/webhook`. No access token is involved.
pub async fn webhook_request<F>(req: TestRequest, configure: F) -> (StatusCode, Value)
where F: FnOnce(&mut ServiceConfig) {
    let _ = env_logger::try_init();
    let app = App::new().service(web::scope("/webhook").configure(configure));
    let service = test::init_service(app).await;
    read_response(test::try_call_service(&service, req.to_request()).await).await
}

// Errors raised by middleware come back as `Err`, handler errors as error responses. Tests only care about what the
// client would see.
async fn read_response<B: MessageBody>(res: Result<ServiceResponse<B>, Error>) -> (StatusCode, Value) {
    let (status, body) = match res {
        Ok(res) => {
            let status = res.status();
            (status, test::read_body(res).await)
        },
        Err(e) => {
            let res = e.error_response();
            (res.status(), res.into_body().try_into_bytes().unwrap_or_default())
        },
    };
    debug!("Response: {status} {}", String::from_utf8_lossy(&body));
    let json = serde_json::from_slice(&body).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into()));
    (status, json)
}

pub fn flow_api(db: MockMarketDb, gateway: FakeGateway) -> web::Data<OrderFlowApi<MockMarketDb, FakeGateway>> {
    web::Data::new(OrderFlowApi::new(db, gateway, EventProducers::default()))
}

pub fn orders_api(db: MockMarketDb) -> web::Data<OrdersApi<MockMarketDb>> {
    web::Data::new(OrdersApi::new(db))
}

pub fn server_options() -> web::Data<ServerOptions> {
    web::Data::new(ServerOptions::default())
}

//----------------------------------------------   Fixtures  ----------------------------------------------------

pub fn product(id: i64, price: i64, available: i64) -> Product {
    let t = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();
    Product {
        id,
        seller_id: SELLER.to_string(),
        name: format!("Crate of apples #{id}"),
        unit_price: Money::from(price),
        available_quantity: available,
        created_at: t,
        updated_at: t,
    }
}

/// Order #`id`: two units at $10.00 from [`SELLER`] to [`BUYER`].
pub fn sample_order(id: i64, status: OrderStatusType, payment_status: PaymentStatusType) -> FullOrder {
    let t = Utc.with_ymd_and_hms(2024, 6, 12, 9, 30, 0).unwrap();
    let order = Order {
        id,
        order_number: OrderNumber::new("20240612", id),
        buyer_id: BUYER.to_string(),
        seller_id: SELLER.to_string(),
        total_amount: Money::from(2000),
        currency: "usd".to_string(),
        status,
        payment_status,
        payment_reference: Some(format!("pi_test_{id}_1")),
        shipping: ShippingInfo::new("1 Orchard Lane", "Ada", "555-0100"),
        estimated_delivery: None,
        delivered_at: None,
        version: 1,
        created_at: t,
        updated_at: t,
    };
    let items = vec![OrderItem {
        id: 1,
        order_id: id,
        line_no: 1,
        product_id: 1,
        name: "Crate of apples #1".to_string(),
        unit_price: Money::from(1000),
        quantity: 2,
        subtotal: Money::from(2000),
    }];
    FullOrder { order, items, notes: vec![] }
}

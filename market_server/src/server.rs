use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use futures::future::FutureExt;
use log::*;
use market_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    HttpPaymentGateway,
    OrderFlowApi,
    OrdersApi,
    SqliteDatabase,
};

use crate::{
    auth::TokenValidator,
    config::{ServerConfig, ServerOptions},
    errors::ServerError,
    middleware::JwtMiddlewareFactory,
    routes::{
        health,
        CheckoutRoute,
        MyOrdersRoute,
        OrderByIdRoute,
        OrdersSearchRoute,
        PaymentIntentRoute,
        PaymentWebhookRoute,
        ResolveFaultRoute,
        SettlementFaultsRoute,
        SettlementHistoryRoute,
        UpdateStatusRoute,
    },
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, config.db_max_connections)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    if config.auto_migrate {
        db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    }
    let gateway =
        HttpPaymentGateway::new(config.gateway.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let handlers = EventHandlers::new(config.event_buffer_size, default_hooks());
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let srv = create_server_instance(config, db, gateway, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

/// Hooks that every deployment gets. Settlement faults are money the marketplace holds without having shipped
/// anything, so they are logged at error level for the alerting pipeline to pick up.
pub fn default_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks
        .on_settlement_fault(|ev| {
            async move {
                let fault = ev.fault;
                error!(
                    "📬️ Settlement fault #{} ({}) for payment {}. {}",
                    fault.journal_id, fault.kind, fault.reference, fault.detail
                );
            }
            .boxed()
        })
        .on_order_paid(|ev| {
            async move {
                let order = ev.order.order;
                info!("📬️ Order {} paid. {} can start preparing it.", order.order_number, order.seller_id);
            }
            .boxed()
        });
    hooks
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    gateway: HttpPaymentGateway,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let options = ServerOptions::from_config(&config);
    let validator = TokenValidator::new(&config.auth);
    let currency = config.currency.clone();
    let srv = HttpServer::new(move || {
        let flow_api = OrderFlowApi::new(db.clone(), gateway.clone(), producers.clone()).with_currency(&currency);
        let orders_api = OrdersApi::new(db.clone());
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("market::access_log"))
            .app_data(json_config())
            .app_data(path_config())
            .app_data(query_config())
            .app_data(web::Data::new(flow_api))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(options.clone()));
        // Routes that require authentication
        let auth_scope = web::scope("/api")
            .wrap(JwtMiddlewareFactory::new(validator.clone()))
            .service(CheckoutRoute::<SqliteDatabase, HttpPaymentGateway>::new())
            .service(PaymentIntentRoute::<SqliteDatabase, HttpPaymentGateway>::new())
            .service(UpdateStatusRoute::<SqliteDatabase, HttpPaymentGateway>::new())
            .service(MyOrdersRoute::<SqliteDatabase>::new())
            .service(OrderByIdRoute::<SqliteDatabase>::new())
            .service(OrdersSearchRoute::<SqliteDatabase>::new())
            .service(SettlementFaultsRoute::<SqliteDatabase>::new())
            .service(ResolveFaultRoute::<SqliteDatabase>::new())
            .service(SettlementHistoryRoute::<SqliteDatabase>::new());
        // Gateway deliveries authenticate with their signature, not a JWT
        let webhook_scope =
            web::scope("/webhook").service(PaymentWebhookRoute::<SqliteDatabase, HttpPaymentGateway>::new());
        app.service(health).service(auth_scope).service(webhook_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

//----------------------------------------------   Extractor config  ---------------------------------------------------
// Malformed bodies, paths and queries are reported in the same `{error, code}` shape as every other error.

pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| ServerError::InvalidRequestBody(err.to_string()).into())
}

pub fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|err, _req| ServerError::InvalidRequestPath(err.to_string()).into())
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| ServerError::InvalidRequestBody(err.to_string()).into())
}

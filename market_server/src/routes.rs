//! Request handlers for the marketplace API.
//!
//! Handlers stay thin: they pull the caller's identity out of the JWT claims, hand the request to the engine API and
//! map the result onto a response. Anything longer belongs in the engine.
//!
//! Routes under `/api` sit behind the JWT middleware. Role checks are attached per route with the `route!` macro.
//! The payment webhook lives under `/webhook` and is authenticated by the gateway's signature instead.
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use log::*;
use market_engine::{
    traits::OrderQueryFilter,
    MarketplaceDatabase,
    OrderFlowApi,
    OrderFlowError,
    OrdersApi,
    PaymentGateway,
};

use crate::{
    auth::{JwtClaims, Role},
    config::ServerOptions,
    data_objects::{CheckoutRequest, MyOrders, OrderSearchParams, StatusUpdateRequest, WebhookAck},
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro.
// Each bound gets its own type parameter, e.g. `impl MarketplaceDatabase, PaymentGateway` produces a route generic over
// `<TMarketplaceDatabase, TPaymentGateway>`.
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+ where requires [$($roles:expr),+]) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>)
                    .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Checkout  ----------------------------------------------------
route!(checkout => Post "/checkout" impl MarketplaceDatabase, PaymentGateway where requires [Role::Buyer]);
/// Route handler for the checkout endpoint.
///
/// The authenticated user is the buyer. The body names the seller, the items and the shipping details. On success the
/// order has been created (pending) and the response carries the payment token the buyer's client needs to complete
/// payment with the gateway.
///
/// If the gateway is unreachable, a 503 `GatewayUnavailable` is returned. The order has still been created, and the
/// buyer can request a new payment intent for it with `POST /api/orders/{id}/payment_intent`.
pub async fn checkout<B, G>(
    claims: JwtClaims,
    body: web::Json<CheckoutRequest>,
    api: web::Data<OrderFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
    G: PaymentGateway,
{
    let CheckoutRequest { seller_id, items, shipping } = body.into_inner();
    debug!("💻️ POST checkout for {} with {seller_id} ({} lines)", claims.sub, items.len());
    let result = api.create_order(&claims.sub, &seller_id, &items, shipping).await.map_err(|e| {
        debug!("💻️ Checkout for {} failed. {e}", claims.sub);
        e
    })?;
    Ok(HttpResponse::Created().json(result))
}

route!(payment_intent => Post "/orders/{order_id}/payment_intent" impl MarketplaceDatabase, PaymentGateway where requires [Role::Buyer]);
/// Requests a fresh payment intent for an order whose checkout could not reach the gateway.
pub async fn payment_intent<B, G>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<OrderFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
    G: PaymentGateway,
{
    let order_id = path.into_inner();
    debug!("💻️ POST payment_intent for order #{order_id} by {}", claims.sub);
    let result = api.reissue_payment_intent(order_id, &claims.sub).await?;
    Ok(HttpResponse::Ok().json(result))
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(my_orders => Get "/orders" impl MarketplaceDatabase);
/// The caller's orders, both those they placed and those placed with them.
pub async fn my_orders<B: MarketplaceDatabase>(
    claims: JwtClaims,
    api: web::Data<OrdersApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET my_orders for {}", claims.sub);
    let as_buyer = api.orders_for_buyer(&claims.sub).await?;
    let as_seller = api.orders_for_seller(&claims.sub).await?;
    Ok(HttpResponse::Ok().json(MyOrders { as_buyer, as_seller }))
}

route!(order_by_id => Get "/orders/{order_id}" impl MarketplaceDatabase);
/// Fetches a single order, with its line items and notes.
///
/// The buyer and the seller of the order can see it, as can admins. Anyone else gets a 403.
pub async fn order_by_id<B: MarketplaceDatabase>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<OrdersApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ GET order_by_id({order_id}) for {}", claims.sub);
    let order = api.fetch_order(order_id).await?.ok_or(OrderFlowError::OrderNotFound(order_id))?;
    let is_party = order.order.buyer_id == claims.sub || order.order.seller_id == claims.sub;
    if !is_party && !claims.has_role(Role::Admin) {
        return Err(OrderFlowError::Forbidden(format!("You are not a party to order {order_id}")).into());
    }
    Ok(HttpResponse::Ok().json(order))
}

route!(update_status => Patch "/orders/{order_id}/status" impl MarketplaceDatabase, PaymentGateway where requires [Role::Seller]);
/// Route handler for seller status updates.
///
/// The body is `{"status": "shipped", "estimated_delivery": "2024-06-20T00:00:00Z", "notes": "..."}`. Only `status` is
/// always required. Moving to `shipped` requires `estimated_delivery`.
pub async fn update_status<B, G>(
    claims: JwtClaims,
    path: web::Path<i64>,
    body: web::Json<StatusUpdateRequest>,
    api: web::Data<OrderFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
    G: PaymentGateway,
{
    let order_id = path.into_inner();
    let (status, extras) = body.into_inner().into_parts()?;
    debug!("💻️ PATCH status of order #{order_id} to {status} by {}", claims.sub);
    let update = api.update_order_status(order_id, &claims.sub, status, extras).await.map_err(|e| {
        debug!("💻️ Status update for order #{order_id} failed. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(update))
}

route!(orders_search => Get "/search/orders" impl MarketplaceDatabase where requires [Role::Admin]);
pub async fn orders_search<B: MarketplaceDatabase>(
    query: web::Query<OrderSearchParams>,
    api: web::Data<OrdersApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let filter = OrderQueryFilter::try_from(query.into_inner())?;
    debug!("💻️ GET orders search for [{filter:?}]");
    let orders = api.search_orders(filter).await?;
    Ok(HttpResponse::Ok().json(orders))
}

//----------------------------------------------   Settlement  ----------------------------------------------------
route!(settlement_faults => Get "/settlement/faults" impl MarketplaceDatabase where requires [Role::Admin]);
/// The operator queue: payment events that could not be applied and still need someone to act on them.
pub async fn settlement_faults<B: MarketplaceDatabase>(
    api: web::Data<OrdersApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET settlement faults");
    let faults = api.unresolved_faults().await?;
    Ok(HttpResponse::Ok().json(faults))
}

route!(resolve_fault => Post "/settlement/faults/{journal_id}/resolve" impl MarketplaceDatabase where requires [Role::Admin]);
pub async fn resolve_fault<B: MarketplaceDatabase>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<OrdersApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let journal_id = path.into_inner();
    info!("💻️ {} is resolving settlement fault #{journal_id}", claims.sub);
    let record = api.resolve_fault(journal_id).await?;
    Ok(HttpResponse::Ok().json(record))
}

route!(settlement_history => Get "/settlement/history/{reference}" impl MarketplaceDatabase where requires [Role::Admin]);
/// Every journaled delivery for a payment reference, oldest first.
pub async fn settlement_history<B: MarketplaceDatabase>(
    path: web::Path<String>,
    api: web::Data<OrdersApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let reference = path.into_inner();
    debug!("💻️ GET settlement history for {reference}");
    let records = api.settlement_history(&reference).await?;
    Ok(HttpResponse::Ok().json(records))
}

//----------------------------------------------   Webhook  ----------------------------------------------------
route!(payment_webhook => Post "/payments" impl MarketplaceDatabase, PaymentGateway);
/// Route handler for payment gateway webhook deliveries.
///
/// The raw body is verified against the signature header before anything else happens. A delivery that fails
/// verification gets a 400 and never reaches the order engine.
///
/// Verified events are settled, and the response is a 200 whatever the business outcome was (settled, duplicate,
/// fault...). The gateway only retries on non-2xx responses, and retrying a business decision would not change it.
/// Only infrastructure failures give a 500, so that the gateway redelivers later.
pub async fn payment_webhook<B, G>(
    req: HttpRequest,
    body: web::Bytes,
    api: web::Data<OrderFlowApi<B, G>>,
    options: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
    G: PaymentGateway,
{
    trace!("💻️ Received payment webhook ({} bytes)", body.len());
    let header = options.signature_header.as_str();
    let signature = req.headers().get(header).and_then(|v| v.to_str().ok()).ok_or_else(|| {
        warn!("💻️ Payment webhook is missing the {header} header. Ignoring it.");
        ServerError::InvalidSignature(format!("Missing {header} header"))
    })?;
    let event = api.gateway().verify_event(&body, signature).map_err(|e| {
        warn!("💻️ Payment webhook could not be verified. {e}");
        ServerError::InvalidSignature(e.to_string())
    })?;
    debug!("💻️ Verified {} event", event.kind());
    match api.settle_payment(event).await {
        Ok(outcome) => Ok(HttpResponse::Ok().json(WebhookAck::from(&outcome))),
        Err(e) => {
            error!("💻️ Could not settle payment event. The gateway will redeliver it. {e}");
            Err(ServerError::BackendError(e.to_string()))
        },
    }
}

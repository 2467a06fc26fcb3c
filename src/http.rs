//! HTTP API
//!
//! Thin axum layer over [`Services`]. Handlers validate the request shape,
//! call one service operation and map [`CommerceError`] onto a status code.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::error;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::domain::aggregates::{
    Address, Cart, CartError, Coupon, CouponError, InventoryError, Offer, Order, OrderError, OrderStatus, PaymentMethod, Product, Wallet, WalletError,
};
use crate::domain::pricing::Quote;
use crate::domain::reporting::{ReportPeriod, SalesReport};
use crate::domain::value_objects::OrderNumber;
use crate::services::{
    AddLine, CheckoutOutcome, CheckoutRequest, CouponPreview, CouponTerms, PaymentConfirmation, PaymentIntent, Services, StatusChange, VerifyOutcome,
};
use crate::CommerceError;

#[derive(Clone)]
pub struct AppState {
    pub services: Services,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "storefront"})) }))
        .route("/api/v1/customers/:customer_id/cart", get(get_cart))
        .route("/api/v1/customers/:customer_id/cart/lines", post(add_line))
        .route("/api/v1/customers/:customer_id/cart/lines/:line_id", put(update_line).delete(remove_line))
        .route("/api/v1/customers/:customer_id/addresses", get(list_addresses).put(save_addresses))
        .route("/api/v1/customers/:customer_id/coupon-preview", post(preview_coupon))
        .route("/api/v1/customers/:customer_id/checkout", post(checkout))
        .route("/api/v1/customers/:customer_id/orders", get(list_orders))
        .route("/api/v1/customers/:customer_id/orders/:order_number", get(get_order))
        .route("/api/v1/customers/:customer_id/orders/:order_number/retry-payment", post(retry_payment))
        .route("/api/v1/customers/:customer_id/items/:item_id/cancel", post(cancel_item))
        .route("/api/v1/customers/:customer_id/items/:item_id/return", post(request_return))
        .route("/api/v1/customers/:customer_id/wallet", get(get_wallet))
        .route("/api/v1/payments/verify", post(verify_payment))
        .route("/api/v1/payments/failure", post(payment_failure))
        .route("/api/v1/admin/items/:item_id/status", put(update_item_status))
        .route("/api/v1/admin/items/:item_id/approve-return", post(approve_return))
        .route("/api/v1/admin/orders/:order_number/settle-refunds", post(settle_refunds))
        .route("/api/v1/admin/coupons", get(list_coupons).post(create_coupon))
        .route("/api/v1/admin/coupons/:code", put(update_coupon).delete(delete_coupon))
        .route("/api/v1/admin/offers", post(save_offer))
        .route("/api/v1/admin/products/:product_id/reprice", post(reprice_product))
        .route("/api/v1/admin/reports/sales", get(sales_report))
        .with_state(state)
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug)]
pub enum ApiError {
    Commerce(CommerceError),
    Validation(ValidationErrors),
    BadRequest(String),
}

impl From<CommerceError> for ApiError {
    fn from(e: CommerceError) -> Self { Self::Commerce(e) }
}

impl From<ValidationErrors> for ApiError {
    fn from(e: ValidationErrors) -> Self { Self::Validation(e) }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

fn status_of(error: &CommerceError) -> StatusCode {
    use CommerceError as E;
    match error {
        E::OrderNotFound
        | E::PendingCheckoutNotFound(_)
        | E::Cart(CartError::LineNotFound(_))
        | E::Wallet(WalletError::NotFound)
        | E::Coupon(CouponError::NotFound)
        | E::Inventory(InventoryError::ProductNotFound(_) | InventoryError::VariantNotFound { .. } | InventoryError::SubvariantNotFound { .. }) => {
            StatusCode::NOT_FOUND
        }
        E::Cart(CartError::AlreadyInCart)
        | E::Inventory(InventoryError::OutOfStock { .. } | InventoryError::InsufficientStock { .. })
        | E::Order(OrderError::InvalidTransition { .. })
        | E::Coupon(CouponError::LimitReached | CouponError::AlreadyExists(_) | CouponError::LimitBelowUsage { .. })
        | E::PaymentNotRetryable => StatusCode::CONFLICT,
        E::InvalidSignature => StatusCode::BAD_REQUEST,
        E::CartEmpty
        | E::InvalidAddress(_)
        | E::Cart(_)
        | E::Inventory(_)
        | E::Order(_)
        | E::Coupon(_)
        | E::Wallet(_)
        | E::Money(_) => StatusCode::UNPROCESSABLE_ENTITY,
        E::Gateway(_) => StatusCode::BAD_GATEWAY,
        E::Contention | E::OrderNumberExhausted => StatusCode::SERVICE_UNAVAILABLE,
        E::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Commerce(e) => {
                let status = status_of(&e);
                if status.is_server_error() || status == StatusCode::BAD_GATEWAY {
                    error!(error = %e, "request failed");
                }
                let message = match e {
                    CommerceError::Storage(_) => "internal error".to_string(),
                    e => e.to_string(),
                };
                (status, message)
            }
            Self::Validation(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn order_number(value: &str) -> ApiResult<OrderNumber> {
    OrderNumber::parse(value).map_err(|e| ApiError::BadRequest(e.to_string()))
}

// =============================================================================
// Cart
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct AddLineRequest {
    pub product_id: Uuid,
    #[validate(length(min = 1, max = 64))]
    pub color: String,
    #[validate(length(min = 1, max = 16))]
    pub size: String,
    #[validate(range(min = 1, max = 100))]
    pub quantity: u32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateLineRequest {
    #[validate(range(min = 1, max = 100))]
    pub quantity: u32,
}

#[derive(Debug, Serialize)]
pub struct CartView {
    #[serde(flatten)]
    pub cart: Cart,
    pub quote: Quote,
}

impl TryFrom<Cart> for CartView {
    type Error = CommerceError;

    fn try_from(cart: Cart) -> Result<Self, Self::Error> {
        let quote = cart.quote(None)?;
        Ok(Self { cart, quote })
    }
}

async fn get_cart(State(s): State<AppState>, Path(customer_id): Path<Uuid>) -> ApiResult<Json<CartView>> {
    Ok(Json(s.services.carts.get_cart(customer_id).await?.try_into()?))
}

async fn add_line(State(s): State<AppState>, Path(customer_id): Path<Uuid>, Json(r): Json<AddLineRequest>) -> ApiResult<(StatusCode, Json<CartView>)> {
    r.validate()?;
    let line = AddLine { product_id: r.product_id, color: r.color, size: r.size, quantity: r.quantity };
    let cart = s.services.carts.add_line(customer_id, line).await?;
    Ok((StatusCode::CREATED, Json(cart.try_into()?)))
}

async fn update_line(
    State(s): State<AppState>,
    Path((customer_id, line_id)): Path<(Uuid, Uuid)>,
    Json(r): Json<UpdateLineRequest>,
) -> ApiResult<Json<CartView>> {
    r.validate()?;
    Ok(Json(s.services.carts.update_quantity(customer_id, line_id, r.quantity).await?.try_into()?))
}

async fn remove_line(State(s): State<AppState>, Path((customer_id, line_id)): Path<(Uuid, Uuid)>) -> ApiResult<Json<CartView>> {
    Ok(Json(s.services.carts.remove_line(customer_id, line_id).await?.try_into()?))
}

// =============================================================================
// Addresses
// =============================================================================

async fn list_addresses(State(s): State<AppState>, Path(customer_id): Path<Uuid>) -> ApiResult<Json<Vec<Address>>> {
    Ok(Json(s.services.addresses(customer_id).await?))
}

async fn save_addresses(State(s): State<AppState>, Path(customer_id): Path<Uuid>, Json(addresses): Json<Vec<Address>>) -> ApiResult<Json<Vec<Address>>> {
    s.services.save_addresses(customer_id, &addresses).await?;
    Ok(Json(addresses))
}

// =============================================================================
// Checkout & payments
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct CouponRequest {
    #[validate(length(min = 1, max = 32))]
    pub code: String,
}

async fn preview_coupon(State(s): State<AppState>, Path(customer_id): Path<Uuid>, Json(r): Json<CouponRequest>) -> ApiResult<Json<CouponPreview>> {
    r.validate()?;
    Ok(Json(s.services.coupons.preview(customer_id, &r.code).await?))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CheckoutBody {
    pub address_index: usize,
    pub payment_method: PaymentMethod,
    #[validate(length(max = 32))]
    pub coupon_code: Option<String>,
}

async fn checkout(State(s): State<AppState>, Path(customer_id): Path<Uuid>, Json(r): Json<CheckoutBody>) -> ApiResult<(StatusCode, Json<CheckoutOutcome>)> {
    r.validate()?;
    let request = CheckoutRequest { customer_id, address_index: r.address_index, payment_method: r.payment_method, coupon_code: r.coupon_code };
    let outcome = s.services.orders.create_order(request).await?;
    let status = match outcome {
        CheckoutOutcome::Placed { .. } => StatusCode::CREATED,
        CheckoutOutcome::AwaitingPayment { .. } => StatusCode::ACCEPTED,
    };
    Ok((status, Json(outcome)))
}

async fn verify_payment(State(s): State<AppState>, Json(r): Json<PaymentConfirmation>) -> ApiResult<Json<VerifyOutcome>> {
    Ok(Json(s.services.orders.verify_payment(&r).await?))
}

#[derive(Debug, Deserialize, Validate)]
pub struct PaymentFailure {
    #[validate(length(min = 1))]
    pub gateway_order_id: String,
}

async fn payment_failure(State(s): State<AppState>, Json(r): Json<PaymentFailure>) -> ApiResult<Json<Order>> {
    r.validate()?;
    Ok(Json(s.services.orders.record_payment_failure(&r.gateway_order_id).await?))
}

async fn retry_payment(State(s): State<AppState>, Path((customer_id, number)): Path<(Uuid, String)>) -> ApiResult<Json<PaymentIntent>> {
    let number = order_number(&number)?;
    Ok(Json(s.services.orders.retry_payment(customer_id, &number).await?))
}

// =============================================================================
// Orders
// =============================================================================

async fn list_orders(State(s): State<AppState>, Path(customer_id): Path<Uuid>) -> ApiResult<Json<Vec<Order>>> {
    Ok(Json(s.services.orders.orders_for_customer(customer_id).await?))
}

async fn get_order(State(s): State<AppState>, Path((customer_id, number)): Path<(Uuid, String)>) -> ApiResult<Json<Order>> {
    let number = order_number(&number)?;
    Ok(Json(s.services.orders.customer_order(customer_id, &number).await?))
}

async fn cancel_item(State(s): State<AppState>, Path((customer_id, item_id)): Path<(Uuid, Uuid)>) -> ApiResult<Json<StatusChange>> {
    Ok(Json(s.services.orders.cancel_item(customer_id, item_id).await?))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReturnRequest {
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
}

async fn request_return(
    State(s): State<AppState>,
    Path((customer_id, item_id)): Path<(Uuid, Uuid)>,
    Json(r): Json<ReturnRequest>,
) -> ApiResult<Json<StatusChange>> {
    r.validate()?;
    Ok(Json(s.services.orders.request_return(customer_id, item_id, &r.reason).await?))
}

async fn get_wallet(State(s): State<AppState>, Path(customer_id): Path<Uuid>) -> ApiResult<Json<Wallet>> {
    Ok(Json(s.services.wallet.wallet(customer_id).await?))
}

// =============================================================================
// Admin
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: OrderStatus,
}

async fn update_item_status(State(s): State<AppState>, Path(item_id): Path<Uuid>, Json(r): Json<StatusRequest>) -> ApiResult<Json<StatusChange>> {
    Ok(Json(s.services.orders.update_item_status(item_id, r.status).await?))
}

async fn approve_return(State(s): State<AppState>, Path(item_id): Path<Uuid>) -> ApiResult<Json<StatusChange>> {
    Ok(Json(s.services.orders.approve_return(item_id).await?))
}

async fn settle_refunds(State(s): State<AppState>, Path(number): Path<String>) -> ApiResult<Json<Order>> {
    let number = order_number(&number)?;
    Ok(Json(s.services.orders.settle_refunds(&number).await?))
}

#[derive(Debug, Deserialize, Validate)]
pub struct NewCoupon {
    #[validate(length(min = 1, max = 32))]
    pub code: String,
    #[serde(flatten)]
    pub terms: CouponTerms,
}

async fn list_coupons(State(s): State<AppState>) -> ApiResult<Json<Vec<Coupon>>> {
    Ok(Json(s.services.coupons.coupons().await?))
}

async fn create_coupon(State(s): State<AppState>, Json(r): Json<NewCoupon>) -> ApiResult<(StatusCode, Json<Coupon>)> {
    r.validate()?;
    Ok((StatusCode::CREATED, Json(s.services.coupons.create(&r.code, r.terms).await?)))
}

async fn update_coupon(State(s): State<AppState>, Path(code): Path<String>, Json(terms): Json<CouponTerms>) -> ApiResult<Json<Coupon>> {
    Ok(Json(s.services.coupons.update(&code, terms).await?))
}

async fn delete_coupon(State(s): State<AppState>, Path(code): Path<String>) -> ApiResult<StatusCode> {
    s.services.coupons.delete(&code).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn save_offer(State(s): State<AppState>, Json(offer): Json<Offer>) -> ApiResult<(StatusCode, Json<Offer>)> {
    Ok((StatusCode::CREATED, Json(s.services.offers.save_offer(offer).await?)))
}

async fn reprice_product(State(s): State<AppState>, Path(product_id): Path<Uuid>) -> ApiResult<Json<Product>> {
    Ok(Json(s.services.offers.reprice_product(product_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct ReportParams {
    #[serde(default)]
    pub period: ReportPeriod,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

async fn sales_report(State(s): State<AppState>, Query(p): Query<ReportParams>) -> ApiResult<Json<SalesReport>> {
    if p.from >= p.to {
        return Err(ApiError::BadRequest("`from` must be before `to`".to_string()));
    }
    Ok(Json(s.services.reports.sales_report(p.period, p.from, p.to).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::TestContext;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request};
    use serde::de::DeserializeOwned;
    use tower::ServiceExt;

    fn app(ctx: &TestContext) -> Router {
        router(AppState { services: ctx.services.clone() })
    }

    async fn send(app: Router, method: Method, uri: &str, body: Option<serde_json::Value>) -> Response {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => request.header(header::CONTENT_TYPE, "application/json").body(Body::from(json.to_string())),
            None => request.body(Body::empty()),
        };
        app.oneshot(request.unwrap()).await.unwrap()
    }

    async fn json<T: DeserializeOwned>(response: Response) -> T {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let ctx = TestContext::new().await;
        let response = send(app(&ctx), Method::GET, "/health", None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_cart_to_cod_order() {
        let ctx = TestContext::new().await;
        let product = ctx.seed_product(3).await;
        let customer = ctx.customer;

        let body = serde_json::json!({"product_id": product.id(), "color": "red", "size": "M", "quantity": 2});
        let response = send(app(&ctx), Method::POST, &format!("/api/v1/customers/{customer}/cart/lines"), Some(body)).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let cart: serde_json::Value = json(response).await;
        assert_eq!(cart["quote"]["summary"]["total"], 1800);

        let body = serde_json::json!({"address_index": 0, "payment_method": "COD"});
        let response = send(app(&ctx), Method::POST, &format!("/api/v1/customers/{customer}/checkout"), Some(body)).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let outcome: serde_json::Value = json(response).await;
        assert_eq!(outcome["status"], "placed");
        let number = outcome["order"]["order_number"].as_str().unwrap().to_string();

        let response = send(app(&ctx), Method::GET, &format!("/api/v1/customers/{customer}/orders/{number}"), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let response = send(app(&ctx), Method::GET, &format!("/api/v1/customers/{}/orders/{number}", Uuid::now_v7()), None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let response = send(app(&ctx), Method::GET, &format!("/api/v1/customers/{customer}/orders/ORD-1"), None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let ctx = TestContext::new().await;
        let customer = ctx.customer;

        let body = serde_json::json!({"address_index": 0, "payment_method": "COD"});
        let response = send(app(&ctx), Method::POST, &format!("/api/v1/customers/{customer}/checkout"), Some(body)).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let error: ErrorBody = json(response).await;
        assert_eq!(error.error, "cart is empty");

        let body = serde_json::json!({"gateway_order_id": "order_x", "gateway_payment_id": "pay_x", "signature": "deadbeef"});
        let response = send(app(&ctx), Method::POST, "/api/v1/payments/verify", Some(body)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let product = ctx.seed_product(1).await;
        let body = serde_json::json!({"product_id": product.id(), "color": "red", "size": "M", "quantity": 2});
        let response = send(app(&ctx), Method::POST, &format!("/api/v1/customers/{customer}/cart/lines"), Some(body)).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body = serde_json::json!({"product_id": product.id(), "color": "red", "size": "M", "quantity": 0});
        let response = send(app(&ctx), Method::POST, &format!("/api/v1/customers/{customer}/cart/lines"), Some(body)).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let response = send(app(&ctx), Method::GET, &format!("/api/v1/customers/{customer}/wallet"), None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_return_needs_reason() {
        let ctx = TestContext::new().await;
        let uri = format!("/api/v1/customers/{}/items/{}/return", ctx.customer, Uuid::now_v7());
        let response = send(app(&ctx), Method::POST, &uri, Some(serde_json::json!({"reason": ""}))).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_gateway_checkout_and_verify() {
        let ctx = TestContext::new().await;
        let product = ctx.seed_product(3).await;
        ctx.add_to_cart(&product, "M", 1).await;
        let customer = ctx.customer;

        let body = serde_json::json!({"address_index": 0, "payment_method": "Gateway"});
        let response = send(app(&ctx), Method::POST, &format!("/api/v1/customers/{customer}/checkout"), Some(body)).await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let outcome: serde_json::Value = json(response).await;
        assert_eq!(outcome["status"], "awaiting_payment");
        assert_eq!(outcome["payment"]["amount_minor"], 90_000);
        let gateway_order_id = outcome["payment"]["gateway_order_id"].as_str().unwrap().to_string();

        let confirmation = ctx.gateway.confirmation(&gateway_order_id, "pay_1");
        let body = serde_json::json!({
            "gateway_order_id": confirmation.gateway_order_id,
            "gateway_payment_id": confirmation.gateway_payment_id,
            "signature": confirmation.signature,
        });
        let response = send(app(&ctx), Method::POST, "/api/v1/payments/verify", Some(body.clone())).await;
        assert_eq!(response.status(), StatusCode::OK);
        let verified: serde_json::Value = json(response).await;
        assert_eq!(verified["status"], "confirmed");
        assert_eq!(verified["order"]["payment_status"], "Paid");

        let response = send(app(&ctx), Method::POST, "/api/v1/payments/verify", Some(body)).await;
        let verified: serde_json::Value = json(response).await;
        assert_eq!(verified["status"], "already_paid");
        assert_eq!(ctx.stock(&product, "M").await, 2);
    }

    #[tokio::test]
    async fn test_sales_report_range() {
        let ctx = TestContext::new().await;
        let response = send(app(&ctx), Method::GET, "/api/v1/admin/reports/sales?period=monthly&from=2024-03-01T00:00:00Z&to=2024-02-01T00:00:00Z", None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let response = send(app(&ctx), Method::GET, "/api/v1/admin/reports/sales?period=monthly&from=2024-01-01T00:00:00Z&to=2024-04-01T00:00:00Z", None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_coupon_admin() {
        let ctx = TestContext::new().await;
        let body = serde_json::json!({"code": "save10", "discount": 10, "min_purchase": 500, "expires_at": "2024-06-01T00:00:00Z", "usage_limit": 5});
        let response = send(app(&ctx), Method::POST, "/api/v1/admin/coupons", Some(body.clone())).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let coupon: serde_json::Value = json(response).await;
        assert_eq!(coupon["code"], "SAVE10");

        let mut duplicate = body.clone();
        duplicate["code"] = serde_json::json!(" Save10 ");
        let response = send(app(&ctx), Method::POST, "/api/v1/admin/coupons", Some(duplicate)).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let terms = serde_json::json!({"discount": 20, "min_purchase": 500, "expires_at": "2024-06-01T00:00:00Z", "usage_limit": 5});
        let response = send(app(&ctx), Method::PUT, "/api/v1/admin/coupons/SAVE10", Some(terms)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let coupons: Vec<serde_json::Value> = json(send(app(&ctx), Method::GET, "/api/v1/admin/coupons", None).await).await;
        assert_eq!(coupons.len(), 1);
        assert_eq!(coupons[0]["discount"], 20);

        let response = send(app(&ctx), Method::DELETE, "/api/v1/admin/coupons/SAVE10", None).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let response = send(app(&ctx), Method::DELETE, "/api/v1/admin/coupons/SAVE10", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_contention_is_retryable() {
        assert_eq!(status_of(&CommerceError::Contention), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status_of(&CommerceError::Coupon(CouponError::NotFound)), StatusCode::NOT_FOUND);
    }
}

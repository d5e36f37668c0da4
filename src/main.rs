//! Meta Hair Commerce - storefront order and payment settlement service

use anyhow::Result;
use axum::{extract::{Path, Query, State}, http::StatusCode, response::{IntoResponse, Response}, routing::{get, post}, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use metahair_ecommerce::config::AppConfig;
use metahair_ecommerce::domain::catalog::ShippingMethod;
use metahair_ecommerce::domain::order::{Checkout, Order};
use metahair_ecommerce::error::AppError;
use metahair_ecommerce::events::EventPublisher;
use metahair_ecommerce::notify::ResendMailer;
use metahair_ecommerce::outbox::NotificationWorker;
use metahair_ecommerce::payment::PaystackVerifier;
use metahair_ecommerce::store::PgStore;
use metahair_ecommerce::workflow::{OrderWorkflow, UpdateStatusRequest, VerifyPaymentRequest};

type AppWorkflow = OrderWorkflow<PgStore, PaystackVerifier>;

#[derive(Clone)]
struct AppState {
    workflow: Arc<AppWorkflow>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();

    let config = AppConfig::from_env()?;
    let db = PgPoolOptions::new().max_connections(10).connect(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&db).await?;

    let nats = match &config.nats_url {
        Some(url) => async_nats::connect(url).await.map_err(|e| tracing::warn!(error = %e, "NATS unavailable, order events disabled")).ok(),
        None => None,
    };

    let store = PgStore::new(db);
    let mailer = ResendMailer::new(config.resend_api_key.clone(), config.mail_from.clone(), config.app_base_url.clone());
    tokio::spawn(NotificationWorker::new(store.clone(), mailer, std::time::Duration::from_secs(30)).run());

    let workflow = OrderWorkflow::new(
        store,
        PaystackVerifier::new(config.paystack_secret_key.clone()),
        EventPublisher::new(nats),
        config.admin_email.clone(),
    );
    let state = AppState { workflow: Arc::new(workflow) };

    let app = Router::new()
        .route("/health", get(|| async { Json(json!({"status": "healthy", "service": "metahair-ecommerce"})) }))
        .route("/api/v1/orders", get(list_orders).post(create_order))
        .route("/api/v1/orders/:id", get(get_order).put(update_order_status))
        .route("/api/v1/payments/verify", post(verify_payment))
        .route("/api/v1/shipping-methods", get(list_shipping_methods))
        .route("/api/v1/shipping-quote", get(shipping_quote))
        .layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()).with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("metahair-ecommerce listening on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}

#[derive(Debug, Deserialize)] struct ListParams { page: Option<u32>, per_page: Option<u32> }
#[derive(Debug, Serialize)] struct PaginatedResponse<T> { data: Vec<T>, total: i64, page: u32 }

async fn create_order(State(s): State<AppState>, Json(checkout): Json<Checkout>) -> Result<(StatusCode, Json<Order>), AppError> {
    let order = s.workflow.create_order(checkout).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

async fn list_orders(State(s): State<AppState>, Query(p): Query<ListParams>) -> Result<Json<PaginatedResponse<Order>>, AppError> {
    let page = p.page.unwrap_or(1).max(1);
    let per_page = p.per_page.unwrap_or(20).clamp(1, 100);
    let (orders, total) = s.workflow.orders(page, per_page).await?;
    Ok(Json(PaginatedResponse { data: orders, total, page }))
}

async fn get_order(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Order>, AppError> {
    Ok(Json(s.workflow.order(id).await?))
}

async fn update_order_status(State(s): State<AppState>, Path(id): Path<Uuid>, Json(r): Json<UpdateStatusRequest>) -> Result<Json<Order>, AppError> {
    Ok(Json(s.workflow.update_status(id, r).await?))
}

/// Gateway callback target. Keeps the `{success, ...}` envelope the
/// storefront checkout expects on both outcomes.
async fn verify_payment(State(s): State<AppState>, Json(r): Json<VerifyPaymentRequest>) -> Response {
    match s.workflow.settle_payment(r).await {
        Ok(order) => Json(json!({"success": true, "order": order})).into_response(),
        Err(err) => {
            let status = err.status_code();
            (status, Json(json!({"success": false, "message": err.to_string()}))).into_response()
        }
    }
}

async fn list_shipping_methods(State(s): State<AppState>) -> Result<Json<Vec<ShippingMethod>>, AppError> {
    Ok(Json(s.workflow.shipping_methods().await?))
}

#[derive(Debug, Deserialize)] struct QuoteParams { method: Uuid, items: Option<u32> }

async fn shipping_quote(State(s): State<AppState>, Query(p): Query<QuoteParams>) -> Result<Json<serde_json::Value>, AppError> {
    let cost = s.workflow.shipping_quote(p.method, p.items.unwrap_or(0)).await?;
    Ok(Json(json!({"shippingCost": cost})))
}

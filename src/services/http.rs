use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    routing::{get, post},
    Router,
};
use tokio::sync::mpsc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use super::{orders::OrderRequest, webhook::WebhookRequest, ServiceError};
use crate::settings;

mod orders;
mod webhook;

const ORDER_RECEIVED: &str = "✅ Your order was received successfully!";
const ORDER_UPDATED: &str = "✅ Order status updated";
const ORDER_FAILED: &str = "❌ Something went wrong while processing the order";

#[derive(Clone)]
struct AppState {
    order_channel: mpsc::Sender<OrderRequest>,
    webhook_channel: mpsc::Sender<WebhookRequest>,
}

fn error_response(error: ServiceError) -> (StatusCode, String) {
    match error {
        ServiceError::Validation(message) => (StatusCode::BAD_REQUEST, format!("❌ {}", message)),
        ServiceError::NotFound(what) => (StatusCode::NOT_FOUND, format!("❌ {} not found", what)),
        e => {
            log::error!("Request failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, ORDER_FAILED.to_string())
        }
    }
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                log::warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

fn build_router(
    order_channel: mpsc::Sender<OrderRequest>,
    webhook_channel: mpsc::Sender<WebhookRequest>,
    allowed_origins: &[String],
) -> Router {
    let app_state = AppState {
        order_channel,
        webhook_channel,
    };

    Router::new()
        .route("/order", post(orders::submit_star_order))
        .route("/premium", post(orders::submit_premium_order))
        .route("/admin", get(orders::list_all_orders))
        .route("/admin/stars", get(orders::list_star_orders))
        .route("/admin/premium", get(orders::list_premium_orders))
        .route("/complete-order/{id}", post(orders::complete_order))
        .route("/telegramWebhook", post(webhook::receive_update))
        .route("/", get(|| async { "Panda Store backend is running" }))
        .with_state(app_state)
        .layer(cors_layer(allowed_origins))
        .layer(TraceLayer::new_for_http())
}

pub async fn start_http_server(
    config: &settings::Http,
    order_channel: mpsc::Sender<OrderRequest>,
    webhook_channel: mpsc::Sender<WebhookRequest>,
) -> Result<(), anyhow::Error> {
    let app = build_router(order_channel, webhook_channel, &config.allowed_origins);

    let listener = tokio::net::TcpListener::bind(&config.listen).await?;
    log::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tokio::sync::oneshot;

use super::{error_response, AppState, ORDER_FAILED, ORDER_RECEIVED, ORDER_UPDATED};
use crate::models::orders::{OrderKind, PremiumOrderRequest, StarOrderRequest};
use crate::services::{orders::OrderRequest, ServiceError};

/// Every unreadable body is a validation failure, whatever axum objected to.
fn read_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, (StatusCode, String)> {
    match body {
        Ok(Json(request)) => Ok(request),
        Err(rejection) => {
            log::warn!("Rejected order body: {}", rejection.body_text());
            Err(error_response(ServiceError::Validation(
                "Incomplete order data".to_string(),
            )))
        }
    }
}

async fn ask<T>(
    state: &AppState,
    request: OrderRequest,
    response: oneshot::Receiver<Result<T, ServiceError>>,
) -> Result<T, (StatusCode, String)> {
    if let Err(e) = state.order_channel.send(request).await {
        log::error!("Order service is unavailable: {}", e);
        return Err((StatusCode::INTERNAL_SERVER_ERROR, ORDER_FAILED.to_string()));
    }

    match response.await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(service_error)) => Err(error_response(service_error)),
        Err(e) => {
            log::error!("Order service dropped the request: {}", e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, ORDER_FAILED.to_string()))
        }
    }
}

pub async fn submit_star_order(
    State(state): State<AppState>,
    body: Result<Json<StarOrderRequest>, JsonRejection>,
) -> impl IntoResponse {
    let request = match read_body(body) {
        Ok(request) => request,
        Err(e) => return e,
    };
    let (order_tx, order_rx) = oneshot::channel();
    let request = OrderRequest::SubmitStars {
        request,
        response: order_tx,
    };

    match ask(&state, request, order_rx).await {
        Ok(_) => (StatusCode::OK, ORDER_RECEIVED.to_string()),
        Err(e) => e,
    }
}

pub async fn submit_premium_order(
    State(state): State<AppState>,
    body: Result<Json<PremiumOrderRequest>, JsonRejection>,
) -> impl IntoResponse {
    let request = match read_body(body) {
        Ok(request) => request,
        Err(e) => return e,
    };
    let (order_tx, order_rx) = oneshot::channel();
    let request = OrderRequest::SubmitPremium {
        request,
        response: order_tx,
    };

    match ask(&state, request, order_rx).await {
        Ok(_) => (StatusCode::OK, ORDER_RECEIVED.to_string()),
        Err(e) => e,
    }
}

async fn list_orders(state: AppState, kind: Option<OrderKind>) -> Response {
    let (orders_tx, orders_rx) = oneshot::channel();
    let request = OrderRequest::ListOrders {
        kind,
        response: orders_tx,
    };

    match ask(&state, request, orders_rx).await {
        Ok(orders) => (StatusCode::OK, Json(orders)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn list_all_orders(State(state): State<AppState>) -> Response {
    list_orders(state, None).await
}

pub async fn list_star_orders(State(state): State<AppState>) -> Response {
    list_orders(state, Some(OrderKind::Stars)).await
}

pub async fn list_premium_orders(State(state): State<AppState>) -> Response {
    list_orders(state, Some(OrderKind::Premium)).await
}

pub async fn complete_order(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    let (complete_tx, complete_rx) = oneshot::channel();
    let request = OrderRequest::CompleteOrder {
        id,
        response: complete_tx,
    };

    match ask(&state, request, complete_rx).await {
        Ok(()) => (StatusCode::OK, ORDER_UPDATED.to_string()),
        Err(e) => e,
    }
}

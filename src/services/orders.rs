use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::oneshot;

use super::{RequestHandler, Service, ServiceError};
use crate::{
    models::{
        orders::{
            NewOrder, Order, OrderItem, OrderKind, PremiumOrderRequest, Scalar, StarOrderRequest,
        },
        telegram::{InlineKeyboardButton, ReplyMarkup},
    },
    repositories::{telegram::Messenger, OrderStore},
    settings,
};

pub enum OrderRequest {
    SubmitStars {
        request: StarOrderRequest,
        response: oneshot::Sender<Result<Order, ServiceError>>,
    },
    SubmitPremium {
        request: PremiumOrderRequest,
        response: oneshot::Sender<Result<Order, ServiceError>>,
    },
    ListOrders {
        kind: Option<OrderKind>,
        response: oneshot::Sender<Result<Vec<Order>, ServiceError>>,
    },
    CompleteOrder {
        id: i32,
        response: oneshot::Sender<Result<(), ServiceError>>,
    },
}

#[derive(Clone)]
pub struct OrderRequestHandler {
    orders: Arc<dyn OrderStore>,
    messenger: Arc<dyn Messenger>,
    operators: Arc<Vec<i64>>,
    store: Arc<settings::Store>,
}

impl OrderRequestHandler {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        messenger: Arc<dyn Messenger>,
        operators: Vec<i64>,
        store: settings::Store,
    ) -> Self {
        OrderRequestHandler {
            orders,
            messenger,
            operators: Arc::new(operators),
            store: Arc::new(store),
        }
    }

    pub async fn submit_star_order(&self, request: StarOrderRequest) -> Result<Order, ServiceError> {
        let order = validate_star_order(request, Utc::now())?;
        let order = self.persist(order).await?;
        self.notify_operators(&order).await;

        Ok(order)
    }

    pub async fn submit_premium_order(
        &self,
        request: PremiumOrderRequest,
    ) -> Result<Order, ServiceError> {
        let order = validate_premium_order(request, Utc::now())?;
        let order = self.persist(order).await?;
        self.notify_operators(&order).await;

        Ok(order)
    }

    pub async fn list_orders(&self, kind: Option<OrderKind>) -> Result<Vec<Order>, ServiceError> {
        self.orders
            .list_orders(kind)
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))
    }

    pub async fn complete_order(&self, id: i32) -> Result<(), ServiceError> {
        let found = self
            .orders
            .complete_order(id)
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))?;

        if found {
            log::info!("Order {} marked completed.", id);
            Ok(())
        } else {
            Err(ServiceError::NotFound(format!("Order {}", id)))
        }
    }

    async fn persist(&self, order: NewOrder) -> Result<Order, ServiceError> {
        let order = self
            .orders
            .insert_order(order)
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))?;

        log::info!(
            "Stored {} order {} for @{}.",
            order.kind.as_str(),
            order.id,
            order.username
        );
        Ok(order)
    }

    /// Tells every operator about a new order. The order is already stored,
    /// so failures are only logged. Returns how many operators were reached.
    async fn notify_operators(&self, order: &Order) -> usize {
        let text = self.notification_text(order);
        let fulfilment_url = match order.kind {
            OrderKind::Stars => &self.store.fragment_stars_url,
            OrderKind::Premium => &self.store.fragment_premium_url,
        };
        let markup = ReplyMarkup::inline(vec![
            vec![InlineKeyboardButton::web_app(
                "🔗 Fulfil order for the user",
                fulfilment_url.clone(),
            )],
            vec![InlineKeyboardButton::callback(
                "🛩 Mark completed in database",
                format!("complete_{}", order.id),
            )],
        ]);

        let mut delivered = 0;
        for operator in self.operators.iter() {
            match self
                .messenger
                .send_message(*operator, &text, Some(markup.clone()))
                .await
            {
                Ok(_) => delivered += 1,
                Err(e) => log::error!(
                    "Failed to notify operator {} about order {}: {}",
                    operator,
                    order.id,
                    e
                ),
            }
        }

        delivered
    }

    fn notification_text(&self, order: &Order) -> String {
        let date = order
            .created_at
            .and_utc()
            .with_timezone(&self.store.timezone)
            .format("%d/%m/%Y, %I:%M:%S %p");
        let username = order.username.trim_start_matches('@');

        match order.kind {
            OrderKind::Stars => format!(
                "New Order 🛒\n👤 Username: @{}\n⭐️ Stars: {}\n💰 TON: {} TON\n💵 USDT: {} USDT\n📅 Order Date: {}\n🆔 Order: #{}",
                username,
                order.stars.unwrap_or_default(),
                order.amount_ton,
                order.amount_usd,
                date,
                order.id
            ),
            OrderKind::Premium => format!(
                "New Premium Order 🛒\n👤 Username: @{}\n📅 Months: {}\n💰 TON: {} TON\n💵 USDT: {} USDT\n📅 Order Date: {}\n🆔 Order: #{}",
                username,
                order.premium_months.unwrap_or_default(),
                order.amount_ton,
                order.amount_usd,
                date,
                order.id
            ),
        }
    }
}

fn required_text(field: Option<Scalar>, name: &str) -> Result<String, ServiceError> {
    field
        .and_then(|f| f.text())
        .ok_or_else(|| ServiceError::Validation(format!("Missing field: {}", name)))
}

fn required_count(field: Option<Scalar>, name: &str) -> Result<i32, ServiceError> {
    let text = required_text(field, name)?;
    match text.parse::<i32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ServiceError::Validation(format!(
            "Field {} must be a positive integer",
            name
        ))),
    }
}

pub fn validate_star_order(
    request: StarOrderRequest,
    now: DateTime<Utc>,
) -> Result<NewOrder, ServiceError> {
    let username = required_text(request.username, "username")?;
    let quantity = required_count(request.stars, "stars")?;
    let amount_ton = required_text(request.amount_ton, "amountTon")?;
    let amount_usd = required_text(request.amount_usd, "amountUsd")?;

    let created_at = match request.created_at.as_deref().map(str::trim) {
        None | Some("") => now,
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|d| d.with_timezone(&Utc))
            .map_err(|_| ServiceError::Validation(format!("Invalid createdAt: {}", raw)))?,
    };

    Ok(NewOrder {
        username,
        item: OrderItem::Stars { quantity },
        amount_ton,
        amount_usd,
        created_at,
    })
}

pub fn validate_premium_order(
    request: PremiumOrderRequest,
    now: DateTime<Utc>,
) -> Result<NewOrder, ServiceError> {
    let username = required_text(request.username, "username")?;
    let months = required_count(request.months, "months")?;
    let amount_ton = required_text(request.amount_ton, "amountTon")?;
    let amount_usd = required_text(request.amount_usd, "amountUsd")?;

    Ok(NewOrder {
        username,
        item: OrderItem::Premium { months },
        amount_ton,
        amount_usd,
        created_at: now,
    })
}

#[async_trait]
impl RequestHandler<OrderRequest> for OrderRequestHandler {
    async fn handle_request(&self, request: OrderRequest) {
        match request {
            OrderRequest::SubmitStars { request, response } => {
                let order = self.submit_star_order(request).await;
                let _ = response.send(order);
            }
            OrderRequest::SubmitPremium { request, response } => {
                let order = self.submit_premium_order(request).await;
                let _ = response.send(order);
            }
            OrderRequest::ListOrders { kind, response } => {
                let orders = self.list_orders(kind).await;
                let _ = response.send(orders);
            }
            OrderRequest::CompleteOrder { id, response } => {
                let result = self.complete_order(id).await;
                let _ = response.send(result);
            }
        }
    }
}

pub struct OrderService;

impl OrderService {
    pub fn new() -> Self {
        OrderService {}
    }
}

#[async_trait]
impl Service<OrderRequest, OrderRequestHandler> for OrderService {}

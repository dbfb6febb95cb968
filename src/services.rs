use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::mpsc;

use crate::{
    repositories::{
        orders::OrderRepository,
        telegram::{Messenger, TelegramApi},
        users::UserRepository,
        OrderStore, UserStore,
    },
    settings::Settings,
};

pub mod challenge;
pub mod http;
pub mod orders;
pub mod webhook;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Database error: {0}")]
    Database(String),
}

#[async_trait]
pub trait RequestHandler<T>: Send + Sync + 'static
where
    T: Send + 'static,
{
    async fn handle_request(&self, request: T);
}

#[async_trait]
pub trait Service<T, H>: Send + Sync + 'static
where
    T: Send + 'static,
    H: RequestHandler<T> + Clone + Send,
{
    async fn run(&mut self, handler: H, receiver: &mut mpsc::Receiver<T>) {
        while let Some(request) = receiver.recv().await {
            let handler = handler.clone();

            tokio::spawn(async move {
                handler.handle_request(request).await;
            });
        }
    }
}

pub async fn start_services(pool: PgPool, settings: Settings) -> Result<(), anyhow::Error> {
    let (order_tx, mut order_rx) = mpsc::channel(512);
    let (webhook_tx, mut webhook_rx) = mpsc::channel(512);

    let telegram = Arc::new(TelegramApi::new(
        settings.telegram.api_url.clone(),
        settings.telegram.token.clone(),
    ));
    let messenger: Arc<dyn Messenger> = telegram.clone();
    let users: Arc<dyn UserStore> = Arc::new(UserRepository::new(pool.clone()));
    let orders: Arc<dyn OrderStore> = Arc::new(OrderRepository::new(pool));
    let operators = settings.operators.ids.clone();

    if operators.is_empty() {
        log::warn!("No operators configured, order notifications will not be delivered.");
    }

    log::info!("Starting order service.");
    let mut order_service = orders::OrderService::new();
    let order_handler = orders::OrderRequestHandler::new(
        orders.clone(),
        messenger.clone(),
        operators.clone(),
        settings.store.clone(),
    );
    tokio::spawn(async move {
        order_service.run(order_handler, &mut order_rx).await;
    });

    log::info!("Starting webhook service.");
    let mut webhook_service = webhook::WebhookService::new();
    let context = webhook::BotContext {
        users,
        orders,
        messenger,
        operators,
        channel: settings.telegram.channel_handle().to_string(),
        bot_username: settings.telegram.bot_username.clone(),
        store: settings.store.clone(),
    };
    let webhook_handler = webhook::WebhookRequestHandler::new(context);
    tokio::spawn(async move {
        webhook_service.run(webhook_handler, &mut webhook_rx).await;
    });

    if let Some(webhook_url) = settings.telegram.webhook_url.clone() {
        tokio::spawn(async move {
            match telegram.set_webhook(&webhook_url).await {
                Ok(()) => log::info!("Webhook registered at {}", webhook_url),
                Err(e) => log::error!("Failed to register webhook: {}", e),
            }
        });
    } else {
        log::warn!("telegram.webhook_url not set, skipping webhook registration.");
    }

    log::info!("Starting HTTP server.");
    http::start_http_server(&settings.http, order_tx, webhook_tx).await
}

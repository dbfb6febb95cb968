use std::sync::Arc;

use async_trait::async_trait;

use super::{RequestHandler, Service};
use crate::{
    models::telegram::Update,
    repositories::{telegram::Messenger, OrderStore, UserStore},
    settings,
};

mod dispatcher;
pub mod event;
pub mod texts;

pub use dispatcher::Dispatcher;

/// Everything a conversation flow may touch, built once at startup.
#[derive(Clone)]
pub struct BotContext {
    pub users: Arc<dyn UserStore>,
    pub orders: Arc<dyn OrderStore>,
    pub messenger: Arc<dyn Messenger>,
    pub operators: Vec<i64>,
    pub channel: String,
    pub bot_username: String,
    pub store: settings::Store,
}

pub enum WebhookRequest {
    Update { update: Update },
}

#[derive(Clone)]
pub struct WebhookRequestHandler {
    dispatcher: Arc<Dispatcher>,
}

impl WebhookRequestHandler {
    pub fn new(context: BotContext) -> Self {
        WebhookRequestHandler {
            dispatcher: Arc::new(Dispatcher::new(context)),
        }
    }
}

#[async_trait]
impl RequestHandler<WebhookRequest> for WebhookRequestHandler {
    async fn handle_request(&self, request: WebhookRequest) {
        match request {
            WebhookRequest::Update { update } => {
                self.dispatcher.dispatch(update).await;
            }
        }
    }
}

pub struct WebhookService;

impl WebhookService {
    pub fn new() -> Self {
        WebhookService {}
    }
}

#[async_trait]
impl Service<WebhookRequest, WebhookRequestHandler> for WebhookService {}

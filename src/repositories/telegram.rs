use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::models::telegram::{
    ApiResponse, ChatMember, MembershipStatus, ReplyMarkup, SentMessage,
};

#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    #[error("Message not found")]
    NotFound,
    #[error("Telegram API error {code}: {description}")]
    Api { code: i32, description: String },
    #[error("Transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for MessagingError {
    fn from(e: reqwest::Error) -> Self {
        MessagingError::Transport(e.to_string())
    }
}

/// Outbound side of the bot platform.
#[async_trait]
pub trait Messenger: Send + Sync + 'static {
    /// Sends a message and returns its id.
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        markup: Option<ReplyMarkup>,
    ) -> Result<i64, MessagingError>;

    async fn edit_markup(
        &self,
        chat_id: i64,
        message_id: i64,
        markup: ReplyMarkup,
    ) -> Result<(), MessagingError>;

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<(), MessagingError>;

    async fn membership_status(
        &self,
        user_id: i64,
        channel: &str,
    ) -> Result<MembershipStatus, MessagingError>;
}

pub struct TelegramApi {
    url: String,
    token: String,
    client: reqwest::Client,
}

impl TelegramApi {
    pub fn new(url: String, token: String) -> Self {
        Self {
            url,
            token,
            client: reqwest::Client::new(),
        }
    }

    /// Points the platform at our webhook endpoint.
    pub async fn set_webhook(&self, webhook_url: &str) -> Result<(), MessagingError> {
        let _: bool = self.call("setWebhook", json!({ "url": webhook_url })).await?;
        Ok(())
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        payload: serde_json::Value,
    ) -> Result<T, MessagingError> {
        // The Bot API answers errors with a JSON envelope and a 4xx status,
        // so the envelope is parsed regardless of the status code.
        let response: ApiResponse<T> = self
            .client
            .post(format!("{}/bot{}/{}", self.url, self.token, method))
            .json(&payload)
            .send()
            .await?
            .json()
            .await?;

        match response {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResponse {
                error_code,
                description,
                ..
            } => Err(classify_error(
                error_code.unwrap_or_default(),
                description.unwrap_or_default(),
            )),
        }
    }
}

fn classify_error(code: i32, description: String) -> MessagingError {
    let lowered = description.to_lowercase();
    if code == 400 && (lowered.contains("message to delete not found")
        || lowered.contains("message to edit not found")
        || lowered.contains("message not found"))
    {
        MessagingError::NotFound
    } else {
        MessagingError::Api { code, description }
    }
}

#[async_trait]
impl Messenger for TelegramApi {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        markup: Option<ReplyMarkup>,
    ) -> Result<i64, MessagingError> {
        let mut payload = json!({
            "chat_id": chat_id,
            "text": text,
        });
        if let Some(markup) = markup {
            payload["reply_markup"] = json!(markup);
        }

        let message: SentMessage = self.call("sendMessage", payload).await?;
        Ok(message.message_id)
    }

    async fn edit_markup(
        &self,
        chat_id: i64,
        message_id: i64,
        markup: ReplyMarkup,
    ) -> Result<(), MessagingError> {
        // Returns the edited message, which nobody needs.
        let _: serde_json::Value = self
            .call(
                "editMessageReplyMarkup",
                json!({
                    "chat_id": chat_id,
                    "message_id": message_id,
                    "reply_markup": markup,
                }),
            )
            .await?;

        Ok(())
    }

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<(), MessagingError> {
        let _: bool = self
            .call(
                "deleteMessage",
                json!({
                    "chat_id": chat_id,
                    "message_id": message_id,
                }),
            )
            .await?;

        Ok(())
    }

    async fn membership_status(
        &self,
        user_id: i64,
        channel: &str,
    ) -> Result<MembershipStatus, MessagingError> {
        let member: ChatMember = self
            .call(
                "getChatMember",
                json!({
                    "chat_id": format!("@{}", channel.trim_start_matches('@')),
                    "user_id": user_id,
                }),
            )
            .await?;

        Ok(MembershipStatus::from_api(&member.status))
    }
}

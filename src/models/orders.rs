use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderKind {
    Stars,
    Premium,
}

impl OrderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderKind::Stars => "stars",
            OrderKind::Premium => "premium",
        }
    }
}

impl TryFrom<String> for OrderKind {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "stars" => Ok(OrderKind::Stars),
            "premium" => Ok(OrderKind::Premium),
            other => Err(anyhow::anyhow!("Unknown order type: {}", other)),
        }
    }
}

/// Persisted row of the `orders` table. Field names follow the column
/// names because the operator console reads them as-is.
#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct Order {
    pub id: i32,
    pub username: String,
    pub stars: Option<i32>,
    pub amount_ton: String,
    pub amount_usd: String,
    #[sqlx(rename = "type", try_from = "String")]
    #[serde(rename = "type")]
    pub kind: OrderKind,
    pub premium_months: Option<i32>,
    pub created_at: chrono::NaiveDateTime,
    pub completed: bool,
}

/// What is being bought. Carrying the quantity inside the variant keeps
/// star orders and premium orders from mixing up their fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderItem {
    Stars { quantity: i32 },
    Premium { months: i32 },
}

impl OrderItem {
    pub fn kind(&self) -> OrderKind {
        match self {
            OrderItem::Stars { .. } => OrderKind::Stars,
            OrderItem::Premium { .. } => OrderKind::Premium,
        }
    }
}

#[derive(Clone, Debug)]
pub struct NewOrder {
    pub username: String,
    pub item: OrderItem,
    pub amount_ton: String,
    pub amount_usd: String,
    pub created_at: DateTime<Utc>,
}

/// JSON scalar the storefront may send either quoted or bare.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Text(String),
    Number(serde_json::Number),
    Bool(bool),
}

impl Scalar {
    /// Textual form, `None` when empty.
    pub fn text(&self) -> Option<String> {
        let text = match self {
            Scalar::Text(s) => s.trim().to_string(),
            Scalar::Number(n) => n.to_string(),
            Scalar::Bool(_) => return None,
        };

        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StarOrderRequest {
    pub username: Option<Scalar>,
    pub stars: Option<Scalar>,
    pub amount_ton: Option<Scalar>,
    pub amount_usd: Option<Scalar>,
    pub created_at: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PremiumOrderRequest {
    pub username: Option<Scalar>,
    pub months: Option<Scalar>,
    pub amount_ton: Option<Scalar>,
    pub amount_usd: Option<Scalar>,
}

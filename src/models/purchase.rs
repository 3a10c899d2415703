use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPurchase {
    pub user_id: Uuid,
    pub product_id: String,
    pub payment_id: Option<String>,
    /// Amount in the currency's minor unit, as reported by the provider.
    pub amount_minor: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Purchase {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: String,
    pub payment_id: Option<String>,
    pub amount_minor: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub purchased_at: OffsetDateTime,
}

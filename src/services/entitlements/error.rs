use crate::services::stripe::StripeServiceError;

#[derive(Debug, thiserror::Error)]
pub enum EntitlementError {
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
    #[error("billing provider error: {0}")]
    Upstream(#[from] StripeServiceError),
}

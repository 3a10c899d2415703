use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Product granted to pre-billing customers of the 3D aiming course.
pub const LEGACY_AIMING_COURSE: &str = "3d_aiming_course";

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct LegacyUser {
    pub email: String,
    pub products: Vec<String>,
    pub notes: Option<String>,
    pub granted_at: Option<OffsetDateTime>,
    pub added_by: Option<Uuid>,
}

impl LegacyUser {
    pub fn grants(&self, product: &str) -> bool {
        self.products.iter().any(|p| p == product)
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LegacyCheckRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LegacyAccessResponse {
    pub has_legacy_access: bool,
    pub granted_products: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddLegacyUserRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub products: Vec<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoveLegacyUserRequest {
    #[serde(default)]
    pub email: String,
}

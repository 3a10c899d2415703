use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Claims {
    pub id: String, // user UUID
    #[serde(default)]
    pub email: Option<String>,
    pub exp: usize, // expiration (as UNIX timestamp)
    #[serde(default)]
    pub role: Option<UserRole>,
    pub iss: String,
    pub aud: String,
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.role == Some(UserRole::Admin)
    }
}

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
pub enum SubscriptionTier {
    #[default]
    #[serde(rename = "free")]
    Free,
    #[serde(rename = "competitor")]
    Competitor,
    #[serde(rename = "professional")]
    Professional,
    #[serde(rename = "hustonSchool")]
    HustonSchool,
}

impl SubscriptionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionTier::Free => "free",
            SubscriptionTier::Competitor => "competitor",
            SubscriptionTier::Professional => "professional",
            SubscriptionTier::HustonSchool => "hustonSchool",
        }
    }

    /// Parses a stored or configured tier name. Unknown names map to `Free`.
    pub fn from_str_lossy(raw: &str) -> Self {
        Self::parse(raw).unwrap_or(SubscriptionTier::Free)
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "free" | "archer" => Some(SubscriptionTier::Free),
            "competitor" => Some(SubscriptionTier::Competitor),
            "professional" => Some(SubscriptionTier::Professional),
            "hustonschool" | "huston_school" | "huston-school" => {
                Some(SubscriptionTier::HustonSchool)
            }
            _ => None,
        }
    }

    pub fn is_paid(self) -> bool {
        !matches!(self, SubscriptionTier::Free)
    }
}

impl std::fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_wire_names() {
        let json = serde_json::to_string(&SubscriptionTier::HustonSchool).unwrap();
        assert_eq!(json, "\"hustonSchool\"");
        let tier: SubscriptionTier = serde_json::from_str("\"competitor\"").unwrap();
        assert_eq!(tier, SubscriptionTier::Competitor);
    }

    #[test]
    fn lossy_parse_falls_back_to_free() {
        assert_eq!(
            SubscriptionTier::from_str_lossy("HustonSchool"),
            SubscriptionTier::HustonSchool
        );
        assert_eq!(SubscriptionTier::from_str_lossy("archer"), SubscriptionTier::Free);
        assert_eq!(SubscriptionTier::from_str_lossy("gold"), SubscriptionTier::Free);
        assert_eq!(SubscriptionTier::from_str_lossy(""), SubscriptionTier::Free);
    }
}

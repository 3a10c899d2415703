use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::{StripeEvent, StripeServiceError};

type HmacSha256 = Hmac<Sha256>;

/// Maximum age, in seconds, of a signed delivery.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

fn expected_signature(
    secret: &str,
    timestamp: &str,
    payload: &[u8],
) -> Result<String, StripeServiceError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| StripeServiceError::Webhook(e.to_string()))?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Checks a `Stripe-Signature` header (`t=<unix>,v1=<hex>[,v1=...]`) against the raw body.
/// Only the HMAC and the timestamp are checked; the body is not interpreted here.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: i64,
) -> Result<(), StripeServiceError> {
    let mut timestamp = None;
    let mut candidates = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => candidates.push(value),
            _ => {}
        }
    }

    let timestamp =
        timestamp.ok_or_else(|| StripeServiceError::Webhook("missing timestamp".into()))?;
    let signed_at = timestamp
        .parse::<i64>()
        .map_err(|_| StripeServiceError::Webhook("invalid timestamp".into()))?;
    if (now - signed_at).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(StripeServiceError::Webhook(
            "timestamp outside the tolerance zone".into(),
        ));
    }

    let expected = expected_signature(secret, timestamp, payload)?;
    let matched = candidates
        .iter()
        .any(|provided| bool::from(expected.as_bytes().ct_eq(provided.as_bytes())));
    if !matched {
        return Err(StripeServiceError::Webhook(
            "no signatures found matching the expected signature".into(),
        ));
    }
    Ok(())
}

/// Reads the envelope of a verified body, keeping the whole payload untyped.
pub fn event_from_payload(payload: &[u8]) -> Result<StripeEvent, StripeServiceError> {
    let value: serde_json::Value =
        serde_json::from_slice(payload).map_err(|e| StripeServiceError::Serde(e.to_string()))?;
    let field = |name: &str| {
        value
            .get(name)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or_else(|| StripeServiceError::Serde(format!("event is missing {name}")))
    };
    let id = field("id")?;
    let r#type = field("type")?;
    Ok(StripeEvent {
        id,
        r#type,
        payload: value,
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn signature_header(secret: &str, timestamp: i64, payload: &[u8]) -> String {
        let signature = expected_signature(secret, &timestamp.to_string(), payload).unwrap();
        format!("t={timestamp},v1={signature}")
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::signature_header;
    use super::*;

    const SECRET: &str = "whsec_test";
    const NOW: i64 = 1_740_000_000;

    #[test]
    fn accepts_matching_signature_among_several() {
        let payload = br#"{"id":"evt_1","type":"invoice.paid"}"#;
        let valid = signature_header(SECRET, NOW, payload);
        let header = format!("{valid},v1=deadbeef,v0=ignored");
        assert!(verify_signature(payload, &header, SECRET, NOW + 10).is_ok());
    }

    #[test]
    fn rejects_tampered_body() {
        let header = signature_header(SECRET, NOW, br#"{"id":"evt_1"}"#);
        let result = verify_signature(br#"{"id":"evt_2"}"#, &header, SECRET, NOW);
        assert!(matches!(result, Err(StripeServiceError::Webhook(_))));
    }

    #[test]
    fn rejects_wrong_secret() {
        let payload = br#"{"id":"evt_1"}"#;
        let header = signature_header("whsec_other", NOW, payload);
        assert!(verify_signature(payload, &header, SECRET, NOW).is_err());
    }

    #[test]
    fn rejects_stale_timestamp() {
        let payload = br#"{"id":"evt_1"}"#;
        let header = signature_header(SECRET, NOW, payload);
        let late = NOW + SIGNATURE_TOLERANCE_SECS + 1;
        assert!(verify_signature(payload, &header, SECRET, late).is_err());
    }

    #[test]
    fn rejects_header_without_parts() {
        assert!(verify_signature(b"{}", "garbage", SECRET, NOW).is_err());
        assert!(verify_signature(b"{}", "t=abc,v1=00", SECRET, NOW).is_err());
    }

    #[test]
    fn envelope_requires_id_and_type() {
        let evt = event_from_payload(br#"{"id":"evt_1","type":"invoice.paid","data":{}}"#).unwrap();
        assert_eq!(evt.id, "evt_1");
        assert_eq!(evt.r#type, "invoice.paid");
        assert!(matches!(
            event_from_payload(br#"{"type":"invoice.paid"}"#),
            Err(StripeServiceError::Serde(_))
        ));
    }
}

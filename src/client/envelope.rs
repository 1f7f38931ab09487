//! Response envelope decoding.
//!
//! Every response is `{"data": T | null, "errors"?: [...]}`. A non-empty
//! `errors` array or a `null` `data` becomes an error; the payload under
//! the requested root field is decoded into a concrete type and any
//! mismatch fails closed with [`SyncError::Parse`].

use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::SyncError;

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(default)]
    data: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default)]
    errors: Option<Vec<serde_json::Value>>,
}

fn error_message(value: &serde_json::Value) -> String {
    value
        .get("message")
        .and_then(serde_json::Value::as_str)
        .map_or_else(|| value.to_string(), str::to_string)
}

fn field_value(raw: &str, field: &str) -> Result<serde_json::Value, SyncError> {
    let envelope: RawEnvelope = serde_json::from_str(raw)?;

    if let Some(errors) = envelope.errors
        && !errors.is_empty()
    {
        return Err(SyncError::Remote(errors.iter().map(error_message).collect()));
    }

    let mut data = envelope
        .data
        .ok_or_else(|| SyncError::NullPayload(field.to_string()))?;

    data.remove(field)
        .ok_or_else(|| SyncError::Parse(format!("response has no field `{field}`")))
}

/// Decodes the non-null payload under `field`.
///
/// # Errors
///
/// * [`SyncError::Remote`] when the envelope carries errors.
/// * [`SyncError::NullPayload`] when `data` or the field is `null`.
/// * [`SyncError::Parse`] when the payload does not match `T`.
pub fn decode_field<T: DeserializeOwned>(raw: &str, field: &str) -> Result<T, SyncError> {
    let value = field_value(raw, field)?;
    if value.is_null() {
        return Err(SyncError::NullPayload(field.to_string()));
    }
    serde_json::from_value(value).map_err(|e| SyncError::Parse(format!("{field}: {e}")))
}

/// Decodes a payload under `field` that may legitimately be `null`.
///
/// # Errors
///
/// Same as [`decode_field`], except a `null` field yields `Ok(None)`.
pub fn decode_optional_field<T: DeserializeOwned>(
    raw: &str,
    field: &str,
) -> Result<Option<T>, SyncError> {
    let value = field_value(raw, field)?;
    if value.is_null() {
        return Ok(None);
    }
    serde_json::from_value(value)
        .map(Some)
        .map_err(|e| SyncError::Parse(format!("{field}: {e}")))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn decodes_field() {
        let raw = r#"{"data":{"currentPrice":"12."}}"#;
        let value: Result<String, _> = decode_field(raw, "currentPrice");
        assert_eq!(value, Ok("12.".to_string()));
    }

    #[test]
    fn errors_array_becomes_remote_error() {
        let raw = r#"{"data":null,"errors":[{"message":"Auction not found"}]}"#;
        let value: Result<String, _> = decode_field(raw, "auctionInfo");
        assert_eq!(
            value,
            Err(SyncError::Remote(vec!["Auction not found".to_string()]))
        );
    }

    #[test]
    fn empty_errors_array_is_ignored() {
        let raw = r#"{"data":{"trigger":"hash"},"errors":[]}"#;
        let value: Result<String, _> = decode_field(raw, "trigger");
        assert_eq!(value, Ok("hash".to_string()));
    }

    #[test]
    fn null_data_becomes_null_payload() {
        let raw = r#"{"data":null}"#;
        let value: Result<String, _> = decode_field(raw, "buy");
        assert_eq!(value, Err(SyncError::NullPayload("buy".to_string())));
    }

    #[test]
    fn null_field_is_allowed_when_optional() {
        let raw = r#"{"data":{"myCommitmentForAuction":null}}"#;
        let value: Result<Option<u64>, _> = decode_optional_field(raw, "myCommitmentForAuction");
        assert_eq!(value, Ok(None));
    }

    #[test]
    fn shape_mismatch_fails_closed() {
        let raw = r#"{"data":{"totalBids":"many"}}"#;
        let value: Result<u64, _> = decode_field(raw, "totalBids");
        assert!(matches!(value, Err(SyncError::Parse(_))));
    }

    #[test]
    fn missing_field_fails_closed() {
        let raw = r#"{"data":{}}"#;
        let value: Result<u64, _> = decode_field(raw, "totalBids");
        assert!(matches!(value, Err(SyncError::Parse(_))));
    }

    #[test]
    fn invalid_json_fails_closed() {
        let value: Result<u64, _> = decode_field("<html>", "x");
        assert!(matches!(value, Err(SyncError::Parse(_))));
    }
}

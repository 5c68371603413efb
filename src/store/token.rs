//! Opaque continuation tokens
//!
//! A token is the primary key of the last record handed out, as JSON, base64
//! encoded. Callers only pass tokens around; the store adapter is the only
//! place that builds or reads them.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::StoreError;
use crate::model::ItemKey;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContinuationToken(String);

impl ContinuationToken {
    pub(super) fn from_key(key: &ItemKey) -> Self {
        // ItemKey is two strings; serialization cannot fail
        let json = serde_json::to_vec(key).unwrap_or_default();
        Self(STANDARD.encode(json))
    }

    pub(super) fn to_key(&self) -> Result<ItemKey, StoreError> {
        let bytes = STANDARD
            .decode(self.0.trim())
            .map_err(|e| StoreError::InvalidToken(format!("not base64: {e}")))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::InvalidToken(format!("not a store key: {e}")))
    }

    /// Accept a token from an invocation payload.
    ///
    /// Strings must be tokens previously issued by this crate. Objects are
    /// raw store keys (`{"PK": .., "SK": ..}`) as echoed by older drivers.
    pub fn from_payload_value(value: &Value) -> Result<Option<Self>, StoreError> {
        match value {
            Value::Null => Ok(None),
            Value::String(s) if s.trim().is_empty() => Ok(None),
            Value::String(s) => {
                let token = Self(s.trim().to_string());
                token.to_key()?;
                Ok(Some(token))
            }
            Value::Object(_) => {
                let key: ItemKey = serde_json::from_value(value.clone())
                    .map_err(|e| StoreError::InvalidToken(format!("not a store key: {e}")))?;
                Ok(Some(Self::from_key(&key)))
            }
            other => Err(StoreError::InvalidToken(format!(
                "unsupported token type: {other}"
            ))),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContinuationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn token_encodes_key() {
        let key = ItemKey::person("abc");
        let token = ContinuationToken::from_key(&key);
        assert!(!token.as_str().contains("PERSON"));
        assert_eq!(token.to_key().unwrap(), key);
    }

    #[test]
    fn payload_accepts_issued_tokens_and_raw_keys() {
        let key = ItemKey::person("abc");
        let issued = ContinuationToken::from_key(&key);
        let from_string = ContinuationToken::from_payload_value(&json!(issued.as_str()))
            .unwrap()
            .unwrap();
        assert_eq!(from_string, issued);

        let from_object =
            ContinuationToken::from_payload_value(&json!({"PK": "PERSON#abc", "SK": "DETAILS"}))
                .unwrap()
                .unwrap();
        assert_eq!(from_object, issued);
    }

    #[test]
    fn payload_rejects_garbage() {
        assert!(ContinuationToken::from_payload_value(&json!("%%%")).is_err());
        assert!(ContinuationToken::from_payload_value(&json!(42)).is_err());
        assert!(ContinuationToken::from_payload_value(&json!({"id": 1})).is_err());
        assert_eq!(ContinuationToken::from_payload_value(&json!(null)).unwrap(), None);
        assert_eq!(ContinuationToken::from_payload_value(&json!("")).unwrap(), None);
    }
}

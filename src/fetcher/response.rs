//! Gateway response envelope and status-signal classification
//!
//! The gateway reports its own outcome in `ret[0]`, independent of the HTTP
//! status, e.g. `SUCCESS::调用成功` or `FAIL_SYS_TOKEN_EXOIRED::令牌过期`.
//! The signal is parsed once into [`RetSignal`] and everything downstream
//! branches on the enum.

use serde_json::Value;

use super::FetchError;
use crate::utils::{SUCCESS_SIGNAL, TOKEN_ERRORS};

/// Parsed JSON body of a detail call
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    body: Value,
}

impl RawResponse {
    #[must_use]
    pub fn new(body: Value) -> Self {
        Self { body }
    }

    /// Parse raw bytes from the wire
    ///
    /// # Errors
    ///
    /// Returns `FetchError::InvalidBody` when the bytes are not JSON.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, FetchError> {
        serde_json::from_slice(bytes)
            .map(Self::new)
            .map_err(|e| FetchError::InvalidBody(e.to_string()))
    }

    #[must_use]
    pub fn body(&self) -> &Value {
        &self.body
    }

    #[must_use]
    pub fn into_body(self) -> Value {
        self.body
    }

    /// First entry of `ret`, or an empty string when absent
    #[must_use]
    pub fn ret_signal(&self) -> &str {
        self.body
            .get("ret")
            .and_then(Value::as_array)
            .and_then(|ret| ret.first())
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn signal(&self) -> RetSignal {
        RetSignal::classify(self.ret_signal())
    }
}

/// Closed classification of the gateway's status signal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetSignal {
    /// The call succeeded
    Success(String),
    /// The session token is expired, empty or rejected; refresh and retry
    SessionInvalid(String),
    /// The gateway refused this item for good (invalid, removed, blocked)
    Permanent(String),
    /// No signal at all
    Unknown(String),
}

impl RetSignal {
    /// Classify a raw `ret[0]` string
    ///
    /// Token errors win over every other match, so a signal that mentions
    /// both a token error and `SUCCESS` still triggers a refresh.
    #[must_use]
    pub fn classify(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() {
            return Self::Unknown(String::new());
        }
        if TOKEN_ERRORS.iter().any(|err| raw.contains(err)) {
            return Self::SessionInvalid(raw.to_string());
        }
        if raw.contains(SUCCESS_SIGNAL) {
            return Self::Success(raw.to_string());
        }
        Self::Permanent(raw.to_string())
    }

    /// The raw signal text
    #[must_use]
    pub fn raw(&self) -> &str {
        match self {
            Self::Success(raw)
            | Self::SessionInvalid(raw)
            | Self::Permanent(raw)
            | Self::Unknown(raw) => raw,
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_success() {
        assert_eq!(
            RetSignal::classify("SUCCESS::调用成功"),
            RetSignal::Success("SUCCESS::调用成功".to_string())
        );
    }

    #[test]
    fn test_classify_token_errors() {
        for raw in [
            "FAIL_SYS_TOKEN_EXOIRED::令牌过期",
            "FAIL_SYS_TOKEN_EMPTY::令牌为空",
            "FAIL_SYS_TOKEN_ILLEGAL::非法令牌",
            "TOKEN_EMPTY::missing",
            "RGV587_ERROR::SM::哎哟喂,被挤爆啦",
        ] {
            assert!(
                matches!(RetSignal::classify(raw), RetSignal::SessionInvalid(_)),
                "{raw} should be session-invalid"
            );
        }
    }

    #[test]
    fn test_classify_permanent() {
        assert_eq!(
            RetSignal::classify("FAIL_SYS_ILLEGAL_ACCESS::blocked"),
            RetSignal::Permanent("FAIL_SYS_ILLEGAL_ACCESS::blocked".to_string())
        );
        assert!(matches!(
            RetSignal::classify("FAIL_BIZ_ITEM_NOT_EXIST::宝贝不存在"),
            RetSignal::Permanent(_)
        ));
    }

    #[test]
    fn test_token_error_beats_success() {
        assert!(matches!(
            RetSignal::classify("SUCCESS::but FAIL_SYS_TOKEN_EXOIRED"),
            RetSignal::SessionInvalid(_)
        ));
    }

    #[test]
    fn test_classify_empty_is_unknown() {
        assert_eq!(RetSignal::classify(""), RetSignal::Unknown(String::new()));
        assert_eq!(RetSignal::classify("   "), RetSignal::Unknown(String::new()));
    }

    #[test]
    fn test_ret_signal_extraction() {
        let raw = RawResponse::new(json!({"ret": ["SUCCESS::ok", "extra"], "data": {}}));
        assert_eq!(raw.ret_signal(), "SUCCESS::ok");
        assert!(raw.signal().is_success());

        let missing = RawResponse::new(json!({"data": {}}));
        assert_eq!(missing.ret_signal(), "");

        let wrong_type = RawResponse::new(json!({"ret": "SUCCESS"}));
        assert_eq!(wrong_type.ret_signal(), "");
    }

    #[test]
    fn test_from_slice_rejects_html() {
        assert!(matches!(
            RawResponse::from_slice(b"<html>blocked</html>"),
            Err(FetchError::InvalidBody(_))
        ));
    }
}

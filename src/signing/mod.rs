//! Request signing for the mobile API gateway
//!
//! The gateway authenticates each call with an MD5 digest over the session
//! sub-token, the millisecond timestamp, the application key and the exact
//! serialized payload:
//!
//! ```text
//! sign = md5_hex("{sub_token}&{timestamp_ms}&{app_key}&{payload}")
//! ```
//!
//! Everything here is pure. A [`SignedRequest`] is built fresh for every
//! attempt and never reused.

use md5::{Digest, Md5};

use crate::utils::{API_NAME, CHROME_USER_AGENT, JSV_VERSION, SITE_ORIGIN};

/// The part of the session token that takes part in signing
///
/// The `_m_h5_tk` cookie has the form `{token}_{expiry_ms}`; only the part
/// before the first `_` is signed. An empty token yields an empty sub-token.
#[must_use]
pub fn sub_token(token: &str) -> &str {
    token.split_once('_').map_or(token, |(head, _)| head)
}

/// Compute the request signature as lowercase hex
///
/// Malformed input produces a signature the gateway rejects; there is no
/// local failure mode.
#[must_use]
pub fn sign(token: &str, timestamp_ms: i64, app_key: &str, payload: &str) -> String {
    let raw = format!("{}&{timestamp_ms}&{app_key}&{payload}", sub_token(token));
    hex::encode(Md5::digest(raw.as_bytes()))
}

/// Compact JSON payload for a detail lookup, `{"itemId":"..."}`
#[must_use]
pub fn detail_payload(item_id: &str) -> String {
    serde_json::json!({ "itemId": item_id }).to_string()
}

/// A fully signed detail request, ready to hand to an HTTP client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    pub api_url: String,
    pub query: Vec<(&'static str, String)>,
    pub headers: Vec<(&'static str, String)>,
    /// Form body, `data=<payload>`
    pub body: String,
    pub timestamp_ms: i64,
    pub signature: String,
}

impl SignedRequest {
    /// Look up a query parameter by name
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Build the signed detail request for `item_id`
#[must_use]
pub fn build_signed_request(
    api_url: &str,
    app_key: &str,
    token: &str,
    item_id: &str,
    timestamp_ms: i64,
) -> SignedRequest {
    let payload = detail_payload(item_id);
    let signature = sign(token, timestamp_ms, app_key, &payload);

    let query = vec![
        ("jsv", JSV_VERSION.to_string()),
        ("appKey", app_key.to_string()),
        ("t", timestamp_ms.to_string()),
        ("sign", signature.clone()),
        ("v", "1.0".to_string()),
        ("type", "originaljson".to_string()),
        ("accountSite", "xianyu".to_string()),
        ("dataType", "json".to_string()),
        ("timeout", "20000".to_string()),
        ("api", API_NAME.to_string()),
        ("sessionOption", "AutoLoginOnly".to_string()),
        ("spm_cnt", "a21ybx.item.0.0".to_string()),
    ];

    SignedRequest {
        api_url: api_url.to_string(),
        query,
        headers: browser_headers(),
        body: format!("data={payload}"),
        timestamp_ms,
        signature,
    }
}

fn browser_headers() -> Vec<(&'static str, String)> {
    vec![
        ("accept", "application/json".to_string()),
        ("accept-language", "es-ES,es;q=0.9".to_string()),
        ("cache-control", "no-cache".to_string()),
        ("content-type", "application/x-www-form-urlencoded".to_string()),
        ("origin", SITE_ORIGIN.to_string()),
        ("pragma", "no-cache".to_string()),
        ("priority", "u=1, i".to_string()),
        ("referer", format!("{SITE_ORIGIN}/")),
        (
            "sec-ch-ua",
            r#""Google Chrome";v="143", "Chromium";v="143", "Not A(Brand";v="24""#.to_string(),
        ),
        ("sec-ch-ua-mobile", "?0".to_string()),
        ("sec-ch-ua-platform", r#""Windows""#.to_string()),
        ("sec-fetch-dest", "empty".to_string()),
        ("sec-fetch-mode", "cors".to_string()),
        ("sec-fetch-site", "same-site".to_string()),
        ("user-agent", CHROME_USER_AGENT.to_string()),
    ]
}

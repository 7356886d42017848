//! Unverified JWT inspection.
//!
//! Bearer tokens reaching the authorization handler have already been verified by the
//! authentication layer in front of it. The payload is decoded here only to read the
//! issuer; no signature, expiry or audience check is made.

use crate::errors::AuthzError;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::{Map, Value};
use url::Url;

const REALMS_SEGMENT: &str = "/realms/";

/// Decode the claims of a compact JWS without verifying it
pub fn decode_claims_unverified(token: &str) -> Result<Map<String, Value>, AuthzError> {
    let segments: Vec<&str> = token.split('.').collect();
    let [_, payload, _] = segments.as_slice() else {
        return Err(AuthzError::InvalidToken(format!(
            "expected 3 segments, found {}",
            segments.len()
        )));
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| AuthzError::InvalidToken(format!("payload is not base64url: {}", e)))?;
    match serde_json::from_slice(&bytes) {
        Ok(Value::Object(claims)) => Ok(claims),
        Ok(_) => Err(AuthzError::InvalidToken(
            "payload is not a JSON object".to_string(),
        )),
        Err(e) => Err(AuthzError::InvalidToken(format!(
            "payload is not valid JSON: {}",
            e
        ))),
    }
}

/// Read the `iss` claim of a bearer token
pub fn issuer(token: &str) -> Result<String, AuthzError> {
    decode_claims_unverified(token)?
        .get("iss")
        .and_then(Value::as_str)
        .filter(|iss| !iss.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| AuthzError::InvalidToken("missing iss claim".to_string()))
}

/// Split a Keycloak issuer such as `https://sso.example.com/realms/tenant` into the server
/// base URL and the realm name.
///
/// A path prefix before `/realms/` (legacy `/auth` deployments) stays part of the base URL.
pub fn split_issuer(issuer: &str) -> Result<(String, String), AuthzError> {
    let url = Url::parse(issuer)
        .map_err(|e| AuthzError::InvalidToken(format!("issuer '{}' is not a URL: {}", issuer, e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(AuthzError::InvalidToken(format!(
            "issuer '{}' is not an http(s) URL",
            issuer
        )));
    }
    let host = url
        .host_str()
        .ok_or_else(|| AuthzError::InvalidToken(format!("issuer '{}' has no host", issuer)))?;

    let path = url.path();
    let (prefix, realm) = path
        .find(REALMS_SEGMENT)
        .map(|idx| (&path[..idx], &path[idx + REALMS_SEGMENT.len()..]))
        .ok_or_else(|| {
            AuthzError::InvalidToken(format!("issuer '{}' does not name a realm", issuer))
        })?;
    let realm = urlencoding::decode(realm.trim_end_matches('/')).map_err(|e| {
        AuthzError::InvalidToken(format!("issuer '{}' realm is not UTF-8: {}", issuer, e))
    })?;
    if realm.is_empty() || realm.contains('/') {
        return Err(AuthzError::InvalidToken(format!(
            "issuer '{}' does not name a realm",
            issuer
        )));
    }

    let mut base_url = format!("{}://{}", url.scheme(), host);
    if let Some(port) = url.port() {
        base_url.push_str(&format!(":{}", port));
    }
    base_url.push_str(prefix);

    Ok((base_url, realm.into_owned()))
}

//! Token-body subject projection.
//!
//! A subject may be identified by an access token instead of discrete
//! attributes. The PDP receives the token payload as-is; the cache keys on the
//! decoded claims so that two tokens for the same identity share entries even
//! though their `iat`/`exp` differ.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::Value;

use crate::attributes::{Attributes, ID, SCOPE};
use crate::error::{PepError, PepResult};

/// Claims used for cache keys when the pattern names no subject attributes.
pub const DEFAULT_KEY_CLAIMS: [&str; 2] = [ID, SCOPE];

/// A subject identified by an access token payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenSubject {
    body: String,
    claims: Attributes,
}

impl TokenSubject {
    /// Build a token subject from a compact JWT (`header.body.signature`).
    pub fn from_token(token: &str) -> PepResult<Self> {
        let body = token_body(token)?;
        Self::from_body(body)
    }

    /// Build a token subject from a base64url-encoded payload.
    pub fn from_body(body: &str) -> PepResult<Self> {
        let claims = decode_claims(body)?;
        Ok(Self {
            body: body.to_string(),
            claims,
        })
    }

    /// The encoded payload, as sent to the PDP.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// All decoded claims.
    pub fn claims(&self) -> &Attributes {
        &self.claims
    }

    /// The `id` claim.
    pub fn id(&self) -> Option<&str> {
        self.claims.get_str(ID)
    }

    /// The `scope` claim.
    pub fn scope(&self) -> Option<&str> {
        self.claims.get_str(SCOPE)
    }

    /// Claims that contribute to cache keys.
    ///
    /// `named` lists the claim names the cache key pattern mentions. When it
    /// is empty, [`DEFAULT_KEY_CLAIMS`] is used.
    pub fn key_claims<'a>(&self, named: impl IntoIterator<Item = &'a str>) -> Attributes {
        let mut named: Vec<&str> = named.into_iter().collect();
        if named.is_empty() {
            named.extend(DEFAULT_KEY_CLAIMS);
        }
        self.claims.retain_names(|name| named.contains(&name))
    }
}

/// Extract the payload section of a compact JWT.
pub fn token_body(token: &str) -> PepResult<&str> {
    let token = token.trim();
    if token.is_empty() {
        return Err(PepError::invalid_input("access token is empty"));
    }

    let sections: Vec<&str> = token.split('.').collect();
    if sections.len() != 3 {
        return Err(PepError::invalid_input(format!(
            "access token must have 3 dot-separated sections, found {}",
            sections.len()
        )));
    }

    let body = sections[1];
    if body.is_empty() {
        return Err(PepError::invalid_input("access token body is empty"));
    }

    Ok(body)
}

/// Decode a base64url payload into its claims.
///
/// Trailing `=` padding is tolerated.
pub fn decode_claims(body: &str) -> PepResult<Attributes> {
    let trimmed = body.trim_end_matches('=');
    if trimmed.is_empty() {
        return Err(PepError::invalid_input("access token body is empty"));
    }

    let bytes = URL_SAFE_NO_PAD.decode(trimmed).map_err(|e| {
        PepError::invalid_input(format!("access token body is not valid base64url: {e}"))
    })?;

    let value: Value = serde_json::from_slice(&bytes).map_err(|e| {
        PepError::invalid_input(format!("access token body is not valid JSON: {e}"))
    })?;

    match value {
        Value::Object(map) => Ok(map.into_iter().collect()),
        other => Err(PepError::invalid_input(format!(
            "access token body must be a JSON object, found {}",
            json_kind(&other)
        ))),
    }
}

/// Encode claims as a base64url payload without padding.
pub fn encode_claims(claims: &Attributes) -> PepResult<String> {
    let json = serde_json::to_vec(claims)
        .map_err(|e| PepError::internal(format!("failed to encode claims: {e}")))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwt(claims: &serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims).unwrap());
        format!("{header}.{body}.c2lnbmF0dXJl")
    }

    #[test]
    fn test_from_token_extracts_claims() {
        let token = jwt(&serde_json::json!({
            "id": "IBMid-1234",
            "scope": "ibm openid",
            "iat": 1700000000,
            "exp": 1700003600
        }));

        let subject = TokenSubject::from_token(&token).unwrap();
        assert_eq!(subject.id(), Some("IBMid-1234"));
        assert_eq!(subject.scope(), Some("ibm openid"));
        assert_eq!(subject.claims().get_str("exp"), Some("1700003600"));
        assert_eq!(subject.body(), token.split('.').nth(1).unwrap());
    }

    #[test]
    fn test_key_claims_default_to_id_and_scope() {
        let token = jwt(&serde_json::json!({"id": "a", "scope": "s", "iat": 1}));
        let subject = TokenSubject::from_token(&token).unwrap();

        let keyed = subject.key_claims([]);
        assert_eq!(keyed.names().collect::<Vec<_>>(), vec!["id", "scope"]);

        let keyed = subject.key_claims(["id"]);
        assert_eq!(keyed.names().collect::<Vec<_>>(), vec!["id"]);
    }

    #[test]
    fn test_rejects_empty_token() {
        let err = TokenSubject::from_token("  ").unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_rejects_wrong_section_count() {
        let err = token_body("a.b").unwrap_err();
        assert!(err.to_string().contains("found 2"));
        assert!(token_body("a.b.c.d").is_err());
    }

    #[test]
    fn test_rejects_empty_body() {
        let err = token_body("header..signature").unwrap_err();
        assert!(err.to_string().contains("body is empty"));
    }

    #[test]
    fn test_rejects_non_object_body() {
        let body = URL_SAFE_NO_PAD.encode(b"[1,2]");
        let err = decode_claims(&body).unwrap_err();
        assert!(err.to_string().contains("an array"));
        assert!(decode_claims("!!!").is_err());
    }

    #[test]
    fn test_padding_is_tolerated() {
        let body = base64::engine::general_purpose::URL_SAFE.encode(br#"{"id":"x"}"#);
        let claims = decode_claims(&body).unwrap();
        assert_eq!(claims.get_str("id"), Some("x"));
    }

    #[test]
    fn test_claims_round_trip() {
        let token = jwt(&serde_json::json!({"id": "u", "scope": "ibm", "iat": 5}));
        let subject = TokenSubject::from_token(&token).unwrap();

        let encoded = encode_claims(subject.claims()).unwrap();
        let decoded = decode_claims(&encoded).unwrap();
        assert_eq!(&decoded, subject.claims());
        assert_eq!(
            subject.key_claims([]),
            TokenSubject::from_body(&encoded).unwrap().key_claims([])
        );
    }
}

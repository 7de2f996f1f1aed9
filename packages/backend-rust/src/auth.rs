use axum::http::{header, HeaderMap};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{NaiveDateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

use crate::store::UserId;

const AUTH_COOKIE_NAME: &str = "auth_token";

type HmacSha256 = Hmac<Sha256>;

/// The account acting on a request. Accounts live outside this service; the
/// token is the only proof of identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub id: UserId,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing token")]
    MissingToken,
    #[error("invalid token")]
    InvalidToken,
    #[error("missing JWT_SECRET")]
    MissingSecret,
    #[error("invalid token lifetime")]
    InvalidExpiresIn,
}

pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = get_cookie(headers, AUTH_COOKIE_NAME) {
        return Some(token);
    }

    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())?;

    auth_header
        .strip_prefix("Bearer ")
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Verify the request's token against `JWT_SECRET`.
pub fn verify_request_token(headers: &HeaderMap) -> Result<AuthUser, AuthError> {
    let token = extract_token(headers).ok_or(AuthError::MissingToken)?;
    let secret = std::env::var("JWT_SECRET").map_err(|_| AuthError::MissingSecret)?;
    verify_jwt_hs256(&token, &secret)
}

pub fn verify_jwt_hs256(token: &str, secret: &str) -> Result<AuthUser, AuthError> {
    let mut parts = token.split('.');
    let header_b64 = parts.next().ok_or(AuthError::InvalidToken)?;
    let payload_b64 = parts.next().ok_or(AuthError::InvalidToken)?;
    let sig_b64 = parts.next().ok_or(AuthError::InvalidToken)?;
    if parts.next().is_some() {
        return Err(AuthError::InvalidToken);
    }

    let header_bytes = URL_SAFE_NO_PAD
        .decode(header_b64.as_bytes())
        .map_err(|_| AuthError::InvalidToken)?;
    let payload_bytes = URL_SAFE_NO_PAD
        .decode(payload_b64.as_bytes())
        .map_err(|_| AuthError::InvalidToken)?;
    let sig_bytes = URL_SAFE_NO_PAD
        .decode(sig_b64.as_bytes())
        .map_err(|_| AuthError::InvalidToken)?;

    let header_json: serde_json::Value =
        serde_json::from_slice(&header_bytes).map_err(|_| AuthError::InvalidToken)?;
    let alg = header_json
        .get("alg")
        .and_then(|value| value.as_str())
        .ok_or(AuthError::InvalidToken)?;
    if alg != "HS256" {
        return Err(AuthError::InvalidToken);
    }

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| AuthError::InvalidToken)?;
    mac.update(format!("{header_b64}.{payload_b64}").as_bytes());
    mac.verify_slice(&sig_bytes)
        .map_err(|_| AuthError::InvalidToken)?;

    let payload_json: serde_json::Value =
        serde_json::from_slice(&payload_bytes).map_err(|_| AuthError::InvalidToken)?;

    validate_registered_claims(&payload_json)?;

    let id = payload_json
        .get("userId")
        .and_then(parse_user_id)
        .ok_or(AuthError::InvalidToken)?;

    Ok(AuthUser { id })
}

// Older clients send the id as a string.
fn parse_user_id(value: &serde_json::Value) -> Option<UserId> {
    match value {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|id| *id > 0)
}

fn validate_registered_claims(payload: &serde_json::Value) -> Result<(), AuthError> {
    let now = Utc::now().timestamp();

    if let Some(exp) = payload.get("exp").and_then(|value| value.as_i64()) {
        if now >= exp {
            return Err(AuthError::InvalidToken);
        }
    }

    if let Some(nbf) = payload.get("nbf").and_then(|value| value.as_i64()) {
        if now < nbf {
            return Err(AuthError::InvalidToken);
        }
    }

    Ok(())
}

pub fn sign_jwt_with_secret(
    user_id: UserId,
    secret: &str,
    expires_in: &str,
) -> Result<(String, NaiveDateTime), AuthError> {
    let expires_in_ms = parse_expires_in_ms(expires_in)?;

    let issued_at = Utc::now();
    let exp = issued_at
        .checked_add_signed(chrono::Duration::milliseconds(expires_in_ms))
        .ok_or(AuthError::InvalidExpiresIn)?;

    let header_json = serde_json::json!({
        "alg": "HS256",
        "typ": "JWT",
    });

    let payload_json = serde_json::json!({
        "userId": user_id,
        "iat": issued_at.timestamp(),
        "exp": exp.timestamp(),
    });

    let header_b64 = URL_SAFE_NO_PAD
        .encode(serde_json::to_vec(&header_json).map_err(|_| AuthError::InvalidToken)?);
    let payload_b64 = URL_SAFE_NO_PAD
        .encode(serde_json::to_vec(&payload_json).map_err(|_| AuthError::InvalidToken)?);
    let signing_input = format!("{header_b64}.{payload_b64}");

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| AuthError::InvalidToken)?;
    mac.update(signing_input.as_bytes());
    let sig_b64 = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok((format!("{signing_input}.{sig_b64}"), exp.naive_utc()))
}

pub fn parse_expires_in_ms(value: &str) -> Result<i64, AuthError> {
    let trimmed = value.trim();
    if trimmed.len() < 2 {
        return Err(AuthError::InvalidExpiresIn);
    }

    let (digits, unit) = trimmed.split_at(trimmed.len() - 1);

    let amount: i64 = digits.parse().map_err(|_| AuthError::InvalidExpiresIn)?;
    if amount <= 0 {
        return Err(AuthError::InvalidExpiresIn);
    }

    let unit_ms = match unit {
        "s" => 1000,
        "m" => 60 * 1000,
        "h" => 60 * 60 * 1000,
        "d" => 24 * 60 * 60 * 1000,
        _ => return Err(AuthError::InvalidExpiresIn),
    };
    amount
        .checked_mul(unit_ms)
        .ok_or(AuthError::InvalidExpiresIn)
}

fn get_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    raw.split(';')
        .filter_map(|part| part.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const SECRET: &str = "test-secret";

    fn encode(value: serde_json::Value) -> String {
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(&value).unwrap())
    }

    fn signed(header: serde_json::Value, payload: serde_json::Value) -> String {
        let input = format!("{}.{}", encode(header), encode(payload));
        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(input.as_bytes());
        format!("{input}.{}", URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn test_sign_then_verify() {
        let (token, expires_at) = sign_jwt_with_secret(42, SECRET, "1h").unwrap();
        assert!(expires_at > Utc::now().naive_utc());
        assert_eq!(verify_jwt_hs256(&token, SECRET).unwrap(), AuthUser { id: 42 });
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let (token, _) = sign_jwt_with_secret(42, SECRET, "1h").unwrap();
        assert!(matches!(
            verify_jwt_hs256(&token, "other"),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let token = signed(
            serde_json::json!({"alg": "HS256", "typ": "JWT"}),
            serde_json::json!({"userId": 1, "exp": Utc::now().timestamp() - 10}),
        );
        assert!(verify_jwt_hs256(&token, SECRET).is_err());
    }

    #[test]
    fn test_other_algorithms_are_rejected() {
        let token = signed(
            serde_json::json!({"alg": "none"}),
            serde_json::json!({"userId": 1}),
        );
        assert!(verify_jwt_hs256(&token, SECRET).is_err());
    }

    #[test]
    fn test_string_user_id_is_accepted() {
        let token = signed(
            serde_json::json!({"alg": "HS256"}),
            serde_json::json!({"userId": "17"}),
        );
        assert_eq!(verify_jwt_hs256(&token, SECRET).unwrap().id, 17);

        let token = signed(
            serde_json::json!({"alg": "HS256"}),
            serde_json::json!({"userId": "abc"}),
        );
        assert!(verify_jwt_hs256(&token, SECRET).is_err());
    }

    #[test]
    fn test_extract_token_prefers_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        assert_eq!(extract_token(&headers).as_deref(), Some("from-header"));

        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; auth_token=from-cookie"),
        );
        assert_eq!(extract_token(&headers).as_deref(), Some("from-cookie"));
    }

    #[test]
    fn test_parse_expires_in() {
        assert_eq!(parse_expires_in_ms("30s").unwrap(), 30_000);
        assert_eq!(parse_expires_in_ms("24h").unwrap(), 86_400_000);
        assert_eq!(parse_expires_in_ms("7d").unwrap(), 604_800_000);
        assert!(parse_expires_in_ms("h").is_err());
        assert!(parse_expires_in_ms("0m").is_err());
        assert!(parse_expires_in_ms("10w").is_err());
    }
}

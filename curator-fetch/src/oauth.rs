//! OAuth 1.0a request signing (HMAC-SHA1).

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use ring::hmac;
use ring::rand::{SecureRandom, SystemRandom};

use crate::error::HttpError;

/// Credentials needed to sign a user context request.
#[derive(Clone, Copy)]
pub struct OAuthCredentials<'a> {
    /// Consumer key.
    pub consumer_key: &'a str,
    /// Consumer secret.
    pub consumer_secret: &'a str,
    /// Access token.
    pub token: &'a str,
    /// Access token secret.
    pub token_secret: &'a str,
}

/// Characters escaped in OAuth parameters: everything but RFC 3986 unreserved.
const OAUTH_ESCAPED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Percent-encodes a string per RFC 3986 (unreserved characters kept).
pub fn percent_encode(input: &str) -> String {
    utf8_percent_encode(input, OAUTH_ESCAPED).to_string()
}

/// Generates a random nonce.
pub fn generate_nonce() -> Result<String, HttpError> {
    let mut bytes = [0u8; 16];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| HttpError::Signature("no randomness available".to_string()))?;
    Ok(bytes.iter().map(|b| format!("{b:02x}")).collect())
}

fn oauth_parameters<'a>(
    credentials: &OAuthCredentials<'a>,
    nonce: &'a str,
    timestamp: &'a str,
) -> [(&'static str, &'a str); 6] {
    [
        ("oauth_consumer_key", credentials.consumer_key),
        ("oauth_nonce", nonce),
        ("oauth_signature_method", "HMAC-SHA1"),
        ("oauth_timestamp", timestamp),
        ("oauth_token", credentials.token),
        ("oauth_version", "1.0"),
    ]
}

/// Builds the signature base string.
///
/// `base_url` must not carry a query string; query and body parameters go
/// in `params`.
pub fn signature_base_string(
    method: &str,
    base_url: &str,
    params: &[(String, String)],
    credentials: &OAuthCredentials<'_>,
    nonce: &str,
    timestamp: u64,
) -> String {
    let timestamp = timestamp.to_string();
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(key, value)| (percent_encode(key), percent_encode(value)))
        .chain(
            oauth_parameters(credentials, nonce, &timestamp)
                .iter()
                .map(|(key, value)| (percent_encode(key), percent_encode(value))),
        )
        .collect();
    encoded.sort();

    let parameter_string = encoded
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        percent_encode(base_url),
        percent_encode(&parameter_string)
    )
}

/// Signs a base string with the consumer and token secrets.
pub fn sign(base_string: &str, consumer_secret: &str, token_secret: &str) -> String {
    let signing_key = format!(
        "{}&{}",
        percent_encode(consumer_secret),
        percent_encode(token_secret)
    );
    let key = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, signing_key.as_bytes());
    STANDARD.encode(hmac::sign(&key, base_string.as_bytes()).as_ref())
}

/// Builds the `Authorization` header value of a signed request.
pub fn authorization_header(
    method: &str,
    base_url: &str,
    params: &[(String, String)],
    credentials: &OAuthCredentials<'_>,
    nonce: &str,
    timestamp: u64,
) -> String {
    let base = signature_base_string(method, base_url, params, credentials, nonce, timestamp);
    let signature = sign(&base, credentials.consumer_secret, credentials.token_secret);

    let timestamp = timestamp.to_string();
    let mut fields: Vec<String> = oauth_parameters(credentials, nonce, &timestamp)
        .iter()
        .map(|(key, value)| format!("{}=\"{}\"", percent_encode(key), percent_encode(value)))
        .collect();
    fields.push(format!("oauth_signature=\"{}\"", percent_encode(&signature)));
    fields.sort();

    format!("OAuth {}", fields.join(", "))
}

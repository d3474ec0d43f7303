//! REST client for the v1.1 API.
//!
//! User tokens are signed with OAuth 1.0a; application tokens are sent as
//! bearer tokens. Error bodies are classified into [`ApiError`].

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use curator_core::{
    ApiEndpoint, CurationSelectors, MemberProfile, PageOptions, Publication, PublicationId,
    RateLimitStatus, Token, TokenKind,
};
use reqwest::{Client, StatusCode, header};
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use crate::api::{PublicationApi, timeline_endpoint};
use crate::error::{ApiError, HttpError};
use crate::oauth::{OAuthCredentials, authorization_header, generate_nonce};
use crate::retry::RetryStrategy;

/// Default API base url.
pub const DEFAULT_BASE_URL: &str = "https://api.twitter.com/1.1/";

/// Default request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// User agent string for the curator.
const USER_AGENT: &str = concat!("curator/", env!("CARGO_PKG_VERSION"));

/// Header carrying the epoch second at which the rate limit window resets.
const RATE_LIMIT_RESET_HEADER: &str = "x-rate-limit-reset";

/// Date format of `created_at` fields.
const CREATED_AT_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

// ============================================================================
// Client
// ============================================================================

/// Consumer credentials used when a token does not carry its own.
#[derive(Clone)]
struct Consumer {
    key: String,
    secret: String,
}

/// HTTP implementation of [`PublicationApi`].
#[derive(Clone)]
pub struct TwitterClient {
    inner: Client,
    base_url: Url,
    consumer: Option<Consumer>,
    retry: RetryStrategy,
}

impl TwitterClient {
    /// Creates a client for `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, HttpError> {
        let mut base_url = Url::parse(base_url).map_err(|e| HttpError::InvalidUrl(e.to_string()))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let inner = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            inner,
            base_url,
            consumer: None,
            retry: RetryStrategy::default(),
        })
    }

    /// Creates a client for the public API.
    pub fn with_defaults() -> Result<Self, HttpError> {
        Self::new(DEFAULT_BASE_URL, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Sets the consumer credentials used for tokens without their own.
    pub fn with_consumer(mut self, key: impl Into<String>, secret: impl Into<String>) -> Self {
        self.consumer = Some(Consumer {
            key: key.into(),
            secret: secret.into(),
        });
        self
    }

    /// Sets the retry strategy for transient failures.
    pub fn with_retry(mut self, retry: RetryStrategy) -> Self {
        self.retry = retry;
        self
    }

    /// Base url requests are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint_url(&self, endpoint: ApiEndpoint) -> Result<Url, HttpError> {
        self.base_url
            .join(endpoint.path())
            .map_err(|e| HttpError::InvalidUrl(e.to_string()))
    }

    fn authorization(&self, token: &Token, url: &Url, params: &[(String, String)]) -> Result<String, ApiError> {
        if token.kind == TokenKind::Application {
            return Ok(format!("Bearer {}", token.access_token));
        }

        let (consumer_key, consumer_secret) = match (&token.consumer_key, &token.consumer_secret) {
            (Some(key), Some(secret)) => (key.as_str(), secret.as_str()),
            _ => match &self.consumer {
                Some(consumer) => (consumer.key.as_str(), consumer.secret.as_str()),
                None => {
                    return Err(ApiError::BadAuthentication {
                        code: None,
                        message: "no consumer credentials for token".to_string(),
                    });
                }
            },
        };

        let credentials = OAuthCredentials {
            consumer_key,
            consumer_secret,
            token: &token.access_token,
            token_secret: &token.access_token_secret,
        };
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs());
        let nonce = generate_nonce()?;

        Ok(authorization_header(
            "GET",
            url.as_str(),
            params,
            &credentials,
            &nonce,
            timestamp,
        ))
    }

    async fn get(&self, token: &Token, endpoint: ApiEndpoint, params: Vec<(String, String)>) -> Result<Value, ApiError> {
        self.retry
            .run(endpoint.path(), || self.get_once(token, endpoint, &params))
            .await
    }

    #[instrument(skip(self, token, params), fields(endpoint = %endpoint, token = token.prefix()))]
    async fn get_once(&self, token: &Token, endpoint: ApiEndpoint, params: &[(String, String)]) -> Result<Value, ApiError> {
        let url = self.endpoint_url(endpoint)?;
        let authorization = self.authorization(token, &url, params)?;

        let mut request_url = url.clone();
        if !params.is_empty() {
            request_url.query_pairs_mut().extend_pairs(params.iter());
        }

        debug!("GET request");
        let response = self
            .inner
            .get(request_url)
            .header(header::AUTHORIZATION, authorization)
            .send()
            .await
            .map_err(HttpError::from)?;

        let status = response.status();
        let reset_at = reset_from_headers(response.headers());
        let body = response.text().await.map_err(HttpError::from)?;
        debug!(status = %status, bytes = body.len(), "Response received");

        if body.trim().is_empty() {
            if status.is_success() {
                return Err(ApiError::EmptyReply);
            }
            return Err(classify_status(status, endpoint, reset_at, String::new()));
        }

        let value: Value = match serde_json::from_str(&body) {
            Ok(value) => value,
            Err(err) if status.is_success() => return Err(ApiError::InvalidResponse(err.to_string())),
            Err(_) => return Err(classify_status(status, endpoint, reset_at, body)),
        };

        if let Some(err) = classify_body(status, &value, endpoint, reset_at) {
            return Err(err);
        }
        if !status.is_success() {
            return Err(classify_status(status, endpoint, reset_at, body));
        }

        Ok(value)
    }
}

// ============================================================================
// Error Classification
// ============================================================================

fn reset_from_headers(headers: &header::HeaderMap) -> Option<DateTime<Utc>> {
    headers
        .get(RATE_LIMIT_RESET_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<i64>().ok())
        .and_then(|epoch| Utc.timestamp_opt(epoch, 0).single())
}

/// Classifies an error body, returning `None` when the body carries no error.
pub fn classify_body(
    status: StatusCode,
    body: &Value,
    endpoint: ApiEndpoint,
    reset_at: Option<DateTime<Utc>>,
) -> Option<ApiError> {
    if let Some(first) = body
        .get("errors")
        .and_then(Value::as_array)
        .and_then(|errors| errors.first())
    {
        let code = first
            .get("code")
            .and_then(Value::as_u64)
            .and_then(|code| u32::try_from(code).ok());
        let message = first
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        return Some(match code {
            Some(code) => match ApiError::from_code(code, message, status.as_u16()) {
                ApiError::RateLimited { .. } => ApiError::RateLimited { reset_at },
                other => other,
            },
            None => classify_status(status, endpoint, reset_at, message),
        });
    }

    body.get("error").map(|error| {
        let message = error
            .as_str()
            .map_or_else(|| error.to_string(), ToString::to_string);
        ApiError::Protected(message)
    })
}

fn classify_status(
    status: StatusCode,
    endpoint: ApiEndpoint,
    reset_at: Option<DateTime<Utc>>,
    message: String,
) -> ApiError {
    let timeline = matches!(endpoint, ApiEndpoint::UserTimeline | ApiEndpoint::Likes);
    match status {
        StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited { reset_at },
        StatusCode::UNAUTHORIZED if timeline => ApiError::Protected(message),
        StatusCode::UNAUTHORIZED => ApiError::BadAuthentication { code: None, message },
        StatusCode::NOT_FOUND => ApiError::MemberNotFound(message),
        status if status.is_server_error() => ApiError::OverCapacity { code: None, message },
        status => ApiError::Unknown {
            status: status.as_u16(),
            code: None,
            message,
        },
    }
}

// ============================================================================
// Response Parsing
// ============================================================================

/// Parses a `created_at` field.
pub fn parse_created_at(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(raw, CREATED_AT_FORMAT)
        .ok()
        .map(|date| date.with_timezone(&Utc))
}

fn parse_publication(raw: Value) -> Result<Publication, ApiError> {
    let id = raw
        .get("id_str")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| raw.get("id").and_then(Value::as_u64).map(|id| id.to_string()))
        .ok_or_else(|| ApiError::InvalidResponse("publication without id".to_string()))?;
    let id = PublicationId::parse(&id).map_err(|e| ApiError::InvalidResponse(e.to_string()))?;

    let screen_name = raw
        .pointer("/user/screen_name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let text = raw
        .get("full_text")
        .or_else(|| raw.get("text"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let created_at = raw
        .get("created_at")
        .and_then(Value::as_str)
        .and_then(parse_created_at);

    Ok(Publication {
        id,
        screen_name,
        text,
        created_at,
        raw,
    })
}

fn parse_rate_limit(body: &Value, endpoint: ApiEndpoint) -> Result<RateLimitStatus, ApiError> {
    let resources = body
        .get("resources")
        .and_then(|resources| resources.get(endpoint.resource_family()))
        .ok_or_else(|| {
            ApiError::InvalidResponse(format!("no rate limit for {}", endpoint.resource_family()))
        })?;
    let entry = resources
        .get(endpoint.resource_key())
        .ok_or_else(|| ApiError::InvalidResponse(format!("no rate limit for {}", endpoint.resource_key())))?;

    let read = |field: &str| {
        entry
            .get(field)
            .and_then(Value::as_u64)
            .ok_or_else(|| ApiError::InvalidResponse(format!("rate limit without {field}")))
    };
    let limit = u32::try_from(read("limit")?).unwrap_or(u32::MAX);
    let remaining = u32::try_from(read("remaining")?).unwrap_or(u32::MAX);
    let reset_at = entry
        .get("reset")
        .and_then(Value::as_i64)
        .and_then(|epoch| Utc.timestamp_opt(epoch, 0).single());

    Ok(RateLimitStatus {
        limit,
        remaining,
        reset_at,
    })
}

fn page_params(selectors: &CurationSelectors, options: &PageOptions) -> Vec<(String, String)> {
    let mut params = vec![
        ("screen_name".to_string(), selectors.screen_name().to_string()),
        ("count".to_string(), options.count.to_string()),
        ("tweet_mode".to_string(), "extended".to_string()),
    ];
    if selectors.fetch_likes() {
        params.push(("include_entities".to_string(), "true".to_string()));
    } else {
        params.push(("include_rts".to_string(), "1".to_string()));
        params.push(("exclude_replies".to_string(), "0".to_string()));
    }
    if let Some(max_id) = &options.max_id {
        params.push(("max_id".to_string(), max_id.to_string()));
    }
    if let Some(since_id) = &options.since_id {
        params.push(("since_id".to_string(), since_id.to_string()));
    }
    params
}

// ============================================================================
// PublicationApi
// ============================================================================

#[async_trait]
impl PublicationApi for TwitterClient {
    async fn fetch_page(
        &self,
        token: &Token,
        selectors: &CurationSelectors,
        options: &PageOptions,
    ) -> Result<Vec<Publication>, ApiError> {
        let endpoint = timeline_endpoint(selectors);
        let body = self.get(token, endpoint, page_params(selectors, options)).await?;

        let Value::Array(items) = body else {
            return Err(ApiError::InvalidResponse("timeline is not an array".to_string()));
        };
        items.into_iter().map(parse_publication).collect()
    }

    async fn check_rate_limit(&self, token: &Token, endpoint: ApiEndpoint) -> Result<RateLimitStatus, ApiError> {
        let params = vec![("resources".to_string(), endpoint.resource_family().to_string())];
        let body = self.get(token, ApiEndpoint::RateLimitStatus, params).await?;
        parse_rate_limit(&body, endpoint)
    }

    async fn fetch_member_profile(&self, token: &Token, screen_name: &str) -> Result<MemberProfile, ApiError> {
        let params = vec![("screen_name".to_string(), screen_name.to_string())];
        let body = self.get(token, ApiEndpoint::UserShow, params).await?;
        serde_json::from_value(body).map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }
}

// ============================================================================
// Tests
// ============================================================================

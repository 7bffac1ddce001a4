use std::net::SocketAddr;
use std::sync::Arc;

use http::header::{HeaderValue, AUTHORIZATION, RETRY_AFTER, WWW_AUTHENTICATE};
use http::{HeaderMap, Method, StatusCode, Uri};
use hyper::body::Incoming;
use hyper::{Request, Response};
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{debug, warn};

use crate::engine::{ConnInfo, HandlerFuture, RequestHandler, RespBody};
use crate::proxy::synthetic_response::text_response_with_headers;
use crate::security::identity::client_identity;
use crate::security::rate_limit::IdentityRateLimiter;

const BEARER_PREFIX: &str = "Bearer ";
const TOKEN_QUERY_PARAM: &str = "token";

/// Seconds advertised in `Retry-After` on throttled requests
pub const RETRY_AFTER_SECS: u64 = 300;

/// Why a request was turned away
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing or invalid bearer token")]
    Unauthorized,

    #[error("too many authentication attempts")]
    RateLimited,
}

impl From<AuthError> for StatusCode {
    fn from(e: AuthError) -> StatusCode {
        match e {
            AuthError::Unauthorized => StatusCode::UNAUTHORIZED,
            AuthError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }
}

/// Bearer-token check shared by every protected route
pub struct AuthMiddleware {
    limiter: Arc<IdentityRateLimiter>,
    secret: String,
    challenge: HeaderValue,
}

impl AuthMiddleware {
    pub fn new(limiter: Arc<IdentityRateLimiter>, secret: impl Into<String>, realm: &str) -> Self {
        let challenge = HeaderValue::from_str(&format!("Bearer realm=\"{realm}\""))
            .unwrap_or_else(|_| HeaderValue::from_static("Bearer"));
        Self { limiter, secret: secret.into(), challenge }
    }

    pub fn limiter(&self) -> &Arc<IdentityRateLimiter> {
        &self.limiter
    }

    /// Decides whether a request may reach the protected handler.
    ///
    /// Every request first counts as a failed attempt, so a locked identity is
    /// rejected before its credential is looked at. A matching credential then
    /// clears the identity's history. Returns the client identity on success.
    pub fn authorize(
        &self,
        headers: &HeaderMap,
        uri: &Uri,
        method: &Method,
        peer: SocketAddr,
    ) -> Result<String, AuthError> {
        let identity = client_identity(headers, peer);
        let path = uri.path();

        if !self.limiter.check_and_record(&identity, false) {
            warn!(
                client_ip = %identity,
                remote_addr = %peer,
                path,
                %method,
                "authentication rate limit exceeded"
            );
            return Err(AuthError::RateLimited);
        }

        let token = extract_token(headers, uri);
        let valid = token
            .as_deref()
            .is_some_and(|t| !t.is_empty() && bool::from(t.as_bytes().ct_eq(self.secret.as_bytes())));

        if !valid {
            warn!(
                client_ip = %identity,
                remote_addr = %peer,
                path,
                %method,
                has_auth_header = headers.contains_key(AUTHORIZATION),
                "authentication failed: missing or invalid bearer token"
            );
            return Err(AuthError::Unauthorized);
        }

        self.limiter.check_and_record(&identity, true);
        debug!(client_ip = %identity, path, %method, "authentication succeeded");
        Ok(identity)
    }

    /// Terminal response for a rejected request
    pub fn rejection_response(&self, err: AuthError) -> Response<RespBody> {
        match err {
            AuthError::Unauthorized => text_response_with_headers(
                StatusCode::UNAUTHORIZED,
                "Unauthorized: Missing or invalid Bearer token",
                &[(WWW_AUTHENTICATE, self.challenge.clone())],
            ),
            AuthError::RateLimited => text_response_with_headers(
                StatusCode::TOO_MANY_REQUESTS,
                "Too many authentication attempts. Please try again later.",
                &[(RETRY_AFTER, HeaderValue::from(RETRY_AFTER_SECS))],
            ),
        }
    }
}

/// Bearer credential from the `Authorization` header, falling back to the
/// `token` query parameter
pub fn extract_token(headers: &HeaderMap, uri: &Uri) -> Option<String> {
    let from_header = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix(BEARER_PREFIX))
        .filter(|t| !t.is_empty());
    if let Some(token) = from_header {
        return Some(token.to_string());
    }

    let query = uri.query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == TOKEN_QUERY_PARAM)
        .map(|(_, value)| value.into_owned())
}

/// Masks a secret for logging: only the first and last two characters
/// survive, and secrets of eight characters or fewer are hidden entirely
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "***".to_string();
    }
    let head: String = chars[..2].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{head}***{tail}")
}

/// Wraps a handler so it only runs for authenticated requests
pub struct Authenticated<H> {
    auth: Arc<AuthMiddleware>,
    inner: H,
}

impl<H> Authenticated<H> {
    pub fn new(auth: Arc<AuthMiddleware>, inner: H) -> Self {
        Self { auth, inner }
    }
}

impl<H: RequestHandler> RequestHandler for Authenticated<H> {
    fn handle(&self, req: Request<Incoming>, conn: ConnInfo) -> HandlerFuture {
        match self.auth.authorize(req.headers(), req.uri(), req.method(), conn.peer) {
            Ok(_) => self.inner.handle(req, conn),
            Err(e) => {
                let resp = self.auth.rejection_response(e);
                Box::pin(async move { resp })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_long_secrets() {
        assert_eq!(mask_secret("abcd1234efgh5678"), "ab***78");
    }

    #[test]
    fn masked_secret_reveals_at_most_four_characters() {
        for secret in ["abcdefghi", "abcdefghij", "abcdefghijk", "abcdefghijkl"] {
            let masked = mask_secret(secret);
            let shown = masked.chars().filter(|c| *c != '*').count();
            assert_eq!(shown, 4, "{secret} -> {masked}");
            assert!(!masked.contains(&secret[2..secret.len() - 2]));
        }
        assert_eq!(mask_secret("abcdefghi"), "ab***hi");
    }

    #[test]
    fn masks_short_secrets_entirely() {
        assert_eq!(mask_secret("12345678"), "***");
        assert_eq!(mask_secret(""), "***");
    }

    #[test]
    fn header_token_takes_precedence_over_query() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        let uri: Uri = "/mcp?token=from-query".parse()?;
        assert_eq!(extract_token(&headers, &uri).as_deref(), Some("from-header"));
        Ok(())
    }

    #[test]
    fn non_bearer_header_falls_back_to_query() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        let uri: Uri = "/sse?token=a%20b%2Bc".parse()?;
        assert_eq!(extract_token(&headers, &uri).as_deref(), Some("a b+c"));
        Ok(())
    }

    #[test]
    fn bearer_prefix_is_case_sensitive() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("bearer secret"));
        let uri: Uri = "/mcp".parse()?;
        assert_eq!(extract_token(&headers, &uri), None);
        Ok(())
    }
}

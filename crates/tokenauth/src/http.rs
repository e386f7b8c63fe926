//! HTTP integration: token extraction, token headers and error bodies.
//!
//! Requests carry the token in one of these places, checked in order:
//!
//! 1. `Authorization: access_token <token>` (or `Bearer <token>`)
//! 2. the `access_token` query parameter
//! 3. the `access_token` field of a urlencoded form body
//! 4. the `access_token` cookie, when cookies are enabled

use axum::Json;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::{AUTHORIZATION, COOKIE, SET_COOKIE, WWW_AUTHENTICATE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use cookie::Cookie;
use tokenauth_storage::{Audience, Principal, Token};

use crate::config::TokenAuthConfig;
use crate::error::{AuthError, AuthResult};
use crate::manager::TokenManager;

/// Header scheme, parameter and cookie name carrying the token.
pub const TOKEN_FIELD_NAME: &str = "access_token";

const BEARER_SCHEME: &str = "Bearer";

/// Lower bound of the token cookie max-age, in seconds.
pub const MIN_COOKIE_MAX_AGE: i64 = 86_400;

/// HTTP behaviour switches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpOptions {
    /// Read the token from, and write it to, the `access_token` cookie.
    pub enable_cookie: bool,
    pub cookie_domain: Option<String>,
    /// Include the cause of server side errors in error bodies.
    pub expose_internal_errors: bool,
}

impl From<&TokenAuthConfig> for HttpOptions {
    fn from(config: &TokenAuthConfig) -> Self {
        Self {
            enable_cookie: config.enable_cookie,
            cookie_domain: config.cookie_domain.clone(),
            expose_internal_errors: config.expose_internal_errors,
        }
    }
}

// =============================================================================
// Extraction
// =============================================================================

/// Finds the token value in a request.
///
/// # Errors
///
/// Returns the token-empty validation error when no location carries a
/// non-empty token.
pub fn extract_token(
    headers: &HeaderMap,
    query: Option<&str>,
    form_body: Option<&str>,
    enable_cookie: bool,
) -> AuthResult<String> {
    from_authorization(headers)
        .or_else(|| query.and_then(from_urlencoded))
        .or_else(|| form_body.and_then(from_urlencoded))
        .or_else(|| enable_cookie.then(|| from_cookie(headers)).flatten())
        .ok_or_else(AuthError::token_empty)
}

fn from_authorization(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(AUTHORIZATION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|value| {
            let (scheme, token) = value.trim().split_once(' ')?;
            let known = scheme == TOKEN_FIELD_NAME || scheme.eq_ignore_ascii_case(BEARER_SCHEME);
            let token = token.trim();
            (known && !token.is_empty()).then(|| token.to_string())
        })
}

fn from_urlencoded(input: &str) -> Option<String> {
    url::form_urlencoded::parse(input.trim_start_matches('?').as_bytes())
        .find(|(key, value)| key == TOKEN_FIELD_NAME && !value.is_empty())
        .map(|(_, value)| value.into_owned())
}

fn from_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse_encoded)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == TOKEN_FIELD_NAME && !cookie.value().is_empty())
        .map(|cookie| cookie.value().to_string())
}

/// Extracts the token from a request and validates it.
///
/// `form_body` is the raw urlencoded body, if the caller has buffered it.
pub async fn extract_and_validate(
    manager: &TokenManager,
    parts: &Parts,
    form_body: Option<&str>,
    options: &HttpOptions,
) -> AuthResult<Token> {
    let value = extract_token(
        &parts.headers,
        parts.uri.query(),
        form_body,
        options.enable_cookie,
    )?;
    manager.validate_token(&value).await
}

// =============================================================================
// Issuing
// =============================================================================

/// Issues a token and writes it to the response headers.
pub async fn issue_and_serialize(
    manager: &TokenManager,
    principal: Principal,
    audience: &Audience,
    headers: &mut HeaderMap,
    options: &HttpOptions,
) -> AuthResult<Token> {
    let token = manager.issue(principal, audience).await?;
    write_token_headers(headers, &token, manager.now(), options)?;
    Ok(token)
}

/// Sets `Authorization: access_token <value>` and, with cookies enabled,
/// an `HttpOnly` token cookie.
///
/// # Errors
///
/// Returns `AuthError::Internal` if the token or cookie domain cannot be
/// written as a header value.
pub fn write_token_headers(
    headers: &mut HeaderMap,
    token: &Token,
    now: i64,
    options: &HttpOptions,
) -> AuthResult<()> {
    let authorization = HeaderValue::from_str(&format!("{TOKEN_FIELD_NAME} {}", token.value))
        .map_err(|e| AuthError::internal(format!("invalid authorization header: {e}")))?;
    headers.insert(AUTHORIZATION, authorization);

    if options.enable_cookie {
        let cookie = token_cookie(token, now, options.cookie_domain.as_deref());
        let value = HeaderValue::from_str(&cookie.encoded().to_string())
            .map_err(|e| AuthError::internal(format!("invalid token cookie: {e}")))?;
        headers.append(SET_COOKIE, value);
    }
    Ok(())
}

fn token_cookie(token: &Token, now: i64, domain: Option<&str>) -> Cookie<'static> {
    let max_age = token.deadline.saturating_sub(now).max(MIN_COOKIE_MAX_AGE);
    let mut cookie = Cookie::build((TOKEN_FIELD_NAME, token.value.clone()))
        .http_only(true)
        .path("/")
        .max_age(time::Duration::seconds(max_age))
        .build();
    if let Some(domain) = domain.filter(|d| !d.is_empty()) {
        cookie.set_domain(domain.to_string());
    }
    cookie
}

// =============================================================================
// Error responses
// =============================================================================

fn status_for(error: &AuthError) -> StatusCode {
    match error {
        AuthError::Validation(_) => StatusCode::BAD_REQUEST,
        AuthError::AudienceNotFound { .. }
        | AuthError::TokenNotFound
        | AuthError::TokenExpired
        | AuthError::Signature(_) => StatusCode::UNAUTHORIZED,
        AuthError::Storage { .. } | AuthError::Configuration { .. } | AuthError::Internal { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Renders `error` as a `{"code", "msg"}` JSON response.
pub fn error_response(error: &AuthError, options: &HttpOptions) -> Response {
    let status = status_for(error);
    let body = if options.expose_internal_errors {
        error.detailed_validation_error()
    } else {
        error.validation_error()
    };

    if error.is_server_error() {
        tracing::error!(error = %error, category = %error.category(), "Auth request failed");
    } else {
        tracing::debug!(code = body.code, "Auth request rejected");
    }

    let mut headers = HeaderMap::new();
    if status == StatusCode::UNAUTHORIZED {
        headers.insert(WWW_AUTHENTICATE, HeaderValue::from_static(TOKEN_FIELD_NAME));
    }
    (status, headers, Json(body)).into_response()
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        error_response(&self, &HttpOptions::default())
    }
}

// =============================================================================
// Extractor
// =============================================================================

/// State needed by the [`AuthenticatedToken`] extractor.
#[derive(Debug, Clone)]
pub struct TokenAuthState {
    pub manager: TokenManager,
    pub options: HttpOptions,
}

/// Rejection of [`AuthenticatedToken`], rendered with the state's options.
#[derive(Debug)]
pub struct AuthRejection {
    pub error: AuthError,
    expose_internal_errors: bool,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let options = HttpOptions {
            expose_internal_errors: self.expose_internal_errors,
            ..HttpOptions::default()
        };
        error_response(&self.error, &options)
    }
}

/// Axum extractor yielding the validated token of the request.
///
/// Reads the header, query and cookie locations; form bodies need
/// [`extract_and_validate`].
///
/// ```ignore
/// async fn handler(AuthenticatedToken(token): AuthenticatedToken) -> String {
///     token.principal().to_string()
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthenticatedToken(pub Token);

impl<S> FromRequestParts<S> for AuthenticatedToken
where
    S: Send + Sync,
    TokenAuthState: FromRef<S>,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = TokenAuthState::from_ref(state);
        extract_and_validate(&state.manager, parts, None, &state.options)
            .await
            .map(Self)
            .map_err(|error| AuthRejection {
                error,
                expose_internal_errors: state.options.expose_internal_errors,
            })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::to_bytes;
    use axum::http::Request;
    use tokenauth_storage::{ManualClock, StorageError};
    use tokenauth_store_memory::MemoryTokenStore;

    use super::*;
    use crate::error::{ValidationError, codes};
    use crate::manager::ManagerConfig;
    use crate::signing::DefaultScheme;

    const T0: i64 = 1_700_000_000;

    fn manager() -> TokenManager {
        let clock = Arc::new(ManualClock::new(T0));
        let store = Arc::new(MemoryTokenStore::with_clock(clock.clone()));
        TokenManager::new(store, Arc::new(DefaultScheme), ManagerConfig::default()).with_clock(clock)
    }

    fn parts(uri: &str, headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    fn header_map(pairs: &[(&str, &str)]) -> HeaderMap {
        parts("/", pairs).headers
    }

    async fn body_of(response: Response) -> ValidationError {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_extract_from_authorization() {
        let headers = header_map(&[("authorization", "access_token abc")]);
        assert_eq!(extract_token(&headers, None, None, false).unwrap(), "abc");

        let headers = header_map(&[("authorization", "Bearer xyz")]);
        assert_eq!(extract_token(&headers, None, None, false).unwrap(), "xyz");

        let headers = header_map(&[("authorization", "Basic dXNlcjpwYXNz")]);
        assert!(extract_token(&headers, None, None, false).is_err());
    }

    #[test]
    fn test_extract_precedence() {
        let headers = header_map(&[
            ("authorization", "access_token from-header"),
            ("cookie", "access_token=from-cookie"),
        ]);
        let token = extract_token(
            &headers,
            Some("access_token=from-query"),
            Some("access_token=from-form"),
            true,
        )
        .unwrap();
        assert_eq!(token, "from-header");

        let headers = header_map(&[("cookie", "access_token=from-cookie")]);
        assert_eq!(
            extract_token(&headers, Some("x=1&access_token=from-query"), None, true).unwrap(),
            "from-query"
        );
        assert_eq!(
            extract_token(&headers, Some("x=1"), Some("access_token=from-form"), true).unwrap(),
            "from-form"
        );
        assert_eq!(
            extract_token(&headers, None, None, true).unwrap(),
            "from-cookie"
        );
    }

    #[test]
    fn test_cookie_ignored_when_disabled() {
        let headers = header_map(&[("cookie", "theme=dark; access_token=c1")]);
        let err = extract_token(&headers, None, None, false).unwrap_err();
        assert_eq!(err.validation_error().code, codes::TOKEN_EMPTY);
        assert_eq!(extract_token(&headers, None, None, true).unwrap(), "c1");
    }

    #[test]
    fn test_empty_values_are_skipped() {
        let headers = header_map(&[("authorization", "access_token ")]);
        let err = extract_token(&headers, Some("access_token="), None, false).unwrap_err();
        assert_eq!(err.validation_error().code, codes::TOKEN_EMPTY);
    }

    #[test]
    fn test_write_token_headers() {
        let token = Token::new("tok123", Principal::single("u1"), T0 + 10);
        let options = HttpOptions {
            enable_cookie: true,
            cookie_domain: Some("example.com".to_string()),
            expose_internal_errors: false,
        };
        let mut headers = HeaderMap::new();
        write_token_headers(&mut headers, &token, T0, &options).unwrap();

        assert_eq!(headers[AUTHORIZATION], "access_token tok123");
        let cookie = headers[SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with("access_token=tok123"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.contains("Domain=example.com"));
        assert!(cookie.contains("Max-Age=86400"));
    }

    #[test]
    fn test_cookie_max_age_follows_long_deadlines() {
        let token = Token::new("tok", Principal::client("c1"), T0 + 7 * 86_400);
        let options = HttpOptions {
            enable_cookie: true,
            ..HttpOptions::default()
        };
        let mut headers = HeaderMap::new();
        write_token_headers(&mut headers, &token, T0, &options).unwrap();
        let cookie = headers[SET_COOKIE].to_str().unwrap();
        assert!(cookie.contains("Max-Age=604800"));
        assert!(!cookie.contains("Domain"));
    }

    #[test]
    fn test_no_cookie_when_disabled() {
        let token = Token::new("tok", Principal::client("c1"), 0);
        let mut headers = HeaderMap::new();
        write_token_headers(&mut headers, &token, T0, &HttpOptions::default()).unwrap();
        assert!(headers.get(SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn test_issue_then_extract_and_validate() {
        let manager = manager();
        let audience = Audience::new("aud", "app", "sk", 3600);
        let options = HttpOptions::default();

        let mut response_headers = HeaderMap::new();
        let issued = issue_and_serialize(
            &manager,
            Principal::single("u1"),
            &audience,
            &mut response_headers,
            &options,
        )
        .await
        .unwrap();

        let authorization = response_headers[AUTHORIZATION].to_str().unwrap();
        let request = parts("/orders", &[("authorization", authorization)]);
        let validated = extract_and_validate(&manager, &request, None, &options)
            .await
            .unwrap();
        assert_eq!(validated, issued);

        let request = parts("/orders?access_token=unknown", &[]);
        let err = extract_and_validate(&manager, &request, None, &options)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::TokenNotFound));
    }

    #[tokio::test]
    async fn test_error_response_bodies() {
        let response = AuthError::token_empty().into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_of(response).await.code, codes::TOKEN_EMPTY);

        let response = AuthError::TokenExpired.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key(WWW_AUTHENTICATE));
        assert_eq!(body_of(response).await.code, codes::TOKEN_EXPIRED);

        let failure = AuthError::storage("get_token", StorageError::connection("get_token", "refused"));
        let response = error_response(&failure, &HttpOptions::default());
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_of(response).await;
        assert_eq!(body, ValidationError::server_error());

        let verbose = HttpOptions {
            expose_internal_errors: true,
            ..HttpOptions::default()
        };
        let body = body_of(error_response(&failure, &verbose)).await;
        assert_eq!(body.code, codes::SERVER_ERROR);
        assert!(body.msg.contains("refused"));
    }

    #[tokio::test]
    async fn test_extractor() {
        let manager = manager();
        let audience = Audience::new("aud", "app", "sk", 60);
        let token = manager.new_token("c1", &audience).await.unwrap();
        let state = TokenAuthState {
            manager,
            options: HttpOptions {
                enable_cookie: true,
                ..HttpOptions::default()
            },
        };

        let cookie = format!("access_token={}", token.value);
        let mut request = parts("/", &[("cookie", cookie.as_str())]);
        let AuthenticatedToken(found) = AuthenticatedToken::from_request_parts(&mut request, &state)
            .await
            .unwrap();
        assert_eq!(found, token);

        let mut request = parts("/", &[]);
        let rejection = AuthenticatedToken::from_request_parts(&mut request, &state)
            .await
            .unwrap_err();
        assert_eq!(rejection.error.validation_error().code, codes::TOKEN_EMPTY);
        assert_eq!(rejection.into_response().status(), StatusCode::BAD_REQUEST);
    }
}

/// Authentication Routes
///
/// Token refresh endpoint.

use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::{RenewalService, TokenPair};
use crate::error::{AppError, AuthError, ErrorContext};

const TOKEN_HEADER: &str = "x-access-token";

/// Token refresh request body
#[derive(Deserialize)]
pub struct RefreshRequest {
    #[serde(alias = "token")]
    pub refresh_token: Option<String>,
}

/// `?token=` fallback
///
/// An unparseable query string counts as no query token at all.
#[derive(Deserialize)]
pub struct RefreshQuery {
    pub token: Option<String>,
}

/// Authentication response with access and refresh tokens
#[derive(Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

impl AuthResponse {
    fn bearer(pair: TokenPair, expires_in: i64) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "Bearer".to_string(),
            expires_in,
        }
    }
}

/// Pick the presented refresh token: JSON body, then header, then query string
fn extract_token(
    body: Option<&RefreshRequest>,
    req: &HttpRequest,
    query: Option<&RefreshQuery>,
) -> Option<String> {
    let non_empty = |s: &str| {
        let s = s.trim();
        (!s.is_empty()).then(|| s.to_string())
    };

    body.and_then(|b| b.refresh_token.as_deref())
        .and_then(non_empty)
        .or_else(|| {
            req.headers()
                .get(TOKEN_HEADER)
                .and_then(|h| h.to_str().ok())
                .and_then(non_empty)
        })
        .or_else(|| {
            query
                .and_then(|q| q.token.as_deref())
                .and_then(non_empty)
        })
}

/// POST /auth/refresh
///
/// Exchange a refresh token for a new access token and a new refresh token.
/// The presented refresh token is consumed whether or not the exchange
/// completes.
///
/// # Errors
/// - 401: missing, invalid, expired, or already used refresh token
/// - 503: token store unavailable
/// - 500: internal server error
pub async fn refresh(
    req: HttpRequest,
    body: Option<web::Json<RefreshRequest>>,
    query: Option<web::Query<RefreshQuery>>,
    service: web::Data<RenewalService>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("token_refresh");

    let token = extract_token(body.as_deref(), &req, query.as_deref())
        .ok_or(AppError::Auth(AuthError::MissingToken))?;

    let pair = service.rotate(&token).await?;

    tracing::info!(
        request_id = %context.request_id,
        "Token refreshed successfully"
    );

    Ok(HttpResponse::Ok().json(AuthResponse::bearer(pair, service.config().access_ttl)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    fn body(token: Option<&str>) -> RefreshRequest {
        RefreshRequest {
            refresh_token: token.map(str::to_string),
        }
    }

    fn query(token: Option<&str>) -> Option<RefreshQuery> {
        Some(RefreshQuery {
            token: token.map(str::to_string),
        })
    }

    #[test]
    fn test_body_takes_precedence() {
        let req = TestRequest::default()
            .insert_header((TOKEN_HEADER, "from-header"))
            .to_http_request();

        let token = extract_token(Some(&body(Some("from-body"))), &req, query(Some("from-query")).as_ref());
        assert_eq!(token.as_deref(), Some("from-body"));
    }

    #[test]
    fn test_header_then_query_fallback() {
        let req = TestRequest::default()
            .insert_header((TOKEN_HEADER, "from-header"))
            .to_http_request();
        let token = extract_token(Some(&body(None)), &req, query(Some("from-query")).as_ref());
        assert_eq!(token.as_deref(), Some("from-header"));

        let req = TestRequest::default().to_http_request();
        let token = extract_token(None, &req, query(Some("from-query")).as_ref());
        assert_eq!(token.as_deref(), Some("from-query"));
    }

    #[test]
    fn test_blank_values_ignored() {
        let req = TestRequest::default()
            .insert_header((TOKEN_HEADER, "   "))
            .to_http_request();

        assert!(extract_token(Some(&body(Some(""))), &req, query(None).as_ref()).is_none());
    }

    #[test]
    fn test_token_alias_in_body() {
        let parsed: RefreshRequest =
            serde_json::from_str(r#"{"token": "abc"}"#).expect("Failed to parse");
        assert_eq!(parsed.refresh_token.as_deref(), Some("abc"));
    }
}

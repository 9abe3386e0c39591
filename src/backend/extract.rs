//! Request extractors: the authenticated caller and JSON bodies whose
//! failures render as `{"msg": ...}` instead of axum's plain-text rejections.

use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Request},
    http::{header, request::Parts},
};
use serde::de::DeserializeOwned;
use shoplist_common::ValidationReport;
use shoplist_common::payloads::check;
use validator::Validate;

use super::api::{ApiError, SharedState};

/// Header the browser client sends its session token in.
pub const AUTH_HEADER: &str = "x-auth-token";

/// The caller identified by a valid session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: String,
}

impl FromRequestParts<SharedState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let token = token_from_headers(parts)
            .ok_or_else(|| ApiError::Unauthorized("No token, authorization denied".into()))?;
        let claims = state.tokens.verify(token).map_err(|e| {
            tracing::debug!(error = %e, "rejected session token");
            ApiError::Unauthorized("Token is not valid".into())
        })?;
        Ok(AuthUser {
            id: claims.user.id,
        })
    }
}

/// `x-auth-token` first, then `Authorization: Bearer`.
fn token_from_headers(parts: &Parts) -> Option<&str> {
    if let Some(value) = parts.headers.get(AUTH_HEADER) {
        return value.to_str().ok().map(str::trim).filter(|t| !t.is_empty());
    }
    parts
        .headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// A JSON body; malformed input is a 400 validation error under `body`.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|rejection| {
            ApiError::Validation(ValidationReport::single("body", rejection.body_text()))
        })?;
        Ok(JsonBody(value))
    }
}

/// Decode a body the handler read as raw bytes, so access checks can run
/// first. An empty body reads as `{}`.
pub fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    let body = if body.iter().all(u8::is_ascii_whitespace) {
        b"{}".as_slice()
    } else {
        body
    };
    serde_json::from_slice(body).map_err(|e| {
        ApiError::Validation(ValidationReport::single(
            "body",
            format!("Failed to deserialize the JSON body: {}", e),
        ))
    })
}

/// A JSON body that also passed its field rules.
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let JsonBody(value) = JsonBody::<T>::from_request(req, state).await?;
        check(&value).map_err(ApiError::Validation)?;
        Ok(ValidJson(value))
    }
}

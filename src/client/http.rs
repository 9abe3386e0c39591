use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use shoplist_common::{
    AuthResponse, Credentials, Item, ItemPatch, ListPatch, ListSummary, MessageResponse, NewItem,
    NewList, Registration, ShareRequest, ShoppingList, User, ValidationReport,
};

use crate::backend::extract::AUTH_HEADER;
use crate::errors::ClientError;

/// Default base URL, matching the server's default bind address.
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:5000/api";

/// Typed client for the shopping-list API.
///
/// `base_url` points at the `/api` prefix. The session token, when set, is
/// sent in the `x-auth-token` header.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ── Auth ──────────────────────────────────────────────────────────

    pub async fn register(&self, registration: &Registration) -> Result<AuthResponse, ClientError> {
        self.send(self.request(Method::POST, "/auth/register").json(registration))
            .await
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<AuthResponse, ClientError> {
        self.send(self.request(Method::POST, "/auth/login").json(credentials))
            .await
    }

    pub async fn current_user(&self) -> Result<User, ClientError> {
        self.send(self.authed(Method::GET, "/auth/user")?).await
    }

    // ── Lists ─────────────────────────────────────────────────────────

    pub async fn lists(&self) -> Result<Vec<ShoppingList>, ClientError> {
        self.send(self.authed(Method::GET, "/lists")?).await
    }

    pub async fn list(&self, id: &str) -> Result<ShoppingList, ClientError> {
        self.send(self.authed(Method::GET, &format!("/lists/{}", id))?)
            .await
    }

    pub async fn summary(&self, id: &str) -> Result<ListSummary, ClientError> {
        self.send(self.authed(Method::GET, &format!("/lists/{}/summary", id))?)
            .await
    }

    pub async fn create_list(&self, list: &NewList) -> Result<ShoppingList, ClientError> {
        self.send_json(Method::POST, "/lists", list).await
    }

    pub async fn update_list(&self, id: &str, patch: &ListPatch) -> Result<ShoppingList, ClientError> {
        self.send_json(Method::PUT, &format!("/lists/{}", id), patch)
            .await
    }

    pub async fn delete_list(&self, id: &str) -> Result<MessageResponse, ClientError> {
        self.send(self.authed(Method::DELETE, &format!("/lists/{}", id))?)
            .await
    }

    pub async fn share_list(&self, id: &str, request: &ShareRequest) -> Result<ShoppingList, ClientError> {
        self.send_json(Method::POST, &format!("/lists/{}/share", id), request)
            .await
    }

    // ── Items ─────────────────────────────────────────────────────────

    pub async fn add_item(&self, list_id: &str, item: &NewItem) -> Result<Item, ClientError> {
        self.send_json(Method::POST, &format!("/lists/{}/items", list_id), item)
            .await
    }

    pub async fn update_item(
        &self,
        list_id: &str,
        item_id: &str,
        patch: &ItemPatch,
    ) -> Result<Item, ClientError> {
        self.send_json(
            Method::PUT,
            &format!("/lists/{}/items/{}", list_id, item_id),
            patch,
        )
        .await
    }

    pub async fn delete_item(&self, list_id: &str, item_id: &str) -> Result<MessageResponse, ClientError> {
        self.send(self.authed(
            Method::DELETE,
            &format!("/lists/{}/items/{}", list_id, item_id),
        )?)
        .await
    }

    // ── Plumbing ──────────────────────────────────────────────────────

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
    }

    fn authed(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        let token = self.token.as_deref().ok_or(ClientError::NotLoggedIn)?;
        Ok(self.request(method, path).header(AUTH_HEADER, token))
    }

    async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(self.authed(method, path)?.json(body)).await
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }
        let body = response.text().await.unwrap_or_default();
        tracing::debug!(status = status.as_u16(), body = %body, "API request failed");
        Err(ClientError::Api {
            status: status.as_u16(),
            message: error_message(status, &body),
        })
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    msg: String,
    #[serde(default)]
    errors: ValidationReport,
}

/// The `msg` member of an error body (with any per-field errors appended),
/// else the body text, else the reason phrase.
fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(ErrorBody { msg, errors }) = serde_json::from_str::<ErrorBody>(body) {
        if errors.is_empty() {
            return msg;
        }
        let fields: Vec<String> = errors
            .0
            .iter()
            .flat_map(|(field, messages)| messages.iter().map(move |m| format!("{}: {}", field, m)))
            .collect();
        return format!("{} ({})", msg, fields.join("; "));
    }
    let text = body.trim();
    if !text.is_empty() {
        return text.to_string();
    }
    status
        .canonical_reason()
        .unwrap_or("Request failed")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_prefers_msg_member() {
        let body = r#"{"msg": "List not found"}"#;
        assert_eq!(error_message(StatusCode::NOT_FOUND, body), "List not found");
    }

    #[test]
    fn test_error_message_appends_field_errors() {
        let body = r#"{"msg": "Validation error", "errors": {"name": ["List name is required"], "totalBudget": ["Budget cannot be negative"]}}"#;
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, body),
            "Validation error (name: List name is required; totalBudget: Budget cannot be negative)"
        );
    }

    #[test]
    fn test_error_message_falls_back_to_text_then_reason() {
        assert_eq!(
            error_message(StatusCode::BAD_GATEWAY, "upstream down\n"),
            "upstream down"
        );
        assert_eq!(
            error_message(StatusCode::SERVICE_UNAVAILABLE, ""),
            "Service Unavailable"
        );
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = ApiClient::new("http://localhost:5000/api/");
        assert_eq!(client.base_url(), "http://localhost:5000/api");
    }

    #[tokio::test]
    async fn test_authed_calls_require_token() {
        let client = ApiClient::new(DEFAULT_API_URL);
        assert!(matches!(client.lists().await, Err(ClientError::NotLoggedIn)));
        assert!(matches!(
            client.delete_item("l", "i").await,
            Err(ClientError::NotLoggedIn)
        ));
    }
}

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use shoplist_common::payloads::check;
use shoplist_common::{
    AuthResponse, Credentials, ItemPatch, ListPatch, ListSummary, MessageResponse, NewItem,
    NewList, Registration, ShareRequest, ShoppingList, ValidationReport,
};

use super::auth::{Passwords, TokenSigner};
use super::db::{DbHandle, ShopDb};
use super::extract::{AuthUser, ValidJson, parse_body};
use crate::errors::{AuthError, StoreError};

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub db: DbHandle,
    pub tokens: TokenSigner,
    pub passwords: Passwords,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(db: ShopDb, tokens: TokenSigner, passwords: Passwords) -> SharedState {
        Arc::new(Self {
            db: DbHandle::new(db),
            tokens,
            passwords,
        })
    }
}

// ── Error handling ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    BadRequest(String),
    Validation(ValidationReport),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, serde_json::json!({"msg": msg})),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, serde_json::json!({"msg": msg})),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, serde_json::json!({"msg": msg})),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, serde_json::json!({"msg": msg})),
            ApiError::Validation(report) => (
                StatusCode::BAD_REQUEST,
                serde_json::json!({"msg": "Validation error", "errors": report}),
            ),
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    serde_json::json!({"msg": "Server error"}),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UserNotFound { .. } => ApiError::NotFound("User not found".into()),
            StoreError::ListNotFound { .. } => ApiError::NotFound("List not found".into()),
            StoreError::ItemNotFound { .. } => ApiError::NotFound("Item not found".into()),
            StoreError::EmailTaken { .. } => ApiError::BadRequest("User already exists".into()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MalformedToken
            | AuthError::UnsupportedAlgorithm(_)
            | AuthError::BadSignature
            | AuthError::Expired { .. } => ApiError::Unauthorized("Token is not valid".into()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/user", get(current_user))
        .route("/api/lists", get(list_lists).post(create_list))
        .route(
            "/api/lists/{id}",
            get(get_list).put(update_list).delete(delete_list),
        )
        .route("/api/lists/{id}/summary", get(list_summary))
        .route("/api/lists/{id}/items", post(add_item))
        .route(
            "/api/lists/{id}/items/{item_id}",
            put(update_item).delete(delete_item),
        )
        .route("/api/lists/{id}/share", post(share_list))
        .fallback(not_found)
}

// ── Helpers ───────────────────────────────────────────────────────────

/// Load a list or answer 404.
fn require_list(db: &ShopDb, id: &str) -> Result<ShoppingList, ApiError> {
    db.get_list(id)?
        .ok_or_else(|| ApiError::NotFound("List not found".into()))
}

fn ensure(allowed: bool, msg: &str) -> Result<(), ApiError> {
    if allowed {
        Ok(())
    } else {
        Err(ApiError::Forbidden(msg.to_string()))
    }
}

async fn blocking<F, R>(f: F) -> Result<R, ApiError>
where
    F: FnOnce() -> Result<R, AuthError> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(format!("hashing task failed: {}", e)))?
        .map_err(ApiError::from)
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn root() -> &'static str {
    "Shopping List API is running"
}

async fn health_check() -> &'static str {
    "ok"
}

async fn not_found() -> ApiError {
    ApiError::NotFound("Route not found".into())
}

async fn register(
    State(state): State<SharedState>,
    ValidJson(req): ValidJson<Registration>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req.email.clone();
    let exists = state
        .db
        .call(move |db| db.find_user_by_email(&email))
        .await?
        .is_some();
    if exists {
        return Err(ApiError::BadRequest("User already exists".into()));
    }

    let passwords = state.passwords.clone();
    let password = req.password;
    let hash = blocking(move || passwords.hash(&password)).await?;

    let name = req.name;
    let email = req.email;
    let user = state
        .db
        .call(move |db| db.create_user(&name, &email, &hash))
        .await?;
    let token = state.tokens.issue(&user.id)?;
    tracing::info!(user_id = %user.id, "user registered");
    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

async fn login(
    State(state): State<SharedState>,
    ValidJson(req): ValidJson<Credentials>,
) -> Result<impl IntoResponse, ApiError> {
    let invalid = || ApiError::BadRequest("Invalid credentials".into());
    let email = req.email;
    let record = state
        .db
        .call(move |db| db.find_user_by_email(&email))
        .await?
        .ok_or_else(invalid)?;

    let passwords = state.passwords.clone();
    let password = req.password;
    let stored = record.password_hash;
    if !blocking(move || passwords.verify(&password, &stored)).await? {
        tracing::debug!(user_id = %record.user.id, "login with wrong password");
        return Err(invalid());
    }

    let token = state.tokens.issue(&record.user.id)?;
    tracing::info!(user_id = %record.user.id, "user logged in");
    Ok(Json(AuthResponse {
        token,
        user: record.user,
    }))
}

async fn current_user(
    State(state): State<SharedState>,
    caller: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .call(move |db| db.get_user(&caller.id))
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
    Ok(Json(user))
}

async fn list_lists(
    State(state): State<SharedState>,
    caller: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let lists = state
        .db
        .call(move |db| db.lists_for_user(&caller.id))
        .await?;
    Ok(Json(lists))
}

async fn get_list(
    State(state): State<SharedState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let list = state
        .db
        .call(move |db| -> Result<_, ApiError> {
            let list = require_list(db, &id)?;
            ensure(
                list.access_for(&caller.id).can_view(),
                "Not authorized to access this list",
            )?;
            Ok(list)
        })
        .await?;
    Ok(Json(list))
}

async fn create_list(
    State(state): State<SharedState>,
    caller: AuthUser,
    ValidJson(mut req): ValidJson<NewList>,
) -> Result<impl IntoResponse, ApiError> {
    let mut seen = std::collections::HashSet::new();
    req.shared_with.retain(|id| seen.insert(id.clone()));

    let list = state
        .db
        .call(move |db| -> Result<_, ApiError> {
            let mut report = ValidationReport::default();
            for id in &req.shared_with {
                if *id == caller.id {
                    report.push("sharedWith", "Cannot share a list with its owner");
                } else if db.get_user(id)?.is_none() {
                    report.push("sharedWith", format!("User {} not found", id));
                }
            }
            if !report.is_empty() {
                return Err(ApiError::Validation(report));
            }
            Ok(db.create_list(&caller.id, &req)?)
        })
        .await?;
    tracing::info!(list_id = %list.id, owner = %list.owner, items = list.items.len(), "list created");
    Ok((StatusCode::CREATED, Json(list)))
}

async fn update_list(
    State(state): State<SharedState>,
    caller: AuthUser,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let list = state
        .db
        .call(move |db| -> Result<_, ApiError> {
            let list = require_list(db, &id)?;
            ensure(
                list.access_for(&caller.id).can_edit(),
                "Not authorized to update this list",
            )?;
            let patch: ListPatch = parse_body(&body)?;
            check(&patch).map_err(ApiError::Validation)?;
            Ok(db.update_list(&id, patch.effective_name(), patch.total_budget)?)
        })
        .await?;
    Ok(Json(list))
}

async fn delete_list(
    State(state): State<SharedState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let list_id = id.clone();
    state
        .db
        .call(move |db| -> Result<_, ApiError> {
            let list = require_list(db, &id)?;
            ensure(
                list.access_for(&caller.id).is_owner(),
                "Not authorized to delete this list",
            )?;
            if !db.delete_list(&id)? {
                return Err(ApiError::NotFound("List not found".into()));
            }
            Ok(())
        })
        .await?;
    tracing::info!(list_id = %list_id, "list deleted");
    Ok(Json(MessageResponse::new("List removed")))
}

async fn list_summary(
    State(state): State<SharedState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let list = state
        .db
        .call(move |db| -> Result<_, ApiError> {
            let list = require_list(db, &id)?;
            ensure(
                list.access_for(&caller.id).can_view(),
                "Not authorized to access this list",
            )?;
            Ok(list)
        })
        .await?;
    Ok(Json(ListSummary::of(&list)))
}

async fn add_item(
    State(state): State<SharedState>,
    caller: AuthUser,
    Path(id): Path<String>,
    ValidJson(req): ValidJson<NewItem>,
) -> Result<impl IntoResponse, ApiError> {
    let item = state
        .db
        .call(move |db| -> Result<_, ApiError> {
            let list = require_list(db, &id)?;
            ensure(
                list.access_for(&caller.id).can_edit(),
                "Not authorized to add items to this list",
            )?;
            Ok(db.add_item(&id, &req)?)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

async fn update_item(
    State(state): State<SharedState>,
    caller: AuthUser,
    Path((id, item_id)): Path<(String, String)>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let item = state
        .db
        .call(move |db| -> Result<_, ApiError> {
            let list = require_list(db, &id)?;
            ensure(
                list.access_for(&caller.id).can_edit(),
                "Not authorized to update items in this list",
            )?;
            if list.item(&item_id).is_none() {
                return Err(ApiError::NotFound("Item not found".into()));
            }
            let patch: ItemPatch = parse_body(&body)?;
            check(&patch).map_err(ApiError::Validation)?;
            Ok(db.update_item(&id, &item_id, &patch)?)
        })
        .await?;
    Ok(Json(item))
}

async fn delete_item(
    State(state): State<SharedState>,
    caller: AuthUser,
    Path((id, item_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .db
        .call(move |db| -> Result<_, ApiError> {
            let list = require_list(db, &id)?;
            ensure(
                list.access_for(&caller.id).can_edit(),
                "Not authorized to delete items from this list",
            )?;
            if !db.delete_item(&id, &item_id)? {
                return Err(ApiError::NotFound("Item not found".into()));
            }
            Ok(())
        })
        .await?;
    Ok(Json(MessageResponse::new("Item removed")))
}

async fn share_list(
    State(state): State<SharedState>,
    caller: AuthUser,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    // The address is checked before any lookup; a non-string counts as missing.
    let body: serde_json::Value = parse_body(&body)?;
    let email = body
        .get("email")
        .and_then(serde_json::Value::as_str)
        .map(ShareRequest::new)
        .and_then(|req| req.email().map(str::to_string))
        .ok_or_else(|| ApiError::BadRequest("Email is required".into()))?;
    let list = state
        .db
        .call(move |db| -> Result<_, ApiError> {
            let target = db
                .find_user_by_email(&email)?
                .ok_or_else(|| ApiError::NotFound("User not found".into()))?
                .user;
            let list = require_list(db, &id)?;
            ensure(
                list.access_for(&caller.id).is_owner(),
                "Only the owner can share this list",
            )?;
            if target.id == list.owner {
                return Err(ApiError::BadRequest("Cannot share a list with its owner".into()));
            }
            if list.shared_with.contains(&target.id) {
                return Err(ApiError::BadRequest("List already shared with this user".into()));
            }
            Ok(db.share_list(&id, &target.id)?)
        })
        .await?;
    tracing::info!(list_id = %list.id, collaborators = list.shared_with.len(), "list shared");
    Ok(Json(list))
}

// ── Tests ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use shoplist_common::{Item, User};
    use tower::ServiceExt;

    use crate::backend::extract::AUTH_HEADER;

    fn test_app() -> Router {
        let state = AppState::new(
            ShopDb::new_in_memory().unwrap(),
            TokenSigner::new(b"test-secret-test-secret-test-sec", 3600).unwrap(),
            Passwords::new(8, 1).unwrap(),
        );
        api_router().with_state(state)
    }

    async fn body_json<T: serde::de::DeserializeOwned>(body: Body) -> T {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTH_HEADER, token);
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn register(app: &Router, name: &str, email: &str) -> AuthResponse {
        let request = Request::builder()
            .method("POST")
            .uri("/api/auth/register")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({"name": name, "email": email, "password": "secret1"}).to_string(),
            ))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        body_json(response.into_body()).await
    }

    async fn create_list(app: &Router, token: &str, body: Value) -> ShoppingList {
        let (status, value) = send(app, "POST", "/api/lists", Some(token), Some(body)).await;
        assert_eq!(status, StatusCode::CREATED, "{}", value);
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_health_and_root() {
        let app = test_app();
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"ok");

        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"Shopping List API is running");
    }

    #[tokio::test]
    async fn test_unknown_route_is_json_404() {
        let app = test_app();
        let (status, body) = send(&app, "GET", "/api/nope", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["msg"], "Route not found");
    }

    #[tokio::test]
    async fn test_register_returns_token_and_user() {
        let app = test_app();
        let auth = register(&app, "Alice", "Alice@Example.com").await;
        assert!(!auth.token.is_empty());
        assert_eq!(auth.user.email, "alice@example.com");
        assert_eq!(auth.user.name, "Alice");

        let (status, me) = send(&app, "GET", "/api/auth/user", Some(&auth.token), None).await;
        assert_eq!(status, StatusCode::OK);
        let me: User = serde_json::from_value(me).unwrap();
        assert_eq!(me.id, auth.user.id);
    }

    #[tokio::test]
    async fn test_register_rejects_duplicate_email() {
        let app = test_app();
        register(&app, "Alice", "alice@example.com").await;
        let (status, body) = send(
            &app,
            "POST",
            "/api/auth/register",
            None,
            Some(json!({"name": "Again", "email": "ALICE@example.com", "password": "secret1"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["msg"], "User already exists");
    }

    #[tokio::test]
    async fn test_register_validation_errors() {
        let app = test_app();
        let (status, body) = send(
            &app,
            "POST",
            "/api/auth/register",
            None,
            Some(json!({"name": "", "email": "nope", "password": "123"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["msg"], "Validation error");
        assert_eq!(body["errors"]["name"][0], "Name is required");
        assert_eq!(body["errors"]["email"][0], "Please enter a valid email address");
        assert_eq!(
            body["errors"]["password"][0],
            "Password must be at least 6 characters long"
        );
    }

    #[tokio::test]
    async fn test_malformed_json_is_validation_error() {
        let app = test_app();
        let request = Request::builder()
            .method("POST")
            .uri("/api/auth/login")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: Value = body_json(response.into_body()).await;
        assert!(body["errors"]["body"].is_array());
    }

    #[tokio::test]
    async fn test_login() {
        let app = test_app();
        let registered = register(&app, "Bob", "bob@example.com").await;

        let (status, body) = send(
            &app,
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"email": "BOB@example.com", "password": "secret1"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let auth: AuthResponse = serde_json::from_value(body).unwrap();
        assert_eq!(auth.user.id, registered.user.id);

        for (email, password) in [("bob@example.com", "wrong!!"), ("nobody@example.com", "secret1")] {
            let (status, body) = send(
                &app,
                "POST",
                "/api/auth/login",
                None,
                Some(json!({"email": email, "password": password})),
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["msg"], "Invalid credentials");
        }
    }

    #[tokio::test]
    async fn test_missing_and_invalid_tokens() {
        let app = test_app();
        let (status, body) = send(&app, "GET", "/api/lists", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["msg"], "No token, authorization denied");

        let (status, body) = send(&app, "GET", "/api/lists", Some("garbage"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["msg"], "Token is not valid");
    }

    #[tokio::test]
    async fn test_bearer_token_is_accepted() {
        let app = test_app();
        let auth = register(&app, "Alice", "alice@example.com").await;
        let request = Request::builder()
            .uri("/api/lists")
            .header("authorization", format!("Bearer {}", auth.token))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_create_and_fetch_list() {
        let app = test_app();
        let alice = register(&app, "Alice", "alice@example.com").await;
        let list = create_list(
            &app,
            &alice.token,
            json!({
                "name": "Groceries",
                "totalBudget": 40,
                "owner": "someone-else",
                "items": [{"name": "Milk", "quantity": 2, "price": 1.5}]
            }),
        )
        .await;
        assert_eq!(list.owner, alice.user.id);
        assert_eq!(list.items.len(), 1);
        assert!(!list.items[0].is_purchased);

        let (status, body) = send(
            &app,
            "GET",
            &format!("/api/lists/{}", list.id),
            Some(&alice.token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Groceries");
        assert_eq!(body["_id"], list.id);
    }

    #[tokio::test]
    async fn test_create_list_validation() {
        let app = test_app();
        let alice = register(&app, "Alice", "alice@example.com").await;
        let (status, body) = send(
            &app,
            "POST",
            "/api/lists",
            Some(&alice.token),
            Some(json!({
                "name": "",
                "totalBudget": -1,
                "items": [{"name": "ok", "quantity": 1, "price": 1}, {"name": "bad", "quantity": 0, "price": 1}]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"]["name"][0], "List name is required");
        assert_eq!(body["errors"]["totalBudget"][0], "Budget cannot be negative");
        assert_eq!(body["errors"]["items[1].quantity"][0], "Quantity must be positive");
    }

    #[tokio::test]
    async fn test_create_list_checks_collaborators() {
        let app = test_app();
        let alice = register(&app, "Alice", "alice@example.com").await;
        let bob = register(&app, "Bob", "bob@example.com").await;

        let (status, body) = send(
            &app,
            "POST",
            "/api/lists",
            Some(&alice.token),
            Some(json!({"name": "x", "totalBudget": 1, "sharedWith": ["ghost", alice.user.id]})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let messages = body["errors"]["sharedWith"].as_array().unwrap();
        assert_eq!(messages.len(), 2);

        let list = create_list(
            &app,
            &alice.token,
            json!({"name": "x", "totalBudget": 1, "sharedWith": [bob.user.id, bob.user.id]}),
        )
        .await;
        assert_eq!(list.shared_with, vec![bob.user.id]);
    }

    #[tokio::test]
    async fn test_lists_are_scoped_to_owner_and_collaborators() {
        let app = test_app();
        let alice = register(&app, "Alice", "alice@example.com").await;
        let bob = register(&app, "Bob", "bob@example.com").await;
        let carol = register(&app, "Carol", "carol@example.com").await;

        let shared = create_list(
            &app,
            &alice.token,
            json!({"name": "shared", "totalBudget": 10, "sharedWith": [bob.user.id]}),
        )
        .await;
        create_list(&app, &alice.token, json!({"name": "private", "totalBudget": 10})).await;

        let (_, lists) = send(&app, "GET", "/api/lists", Some(&bob.token), None).await;
        let lists: Vec<ShoppingList> = serde_json::from_value(lists).unwrap();
        assert_eq!(lists.len(), 1);
        assert_eq!(lists[0].id, shared.id);

        let (_, lists) = send(&app, "GET", "/api/lists", Some(&alice.token), None).await;
        let names: Vec<String> = serde_json::from_value::<Vec<ShoppingList>>(lists)
            .unwrap()
            .into_iter()
            .map(|l| l.name)
            .collect();
        assert_eq!(names, ["private", "shared"]);

        let (status, body) = send(
            &app,
            "GET",
            &format!("/api/lists/{}", shared.id),
            Some(&carol.token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["msg"], "Not authorized to access this list");
    }

    #[tokio::test]
    async fn test_get_missing_list() {
        let app = test_app();
        let alice = register(&app, "Alice", "alice@example.com").await;
        let (status, body) = send(&app, "GET", "/api/lists/not-an-id", Some(&alice.token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["msg"], "List not found");
    }

    #[tokio::test]
    async fn test_update_list_by_collaborator() {
        let app = test_app();
        let alice = register(&app, "Alice", "alice@example.com").await;
        let bob = register(&app, "Bob", "bob@example.com").await;
        let list = create_list(
            &app,
            &alice.token,
            json!({"name": "Party", "totalBudget": 20, "sharedWith": [bob.user.id]}),
        )
        .await;
        let uri = format!("/api/lists/{}", list.id);

        let (status, body) = send(
            &app,
            "PUT",
            &uri,
            Some(&bob.token),
            Some(json!({"name": "", "totalBudget": 55})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Party");
        assert_eq!(body["totalBudget"], 55.0);

        let (status, body) = send(&app, "PUT", &uri, Some(&bob.token), Some(json!({"totalBudget": -5}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"]["totalBudget"][0], "Budget cannot be negative");
    }

    #[tokio::test]
    async fn test_update_list_forbidden_for_stranger() {
        let app = test_app();
        let alice = register(&app, "Alice", "alice@example.com").await;
        let eve = register(&app, "Eve", "eve@example.com").await;
        let list = create_list(&app, &alice.token, json!({"name": "Mine", "totalBudget": 5})).await;
        let (status, body) = send(
            &app,
            "PUT",
            &format!("/api/lists/{}", list.id),
            Some(&eve.token),
            Some(json!({"name": "Stolen"})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["msg"], "Not authorized to update this list");
    }

    #[tokio::test]
    async fn test_only_owner_deletes_list() {
        let app = test_app();
        let alice = register(&app, "Alice", "alice@example.com").await;
        let bob = register(&app, "Bob", "bob@example.com").await;
        let list = create_list(
            &app,
            &alice.token,
            json!({"name": "Party", "totalBudget": 20, "sharedWith": [bob.user.id]}),
        )
        .await;
        let uri = format!("/api/lists/{}", list.id);

        let (status, body) = send(&app, "DELETE", &uri, Some(&bob.token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["msg"], "Not authorized to delete this list");

        let (status, body) = send(&app, "DELETE", &uri, Some(&alice.token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["msg"], "List removed");

        let (status, _) = send(&app, "GET", &uri, Some(&alice.token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_item_lifecycle_and_summary() {
        let app = test_app();
        let alice = register(&app, "Alice", "alice@example.com").await;
        let list = create_list(&app, &alice.token, json!({"name": "Week", "totalBudget": 10})).await;
        let items_uri = format!("/api/lists/{}/items", list.id);

        let (status, body) = send(
            &app,
            "POST",
            &items_uri,
            Some(&alice.token),
            Some(json!({"name": "Cheese", "quantity": 2, "price": 4})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let item: Item = serde_json::from_value(body).unwrap();
        assert!(!item.is_purchased);

        let item_uri = format!("{}/{}", items_uri, item.id);
        let (status, body) = send(
            &app,
            "PUT",
            &item_uri,
            Some(&alice.token),
            Some(json!({"isPurchased": true})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["isPurchased"], true);
        assert_eq!(body["name"], "Cheese");

        let (status, summary) = send(
            &app,
            "GET",
            &format!("/api/lists/{}/summary", list.id),
            Some(&alice.token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(summary["totalSpent"], 8.0);
        assert_eq!(summary["budgetProgress"], 80.0);
        assert_eq!(summary["progress"], 100.0);
        assert_eq!(summary["overBudget"], false);

        let (status, body) = send(&app, "DELETE", &item_uri, Some(&alice.token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["msg"], "Item removed");

        let (status, body) = send(&app, "DELETE", &item_uri, Some(&alice.token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["msg"], "Item not found");
    }

    #[tokio::test]
    async fn test_add_item_validates_before_lookup() {
        let app = test_app();
        let alice = register(&app, "Alice", "alice@example.com").await;
        let (status, body) = send(
            &app,
            "POST",
            "/api/lists/missing/items",
            Some(&alice.token),
            Some(json!({"name": "", "quantity": 1, "price": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"]["name"][0], "Item name is required");

        let (status, body) = send(
            &app,
            "POST",
            "/api/lists/missing/items",
            Some(&alice.token),
            Some(json!({"name": "Tea", "quantity": 1, "price": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["msg"], "List not found");
    }

    #[tokio::test]
    async fn test_item_routes_forbid_strangers() {
        let app = test_app();
        let alice = register(&app, "Alice", "alice@example.com").await;
        let eve = register(&app, "Eve", "eve@example.com").await;
        let list = create_list(
            &app,
            &alice.token,
            json!({"name": "Mine", "totalBudget": 5, "items": [{"name": "Jam", "quantity": 1, "price": 2}]}),
        )
        .await;
        let items_uri = format!("/api/lists/{}/items", list.id);
        let item_uri = format!("{}/{}", items_uri, list.items[0].id);

        let (status, body) = send(
            &app,
            "POST",
            &items_uri,
            Some(&eve.token),
            Some(json!({"name": "x", "quantity": 1, "price": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["msg"], "Not authorized to add items to this list");

        let (status, body) = send(&app, "PUT", &item_uri, Some(&eve.token), Some(json!({"isPurchased": true}))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["msg"], "Not authorized to update items in this list");

        let (status, body) = send(&app, "DELETE", &item_uri, Some(&eve.token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["msg"], "Not authorized to delete items from this list");
    }

    #[tokio::test]
    async fn test_update_missing_item() {
        let app = test_app();
        let alice = register(&app, "Alice", "alice@example.com").await;
        let list = create_list(&app, &alice.token, json!({"name": "Mine", "totalBudget": 5})).await;
        let (status, body) = send(
            &app,
            "PUT",
            &format!("/api/lists/{}/items/ghost", list.id),
            Some(&alice.token),
            Some(json!({"isPurchased": true})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["msg"], "Item not found");
    }

    #[tokio::test]
    async fn test_update_list_checks_access_before_body() {
        let app = test_app();
        let alice = register(&app, "Alice", "alice@example.com").await;
        let eve = register(&app, "Eve", "eve@example.com").await;
        let list = create_list(&app, &alice.token, json!({"name": "Mine", "totalBudget": 5})).await;
        let bad = json!({"totalBudget": "abc"});

        let (status, body) = send(&app, "PUT", "/api/lists/missing", Some(&alice.token), Some(bad.clone())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["msg"], "List not found");

        let uri = format!("/api/lists/{}", list.id);
        let (status, body) = send(&app, "PUT", &uri, Some(&eve.token), Some(bad.clone())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["msg"], "Not authorized to update this list");

        let (status, body) = send(&app, "PUT", &uri, Some(&alice.token), Some(bad)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["msg"], "Validation error");
        assert!(body["errors"]["body"][0].as_str().unwrap().contains("expected f64"));
    }

    #[tokio::test]
    async fn test_update_item_checks_access_before_body() {
        let app = test_app();
        let alice = register(&app, "Alice", "alice@example.com").await;
        let eve = register(&app, "Eve", "eve@example.com").await;
        let list = create_list(
            &app,
            &alice.token,
            json!({"name": "Mine", "totalBudget": 5, "items": [{"name": "Jam", "quantity": 1, "price": 2}]}),
        )
        .await;
        let bad = json!({"quantity": "x"});

        let (status, body) = send(
            &app,
            "PUT",
            "/api/lists/missing/items/ghost",
            Some(&alice.token),
            Some(bad.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["msg"], "List not found");

        let ghost_uri = format!("/api/lists/{}/items/ghost", list.id);
        let (status, body) = send(&app, "PUT", &ghost_uri, Some(&eve.token), Some(bad.clone())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["msg"], "Not authorized to update items in this list");

        let (status, body) = send(&app, "PUT", &ghost_uri, Some(&alice.token), Some(bad.clone())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["msg"], "Item not found");

        let item_uri = format!("/api/lists/{}/items/{}", list.id, list.items[0].id);
        let (status, body) = send(&app, "PUT", &item_uri, Some(&alice.token), Some(bad)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["errors"]["body"].is_array());
    }

    #[tokio::test]
    async fn test_share_treats_non_string_email_as_missing() {
        let app = test_app();
        let alice = register(&app, "Alice", "alice@example.com").await;
        let list = create_list(&app, &alice.token, json!({"name": "Trip", "totalBudget": 1})).await;
        let uri = format!("/api/lists/{}/share", list.id);

        let (status, body) = send(&app, "POST", &uri, Some(&alice.token), Some(json!({"email": 5}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["msg"], "Email is required");

        let (status, body) = send(&app, "POST", &uri, Some(&alice.token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["msg"], "Email is required");
    }

    #[tokio::test]
    async fn test_share_list_flow() {
        let app = test_app();
        let alice = register(&app, "Alice", "alice@example.com").await;
        let bob = register(&app, "Bob", "bob@example.com").await;
        let list = create_list(&app, &alice.token, json!({"name": "Trip", "totalBudget": 100})).await;
        let uri = format!("/api/lists/{}/share", list.id);

        let (status, body) = send(&app, "POST", &uri, Some(&alice.token), Some(json!({"email": " "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["msg"], "Email is required");

        let (status, body) = send(
            &app,
            "POST",
            &uri,
            Some(&alice.token),
            Some(json!({"email": "nobody@example.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["msg"], "User not found");

        let (status, body) = send(&app, "POST", &uri, Some(&bob.token), Some(json!({"email": "alice@example.com"}))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["msg"], "Only the owner can share this list");

        let (status, body) = send(&app, "POST", &uri, Some(&alice.token), Some(json!({"email": "alice@example.com"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["msg"], "Cannot share a list with its owner");

        let (status, body) = send(&app, "POST", &uri, Some(&alice.token), Some(json!({"email": "BOB@example.com"}))).await;
        assert_eq!(status, StatusCode::OK);
        let shared: ShoppingList = serde_json::from_value(body).unwrap();
        assert_eq!(shared.shared_with, vec![bob.user.id.clone()]);

        let (status, body) = send(&app, "POST", &uri, Some(&alice.token), Some(json!({"email": "bob@example.com"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["msg"], "List already shared with this user");

        let (status, _) = send(&app, "GET", &format!("/api/lists/{}", list.id), Some(&bob.token), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[test]
    fn test_store_errors_map_to_statuses() {
        let cases = [
            (StoreError::ListNotFound { id: "x".into() }, StatusCode::NOT_FOUND),
            (StoreError::ItemNotFound { id: "x".into() }, StatusCode::NOT_FOUND),
            (StoreError::EmailTaken { email: "a@b.c".into() }, StatusCode::BAD_REQUEST),
            (StoreError::LockPoisoned, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), expected);
        }
    }

    #[tokio::test]
    async fn test_internal_errors_hide_details() {
        let response = ApiError::Internal("disk on fire".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = body_json(response.into_body()).await;
        assert_eq!(body, json!({"msg": "Server error"}));
    }
}

//! Stores that pair an [`ApiClient`] with a reducer-managed cache.
//!
//! Every operation performs one request and dispatches exactly one action:
//! the success action carrying the server's response, or a failure action
//! carrying the server's `msg` (or a fixed fallback when the server said
//! nothing useful). The result is also returned so callers can act on it.

use shoplist_common::{
    AuthAction, AuthState, Credentials, Item, ItemPatch, ListAction, ListPatch, ListState,
    NewItem, NewList, Registration, ShareRequest, ShoppingList,
};

use super::http::ApiClient;
use super::token::TokenStore;
use crate::errors::ClientError;

fn failure_message(err: &ClientError, fallback: &str) -> String {
    tracing::debug!(error = %err, "request failed");
    err.server_message()
        .map(str::to_string)
        .unwrap_or_else(|| fallback.to_string())
}

// ── Auth ──────────────────────────────────────────────────────────────

pub struct AuthStore {
    client: ApiClient,
    tokens: TokenStore,
    state: AuthState,
}

impl AuthStore {
    /// Seeds the state with any token saved by an earlier session.
    pub fn new(client: ApiClient, tokens: TokenStore) -> Result<Self, ClientError> {
        let token = tokens.load()?;
        Ok(Self {
            client: client.with_token(token.clone()),
            tokens,
            state: AuthState::with_token(token),
        })
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    /// The client, carrying the current session token.
    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Confirm the saved token by fetching the current user. A token the
    /// server rejects is forgotten; when the server cannot be reached the
    /// error is returned and the session is left as it was.
    pub async fn load_user(&mut self) -> Result<(), ClientError> {
        let action = match self.client.current_user().await {
            Ok(user) => AuthAction::UserLoaded(user),
            Err(e @ ClientError::Transport(_)) => return Err(e),
            Err(e) => {
                tracing::debug!(error = %e, "could not load current user");
                AuthAction::AuthError
            }
        };
        self.dispatch(action)
    }

    pub async fn register(&mut self, registration: &Registration) -> Result<(), ClientError> {
        let action = match self.client.register(registration).await {
            Ok(auth) => AuthAction::RegisterSucceeded {
                user: auth.user,
                token: auth.token,
            },
            Err(e) => AuthAction::RegisterFailed(Some(failure_message(&e, "Registration failed"))),
        };
        self.dispatch(action)
    }

    pub async fn login(&mut self, credentials: &Credentials) -> Result<(), ClientError> {
        let action = match self.client.login(credentials).await {
            Ok(auth) => AuthAction::LoginSucceeded {
                user: auth.user,
                token: auth.token,
            },
            Err(e) => AuthAction::LoginFailed(Some(failure_message(&e, "Invalid credentials"))),
        };
        self.dispatch(action)
    }

    pub fn logout(&mut self) -> Result<(), ClientError> {
        self.dispatch(AuthAction::Logout)
    }

    pub fn clear_errors(&mut self) -> Result<(), ClientError> {
        self.dispatch(AuthAction::ClearErrors)
    }

    /// Reduce, then mirror the resulting token into the client and the token file.
    fn dispatch(&mut self, action: AuthAction) -> Result<(), ClientError> {
        self.state = std::mem::take(&mut self.state).reduce(action);
        self.client.set_token(self.state.token.clone());
        match &self.state.token {
            Some(token) => self.tokens.save(token),
            None => self.tokens.clear(),
        }
    }
}

// ── Lists ─────────────────────────────────────────────────────────────

pub struct ListStore {
    client: ApiClient,
    state: ListState,
}

impl ListStore {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            state: ListState::default(),
        }
    }

    pub fn state(&self) -> &ListState {
        &self.state
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn dispatch(&mut self, action: ListAction) {
        self.state = std::mem::take(&mut self.state).reduce(action);
    }

    pub fn clear_errors(&mut self) {
        self.dispatch(ListAction::ClearErrors);
    }

    pub async fn load_lists(&mut self) -> Result<Vec<ShoppingList>, ClientError> {
        let result = self.client.lists().await;
        self.settle(result, "Error fetching lists", |lists| {
            ListAction::ListsLoaded(lists.clone())
        })
    }

    pub async fn load_list(&mut self, id: &str) -> Result<ShoppingList, ClientError> {
        let result = self.client.list(id).await;
        self.settle(result, "Error fetching list", |list| {
            ListAction::ListLoaded(list.clone())
        })
    }

    pub async fn add_list(&mut self, list: &NewList) -> Result<ShoppingList, ClientError> {
        let result = self.client.create_list(list).await;
        self.settle(result, "Error adding list", |list| {
            ListAction::ListAdded(list.clone())
        })
    }

    pub async fn update_list(
        &mut self,
        id: &str,
        patch: &ListPatch,
    ) -> Result<ShoppingList, ClientError> {
        let result = self.client.update_list(id, patch).await;
        self.settle(result, "Error updating list", |list| {
            ListAction::ListUpdated(list.clone())
        })
    }

    pub async fn delete_list(&mut self, id: &str) -> Result<(), ClientError> {
        let result = self.client.delete_list(id).await.map(|_| ());
        self.settle(result, "Error deleting list", |_| {
            ListAction::ListDeleted(id.to_string())
        })
    }

    pub async fn add_item(&mut self, list_id: &str, item: &NewItem) -> Result<Item, ClientError> {
        let result = self.client.add_item(list_id, item).await;
        self.settle(result, "Error adding item", |item| ListAction::ItemAdded {
            list_id: list_id.to_string(),
            item: item.clone(),
        })
    }

    pub async fn update_item(
        &mut self,
        list_id: &str,
        item_id: &str,
        patch: &ItemPatch,
    ) -> Result<Item, ClientError> {
        let result = self.client.update_item(list_id, item_id, patch).await;
        self.settle(result, "Error updating item", |item| ListAction::ItemUpdated {
            list_id: list_id.to_string(),
            item: item.clone(),
        })
    }

    /// Mark an item bought (or not).
    pub async fn set_purchased(
        &mut self,
        list_id: &str,
        item_id: &str,
        is_purchased: bool,
    ) -> Result<Item, ClientError> {
        self.update_item(list_id, item_id, &ItemPatch::purchased(is_purchased))
            .await
    }

    pub async fn delete_item(&mut self, list_id: &str, item_id: &str) -> Result<(), ClientError> {
        let result = self.client.delete_item(list_id, item_id).await.map(|_| ());
        self.settle(result, "Error deleting item", |_| ListAction::ItemDeleted {
            list_id: list_id.to_string(),
            item_id: item_id.to_string(),
        })
    }

    pub async fn share_list(&mut self, id: &str, email: &str) -> Result<ShoppingList, ClientError> {
        let result = self.client.share_list(id, &ShareRequest::new(email)).await;
        self.settle(result, "Error sharing list", |list| {
            ListAction::ListUpdated(list.clone())
        })
    }

    fn settle<T>(
        &mut self,
        result: Result<T, ClientError>,
        fallback: &str,
        on_success: impl FnOnce(&T) -> ListAction,
    ) -> Result<T, ClientError> {
        let action = match &result {
            Ok(value) => on_success(value),
            Err(e) => ListAction::Failed(failure_message(e, fallback)),
        };
        self.dispatch(action);
        result
    }
}

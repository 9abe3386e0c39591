//! Client-side caches and the reducers that reconcile them with server
//! responses.
//!
//! Reducers are pure: they take the previous state by value and return the
//! next one. Side effects (persisting the auth token, issuing requests) belong
//! to whoever dispatches the action.

use crate::models::{Item, ShoppingList, User};

// ── Shopping lists ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct ListState {
    pub lists: Vec<ShoppingList>,
    pub current_list: Option<ShoppingList>,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl Default for ListState {
    fn default() -> Self {
        Self {
            lists: Vec::new(),
            current_list: None,
            is_loading: true,
            error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ListAction {
    ListsLoaded(Vec<ShoppingList>),
    ListLoaded(ShoppingList),
    ListAdded(ShoppingList),
    ListUpdated(ShoppingList),
    ListDeleted(String),
    ItemAdded { list_id: String, item: Item },
    ItemUpdated { list_id: String, item: Item },
    ItemDeleted { list_id: String, item_id: String },
    Failed(String),
    ClearErrors,
}

impl ListState {
    pub fn reduce(mut self, action: ListAction) -> Self {
        match action {
            ListAction::ListsLoaded(lists) => {
                self.lists = lists;
                self.is_loading = false;
            }
            ListAction::ListLoaded(list) => {
                self.current_list = Some(list);
                self.is_loading = false;
            }
            ListAction::ListAdded(list) => {
                self.lists.push(list);
                self.is_loading = false;
            }
            ListAction::ListUpdated(list) => {
                if let Some(slot) = self.lists.iter_mut().find(|l| l.id == list.id) {
                    *slot = list.clone();
                }
                if self.current_list.as_ref().is_some_and(|c| c.id == list.id) {
                    self.current_list = Some(list);
                }
                self.is_loading = false;
            }
            ListAction::ListDeleted(id) => {
                self.lists.retain(|l| l.id != id);
                if self.current_list.as_ref().is_some_and(|c| c.id == id) {
                    self.current_list = None;
                }
                self.is_loading = false;
            }
            ListAction::ItemAdded { list_id, item } => {
                self.each_copy_of(&list_id, |list| list.items.push(item.clone()));
                self.is_loading = false;
            }
            ListAction::ItemUpdated { list_id, item } => {
                self.each_copy_of(&list_id, |list| {
                    if let Some(slot) = list.items.iter_mut().find(|i| i.id == item.id) {
                        *slot = item.clone();
                    }
                });
                self.is_loading = false;
            }
            ListAction::ItemDeleted { list_id, item_id } => {
                self.each_copy_of(&list_id, |list| list.items.retain(|i| i.id != item_id));
                self.is_loading = false;
            }
            ListAction::Failed(message) => {
                self.error = Some(message);
                self.is_loading = false;
            }
            ListAction::ClearErrors => {
                self.error = None;
            }
        }
        self
    }

    /// Applies `f` to the cached copy in `lists` and to `current_list`, when
    /// either holds the list with `list_id`.
    fn each_copy_of(&mut self, list_id: &str, mut f: impl FnMut(&mut ShoppingList)) {
        if let Some(list) = self.lists.iter_mut().find(|l| l.id == list_id) {
            f(list);
        }
        if let Some(current) = self.current_list.as_mut().filter(|c| c.id == list_id) {
            f(current);
        }
    }
}

// ── Authentication ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct AuthState {
    pub user: Option<User>,
    pub token: Option<String>,
    pub is_authenticated: bool,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl AuthState {
    /// Initial state, seeded with a token persisted by an earlier session.
    pub fn with_token(token: Option<String>) -> Self {
        Self {
            user: None,
            token,
            is_authenticated: false,
            is_loading: true,
            error: None,
        }
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self::with_token(None)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthAction {
    UserLoaded(User),
    LoginSucceeded { user: User, token: String },
    RegisterSucceeded { user: User, token: String },
    AuthError,
    LoginFailed(Option<String>),
    RegisterFailed(Option<String>),
    Logout,
    ClearErrors,
}

impl AuthState {
    pub fn reduce(mut self, action: AuthAction) -> Self {
        match action {
            AuthAction::UserLoaded(user) => {
                self.user = Some(user);
                self.is_authenticated = true;
                self.is_loading = false;
            }
            AuthAction::LoginSucceeded { user, token }
            | AuthAction::RegisterSucceeded { user, token } => {
                self.user = Some(user);
                self.token = Some(token);
                self.is_authenticated = true;
                self.is_loading = false;
                self.error = None;
            }
            AuthAction::AuthError | AuthAction::Logout => self.sign_out(None),
            AuthAction::LoginFailed(message) | AuthAction::RegisterFailed(message) => {
                self.sign_out(message)
            }
            AuthAction::ClearErrors => {
                self.error = None;
            }
        }
        self
    }

    fn sign_out(&mut self, error: Option<String>) {
        self.token = None;
        self.user = None;
        self.is_authenticated = false;
        self.is_loading = false;
        self.error = error;
    }
}

//! Shared domain types for Shoplist.
//!
//! Used by both the HTTP backend and the client: wire models, request
//! payloads with their validation rules, budget/progress derivations and the
//! reducers that keep a client-side cache consistent with server responses.

pub mod models;
pub mod payloads;
pub mod state;
pub mod summary;

pub use models::{Access, AuthResponse, Item, MessageResponse, ShoppingList, User};
pub use payloads::{
    Credentials, ItemPatch, ListPatch, NewItem, NewList, Registration, ShareRequest,
    ValidationReport,
};
pub use state::{AuthAction, AuthState, ListAction, ListState};
pub use summary::ListSummary;

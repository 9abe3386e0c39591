//! Client side of the API: a typed HTTP client, token persistence, and
//! stores that feed server responses through the shared reducers.

pub mod http;
pub mod session;
pub mod token;

pub use http::ApiClient;
pub use session::{AuthStore, ListStore};
pub use token::TokenStore;

//! HTTP backend for shared shopping lists.
//!
//! ## Module Map
//!
//! ```text
//! ┌──────────┐   HTTP   ┌──────────────────────────────────────────────────┐
//! │  Client  │ ───────> │  server.rs  (Router, TraceLayer, CORS, shutdown) │
//! │          │ <─────── │    └─ api.rs  (route handlers, AppState)         │
//! └──────────┘          │         │                                        │
//!                       │         │ AuthUser / ValidJson extractors        │
//!                       │         v                                        │
//!                       │  extract.rs  (token header, JSON rejections)     │
//!                       │         │                                        │
//!                       │         │ DbHandle::call()                       │
//!                       │         v                                        │
//!                       │  db.rs   (ShopDb over SQLite)                    │
//!                       └──────────────────────────────────────────────────┘
//! ```
//!
//! | Module    | Responsibility                                           |
//! |-----------|----------------------------------------------------------|
//! | `auth`    | HS256 session tokens (`TokenSigner`), Argon2id hashing   |
//! | `db`      | Users, lists, shares and items; `DbHandle` for async use |
//! | `extract` | `AuthUser`, `JsonBody`, `ValidJson`, `parse_body`        |
//! | `api`     | Routes, ownership and sharing checks, `ApiError`         |
//! | `server`  | Router assembly and process lifecycle                    |
//!
//! ## Access rules
//!
//! Owners and collaborators (users listed in `sharedWith`) can read a list,
//! rename it, change its budget and manage its items. Only the owner can
//! delete or share it.

pub mod api;
pub mod auth;
pub mod db;
pub mod extract;
pub mod server;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Public projection of an account. The password hash never leaves the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub quantity: f64,
    pub price: f64,
    pub is_purchased: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// Price times quantity.
    pub fn line_total(&self) -> f64 {
        self.price * self.quantity
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShoppingList {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub items: Vec<Item>,
    pub owner: String,
    pub shared_with: Vec<String>,
    pub total_budget: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ShoppingList {
    /// How `user_id` relates to this list.
    pub fn access_for(&self, user_id: &str) -> Access {
        if self.owner == user_id {
            Access::Owner
        } else if self.shared_with.iter().any(|id| id == user_id) {
            Access::Shared
        } else {
            Access::Denied
        }
    }

    pub fn item(&self, item_id: &str) -> Option<&Item> {
        self.items.iter().find(|item| item.id == item_id)
    }
}

/// A caller's standing on a list.
///
/// Owners and collaborators may read the list and change its contents; only
/// the owner may delete or share it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Owner,
    Shared,
    Denied,
}

impl Access {
    pub fn can_view(self) -> bool {
        !matches!(self, Self::Denied)
    }

    pub fn can_edit(self) -> bool {
        self.can_view()
    }

    pub fn is_owner(self) -> bool {
        matches!(self, Self::Owner)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

/// Plain acknowledgement body, e.g. `{"msg": "List removed"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub msg: String,
}

impl MessageResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}

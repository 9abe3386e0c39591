//! Request bodies shared by the backend (which validates them) and the client
//! (which sends them).
//!
//! Field-level rules live on the types as `validator` attributes. A failed
//! validation is flattened into a [`ValidationReport`] keyed by wire field
//! path, e.g. `totalBudget` or `items[1].price`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError, ValidationErrors, ValidationErrorsKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewItem {
    #[validate(length(min = 1, message = "Item name is required"))]
    pub name: String,
    #[validate(range(exclusive_min = 0.0, message = "Quantity must be positive"))]
    pub quantity: f64,
    #[validate(range(min = 0.0, message = "Price cannot be negative"))]
    pub price: f64,
    #[serde(default)]
    pub is_purchased: bool,
}

impl NewItem {
    pub fn new(name: impl Into<String>, quantity: f64, price: f64) -> Self {
        Self {
            name: name.into(),
            quantity,
            price,
            is_purchased: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewList {
    #[validate(length(min = 1, message = "List name is required"))]
    pub name: String,
    #[validate(range(min = 0.0, message = "Budget cannot be negative"))]
    pub total_budget: f64,
    #[serde(default)]
    pub shared_with: Vec<String>,
    #[serde(default)]
    #[validate(nested)]
    pub items: Vec<NewItem>,
}

impl NewList {
    pub fn new(name: impl Into<String>, total_budget: f64) -> Self {
        Self {
            name: name.into(),
            total_budget,
            shared_with: Vec::new(),
            items: Vec::new(),
        }
    }
}

/// Partial list update. An empty `name` is treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ListPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0, message = "Budget cannot be negative"))]
    pub total_budget: Option<f64>,
}

impl ListPatch {
    pub fn effective_name(&self) -> Option<&str> {
        self.name.as_deref().filter(|name| !name.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ItemPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, message = "Item name is required"))]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(exclusive_min = 0.0, message = "Quantity must be positive"))]
    pub quantity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0, message = "Price cannot be negative"))]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_purchased: Option<bool>,
}

impl ItemPatch {
    pub fn purchased(is_purchased: bool) -> Self {
        Self {
            is_purchased: Some(is_purchased),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.quantity.is_none()
            && self.price.is_none()
            && self.is_purchased.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShareRequest {
    #[serde(default)]
    pub email: String,
}

impl ShareRequest {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
        }
    }

    /// The trimmed address, or `None` when blank.
    pub fn email(&self) -> Option<&str> {
        Some(self.email.trim()).filter(|email| !email.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Registration {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Please enter a valid email address"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters long"))]
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Credentials {
    #[validate(email(message = "Please enter a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Lower-cases and trims an address so lookups are case-insensitive.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// ── Validation reports ────────────────────────────────────────────────

/// Field path → messages, serialized as the `errors` member of a 400 body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationReport(pub BTreeMap<String, Vec<String>>);

impl ValidationReport {
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut report = Self::default();
        report.push(field, message);
        report
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn messages(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or_default()
    }
}

impl From<&ValidationErrors> for ValidationReport {
    fn from(errors: &ValidationErrors) -> Self {
        let mut report = Self::default();
        collect(errors, "", &mut report);
        report
    }
}

/// Runs the derived rules and flattens any failure.
pub fn check<T: Validate>(payload: &T) -> Result<(), ValidationReport> {
    payload.validate().map_err(|errors| ValidationReport::from(&errors))
}

fn collect(errors: &ValidationErrors, prefix: &str, report: &mut ValidationReport) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            camel_case(field)
        } else {
            format!("{}.{}", prefix, camel_case(field))
        };
        match kind {
            ValidationErrorsKind::Field(failures) => {
                for failure in failures {
                    report.push(path.clone(), message_of(failure));
                }
            }
            ValidationErrorsKind::Struct(inner) => collect(inner, &path, report),
            ValidationErrorsKind::List(entries) => {
                for (index, inner) in entries {
                    collect(inner, &format!("{}[{}]", path, index), report);
                }
            }
        }
    }
}

fn message_of(failure: &ValidationError) -> String {
    failure
        .message
        .as_ref()
        .map(|message| message.to_string())
        .unwrap_or_else(|| format!("Invalid value ({})", failure.code))
}

fn camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for ch in field.chars() {
        if ch == '_' {
            upper = true;
        } else if upper {
            out.extend(ch.to_uppercase());
            upper = false;
        } else {
            out.push(ch);
        }
    }
    out
}

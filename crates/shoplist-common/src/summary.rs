use serde::{Deserialize, Serialize};

use crate::models::ShoppingList;

/// Budget and progress figures derived from a list's items.
///
/// Only purchased items count towards `total_spent`. Both percentages fall
/// back to zero when their denominator is zero; `budget_progress` is not
/// capped so overspending stays visible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSummary {
    pub list_id: String,
    pub total_items: usize,
    pub purchased_items: usize,
    pub remaining_items: usize,
    pub total_budget: f64,
    pub total_spent: f64,
    pub estimated_total: f64,
    pub remaining_budget: f64,
    pub budget_progress: f64,
    pub progress: f64,
    pub over_budget: bool,
}

impl ListSummary {
    pub fn of(list: &ShoppingList) -> Self {
        let total_items = list.items.len();
        let purchased_items = list.items.iter().filter(|item| item.is_purchased).count();
        let total_spent: f64 = list
            .items
            .iter()
            .filter(|item| item.is_purchased)
            .map(|item| item.line_total())
            .sum();
        let estimated_total = list.items.iter().map(|item| item.line_total()).sum();
        let budget_progress = percent(total_spent, list.total_budget);
        let progress = percent(purchased_items as f64, total_items as f64);

        Self {
            list_id: list.id.clone(),
            total_items,
            purchased_items,
            remaining_items: total_items - purchased_items,
            total_budget: list.total_budget,
            total_spent,
            estimated_total,
            remaining_budget: list.total_budget - total_spent,
            budget_progress,
            progress,
            over_budget: budget_progress > 100.0,
        }
    }

    /// Budget progress clamped to 100 for fixed-width bars.
    pub fn budget_bar_width(&self) -> f64 {
        self.budget_progress.min(100.0)
    }
}

fn percent(part: f64, whole: f64) -> f64 {
    if whole > 0.0 { part / whole * 100.0 } else { 0.0 }
}

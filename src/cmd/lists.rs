//! List commands (`shoplist lists`).

use anyhow::Result;
use console::style;
use shoplist_common::{ListPatch, ListSummary, NewItem, NewList, ShoppingList};

use super::super::ListsCommands;
use super::{ClientContext, money, settled};

pub async fn cmd_lists(ctx: &ClientContext, command: &ListsCommands, yes: bool) -> Result<()> {
    let mut store = ctx.list_store()?;

    match command {
        ListsCommands::Ls => {
            let result = store.load_lists().await;
            let lists = settled(&store, result)?;
            if lists.is_empty() {
                println!("No shopping lists yet. Create one with `shoplist lists create`.");
            }
            for list in &lists {
                println!("{}", list_line(list));
            }
        }
        ListsCommands::Show { id } => {
            let result = store.load_list(id).await;
            let list = settled(&store, result)?;
            let summary = store.client().summary(id).await;
            let summary = settled(&store, summary)?;
            print_list(&list, &summary);
        }
        ListsCommands::Create {
            name,
            budget,
            items,
            shared_with,
        } => {
            let new = NewList {
                name: name.clone(),
                total_budget: *budget,
                shared_with: shared_with.clone(),
                items: items.clone(),
            };
            let result = store.add_list(&new).await;
            let list = settled(&store, result)?;
            println!("{} Created list {} ({})", style("✓").green(), list.name, list.id);
        }
        ListsCommands::Update { id, name, budget } => {
            let patch = ListPatch {
                name: name.clone(),
                total_budget: *budget,
            };
            let result = store.update_list(id, &patch).await;
            let list = settled(&store, result)?;
            println!("{} Updated {}", style("✓").green(), list_line(&list));
        }
        ListsCommands::Delete { id } => {
            if !yes {
                let confirmed = dialoguer::Confirm::new()
                    .with_prompt(format!("Delete list {} and all its items?", id))
                    .default(false)
                    .interact()?;
                if !confirmed {
                    println!("Cancelled");
                    return Ok(());
                }
            }
            let result = store.delete_list(id).await;
            settled(&store, result)?;
            println!("{} List removed", style("✓").green());
        }
        ListsCommands::Share { id, email } => {
            let result = store.share_list(id, email).await;
            let list = settled(&store, result)?;
            println!(
                "{} Shared {} with {} ({} collaborator{})",
                style("✓").green(),
                list.name,
                email,
                list.shared_with.len(),
                if list.shared_with.len() == 1 { "" } else { "s" }
            );
        }
    }
    Ok(())
}

/// Parse `NAME[:QUANTITY[:PRICE]]`. Quantity defaults to 1 and price to 0.
pub fn parse_item_spec(spec: &str) -> Result<NewItem, String> {
    let mut parts = spec.splitn(3, ':');
    let name = parts.next().unwrap_or_default().trim();
    if name.is_empty() {
        return Err("item name is empty".to_string());
    }
    let number = |field: &str, raw: Option<&str>, default: f64| -> Result<f64, String> {
        match raw.map(str::trim).filter(|s| !s.is_empty()) {
            None => Ok(default),
            Some(raw) => raw
                .parse::<f64>()
                .map_err(|_| format!("invalid {} '{}'", field, raw)),
        }
    };
    let quantity = number("quantity", parts.next(), 1.0)?;
    let price = number("price", parts.next(), 0.0)?;
    Ok(NewItem::new(name, quantity, price))
}

fn list_line(list: &ShoppingList) -> String {
    let summary = ListSummary::of(list);
    format!(
        "{}  {}  {}/{} bought  {} of {}{}",
        style(&list.id).dim(),
        style(&list.name).bold(),
        summary.purchased_items,
        summary.total_items,
        money(summary.total_spent),
        money(summary.total_budget),
        if list.shared_with.is_empty() { "" } else { "  (shared)" }
    )
}

fn print_list(list: &ShoppingList, summary: &ListSummary) {
    println!("{}", style(&list.name).bold());
    println!("{}", style(&list.id).dim());
    println!();
    if list.items.is_empty() {
        println!("  (no items)");
    }
    for item in &list.items {
        let mark = if item.is_purchased { "[x]" } else { "[ ]" };
        println!(
            "  {} {} × {} @ {} = {}   {}",
            mark,
            item.name,
            item.quantity,
            money(item.price),
            money(item.line_total()),
            style(&item.id).dim()
        );
    }
    println!();
    println!(
        "Progress: {}/{} items ({:.0}%)",
        summary.purchased_items, summary.total_items, summary.progress
    );
    let budget = format!(
        "Budget:   {} of {} spent ({:.0}%), {} estimated",
        money(summary.total_spent),
        money(summary.total_budget),
        summary.budget_progress,
        money(summary.estimated_total)
    );
    if summary.over_budget {
        println!("{} {}", style(budget).red(), style("over budget").red().bold());
    } else {
        println!("{}", budget);
    }
    println!("          {}", budget_bar(summary, 30));
}

/// Fixed-width bar, full at 100% of the budget.
fn budget_bar(summary: &ListSummary, width: usize) -> String {
    let filled = ((summary.budget_bar_width() / 100.0) * width as f64).round() as usize;
    let filled = filled.min(width);
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_item_spec_defaults() {
        let item = parse_item_spec("Milk").unwrap();
        assert_eq!(item, NewItem::new("Milk", 1.0, 0.0));
    }

    #[test]
    fn test_parse_item_spec_full() {
        let item = parse_item_spec("Eggs:12:0.25").unwrap();
        assert_eq!(item, NewItem::new("Eggs", 12.0, 0.25));
    }

    #[test]
    fn test_parse_item_spec_errors() {
        assert!(parse_item_spec("").is_err());
        assert!(parse_item_spec(":2:1").is_err());
        assert_eq!(
            parse_item_spec("Milk:lots").unwrap_err(),
            "invalid quantity 'lots'"
        );
    }

    #[test]
    fn test_budget_bar_caps_when_over_budget() {
        let mut summary = ListSummary {
            list_id: "l".into(),
            total_items: 1,
            purchased_items: 1,
            remaining_items: 0,
            total_budget: 10.0,
            total_spent: 5.0,
            estimated_total: 5.0,
            remaining_budget: 5.0,
            budget_progress: 50.0,
            progress: 100.0,
            over_budget: false,
        };
        assert_eq!(budget_bar(&summary, 10), "[#####-----]");
        summary.budget_progress = 250.0;
        assert_eq!(budget_bar(&summary, 10), "[##########]");
    }
}

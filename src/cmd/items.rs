//! Item commands (`shoplist items`).

use anyhow::Result;
use console::style;
use shoplist_common::{ItemPatch, NewItem};

use super::super::ItemsCommands;
use super::{ClientContext, money, settled};

pub async fn cmd_items(ctx: &ClientContext, command: &ItemsCommands) -> Result<()> {
    let mut store = ctx.list_store()?;

    match command {
        ItemsCommands::Add {
            list,
            name,
            quantity,
            price,
        } => {
            let new = NewItem::new(name.clone(), *quantity, *price);
            let result = store.add_item(list, &new).await;
            let item = settled(&store, result)?;
            println!(
                "{} Added {} × {} @ {} ({})",
                style("✓").green(),
                item.name,
                item.quantity,
                money(item.price),
                item.id
            );
        }
        ItemsCommands::Update {
            list,
            item,
            name,
            quantity,
            price,
        } => {
            let patch = ItemPatch {
                name: name.clone(),
                quantity: *quantity,
                price: *price,
                is_purchased: None,
            };
            if patch.is_empty() {
                anyhow::bail!("Nothing to update. Pass --name, --quantity or --price.");
            }
            let result = store.update_item(list, item, &patch).await;
            let updated = settled(&store, result)?;
            println!("{} Updated {}", style("✓").green(), updated.name);
        }
        ItemsCommands::Purchase { list, item, undo } => {
            let result = store.set_purchased(list, item, !undo).await;
            let updated = settled(&store, result)?;
            let verb = if updated.is_purchased { "bought" } else { "not bought" };
            println!("{} {} marked {}", style("✓").green(), updated.name, verb);
        }
        ItemsCommands::Remove { list, item } => {
            let result = store.delete_item(list, item).await;
            settled(&store, result)?;
            println!("{} Item removed", style("✓").green());
        }
    }
    Ok(())
}

use clap::Subcommand;

use crate::config::Config;
use crate::entities::item_cache::{CachedItem, ItemCache};
use crate::entities::shopping_list::Priority;
use crate::error::ShoplistError;

#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// Look up an item by name (partial names match)
    Get { name: String },
    /// List every cached item
    List,
    /// Add or replace an item
    Add {
        name: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long, value_enum, default_value_t = Priority::Medium)]
        priority: Priority,
        /// Estimated cost, e.g. "$4.99"
        #[arg(long)]
        cost: Option<String>,
        #[arg(long)]
        quantity: Option<String>,
    },
}

fn cell(value: Option<&str>) -> &str {
    value.filter(|v| !v.trim().is_empty()).unwrap_or("-")
}

fn table(rows: &[(String, CachedItem)]) -> String {
    let mut out = String::from("| Item | Category | Priority | Cost | Quantity |\n");
    out.push_str("|------|----------|----------|------|----------|\n");
    for (name, item) in rows {
        out.push_str(&format!(
            "| {name} | {} | {} | {} | {} |\n",
            cell(item.category.as_deref()),
            item.priority,
            cell(item.estimated_cost.as_deref()),
            cell(item.quantity.as_deref()),
        ));
    }
    out
}

pub fn run(cmd: CacheCommand, config: &Config) -> anyhow::Result<String> {
    let cache = ItemCache::new(config.item_cache_path());
    match cmd {
        CacheCommand::Get { name } => match cache.get(&name) {
            Some((key, item)) => {
                let body = table(&[(key.clone(), item)]);
                Ok(format!("# Cached item: {key}\n\n{body}"))
            }
            None => Err(ShoplistError::NotFound {
                entity: "cached item".into(),
                id: name,
                suggestion: "See cached items with: shoplist cache list".into(),
            }
            .into()),
        },
        CacheCommand::List => {
            let rows = cache.list();
            Ok(format!(
                "# Item Cache ({} items)\n\n{}\nStored at `{}`\n",
                rows.len(),
                table(&rows),
                cache.path().display()
            ))
        }
        CacheCommand::Add {
            name,
            category,
            priority,
            cost,
            quantity,
        } => {
            let item = CachedItem {
                category,
                priority,
                estimated_cost: cost,
                quantity,
            };
            cache.add(&name, item.clone())?;
            Ok(format!(
                "Cached `{}`.\n\n{}",
                name.trim().to_lowercase(),
                table(&[(name.trim().to_lowercase(), item)])
            ))
        }
    }
}

//! Output renderers for shopping lists, notes, and cost reports.

pub(crate) mod json;
pub(crate) mod markdown;

use crate::config::OutputFormat;
use crate::entities::shopping_list::ShoppingList;
use crate::error::ShoplistError;

pub(crate) fn shopping_list(list: &ShoppingList, format: OutputFormat) -> Result<String, ShoplistError> {
    match format {
        OutputFormat::Json => json::to_pretty(list),
        OutputFormat::Markdown => markdown::shopping_list_markdown(list),
        OutputFormat::Text => markdown::shopping_list_text(list),
    }
}

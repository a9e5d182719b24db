use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::entities::shopping_list::ShoppingList;
use crate::error::ShoplistError;
use crate::utils::money::{format_usd, parse_usd};

fn json_fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```(?:json|JSON)\s*\n?(.*?)```").expect("valid regex"))
}

/// Pulls the JSON object out of a model answer.
///
/// A fenced ```json block wins; otherwise the slice between the first `{` and
/// the last `}`.
pub fn extract_json(text: &str) -> Option<&str> {
    if let Some(body) = json_fence_re()
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|body| !body.is_empty())
    {
        return Some(body);
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn parse_error(message: impl Into<String>, raw: &str) -> ShoplistError {
    ShoplistError::ResponseParse {
        message: message.into(),
        raw: raw.to_string(),
    }
}

pub fn parse_response(text: &str) -> Result<ShoppingList, ShoplistError> {
    let Some(body) = extract_json(text) else {
        return Err(parse_error("No JSON found in response", text));
    };
    let list: ShoppingList = serde_json::from_str(body)
        .map_err(|err| parse_error(format!("Invalid JSON in response: {err}"), text))?;
    Ok(normalize(list))
}

/// Drops nameless items and fills in a missing total from item costs.
pub fn normalize(mut list: ShoppingList) -> ShoppingList {
    list.items.retain(|item| !item.item.trim().is_empty());
    for item in &mut list.items {
        item.item = item.item.trim().to_string();
        item.category = item
            .category
            .take()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
    }

    if list.categories.is_empty() {
        for category in list.items.iter().filter_map(|i| i.category.as_deref()) {
            if !list.categories.iter().any(|c| c.eq_ignore_ascii_case(category)) {
                list.categories.push(category.to_string());
            }
        }
    }

    if list.total_estimated_cost.is_none() {
        let costs = list
            .items
            .iter()
            .filter_map(|item| item.estimated_cost.as_deref().and_then(parse_usd))
            .collect::<Vec<_>>();
        if !costs.is_empty() {
            let total: f64 = costs.iter().sum();
            debug!(priced_items = costs.len(), total, "Computed missing total");
            list.total_estimated_cost = Some(format_usd(total));
        }
    }
    list
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::shopping_list::Priority;

    #[test]
    fn extract_json_prefers_fenced_block() {
        let text = "Note {not this}\n```json\n{\"shopping_list\": []}\n```\ntrailing }";
        assert_eq!(extract_json(text), Some("{\"shopping_list\": []}"));
    }

    #[test]
    fn extract_json_falls_back_to_outer_braces() {
        let text = "Sure! {\"shopping_list\": [{\"item\": \"milk\"}]} Hope that helps.";
        assert_eq!(
            extract_json(text),
            Some("{\"shopping_list\": [{\"item\": \"milk\"}]}")
        );
        assert_eq!(extract_json("no braces here"), None);
        assert_eq!(extract_json("} backwards {"), None);
    }

    #[test]
    fn parse_response_without_json_keeps_raw_text() {
        let err = parse_response("Nothing to buy.").unwrap_err();
        match err {
            ShoplistError::ResponseParse { message, raw } => {
                assert_eq!(message, "No JSON found in response");
                assert_eq!(raw, "Nothing to buy.");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn parse_response_reports_invalid_json() {
        let err = parse_response("{\"shopping_list\": [}").unwrap_err();
        assert!(err.to_string().contains("Invalid JSON in response"));
    }

    #[test]
    fn parse_response_normalizes_items_and_total() {
        let list = parse_response(
            r#"{"shopping_list":[
                {"item":" Light bulbs (LED) ","category":"hardware","priority":"high","estimated_cost":"$8-$12"},
                {"item":"","category":"hardware"},
                {"item":"Soap","category":"Household","estimated_cost":3.25},
                {"item":"Kimchi","category":"groceries"}
            ]}"#,
        )
        .unwrap();

        assert_eq!(list.items.len(), 3);
        assert_eq!(list.items[0].item, "Light bulbs (LED)");
        assert_eq!(list.items[0].priority, Priority::High);
        assert_eq!(list.items[1].priority, Priority::Medium);
        assert_eq!(list.total_estimated_cost.as_deref(), Some("$13.25"));
        assert_eq!(list.categories, vec!["hardware", "Household", "groceries"]);
    }

    #[test]
    fn model_total_is_kept() {
        let list = parse_response(
            r#"{"shopping_list":[{"item":"milk","estimated_cost":"$4"}],"total_estimated_cost":"about $5","categories":["dairy"]}"#,
        )
        .unwrap();
        assert_eq!(list.total_estimated_cost.as_deref(), Some("about $5"));
        assert_eq!(list.categories, vec!["dairy"]);
    }

    #[test]
    fn items_without_costs_leave_total_empty() {
        let list = parse_response(r#"{"items":[{"item":"milk"}]}"#).unwrap();
        assert_eq!(list.items.len(), 1);
        assert_eq!(list.total_estimated_cost, None);
    }

    #[test]
    fn unusual_field_shapes_still_parse() {
        let list = parse_response(
            r#"{"shopping_list":[
                {"item":"Ground beef","quantity":{"amount":2,"unit":"lb"},"category":7,"notes":["lean"],"estimated_cost":"$5.99 (2-pack)"},
                {"item":"Sponges","estimated_cost":"$4.29 for 12-count"},
                "Batteries"
            ],
            "recommended_stores":[{"name":"Target"},"Costco"],
            "categories":[{"name":"meat"}],
            "timing":"soon"}"#,
        )
        .unwrap();

        assert_eq!(list.items.len(), 3);
        assert_eq!(
            list.items[0].quantity.as_deref(),
            Some(r#"{"amount":2,"unit":"lb"}"#)
        );
        assert_eq!(list.items[0].category.as_deref(), Some("7"));
        assert_eq!(list.items[0].notes.as_deref(), Some(r#"["lean"]"#));
        assert_eq!(list.items[2].item, "Batteries");
        assert_eq!(list.recommended_stores, vec!["Target", "Costco"]);
        assert_eq!(list.categories, vec!["meat"]);
        assert_eq!(list.timing, None);
        assert_eq!(list.total_estimated_cost.as_deref(), Some("$10.28"));
    }

    #[test]
    fn structured_total_is_kept_as_text() {
        let list = parse_response(
            r#"{"shopping_list":[{"item":"Milk","estimated_cost":"$4"}],"total_estimated_cost":{"min":10,"max":20}}"#,
        )
        .unwrap();
        let total: serde_json::Value =
            serde_json::from_str(list.total_estimated_cost.as_deref().unwrap()).unwrap();
        assert_eq!(total, serde_json::json!({"min": 10, "max": 20}));
    }
}

use std::sync::OnceLock;

use minijinja::{Environment, context};
use serde::Serialize;

use crate::entities::cost::{CostProfile, CostStats, ModelCostRow};
use crate::entities::note::Note;
use crate::entities::shopping_list::{ShoppingItem, ShoppingList};
use crate::error::ShoplistError;

static ENV: OnceLock<Environment<'static>> = OnceLock::new();

const UNCATEGORIZED: &str = "Other";

#[derive(Serialize)]
struct CategoryGroup<'a> {
    category: String,
    items: Vec<&'a ShoppingItem>,
}

fn env() -> Result<&'static Environment<'static>, ShoplistError> {
    if let Some(env) = ENV.get() {
        return Ok(env);
    }

    let mut env = Environment::new();
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    env.add_filter("usd", |v: f64| -> String { format!("${v:.2}") });
    env.add_filter("usd4", |v: f64| -> String { format!("${v:.4}") });
    env.add_template(
        "shopping_list.md.j2",
        include_str!("../../templates/shopping_list.md.j2"),
    )?;
    env.add_template(
        "shopping_list.txt.j2",
        include_str!("../../templates/shopping_list.txt.j2"),
    )?;
    env.add_template("note.md.j2", include_str!("../../templates/note.md.j2"))?;
    env.add_template(
        "cost_summary.md.j2",
        include_str!("../../templates/cost_summary.md.j2"),
    )?;
    env.add_template(
        "cost_models.md.j2",
        include_str!("../../templates/cost_models.md.j2"),
    )?;

    let _ = ENV.set(env);
    ENV.get().ok_or_else(|| ShoplistError::Api {
        api: "render".into(),
        message: "Template environment failed to initialize".into(),
    })
}

/// Capitalises each word and each part after `-` or `/`; `_` reads as a space.
pub(crate) fn title_case(raw: &str) -> String {
    raw.split(|c: char| c.is_whitespace() || c == '_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut prev: Option<char> = None;
            word.chars()
                .flat_map(|c| {
                    let upper = prev.is_none_or(|p| p == '-' || p == '/');
                    prev = Some(c);
                    if upper {
                        c.to_uppercase().collect::<Vec<_>>()
                    } else {
                        c.to_lowercase().collect::<Vec<_>>()
                    }
                })
                .collect::<String>()
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Groups items by title-cased category in first-seen order.
fn group_by_category(items: &[ShoppingItem]) -> Vec<CategoryGroup<'_>> {
    let mut groups: Vec<CategoryGroup<'_>> = Vec::new();
    for item in items {
        let category = item
            .category
            .as_deref()
            .map(title_case)
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| UNCATEGORIZED.to_string());
        match groups.iter_mut().find(|g| g.category == category) {
            Some(group) => group.items.push(item),
            None => groups.push(CategoryGroup {
                category,
                items: vec![item],
            }),
        }
    }
    groups
}

pub fn shopping_list_markdown(list: &ShoppingList) -> Result<String, ShoplistError> {
    let tmpl = env()?.get_template("shopping_list.md.j2")?;
    let shopping_day = list
        .timing
        .as_ref()
        .map(|timing| timing.optimal_shopping_day.as_str());
    Ok(tmpl.render(context! {
        groups => group_by_category(&list.items),
        total => &list.total_estimated_cost,
        shopping_day => shopping_day,
        stores => &list.recommended_stores,
    })?)
}

pub fn shopping_list_text(list: &ShoppingList) -> Result<String, ShoplistError> {
    let tmpl = env()?.get_template("shopping_list.txt.j2")?;
    Ok(tmpl.render(context! {
        rule => "=".repeat(40),
        items => &list.items,
        total => &list.total_estimated_cost,
    })?)
}

pub fn note_markdown(note: &Note) -> Result<String, ShoplistError> {
    let tmpl = env()?.get_template("note.md.j2")?;
    Ok(tmpl.render(context! {
        id => &note.id,
        title => &note.title,
        source => &note.source,
        text => &note.text,
        images => &note.images,
        links => &note.links,
        created_date => &note.created_date,
        modified_date => &note.modified_date,
    })?)
}

pub fn cost_summary_markdown(stats: &CostStats) -> Result<String, ShoplistError> {
    let tmpl = env()?.get_template("cost_summary.md.j2")?;
    Ok(tmpl.render(context! { stats => stats })?)
}

pub fn model_costs_markdown(
    rows: &[ModelCostRow],
    current: &str,
    input_tokens: u64,
    output_tokens: u64,
) -> Result<String, ShoplistError> {
    let tmpl = env()?.get_template("cost_models.md.j2")?;
    Ok(tmpl.render(context! {
        rows => rows,
        current => current,
        input_tokens => input_tokens,
        output_tokens => output_tokens,
    })?)
}

pub fn profiles_markdown(active_model: &str) -> String {
    let mut out = String::from("# Cost Profiles\n\n");
    out.push_str("| Profile | Max tokens | Temperature | Description |\n");
    out.push_str("|---------|------------|-------------|-------------|\n");
    for profile in CostProfile::ALL {
        let settings = profile.settings();
        out.push_str(&format!(
            "| {} | {} | {:.1} | {} |\n",
            profile.name(),
            settings.max_tokens,
            settings.temperature,
            settings.description
        ));
    }
    out.push_str(&format!(
        "\nModel: `{active_model}`. Use `shoplist process --profile <name>` to apply one.\n"
    ));
    out
}

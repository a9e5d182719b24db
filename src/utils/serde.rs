use serde::{Deserialize, Serialize};

/// Scalar the model may send quoted, as a bare number, or as some other JSON shape.
#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum StringOrNumber {
    #[default]
    None,
    Text(String),
    Integer(i64),
    Float(f64),
    Other(serde_json::Value),
}

impl StringOrNumber {
    /// Quantity-style rendering: numbers print as-is, blanks drop out.
    pub fn into_text(self) -> Option<String> {
        match self {
            Self::None => None,
            Self::Text(value) => {
                let value = value.trim();
                (!value.is_empty()).then(|| value.to_string())
            }
            Self::Integer(value) => Some(value.to_string()),
            Self::Float(value) => Some(trim_float(value)),
            Self::Other(value) => value_text(value),
        }
    }

    /// Cost-style rendering: bare numbers are dollar amounts.
    pub fn into_cost(self) -> Option<String> {
        match self {
            Self::Integer(value) => Some(crate::utils::money::format_usd(value as f64)),
            Self::Float(value) => Some(crate::utils::money::format_usd(value)),
            other => other.into_text(),
        }
    }
}

fn trim_float(value: f64) -> String {
    let mut out = format!("{value:.4}");
    while out.contains('.') && out.ends_with('0') {
        out.pop();
    }
    if out.ends_with('.') {
        out.pop();
    }
    out
}

/// Compact rendering for values that are not plain scalars; `null` drops out.
pub(crate) fn value_text(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(text) => StringOrNumber::Text(text).into_text(),
        serde_json::Value::Bool(flag) => Some(flag.to_string()),
        serde_json::Value::Number(number) => Some(number.to_string()),
        other => Some(other.to_string()),
    }
}

/// List entry label: strings as-is, `{"name": ...}` objects by name.
fn value_label(value: serde_json::Value) -> Option<String> {
    if let serde_json::Value::Object(map) = &value {
        if let Some(name) = ["name", "store", "category", "title"]
            .iter()
            .find_map(|key| map.get(*key).and_then(serde_json::Value::as_str))
        {
            return StringOrNumber::Text(name.to_string()).into_text();
        }
    }
    value_text(value)
}

pub(crate) fn string_or_number_as_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<StringOrNumber>::deserialize(deserializer)?.and_then(StringOrNumber::into_text))
}

pub(crate) fn string_or_number_as_cost<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<StringOrNumber>::deserialize(deserializer)?.and_then(StringOrNumber::into_cost))
}

/// Like [`string_or_number_as_text`] but for required text; missing or `null` is empty.
pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(string_or_number_as_text(deserializer)?.unwrap_or_default())
}

/// List of labels. Accepts a single value, `null`, or entries that are objects.
pub(crate) fn lenient_string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let values = match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Vec::new(),
        Some(serde_json::Value::Array(values)) => values,
        Some(value) => vec![value],
    };
    Ok(values.into_iter().filter_map(value_label).collect())
}

/// Values of the wrong shape are treated as absent.
pub(crate) fn invalid_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    Ok(Option::<serde_json::Value>::deserialize(deserializer)?
        .and_then(|value| serde_json::from_value(value).ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_or_number_helpers_cover_all_shapes() {
        assert_eq!(StringOrNumber::None.into_text(), None);
        assert_eq!(StringOrNumber::Text("  ".into()).into_text(), None);
        assert_eq!(
            StringOrNumber::Text("1 gallon".into()).into_text().as_deref(),
            Some("1 gallon")
        );
        assert_eq!(StringOrNumber::Integer(2).into_text().as_deref(), Some("2"));
        assert_eq!(StringOrNumber::Float(1.50).into_text().as_deref(), Some("1.5"));
    }

    #[test]
    fn numeric_costs_render_as_dollars() {
        assert_eq!(StringOrNumber::Float(3.5).into_cost().as_deref(), Some("$3.50"));
        assert_eq!(StringOrNumber::Integer(4).into_cost().as_deref(), Some("$4.00"));
        assert_eq!(
            StringOrNumber::Text("$4.99".into()).into_cost().as_deref(),
            Some("$4.99")
        );
    }

    #[test]
    fn untagged_deserialize_accepts_strings_and_numbers() {
        let values: Vec<StringOrNumber> =
            serde_json::from_str(r#"["12 oz", 3, 2.25]"#).expect("values");
        assert_eq!(values[0], StringOrNumber::Text("12 oz".into()));
        assert_eq!(values[1], StringOrNumber::Integer(3));
        assert_eq!(values[2], StringOrNumber::Float(2.25));
    }

    #[test]
    fn structured_values_render_as_compact_json() {
        let values: Vec<StringOrNumber> =
            serde_json::from_str(r#"[{"amount":2,"unit":"lb"}, true, [1, 2]]"#).expect("values");
        assert_eq!(
            values[0].clone().into_text().as_deref(),
            Some(r#"{"amount":2,"unit":"lb"}"#)
        );
        assert_eq!(values[1].clone().into_text().as_deref(), Some("true"));
        assert_eq!(values[2].clone().into_cost().as_deref(), Some("[1,2]"));
    }

    #[derive(Debug, Deserialize)]
    struct Labels {
        #[serde(default, deserialize_with = "lenient_string_list")]
        stores: Vec<String>,
    }

    #[test]
    fn label_lists_accept_objects_and_single_values() {
        let labels: Labels = serde_json::from_str(
            r#"{"stores":[{"name":"Target","reason":"cheap"}, "Costco", 7, null, {"aisle":3}]}"#,
        )
        .expect("labels");
        assert_eq!(labels.stores, vec!["Target", "Costco", "7", r#"{"aisle":3}"#]);

        let labels: Labels = serde_json::from_str(r#"{"stores":"Whole Foods"}"#).expect("labels");
        assert_eq!(labels.stores, vec!["Whole Foods"]);

        let labels: Labels = serde_json::from_str(r#"{"stores":null}"#).expect("labels");
        assert!(labels.stores.is_empty());
    }
}

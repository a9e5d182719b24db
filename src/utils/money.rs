use std::sync::OnceLock;

use regex::Regex;

const AMOUNT: &str = r"\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?";

fn amount_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(AMOUNT).expect("valid amount regex"))
}

fn dollar_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(&format!(r"\$\s*({AMOUNT})")).expect("valid dollar regex"))
}

fn range_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r"(?i)\$?\s*({AMOUNT})\s*(?:-|–|\bto\b)\s*\$?\s*({AMOUNT})"
        ))
        .expect("valid range regex")
    })
}

fn amount(raw: &str) -> Option<f64> {
    raw.replace(',', "").parse::<f64>().ok()
}

/// Parses a model-written price such as `$4.99`, `about $12`, or `$3-$5`.
///
/// A range is two amounts joined by a dash or "to" and resolves to its
/// midpoint. When the text has a `$`, the range must carry one too, so pack
/// sizes like `2-pack` are not read as prices. Otherwise the first
/// `$` amount wins, then the first bare number.
pub fn parse_usd(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let priced = raw.contains('$');
    let range = range_re()
        .captures_iter(raw)
        .find(|caps| !priced || caps.get(0).is_some_and(|m| m.as_str().contains('$')));
    if let Some(caps) = range {
        let low = caps.get(1).and_then(|m| amount(m.as_str()));
        let high = caps.get(2).and_then(|m| amount(m.as_str()));
        if let (Some(low), Some(high)) = (low, high) {
            return Some((low + high) / 2.0);
        }
    }

    dollar_re()
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .and_then(|m| amount(m.as_str()))
        .or_else(|| amount_re().find(raw).and_then(|m| amount(m.as_str())))
}

pub fn format_usd(value: f64) -> String {
    format!("${value:.2}")
}

pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10_f64.powi(places);
    (value * factor).round() / factor
}

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ShoplistError;
use crate::utils::money::round_to;

const MAX_LOGGED_CALLS: usize = 100;
const RECENT_CALLS: usize = 10;
const CALLS_PER_DAY: f64 = 30.0;
const CALLS_PER_MONTH: f64 = 900.0;

/// USD per million tokens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModelPricing {
    pub input: f64,
    pub output: f64,
}

/// Models listed by `cost models`.
pub const KNOWN_MODELS: &[&str] = &[
    "claude-sonnet-4-20250514",
    "claude-3-5-sonnet-20241022",
    "claude-3-5-haiku-20241022",
    "claude-3-haiku-20240307",
    "claude-opus-4-20250514",
];

pub fn pricing_for(model: &str) -> ModelPricing {
    let model = model.to_ascii_lowercase();
    if model.contains("claude-3-haiku") {
        ModelPricing {
            input: 0.25,
            output: 1.25,
        }
    } else if model.contains("haiku") {
        ModelPricing {
            input: 0.80,
            output: 4.00,
        }
    } else if model.contains("opus") {
        ModelPricing {
            input: 15.0,
            output: 75.0,
        }
    } else {
        ModelPricing {
            input: 3.0,
            output: 15.0,
        }
    }
}

pub fn calculate_cost(model: &str, input_tokens: u64, output_tokens: u64) -> f64 {
    let pricing = pricing_for(model);
    (input_tokens as f64 / 1_000_000.0) * pricing.input
        + (output_tokens as f64 / 1_000_000.0) * pricing.output
}

/// Rough token count for text the API did not meter: ~4 chars per token.
pub fn estimate_tokens(text: &str) -> u64 {
    ((text.chars().count() / 4) as u64).max(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CostProfile {
    Minimal,
    Balanced,
    Detailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProfileSettings {
    pub max_tokens: u32,
    pub temperature: f32,
    pub description: &'static str,
}

impl CostProfile {
    pub const ALL: [CostProfile; 3] = [Self::Minimal, Self::Balanced, Self::Detailed];

    pub fn settings(self) -> ProfileSettings {
        match self {
            Self::Minimal => ProfileSettings {
                max_tokens: 1000,
                temperature: 0.0,
                description: "Fastest, cheapest responses",
            },
            Self::Balanced => ProfileSettings {
                max_tokens: 2000,
                temperature: 0.0,
                description: "Good balance of cost and quality",
            },
            Self::Detailed => ProfileSettings {
                max_tokens: 4000,
                temperature: 0.1,
                description: "More detailed responses, higher cost",
            },
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Minimal => "minimal",
            Self::Balanced => "balanced",
            Self::Detailed => "detailed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostEntry {
    pub timestamp: String,
    pub note_id: String,
    #[serde(default)]
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub cost: f64,
    #[serde(default)]
    pub estimated: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CostLog {
    #[serde(default)]
    pub total_calls: u64,
    #[serde(default)]
    pub total_cost: f64,
    #[serde(default)]
    pub calls: Vec<CostEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CostStats {
    pub total_calls: u64,
    pub total_cost: f64,
    pub average_cost: f64,
    pub daily_estimate: f64,
    pub monthly_estimate: f64,
    pub recent_calls: Vec<CostEntry>,
}

/// Token usage for one call, metered or estimated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub estimated: bool,
}

impl TokenUsage {
    pub fn metered_or_estimated(
        metered: Option<(u64, u64)>,
        input_text: &str,
        output_text: &str,
    ) -> Self {
        match metered {
            Some((input_tokens, output_tokens)) => Self {
                input_tokens,
                output_tokens,
                estimated: false,
            },
            None => Self {
                input_tokens: estimate_tokens(input_text),
                output_tokens: estimate_tokens(output_text),
                estimated: true,
            },
        }
    }
}

/// JSON-file backed log of API spend.
#[derive(Debug, Clone)]
pub struct CostTracker {
    path: PathBuf,
}

impl CostTracker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the log; a missing or unreadable file is an empty log.
    pub fn load(&self) -> CostLog {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) => {
                if err.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %self.path.display(), "Cost log unreadable: {err}");
                }
                return CostLog::default();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|err| {
            warn!(path = %self.path.display(), "Cost log is corrupt, starting fresh: {err}");
            CostLog::default()
        })
    }

    fn save(&self, log: &CostLog) -> Result<(), ShoplistError> {
        let body = serde_json::to_string_pretty(log)?;
        crate::utils::paths::write_atomic_sync(&self.path, &body)
    }

    pub fn log_call(
        &self,
        note_id: &str,
        model: &str,
        usage: TokenUsage,
        timestamp: String,
    ) -> Result<CostEntry, ShoplistError> {
        let cost = calculate_cost(model, usage.input_tokens, usage.output_tokens);
        let entry = CostEntry {
            timestamp,
            note_id: note_id.to_string(),
            model: model.to_string(),
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            total_tokens: usage.input_tokens + usage.output_tokens,
            cost: round_to(cost, 6),
            estimated: usage.estimated,
        };

        let mut log = self.load();
        log.total_calls += 1;
        log.total_cost += cost;
        log.calls.push(entry.clone());
        if log.calls.len() > MAX_LOGGED_CALLS {
            let excess = log.calls.len() - MAX_LOGGED_CALLS;
            log.calls.drain(..excess);
        }
        self.save(&log)?;

        debug!(
            note_id,
            model,
            input_tokens = entry.input_tokens,
            output_tokens = entry.output_tokens,
            cost = entry.cost,
            "Logged API call"
        );
        Ok(entry)
    }

    pub fn stats(&self) -> CostStats {
        stats_from_log(&self.load())
    }
}

pub fn stats_from_log(log: &CostLog) -> CostStats {
    if log.calls.is_empty() || log.total_calls == 0 {
        return CostStats {
            total_calls: log.total_calls,
            total_cost: round_to(log.total_cost, 4),
            average_cost: 0.0,
            daily_estimate: 0.0,
            monthly_estimate: 0.0,
            recent_calls: Vec::new(),
        };
    }

    let average = log.total_cost / log.total_calls as f64;
    let start = log.calls.len().saturating_sub(RECENT_CALLS);
    CostStats {
        total_calls: log.total_calls,
        total_cost: round_to(log.total_cost, 4),
        average_cost: round_to(average, 4),
        daily_estimate: round_to(average * CALLS_PER_DAY, 2),
        monthly_estimate: round_to(average * CALLS_PER_MONTH, 2),
        recent_calls: log.calls[start..].to_vec(),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelCostRow {
    pub model: String,
    pub cost_per_call: f64,
    pub monthly_30: f64,
    pub monthly_100: f64,
    pub savings_pct: Option<f64>,
}

/// Per-model cost for a fixed call shape, with savings against `baseline_model`.
pub fn compare_models(
    baseline_model: &str,
    input_tokens: u64,
    output_tokens: u64,
) -> Vec<ModelCostRow> {
    let baseline = calculate_cost(baseline_model, input_tokens, output_tokens);
    KNOWN_MODELS
        .iter()
        .map(|model| {
            let cost = calculate_cost(model, input_tokens, output_tokens);
            let savings_pct = (baseline > 0.0 && cost < baseline)
                .then(|| round_to((baseline - cost) / baseline * 100.0, 1));
            ModelCostRow {
                model: (*model).to_string(),
                cost_per_call: round_to(cost, 6),
                monthly_30: round_to(cost * 30.0, 2),
                monthly_100: round_to(cost * 100.0, 2),
                savings_pct,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(input_tokens: u64, output_tokens: u64) -> TokenUsage {
        TokenUsage {
            input_tokens,
            output_tokens,
            estimated: false,
        }
    }

    #[test]
    fn pricing_matches_model_families() {
        assert_eq!(pricing_for("claude-3-haiku-20240307").input, 0.25);
        assert_eq!(pricing_for("claude-3-5-haiku-20241022").output, 4.0);
        assert_eq!(pricing_for("claude-opus-4-20250514").output, 75.0);
        assert_eq!(pricing_for("claude-sonnet-4-20250514").input, 3.0);
        assert_eq!(pricing_for("something-new").output, 15.0);
    }

    #[test]
    fn calculate_cost_uses_per_million_prices() {
        let cost = calculate_cost("claude-3-5-sonnet-20241022", 1_000_000, 1_000_000);
        assert!((cost - 18.0).abs() < 1e-9);
        let cost = calculate_cost("claude-3-5-sonnet-20241022", 500, 1000);
        assert!((cost - 0.0165).abs() < 1e-9);
    }

    #[test]
    fn estimate_tokens_has_floor_of_one() {
        assert_eq!(estimate_tokens(""), 1);
        assert_eq!(estimate_tokens("abc"), 1);
        assert_eq!(estimate_tokens("abcdefgh"), 2);
    }

    #[test]
    fn metered_usage_wins_over_estimate() {
        let metered = TokenUsage::metered_or_estimated(Some((10, 20)), "xxxx", "yyyy");
        assert_eq!(metered, usage(10, 20));
        let estimated = TokenUsage::metered_or_estimated(None, "abcdefgh", "abcd");
        assert!(estimated.estimated);
        assert_eq!(estimated.input_tokens, 2);
        assert_eq!(estimated.output_tokens, 1);
    }

    #[test]
    fn log_call_accumulates_totals_and_caps_history() {
        let dir = tempfile::tempdir().expect("tempdir");
        let tracker = CostTracker::new(dir.path().join("cost_log.json"));

        for i in 0..105 {
            tracker
                .log_call(
                    &format!("note-{i}"),
                    "claude-3-5-sonnet-20241022",
                    usage(1000, 500),
                    format!("2026-01-01T00:00:{:02}Z", i % 60),
                )
                .expect("log call");
        }

        let log = tracker.load();
        assert_eq!(log.total_calls, 105);
        assert_eq!(log.calls.len(), 100);
        assert_eq!(log.calls[0].note_id, "note-5");
        assert!((log.total_cost - 105.0 * 0.0105).abs() < 1e-9);
    }

    #[test]
    fn corrupt_log_reads_as_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cost_log.json");
        std::fs::write(&path, "not json").expect("write");
        let tracker = CostTracker::new(&path);
        assert_eq!(tracker.load().total_calls, 0);
        assert_eq!(tracker.stats().average_cost, 0.0);
    }

    #[test]
    fn stats_compute_averages_and_projections() {
        let log = CostLog {
            total_calls: 2,
            total_cost: 0.04,
            calls: vec![
                CostEntry {
                    timestamp: "2026-01-01T00:00:00Z".into(),
                    note_id: "a".into(),
                    model: "claude-3-5-sonnet-20241022".into(),
                    input_tokens: 100,
                    output_tokens: 100,
                    total_tokens: 200,
                    cost: 0.02,
                    estimated: false,
                },
                CostEntry {
                    timestamp: "2026-01-02T00:00:00Z".into(),
                    note_id: "b".into(),
                    model: "claude-3-5-sonnet-20241022".into(),
                    input_tokens: 100,
                    output_tokens: 100,
                    total_tokens: 200,
                    cost: 0.02,
                    estimated: true,
                },
            ],
        };
        let stats = stats_from_log(&log);
        assert_eq!(stats.total_calls, 2);
        assert_eq!(stats.average_cost, 0.02);
        assert_eq!(stats.daily_estimate, 0.6);
        assert_eq!(stats.monthly_estimate, 18.0);
        assert_eq!(stats.recent_calls.len(), 2);
    }

    #[test]
    fn compare_models_reports_savings_against_baseline() {
        let rows = compare_models("claude-sonnet-4-20250514", 500, 1000);
        let haiku = rows
            .iter()
            .find(|r| r.model == "claude-3-haiku-20240307")
            .expect("haiku row");
        assert!(haiku.savings_pct.expect("savings") > 90.0);
        let opus = rows
            .iter()
            .find(|r| r.model.contains("opus"))
            .expect("opus row");
        assert_eq!(opus.savings_pct, None);
    }
}

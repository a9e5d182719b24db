use serde::{Deserialize, Serialize};

use crate::entities::shopping_list::{Priority, ShoppingItem};

pub const DEFAULT_SHOPPING_DAY: &str = "Saturday";
const TIMING_NOTE: &str =
    "Basic timing analysis from item priority; no price history or calendar data";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedTiming {
    Today,
    ThisWeek,
    NextWeek,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingSuggestion {
    pub item: String,
    pub suggested_timing: SuggestedTiming,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingAnalysis {
    pub timing_analysis: Vec<TimingSuggestion>,
    pub optimal_shopping_day: String,
    pub note: String,
}

fn suggest(item: &ShoppingItem) -> TimingSuggestion {
    let (suggested_timing, reason) = match item.priority {
        Priority::High => (SuggestedTiming::Today, "High priority item"),
        Priority::Low => (SuggestedTiming::NextWeek, "Low priority, can wait"),
        Priority::Medium => (SuggestedTiming::ThisWeek, "Standard timing"),
    };
    TimingSuggestion {
        item: item.item.clone(),
        suggested_timing,
        reason: reason.to_string(),
    }
}

/// Priority-driven purchase timing for each item.
pub fn analyze(items: &[ShoppingItem]) -> TimingAnalysis {
    TimingAnalysis {
        timing_analysis: items.iter().map(suggest).collect(),
        optimal_shopping_day: DEFAULT_SHOPPING_DAY.to_string(),
        note: TIMING_NOTE.to_string(),
    }
}

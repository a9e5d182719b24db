use clap::Subcommand;

use crate::config::Config;
use crate::entities::cost::{CostTracker, compare_models};
use crate::render::{json, markdown};

#[derive(Subcommand, Debug)]
pub enum CostCommand {
    /// Totals, averages, projections, and the most recent calls
    Summary {
        /// Print JSON instead of Markdown
        #[arg(long)]
        json: bool,
    },
    /// Compare what one call costs on each known model
    Models {
        #[arg(long, default_value_t = 1000)]
        input_tokens: u64,
        #[arg(long, default_value_t = 500)]
        output_tokens: u64,
    },
    /// List the generation profiles accepted by `process --profile`
    Profiles,
}

pub fn run(cmd: CostCommand, config: &Config) -> anyhow::Result<String> {
    match cmd {
        CostCommand::Summary { json } => {
            let stats = CostTracker::new(config.cost_log_path()).stats();
            if json {
                return Ok(json::to_pretty(&stats)?);
            }
            Ok(markdown::cost_summary_markdown(&stats)?)
        }
        CostCommand::Models {
            input_tokens,
            output_tokens,
        } => {
            let rows = compare_models(&config.claude.model, input_tokens, output_tokens);
            Ok(markdown::model_costs_markdown(
                &rows,
                &config.claude.model,
                input_tokens,
                output_tokens,
            )?)
        }
        CostCommand::Profiles => Ok(markdown::profiles_markdown(&config.claude.model)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_of_missing_log_is_zero() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.cost.log_file = Some(dir.path().join("cost_log.json"));

        let out = run(CostCommand::Summary { json: true }, &config).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["total_calls"], 0);
        assert_eq!(value["recent_calls"], serde_json::json!([]));
    }

    #[test]
    fn models_table_uses_requested_token_counts() {
        let out = run(
            CostCommand::Models {
                input_tokens: 2000,
                output_tokens: 100,
            },
            &Config::default(),
        )
        .unwrap();
        assert!(out.contains("2000 input tokens, 100 output tokens"));
    }
}

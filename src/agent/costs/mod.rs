use crate::providers::base::Usage;
use anyhow::{Context, Result};
use chrono::Utc;
use std::io::Write;
use std::path::PathBuf;

const HEADER: &str = "ts\tprovider\tmodel\tinput_tokens\toutput_tokens\ttotal_tokens\tcost_usd";

/// USD per million tokens, (input, output). Rough published rates; unknown
/// models log a zero cost rather than guessing.
const PRICES: &[(&str, f64, f64)] = &[
    ("claude-opus", 15.0, 75.0),
    ("claude-sonnet", 3.0, 15.0),
    ("claude-haiku", 0.80, 4.0),
];

pub fn estimate_cost_usd(model: &str, usage: Usage) -> f64 {
    for (prefix, input_rate, output_rate) in PRICES {
        if model.starts_with(prefix) {
            return (usage.input_tokens as f64 * input_rate
                + usage.output_tokens as f64 * output_rate)
                / 1_000_000.0;
        }
    }
    0.0
}

/// Append-only TSV log of per-response token usage and estimated cost.
pub struct CostLog {
    path: PathBuf,
}

impl CostLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn record(&self, provider: &str, model: &str, usage: Usage) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let needs_header = !self.path.exists();
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open cost log {}", self.path.display()))?;
        if needs_header {
            writeln!(file, "{}", HEADER)?;
        }
        writeln!(
            file,
            "{}\t{}\t{}\t{}\t{}\t{}\t{:.6}",
            Utc::now().to_rfc3339(),
            provider,
            model,
            usage.input_tokens,
            usage.output_tokens,
            usage.total(),
            estimate_cost_usd(model, usage),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests;

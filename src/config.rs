use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Creates the payments listed in a CSV file and processes them through the
/// trigger channel, printing the final state of every created payment.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Input CSV of creation requests (`amount,currency,reference`)
    pub input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, env = "PAYFLOW_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Number of competing consumer loops.
    #[arg(long, env = "PAYFLOW_WORKERS", default_value_t = 2, value_parser = clap::value_parser!(u16).range(1..))]
    pub workers: u16,

    /// Probability that the simulated authorizer approves a payment.
    #[arg(long, env = "PAYFLOW_SUCCESS_RATE", default_value_t = 0.5, value_parser = parse_rate)]
    pub success_rate: f64,

    /// Upper bound of the simulated processing time per payment, in milliseconds.
    #[arg(long, env = "PAYFLOW_MAX_LATENCY_MS", default_value_t = 0)]
    pub max_latency_ms: u64,
}

impl Config {
    pub fn max_latency(&self) -> Duration {
        Duration::from_millis(self.max_latency_ms)
    }
}

fn parse_rate(s: &str) -> Result<f64, String> {
    let rate: f64 = s.parse().map_err(|e| format!("`{}` is not a number: {}", s, e))?;
    if (0.0..=1.0).contains(&rate) {
        Ok(rate)
    } else {
        Err(format!("{} is not between 0 and 1", rate))
    }
}

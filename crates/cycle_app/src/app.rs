use std::fmt::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use cycle_domain::{
    window::{ScrollMetrics, DEFAULT_EDGE_THRESHOLD, DEFAULT_RADIUS, MAX_RADIUS},
    TrackerSession,
};
use cycle_sync::{build_repository, ReplyFilePredictor, StorageBackend};
use tracing::{debug, info, warn};

use crate::render::{render_history, render_prediction, render_window};

/// Track period cycles and preview predicted ones.
#[derive(Parser, Debug)]
#[command(name = "cycle_tracker", long_about = None)]
pub struct Cli {
    /// JSON history file (overrides CYCLE_DATA_FILE)
    #[arg(long, global = true)]
    pub data_file: Option<PathBuf>,

    /// User whose cycles are read and written (overrides CYCLE_USER_ID)
    #[arg(long, global = true)]
    pub user: Option<String>,

    /// Saved predictor reply (overrides CYCLE_PREDICTION_REPLY)
    #[arg(long, global = true)]
    pub prediction_reply: Option<PathBuf>,

    /// Treat this YYYY-MM-DD date as today
    #[arg(long, global = true)]
    pub today: Option<NaiveDate>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Render the month window
    Show {
        /// Extra months loaded before the window, one per top-edge scroll
        #[arg(long, default_value_t = 0)]
        before: u32,
        /// Extra months loaded after the window, one per bottom-edge scroll
        #[arg(long, default_value_t = 0)]
        after: u32,
    },
    /// Record one period spanning the given dates
    Mark {
        #[arg(required = true)]
        dates: Vec<NaiveDate>,
    },
    /// List recorded cycles, newest first
    History,
}

impl Default for Command {
    fn default() -> Self {
        Command::Show {
            before: 0,
            after: 0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub(crate) data_file: Option<PathBuf>,
    pub(crate) user_id: String,
    pub(crate) prediction_reply: Option<PathBuf>,
    pub(crate) edge_threshold: f64,
    pub(crate) window_radius: u32,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self::from_lookup(|key| std::env::var(key).ok()))
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(path) = lookup("CYCLE_DATA_FILE").filter(|v| !v.trim().is_empty()) {
            info!(path = %path, "using history file");
            config.data_file = Some(PathBuf::from(path));
        }
        if let Some(user) = lookup("CYCLE_USER_ID").filter(|v| !v.trim().is_empty()) {
            config.user_id = user.trim().to_string();
        }
        if let Some(path) = lookup("CYCLE_PREDICTION_REPLY").filter(|v| !v.trim().is_empty()) {
            config.prediction_reply = Some(PathBuf::from(path));
        }
        if let Some(raw) = lookup("CYCLE_EDGE_THRESHOLD") {
            match raw.trim().parse::<f64>() {
                Ok(value) if value > 0.0 && value.is_finite() => config.edge_threshold = value,
                _ => warn!(value = %raw, "ignoring invalid CYCLE_EDGE_THRESHOLD"),
            }
        }
        if let Some(raw) = lookup("CYCLE_WINDOW_RADIUS") {
            match raw.trim().parse::<u32>() {
                Ok(value) if value <= MAX_RADIUS => config.window_radius = value,
                _ => warn!(value = %raw, max = MAX_RADIUS, "ignoring invalid CYCLE_WINDOW_RADIUS"),
            }
        }
        config
    }

    /// Command-line flags win over the environment.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(path) = &cli.data_file {
            self.data_file = Some(path.clone());
        }
        if let Some(user) = &cli.user {
            self.user_id = user.clone();
        }
        if let Some(path) = &cli.prediction_reply {
            self.prediction_reply = Some(path.clone());
        }
    }

    pub fn storage_backend(&self) -> StorageBackend {
        match &self.data_file {
            Some(path) => StorageBackend::Local { path: path.clone() },
            None => StorageBackend::Memory,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_file: None,
            user_id: "local-user".to_string(),
            prediction_reply: None,
            edge_threshold: DEFAULT_EDGE_THRESHOLD,
            window_radius: DEFAULT_RADIUS,
        }
    }
}

fn build_session(config: &AppConfig, today: Option<NaiveDate>) -> Result<TrackerSession> {
    let mut builder = TrackerSession::builder(config.user_id.clone())
        .with_repository(build_repository(&config.storage_backend()))
        .edge_threshold(config.edge_threshold)
        .window_radius(config.window_radius);
    if let Some(today) = today {
        builder = builder.today(today);
    }
    if let Some(path) = &config.prediction_reply {
        builder = builder.with_predictor(Arc::new(ReplyFilePredictor::new(path)));
    }
    builder
        .build()
        .context("failed to initialize tracker session")
}

#[derive(Clone, Copy)]
enum Edge {
    Top,
    Bottom,
}

/// Viewport geometry that lands within the threshold of exactly one edge.
fn edge_metrics(threshold: f64, edge: Edge) -> ScrollMetrics {
    let client_height = threshold;
    let scroll_height = threshold * 10.0;
    let scroll_top = match edge {
        Edge::Top => 0.0,
        Edge::Bottom => scroll_height - client_height,
    };
    ScrollMetrics {
        scroll_top,
        scroll_height,
        client_height,
    }
}

fn render_session(session: &TrackerSession) -> String {
    let mut out = render_window(&session.months());
    out.push('\n');
    out.push_str(&render_prediction(session.prediction().as_ref()));
    out
}

/// Runs one command and returns what it would print.
pub async fn execute(
    config: &AppConfig,
    command: Command,
    today: Option<NaiveDate>,
) -> Result<String> {
    let session = build_session(config, today)?;
    let report = session
        .load()
        .await
        .context("failed to load cycle history")?;
    debug!(cycles = report.cycles, prediction = ?report.prediction, "history loaded");

    let mut out = String::new();
    match command {
        Command::Show { before, after } => {
            for _ in 0..before {
                session.on_scroll(edge_metrics(config.edge_threshold, Edge::Top));
            }
            for _ in 0..after {
                session.on_scroll(edge_metrics(config.edge_threshold, Edge::Bottom));
            }
            out.push_str(&render_session(&session));
        }
        Command::Mark { dates } => {
            for date in dates {
                if !session.toggle_selected(date) {
                    writeln!(out, "Skipping {date}: future dates cannot be marked")?;
                }
            }
            match session.commit_selection().await {
                Ok(record) => {
                    writeln!(
                        out,
                        "Recorded period {} to {}",
                        record.start_date, record.end_date
                    )?;
                }
                Err(err) if err.is_noop() => writeln!(out, "Nothing to record")?,
                Err(err) => return Err(err).context("failed to record period"),
            }
            out.push('\n');
            out.push_str(&render_session(&session));
        }
        Command::History => out.push_str(&render_history(&session.history())),
    }
    Ok(out)
}

pub async fn run(mut config: AppConfig, cli: Cli) -> Result<()> {
    config.apply_cli(&cli);
    info!(user = %config.user_id, backend = ?config.storage_backend(), "starting cycle tracker");
    let command = cli.command.clone().unwrap_or_default();
    let output = execute(&config, command, cli.today).await?;
    print!("{output}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn config_from(pairs: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn reads_configuration_from_environment() {
        let config = config_from(&[
            ("CYCLE_DATA_FILE", "/tmp/cycles.json"),
            ("CYCLE_USER_ID", " alex "),
            ("CYCLE_EDGE_THRESHOLD", "320"),
            ("CYCLE_WINDOW_RADIUS", "3"),
        ]);
        assert_eq!(
            config.storage_backend(),
            StorageBackend::Local {
                path: PathBuf::from("/tmp/cycles.json")
            }
        );
        assert_eq!(config.user_id, "alex");
        assert_eq!(config.edge_threshold, 320.0);
        assert_eq!(config.window_radius, 3);
        assert!(config.prediction_reply.is_none());
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let config = config_from(&[
            ("CYCLE_EDGE_THRESHOLD", "-5"),
            ("CYCLE_WINDOW_RADIUS", "many"),
            ("CYCLE_DATA_FILE", "  "),
        ]);
        assert_eq!(config.edge_threshold, DEFAULT_EDGE_THRESHOLD);
        assert_eq!(config.window_radius, DEFAULT_RADIUS);
        assert_eq!(config.storage_backend(), StorageBackend::Memory);
    }

    #[test]
    fn window_radius_above_cap_is_ignored() {
        for raw in ["2147483648", "4294967295", "121"] {
            let config = config_from(&[("CYCLE_WINDOW_RADIUS", raw)]);
            assert_eq!(config.window_radius, DEFAULT_RADIUS, "radius {raw}");
        }
        let config = config_from(&[("CYCLE_WINDOW_RADIUS", "120")]);
        assert_eq!(config.window_radius, MAX_RADIUS);
    }

    #[test]
    fn cli_flags_override_environment() {
        let mut config = config_from(&[("CYCLE_USER_ID", "env-user")]);
        let cli = Cli::parse_from(["cycle_tracker", "--user", "cli-user", "history"]);
        config.apply_cli(&cli);
        assert_eq!(config.user_id, "cli-user");
        assert_eq!(cli.command, Some(Command::History));
    }

    #[test]
    fn edge_metrics_trigger_a_single_edge() {
        let top = edge_metrics(500.0, Edge::Top);
        assert!(top.near_top(500.0) && !top.near_bottom(500.0));
        let bottom = edge_metrics(500.0, Edge::Bottom);
        assert!(!bottom.near_top(500.0) && bottom.near_bottom(500.0));
    }

    #[tokio::test]
    async fn mark_skips_future_dates_and_records_bounds() {
        let config = AppConfig::default();
        let output = execute(
            &config,
            Command::Mark {
                dates: vec![day(2025, 1, 5), day(2025, 1, 3), day(2025, 1, 30)],
            },
            Some(day(2025, 1, 20)),
        )
        .await
        .unwrap();
        assert!(output.contains("Skipping 2025-01-30: future dates cannot be marked"));
        assert!(output.contains("Recorded period 2025-01-03 to 2025-01-05"));
        assert!(output.contains("January 2025"));
        assert!(output.contains("No prediction yet"));
    }

    #[tokio::test]
    async fn only_future_dates_records_nothing() {
        let output = execute(
            &AppConfig::default(),
            Command::Mark {
                dates: vec![day(2025, 2, 1)],
            },
            Some(day(2025, 1, 20)),
        )
        .await
        .unwrap();
        assert!(output.contains("Nothing to record"));
    }

    #[tokio::test]
    async fn show_extends_the_window() {
        let mut config = AppConfig::default();
        config.window_radius = 0;
        let output = execute(
            &config,
            Command::Show {
                before: 1,
                after: 2,
            },
            Some(day(2025, 1, 20)),
        )
        .await
        .unwrap();
        let titles: Vec<&str> = output
            .lines()
            .filter(|line| line.ends_with(" 2024") || line.ends_with(" 2025"))
            .collect();
        assert_eq!(
            titles,
            vec!["December 2024", "January 2025", "February 2025", "March 2025"]
        );
    }

    #[tokio::test]
    async fn history_persists_between_runs() {
        let temp = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.data_file = Some(temp.path().join("cycles.json"));

        execute(
            &config,
            Command::Mark {
                dates: vec![day(2025, 1, 3), day(2025, 1, 7)],
            },
            Some(day(2025, 1, 20)),
        )
        .await
        .unwrap();
        let output = execute(&config, Command::History, Some(day(2025, 1, 20)))
            .await
            .unwrap();
        assert_eq!(output, "2025-01-03 to 2025-01-07 (5 days)\n");
    }
}

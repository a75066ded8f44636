//! Command-line interface for the rollup engine.
//!
//! Inspect how a rule set treats a metric, or run points through it:
//!
//! ```text
//! rollup check
//! rollup match carbon.agents.host1.cpu
//! rollup step carbon.agents.host1.cpu --from 1700000000
//! rollup apply carbon.agents.host1.cpu --from 1700000000 < points.json
//! rollup watch
//! ```

use crate::core::{Config, LogLevel, Point, Result, RollupError, RulesWatcher};
use crate::rollup::{AggregationRegistry, Clock, FixedClock, Rules, RulesHandle, SystemClock};
use clap::{Parser, Subcommand};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Retention rule matching and rollup of time-series points
#[derive(Parser, Debug)]
#[command(name = "rollup")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path (default: ~/.config/rollup/config.yaml)
    #[arg(short, long, env = "ROLLUP_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, env = "ROLLUP_DEBUG", global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Compile the rules and exit
    Check,
    /// Show the aggregation and retention resolved for a metric
    Match {
        /// Metric name
        metric: String,
    },
    /// Show the precision selected for data starting at --from
    Step {
        /// Metric name
        metric: String,
        /// Start of the queried range (unix seconds)
        #[arg(long)]
        from: u32,
        /// Evaluate ages against this time instead of the wall clock
        #[arg(long)]
        now: Option<u32>,
    },
    /// Roll up a JSON array of points read from stdin
    Apply {
        /// Metric name
        metric: String,
        /// Start of the queried range (unix seconds)
        #[arg(long)]
        from: u32,
        /// Evaluate ages against this time instead of the wall clock
        #[arg(long)]
        now: Option<u32>,
    },
    /// Keep the rules loaded and reload them when the file changes
    Watch,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Resolve the configuration file: the explicit `--config`, otherwise
    /// the default location if it exists.
    pub fn config_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.config {
            return Some(path.clone());
        }

        dirs::config_dir()
            .map(|d| d.join("rollup").join("config.yaml"))
            .filter(|p| p.exists())
    }

    /// Load configuration, falling back to defaults when no file is found.
    pub async fn load_config(&self) -> Result<Config> {
        let mut config = match self.config_path() {
            Some(path) => Config::from_file(&path).await?,
            None => Config::default(),
        };
        config.debug = self.debug;
        Ok(config)
    }

    /// Initialize logging based on configuration.
    ///
    /// Logs go to stderr so that command output on stdout stays parseable.
    pub fn init_logging(&self, config: &Config) -> Result<()> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(log_level(config)));

        let fmt_layer = if config.logging.structured {
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(true)
                .with_line_number(true)
                .compact()
        } else {
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact()
        };

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| RollupError::config(format!("Failed to initialize logging: {}", e)))?;

        Ok(())
    }
}

/// Log level for the subscriber: debug mode wins, then `ROLLUP_LOG_LEVEL`,
/// then the configured level.
fn log_level(config: &Config) -> String {
    if config.debug {
        return LogLevel::Debug.as_str().to_string();
    }
    std::env::var("ROLLUP_LOG_LEVEL").unwrap_or_else(|_| config.logging.level.as_str().to_string())
}

/// Compile the configured rules, pinning the clock when `now` is given.
pub fn compile_rules(config: &Config, now: Option<u32>) -> Result<Rules> {
    let clock: Arc<dyn Clock> = match now {
        Some(now) => Arc::new(FixedClock(now)),
        None => Arc::new(SystemClock),
    };
    Rules::compile_with(config.rollup.clone(), Arc::new(AggregationRegistry::new()), clock)
}

/// Describe the rule resolved for `metric` in human readable form.
pub fn describe_match(rules: &Rules, metric: &str) -> String {
    let resolved = rules.match_metric(metric);
    let function = resolved.aggregation.map_or("<none>", |a| a.name());
    let tiers = resolved
        .retention
        .iter()
        .map(|r| format!("{}s:{}s", r.age, r.precision))
        .collect::<Vec<_>>()
        .join(", ");

    format!("{metric}\n  function:  {function}\n  retention: {tiers}")
}

/// Roll up `input` (a JSON array of points) and render the result as JSON.
pub fn apply_json(rules: &Rules, metric: &str, from: u32, input: &str) -> Result<String> {
    let mut points: Vec<Point> = serde_json::from_str(input)?;
    points.sort_by_key(|p| p.time);

    let precision = rules.rollup_metric(metric, from, &mut points)?;

    let output = serde_json::json!({
        "metric": metric,
        "precision": precision,
        "points": points,
    });
    Ok(serde_json::to_string_pretty(&output)?)
}

/// Execute a parsed command line.
pub async fn execute(cli: Cli) -> Result<()> {
    let config = cli.load_config().await?;
    cli.init_logging(&config)?;

    if let Some(path) = cli.config_path() {
        tracing::debug!("Loaded configuration from: {:?}", path);
    }

    match &cli.command {
        Command::Check => {
            let rules = compile_rules(&config, None)?;
            println!("Rules are valid!");
            println!("  Patterns: {}", rules.patterns().len());
            println!("  Updated: {}", rules.updated());
            println!(
                "  Functions: {}",
                rules.registry().names().collect::<Vec<_>>().join(", ")
            );
        },
        Command::Match { metric } => {
            let rules = compile_rules(&config, None)?;
            println!("{}", describe_match(&rules, metric));
        },
        Command::Step { metric, from, now } => {
            let rules = compile_rules(&config, *now)?;
            println!("{}", rules.step(metric, *from)?);
        },
        Command::Apply { metric, from, now } => {
            use tokio::io::AsyncReadExt;

            let rules = compile_rules(&config, *now)?;
            let mut input = String::new();
            tokio::io::stdin().read_to_string(&mut input).await?;
            println!("{}", apply_json(&rules, metric, *from, &input)?);
        },
        Command::Watch => watch(&cli, &config).await?,
    }

    Ok(())
}

async fn watch(cli: &Cli, config: &Config) -> Result<()> {
    let handle = RulesHandle::new(compile_rules(config, None)?);
    tracing::info!(patterns = handle.load().patterns().len(), "Rollup rules loaded");

    let watcher = match cli.config_path() {
        Some(path) if config.reload.enabled => {
            let watcher = RulesWatcher::new(path, handle.clone(), config.reload.debounce);
            Some(tokio::spawn(watcher.watch()))
        },
        _ => {
            tracing::info!("Rule reloading disabled");
            None
        },
    };

    run_until(watcher, tokio::signal::ctrl_c()).await
}

/// Serve until `shutdown` resolves. A rule watcher that fails ends the run
/// with its error; one that returns cleanly leaves the current rules serving.
async fn run_until<F>(watcher: Option<JoinHandle<Result<()>>>, shutdown: F) -> Result<()>
where
    F: Future<Output = std::io::Result<()>>,
{
    tokio::pin!(shutdown);

    if let Some(mut watcher) = watcher {
        tokio::select! {
            res = &mut shutdown => {
                watcher.abort();
                res?;
                tracing::info!("Received shutdown signal, stopping...");
                return Ok(());
            },
            joined = &mut watcher => {
                let result = joined.map_err(|e| {
                    RollupError::config(format!("Rule watcher task failed: {}", e))
                })?;
                if let Err(e) = result {
                    tracing::error!(category = e.category(), "Rule watcher stopped: {}", e);
                    return Err(e);
                }
                tracing::warn!("Rule watcher exited; serving current rules until shutdown");
            },
        }
    }

    shutdown.await?;
    tracing::info!("Received shutdown signal, stopping...");
    Ok(())
}

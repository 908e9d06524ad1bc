mod app;
mod json;
mod theme;
mod ui;

use crate::app::{ActionEvent, App, Command, JobKind};
use crate::theme::Theme;
use anyhow::{anyhow, Result};
use chrono::Utc;
use clap::Parser;
use crossterm::{
    event::{Event, EventStream, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use cwc_client::{GatewayService, HttpGateway, HttpRuntime, RuntimeService, SourceConfig};
use cwc_core::{JobFilters, JobStatus, WatchConfig};
use cwc_engine::{Engine, EngineSignal, JobCache};
use futures_util::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Spinner cadence and snapshot poll for the interactive view.
const DRAW_TICK: Duration = Duration::from_millis(100);

#[derive(Parser, Debug)]
#[command(
    name = "cwc",
    about = "Watch function and execution job statuses in a refreshing terminal view."
)]
struct Args {
    /// Filter output to a single function job id.
    #[arg(long)]
    job_id: Option<String>,
    /// Function title filter.
    #[arg(long)]
    function: Option<String>,
    /// Repeatable status filter (e.g. --status RUNNING --status QUEUED).
    #[arg(long = "status")]
    statuses: Vec<String>,
    /// Show jobs created in the last N hours.
    #[arg(long, default_value_t = 2.0)]
    last_hours: f64,
    #[arg(long, default_value_t = 50)]
    limit: u32,
    #[arg(long, default_value_t = 0)]
    offset: u32,
    /// Poll interval in seconds.
    #[arg(long, default_value_t = 1)]
    interval: u64,
    /// Print newline-delimited JSON instead of the interactive tree.
    #[arg(long)]
    json: bool,
    /// Disable colors in terminal output.
    #[arg(long)]
    no_color: bool,
}

fn watch_config(args: &Args) -> Result<WatchConfig> {
    let mut statuses = Vec::new();
    for raw in &args.statuses {
        statuses.push(raw.parse::<JobStatus>().map_err(|err| anyhow!(err))?);
    }
    let created_after = if args.last_hours > 0.0 {
        let lookback = chrono::Duration::seconds((args.last_hours * 3600.0) as i64);
        Some(Utc::now() - lookback)
    } else {
        None
    };
    let filters = JobFilters {
        job_id: args.job_id.clone(),
        function_name: args.function.clone(),
        statuses,
        created_after,
    };
    let mut config = WatchConfig::new(
        filters,
        args.limit,
        args.offset,
        Duration::from_secs(args.interval.max(1)),
    );
    config.json_mode = args.json;
    config.no_color = args.no_color;
    Ok(config)
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_enabled = matches!(
        std::env::var("CWC_LOG_STDOUT").ok().as_deref(),
        Some("1") | Some("true") | Some("TRUE") | Some("yes") | Some("YES")
    );
    if stdout_enabled {
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    } else {
        // The TUI owns the terminal; logs go nowhere unless asked for.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::sink)
            .try_init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging();
    let config = watch_config(&args)?;
    let source = SourceConfig::from_env()?;
    info!(event = "startup", source = %source.describe());

    let gateway: Arc<dyn GatewayService> = Arc::new(HttpGateway::new(&source)?);
    let runtime: Arc<dyn RuntimeService> = Arc::new(HttpRuntime::new(&source)?);
    let cache = Arc::new(JobCache::new());
    let (engine, signals) =
        Engine::spawn(cache.clone(), gateway.clone(), runtime.clone(), config.clone());

    let result = if config.json_mode {
        json::run_json_watch(cache, &config, signals).await
    } else {
        run_interactive(cache, gateway, runtime, config, signals).await
    };

    engine.shutdown().await;
    result
}

async fn run_interactive(
    cache: Arc<JobCache>,
    gateway: Arc<dyn GatewayService>,
    runtime: Arc<dyn RuntimeService>,
    config: WatchConfig,
    mut signals: mpsc::Receiver<EngineSignal>,
) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = event_loop(&mut terminal, cache, gateway, runtime, config, &mut signals).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    cache: Arc<JobCache>,
    gateway: Arc<dyn GatewayService>,
    runtime: Arc<dyn RuntimeService>,
    config: WatchConfig,
    signals: &mut mpsc::Receiver<EngineSignal>,
) -> Result<()> {
    let theme = Theme::new(config.no_color);
    let mut app = App::new(config);
    app.set_snapshot(cache.snapshot());

    let (action_tx, mut action_rx) = mpsc::channel::<ActionEvent>(32);
    let mut events = EventStream::new();
    let mut draw_ticker = tokio::time::interval(DRAW_TICK);

    loop {
        terminal.draw(|frame| ui::render(frame, &app, theme))?;

        tokio::select! {
            _ = draw_ticker.tick() => {
                app.advance_spinner();
                app.set_snapshot(cache.snapshot());
            }
            Some(event) = action_rx.recv() => {
                app.apply_action_event(event);
            }
            signal = signals.recv() => {
                match signal {
                    Some(EngineSignal::Fatal(message)) => return Err(anyhow!(message)),
                    None => return Ok(()),
                }
            }
            maybe_event = events.next() => {
                if let Some(Ok(Event::Key(key))) = maybe_event {
                    if matches!(key.kind, KeyEventKind::Press | KeyEventKind::Repeat) {
                        match app.handle_key(key) {
                            Some(Command::Quit) => return Ok(()),
                            Some(command) => dispatch(command, &gateway, &runtime, &action_tx),
                            None => {}
                        }
                    }
                }
            }
        }
    }
}

/// Remote calls run in their own tasks; a slow logs or cancel call never
/// stalls the draw/poll cadence.
fn dispatch(
    command: Command,
    gateway: &Arc<dyn GatewayService>,
    runtime: &Arc<dyn RuntimeService>,
    action_tx: &mpsc::Sender<ActionEvent>,
) {
    match command {
        Command::FetchLogs(job) => {
            let gateway = gateway.clone();
            let runtime = runtime.clone();
            let tx = action_tx.clone();
            tokio::spawn(async move {
                let result = match job.kind {
                    JobKind::Function => gateway.job_logs(&job.id).await,
                    JobKind::Execution => runtime.job_logs(&job.id).await,
                };
                let text = match result {
                    Ok(text) => text,
                    Err(err) => format!("Error fetching logs: {err}"),
                };
                let _ = tx.send(ActionEvent::LogsLoaded { job_id: job.id, text }).await;
            });
        }
        Command::DispatchStop(job) => {
            let gateway = gateway.clone();
            let runtime = runtime.clone();
            let tx = action_tx.clone();
            tokio::spawn(async move {
                let outcome = match job.kind {
                    JobKind::Function => gateway.stop_job(&job.id).await,
                    JobKind::Execution => runtime.cancel_job(&job.id).await,
                };
                let _ = tx
                    .send(ActionEvent::StopFinished { job_id: job.id, outcome })
                    .await;
            });
        }
        Command::Quit => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args::parse_from(["cwc"])
    }

    #[test]
    fn defaults_match_the_documented_cli() {
        let config = watch_config(&base_args()).expect("config");
        assert_eq!(config.limit, 50);
        assert_eq!(config.offset, 0);
        assert_eq!(config.interval, Duration::from_secs(1));
        assert!(!config.json_mode);
        assert!(!config.no_color);
        assert!(config.filters.created_after.is_some());
    }

    #[test]
    fn status_filters_parse_and_fold_aliases() {
        let args = Args::parse_from(["cwc", "--status", "running", "--status", "SUCCEEDED"]);
        let config = watch_config(&args).expect("config");
        assert_eq!(config.filters.statuses, vec![JobStatus::Running, JobStatus::Done]);

        let args = Args::parse_from(["cwc", "--status", "bogus"]);
        assert!(watch_config(&args).is_err());
    }

    #[test]
    fn interval_has_a_one_second_floor() {
        let args = Args::parse_from(["cwc", "--interval", "0"]);
        let config = watch_config(&args).expect("config");
        assert_eq!(config.interval, Duration::from_secs(1));
    }

    #[test]
    fn zero_lookback_disables_created_after() {
        let args = Args::parse_from(["cwc", "--last-hours", "0"]);
        let config = watch_config(&args).expect("config");
        assert!(config.filters.created_after.is_none());
    }
}

mod cli;
mod config;
mod dashboard;
mod input;
mod k8s;
mod model;
mod panel;
mod selection;
mod store;
mod ui;
mod ui_queue;

use anyhow::{Context, Result};
use clap::Parser;
use cli::CliArgs;
use config::{RuntimeConfigSnapshot, RuntimeConfigWatcher};
use crossterm::event::{
    DisableMouseCapture, EnableMouseCapture, Event, EventStream, KeyEventKind,
    KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
    supports_keyboard_enhancement,
};
use dashboard::{Dashboard, DashboardQueue, Target};
use futures::StreamExt;
use futures::future::join_all;
use k8s::KubeGateway;
use model::{ClusterList, WatchedKind};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::fs::OpenOptions;
use std::io::{self, Stdout};
use std::path::Path;
use std::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior, interval, timeout};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

type TuiTerminal = Terminal<CrosstermBackend<Stdout>>;
const CONFIG_POLL_INTERVAL: Duration = Duration::from_secs(2);
const WATCH_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(3);
const UI_DRAIN_LIMIT: usize = 256;

/// Cluster names that do not come from the runtime config file.
struct ClusterSources {
    cli: Vec<String>,
    kubeconfig: Vec<String>,
}

impl ClusterSources {
    fn merge(&self, from_config: &[String]) -> ClusterList {
        ClusterList::new(
            from_config
                .iter()
                .chain(&self.cli)
                .chain(&self.kubeconfig)
                .cloned(),
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(&args.log_filter, args.log_file.as_deref())?;

    let mut config_watcher = RuntimeConfigWatcher::discover();
    let config = match config_watcher.load_current() {
        Ok(snapshot) => snapshot,
        Err(error) => {
            warn!("ignoring runtime config: {error:#}");
            RuntimeConfigSnapshot::default()
        }
    };
    if let Some(source) = &config.source {
        info!("loaded runtime config from {source}");
    }

    let kinds = resolve_kinds(&args.resources, &config.resources)?;
    let gateway = KubeGateway::connect(args.context.clone()).await?;
    let sources = ClusterSources {
        cli: args.clusters.clone(),
        kubeconfig: gateway.cluster_names().to_vec(),
    };

    let target = Target {
        context: gateway.context().to_string(),
        cluster: gateway.cluster().to_string(),
        namespace: args.namespace.clone().unwrap_or_default(),
        kinds: kinds.iter().map(ToString::to_string).collect(),
    };
    let mut dash = Dashboard::new(target, sources.merge(&config.clusters));

    let (sender, queue) = ui_queue::channel::<Dashboard>();
    let watch_tasks = kinds
        .into_iter()
        .map(|kind| gateway.spawn_watch(kind, args.namespace.clone(), sender.clone()))
        .collect::<Vec<_>>();
    drop(sender);

    run(&mut dash, queue, watch_tasks, config_watcher, config, sources).await
}

fn init_tracing(level_filter: &str, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_new(level_filter)
        .or_else(|_| EnvFilter::try_new("info"))
        .context("failed to initialize tracing filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .compact();

    // The terminal belongs to the dashboard, so logs only go to a file.
    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            let _ = builder.with_writer(Mutex::new(file)).try_init();
        }
        None => {
            let _ = builder.with_writer(io::sink).try_init();
        }
    }

    Ok(())
}

/// CLI tokens first, then config-file kinds, without duplicates. Falls back
/// to deployments when neither names a kind.
fn resolve_kinds(tokens: &[String], configured: &[WatchedKind]) -> Result<Vec<WatchedKind>> {
    if tokens.is_empty() && configured.is_empty() {
        return Ok(vec![WatchedKind::deployments()]);
    }
    let mut kinds = Vec::new();
    for token in tokens {
        let kind = WatchedKind::from_token(token)
            .with_context(|| format!("unknown resource kind '{token}'"))?;
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    for kind in configured {
        if !kinds.contains(kind) {
            kinds.push(kind.clone());
        }
    }
    Ok(kinds)
}

async fn run(
    dash: &mut Dashboard,
    mut queue: DashboardQueue,
    watch_tasks: Vec<JoinHandle<()>>,
    config_watcher: RuntimeConfigWatcher,
    config: RuntimeConfigSnapshot,
    sources: ClusterSources,
) -> Result<()> {
    let (mut terminal, keyboard_enhanced) = init_terminal()?;
    let run_result = run_loop(
        &mut terminal,
        dash,
        &mut queue,
        config_watcher,
        config,
        &sources,
    )
    .await;

    queue.close();
    stop_watch_tasks(watch_tasks).await;
    let restore_result = restore_terminal(&mut terminal, keyboard_enhanced);

    match (run_result, restore_result) {
        (Err(run_error), Err(restore_error)) => Err(anyhow::anyhow!(
            "{run_error:#}\nterminal restore error: {restore_error:#}"
        )),
        (Err(error), _) => Err(error),
        (_, Err(error)) => Err(error),
        (Ok(()), Ok(())) => Ok(()),
    }
}

fn init_terminal() -> Result<(TuiTerminal, bool)> {
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    let keyboard_enhanced = matches!(supports_keyboard_enhancement(), Ok(true));
    if keyboard_enhanced {
        execute!(
            stdout,
            EnterAlternateScreen,
            EnableMouseCapture,
            PushKeyboardEnhancementFlags(
                KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES
                    | KeyboardEnhancementFlags::REPORT_EVENT_TYPES
            )
        )
        .context("failed to enter alternate screen with keyboard enhancement")?;
    } else {
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)
            .context("failed to enter alternate screen")?;
    }
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to create terminal backend")?;
    terminal.clear().context("failed to clear terminal")?;
    Ok((terminal, keyboard_enhanced))
}

fn restore_terminal(terminal: &mut TuiTerminal, keyboard_enhanced: bool) -> Result<()> {
    if keyboard_enhanced {
        execute!(terminal.backend_mut(), PopKeyboardEnhancementFlags)
            .context("failed to pop keyboard enhancement flags")?;
    }
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(
        terminal.backend_mut(),
        DisableMouseCapture,
        LeaveAlternateScreen
    )
    .context("failed to leave alternate screen")?;
    terminal.show_cursor().context("failed to show cursor")?;
    Ok(())
}

async fn run_loop(
    terminal: &mut TuiTerminal,
    dash: &mut Dashboard,
    queue: &mut DashboardQueue,
    mut config_watcher: RuntimeConfigWatcher,
    mut config: RuntimeConfigSnapshot,
    sources: &ClusterSources,
) -> Result<()> {
    let mut reader = EventStream::new();
    let mut ticker = interval(CONFIG_POLL_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut queue_open = true;

    loop {
        if dash.take_dirty() {
            terminal
                .draw(|frame| ui::render(frame, dash))
                .context("failed to render terminal frame")?;
        }

        if !dash.running() {
            break;
        }

        tokio::select! {
            maybe_event = reader.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                        dash.on_key(key);
                    }
                    Some(Ok(Event::Mouse(mouse))) => dash.on_mouse(mouse),
                    Some(Ok(Event::Resize(_, _))) => dash.mark_dirty(),
                    Some(Ok(_)) => {}
                    Some(Err(error)) => {
                        dash.set_status(format!("terminal event error: {error}"));
                    }
                    None => {
                        warn!("terminal event stream closed");
                        break;
                    }
                }
            }
            maybe_task = queue.recv(), if queue_open => {
                match maybe_task {
                    Some(task) => {
                        task(dash);
                        let drained = queue.drain(dash, UI_DRAIN_LIMIT - 1);
                        if drained > 0 {
                            debug!("applied {} queued ui tasks", drained + 1);
                        }
                    }
                    None => {
                        queue_open = false;
                        dash.set_status("all watch streams have ended");
                    }
                }
            }
            _ = ticker.tick() => {
                reload_config(dash, &mut config_watcher, &mut config, sources);
            }
            _ = &mut ctrl_c => {
                info!("interrupt received");
                dash.quit();
            }
        }
    }

    Ok(())
}

fn reload_config(
    dash: &mut Dashboard,
    watcher: &mut RuntimeConfigWatcher,
    current: &mut RuntimeConfigSnapshot,
    sources: &ClusterSources,
) {
    let next = match watcher.reload_if_changed() {
        Ok(Some(next)) => next,
        Ok(None) => return,
        Err(error) => {
            warn!("runtime config reload failed: {error:#}");
            dash.set_status(format!("config reload failed: {error}"));
            return;
        }
    };

    if next.clusters != current.clusters {
        info!("cluster list changed: {:?}", next.clusters);
        dash.set_clusters(sources.merge(&next.clusters));
        dash.set_status("cluster list reloaded");
    }
    if next.resources != current.resources {
        info!("resource list changed in runtime config, restart to watch the new kinds");
    }
    *current = next;
}

async fn stop_watch_tasks(tasks: Vec<JoinHandle<()>>) {
    for task in &tasks {
        task.abort();
    }
    if timeout(WATCH_SHUTDOWN_TIMEOUT, join_all(tasks)).await.is_err() {
        warn!("watch tasks did not stop within {WATCH_SHUTDOWN_TIMEOUT:?}");
    }
}

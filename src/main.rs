use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Parser;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::runtime::{Handle, Runtime};
use tracing::info;
use tracing_subscriber::EnvFilter;

use meshwatch::graph::normalize;
use meshwatch::render::{GraphRenderer, RenderTheme, TerminalRenderer, Viewport};
use meshwatch::settings::Settings;
use meshwatch::source::{FileSource, GraphSource};
use meshwatch::{events, export, ui, App};
use meshwatch_client::GraphQuery;
use meshwatch_types::GraphPayload;

#[derive(Parser, Debug)]
#[command(name = "meshwatch")]
#[command(about = "Terminal viewer for service-mesh topology graphs")]
struct Args {
    /// Settings file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Graph endpoint of the mesh console
    #[arg(long, conflicts_with = "file")]
    endpoint: Option<String>,

    /// Namespace to graph (repeatable)
    #[arg(short, long = "namespace")]
    namespaces: Vec<String>,

    /// Restrict the graph to one application
    #[arg(short, long = "app")]
    application: Option<String>,

    /// Read graph snapshots from a JSON file instead of the network
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Query window (e.g., "10m", "1h")
    #[arg(short, long)]
    duration: Option<String>,

    /// Color theme: auto, dark or light
    #[arg(long)]
    theme: Option<String>,

    /// Export the current graph to a JSON file and exit
    #[arg(short, long)]
    export: Option<PathBuf>,

    /// Log file (the terminal belongs to the UI)
    #[arg(long, default_value = "meshwatch.log")]
    log_file: PathBuf,
}

impl Args {
    /// Command-line flags win over the file and the environment.
    fn apply(&self, settings: &mut Settings) {
        if let Some(ref endpoint) = self.endpoint {
            settings.graph.endpoint = Some(endpoint.clone());
            settings.graph.file = None;
        }
        if let Some(ref file) = self.file {
            settings.graph.file = Some(file.clone());
        }
        if !self.namespaces.is_empty() {
            settings.graph.namespaces = self.namespaces.clone();
        }
        if let Some(ref app) = self.application {
            settings.graph.application = Some(app.clone());
        }
        if let Some(ref duration) = self.duration {
            settings.graph.duration = duration.clone();
        }
        if let Some(ref theme) = self.theme {
            settings.ui.theme = theme.clone();
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut settings = Settings::load(args.config.as_deref())?;
    args.apply(&mut settings);

    init_logging(&args.log_file)?;

    let query = settings.graph_query()?;
    let runtime = Runtime::new()?;

    if let Some(ref export_path) = args.export {
        return export_to_file(&settings, &query, &runtime, export_path);
    }

    let source = open_source(&settings, &query, runtime.handle())?;
    info!(source = source.description(), scope = %query.describe(), "starting");

    let theme = RenderTheme::from_name(&settings.ui.theme);
    let app = App::new(
        source,
        query,
        TerminalRenderer::new(),
        theme,
        settings.thresholds(),
    )?;
    let app = attach_metrics(app, &settings, runtime.handle())?;

    // Poll sources at least this often so network answers show up promptly.
    let poll_interval = match settings.graph.file {
        Some(_) => settings.refresh_interval()?.min(Duration::from_secs(1)),
        None => Duration::from_millis(100),
    };
    run_tui(app, poll_interval)
}

/// Log to a file: the terminal is taken over by the UI.
fn init_logging(path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create log file {}", path.display()))?;
    let filter = EnvFilter::try_from_env("MESHWATCH_LOG")
        .unwrap_or_else(|_| EnvFilter::new("meshwatch=info,meshwatch_client=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn open_source(
    settings: &Settings,
    query: &GraphQuery,
    runtime: &Handle,
) -> Result<Box<dyn GraphSource>> {
    if let Some(ref path) = settings.graph.file {
        return Ok(Box::new(FileSource::new(path)));
    }
    network_source(settings, query, runtime)
}

#[cfg(feature = "http")]
fn network_source(
    settings: &Settings,
    query: &GraphQuery,
    runtime: &Handle,
) -> Result<Box<dyn GraphSource>> {
    if query.namespaces.is_empty() {
        bail!("No namespaces to graph; pass --namespace or set graph.namespaces");
    }
    let client = mesh_client(settings)?;
    let refresh = settings.refresh_interval()?;
    Ok(Box::new(meshwatch::source::HttpSource::new(
        client,
        query.clone(),
        refresh,
        runtime,
    )))
}

#[cfg(not(feature = "http"))]
fn network_source(
    _settings: &Settings,
    _query: &GraphQuery,
    _runtime: &Handle,
) -> Result<Box<dyn GraphSource>> {
    bail!("Built without the \"http\" feature; use --file")
}

#[cfg(feature = "http")]
fn mesh_client(settings: &Settings) -> Result<meshwatch_client::MeshClient> {
    let mut builder = meshwatch_client::MeshClient::builder().timeout(settings.metrics_timeout()?);
    if let Some(ref endpoint) = settings.graph.endpoint {
        builder = builder.graph_endpoint(endpoint.clone());
    }
    if let Some(ref endpoint) = settings.metrics.endpoint {
        builder = builder.metrics_endpoint(endpoint.clone());
    }
    if let Some(ref token) = settings.graph.token {
        builder = builder.token(token.clone());
    }
    Ok(builder.build()?)
}

/// Metrics need a backend; file mode gets one only when an endpoint is set.
#[cfg(feature = "http")]
fn attach_metrics(app: App, settings: &Settings, runtime: &Handle) -> Result<App> {
    use meshwatch::metrics::MetricsCoordinator;

    if settings.graph.file.is_some()
        && settings.graph.endpoint.is_none()
        && settings.metrics.endpoint.is_none()
    {
        return Ok(app);
    }
    let coordinator = MetricsCoordinator::new(
        Arc::new(mesh_client(settings)?),
        settings.query_options(),
        settings.metrics_timeout()?,
        runtime.clone(),
    );
    Ok(app.with_metrics(coordinator))
}

#[cfg(not(feature = "http"))]
fn attach_metrics(app: App, _settings: &Settings, _runtime: &Handle) -> Result<App> {
    Ok(app)
}

/// Fetch one snapshot, summarize it and write it out.
fn export_to_file(
    settings: &Settings,
    query: &GraphQuery,
    runtime: &Runtime,
    export_path: &Path,
) -> Result<()> {
    let payload = match settings.graph.file {
        Some(ref path) => {
            let mut source = FileSource::new(path);
            match source.poll() {
                Some(payload) => payload,
                None => bail!("{}", source.error().unwrap_or("No graph data in file")),
            }
        }
        None => fetch_once(settings, query, runtime)?,
    };

    let normalized = normalize(&payload);
    export::write(export_path, &export::summary(&normalized, &settings.thresholds()))?;

    println!("Exported graph to: {}", export_path.display());
    Ok(())
}

#[cfg(feature = "http")]
fn fetch_once(settings: &Settings, query: &GraphQuery, runtime: &Runtime) -> Result<GraphPayload> {
    let client = mesh_client(settings)?;
    runtime
        .block_on(client.fetch_graph(query))
        .with_context(|| format!("Failed to fetch graph from {}", client.graph_endpoint()))
}

#[cfg(not(feature = "http"))]
fn fetch_once(
    _settings: &Settings,
    _query: &GraphQuery,
    _runtime: &Runtime,
) -> Result<GraphPayload> {
    bail!("Built without the \"http\" feature; use --file")
}

/// Run the TUI until the user quits
fn run_tui(mut app: App, poll_interval: Duration) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Setup panic hook to restore terminal
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
        original_hook(panic);
    }));

    let size = terminal.size()?;
    app.renderer_mut()
        .relayout(Viewport::new(size.width, size.height))?;
    let _ = app.reload_data();

    let result = run_app(&mut terminal, &mut app, poll_interval);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    poll_interval: Duration,
) -> Result<()> {
    let mut last_poll = Instant::now();

    // Minimum terminal size for usable display
    const MIN_WIDTH: u16 = 60;
    const MIN_HEIGHT: u16 = 12;

    while app.running {
        terminal.draw(|frame| {
            let area = frame.area();

            if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
                let msg = format!(
                    "Terminal too small: {}x{}\nMinimum: {}x{}\n\nResize to continue",
                    area.width, area.height, MIN_WIDTH, MIN_HEIGHT
                );
                let paragraph = ratatui::widgets::Paragraph::new(msg)
                    .alignment(ratatui::layout::Alignment::Center)
                    .style(ratatui::style::Style::default().fg(ratatui::style::Color::Yellow));
                let centered =
                    ratatui::layout::Rect::new(0, (area.height / 2).saturating_sub(2), area.width, 5)
                        .intersection(area);
                frame.render_widget(paragraph, centered);
                return;
            }

            ui::draw(frame, app);
        })?;

        if let Some(event) = events::poll_event(Duration::from_millis(100))? {
            match event {
                Event::Key(key) => events::handle_key_event(app, key),
                Event::Mouse(mouse) => events::handle_mouse_event(app, mouse),
                Event::Resize(width, height) => app.resize(width, height, Instant::now()),
                _ => {}
            }
        }

        app.tick(Instant::now())?;

        if last_poll.elapsed() >= poll_interval {
            let _ = app.reload_data();
            last_poll = Instant::now();
        }
    }

    Ok(())
}

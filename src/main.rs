//! Main entry point for the FoodCraft terminal dashboard

use anyhow::{bail, Context, Result};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{
    io::{self, Stdout},
    panic,
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};

use foodcraft::{
    account::{MemoryProfileStore, ProfileStore, DEFAULT_DISPLAY_NAME},
    adjust::{AdjustableResult, AdjustmentLimits},
    billing::MockPaymentRedirector,
    config::{data_dir, Config},
    export::{ExportKind, ExportOutcome, ExportRenderer},
    input::handle_event,
    logging::{self, LogTarget},
    prefs::Preferences,
    provider::{GeminiProvider, GenerationProvider, OfflineProvider},
    render::Rasterizer,
    session::{bootstrap, IdentityProvider, LocalIdentity},
    state::{AppContext, AppState},
    supabase::SupabaseClient,
    terminal_capabilities::detect_capabilities,
    tools::menu::MenuDesign,
    ui,
    worker::{spawn_workers, Services, WorkerHandle},
};

/// Target frame time for 60 FPS
const FRAME_TIME_MS: u64 = 16;

/// Time allowed for pending credit writes on exit.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Default)]
struct Args {
    offline: bool,
    export_menu: Option<PathBuf>,
    format: Option<String>,
    payment_return: Option<String>,
}

fn parse_args() -> Result<Args> {
    let mut args = Args::default();
    let mut iter = std::env::args().skip(1);
    while let Some(a) = iter.next() {
        match a.as_str() {
            "--offline" => args.offline = true,
            "--export-menu" => {
                args.export_menu = Some(PathBuf::from(iter.next().context("--export-menu needs a file")?));
            }
            "--format" => args.format = Some(iter.next().context("--format needs png or pdf")?),
            "--payment-return" => {
                args.payment_return = Some(iter.next().context("--payment-return needs a URL")?);
            }
            other => bail!("unknown argument: {}", other),
        }
    }
    Ok(args)
}

fn main() -> Result<()> {
    let args = parse_args()?;

    // Load configuration
    let config = Config::load().unwrap_or_default();

    // One-shot export runs without a terminal UI
    if let Some(path) = args.export_menu.as_ref() {
        logging::init(&LogTarget::Stderr)?;
        return run_export_once(path, args.format.as_deref(), &config);
    }

    logging::init(&LogTarget::File(logging::default_log_path()))?;
    tracing::info!(offline = args.offline, "starting foodcraft");

    // Set up panic hook to restore terminal on panic
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        // Restore terminal
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
        original_hook(panic_info);
    }));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let capabilities = detect_capabilities();
    let rasterizer = Rasterizer::discover(config.export.font_path.as_deref());

    let provider: Arc<dyn GenerationProvider> = if args.offline {
        Arc::new(OfflineProvider::new())
    } else {
        match GeminiProvider::from_config(&config.provider) {
            Ok(p) => Arc::new(p),
            Err(e) => {
                tracing::warn!(error = %e, "generation provider unavailable, using offline provider");
                Arc::new(OfflineProvider::new())
            }
        }
    };

    let (identity, store) = build_identity(&config, args.offline);

    let prefs_path = Preferences::default_path();
    let prefs = Preferences::load_from(&prefs_path).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load preferences");
        Preferences::default()
    });

    let timeout = Duration::from_millis(config.auth.bootstrap_timeout_ms);
    let restored = runtime.block_on(bootstrap(identity.as_ref(), timeout));

    let services = Services {
        runtime: runtime.handle().clone(),
        provider,
        identity: identity.clone(),
        payments: Arc::new(MockPaymentRedirector::new(
            &config.payment.return_base_url,
            Duration::from_millis(config.payment.simulated_delay_ms),
        )),
        exporter: ExportRenderer::new(rasterizer.clone(), &config.export),
    };

    // Spawn worker threads
    let workers = spawn_workers(services)?;

    // Create application state
    let mut app_state = AppState::new(AppContext {
        config,
        capabilities,
        worker_tx: workers.request_tx.clone(),
        runtime: runtime.handle().clone(),
        store,
        rasterizer,
        prefs,
        prefs_path: Some(prefs_path),
        auth_events: Some(identity.subscribe()),
    });
    if let Some(user) = restored {
        app_state.sign_in(user);
    }
    if let Some(url) = args.payment_return.as_deref() {
        if !app_state.handle_payment_return(url) {
            tracing::warn!(url, "ignoring URL without a successful payment status");
        }
    }

    // Initialize terminal (only needed for interactive TUI)
    let mut terminal = setup_terminal()?;

    // Run main event loop
    let result = run_event_loop(&mut terminal, &mut app_state, &workers);

    // Cleanup
    cleanup_terminal(terminal)?;

    // Shutdown workers
    workers.shutdown();

    if let Some(ledger) = app_state.ledger().cloned() {
        if runtime
            .block_on(tokio::time::timeout(SETTLE_TIMEOUT, ledger.settle()))
            .is_err()
        {
            tracing::warn!("credit writes still pending at exit");
        }
    }

    result
}

/// Remote identity when configured, else local accounts kept in memory.
fn build_identity(config: &Config, offline: bool) -> (Arc<dyn IdentityProvider>, Arc<dyn ProfileStore>) {
    if !offline {
        match SupabaseClient::from_config(&config.supabase, Some(data_dir().join("session.json"))) {
            Ok(client) => {
                let client = Arc::new(client);
                let identity: Arc<dyn IdentityProvider> = client.clone();
                let store: Arc<dyn ProfileStore> = client;
                return (identity, store);
            }
            Err(e) => tracing::warn!(error = %e, "remote accounts unavailable, using local accounts"),
        }
    }
    let store: Arc<dyn ProfileStore> = Arc::new(MemoryProfileStore::new());
    let identity: Arc<dyn IdentityProvider> = if offline {
        Arc::new(LocalIdentity::signed_in(store.clone(), DEFAULT_DISPLAY_NAME, "chef@localhost"))
    } else {
        Arc::new(LocalIdentity::new(store.clone()))
    };
    (identity, store)
}

/// Set up the terminal for TUI rendering
fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

/// Restore terminal to normal state
fn cleanup_terminal(mut terminal: Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

/// Main event loop - handles input, processes worker messages, renders UI
fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app_state: &mut AppState,
    workers: &WorkerHandle,
) -> Result<()> {
    let frame_duration = Duration::from_millis(FRAME_TIME_MS);

    loop {
        let frame_start = Instant::now();

        // Render UI
        terminal.draw(|frame| ui::render(frame, app_state))?;

        // Poll for events with timeout
        let timeout = frame_duration.saturating_sub(frame_start.elapsed());
        if event::poll(timeout)? {
            let event = event::read()?;

            // Handle terminal resize
            if let Event::Resize(width, height) = event {
                app_state.set_terminal_size(width, height);
            }

            // Handle input
            handle_event(event, app_state)?;
        }

        // Process worker responses (non-blocking)
        while let Ok(response) = workers.response_rx.try_recv() {
            app_state.handle_worker_response(response);
        }
        app_state.drain_signals();
        app_state.poll_auth_events();

        // Record frame time for performance monitoring
        let frame_time = frame_start.elapsed();
        app_state.perf_metrics.record_frame(frame_time);

        // Check for quit
        if app_state.should_quit {
            break;
        }
    }

    Ok(())
}

/// Export a saved menu design to the configured export directory and exit
fn run_export_once(path: &std::path::Path, format: Option<&str>, config: &Config) -> Result<()> {
    let kind = match format {
        None => ExportKind::Image,
        Some(name) => ExportKind::from_name(name).with_context(|| format!("unknown export format: {}", name))?,
    };
    let raw = std::fs::read_to_string(path).with_context(|| format!("Failed to read menu: {:?}", path))?;
    let design = MenuDesign::from_json(&raw).with_context(|| format!("Failed to parse menu: {:?}", path))?;

    let mut result = AdjustableResult::new(AdjustmentLimits::MENU);
    result.set_artifact(design);

    let exporter = ExportRenderer::new(Rasterizer::discover(config.export.font_path.as_deref()), &config.export);
    let start = Instant::now();
    match exporter.export_menu(&result, kind)? {
        ExportOutcome::Written(path) => {
            println!("Saved menu to {} ({}ms)", path.display(), start.elapsed().as_millis());
        }
        ExportOutcome::Disabled => bail!("menu has nothing to export"),
    }
    Ok(())
}

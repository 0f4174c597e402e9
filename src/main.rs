use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use appium_hub::config::HubConfig;
use appium_hub::core::{BackendFactory, BackendSupervisor, SessionRegistry};
use appium_hub::{api, utils};

#[derive(Parser)]
#[command(name = "appium-hub")]
#[command(about = "Session-aware reverse-proxy hub for parallel Appium backends", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the gateway.
    Serve(HubConfig),

    /// Validate the environment without starting the gateway: the backend
    /// binary is on `PATH`, the port range is non-empty, and the log
    /// directory is creatable.
    Check(HubConfig),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(config) => serve(config).await,
        Commands::Check(config) => check(config),
    }
}

fn init_tracing(config: &HubConfig) -> anyhow::Result<tracing_appender::non_blocking::WorkerGuard> {
    std::fs::create_dir_all(&config.log_dir)?;
    let log_path = utils::paths::hub_log_path(&config.log_dir);

    let file_appender = tracing_appender::rolling::never(
        log_path.parent().expect("log path has a parent"),
        log_path.file_name().expect("log path has a file name"),
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let default_directive = format!("appium_hub={}", config.log_level);
    let env_filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or(default_directive),
    );

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stdout))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false),
        )
        .init();

    Ok(guard)
}

async fn serve(config: HubConfig) -> anyhow::Result<()> {
    let _log_guard = init_tracing(&config)?;

    let appium_bin = config.appium_bin.clone();
    let log_dir = config.log_dir.clone();
    let factory: BackendFactory = Arc::new(move |port, session_id| {
        let log_path = utils::paths::session_log_path(&log_dir, session_id, port);
        Arc::new(BackendSupervisor::new(appium_bin.clone(), port, log_path))
    });

    let registry = Arc::new(SessionRegistry::new(
        config.port_range(),
        config.max_sessions,
        Duration::from_secs(30),
        factory,
    ));

    spawn_eviction_task(registry.clone(), config.session_timeout(), config.health_check_interval());

    let state = api::AppState::new(registry.clone());
    let app = api::build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "appium hub listening");

    let shutdown_registry = registry.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_registry))
        .await?;

    Ok(())
}

fn spawn_eviction_task(
    registry: Arc<SessionRegistry>,
    session_timeout: Duration,
    cadence: Duration,
) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(cadence).await;
            let evicted = registry.evict_idle(session_timeout).await;
            if evicted > 0 {
                tracing::info!(evicted, "idle eviction sweep complete");
            }
        }
    });
}

async fn shutdown_signal(registry: Arc<SessionRegistry>) {
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .expect("failed to install SIGTERM handler");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }

    tracing::info!("shutdown signal received, tearing down all sessions");
    registry.shutdown_all().await;
    tracing::info!("shutdown complete");
}

fn check(config: HubConfig) -> anyhow::Result<()> {
    let mut problems = Vec::new();

    if which::which(&config.appium_bin).is_err() {
        problems.push(format!("backend binary '{}' not found on PATH", config.appium_bin));
    }

    if config.appium_port_start > config.appium_port_end {
        problems.push(format!(
            "appium_port_start ({}) > appium_port_end ({})",
            config.appium_port_start, config.appium_port_end
        ));
    }

    if let Err(err) = std::fs::create_dir_all(&config.log_dir) {
        problems.push(format!("log_dir '{}' is not creatable: {err}", config.log_dir.display()));
    }

    if problems.is_empty() {
        println!("environment looks sane");
        Ok(())
    } else {
        for problem in &problems {
            eprintln!("problem: {problem}");
        }
        anyhow::bail!("{} problem(s) found", problems.len());
    }
}

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use backend_lib::{
    auth::session::CLEANUP_INTERVAL,
    config::{LogFormat, Settings},
    router, AppState,
};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "concern-portal", about = "Student concern portal server")]
struct Cli {
    /// Configuration file; a missing file falls back to defaults
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Override the bind address from the configuration
    #[arg(long)]
    bind: Option<SocketAddr>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Create a super-admin, or reset the password of an existing one
    SeedAdmin {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "CONCERN_SEED_PASSWORD")]
        password: String,
    },
}

fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_level.to_ascii_lowercase()));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match settings.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load_from(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;
    if let Some(bind) = cli.bind {
        settings.bind_addr = bind;
    }
    init_tracing(&settings);

    let state = Arc::new(AppState::from_settings(settings)?);

    match cli.command.unwrap_or(Command::Serve) {
        Command::SeedAdmin {
            username,
            email,
            password,
        } => {
            let admin = state.auth.seed_admin(&username, &email, &password).await?;
            tracing::info!(user_id = %admin.id, username = %admin.username, "super-admin ready");
            Ok(())
        },
        Command::Serve => serve(state).await,
    }
}

async fn serve(state: Arc<AppState>) -> anyhow::Result<()> {
    let _session_cleanup = state.sessions.spawn_cleanup(CLEANUP_INTERVAL);

    let limiters = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            limiters.rate_limiter.cleanup();
            limiters.login_limiter.cleanup();
            limiters.verify_limiter.cleanup();
        }
    });

    let addr = state.settings.bind_addr;
    let app = router::create_router(state);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "listening");

    // peer addresses key the rate limits when proxy headers are untrusted
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;

    Ok(())
}

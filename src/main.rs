//! byteping sync binary: log in, pull every service's history, print analytics

use byteping_sync::{Config, Result, ServiceId, Session, SyncError};
use clap::Parser;
use serde_json::json;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Account email
    #[arg(long, env = "BYTEPING_EMAIL")]
    email: String,

    /// Account password
    #[arg(long, env = "BYTEPING_PASSWORD", hide_env_values = true)]
    password: String,

    /// Only report on this service
    #[arg(long)]
    service: Option<ServiceId>,
}

#[tokio::main]
async fn main() -> Result<()> {
    initialize_tracing();

    let args = Args::parse();
    info!("Starting byteping sync v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env();
    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        std::process::exit(1);
    }

    let session = Session::new(config)?;

    if let Err(e) = run(&session, &args).await {
        error!("Sync failed: {}", e);
        std::process::exit(if e.is_session_expired() { 2 } else { 1 });
    }

    Ok(())
}

async fn run(session: &Session, args: &Args) -> Result<()> {
    session.login(&args.email, &args.password).await?;

    let user = session.current_user().await?;
    if !user.is_email_verified {
        warn!("Email address {} is not verified", user.email);
    }

    let (report, services): (_, Vec<_>) = match args.service {
        Some(id) => {
            session.list_services().await?;
            let report = session.refresh(Some(id)).await;
            (report, session.service(id).await.into_iter().collect())
        }
        None => (session.load_services().await?, session.services().await),
    };
    if report.session_expired() {
        return Err(SyncError::SessionExpired);
    }
    for failure in report.failures() {
        warn!("{}", failure);
    }

    for service in services {
        let line = json!({
            "service": service,
            "current": session.current_status(service.id).await,
            "analytics": session.analytics(service.id).await,
            "trend": session.trend(service.id).await,
        });
        println!("{}", line);
    }

    Ok(())
}

/// Initialize structured logging
fn initialize_tracing() {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .json();

    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&log_level))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}

use std::net::SocketAddr;
use std::sync::Arc;

use agenda_core::config::{ensure_parent_dir, AgendaConfig};
use agenda_events::SqliteEventStore;
use agenda_scheduler::{
    EventService, JobTable, LogSender, NotificationSender, Reconciler, Scheduler, SmtpSender,
    Supervisor, SystemClock,
};
use agenda_users::UserDirectory;
use clap::Parser;
use tracing::{info, warn};

mod app;
mod auth;
mod http;

#[derive(Debug, Parser)]
#[command(name = "agenda-gateway", version, about = "Calendar events with email reminders")]
struct Cli {
    /// Path to agenda.toml. Falls back to $AGENDA_CONFIG, then
    /// ~/.agenda/agenda.toml.
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "agenda_gateway=info,agenda_scheduler=info,tower_http=debug".into()
            }),
        )
        .init();

    // load config: --config > AGENDA_CONFIG env > ~/.agenda/agenda.toml
    let cli = Cli::parse();
    let config_path = cli.config.or_else(|| std::env::var("AGENDA_CONFIG").ok());
    let config = AgendaConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        AgendaConfig::default()
    });

    // one SQLite file, one connection per subsystem
    let db_path = config.database.path.clone();
    ensure_parent_dir(&db_path)?;
    info!(path = %db_path, "opening SQLite database");

    let events_conn = rusqlite::Connection::open(&db_path)?;
    events_conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    let store = Arc::new(SqliteEventStore::new(events_conn)?);
    let users = Arc::new(UserDirectory::new(rusqlite::Connection::open(&db_path)?)?);
    info!("database migrations complete");

    let sender: Arc<dyn NotificationSender> = match &config.smtp {
        Some(smtp) => match SmtpSender::new(smtp) {
            Ok(sender) => {
                info!(host = %smtp.host, port = smtp.port, "reminders will be mailed");
                Arc::new(sender)
            }
            Err(e) => {
                warn!("SMTP setup failed ({}), reminders will only be logged", e);
                Arc::new(LogSender)
            }
        },
        None => {
            info!("no [smtp] section, reminders will only be logged");
            Arc::new(LogSender)
        }
    };

    let clock = Arc::new(SystemClock);
    let jobs = Arc::new(JobTable::new());
    let reconciler = Arc::new(Reconciler::new(jobs.clone(), users.clone(), clock.clone()));
    let service = Arc::new(EventService::new(store.clone(), reconciler.clone()));
    let scheduler = Arc::new(Scheduler::new(
        jobs.clone(),
        sender,
        clock,
        &config.scheduler,
    ));
    let supervisor = Supervisor::new(store, reconciler, scheduler.clone(), &config.scheduler);

    // scheduler loop in background; rebuilds the job table before its first tick
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let supervisor_task = tokio::spawn(async move { supervisor.supervise(shutdown_rx).await });

    let state = Arc::new(app::AppState::new(service, users, jobs));
    let router = app::build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.gateway.bind, config.gateway.port).parse()?;
    info!("Agenda gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // stop the scheduler; pending reminders are rebuilt from the store next start
    let _ = shutdown_tx.send(true);
    if let Err(e) = supervisor_task.await {
        warn!("scheduler task ended abnormally: {e}");
    }
    let discarded = scheduler.drain()?;
    info!(discarded, "shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => tokio::select! {
                _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
            },
            Err(e) => {
                warn!("failed to install SIGTERM handler: {e}");
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::domain::{AppState, Collaborators};
use crate::domain::audit::AuditSink;
use crate::domain::clock::SystemClock;
use crate::domain::repository::{EditorialRepository, SnapshotRepository};
use crate::infrastructure::AppStateImpl;
use crate::infrastructure::audit::{AUDIT_QUEUE_CAPACITY, PostgresAuditLog, QueuedAuditSink, TracingAuditSink};
use crate::infrastructure::channels::build_adapters;
use crate::infrastructure::http::{HttpServer, HttpServerConfig};
use crate::infrastructure::identity::RolePermissions;
use crate::infrastructure::memory::InMemoryRepository;
use crate::infrastructure::persistence::PostgresRepository;
use crate::infrastructure::settings::{Settings, StorageBackend};

mod domain;
mod infrastructure;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_signal(shutdown.clone()));

    match settings.storage {
        StorageBackend::Postgres => {
            let database_settings = settings
                .database
                .as_ref()
                .context("database settings are required for the postgres storage backend")?;
            let database = editorial_common::database::connect(database_settings).await?;
            tracing::info!("connected to database");

            let (audit, audit_writer) = QueuedAuditSink::spawn(
                PostgresAuditLog::new(database),
                AUDIT_QUEUE_CAPACITY,
                shutdown.child_token(),
            );
            let result = serve(PostgresRepository::new(database), Arc::new(audit), &settings, shutdown.clone()).await;
            // also reached when serve failed before its own shutdown
            shutdown.cancel();
            audit_writer.finish().await;
            result
        }
        StorageBackend::Memory => {
            tracing::warn!("using in-memory storage, nothing survives a restart");
            serve(InMemoryRepository::new(), Arc::new(TracingAuditSink), &settings, shutdown).await
        }
    }
}

/// Runs the service until `shutdown` fires, then stops the background tasks.
async fn serve<R>(
    repository: R,
    audit: Arc<dyn AuditSink>,
    settings: &Settings,
    shutdown: CancellationToken,
) -> anyhow::Result<()>
where
    R: EditorialRepository + SnapshotRepository,
{
    let permissions = RolePermissions::from_roles(&settings.permissions)?;
    let collaborators = Collaborators::new(Arc::new(permissions), audit, Arc::new(SystemClock));
    let adapters = build_adapters(&settings.dispatch.channels)?;

    let state = AppStateImpl::new(repository, collaborators, adapters, settings, shutdown.clone());

    let scheduler = if settings.scheduler.enabled {
        let every = Duration::from_secs(settings.scheduler.tick_interval_seconds.max(1));
        let scheduler = state.scheduler().clone();
        Some(tokio::spawn(scheduler.run(every, shutdown.child_token())))
    } else {
        tracing::info!("scheduler disabled, due entries are only promoted through the tick endpoint");
        None
    };

    let server_config = HttpServerConfig {
        port: &settings.server_port,
    };
    let http_server = HttpServer::new(state, server_config).await?;
    let result = http_server.run(shutdown.clone()).await;

    shutdown.cancel();
    if let Some(scheduler) = scheduler {
        if let Err(err) = scheduler.await {
            tracing::error!(error = %err, "scheduler task ended abnormally");
        }
    }
    result
}

async fn cancel_on_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown requested");
    shutdown.cancel();
}

use std::future::Future;

use editorial_common::AUDIT_LOG_TABLE;
use editorial_common::database::Database;
use sqlx::types::Json;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::domain::audit::{AuditRecord, AuditSink};

/// Records queued for the writer before new ones are dropped.
pub const AUDIT_QUEUE_CAPACITY: usize = 1024;

/// Writes audit records to the log as structured events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, record: AuditRecord) {
        tracing::info!(
            target: "editorial::audit",
            kind = record.entry.kind(),
            actor = %record.actor,
            article_id = ?record.article_id,
            detail = %serde_json::to_string(&record.entry).unwrap_or_default(),
            "audit"
        );
    }
}

/// Durable destination of audit records.
pub trait AuditLog: Send + Sync + 'static {
    fn append(&self, record: &AuditRecord) -> impl Future<Output = anyhow::Result<()>> + Send;
}

/// The audit log table.
#[derive(Debug, Clone)]
pub struct PostgresAuditLog {
    database: &'static Database,
}

impl PostgresAuditLog {
    pub fn new(database: &'static Database) -> Self {
        Self { database }
    }
}

impl AuditLog for PostgresAuditLog {
    async fn append(&self, record: &AuditRecord) -> anyhow::Result<()> {
        sqlx::query(&format!(
            "INSERT INTO {AUDIT_LOG_TABLE} (article_id, actor_id, kind, detail, recorded_at) \
             VALUES ($1, $2, $3, $4, $5)"
        ))
        .bind(record.article_id.map(|id| id.0))
        .bind(record.actor.as_ref())
        .bind(record.entry.kind())
        .bind(Json(&record.entry))
        .bind(record.recorded_at)
        .execute(self.database.database_pool())
        .await?;
        Ok(())
    }
}

/// Hands audit records to a single writer task without holding up the caller.
///
/// Records reach the log in the order they were recorded.
#[derive(Debug, Clone)]
pub struct QueuedAuditSink {
    sender: mpsc::Sender<AuditRecord>,
}

/// The writer task behind a [`QueuedAuditSink`].
pub struct AuditWriter {
    handle: JoinHandle<()>,
}

impl QueuedAuditSink {
    /// Starts the writer. Once `shutdown` fires it appends what is queued and stops.
    pub fn spawn<L: AuditLog>(log: L, capacity: usize, shutdown: CancellationToken) -> (Self, AuditWriter) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(write_records(log, receiver, shutdown));
        (Self { sender }, AuditWriter { handle })
    }
}

impl AuditSink for QueuedAuditSink {
    fn record(&self, record: AuditRecord) {
        match self.sender.try_send(record) {
            Ok(()) => {}
            Err(TrySendError::Full(record)) => {
                tracing::error!(kind = record.entry.kind(), "audit queue full, record dropped");
            }
            Err(TrySendError::Closed(record)) => {
                tracing::error!(kind = record.entry.kind(), "audit writer stopped, record dropped");
            }
        }
    }
}

impl AuditWriter {
    /// Waits until every queued record is written.
    pub async fn finish(self) {
        if let Err(err) = self.handle.await {
            tracing::error!(error = %err, "audit writer ended abnormally");
        }
    }
}

async fn write_records<L: AuditLog>(
    log: L,
    mut receiver: mpsc::Receiver<AuditRecord>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            record = receiver.recv() => {
                let Some(record) = record else { break };
                if let Err(err) = log.append(&record).await {
                    tracing::error!(kind = record.entry.kind(), error = %err, "failed to write audit record");
                }
            }
            _ = shutdown.cancelled() => {
                // refuse new records and let the loop drain the queue
                receiver.close();
            }
        }
    }
    tracing::debug!("audit writer stopped");
}

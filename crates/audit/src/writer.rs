//! Background audit writer.

use crate::{AuditEntry, AuditStore};
use directory::{UserId, ZoneId};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Owns the audit store on a background task and drains a channel of
/// entries into it.
///
/// Entity services hold cheap [`AuditHandle`] clones and enqueue before
/// sending their response; they never wait for the row to land. Because
/// the task owns the store and the channel is unbounded, an enqueued
/// denial is written even if the request that produced it is aborted
/// right after. Write failures stay inside the task (the store already
/// logs and swallows them).
pub struct AuditWriter {
    handle: AuditHandle,
    task: JoinHandle<AuditStore>,
}

impl AuditWriter {
    /// Move the store onto a drain task and return the writer.
    pub fn spawn(store: AuditStore) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<AuditEntry>();
        let task = tokio::spawn(async move {
            while let Some(entry) = rx.recv().await {
                store.log(&entry);
            }
            debug!("audit writer channel closed, draining done");
            store
        });
        Self {
            handle: AuditHandle { tx },
            task,
        }
    }

    pub fn handle(&self) -> AuditHandle {
        self.handle.clone()
    }

    /// Close the channel, wait for every queued entry to be written, and
    /// hand the store back. Outstanding [`AuditHandle`] clones keep the
    /// channel open until they are dropped too.
    pub async fn shutdown(self) -> Option<AuditStore> {
        let AuditWriter { handle, task } = self;
        drop(handle);
        match task.await {
            Ok(store) => Some(store),
            Err(e) => {
                warn!(error = %e, "audit writer task failed");
                None
            }
        }
    }
}

/// Cheap, cloneable entry point for fire-and-forget audit logging.
#[derive(Clone)]
pub struct AuditHandle {
    tx: mpsc::UnboundedSender<AuditEntry>,
}

impl AuditHandle {
    /// Enqueue one entry. Never blocks; if the writer is gone the entry
    /// is dropped and the gap is logged.
    pub fn log(&self, entry: AuditEntry) {
        if self.tx.send(entry).is_err() {
            warn!("audit writer gone, entry dropped");
        }
    }

    /// Enqueue a denial record. Issued synchronously relative to the deny
    /// response — call this before returning the 403.
    pub fn log_denial(
        &self,
        zone_id: ZoneId,
        user_id: UserId,
        reason: &str,
        entity_type: &str,
        entity_id: &str,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) {
        self.log(
            AuditEntry::denial(zone_id, user_id, reason, entity_type, entity_id)
                .with_request_info(ip_address, user_agent),
        );
    }
}

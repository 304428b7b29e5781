// Sync engine: pushes unsynced local records to the remote mirror and
// propagates deletes both ways. The local store is the source of truth; the
// remote side of every operation is best-effort and can never corrupt or
// block local state.

#[cfg(test)]
mod tests;

use rusqlite::Connection;

use crate::db::schema;
use crate::error::Result;
use crate::remote::{RemoteRecord, RemoteStore};

/// What happened to a deleted record's remote mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// No local row matched the id/owner pair.
    NotFound,
    /// Removed locally; it was never synced, so there is nothing remote.
    DeletedLocalOnly,
    /// Removed locally and the remote mirror document was removed too.
    DeletedBoth,
    /// Removed locally; the remote had no matching document.
    RemoteMissing,
    /// Removed locally; the remote could not be reached for the mirror delete.
    RemoteUnreachable,
}

pub struct SyncEngine<'a> {
    conn: &'a Connection,
    remote: &'a dyn RemoteStore,
}

impl<'a> SyncEngine<'a> {
    pub fn new(conn: &'a Connection, remote: &'a dyn RemoteStore) -> Self {
        Self { conn, remote }
    }

    /// Push every unsynced record for an owner in one batch. Returns the
    /// number of records now mirrored; 0 means either nothing was pending or
    /// the remote was unreachable (in which case nothing was mutated and the
    /// next call retries the same batch).
    pub fn sync_owner(&self, owner_id: &str) -> Result<usize> {
        let pending = schema::unsynced_records_by_owner(self.conn, owner_id)?;
        if pending.is_empty() {
            log::info!("No unsynced records for owner {}", owner_id);
            return Ok(0);
        }

        let batch: Vec<RemoteRecord> = pending.iter().map(RemoteRecord::from_local).collect();

        match self.remote.insert_records(&batch) {
            Ok(inserted) => {
                // All-or-nothing: only a confirmed bulk insert flips the
                // local rows, in a single owner-scoped update.
                schema::mark_owner_synced(self.conn, owner_id)?;
                log::info!("Synced {} record(s) for owner {}", inserted, owner_id);
                Ok(pending.len())
            }
            Err(e) => {
                log::warn!(
                    "Sync failed for owner {}, keeping {} record(s) pending: {}",
                    owner_id,
                    pending.len(),
                    e
                );
                Ok(0)
            }
        }
    }

    /// Delete a record locally and, when it had been mirrored, attempt the
    /// matching remote delete. Local deletion always wins: a remote failure
    /// is reported in the outcome but never rolls the local delete back.
    pub fn delete_record(&self, local_id: i64, owner_id: &str) -> Result<DeleteOutcome> {
        let removed = schema::delete_record_local(self.conn, local_id, owner_id)?;

        let Some((record_id, synced)) = removed else {
            return Ok(DeleteOutcome::NotFound);
        };

        if !synced {
            log::info!("Record {} was never synced, skipping remote delete", record_id);
            return Ok(DeleteOutcome::DeletedLocalOnly);
        }

        match self.remote.delete_record(&record_id, owner_id) {
            Ok(true) => {
                log::info!("Removed remote mirror of record {}", record_id);
                Ok(DeleteOutcome::DeletedBoth)
            }
            Ok(false) => {
                log::warn!("No matching remote document for record {}", record_id);
                Ok(DeleteOutcome::RemoteMissing)
            }
            Err(e) => {
                log::warn!("Remote delete failed for record {}: {}", record_id, e);
                Ok(DeleteOutcome::RemoteUnreachable)
            }
        }
    }
}

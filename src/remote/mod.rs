// Remote mirror store
// The remote is best-effort: every operation either succeeds against the
// live service or reports a RemoteError that callers downgrade to local-only
// behavior. The trait seam keeps AuthGateway and SyncEngine testable without
// a network.

pub mod mongo;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db::schema::BiomassRecord;

pub use mongo::MongoRemote;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote store not configured")]
    NotConfigured,

    #[error("remote unreachable: {0}")]
    Unreachable(String),

    #[error("remote operation failed: {0}")]
    Operation(String),
}

/// A credential row as the remote stores it. The id is carried in its
/// store-neutral string form (ObjectId hex) so it can be cached locally
/// verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteUser {
    pub id: String,
    pub username: String,
    pub email: Option<String>,
    pub password_hash: String,
}

/// A record in remote shape: metrics rounded to two decimals, timestamp
/// parsed out of the local ISO-8601 string.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRecord {
    pub owner_id: String,
    pub record_id: String,
    pub shrimp_count: i64,
    pub biomass: f64,
    pub feed_measurement: f64,
    pub created_at: DateTime<Utc>,
}

impl RemoteRecord {
    pub fn from_local(record: &BiomassRecord) -> Self {
        let created_at = match DateTime::parse_from_rfc3339(&record.created_at) {
            Ok(dt) => dt.with_timezone(&Utc),
            Err(e) => {
                // Malformed stored dates must not block the sync
                log::warn!(
                    "Record {} has unparseable created_at '{}' ({}), substituting now",
                    record.record_id,
                    record.created_at,
                    e
                );
                Utc::now()
            }
        };

        Self {
            owner_id: record.owner_id.clone(),
            record_id: record.record_id.clone(),
            shrimp_count: record.shrimp_count,
            biomass: round2(record.biomass),
            feed_measurement: round2(record.feed_measurement),
            created_at,
        }
    }
}

/// Round to two decimals at the remote boundary.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub trait RemoteStore {
    /// Look up a credential by username.
    fn find_user(&self, username: &str) -> std::result::Result<Option<RemoteUser>, RemoteError>;

    /// Insert a batch of records in one write. Returns the number inserted;
    /// an Err means nothing may be treated as mirrored.
    fn insert_records(&self, records: &[RemoteRecord]) -> std::result::Result<usize, RemoteError>;

    /// Delete the document matching record_id for the given owner (either
    /// owner-id representation). Ok(false) means no matching document.
    fn delete_record(
        &self,
        record_id: &str,
        owner_id: &str,
    ) -> std::result::Result<bool, RemoteError>;
}

#[cfg(test)]
pub mod testing {
    // In-memory RemoteStore double for auth/sync tests.

    use std::cell::{Cell, RefCell};

    use super::{RemoteError, RemoteRecord, RemoteStore, RemoteUser};

    #[derive(Default)]
    pub struct InMemoryRemote {
        pub users: Vec<RemoteUser>,
        pub records: RefCell<Vec<RemoteRecord>>,
        pub reachable: Cell<bool>,
        pub insert_calls: Cell<usize>,
        pub find_calls: Cell<usize>,
    }

    impl InMemoryRemote {
        pub fn reachable() -> Self {
            let remote = Self::default();
            remote.reachable.set(true);
            remote
        }

        pub fn unreachable() -> Self {
            Self::default()
        }

        pub fn with_user(mut self, user: RemoteUser) -> Self {
            self.users.push(user);
            self
        }
    }

    impl RemoteStore for InMemoryRemote {
        fn find_user(&self, username: &str) -> Result<Option<RemoteUser>, RemoteError> {
            self.find_calls.set(self.find_calls.get() + 1);
            if !self.reachable.get() {
                return Err(RemoteError::Unreachable("test remote is down".to_string()));
            }
            Ok(self.users.iter().find(|u| u.username == username).cloned())
        }

        fn insert_records(&self, records: &[RemoteRecord]) -> Result<usize, RemoteError> {
            self.insert_calls.set(self.insert_calls.get() + 1);
            if !self.reachable.get() {
                return Err(RemoteError::Unreachable("test remote is down".to_string()));
            }
            self.records.borrow_mut().extend_from_slice(records);
            Ok(records.len())
        }

        fn delete_record(&self, record_id: &str, owner_id: &str) -> Result<bool, RemoteError> {
            if !self.reachable.get() {
                return Err(RemoteError::Unreachable("test remote is down".to_string()));
            }
            let mut records = self.records.borrow_mut();
            let before = records.len();
            records.retain(|r| !(r.record_id == record_id && r.owner_id == owner_id));
            Ok(records.len() < before)
        }
    }
}

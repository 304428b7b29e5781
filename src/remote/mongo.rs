// MongoDB-backed RemoteStore.
//
// Every operation opens its own client with a bounded server-selection
// timeout and drops it when done. Kiosk devices sleep, change networks and
// lose connectivity; a fresh connection per call avoids stale-socket errors
// at the cost of a handshake we can afford at human cadence.

use std::time::Duration;

use mongodb::bson::{doc, oid::ObjectId, Bson, DateTime as BsonDateTime, Document};
use mongodb::options::ClientOptions;
use mongodb::sync::{Client, Database};

use crate::config::RemoteConfig;
use crate::constants::{
    REMOTE_CONNECT_TIMEOUT_SECS, REMOTE_RECORDS_COLLECTION, REMOTE_USERS_COLLECTION,
};

use super::{RemoteError, RemoteRecord, RemoteStore, RemoteUser};

pub struct MongoRemote {
    config: RemoteConfig,
    timeout: Duration,
}

impl MongoRemote {
    pub fn new(config: RemoteConfig, timeout: Duration) -> Self {
        Self { config, timeout }
    }

    /// Open a fresh connection for one operation.
    fn database(&self) -> Result<Database, RemoteError> {
        let uri = self
            .config
            .mongo_uri
            .as_deref()
            .ok_or(RemoteError::NotConfigured)?;

        let mut options =
            ClientOptions::parse(uri).map_err(|e| RemoteError::Unreachable(e.to_string()))?;
        options.server_selection_timeout = Some(self.timeout);
        options.connect_timeout = Some(Duration::from_secs(REMOTE_CONNECT_TIMEOUT_SECS));

        let client =
            Client::with_options(options).map_err(|e| RemoteError::Unreachable(e.to_string()))?;
        Ok(client.database(&self.config.db_name))
    }
}

impl RemoteStore for MongoRemote {
    fn find_user(&self, username: &str) -> Result<Option<RemoteUser>, RemoteError> {
        let db = self.database()?;
        let collection = db.collection::<Document>(REMOTE_USERS_COLLECTION);

        let found = collection
            .find_one(doc! { "username": username }, None)
            .map_err(|e| RemoteError::Unreachable(e.to_string()))?;

        Ok(found.as_ref().and_then(user_from_document))
    }

    fn insert_records(&self, records: &[RemoteRecord]) -> Result<usize, RemoteError> {
        if records.is_empty() {
            return Ok(0);
        }

        let db = self.database()?;
        let collection = db.collection::<Document>(REMOTE_RECORDS_COLLECTION);

        let docs: Vec<Document> = records.iter().map(record_document).collect();
        let result = collection
            .insert_many(docs, None)
            .map_err(|e| RemoteError::Operation(e.to_string()))?;

        Ok(result.inserted_ids.len())
    }

    fn delete_record(&self, record_id: &str, owner_id: &str) -> Result<bool, RemoteError> {
        let db = self.database()?;
        let collection = db.collection::<Document>(REMOTE_RECORDS_COLLECTION);

        let result = collection
            .delete_one(delete_filter(record_id, owner_id), None)
            .map_err(|e| RemoteError::Operation(e.to_string()))?;

        Ok(result.deleted_count > 0)
    }
}

/// Extract a credential from a users document. Rows missing the required
/// fields are treated as absent rather than failing the lookup.
fn user_from_document(doc: &Document) -> Option<RemoteUser> {
    let id = match doc.get("_id")? {
        Bson::ObjectId(oid) => oid.to_hex(),
        Bson::String(s) => s.clone(),
        _ => return None,
    };
    let username = doc.get_str("username").ok()?.to_string();
    let password_hash = doc.get_str("password").ok()?.to_string();
    let email = doc.get_str("email").ok().map(|s| s.to_string());

    Some(RemoteUser {
        id,
        username,
        email,
        password_hash,
    })
}

/// Owner id in the remote's native form when it parses as an ObjectId,
/// plain string otherwise.
fn owner_bson(owner_id: &str) -> Bson {
    match ObjectId::parse_str(owner_id) {
        Ok(oid) => Bson::ObjectId(oid),
        Err(_) => Bson::String(owner_id.to_string()),
    }
}

fn record_document(record: &RemoteRecord) -> Document {
    doc! {
        "ownerId": owner_bson(&record.owner_id),
        "recordId": &record.record_id,
        "shrimpCount": record.shrimp_count,
        "biomass": record.biomass,
        "feedMeasurement": record.feed_measurement,
        "dateTime": BsonDateTime::from_millis(record.created_at.timestamp_millis()),
        "timestamp_str": record.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
    }
}

/// Match by the stable record id plus either representation of the owner id,
/// so documents written before or after an id-form change are still found.
fn delete_filter(record_id: &str, owner_id: &str) -> Document {
    doc! {
        "recordId": record_id,
        "$or": [
            { "ownerId": owner_bson(owner_id) },
            { "ownerId": owner_id },
        ],
    }
}

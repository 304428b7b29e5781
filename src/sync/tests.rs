// Sync engine tests, including the full offline-first scenario.

use rusqlite::Connection;

use super::{DeleteOutcome, SyncEngine};
use crate::auth::AuthGateway;
use crate::db::schema;
use crate::db::{initialize, migrations};
use crate::remote::testing::InMemoryRemote;

fn open_test_db() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    migrations::run_migrations(&conn).unwrap();
    conn
}

// ---------------------------------------------------------------
// sync_owner
// ---------------------------------------------------------------

#[test]
fn test_sync_nothing_pending_skips_remote() {
    let conn = open_test_db();
    let remote = InMemoryRemote::reachable();
    let engine = SyncEngine::new(&conn, &remote);

    assert_eq!(engine.sync_owner("owner-a").unwrap(), 0);
    // The remote must not have been contacted at all
    assert_eq!(remote.insert_calls.get(), 0);
}

#[test]
fn test_sync_pushes_batch_and_marks_synced() {
    let conn = open_test_db();
    schema::insert_record(&conn, "owner-a", 5, 1.256, 0.4).unwrap();
    schema::insert_record(&conn, "owner-a", 12, 3.0, 0.969).unwrap();
    schema::insert_record(&conn, "owner-b", 99, 9.9, 9.9).unwrap();

    let remote = InMemoryRemote::reachable();
    let engine = SyncEngine::new(&conn, &remote);

    assert_eq!(engine.sync_owner("owner-a").unwrap(), 2);

    // One bulk write, rounded metrics, only owner-a's records
    assert_eq!(remote.insert_calls.get(), 1);
    let mirrored = remote.records.borrow();
    assert_eq!(mirrored.len(), 2);
    assert!(mirrored.iter().all(|r| r.owner_id == "owner-a"));
    assert_eq!(mirrored[0].biomass, 1.26);
    assert_eq!(mirrored[1].feed_measurement, 0.97);
    drop(mirrored);

    assert!(schema::unsynced_records_by_owner(&conn, "owner-a")
        .unwrap()
        .is_empty());
    // owner-b untouched
    assert_eq!(
        schema::unsynced_records_by_owner(&conn, "owner-b").unwrap().len(),
        1
    );
}

#[test]
fn test_sync_is_idempotent() {
    let conn = open_test_db();
    schema::insert_record(&conn, "owner-a", 5, 1.0, 0.5).unwrap();
    schema::insert_record(&conn, "owner-a", 7, 2.0, 0.7).unwrap();

    let remote = InMemoryRemote::reachable();
    let engine = SyncEngine::new(&conn, &remote);

    assert_eq!(engine.sync_owner("owner-a").unwrap(), 2);
    assert_eq!(engine.sync_owner("owner-a").unwrap(), 0);

    // Nothing double-submitted: the second call never reached the remote
    assert_eq!(remote.insert_calls.get(), 1);
    assert_eq!(remote.records.borrow().len(), 2);
}

#[test]
fn test_sync_unreachable_leaves_everything_pending() {
    let conn = open_test_db();
    schema::insert_record(&conn, "owner-a", 5, 1.0, 0.5).unwrap();

    let remote = InMemoryRemote::unreachable();
    let engine = SyncEngine::new(&conn, &remote);

    assert_eq!(engine.sync_owner("owner-a").unwrap(), 0);
    assert_eq!(
        schema::unsynced_records_by_owner(&conn, "owner-a").unwrap().len(),
        1
    );

    // Once the link is back, the same batch goes through
    remote.reachable.set(true);
    assert_eq!(engine.sync_owner("owner-a").unwrap(), 1);
    assert_eq!(remote.records.borrow().len(), 1);
}

// ---------------------------------------------------------------
// delete_record
// ---------------------------------------------------------------

#[test]
fn test_delete_unsynced_record_is_local_only() {
    let conn = open_test_db();
    let record = schema::insert_record(&conn, "owner-a", 5, 1.0, 0.5).unwrap();

    let remote = InMemoryRemote::reachable();
    let engine = SyncEngine::new(&conn, &remote);

    assert_eq!(
        engine.delete_record(record.local_id, "owner-a").unwrap(),
        DeleteOutcome::DeletedLocalOnly
    );
    assert!(schema::list_records_by_owner(&conn, "owner-a").unwrap().is_empty());
}

#[test]
fn test_delete_synced_record_removes_remote_mirror() {
    let conn = open_test_db();
    let record = schema::insert_record(&conn, "owner-a", 5, 1.0, 0.5).unwrap();

    let remote = InMemoryRemote::reachable();
    let engine = SyncEngine::new(&conn, &remote);
    engine.sync_owner("owner-a").unwrap();

    assert_eq!(
        engine.delete_record(record.local_id, "owner-a").unwrap(),
        DeleteOutcome::DeletedBoth
    );
    assert!(remote.records.borrow().is_empty());
}

#[test]
fn test_delete_reports_missing_remote_document() {
    let conn = open_test_db();
    let record = schema::insert_record(&conn, "owner-a", 5, 1.0, 0.5).unwrap();

    let remote = InMemoryRemote::reachable();
    let engine = SyncEngine::new(&conn, &remote);
    engine.sync_owner("owner-a").unwrap();

    // Someone else already removed the mirror document
    remote.records.borrow_mut().clear();

    assert_eq!(
        engine.delete_record(record.local_id, "owner-a").unwrap(),
        DeleteOutcome::RemoteMissing
    );
    // Local deletion happened regardless
    assert!(schema::list_records_by_owner(&conn, "owner-a").unwrap().is_empty());
}

#[test]
fn test_delete_remote_failure_never_blocks_local() {
    let conn = open_test_db();
    let record = schema::insert_record(&conn, "owner-a", 5, 1.0, 0.5).unwrap();

    let remote = InMemoryRemote::reachable();
    let engine = SyncEngine::new(&conn, &remote);
    engine.sync_owner("owner-a").unwrap();

    remote.reachable.set(false);
    assert_eq!(
        engine.delete_record(record.local_id, "owner-a").unwrap(),
        DeleteOutcome::RemoteUnreachable
    );
    assert!(schema::list_records_by_owner(&conn, "owner-a").unwrap().is_empty());
}

#[test]
fn test_delete_owner_isolation() {
    let conn = open_test_db();
    let record = schema::insert_record(&conn, "owner-b", 5, 1.0, 0.5).unwrap();

    let remote = InMemoryRemote::reachable();
    let engine = SyncEngine::new(&conn, &remote);

    assert_eq!(
        engine.delete_record(record.local_id, "owner-a").unwrap(),
        DeleteOutcome::NotFound
    );
    assert_eq!(schema::list_records_by_owner(&conn, "owner-b").unwrap().len(), 1);
}

// ---------------------------------------------------------------
// End-to-end: bootstrap, login, measure-save, list, sync, delete
// ---------------------------------------------------------------

#[test]
fn test_offline_first_scenario() {
    let conn = open_test_db();
    initialize(&conn).unwrap();

    let remote = InMemoryRemote::reachable();

    // Bootstrap credential works with the remote up or down
    let user_id = AuthGateway::new(&remote, &conn)
        .verify("admin", "admin")
        .unwrap()
        .expect("seeded admin must authenticate");
    assert_eq!(user_id, "local-admin");

    // Three measurement runs
    for count in [5i64, 12, 0] {
        schema::insert_record(&conn, &user_id, count, count as f64 * 0.25, count as f64 * 0.08)
            .unwrap();
    }

    // Newest first
    let records = schema::list_records_by_owner(&conn, &user_id).unwrap();
    let counts: Vec<i64> = records.iter().map(|r| r.shrimp_count).collect();
    assert_eq!(counts, vec![0, 12, 5]);

    // Sync pushes all three, exactly once
    let engine = SyncEngine::new(&conn, &remote);
    assert_eq!(engine.sync_owner(&user_id).unwrap(), 3);
    assert!(schema::list_records_by_owner(&conn, &user_id)
        .unwrap()
        .iter()
        .all(|r| r.synced));
    assert_eq!(engine.sync_owner(&user_id).unwrap(), 0);
    assert_eq!(remote.records.borrow().len(), 3);

    // Delete the zero-count record; the remote mirror goes with it
    let zero_record = schema::list_records_by_owner(&conn, &user_id)
        .unwrap()
        .into_iter()
        .find(|r| r.shrimp_count == 0)
        .unwrap();
    assert_eq!(
        engine.delete_record(zero_record.local_id, &user_id).unwrap(),
        DeleteOutcome::DeletedBoth
    );

    let remaining = schema::list_records_by_owner(&conn, &user_id).unwrap();
    assert_eq!(remaining.len(), 2);
    assert_eq!(remote.records.borrow().len(), 2);
}

use breadflow::runtime::record::MemoryRecord;
use breadflow::runtime::storage::{InMemoryRecordStore, JsonDirRecordStore, RecordStore};
use chrono::{Duration, Utc};
use serde_json::json;
use tempfile::tempdir;

fn records() -> (MemoryRecord, MemoryRecord, MemoryRecord, MemoryRecord) {
    let now = Utc::now();
    let mut older = MemoryRecord::new("orders").with_field("amount", 10);
    older.started = Some(now - Duration::hours(2));
    let mut newer = MemoryRecord::new("orders").with_field("approve", json!(null));
    newer.started = Some(now - Duration::hours(1));
    let mut finished = MemoryRecord::new("orders");
    finished.completed = Some(now);
    let other = MemoryRecord::new("invoices");
    (older, newer, finished, other)
}

async fn check_store(store: &dyn RecordStore) {
    let (older, newer, finished, other) = records();
    for record in [&newer, &finished, &other, &older] {
        store.save(record).await.unwrap();
    }

    assert_eq!(store.load(older.id).await.unwrap(), Some(older.clone()));
    assert_eq!(store.load(uuid::Uuid::new_v4()).await.unwrap(), None);

    let open: Vec<_> = store
        .list_open("orders")
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(open, vec![older.id, newer.id]);

    // saving again replaces the record
    let mut cancelled = newer.clone();
    cancelled.cancelled = Some(Utc::now());
    store.save(&cancelled).await.unwrap();
    let open = store.list_open("orders").await.unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].id, older.id);
}

#[tokio::test]
async fn test_in_memory_store() {
    let store = InMemoryRecordStore::new();
    assert!(store.is_empty());
    check_store(&store).await;
    assert_eq!(store.len(), 4);
}

#[tokio::test]
async fn test_json_dir_store() {
    let dir = tempdir().unwrap();
    let store = JsonDirRecordStore::open(dir.path().join("records")).await.unwrap();
    check_store(&store).await;

    let files = std::fs::read_dir(dir.path().join("records")).unwrap().count();
    assert_eq!(files, 4);
}

#[tokio::test]
async fn test_json_dir_store_skips_corrupt_records_when_listing() {
    let dir = tempdir().unwrap();
    let store = JsonDirRecordStore::open(dir.path()).await.unwrap();
    let id = uuid::Uuid::new_v4();
    std::fs::write(dir.path().join(format!("{}.json", id)), "{ not json").unwrap();
    let open = MemoryRecord::new("orders");
    store.save(&open).await.unwrap();

    // loading the broken record itself still fails
    assert!(store.load(id).await.is_err());

    let listed = store.list_open("orders").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, open.id);
}

use super::*;
use anyhow::anyhow;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use shared::CommandType;
use storage::MemoryKvStore;

fn scene(name: &str) -> Command {
    Command::new(
        CommandType::SetCurrentProgramScene,
        params(json!({ "sceneName": name })),
        format!("Switch to scene \"{name}\""),
    )
}

fn params(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

fn store() -> (Arc<MemoryKvStore>, CommandHistoryStore) {
    let storage = Arc::new(MemoryKvStore::new());
    let history = CommandHistoryStore::new(Arc::clone(&storage) as Arc<dyn KeyValueStore>);
    (storage, history)
}

struct FailingStore;

#[async_trait]
impl KeyValueStore for FailingStore {
    async fn get(&self, _key: &str) -> anyhow::Result<Option<String>> {
        Err(anyhow!("disk unavailable"))
    }

    async fn set(&self, _key: &str, _value: &str) -> anyhow::Result<()> {
        Err(anyhow!("disk unavailable"))
    }

    async fn remove(&self, _key: &str) -> anyhow::Result<()> {
        Err(anyhow!("disk unavailable"))
    }
}

#[tokio::test]
async fn first_execution_creates_item() {
    let (_, history) = store();
    let item = history.add_execution(&scene("Main")).await;

    assert_eq!(item.use_count, 1);
    assert_eq!(item.session_count, 1);
    assert_eq!(item.first_used, item.last_used);
    assert_eq!(item.description(), "Switch to scene \"Main\"");
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn key_order_does_not_split_identity() {
    let (_, history) = store();
    let a = Command::new(
        CommandType::SetSceneItemEnabled,
        params(json!({ "sceneName": "Main", "sceneItemId": 3, "sceneItemEnabled": true })),
        "Show scene item in \"Main\"",
    );
    let mut reordered = Map::new();
    reordered.insert("sceneItemEnabled".into(), json!(true));
    reordered.insert("sceneItemId".into(), json!(3));
    reordered.insert("sceneName".into(), json!("Main"));
    let b = Command::new(
        CommandType::SetSceneItemEnabled,
        reordered,
        "Show scene item in \"Main\"",
    );

    history.add_execution(&a).await;
    let item = history.add_execution(&b).await;

    assert_eq!(history.len(), 1);
    assert_eq!(item.use_count, 2);
    assert_eq!(item.session_count, 2);
}

#[tokio::test]
async fn executions_are_persisted_under_the_history_key() {
    let (storage, history) = store();
    history.add_execution(&scene("Main")).await;

    let raw = storage
        .get(HISTORY_STORAGE_KEY)
        .await
        .expect("get")
        .expect("persisted");
    let items: Vec<CommandHistoryItem> = serde_json::from_str(&raw).expect("decode");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, scene("Main").canonical_id());

    let on_disk: Value = serde_json::from_str(&raw).expect("json");
    assert!(on_disk[0]["lastUsed"].is_string());
    assert_eq!(on_disk[0]["useCount"], json!(1));
}

#[tokio::test]
async fn ranking_queries_respect_limit_and_do_not_mutate() {
    let (_, history) = store();
    history.add_execution(&scene("A")).await;
    for _ in 0..3 {
        history.add_execution(&scene("B")).await;
    }
    history.add_execution(&scene("C")).await;
    history.add_execution(&scene("C")).await;

    let before = history.items();
    let frequent = history.get_frequent(2);
    assert_eq!(frequent.len(), 2);
    assert_eq!(frequent[0].command, scene("B"));
    assert_eq!(frequent[1].command, scene("C"));

    let recent = history.get_recent(10);
    assert_eq!(recent.len(), 3);
    assert_eq!(recent[0].command, scene("C"));

    assert!(history.get_frequent(0).is_empty());
    assert_eq!(history.items(), before);
}

#[tokio::test]
async fn frequent_ties_keep_insertion_order() {
    let (_, history) = store();
    history.add_execution(&scene("First")).await;
    history.add_execution(&scene("Second")).await;

    let frequent = history.get_frequent(5);
    assert_eq!(frequent[0].command, scene("First"));
    assert_eq!(frequent[1].command, scene("Second"));
}

#[tokio::test]
async fn load_starts_a_new_session() {
    let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryKvStore::new());
    let previous = CommandHistoryStore::new(Arc::clone(&storage));
    previous.add_execution(&scene("Main")).await;
    previous.add_execution(&scene("Main")).await;

    let current = CommandHistoryStore::new(storage);
    assert_eq!(current.load().await, 1);

    let item = current.get(&scene("Main").canonical_id()).expect("item");
    assert_eq!(item.use_count, 2);
    assert_eq!(item.session_count, 0);
    assert_eq!(current.total_lifetime_executions(), 2);
    assert_eq!(current.session_executions(), 0);
}

#[tokio::test]
async fn load_after_clear_all_is_empty() {
    let (storage, history) = store();
    history.add_execution(&scene("Main")).await;
    history.clear_all().await;
    assert!(history.is_empty());
    assert_eq!(storage.get(HISTORY_STORAGE_KEY).await.expect("get"), None);

    assert_eq!(history.load().await, 0);
    assert!(history.is_empty());
}

#[tokio::test]
async fn clear_session_counts_keeps_lifetime_totals() {
    let (storage, history) = store();
    history.add_execution(&scene("A")).await;
    history.add_execution(&scene("B")).await;
    history.clear_session_counts().await;

    assert_eq!(history.session_executions(), 0);
    assert_eq!(history.total_lifetime_executions(), 2);

    let raw = storage
        .get(HISTORY_STORAGE_KEY)
        .await
        .expect("get")
        .expect("persisted");
    let items: Vec<CommandHistoryItem> = serde_json::from_str(&raw).expect("decode");
    assert!(items.iter().all(|item| item.session_count == 0));
}

#[tokio::test]
async fn corrupt_storage_yields_empty_catalog() {
    let (storage, history) = store();
    storage
        .set(HISTORY_STORAGE_KEY, "{not json")
        .await
        .expect("set");
    assert_eq!(history.load().await, 0);
}

#[tokio::test]
async fn legacy_duplicates_are_merged_on_load() {
    let (storage, history) = store();
    let legacy = json!([
        {
            "id": "SetCurrentProgramScene-{\"sceneName\":\"Main\"}",
            "command": {
                "type": "SetCurrentProgramScene",
                "params": { "sceneName": "Main" },
                "description": "Switch to scene \"Main\""
            },
            "lastUsed": "2024-01-01T10:00:00Z",
            "useCount": 2
        },
        {
            "id": "StartStream-{}",
            "command": { "type": "StartStream", "params": {}, "description": "Start streaming" },
            "lastUsed": "2024-01-03T10:00:00Z",
            "useCount": 1
        },
        {
            "id": "legacy-id",
            "command": {
                "type": "SetCurrentProgramScene",
                "params": { "sceneName": "Main" },
                "description": "Switch to scene \"Main\""
            },
            "firstUsed": "2023-12-01T10:00:00Z",
            "lastUsed": "2024-01-02T10:00:00Z",
            "useCount": 3
        }
    ]);
    storage
        .set(HISTORY_STORAGE_KEY, &legacy.to_string())
        .await
        .expect("set");

    assert_eq!(history.load().await, 2);
    let items = history.items();
    assert_eq!(items[0].id, scene("Main").canonical_id());
    assert_eq!(items[0].use_count, 5);
    assert_eq!(items[0].first_used.to_rfc3339(), "2023-12-01T10:00:00+00:00");
    assert_eq!(items[0].last_used.to_rfc3339(), "2024-01-02T10:00:00+00:00");
    assert_eq!(items[1].first_used, items[1].last_used);
}

#[tokio::test]
async fn storage_failures_do_not_lose_in_memory_state() {
    let history = CommandHistoryStore::new(Arc::new(FailingStore));
    assert_eq!(history.load().await, 0);

    history.add_execution(&scene("Main")).await;
    history.add_execution(&scene("Main")).await;
    assert_eq!(history.total_lifetime_executions(), 2);

    history.clear_all().await;
    assert!(history.is_empty());
}

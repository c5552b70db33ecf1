use storage::{KeyValueStore, SqliteKvStore};

#[tokio::test]
async fn values_survive_reopening_the_database() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("kv.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    {
        let store = SqliteKvStore::new(&database_url).await.expect("open");
        store
            .set("obs-listener-command-history", "[]")
            .await
            .expect("set");
        store.pool().close().await;
    }

    let reopened = SqliteKvStore::new(&database_url).await.expect("reopen");
    assert_eq!(
        reopened
            .get("obs-listener-command-history")
            .await
            .expect("get")
            .as_deref(),
        Some("[]")
    );
}

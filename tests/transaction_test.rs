use tempfile::TempDir;
use xdatabase::{DatabaseType, DbClient, DbError, Param, Statement};

async fn sqlite_client() -> (DbClient, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}", dir.path().join("tx.db").display());
    let mut client = DbClient::new(DatabaseType::SQLite);
    client.set_connection_string(&url).await.unwrap();
    client
        .execute("CREATE TABLE items (id INTEGER PRIMARY KEY, label TEXT)", &[])
        .await
        .unwrap();
    (client, dir)
}

async fn count(client: &mut DbClient) -> i64 {
    client
        .select_cell("SELECT COUNT(*) FROM items", &[])
        .await
        .unwrap()
}

#[tokio::test]
async fn test_begin_without_connection_string() {
    let mut client = DbClient::new(DatabaseType::SQLite);
    let err = client.begin_transaction().await.unwrap_err();
    assert!(matches!(err, DbError::NotConfigured));
    assert!(!client.is_in_transaction());
    assert!(!client.is_connection_active());
}

#[tokio::test]
async fn test_commit_and_rollback_without_transaction() {
    let (mut client, _dir) = sqlite_client().await;

    let err = client.commit_transaction().await.unwrap_err();
    assert!(matches!(err, DbError::NoActiveTransaction));
    assert!(client.last_error().is_some());

    let err = client.rollback_transaction().await.unwrap_err();
    assert!(matches!(err, DbError::NoActiveTransaction));
}

#[tokio::test]
async fn test_commit_persists_inserts() {
    let (mut client, _dir) = sqlite_client().await;
    let before = count(&mut client).await;

    client.begin_transaction().await.unwrap();
    assert!(client.is_in_transaction());
    assert!(client.is_connection_active());

    for i in 0..5 {
        client
            .insert(
                "INSERT INTO items (label) VALUES (@label)",
                &[Param::named("@label", format!("item {}", i))],
            )
            .await
            .unwrap();
        // The connection stays open for the whole transaction
        assert!(client.is_connection_active());
    }

    client.commit_transaction().await.unwrap();
    assert!(!client.is_in_transaction());
    assert!(!client.is_connection_active());

    assert_eq!(count(&mut client).await, before + 5);
}

#[tokio::test]
async fn test_rollback_discards_inserts() {
    let (mut client, _dir) = sqlite_client().await;
    let before = count(&mut client).await;

    client.begin_transaction().await.unwrap();
    client
        .insert("INSERT INTO items (label) VALUES ('temp')", &[])
        .await
        .unwrap();
    assert_eq!(count(&mut client).await, before + 1);

    client.rollback_transaction().await.unwrap();
    assert!(!client.is_connection_active());
    assert_eq!(count(&mut client).await, before);
}

#[tokio::test]
async fn test_keep_open_survives_commit() {
    let (mut client, _dir) = sqlite_client().await;
    client.set_keep_open(true);

    client.begin_transaction().await.unwrap();
    client
        .insert("INSERT INTO items (label) VALUES ('kept')", &[])
        .await
        .unwrap();
    client.commit_transaction().await.unwrap();

    assert!(client.is_connection_active());
    assert!(!client.is_in_transaction());
}

#[tokio::test]
async fn test_close_is_suppressed_during_transaction() {
    let (mut client, _dir) = sqlite_client().await;

    client.begin_transaction().await.unwrap();
    client
        .insert("INSERT INTO items (label) VALUES ('x')", &[])
        .await
        .unwrap();

    client.close().await.unwrap();
    assert!(client.is_connection_active());
    assert!(client.is_in_transaction());

    client.commit_transaction().await.unwrap();
    assert_eq!(count(&mut client).await, 1);
}

#[tokio::test]
async fn test_nested_begin_is_rejected() {
    let (mut client, _dir) = sqlite_client().await;

    client.begin_transaction().await.unwrap();
    let err = client.begin_transaction().await.unwrap_err();
    assert!(matches!(err, DbError::TransactionActive));
    assert!(client.is_in_transaction());

    client.rollback_transaction().await.unwrap();
}

#[tokio::test]
async fn test_failed_statement_keeps_transaction_open() {
    let (mut client, _dir) = sqlite_client().await;

    client.begin_transaction().await.unwrap();
    client
        .insert("INSERT INTO items (label) VALUES ('a')", &[])
        .await
        .unwrap();
    assert!(client.insert("INSERT INTO nowhere VALUES (1)", &[]).await.is_err());
    assert!(client.is_in_transaction());

    client.commit_transaction().await.unwrap();
    assert_eq!(count(&mut client).await, 1);
}

#[tokio::test]
async fn test_batch_joins_user_transaction() {
    let (mut client, _dir) = sqlite_client().await;

    client.begin_transaction().await.unwrap();
    let total = client
        .execute_batch(&[
            Statement::new("INSERT INTO items (label) VALUES ('b1')"),
            Statement::new("INSERT INTO items (label) VALUES ('b2')"),
        ])
        .await
        .unwrap();
    assert_eq!(total, 2);
    assert!(client.is_in_transaction());

    client.rollback_transaction().await.unwrap();
    assert_eq!(count(&mut client).await, 0);
}

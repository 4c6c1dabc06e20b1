mod common;

use common::{init_tracing, people_db, Person, Pet};
use entity_store::{col, Database, Direction, StoreConfig, StoreError};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::ConnectOptions;

#[tokio::test]
async fn commit_makes_writes_visible() {
    let mut db = people_db().await;
    let mut tx = db.begin().await.unwrap();
    let owner = tx.insert(&Person::new("Ana", 30)).await.unwrap();
    tx.insert(&Pet::new("Rex", owner)).await.unwrap();
    assert!(tx.exists::<Person>(&owner).await.unwrap());
    tx.commit().await.unwrap();

    let query = db.query::<Pet>().build().unwrap();
    assert_eq!(db.fetch_all(query).await.unwrap().len(), 1);
}

#[tokio::test]
async fn rollback_discards_writes() {
    let mut db = people_db().await;
    let mut tx = db.begin().await.unwrap();
    let id = tx.insert(&Person::new("Ana", 30)).await.unwrap();
    tx.rollback().await.unwrap();
    assert!(!db.exists::<Person>(&id).await.unwrap());
}

#[tokio::test]
async fn dropped_transaction_rolls_back() {
    let mut db = people_db().await;
    let id = {
        let mut tx = db.begin().await.unwrap();
        tx.insert(&Person::new("Ana", 30)).await.unwrap()
    };
    assert!(db.find::<Person>(&id).await.unwrap().is_none());
}

#[tokio::test]
async fn nested_begin_is_refused() {
    let mut db = people_db().await;
    let mut tx = db.begin().await.unwrap();
    let id = tx.insert(&Person::new("Ana", 30)).await.unwrap();
    assert!(matches!(tx.begin(), Err(StoreError::TransactionConflict)));
    // The outer transaction is still usable.
    assert_eq!(tx.get::<Person>(&id).await.unwrap().name, "Ana");
    tx.commit().await.unwrap();
    assert!(db.exists::<Person>(&id).await.unwrap());
}

#[tokio::test]
async fn queries_run_inside_transaction() {
    let mut db = people_db().await;
    let mut tx = db.begin().await.unwrap();
    tx.insert_many(&[Person::new("Ana", 30), Person::new("Bo", 20)]).await.unwrap();
    let query = tx.query::<Person>().order_by(col("age"), Direction::Asc).build().unwrap();
    let people = tx.fetch_all(query).await.unwrap();
    assert_eq!(people[0].name, "Bo");
    let query = tx.query::<Person>().filter(col("age").gt(25)).build().unwrap();
    assert_eq!(tx.count(query).await.unwrap(), 1);
    tx.rollback().await.unwrap();
}

#[tokio::test]
async fn write_lock_contention_is_retryable() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("locked.db");
    let mut holder = SqliteConnectOptions::new()
        .filename(&path)
        .create_if_missing(true)
        .connect()
        .await
        .unwrap();
    sqlx::query("BEGIN IMMEDIATE").execute(&mut holder).await.unwrap();

    let config = StoreConfig {
        busy_timeout_ms: 0,
        ..StoreConfig::file(&path)
    };
    let mut db = Database::open(&config).await.unwrap();
    let err = db.register::<Person>().await.unwrap_err();
    assert!(matches!(err, StoreError::Engine(_)));
    assert!(err.is_retryable());

    sqlx::query("ROLLBACK").execute(&mut holder).await.unwrap();
    db.register::<Person>().await.unwrap();
}

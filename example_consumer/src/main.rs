//! Example consumer: registers two record types, runs the CRUD lifecycle and a join query.
//!
//! Run from repo root: `cargo run -p example-consumer`
//! Point `ENTITY_STORE_URL` at a file (e.g. `sqlite://people.db`) to keep the data.

use entity_store::{col, col_of, DataType, Database, Direction, Field, Record, StoreConfig, StoreError};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
struct Person {
    id: Option<Uuid>,
    name: String,
    age: i32,
}

impl Record for Person {
    const NAMESPACE: &'static str = "demo";
    const NAME: &'static str = "person";
    fn fields() -> Vec<Field> {
        vec![Field::new("name", DataType::String), Field::new("age", DataType::Int32)]
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Pet {
    id: Option<Uuid>,
    name: String,
    owner: Option<Uuid>,
}

impl Record for Pet {
    const NAMESPACE: &'static str = "demo";
    const NAME: &'static str = "pet";
    fn fields() -> Vec<Field> {
        vec![Field::new("name", DataType::String), Field::reference::<Person>("owner")]
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("entity_store=info")),
        )
        .init();

    let config = StoreConfig::from_env()?;
    let mut db = Database::open(&config).await?;
    db.register::<Person>().await?;
    db.register::<Pet>().await?;

    let ana = db
        .insert(&Person {
            id: None,
            name: "Ana".into(),
            age: 30,
        })
        .await?;
    let mut person: Person = db.get(&ana).await?;
    tracing::info!(?person, "inserted");
    person.age = 31;
    db.update(&person).await?;
    tracing::info!(age = db.get::<Person>(&ana).await?.age, "updated");

    let bo = db
        .insert(&Person {
            id: None,
            name: "Bo".into(),
            age: 24,
        })
        .await?;
    for (name, owner) in [("Rex", ana), ("Fido", ana), ("Tom", bo)] {
        db.insert(&Pet {
            id: None,
            name: name.into(),
            owner: Some(owner),
        })
        .await?;
    }

    let query = db
        .query::<Pet>()
        .join::<Person>()
        .filter(col_of::<Person>("age").gt(30))
        .order_by(col_of::<Pet>("name"), Direction::Asc)
        .build()?;
    tracing::info!(sql = %query.to_sql(), "join query");
    let mut rows = db.fetch(query);
    while let Some(pet) = rows.try_next().await? {
        tracing::info!(pet = %pet.name, "owned by someone over 30");
    }
    drop(rows);

    let adults = db.query::<Person>().filter(col("age").gte(18)).build()?;
    tracing::info!(count = db.count(adults).await?, "adults");

    let pets = db.query::<Pet>().filter(col("owner").eq(ana.to_string())).build()?;
    let pets: Vec<Uuid> = db.fetch_all(pets).await?.into_iter().filter_map(|p| p.id).collect();
    db.remove_many::<Pet>(&pets).await?;
    db.remove::<Person>(&ana).await?;
    match db.get::<Person>(&ana).await {
        Err(StoreError::NotFound(what)) => tracing::info!(%what, "removed"),
        other => tracing::warn!(?other, "expected NotFound"),
    }

    db.close().await?;
    Ok(())
}

#![allow(dead_code)]

use entity_store::{DataType, Database, Field, Record, SequentialIds};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("entity_store=debug")),
        )
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: Option<Uuid>,
    pub name: String,
    pub age: i32,
}

impl Person {
    pub fn new(name: &str, age: i32) -> Self {
        Self {
            id: None,
            name: name.into(),
            age,
        }
    }
}

impl Record for Person {
    const NAMESPACE: &'static str = "people";
    const NAME: &'static str = "person";
    fn fields() -> Vec<Field> {
        vec![Field::new("name", DataType::String), Field::new("age", DataType::Int32)]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pet {
    pub id: Option<Uuid>,
    pub name: String,
    pub owner: Option<Uuid>,
}

impl Pet {
    pub fn new(name: &str, owner: Uuid) -> Self {
        Self {
            id: None,
            name: name.into(),
            owner: Some(owner),
        }
    }
}

impl Record for Pet {
    const NAMESPACE: &'static str = "people";
    const NAME: &'static str = "pet";
    fn fields() -> Vec<Field> {
        vec![Field::new("name", DataType::String), Field::reference::<Person>("owner")]
    }
}

/// Unrelated to Person and Pet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: Option<Uuid>,
    pub label: String,
}

impl Record for Tag {
    const NAMESPACE: &'static str = "people";
    const NAME: &'static str = "tag";
    fn fields() -> Vec<Field> {
        vec![Field::new("label", DataType::String)]
    }
}

pub async fn people_db() -> Database {
    init_tracing();
    let mut db = Database::in_memory()
        .await
        .unwrap()
        .with_id_generator(SequentialIds::default());
    db.register::<Person>().await.unwrap();
    db.register::<Pet>().await.unwrap();
    db.register::<Tag>().await.unwrap();
    db
}

pub async fn seed_people(db: &mut Database, names: &[(&str, i32)]) -> Vec<Uuid> {
    let people: Vec<Person> = names.iter().map(|(n, a)| Person::new(n, *a)).collect();
    db.insert_many(&people).await.unwrap()
}

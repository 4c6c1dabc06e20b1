mod common;

use common::{people_db, seed_people, Person, Pet, Tag};
use entity_store::{col, col_of, Direction, Predicate, StoreError};
use futures::StreamExt;

#[tokio::test]
async fn limit_and_offset_page_in_order() {
    let mut db = people_db().await;
    seed_people(&mut db, &[("Ana", 30), ("Bo", 20), ("Cy", 40), ("Dee", 50), ("Eve", 10)]).await;
    let query = db
        .query::<Person>()
        .order_by(col("age"), Direction::Asc)
        .limit(2)
        .offset(1)
        .build()
        .unwrap();
    let page = db.fetch_all(query).await.unwrap();
    let names: Vec<&str> = page.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Bo", "Ana"]);
}

#[tokio::test]
async fn offset_alone_skips_rows() {
    let mut db = people_db().await;
    seed_people(&mut db, &[("Ana", 30), ("Bo", 20), ("Cy", 40)]).await;
    let query = db
        .query::<Person>()
        .order_by(col("name"), Direction::Desc)
        .offset(1)
        .build()
        .unwrap();
    let names: Vec<String> = db.fetch_all(query).await.unwrap().into_iter().map(|p| p.name).collect();
    assert_eq!(names, vec!["Bo", "Ana"]);
}

#[tokio::test]
async fn filters_combine() {
    let mut db = people_db().await;
    seed_people(&mut db, &[("Ana", 30), ("Bo", 20), ("Cy", 40), ("Dee", 50)]).await;

    let query = db
        .query::<Person>()
        .filter(col("age").gte(30))
        .filter(col("name").ne("Dee"))
        .order_by(col("name"), Direction::Asc)
        .build()
        .unwrap();
    let names: Vec<String> = db.fetch_all(query).await.unwrap().into_iter().map(|p| p.name).collect();
    assert_eq!(names, vec!["Ana", "Cy"]);

    let query = db
        .query::<Person>()
        .filter(Predicate::any([col("age").lt(25), col("name").like("D%")]))
        .order_by(col("age"), Direction::Asc)
        .build()
        .unwrap();
    let names: Vec<String> = db.fetch_all(query).await.unwrap().into_iter().map(|p| p.name).collect();
    assert_eq!(names, vec!["Bo", "Dee"]);

    let query = db
        .query::<Person>()
        .filter(col("age").between(20, 40))
        .filter(col("name").is_in(["Ana", "Bo", "Zed"]).not())
        .build()
        .unwrap();
    let names: Vec<String> = db.fetch_all(query).await.unwrap().into_iter().map(|p| p.name).collect();
    assert_eq!(names, vec!["Cy"]);
}

#[tokio::test]
async fn rows_stream_lazily_in_order() {
    let mut db = people_db().await;
    seed_people(&mut db, &[("Ana", 30), ("Bo", 20), ("Cy", 40)]).await;
    let query = db.query::<Person>().order_by(col("age"), Direction::Desc).build().unwrap();
    let mut rows = db.fetch(query);
    let first = rows.next().await.unwrap().unwrap();
    assert_eq!(first.name, "Cy");
    let rest: Vec<Person> = rows.map(|r| r.unwrap()).collect().await;
    assert_eq!(rest.len(), 2);
    assert_eq!(rest[1].name, "Bo");

    // The cursor is released once the stream is dropped.
    assert_eq!(db.get::<Person>(&first.id.unwrap()).await.unwrap().name, "Cy");
}

#[tokio::test]
async fn count_ignores_pagination() {
    let mut db = people_db().await;
    seed_people(&mut db, &[("Ana", 30), ("Bo", 20), ("Cy", 40)]).await;
    let query = db
        .query::<Person>()
        .filter(col("age").gt(25))
        .limit(1)
        .build()
        .unwrap();
    assert_eq!(db.count(query).await.unwrap(), 2);
}

#[tokio::test]
async fn join_filters_on_related_table() {
    let mut db = people_db().await;
    let ids = seed_people(&mut db, &[("Ana", 30), ("Bo", 20)]).await;
    db.insert_many(&[Pet::new("Rex", ids[0]), Pet::new("Tom", ids[1]), Pet::new("Fido", ids[0])])
        .await
        .unwrap();

    let query = db
        .query::<Pet>()
        .join::<Person>()
        .filter(col_of::<Person>("name").eq("Ana"))
        .order_by(col_of::<Pet>("name"), Direction::Asc)
        .build()
        .unwrap();
    let pets: Vec<String> = db.fetch_all(query).await.unwrap().into_iter().map(|p| p.name).collect();
    assert_eq!(pets, vec!["Fido", "Rex"]);

    let owners = db
        .query::<Person>()
        .join::<Pet>()
        .filter(col("age").gt(25))
        .distinct()
        .build()
        .unwrap();
    let owners = db.fetch_all(owners).await.unwrap();
    assert_eq!(owners.len(), 1);
    assert_eq!(owners[0].name, "Ana");
}

#[tokio::test]
async fn undeclared_relation_fails_before_execution() {
    let db = people_db().await;
    let err = db.query::<Pet>().join::<Tag>().build().err().unwrap();
    assert!(matches!(err, StoreError::NoSuchRelation { .. }));
}

#[tokio::test]
async fn shared_column_name_needs_qualification() {
    let db = people_db().await;
    let err = db
        .query::<Pet>()
        .join::<Person>()
        .filter(col("name").eq("Rex"))
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, StoreError::AmbiguousColumn { .. }));

    assert!(db
        .query::<Pet>()
        .join::<Person>()
        .filter(col_of::<Pet>("name").eq("Rex"))
        .build()
        .is_ok());
}

#[tokio::test]
async fn unknown_column_and_bad_value_fail_at_build() {
    let db = people_db().await;
    assert!(matches!(
        db.query::<Person>().filter(col("email").is_null()).build(),
        Err(StoreError::InvalidColumn(_))
    ));
    assert!(matches!(
        db.query::<Person>().filter(col("age").eq("thirty")).build(),
        Err(StoreError::TypeMismatch { .. })
    ));
    assert!(matches!(
        db.query::<Person>().filter(col("id").eq("not-a-uuid")).build(),
        Err(StoreError::MalformedId(_))
    ));
}

use crate::error::StoreError;
use crate::ids::IdGenerator;
use crate::query::{Query, QueryBuilder};
use crate::schema::{Record, Registry};
use crate::store::{crud, Rows};
use sqlx::{Sqlite, Transaction};
use uuid::Uuid;

/// Explicit transaction over a [`Database`](crate::Database). Dropping it without `commit`
/// rolls back.
pub struct StoreTransaction<'a> {
    tx: Transaction<'a, Sqlite>,
    registry: &'a Registry,
    ids: &'a dyn IdGenerator,
    active: Option<String>,
}

impl<'a> StoreTransaction<'a> {
    pub(crate) fn new(tx: Transaction<'a, Sqlite>, registry: &'a Registry, ids: &'a dyn IdGenerator) -> Self {
        Self {
            tx,
            registry,
            ids,
            active: None,
        }
    }

    pub fn registry(&self) -> &Registry {
        self.registry
    }

    /// Transactions do not nest; this always fails with `TransactionConflict`.
    pub fn begin(&mut self) -> Result<(), StoreError> {
        tracing::warn!("nested transaction refused");
        Err(StoreError::TransactionConflict)
    }

    pub async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    pub async fn rollback(self) -> Result<(), StoreError> {
        tracing::warn!("transaction rolled back");
        self.tx.rollback().await?;
        Ok(())
    }

    pub async fn insert<T: Record>(&mut self, record: &T) -> Result<Uuid, StoreError> {
        let schema = self.registry.resolve::<T>()?;
        crud::insert(&mut self.tx, &schema, self.ids, record).await
    }

    pub async fn insert_many<T: Record>(&mut self, records: &[T]) -> Result<Vec<Uuid>, StoreError> {
        let schema = self.registry.resolve::<T>()?;
        let mut out = Vec::with_capacity(records.len());
        for record in records {
            out.push(crud::insert(&mut self.tx, &schema, self.ids, record).await?);
        }
        Ok(out)
    }

    pub async fn get<T: Record>(&mut self, id: &Uuid) -> Result<T, StoreError> {
        let schema = self.registry.resolve::<T>()?;
        crud::get(&mut self.tx, &schema, id).await
    }

    pub async fn find<T: Record>(&mut self, id: &Uuid) -> Result<Option<T>, StoreError> {
        let schema = self.registry.resolve::<T>()?;
        crud::find(&mut self.tx, &schema, id).await
    }

    pub async fn update<T: Record>(&mut self, record: &T) -> Result<(), StoreError> {
        let schema = self.registry.resolve::<T>()?;
        crud::update(&mut self.tx, &schema, record).await
    }

    pub async fn update_many<T: Record>(&mut self, records: &[T]) -> Result<(), StoreError> {
        let schema = self.registry.resolve::<T>()?;
        for record in records {
            crud::update(&mut self.tx, &schema, record).await?;
        }
        Ok(())
    }

    pub async fn remove<T: Record>(&mut self, id: &Uuid) -> Result<(), StoreError> {
        let schema = self.registry.resolve::<T>()?;
        crud::remove(&mut self.tx, &schema, id).await
    }

    pub async fn remove_many<T: Record>(&mut self, ids: &[Uuid]) -> Result<(), StoreError> {
        let schema = self.registry.resolve::<T>()?;
        for id in ids {
            crud::remove(&mut self.tx, &schema, id).await?;
        }
        Ok(())
    }

    pub async fn exists<T: Record>(&mut self, id: &Uuid) -> Result<bool, StoreError> {
        let schema = self.registry.resolve::<T>()?;
        crud::exists(&mut self.tx, &schema, id).await
    }

    pub fn query<T: Record>(&self) -> QueryBuilder<'a, T> {
        QueryBuilder::new(self.registry)
    }

    pub fn fetch<T: Record>(&mut self, query: Query<T>) -> Rows<'_, T> {
        let (root, stmt) = query.into_parts();
        let Self { tx, active, .. } = self;
        crud::stream(tx, active, root, stmt)
    }

    pub async fn fetch_all<T: Record>(&mut self, query: Query<T>) -> Result<Vec<T>, StoreError> {
        self.fetch(query).collect_all().await
    }

    pub async fn count<T: Record>(&mut self, query: Query<T>) -> Result<u64, StoreError> {
        let (root, stmt) = query.into_count_parts();
        crud::count(&mut self.tx, &root, stmt).await
    }
}

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::ids::{IdGenerator, RandomIds};
use crate::migration::bind_table;
use crate::query::{Query, QueryBuilder};
use crate::schema::{Record, Registry, Schema};
use crate::store::{catalog, crud, Rows, StoreTransaction};
use sqlx::{ConnectOptions, Connection, SqliteConnection};
use std::sync::Arc;
use uuid::Uuid;

/// Handle to one embedded database file (or in-memory database) and the types registered on it.
///
/// Owns a single connection. Every method takes `&mut self`, so calls run one at a time, and a
/// [`Rows`] stream or [`StoreTransaction`] keeps the handle borrowed until it is dropped.
pub struct Database {
    conn: SqliteConnection,
    registry: Registry,
    ids: Box<dyn IdGenerator>,
    active: Option<String>,
}

impl Database {
    pub async fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        let conn = config.connect_options()?.connect().await?;
        tracing::info!(url = %config.url, foreign_keys = config.foreign_keys, "database opened");
        Ok(Self {
            conn,
            registry: Registry::new(),
            ids: Box::new(RandomIds),
            active: None,
        })
    }

    pub async fn in_memory() -> Result<Self, StoreError> {
        Self::open(&StoreConfig::in_memory()).await
    }

    /// Replace the id source used for records inserted without an id.
    pub fn with_id_generator(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Box::new(ids);
        self
    }

    pub async fn close(self) -> Result<(), StoreError> {
        self.conn.close().await?;
        Ok(())
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Forget every in-memory registration. Tables and catalog rows stay in the file.
    pub fn reset_registry(&mut self) {
        self.registry.reset();
    }

    /// Register `T` and bind it to its table, creating the table on first use.
    ///
    /// Fails with `SchemaConflict` when the file already holds a different layout under the same
    /// table name. The in-memory registration only happens once the table is bound.
    pub async fn register<T: Record>(&mut self) -> Result<Arc<Schema>, StoreError> {
        let schema = self.registry.prepare(&T::descriptor())?;
        let mut tx = self.conn.begin().await?;
        bind_table(&mut tx, &schema).await?;
        tx.commit().await?;
        let schema = self.registry.insert(schema);
        self.registry.bind_type::<T>(schema.clone());
        tracing::info!(table = %schema.table_name, columns = schema.columns.len(), "registered");
        Ok(schema)
    }

    /// Schemas recorded in this file's catalog, whether or not registered in this session.
    pub async fn catalog(&mut self) -> Result<Vec<Schema>, StoreError> {
        catalog::list(&mut self.conn).await
    }

    pub async fn begin(&mut self) -> Result<StoreTransaction<'_>, StoreError> {
        let Self { conn, registry, ids, .. } = self;
        let tx = conn.begin().await?;
        Ok(StoreTransaction::new(tx, registry, &**ids))
    }

    pub async fn insert<T: Record>(&mut self, record: &T) -> Result<Uuid, StoreError> {
        let mut tx = self.begin().await?;
        let id = tx.insert(record).await?;
        tx.commit().await?;
        Ok(id)
    }

    /// All-or-nothing: the first failure rolls back the whole batch.
    pub async fn insert_many<T: Record>(&mut self, records: &[T]) -> Result<Vec<Uuid>, StoreError> {
        let mut tx = self.begin().await?;
        let ids = tx.insert_many(records).await?;
        tx.commit().await?;
        Ok(ids)
    }

    pub async fn get<T: Record>(&mut self, id: &Uuid) -> Result<T, StoreError> {
        let schema = self.registry.resolve::<T>()?;
        crud::get(&mut self.conn, &schema, id).await
    }

    pub async fn find<T: Record>(&mut self, id: &Uuid) -> Result<Option<T>, StoreError> {
        let schema = self.registry.resolve::<T>()?;
        crud::find(&mut self.conn, &schema, id).await
    }

    pub async fn update<T: Record>(&mut self, record: &T) -> Result<(), StoreError> {
        let mut tx = self.begin().await?;
        tx.update(record).await?;
        tx.commit().await
    }

    pub async fn update_many<T: Record>(&mut self, records: &[T]) -> Result<(), StoreError> {
        let mut tx = self.begin().await?;
        tx.update_many(records).await?;
        tx.commit().await
    }

    pub async fn remove<T: Record>(&mut self, id: &Uuid) -> Result<(), StoreError> {
        let mut tx = self.begin().await?;
        tx.remove::<T>(id).await?;
        tx.commit().await
    }

    pub async fn remove_many<T: Record>(&mut self, ids: &[Uuid]) -> Result<(), StoreError> {
        let mut tx = self.begin().await?;
        tx.remove_many::<T>(ids).await?;
        tx.commit().await
    }

    pub async fn exists<T: Record>(&mut self, id: &Uuid) -> Result<bool, StoreError> {
        let schema = self.registry.resolve::<T>()?;
        crud::exists(&mut self.conn, &schema, id).await
    }

    pub fn query<T: Record>(&self) -> QueryBuilder<'_, T> {
        QueryBuilder::new(&self.registry)
    }

    pub fn fetch<T: Record>(&mut self, query: Query<T>) -> Rows<'_, T> {
        let (root, stmt) = query.into_parts();
        let Self { conn, active, .. } = self;
        crud::stream(conn, active, root, stmt)
    }

    pub async fn fetch_all<T: Record>(&mut self, query: Query<T>) -> Result<Vec<T>, StoreError> {
        self.fetch(query).collect_all().await
    }

    /// Number of root rows matching the query's filters and joins; order, limit and offset are
    /// ignored.
    pub async fn count<T: Record>(&mut self, query: Query<T>) -> Result<u64, StoreError> {
        let (root, stmt) = query.into_count_parts();
        crud::count(&mut self.conn, &root, stmt).await
    }
}

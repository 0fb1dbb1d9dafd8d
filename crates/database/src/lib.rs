//! Single-file database facade.
//!
//! Wires the pager, buffer cache, catalog and heap/index operations into
//! one handle. Access is single-threaded and cooperative: callers must
//! [`Database::close`] to flush dirty pages and the header; nothing is
//! persisted on drop.

use std::path::Path;

use buffer::BufferPool;
use catalog::{Catalog, TableSchema};
use common::{Config, DbResult, Row, RowId};
use executor::Table;
use storage::Pager;
use types::Value;

pub struct Database {
    pool: BufferPool,
    catalog: Catalog,
}

impl Database {
    /// Open or create the database file at `path`.
    pub fn open(path: &Path, config: &Config) -> DbResult<Self> {
        let pager = Pager::open(path)?;
        let mut pool = BufferPool::new(pager, config.cache_pages);
        let catalog = Catalog::load(&mut pool)?;
        Ok(Self { pool, catalog })
    }

    /// Register a table and persist the catalog on the schema page.
    pub fn create_table(&mut self, schema: TableSchema) -> DbResult<()> {
        self.catalog.create_table(schema)?;
        self.catalog.save(&mut self.pool)
    }

    pub fn insert(&mut self, table: &str, values: &[Value]) -> DbResult<RowId> {
        self.table(table)?.insert(&mut self.pool, values)
    }

    pub fn scan(&mut self, table: &str) -> DbResult<Vec<Row>> {
        self.table(table)?.scan(&mut self.pool)
    }

    pub fn find_by_pk(&mut self, table: &str, key: &Value) -> DbResult<Option<Row>> {
        self.table(table)?.find_by_pk(&mut self.pool, key)
    }

    pub fn delete_by_pk(&mut self, table: &str, key: &Value) -> DbResult<bool> {
        self.table(table)?.delete_by_pk(&mut self.pool, key)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Flush every dirty page, then the header, and release the file.
    pub fn close(self) -> DbResult<()> {
        self.pool.close()
    }

    fn table(&self, name: &str) -> DbResult<Table> {
        Ok(Table::new(self.catalog.table(name)?.clone()))
    }
}

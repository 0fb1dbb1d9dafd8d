//! Table schemas and their persistence on the schema page.
//!
//! Rows are stored with a fixed layout, so a schema fully determines the
//! byte width and offset of every column. The whole catalog is serialized
//! onto a single page whose id the file header tracks; the first save
//! allocates that page.

use ahash::RandomState;
use bincode::config::{self, Config};
use bincode::serde::{decode_from_slice, encode_to_vec};
use buffer::BufferPool;
use common::{DbError, DbResult};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use storage::PAGE_SIZE;
use types::SqlType;

type Map<K, V> = HashMap<K, V, RandomState>;

fn bincode_config() -> impl Config {
    config::legacy()
}

/// Row-header bytes preceding the first column: deleted flag (1), row id
/// (4), reserved next-row pointer (4).
pub const ROW_HEADER_SIZE: u32 = 9;

/// Upper bound on columns per table.
pub const MAX_COLUMNS: usize = 32;

/// Upper bound on the declared width of a Text column.
pub const MAX_STRING_LEN: u32 = 255;

/// A single column definition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub ty: SqlType,
    /// Fixed byte width for `Text` columns; unused for other types.
    pub length: u32,
    pub primary_key: bool,
}

impl ColumnDef {
    pub fn new(name: &str, ty: SqlType) -> Self {
        Self {
            name: name.to_string(),
            ty,
            length: 0,
            primary_key: false,
        }
    }

    /// A `Text` column storing exactly `length` bytes per row.
    pub fn text(name: &str, length: u32) -> Self {
        Self {
            name: name.to_string(),
            ty: SqlType::Text,
            length,
            primary_key: false,
        }
    }

    pub fn with_primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Byte width of this column in the row layout.
    pub fn width(&self) -> u32 {
        match self.ty {
            SqlType::Int => 4,
            SqlType::Float => 4,
            SqlType::Bool => 1,
            SqlType::Text => self.length,
        }
    }
}

/// A table definition with precomputed fixed-row-layout size.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    /// Ordinal of the primary-key column, if any.
    pub primary_key: Option<usize>,
    /// Total bytes per row, header included.
    pub row_size: u32,
}

impl TableSchema {
    pub fn try_new(name: &str, columns: Vec<ColumnDef>) -> DbResult<Self> {
        if name.is_empty() {
            return Err(DbError::Catalog("table name must not be empty".into()));
        }
        if columns.is_empty() {
            return Err(DbError::Catalog(format!(
                "table '{name}' must have at least one column"
            )));
        }
        if columns.len() > MAX_COLUMNS {
            return Err(DbError::Catalog(format!(
                "table '{name}' exceeds {MAX_COLUMNS} columns"
            )));
        }

        let mut primary_key = None;
        for (i, col) in columns.iter().enumerate() {
            if col.name.is_empty() {
                return Err(DbError::Catalog(format!(
                    "table '{name}' has a column with an empty name"
                )));
            }
            if columns[..i].iter().any(|c| c.name == col.name) {
                return Err(DbError::Catalog(format!(
                    "duplicate column '{}' on table '{name}'",
                    col.name
                )));
            }
            if col.ty == SqlType::Text && (col.length == 0 || col.length > MAX_STRING_LEN) {
                return Err(DbError::Catalog(format!(
                    "column '{}' needs a length between 1 and {MAX_STRING_LEN}",
                    col.name
                )));
            }
            if col.primary_key {
                if primary_key.is_some() {
                    return Err(DbError::Catalog(format!(
                        "table '{name}' declares more than one primary key"
                    )));
                }
                primary_key = Some(i);
            }
        }

        let row_size = ROW_HEADER_SIZE + columns.iter().map(ColumnDef::width).sum::<u32>();
        // A page must hold at least one row plus the 4-byte next-page link.
        if row_size > (PAGE_SIZE - 4) as u32 {
            return Err(DbError::Catalog(format!(
                "row size {row_size} does not fit a page"
            )));
        }

        Ok(Self {
            name: name.to_string(),
            columns,
            primary_key,
            row_size,
        })
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Byte offset of column `idx` from the start of a row.
    pub fn column_offset(&self, idx: usize) -> u32 {
        ROW_HEADER_SIZE
            + self.columns[..idx]
                .iter()
                .map(ColumnDef::width)
                .sum::<u32>()
    }

    /// Row slots that fit on one data page, leaving the trailing 4-byte
    /// next-page link untouched.
    pub fn rows_per_page(&self) -> u32 {
        (PAGE_SIZE as u32 - 4) / self.row_size
    }
}

/// All table schemas, persisted as one blob on the schema page.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Catalog {
    tables: Vec<TableSchema>,
    #[serde(skip)]
    #[serde(default)]
    table_name_index: Map<String, usize>,
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            tables: Vec::new(),
            table_name_index: Map::default(),
        }
    }

    /// Load the catalog from the schema page, or return an empty catalog
    /// when none has been allocated yet.
    pub fn load(pool: &mut BufferPool) -> DbResult<Self> {
        let Some(pid) = pool.schema_page() else {
            return Ok(Self::new());
        };
        let page = pool.get(pid)?;
        let (mut catalog, _): (Catalog, usize) =
            decode_from_slice(&page.data, bincode_config())
                .map_err(|e| DbError::Catalog(format!("invalid schema page: {e}")))?;
        catalog.rebuild_indexes();
        Ok(catalog)
    }

    /// Serialize the catalog onto the schema page, allocating it on first
    /// save and recording it in the header.
    pub fn save(&self, pool: &mut BufferPool) -> DbResult<()> {
        let bytes = encode_to_vec(self, bincode_config())
            .map_err(|e| DbError::Catalog(format!("serialize failed: {e}")))?;
        if bytes.len() > PAGE_SIZE {
            return Err(DbError::Catalog(format!(
                "catalog needs {} bytes, schema page holds {PAGE_SIZE}",
                bytes.len()
            )));
        }

        let pid = match pool.schema_page() {
            Some(pid) => pid,
            None => {
                let pid = pool.allocate_new()?;
                pool.set_schema_page(Some(pid));
                pid
            }
        };

        let page = pool.get(pid)?;
        page.data[..bytes.len()].copy_from_slice(&bytes);
        page.data[bytes.len()..].fill(0);
        pool.mark_dirty(pid);
        Ok(())
    }

    /// Register a table; names are unique.
    pub fn create_table(&mut self, schema: TableSchema) -> DbResult<()> {
        if self.table_name_index.contains_key(&schema.name) {
            return Err(DbError::Catalog(format!(
                "table '{}' already exists",
                schema.name
            )));
        }
        self.tables.push(schema);
        self.rebuild_indexes();
        Ok(())
    }

    pub fn table(&self, name: &str) -> DbResult<&TableSchema> {
        let idx = self
            .table_name_index
            .get(name)
            .copied()
            .ok_or_else(|| DbError::Catalog(format!("unknown table '{name}'")))?;
        self.tables
            .get(idx)
            .ok_or_else(|| DbError::Catalog(format!("unknown table '{name}'")))
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableSchema> {
        self.tables.iter()
    }

    fn rebuild_indexes(&mut self) {
        self.table_name_index.clear();
        for (idx, table) in self.tables.iter().enumerate() {
            self.table_name_index.insert(table.name.clone(), idx);
        }
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::Pager;
    use tempfile::tempdir;

    fn users_schema() -> TableSchema {
        TableSchema::try_new(
            "users",
            vec![
                ColumnDef::new("id", SqlType::Int).with_primary_key(),
                ColumnDef::text("name", 32),
                ColumnDef::new("active", SqlType::Bool),
            ],
        )
        .unwrap()
    }

    #[test]
    fn layout_arithmetic() {
        let schema = users_schema();
        assert_eq!(schema.primary_key, Some(0));
        // 9-byte row header + 4 (id) + 32 (name) + 1 (active)
        assert_eq!(schema.row_size, 46);
        assert_eq!(schema.column_offset(0), 9);
        assert_eq!(schema.column_offset(1), 13);
        assert_eq!(schema.column_offset(2), 45);
        assert_eq!(schema.rows_per_page(), (4096 - 4) / 46);
    }

    #[test]
    fn rejects_bad_schemas() {
        assert!(TableSchema::try_new("t", vec![]).is_err());
        assert!(TableSchema::try_new("", vec![ColumnDef::new("a", SqlType::Int)]).is_err());
        assert!(
            TableSchema::try_new(
                "t",
                vec![
                    ColumnDef::new("a", SqlType::Int),
                    ColumnDef::new("a", SqlType::Bool),
                ]
            )
            .is_err()
        );
        assert!(
            TableSchema::try_new(
                "t",
                vec![
                    ColumnDef::new("a", SqlType::Int).with_primary_key(),
                    ColumnDef::new("b", SqlType::Int).with_primary_key(),
                ]
            )
            .is_err()
        );
        assert!(TableSchema::try_new("t", vec![ColumnDef::text("s", 0)]).is_err());
        assert!(TableSchema::try_new("t", vec![ColumnDef::text("s", 5000)]).is_err());
    }

    #[test]
    fn duplicate_table_names_rejected() {
        let mut catalog = Catalog::new();
        catalog.create_table(users_schema()).unwrap();
        assert!(catalog.create_table(users_schema()).is_err());
    }

    #[test]
    fn unknown_table_lookup_fails() {
        let catalog = Catalog::new();
        assert!(matches!(
            catalog.table("nope"),
            Err(DbError::Catalog(_))
        ));
    }

    #[test]
    fn empty_database_loads_empty_catalog() {
        let dir = tempdir().unwrap();
        let mut pool = BufferPool::new(Pager::open(&dir.path().join("db")).unwrap(), 4);
        let catalog = Catalog::load(&mut pool).unwrap();
        assert_eq!(catalog.tables().count(), 0);
    }

    #[test]
    fn save_allocates_schema_page_and_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db");

        {
            let mut pool = BufferPool::new(Pager::open(&path).unwrap(), 4);
            let mut catalog = Catalog::new();
            catalog.create_table(users_schema()).unwrap();
            catalog.save(&mut pool).unwrap();
            // First save grabs the first allocatable page.
            assert_eq!(pool.schema_page(), Some(common::PageId(1)));
            pool.close().unwrap();
        }

        let mut pool = BufferPool::new(Pager::open(&path).unwrap(), 4);
        let catalog = Catalog::load(&mut pool).unwrap();
        let table = catalog.table("users").unwrap();
        assert_eq!(*table, users_schema());
    }

    #[test]
    fn resave_reuses_the_schema_page() {
        let dir = tempdir().unwrap();
        let mut pool = BufferPool::new(Pager::open(&dir.path().join("db")).unwrap(), 4);

        let mut catalog = Catalog::new();
        catalog.create_table(users_schema()).unwrap();
        catalog.save(&mut pool).unwrap();
        let first = pool.schema_page();

        let extra =
            TableSchema::try_new("extra", vec![ColumnDef::new("n", SqlType::Int)]).unwrap();
        catalog.create_table(extra).unwrap();
        catalog.save(&mut pool).unwrap();
        assert_eq!(pool.schema_page(), first);

        let reloaded = Catalog::load(&mut pool).unwrap();
        assert_eq!(reloaded.tables().count(), 2);
    }
}


use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;
use types::Value;

/// Logical identifier for a 4 KiB page in the database file. Page 0 is
/// reserved at file creation, so id 0 doubles as the on-disk "none" value;
/// in-memory APIs use `Option<PageId>` instead.
/// Examples:
/// - `let schema_page = PageId(1);`
/// - `let data_page = PageId(42);`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PageId(pub u32);

impl PageId {
    /// Decode the on-disk representation, where 0 means "no page".
    pub fn from_raw(raw: u32) -> Option<PageId> {
        if raw == 0 { None } else { Some(PageId(raw)) }
    }

    /// Encode an optional page id back to its on-disk representation.
    pub fn to_raw(id: Option<PageId>) -> u32 {
        id.map_or(0, |p| p.0)
    }
}

/// Identifier for a row within a table. Assigned 1, 2, 3, … at insert; 0
/// marks an empty slot on disk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RowId(pub u32);

/// A materialized row: positional values plus the id assigned at insert.
#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    pub values: Vec<Value>,
    rid: Option<RowId>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values, rid: None }
    }

    pub fn with_rid(mut self, rid: RowId) -> Self {
        self.rid = Some(rid);
        self
    }

    pub fn rid(&self) -> Option<RowId> {
        self.rid
    }
}

/// Canonical error type shared across database subsystems.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("corrupt header: bad magic number")]
    CorruptHeader,
    #[error("short read on page {page_id}")]
    ShortRead { page_id: u32 },
    #[error("invalid page id {page_id} (page count {page_count})")]
    InvalidPageId { page_id: u32, page_count: u32 },
    #[error("eviction write-back failed: {0}")]
    WriteBackFailed(String),
    #[error("storage: {0}")]
    Storage(String),
    #[error("catalog: {0}")]
    Catalog(String),
    #[error("exec: {0}")]
    Executor(String),
    #[error("constraint violation: {0}")]
    Constraint(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Result alias that carries a `DbError`.
pub type DbResult<T> = Result<T, DbError>;

/// Runtime configuration for the database components.
///
/// # Example
/// ```
/// use common::Config;
///
/// let config = Config::builder().cache_pages(2).build();
/// assert_eq!(config.cache_pages, 2);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize, bon::Builder)]
pub struct Config {
    /// Number of pages the buffer cache keeps resident.
    #[builder(default = 100)]
    pub cache_pages: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self { cache_pages: 100 }
    }
}

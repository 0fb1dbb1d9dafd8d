//! Heap-table operations over chained data pages.
//!
//! Rows live in fixed-size slots packed from the front of each data page;
//! the last 4 bytes of a page hold the id of the next page in the chain
//! (0 = end). The chain head sits in the file header. Slots fill
//! sequentially and deleted rows keep their slot, so the first empty slot
//! is always at the tail of the chain.
//!
//! The primary key, when a table declares one, is enforced through the
//! B-tree index: an insert first probes the index, and the index maps the
//! key's fingerprint to the data page holding the row.

pub mod row;


use btree::BTreeIndex;
use buffer::BufferPool;
use catalog::TableSchema;
use common::{DbError, DbResult, PageId, Row, RowId};
use storage::PAGE_SIZE;
use types::Value;

/// Byte offset of a data page's next-page link.
const NEXT_PAGE_OFFSET: usize = PAGE_SIZE - 4;

fn next_page_of(data: &[u8]) -> Option<PageId> {
    let raw = u32::from_le_bytes(data[NEXT_PAGE_OFFSET..].try_into().unwrap());
    PageId::from_raw(raw)
}

/// Heap operations for one table.
#[derive(Clone, Debug)]
pub struct Table {
    schema: TableSchema,
}

impl Table {
    pub fn new(schema: TableSchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Insert a row, enforcing primary-key uniqueness through the index.
    ///
    /// Returns the assigned row id.
    pub fn insert(&self, pool: &mut BufferPool, values: &[Value]) -> DbResult<RowId> {
        row::validate(&self.schema, values)?;

        let pk = BTreeIndex::for_primary_key(&self.schema)?;
        if let Some(ref idx) = pk {
            let key = &values[idx.key_column];
            if idx.search(pool, key)?.is_some() {
                return Err(DbError::Constraint(format!(
                    "duplicate primary key {key} on table '{}'",
                    self.schema.name
                )));
            }
        }

        let (page_id, slot, row_id) = self.claim_slot(pool)?;
        {
            let row_size = self.schema.row_size as usize;
            let off = slot * row_size;
            let page = pool.get(page_id)?;
            row::encode(
                &self.schema,
                row_id,
                values,
                &mut page.data[off..off + row_size],
            )?;
        }
        pool.mark_dirty(page_id);

        if let Some(ref idx) = pk {
            idx.insert(pool, &values[idx.key_column], page_id)?;
        }
        Ok(row_id)
    }

    /// Walk the chain to the first empty slot, extending the chain when
    /// every page is full. Also derives the next row id (highest seen + 1).
    fn claim_slot(&self, pool: &mut BufferPool) -> DbResult<(PageId, usize, RowId)> {
        let mut page_id = match pool.first_data_page() {
            Some(pid) => pid,
            None => {
                let pid = pool.allocate_new()?;
                pool.set_first_data_page(Some(pid));
                pid
            }
        };

        let rows_per_page = self.schema.rows_per_page() as usize;
        let row_size = self.schema.row_size as usize;
        let mut max_row_id = 0u32;

        loop {
            let mut free = None;
            let next;
            {
                let page = pool.get(page_id)?;
                for slot in 0..rows_per_page {
                    let off = slot * row_size;
                    let rid = row::slot_row_id(&page.data[off..off + row_size]);
                    if rid == 0 {
                        free = Some(slot);
                        break;
                    }
                    max_row_id = max_row_id.max(rid);
                }
                next = next_page_of(&page.data);
            }

            if let Some(slot) = free {
                return Ok((page_id, slot, RowId(max_row_id + 1)));
            }
            match next {
                Some(next) => page_id = next,
                None => {
                    let new_pid = pool.allocate_new()?;
                    let page = pool.get(page_id)?;
                    page.data[NEXT_PAGE_OFFSET..].copy_from_slice(&new_pid.0.to_le_bytes());
                    pool.mark_dirty(page_id);
                    page_id = new_pid;
                }
            }
        }
    }

    /// All live rows, in chain-then-slot order.
    pub fn scan(&self, pool: &mut BufferPool) -> DbResult<Vec<Row>> {
        let mut rows = Vec::new();
        let mut current = pool.first_data_page();
        let rows_per_page = self.schema.rows_per_page() as usize;
        let row_size = self.schema.row_size as usize;

        while let Some(page_id) = current {
            let page = pool.get(page_id)?;
            for slot in 0..rows_per_page {
                let buf = &page.data[slot * row_size..(slot + 1) * row_size];
                let rid = row::slot_row_id(buf);
                if rid == 0 {
                    break;
                }
                if row::is_deleted(buf) {
                    continue;
                }
                let values = row::decode(&self.schema, buf)?;
                rows.push(Row::new(values).with_rid(RowId(rid)));
            }
            current = next_page_of(&page.data);
        }
        Ok(rows)
    }

    /// Point lookup through the primary-key index.
    ///
    /// The index narrows the search to one page; the stored key value is
    /// then compared directly, so a fingerprint collision cannot surface
    /// someone else's row.
    pub fn find_by_pk(&self, pool: &mut BufferPool, key: &Value) -> DbResult<Option<Row>> {
        let idx = self.pk_index(key)?;
        let Some(page_id) = idx.search(pool, key)? else {
            return Ok(None);
        };
        Ok(self
            .match_in_page(pool, page_id, idx.key_column, key)?
            .map(|(_, row)| row))
    }

    /// Mark the row with the given primary key deleted.
    ///
    /// Returns whether a row was found. The index's delete is a stub, so
    /// the key remains indexed; liveness is the heap's deleted flag.
    pub fn delete_by_pk(&self, pool: &mut BufferPool, key: &Value) -> DbResult<bool> {
        let idx = self.pk_index(key)?;
        let Some(page_id) = idx.search(pool, key)? else {
            return Ok(false);
        };
        let Some((slot, _)) = self.match_in_page(pool, page_id, idx.key_column, key)? else {
            return Ok(false);
        };

        let row_size = self.schema.row_size as usize;
        let off = slot * row_size;
        let page = pool.get(page_id)?;
        row::mark_deleted(&mut page.data[off..off + row_size]);
        pool.mark_dirty(page_id);

        idx.delete(pool, key)?;
        Ok(true)
    }

    fn pk_index(&self, key: &Value) -> DbResult<BTreeIndex> {
        let idx = BTreeIndex::for_primary_key(&self.schema)?.ok_or_else(|| {
            DbError::Executor(format!("table '{}' has no primary key", self.schema.name))
        })?;
        let col = &self.schema.columns[idx.key_column];
        if key.sql_type() != col.ty {
            return Err(DbError::Executor(format!(
                "primary key of '{}' is {}, got {}",
                self.schema.name,
                col.ty,
                key.sql_type()
            )));
        }
        Ok(idx)
    }

    /// Scan one page for the live row whose `key_column` equals `key`.
    fn match_in_page(
        &self,
        pool: &mut BufferPool,
        page_id: PageId,
        key_column: usize,
        key: &Value,
    ) -> DbResult<Option<(usize, Row)>> {
        let rows_per_page = self.schema.rows_per_page() as usize;
        let row_size = self.schema.row_size as usize;

        let page = pool.get(page_id)?;
        for slot in 0..rows_per_page {
            let buf = &page.data[slot * row_size..(slot + 1) * row_size];
            let rid = row::slot_row_id(buf);
            if rid == 0 {
                break;
            }
            if row::is_deleted(buf) {
                continue;
            }
            let values = row::decode(&self.schema, buf)?;
            if values[key_column].eq_same_type(key) == Some(true) {
                return Ok(Some((slot, Row::new(values).with_rid(RowId(rid)))));
            }
        }
        Ok(None)
    }
}

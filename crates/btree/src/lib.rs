//! Disk-resident B-tree index over key fingerprints.
//!
//! Nodes are whole pages obtained from the buffer cache; the tree maps
//! 32-bit key fingerprints to 32-bit payload page ids and exists to enforce
//! primary-key uniqueness and serve point lookups. The root page id lives
//! in the file header and is rewritten on every root replacement.
//!
//! Order is 4: a node holds at most 3 keys. Inserts pre-split full nodes on
//! the way down, so a recursive step never enters a full node. Deletion is
//! not implemented; [`BTreeIndex::delete`] reports success without touching
//! the tree.

mod key;
mod node;


pub use key::{fingerprint, fnv1a, FNV_OFFSET_BASIS, FNV_PRIME};
pub use node::{BTreeNode, BTREE_ORDER, MAX_KEYS, NODE_SIZE};

use buffer::BufferPool;
use catalog::TableSchema;
use common::{DbError, DbResult, PageId};
use log::debug;
use types::{SqlType, Value};

/// A cheap per-operation handle naming the indexed column.
///
/// The handle carries no tree state; the root is always read through the
/// file header, so handles never go stale.
#[derive(Clone, Debug)]
pub struct BTreeIndex {
    pub key_column: usize,
    pub key_type: SqlType,
}

impl BTreeIndex {
    /// Build a handle for `schema`'s column `key_column`.
    pub fn for_schema(schema: &TableSchema, key_column: usize) -> DbResult<Self> {
        let col = schema.columns.get(key_column).ok_or_else(|| {
            DbError::Catalog(format!(
                "no column {key_column} on table '{}'",
                schema.name
            ))
        })?;
        Ok(Self {
            key_column,
            key_type: col.ty,
        })
    }

    /// Handle over the schema's primary key, if it declares one.
    pub fn for_primary_key(schema: &TableSchema) -> DbResult<Option<Self>> {
        match schema.primary_key {
            Some(col) => Ok(Some(Self::for_schema(schema, col)?)),
            None => Ok(None),
        }
    }

    /// Point lookup: the payload page stored for `key`, or `None`.
    pub fn search(&self, pool: &mut BufferPool, key: &Value) -> DbResult<Option<PageId>> {
        let Some(root) = pool.index_root() else {
            return Ok(None);
        };
        let hash = fingerprint(key);
        let mut current = root;

        loop {
            let node = read_node(pool, current)?;
            let n = node.num_keys as usize;

            let mut i = 0;
            while i < n && hash > node.keys[i] {
                i += 1;
            }
            if i < n && hash == node.keys[i] {
                return Ok(PageId::from_raw(node.values[i]));
            }
            if node.is_leaf {
                return Ok(None);
            }
            current = PageId(node.children[i]);
        }
    }

    /// Insert `key → payload`.
    ///
    /// Duplicate keys are rejected upstream: callers must check with
    /// [`Self::search`] first. Inserting a fingerprint that is already
    /// present corrupts the node ordering invariant.
    pub fn insert(&self, pool: &mut BufferPool, key: &Value, payload: PageId) -> DbResult<()> {
        let hash = fingerprint(key);

        let root = match pool.index_root() {
            Some(root) => root,
            None => {
                let root = create_node(pool, true)?;
                pool.set_index_root(Some(root));
                root
            }
        };

        let root_node = read_node(pool, root)?;
        if root_node.is_full() {
            // Grow the tree: a fresh root adopts the old one and splits it.
            let new_root_id = create_node(pool, false)?;
            let mut new_root = read_node(pool, new_root_id)?;
            new_root.children[0] = root.0;
            write_node(pool, &new_root)?;

            split_child(pool, new_root_id, 0)?;
            pool.set_index_root(Some(new_root_id));
            insert_nonfull(pool, new_root_id, hash, payload)
        } else {
            insert_nonfull(pool, root, hash, payload)
        }
    }

    /// Remove `key` from the index.
    ///
    /// Not implemented: the call succeeds and the tree is left unchanged,
    /// so a deleted key remains findable here. Row liveness is tracked in
    /// the heap pages, not in the index.
    pub fn delete(&self, _pool: &mut BufferPool, key: &Value) -> DbResult<bool> {
        debug!(
            "btree delete of fingerprint {} skipped (deletion not implemented)",
            fingerprint(key)
        );
        Ok(true)
    }
}

fn read_node(pool: &mut BufferPool, pid: PageId) -> DbResult<BTreeNode> {
    let page = pool.get(pid)?;
    BTreeNode::read_from(page)
}

fn write_node(pool: &mut BufferPool, node: &BTreeNode) -> DbResult<()> {
    let page = pool.get(node.page_id)?;
    node.write_to(page)?;
    pool.mark_dirty(node.page_id);
    Ok(())
}

fn create_node(pool: &mut BufferPool, is_leaf: bool) -> DbResult<PageId> {
    let pid = pool.allocate_new()?;
    write_node(pool, &BTreeNode::new(pid, is_leaf))?;
    Ok(pid)
}

/// Split the full child at `parent.children[i]`.
///
/// The upper key/value (and, for internal children, the upper two child
/// links) move into a new right sibling; the median moves up into the
/// parent at position `i`. Parent, child and sibling are all re-serialized
/// and dirtied before returning, so a caller re-reading any of the three
/// sees the post-split state.
fn split_child(pool: &mut BufferPool, parent_id: PageId, i: usize) -> DbResult<()> {
    let mut parent = read_node(pool, parent_id)?;
    let child_id = PageId(parent.children[i]);
    let mut child = read_node(pool, child_id)?;
    debug_assert!(child.is_full());

    let t = BTREE_ORDER / 2;
    let sibling_id = create_node(pool, child.is_leaf)?;
    let mut sibling = read_node(pool, sibling_id)?;

    sibling.num_keys = (t - 1) as u32;
    for j in 0..t - 1 {
        sibling.keys[j] = child.keys[j + t];
        sibling.values[j] = child.values[j + t];
    }
    if !child.is_leaf {
        for j in 0..t {
            sibling.children[j] = child.children[j + t];
        }
    }
    child.num_keys = (t - 1) as u32;

    // Shift the parent's upper slots right and push the median up.
    let n = parent.num_keys as usize;
    for j in (i + 1..=n).rev() {
        parent.children[j + 1] = parent.children[j];
    }
    parent.children[i + 1] = sibling_id.0;
    for j in (i..n).rev() {
        parent.keys[j + 1] = parent.keys[j];
        parent.values[j + 1] = parent.values[j];
    }
    parent.keys[i] = child.keys[t - 1];
    parent.values[i] = child.values[t - 1];
    parent.num_keys += 1;

    write_node(pool, &sibling)?;
    write_node(pool, &child)?;
    write_node(pool, &parent)?;
    Ok(())
}

/// Insert into the subtree rooted at `pid`, which must not be full.
fn insert_nonfull(pool: &mut BufferPool, pid: PageId, hash: u32, payload: PageId) -> DbResult<()> {
    let mut node = read_node(pool, pid)?;
    debug_assert!(!node.is_full());

    if node.is_leaf {
        // Shift larger keys right and drop the new one in place.
        let mut i = node.num_keys as usize;
        while i > 0 && hash < node.keys[i - 1] {
            node.keys[i] = node.keys[i - 1];
            node.values[i] = node.values[i - 1];
            i -= 1;
        }
        node.keys[i] = hash;
        node.values[i] = payload.0;
        node.num_keys += 1;
        write_node(pool, &node)
    } else {
        let mut i = node.num_keys as usize;
        while i > 0 && hash < node.keys[i - 1] {
            i -= 1;
        }
        let child = read_node(pool, PageId(node.children[i]))?;
        if child.is_full() {
            split_child(pool, pid, i)?;
            // The split rewrote this node; re-read and pick a half.
            node = read_node(pool, pid)?;
            if hash > node.keys[i] {
                i += 1;
            }
        }
        insert_nonfull(pool, PageId(node.children[i]), hash, payload)
    }
}

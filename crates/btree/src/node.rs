//! B-tree node view and its on-page codec.

use bincode::config::{self, Config};
use bincode::serde::{decode_from_slice, encode_into_slice};
use common::{DbError, DbResult, PageId};
use serde::{Deserialize, Serialize};
use storage::Page;

/// Maximum children per node.
pub const BTREE_ORDER: usize = 4;

/// Maximum keys per node.
pub const MAX_KEYS: usize = BTREE_ORDER - 1;

/// Encoded node size at the front of a page: key count (4), leaf flag (1),
/// three keys (12), three values (12), four children (16).
pub const NODE_SIZE: usize = 45;

fn bincode_config() -> impl Config {
    config::legacy()
}

/// A node serialized into the first [`NODE_SIZE`] bytes of its page.
///
/// Keys are 32-bit fingerprints in ascending order; values are payload page
/// ids colocated with their keys; children bracket the keys in non-leaf
/// nodes. The node remembers which page it lives on, but that id is not
/// part of the on-disk encoding.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BTreeNode {
    pub num_keys: u32,
    pub is_leaf: bool,
    pub keys: [u32; MAX_KEYS],
    pub values: [u32; MAX_KEYS],
    pub children: [u32; BTREE_ORDER],
    #[serde(skip)]
    #[serde(default)]
    pub page_id: PageId,
}

impl BTreeNode {
    pub fn new(page_id: PageId, is_leaf: bool) -> Self {
        Self {
            num_keys: 0,
            is_leaf,
            keys: [0; MAX_KEYS],
            values: [0; MAX_KEYS],
            children: [0; BTREE_ORDER],
            page_id,
        }
    }

    pub fn is_full(&self) -> bool {
        self.num_keys as usize == MAX_KEYS
    }

    /// Decode the node stored in `page`.
    pub fn read_from(page: &Page) -> DbResult<Self> {
        let (mut node, read): (BTreeNode, usize) =
            decode_from_slice(&page.data[..NODE_SIZE], bincode_config())
                .map_err(|e| DbError::Storage(format!("decode btree node: {e}")))?;
        debug_assert_eq!(read, NODE_SIZE);
        node.page_id = page.id;
        Ok(node)
    }

    /// Encode the node into the front of `page`; the rest of the page is
    /// left untouched.
    pub fn write_to(&self, page: &mut Page) -> DbResult<()> {
        debug_assert_eq!(self.page_id, page.id);
        let written = encode_into_slice(self, &mut page.data[..NODE_SIZE], bincode_config())
            .map_err(|e| DbError::Storage(format!("encode btree node: {e}")))?;
        debug_assert_eq!(written, NODE_SIZE);
        Ok(())
    }
}

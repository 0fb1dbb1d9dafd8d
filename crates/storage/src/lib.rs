//! Page-granular file storage.
//!
//! The pager owns the database file and its header. It computes byte
//! offsets, reads and writes whole pages, and grows the file one page at a
//! time. It never caches; every operation hits the file.


use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use bincode::config::{self, Config};
use bincode::serde::{decode_from_slice, encode_into_slice};
use common::{DbError, DbResult, PageId};
use log::debug;

/// The unit of I/O and cache residency.
pub const PAGE_SIZE: usize = 4096;

/// Identifies a database file; checked on every open.
pub const DB_MAGIC: u32 = 0x0042444D;

/// Encoded size of [`DbHeader`]: six little-endian u32 fields.
pub const HEADER_SIZE: usize = 24;

fn bincode_config() -> impl Config {
    config::legacy()
}

/// File header stored at byte 0, immediately before the data region.
///
/// All fields are u32 little-endian on disk. `index_root`, `first_data_page`
/// and `schema_page` use 0 for "none"; `first_free_page` is reserved and
/// always 0 (no page reuse).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct DbHeader {
    magic: u32,
    page_count: u32,
    index_root: u32,
    first_data_page: u32,
    first_free_page: u32,
    schema_page: u32,
}

impl DbHeader {
    fn new() -> Self {
        Self {
            magic: DB_MAGIC,
            // Page 0 is reserved so that id 0 can mean "none" everywhere.
            page_count: 1,
            index_root: 0,
            first_data_page: 0,
            first_free_page: 0,
            schema_page: 0,
        }
    }

    fn encode(&self) -> DbResult<[u8; HEADER_SIZE]> {
        let mut buf = [0u8; HEADER_SIZE];
        let written = encode_into_slice(self, &mut buf, bincode_config())
            .map_err(|e| DbError::Storage(format!("encode header failed: {e}")))?;
        debug_assert_eq!(written, HEADER_SIZE);
        Ok(buf)
    }

    fn decode(buf: &[u8]) -> DbResult<Self> {
        let (header, read): (DbHeader, usize) = decode_from_slice(buf, bincode_config())
            .map_err(|e| DbError::Storage(format!("decode header failed: {e}")))?;
        debug_assert_eq!(read, HEADER_SIZE);
        Ok(header)
    }
}

/// An in-memory copy of one page's bytes.
#[derive(Debug, Clone)]
pub struct Page {
    pub id: PageId,
    pub data: Vec<u8>,
}

impl Page {
    /// Create a zero-filled page, matching freshly allocated on-disk state.
    pub fn new(id: PageId) -> Self {
        Self {
            id,
            data: vec![0u8; PAGE_SIZE],
        }
    }
}

/// Owns the file descriptor and the header. Pure I/O; the buffer cache sits
/// in front of it.
#[derive(Debug)]
pub struct Pager {
    file: File,
    header: DbHeader,
}

impl Pager {
    /// Open or create the database file at `path`.
    ///
    /// An empty file is initialized with a fresh header (`page_count = 1`,
    /// everything else 0). A non-empty file must start with a valid header;
    /// a magic mismatch fails with [`DbError::CorruptHeader`].
    pub fn open(path: &Path) -> DbResult<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let len = file.metadata()?.len();
        if len == 0 {
            debug!("creating database file {}", path.display());
            let header = DbHeader::new();
            file.seek(SeekFrom::Start(0))?;
            file.write_all(&header.encode()?)?;
            return Ok(Self { file, header });
        }

        let mut buf = [0u8; HEADER_SIZE];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut buf)
            .map_err(|e| match e.kind() {
                io::ErrorKind::UnexpectedEof => DbError::CorruptHeader,
                _ => DbError::Io(e),
            })?;
        let header = DbHeader::decode(&buf)?;
        if header.magic != DB_MAGIC {
            return Err(DbError::CorruptHeader);
        }
        Ok(Self { file, header })
    }

    fn page_offset(id: PageId) -> u64 {
        HEADER_SIZE as u64 + id.0 as u64 * PAGE_SIZE as u64
    }

    /// Grow the file by one page and return the new page's id.
    ///
    /// The new page is zero-filled on disk: the file is extended by writing
    /// a single zero byte at the page's last offset, so the hole reads back
    /// as zeros.
    pub fn allocate_page(&mut self) -> DbResult<PageId> {
        let id = PageId(self.header.page_count);
        let last_byte = Self::page_offset(id) + PAGE_SIZE as u64 - 1;
        self.file.seek(SeekFrom::Start(last_byte))?;
        self.file.write_all(&[0u8])?;
        self.header.page_count += 1;
        Ok(id)
    }

    /// Read one whole page from disk.
    pub fn read_page(&mut self, id: PageId) -> DbResult<Page> {
        if id.0 >= self.header.page_count {
            return Err(DbError::InvalidPageId {
                page_id: id.0,
                page_count: self.header.page_count,
            });
        }
        self.file.seek(SeekFrom::Start(Self::page_offset(id)))?;
        let mut page = Page::new(id);
        self.file
            .read_exact(&mut page.data)
            .map_err(|e| match e.kind() {
                io::ErrorKind::UnexpectedEof => DbError::ShortRead { page_id: id.0 },
                _ => DbError::Io(e),
            })?;
        Ok(page)
    }

    /// Write one whole page back to disk.
    pub fn write_page(&mut self, page: &Page) -> DbResult<()> {
        if page.id.0 >= self.header.page_count {
            return Err(DbError::InvalidPageId {
                page_id: page.id.0,
                page_count: self.header.page_count,
            });
        }
        self.file.seek(SeekFrom::Start(Self::page_offset(page.id)))?;
        self.file.write_all(&page.data)?;
        Ok(())
    }

    /// Rewrite the header at byte 0.
    pub fn flush_header(&mut self) -> DbResult<()> {
        let buf = self.header.encode()?;
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&buf)?;
        Ok(())
    }

    /// Flush the header and release the descriptor.
    pub fn close(mut self) -> DbResult<()> {
        self.flush_header()?;
        self.file.sync_all()?;
        Ok(())
    }

    pub fn page_count(&self) -> u32 {
        self.header.page_count
    }

    pub fn index_root(&self) -> Option<PageId> {
        PageId::from_raw(self.header.index_root)
    }

    pub fn set_index_root(&mut self, root: Option<PageId>) {
        self.header.index_root = PageId::to_raw(root);
    }

    pub fn first_data_page(&self) -> Option<PageId> {
        PageId::from_raw(self.header.first_data_page)
    }

    pub fn set_first_data_page(&mut self, page: Option<PageId>) {
        self.header.first_data_page = PageId::to_raw(page);
    }

    pub fn schema_page(&self) -> Option<PageId> {
        PageId::from_raw(self.header.schema_page)
    }

    pub fn set_schema_page(&mut self, page: Option<PageId>) {
        self.header.schema_page = PageId::to_raw(page);
    }
}

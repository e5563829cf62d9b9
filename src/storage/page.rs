//! Page I/O: page-aligned reads and writes against a single table file.
//!
//! Grounded on `mermoldy-mysqlite`'s `storage/table.rs::Table::flush`, which
//! opens the table file and writes page-sized buffers at fixed offsets, and
//! on `wcygan-sql-database`'s `buffer::FilePager`, which seeks to
//! `page_no * PAGE_SIZE` and treats a short/zero read past end-of-file as an
//! unallocated page rather than an error.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::errors::{Error, Result};

/// Fixed page size in bytes. Every page, including the root-indirection
/// page 0, occupies exactly this many bytes on disk.
pub const PAGE_SIZE: usize = 4096;

/// Durability/performance knobs for the page-write path.
#[derive(Debug, Clone, Copy)]
pub struct SyncConfig {
    /// fsync on every write when true (safety); otherwise sync is deferred
    /// to an explicit `flush`/`flush_batch` call (performance).
    pub immediate_sync: bool,
    /// Advisory interval for a caller-driven periodic flush when
    /// `immediate_sync` is false. The page store itself does not spawn a
    /// timer; a `Table` or server loop reads this value to decide when to
    /// call `flush`.
    pub batched_sync_interval_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            immediate_sync: false,
            batched_sync_interval_ms: 200,
        }
    }
}

/// Page-aligned file I/O for one table file.
pub struct PageStore {
    file: File,
    path: PathBuf,
    sync: SyncConfig,
}

impl PageStore {
    /// Opens `path`, creating it if missing.
    pub fn open(path: impl AsRef<Path>, sync: SyncConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;
        Ok(PageStore { file, path, sync })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sync_config(&self) -> SyncConfig {
        self.sync
    }

    /// Number of whole pages currently backed by the file.
    pub fn size_in_pages(&self) -> Result<u64> {
        let len = self.file.metadata()?.len();
        Ok(len / PAGE_SIZE as u64)
    }

    /// Reads page `page_no` into `buf`. A page past end-of-file reads as
    /// all zeros: the pager treats unallocated pages as logically empty
    /// during bootstrap rather than erroring.
    pub fn read(&mut self, page_no: u32, buf: &mut [u8; PAGE_SIZE]) -> Result<()> {
        let offset = page_no as u64 * PAGE_SIZE as u64;
        let file_len = self.file.metadata()?.len();
        buf.fill(0);
        if offset >= file_len {
            return Ok(());
        }
        self.file.seek(SeekFrom::Start(offset))?;
        let mut cursor = 0usize;
        while cursor < PAGE_SIZE {
            let n = self.file.read(&mut buf[cursor..])?;
            if n == 0 {
                break;
            }
            cursor += n;
        }
        Ok(())
    }

    /// Writes `buf` at `page_no`'s aligned offset, extending the file if
    /// necessary. Syncs immediately when `SyncConfig::immediate_sync`.
    pub fn write(&mut self, page_no: u32, buf: &[u8; PAGE_SIZE]) -> Result<()> {
        let offset = page_no as u64 * PAGE_SIZE as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(buf)?;
        if self.sync.immediate_sync {
            self.file.sync_data()?;
        }
        Ok(())
    }

    /// Fsyncs the underlying file.
    pub fn flush(&mut self) -> Result<()> {
        self.file.sync_data().map_err(Error::from)
    }

    /// Fsyncs and drops the file handle.
    pub fn close(mut self) -> Result<()> {
        self.flush()
    }
}

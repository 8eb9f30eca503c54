//! Reverse store: id -> canonical key
//!
//! Two files per store:
//! - `<namespace>.keys`: key records (see `record`) appended in id order
//! - `<namespace>.offsets`: one u64 LE byte offset into `.keys` per id
//!
//! Appends are staged in memory and written in batches. Staged records are
//! served straight from the staging buffer, so random reads never force a
//! flush; only a sequential `scan` does. There is no read cache: the store is
//! written once and walked once.

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::errors::{StorageError, StorageResult};
use super::record;

const OFFSET_WIDTH: u64 = 8;

/// Append-only, disk-backed list of keys addressed by dense id.
pub struct StringStore {
    keys_path: PathBuf,
    offsets_path: PathBuf,
    keys_file: File,
    offsets_file: File,
    /// Records not yet written to `keys_file`
    pending_keys: Vec<u8>,
    /// Offsets not yet written to `offsets_file`
    pending_offsets: Vec<u8>,
    /// Bytes of `keys_file` covered by flushed records
    flushed_bytes: u64,
    /// Number of ids whose record and offset are on disk
    flushed_len: u32,
    /// Logical size of the key data including pending records
    total_bytes: u64,
    /// Logical number of ids including pending records
    len: u32,
    /// Flush threshold for the staging buffer
    buffer_limit: usize,
}

impl StringStore {
    /// Creates a fresh store in `dir`, named by `namespace`.
    ///
    /// Fails if either file already exists.
    pub fn create(dir: &Path, namespace: &str, buffer_limit: usize) -> StorageResult<Self> {
        let keys_path = dir.join(format!("{}.keys", namespace));
        let offsets_path = dir.join(format!("{}.offsets", namespace));

        let keys_file = create_new(&keys_path)?;
        let offsets_file = create_new(&offsets_path)?;

        Ok(Self {
            keys_path,
            offsets_path,
            keys_file,
            offsets_file,
            pending_keys: Vec::with_capacity(buffer_limit),
            pending_offsets: Vec::new(),
            flushed_bytes: 0,
            flushed_len: 0,
            total_bytes: 0,
            len: 0,
            buffer_limit,
        })
    }

    /// Returns the path of the key data file.
    pub fn keys_path(&self) -> &Path {
        &self.keys_path
    }

    /// Returns the number of stored keys.
    pub fn len(&self) -> u32 {
        self.len
    }

    /// Returns whether the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Appends `key` under `id`, which must equal the current length.
    ///
    /// Either the record is fully staged or the store is left unchanged.
    /// Returns the size of the encoded record.
    pub fn append(&mut self, id: u32, key: &str) -> StorageResult<usize> {
        if id != self.len {
            return Err(StorageError::write_failed(
                format!("Non-dense id {} appended, expected {}", id, self.len),
                io::Error::new(io::ErrorKind::InvalidInput, "non-dense id"),
            ));
        }

        let encoded = record::encode(key)?;

        if self.pending_keys.len() + encoded.len() > self.buffer_limit {
            self.flush()?;
        }

        self.pending_offsets
            .extend_from_slice(&self.total_bytes.to_le_bytes());
        self.pending_keys.extend_from_slice(&encoded);
        self.total_bytes += encoded.len() as u64;
        self.len += 1;

        Ok(encoded.len())
    }

    /// Returns the key stored under `id`, or `None` if `id >= len()`.
    pub fn get(&mut self, id: u32) -> StorageResult<Option<String>> {
        if id >= self.len {
            return Ok(None);
        }

        if id >= self.flushed_len {
            return self.get_pending(id).map(Some);
        }

        let offset = self.read_offset(id)?;
        self.keys_file
            .seek(SeekFrom::Start(offset))
            .map_err(|e| StorageError::read_failed(format!("Failed to seek to offset {}", offset), e))?;

        if offset >= self.flushed_bytes {
            return Err(StorageError::corruption_for_id(
                id,
                format!(
                    "Offset {} lies past the {} flushed key bytes",
                    offset, self.flushed_bytes
                ),
            ));
        }
        match record::read_from(&mut self.keys_file, offset, self.flushed_bytes - offset)? {
            Some((key, _)) => Ok(Some(key)),
            None => Err(StorageError::corruption_for_id(
                id,
                "Offset points past the end of the key file",
            )),
        }
    }

    /// Writes all staged records and offsets to disk.
    ///
    /// On failure the staged data is kept, so the logical contents are
    /// unchanged and a later flush retries from the same position.
    pub fn flush(&mut self) -> StorageResult<()> {
        if self.pending_keys.is_empty() && self.pending_offsets.is_empty() {
            return Ok(());
        }

        write_at(&mut self.keys_file, self.flushed_bytes, &self.pending_keys).map_err(|e| {
            StorageError::write_failed(
                format!("Failed to write key records to {}", self.keys_path.display()),
                e,
            )
        })?;
        write_at(
            &mut self.offsets_file,
            self.flushed_len as u64 * OFFSET_WIDTH,
            &self.pending_offsets,
        )
        .map_err(|e| {
            StorageError::write_failed(
                format!("Failed to write offsets to {}", self.offsets_path.display()),
                e,
            )
        })?;

        self.flushed_bytes = self.total_bytes;
        self.flushed_len = self.len;
        self.pending_keys.clear();
        self.pending_offsets.clear();
        Ok(())
    }

    /// Drops every id `>= len`, restoring the store to that length.
    pub fn truncate(&mut self, len: u32) -> StorageResult<()> {
        if len >= self.len {
            return Ok(());
        }

        if len >= self.flushed_len {
            let keep = (len - self.flushed_len) as usize;
            let target_bytes = if keep == 0 {
                self.flushed_bytes
            } else {
                self.pending_offset(len)?
            };
            self.pending_offsets.truncate(keep * OFFSET_WIDTH as usize);
            self.pending_keys
                .truncate((target_bytes - self.flushed_bytes) as usize);
            self.total_bytes = target_bytes;
            self.len = len;
            return Ok(());
        }

        let target_bytes = self.read_offset(len)?;
        self.pending_keys.clear();
        self.pending_offsets.clear();
        self.keys_file
            .set_len(target_bytes)
            .and_then(|_| self.offsets_file.set_len(len as u64 * OFFSET_WIDTH))
            .map_err(|e| StorageError::io_error("Failed to truncate reverse store", e))?;

        self.flushed_bytes = target_bytes;
        self.flushed_len = len;
        self.total_bytes = target_bytes;
        self.len = len;
        Ok(())
    }

    /// Removes every key and shrinks both files to zero length.
    pub fn clear(&mut self) -> StorageResult<()> {
        self.pending_keys.clear();
        self.pending_offsets.clear();
        self.keys_file
            .set_len(0)
            .and_then(|_| self.offsets_file.set_len(0))
            .map_err(|e| StorageError::io_error("Failed to clear reverse store", e))?;
        self.flushed_bytes = 0;
        self.flushed_len = 0;
        self.total_bytes = 0;
        self.len = 0;
        Ok(())
    }

    /// Flushes, then opens a sequential reader over all keys in id order.
    ///
    /// The scan covers the keys present at call time.
    pub fn scan(&mut self, read_buffer: usize) -> StorageResult<StringScan> {
        self.flush()?;
        let file = File::open(&self.keys_path).map_err(|e| {
            StorageError::read_failed(
                format!("Failed to open key file: {}", self.keys_path.display()),
                e,
            )
        })?;

        Ok(StringScan {
            reader: BufReader::with_capacity(read_buffer.max(1), file),
            offset: 0,
            data_end: self.flushed_bytes,
            next_id: 0,
            end: self.len,
        })
    }

    fn read_offset(&mut self, id: u32) -> StorageResult<u64> {
        let position = id as u64 * OFFSET_WIDTH;
        let mut buf = [0u8; OFFSET_WIDTH as usize];
        self.offsets_file
            .seek(SeekFrom::Start(position))
            .and_then(|_| self.offsets_file.read_exact(&mut buf))
            .map_err(|e| {
                StorageError::read_failed(format!("Failed to read offset for id {}", id), e)
            })?;
        Ok(u64::from_le_bytes(buf))
    }

    fn pending_offset(&self, id: u32) -> StorageResult<u64> {
        let start = (id - self.flushed_len) as usize * OFFSET_WIDTH as usize;
        let bytes = self
            .pending_offsets
            .get(start..start + OFFSET_WIDTH as usize)
            .ok_or_else(|| StorageError::corruption_for_id(id, "Missing staged offset"))?;
        let mut buf = [0u8; OFFSET_WIDTH as usize];
        buf.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(buf))
    }

    fn get_pending(&self, id: u32) -> StorageResult<String> {
        let offset = self.pending_offset(id)?;
        let start = (offset - self.flushed_bytes) as usize;
        let (key, _) = record::decode(&self.pending_keys[start..])
            .map_err(|e| StorageError::corruption_for_id(id, e.to_string()))?;
        Ok(key)
    }
}

/// Sequential iterator over `(id, key)` pairs in ascending id order.
pub struct StringScan {
    reader: BufReader<File>,
    offset: u64,
    data_end: u64,
    next_id: u32,
    end: u32,
}

impl Iterator for StringScan {
    type Item = StorageResult<(u32, String)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_id >= self.end {
            return None;
        }

        let id = self.next_id;
        let available = self.data_end.saturating_sub(self.offset);
        let item = match record::read_from(&mut self.reader, self.offset, available) {
            Ok(Some((key, consumed))) => {
                self.offset += consumed as u64;
                self.next_id += 1;
                Ok((id, key))
            }
            Ok(None) => {
                self.next_id = self.end;
                Err(StorageError::corruption_for_id(
                    id,
                    "Key file ended before the last id",
                ))
            }
            Err(e) => {
                self.next_id = self.end;
                Err(e)
            }
        };
        Some(item)
    }
}

fn create_new(path: &Path) -> StorageResult<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| {
            StorageError::io_error(format!("Failed to create store file: {}", path.display()), e)
        })
}

fn write_at(file: &mut File, position: u64, data: &[u8]) -> io::Result<()> {
    file.seek(SeekFrom::Start(position))?;
    file.write_all(data)
}

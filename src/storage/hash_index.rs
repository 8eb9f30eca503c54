//! Forward store: key hash -> id
//!
//! An on-disk open-addressing hash table with linear slot search. Each slot is
//! 12 bytes:
//!
//! ```text
//! +------------------+------------------+
//! | Key Hash (u64 LE)| Id + 1 (u32 LE)  |
//! +------------------+------------------+
//! ```
//!
//! `Id + 1 == 0` marks an empty slot. The table never holds the keys
//! themselves; a matching hash only yields a candidate id, which the caller
//! confirms against the reverse store. Capacity is a power of two and the
//! table doubles into a fresh file once it is half full.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::errors::{StorageError, StorageResult};

const SLOT_SIZE: u64 = 12;

/// Slots fetched per disk read during a slot search.
const SLOT_BATCH: u64 = 16;

/// Outcome of an insert attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The id was stored in a free slot
    Inserted,
    /// A confirmed entry for the same key already exists
    Existing(u32),
}

/// Disk-resident hash table mapping key hashes to candidate ids.
pub struct HashIndex {
    dir: PathBuf,
    namespace: String,
    path: PathBuf,
    file: File,
    capacity: u64,
    len: u64,
    generation: u32,
    slot_reads: u64,
    grows: u64,
}

impl HashIndex {
    /// Creates an empty index with `initial_slots` slots (a power of two).
    pub fn create(dir: &Path, namespace: &str, initial_slots: u64) -> StorageResult<Self> {
        if !initial_slots.is_power_of_two() {
            return Err(StorageError::io_error(
                format!("Slot count {} is not a power of two", initial_slots),
                io::Error::new(io::ErrorKind::InvalidInput, "bad slot count"),
            ));
        }

        let path = slot_file_path(dir, namespace, 0);
        let file = create_slot_file(&path, initial_slots)?;

        Ok(Self {
            dir: dir.to_path_buf(),
            namespace: namespace.to_string(),
            path,
            file,
            capacity: initial_slots,
            len: 0,
            generation: 0,
            slot_reads: 0,
            grows: 0,
        })
    }

    /// Returns the path of the current slot file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the number of occupied slots.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Returns whether the index holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of slots.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Returns the number of slot batches read from disk so far.
    pub fn disk_slot_reads(&self) -> u64 {
        self.slot_reads
    }

    /// Returns how many times the table has doubled.
    pub fn grows(&self) -> u64 {
        self.grows
    }

    /// Looks up `hash`, asking `confirm` whether each candidate id is the key.
    pub fn lookup<F>(&mut self, hash: u64, mut confirm: F) -> StorageResult<Option<u32>>
    where
        F: FnMut(u32) -> StorageResult<bool>,
    {
        match self.find_slot(hash, &mut confirm)? {
            SlotSearch::Match(id) => Ok(Some(id)),
            SlotSearch::Vacant(_) => Ok(None),
        }
    }

    /// Inserts `id` under `hash` unless `confirm` recognizes an existing entry.
    pub fn insert<F>(&mut self, hash: u64, id: u32, mut confirm: F) -> StorageResult<InsertOutcome>
    where
        F: FnMut(u32) -> StorageResult<bool>,
    {
        if (self.len + 1) * 2 > self.capacity {
            self.grow()?;
        }

        let slot = match self.find_slot(hash, &mut confirm)? {
            SlotSearch::Match(existing) => return Ok(InsertOutcome::Existing(existing)),
            SlotSearch::Vacant(slot) => slot,
        };

        write_slot(&mut self.file, slot, hash, id).map_err(|e| {
            StorageError::write_failed(format!("Failed to write index slot {}", slot), e)
        })?;
        self.len += 1;
        Ok(InsertOutcome::Inserted)
    }

    /// Removes every entry, keeping the current capacity.
    pub fn clear(&mut self) -> StorageResult<()> {
        self.file
            .set_len(0)
            .and_then(|_| self.file.set_len(self.capacity * SLOT_SIZE))
            .map_err(|e| StorageError::io_error("Failed to clear forward index", e))?;
        self.len = 0;
        Ok(())
    }

    fn find_slot<F>(&mut self, hash: u64, confirm: &mut F) -> StorageResult<SlotSearch>
    where
        F: FnMut(u32) -> StorageResult<bool>,
    {
        let mask = self.capacity - 1;
        let mut slot = hash & mask;
        let mut visited = 0u64;
        let mut batch = [0u8; (SLOT_SIZE * SLOT_BATCH) as usize];

        while visited < self.capacity {
            let count = SLOT_BATCH.min(self.capacity - slot);
            let bytes = &mut batch[..(count * SLOT_SIZE) as usize];
            self.file
                .seek(SeekFrom::Start(slot * SLOT_SIZE))
                .and_then(|_| self.file.read_exact(bytes))
                .map_err(|e| {
                    StorageError::read_failed(format!("Failed to read index slot {}", slot), e)
                })?;
            self.slot_reads += 1;

            for chunk in bytes.chunks_exact(SLOT_SIZE as usize) {
                let (slot_hash, id_plus_one) = decode_slot(chunk);
                if id_plus_one == 0 {
                    return Ok(SlotSearch::Vacant(slot));
                }
                if slot_hash == hash && confirm(id_plus_one - 1)? {
                    return Ok(SlotSearch::Match(id_plus_one - 1));
                }
                slot = (slot + 1) & mask;
                visited += 1;
                if visited >= self.capacity {
                    break;
                }
            }
        }

        // Unreachable while the load factor stays at or below 1/2.
        Err(StorageError::data_corruption(
            "Forward index has no free slot",
        ))
    }

    /// Doubles capacity, rehashing every entry into a new slot file.
    ///
    /// On failure the half-built file is removed and the current table is
    /// left as it was, so a later insert can retry. Generation numbers are
    /// never reused, even when a grow fails.
    fn grow(&mut self) -> StorageResult<()> {
        let new_capacity = self.capacity * 2;
        self.generation += 1;
        let new_path = slot_file_path(&self.dir, &self.namespace, self.generation);
        let mut new_file = create_slot_file(&new_path, new_capacity)?;

        if let Err(e) = self.rehash_into(&mut new_file, new_capacity) {
            drop(new_file);
            // The original error is the one worth reporting.
            let _ = fs::remove_file(&new_path);
            return Err(e);
        }

        let old_path = std::mem::replace(&mut self.path, new_path);
        self.file = new_file;
        self.capacity = new_capacity;
        self.grows += 1;

        fs::remove_file(&old_path).map_err(|e| {
            StorageError::io_error(
                format!("Failed to remove old index file: {}", old_path.display()),
                e,
            )
        })
    }

    fn rehash_into(&self, target: &mut File, target_capacity: u64) -> StorageResult<()> {
        let source = File::open(&self.path).map_err(|e| {
            StorageError::read_failed(
                format!("Failed to reopen index file: {}", self.path.display()),
                e,
            )
        })?;
        let mut reader = BufReader::with_capacity(64 * 1024, source);
        let mut slot_buf = [0u8; SLOT_SIZE as usize];

        for _ in 0..self.capacity {
            reader.read_exact(&mut slot_buf).map_err(|e| {
                StorageError::read_failed("Failed to read index during rehash", e)
            })?;
            let (hash, id_plus_one) = decode_slot(&slot_buf);
            if id_plus_one != 0 {
                place(target, target_capacity, hash, id_plus_one - 1).map_err(|e| {
                    StorageError::write_failed("Failed to write index during rehash", e)
                })?;
            }
        }
        Ok(())
    }
}

enum SlotSearch {
    Match(u32),
    Vacant(u64),
}

fn slot_file_path(dir: &Path, namespace: &str, generation: u32) -> PathBuf {
    dir.join(format!("{}.idx.{}", namespace, generation))
}

fn create_slot_file(path: &Path, slots: u64) -> StorageResult<File> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| {
            StorageError::io_error(format!("Failed to create index file: {}", path.display()), e)
        })?;
    file.set_len(slots * SLOT_SIZE).map_err(|e| {
        StorageError::io_error(format!("Failed to size index file: {}", path.display()), e)
    })?;
    Ok(file)
}

fn decode_slot(bytes: &[u8]) -> (u64, u32) {
    let mut hash = [0u8; 8];
    let mut id = [0u8; 4];
    hash.copy_from_slice(&bytes[0..8]);
    id.copy_from_slice(&bytes[8..12]);
    (u64::from_le_bytes(hash), u32::from_le_bytes(id))
}

fn write_slot(file: &mut File, slot: u64, hash: u64, id: u32) -> io::Result<()> {
    let mut buf = [0u8; SLOT_SIZE as usize];
    buf[0..8].copy_from_slice(&hash.to_le_bytes());
    buf[8..12].copy_from_slice(&(id + 1).to_le_bytes());
    file.seek(SeekFrom::Start(slot * SLOT_SIZE))?;
    file.write_all(&buf)
}

/// Places an entry known to be absent; used while rehashing.
fn place(file: &mut File, capacity: u64, hash: u64, id: u32) -> io::Result<()> {
    let mask = capacity - 1;
    let mut slot = hash & mask;
    let mut buf = [0u8; SLOT_SIZE as usize];
    loop {
        file.seek(SeekFrom::Start(slot * SLOT_SIZE))?;
        file.read_exact(&mut buf)?;
        if decode_slot(&buf).1 == 0 {
            return write_slot(file, slot, hash, id);
        }
        slot = (slot + 1) & mask;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn no_match(_: u32) -> StorageResult<bool> {
        Ok(false)
    }

    fn always(_: u32) -> StorageResult<bool> {
        Ok(true)
    }

    #[test]
    fn test_insert_then_lookup() {
        let dir = TempDir::new().unwrap();
        let mut index = HashIndex::create(dir.path(), "fwd", 8).unwrap();

        assert_eq!(index.insert(42, 0, no_match).unwrap(), InsertOutcome::Inserted);
        assert_eq!(index.lookup(42, always).unwrap(), Some(0));
        assert_eq!(index.lookup(43, always).unwrap(), None);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_hash_collision_resolved_by_confirm() {
        let dir = TempDir::new().unwrap();
        let mut index = HashIndex::create(dir.path(), "fwd", 8).unwrap();

        index.insert(7, 0, no_match).unwrap();
        index.insert(7, 1, |id| Ok(id == 1)).unwrap();

        assert_eq!(index.lookup(7, |id| Ok(id == 1)).unwrap(), Some(1));
        assert_eq!(index.lookup(7, |id| Ok(id == 0)).unwrap(), Some(0));
        assert_eq!(index.lookup(7, no_match).unwrap(), None);
    }

    #[test]
    fn test_existing_entry_reported() {
        let dir = TempDir::new().unwrap();
        let mut index = HashIndex::create(dir.path(), "fwd", 8).unwrap();

        index.insert(99, 3, no_match).unwrap();
        assert_eq!(index.insert(99, 4, always).unwrap(), InsertOutcome::Existing(3));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_grow_preserves_entries() {
        let dir = TempDir::new().unwrap();
        let mut index = HashIndex::create(dir.path(), "fwd", 4).unwrap();
        let first_path = index.path().to_path_buf();

        for id in 0..100u32 {
            let hash = (id as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
            index.insert(hash, id, no_match).unwrap();
        }

        assert!(index.grows() > 0);
        assert!(index.capacity() >= 200);
        assert!(!first_path.exists());
        for id in 0..100u32 {
            let hash = (id as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
            assert_eq!(index.lookup(hash, |c| Ok(c == id)).unwrap(), Some(id));
        }
    }

    #[test]
    fn test_failed_grow_leaves_index_retryable() {
        let dir = TempDir::new().unwrap();
        let mut index = HashIndex::create(dir.path(), "fwd", 2).unwrap();
        index.insert(1, 0, no_match).unwrap();

        // Hide the slot file so the rehash cannot read it.
        let current = index.path().to_path_buf();
        let hidden = dir.path().join("hidden");
        std::fs::rename(&current, &hidden).unwrap();

        let err = index.insert(2, 1, no_match).unwrap_err();
        assert_eq!(err.code().code(), "AERO_STORAGE_READ_FAILED");
        assert_eq!(index.capacity(), 2);
        assert_eq!(index.grows(), 0);
        let mut files: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        files.sort();
        assert_eq!(files, vec!["hidden".to_string()]);

        // Once the file is back, the same insert succeeds.
        std::fs::rename(&hidden, &current).unwrap();
        assert_eq!(index.insert(2, 1, no_match).unwrap(), InsertOutcome::Inserted);
        assert_eq!(index.grows(), 1);
        assert_eq!(index.lookup(1, |c| Ok(c == 0)).unwrap(), Some(0));
        assert_eq!(index.lookup(2, |c| Ok(c == 1)).unwrap(), Some(1));
        assert!(!current.exists());
    }

    #[test]
    fn test_slot_search_wraps_around_table_end() {
        let dir = TempDir::new().unwrap();
        let mut index = HashIndex::create(dir.path(), "fwd", 32).unwrap();

        // All land in the last slot and spill over to the front.
        for id in 0..4u32 {
            index.insert(31, id, no_match).unwrap();
        }
        for id in 0..4u32 {
            assert_eq!(index.lookup(31, |c| Ok(c == id)).unwrap(), Some(id));
        }
    }

    #[test]
    fn test_clear_empties_index() {
        let dir = TempDir::new().unwrap();
        let mut index = HashIndex::create(dir.path(), "fwd", 8).unwrap();

        index.insert(1, 0, no_match).unwrap();
        index.clear().unwrap();

        assert!(index.is_empty());
        assert_eq!(index.lookup(1, always).unwrap(), None);
    }

    #[test]
    fn test_rejects_non_power_of_two() {
        let dir = TempDir::new().unwrap();
        assert!(HashIndex::create(dir.path(), "fwd", 12).is_err());
    }
}

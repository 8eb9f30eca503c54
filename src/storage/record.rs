//! Key record format for the reverse store
//!
//! ```text
//! +------------------+
//! | Record Length    | (u32 LE, includes itself and the checksum)
//! +------------------+
//! | Key              | (UTF-8 bytes)
//! +------------------+
//! | Checksum         | (u32 LE)
//! +------------------+
//! ```
//!
//! Checksum covers all bytes except the checksum itself.

use std::io::{self, Read};

use super::checksum::{compute_checksum, compute_checksum_parts};
use super::errors::{StorageError, StorageResult};

/// Bytes a record adds on top of the key itself.
pub const RECORD_OVERHEAD: usize = 4 + 4;

/// Encodes a canonical key into a framed, checksummed record.
pub fn encode(key: &str) -> StorageResult<Vec<u8>> {
    let record_length = u32::try_from(key.len() + RECORD_OVERHEAD).map_err(|_| {
        StorageError::write_failed(
            format!("Key of {} bytes exceeds the record size limit", key.len()),
            io::Error::new(io::ErrorKind::InvalidInput, "record too large"),
        )
    })?;

    let mut record = Vec::with_capacity(record_length as usize);
    record.extend_from_slice(&record_length.to_le_bytes());
    record.extend_from_slice(key.as_bytes());
    let checksum = compute_checksum(&record);
    record.extend_from_slice(&checksum.to_le_bytes());

    Ok(record)
}

/// Decodes one record from the front of `data`, verifying its checksum.
///
/// Returns the key and the number of bytes consumed.
pub fn decode(data: &[u8]) -> io::Result<(String, usize)> {
    if data.len() < RECORD_OVERHEAD {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "Record too short",
        ));
    }

    let record_length = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;

    if record_length < RECORD_OVERHEAD {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Invalid record length: {}", record_length),
        ));
    }

    if data.len() < record_length {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!(
                "Record truncated: expected {} bytes, got {}",
                record_length,
                data.len()
            ),
        ));
    }

    let checksum_offset = record_length - 4;
    let stored_checksum = u32::from_le_bytes([
        data[checksum_offset],
        data[checksum_offset + 1],
        data[checksum_offset + 2],
        data[checksum_offset + 3],
    ]);
    let computed_checksum = compute_checksum(&data[..checksum_offset]);

    if computed_checksum != stored_checksum {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "Checksum mismatch: computed {:08x}, stored {:08x}",
                computed_checksum, stored_checksum
            ),
        ));
    }

    let key = String::from_utf8(data[4..checksum_offset].to_vec()).map_err(|e| {
        io::Error::new(io::ErrorKind::InvalidData, format!("Invalid UTF-8: {}", e))
    })?;

    Ok((key, record_length))
}

/// Reads the next record from a stream positioned at `offset`.
///
/// `available` is the number of valid bytes from `offset` to the end of the
/// data; a length prefix claiming more is rejected before anything is
/// allocated. Returns `Ok(None)` on a clean end of stream at a record
/// boundary. A partial record, bad length or checksum mismatch is data
/// corruption.
pub fn read_from<R: Read>(
    reader: &mut R,
    offset: u64,
    available: u64,
) -> StorageResult<Option<(String, usize)>> {
    let mut len_buf = [0u8; 4];
    let filled = fill(reader, &mut len_buf)
        .map_err(|e| StorageError::read_failed(format!("Failed to read record at {}", offset), e))?;

    if filled == 0 {
        return Ok(None);
    }
    if filled < len_buf.len() {
        return Err(StorageError::corruption_at_offset(
            offset,
            "Truncated record length",
        ));
    }

    let record_length = u32::from_le_bytes(len_buf) as usize;
    if record_length < RECORD_OVERHEAD {
        return Err(StorageError::corruption_at_offset(
            offset,
            format!("Invalid record length: {}", record_length),
        ));
    }

    if record_length as u64 > available {
        return Err(StorageError::corruption_at_offset(
            offset,
            format!(
                "Record length {} exceeds the {} bytes left in the key file",
                record_length, available
            ),
        ));
    }

    let mut body = vec![0u8; record_length - RECORD_OVERHEAD];
    let mut checksum_buf = [0u8; 4];
    reader
        .read_exact(&mut body)
        .and_then(|_| reader.read_exact(&mut checksum_buf))
        .map_err(|e| {
            StorageError::corruption_at_offset(offset, format!("Failed to read record body: {}", e))
        })?;

    let stored_checksum = u32::from_le_bytes(checksum_buf);
    let computed_checksum = compute_checksum_parts(&[&len_buf, &body]);
    if computed_checksum != stored_checksum {
        return Err(StorageError::corruption_at_offset(
            offset,
            format!(
                "Checksum mismatch: computed {:08x}, stored {:08x}",
                computed_checksum, stored_checksum
            ),
        ));
    }

    let key = String::from_utf8(body).map_err(|e| {
        StorageError::corruption_at_offset(offset, format!("Invalid UTF-8: {}", e))
    })?;

    Ok(Some((key, record_length)))
}

/// Reads until `buf` is full or the stream ends; returns bytes read.
fn fill<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

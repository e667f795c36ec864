//! Redo log record codec.
//!
//! A record is `offset: u64 LE || length: u64 LE || payload: bytes[length]`, with no header,
//! footer, or per-record checksum. The width is fixed at 64-bit little-endian so a log written
//! on one architecture stays byte-for-byte parseable when replayed by this crate built for
//! another.

use std::fs::File;
use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

/// Header width in bytes: one `u64` for `offset`, one `u64` for `length`.
const RECORD_HEADER_LEN: usize = 16;

/// One logged byte-range modification, as it appears on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedoRecord {
    pub offset: u64,
    pub length: u64,
    pub payload: Vec<u8>,
}

impl RedoRecord {
    pub fn new(offset: u64, payload: Vec<u8>) -> Self {
        let length = payload.len() as u64;
        RedoRecord {
            offset,
            length,
            payload,
        }
    }

    /// Append this record's on-disk encoding to `w`.
    pub fn encode(&self, mut w: impl Write) -> io::Result<()> {
        w.write_u64::<LittleEndian>(self.offset)?;
        w.write_u64::<LittleEndian>(self.length)?;
        w.write_all(&self.payload)
    }
}

/// Read every complete record from `r` in file order.
///
/// A record whose header or payload is cut short at EOF is treated as an absent tail (the
/// transaction that wrote it never reached a durable commit point) and replay stops there
/// silently rather than returning an error.
pub fn decode_records(mut r: impl Read) -> io::Result<Vec<RedoRecord>> {
    let mut records = Vec::new();

    loop {
        let offset = match r.read_u64::<LittleEndian>() {
            Ok(v) => v,
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(err) => return Err(err),
        };

        let length = match r.read_u64::<LittleEndian>() {
            Ok(v) => v,
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(err) => return Err(err),
        };

        // `length` comes straight off disk and, for a torn tail record, may claim far more bytes
        // than the log actually holds. Don't size the allocation off it directly: read through a
        // `Take` so the buffer only ever grows to match bytes the reader actually produces, then
        // compare against `length` afterward. A record that under-delivers is a truncated tail,
        // not an error.
        let mut payload = Vec::new();
        (&mut r).take(length).read_to_end(&mut payload)?;
        if payload.len() as u64 != length {
            break;
        }

        records.push(RedoRecord {
            offset,
            length,
            payload,
        });
    }

    Ok(records)
}

/// Apply every fully-written record in `log_path` to `buffer`, last writer wins.
///
/// Returns whether at least one record was applied. The caller (map-time recovery or
/// `truncate_log`) is responsible for rewriting the data file and truncating the log when this
/// returns `true`; an absent or empty log is a no-op and returns `false`.
pub fn replay_into(buffer: &mut [u8], log_path: &std::path::Path) -> io::Result<bool> {
    let mut file = match File::open(log_path) {
        Ok(f) => f,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    };

    let meta = file.metadata()?;
    if meta.len() == 0 {
        return Ok(false);
    }

    let records = decode_records(&mut file)?;
    if records.is_empty() {
        return Ok(false);
    }

    for record in &records {
        let start = record.offset as usize;
        let end = start + record.payload.len();
        if end > buffer.len() {
            // A record addressing past the segment's current length cannot have been written
            // by this segment's own mapping; skip it rather than panic on an out-of-range log.
            continue;
        }
        buffer[start..end].copy_from_slice(&record.payload);
    }

    Ok(true)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn encode_decode_round_trip() {
        let rec = RedoRecord::new(10, vec![0x41, 0x42, 0x43, 0x44, 0x45]);
        let mut buf = Vec::new();
        rec.encode(&mut buf).unwrap();

        let decoded = decode_records(buf.as_slice()).unwrap();
        assert_eq!(decoded, vec![rec]);
    }

    #[test]
    fn truncated_tail_is_silently_dropped() {
        let rec = RedoRecord::new(0, vec![0xff; 5]);
        let mut buf = Vec::new();
        rec.encode(&mut buf).unwrap();
        buf.truncate(buf.len() - 2); // cut into the payload

        let decoded = decode_records(buf.as_slice()).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn oversized_claimed_length_is_silently_dropped_without_huge_allocation() {
        // A header claiming a payload far larger than the rest of the log (the shape a torn
        // write-in-progress tail record takes) must not be trusted for allocation sizing; it
        // should be treated the same as any other truncated tail.
        let mut buf = Vec::new();
        buf.write_u64::<LittleEndian>(0).unwrap();
        buf.write_u64::<LittleEndian>(u64::MAX).unwrap();
        buf.extend_from_slice(&[0xaa; 4]);

        let decoded = decode_records(buf.as_slice()).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn truncated_header_is_silently_dropped() {
        let buf = vec![0u8; RECORD_HEADER_LEN - 1];
        let decoded = decode_records(buf.as_slice()).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn last_writer_wins_on_overlap() {
        let mut segment = vec![0u8; 16];
        let first = RedoRecord::new(0, vec![1; 8]);
        let second = RedoRecord::new(4, vec![2; 8]);

        let mut buf = Vec::new();
        first.encode(&mut buf).unwrap();
        second.encode(&mut buf).unwrap();

        for record in decode_records(buf.as_slice()).unwrap() {
            let start = record.offset as usize;
            segment[start..start + record.payload.len()].copy_from_slice(&record.payload);
        }

        assert_eq!(segment, vec![1, 1, 1, 1, 2, 2, 2, 2, 2, 2, 2, 2, 0, 0, 0, 0]);
    }

    #[test]
    fn record_past_buffer_end_is_skipped_not_panicking() {
        let mut segment = vec![0u8; 4];
        let mut buf = Vec::new();
        RedoRecord::new(2, vec![9; 4]).encode(&mut buf).unwrap();

        let applied = {
            let records = decode_records(buf.as_slice()).unwrap();
            let mut any = false;
            for record in &records {
                let start = record.offset as usize;
                let end = start + record.payload.len();
                if end > segment.len() {
                    continue;
                }
                any = true;
                segment[start..end].copy_from_slice(&record.payload);
            }
            any
        };

        assert!(!applied);
        assert_eq!(segment, vec![0, 0, 0, 0]);
    }
}

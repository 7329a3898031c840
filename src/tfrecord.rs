use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use crate::error::{MotionvizError, MotionvizResult};

// TFRecord container framing:
//   length       u64 LE
//   length_crc   u32 LE (masked crc32c of the length bytes)
//   payload      [length]
//   payload_crc  u32 LE (masked crc32c of the payload)
//
// The CRC fields are read and skipped; a corrupted payload surfaces as a
// decode error in the scenario parser instead.
const HEADER_LEN: usize = 8 + 4;
const FOOTER_LEN: usize = 4;

/// Sanity cap on a single record; scenario payloads are a few MB at most.
const MAX_RECORD_LEN: u64 = 1 << 30;

/// Streaming reader over the records of a TFRecord file.
pub struct TfRecordReader<R> {
    inner: R,
    records_read: u64,
}

impl TfRecordReader<BufReader<File>> {
    pub fn open(path: &Path) -> MotionvizResult<Self> {
        let file = File::open(path).map_err(|e| {
            MotionvizError::decode(format!("open record file '{}': {e}", path.display()))
        })?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: Read> TfRecordReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            records_read: 0,
        }
    }

    /// Next record payload, or `None` at a clean end of stream. Truncation
    /// inside a record is an error.
    pub fn next_record(&mut self) -> MotionvizResult<Option<Vec<u8>>> {
        let mut header = [0u8; HEADER_LEN];
        let mut got = 0usize;
        while got < HEADER_LEN {
            let n = self
                .inner
                .read(&mut header[got..])
                .map_err(|e| MotionvizError::decode(format!("read record header: {e}")))?;
            if n == 0 {
                if got == 0 {
                    return Ok(None);
                }
                return Err(MotionvizError::decode(format!(
                    "truncated record header after {} records",
                    self.records_read
                )));
            }
            got += n;
        }

        let len = u64::from_le_bytes(header[0..8].try_into().map_err(|_| {
            MotionvizError::decode("record header slice length mismatch (internal)")
        })?);
        if len > MAX_RECORD_LEN {
            return Err(MotionvizError::decode(format!(
                "record length {len} exceeds the {MAX_RECORD_LEN} byte cap"
            )));
        }

        let mut payload = vec![0u8; len as usize];
        self.inner.read_exact(&mut payload).map_err(|e| {
            MotionvizError::decode(format!(
                "truncated record payload (wanted {len} bytes): {e}"
            ))
        })?;

        let mut footer = [0u8; FOOTER_LEN];
        self.inner
            .read_exact(&mut footer)
            .map_err(|e| MotionvizError::decode(format!("truncated record footer: {e}")))?;

        self.records_read += 1;
        Ok(Some(payload))
    }
}

//! Fixed-width spill records for pairs whose full-sibling calibration was
//! not yet stable enough to classify at the time they were dumped, and the
//! second pass that reclassifies them once it is.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::{RaffiError, Result};

pub const SPILL_RECORD_LEN: usize = 24;

/// Name of the spill file, relative to the output directory, matching the
/// original tool's fixed `.temporary` filename.
pub const SPILL_FILE_NAME: &str = ".temporary";

/// A pair whose classification was deferred to the second pass: just
/// enough to recompute `ibd1` from `kinship` and `ibd2_frac` later via
/// `classifier::ibd1_frac_from_kinship`.
#[derive(Debug, Clone, Copy)]
pub struct SpillRecord {
    pub id1_index: i32,
    pub id2_index: i32,
    pub kinship: f64,
    pub ibd2_frac: f64,
}

impl SpillRecord {
    pub fn to_bytes(self) -> [u8; SPILL_RECORD_LEN] {
        let mut buf = [0u8; SPILL_RECORD_LEN];
        buf[0..4].copy_from_slice(&self.id1_index.to_ne_bytes());
        buf[4..8].copy_from_slice(&self.id2_index.to_ne_bytes());
        buf[8..16].copy_from_slice(&self.kinship.to_ne_bytes());
        buf[16..24].copy_from_slice(&self.ibd2_frac.to_ne_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8; SPILL_RECORD_LEN]) -> Self {
        SpillRecord {
            id1_index: i32::from_ne_bytes(buf[0..4].try_into().unwrap()),
            id2_index: i32::from_ne_bytes(buf[4..8].try_into().unwrap()),
            kinship: f64::from_ne_bytes(buf[8..16].try_into().unwrap()),
            ibd2_frac: f64::from_ne_bytes(buf[16..24].try_into().unwrap()),
        }
    }
}

pub struct SpillWriter {
    inner: GzEncoder<BufWriter<File>>,
    path: PathBuf,
    count: u64,
}

impl SpillWriter {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).map_err(|e| RaffiError::io(path, e))?;
        Ok(SpillWriter {
            inner: GzEncoder::new(BufWriter::new(file), Compression::default()),
            path: path.to_path_buf(),
            count: 0,
        })
    }

    pub fn write(&mut self, record: SpillRecord) -> Result<()> {
        self.inner
            .write_all(&record.to_bytes())
            .map_err(|e| RaffiError::io(&self.path, e))?;
        self.count += 1;
        Ok(())
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn finish(self) -> Result<u64> {
        let count = self.count;
        let path = self.path.clone();
        self.inner
            .finish()
            .map_err(|e| RaffiError::io(&path, e))?;
        Ok(count)
    }
}

pub struct SpillReader {
    inner: GzDecoder<BufReader<File>>,
    path: PathBuf,
}

impl SpillReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| RaffiError::io(path, e))?;
        Ok(SpillReader {
            inner: GzDecoder::new(BufReader::new(file)),
            path: path.to_path_buf(),
        })
    }

    /// Returns `Ok(None)` at a clean end-of-stream, `Ok(Some(_))` for a
    /// record, and `Err` for a truncated/partial trailing record.
    pub fn read_next(&mut self) -> Result<Option<SpillRecord>> {
        let mut buf = [0u8; SPILL_RECORD_LEN];
        let mut filled = 0usize;
        loop {
            let n = self
                .inner
                .read(&mut buf[filled..])
                .map_err(|e| RaffiError::io(&self.path, e))?;
            if n == 0 {
                break;
            }
            filled += n;
            if filled == SPILL_RECORD_LEN {
                return Ok(Some(SpillRecord::from_bytes(&buf)));
            }
        }
        if filled == 0 {
            Ok(None)
        } else {
            Err(RaffiError::parse(
                &self.path,
                0,
                "truncated spill record at end of file",
            ))
        }
    }
}


impl PartialEq for SpillRecord {
    fn eq(&self, other: &Self) -> bool {
        self.id1_index == other.id1_index
            && self.id2_index == other.id2_index
            && self.kinship.to_bits() == other.kinship.to_bits()
            && self.ibd2_frac.to_bits() == other.ibd2_frac.to_bits()
    }
}

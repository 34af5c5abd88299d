//! Sample-ID <-> dense-index bijection, built once from a VCF header line.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use flate2::read::GzDecoder;
use rustc_hash::FxHashMap;

use crate::error::{RaffiError, Result};

/// The first sample column (1-indexed) in a standard VCF header row.
const FIRST_SAMPLE_COLUMN: usize = 10;

/// Dense `u32` index assignment for every sample ID seen in a VCF panel,
/// in header column order.
pub struct Ordering {
    id_to_index: FxHashMap<String, u32>,
    ids: Vec<String>,
}

impl Ordering {
    /// Read the first non-`##` line of a gzip-compressed VCF file and
    /// assign indices to every column from the 10th onward.
    pub fn from_vcf_gz(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| RaffiError::io(path, e))?;
        let reader = BufReader::new(GzDecoder::new(file));

        let mut id_to_index = FxHashMap::default();
        let mut ids = Vec::new();

        for line in reader.lines() {
            let line = line.map_err(|e| RaffiError::io(path, e))?;
            if line.starts_with("##") {
                continue;
            }
            for (col, field) in line.split('\t').enumerate() {
                if col + 1 >= FIRST_SAMPLE_COLUMN {
                    let idx = ids.len() as u32;
                    id_to_index.insert(field.to_string(), idx);
                    ids.push(field.to_string());
                }
            }
            break;
        }

        if ids.is_empty() {
            return Err(RaffiError::parse(path, 0, "no sample columns in VCF header"));
        }

        Ok(Ordering { id_to_index, ids })
    }

    pub fn index_of(&self, id: &str) -> Option<u32> {
        self.id_to_index.get(id).copied()
    }

    pub fn id_of(&self, index: u32) -> &str {
        &self.ids[index as usize]
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn last_index(&self) -> u32 {
        self.ids.len() as u32 - 1
    }
}

//! Genetic-distance lookup table, loaded from per-chromosome recombination
//! maps (`chr{N}.rMap`).

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::error::{RaffiError, Result};

/// Cumulative genetic distance (centimorgans) at each site index, per
/// chromosome, plus the total genetic length summed across all of them.
pub struct MapTable {
    distances: Vec<Vec<f64>>,
    total_length: f64,
}

impl MapTable {
    /// Load `chr1.rMap` .. `chr{num_chromosomes}.rMap` from `dir`. Each file
    /// is tab-separated; only the second field (cumulative centimorgans) is
    /// used, one row per site, in site order. The chromosome's contribution
    /// to the total genetic length is `distances.last() - distances.first()`.
    pub fn load(dir: &Path, num_chromosomes: u8) -> Result<Self> {
        let mut distances = Vec::with_capacity(num_chromosomes as usize);
        let mut total_length = 0.0;

        for chrom in 1..=num_chromosomes {
            let path = dir.join(format!("chr{chrom}.rMap"));
            let file = File::open(&path).map_err(|e| RaffiError::io(path.clone(), e))?;
            let reader = BufReader::new(file);
            let mut dists = Vec::new();

            for (line_no, line) in reader.lines().enumerate() {
                let line = line.map_err(|e| RaffiError::io(path.clone(), e))?;
                if line.is_empty() {
                    continue;
                }
                let mut fields = line.splitn(3, '\t');
                let _first = fields.next();
                let Some(second) = fields.next() else {
                    return Err(RaffiError::parse(
                        &path,
                        line_no + 1,
                        "missing cumulative distance column",
                    ));
                };
                let dist: f64 = second.trim().parse().map_err(|_| {
                    RaffiError::parse(&path, line_no + 1, "invalid cumulative distance")
                })?;
                dists.push(dist);
            }

            if dists.is_empty() {
                return Err(RaffiError::parse(&path, 0, "genetic map has no rows"));
            }
            total_length += dists[dists.len() - 1] - dists[0];
            distances.push(dists);
        }

        Ok(MapTable {
            distances,
            total_length,
        })
    }

    /// Genetic length (centimorgans) between two site indices (inclusive)
    /// on a given chromosome (1-indexed).
    pub fn genetic_length(&self, chrom: u8, from_site: u32, to_site: u32) -> f64 {
        let dists = &self.distances[(chrom - 1) as usize];
        dists[to_site as usize] - dists[from_site as usize]
    }

    /// The last valid site index on a chromosome (1-indexed).
    pub fn last_site_index(&self, chrom: u8) -> u32 {
        self.distances[(chrom - 1) as usize].len() as u32 - 1
    }

    pub fn total_length(&self) -> f64 {
        self.total_length
    }
}

pub fn default_map_path(dir: &Path, chrom: u8) -> PathBuf {
    dir.join(format!("chr{chrom}.rMap"))
}

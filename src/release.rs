//! The release pass: for every id1 that just became dumpable, aggregate
//! its per-worker partial stats into one total per id2, then either spill
//! it for later reclassification, classify and emit it now, or drop it.

use std::sync::{Arc, Mutex};

use rustc_hash::FxHashMap;

use crate::calibrator::{Calibrator, MIN_NUM_FS};
use crate::classifier::{self, Relatedness, Thresholds};
use crate::error::Result;
use crate::ordering::Ordering;
use crate::output::PredictionsWriter;
use crate::spill::{SpillRecord, SpillWriter};
use crate::worker::PerWorkerMatrix;

#[derive(Default)]
struct AggregatedPair {
    ibd1_union: f64,
    ibd1_exclusive: f64,
    ibd2: f64,
}

pub struct ReleaseEngine {
    pub max_degree: u8,
    pub min_kinship: f64,
    pub total_length: f64,
}

/// Outcome of releasing a single id1's pairs, for `RunStats` bookkeeping.
#[derive(Default)]
pub struct ReleaseOutcome {
    pub spilled: u64,
    pub emitted: u64,
}

impl ReleaseEngine {
    /// Drains and aggregates every matrix's entry for each id1 in
    /// `lo..=hi` (inclusive), then applies the spill/classify/drop
    /// decision per pair. Matrices are locked one at a time, briefly;
    /// workers are blocked at the barrier for the whole call so there is
    /// never real contention.
    pub fn dump_range(
        &self,
        lo: i64,
        hi: i64,
        matrices: &[Arc<Mutex<PerWorkerMatrix>>],
        ordering: &Ordering,
        calibrator: &mut Calibrator,
        spill: &mut SpillWriter,
        out: &mut PredictionsWriter<std::fs::File>,
    ) -> Result<ReleaseOutcome> {
        let mut outcome = ReleaseOutcome::default();
        if lo > hi {
            return Ok(outcome);
        }

        for id1 in lo..=hi {
            let id1 = id1 as u32;
            let mut agg: FxHashMap<u32, AggregatedPair> = FxHashMap::default();

            for m in matrices {
                let mut matrix = m.lock().unwrap_or_else(|e| e.into_inner());
                if let Some(row) = matrix.remove(&id1) {
                    for (id2, stats) in row {
                        let entry = agg.entry(id2).or_default();
                        entry.ibd1_union += stats.total_ibd1;
                        entry.ibd1_exclusive += stats.total_ibd1 - stats.total_ibd2;
                        entry.ibd2 += stats.total_ibd2;
                    }
                }
            }

            for (id2, a) in agg {
                self.release_pair(id1, id2, &a, ordering, calibrator, spill, out, &mut outcome)?;
            }
        }

        Ok(outcome)
    }

    fn release_pair(
        &self,
        id1: u32,
        id2: u32,
        a: &AggregatedPair,
        ordering: &Ordering,
        calibrator: &mut Calibrator,
        spill: &mut SpillWriter,
        out: &mut PredictionsWriter<std::fs::File>,
        outcome: &mut ReleaseOutcome,
    ) -> Result<()> {
        let kinship = classifier::compute_kinship(a.ibd1_exclusive, a.ibd2, self.total_length);
        let ibd2_frac = classifier::compute_ibd2_frac(a.ibd2, self.total_length);

        if ibd2_frac >= calibrator.thresholds().fs_start {
            calibrator.add_full_sibling(a.ibd1_union, a.ibd2, self.total_length);
        }

        let num_fs = calibrator.num_full_siblings();

        if kinship >= self.min_kinship && num_fs < MIN_NUM_FS {
            spill.write(SpillRecord {
                id1_index: id1 as i32,
                id2_index: id2 as i32,
                kinship,
                ibd2_frac,
            })?;
            outcome.spilled += 1;
        } else if num_fs >= MIN_NUM_FS {
            calibrator.maybe_shift();
            let encoding = classifier::encode(kinship, ibd2_frac, calibrator.thresholds());
            if classifier::passes_degree_gate(encoding.encoding(), self.max_degree) {
                emit(out, ordering, id1, id2, kinship, a.ibd1_exclusive, ibd2_frac, self.total_length, encoding)?;
                outcome.emitted += 1;
            }
        }
        // else: dropped — not enough full-sibling evidence yet to trust
        // the spill/classify boundary, and kinship too low to spill.

        Ok(())
    }
}

/// Classify and write a spilled pair in the second pass, using the final,
/// fully-calibrated thresholds.
pub fn classify_spilled(
    out: &mut PredictionsWriter<std::fs::File>,
    ordering: &Ordering,
    thresholds: &Thresholds,
    max_degree: u8,
    record: SpillRecord,
    total_length: f64,
) -> Result<bool> {
    let encoding = classifier::encode(record.kinship, record.ibd2_frac, thresholds);
    if !classifier::passes_degree_gate(encoding.encoding(), max_degree) {
        return Ok(false);
    }
    let ibd1 = classifier::ibd1_frac_from_kinship(record.kinship, record.ibd2_frac, total_length);
    emit_from_spill(out, ordering, record, ibd1, encoding)?;
    Ok(true)
}

#[allow(clippy::too_many_arguments)]
fn emit(
    out: &mut PredictionsWriter<std::fs::File>,
    ordering: &Ordering,
    id1: u32,
    id2: u32,
    kinship: f64,
    ibd1_exclusive: f64,
    ibd2_frac: f64,
    total_length: f64,
    relatedness: Relatedness,
) -> Result<()> {
    let ibd1 = classifier::compute_ibd1_frac(ibd1_exclusive, total_length);
    let ibd0 = (1.0 - ibd1 - ibd2_frac).max(0.0);
    out.write_row(
        ordering.id_of(id1),
        ordering.id_of(id2),
        kinship,
        ibd0,
        ibd1,
        ibd2_frac,
        relatedness,
    )
}

fn emit_from_spill(
    out: &mut PredictionsWriter<std::fs::File>,
    ordering: &Ordering,
    record: SpillRecord,
    ibd1: f64,
    relatedness: Relatedness,
) -> Result<()> {
    let ibd0 = (1.0 - ibd1 - record.ibd2_frac).max(0.0);
    out.write_row(
        ordering.id_of(record.id1_index as u32),
        ordering.id_of(record.id2_index as u32),
        record.kinship,
        ibd0,
        ibd1,
        record.ibd2_frac,
        relatedness,
    )
}

//! Top-level orchestration: spawns one worker thread per chromosome slice,
//! drives the barrier/release loop to completion, then runs the second
//! pass over anything spilled during the first.

use std::fs::File;
use std::io::BufReader;
use std::sync::{Arc, Mutex};

use flate2::read::GzDecoder;

use crate::barrier::Barrier;
use crate::calibrator::Calibrator;
use crate::classifier::{self, Thresholds};
use crate::config::{RunConfig, NUM_CHROMOSOMES};
use crate::dumpable::DumpableFrontier;
use crate::error::{RaffiError, Result};
use crate::genetic_map::MapTable;
use crate::ordering::Ordering;
use crate::output::PredictionsWriter;
use crate::release::{classify_spilled, ReleaseEngine};
use crate::spill::{SpillReader, SpillWriter};
use crate::worker::{ChromStream, PerWorkerMatrix};

/// Summary of one completed run, logged at `info` and optionally printed
/// to stderr when `--stats` is passed.
#[derive(Debug, Default, Clone)]
pub struct RunStats {
    pub individuals_processed: u64,
    pub pairs_spilled: u64,
    pub pairs_emitted_first_pass: u64,
    pub pairs_emitted_second_pass: u64,
    pub calibration_shift: Option<f64>,
}

impl std::fmt::Display for RunStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "individuals_processed={} pairs_spilled={} pairs_emitted_first_pass={} \
             pairs_emitted_second_pass={} calibration_shift={}",
            self.individuals_processed,
            self.pairs_spilled,
            self.pairs_emitted_first_pass,
            self.pairs_emitted_second_pass,
            self.calibration_shift
                .map(|s| s.to_string())
                .unwrap_or_else(|| "none".to_string())
        )
    }
}

/// Contiguous chromosome ranges, one per worker, covering `1..=NUM_CHROMOSOMES`.
fn assign_chromosomes(num_threads: usize) -> Vec<Vec<u8>> {
    let total = NUM_CHROMOSOMES as usize;
    let chunk = total / num_threads;
    let mut assignments = Vec::with_capacity(num_threads);
    let mut start: u8 = 1;
    for w in 0..num_threads {
        let end = if w == num_threads - 1 {
            NUM_CHROMOSOMES
        } else {
            start + chunk as u8 - 1
        };
        assignments.push((start..=end).collect());
        start = end + 1;
    }
    assignments
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked with a non-string payload".to_string()
    }
}

#[allow(clippy::too_many_arguments)]
fn worker_body(
    worker_id: usize,
    chroms: &[u8],
    config: &RunConfig,
    map: &MapTable,
    ordering: &Ordering,
    dumpable: &DumpableFrontier,
    matrix: &Mutex<PerWorkerMatrix>,
    barrier: &Barrier,
) -> Result<()> {
    let mut streams: Vec<ChromStream> = chroms
        .iter()
        .map(|&chrom| {
            let path = config.matcher_output_path(chrom);
            let file = File::open(&path).map_err(|e| RaffiError::io(&path, e))?;
            let reader: Box<dyn std::io::BufRead + Send> =
                Box::new(BufReader::new(GzDecoder::new(file)));
            Ok(ChromStream::new(chrom, path, reader))
        })
        .collect::<Result<Vec<_>>>()?;

    loop {
        {
            let mut guard = matrix.lock().unwrap_or_else(|e| e.into_inner());
            for stream in streams.iter_mut() {
                stream.run_cycle(map, &mut guard, dumpable, ordering)?;
            }
        }

        if streams.iter().all(|s| s.is_done()) {
            return Ok(());
        }
        barrier.worker_cycle_end(worker_id);
    }
}

#[allow(clippy::too_many_arguments)]
fn worker_main(
    worker_id: usize,
    chroms: Vec<u8>,
    config: RunConfig,
    map: Arc<MapTable>,
    ordering: Arc<Ordering>,
    dumpable: Arc<DumpableFrontier>,
    barrier: Arc<Barrier>,
    matrix: Arc<Mutex<PerWorkerMatrix>>,
    error_tx: crossbeam_channel::Sender<RaffiError>,
) {
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        worker_body(worker_id, &chroms, &config, &map, &ordering, &dumpable, &matrix, &barrier)
    }));

    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            let _ = error_tx.try_send(e);
        }
        Err(payload) => {
            let _ = error_tx.try_send(RaffiError::WorkerPanic(panic_message(&*payload)));
        }
    }
    barrier.worker_finished(worker_id);
}

/// Runs the full engine end to end: first pass (streaming aggregation +
/// release), then the second pass over the spill file. Returns the
/// completed run's stats, or the first error observed by any worker, or
/// any error from the master's own I/O.
pub fn run(config: &RunConfig) -> Result<RunStats> {
    tracing::info!(
        num_threads = config.num_threads,
        max_degree = config.max_degree,
        "starting run"
    );

    let map = Arc::new(MapTable::load(&config.genetic_map_dir, NUM_CHROMOSOMES)?);
    let ordering = Arc::new(Ordering::from_vcf_gz(&config.ordering_vcf_path())?);
    let dumpable = Arc::new(DumpableFrontier::new(NUM_CHROMOSOMES as usize));
    let barrier = Arc::new(Barrier::new(config.num_threads));
    let (error_tx, error_rx) = crossbeam_channel::bounded::<RaffiError>(1);

    let assignments = assign_chromosomes(config.num_threads);
    let matrices: Vec<Arc<Mutex<PerWorkerMatrix>>> = (0..config.num_threads)
        .map(|_| Arc::new(Mutex::new(PerWorkerMatrix::default())))
        .collect();

    let mut handles = Vec::with_capacity(config.num_threads);
    for (worker_id, chroms) in assignments.into_iter().enumerate() {
        let map = Arc::clone(&map);
        let ordering = Arc::clone(&ordering);
        let dumpable = Arc::clone(&dumpable);
        let barrier = Arc::clone(&barrier);
        let matrix = Arc::clone(&matrices[worker_id]);
        let thread_config = config.clone();
        let error_tx = error_tx.clone();
        handles.push(std::thread::spawn(move || {
            worker_main(
                worker_id,
                chroms,
                thread_config,
                map,
                ordering,
                dumpable,
                barrier,
                matrix,
                error_tx,
            );
        }));
    }
    drop(error_tx);

    let baseline = Thresholds::baseline();
    let min_kinship = classifier::min_kinship_coefficient(config.max_degree, &baseline)?;
    let mut calibrator = Calibrator::new(baseline);
    let release_engine = ReleaseEngine {
        max_degree: config.max_degree,
        min_kinship,
        total_length: map.total_length(),
    };

    std::fs::create_dir_all(&config.output_dir)
        .map_err(|e| RaffiError::io(&config.output_dir, e))?;
    let mut spill = SpillWriter::create(&config.spill_path())?;
    let mut out = PredictionsWriter::create(&config.predictions_path())?;
    out.write_header()?;

    let mut prev_dumped: i64 = -1;
    let mut stats = RunStats::default();

    loop {
        let guard = barrier.wait_for_all_blocked();
        let hi = dumpable.min_dumpable();
        let lo = prev_dumped + 1;

        let outcome = release_engine.dump_range(
            lo,
            hi,
            &matrices,
            &ordering,
            &mut calibrator,
            &mut spill,
            &mut out,
        )?;
        stats.pairs_spilled += outcome.spilled;
        stats.pairs_emitted_first_pass += outcome.emitted;
        if hi >= lo {
            prev_dumped = hi;
            stats.individuals_processed = (prev_dumped + 1) as u64;
        }

        if !config.quiet {
            tracing::info!(
                individuals_processed = stats.individuals_processed,
                "progress"
            );
        }

        let done = barrier.resume_workers(guard);
        if done {
            break;
        }
    }

    for handle in handles {
        let _ = handle.join();
    }

    if let Ok(e) = error_rx.try_recv() {
        return Err(e);
    }

    stats.calibration_shift = calibrator.maybe_shift();

    let spilled_count = spill.finish()?;
    let mut reader = SpillReader::open(&config.spill_path())?;
    let mut num_read = 0u64;
    while let Some(record) = reader.read_next()? {
        num_read += 1;
        let emitted = classify_spilled(
            &mut out,
            &ordering,
            calibrator.thresholds(),
            config.max_degree,
            record,
            map.total_length(),
        )?;
        if emitted {
            stats.pairs_emitted_second_pass += 1;
        }
    }
    if num_read != spilled_count {
        return Err(RaffiError::InvariantViolation(format!(
            "second pass read {num_read} spill records but {spilled_count} were written"
        )));
    }

    out.flush()?;
    std::fs::remove_file(config.spill_path()).map_err(|e| RaffiError::io(config.spill_path(), e))?;

    tracing::info!(%stats, "run complete");
    if config.print_stats {
        eprintln!("{stats}");
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assign_chromosomes_covers_every_chromosome_exactly_once() {
        for num_threads in 1..=22usize {
            let assignments = assign_chromosomes(num_threads);
            let mut all: Vec<u8> = assignments.into_iter().flatten().collect();
            all.sort_unstable();
            let expected: Vec<u8> = (1..=NUM_CHROMOSOMES).collect();
            assert_eq!(all, expected, "num_threads={num_threads}");
        }
    }
}

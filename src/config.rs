//! The validated, fully-resolved configuration the engine runs with.
//!
//! Distinct from CLI parsing (`src/main.rs`'s `Cli`): a `RunConfig` is what
//! every other module takes as input, so tests can construct one directly
//! without going through argument parsing.

use std::path::PathBuf;

use crate::error::{RaffiError, Result};

/// Total number of human autosomes the engine aggregates across.
pub const NUM_CHROMOSOMES: u8 = 22;

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub input_folder: PathBuf,
    pub vcf_prefix: String,
    pub genetic_map_dir: PathBuf,
    pub rapid_output_dir: PathBuf,
    pub output_dir: PathBuf,
    pub max_degree: u8,
    pub num_threads: usize,
    pub quiet: bool,
    pub print_stats: bool,
}

impl RunConfig {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        input_folder: PathBuf,
        vcf_prefix: String,
        genetic_map_dir: PathBuf,
        rapid_output_dir: PathBuf,
        output_dir: PathBuf,
        max_degree: u8,
        num_threads: usize,
        quiet: bool,
        print_stats: bool,
    ) -> Result<Self> {
        if !(1..=4).contains(&max_degree) {
            return Err(RaffiError::InvalidArgs(format!(
                "max_degree must be in 1..=4, got {max_degree}"
            )));
        }
        if num_threads == 0 {
            return Err(RaffiError::InvalidArgs(
                "num_threads must be at least 1".to_string(),
            ));
        }
        let num_threads = num_threads.min(NUM_CHROMOSOMES as usize);

        Ok(RunConfig {
            input_folder,
            vcf_prefix,
            genetic_map_dir,
            rapid_output_dir,
            output_dir,
            max_degree,
            num_threads,
            quiet,
            print_stats,
        })
    }

    /// Path to the VCF file used to build the sample-ID ordering — the
    /// highest-numbered chromosome's panel, matching the original tool's
    /// choice of its "example" VCF.
    pub fn ordering_vcf_path(&self) -> PathBuf {
        self.input_folder
            .join(format!("{}{}.vcf.gz", self.vcf_prefix, NUM_CHROMOSOMES))
    }

    /// Path to the upstream matcher's results for one chromosome.
    pub fn matcher_output_path(&self, chrom: u8) -> PathBuf {
        self.rapid_output_dir
            .join(chrom.to_string())
            .join("results.max.gz")
    }

    pub fn predictions_path(&self) -> PathBuf {
        self.output_dir.join("predictions.txt")
    }

    pub fn spill_path(&self) -> PathBuf {
        self.output_dir.join(crate::spill::SPILL_FILE_NAME)
    }
}

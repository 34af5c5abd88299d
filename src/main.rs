//! Pairwise relatedness inference from precomputed IBD segment reports.
//!
//! Usage: raffi --input-folder <DIR> --vcf-prefix <PREFIX> --genetic-map-dir <DIR> ...

use std::path::PathBuf;
use std::process;

use clap::Parser;

use raffi_kinship::config::RunConfig;
use raffi_kinship::engine;

#[derive(Parser)]
#[command(name = "raffi")]
#[command(author = "Manish Kumar Bobbili")]
#[command(version)]
#[command(
    about = "Infer pairwise genetic relatedness from precomputed IBD segment reports",
    long_about = None
)]
struct Cli {
    /// Directory containing the gzip-compressed VCF panel (used to build
    /// the sample-ID ordering).
    #[arg(long = "input-folder")]
    input_folder: PathBuf,

    /// Filename prefix shared by every chromosome's VCF, e.g. "panel_chr"
    /// for files named "panel_chr1.vcf.gz" .. "panel_chr22.vcf.gz".
    #[arg(long = "vcf-prefix")]
    vcf_prefix: String,

    /// Directory containing per-chromosome genetic maps ("chrN.rMap").
    #[arg(long = "genetic-map-dir")]
    genetic_map_dir: PathBuf,

    /// Directory containing the upstream matcher's already-produced
    /// per-chromosome output ("<chrom>/results.max.gz"). Invoking the
    /// matcher itself is out of scope for this tool.
    #[arg(long = "rapid-output-dir")]
    rapid_output_dir: PathBuf,

    /// Directory predictions.txt (and, transiently, the spill file) are
    /// written to.
    #[arg(long = "output-dir", default_value = ".")]
    output_dir: PathBuf,

    /// Maximum relatedness degree to report (1 = PO/FS/MZ only, up to 4 =
    /// also report 4th-degree pairs).
    #[arg(long = "max-degree", default_value_t = 4, value_parser = clap::value_parser!(u8).range(1..=4))]
    max_degree: u8,

    /// Number of worker threads; clamped to the number of chromosomes (22).
    #[arg(long = "num-threads", default_value_t = 22, value_parser = clap::value_parser!(u64).range(1..=22))]
    num_threads: u64,

    /// Suppress progress-level logging (warnings and errors still print).
    #[arg(long)]
    quiet: bool,

    /// Print a one-line run summary to stderr on completion.
    #[arg(long)]
    stats: bool,
}

fn init_logging(quiet: bool) {
    use tracing_subscriber::EnvFilter;

    let default_level = if quiet { "warn" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.quiet);

    let config = RunConfig::new(
        cli.input_folder,
        cli.vcf_prefix,
        cli.genetic_map_dir,
        cli.rapid_output_dir,
        cli.output_dir,
        cli.max_degree,
        cli.num_threads as usize,
        cli.quiet,
        cli.stats,
    );

    let config = match config {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = engine::run(&config) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

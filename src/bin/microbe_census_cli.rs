use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::process::ExitCode;

use microbe_census_rs::config::CensusConfig;
use microbe_census_rs::params::ParamTables;
use microbe_census_rs::quality::QualityEncoding;
use microbe_census_rs::report::write_report;
use microbe_census_rs::run_pipeline;
use microbe_census_rs::search::RapsearchAdapter;
use microbe_census_rs::seqio::FileType;

#[derive(Parser)]
#[command(name = "microbe-census-rs")]
#[command(version)]
#[command(about = "Estimate the average genome size of a microbial community from shotgun reads")]
struct Cli {
    /// Input reads (FASTA or FASTQ, optionally gzipped)
    seqfile: PathBuf,

    /// Output report path
    outfile: PathBuf,

    /// Number of reads to use for the estimate
    #[arg(short = 'n', default_value_t = 1_000_000)]
    nreads: usize,

    /// Trim reads to this length (default: largest supported length <= median read length)
    #[arg(short = 'l')]
    read_length: Option<usize>,

    /// File type: fasta or fastq (default: autodetect)
    #[arg(short = 'f')]
    file_type: Option<FileType>,

    /// FASTQ quality encoding: sanger, solexa or illumina (default: autodetect)
    #[arg(short = 'c')]
    qual_code: Option<QualityEncoding>,

    /// Number of threads for the database search
    #[arg(short = 't', default_value_t = 1)]
    threads: usize,

    /// Minimum base-level PHRED quality (-5 disables the filter)
    #[arg(short = 'q', default_value_t = -5, allow_negative_numbers = true)]
    min_quality: i32,

    /// Minimum read-level mean PHRED quality (-5 disables the filter)
    #[arg(short = 'm', default_value_t = -5.0, allow_negative_numbers = true)]
    mean_quality: f64,

    /// Filter exact duplicate reads
    #[arg(short = 'd')]
    filter_dups: bool,

    /// Maximum percent of unknown bases per read
    #[arg(short = 'u', default_value_t = 100.0)]
    max_unknown: f64,

    /// Keep temporary search files
    #[arg(short = 'k')]
    keep_tmp: bool,

    /// Directory holding the parameter tables and search database
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Search database, relative to the data directory unless absolute
    #[arg(long, default_value = "rapdb_2.15")]
    database: PathBuf,

    /// Path to the RAPsearch2 binary
    #[arg(long, default_value = "rapsearch")]
    search_bin: PathBuf,
}

fn spinner(color: &str, msg: &'static str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
            .template(&format!("{{spinner:.{color}}} {{msg}}"))
            .expect("Invalid spinner template"),
    );
    spinner.set_message(msg);
    spinner
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), microbe_census_rs::Error> {
    // 1. Load parameter tables and validate options
    let sp = spinner("blue", "Loading parameter tables...");
    let tables = ParamTables::load_dir(&cli.data_dir)?;
    let config = CensusConfig {
        n_reads: cli.nreads,
        read_length: cli.read_length,
        file_type: cli.file_type,
        quality_encoding: cli.qual_code,
        threads: cli.threads,
        min_base_quality: cli.min_quality,
        min_mean_quality: cli.mean_quality,
        filter_duplicates: cli.filter_dups,
        max_unknown_fraction: cli.max_unknown / 100.0,
        keep_temp: cli.keep_tmp,
    };
    let resolved = config.validate(&tables, &cli.seqfile)?;
    sp.finish_with_message(format!(
        "Using {} bp {} reads.",
        resolved.read_length, resolved.file_type
    ));

    // 2. Sample, search, classify, aggregate, predict
    let sp = spinner("green", "Estimating average genome size...");
    let work_dir = cli
        .outfile
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let search = RapsearchAdapter {
        binary: cli.search_bin.clone(),
        database: cli.data_dir.join(&cli.database),
        work_dir,
        keep_temp: resolved.keep_temp,
        gene_to_family: &tables.gene_to_family,
        gene_lengths: &tables.gene_lengths,
    };
    let results = run_pipeline(&resolved, &tables, &search)?;
    sp.finish_with_message("Estimation finished.");

    // 3. Report
    let sp = spinner("yellow", "Writing report...");
    write_report(&cli.outfile, &results)?;
    sp.finish_with_message("Report written.");

    println!(
        "Average genome size (bp): {:.2}",
        results.estimate().average_genome_size
    );
    Ok(())
}

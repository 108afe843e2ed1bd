// src/lib.rs
pub mod aggregate;
pub mod classify;
pub mod config;
pub mod error;
pub mod params;
pub mod predict;
pub mod quality;
pub mod report;
pub mod sampler;
pub mod search;
pub mod seqio;
pub mod types;

use std::path::{Path, PathBuf};

use crate::aggregate::{aggregate, AggregatedCounts};
use crate::classify::{classify_reads_parallel, group_hits_by_read, ClassifyStats};
use crate::config::{CensusConfig, ResolvedConfig};
use crate::error::{CensusError, Result};
use crate::params::ParamTables;
use crate::predict::{predict, OutlierRule, Prediction};
use crate::sampler::{sample_file, SamplingStats};
use crate::search::SearchAdapter;

pub use crate::error::CensusError as Error;
pub use crate::types::{ClassifiedHit, FinalEstimate, ModelPrediction, RawHit, Read};

/// Search artifacts kept on disk when temporary files are retained.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFiles {
    pub results_path: Option<PathBuf>,
    pub alignment_path: Option<PathBuf>,
}

/// Everything one estimation run produced, stage by stage.
#[derive(Debug, Clone)]
pub struct CensusResults {
    pub config: ResolvedConfig,
    pub sampling: SamplingStats,
    pub classification: ClassifyStats,
    pub counts: AggregatedCounts,
    pub prediction: Prediction,
    pub search: SearchFiles,
}

impl CensusResults {
    pub fn estimate(&self) -> FinalEstimate {
        self.prediction.estimate
    }

    /// Sampled bases divided by the average genome size.
    pub fn genome_equivalents(&self) -> f64 {
        let est = &self.prediction.estimate;
        if est.average_genome_size > 0.0 {
            (est.reads_used * self.config.read_length) as f64 / est.average_genome_size
        } else {
            0.0
        }
    }

    /// Report text, generated on demand.
    pub fn get_report(&self) -> String {
        report::render_report(self)
    }
}

/// Run every stage on an already validated configuration.
///
/// Stages run strictly in order and the first error aborts the run:
/// sampling, search, classification, aggregation, prediction.
pub fn run_pipeline<S: SearchAdapter + ?Sized>(
    cfg: &ResolvedConfig,
    tables: &ParamTables,
    search: &S,
) -> Result<CensusResults> {
    let family_params = tables.family_params_for(cfg.read_length)?;
    let coefficients = tables.coefficients_for(cfg.read_length)?;
    let weights = tables.weights_for(cfg.read_length)?;

    // 1. Draw the representative subset of reads
    let sampled = sample_file(&cfg.input, cfg.file_type, &cfg.sampler_config())?;
    let reads_sampled = sampled.read_count();

    // 2. Search the sampled reads against the marker gene families
    let searched = search.search(&sampled.reads, cfg.threads)?;
    drop(sampled.reads);

    // 3. Keep at most one best hit per read
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(cfg.threads)
        .build()
        .map_err(|e| CensusError::Config(format!("cannot start worker pool: {e}")))?;
    let hits_by_read = group_hits_by_read(searched.hits);
    let (classified, classification) =
        pool.install(|| classify_reads_parallel(&hits_by_read, family_params));
    log::info!(
        "Classified {} of {} reads with hits",
        classification.reads_classified,
        classification.reads_with_hits
    );

    // 4. Per-family hit counts and coverage
    let counts = pool.install(|| aggregate(&classified, family_params, reads_sampled, cfg.read_length));

    // 5. Per-family predictions, outlier removal, weighted consensus
    let prediction = predict(&counts, coefficients, weights, &OutlierRule::default())?;

    Ok(CensusResults {
        config: cfg.clone(),
        sampling: sampled.stats,
        classification,
        counts,
        prediction,
        search: SearchFiles {
            results_path: searched.results_path,
            alignment_path: searched.alignment_path,
        },
    })
}

/// Validate the configuration, then estimate the average genome size of `input`.
pub fn estimate_genome_size<S: SearchAdapter + ?Sized>(
    input: &Path,
    config: &CensusConfig,
    tables: &ParamTables,
    search: &S,
) -> Result<CensusResults> {
    let resolved = config.validate(tables, input)?;
    log::info!(
        "Estimating average genome size from {} ({}, {} bp reads, up to {} reads)",
        resolved.input.display(),
        resolved.file_type,
        resolved.read_length,
        resolved.n_reads
    );
    run_pipeline(&resolved, tables, search)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{GeneFamilyParams, ModelCoefficients};
    use crate::search::SearchOutput;
    use crate::seqio::FileType;
    use crate::types::ModelForm;
    use std::fmt::Write as _;

    const FAMILIES: usize = 30;

    /// Reports `per_family` passing hits for each of the 30 families on the
    /// leading reads, plus a sub-threshold decoy hit on every read.
    struct UniformSearch {
        per_family: usize,
    }

    impl SearchAdapter for UniformSearch {
        fn search(&self, reads: &[Read], _threads: usize) -> Result<SearchOutput> {
            let mut hits = Vec::new();
            for (i, read) in reads.iter().enumerate() {
                if i < self.per_family * FAMILIES {
                    hits.push(RawHit {
                        read_id: read.id.clone(),
                        family: family_id(i % FAMILIES),
                        score: 60.0,
                        identity: 85.0,
                        aln_len: 30,
                        target_coverage: 0.1,
                    });
                }
                hits.push(RawHit {
                    read_id: read.id.clone(),
                    family: family_id((i + 1) % FAMILIES),
                    score: 12.0,
                    identity: 40.0,
                    aln_len: 30,
                    target_coverage: 0.1,
                });
            }
            Ok(SearchOutput { hits, ..Default::default() })
        }
    }

    struct FailingSearch;

    impl SearchAdapter for FailingSearch {
        fn search(&self, _reads: &[Read], _threads: usize) -> Result<SearchOutput> {
            Err(CensusError::Search("search tool exited with status 1".into()))
        }
    }

    fn family_id(i: usize) -> String {
        format!("B{:06}", i)
    }

    /// 30 families calibrated so that a coverage of 0.01 predicts 5 Mbp.
    fn calibrated_tables() -> ParamTables {
        let mut tables = ParamTables {
            supported_read_lengths: vec![100],
            ..Default::default()
        };
        let params = tables.family_params.entry(100).or_default();
        for i in 0..FAMILIES {
            params.insert(
                family_id(i),
                GeneFamilyParams {
                    min_score: 40.0,
                    min_aln_len: 20,
                    expected_gene_length: 1000.0,
                    norm_coefficient: 1.0,
                },
            );
        }
        let coeffs = tables.coefficients.entry(100).or_default();
        for i in 0..FAMILIES {
            coeffs.insert(
                family_id(i),
                ModelCoefficients { form: ModelForm::LogLinear, intercept: 50_000f64.ln(), slope: -1.0 },
            );
        }
        let weights = tables.weights.entry(100).or_default();
        for i in 0..FAMILIES {
            weights.insert(family_id(i), 0.5 + i as f64 / 10.0);
        }
        tables
    }

    fn write_fasta(dir: &Path, n: usize, len: usize) -> PathBuf {
        let mut text = String::with_capacity(n * (len + 12));
        let unit = "ACGT";
        for i in 0..n {
            let seq = unit.repeat(len / unit.len() + 1);
            let _ = writeln!(text, ">read{i}\n{}", &seq[..len]);
        }
        let path = dir.join("reads.fa");
        std::fs::write(&path, text).unwrap();
        path
    }

    fn fasta_config() -> CensusConfig {
        CensusConfig {
            n_reads: 10_000,
            read_length: Some(100),
            file_type: Some(FileType::Fasta),
            ..Default::default()
        }
    }

    #[test]
    fn test_uniform_coverage_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_fasta(dir.path(), 10_000, 100);
        let tables = calibrated_tables();

        // 10 hits per family: 10 * 1000 / (10_000 * 100) = 0.01 coverage
        let results =
            estimate_genome_size(&input, &fasta_config(), &tables, &UniformSearch { per_family: 10 }).unwrap();

        assert_eq!(results.estimate().reads_used, 10_000);
        assert!((results.estimate().average_genome_size - 5_000_000.0).abs() < 1.0);
        assert_eq!(results.counts.families.len(), FAMILIES);
        assert!(results
            .counts
            .families
            .values()
            .all(|c| c.hits == 10 && (c.coverage - 0.01).abs() < 1e-12));
        assert_eq!(results.prediction.predictions.len(), FAMILIES);
        assert_eq!(results.prediction.outliers().count(), 0);
        assert_eq!(results.classification.reads_classified, 300);
        assert_eq!(results.classification.reads_with_hits, 10_000);
        assert!((results.genome_equivalents() - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_rerun_is_bit_identical() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_fasta(dir.path(), 2_000, 120);
        let tables = calibrated_tables();
        let search = UniformSearch { per_family: 3 };

        let a = estimate_genome_size(&input, &fasta_config(), &tables, &search).unwrap();
        let b = estimate_genome_size(&input, &fasta_config(), &tables, &search).unwrap();
        assert_eq!(
            a.estimate().average_genome_size.to_bits(),
            b.estimate().average_genome_size.to_bits()
        );
        assert_eq!(a.counts, b.counts);
        assert_eq!(a.prediction, b.prediction);
        assert_eq!(a.get_report(), b.get_report());
    }

    #[test]
    fn test_smaller_sample_than_requested() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_fasta(dir.path(), 600, 100);
        let results = estimate_genome_size(
            &input,
            &fasta_config(),
            &calibrated_tables(),
            &UniformSearch { per_family: 2 },
        )
        .unwrap();
        assert_eq!(results.estimate().reads_used, 600);
        assert_eq!(results.sampling.accepted, 600);
    }

    #[test]
    fn test_no_family_coverage_is_prediction_failure() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_fasta(dir.path(), 100, 100);
        let err = estimate_genome_size(
            &input,
            &fasta_config(),
            &calibrated_tables(),
            &UniformSearch { per_family: 0 },
        )
        .unwrap_err();
        assert!(matches!(err, CensusError::NoCoverage));
    }

    #[test]
    fn test_search_failure_aborts_run() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_fasta(dir.path(), 100, 100);
        let err = estimate_genome_size(&input, &fasta_config(), &calibrated_tables(), &FailingSearch).unwrap_err();
        assert!(matches!(err, CensusError::Search(_)));
    }

    #[test]
    fn test_configuration_checked_before_sampling() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_fasta(dir.path(), 100, 100);
        let cfg = CensusConfig { read_length: Some(150), ..fasta_config() };
        let err = estimate_genome_size(&input, &cfg, &calibrated_tables(), &FailingSearch).unwrap_err();
        assert!(matches!(err, CensusError::UnsupportedReadLength { length: 150, .. }));
    }

    #[test]
    fn test_report_lists_every_family() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_fasta(dir.path(), 10_000, 100);
        let results = estimate_genome_size(
            &input,
            &fasta_config(),
            &calibrated_tables(),
            &UniformSearch { per_family: 10 },
        )
        .unwrap();

        let out = dir.path().join("census.txt");
        report::write_report(&out, &results).unwrap();
        let text = std::fs::read_to_string(&out).unwrap();
        assert!(text.contains("reads_sampled:\t10000"));
        assert!(text.contains("trimmed_length:\t100"));
        assert!(text.contains("average_genome_size:\t5000000.00"));
        assert_eq!(text.lines().filter(|l| l.starts_with("B0")).count(), FAMILIES);
    }

    fn write_fastq(dir: &Path, low_quality: usize, good: usize, len: usize) -> PathBuf {
        let seq = "ACGT".repeat(len / 4 + 1);
        let seq = &seq[..len];
        let good_qual = "I".repeat(len);
        let low_qual = format!("#{}", "I".repeat(len - 1));
        let mut text = String::new();
        for i in 0..low_quality + good {
            let qual = if i < low_quality { &low_qual } else { &good_qual };
            let _ = writeln!(text, "@read{i}\n{seq}\n+\n{qual}");
        }
        let path = dir.join("reads.fq");
        std::fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_fastq_end_to_end_with_autodetection() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_fastq(dir.path(), 200, 10_000, 100);
        let cfg = CensusConfig {
            n_reads: 10_000,
            min_base_quality: 10,
            ..Default::default()
        };

        let results =
            estimate_genome_size(&input, &cfg, &calibrated_tables(), &UniformSearch { per_family: 10 }).unwrap();

        assert_eq!(results.config.file_type, FileType::Fastq);
        assert_eq!(results.config.read_length, 100);
        assert_eq!(results.config.quality_encoding, Some(crate::quality::QualityEncoding::Sanger));
        assert_eq!(results.sampling.records_seen, 10_200);
        assert_eq!(results.sampling.low_base_quality, 200);
        assert_eq!(results.estimate().reads_used, 10_000);
        assert!((results.estimate().average_genome_size - 5_000_000.0).abs() < 1.0);
    }

    #[test]
    fn test_report_marks_families_without_prediction() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_fasta(dir.path(), 10_000, 100);
        let mut tables = calibrated_tables();
        tables.coefficients.entry(100).or_default().remove(&family_id(0));

        let results =
            estimate_genome_size(&input, &fasta_config(), &tables, &UniformSearch { per_family: 10 }).unwrap();
        assert_eq!(results.prediction.predictions.len(), FAMILIES - 1);

        let text = results.get_report();
        assert!(text.contains("B000000\t10\t0.010000\tNA\tNA\tNA"));
        assert!(text.contains("B000001\t10\t0.010000\t5000000.00\t"));
    }
}

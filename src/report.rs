//src/report.rs

use ahash::AHashMap;
use std::fmt::Write as FmtWrite;
use std::fs;
use std::path::Path;

use crate::error::{CensusError, Result};
use crate::types::ModelPrediction;
use crate::CensusResults;

/// Render the run summary followed by a per-family table.
///
/// ```text
/// Parameters:
/// metagenome:	reads.fq
/// reads_sampled:	10000
/// trimmed_length:	100
/// ...
/// Results:
/// average_genome_size:	5000000.00
/// total_genome_equivalents:	2.00
/// ```
pub fn render_report(results: &CensusResults) -> String {
    let mut out = String::new();
    let cfg = &results.config;
    let est = &results.prediction.estimate;

    // writing into a String cannot fail
    let _ = writeln!(out, "Parameters:");
    let _ = writeln!(out, "metagenome:\t{}", cfg.input.display());
    let _ = writeln!(out, "file_type:\t{}", cfg.file_type);
    if let Some(enc) = cfg.quality_encoding {
        let _ = writeln!(out, "quality_encoding:\t{}", enc);
    }
    let _ = writeln!(out, "reads_sampled:\t{}", est.reads_used);
    let _ = writeln!(out, "trimmed_length:\t{}", cfg.read_length);
    let _ = writeln!(out, "min_base_quality:\t{}", cfg.min_base_quality);
    let _ = writeln!(out, "min_mean_quality:\t{}", cfg.min_mean_quality);
    let _ = writeln!(out, "filter_duplicates:\t{}", cfg.filter_duplicates);
    let _ = writeln!(out, "max_unknown_fraction:\t{}", cfg.max_unknown_fraction);
    out.push('\n');

    let _ = writeln!(out, "Results:");
    let _ = writeln!(out, "average_genome_size:\t{:.2}", est.average_genome_size);
    let _ = writeln!(out, "total_genome_equivalents:\t{:.2}", results.genome_equivalents());
    if let Some(p) = &results.search.results_path {
        let _ = writeln!(out, "search_results:\t{}", p.display());
    }
    if let Some(p) = &results.search.alignment_path {
        let _ = writeln!(out, "search_alignments:\t{}", p.display());
    }
    out.push('\n');

    let by_family: AHashMap<&str, &ModelPrediction> = results
        .prediction
        .predictions
        .iter()
        .map(|p| (p.family.as_str(), p))
        .collect();
    let _ = writeln!(out, "family\thits\tcoverage\tpredicted_size\tweight\toutlier");
    for (family, count) in &results.counts.families {
        match by_family.get(family.as_str()) {
            Some(p) => {
                let _ = writeln!(
                    out,
                    "{}\t{}\t{:.6}\t{:.2}\t{:.4}\t{}",
                    family, count.hits, count.coverage, p.genome_size, p.weight, p.outlier
                );
            }
            None => {
                let _ = writeln!(out, "{}\t{}\t{:.6}\tNA\tNA\tNA", family, count.hits, count.coverage);
            }
        }
    }
    out
}

/// Write the rendered report to `path`.
pub fn write_report(path: &Path, results: &CensusResults) -> Result<()> {
    fs::write(path, render_report(results)).map_err(|e| CensusError::io(path, e))?;
    log::info!("Wrote report to {}", path.display());
    Ok(())
}

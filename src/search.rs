//src/search.rs

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::{CensusError, Result};
use crate::params::{GeneFamilyMap, GeneLengthMap};
use crate::types::{RawHit, Read};

/// What a search run hands back to the pipeline.
#[derive(Debug, Clone, Default)]
pub struct SearchOutput {
    pub hits: Vec<RawHit>,
    /// Tabular results file, when it was retained on disk.
    pub results_path: Option<PathBuf>,
    /// Alignment detail file, when it was retained on disk.
    pub alignment_path: Option<PathBuf>,
}

/// Anything that can search sampled reads against the marker gene database.
///
/// Implementations must be deterministic for a given input; failures are
/// fatal and are never retried.
pub trait SearchAdapter {
    fn search(&self, reads: &[Read], threads: usize) -> Result<SearchOutput>;
}

/// One row of BLAST-style tabular (`.m8`) output.
#[derive(Debug, Clone, PartialEq)]
pub struct M8Record {
    pub query: String,
    pub target: String,
    pub identity: f64,
    pub aln_len: u32,
    pub mismatches: u32,
    pub gaps: u32,
    pub query_start: u32,
    pub query_end: u32,
    pub target_start: u32,
    pub target_end: u32,
    pub evalue: f64,
    pub bit_score: f64,
}

impl M8Record {
    /// Parse a tab-separated row with the 12 standard columns.
    pub fn parse_line(line: &str) -> std::result::Result<Self, String> {
        let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
        if fields.len() < 12 {
            return Err(format!("expected 12 fields, found {}", fields.len()));
        }
        fn num<T: std::str::FromStr>(s: &str, what: &str) -> std::result::Result<T, String> {
            s.parse().map_err(|_| format!("invalid {what}: '{s}'"))
        }

        Ok(Self {
            query: fields[0].to_string(),
            target: fields[1].to_string(),
            identity: num(fields[2], "identity")?,
            aln_len: num(fields[3], "alignment length")?,
            mismatches: num(fields[4], "mismatches")?,
            gaps: num(fields[5], "gap openings")?,
            query_start: num(fields[6], "query start")?,
            query_end: num(fields[7], "query end")?,
            target_start: num(fields[8], "target start")?,
            target_end: num(fields[9], "target end")?,
            evalue: num(fields[10], "e-value")?,
            bit_score: num(fields[11], "bit score")?,
        })
    }

    /// Map the hit onto its gene family; `None` for genes missing from the catalog.
    pub fn to_raw_hit(&self, gene_to_family: &GeneFamilyMap, gene_lengths: &GeneLengthMap) -> Option<RawHit> {
        let family = gene_to_family.get(&self.target)?;
        let target_coverage = match gene_lengths.get(&self.target) {
            Some(&len) if len > 0 => self.aln_len as f64 / len as f64,
            _ => 0.0,
        };
        Some(RawHit {
            read_id: self.query.clone(),
            family: family.clone(),
            score: self.bit_score,
            identity: self.identity,
            aln_len: self.aln_len,
            target_coverage,
        })
    }
}

/// Read an `.m8` file and convert each row into a `RawHit`.
pub fn read_m8_hits(path: &Path, gene_to_family: &GeneFamilyMap, gene_lengths: &GeneLengthMap) -> Result<Vec<RawHit>> {
    let file = File::open(path).map_err(|e| CensusError::io(path, e))?;
    let reader = BufReader::new(file);

    let mut hits = Vec::new();
    let mut unknown_genes = 0usize;
    for (i, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| CensusError::io(path, e))?;
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        let rec = M8Record::parse_line(&line).map_err(|detail| CensusError::format(path, i + 1, detail))?;
        match rec.to_raw_hit(gene_to_family, gene_lengths) {
            Some(hit) => hits.push(hit),
            None => unknown_genes += 1,
        }
    }
    if unknown_genes > 0 {
        log::debug!("Skipped {} hits to genes without a family assignment", unknown_genes);
    }
    Ok(hits)
}

/// Write sampled reads as single-line FASTA, the query format of the search tool.
pub fn write_reads_fasta(path: &Path, reads: &[Read]) -> Result<()> {
    let file = File::create(path).map_err(|e| CensusError::io(path, e))?;
    let mut out = BufWriter::new(file);
    for read in reads {
        writeln!(out, ">{}\n{}", read.id, read.seq).map_err(|e| CensusError::io(path, e))?;
    }
    out.flush().map_err(|e| CensusError::io(path, e))
}

/// Drives the external RAPsearch2 protein search binary.
pub struct RapsearchAdapter<'a> {
    pub binary: PathBuf,
    pub database: PathBuf,
    pub work_dir: PathBuf,
    pub keep_temp: bool,
    pub gene_to_family: &'a GeneFamilyMap,
    pub gene_lengths: &'a GeneLengthMap,
}

impl RapsearchAdapter<'_> {
    /// Write the query, run the tool and parse its tabular output inside `scratch`.
    fn run_in(&self, scratch: &Path, reads: &[Read], threads: usize) -> Result<Vec<RawHit>> {
        let prefix = scratch.join(SEARCH_PREFIX);
        let query_path = scratch.join("query.fa");
        write_reads_fasta(&query_path, reads)?;

        log::info!(
            "Searching {} reads against {} with {} thread(s)",
            reads.len(),
            self.database.display(),
            threads
        );
        let output = Command::new(&self.binary)
            .arg("-q")
            .arg(&query_path)
            .arg("-d")
            .arg(&self.database)
            .arg("-o")
            .arg(&prefix)
            .args(["-z", &threads.to_string(), "-e", "1", "-t", "n"])
            .stdout(Stdio::null())
            .output()
            .map_err(|e| {
                CensusError::Search(format!("failed to launch '{}': {}", self.binary.display(), e))
            })?;
        if !output.status.success() {
            return Err(CensusError::Search(format!(
                "'{}' exited with {}: {}",
                self.binary.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let hits = read_m8_hits(&prefix.with_extension("m8"), self.gene_to_family, self.gene_lengths)?;
        log::info!("Search produced {} candidate hits", hits.len());
        Ok(hits)
    }
}

/// Output prefix handed to the search tool; it appends `.m8` and `.aln`.
const SEARCH_PREFIX: &str = "hits";

impl SearchAdapter for RapsearchAdapter<'_> {
    fn search(&self, reads: &[Read], threads: usize) -> Result<SearchOutput> {
        if threads < 1 {
            return Err(CensusError::Config("search needs at least one thread".into()));
        }
        let scratch = tempfile::Builder::new()
            .prefix("census_")
            .tempdir_in(&self.work_dir)
            .map_err(|e| CensusError::io(&self.work_dir, e))?;
        let result = self.run_in(scratch.path(), reads, threads);

        if !self.keep_temp {
            // scratch directory and everything in it goes away on drop
            return result.map(|hits| SearchOutput {
                hits,
                ..Default::default()
            });
        }

        let kept = scratch.keep();
        log::info!("Keeping search files in {}", kept.display());
        let hits = result?;
        let prefix = kept.join(SEARCH_PREFIX);
        let m8_path = prefix.with_extension("m8");
        let aln_path = prefix.with_extension("aln");
        Ok(SearchOutput {
            hits,
            results_path: Some(m8_path),
            alignment_path: aln_path.exists().then_some(aln_path),
        })
    }
}

//src/config.rs

use std::path::{Path, PathBuf};

use crate::error::{CensusError, Result};
use crate::params::ParamTables;
use crate::quality::{encoding_from_min_byte, QualityEncoding};
use crate::sampler::{SamplerConfig, NO_QUALITY_FILTER};
use crate::seqio::{detect_read_length, probe_min_quality_byte, probe_read_lengths, sniff_file_type, FileType, READ_LENGTH_PROBE};

/// Number of FASTQ records scanned when guessing the quality encoding.
pub const QUALITY_PROBE_DEPTH: usize = 1_000_000;

/// Run parameters as supplied by the caller. `None` means autodetect.
#[derive(Debug, Clone)]
pub struct CensusConfig {
    pub n_reads: usize,
    pub read_length: Option<usize>,
    pub file_type: Option<FileType>,
    pub quality_encoding: Option<QualityEncoding>,
    pub threads: usize,
    pub min_base_quality: i32,
    pub min_mean_quality: f64,
    pub filter_duplicates: bool,
    /// Largest tolerated fraction (0..=1) of unknown bases per read.
    pub max_unknown_fraction: f64,
    pub keep_temp: bool,
}

impl Default for CensusConfig {
    fn default() -> Self {
        Self {
            n_reads: 1_000_000,
            read_length: None,
            file_type: None,
            quality_encoding: None,
            threads: 1,
            min_base_quality: NO_QUALITY_FILTER,
            min_mean_quality: NO_QUALITY_FILTER as f64,
            filter_duplicates: false,
            max_unknown_fraction: 1.0,
            keep_temp: false,
        }
    }
}

/// A validated configuration with every autodetected value filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub input: PathBuf,
    pub n_reads: usize,
    pub read_length: usize,
    pub file_type: FileType,
    /// Always set for FASTQ, never for FASTA.
    pub quality_encoding: Option<QualityEncoding>,
    pub threads: usize,
    pub min_base_quality: i32,
    pub min_mean_quality: f64,
    pub filter_duplicates: bool,
    pub max_unknown_fraction: f64,
    pub keep_temp: bool,
}

impl ResolvedConfig {
    pub fn sampler_config(&self) -> SamplerConfig {
        SamplerConfig {
            target_count: self.n_reads,
            target_length: self.read_length,
            min_base_quality: self.min_base_quality,
            min_mean_quality: self.min_mean_quality,
            filter_duplicates: self.filter_duplicates,
            max_unknown_fraction: self.max_unknown_fraction,
            encoding: self.quality_encoding,
        }
    }
}

impl CensusConfig {
    fn requests_quality_filtering(&self) -> bool {
        self.min_base_quality > NO_QUALITY_FILTER
            || self.min_mean_quality > NO_QUALITY_FILTER as f64
            || self.quality_encoding.is_some()
    }

    /// Check every parameter and resolve the autodetected ones.
    ///
    /// Runs before any pipeline stage, so a bad configuration never leaves
    /// partial work behind.
    pub fn validate(&self, tables: &ParamTables, input: &Path) -> Result<ResolvedConfig> {
        if !input.is_file() {
            return Err(CensusError::Config(format!(
                "input file '{}' does not exist",
                input.display()
            )));
        }
        if self.threads < 1 {
            return Err(CensusError::Config(
                "invalid number of threads; must be a positive integer".into(),
            ));
        }
        if self.n_reads < 1 {
            return Err(CensusError::Config(
                "invalid number of reads; must be a positive integer".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.max_unknown_fraction) {
            return Err(CensusError::Config(format!(
                "max unknown fraction {} must lie between 0 and 1",
                self.max_unknown_fraction
            )));
        }

        let file_type = match self.file_type {
            Some(ft) => ft,
            None => sniff_file_type(input)?,
        };
        if file_type == FileType::Fasta && self.requests_quality_filtering() {
            return Err(CensusError::Config(
                "quality filtering options are only available for FASTQ files".into(),
            ));
        }

        let read_length = match self.read_length {
            Some(len) => len,
            None => {
                let lengths = probe_read_lengths(input, file_type, READ_LENGTH_PROBE)?;
                let detected = detect_read_length(&lengths, &tables.supported_read_lengths).ok_or_else(|| {
                    CensusError::Config(format!(
                        "reads are shorter than every supported read length {:?}",
                        tables.supported_read_lengths
                    ))
                })?;
                log::info!("Detected read length {}", detected);
                detected
            }
        };
        tables.check_read_length(read_length)?;

        let quality_encoding = match (file_type, self.quality_encoding) {
            (FileType::Fasta, _) => None,
            (FileType::Fastq, Some(enc)) => Some(enc),
            (FileType::Fastq, None) => {
                let enc = encoding_from_min_byte(probe_min_quality_byte(input, QUALITY_PROBE_DEPTH)?);
                log::info!("Detected FASTQ quality encoding: {}", enc);
                Some(enc)
            }
        };

        Ok(ResolvedConfig {
            input: input.to_path_buf(),
            n_reads: self.n_reads,
            read_length,
            file_type,
            quality_encoding,
            threads: self.threads,
            min_base_quality: self.min_base_quality,
            min_mean_quality: self.min_mean_quality,
            filter_duplicates: self.filter_duplicates,
            max_unknown_fraction: self.max_unknown_fraction,
            keep_temp: self.keep_temp,
        })
    }
}

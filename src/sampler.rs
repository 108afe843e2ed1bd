//src/sampler.rs

use ahash::AHashSet;
use std::path::Path;

use crate::error::{CensusError, Result};
use crate::quality::QualityEncoding;
use crate::seqio::{FileType, SeqReader, SeqRecord};
use crate::types::Read;

/// Quality floor at or below which no per-base or mean filtering happens.
pub const NO_QUALITY_FILTER: i32 = -5;

/// Settings for drawing the representative subset of reads.
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    pub target_count: usize,
    pub target_length: usize,
    pub min_base_quality: i32,
    pub min_mean_quality: f64,
    pub filter_duplicates: bool,
    /// Largest tolerated fraction of bases outside `ACGT`.
    pub max_unknown_fraction: f64,
    /// Required for FASTQ input, ignored for FASTA.
    pub encoding: Option<QualityEncoding>,
}

impl SamplerConfig {
    fn filters_quality(&self) -> bool {
        self.min_base_quality > NO_QUALITY_FILTER || self.min_mean_quality > NO_QUALITY_FILTER as f64
    }
}

/// Why reads were turned away, in the order the checks are applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SamplingStats {
    pub records_seen: usize,
    pub accepted: usize,
    pub too_short: usize,
    /// Trimmed window holds bytes outside ASCII.
    pub non_ascii: usize,
    pub too_many_unknown: usize,
    pub low_base_quality: usize,
    pub low_mean_quality: usize,
    pub duplicates: usize,
}

impl SamplingStats {
    pub fn rejected(&self) -> usize {
        self.too_short
            + self.non_ascii
            + self.too_many_unknown
            + self.low_base_quality
            + self.low_mean_quality
            + self.duplicates
    }
}

#[derive(Debug, Clone)]
pub struct SampledReads {
    pub reads: Vec<Read>,
    pub stats: SamplingStats,
}

impl SampledReads {
    pub fn read_count(&self) -> usize {
        self.reads.len()
    }
}

enum Verdict {
    Accept(Read),
    TooShort,
    NonAscii,
    TooManyUnknown,
    LowBaseQuality,
    LowMeanQuality,
}

/// Fraction of bases that are not one of `ACGT` (case-insensitive).
pub fn unknown_fraction(seq: &[u8]) -> f64 {
    if seq.is_empty() {
        return 0.0;
    }
    let unknown = seq
        .iter()
        .filter(|b| !matches!(b, b'A' | b'C' | b'G' | b'T' | b'a' | b'c' | b'g' | b't'))
        .count();
    unknown as f64 / seq.len() as f64
}

fn judge(rec: SeqRecord, cfg: &SamplerConfig) -> Verdict {
    let len = cfg.target_length;
    if rec.seq.len() < len {
        return Verdict::TooShort;
    }

    // every emitted read is exactly `len` bases, one byte each
    let Some(window) = rec.seq.get(..len).filter(|w| w.is_ascii()) else {
        return Verdict::NonAscii;
    };
    if unknown_fraction(window.as_bytes()) > cfg.max_unknown_fraction {
        return Verdict::TooManyUnknown;
    }

    let quals = match (&rec.qual, cfg.encoding) {
        (Some(raw), Some(enc)) => {
            let Some(raw) = raw.get(..len) else {
                return Verdict::TooShort;
            };
            let decoded = enc.decode(raw);
            if cfg.min_base_quality > NO_QUALITY_FILTER && decoded.iter().any(|&q| q < cfg.min_base_quality) {
                return Verdict::LowBaseQuality;
            }
            if cfg.min_mean_quality > NO_QUALITY_FILTER as f64 {
                let mean = decoded.iter().map(|&q| q as f64).sum::<f64>() / len as f64;
                if mean < cfg.min_mean_quality {
                    return Verdict::LowMeanQuality;
                }
            }
            Some(decoded)
        }
        _ => None,
    };

    Verdict::Accept(Read {
        id: rec.id,
        seq: window.to_string(),
        quals,
    })
}

/// Draw the first `target_count` reads that survive every filter, in source order.
///
/// The source is consumed in a single forward pass and reading stops as soon
/// as enough reads have been accepted. Running out of input early is not an
/// error; the caller gets whatever was accepted.
pub fn sample<I>(records: I, cfg: &SamplerConfig) -> Result<SampledReads>
where
    I: IntoIterator<Item = Result<SeqRecord>>,
{
    if cfg.target_length == 0 {
        return Err(CensusError::Config("target read length must be positive".into()));
    }

    let mut stats = SamplingStats::default();
    let mut reads = Vec::with_capacity(cfg.target_count.min(1 << 20));
    let mut seen: AHashSet<String> = AHashSet::new();

    for rec in records {
        if reads.len() >= cfg.target_count {
            break;
        }
        let rec = rec?;
        stats.records_seen += 1;

        match judge(rec, cfg) {
            Verdict::Accept(read) => {
                if cfg.filter_duplicates && !seen.insert(read.seq.clone()) {
                    stats.duplicates += 1;
                    continue;
                }
                reads.push(read);
            }
            Verdict::TooShort => stats.too_short += 1,
            Verdict::NonAscii => stats.non_ascii += 1,
            Verdict::TooManyUnknown => stats.too_many_unknown += 1,
            Verdict::LowBaseQuality => stats.low_base_quality += 1,
            Verdict::LowMeanQuality => stats.low_mean_quality += 1,
        }
    }
    stats.accepted = reads.len();

    log::info!(
        "Sampled {} of {} requested reads ({} records scanned, {} rejected)",
        stats.accepted,
        cfg.target_count,
        stats.records_seen,
        stats.rejected()
    );
    log::debug!("Sampling rejections: {:?}", stats);
    if stats.accepted < cfg.target_count {
        log::warn!(
            "Input exhausted after {} reads passed filters; continuing with the smaller sample",
            stats.accepted
        );
    }

    Ok(SampledReads { reads, stats })
}

/// Sample reads straight from a FASTA/FASTQ file.
pub fn sample_file(path: &Path, file_type: FileType, cfg: &SamplerConfig) -> Result<SampledReads> {
    if file_type == FileType::Fastq && cfg.encoding.is_none() {
        return Err(CensusError::Config("FASTQ sampling requires a quality encoding".into()));
    }
    if file_type == FileType::Fasta && cfg.filters_quality() {
        return Err(CensusError::Config(
            "quality filtering options are only available for FASTQ files".into(),
        ));
    }
    let reader = SeqReader::open(path, file_type)?;
    sample(reader, cfg)
}

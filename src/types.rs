//src/types.rs

use std::fmt;

/// A single-copy marker gene family identifier, e.g. `B000032`.
pub type FamilyId = String;

/// A sampled read. All reads from one sampling run share the same trimmed length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Read {
    pub id: String,
    pub seq: String,
    /// Decoded PHRED scores for the trimmed bases (FASTQ input only).
    pub quals: Option<Vec<i32>>,
}

impl Read {
    pub fn len(&self) -> usize {
        self.seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }
}

/// One candidate alignment of a read against a marker gene, already mapped
/// onto its gene family.
#[derive(Debug, Clone, PartialEq)]
pub struct RawHit {
    pub read_id: String,
    pub family: FamilyId,
    /// Bit score of the alignment.
    pub score: f64,
    /// Percent identity of the alignment.
    pub identity: f64,
    /// Alignment length in amino acids.
    pub aln_len: u32,
    /// Fraction of the target gene covered by the alignment.
    pub target_coverage: f64,
}

/// The single best hit retained for a read.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassifiedHit {
    pub read_id: String,
    pub family: FamilyId,
}

/// How a calibrated model maps coverage to a genome size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelForm {
    /// `size = intercept + slope * coverage`
    Linear,
    /// `size = exp(intercept) * coverage^slope`
    LogLinear,
}

impl fmt::Display for ModelForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelForm::Linear => write!(f, "linear"),
            ModelForm::LogLinear => write!(f, "loglinear"),
        }
    }
}

/// Per-family size prediction, before and after outlier screening.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelPrediction {
    pub family: FamilyId,
    pub coverage: f64,
    pub genome_size: f64,
    pub weight: f64,
    pub outlier: bool,
}

/// Consensus average genome size and the number of reads behind it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FinalEstimate {
    pub average_genome_size: f64,
    pub reads_used: usize,
}

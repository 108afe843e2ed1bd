//src/quality.rs

use std::fmt;
use std::str::FromStr;

use crate::error::CensusError;

/// Lowest quality byte seen in solexa-encoded files (solexa score -5 at offset 64).
const SOLEXA_MIN_BYTE: u8 = 59;
/// Offset shared by the solexa and illumina 1.3+ encodings.
const HIGH_OFFSET: u8 = 64;
const SANGER_OFFSET: u8 = 33;

/// FASTQ quality score encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityEncoding {
    /// PHRED scores at offset 33.
    Sanger,
    /// Solexa-scale scores at offset 64, converted to PHRED on decode.
    Solexa,
    /// PHRED scores at offset 64 (Illumina 1.3 to 1.7).
    Illumina,
}

impl QualityEncoding {
    pub fn offset(&self) -> u8 {
        match self {
            QualityEncoding::Sanger => SANGER_OFFSET,
            QualityEncoding::Solexa | QualityEncoding::Illumina => HIGH_OFFSET,
        }
    }

    /// Decode a single quality byte to a PHRED score.
    #[inline]
    pub fn decode_byte(&self, b: u8) -> i32 {
        let raw = b as i32 - self.offset() as i32;
        match self {
            QualityEncoding::Solexa => solexa_to_phred(raw),
            _ => raw,
        }
    }

    /// Decode a whole quality string to PHRED scores.
    pub fn decode(&self, quals: &[u8]) -> Vec<i32> {
        quals.iter().map(|&b| self.decode_byte(b)).collect()
    }
}

/// `10 * log10(10^(q/10) + 1)`, rounded to the nearest integer.
fn solexa_to_phred(q: i32) -> i32 {
    let p = 10.0 * (10f64.powf(q as f64 / 10.0) + 1.0).log10();
    p.round() as i32
}

impl FromStr for QualityEncoding {
    type Err = CensusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sanger" => Ok(QualityEncoding::Sanger),
            "solexa" => Ok(QualityEncoding::Solexa),
            "illumina" => Ok(QualityEncoding::Illumina),
            other => Err(CensusError::Config(format!(
                "invalid FASTQ quality encoding '{other}'; choose from [sanger, solexa, illumina]"
            ))),
        }
    }
}

impl fmt::Display for QualityEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QualityEncoding::Sanger => "sanger",
            QualityEncoding::Solexa => "solexa",
            QualityEncoding::Illumina => "illumina",
        };
        f.write_str(name)
    }
}

/// Infer the encoding from the quality strings of a bounded prefix of a file.
pub fn detect_quality_encoding<'a, I>(quality_lines: I) -> QualityEncoding
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let min_byte = quality_lines
        .into_iter()
        .flat_map(|q| q.iter().copied())
        .min();
    encoding_from_min_byte(min_byte)
}

/// The decision only depends on the smallest byte observed: anything below
/// the solexa floor must be sanger, anything below the shared high offset
/// must be solexa, otherwise illumina. No bytes at all is treated as sanger.
pub fn encoding_from_min_byte(min_byte: Option<u8>) -> QualityEncoding {
    match min_byte {
        None => QualityEncoding::Sanger,
        Some(b) if b < SOLEXA_MIN_BYTE => QualityEncoding::Sanger,
        Some(b) if b < HIGH_OFFSET => QualityEncoding::Solexa,
        Some(_) => QualityEncoding::Illumina,
    }
}

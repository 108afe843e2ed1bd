//src/seqio.rs

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, Read as IoRead};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use flate2::read::MultiGzDecoder;

use crate::error::{CensusError, Result};

/// Number of leading reads inspected when guessing the read length.
pub const READ_LENGTH_PROBE: usize = 10_000;

/// Supported input formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Fasta,
    Fastq,
}

impl FromStr for FileType {
    type Err = CensusError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "fasta" | "fa" => Ok(FileType::Fasta),
            "fastq" | "fq" => Ok(FileType::Fastq),
            other => Err(CensusError::Config(format!(
                "invalid file type '{other}'; choose from [fasta, fastq]"
            ))),
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileType::Fasta => f.write_str("fasta"),
            FileType::Fastq => f.write_str("fastq"),
        }
    }
}

/// A record as it appears in the input, before any filtering.
#[derive(Debug, Clone)]
pub struct SeqRecord {
    pub id: String,
    pub seq: String,
    /// Raw (still encoded) quality bytes, FASTQ only.
    pub qual: Option<Vec<u8>>,
}

/// Open `path` for buffered reading, transparently decompressing `.gz` files.
pub fn open_input(path: &Path) -> Result<Box<dyn BufRead>> {
    let f = File::open(path).map_err(|e| CensusError::io(path, e))?;

    let is_gz = path
        .extension()
        .map(|ext| ext == "gz")
        .unwrap_or(false);

    let reader: Box<dyn BufRead> = if is_gz {
        Box::new(BufReader::new(MultiGzDecoder::new(f)))
    } else {
        Box::new(BufReader::new(f))
    };
    Ok(reader)
}

/// Streaming reader over FASTA (multi-line) or FASTQ (four-line) records.
pub struct SeqReader {
    reader: Box<dyn BufRead>,
    path: PathBuf,
    file_type: FileType,
    line: String,
    line_no: usize,
    /// FASTA header already consumed while reading the previous record.
    pending_header: Option<String>,
}

impl SeqReader {
    pub fn open<P: AsRef<Path>>(path: P, file_type: FileType) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let reader = open_input(&path)?;
        Ok(Self {
            reader,
            path,
            file_type,
            line: String::with_capacity(256),
            line_no: 0,
            pending_header: None,
        })
    }

    pub fn file_type(&self) -> FileType {
        self.file_type
    }

    fn read_line(&mut self) -> Result<bool> {
        self.line.clear();
        let n = self
            .reader
            .read_line(&mut self.line)
            .map_err(|e| CensusError::io(&self.path, e))?;
        if n > 0 {
            self.line_no += 1;
        }
        Ok(n > 0)
    }

    fn header_id(header: &str) -> String {
        header.split_whitespace().next().unwrap_or("").to_string()
    }

    /// Read the next record, or `None` at end of input.
    pub fn next_record(&mut self) -> Result<Option<SeqRecord>> {
        match self.file_type {
            FileType::Fasta => self.next_fasta(),
            FileType::Fastq => self.next_fastq(),
        }
    }

    fn next_fasta(&mut self) -> Result<Option<SeqRecord>> {
        let header = match self.pending_header.take() {
            Some(h) => h,
            None => loop {
                if !self.read_line()? {
                    return Ok(None);
                }
                let trimmed = self.line.trim_end();
                if trimmed.is_empty() {
                    continue;
                }
                match trimmed.strip_prefix('>') {
                    Some(h) => break h.to_string(),
                    None => {
                        return Err(CensusError::format(
                            &self.path,
                            self.line_no,
                            "expected FASTA header starting with '>'",
                        ))
                    }
                }
            },
        };

        let mut seq = String::with_capacity(512);
        while self.read_line()? {
            let trimmed = self.line.trim_end();
            if let Some(h) = trimmed.strip_prefix('>') {
                self.pending_header = Some(h.to_string());
                break;
            }
            seq.push_str(trimmed);
        }

        Ok(Some(SeqRecord {
            id: Self::header_id(&header),
            seq,
            qual: None,
        }))
    }

    fn next_fastq(&mut self) -> Result<Option<SeqRecord>> {
        // 1) header, skipping blank lines between records
        let header = loop {
            if !self.read_line()? {
                return Ok(None);
            }
            let trimmed = self.line.trim_end();
            if trimmed.is_empty() {
                continue;
            }
            match trimmed.strip_prefix('@') {
                Some(h) => break h.to_string(),
                None => {
                    return Err(CensusError::format(
                        &self.path,
                        self.line_no,
                        "expected FASTQ header starting with '@'",
                    ))
                }
            }
        };

        // 2) sequence
        if !self.read_line()? {
            return Err(self.truncated());
        }
        let seq = self.line.trim_end().to_string();

        // 3) plus line
        if !self.read_line()? {
            return Err(self.truncated());
        }
        if !self.line.starts_with('+') {
            return Err(CensusError::format(
                &self.path,
                self.line_no,
                "expected FASTQ separator line starting with '+'",
            ));
        }

        // 4) quality
        if !self.read_line()? {
            return Err(self.truncated());
        }
        let qual = self.line.trim_end().as_bytes().to_vec();
        if qual.len() != seq.len() {
            return Err(CensusError::format(
                &self.path,
                self.line_no,
                format!(
                    "quality length {} does not match sequence length {}",
                    qual.len(),
                    seq.len()
                ),
            ));
        }

        Ok(Some(SeqRecord {
            id: Self::header_id(&header),
            seq,
            qual: Some(qual),
        }))
    }

    fn truncated(&self) -> CensusError {
        CensusError::format(&self.path, self.line_no, "truncated FASTQ record")
    }
}

impl Iterator for SeqReader {
    type Item = Result<SeqRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

/// Infer the file type from the first non-whitespace byte of the input.
pub fn detect_file_type(prefix: &[u8]) -> Option<FileType> {
    match prefix.iter().find(|b| !b.is_ascii_whitespace()) {
        Some(b'>') => Some(FileType::Fasta),
        Some(b'@') => Some(FileType::Fastq),
        _ => None,
    }
}

/// Peek at the start of a file and infer its type.
pub fn sniff_file_type(path: &Path) -> Result<FileType> {
    let mut reader = open_input(path)?;
    let mut prefix = Vec::with_capacity(1024);
    reader
        .by_ref()
        .take(1024)
        .read_to_end(&mut prefix)
        .map_err(|e| CensusError::io(path, e))?;

    detect_file_type(&prefix).ok_or_else(|| {
        CensusError::format(path, 1, "cannot detect file type: input is neither FASTA nor FASTQ")
    })
}

/// Pick the largest supported read length that does not exceed the median
/// of the observed lengths.
pub fn detect_read_length(lengths: &[usize], supported: &[usize]) -> Option<usize> {
    if lengths.is_empty() {
        return None;
    }
    let mut sorted = lengths.to_vec();
    sorted.sort_unstable();
    let median = sorted[sorted.len() / 2];

    supported.iter().copied().filter(|&l| l <= median).max()
}

/// Collect the lengths of the first `max_reads` records.
pub fn probe_read_lengths(path: &Path, file_type: FileType, max_reads: usize) -> Result<Vec<usize>> {
    let reader = SeqReader::open(path, file_type)?;
    reader
        .take(max_reads)
        .map(|rec| rec.map(|r| r.seq.len()))
        .collect()
}

/// Smallest quality byte across the first `max_reads` FASTQ records.
///
/// Streams the records and keeps only the running minimum.
pub fn probe_min_quality_byte(path: &Path, max_reads: usize) -> Result<Option<u8>> {
    let reader = SeqReader::open(path, FileType::Fastq)?;
    let mut min_byte: Option<u8> = None;
    for rec in reader.take(max_reads) {
        if let Some(q) = rec?.qual.as_deref().and_then(|q| q.iter().copied().min()) {
            min_byte = Some(min_byte.map_or(q, |m| m.min(q)));
        }
    }
    Ok(min_byte)
}

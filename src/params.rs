//src/params.rs

use ahash::AHashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{CensusError, Result};
use crate::types::{FamilyId, ModelForm};

pub const GENE_FAMILY_FILE: &str = "gene_fam.map";
pub const GENE_LENGTH_FILE: &str = "gene_len.map";
pub const FAMILY_PARAMS_FILE: &str = "pars.map";
pub const COEFFICIENTS_FILE: &str = "coefficients.map";
pub const WEIGHTS_FILE: &str = "weights.map";
pub const READ_LENGTHS_FILE: &str = "read_len.map";

/// gene id -> family id
pub type GeneFamilyMap = AHashMap<String, FamilyId>;
/// gene id -> gene length in amino acids
pub type GeneLengthMap = AHashMap<String, u32>;

/// Classification cutoffs and normalization values for one family at one read length.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneFamilyParams {
    pub min_score: f64,
    pub min_aln_len: u32,
    /// Expected gene length used for coverage normalization.
    pub expected_gene_length: f64,
    /// Multiplier applied to the normalized coverage; 1.0 leaves it unchanged.
    pub norm_coefficient: f64,
}

/// Calibrated regression mapping coverage to genome size for one family.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelCoefficients {
    pub form: ModelForm,
    pub intercept: f64,
    pub slope: f64,
}

impl ModelCoefficients {
    /// Predicted genome size for the given coverage.
    pub fn apply(&self, coverage: f64) -> f64 {
        match self.form {
            ModelForm::Linear => self.intercept + self.slope * coverage,
            ModelForm::LogLinear => (self.intercept + self.slope * coverage.ln()).exp(),
        }
    }
}

/// Per-family tables for a single read length.
pub type FamilyParamTable = AHashMap<FamilyId, GeneFamilyParams>;
pub type CoefficientTable = AHashMap<FamilyId, ModelCoefficients>;
pub type WeightTable = AHashMap<FamilyId, f64>;

/// All static configuration data, loaded once and never mutated.
#[derive(Debug, Clone, Default)]
pub struct ParamTables {
    pub gene_to_family: GeneFamilyMap,
    pub gene_lengths: GeneLengthMap,
    pub family_params: AHashMap<usize, FamilyParamTable>,
    pub coefficients: AHashMap<usize, CoefficientTable>,
    pub weights: AHashMap<usize, WeightTable>,
    pub supported_read_lengths: Vec<usize>,
}

impl ParamTables {
    /// Load every table from the files in `data_dir`.
    pub fn load_dir<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let dir = data_dir.as_ref();
        let tables = ParamTables {
            gene_to_family: parse_gene_families(dir.join(GENE_FAMILY_FILE))?,
            gene_lengths: parse_gene_lengths(dir.join(GENE_LENGTH_FILE))?,
            family_params: parse_family_params(dir.join(FAMILY_PARAMS_FILE))?,
            coefficients: parse_coefficients(dir.join(COEFFICIENTS_FILE))?,
            weights: parse_weights(dir.join(WEIGHTS_FILE))?,
            supported_read_lengths: parse_read_lengths(dir.join(READ_LENGTHS_FILE))?,
        };
        log::info!(
            "Loaded parameter tables: {} genes, {} read lengths supported",
            tables.gene_to_family.len(),
            tables.supported_read_lengths.len()
        );
        Ok(tables)
    }

    pub fn is_supported(&self, read_length: usize) -> bool {
        self.supported_read_lengths.contains(&read_length)
    }

    /// Fail with a configuration error unless every per-length table covers `read_length`.
    pub fn check_read_length(&self, read_length: usize) -> Result<()> {
        let complete = self.is_supported(read_length)
            && self.family_params.contains_key(&read_length)
            && self.coefficients.contains_key(&read_length)
            && self.weights.contains_key(&read_length);
        if complete {
            Ok(())
        } else {
            Err(CensusError::UnsupportedReadLength {
                length: read_length,
                supported: self.supported_read_lengths.clone(),
            })
        }
    }

    pub fn family_params_for(&self, read_length: usize) -> Result<&FamilyParamTable> {
        self.family_params
            .get(&read_length)
            .ok_or_else(|| self.unsupported(read_length))
    }

    pub fn coefficients_for(&self, read_length: usize) -> Result<&CoefficientTable> {
        self.coefficients
            .get(&read_length)
            .ok_or_else(|| self.unsupported(read_length))
    }

    pub fn weights_for(&self, read_length: usize) -> Result<&WeightTable> {
        self.weights
            .get(&read_length)
            .ok_or_else(|| self.unsupported(read_length))
    }

    fn unsupported(&self, read_length: usize) -> CensusError {
        CensusError::UnsupportedReadLength {
            length: read_length,
            supported: self.supported_read_lengths.clone(),
        }
    }
}

/// Iterate over the non-empty, tab-separated rows of a table file.
///
/// Yields `(line_number, fields)`; the first row is dropped when `header` is set.
fn read_rows<P: AsRef<Path>>(path: P, header: bool) -> Result<Vec<(usize, Vec<String>)>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| CensusError::io(path, e))?;
    let reader = BufReader::new(file);

    let mut rows = Vec::new();
    for (i, line_result) in reader.lines().enumerate() {
        let line = line_result.map_err(|e| CensusError::io(path, e))?;
        if header && i == 0 {
            continue;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let fields = trimmed.split('\t').map(|f| f.trim().to_string()).collect();
        rows.push((i + 1, fields));
    }
    Ok(rows)
}

fn field<'a>(path: &Path, line: usize, fields: &'a [String], idx: usize) -> Result<&'a str> {
    fields.get(idx).map(String::as_str).ok_or_else(|| {
        CensusError::format(path, line, format!("expected at least {} fields", idx + 1))
    })
}

fn parse_num<T: std::str::FromStr>(path: &Path, line: usize, s: &str, what: &str) -> Result<T> {
    s.parse()
        .map_err(|_| CensusError::format(path, line, format!("invalid {what}: '{s}'")))
}

/// Parses `gene_id<TAB>family_id` rows.
pub fn parse_gene_families<P: AsRef<Path>>(path: P) -> Result<GeneFamilyMap> {
    let path = path.as_ref();
    let mut map = GeneFamilyMap::new();
    for (line, fields) in read_rows(path, false)? {
        let gene = field(path, line, &fields, 0)?;
        let fam = field(path, line, &fields, 1)?;
        map.insert(gene.to_string(), fam.to_string());
    }
    Ok(map)
}

/// Parses `gene_id<TAB>length_aa` rows.
pub fn parse_gene_lengths<P: AsRef<Path>>(path: P) -> Result<GeneLengthMap> {
    let path = path.as_ref();
    let mut map = GeneLengthMap::new();
    for (line, fields) in read_rows(path, false)? {
        let gene = field(path, line, &fields, 0)?;
        let len: u32 = parse_num(path, line, field(path, line, &fields, 1)?, "gene length")?;
        map.insert(gene.to_string(), len);
    }
    Ok(map)
}

/// Parses `read_length fam min_score min_aln expected_len norm` rows (with header).
pub fn parse_family_params<P: AsRef<Path>>(path: P) -> Result<AHashMap<usize, FamilyParamTable>> {
    let path = path.as_ref();
    let mut out: AHashMap<usize, FamilyParamTable> = AHashMap::new();
    for (line, fields) in read_rows(path, true)? {
        let read_length: usize = parse_num(path, line, field(path, line, &fields, 0)?, "read length")?;
        let fam = field(path, line, &fields, 1)?.to_string();
        let params = GeneFamilyParams {
            min_score: parse_num(path, line, field(path, line, &fields, 2)?, "min score")?,
            min_aln_len: parse_num(path, line, field(path, line, &fields, 3)?, "min alignment length")?,
            expected_gene_length: parse_num(path, line, field(path, line, &fields, 4)?, "expected length")?,
            norm_coefficient: parse_num(path, line, field(path, line, &fields, 5)?, "normalization coefficient")?,
        };
        if params.expected_gene_length <= 0.0 {
            return Err(CensusError::format(path, line, "expected gene length must be positive"));
        }
        out.entry(read_length).or_default().insert(fam, params);
    }
    Ok(out)
}

/// Parses `read_length fam form intercept slope` rows (with header).
pub fn parse_coefficients<P: AsRef<Path>>(path: P) -> Result<AHashMap<usize, CoefficientTable>> {
    let path = path.as_ref();
    let mut out: AHashMap<usize, CoefficientTable> = AHashMap::new();
    for (line, fields) in read_rows(path, true)? {
        let read_length: usize = parse_num(path, line, field(path, line, &fields, 0)?, "read length")?;
        let fam = field(path, line, &fields, 1)?.to_string();
        let form = match field(path, line, &fields, 2)? {
            "linear" => ModelForm::Linear,
            "loglinear" => ModelForm::LogLinear,
            other => {
                return Err(CensusError::format(path, line, format!("unknown model form '{other}'")))
            }
        };
        let coeffs = ModelCoefficients {
            form,
            intercept: parse_num(path, line, field(path, line, &fields, 3)?, "intercept")?,
            slope: parse_num(path, line, field(path, line, &fields, 4)?, "slope")?,
        };
        out.entry(read_length).or_default().insert(fam, coeffs);
    }
    Ok(out)
}

/// Parses `read_length fam weight` rows (with header).
pub fn parse_weights<P: AsRef<Path>>(path: P) -> Result<AHashMap<usize, WeightTable>> {
    let path = path.as_ref();
    let mut out: AHashMap<usize, WeightTable> = AHashMap::new();
    for (line, fields) in read_rows(path, true)? {
        let read_length: usize = parse_num(path, line, field(path, line, &fields, 0)?, "read length")?;
        let fam = field(path, line, &fields, 1)?.to_string();
        let weight: f64 = parse_num(path, line, field(path, line, &fields, 2)?, "weight")?;
        if !(weight.is_finite() && weight >= 0.0) {
            return Err(CensusError::format(path, line, "weight must be finite and non-negative"));
        }
        out.entry(read_length).or_default().insert(fam, weight);
    }
    Ok(out)
}

/// Parses one supported read length per row (with header).
pub fn parse_read_lengths<P: AsRef<Path>>(path: P) -> Result<Vec<usize>> {
    let path = path.as_ref();
    let mut lengths = Vec::new();
    for (line, fields) in read_rows(path, true)? {
        lengths.push(parse_num(path, line, field(path, line, &fields, 0)?, "read length")?);
    }
    lengths.sort_unstable();
    lengths.dedup();
    Ok(lengths)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_forms() {
        let lin = ModelCoefficients { form: ModelForm::Linear, intercept: 1e6, slope: -2e6 };
        assert_eq!(lin.apply(0.25), 5e5);

        let log = ModelCoefficients { form: ModelForm::LogLinear, intercept: 50_000f64.ln(), slope: -1.0 };
        assert!((log.apply(0.01) - 5_000_000.0).abs() < 1e-3);
    }

    #[test]
    fn test_load_dir() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path();
        std::fs::write(p.join(GENE_FAMILY_FILE), "g1\tB01\ng2\tB01\ng3\tB02\n").unwrap();
        std::fs::write(p.join(GENE_LENGTH_FILE), "g1\t300\ng2\t310\ng3\t250\n").unwrap();
        std::fs::write(
            p.join(FAMILY_PARAMS_FILE),
            "read_length\tfam\tmin_score\tmin_aln\texpected_len\tnorm\n\
             100\tB01\t30.5\t20\t900\t1.0\n100\tB02\t28\t18\t750\t1.0\n",
        )
        .unwrap();
        std::fs::write(
            p.join(COEFFICIENTS_FILE),
            "read_length\tfam\tform\tintercept\tslope\n100\tB01\tloglinear\t10.8\t-1\n100\tB02\tlinear\t3e6\t-1e7\n",
        )
        .unwrap();
        std::fs::write(p.join(WEIGHTS_FILE), "read_length\tfam\tweight\n100\tB01\t0.6\n100\tB02\t0.4\n").unwrap();
        std::fs::write(p.join(READ_LENGTHS_FILE), "read_length\n150\n100\n").unwrap();

        let tables = ParamTables::load_dir(p).unwrap();
        assert_eq!(tables.gene_to_family["g2"], "B01");
        assert_eq!(tables.gene_lengths["g3"], 250);
        assert_eq!(tables.supported_read_lengths, vec![100, 150]);
        assert_eq!(tables.family_params_for(100).unwrap()["B01"].min_aln_len, 20);
        assert_eq!(tables.coefficients_for(100).unwrap()["B02"].form, ModelForm::Linear);
        assert!(tables.check_read_length(100).is_ok());
        // listed as supported but without per-length tables
        assert!(matches!(
            tables.check_read_length(150),
            Err(CensusError::UnsupportedReadLength { length: 150, .. })
        ));
        assert!(tables.weights_for(75).is_err());
    }

    #[test]
    fn test_bad_model_form_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(COEFFICIENTS_FILE);
        std::fs::write(&path, "header\n100\tB01\tcubic\t1\t2\n").unwrap();
        assert!(matches!(parse_coefficients(&path), Err(CensusError::Format { line: 2, .. })));
    }
}

//src/aggregate.rs

use ahash::AHashMap;
use rayon::prelude::*;
use std::collections::BTreeMap;

use crate::params::FamilyParamTable;
use crate::types::{ClassifiedHit, FamilyId};

/// Tally and normalized coverage for one gene family.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FamilyCount {
    pub hits: u64,
    pub coverage: f64,
}

/// Per-family tallies for one run. Families are kept in id order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AggregatedCounts {
    pub families: BTreeMap<FamilyId, FamilyCount>,
    pub reads_sampled: usize,
    pub target_length: usize,
}

impl AggregatedCounts {
    pub fn total_hits(&self) -> u64 {
        self.families.values().map(|c| c.hits).sum()
    }

    /// Families that can support a size estimate.
    pub fn with_coverage(&self) -> impl Iterator<Item = (&FamilyId, &FamilyCount)> {
        self.families.iter().filter(|(_, c)| c.coverage > 0.0)
    }
}

/// Raw hit count per family. Pure summation, so hit order is irrelevant.
pub fn tally_hits(classified: &[ClassifiedHit]) -> AHashMap<FamilyId, u64> {
    classified
        .par_iter()
        .fold(AHashMap::new, |mut acc: AHashMap<FamilyId, u64>, hit| {
            *acc.entry(hit.family.clone()).or_insert(0) += 1;
            acc
        })
        .reduce(AHashMap::new, |mut a, b| {
            a.reserve(b.len());
            for (fam, n) in b {
                *a.entry(fam).or_insert(0) += n;
            }
            a
        })
}

/// `norm * hits * expected_gene_length / (reads_sampled * target_length)`
pub fn normalized_coverage(
    hits: u64,
    expected_gene_length: f64,
    norm_coefficient: f64,
    reads_sampled: usize,
    target_length: usize,
) -> f64 {
    if hits == 0 || reads_sampled == 0 || target_length == 0 {
        return 0.0;
    }
    norm_coefficient * hits as f64 * expected_gene_length / (reads_sampled as f64 * target_length as f64)
}

/// Build per-family counts and coverage from the classified hits.
///
/// Every family in `params` appears in the result, with zero coverage when it
/// received no hits.
pub fn aggregate(
    classified: &[ClassifiedHit],
    params: &FamilyParamTable,
    reads_sampled: usize,
    target_length: usize,
) -> AggregatedCounts {
    let tallies = tally_hits(classified);

    let mut families: BTreeMap<FamilyId, FamilyCount> = params
        .keys()
        .map(|fam| (fam.clone(), FamilyCount::default()))
        .collect();

    for (fam, hits) in tallies {
        match params.get(&fam) {
            Some(p) => {
                let coverage = normalized_coverage(
                    hits,
                    p.expected_gene_length,
                    p.norm_coefficient,
                    reads_sampled,
                    target_length,
                );
                families.insert(fam, FamilyCount { hits, coverage });
            }
            None => log::warn!("Ignoring {} hits to family {} with no parameters", hits, fam),
        }
    }

    let counts = AggregatedCounts {
        families,
        reads_sampled,
        target_length,
    };
    log::info!(
        "Aggregated {} hits across {} families ({} with coverage)",
        counts.total_hits(),
        counts.families.len(),
        counts.with_coverage().count()
    );
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::GeneFamilyParams;

    fn params() -> FamilyParamTable {
        let mut t = FamilyParamTable::new();
        for (fam, len) in [("B01", 1000.0), ("B02", 500.0), ("B03", 800.0)] {
            t.insert(
                fam.to_string(),
                GeneFamilyParams {
                    min_score: 40.0,
                    min_aln_len: 20,
                    expected_gene_length: len,
                    norm_coefficient: 1.0,
                },
            );
        }
        t
    }

    fn classified(n_b01: usize, n_b02: usize) -> Vec<ClassifiedHit> {
        let mut hits = Vec::new();
        for i in 0..n_b01 {
            hits.push(ClassifiedHit { read_id: format!("a{i}"), family: "B01".into() });
        }
        for i in 0..n_b02 {
            hits.push(ClassifiedHit { read_id: format!("b{i}"), family: "B02".into() });
        }
        hits
    }

    #[test]
    fn test_coverage_formula() {
        let agg = aggregate(&classified(10, 4), &params(), 10_000, 100);
        assert_eq!(agg.families["B01"].hits, 10);
        assert!((agg.families["B01"].coverage - 0.01).abs() < 1e-15);
        assert!((agg.families["B02"].coverage - 0.002).abs() < 1e-15);
        assert_eq!(agg.families["B03"], FamilyCount::default());
        assert_eq!(agg.with_coverage().count(), 2);
        assert_eq!(agg.total_hits(), 14);
    }

    #[test]
    fn test_aggregation_ignores_hit_order() {
        let hits = classified(37, 21);
        let mut shuffled = hits.clone();
        // deterministic interleaving stands in for a shuffle
        shuffled.reverse();
        shuffled.rotate_left(13);

        let a = aggregate(&hits, &params(), 5000, 150);
        let b = aggregate(&shuffled, &params(), 5000, 150);
        assert_eq!(a, b);
    }

    #[test]
    fn test_unknown_family_is_dropped() {
        let mut hits = classified(1, 0);
        hits.push(ClassifiedHit { read_id: "x".into(), family: "B99".into() });
        let agg = aggregate(&hits, &params(), 100, 100);
        assert!(!agg.families.contains_key("B99"));
        assert_eq!(agg.total_hits(), 1);
    }

    #[test]
    fn test_zero_reads_gives_zero_coverage() {
        assert_eq!(normalized_coverage(5, 1000.0, 1.0, 0, 100), 0.0);
        assert_eq!(normalized_coverage(0, 1000.0, 1.0, 100, 100), 0.0);
    }
}

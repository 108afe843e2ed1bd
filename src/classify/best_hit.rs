// src/classify/best_hit.rs

use std::cmp::Ordering;

use super::FamilyParamTable;
use crate::types::{ClassifiedHit, RawHit};

/// Whether a hit clears its family's score and alignment-length cutoffs.
///
/// Hits to families with no cutoffs for the current read length never pass.
pub fn passes_cutoffs(hit: &RawHit, params: &FamilyParamTable) -> bool {
    match params.get(&hit.family) {
        Some(p) => hit.score >= p.min_score && hit.aln_len >= p.min_aln_len,
        None => false,
    }
}

/// Total order used to pick a winner: higher score, then longer alignment,
/// then the lexicographically smaller family id.
pub fn compare_hits(a: &RawHit, b: &RawHit) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.aln_len.cmp(&a.aln_len))
        .then_with(|| a.family.cmp(&b.family))
}

/// Pick the single best passing hit for one read.
///
/// The result does not depend on the order of `hits`.
pub fn best_hit<'a>(hits: &'a [RawHit], params: &FamilyParamTable) -> Option<&'a RawHit> {
    hits.iter()
        .filter(|h| passes_cutoffs(h, params))
        .min_by(|a, b| compare_hits(a, b))
}

/// Classify one read, producing at most one hit.
pub fn classify_read(read_id: &str, hits: &[RawHit], params: &FamilyParamTable) -> Option<ClassifiedHit> {
    best_hit(hits, params).map(|h| ClassifiedHit {
        read_id: read_id.to_string(),
        family: h.family.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::GeneFamilyParams;

    fn params() -> FamilyParamTable {
        let mut t = FamilyParamTable::new();
        for (fam, min_score, min_aln) in [("B01", 40.0, 20), ("B02", 50.0, 25), ("B03", 40.0, 20)] {
            t.insert(
                fam.to_string(),
                GeneFamilyParams {
                    min_score,
                    min_aln_len: min_aln,
                    expected_gene_length: 1000.0,
                    norm_coefficient: 1.0,
                },
            );
        }
        t
    }

    fn hit(fam: &str, score: f64, aln_len: u32) -> RawHit {
        RawHit {
            read_id: "r1".into(),
            family: fam.into(),
            score,
            identity: 90.0,
            aln_len,
            target_coverage: 0.1,
        }
    }

    #[test]
    fn test_family_specific_cutoffs() {
        let p = params();
        assert!(passes_cutoffs(&hit("B01", 45.0, 20), &p));
        assert!(!passes_cutoffs(&hit("B02", 45.0, 30), &p));
        assert!(!passes_cutoffs(&hit("B02", 55.0, 24), &p));
        assert!(!passes_cutoffs(&hit("B99", 500.0, 100), &p));
    }

    #[test]
    fn test_highest_score_wins() {
        let p = params();
        let hits = vec![hit("B01", 45.0, 30), hit("B03", 60.0, 21), hit("B02", 200.0, 10)];
        assert_eq!(best_hit(&hits, &p).unwrap().family, "B03");
    }

    #[test]
    fn test_ties_break_on_length_then_family() {
        let p = params();
        let hits = vec![hit("B03", 60.0, 30), hit("B01", 60.0, 25)];
        assert_eq!(best_hit(&hits, &p).unwrap().family, "B03");

        let hits = vec![hit("B03", 60.0, 30), hit("B01", 60.0, 30)];
        assert_eq!(best_hit(&hits, &p).unwrap().family, "B01");
        let reversed: Vec<RawHit> = hits.into_iter().rev().collect();
        assert_eq!(best_hit(&reversed, &p).unwrap().family, "B01");
    }

    #[test]
    fn test_no_passing_hit_means_no_classification() {
        let p = params();
        let hits = vec![hit("B01", 10.0, 30), hit("B02", 49.9, 30)];
        assert!(classify_read("r1", &hits, &p).is_none());
        assert!(classify_read("r1", &[], &p).is_none());
    }
}

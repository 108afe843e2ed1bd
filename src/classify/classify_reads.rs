use ahash::AHashMap;
use rayon::prelude::*;

use super::best_hit::classify_read;
use super::FamilyParamTable;
use crate::types::{ClassifiedHit, RawHit};

/// read id -> every candidate hit reported for that read
pub type HitsByRead = AHashMap<String, Vec<RawHit>>;

/// Counters describing one classification pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifyStats {
    /// Reads with at least one raw hit.
    pub reads_with_hits: usize,
    /// Reads that ended up with a best hit.
    pub reads_classified: usize,
    /// Raw hits that cleared their family's cutoffs.
    pub hits_passing: usize,
}

impl ClassifyStats {
    fn merge(mut self, other: ClassifyStats) -> ClassifyStats {
        self.reads_with_hits += other.reads_with_hits;
        self.reads_classified += other.reads_classified;
        self.hits_passing += other.hits_passing;
        self
    }
}

/// Bucket a flat hit list by read id, keeping each read's hits in input order.
pub fn group_hits_by_read(hits: Vec<RawHit>) -> HitsByRead {
    let mut by_read: HitsByRead = AHashMap::with_capacity(hits.len() / 2 + 1);
    for hit in hits {
        by_read.entry(hit.read_id.clone()).or_default().push(hit);
    }
    by_read
}

/// Parallel classification of every read's hit list.
///
/// Reads are independent, so they are folded per thread and the partial
/// results are concatenated. The output is sorted by read id so repeated runs
/// give identical results whatever the thread scheduling.
pub fn classify_reads_parallel(
    hits_by_read: &HitsByRead,
    params: &FamilyParamTable,
) -> (Vec<ClassifiedHit>, ClassifyStats) {
    let (mut classified, stats) = hits_by_read
        .par_iter()
        .fold(
            || (Vec::with_capacity(256), ClassifyStats::default()),
            |mut acc, (read_id, hits)| {
                if !hits.is_empty() {
                    acc.1.reads_with_hits += 1;
                }
                acc.1.hits_passing += hits
                    .iter()
                    .filter(|h| super::best_hit::passes_cutoffs(h, params))
                    .count();

                if let Some(ch) = classify_read(read_id, hits, params) {
                    acc.1.reads_classified += 1;
                    acc.0.push(ch);
                }
                acc
            },
        )
        .reduce(
            || (Vec::new(), ClassifyStats::default()),
            merge_partial_results,
        );

    classified.par_sort_unstable();
    (classified, stats)
}

fn merge_partial_results(
    mut a: (Vec<ClassifiedHit>, ClassifyStats),
    mut b: (Vec<ClassifiedHit>, ClassifyStats),
) -> (Vec<ClassifiedHit>, ClassifyStats) {
    a.0.append(&mut b.0);
    (a.0, a.1.merge(b.1))
}

pub mod best_hit;
pub mod classify_reads;

pub use crate::params::FamilyParamTable;
pub use best_hit::{best_hit, classify_read, compare_hits, passes_cutoffs};
pub use classify_reads::{classify_reads_parallel, group_hits_by_read, ClassifyStats, HitsByRead};

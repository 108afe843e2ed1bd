//src/predict.rs

use crate::aggregate::AggregatedCounts;
use crate::error::{CensusError, Result};
use crate::params::{CoefficientTable, WeightTable};
use crate::types::{FinalEstimate, ModelPrediction};

/// Consistency constant turning a MAD into a normal-equivalent standard deviation.
const MAD_SCALE: f64 = 1.4826;

/// How far a prediction may sit from the median before it is discarded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlierRule {
    /// Allowed distance from the median, in scaled MADs.
    pub mad_multiple: f64,
    /// Dispersion floor relative to the median, so identical predictions
    /// (MAD of zero) do not reject values that differ only by rounding.
    pub min_relative_dispersion: f64,
}

impl Default for OutlierRule {
    fn default() -> Self {
        Self {
            mad_multiple: 3.0,
            min_relative_dispersion: 1e-6,
        }
    }
}

/// All per-family predictions plus the consensus built from the survivors.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub predictions: Vec<ModelPrediction>,
    pub estimate: FinalEstimate,
}

impl Prediction {
    pub fn outliers(&self) -> impl Iterator<Item = &ModelPrediction> {
        self.predictions.iter().filter(|p| p.outlier)
    }

    pub fn retained(&self) -> impl Iterator<Item = &ModelPrediction> {
        self.predictions.iter().filter(|p| !p.outlier)
    }
}

/// Median of a non-empty slice; the mean of the two middle values for even lengths.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Median absolute deviation around `center`.
pub fn median_absolute_deviation(values: &[f64], center: f64) -> Option<f64> {
    let deviations: Vec<f64> = values.iter().map(|v| (v - center).abs()).collect();
    median(&deviations)
}

/// Flag each value that lies too far from the median. Same input, same flags.
pub fn flag_outliers(values: &[f64], rule: &OutlierRule) -> Vec<bool> {
    let Some(center) = median(values) else {
        return Vec::new();
    };
    let mad = median_absolute_deviation(values, center).unwrap_or(0.0);
    let dispersion = (MAD_SCALE * mad).max(rule.min_relative_dispersion * center.abs());
    let limit = rule.mad_multiple * dispersion;

    values.iter().map(|v| (v - center).abs() > limit).collect()
}

/// Weighted mean of `(value, weight)` pairs. Falls back to the plain mean
/// when every weight is zero.
pub fn weighted_mean<I>(pairs: I) -> Option<f64>
where
    I: IntoIterator<Item = (f64, f64)>,
{
    let (mut sum, mut total_weight, mut plain, mut n) = (0.0, 0.0, 0.0, 0usize);
    for (value, weight) in pairs {
        sum += value * weight;
        total_weight += weight;
        plain += value;
        n += 1;
    }
    if n == 0 {
        None
    } else if total_weight > 0.0 {
        Some(sum / total_weight)
    } else {
        log::warn!("All model weights are zero; using an unweighted mean");
        Some(plain / n as f64)
    }
}

/// Predict the average genome size from per-family coverage.
///
/// Each family with non-zero coverage and a calibrated model yields one
/// prediction. Predictions far from the median are flagged as outliers and
/// the rest are averaged using the per-model weights.
pub fn predict(
    counts: &AggregatedCounts,
    coefficients: &CoefficientTable,
    weights: &WeightTable,
    rule: &OutlierRule,
) -> Result<Prediction> {
    let mut predictions = Vec::with_capacity(counts.families.len());

    for (family, count) in counts.with_coverage() {
        let (Some(model), Some(&weight)) = (coefficients.get(family), weights.get(family)) else {
            log::warn!("No calibrated model for family {}; skipping", family);
            continue;
        };
        let genome_size = model.apply(count.coverage);
        if !(genome_size.is_finite() && genome_size > 0.0) {
            log::warn!(
                "Model for family {} gave unusable size {} at coverage {}",
                family,
                genome_size,
                count.coverage
            );
            continue;
        }
        predictions.push(ModelPrediction {
            family: family.clone(),
            coverage: count.coverage,
            genome_size,
            weight,
            outlier: false,
        });
    }

    if predictions.is_empty() {
        return Err(CensusError::NoCoverage);
    }

    let sizes: Vec<f64> = predictions.iter().map(|p| p.genome_size).collect();
    for (p, outlier) in predictions.iter_mut().zip(flag_outliers(&sizes, rule)) {
        p.outlier = outlier;
    }

    let average = weighted_mean(
        predictions
            .iter()
            .filter(|p| !p.outlier)
            .map(|p| (p.genome_size, p.weight)),
    )
    .ok_or(CensusError::AllOutliers {
        candidates: predictions.len(),
    })?;

    let rejected = predictions.iter().filter(|p| p.outlier).count();
    log::info!(
        "Predicted average genome size {:.2} bp from {} models ({} outliers removed)",
        average,
        predictions.len() - rejected,
        rejected
    );

    Ok(Prediction {
        predictions,
        estimate: FinalEstimate {
            average_genome_size: average,
            reads_used: counts.reads_sampled,
        },
    })
}

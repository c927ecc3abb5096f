//! Score feature vectors with a trained model.
//!
//! The `ScoringModel` trait is the seam between the engine and a trained
//! regression artefact. Implementations are immutable once constructed and
//! shared across threads behind an `Arc`.

use crate::FeatureVector;

/// Lowest score a model may report.
pub const MIN_SCORE: f64 = 0.0;
/// Highest score a model may report.
pub const MAX_SCORE: f64 = 100.0;

/// A versioned regression model mapping features to a quality score.
///
/// Implementations must be thread-safe (`Send` + `Sync`) and deterministic:
/// the same vector always yields the same raw output. Raw outputs are not
/// required to lie within `0..=100`; callers pass them through
/// [`sanitise_score`].
///
/// # Examples
///
/// ```rust
/// use waypost_core::{FeatureName, FeatureVector, ScoringModel};
///
/// struct NameOnly;
///
/// impl ScoringModel for NameOnly {
///     fn version(&self) -> &str {
///         "name-only"
///     }
///
///     fn predict(&self, features: &FeatureVector) -> f64 {
///         if features.get(FeatureName::HasName) > 0.0 { 60.0 } else { 10.0 }
///     }
/// }
///
/// let vector = FeatureVector::from_fn(|_| 0.0).expect("finite");
/// assert_eq!(NameOnly.predict_batch(&[vector]), vec![10.0]);
/// ```
pub trait ScoringModel: Send + Sync {
    /// Identifier of the trained artefact, part of every cache fingerprint.
    fn version(&self) -> &str;

    /// Raw prediction for a single vector.
    fn predict(&self, features: &FeatureVector) -> f64;

    /// Raw predictions for many vectors, in input order.
    ///
    /// The default delegates to [`ScoringModel::predict`]; models with a
    /// vectorised path may override it.
    fn predict_batch(&self, batch: &[FeatureVector]) -> Vec<f64> {
        batch.iter().map(|features| self.predict(features)).collect()
    }
}

/// Clamp a raw model output to `MIN_SCORE..=MAX_SCORE`.
///
/// Returns `0.0` for non-finite values.
#[must_use]
pub const fn sanitise_score(raw: f64) -> f64 {
    if !raw.is_finite() {
        return MIN_SCORE;
    }
    raw.clamp(MIN_SCORE, MAX_SCORE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(f64::NAN, 0.0)]
    #[case(f64::INFINITY, 0.0)]
    #[case(f64::NEG_INFINITY, 0.0)]
    #[case(-3.0, 0.0)]
    #[case(42.5, 42.5)]
    #[case(250.0, 100.0)]
    fn sanitise_clamps_and_zeroes_non_finite(#[case] raw: f64, #[case] expected: f64) {
        assert_eq!(sanitise_score(raw), expected);
    }
}

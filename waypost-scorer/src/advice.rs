//! Improvement suggestions derived from a scored record.
#![forbid(unsafe_code)]

use std::fmt;

use serde::{Deserialize, Serialize};
use waypost_core::{FeatureName, FeatureVector};

use crate::quality::QualityLevel;

/// Description length below which expansion is suggested.
pub const DESCRIPTION_TARGET_CHARS: f64 = 100.0;

/// A concrete step that would improve a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    /// The record has no name.
    AddName,
    /// The record has no description.
    AddDescription,
    /// The description is shorter than [`DESCRIPTION_TARGET_CHARS`].
    ExpandDescription,
    /// The record has no coordinates.
    AddCoordinates,
    /// The record has neither phone nor email.
    AddContact,
    /// The record has no images.
    AddImages,
    /// The record has no opening hours.
    AddOpeningHours,
    /// The record already scores as excellent.
    MaintainQuality,
}

impl Recommendation {
    /// Human-readable advice.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::AddName => "Add a name",
            Self::AddDescription => "Add a description",
            Self::ExpandDescription => "Expand the description to at least 100 characters",
            Self::AddCoordinates => "Add GPS coordinates",
            Self::AddContact => "Add a phone number or email address",
            Self::AddImages => "Add images",
            Self::AddOpeningHours => "Add opening hours",
            Self::MaintainQuality => "Excellent record; keep it up to date",
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Suggestions for a record with `features` that scored `score`.
///
/// # Examples
///
/// ```
/// use waypost_core::{FeatureName, FeatureVector};
/// use waypost_scorer::{Recommendation, recommendations};
///
/// let features = FeatureVector::from_fn(|name| match name {
///     FeatureName::DescriptionLength => 250.0,
///     FeatureName::HasImages => 0.0,
///     _ => 1.0,
/// })
/// .expect("finite features");
/// assert_eq!(
///     recommendations(&features, 85.0),
///     vec![Recommendation::AddImages, Recommendation::MaintainQuality]
/// );
/// ```
#[must_use]
pub fn recommendations(features: &FeatureVector, score: f64) -> Vec<Recommendation> {
    let missing = |name| features.get(name) < 0.5;
    let mut advice = Vec::new();
    if missing(FeatureName::HasName) {
        advice.push(Recommendation::AddName);
    }
    if missing(FeatureName::HasDescription) {
        advice.push(Recommendation::AddDescription);
    } else if features.get(FeatureName::DescriptionLength) < DESCRIPTION_TARGET_CHARS {
        advice.push(Recommendation::ExpandDescription);
    }
    let checks = [
        (FeatureName::HasGps, Recommendation::AddCoordinates),
        (FeatureName::HasContact, Recommendation::AddContact),
        (FeatureName::HasImages, Recommendation::AddImages),
        (FeatureName::HasOpeningHours, Recommendation::AddOpeningHours),
    ];
    advice.extend(
        checks
            .into_iter()
            .filter(|&(flag, _)| missing(flag))
            .map(|(_, recommendation)| recommendation),
    );
    if QualityLevel::from_score(score) == QualityLevel::Excellent {
        advice.push(Recommendation::MaintainQuality);
    }
    advice
}

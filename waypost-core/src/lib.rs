//! Core domain types for the Waypost quality engine.
//!
//! A [`PoiRecord`] is reduced by the [`FeatureExtractor`] to a fixed
//! 17-feature [`FeatureVector`], optionally enriched by a
//! [`SpatialContextProvider`], and scored by a [`ScoringModel`]. Everything in
//! this crate is synchronous, free of global state and safe to share across
//! threads; caching and artefact loading live in `waypost-scorer`.

#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod clock;
pub mod context;
mod extract;
mod features;
mod model;
mod record;

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-support")))]
pub mod test_support;

pub use clock::{Clock, FixedClock, SystemClock};
pub use context::{
    ContextSource, KnownRecord, ReferenceTable, ReferenceTableError, Region, SpatialContext,
    SpatialContextProvider,
};
pub use extract::{
    ExtractionError, FeatureExtractor, MISSING_UPDATE_DAYS, RECENT_WINDOW_DAYS, parse_timestamp,
};
pub use features::{
    FEATURE_COUNT, FeatureCategory, FeatureName, FeatureVector, FeatureVectorBuilder,
    FeatureVectorError, UnknownFeature,
};
pub use model::{MAX_SCORE, MIN_SCORE, ScoringModel, sanitise_score};
pub use record::{Coordinates, PoiRecord, UNKNOWN_RECORD_ID, ValidationError, is_present};

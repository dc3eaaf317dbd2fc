//! Risk prediction.
//!
//! [`FeatureAggregator`] reduces raw measurements to a [`FeatureVector`],
//! [`RiskScorer`] applies the logistic model and [`PredictionEngine`]
//! wires both to the stores.

pub mod engine;
pub mod features;
pub mod scorer;

pub use engine::{Prediction, PredictionEngine};
pub use features::{summarize, Feature, FeatureAggregator, FeatureVector, SignalSummary};
pub use scorer::{sigmoid, RiskModel, RiskScorer};

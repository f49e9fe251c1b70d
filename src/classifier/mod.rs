//! Nearest-neighbor classification core
//!
//! - `ClassifierDataset` stores labelled feature vectors
//! - `OnlineKnnClassifier` learns from examples and predicts by KNN voting

pub mod dataset;
pub mod knn;
pub mod types;

pub use dataset::ClassifierDataset;
pub use knn::{OnlineKnnClassifier, DEFAULT_K};
pub use types::{
    ClassLabel, ClassifierError, ClassifierResult, DistanceMetric, FeatureVector, Prediction,
};

use parking_lot::Mutex;
use std::sync::Arc;

/// Classifier shared between the capture loop and command handlers.
///
/// Lock it only for the duration of one add/predict call; never across an
/// await point.
pub type SharedClassifier = Arc<Mutex<OnlineKnnClassifier>>;

//! Classifier value types
//!
//! Labels, feature vectors, predictions and the error taxonomy shared by the
//! dataset and the nearest-neighbor classifier.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Classifier errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassifierError {
    #[error("Dimension mismatch: expected {expected} components, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Cannot predict: the dataset has no classes")]
    EmptyDataset,

    #[error("Class label must not be empty")]
    EmptyLabel,

    #[error("Invalid feature vector: {0}")]
    InvalidVector(String),

    #[error("k must be at least 1")]
    InvalidK,

    #[error("Unknown class: {0}")]
    UnknownClass(String),
}

/// Result type alias for classifier operations
pub type ClassifierResult<T> = Result<T, ClassifierError>;

/// A user-defined category name.
///
/// Labels are compared case-sensitively with no normalization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClassLabel(String);

impl ClassLabel {
    /// Create a label, rejecting the empty string
    pub fn new(label: impl Into<String>) -> ClassifierResult<Self> {
        let label = label.into();
        if label.is_empty() {
            return Err(ClassifierError::EmptyLabel);
        }
        Ok(Self(label))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ClassLabel {
    type Error = ClassifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for ClassLabel {
    type Error = ClassifierError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ClassLabel> for String {
    fn from(label: ClassLabel) -> Self {
        label.0
    }
}

impl Borrow<str> for ClassLabel {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ClassLabel {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A fixed-length embedding of one frame.
///
/// Immutable once created. Components are always finite and there is at
/// least one of them.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(Box<[f32]>);

impl FeatureVector {
    /// Create a feature vector from raw components
    pub fn new(components: Vec<f32>) -> ClassifierResult<Self> {
        if components.is_empty() {
            return Err(ClassifierError::InvalidVector(
                "vector has no components".to_string(),
            ));
        }
        if let Some(index) = components.iter().position(|c| !c.is_finite()) {
            return Err(ClassifierError::InvalidVector(format!(
                "component {} is not finite",
                index
            )));
        }
        Ok(Self(components.into_boxed_slice()))
    }

    /// Dimensionality of the vector
    pub fn dim(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}

impl TryFrom<Vec<f32>> for FeatureVector {
    type Error = ClassifierError;

    fn try_from(components: Vec<f32>) -> Result<Self, Self::Error> {
        Self::new(components)
    }
}

/// Distance used to rank stored examples against a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DistanceMetric {
    /// Sum of squared component differences
    #[default]
    SquaredEuclidean,
    /// `1 - cos(a, b)`; a zero-norm vector is at distance 1 from everything
    Cosine,
}

impl DistanceMetric {
    /// Distance between two vectors of equal length
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f64 {
        debug_assert_eq!(a.len(), b.len());
        match self {
            DistanceMetric::SquaredEuclidean => a
                .iter()
                .zip(b)
                .map(|(&x, &y)| {
                    let d = x as f64 - y as f64;
                    d * d
                })
                .sum(),
            DistanceMetric::Cosine => {
                let mut dot = 0.0f64;
                let mut norm_a = 0.0f64;
                let mut norm_b = 0.0f64;
                for (&x, &y) in a.iter().zip(b) {
                    let (x, y) = (x as f64, y as f64);
                    dot += x * y;
                    norm_a += x * x;
                    norm_b += y * y;
                }
                if norm_a == 0.0 || norm_b == 0.0 {
                    return 1.0;
                }
                1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
            }
        }
    }
}

/// Outcome of a nearest-neighbor prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    /// Winning class
    pub label: ClassLabel,

    /// Share of the selected neighbors per class, every class included
    pub confidences: BTreeMap<ClassLabel, f64>,

    /// Number of neighbors that voted (min of k and the example count)
    pub neighbors: usize,
}

impl Prediction {
    /// Confidence of the winning class
    pub fn confidence(&self) -> f64 {
        self.confidences.get(&self.label).copied().unwrap_or(0.0)
    }
}

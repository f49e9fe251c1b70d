//! Online k-nearest-neighbor classifier
//!
//! Brute-force KNN over every stored example. Neighbors are ranked by the
//! configured distance; equal distances fall back to dataset iteration order
//! (class insertion order, then example insertion order), so predictions are
//! deterministic and stable across a save/load cycle.

use super::dataset::ClassifierDataset;
use super::types::{
    ClassLabel, ClassifierError, ClassifierResult, DistanceMetric, FeatureVector, Prediction,
};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Default number of neighbors consulted per prediction
pub const DEFAULT_K: usize = 10;

/// A scored candidate during neighbor selection
#[derive(Debug, Clone, Copy)]
struct Neighbor {
    distance: f64,
    class_slot: usize,
    ordinal: usize,
}

impl Neighbor {
    fn rank(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.ordinal.cmp(&other.ordinal))
    }
}

/// Nearest-neighbor classifier that learns by example
#[derive(Debug, Clone, Default)]
pub struct OnlineKnnClassifier {
    dataset: ClassifierDataset,
    metric: DistanceMetric,
}

impl OnlineKnnClassifier {
    /// Create an empty classifier using squared Euclidean distance
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty classifier with the given distance metric
    pub fn with_metric(metric: DistanceMetric) -> Self {
        Self {
            dataset: ClassifierDataset::new(),
            metric,
        }
    }

    /// Wrap an existing dataset
    pub fn from_dataset(dataset: ClassifierDataset, metric: DistanceMetric) -> Self {
        Self { dataset, metric }
    }

    /// Record an example for a class
    pub fn add_example(&mut self, vector: FeatureVector, label: ClassLabel) -> ClassifierResult<()> {
        self.dataset.add_vector(label, vector)
    }

    /// Classify a vector against the `k` nearest stored examples.
    ///
    /// When fewer than `k` examples exist, all of them vote, so the
    /// confidences always sum to one.
    pub fn predict(&self, vector: &FeatureVector, k: usize) -> ClassifierResult<Prediction> {
        if k == 0 {
            return Err(ClassifierError::InvalidK);
        }
        if self.dataset.is_empty() {
            return Err(ClassifierError::EmptyDataset);
        }
        self.dataset.check_dimension(vector.dim())?;

        let query = vector.as_slice();
        let mut candidates = Vec::with_capacity(self.dataset.len());
        let mut ordinal = 0;
        for (class_slot, (_, examples)) in self.dataset.iter().enumerate() {
            for example in examples {
                candidates.push(Neighbor {
                    distance: self.metric.distance(query, example.as_slice()),
                    class_slot,
                    ordinal,
                });
                ordinal += 1;
            }
        }

        if k < candidates.len() {
            candidates.select_nth_unstable_by(k - 1, Neighbor::rank);
            candidates.truncate(k);
        }
        candidates.sort_by(Neighbor::rank);

        let mut votes = vec![0usize; self.dataset.num_classes()];
        for neighbor in &candidates {
            votes[neighbor.class_slot] += 1;
        }

        // First class to reach the top vote count wins ties
        let mut winner = 0;
        for (slot, &count) in votes.iter().enumerate() {
            if count > votes[winner] {
                winner = slot;
            }
        }

        let neighbors = candidates.len();
        let mut label = None;
        let mut confidences = BTreeMap::new();
        for (slot, class_label) in self.dataset.labels().enumerate() {
            if slot == winner {
                label = Some(class_label.clone());
            }
            confidences.insert(class_label.clone(), votes[slot] as f64 / neighbors as f64);
        }

        let label = label.ok_or(ClassifierError::EmptyDataset)?;
        Ok(Prediction {
            label,
            confidences,
            neighbors,
        })
    }

    /// Remove every example of a class, returning how many were dropped
    pub fn clear_class(&mut self, label: &str) -> ClassifierResult<usize> {
        self.dataset
            .remove_class(label)
            .ok_or_else(|| ClassifierError::UnknownClass(label.to_string()))
    }

    /// Remove every example of every class
    pub fn clear_all(&mut self) {
        self.dataset.clear();
    }

    pub fn class_counts(&self) -> BTreeMap<ClassLabel, usize> {
        self.dataset.class_counts()
    }

    pub fn num_classes(&self) -> usize {
        self.dataset.num_classes()
    }

    pub fn dataset(&self) -> &ClassifierDataset {
        &self.dataset
    }

    /// Replace the whole dataset, e.g. after loading a saved one
    pub fn set_dataset(&mut self, dataset: ClassifierDataset) {
        self.dataset = dataset;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(name: &str) -> ClassLabel {
        ClassLabel::new(name).unwrap()
    }

    fn vector(components: &[f32]) -> FeatureVector {
        FeatureVector::new(components.to_vec()).unwrap()
    }

    fn cat_dog() -> OnlineKnnClassifier {
        let mut classifier = OnlineKnnClassifier::new();
        classifier.add_example(vector(&[1.0, 0.0]), label("cat")).unwrap();
        classifier.add_example(vector(&[1.0, 0.1]), label("cat")).unwrap();
        classifier.add_example(vector(&[0.0, 1.0]), label("dog")).unwrap();
        classifier.add_example(vector(&[0.0, 1.1]), label("dog")).unwrap();
        classifier
    }

    #[test]
    fn test_cat_dog_scenario() {
        let classifier = cat_dog();

        let prediction = classifier.predict(&vector(&[1.0, 0.05]), 2).unwrap();

        assert_eq!(prediction.label.as_str(), "cat");
        assert_eq!(prediction.confidences["cat"], 1.0);
        assert_eq!(prediction.confidences["dog"], 0.0);
        assert_eq!(prediction.neighbors, 2);
    }

    #[test]
    fn test_empty_dataset_fails() {
        let classifier = OnlineKnnClassifier::new();
        assert_eq!(
            classifier.predict(&vector(&[1.0]), 3),
            Err(ClassifierError::EmptyDataset)
        );
    }

    #[test]
    fn test_zero_k_rejected() {
        let classifier = cat_dog();
        assert_eq!(
            classifier.predict(&vector(&[1.0, 0.0]), 0),
            Err(ClassifierError::InvalidK)
        );
    }

    #[test]
    fn test_query_dimension_checked() {
        let classifier = cat_dog();
        assert_eq!(
            classifier.predict(&vector(&[1.0, 0.0, 0.0]), 2),
            Err(ClassifierError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        );
    }

    #[test]
    fn test_confidences_sum_to_one_and_label_is_argmax() {
        let classifier = cat_dog();
        for query in [[0.5, 0.5], [0.9, 0.2], [0.1, 3.0], [-4.0, 2.0]] {
            for k in [1, 2, 3, 4, 10] {
                let prediction = classifier.predict(&vector(&query), k).unwrap();
                let total: f64 = prediction.confidences.values().sum();
                assert!((total - 1.0).abs() < 1e-9, "sum was {}", total);

                let best = prediction
                    .confidences
                    .values()
                    .cloned()
                    .fold(f64::MIN, f64::max);
                assert_eq!(prediction.confidence(), best);
            }
        }
    }

    #[test]
    fn test_k_larger_than_dataset_uses_all_examples() {
        let classifier = cat_dog();
        let prediction = classifier.predict(&vector(&[1.0, 0.0]), DEFAULT_K).unwrap();

        assert_eq!(prediction.neighbors, 4);
        assert_eq!(prediction.confidences["cat"], 0.5);
        assert_eq!(prediction.confidences["dog"], 0.5);
        // Tied vote goes to the first class added
        assert_eq!(prediction.label.as_str(), "cat");
    }

    #[test]
    fn test_vote_tie_prefers_first_class() {
        let mut classifier = OnlineKnnClassifier::new();
        classifier.add_example(vector(&[5.0]), label("late")).unwrap();
        classifier.add_example(vector(&[-5.0]), label("early")).unwrap();

        let prediction = classifier.predict(&vector(&[0.0]), 2).unwrap();

        assert_eq!(prediction.label.as_str(), "late");
    }

    #[test]
    fn test_distance_tie_prefers_earlier_example() {
        let mut classifier = OnlineKnnClassifier::new();
        classifier.add_example(vector(&[1.0]), label("first")).unwrap();
        classifier.add_example(vector(&[-1.0]), label("second")).unwrap();

        // Both examples are equidistant; only one neighbor is taken
        let prediction = classifier.predict(&vector(&[0.0]), 1).unwrap();

        assert_eq!(prediction.label.as_str(), "first");
        assert_eq!(prediction.confidences["second"], 0.0);
    }

    #[test]
    fn test_predict_is_deterministic() {
        let mut classifier = OnlineKnnClassifier::new();
        for i in 0..20 {
            let name = if i % 3 == 0 { "a" } else { "b" };
            classifier
                .add_example(vector(&[(i % 4) as f32, 1.0]), label(name))
                .unwrap();
        }
        let query = vector(&[1.5, 1.0]);

        let first = classifier.predict(&query, 5).unwrap();
        let second = classifier.predict(&query, 5).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_cosine_metric_ignores_magnitude() {
        let mut classifier = OnlineKnnClassifier::with_metric(DistanceMetric::Cosine);
        classifier.add_example(vector(&[10.0, 0.0]), label("right")).unwrap();
        classifier.add_example(vector(&[0.0, 0.1]), label("up")).unwrap();

        let prediction = classifier.predict(&vector(&[0.01, 0.0]), 1).unwrap();

        assert_eq!(prediction.label.as_str(), "right");
    }

    #[test]
    fn test_clear_class() {
        let mut classifier = cat_dog();

        assert_eq!(classifier.clear_class("cat"), Ok(2));
        assert_eq!(classifier.num_classes(), 1);
        assert_eq!(
            classifier.clear_class("cat"),
            Err(ClassifierError::UnknownClass("cat".to_string()))
        );

        let prediction = classifier.predict(&vector(&[1.0, 0.0]), 3).unwrap();
        assert_eq!(prediction.label.as_str(), "dog");
    }
}

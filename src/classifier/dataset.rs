//! Classifier dataset
//!
//! Owns the mapping from class label to the ordered examples recorded for it.
//! Classes keep the order in which they were first seen, and examples keep
//! the order in which they were added, so iteration and serialization are
//! reproducible.

use super::types::{ClassLabel, ClassifierError, ClassifierResult, FeatureVector};
use std::collections::{BTreeMap, HashMap};

/// Examples recorded for one class
#[derive(Debug, Clone, PartialEq)]
struct ClassEntry {
    label: ClassLabel,
    vectors: Vec<FeatureVector>,
}

/// Mutable example store backing the nearest-neighbor classifier
///
/// A class is present if and only if it has at least one example. The
/// dimensionality is fixed by the first vector ever added and survives
/// clearing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassifierDataset {
    classes: Vec<ClassEntry>,
    index: HashMap<ClassLabel, usize>,
    dimension: Option<usize>,
}

impl ClassifierDataset {
    /// Create an empty dataset
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty dataset with the dimensionality already established
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension: Some(dimension),
            ..Self::default()
        }
    }

    /// Append an example to a class, creating the class if needed.
    ///
    /// Fails without touching the dataset if the vector length disagrees
    /// with the established dimensionality.
    pub fn add_vector(&mut self, label: ClassLabel, vector: FeatureVector) -> ClassifierResult<()> {
        self.check_dimension(vector.dim())?;
        self.dimension = Some(vector.dim());

        match self.index.get(&label) {
            Some(&slot) => self.classes[slot].vectors.push(vector),
            None => {
                tracing::debug!("Creating class '{}'", label);
                self.index.insert(label.clone(), self.classes.len());
                self.classes.push(ClassEntry {
                    label,
                    vectors: vec![vector],
                });
            }
        }
        Ok(())
    }

    /// Verify a vector length against the established dimensionality
    pub fn check_dimension(&self, actual: usize) -> ClassifierResult<()> {
        match self.dimension {
            Some(expected) if expected != actual => {
                Err(ClassifierError::DimensionMismatch { expected, actual })
            }
            _ => Ok(()),
        }
    }

    /// Number of examples per class (a snapshot)
    pub fn class_counts(&self) -> BTreeMap<ClassLabel, usize> {
        self.classes
            .iter()
            .map(|entry| (entry.label.clone(), entry.vectors.len()))
            .collect()
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Total number of examples across every class
    pub fn len(&self) -> usize {
        self.classes.iter().map(|entry| entry.vectors.len()).sum()
    }

    /// Dimensionality shared by every example, once established
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// Labels in class insertion order
    pub fn labels(&self) -> impl Iterator<Item = &ClassLabel> {
        self.classes.iter().map(|entry| &entry.label)
    }

    /// Examples of one class in insertion order
    pub fn class_vectors(&self, label: &str) -> Option<&[FeatureVector]> {
        self.index
            .get(label)
            .map(|&slot| self.classes[slot].vectors.as_slice())
    }

    /// Classes with their examples, both in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&ClassLabel, &[FeatureVector])> {
        self.classes
            .iter()
            .map(|entry| (&entry.label, entry.vectors.as_slice()))
    }

    /// Drop a class and all of its examples, returning how many were removed
    pub fn remove_class(&mut self, label: &str) -> Option<usize> {
        let slot = self.index.remove(label)?;
        let entry = self.classes.remove(slot);
        for position in self.index.values_mut() {
            if *position > slot {
                *position -= 1;
            }
        }
        Some(entry.vectors.len())
    }

    /// Remove every example; the dimensionality stays established
    pub fn clear(&mut self) {
        self.classes.clear();
        self.index.clear();
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

    #[test]
    fn test_add_creates_class() {
        let mut dataset = ClassifierDataset::new();
        assert!(dataset.is_empty());

        dataset.add_vector(label("cat"), vector(&[1.0, 0.0])).unwrap();

        assert_eq!(dataset.num_classes(), 1);
        assert_eq!(dataset.dimension(), Some(2));
        assert_eq!(dataset.class_counts().get("cat"), Some(&1));
    }

    #[test]
    fn test_dimension_mismatch_leaves_dataset_unchanged() {
        let mut dataset = ClassifierDataset::new();
        dataset.add_vector(label("cat"), vector(&[1.0, 0.0])).unwrap();
        let before = dataset.clone();

        let err = dataset
            .add_vector(label("dog"), vector(&[1.0, 0.0, 0.0]))
            .unwrap_err();

        assert_eq!(
            err,
            ClassifierError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        );
        assert_eq!(dataset, before);
    }

    #[test]
    fn test_add_increments_only_target_class() {
        let mut dataset = ClassifierDataset::new();
        dataset.add_vector(label("cat"), vector(&[1.0])).unwrap();
        dataset.add_vector(label("dog"), vector(&[2.0])).unwrap();
        let before = dataset.class_counts();

        dataset.add_vector(label("cat"), vector(&[3.0])).unwrap();

        let after = dataset.class_counts();
        assert_eq!(after["cat"], before["cat"] + 1);
        assert_eq!(after["dog"], before["dog"]);
    }

    #[test]
    fn test_class_and_example_order_preserved() {
        let mut dataset = ClassifierDataset::new();
        dataset.add_vector(label("zebra"), vector(&[1.0])).unwrap();
        dataset.add_vector(label("apple"), vector(&[2.0])).unwrap();
        dataset.add_vector(label("zebra"), vector(&[3.0])).unwrap();

        let labels: Vec<&str> = dataset.labels().map(|l| l.as_str()).collect();
        assert_eq!(labels, vec!["zebra", "apple"]);

        let zebra: Vec<f32> = dataset
            .class_vectors("zebra")
            .unwrap()
            .iter()
            .map(|v| v.as_slice()[0])
            .collect();
        assert_eq!(zebra, vec![1.0, 3.0]);
    }

    #[test]
    fn test_class_counts_is_a_snapshot() {
        let mut dataset = ClassifierDataset::new();
        dataset.add_vector(label("cat"), vector(&[1.0])).unwrap();
        let counts = dataset.class_counts();

        dataset.add_vector(label("cat"), vector(&[2.0])).unwrap();

        assert_eq!(counts["cat"], 1);
        assert_eq!(dataset.class_counts()["cat"], 2);
    }

    #[test]
    fn test_remove_class_reindexes() {
        let mut dataset = ClassifierDataset::new();
        dataset.add_vector(label("a"), vector(&[1.0])).unwrap();
        dataset.add_vector(label("b"), vector(&[2.0])).unwrap();
        dataset.add_vector(label("c"), vector(&[3.0])).unwrap();

        assert_eq!(dataset.remove_class("a"), Some(1));
        assert_eq!(dataset.remove_class("a"), None);

        dataset.add_vector(label("c"), vector(&[4.0])).unwrap();
        assert_eq!(dataset.class_vectors("c").unwrap().len(), 2);
        assert_eq!(dataset.class_vectors("b").unwrap().len(), 1);
        assert_eq!(dataset.num_classes(), 2);
    }

    #[test]
    fn test_clear_keeps_dimension() {
        let mut dataset = ClassifierDataset::new();
        dataset.add_vector(label("a"), vector(&[1.0, 2.0])).unwrap();
        dataset.clear();

        assert!(dataset.is_empty());
        assert_eq!(dataset.dimension(), Some(2));
        assert!(dataset.add_vector(label("a"), vector(&[1.0])).is_err());
    }
}

//! Dataset transport encoding
//!
//! Serializes a `ClassifierDataset` into a compact JSON document. Each class
//! becomes one tensor record whose float32 components are stored as
//! little-endian bytes in standard base64, so every value round-trips
//! bit-for-bit and the whole document is plain text.

use crate::classifier::{ClassLabel, ClassifierDataset, FeatureVector};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// Format tag written into every document
pub const FORMAT: &str = "teachable-knn/dataset";

/// Current document version
pub const VERSION: u32 = 1;

const DTYPE_FLOAT32: &str = "float32";

/// Codec errors
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Corrupt dataset: {0}")]
    CorruptDataset(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Text-safe encoded dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransportForm(String);

impl TransportForm {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<String> for TransportForm {
    fn from(text: String) -> Self {
        Self(text)
    }
}

impl fmt::Display for TransportForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DatasetDocument {
    format: String,
    version: u32,
    dimension: Option<usize>,
    classes: Vec<ClassTensor>,
}

/// One class worth of examples as a `[rows, dimension]` tensor
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClassTensor {
    label: String,
    shape: [usize; 2],
    dtype: String,
    data: String,
}

/// Encode a dataset, preserving class order, example order and every bit
/// of every component
pub fn serialize(dataset: &ClassifierDataset) -> Result<TransportForm, CodecError> {
    let classes = dataset
        .iter()
        .map(|(label, vectors)| {
            let dimension = vectors.first().map(|v| v.dim()).unwrap_or(0);
            let mut bytes = Vec::with_capacity(vectors.len() * dimension * 4);
            for vector in vectors {
                for component in vector.as_slice() {
                    bytes.extend_from_slice(&component.to_le_bytes());
                }
            }
            ClassTensor {
                label: label.to_string(),
                shape: [vectors.len(), dimension],
                dtype: DTYPE_FLOAT32.to_string(),
                data: STANDARD.encode(&bytes),
            }
        })
        .collect();

    let document = DatasetDocument {
        format: FORMAT.to_string(),
        version: VERSION,
        dimension: dataset.dimension(),
        classes,
    };

    Ok(TransportForm(serde_json::to_string(&document)?))
}

/// Decode a dataset produced by [`serialize`]
pub fn deserialize(form: &TransportForm) -> Result<ClassifierDataset, CodecError> {
    deserialize_str(form.as_str())
}

/// Decode a dataset from raw document text
pub fn deserialize_str(text: &str) -> Result<ClassifierDataset, CodecError> {
    let document: DatasetDocument = serde_json::from_str(text)
        .map_err(|e| corrupt(format!("unreadable document: {}", e)))?;

    if document.format != FORMAT {
        return Err(corrupt(format!("unexpected format '{}'", document.format)));
    }
    if document.version != VERSION {
        return Err(corrupt(format!(
            "unsupported version {}",
            document.version
        )));
    }

    let mut dataset = match document.dimension {
        Some(0) => return Err(corrupt("dimension must be at least 1".to_string())),
        Some(dimension) => ClassifierDataset::with_dimension(dimension),
        None => ClassifierDataset::new(),
    };
    let mut seen = HashSet::new();

    for tensor in document.classes {
        let label = ClassLabel::new(tensor.label)
            .map_err(|e| corrupt(e.to_string()))?;
        if !seen.insert(label.clone()) {
            return Err(corrupt(format!("class '{}' appears twice", label)));
        }
        if tensor.dtype != DTYPE_FLOAT32 {
            return Err(corrupt(format!(
                "class '{}' has unsupported dtype '{}'",
                label, tensor.dtype
            )));
        }

        let [rows, dimension] = tensor.shape;
        if rows == 0 || dimension == 0 {
            return Err(corrupt(format!("class '{}' has an empty shape", label)));
        }
        if let Some(expected) = dataset.dimension() {
            if dimension != expected {
                return Err(corrupt(format!(
                    "class '{}' has {} components per example, dataset has {}",
                    label, dimension, expected
                )));
            }
        }

        let bytes = STANDARD
            .decode(tensor.data.as_bytes())
            .map_err(|e| corrupt(format!("class '{}' data is not base64: {}", label, e)))?;
        let expected = rows
            .checked_mul(dimension)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| corrupt(format!("class '{}' shape overflows", label)))?;
        if bytes.len() != expected {
            return Err(corrupt(format!(
                "class '{}' holds {} bytes, shape [{}, {}] needs {}",
                label,
                bytes.len(),
                rows,
                dimension,
                expected
            )));
        }

        for row in bytes.chunks_exact(dimension * 4) {
            let components = row
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect();
            let vector = FeatureVector::new(components)
                .map_err(|e| corrupt(format!("class '{}': {}", label, e)))?;
            dataset
                .add_vector(label.clone(), vector)
                .map_err(|e| corrupt(format!("class '{}': {}", label, e)))?;
        }
    }

    Ok(dataset)
}

fn corrupt(message: String) -> CodecError {
    CodecError::CorruptDataset(message)
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

    fn sample_dataset() -> ClassifierDataset {
        let mut dataset = ClassifierDataset::new();
        dataset.add_vector(label("zebra"), vector(&[0.1, -2.5e-8, 3.0])).unwrap();
        dataset.add_vector(label("Apple"), vector(&[f32::MAX, f32::MIN_POSITIVE, -0.0])).unwrap();
        dataset.add_vector(label("zebra"), vector(&[1.0 / 3.0, 7.0, 1e30])).unwrap();
        dataset
    }

    #[test]
    fn test_round_trip_is_exact() {
        let dataset = sample_dataset();

        let form = serialize(&dataset).unwrap();
        let restored = deserialize(&form).unwrap();

        assert_eq!(restored, dataset);
        let labels: Vec<&str> = restored.labels().map(|l| l.as_str()).collect();
        assert_eq!(labels, vec!["zebra", "Apple"]);
        let apple = restored.class_vectors("Apple").unwrap();
        assert_eq!(apple[0].as_slice()[2].to_bits(), (-0.0f32).to_bits());
    }

    #[test]
    fn test_round_trip_empty_dataset() {
        let dataset = ClassifierDataset::new();
        let restored = deserialize(&serialize(&dataset).unwrap()).unwrap();
        assert_eq!(restored, dataset);
    }

    #[test]
    fn test_round_trip_varied_shapes() {
        let wide: Vec<f32> = (0..512)
            .map(|i| match i % 4 {
                0 => f32::MAX,
                1 => f32::MIN,
                2 => f32::EPSILON * i as f32,
                _ => -(i as f32) * 1e-38,
            })
            .collect();

        let cases: Vec<(&str, Vec<(&str, Vec<f32>)>)> = vec![
            ("one class", vec![("only", vec![0.5, 0.25]), ("only", vec![-1.0, 2.0])]),
            (
                "many classes",
                (0..20)
                    .map(|i| (["a", "b", "c", "d", "e"][i % 5], vec![i as f32, -(i as f32)]))
                    .collect(),
            ),
            ("single component", vec![("x", vec![1.0]), ("y", vec![-0.0]), ("x", vec![3.5])]),
            ("wide extremes", vec![("wide", wide.clone()), ("other", wide.iter().rev().copied().collect())]),
            (
                "subnormals",
                vec![("tiny", vec![f32::MIN_POSITIVE / 2.0, -f32::MIN_POSITIVE / 8.0, 1e-45])],
            ),
        ];

        for (name, examples) in cases {
            let mut dataset = ClassifierDataset::new();
            for (class, components) in examples {
                dataset.add_vector(label(class), vector(&components)).unwrap();
            }

            let restored = deserialize(&serialize(&dataset).unwrap()).unwrap();

            assert_eq!(restored, dataset, "case '{}'", name);
            for ((_, before), (_, after)) in dataset.iter().zip(restored.iter()) {
                for (a, b) in before.iter().zip(after) {
                    let a_bits: Vec<u32> = a.as_slice().iter().map(|c| c.to_bits()).collect();
                    let b_bits: Vec<u32> = b.as_slice().iter().map(|c| c.to_bits()).collect();
                    assert_eq!(a_bits, b_bits, "case '{}'", name);
                }
            }
        }
    }

    #[test]
    fn test_zero_dimension_is_corrupt() {
        let text = format!(r#"{{"format":"{FORMAT}","version":1,"dimension":0,"classes":[]}}"#);

        assert!(matches!(
            deserialize_str(&text),
            Err(CodecError::CorruptDataset(_))
        ));
    }

    #[test]
    fn test_shape_disagreeing_with_dimension_is_corrupt() {
        let data = STANDARD.encode(1.0f32.to_le_bytes().repeat(3));
        let text = format!(
            r#"{{"format":"{FORMAT}","version":1,"dimension":2,"classes":[
                {{"label":"a","shape":[1,3],"dtype":"float32","data":"{data}"}}]}}"#
        );

        let err = deserialize_str(&text).unwrap_err();
        assert!(err.to_string().contains("3 components per example"));
    }

    #[test]
    fn test_form_is_embeddable_text() {
        let form = serialize(&sample_dataset()).unwrap();

        // The form survives being nested as a string in another JSON payload
        let wrapped = serde_json::json!({ "model": form });
        let text = serde_json::to_string(&wrapped).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        let inner: TransportForm = serde_json::from_value(parsed["model"].clone()).unwrap();

        assert_eq!(inner, form);
    }

    #[test]
    fn test_garbage_is_corrupt() {
        let err = deserialize_str("not json at all").unwrap_err();
        assert!(matches!(err, CodecError::CorruptDataset(_)));
    }

    #[test]
    fn test_inconsistent_dimension_is_corrupt() {
        let a = STANDARD.encode(1.0f32.to_le_bytes().repeat(2));
        let b = STANDARD.encode(1.0f32.to_le_bytes().repeat(3));
        let text = format!(
            r#"{{"format":"{FORMAT}","version":1,"dimension":2,"classes":[
                {{"label":"a","shape":[1,2],"dtype":"float32","data":"{a}"}},
                {{"label":"b","shape":[1,3],"dtype":"float32","data":"{b}"}}]}}"#
        );

        let err = deserialize_str(&text).unwrap_err();
        assert!(matches!(err, CodecError::CorruptDataset(_)));
    }

    #[test]
    fn test_truncated_data_is_corrupt() {
        let data = STANDARD.encode(1.0f32.to_le_bytes().repeat(3));
        let text = format!(
            r#"{{"format":"{FORMAT}","version":1,"dimension":2,"classes":[
                {{"label":"a","shape":[2,2],"dtype":"float32","data":"{data}"}}]}}"#
        );

        assert!(matches!(
            deserialize_str(&text),
            Err(CodecError::CorruptDataset(_))
        ));
    }

    #[test]
    fn test_bad_base64_is_corrupt() {
        let text = format!(
            r#"{{"format":"{FORMAT}","version":1,"dimension":1,"classes":[
                {{"label":"a","shape":[1,1],"dtype":"float32","data":"%%%"}}]}}"#
        );

        assert!(matches!(
            deserialize_str(&text),
            Err(CodecError::CorruptDataset(_))
        ));
    }

    #[test]
    fn test_duplicate_class_is_corrupt() {
        let data = STANDARD.encode(1.0f32.to_le_bytes());
        let text = format!(
            r#"{{"format":"{FORMAT}","version":1,"dimension":1,"classes":[
                {{"label":"a","shape":[1,1],"dtype":"float32","data":"{data}"}},
                {{"label":"a","shape":[1,1],"dtype":"float32","data":"{data}"}}]}}"#
        );

        assert!(matches!(
            deserialize_str(&text),
            Err(CodecError::CorruptDataset(_))
        ));
    }
}

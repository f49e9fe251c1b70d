//! Classifier session commands
//!
//! The command surface an external UI drives: registering classes, adding
//! examples, recording windows, counts, and exporting or saving the dataset.
//! A session owns the classifier; the capture loop borrows it through
//! shared handles.

use crate::capture::{FeatureExtractor, FrameSource, PresentationSink};
use crate::classifier::{
    ClassLabel, ClassifierDataset, FeatureVector, OnlineKnnClassifier, Prediction,
    SharedClassifier,
};
use crate::config::{validate_duration, AppConfig};
use crate::recorder::{
    CaptureHandle, CaptureLoop, ExampleRequests, LoopContext, RecordingStatus, RecordingTimer,
    SessionEvent, SharedRecording,
};
use crate::storage::{self, TransportForm, DEFAULT_DATASET_FILE};
use crate::utils::error::{AppError, AppResult};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Capacity of the session event channel
const EVENT_CAPACITY: usize = 100;

/// A live classifier session
pub struct ClassifierSession {
    config: AppConfig,
    context: LoopContext,
    timer: RecordingTimer,
    registered: RwLock<Vec<ClassLabel>>,
}

impl ClassifierSession {
    /// Create a session with an empty dataset
    pub fn new(config: AppConfig) -> Self {
        let classifier = OnlineKnnClassifier::with_metric(config.metric);
        Self::with_classifier(config, classifier)
    }

    /// Create a session around an existing dataset
    pub fn with_dataset(config: AppConfig, dataset: ClassifierDataset) -> Self {
        let classifier = OnlineKnnClassifier::from_dataset(dataset, config.metric);
        Self::with_classifier(config, classifier)
    }

    /// Create a session, pre-populated from the configured dataset file.
    ///
    /// A missing or unusable file leaves the session empty.
    pub fn hydrate(config: AppConfig) -> Self {
        let dataset = match &config.dataset_path {
            Some(path) => storage::load_or_empty(path),
            None => ClassifierDataset::new(),
        };
        Self::with_dataset(config, dataset)
    }

    fn with_classifier(config: AppConfig, classifier: OnlineKnnClassifier) -> Self {
        let registered = classifier.dataset().labels().cloned().collect();
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);
        let recording = SharedRecording::default();
        let context = LoopContext {
            classifier: Arc::new(Mutex::new(classifier)),
            recording: recording.clone(),
            requests: ExampleRequests::default(),
            event_tx: event_tx.clone(),
        };

        Self {
            config,
            timer: RecordingTimer::new(recording, event_tx),
            context,
            registered: RwLock::new(registered),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Shared handle to the classifier
    pub fn classifier(&self) -> SharedClassifier {
        self.context.classifier.clone()
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.context.event_tx.subscribe()
    }

    /// Register a class name. Idempotent; the class only enters the dataset
    /// once it receives an example.
    pub fn add_class(&self, label: &str) -> AppResult<ClassLabel> {
        let label = ClassLabel::new(label)?;
        let mut registered = self.registered.write();
        if !registered.contains(&label) {
            tracing::info!("Registered class '{}'", label);
            registered.push(label.clone());
        }
        Ok(label)
    }

    /// Registered classes in registration order
    pub fn registered_classes(&self) -> Vec<ClassLabel> {
        self.registered.read().clone()
    }

    /// Add the next captured frame as one example of `label`
    pub fn add_example(&self, label: &str) -> AppResult<()> {
        let label = self.add_class(label)?;
        self.context.requests.lock().push_back(label);
        Ok(())
    }

    /// Add an already extracted vector as an example of `label`
    pub fn add_example_vector(&self, vector: FeatureVector, label: &str) -> AppResult<usize> {
        let label = self.add_class(label)?;
        let count = {
            let mut classifier = self.context.classifier.lock();
            classifier.add_example(vector, label.clone())?;
            classifier.class_counts().get(&label).copied().unwrap_or(0)
        };
        let _ = self
            .context
            .event_tx
            .send(SessionEvent::ExampleAdded { label, count });
        Ok(count)
    }

    /// Add every captured frame to `label` for `duration_secs` seconds
    /// (the configured default when `None`)
    pub fn start_recording(&self, label: &str, duration_secs: Option<f64>) -> AppResult<Uuid> {
        let duration = match duration_secs {
            Some(secs) => validate_duration(secs)?,
            None => self.config.recording_duration(),
        };
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(AppError::Recording(
                "recording needs a running Tokio runtime".to_string(),
            ));
        }
        let label = self.add_class(label)?;
        Ok(self.timer.start_recording(label, duration))
    }

    pub fn recording_status(&self) -> RecordingStatus {
        self.timer.status()
    }

    /// Classify a vector with the configured k
    pub fn predict(&self, vector: &FeatureVector) -> AppResult<Prediction> {
        Ok(self.context.classifier.lock().predict(vector, self.config.k)?)
    }

    /// Number of examples per class
    pub fn get_class_counts(&self) -> BTreeMap<ClassLabel, usize> {
        let counts = self.context.classifier.lock().class_counts();
        tracing::info!("Class counts: {:?}", counts);
        counts
    }

    /// Remove every example of a class and unregister it
    pub fn clear_class(&self, label: &str) -> AppResult<usize> {
        let removed = self.context.classifier.lock().clear_class(label)?;
        self.registered.write().retain(|l| l.as_str() != label);
        tracing::info!("Cleared class '{}' ({} examples)", label, removed);
        Ok(removed)
    }

    /// Remove every class and example. The established dimension stays.
    pub fn clear_all(&self) {
        self.context.classifier.lock().clear_all();
        self.registered.write().clear();
        tracing::info!("Cleared all classes");
    }

    /// Replace the dataset with one read from `path`
    pub fn load_dataset(&self, path: &Path) -> AppResult<usize> {
        let dataset = storage::read_dataset(path)?;
        let labels: Vec<ClassLabel> = dataset.labels().cloned().collect();
        let examples = dataset.len();

        self.context.classifier.lock().set_dataset(dataset);
        *self.registered.write() = labels;

        tracing::info!("Loaded {} examples from {:?}", examples, path);
        Ok(examples)
    }

    /// Encode the dataset for saving
    pub fn export_dataset(&self) -> AppResult<TransportForm> {
        let dataset = self.context.classifier.lock().dataset().clone();
        Ok(storage::serialize(&dataset)?)
    }

    /// Write the dataset to `path`, or to the configured dataset file
    pub fn save_dataset(&self, path: Option<&Path>) -> AppResult<PathBuf> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => self
                .config
                .dataset_path
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATASET_FILE)),
        };

        let form = self.export_dataset()?;
        storage::file::write_form(&form, &path)?;

        tracing::info!("Saved dataset to {:?}", path);
        let _ = self.context.event_tx.send(SessionEvent::DatasetSaved {
            path: path.to_string_lossy().to_string(),
        });
        Ok(path)
    }

    /// Start the capture loop for this session
    pub fn spawn_capture_loop(
        &self,
        source: Box<dyn FrameSource>,
        extractor: Arc<dyn FeatureExtractor>,
        sink: Arc<dyn PresentationSink>,
    ) -> AppResult<CaptureHandle> {
        let dataset_dimension = self.context.classifier.lock().dataset().dimension();
        if let Some(expected) = dataset_dimension {
            if expected != extractor.dimension() {
                return Err(AppError::InvalidInput(format!(
                    "extractor produces {} components but the dataset holds {}",
                    extractor.dimension(),
                    expected
                )));
            }
        }

        let capture = CaptureLoop::new(
            source,
            extractor,
            sink,
            self.context.clone(),
            self.config.k,
            self.config.frame_interval(),
        );
        Ok(capture.spawn())
    }
}

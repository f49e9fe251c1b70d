//! Dataset persistence
//!
//! - `codec`: lossless text encoding of a classifier dataset
//! - `file`: reading and writing dataset files

pub mod codec;
pub mod file;

pub use codec::{deserialize, serialize, CodecError, TransportForm};
pub use file::{load_or_empty, read_dataset, write_dataset, StorageError, DEFAULT_DATASET_FILE};

pub mod chunking;
pub mod engine;
pub mod mapping;
pub mod request;
pub mod summary;

pub use chunking::{chunk_values, retry_with_backoff, DEFAULT_CHUNK_SIZE};
pub use engine::{TransferConfig, TransferEngine};
pub use mapping::{apply_element_mapping, MappingOutcome, UnmappedReport};
pub use request::{TransferRequest, UnmappedDecision};
pub use summary::{ChunkFailure, TransferSummary};

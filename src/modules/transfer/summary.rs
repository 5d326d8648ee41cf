use serde::{Deserialize, Serialize};

/// Terminal result of a transfer. A run with some failed chunks still
/// completes; this payload is what separates "partial success" from
/// "nothing landed".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransferSummary {
    /// Values fetched from the source, before mapping.
    pub total_values: u64,
    /// Values that made it through the element mapping.
    pub mapped_values: u64,
    /// Unmapped values dropped by a skip decision.
    pub skipped_values: u64,
    pub imported: u64,
    pub updated: u64,
    pub ignored: u64,
    pub deleted: u64,
    pub chunks_total: usize,
    pub failed_chunks: Vec<ChunkFailure>,
    /// (org unit, period) pairs registered complete on the destination.
    pub completions_registered: u64,
}

impl TransferSummary {
    pub fn chunks_succeeded(&self) -> usize {
        self.chunks_total - self.failed_chunks.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkFailure {
    /// 1-based position in the import sequence.
    pub chunk_index: usize,
    pub value_count: usize,
    pub error: String,
}

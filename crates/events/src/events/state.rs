use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Environment state events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateEvent {
    /// Final state frozen into an image manifest
    Frozen {
        build_id: Uuid,
        os_packages: usize,
        runtime_packages: usize,
        files: usize,
    },

    /// Manifest written to disk
    ManifestWritten { build_id: Uuid, path: PathBuf },

    /// Partial state thrown away after a failure or interruption
    Discarded { reason: String },
}

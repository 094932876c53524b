//! Image manifest: the frozen result of a successful build

use crate::state::EnvironmentState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Entry action handed to interactive use once the image is built
pub const DEFAULT_ENTRYPOINT: &[&str] = &["/bin/bash"];

/// A frozen environment state materialized as an image description
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageManifest {
    pub build_id: Uuid,
    pub built_at: DateTime<Utc>,
    pub base_image: String,
    pub catalog: String,
    /// Content fingerprint of the catalog the image was built from
    pub catalog_fingerprint: String,
    pub state: EnvironmentState,
    pub entrypoint: Vec<String>,
}

impl ImageManifest {
    /// Freeze a final state into a manifest with the default entrypoint
    #[must_use]
    pub fn freeze(
        base_image: impl Into<String>,
        catalog: impl Into<String>,
        catalog_fingerprint: impl Into<String>,
        state: EnvironmentState,
    ) -> Self {
        Self {
            build_id: Uuid::new_v4(),
            built_at: Utc::now(),
            base_image: base_image.into(),
            catalog: catalog.into(),
            catalog_fingerprint: catalog_fingerprint.into(),
            state,
            entrypoint: DEFAULT_ENTRYPOINT.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

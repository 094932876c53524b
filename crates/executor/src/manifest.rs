//! Writing frozen image manifests

use envbake_errors::{ConfigError, ProvisioningError};
use envbake_events::{AppEvent, EventEmitter, StateEvent};
use envbake_platform::ProvisionBackend;
use envbake_types::ImageManifest;
use std::path::Path;

use crate::Executor;

impl<B: ProvisionBackend> Executor<B> {
    /// Write `manifest` as pretty-printed JSON
    ///
    /// The file is written next to its final path and renamed into place, so
    /// an interrupted write never leaves a truncated manifest.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest cannot be serialized or written.
    pub async fn write_manifest(
        &self,
        manifest: &ImageManifest,
        path: &Path,
    ) -> Result<(), ProvisioningError> {
        let json = serde_json::to_string_pretty(manifest).map_err(|e| ConfigError::SerializeError {
            what: "image manifest".to_string(),
            error: e.to_string(),
        })?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ProvisioningError::io_with_path(&e, parent))?;
        }

        let staging = path.with_extension("json.tmp");
        tokio::fs::write(&staging, json)
            .await
            .map_err(|e| ProvisioningError::io_with_path(&e, &staging))?;
        tokio::fs::rename(&staging, path)
            .await
            .map_err(|e| ProvisioningError::io_with_path(&e, path))?;

        tracing::debug!(path = %path.display(), build_id = %manifest.build_id, "manifest written");
        self.emit(AppEvent::State(StateEvent::ManifestWritten {
            build_id: manifest.build_id,
            path: path.to_path_buf(),
        }));
        Ok(())
    }
}

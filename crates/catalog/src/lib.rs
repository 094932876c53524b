#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Step catalogs for envbake
//!
//! A catalog is a named [`Pipeline`]: pure data that the executor runs. This
//! crate holds the built-in research image, loads alternate catalogs from
//! TOML, compares catalogs and renders them as build scripts.

mod builtin;
mod diff;
mod export;
mod parser;

pub use builtin::{
    builtin, rl_research_cpu, BUILTIN_CATALOG, FRAMEWORK_INDEX, INTERPRETER_REPOSITORY,
};
pub use diff::{diff, CatalogDiff, StepChange, StepMove};
pub use export::render_dockerfile;
pub use parser::{load_catalog, parse_catalog, to_toml};

use envbake_errors::ProvisioningError;
use envbake_types::Pipeline;

/// Content fingerprint of a catalog
///
/// BLAKE3 over the canonical JSON form, hex encoded. Two catalogs with the
/// same steps in the same order share a fingerprint regardless of the file
/// they were loaded from.
///
/// # Errors
///
/// Returns an error if the pipeline cannot be serialized.
pub fn fingerprint(pipeline: &Pipeline) -> Result<String, ProvisioningError> {
    let canonical = serde_json::to_vec(pipeline)?;
    Ok(blake3::hash(&canonical).to_hex().to_string())
}

/// Resolve a catalog by built-in name or file path
///
/// # Errors
///
/// Returns an error if `source` is not a built-in name and cannot be loaded
/// as a catalog file.
pub async fn resolve(source: Option<&std::path::Path>) -> Result<Pipeline, ProvisioningError> {
    match source {
        None => Ok(builtin()),
        Some(path) if path.as_os_str() == BUILTIN_CATALOG => Ok(builtin()),
        Some(path) => load_catalog(path).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use envbake_types::Step;

    #[test]
    fn test_fingerprint_tracks_content() {
        let a = builtin();
        let b = builtin();
        assert_eq!(fingerprint(&a).unwrap(), fingerprint(&b).unwrap());
        assert_eq!(fingerprint(&a).unwrap().len(), 64);

        let changed = a.clone().then(Step::clear_cache("clear-again"));
        assert_ne!(fingerprint(&a).unwrap(), fingerprint(&changed).unwrap());
    }
}

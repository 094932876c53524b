#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Pipeline execution for envbake
//!
//! - [`validate`] and [`validate_all`]: the static ordering pass
//! - [`Executor`]: runs a pipeline step by step against a
//!   [`ProvisionBackend`](envbake_platform::ProvisionBackend), fail-fast
//! - Failure and idempotence policy: status tracking, re-runs, pin checks

mod executor;
mod manifest;
pub mod policy;
mod tracker;
mod validate;

pub use executor::{Executor, RunReport};
pub use tracker::StepTracker;
pub use validate::{validate, validate_all};

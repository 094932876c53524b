//! Provisioning backends: the seam between the executor and the machine
//!
//! A backend applies a single step and reports its effects. It never merges
//! effects into the state; the executor owns the state and does that after
//! its own checks.

use async_trait::async_trait;
use envbake_errors::ProvisioningError as Error;
use envbake_types::{EnvironmentState, Step, StepEffects};

use crate::core::PlatformContext;

pub mod simulated;
pub mod system;

pub use simulated::{PackageUniverse, RuntimeIndex, SimulatedBackend};
pub use system::{SystemBackend, SystemLayout};

/// Applies steps to an image
#[async_trait]
pub trait ProvisionBackend: Send + Sync {
    /// Short identifier used in logs
    fn name(&self) -> &'static str;

    /// OS packages the base image ships with
    async fn base_packages(
        &self,
        ctx: &PlatformContext,
        base_image: &str,
    ) -> Result<Vec<String>, Error>;

    /// Perform one step against the current state
    ///
    /// `state` reflects every step that succeeded before this one.
    async fn apply(
        &self,
        ctx: &PlatformContext,
        step: &Step,
        state: &EnvironmentState,
    ) -> Result<StepEffects, Error>;
}

#[async_trait]
impl<B: ProvisionBackend + ?Sized> ProvisionBackend for Box<B> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn base_packages(
        &self,
        ctx: &PlatformContext,
        base_image: &str,
    ) -> Result<Vec<String>, Error> {
        (**self).base_packages(ctx, base_image).await
    }

    async fn apply(
        &self,
        ctx: &PlatformContext,
        step: &Step,
        state: &EnvironmentState,
    ) -> Result<StepEffects, Error> {
        (**self).apply(ctx, step, state).await
    }
}

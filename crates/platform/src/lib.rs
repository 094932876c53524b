#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Platform layer for envbake
//!
//! This crate is where steps meet a machine:
//! - Provisioning backends that apply one step and report its effects
//! - Installer command lines for each step kind
//! - Process execution with event emission and error mapping
//! - Build context and image filesystem helpers

pub mod backend;
pub mod commands;
pub mod core;
pub mod fs;
pub mod implementations;
pub mod process;

pub use backend::{
    PackageUniverse, ProvisionBackend, RuntimeIndex, SimulatedBackend, SystemBackend,
    SystemLayout,
};
pub use commands::{installer_commands, pip_list, INTERPRETER_LINK};
pub use core::PlatformContext;
pub use implementations::linux::LinuxProcessOperations;
pub use process::{CommandOutput, PlatformCommand, ProcessOperations};

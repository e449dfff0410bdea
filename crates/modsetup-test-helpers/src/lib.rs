//! Test utilities and fixtures for modsetup
//!
//! Shared by the integration tests of every crate in the workspace. Unit
//! tests inside `modsetup-core` cannot use it, since this crate depends on
//! the core crate.

pub mod fixtures;
pub mod mocks;
pub mod run;

//! hirefire-core: settings and wire constants shared by the HireFire crates.
//!
//! Nothing here caches configuration: every accessor on [`Settings`] reads
//! its [`EnvSource`] again, so a rotated `HIREFIRE_TOKEN` is picked up by the
//! next dispatch without restarting the host process.

pub mod settings;
pub mod version;

pub use settings::{EnvSource, MapEnv, ProcessEnv, Settings};
pub use version::{resource_identity, VERSION};

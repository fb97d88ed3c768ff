//! Environment state: "is there an update?" and "is this a global install?",
//! aggregated into one snapshot.

pub mod monitor;
pub mod probe;

pub use monitor::{EnvironmentMonitor, EnvironmentSnapshot, Notice};
pub use probe::{GlobalInstallProbe, PathProbe};

//! Configuration: user settings and path discovery.

pub mod paths;
pub mod settings;

pub use paths::{SETTINGS_FILE, default_config_dir, find_project_root};
pub use settings::Settings;

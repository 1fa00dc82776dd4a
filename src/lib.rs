pub mod analyzer;
pub mod batch;
pub mod config;
pub mod export;
pub mod model;
pub mod similarity;
pub mod source;

/// Note file extensions we support
pub const SUPPORTED_EXTENSIONS: &[&str] = &["mid", "midi", "json"];

/// Application name for XDG paths
pub const APP_NAME: &str = "songform";

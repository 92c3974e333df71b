//! CLI layer - Command-line interface
//!
//! Contains argument parsing, output formatting, and the command runners.

pub mod app;
pub mod args;
pub mod presenter;

// Re-export commonly used types
pub use app::{AudioOptions, VisionOptions, EXIT_ERROR, EXIT_SUCCESS};
pub use args::{Cli, Commands, ConsentAction};
pub use presenter::Presenter;

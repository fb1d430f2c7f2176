//! Cross-platform utilities shared across cortex-fetch.
//!
//! - [`platform`] - git executable lookup and path expansion
//! - [`progress`] - terminal progress indicators

pub mod platform;
pub mod progress;

pub use platform::{get_git_command, get_home_dir, is_same_or_ancestor, is_windows, resolve_path};
pub use progress::ProgressBar;

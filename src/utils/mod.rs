//! Cross-platform utilities and helpers
//!
//! - [`fs`] - Path resolution, copying and deletion helpers
//! - [`platform`] - Git executable discovery

pub mod fs;
pub mod platform;

pub use fs::{copy_over_path, delete_path, ensure_dir, normalize_path, real_path};
pub use platform::{ensure_git_available, get_git_command, is_windows};

//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Shared utilities (config and usage log loading)
//! - `train` - Model training
//! - `forecast` - Cohort forecast and diagnosis
//! - `features` - Feature table export
//! - `summary` - Usage log headline figures
//! - `config` - Configuration inspection

pub mod config;
pub mod core;
pub mod features;
pub mod forecast;
pub mod summary;
pub mod train;

// Re-export command functions for main.rs
pub use self::config::*;
pub use self::core::*;
pub use features::*;
pub use forecast::*;
pub use summary::*;
pub use train::*;

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

// src/utils/progress_bars/progress_config.rs

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::env;

/// Configuration for progress tracking throughout the pipeline
#[derive(Debug, Clone)]
pub struct ProgressConfig {
    /// Whether to show progress bars at all
    pub enabled: bool,
    /// Whether to show memory usage in the run summary
    pub show_memory: bool,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            show_memory: true,
        }
    }
}

impl ProgressConfig {
    /// Create progress configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            enabled: env::var("PROGRESS_ENABLED")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
            show_memory: env::var("PROGRESS_SHOW_MEMORY")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
        }
    }

    /// Create a MultiProgress instance if progress is enabled, None otherwise
    pub fn create_multi_progress(&self) -> Option<MultiProgress> {
        if self.enabled {
            Some(MultiProgress::new())
        } else {
            None
        }
    }

    pub fn should_show_memory(&self) -> bool {
        self.enabled && self.show_memory
    }
}

/// Adds a pair-comparison bar to `multi`, or returns `None` when progress is off.
pub fn pair_progress_bar(
    multi: Option<&MultiProgress>,
    total: u64,
    label: &str,
) -> Option<ProgressBar> {
    multi.map(|mp| {
        let pb = mp.add(ProgressBar::new(total));
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  {spinner:.blue} [{elapsed_precise}] {bar:30.cyan/blue} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb.set_message(label.to_string());
        pb
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ProgressConfig::default();
        assert!(config.enabled);
        assert!(config.show_memory);
    }

    #[test]
    fn test_env_config() {
        env::set_var("PROGRESS_ENABLED", "false");
        env::set_var("PROGRESS_SHOW_MEMORY", "false");

        let config = ProgressConfig::from_env();
        assert!(!config.enabled);
        assert!(!config.show_memory);

        env::remove_var("PROGRESS_ENABLED");
        env::remove_var("PROGRESS_SHOW_MEMORY");
    }

    #[test]
    fn test_multi_progress_creation() {
        let mut config = ProgressConfig::default();

        config.enabled = true;
        assert!(config.create_multi_progress().is_some());

        config.enabled = false;
        assert!(config.create_multi_progress().is_none());
        assert!(!config.should_show_memory());
        assert!(pair_progress_bar(None, 10, "pairs").is_none());
    }
}

//! Configuration management for routegen plan synthesis.
//!
//! This module defines the `Config` struct and related functionality for
//! managing synthesis settings. The configuration can be loaded from a YAML
//! file, created programmatically, or loaded from command-line arguments.
//!
//! # Examples
//!
//! ```no_run
//! use routegen_core::config::Config;
//!
//! // Create a new config programmatically
//! let mut config = Config::new("calc.yaml", "output");
//! config.framework = "gin".to_string();
//! config.include_all = true;
//! ```

// Internal imports (std, crate)
use std::path::Path;

use crate::decode::Envelope;
use crate::path_template::Notation;

// External imports (alphabetized)
use serde::{Deserialize, Serialize};
use tokio::fs;

/// Configuration for routegen plan synthesis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the interface description file
    pub interface_path: String,

    /// Output directory for synthesized plans
    pub output_dir: String,

    /// Target framework whose invocation catalog to use
    #[serde(default = "default_framework")]
    pub framework: String,

    /// Placeholder notation of the input templates
    #[serde(default)]
    pub source_notation: Notation,

    /// Placeholder notation of the rendered output routes
    #[serde(default)]
    pub dest_notation: Notation,

    /// Response envelope; `None` decodes results from the bare body
    #[serde(default)]
    pub envelope: Option<Envelope>,

    /// Whether to include all methods by default
    #[serde(default)]
    pub include_all: bool,

    /// List of methods to include (if include_all is false)
    #[serde(default)]
    pub include_methods: Vec<String>,

    /// List of methods to exclude
    #[serde(default)]
    pub exclude_methods: Vec<String>,
}

impl Config {
    /// Create a new Config with default values
    pub fn new(interface_path: impl Into<String>, output_dir: impl Into<String>) -> Self {
        Self {
            interface_path: interface_path.into(),
            output_dir: output_dir.into(),
            framework: default_framework(),
            source_notation: Notation::default(),
            dest_notation: Notation::default(),
            envelope: None,
            include_all: true,
            include_methods: Vec::new(),
            exclude_methods: Vec::new(),
        }
    }

    /// Whether a method is selected by the include/exclude lists
    pub fn selects(&self, method: &str) -> bool {
        if self.exclude_methods.iter().any(|m| m == method) {
            return false;
        }
        self.include_all || self.include_methods.iter().any(|m| m == method)
    }

    /// Load configuration from a file
    pub async fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = fs::read_to_string(path).await?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file
    pub async fn save<P: AsRef<Path>>(&self, path: P) -> crate::Result<()> {
        let content = serde_yaml::to_string(self)?;
        fs::write(path, content).await?;
        Ok(())
    }
}

fn default_framework() -> String {
    "echo".to_string()
}

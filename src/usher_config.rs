//! Configuration for usher, read from `.usher/usher.toml`.
//!
//! Everything is optional; a missing file means defaults across the
//! board. The file governs presentation-side behavior only (project
//! naming, prompt output), never transition rules.
//!
//! # Configuration File Format
//!
//! ```toml
//! [project]
//! name = "payments-service"
//! default_type = "standard"
//!
//! [prompts]
//! enabled = true
//! file = "prompt.md"
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::prompts::PROMPT_FILE;

/// Config file name within the `.usher` directory.
pub const CONFIG_FILE: &str = "usher.toml";

/// Project-level settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectSection {
    /// Display name used when starting a project without a description.
    #[serde(default)]
    pub name: Option<String>,
    /// Project type used by `init` when none is passed on the CLI.
    #[serde(default)]
    pub default_type: Option<String>,
}

fn default_prompts_enabled() -> bool {
    true
}

/// Prompt rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptsSection {
    /// Whether state entry writes a guidance prompt at all.
    #[serde(default = "default_prompts_enabled")]
    pub enabled: bool,
    /// Prompt file name within `.usher`, when overridden.
    #[serde(default)]
    pub file: Option<String>,
}

impl Default for PromptsSection {
    fn default() -> Self {
        Self {
            enabled: true,
            file: None,
        }
    }
}

/// Complete configuration from usher.toml.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsherToml {
    #[serde(default)]
    pub project: ProjectSection,
    #[serde(default)]
    pub prompts: PromptsSection,
}

impl UsherToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse usher.toml")
    }

    /// Load configuration from the default location (.usher/usher.toml).
    /// Returns default configuration if the file doesn't exist.
    pub fn load_or_default(usher_dir: &Path) -> Result<Self> {
        let config_path = usher_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize usher.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Project type `init` should use when the CLI passes none.
    pub fn default_type(&self) -> &str {
        self.project.default_type.as_deref().unwrap_or("standard")
    }

    /// Prompt file name within the `.usher` directory.
    pub fn prompt_file(&self) -> &str {
        self.prompts.file.as_deref().unwrap_or(PROMPT_FILE)
    }
}

//! Optional TOML configuration for the command-line viewer.

use crate::error::Result;
use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// When the printing consumer attaches relative to fragment loading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AttachTiming {
    /// Attach before any fragment loads; every registration is delivered directly
    Early,
    /// Attach after all fragments load; the pending registry is drained once
    #[default]
    Late,
}

/// Contents of an `implementors.toml` file.
///
/// Relative paths are resolved against the directory containing the file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewerConfig {
    /// Fragment files, loaded in this order
    pub fragments: Vec<PathBuf>,
    /// Directory scanned for additional fragments (loaded after `fragments`)
    pub fragment_dir: Option<PathBuf>,
    /// Default consumer attach timing
    pub attach: Option<AttachTiming>,
}

impl ViewerConfig {
    /// Parse configuration text without resolving paths.
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).context("Failed to parse viewer config")
    }

    /// Load a config file and resolve its relative paths.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config at {}", path.display()))?;
        let config = Self::parse(&text)
            .with_context(|| format!("Invalid config at {}", path.display()))?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Ok(config.relative_to(base))
    }

    fn relative_to(mut self, base: &Path) -> Self {
        for fragment in &mut self.fragments {
            if fragment.is_relative() {
                *fragment = base.join(&*fragment);
            }
        }
        if let Some(dir) = self.fragment_dir.as_mut()
            && dir.is_relative()
        {
            *dir = base.join(&*dir);
        }
        self
    }
}

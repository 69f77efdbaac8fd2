use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Platform};

fn default_enabled() -> bool {
    true
}

/// One entry in `config/sources.yaml`: which show to collect on which platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub platform: Platform,
    /// Show or account name passed to the source's owner lookup.
    pub show: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct SourcesFile {
    pub sources: Vec<SourceConfig>,
}

impl SourcesFile {
    /// Enabled entries, in file order.
    pub fn enabled(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter().filter(|s| s.enabled)
    }
}

/// Load and validate the sources configuration from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_sources(path: &Path) -> Result<SourcesFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::SourcesFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_sources(&content)
}

/// Parse and validate sources YAML already in memory.
///
/// # Errors
///
/// Returns `ConfigError` if the YAML is malformed or fails validation.
pub fn parse_sources(content: &str) -> Result<SourcesFile, ConfigError> {
    let sources_file: SourcesFile =
        serde_yaml::from_str(content).map_err(ConfigError::SourcesFileParse)?;

    validate_sources(&sources_file)?;

    Ok(sources_file)
}

fn validate_sources(sources_file: &SourcesFile) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for source in &sources_file.sources {
        if source.show.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "{} source has an empty show name",
                source.platform
            )));
        }

        let key = (source.platform, source.show.trim().to_lowercase());
        if !seen.insert(key) {
            return Err(ConfigError::Validation(format!(
                "duplicate source: {} '{}'",
                source.platform, source.show
            )));
        }
    }

    Ok(())
}

//! Adapter configuration.
//!
//! Loaded from RON; every field has a default so an empty document (or `()`)
//! is a valid configuration:
//!
//! ```ron
//! (
//!     use_native_remove_all: true, // prefer the backend's own bulk delete
//!     max_depth: 1024,             // deepest nesting remove_all will walk
//!     list_limit: 0,               // readdir batch size, 0 = whole directory
//!     dir_mode: 0o755,             // mode for mkdir_all_default
//! )
//! ```

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Default recursion limit for [`RecursiveRemover`](crate::RecursiveRemover).
pub const DEFAULT_MAX_DEPTH: usize = 1024;

/// Default directory mode.
pub const DEFAULT_DIR_MODE: u32 = 0o755;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config: {0}")]
    Read(#[from] std::io::Error),

    /// The document is not valid RON for this schema.
    #[error("RON parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// The values parse but make no sense together.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Settings for an [`Httpfs`](crate::Httpfs) adapter.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpfsConfig {
    /// Delegate `remove_all` to the backend when it has a native bulk delete.
    pub use_native_remove_all: bool,
    /// Maximum nesting below the target that `remove_all` will descend.
    pub max_depth: usize,
    /// Entries requested per `readdir` call while walking; 0 means all at once.
    pub list_limit: usize,
    /// Permission bits used by `mkdir_all_default`.
    pub dir_mode: u32,
}

impl Default for HttpfsConfig {
    fn default() -> Self {
        Self {
            use_native_remove_all: true,
            max_depth: DEFAULT_MAX_DEPTH,
            list_limit: 0,
            dir_mode: DEFAULT_DIR_MODE,
        }
    }
}

impl HttpfsConfig {
    /// Parse and validate a RON document.
    pub fn from_ron_str(source: &str) -> Result<Self, ConfigError> {
        if source.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = ron::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a RON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        let config = Self::from_ron_str(&source)?;
        tracing::info!(path = %path.display(), "loaded httpfs config");
        Ok(config)
    }

    /// Reject values that would make the adapter unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_depth == 0 {
            return Err(ConfigError::Invalid(
                "max_depth must be at least 1".to_string(),
            ));
        }
        if self.dir_mode & !0o7777 != 0 {
            return Err(ConfigError::Invalid(format!(
                "dir_mode {:o} has bits outside 0o7777",
                self.dir_mode
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_document_is_default() {
        let config = HttpfsConfig::from_ron_str("").unwrap();
        assert_eq!(config, HttpfsConfig::default());
        assert_eq!(HttpfsConfig::from_ron_str("()").unwrap(), config);
        assert!(config.use_native_remove_all);
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn test_partial_document() {
        let config = HttpfsConfig::from_ron_str(
            "(use_native_remove_all: false, list_limit: 64, dir_mode: 0o700)",
        )
        .unwrap();
        assert!(!config.use_native_remove_all);
        assert_eq!(config.list_limit, 64);
        assert_eq!(config.dir_mode, 0o700);
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            HttpfsConfig::from_ron_str("(max_depth: 0)"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            HttpfsConfig::from_ron_str("(dir_mode: 0o77777)"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            HttpfsConfig::from_ron_str("(unknown: 1)"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "(max_depth: 16)").unwrap();

        let config = HttpfsConfig::load(file.path()).unwrap();
        assert_eq!(config.max_depth, 16);

        let missing = HttpfsConfig::load(file.path().with_extension("missing"));
        assert!(matches!(missing, Err(ConfigError::Read(_))));
    }
}

//! GridScript Configuration Management
//!
//! Loads compiler and registry settings from a `key = value` text file.
//! Lines starting with `#` are comments; unknown keys are logged and skipped.
//!
//! ```text
//! # gridscript.conf
//! dialects = lsl, ossl
//! extensions = json
//! long_integers = false
//! max_errors = 20
//! continue_after_error = true
//! log_level = info
//! ```

use gridscript_core::{Dialect, GridScriptError, Result};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// File read by [`CompilerConfig::load_default`]
pub const DEFAULT_FILE: &str = "gridscript.conf";

/// Effective compiler configuration
#[derive(Debug, Clone, PartialEq)]
pub struct CompilerConfig {
    /// Dialects enabled for every script (from "dialects", default: lsl)
    pub dialects: Vec<Dialect>,
    /// Extension groups enabled for every script (from "extensions")
    pub extensions: BTreeSet<String>,
    /// Admit 64-bit integer members into the registry (from "long_integers")
    pub long_integers: bool,
    /// Diagnostics reported per script (from "max_errors", default: 20)
    pub max_errors: usize,
    /// Keep compiling after the first failing body (from "continue_after_error")
    pub continue_after_error: bool,
    /// Tracing filter used when `RUST_LOG` is unset (from "log_level")
    pub log_level: String,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            dialects: vec![Dialect::Lsl],
            extensions: BTreeSet::new(),
            long_integers: false,
            max_errors: 20,
            continue_after_error: true,
            log_level: "info".into(),
        }
    }
}

impl CompilerConfig {
    /// Load configuration from a file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Load `gridscript.conf` from the working directory, or the defaults
    /// when there is none
    pub fn load_default() -> Result<Self> {
        Self::load_or_default(DEFAULT_FILE)
    }

    /// Load `path` when it exists, defaults otherwise
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        Self::load_from_file(path)
    }

    /// Parse configuration text
    pub fn parse(content: &str) -> Result<Self> {
        let mut config = Self::default();

        for (index, line) in content.lines().enumerate() {
            let line = line.trim();

            // Skip comments and empty lines
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(GridScriptError::Config(format!(
                    "line {}: expected 'key = value', found '{}'",
                    index + 1,
                    line
                )));
            };
            config
                .parse_option(key.trim(), value.trim())
                .map_err(|message| GridScriptError::Config(format!("line {}: {}", index + 1, message)))?;
        }

        Ok(config)
    }

    fn parse_option(&mut self, key: &str, value: &str) -> std::result::Result<(), String> {
        match key {
            "dialects" => {
                let mut dialects = Vec::new();
                for name in list(value) {
                    let dialect = Dialect::from_name(name).ok_or_else(|| format!("unknown dialect '{}'", name))?;
                    if !dialects.contains(&dialect) {
                        dialects.push(dialect);
                    }
                }
                if dialects.is_empty() {
                    return Err("'dialects' needs at least one dialect".into());
                }
                self.dialects = dialects;
            }
            "extensions" => {
                self.extensions = list(value).map(str::to_string).collect();
            }
            "long_integers" => self.long_integers = flag(key, value)?,
            "max_errors" => {
                self.max_errors = match value.parse() {
                    Ok(n) if n > 0 => n,
                    _ => return Err(format!("'max_errors' must be a positive number, found '{}'", value)),
                };
            }
            "continue_after_error" => self.continue_after_error = flag(key, value)?,
            "log_level" => self.log_level = value.to_lowercase(),
            _ => tracing::warn!(key, "ignoring unknown config key"),
        }
        Ok(())
    }

    /// Display configuration summary
    pub fn display(&self) {
        let dialects: Vec<&str> = self.dialects.iter().map(|d| d.as_str()).collect();
        tracing::info!("Compiler configuration:");
        tracing::info!("    Dialects: {}", dialects.join(", "));
        if self.extensions.is_empty() {
            tracing::info!("    Extensions: (none)");
        } else {
            let extensions: Vec<&str> = self.extensions.iter().map(String::as_str).collect();
            tracing::info!("    Extensions: {}", extensions.join(", "));
        }
        tracing::info!("    Long integers: {}", self.long_integers);
        tracing::info!("    Max errors: {}", self.max_errors);
        tracing::info!("    Continue after error: {}", self.continue_after_error);
        tracing::info!("    Log level: {}", self.log_level);
    }
}

/// Comma- or whitespace-separated items
fn list(value: &str) -> impl Iterator<Item = &str> {
    value
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
}

fn flag(key: &str, value: &str) -> std::result::Result<bool, String> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(format!("'{}' must be true or false, found '{}'", key, value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = CompilerConfig::default();
        assert_eq!(config.dialects, vec![Dialect::Lsl]);
        assert_eq!(config.max_errors, 20);
        assert!(config.continue_after_error);
        assert!(!config.long_integers);
    }

    #[test]
    fn test_parse_simple_config() {
        let config_text = r#"
# compile with OpenSim extensions
dialects = lsl, ossl
extensions = json physics
long_integers = yes
max_errors = 5
continue_after_error = false
log_level = DEBUG
"#;
        let config = CompilerConfig::parse(config_text).unwrap();
        assert_eq!(config.dialects, vec![Dialect::Lsl, Dialect::Ossl]);
        assert!(config.extensions.contains("json"));
        assert!(config.extensions.contains("physics"));
        assert!(config.long_integers);
        assert_eq!(config.max_errors, 5);
        assert!(!config.continue_after_error);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let config = CompilerConfig::parse("color = blue\nmax_errors = 3").unwrap();
        assert_eq!(config.max_errors, 3);
    }

    #[test]
    fn test_invalid_values() {
        let err = CompilerConfig::parse("dialects = lsl, cobol").unwrap_err();
        assert!(matches!(err, GridScriptError::Config(ref m) if m.contains("unknown dialect 'cobol'")));

        let err = CompilerConfig::parse("\nmax_errors = 0").unwrap_err();
        assert!(err.to_string().contains("line 2"));

        assert!(CompilerConfig::parse("long_integers = maybe").is_err());
        assert!(CompilerConfig::parse("just words").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "dialects = ossl").unwrap();
        writeln!(file, "extensions = json").unwrap();

        let config = CompilerConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.dialects, vec![Dialect::Ossl]);
        assert_eq!(config.extensions.len(), 1);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_FILE);

        assert!(matches!(
            CompilerConfig::load_from_file(&path),
            Err(GridScriptError::Io(_))
        ));
        assert_eq!(CompilerConfig::load_or_default(&path).unwrap(), CompilerConfig::default());
    }
}

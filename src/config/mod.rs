//! Site configuration management for `quire.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/   # [site], [build], [serve], [plugins.*]
//! ├── error      # ConfigError, ConfigDiagnostics
//! ├── handle     # ConfigHandle (atomic reload for recompiles)
//! └── mod.rs     # SiteConfig (this file)
//! ```
//!
//! Values are resolved in three layers: section defaults, then the file,
//! then [`Overrides`] collected from the command line.

mod error;
mod handle;
pub mod section;

pub use error::{ConfigDiagnostics, ConfigError};
pub use handle::ConfigHandle;
pub use section::{
    BuildSectionConfig, DateSource, PluginsConfig, ServeConfig, SiteSectionConfig,
};

use crate::log;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    net::IpAddr,
    path::{Path, PathBuf},
};

/// Default config file name.
pub const CONFIG_FILE: &str = "quire.toml";

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing `quire.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Absolute path to the config file (internal use only)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Project root, the config file's parent (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    /// Dev-server mode: enables the live reload script (internal use only)
    #[serde(skip)]
    pub serving: bool,

    #[serde(default)]
    pub site: SiteSectionConfig,

    #[serde(default)]
    pub build: BuildSectionConfig,

    #[serde(default)]
    pub serve: ServeConfig,

    #[serde(default)]
    pub plugins: PluginsConfig,
}

/// Command-line values layered over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub content: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub concurrency: Option<usize>,
    pub serving: bool,
    pub watch: Option<bool>,
    pub interface: Option<IpAddr>,
    pub port: Option<u16>,
    pub ws_port: Option<u16>,
    pub base_dir: Option<String>,
    pub ws_host: Option<String>,
}

impl SiteConfig {
    /// Load, apply overrides, normalize and validate.
    ///
    /// A missing file is not an error: all sections have defaults, so a bare
    /// `content/` directory builds out of the box.
    pub fn load(config_path: &Path, overrides: &Overrides) -> Result<Self> {
        let mut config = if config_path.exists() {
            Self::from_path(config_path)?
        } else {
            Self::default()
        };

        config.config_path = config_path.to_path_buf();
        config.root = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        config.apply_overrides(overrides);
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;

        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }

        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {}, ignoring:", display_path);
        for field in fields {
            eprintln!("- {field}");
        }
    }

    fn apply_overrides(&mut self, o: &Overrides) {
        Self::update_option(&mut self.build.content, o.content.as_ref());
        Self::update_option(&mut self.build.output, o.output.as_ref());
        if o.concurrency.is_some() {
            self.build.concurrency = o.concurrency;
        }

        self.serving = o.serving;
        Self::update_option(&mut self.serve.watch, o.watch.as_ref());
        Self::update_option(&mut self.serve.interface, o.interface.as_ref());
        Self::update_option(&mut self.serve.port, o.port.as_ref());
        Self::update_option(&mut self.serve.ws_port, o.ws_port.as_ref());
        Self::update_option(&mut self.serve.base_dir, o.base_dir.as_ref());
        if o.ws_host.is_some() {
            self.serve.ws_host.clone_from(&o.ws_host);
        }
    }

    /// Update config option if CLI value is provided.
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    fn normalize(&mut self) {
        let root = self.root.clone();
        self.build.content = root.join(&self.build.content);
        self.build.output = root.join(&self.build.output);
        self.build.static_dir = root.join(&self.build.static_dir);
        self.serve.base_dir = section::normalize_base_dir(&self.serve.base_dir);
    }

    /// Collects all validation errors and returns them at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut diag = ConfigDiagnostics::new();

        if self.build.content == self.build.output {
            diag.error("build.output", "output directory must differ from content directory");
        }
        if self.build.output.starts_with(&self.build.content) {
            diag.error("build.output", "output directory must not be inside the content directory");
        }
        if self.build.concurrency == Some(0) {
            diag.error("build.concurrency", "must be at least 1");
        }
        if self.serving && self.serve.port == self.serve.ws_port {
            diag.error("serve.ws_port", "must differ from serve.port");
        }

        let desc = &self.plugins.description;
        if desc.max_length < desc.length {
            diag.error(
                "plugins.description.max_length",
                format!("must be >= length ({})", desc.length),
            );
        }
        if !(1..=6).contains(&self.plugins.toc.max_depth) {
            diag.error("plugins.toc.max_depth", "must be between 1 and 6");
        }
        if self.plugins.dates.priority.is_empty() {
            diag.error("plugins.dates.priority", "needs at least one source");
        }

        diag.into_result()
    }

    // ========================================================================
    // paths
    // ========================================================================

    pub fn content_dir(&self) -> &Path {
        &self.build.content
    }

    pub fn output_dir(&self) -> &Path {
        &self.build.output
    }

    pub fn static_dir(&self) -> &Path {
        &self.build.static_dir
    }

    /// Get path relative to the site root, for display.
    pub fn root_relative(&self, path: impl AsRef<Path>) -> PathBuf {
        path.as_ref()
            .strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.as_ref().to_path_buf())
    }

    /// Host and port the browser should use for the reload socket.
    pub fn ws_address(&self) -> String {
        match &self.serve.ws_host {
            Some(host) => host.clone(),
            None => format!("{}:{}", self.serve.interface, self.serve.ws_port),
        }
    }
}

/// Find the config file by searching upward from the current directory.
///
/// Falls back to `cwd/<name>` (which may not exist) when nothing is found.
pub fn find_config_file(config_name: &Path) -> Result<PathBuf> {
    let cwd = std::env::current_dir().context("Failed to get current working directory")?;

    if config_name.is_absolute() {
        return Ok(config_name.to_path_buf());
    }

    let mut current = cwd.as_path();
    loop {
        let candidate = current.join(config_name);
        if candidate.exists() {
            return Ok(candidate);
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => return Ok(cwd.join(config_name)),
        }
    }
}

// ============================================================================
// Test Helpers
// ============================================================================

/// Parse a config string, panicking on unknown fields to catch typos in tests.
#[cfg(test)]
pub fn test_parse_config(extra: &str) -> SiteConfig {
    let (parsed, ignored) = SiteConfig::parse_with_ignored(extra).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}

/// A normalized config rooted at `root`, as produced by [`SiteConfig::load`].
#[cfg(test)]
pub fn test_config_at(root: &Path) -> SiteConfig {
    let mut config = SiteConfig {
        config_path: root.join(CONFIG_FILE),
        root: root.to_path_buf(),
        ..SiteConfig::default()
    };
    config.normalize();
    config
}

// ============================================================================
// tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_unknown_fields_are_collected() {
        let (_, ignored) =
            SiteConfig::parse_with_ignored("[site]\ntitel = \"x\"\n[serve]\nprot = 1").unwrap();
        assert_eq!(ignored, vec!["site.titel".to_string(), "serve.prot".to_string()]);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = SiteConfig::load(&dir.path().join(CONFIG_FILE), &Overrides::default()).unwrap();
        assert_eq!(config.content_dir(), dir.path().join("content"));
        assert_eq!(config.output_dir(), dir.path().join("public"));
        assert!(!config.serving);
    }

    #[test]
    fn test_load_applies_overrides() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[serve]\nport = 9000\nbase_dir = \"garden/\"").unwrap();

        let overrides = Overrides {
            output: Some("dist".into()),
            port: Some(9100),
            serving: true,
            ..Overrides::default()
        };
        let config = SiteConfig::load(&path, &overrides).unwrap();
        assert_eq!(config.output_dir(), dir.path().join("dist"));
        assert_eq!(config.serve.port, 9100);
        assert_eq!(config.serve.base_dir, "/garden");
        assert!(config.serving);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(
            &path,
            "[build]\noutput = \"content\"\n[plugins.description]\nlength = 400",
        )
        .unwrap();

        let err = SiteConfig::load(&path, &Overrides::default()).unwrap_err();
        let err = err.downcast::<ConfigError>().unwrap();
        let ConfigError::Diagnostics(diag) = err else {
            panic!("expected diagnostics");
        };
        let fields: Vec<_> = diag.errors().iter().map(|d| d.field).collect();
        assert!(fields.contains(&"build.output"));
        assert!(fields.contains(&"plugins.description.max_length"));
    }

    #[test]
    fn test_port_clash_only_matters_when_serving() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        let mut overrides = Overrides {
            port: Some(3001),
            ..Overrides::default()
        };
        assert!(SiteConfig::load(&path, &overrides).is_ok());

        overrides.serving = true;
        assert!(SiteConfig::load(&path, &overrides).is_err());
    }

    #[test]
    fn test_ws_address() {
        let mut config = test_parse_config("");
        assert_eq!(config.ws_address(), "127.0.0.1:3001");
        config.serve.ws_host = Some("dev.box:4000".into());
        assert_eq!(config.ws_address(), "dev.box:4000");
    }
}

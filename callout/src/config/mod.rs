//! calloutd configuration loading.
//!
//! The expected YAML structure is:
//! ```yaml
//! dispatcher:
//!   thread_name: "callout"
//!   stack_size_kb: 256
//! clock:
//!   enabled: true
//!   root: "clock"
//!   zone: "local"     # local | utc
//! ```
//!
//! Every key is optional; anything missing falls back to the defaults
//! returned by [`DispatcherConfig::default`] / [`ClockPublisherConfig::default`].

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info};

use crate::clock::ClockZone;

// ── Private YAML deserialization types ────────────────────────────────────────

/// Top-level wrapper that maps directly onto the YAML file layout.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    dispatcher: DispatcherEntry,
    #[serde(default)]
    clock: ClockEntry,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct DispatcherEntry {
    thread_name: Option<String>,
    stack_size_kb: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ClockEntry {
    enabled: Option<bool>,
    root: Option<String>,
    #[serde(default)]
    zone: ClockZone,
}

// ── Public data structures ────────────────────────────────────────────────────

/// How the dispatch thread is spawned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// OS thread name (shows up in `top -H`, debuggers and panic messages).
    pub thread_name: String,
    /// Stack size for the dispatch thread.  `None` keeps the platform default.
    pub stack_size_kb: Option<usize>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            thread_name: String::from("callout"),
            stack_size_kb: None,
        }
    }
}

/// Settings for the minute-boundary clock publisher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockPublisherConfig {
    pub enabled: bool,
    /// First path segment of the published values (`<root>.hour`, ...).
    pub root: String,
    pub zone: ClockZone,
}

impl Default for ClockPublisherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            root: String::from("clock"),
            zone: ClockZone::Local,
        }
    }
}

// ── ConfigManager ─────────────────────────────────────────────────────────────

/// Loads and holds the calloutd configuration.
#[derive(Debug, Default)]
pub struct ConfigManager {
    dispatcher: DispatcherConfig,
    clock: ClockPublisherConfig,

    /// Set to `true` after a successful [`load_from_file`](Self::load_from_file).
    loaded: bool,
}

impl ConfigManager {
    /// Creates a manager holding the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `path` and replaces the current configuration.
    ///
    /// On error the manager is left holding the defaults and
    /// [`is_loaded`](Self::is_loaded) returns `false`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, if the YAML is invalid,
    /// or if it contains unknown keys.
    pub fn load_from_file(&mut self, path: &Path) -> Result<()> {
        info!("Loading configuration from: {}", path.display());

        // Reset state before (re-)loading
        *self = Self::default();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot open configuration file: {}", path.display()))?;

        // An empty document is a valid "all defaults" file.
        let file: ConfigFile = if content.trim().is_empty() {
            ConfigFile::default()
        } else {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML file: {}", path.display()))?
        };

        let defaults = DispatcherConfig::default();
        self.dispatcher = DispatcherConfig {
            thread_name: file.dispatcher.thread_name.unwrap_or(defaults.thread_name),
            stack_size_kb: file.dispatcher.stack_size_kb,
        };

        let defaults = ClockPublisherConfig::default();
        self.clock = ClockPublisherConfig {
            enabled: file.clock.enabled.unwrap_or(defaults.enabled),
            root: file.clock.root.unwrap_or(defaults.root),
            zone: file.clock.zone,
        };

        debug!(dispatcher = ?self.dispatcher, clock = ?self.clock, "parsed configuration");
        self.loaded = true;
        Ok(())
    }

    pub fn dispatcher(&self) -> &DispatcherConfig {
        &self.dispatcher
    }

    pub fn clock(&self) -> &ClockPublisherConfig {
        &self.clock
    }

    /// Mutable access, used by the binary to apply CLI overrides.
    pub fn clock_mut(&mut self) -> &mut ClockPublisherConfig {
        &mut self.clock
    }

    /// Returns `true` after a successful call to [`load_from_file`](Self::load_from_file).
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Helper: write a YAML string to a temp file and return it.
    fn yaml_tempfile(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn defaults_when_nothing_loaded() {
        let mgr = ConfigManager::new();
        assert!(!mgr.is_loaded());
        assert_eq!(mgr.dispatcher().thread_name, "callout");
        assert_eq!(mgr.dispatcher().stack_size_kb, None);
        assert!(mgr.clock().enabled);
        assert_eq!(mgr.clock().root, "clock");
        assert_eq!(mgr.clock().zone, ClockZone::Local);
    }

    #[test]
    fn load_full_yaml() {
        let yaml = r#"
dispatcher:
  thread_name: "timers"
  stack_size_kb: 512
clock:
  enabled: false
  root: "ui_clock"
  zone: "utc"
"#;
        let f = yaml_tempfile(yaml);
        let mut mgr = ConfigManager::new();
        mgr.load_from_file(f.path()).unwrap();

        assert!(mgr.is_loaded());
        assert_eq!(mgr.dispatcher().thread_name, "timers");
        assert_eq!(mgr.dispatcher().stack_size_kb, Some(512));
        assert!(!mgr.clock().enabled);
        assert_eq!(mgr.clock().root, "ui_clock");
        assert_eq!(mgr.clock().zone, ClockZone::Utc);
    }

    #[test]
    fn partial_yaml_keeps_defaults_for_missing_keys() {
        let f = yaml_tempfile("clock:\n  zone: utc\n");
        let mut mgr = ConfigManager::new();
        mgr.load_from_file(f.path()).unwrap();

        assert_eq!(mgr.dispatcher(), &DispatcherConfig::default());
        assert!(mgr.clock().enabled);
        assert_eq!(mgr.clock().root, "clock");
        assert_eq!(mgr.clock().zone, ClockZone::Utc);
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let f = yaml_tempfile("");
        let mut mgr = ConfigManager::new();
        mgr.load_from_file(f.path()).unwrap();
        assert!(mgr.is_loaded());
        assert_eq!(mgr.clock(), &ClockPublisherConfig::default());
    }

    #[test]
    fn missing_file_returns_error() {
        let mut mgr = ConfigManager::new();
        let result = mgr.load_from_file(Path::new("/nonexistent/path/calloutd.yaml"));
        assert!(result.is_err());
        assert!(!mgr.is_loaded());
    }

    #[test]
    fn malformed_yaml_returns_error() {
        let f = yaml_tempfile("this is: not: valid: yaml: content:::");
        let mut mgr = ConfigManager::new();
        assert!(mgr.load_from_file(f.path()).is_err());
        assert!(!mgr.is_loaded());
    }

    #[test]
    fn unknown_zone_or_key_is_rejected() {
        let mut mgr = ConfigManager::new();
        let f = yaml_tempfile("clock:\n  zone: mars\n");
        assert!(mgr.load_from_file(f.path()).is_err());
        let f = yaml_tempfile("dispatcher:\n  priority: 5\n");
        assert!(mgr.load_from_file(f.path()).is_err());
    }

    #[test]
    fn reload_replaces_previous_values() {
        let f1 = yaml_tempfile("dispatcher:\n  thread_name: first\n");
        let f2 = yaml_tempfile("clock:\n  root: other\n");

        let mut mgr = ConfigManager::new();
        mgr.load_from_file(f1.path()).unwrap();
        assert_eq!(mgr.dispatcher().thread_name, "first");

        mgr.load_from_file(f2.path()).unwrap();
        assert_eq!(mgr.dispatcher().thread_name, "callout", "old value must be gone");
        assert_eq!(mgr.clock().root, "other");
    }
}

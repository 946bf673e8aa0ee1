//! Settings infrastructure for sfcls.
//!
//! Settings are read from an `sfcls.toml` file discovered from the workspace
//! root. Every field is optional; a missing or broken file yields defaults.
//!
//! ```toml
//! [blocks]
//! outer = "vue"
//!
//! [blocks.style]
//! default = "scss"
//! languages = { sss = "sugarss" }
//!
//! [blocks.custom]
//! docs = "markdown"
//! i18n = "json"
//!
//! [cache]
//! max_entries = 10
//! max_age_secs = 60
//!
//! [completion]
//! scaffold_snippets = true
//! this_completion = true
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Name of the settings file searched for in the workspace.
pub const SETTINGS_FILE: &str = "sfcls.toml";

/// Root settings structure loaded from `sfcls.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub blocks: BlockSettings,
    pub cache: CacheSettings,
    pub completion: CompletionSettings,
}

/// How top-level blocks map to language ids.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BlockSettings {
    /// Language of the text outside every block.
    pub outer: String,
    pub template: DialectSettings,
    pub script: DialectSettings,
    pub style: DialectSettings,
    /// Custom block name -> language id. Configured custom blocks also end an
    /// unclosed block where they open.
    pub custom: HashMap<String, String>,
}

impl BlockSettings {
    /// Tag names and `lang` values are matched lower-cased.
    fn normalize(&mut self) {
        self.custom = lowercase_keys(std::mem::take(&mut self.custom));
        for dialects in [&mut self.template, &mut self.script, &mut self.style] {
            dialects.languages = lowercase_keys(std::mem::take(&mut dialects.languages));
        }
    }
}

fn lowercase_keys(map: HashMap<String, String>) -> HashMap<String, String> {
    map.into_iter()
        .map(|(key, value)| (key.to_ascii_lowercase(), value))
        .collect()
}

impl Default for BlockSettings {
    fn default() -> Self {
        Self {
            outer: "vue".to_string(),
            template: DialectSettings::default(),
            script: DialectSettings::default(),
            style: DialectSettings::default(),
            custom: HashMap::new(),
        }
    }
}

/// Dialects recognized for one block kind.
///
/// User entries take precedence over the built-in alias tables.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DialectSettings {
    /// Language used when the opening tag declares none.
    pub default: Option<String>,
    /// `lang` attribute value -> language id.
    pub languages: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub max_entries: usize,
    pub max_age_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_entries: 10,
            max_age_secs: 60,
        }
    }
}

impl CacheSettings {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CompletionSettings {
    /// Offer block scaffolds outside of blocks.
    pub scaffold_snippets: bool,
    /// Offer symbols from every block after `this.`.
    pub this_completion: bool,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            scaffold_snippets: true,
            this_completion: true,
        }
    }
}

/// Parse settings from TOML text. `origin` names the source in errors.
pub fn parse_settings(content: &str, origin: &Path) -> Result<Settings> {
    let mut settings: Settings = toml::from_str(content).map_err(|e| Error::Settings {
        path: origin.display().to_string(),
        message: e.to_string(),
    })?;
    settings.blocks.normalize();
    Ok(settings)
}

/// Read and parse a settings file.
pub fn read_settings(path: &Path) -> Result<Settings> {
    let content = std::fs::read_to_string(path)?;
    parse_settings(&content, path)
}

/// Load settings from a file.
///
/// Returns default settings if the file doesn't exist or can't be parsed.
pub fn load_settings(path: &Path) -> Settings {
    match read_settings(path) {
        Ok(settings) => settings,
        Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Settings::default(),
        Err(e) => {
            log::warn!("{}", e);
            Settings::default()
        }
    }
}

/// Discover `sfcls.toml` by searching up the directory tree, then direct children.
///
/// Returns `(settings, settings_dir)`; if no file is found the settings are the
/// defaults and `settings_dir` is `start_dir`.
pub fn discover_settings(start_dir: &Path) -> (Settings, PathBuf) {
    let mut current = Some(start_dir);
    while let Some(dir) = current {
        let candidate = dir.join(SETTINGS_FILE);
        if candidate.is_file() {
            log::debug!("using settings from {}", candidate.display());
            return (load_settings(&candidate), dir.to_path_buf());
        }
        current = dir.parent();
    }

    if let Ok(entries) = std::fs::read_dir(start_dir) {
        for entry in entries.flatten() {
            if entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false) {
                let candidate = entry.path().join(SETTINGS_FILE);
                if candidate.is_file() {
                    log::debug!("using settings from {}", candidate.display());
                    return (load_settings(&candidate), entry.path());
                }
            }
        }
    }

    (Settings::default(), start_dir.to_path_buf())
}

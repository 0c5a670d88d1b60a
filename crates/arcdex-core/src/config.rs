//! Layered configuration and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (`__` separates nested keys, e.g. `APP_INDEX__ROOT_PATH`). The merged
//! values are extracted into [`Settings`], which is what the rest of the
//! workspace consumes through [`SettingsStore`].

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::traits::SettingsStore;

pub const DEFAULT_MAX_RESULTS: usize = 28;
pub const DEFAULT_WRITER_MEMORY_BYTES: usize = 50_000_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSettings {
    pub root_path: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveSettings {
    #[serde(default)]
    pub active_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSettings {
    pub max_results: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexingSettings {
    pub writer_memory_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub index: IndexSettings,
    #[serde(default)]
    pub archive: ArchiveSettings,
    pub search: SearchSettings,
    pub indexing: IndexingSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            index: IndexSettings { root_path: PathBuf::from("indexes") },
            archive: ArchiveSettings::default(),
            search: SearchSettings { max_results: DEFAULT_MAX_RESULTS },
            indexing: IndexingSettings { writer_memory_bytes: DEFAULT_WRITER_MEMORY_BYTES },
        }
    }
}

impl Settings {
    /// Settings rooted at `root_path` with an optional active archive.
    pub fn rooted_at(root_path: impl Into<PathBuf>, archive: Option<PathBuf>) -> Self {
        let mut settings = Self::default();
        settings.index.root_path = root_path.into();
        settings.archive.active_path = archive;
        settings
    }

    fn expanded(mut self, base: &Path) -> Self {
        self.index.root_path = resolve_with_base(base, self.index.root_path.to_string_lossy());
        self.archive.active_path = self
            .archive
            .active_path
            .map(|p| resolve_with_base(base, p.to_string_lossy()));
        self
    }

    fn validate(&self) -> Result<()> {
        if self.search.max_results == 0 {
            return Err(Error::InvalidConfig("search.max_results must be at least 1".into()));
        }
        if self.index.root_path.as_os_str().is_empty() {
            return Err(Error::InvalidConfig("index.root_path must not be empty".into()));
        }
        Ok(())
    }
}

impl SettingsStore for Settings {
    fn root_path(&self) -> PathBuf {
        self.index.root_path.clone()
    }

    fn active_archive_path(&self) -> Option<PathBuf> {
        self.archive.active_path.clone()
    }

    fn max_results(&self) -> usize {
        self.search.max_results
    }
}

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Ok(Self::load_from(Path::new("."), &env_name))
    }

    /// Merge the config files under `dir` for the given environment name.
    pub fn load_from(dir: &Path, env_name: &str) -> Self {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(dir.join("config.toml")));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));
        Self { figment }
    }

    /// Extract and validate [`Settings`], resolving relative paths against `base`.
    pub fn settings(&self, base: &Path) -> Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        let settings = settings.expanded(base);
        settings.validate()?;
        Ok(settings)
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use vaultview_core::{ResolverOptions, DEFAULT_PASSTHROUGH_SCHEMES};
use vaultview_project::{IngestOptions, PresentationOptions, DEFAULT_MAX_PATH_COMPONENTS};

const PREFERENCES_VERSION: u32 = 1;
const MAX_PATH_COMPONENTS_LIMIT: usize = 4096;
const LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

#[derive(Debug, Error)]
pub enum PreferencesError {
    #[error("failed to read preferences {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse preferences {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize preferences {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write preferences {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to prepare directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// 檢視器偏好設定。 / Viewer preferences persisted as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub ingest: IngestPreferences,
    #[serde(default)]
    pub tree: TreePreferences,
    #[serde(default)]
    pub resolver: ResolverPreferences,
    #[serde(default)]
    pub logging: LoggingPreferences,
}

fn default_version() -> u32 {
    PREFERENCES_VERSION
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            version: PREFERENCES_VERSION,
            ingest: IngestPreferences::default(),
            tree: TreePreferences::default(),
            resolver: ResolverPreferences::default(),
            logging: LoggingPreferences::default(),
        }
    }
}

impl Preferences {
    pub fn sanitize(&mut self) {
        if self.version == 0 {
            self.version = PREFERENCES_VERSION;
        }
        self.ingest.sanitize();
        self.resolver.sanitize();
        self.logging.sanitize();
    }

    pub fn ingest_options(&self) -> IngestOptions {
        IngestOptions {
            max_path_components: self.ingest.max_path_components,
        }
    }

    pub fn presentation_options(&self) -> PresentationOptions {
        PresentationOptions {
            hidden_prefix: self.tree.hidden_prefix.clone(),
            show_hidden: self.tree.show_hidden,
            ..PresentationOptions::default()
        }
    }

    pub fn resolver_options(&self) -> ResolverOptions {
        ResolverOptions::new(&self.resolver.passthrough_schemes)
    }
}

/// 匯入設定。 / Ingestion limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestPreferences {
    #[serde(default = "default_max_path_components")]
    pub max_path_components: usize,
}

fn default_max_path_components() -> usize {
    DEFAULT_MAX_PATH_COMPONENTS
}

impl Default for IngestPreferences {
    fn default() -> Self {
        Self {
            max_path_components: default_max_path_components(),
        }
    }
}

impl IngestPreferences {
    fn sanitize(&mut self) {
        self.max_path_components = self
            .max_path_components
            .clamp(1, MAX_PATH_COMPONENTS_LIMIT);
    }
}

/// 檔案樹顯示設定。 / How the file tree is presented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreePreferences {
    /// Names starting with this marker are hidden; empty disables hiding.
    #[serde(default = "default_hidden_prefix")]
    pub hidden_prefix: String,
    #[serde(default)]
    pub show_hidden: bool,
}

fn default_hidden_prefix() -> String {
    ".".to_string()
}

impl Default for TreePreferences {
    fn default() -> Self {
        Self {
            hidden_prefix: default_hidden_prefix(),
            show_hidden: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverPreferences {
    #[serde(default = "default_passthrough_schemes")]
    pub passthrough_schemes: Vec<String>,
}

fn default_passthrough_schemes() -> Vec<String> {
    DEFAULT_PASSTHROUGH_SCHEMES
        .iter()
        .map(|scheme| scheme.to_string())
        .collect()
}

impl Default for ResolverPreferences {
    fn default() -> Self {
        Self {
            passthrough_schemes: default_passthrough_schemes(),
        }
    }
}

impl ResolverPreferences {
    fn sanitize(&mut self) {
        let mut seen = Vec::with_capacity(self.passthrough_schemes.len());
        for scheme in self.passthrough_schemes.drain(..) {
            let scheme = scheme.trim().trim_end_matches(':').to_ascii_lowercase();
            if !scheme.is_empty() && !seen.contains(&scheme) {
                seen.push(scheme);
            }
        }
        self.passthrough_schemes = seen;
    }
}

/// 日誌設定。 / Default log filter when no environment override is present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingPreferences {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LoggingPreferences {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl LoggingPreferences {
    fn sanitize(&mut self) {
        let level = self.level.trim().to_ascii_lowercase();
        self.level = if LOG_LEVELS.contains(&level.as_str()) {
            level
        } else {
            default_log_level()
        };
    }
}

#[derive(Debug)]
pub struct PreferencesStore {
    path: PathBuf,
    data: Preferences,
}

impl PreferencesStore {
    /// 載入偏好設定；檔案不存在時使用預設值。 / Loads preferences, falling back to
    /// defaults when the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PreferencesError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no preferences file, using defaults");
            let mut data = Preferences::default();
            data.sanitize();
            return Ok(Self { path, data });
        }

        let contents = fs::read_to_string(&path).map_err(|source| PreferencesError::Read {
            path: path.clone(),
            source,
        })?;
        let mut data: Preferences =
            serde_json::from_str(&contents).map_err(|source| PreferencesError::Parse {
                path: path.clone(),
                source,
            })?;
        data.sanitize();
        Ok(Self { path, data })
    }

    pub fn preferences(&self) -> &Preferences {
        &self.data
    }

    pub fn update<F>(&mut self, mut op: F) -> Result<(), PreferencesError>
    where
        F: FnMut(&mut Preferences),
    {
        op(&mut self.data);
        self.data.sanitize();
        self.save()
    }

    /// Writes through a temporary sibling file and renames it into place.
    pub fn save(&self) -> Result<(), PreferencesError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| PreferencesError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let payload = serde_json::to_string_pretty(&self.data).map_err(|source| {
            PreferencesError::Serialize {
                path: self.path.clone(),
                source,
            }
        })?;

        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, payload.as_bytes()).map_err(|source| PreferencesError::Write {
            path: tmp_path.clone(),
            source,
        })?;
        fs::rename(&tmp_path, &self.path).map_err(|source| PreferencesError::Write {
            path: self.path.clone(),
            source,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

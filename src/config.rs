use crate::constants::{get_default_sources, get_supported_sources, DEFAULT_INDEX_NAME, DEFAULT_STAGING_PATH, MAP_SOURCE};
use crate::error::{Result, SyncError};
use crate::sources::acp::AcpWindow;
use crate::sources::tribe::TribeWindow;
use chrono::Datelike;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "brevet_sync.toml";

/// Pipeline settings, read from `brevet_sync.toml` when present.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Enabled adapters, in run order
    pub sources: Vec<String>,
    /// Drop events already present in the index
    pub filter: bool,
    pub geocode: bool,
    /// Pass already-indexed events through to the staging file instead of dropping them
    pub keep_existing: bool,
    pub index_name: String,
    pub staging_path: PathBuf,
    pub acp: AcpWindow,
    pub tribe: TribeWindow,
    pub geocode_interval_ms: u64,
    pub http_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for Settings {
    fn default() -> Self {
        let year = chrono::Local::now().year();
        Self {
            sources: get_default_sources().into_iter().map(str::to_string).collect(),
            filter: true,
            geocode: true,
            keep_existing: false,
            index_name: DEFAULT_INDEX_NAME.to_string(),
            staging_path: PathBuf::from(DEFAULT_STAGING_PATH),
            acp: AcpWindow {
                from: format!("{}-01-01", year - 1),
                to: format!("{}-01-01", year + 2),
            },
            tribe: TribeWindow {
                start_date: format!("{}-01-01 00:00:00", year - 1),
                end_date: format!("{}-12-31 23:59:59", year + 1),
            },
            geocode_interval_ms: 100,
            http_timeout_secs: 60,
            user_agent: format!("brevet_sync/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Command line values that win over the config file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub sources: Option<Vec<String>>,
    pub no_filter: bool,
    pub no_geocode: bool,
    pub output: Option<PathBuf>,
}

impl Settings {
    /// Load settings from `path`, or from `brevet_sync.toml` when it exists.
    ///
    /// An explicitly requested file that cannot be read is an error; a missing
    /// default file means defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
        };
        if !explicit && !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path).map_err(|e| {
            SyncError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn apply(mut self, overrides: &Overrides) -> Result<Self> {
        if let Some(sources) = &overrides.sources {
            self.sources = sources.clone();
        }
        if overrides.no_filter {
            self.filter = false;
        }
        if overrides.no_geocode {
            self.geocode = false;
        }
        if let Some(output) = &overrides.output {
            self.staging_path = output.clone();
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        let supported = get_supported_sources();
        if let Some(unknown) = self.sources.iter().find(|s| !supported.contains(&s.as_str())) {
            return Err(SyncError::Config(format!(
                "Unknown source '{}'. Supported sources: {}",
                unknown,
                supported.join(", ")
            )));
        }
        if self.http_timeout_secs == 0 {
            return Err(SyncError::Config("http_timeout_secs must be positive".into()));
        }
        Ok(())
    }

    pub fn uses_source(&self, name: &str) -> bool {
        self.sources.iter().any(|s| s == name)
    }
}

/// Secrets read from the environment
#[derive(Debug, Clone)]
pub struct Credentials {
    pub algolia_app: String,
    pub algolia_write: String,
    pub algolia_read: String,
    pub google_maps: Option<String>,
    pub supabase: Option<String>,
}

impl Credentials {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read credentials through `lookup`; empty values count as missing.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let algolia_app = get("ALGOLIA_APP").ok_or(SyncError::MissingCredential("ALGOLIA_APP"))?;
        let algolia_write = get("ALGOLIA_WRITE").ok_or(SyncError::MissingCredential("ALGOLIA_WRITE"))?;
        let algolia_read = get("ALGOLIA_READ").unwrap_or_else(|| algolia_write.clone());
        Ok(Self {
            algolia_app,
            algolia_write,
            algolia_read,
            google_maps: get("GOOGLE_MAPS"),
            supabase: get("SUPABASE"),
        })
    }

    pub fn google_maps_key(&self) -> Result<&str> {
        self.google_maps
            .as_deref()
            .ok_or(SyncError::MissingCredential("GOOGLE_MAPS"))
    }

    pub fn supabase_key(&self) -> Result<&str> {
        self.supabase.as_deref().ok_or(SyncError::MissingCredential("SUPABASE"))
    }

    /// Fail before any network activity when an enabled step lacks its key.
    pub fn check_for(&self, settings: &Settings) -> Result<()> {
        if settings.geocode {
            self.google_maps_key()?;
        }
        if settings.uses_source(MAP_SOURCE) {
            self.supabase_key()?;
        }
        Ok(())
    }
}

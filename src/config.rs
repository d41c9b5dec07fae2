use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Result};
use serde::Deserialize;

use crate::storage::StorageConfig;

const ENV_PREFIX: &str = "FITTRACK";

/// Origin entry that allows any origin
pub const ANY_ORIGIN: &str = "*";

/// Top-level application configuration loaded from file + environment.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageSection,
    pub database: DatabaseSection,
    pub cors: CorsSection,
    pub logging: LoggingSection,
}

impl AppConfig {
    /// Load configuration from disk and environment.
    pub fn load() -> Result<Self> {
        let config_path =
            env::var("FITTRACK_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
        Self::load_from(config_path)
    }

    /// Load configuration from the given file (if it exists) overlaid by
    /// `FITTRACK_*` environment variables.
    pub fn load_from(config_path: impl AsRef<Path>) -> Result<Self> {
        let config_path = config_path.as_ref();
        let mut builder = config::Config::builder();

        if config_path.exists() {
            builder = builder.add_source(config::File::from(PathBuf::from(config_path)));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("cors.allowed_origins")
                .try_parsing(true),
        );

        let settings = builder.build()?;
        let mut config: Self = settings.try_deserialize()?;

        // Conventional connection-string variable wins over file settings
        if let Ok(uri) = env::var("MONGODB_URI") {
            if !uri.trim().is_empty() {
                config.database.uri = uri;
            }
        }

        if config.logging.level.trim().is_empty() {
            config.logging.level = "info".to_string();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            bail!("server.port must be non-zero");
        }

        if matches!(self.storage.backend, StorageBackendKind::Mongo) {
            if self.database.uri.trim().is_empty() {
                bail!("database.uri must be specified when backend is 'mongo'");
            }
            if self.database.name.trim().is_empty() {
                bail!("database.name must be specified");
            }
            if self.database.meal_collection.trim().is_empty() {
                bail!("database.meal_collection must be specified");
            }
            if self.database.workout_collection.trim().is_empty() {
                bail!("database.workout_collection must be specified");
            }
            if self.database.max_pool_size == 0 {
                bail!("database.max_pool_size must be at least 1");
            }
        }

        if self
            .cors
            .allowed_origins
            .iter()
            .any(|origin| origin.trim().is_empty())
        {
            bail!("cors.allowed_origins must not contain empty entries");
        }

        Ok(())
    }

    /// Resolve the storage backend configuration.
    pub fn storage_runtime(&self) -> StorageConfig {
        match self.storage.backend {
            StorageBackendKind::Mongo => StorageConfig::Mongo {
                uri: self.database.uri.clone(),
                database: self.database.name.clone(),
                meal_collection: self.database.meal_collection.clone(),
                workout_collection: self.database.workout_collection.clone(),
                server_selection_timeout: Duration::from_millis(
                    self.database.server_selection_timeout_ms,
                ),
                max_pool_size: self.database.max_pool_size,
            },
            StorageBackendKind::Memory => StorageConfig::Memory,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct StorageSection {
    pub backend: StorageBackendKind,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendKind {
    #[default]
    Mongo,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    pub uri: String,
    pub name: String,
    pub meal_collection: String,
    pub workout_collection: String,
    pub server_selection_timeout_ms: u64,
    pub max_pool_size: u32,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            uri: "mongodb://localhost:27017".to_string(),
            name: "fitness_tracker".to_string(),
            meal_collection: "meals".to_string(),
            workout_collection: "workouts".to_string(),
            server_selection_timeout_ms: 5_000,
            max_pool_size: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CorsSection {
    pub allowed_origins: Vec<String>,
}

impl CorsSection {
    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins
            .iter()
            .any(|origin| origin.trim() == ANY_ORIGIN)
    }
}

impl Default for CorsSection {
    fn default() -> Self {
        Self {
            allowed_origins: vec![ANY_ORIGIN.to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}

use core::net::SocketAddr;
use serde_json::{Map, Value, json};
use shelfmate_core::preferences::Theme;
use std::env;
use std::path::{Path, PathBuf};

pub const DEFAULT_BIND: &str = "127.0.0.1:8080";
pub const APP_CONFIG_PATH: &str = "shelfmate-config.json";
pub const LIBRARY_DATABASE_NAME: &str = "library.db";

const LIBRARY_PATH_KEY: &str = "library-path";
const THEME_KEY: &str = "theme";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid bind address {value:?}: {source}")]
    InvalidBind {
        value: String,
        source: core::net::AddrParseError,
    },
    #[error("failed to access config store at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("config store at {path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Settings read from the environment at start-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub config_path: PathBuf,
    pub api_key: Option<String>,
}

impl ServerConfig {
    /// # Errors
    /// Fails if `SHELFMATE_BIND` is not a socket address.
    #[inline]
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// # Errors
    /// Fails if `SHELFMATE_BIND` is not a socket address.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called once per run")]
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind = lookup("SHELFMATE_BIND").unwrap_or_else(|| DEFAULT_BIND.to_owned());
        let bind: SocketAddr = bind
            .trim()
            .parse()
            .map_err(|source| ConfigError::InvalidBind {
                value: bind.clone(),
                source,
            })?;
        let config_path = lookup("SHELFMATE_CONFIG")
            .filter(|path| !path.trim().is_empty())
            .map_or_else(|| PathBuf::from(APP_CONFIG_PATH), PathBuf::from);

        Ok(Self {
            bind,
            config_path,
            api_key: lookup("GOOGLE_BOOKS_API_KEY"),
        })
    }
}

/// Key-value config persisted as a JSON object, holding the library location and the theme.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    values: Map<String, Value>,
}

impl ConfigStore {
    /// Loads the store, starting empty if the file does not exist yet.
    /// # Errors
    /// Fails if the file cannot be read or is not a JSON object.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called once per run")]
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let values = match tokio::fs::read_to_string(path).await {
            Ok(contents) => {
                serde_json::from_str(&contents).map_err(|source| ConfigError::Json {
                    path: path.to_owned(),
                    source,
                })?
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_owned(),
                    source,
                });
            }
        };
        Ok(Self {
            path: path.to_owned(),
            values,
        })
    }

    /// # Errors
    /// Fails if the file cannot be written.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn save(&self) -> Result<(), ConfigError> {
        let contents =
            serde_json::to_string_pretty(&self.values).map_err(|source| ConfigError::Json {
                path: self.path.clone(),
                source,
            })?;
        tokio::fs::write(&self.path, contents)
            .await
            .map_err(|source| ConfigError::Io {
                path: self.path.clone(),
                source,
            })
    }

    #[must_use]
    #[inline]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    #[inline]
    pub fn set(&mut self, key: &str, value: Value) {
        self.values.insert(key.to_owned(), value);
    }

    #[must_use]
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub fn library_path(&self) -> Option<PathBuf> {
        self.get(LIBRARY_PATH_KEY)?
            .get("value")?
            .as_str()
            .filter(|path| !path.is_empty())
            .map(PathBuf::from)
    }

    #[inline]
    pub fn set_library_path(&mut self, path: &Path) {
        self.set(
            LIBRARY_PATH_KEY,
            json!({ "value": path.to_string_lossy() }),
        );
    }

    #[must_use]
    #[inline]
    pub fn theme(&self) -> Theme {
        Theme::from_stored(self.get(THEME_KEY).and_then(Value::as_str))
    }

    #[inline]
    pub fn set_theme(&mut self, theme: Theme) {
        self.set(THEME_KEY, Value::from(theme.as_str()));
    }
}

//! Server configuration.
//!
//! Every field has a default matching the standard deployment layout, so
//! the server starts with no configuration file at all. A TOML file may
//! override any subset:
//!
//! ```toml
//! [server]
//! port = 9000
//!
//! [slope]
//! crs = "EPSG:26914"
//! ```

use std::path::{Path, PathBuf};

use landslide_projection::Crs;
use serde::{Deserialize, Serialize};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "LANDSLIDE_CONFIG";

/// Errors loading the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for [`LandslideConfig`].
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Serializing the configuration failed.
    #[error("TOML error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LandslideConfig {
    pub server: ServerConfig,
    pub soil: SoilConfig,
    pub slope: SlopeConfig,
    pub model: ModelConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub port: u16,
    /// Worker count; the actix default (one per core) when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 8080,
            workers: None,
        }
    }
}

/// Soil polygon layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SoilConfig {
    /// GeoJSON `FeatureCollection` of soil polygons.
    pub path: PathBuf,
    /// Property reported as the soil type.
    pub attribute: String,
    /// Reference system of the polygon coordinates.
    pub crs: Crs,
}

impl Default for SoilConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/soil_map/hays.geojson"),
            attribute: "SNUM".to_string(),
            crs: Crs::WGS84,
        }
    }
}

/// Slope raster layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SlopeConfig {
    /// Single-band GeoTIFF.
    pub path: PathBuf,
    /// Replaces the reference system declared in the file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crs: Option<Crs>,
}

impl Default for SlopeConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/slope_map/slope.tif"),
            crs: None,
        }
    }
}

/// Model artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    pub scaler: PathBuf,
    pub classifier: PathBuf,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            scaler: PathBuf::from("models/scaler_4.json"),
            classifier: PathBuf::from("models/model_4.json"),
        }
    }
}

impl LandslideConfig {
    /// Parses a TOML document. Missing sections and fields keep their
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] on malformed TOML, unknown keys or an
    /// unparsable reference system.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::de::from_str(toml_str)?)
    }

    /// Reads a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Loads the effective configuration.
    ///
    /// The file is `path` if given, else the one named by
    /// `LANDSLIDE_CONFIG`, else none (all defaults). `BIND_ADDR` and `PORT`
    /// then override the listener settings.
    ///
    /// # Errors
    ///
    /// Returns an error if a named file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let from_env = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        let mut config = match path.or(from_env.as_deref()) {
            Some(path) => {
                log::info!("Loading configuration from {}", path.display());
                Self::from_file(path)?
            }
            None => {
                log::debug!("No configuration file, using defaults");
                Self::default()
            }
        };

        config.apply_overrides(
            std::env::var("BIND_ADDR").ok(),
            std::env::var("PORT").ok(),
        );

        Ok(config)
    }

    /// Applies listener overrides. An unparsable port is ignored with a
    /// warning.
    pub fn apply_overrides(&mut self, bind_addr: Option<String>, port: Option<String>) {
        if let Some(bind_addr) = bind_addr.filter(|a| !a.trim().is_empty()) {
            self.server.bind_addr = bind_addr.trim().to_string();
        }

        if let Some(port) = port {
            match port.trim().parse() {
                Ok(port) => self.server.port = port,
                Err(e) => log::warn!("Ignoring invalid port {port:?}: {e}"),
            }
        }
    }

    /// Renders the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::TomlSer`] if serialization fails.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }
}

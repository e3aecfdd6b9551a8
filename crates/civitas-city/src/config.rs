//! Simulation settings, loadable from RON, TOML or JSON.
//!
//! Every field has a default, so a config file only needs to name the
//! values it changes. The file format is picked from the extension.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file has an extension we don't support.
    #[error("unsupported config format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Format detection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

pub fn detect_format(path: &Path) -> Result<Format, ConfigError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(ConfigError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ---------------------------------------------------------------------------
// SimConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Seed of the city RNG.
    pub seed: u64,
    pub map_width: u32,
    pub map_height: u32,
    pub ticks_per_day: u32,
    /// Calendar year of day zero.
    pub start_year: i32,
    /// Road steps a cart pusher searches for a destination.
    pub deliver_distance: u32,
    /// Road steps a supplier searches for storage holding its good.
    pub supplier_distance: u32,
    /// Road steps a market buyer searches for storage.
    pub buyer_distance: u32,
    pub cart_capacity: u32,
    /// Tiles a walker moves per tick.
    pub walker_speed: u32,
    /// Allow diagonal steps between road tiles.
    pub all_directions: bool,
    /// Reservations older than this are purged by the monthly housekeeping.
    pub reservation_ttl_days: u32,
    pub event_buffer_capacity: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            map_width: 64,
            map_height: 64,
            ticks_per_day: 4,
            start_year: -350,
            deliver_distance: 40,
            supplier_distance: 40,
            buyer_distance: 25,
            cart_capacity: 400,
            walker_speed: 1,
            all_directions: false,
            reservation_ttl_days: 90,
            event_buffer_capacity: 256,
        }
    }
}

impl SimConfig {
    /// Parse a config from text in the given format.
    pub fn parse(content: &str, format: Format) -> Result<Self, ConfigError> {
        let parsed = match format {
            Format::Ron => ron::from_str(content).map_err(|e| e.to_string()),
            Format::Toml => toml::from_str(content).map_err(|e| e.to_string()),
            Format::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
        };
        parsed.map_err(|detail| ConfigError::Parse {
            file: PathBuf::new(),
            detail,
        })
    }

    /// Read a config file, detecting its format from the extension.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let format = detect_format(path)?;
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, format).map_err(|e| match e {
            ConfigError::Parse { detail, .. } => ConfigError::Parse {
                file: path.to_path_buf(),
                detail,
            },
            other => other,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn make_test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("civitas_config_{name}_{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    // -----------------------------------------------------------------------
    // detect_format
    // -----------------------------------------------------------------------

    #[test]
    fn detect_known_formats() {
        assert_eq!(detect_format(Path::new("city.ron")).unwrap(), Format::Ron);
        assert_eq!(detect_format(Path::new("city.toml")).unwrap(), Format::Toml);
        assert_eq!(detect_format(Path::new("city.json")).unwrap(), Format::Json);
    }

    #[test]
    fn detect_unsupported() {
        assert!(matches!(
            detect_format(Path::new("city.yaml")),
            Err(ConfigError::UnsupportedFormat { .. })
        ));
        assert!(matches!(
            detect_format(Path::new("city")),
            Err(ConfigError::UnsupportedFormat { .. })
        ));
    }

    // -----------------------------------------------------------------------
    // Parsing
    // -----------------------------------------------------------------------

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = SimConfig::parse("seed = 7\ncart_capacity = 200\n", Format::Toml).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.cart_capacity, 200);
        assert_eq!(config.deliver_distance, 40);
        assert_eq!(config.buyer_distance, 25);
    }

    #[test]
    fn ron_and_json() {
        let ron = SimConfig::parse("(ticks_per_day: 1, all_directions: true)", Format::Ron).unwrap();
        assert_eq!(ron.ticks_per_day, 1);
        assert!(ron.all_directions);

        let json = SimConfig::parse(r#"{"walker_speed": 3}"#, Format::Json).unwrap();
        assert_eq!(json.walker_speed, 3);
        assert_eq!(json.seed, 42);
    }

    #[test]
    fn parse_error_is_reported() {
        let result = SimConfig::parse("seed = [", Format::Toml);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn load_from_file_names_the_file() {
        let dir = make_test_dir("load");
        let good = dir.join("city.toml");
        fs::write(&good, "map_width = 32\nmap_height = 16\n").unwrap();
        let config = SimConfig::load(&good).unwrap();
        assert_eq!((config.map_width, config.map_height), (32, 16));

        let bad = dir.join("broken.json");
        fs::write(&bad, "{").unwrap();
        match SimConfig::load(&bad) {
            Err(ConfigError::Parse { file, .. }) => assert_eq!(file, bad),
            other => panic!("expected parse error, got {other:?}"),
        }

        assert!(matches!(
            SimConfig::load(&dir.join("missing.ron")),
            Err(ConfigError::Io(_))
        ));
        let _ = fs::remove_dir_all(&dir);
    }
}

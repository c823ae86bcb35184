//! Static configuration and menu catalog for the dining hall.
//!
//! Both files are JSON and are read exactly once at startup. Any failure here
//! is fatal for the binary: there are no defaults for the required fields and
//! no partially loaded configuration.
//!
//! The configuration object uses `PascalCase` keys. `TableCount`,
//! `WaiterCount` and `TimeUnitMillisecondMultiplier` are required; a handful of
//! optional keys have defaults, and anything else is kept verbatim in
//! [`Configuration::extra`] for collaborators that want it.
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;

mod catalog;

pub use catalog::{Item, ItemCatalog};

/// Location of the configuration file, relative to the working directory.
pub const CONFIGURATION_PATH: &str = "./conf/configuration.json";
/// Location of the menu catalog, relative to the working directory.
pub const ITEMS_PATH: &str = "./conf/items.json";

const INLINE_SOURCE: &str = "<inline>";

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read configuration {}: {source}", .path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed configuration {}: {source}", .path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to read item catalog {}: {source}", .path.display())]
    CatalogRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed item catalog {}: {source}", .path.display())]
    CatalogParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Immutable process configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Configuration {
    pub table_count: usize,
    pub waiter_count: usize,
    pub time_unit_millisecond_multiplier: u64,
    #[serde(default = "default_restaurant_name")]
    pub restaurant_name: String,
    /// Upper bound on the number of items a single table orders at once.
    #[serde(default = "default_max_order_items")]
    pub max_order_items: usize,
    /// Capacity of the queue between waiters and the kitchen.
    #[serde(default = "default_order_queue_capacity")]
    pub order_queue_capacity: usize,
    /// Keys not modelled above, preserved for collaborators.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_restaurant_name() -> String {
    "Dining Hall".into()
}
fn default_max_order_items() -> usize {
    5
}
fn default_order_queue_capacity() -> usize {
    1024
}

impl Configuration {
    /// Build a configuration in code with every optional key at its default.
    ///
    /// ```
    /// use bistro_config::Configuration;
    /// use std::time::Duration;
    ///
    /// let cfg = Configuration::new(4, 2, 10);
    /// assert_eq!(cfg.time_unit(), Duration::from_millis(10));
    /// assert_eq!(cfg.restaurant_name, "Dining Hall");
    /// ```
    pub fn new(table_count: usize, waiter_count: usize, time_unit_millisecond_multiplier: u64) -> Self {
        Self {
            table_count,
            waiter_count,
            time_unit_millisecond_multiplier,
            restaurant_name: default_restaurant_name(),
            max_order_items: default_max_order_items(),
            order_queue_capacity: default_order_queue_capacity(),
            extra: Map::new(),
        }
    }

    /// Parse and validate a configuration document held in memory.
    ///
    /// ```
    /// use bistro_config::Configuration;
    ///
    /// let cfg = Configuration::from_json_str(
    ///     r#"{ "TableCount": 10, "WaiterCount": 3, "TimeUnitMillisecondMultiplier": 250, "KitchenAddress": "kitchen:8080" }"#,
    /// )
    /// .expect("valid configuration");
    ///
    /// assert_eq!(cfg.table_count, 10);
    /// assert_eq!(cfg.extra_str("KitchenAddress"), Some("kitchen:8080"));
    /// ```
    pub fn from_json_str(json: &str) -> Result<Self, LoadError> {
        parse_configuration(json.as_bytes(), Path::new(INLINE_SOURCE))
    }

    /// Length of one simulated time unit.
    pub fn time_unit(&self) -> Duration {
        Duration::from_millis(self.time_unit_millisecond_multiplier)
    }

    /// `n` simulated time units, saturating instead of overflowing.
    pub fn time_units(&self, n: u64) -> Duration {
        Duration::from_millis(self.time_unit_millisecond_multiplier.saturating_mul(n))
    }

    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }

    /// Reject values the rest of the system cannot work with.
    ///
    /// Zero tables or zero waiters are allowed here; whether a zero waiter
    /// count is acceptable depends on the table count and is decided when
    /// tables are assigned.
    pub fn validate(&self) -> Result<(), LoadError> {
        if self.time_unit_millisecond_multiplier == 0 {
            return Err(LoadError::InvalidConfig(
                "TimeUnitMillisecondMultiplier must be positive".into(),
            ));
        }
        if self.max_order_items == 0 {
            return Err(LoadError::InvalidConfig("MaxOrderItems must be positive".into()));
        }
        if self.order_queue_capacity == 0 {
            return Err(LoadError::InvalidConfig(
                "OrderQueueCapacity must be positive".into(),
            ));
        }
        Ok(())
    }
}

fn parse_configuration(bytes: &[u8], path: &Path) -> Result<Configuration, LoadError> {
    let cfg: Configuration =
        serde_json::from_slice(bytes).map_err(|source| LoadError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
    cfg.validate()?;
    Ok(cfg)
}

/// Read, parse and validate the configuration file at `path`.
pub fn load_configuration<P: AsRef<Path>>(path: P) -> Result<Configuration, LoadError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| LoadError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    parse_configuration(&bytes, path)
}

/// Read and parse the menu catalog at `path`.
pub fn load_item_catalog<P: AsRef<Path>>(path: P) -> Result<ItemCatalog, LoadError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| LoadError::CatalogRead {
        path: path.to_path_buf(),
        source,
    })?;
    catalog::parse_catalog(&bytes, path)
}

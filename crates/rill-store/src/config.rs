use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Configuration for a [`StoreCore`](crate::StoreCore).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Label used in log fields.
    pub name: String,
    /// Per-subscriber buffer of the change broadcast. A subscriber that
    /// falls further behind skips the oldest events.
    pub broadcast_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: "store".into(),
            broadcast_capacity: 1024,
        }
    }
}

impl StoreConfig {
    /// Default configuration with the given name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Parse a TOML fragment. Missing keys take their default values.
    pub fn from_toml_str(input: &str) -> StoreResult<Self> {
        let config: Self = toml::from_str(input).map_err(|e| StoreError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> StoreResult<()> {
        if self.broadcast_capacity == 0 {
            return Err(StoreError::Config(
                "broadcast_capacity must be greater than zero".into(),
            ));
        }
        if self.name.trim().is_empty() {
            return Err(StoreError::Config("name must not be empty".into()));
        }
        Ok(())
    }
}

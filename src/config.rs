//! Server configuration.
//!
//! Plain values with defaults and a consuming `validate`, assembled by the
//! server binary from command-line flags and environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ValidationError;
use crate::guard::{GuardConfig, RateLimit};
#[cfg(feature = "persistent")]
use crate::storage::PersistentConfig;

/// Everything the server needs to start.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind: SocketAddr,
    /// Path of the JSON snapshot document.
    pub data_path: PathBuf,
    /// Limit applied to unlock requests.
    pub unlock_limit: RateLimit,
    /// Guard table settings.
    pub guard: GuardConfig,
    /// How often expired rate windows are swept.
    pub sweep_interval: Duration,
    /// Document store settings.
    #[cfg(feature = "persistent")]
    pub persistent: PersistentConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 3001)),
            data_path: PathBuf::from("./db.json"),
            unlock_limit: RateLimit::unlock_default(),
            guard: GuardConfig::default(),
            sweep_interval: Duration::from_secs(60),
            #[cfg(feature = "persistent")]
            persistent: PersistentConfig::default(),
        }
    }
}

impl ServerConfig {
    const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(100);

    /// Checks every nested setting and returns the config unchanged.
    pub fn validate(self) -> Result<Self, ValidationError> {
        self.unlock_limit.validate()?;
        self.guard.validate()?;
        #[cfg(feature = "persistent")]
        self.persistent.validate()?;

        if self.sweep_interval < Self::MIN_SWEEP_INTERVAL {
            return Err(ValidationError::InvalidField {
                field: "sweep_interval".to_string(),
                reason: format!(
                    "must be at least {}ms (got {}ms)",
                    Self::MIN_SWEEP_INTERVAL.as_millis(),
                    self.sweep_interval.as_millis()
                ),
            });
        }
        if self.data_path.as_os_str().is_empty() {
            return Err(ValidationError::InvalidField {
                field: "data_path".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        Ok(self)
    }
}

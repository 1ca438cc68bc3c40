//! Command-line overrides layered on top of the loaded configuration.

use bridge_config_and_utils::{Config, OfflinePolicy, TransportConfig};
use std::path::PathBuf;

/// Settings given on the command line. They win over the config file and
/// the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub log_level: Option<String>,
    pub webhook_url: Option<String>,
    pub device: Option<PathBuf>,
    /// Serve over TCP on this address instead of a device.
    pub listen: Option<String>,
    pub offline_policy: Option<OfflinePolicy>,
}

impl Overrides {
    pub fn apply(&self, config: &mut Config) {
        if let Some(ref level) = self.log_level {
            config.log_level = level.clone();
        }
        if let Some(ref url) = self.webhook_url {
            config.webhook_url = Some(url.clone());
        }
        if let Some(ref path) = self.device {
            config.transport = TransportConfig::Device { path: path.clone() };
        }
        if let Some(ref bind) = self.listen {
            config.transport = TransportConfig::Tcp { bind: bind.clone() };
        }
        if let Some(policy) = self.offline_policy {
            config.offline_policy = policy;
        }
    }
}

//! Channel configuration loader.
//!
//! Reads a `config.toml` and deserializes it into [`ChannelConfig`]. Falls back
//! to defaults when the file is missing or malformed.

use std::path::Path;

use msgchan_types::ChannelConfig;

/// Smallest usable queue capacity for an in-memory port.
const MIN_PORT_BUFFER: usize = 1;

/// Load channel configuration from the TOML file at `path`.
///
/// - If the file does not exist, returns [`ChannelConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the default.
/// - If the file exists and parses successfully, returns the parsed config.
pub async fn load_channel_config(path: &Path) -> ChannelConfig {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config found at {}, using defaults", path.display());
            return ChannelConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", path.display());
            return ChannelConfig::default();
        }
    };

    match toml::from_str::<ChannelConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("Failed to parse {}: {err}, using defaults", path.display());
            ChannelConfig::default()
        }
    }
}

/// Resolve the in-memory port capacity, enforcing a floor of one slot.
pub fn resolve_port_buffer(config: &ChannelConfig) -> usize {
    config.port_buffer.max(MIN_PORT_BUFFER)
}

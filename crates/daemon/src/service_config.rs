use std::path::PathBuf;

use common::prelude::SecretKey;
use common::transport::{LocalConfig, OverlayConfig};

#[derive(Debug)]
pub struct Config {
    // identity
    /// key every transport seals and opens envelopes with
    pub secret: SecretKey,

    // transports
    /// local network transport settings, `None` disables it
    pub local: Option<LocalConfig>,
    /// overlay transport settings, `None` disables it
    pub overlay: Option<OverlayConfig>,

    // storage
    /// path to the message store snapshot,
    ///  if not set then an in-memory store will be used
    pub store_path: Option<PathBuf>,
    pub dedup_capacity: usize,

    // http server configuration
    /// Port for the localhost control API
    pub api_port: u16,

    // logging
    pub log_level: tracing::Level,
    /// Directory for log files (optional, logs to stdout only if not set)
    pub log_dir: Option<PathBuf>,
}

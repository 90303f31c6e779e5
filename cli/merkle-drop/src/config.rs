use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

/// Default listen address of the tree storage service.
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:4321";

/// Default directory documents are stored under.
pub const DEFAULT_DATA_DIR: &str = "./data";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_address: SocketAddr,
    /// Root directory; documents live in its `contracts/` subdirectory.
    pub data_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from((Ipv4Addr::LOCALHOST, 4321)),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
        }
    }
}

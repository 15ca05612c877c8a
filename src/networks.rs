use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::depositdata::ForkVersion;

#[derive(Debug, Clone)]
pub struct NetworkData {
    pub name: &'static str,
    pub genesis_fork_version: ForkVersion,
}

// Keyed by genesis fork version, which is all deposit data knows about
pub static NETWORKS: Lazy<HashMap<ForkVersion, NetworkData>> = Lazy::new(|| {
    let mut m = HashMap::new();
    for network in [
        NETWORK_ETH_MAINNET.clone(),
        NETWORK_ETH_SEPOLIA.clone(),
        NETWORK_ETH_HOLESKY.clone(),
        NETWORK_ETH_HOODI.clone(),
    ] {
        m.insert(network.genesis_fork_version, network);
    }
    m
});

pub const UNKNOWN_NETWORK: &str = "unknown";

static NETWORK_ETH_MAINNET: Lazy<NetworkData> = Lazy::new(|| NetworkData {
    name: "mainnet",
    genesis_fork_version: ForkVersion::from([0x00, 0x00, 0x00, 0x00]),
});

static NETWORK_ETH_SEPOLIA: Lazy<NetworkData> = Lazy::new(|| NetworkData {
    name: "sepolia",
    genesis_fork_version: ForkVersion::from([0x90, 0x00, 0x00, 0x69]),
});

static NETWORK_ETH_HOLESKY: Lazy<NetworkData> = Lazy::new(|| NetworkData {
    name: "holesky",
    genesis_fork_version: ForkVersion::from([0x01, 0x01, 0x70, 0x00]),
});

static NETWORK_ETH_HOODI: Lazy<NetworkData> = Lazy::new(|| NetworkData {
    name: "hoodi",
    genesis_fork_version: ForkVersion::from([0x10, 0x00, 0x09, 0x10]),
});

/// Best-effort network name for a genesis fork version
pub fn name(fork_version: &ForkVersion) -> &'static str {
    NETWORKS
        .get(fork_version)
        .map(|network| network.name)
        .unwrap_or(UNKNOWN_NETWORK)
}

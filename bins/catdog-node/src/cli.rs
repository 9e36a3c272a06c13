//! Command line flags.

use std::path::PathBuf;

use catdog_bridge::Placement;
use clap::Parser;

use crate::NodeConfig;

/// Run CATDOG bootnode. A friendly discovery bridging monster between v5.0 and v5.1.
#[derive(Debug, Default, Parser)]
#[command(name = "catdog-node", version, about, long_about = None)]
pub struct Cli {
    /// Config file. Defaults to ~/.catdog/config.toml
    #[arg(long, env = "CATDOG_CONFIG")]
    pub config: Option<PathBuf>,

    /// Private key for v5.0, in raw hex encoded format
    #[arg(long = "priv-v50", value_name = "HEX")]
    pub priv_v50: Option<String>,

    /// Private key for v5.1, in raw hex encoded format
    #[arg(long = "priv-v51", value_name = "HEX")]
    pub priv_v51: Option<String>,

    /// IP to put in ENR
    #[arg(long = "enr-ip")]
    pub enr_ip: Option<String>,

    /// UDP port to put in v5.0 ENR
    #[arg(long = "enr-udp-v50")]
    pub enr_udp_v50: Option<u16>,

    /// UDP port to put in v5.1 ENR
    #[arg(long = "enr-udp-v51")]
    pub enr_udp_v51: Option<u16>,

    /// Listen IP
    #[arg(long = "listen-ip")]
    pub listen_ip: Option<String>,

    /// Listen UDP port for v5.0. Will try ENR port otherwise
    #[arg(long = "listen-udp-v50")]
    pub listen_udp_v50: Option<u16>,

    /// Listen UDP port for v5.1. Will try ENR port otherwise
    #[arg(long = "listen-udp-v51")]
    pub listen_udp_v51: Option<u16>,

    /// Address to bind HTTP API server to. API is disabled if empty
    #[arg(long = "api-addr")]
    pub api_addr: Option<String>,

    /// Attnet bitfield, as hex bytes
    #[arg(long)]
    pub attnets: Option<String>,

    /// Eth2 fork version, as 4 hex bytes
    #[arg(long = "fork-version")]
    pub fork_version: Option<String>,

    /// Raw eth2 ENR entry, as hex bytes. Overrides the one derived from the fork version
    #[arg(long)]
    pub eth2: Option<String>,

    /// Optionally befriend other v5.0 bootnodes
    #[arg(long = "bootnodes-v50", value_delimiter = ',', num_args = 1..)]
    pub bootnodes_v50: Vec<String>,

    /// Optionally befriend other v5.1 bootnodes
    #[arg(long = "bootnodes-v51", value_delimiter = ',', num_args = 1..)]
    pub bootnodes_v51: Vec<String>,

    /// CIDR allow-list for peers, comma separated
    #[arg(long = "net-restrict")]
    pub net_restrict: Option<String>,

    /// Where peers learned over the other protocol are placed: default or front
    #[arg(long)]
    pub placement: Option<Placement>,

    /// Log with colors
    #[arg(long, value_name = "BOOL")]
    pub color: Option<bool>,

    /// Log level
    #[arg(long)]
    pub level: Option<String>,
}

impl Cli {
    /// Config file to use, if one can be determined.
    pub fn config_path(&self) -> Option<PathBuf> {
        self.config.clone().or_else(NodeConfig::default_path)
    }

    /// Override `config` with every flag that was given.
    pub fn apply(&self, config: &mut NodeConfig) {
        set(&mut config.v50.priv_key, &self.priv_v50);
        set(&mut config.v51.priv_key, &self.priv_v51);
        set(&mut config.record.enr_ip, &self.enr_ip);
        set(&mut config.v50.enr_udp, &self.enr_udp_v50);
        set(&mut config.v51.enr_udp, &self.enr_udp_v51);
        set(&mut config.node.listen_ip, &self.listen_ip);
        set(&mut config.v50.listen_udp, &self.listen_udp_v50);
        set(&mut config.v51.listen_udp, &self.listen_udp_v51);
        set(&mut config.node.api_addr, &self.api_addr);
        set(&mut config.record.attnets, &self.attnets);
        set(&mut config.record.fork_version, &self.fork_version);
        set(&mut config.record.eth2, &self.eth2);
        set(&mut config.discovery.net_restrict, &self.net_restrict);
        set(&mut config.discovery.placement, &self.placement);
        set(&mut config.log.color, &self.color);
        set(&mut config.log.level, &self.level);

        if !self.bootnodes_v50.is_empty() {
            config.v50.bootnodes = self.bootnodes_v50.clone();
        }
        if !self.bootnodes_v51.is_empty() {
            config.v51.bootnodes = self.bootnodes_v51.clone();
        }
    }
}

fn set<T: Clone>(target: &mut T, flag: &Option<T>) {
    if let Some(value) = flag {
        *target = value.clone();
    }
}

//! Configuration file support for sdnmqd
//!
//! Loads and validates the daemon configuration from TOML.
//! Default location: /etc/sdnmq/sdnmqd.toml
//!
//! Queue names can be overridden from the environment with
//! `SDNMQ_QUEUENAME_FLOWPROGRAMMER`, `SDNMQ_QUEUENAME_PACKETOUT` and
//! `SDNMQ_TOPICNAME_PACKETIN`.

use sdnmq_bridge::attributes::{
    DEFAULT_FLOW_PROGRAMMER_QUEUE, DEFAULT_PACKET_IN_TOPIC, DEFAULT_PACKET_OUT_QUEUE,
};
use sdnmq_bridge::SimulatedController;
use sdnmq_broker::RedisBrokerConfig;
use sdnmq_types::{NodeRef, PortRef, NODE_TYPE_OF};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/sdnmq/sdnmqd.toml";

pub const ENV_FLOW_PROGRAMMER_QUEUE: &str = "SDNMQ_QUEUENAME_FLOWPROGRAMMER";
pub const ENV_PACKET_OUT_QUEUE: &str = "SDNMQ_QUEUENAME_PACKETOUT";
pub const ENV_PACKET_IN_TOPIC: &str = "SDNMQ_TOPICNAME_PACKETIN";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Failed to serialize config: {0}")]
    Serialize(String),

    #[error("Invalid configuration for {field}: {message}")]
    Invalid { field: String, message: String },
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Which broker the daemon talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrokerBackend {
    /// In-process queues. Nothing outside the daemon can reach them, so this
    /// is only useful for exercising the bridge against the simulated
    /// controller.
    Memory,
    #[default]
    Redis,
}

/// Broker configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrokerConfig {
    #[serde(default)]
    pub backend: BrokerBackend,

    #[serde(default)]
    pub redis: RedisBrokerConfig,
}

/// Names of the request queues and the packet-in topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_flow_programmer_queue")]
    pub flow_programmer: String,

    #[serde(default = "default_packet_out_queue")]
    pub packet_out: String,

    #[serde(default = "default_packet_in_topic")]
    pub packet_in: String,
}

/// One simulated node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub id: String,

    #[serde(rename = "type", default = "default_node_type")]
    pub node_type: String,

    #[serde(default)]
    pub ports: Vec<String>,
}

/// Port on a simulated node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortConfig {
    pub node: String,

    #[serde(rename = "type", default = "default_node_type")]
    pub node_type: String,

    pub port: String,
}

/// Link between two simulated ports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkConfig {
    pub a: PortConfig,
    pub b: PortConfig,
}

/// Topology of the simulated controller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopologyConfig {
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,

    #[serde(default)]
    pub links: Vec<LinkConfig>,
}

/// Complete sdnmqd configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SdnmqConfig {
    #[serde(default)]
    pub broker: BrokerConfig,

    #[serde(default)]
    pub queues: QueueConfig,

    #[serde(default)]
    pub topology: TopologyConfig,
}

fn default_flow_programmer_queue() -> String {
    DEFAULT_FLOW_PROGRAMMER_QUEUE.to_string()
}

fn default_packet_out_queue() -> String {
    DEFAULT_PACKET_OUT_QUEUE.to_string()
}

fn default_packet_in_topic() -> String {
    DEFAULT_PACKET_IN_TOPIC.to_string()
}

fn default_node_type() -> String {
    NODE_TYPE_OF.to_string()
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            flow_programmer: default_flow_programmer_queue(),
            packet_out: default_packet_out_queue(),
            packet_in: default_packet_in_topic(),
        }
    }
}

impl PortConfig {
    fn resolve(&self) -> ConfigResult<PortRef> {
        let node = NodeRef::new(&self.node_type, &self.node)
            .map_err(|e| ConfigError::invalid("topology.links", e.to_string()))?;
        PortRef::resolve(&node, &self.port)
            .map_err(|e| ConfigError::invalid("topology.links", e.to_string()))
    }
}

impl TopologyConfig {
    fn resolve_nodes(&self) -> ConfigResult<Vec<(NodeRef, Vec<PortRef>)>> {
        let mut seen = BTreeSet::new();
        let mut nodes = Vec::with_capacity(self.nodes.len());

        for entry in &self.nodes {
            let node = NodeRef::new(&entry.node_type, &entry.id)
                .map_err(|e| ConfigError::invalid("topology.nodes", e.to_string()))?;
            if !seen.insert(node.clone()) {
                return Err(ConfigError::invalid(
                    "topology.nodes",
                    format!("duplicate node {}", node),
                ));
            }

            let ports = entry
                .ports
                .iter()
                .map(|port| PortRef::resolve(&node, port))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| ConfigError::invalid("topology.nodes", e.to_string()))?;
            nodes.push((node, ports));
        }

        Ok(nodes)
    }

    fn resolve_links(
        &self,
        nodes: &[(NodeRef, Vec<PortRef>)],
    ) -> ConfigResult<Vec<(PortRef, PortRef)>> {
        let known: HashSet<&PortRef> = nodes.iter().flat_map(|(_, ports)| ports.iter()).collect();

        let mut links = Vec::with_capacity(self.links.len());
        for link in &self.links {
            let a = link.a.resolve()?;
            let b = link.b.resolve()?;
            for end in [&a, &b] {
                if !known.contains(end) {
                    return Err(ConfigError::invalid(
                        "topology.links",
                        format!("unknown port {}", end),
                    ));
                }
            }
            links.push((a, b));
        }

        Ok(links)
    }

    /// Builds a simulated controller holding this topology.
    pub fn build_controller(&self) -> ConfigResult<SimulatedController> {
        let nodes = self.resolve_nodes()?;
        let links = self.resolve_links(&nodes)?;

        let controller = SimulatedController::new();
        for (node, ports) in nodes {
            controller.add_node(node, ports.iter().map(|port| port.id().to_string()));
        }
        for (a, b) in links {
            controller.add_link(a, b);
        }
        Ok(controller)
    }
}

impl SdnmqConfig {
    /// Load configuration from file, falling back to defaults if file not found
    pub fn load_or_default(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => {
                let config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                info!(path = %path.display(), "Loaded configuration");
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "Config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }

    /// Load from default location or defaults
    pub fn load() -> ConfigResult<Self> {
        Self::load_or_default(DEFAULT_CONFIG_PATH)
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        let path = path.as_ref();
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;

        fs::write(path, content).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Applies queue name overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Applies queue name overrides from `lookup`. Empty values are ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let targets = [
            (ENV_FLOW_PROGRAMMER_QUEUE, &mut self.queues.flow_programmer),
            (ENV_PACKET_OUT_QUEUE, &mut self.queues.packet_out),
            (ENV_PACKET_IN_TOPIC, &mut self.queues.packet_in),
        ];

        for (key, target) in targets {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                info!(variable = key, name = %value, "Queue name overridden from environment");
                *target = value;
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> ConfigResult<()> {
        let names = [
            ("queues.flow_programmer", &self.queues.flow_programmer),
            ("queues.packet_out", &self.queues.packet_out),
            ("queues.packet_in", &self.queues.packet_in),
        ];

        let mut seen = BTreeSet::new();
        for (field, name) in names {
            if name.trim().is_empty() {
                return Err(ConfigError::invalid(field, "name must not be empty"));
            }
            if !seen.insert(name.as_str()) {
                return Err(ConfigError::invalid(
                    field,
                    format!("name '{}' is already used by another queue", name),
                ));
            }
        }

        if self.broker.backend == BrokerBackend::Redis {
            if self.broker.redis.url.trim().is_empty() {
                return Err(ConfigError::invalid("broker.redis.url", "must not be empty"));
            }
            let timeout = self.broker.redis.poll_timeout_secs;
            if !timeout.is_finite() || timeout <= 0.0 {
                return Err(ConfigError::invalid(
                    "broker.redis.poll_timeout_secs",
                    "must be > 0",
                ));
            }
        }

        let nodes = self.topology.resolve_nodes()?;
        self.topology.resolve_links(&nodes)?;

        Ok(())
    }
}

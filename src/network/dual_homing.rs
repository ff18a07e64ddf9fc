use std::collections::HashSet;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::cmd::kubectl::{KubectlError, does_kubectl_exist, kubectl_exec_get_all_nodes, kubectl_exec_get_node};
use crate::cmd::structs::{EXTERNAL_IP_ADDRESS_TYPE, KubernetesNode};

/// Fixed delay between two polls of a node status. No exponential backoff:
/// node addresses converge in minutes, not milliseconds.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

#[derive(thiserror::Error, Debug)]
pub enum NetworkValidationError {
    #[error("Node {node} does not have 2 external IPs. Found {} IPs: {ips:?}", .ips.len())]
    NotEnoughExternalIps { node: String, ips: Vec<String> },

    #[error("Node {node} has duplicate external IPs: {ips:?}")]
    DuplicateExternalIps { node: String, ips: Vec<String> },

    #[error("Node {node} has no external IPs")]
    NoExternalIps { node: String },

    #[error("Invalid timeout format `{raw}`: {reason}")]
    InvalidTimeout { raw: String, reason: String },

    #[error("Timeout after {timeout:?} waiting for node {node} to have multiple external IPs")]
    Timeout { node: String, timeout: Duration },

    #[error("Cannot query cluster nodes")]
    NodeQuery(#[from] KubectlError),
}

/// Where node snapshots come from. Production code goes through kubectl via
/// `KubectlNodeSource`; tests inject in-memory sources.
pub trait NodeSource {
    fn all_nodes(&self) -> Result<Vec<KubernetesNode>, KubectlError>;
    fn node(&self, name: &str) -> Result<KubernetesNode, KubectlError>;
}

pub struct KubectlNodeSource {
    kubeconfig: PathBuf,
    envs: Vec<(String, String)>,
}

impl KubectlNodeSource {
    pub fn new<P: Into<PathBuf>>(kubeconfig: P, envs: Vec<(String, String)>) -> KubectlNodeSource {
        if !does_kubectl_exist() {
            warn!("kubectl binary not found in PATH, node queries will fail");
        }

        KubectlNodeSource {
            kubeconfig: kubeconfig.into(),
            envs,
        }
    }

    fn envs_as_str(&self) -> Vec<(&str, &str)> {
        self.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect()
    }
}

impl NodeSource for KubectlNodeSource {
    fn all_nodes(&self) -> Result<Vec<KubernetesNode>, KubectlError> {
        Ok(kubectl_exec_get_all_nodes(&self.kubeconfig, self.envs_as_str())?.items)
    }

    fn node(&self, name: &str) -> Result<KubernetesNode, KubectlError> {
        kubectl_exec_get_node(&self.kubeconfig, name, self.envs_as_str())
    }
}

/// External IPs reported by a node status, in report order.
pub fn external_ips(node: &KubernetesNode) -> Vec<String> {
    node.status
        .addresses
        .iter()
        .filter(|addr| addr.address_type == EXTERNAL_IP_ADDRESS_TYPE)
        .map(|addr| addr.address.clone())
        .collect()
}

/// True iff the list holds at least 2 values and none of them repeats.
/// Values are compared as raw strings, no IP-format awareness.
pub fn all_distinct(ips: &[String]) -> bool {
    if ips.len() < 2 {
        return false;
    }

    let mut seen = HashSet::with_capacity(ips.len());
    for ip in ips {
        if !seen.insert(ip.as_str()) {
            return false;
        }
    }

    true
}

fn check_dual_homed(node_name: &str, ips: &[String]) -> Result<(), NetworkValidationError> {
    if ips.len() < 2 {
        return Err(NetworkValidationError::NotEnoughExternalIps {
            node: node_name.to_string(),
            ips: ips.to_vec(),
        });
    }

    if !all_distinct(ips) {
        return Err(NetworkValidationError::DuplicateExternalIps {
            node: node_name.to_string(),
            ips: ips.to_vec(),
        });
    }

    Ok(())
}

/// Asserts that every node of the cluster is dual-homed: at least 2 external
/// IPs, all distinct. Fail-fast: the first failing node aborts the whole
/// validation.
pub fn validate_all_nodes_dual_homed(source: &dyn NodeSource) -> Result<(), NetworkValidationError> {
    info!("Validating that nodes have 2 different external IPs (both NICs are up)");

    let nodes = source.all_nodes()?;
    for node in &nodes {
        let node_name = node.metadata.name.as_str();
        info!("Validating network interfaces for node: {}", node_name);

        let ips = external_ips(node);
        check_dual_homed(node_name, &ips)?;

        info!("Node {} has {} different external IPs: {:?}", node_name, ips.len(), ips);
    }

    info!("Network validation completed successfully - all nodes have multiple external IPs");
    Ok(())
}

/// Validates the `name:ip1,ip2,` per-node summary emitted by
/// `kubectl_exec_get_node_external_ip_summary`. Lines without exactly one
/// `:` separator are skipped, blank ip tokens are dropped.
pub fn validate_external_ip_summary(output: &str) -> Result<(), NetworkValidationError> {
    info!("Validating network from the node external IP summary");

    for line in output.trim().lines() {
        if line.is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.split(':').collect();
        if parts.len() != 2 {
            continue;
        }

        let node_name = parts[0];
        let ips_str = parts[1].strip_suffix(',').unwrap_or(parts[1]);
        if ips_str.is_empty() {
            return Err(NetworkValidationError::NoExternalIps {
                node: node_name.to_string(),
            });
        }

        let ips: Vec<String> = ips_str
            .split(',')
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
            .map(str::to_string)
            .collect();

        check_dual_homed(node_name, &ips)?;

        info!("Node {} has {} different external IPs: {:?}", node_name, ips.len(), ips);
    }

    info!("External IP summary validation completed successfully");
    Ok(())
}

/// Lists all nodes once, then waits for each of them in turn to become
/// dual-homed. First failure aborts.
pub fn validate_all_nodes_dual_homed_with_wait(
    source: &dyn NodeSource,
    timeout: &str,
) -> Result<(), NetworkValidationError> {
    info!("Validating network with a per-node wait loop");

    let nodes = source.all_nodes()?;
    for node in &nodes {
        let node_name = node.metadata.name.as_str();
        info!("Waiting for node {} to have multiple external IPs", node_name);
        wait_for_dual_homed(source, node_name, timeout)?;
        info!("Node {} successfully has multiple external IPs", node_name);
    }

    info!("Wait loop network validation completed successfully");
    Ok(())
}

/// Polls a node every `DEFAULT_POLL_INTERVAL` until it reports at least 2
/// distinct external IPs or the timeout elapses. The timeout is a
/// human-readable duration string ("5m", "90s", ...). Fetch or decode
/// failures are logged and retried; only the deadline yields an error.
pub fn wait_for_dual_homed(
    source: &dyn NodeSource,
    node_name: &str,
    timeout: &str,
) -> Result<(), NetworkValidationError> {
    wait_for_dual_homed_with_interval(source, node_name, timeout, DEFAULT_POLL_INTERVAL)
}

pub fn wait_for_dual_homed_with_interval(
    source: &dyn NodeSource,
    node_name: &str,
    timeout: &str,
    poll_interval: Duration,
) -> Result<(), NetworkValidationError> {
    let timeout_duration = duration_str::parse(timeout).map_err(|err| NetworkValidationError::InvalidTimeout {
        raw: timeout.to_string(),
        reason: err.to_string(),
    })?;

    // wall-clock deadline, computed once
    let deadline = Instant::now() + timeout_duration;

    while Instant::now() < deadline {
        let node = match source.node(node_name) {
            Ok(node) => node,
            Err(err) => {
                warn!("Failed to get node {}, retrying: {}", node_name, err);
                std::thread::sleep(poll_interval);
                continue;
            }
        };

        let ips = external_ips(&node);
        if ips.len() >= 2 && all_distinct(&ips) {
            info!("Node {} now has {} different external IPs: {:?}", node_name, ips.len(), ips);
            return Ok(());
        }

        info!(
            "Node {} has {} external IPs, waiting for 2+ different IPs: {:?}",
            node_name,
            ips.len(),
            ips
        );
        std::thread::sleep(poll_interval);
    }

    Err(NetworkValidationError::Timeout {
        node: node_name.to_string(),
        timeout: timeout_duration,
    })
}

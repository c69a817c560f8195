use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// A Kube-OVN address assignment. Cluster scoped; one per allocated pod
/// address.
#[derive(Clone, Debug, Default, PartialEq, Eq, CustomResource, Deserialize, Serialize)]
#[kube(
    group = "kubeovn.io",
    version = "v1",
    kind = "IP",
    plural = "ips",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct IpSpec {
    #[serde(default)]
    pub pod_name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub subnet: String,
    #[serde(default)]
    pub node_name: String,
    /// Comma-separated for dual-stack assignments.
    #[serde(default)]
    pub ip_address: String,
    #[serde(default)]
    pub v4_ip_address: String,
    #[serde(default)]
    pub v6_ip_address: String,
    #[serde(default)]
    pub mac_address: String,
    #[serde(default, rename = "containerID")]
    pub container_id: String,
    #[serde(default)]
    pub pod_type: String,
}

/// The derived resource is named after its kind.
pub type Ip = IP;

impl IpSpec {
    /// Returns true if this assignment holds `addr`.
    pub fn holds(&self, addr: &str) -> bool {
        if addr.is_empty() {
            return false;
        }
        self.v4_ip_address == addr
            || self.v6_ip_address == addr
            || self.ip_address.split(',').any(|a| a == addr)
    }
}

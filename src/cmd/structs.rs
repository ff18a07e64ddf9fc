use serde::{Deserialize, Serialize};

/// Address type tag carried by a node status address entry when the address
/// is reachable from outside the cluster.
pub const EXTERNAL_IP_ADDRESS_TYPE: &str = "ExternalIP";

#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct KubernetesList<T> {
    pub items: Vec<T>,
}

#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct KubernetesNode {
    pub metadata: KubernetesNodeMetadata,
    pub status: KubernetesNodeStatus,
}

#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct KubernetesNodeMetadata {
    pub name: String,
}

#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct KubernetesNodeStatus {
    // addresses can be absent while the cloud provider has not reported yet
    #[serde(default)]
    pub addresses: Vec<KubernetesNodeAddress>,
}

// address type can be ExternalIP, InternalIP, Hostname, ...
// the set is open so it stays a plain string
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct KubernetesNodeAddress {
    #[serde(rename = "type")]
    pub address_type: String,
    pub address: String,
}

#[cfg(test)]
mod tests {
    use crate::cmd::structs::{KubernetesList, KubernetesNode};

    #[test]
    fn test_node_list_deserialize() {
        let payload = r#"
{
    "apiVersion": "v1",
    "items": [
        {
            "apiVersion": "v1",
            "kind": "Node",
            "metadata": {
                "creationTimestamp": "2024-11-08T09:31:12Z",
                "labels": {
                    "kubernetes.io/hostname": "worker-0",
                    "node-role.kubernetes.io/worker": ""
                },
                "name": "worker-0",
                "resourceVersion": "1823341",
                "uid": "0d1f7c2f-12ab-4b52-bb1e-74bd8a7d3c55"
            },
            "status": {
                "addresses": [
                    {
                        "address": "10.0.0.1",
                        "type": "ExternalIP"
                    },
                    {
                        "address": "10.0.0.2",
                        "type": "ExternalIP"
                    },
                    {
                        "address": "192.168.1.5",
                        "type": "InternalIP"
                    },
                    {
                        "address": "worker-0",
                        "type": "Hostname"
                    }
                ],
                "nodeInfo": {
                    "kubeletVersion": "v1.31.0",
                    "osImage": "Bottlerocket OS 1.26.1"
                }
            }
        }
    ],
    "kind": "List",
    "metadata": {
        "resourceVersion": ""
    }
}
        "#;

        let node_list = serde_json::from_str::<KubernetesList<KubernetesNode>>(payload);
        assert_eq!(node_list.is_ok(), true);

        let node_list = node_list.unwrap();
        assert_eq!(node_list.items.len(), 1);
        assert_eq!(node_list.items[0].metadata.name, "worker-0");
        assert_eq!(node_list.items[0].status.addresses.len(), 4);
        assert_eq!(node_list.items[0].status.addresses[0].address_type, "ExternalIP");
        assert_eq!(node_list.items[0].status.addresses[0].address, "10.0.0.1");
    }

    #[test]
    fn test_node_without_addresses_deserialize() {
        // a freshly registered node can report a status without addresses
        let payload = r#"
{
    "apiVersion": "v1",
    "kind": "Node",
    "metadata": {
        "name": "worker-1"
    },
    "status": {
        "conditions": []
    }
}
        "#;

        let node = serde_json::from_str::<KubernetesNode>(payload);
        assert_eq!(node.is_ok(), true);
        assert!(node.unwrap().status.addresses.is_empty());
    }
}

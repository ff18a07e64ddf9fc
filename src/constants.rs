pub const KUBECONFIG: &str = "KUBECONFIG";

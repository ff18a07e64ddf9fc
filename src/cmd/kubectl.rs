use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::error;

use crate::cmd::command::{CommandError, NetcheckCommand, does_binary_exist};
use crate::cmd::structs::{KubernetesList, KubernetesNode};
use crate::constants::KUBECONFIG;

/// JSONPath template emitting one `<node-name>:<ip>,<ip>,` line per node,
/// keeping only addresses of type ExternalIP.
pub const NODE_EXTERNAL_IP_SUMMARY_JSONPATH: &str =
    "{range .items[*]}{.metadata.name}{':'}{range .status.addresses[?(@.type=='ExternalIP')]}{.address}{','}{end}{'\n'}{end}";

#[derive(thiserror::Error, Debug)]
pub enum KubectlError {
    #[error("Error while executing `{cmd}`")]
    Command {
        cmd: String,
        #[source]
        source: CommandError,
    },

    #[error("Cannot decode json output of `{cmd}`")]
    JsonDecode {
        cmd: String,
        #[source]
        source: serde_json::Error,
    },
}

pub fn does_kubectl_exist() -> bool {
    does_binary_exist("kubectl")
}

pub fn kubectl_exec_with_output<F, X>(
    args: Vec<&str>,
    envs: Vec<(&str, &str)>,
    stdout_output: &mut F,
    stderr_output: &mut X,
) -> Result<(), KubectlError>
where
    F: FnMut(String),
    X: FnMut(String),
{
    let mut cmd = NetcheckCommand::new("kubectl", &args, &envs);
    if let Err(err) = cmd.exec_with_output(stdout_output, stderr_output) {
        let args_string = args.join(" ");
        error!("Error on command: kubectl {}. {:?}", args_string, &err);
        return Err(KubectlError::Command {
            cmd: format!("kubectl {args_string}"),
            source: err,
        });
    }

    Ok(())
}

pub fn kubectl_exec_get_all_nodes<P>(
    kubernetes_config: P,
    envs: Vec<(&str, &str)>,
) -> Result<KubernetesList<KubernetesNode>, KubectlError>
where
    P: AsRef<Path>,
{
    kubectl_exec::<P, KubernetesList<KubernetesNode>>(vec!["get", "node", "-o", "json"], kubernetes_config, envs)
}

pub fn kubectl_exec_get_node<P>(
    kubernetes_config: P,
    node_name: &str,
    envs: Vec<(&str, &str)>,
) -> Result<KubernetesNode, KubectlError>
where
    P: AsRef<Path>,
{
    kubectl_exec::<P, KubernetesNode>(vec!["get", "node", node_name, "-o", "json"], kubernetes_config, envs)
}

/// Raw per-node external-IP summary, one `name:ip1,ip2,` line per node.
/// Feed the output to `network::dual_homing::validate_external_ip_summary`.
pub fn kubectl_exec_get_node_external_ip_summary<P>(
    kubernetes_config: P,
    envs: Vec<(&str, &str)>,
) -> Result<String, KubectlError>
where
    P: AsRef<Path>,
{
    let kubeconfig = kubernetes_config.as_ref().to_string_lossy();
    let mut _envs = Vec::with_capacity(envs.len() + 1);
    _envs.push((KUBECONFIG, kubeconfig.as_ref()));
    _envs.extend(envs);

    let jsonpath_arg = format!("jsonpath={NODE_EXTERNAL_IP_SUMMARY_JSONPATH}");
    let mut output_vec: Vec<String> = Vec::with_capacity(20);
    kubectl_exec_with_output(
        vec!["get", "nodes", "-o", jsonpath_arg.as_str()],
        _envs,
        &mut |line| output_vec.push(line),
        &mut |line| error!("{}", line),
    )?;

    Ok(output_vec.join("\n"))
}

fn kubectl_exec<P, T>(args: Vec<&str>, kubernetes_config: P, envs: Vec<(&str, &str)>) -> Result<T, KubectlError>
where
    P: AsRef<Path>,
    T: DeserializeOwned,
{
    let kubeconfig = kubernetes_config.as_ref().to_string_lossy();
    let mut _envs = Vec::with_capacity(envs.len() + 1);
    _envs.push((KUBECONFIG, kubeconfig.as_ref()));
    _envs.extend(envs);

    let mut output_vec: Vec<String> = Vec::with_capacity(50);
    kubectl_exec_with_output(args.clone(), _envs, &mut |line| output_vec.push(line), &mut |line| {
        error!("{}", line)
    })?;

    let output_string: String = output_vec.join("");

    match serde_json::from_str::<T>(output_string.as_str()) {
        Ok(x) => Ok(x),
        Err(err) => {
            let args_string = args.join(" ");
            error!(
                "json parsing error on {:?} on command: kubectl {}. {:?}",
                std::any::type_name::<T>(),
                args_string,
                err
            );
            error!("{}", output_string.as_str());
            Err(KubectlError::JsonDecode {
                cmd: format!("kubectl {args_string}"),
                source: err,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::cmd::kubectl::kubectl_exec_get_all_nodes;

    #[test]
    fn test_get_all_nodes_with_invalid_kubeconfig() {
        // whether kubectl is installed or not, an unreachable kubeconfig
        // cannot yield a node list
        let ret = kubectl_exec_get_all_nodes("/does/not/exist/kubeconfig", vec![]);
        assert!(ret.is_err());
    }
}
